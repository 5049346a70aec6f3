//! Per-session request cancellation
//!
//! Every keystroke in the search box starts a new autocomplete request. A
//! [`SuggestSession`] belongs to one user session and aborts the previous
//! in-flight request when a new one starts, so stale sampler results are
//! never delivered.

use futures_util::future::{AbortHandle, Abortable};
use std::sync::Mutex;

use crate::catalog::SchemaCatalog;
use crate::suggest::engine::{Autocomplete, SuggestOutcome};
use crate::suggest::sampler::ValueSampler;

/// Autocomplete state of a single user session
#[derive(Debug, Default)]
pub struct SuggestSession {
    engine: Autocomplete,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl SuggestSession {
    pub fn new(engine: Autocomplete) -> Self {
        Self {
            engine,
            in_flight: Mutex::new(None),
        }
    }

    /// Run a request, cancelling the previous one. Returns `None` when this
    /// request was itself superseded before it finished.
    pub async fn suggest(
        &self,
        partial: &str,
        cursor: usize,
        schema: &SchemaCatalog,
        sampler: &dyn ValueSampler,
    ) -> Option<SuggestOutcome> {
        let (handle, registration) = AbortHandle::new_pair();
        let previous = self.slot().replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }

        let request = self.engine.suggest(partial, cursor, schema, sampler);
        match Abortable::new(request, registration).await {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                tracing::debug!(cursor, "Autocomplete request superseded");
                None
            }
        }
    }

    /// Abort the in-flight request, if any
    pub fn cancel(&self) {
        let handle = self.slot().take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<AbortHandle>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
