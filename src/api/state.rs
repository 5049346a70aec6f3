//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::catalog::SchemaCatalog;
use crate::config::ApiConfig;
use crate::query::QueryEngine;
use crate::storage::{CatalogStore, StorageError};
use crate::suggest::{Autocomplete, SuggestOptions, SuggestSession};

/// A session and when it was last handed out
pub struct SessionSlot {
    session: Arc<SuggestSession>,
    last_used: Instant,
}

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Record store
    pub store: CatalogStore,
    /// Current catalog snapshot, swapped on refresh
    pub catalog: Arc<RwLock<Arc<SchemaCatalog>>>,
    /// Autocomplete sessions keyed by client session id
    pub sessions: Arc<RwLock<HashMap<String, SessionSlot>>>,
    /// Autocomplete tuning
    pub suggest: SuggestOptions,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        store: CatalogStore,
        catalog: SchemaCatalog,
        suggest: SuggestOptions,
        config: ApiConfig,
    ) -> Self {
        Self {
            store,
            catalog: Arc::new(RwLock::new(Arc::new(catalog))),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            suggest,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Current catalog snapshot
    pub async fn catalog(&self) -> Arc<SchemaCatalog> {
        Arc::clone(&*self.catalog.read().await)
    }

    /// Query engine bound to the current snapshot
    pub async fn engine(&self) -> QueryEngine {
        QueryEngine::new(self.catalog().await)
    }

    /// Rediscover the catalog from the store and swap it in
    pub async fn refresh_catalog(&self) -> Result<Arc<SchemaCatalog>, StorageError> {
        let store = self.store.clone();
        let catalog = tokio::task::spawn_blocking(move || store.discover_catalog()).await??;
        let catalog = Arc::new(catalog);

        *self.catalog.write().await = Arc::clone(&catalog);
        tracing::info!(fields = catalog.len(), "Catalog snapshot replaced");
        Ok(catalog)
    }

    /// Autocomplete session for a client, created on first use. At most
    /// `max_sessions` are kept; the least recently used one is dropped to
    /// make room.
    pub async fn session(&self, id: &str) -> Arc<SuggestSession> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        if let Some(slot) = sessions.get_mut(id) {
            slot.last_used = now;
            return Arc::clone(&slot.session);
        }

        let cap = self.config.max_sessions.max(1);
        while sessions.len() >= cap {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    tracing::debug!(session = %key, "Evicting idle autocomplete session");
                    sessions.remove(&key);
                }
                None => break,
            }
        }

        let session = Arc::new(SuggestSession::new(Autocomplete::new(self.suggest.clone())));
        sessions.insert(
            id.to_string(),
            SessionSlot {
                session: Arc::clone(&session),
                last_used: now,
            },
        );
        session
    }

    /// Number of autocomplete sessions held
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
