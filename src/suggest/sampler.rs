//! Value sampling for autocomplete
//!
//! A [`ValueSampler`] returns distinct existing values of a field so the
//! search box can offer them after an operator. Sampling is the only async,
//! I/O-bound step of autocomplete; callers bound it with a timeout.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::query::ResolvedField;

/// Errors a sampler can report
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("Sampler backend error: {0}")]
    Backend(String),
}

/// Source of distinct field values
#[async_trait]
pub trait ValueSampler: Send + Sync {
    /// Up to `limit` distinct values of `field` starting with `prefix`
    /// (case-insensitive), in display order
    async fn sample(
        &self,
        field: &ResolvedField,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<String>, SamplerError>;
}

/// Sampler that knows no values
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSampler;

#[async_trait]
impl ValueSampler for NoopSampler {
    async fn sample(
        &self,
        _field: &ResolvedField,
        _prefix: &str,
        _limit: usize,
    ) -> Result<Vec<String>, SamplerError> {
        Ok(Vec::new())
    }
}

/// In-memory sampler over fixed value lists, keyed by field name
#[derive(Debug, Default, Clone)]
pub struct StaticSampler {
    values: HashMap<String, Vec<String>>,
}

impl StaticSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the values of a field
    pub fn with_values<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        values.sort();
        values.dedup();
        self.values.insert(field.to_string(), values);
        self
    }
}

#[async_trait]
impl ValueSampler for StaticSampler {
    async fn sample(
        &self,
        field: &ResolvedField,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<String>, SamplerError> {
        let prefix = prefix.to_lowercase();
        Ok(self
            .values
            .get(&field.name)
            .map(|values| {
                values
                    .iter()
                    .filter(|v| v.to_lowercase().starts_with(&prefix))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
