//! Autocomplete Engine
//!
//! Produces ranked suggestions for a partially typed query. Field names and
//! operators come from the catalog snapshot; values come from a
//! [`ValueSampler`] bounded by a timeout. Autocomplete never fails: a slow or
//! broken sampler only marks the outcome as degraded.

use serde::Serialize;
use std::time::Duration;

use crate::catalog::{SchemaCatalog, ValueKind};
use crate::query::{lookup_field, lookup_known_field, Keyword, Operator, ResolvedField, Span};
use crate::suggest::context::{classify, CursorContext};
use crate::suggest::sampler::ValueSampler;

/// Default cap on sampled values
pub const DEFAULT_VALUE_LIMIT: usize = 20;

/// What a suggestion completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Field,
    Operator,
    Value,
}

/// One completion candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// Text to insert
    pub completion: String,
    pub kind: SuggestionKind,
    /// Range of the original text replaced by `completion`
    pub span: Span,
    /// Field kind or operator description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of one autocomplete request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuggestOutcome {
    pub suggestions: Vec<Suggestion>,
    /// Value sampling failed or timed out
    pub degraded: bool,
}

/// Autocomplete tuning
#[derive(Debug, Clone)]
pub struct SuggestOptions {
    /// Maximum sampled values per request
    pub value_limit: usize,
    /// Maximum field-name suggestions per request
    pub field_limit: usize,
    /// Time budget for the sampler
    pub sampler_timeout: Duration,
}

impl Default for SuggestOptions {
    fn default() -> Self {
        Self {
            value_limit: DEFAULT_VALUE_LIMIT,
            field_limit: 50,
            sampler_timeout: Duration::from_millis(1500),
        }
    }
}

/// Autocomplete engine
#[derive(Debug, Clone, Default)]
pub struct Autocomplete {
    options: SuggestOptions,
}

impl Autocomplete {
    pub fn new(options: SuggestOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SuggestOptions {
        &self.options
    }

    /// Suggest completions for `partial` with the cursor at byte `cursor`
    pub async fn suggest(
        &self,
        partial: &str,
        cursor: usize,
        schema: &SchemaCatalog,
        sampler: &dyn ValueSampler,
    ) -> SuggestOutcome {
        let before = &partial[..floor_char_boundary(partial, cursor)];

        match classify(before) {
            CursorContext::FieldName { prefix, span } => {
                SuggestOutcome {
                    suggestions: self.field_suggestions(&prefix, span, schema),
                    degraded: false,
                }
            }
            CursorContext::Value {
                field,
                op,
                prefix,
                span,
                quoted,
            } => {
                self.value_suggestions(&field, op, &prefix, span, quoted, schema, sampler)
                    .await
            }
            CursorContext::None => SuggestOutcome::default(),
        }
    }

    fn field_suggestions(&self, prefix: &str, span: Span, schema: &SchemaCatalog) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();

        // A fully typed catalog field gets its operators first
        if let Some(field) = lookup_known_field(schema, prefix)
            .filter(|field| schema.get(&field.name).is_some())
        {
            suggestions.extend(field.operators.iter().map(|op| Suggestion {
                completion: op.lexeme().to_string(),
                kind: SuggestionKind::Operator,
                span: Span::point(span.end),
                detail: Some(op.describe().to_string()),
            }));
        }

        let (namespace, bare_prefix) = match prefix.strip_prefix("metadata.") {
            Some(rest) => ("metadata.", rest),
            None => ("", prefix),
        };
        let lower = bare_prefix.to_lowercase();

        let mut candidates: Vec<_> = schema
            .fields()
            .filter(|def| namespace.is_empty() || def.is_metadata())
            .filter(|def| def.name.to_lowercase().starts_with(&lower))
            .filter(|def| !(namespace.is_empty() && def.name == bare_prefix))
            .collect();

        candidates.sort_by(|a, b| {
            let rank = |name: &str| (!name.starts_with(bare_prefix), name.to_lowercase());
            rank(&a.name).cmp(&rank(&b.name))
        });

        suggestions.extend(
            candidates
                .into_iter()
                .take(self.options.field_limit)
                .map(|def| Suggestion {
                    completion: format!("{}{}", namespace, def.name),
                    kind: SuggestionKind::Field,
                    span,
                    detail: Some(def.kind.to_string()),
                }),
        );

        suggestions
    }

    #[allow(clippy::too_many_arguments)]
    async fn value_suggestions(
        &self,
        field_name: &str,
        op: Operator,
        prefix: &str,
        span: Span,
        quoted: bool,
        schema: &SchemaCatalog,
        sampler: &dyn ValueSampler,
    ) -> SuggestOutcome {
        let Ok(field) = lookup_field(schema, field_name, span) else {
            return SuggestOutcome::default();
        };

        if field.kind == ValueKind::Boolean {
            let lower = prefix.to_lowercase();
            return SuggestOutcome {
                suggestions: ["true", "false"]
                    .into_iter()
                    .filter(|v| v.starts_with(&lower))
                    .filter_map(|v| value_suggestion(v, span, quoted))
                    .collect(),
                degraded: false,
            };
        }

        if field.free_text || op.is_regex() {
            return SuggestOutcome::default();
        }

        let (values, degraded) = self.sample(&field, prefix, sampler).await;
        let lower = prefix.to_lowercase();

        SuggestOutcome {
            suggestions: values
                .iter()
                .filter(|v| v.to_lowercase().starts_with(&lower))
                .filter_map(|v| value_suggestion(v, span, quoted))
                .take(self.options.value_limit)
                .collect(),
            degraded,
        }
    }

    async fn sample(
        &self,
        field: &ResolvedField,
        prefix: &str,
        sampler: &dyn ValueSampler,
    ) -> (Vec<String>, bool) {
        let timeout = self.options.sampler_timeout;
        match tokio::time::timeout(timeout, sampler.sample(field, prefix, self.options.value_limit))
            .await
        {
            Ok(Ok(values)) => (values, false),
            Ok(Err(e)) => {
                tracing::warn!(field = %field.name, error = %e, "Value sampling failed");
                (Vec::new(), true)
            }
            Err(_) => {
                tracing::warn!(
                    field = %field.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Value sampling timed out"
                );
                (Vec::new(), true)
            }
        }
    }
}

/// Suggest with default options
pub async fn suggest(
    partial: &str,
    cursor: usize,
    schema: &SchemaCatalog,
    sampler: &dyn ValueSampler,
) -> SuggestOutcome {
    Autocomplete::default()
        .suggest(partial, cursor, schema, sampler)
        .await
}

/// `None` when the value cannot be written as a single token: quoted
/// strings have no escapes, so a value holding both quote kinds is dropped.
fn value_suggestion(value: &str, span: Span, quoted: bool) -> Option<Suggestion> {
    let completion = if quoted || needs_quotes(value) {
        let quote = if !value.contains('"') {
            '"'
        } else if !value.contains('\'') {
            '\''
        } else {
            return None;
        };
        format!("{quote}{value}{quote}")
    } else {
        value.to_string()
    };

    Some(Suggestion {
        completion,
        kind: SuggestionKind::Value,
        span,
        detail: None,
    })
}

/// Whether a value must be quoted to survive tokenization as one word
fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value.starts_with('\'')
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"' | ':' | '=' | '<' | '>' | '#'))
        || value.contains("!~")
        || [Keyword::And, Keyword::Or, Keyword::Not]
            .iter()
            .any(|kw| value.eq_ignore_ascii_case(keyword_text(*kw)))
}

fn keyword_text(keyword: Keyword) -> &'static str {
    match keyword {
        Keyword::And => "and",
        Keyword::Or => "or",
        Keyword::Not => "not",
    }
}

/// Largest char boundary not greater than `index`
fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
