//! Autocomplete
//!
//! Suggests field names, operators and values while a query is being typed.
//!
//! - **Context**: classifies the text left of the cursor
//! - **Engine**: ranks field and operator suggestions, samples values
//! - **Sampler**: async source of existing field values
//! - **Session**: cancels superseded requests of one user session
//!
//! # Example
//!
//! ```rust,ignore
//! use metasift::suggest::{SuggestSession, StaticSampler};
//!
//! let session = SuggestSession::default();
//! let sampler = StaticSampler::new().with_values("genre", ["Fiction", "Drama"]);
//! if let Some(outcome) = session.suggest("genre:F", 7, &catalog, &sampler).await {
//!     for s in outcome.suggestions {
//!         println!("{} {:?}", s.completion, s.span);
//!     }
//! }
//! ```

mod context;
mod engine;
mod sampler;
mod session;

pub use context::{classify, CursorContext};
pub use engine::{
    suggest, Autocomplete, SuggestOptions, SuggestOutcome, Suggestion, SuggestionKind,
    DEFAULT_VALUE_LIMIT,
};
pub use sampler::{NoopSampler, SamplerError, StaticSampler, ValueSampler};
pub use session::SuggestSession;
