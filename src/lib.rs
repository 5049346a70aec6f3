//! # metasift
//!
//! Search query engine for a web metadata catalog. Users type queries such
//! as `genre:drama AND pages>300 OR "the hobbit"`; metasift turns them into
//! typed predicates a relational store can execute, and suggests fields,
//! operators and values while the query is being typed.
//!
//! ## Features
//!
//! - **Query language**: field comparisons, bare terms, `AND`/`OR`/`NOT`,
//!   grouping, quoting, regex and fuzzy operators
//! - **Typed resolution**: field names and operators checked against a
//!   catalog of system, navigation and JSON metadata fields
//! - **Precise errors**: `invalid_field`, `invalid_operation`,
//!   `invalid_syntax`, `invalid_query`, each with the offending span
//! - **Autocomplete**: cursor-aware suggestions with time-bounded,
//!   cancellable value sampling
//! - **SQLite store**: parameterized SQL translation, schema discovery,
//!   paged search
//!
//! ## Modules
//!
//! - [`query`]: tokenizer, parser, resolver, predicate compiler
//! - [`catalog`]: field catalog snapshot
//! - [`suggest`]: autocomplete
//! - [`storage`]: SQLite record store
//! - [`api`]: REST API server with Axum
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use metasift::query::QueryEngine;
//! use metasift::storage::{CatalogStore, NewEntity, SearchOptions, StoreConfig};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = CatalogStore::open_in_memory(StoreConfig::new().relation("genre"))?;
//!     store.import_records(&[
//!         NewEntity::new("Dune").attr("genre", "Science Fiction"),
//!         NewEntity::new("Emma").attr("genre", "Classic"),
//!     ])?;
//!
//!     let catalog = Arc::new(store.discover_catalog()?);
//!     let engine = QueryEngine::new(Arc::clone(&catalog));
//!
//!     match engine.compile_str("genre:fiction OR name=emma") {
//!         Ok(predicate) => {
//!             let page = store.search(&catalog, &predicate, &SearchOptions::default())?;
//!             println!("Found {} records", page.total);
//!         }
//!         Err(e) => println!("{}: {}", e.code(), e.user_message()),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod query;
pub mod storage;
pub mod suggest;

// Re-export top-level types for convenience
pub use catalog::{FieldDef, FieldOrigin, SchemaCatalog, UnknownFieldPolicy, ValueKind};

pub use query::{
    ErrorCode, InvalidQuery, Predicate, QueryEngine, QueryError, QueryResult, Span, Target, Value,
};

pub use storage::{
    CatalogStore, Entity, NewEntity, SearchOptions, SearchPage, StorageError, StorageResult,
    StoreConfig,
};

pub use suggest::{Autocomplete, SuggestOptions, SuggestSession, Suggestion, ValueSampler};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};
