//! Record storage
//!
//! SQLite adapter that executes compiled predicates:
//!
//! - **store**: `CatalogStore`, table layout, record import, paged search
//! - **discovery**: builds a `SchemaCatalog` from the live database
//! - **sql**: `Predicate` to parameterized SQL, custom SQL functions
//! - **trigram**: `pg_trgm`-compatible similarity for fuzzy matching
//! - **types**: configuration, records, search options
//! - **export**: CSV rendering of search pages
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Search:
//!   Predicate → SqlBuilder (bound params) → SQLite → Entity rows
//!
//! Autocomplete:
//!   ResolvedField → spawn_blocking(distinct_values) → suggestions
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use metasift::query::QueryEngine;
//! use metasift::storage::{CatalogStore, NewEntity, SearchOptions, StoreConfig};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = CatalogStore::open_in_memory(StoreConfig::new().relation("genre"))?;
//!     store.import_records(&[NewEntity::new("Dune").attr("genre", "Science Fiction")])?;
//!
//!     let catalog = Arc::new(store.discover_catalog()?);
//!     let predicate = QueryEngine::new(Arc::clone(&catalog)).compile_str("genre:science")?;
//!     let page = store.search(&catalog, &predicate, &SearchOptions::default())?;
//!     assert_eq!(page.total, 1);
//!     Ok(())
//! }
//! ```

pub mod discovery;
pub mod error;
pub mod export;
pub mod sql;
pub mod store;
pub mod trigram;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use export::page_to_csv;
pub use sql::{translate, SqlBuilder, SqlFragment};
pub use store::{flatten_metadata, CatalogStore};
pub use trigram::similarity;
pub use types::{
    ColumnKind, ColumnSpec, Entity, NewEntity, SearchOptions, SearchPage, SortOrder, StoreConfig,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
