//! Metasift Query Engine
//!
//! Turns filter text typed into a search box into a storage-neutral
//! [`Predicate`] tree:
//!
//! - **Tokenizer**: raw text to tokens with byte spans
//! - **Parser**: tokens to [`AstNode`]
//! - **Resolver**: checks fields and operators against a [`SchemaCatalog`](crate::catalog::SchemaCatalog)
//! - **Compiler**: typed AST to [`Predicate`]
//!
//! # Query Language
//!
//! ```text
//! field:value          substring (case-insensitive)
//! field!:value         not substring
//! field=value          exact match
//! field!=value
//! field=~regex         regex (case-insensitive)
//! field!~regex
//! field#value          fuzzy (trigram similarity >= 0.70)
//! field>n  <  >=  <=   ordering on numbers and timestamps
//! field:*  field!:*    has / has no value
//! word word            substring across all text fields
//! "pattern"            regex across all text fields
//! a AND b, a b         conjunction
//! a OR b, NOT a, ( )
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use metasift::query::QueryEngine;
//!
//! let engine = QueryEngine::new(catalog);
//! let predicate = engine.compile_str(r#"price>10 AND author:"Frank Herbert""#)?;
//! ```

mod ast;
mod compiler;
mod engine;
mod error;
mod parser;
mod predicate;
mod resolver;
mod token;

pub use ast::{AstNode, Comparison, GlobalMode, GlobalTerm, Literal, Operator, Span};
pub use compiler::compile;
pub use engine::{CompiledQuery, QueryEngine};
pub use error::{
    ErrorCode, InvalidQuery, LexError, ParseError, QueryError, QueryResult, ResolveError,
};
pub use parser::{parse, parse_query, MAX_NESTING};
pub use predicate::{Predicate, Target, Value, FUZZY_THRESHOLD};
pub use resolver::{
    global_targets, lookup_field, lookup_known_field, parse_timestamp, resolve, ResolvedField,
    TypedAstNode, TypedComparison, TypedGlobalTerm,
};
pub use token::{tokenize, tokenize_partial, Keyword, Token, TokenKind};
