//! Query Engine
//!
//! Runs the full text-to-predicate pipeline against one catalog snapshot:
//!
//! ```text
//! text → tokenize → parse → resolve → compile → Predicate
//! ```

use crate::catalog::SchemaCatalog;
use crate::query::ast::AstNode;
use crate::query::compiler::compile;
use crate::query::error::QueryResult;
use crate::query::parser::parse_query;
use crate::query::predicate::Predicate;
use crate::query::resolver::{resolve, TypedAstNode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Output of [`QueryEngine::explain`]
#[derive(Debug, Clone, Serialize)]
pub struct CompiledQuery {
    pub query: String,
    pub ast: AstNode,
    pub predicate: Predicate,
    /// Pipeline time in microseconds
    pub elapsed_us: u64,
}

/// Compiles query text against a catalog snapshot
#[derive(Debug, Clone)]
pub struct QueryEngine {
    catalog: Arc<SchemaCatalog>,
}

impl QueryEngine {
    /// Create an engine for a catalog snapshot
    pub fn new(catalog: Arc<SchemaCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    /// Parse without consulting the catalog
    pub fn parse(&self, text: &str) -> QueryResult<AstNode> {
        parse_query(text)
    }

    /// Parse and resolve
    pub fn resolve(&self, text: &str) -> QueryResult<TypedAstNode> {
        let ast = parse_query(text)?;
        Ok(resolve(&ast, &self.catalog)?)
    }

    /// Compile query text into a predicate
    pub fn compile_str(&self, text: &str) -> QueryResult<Predicate> {
        self.explain(text).map(|compiled| compiled.predicate)
    }

    /// Compile and keep the intermediate AST
    pub fn explain(&self, text: &str) -> QueryResult<CompiledQuery> {
        let start = Instant::now();

        let result = parse_query(text).and_then(|ast| {
            let typed = resolve(&ast, &self.catalog)?;
            Ok((ast, compile(&typed)))
        });

        let elapsed_us = start.elapsed().as_micros() as u64;

        match result {
            Ok((ast, predicate)) => {
                tracing::debug!(
                    query_len = text.len(),
                    leaves = predicate.leaf_count(),
                    elapsed_us,
                    "Compiled query"
                );
                Ok(CompiledQuery {
                    query: text.to_string(),
                    ast,
                    predicate,
                    elapsed_us,
                })
            }
            Err(e) => {
                tracing::debug!(
                    query_len = text.len(),
                    code = %e.code(),
                    span = %e.span(),
                    "Rejected query: {}",
                    e
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample_catalog;
    use crate::query::ast::Span;
    use crate::query::error::{ErrorCode, ParseError, QueryError, ResolveError};
    use crate::query::predicate::{Target, Value};

    fn engine() -> QueryEngine {
        QueryEngine::new(Arc::new(sample_catalog()))
    }

    #[test]
    fn test_global_phrase_substring() {
        let predicate = engine().compile_str("H to cu").unwrap();
        let Predicate::Or { children } = predicate else {
            panic!("expected disjunction");
        };
        assert!(children.contains(&Predicate::Substring {
            target: Target::Column {
                column: "name".to_string()
            },
            value: "H to cu".to_string()
        }));
    }

    #[test]
    fn test_quoted_global_regex() {
        let predicate = engine().compile_str(r#""Frank Herbert""#).unwrap();
        let Predicate::Or { children } = predicate else {
            panic!("expected disjunction");
        };
        assert!(children.contains(&Predicate::RegexMatch {
            target: Target::FlattenedMetadata,
            pattern: "Frank Herbert".to_string()
        }));
    }

    #[test]
    fn test_number_and_text_conjunction() {
        let predicate = engine()
            .compile_str(r#"price>10 AND author:"Frank Herbert""#)
            .unwrap();
        assert_eq!(
            predicate,
            Predicate::And {
                children: vec![
                    Predicate::GreaterThan {
                        target: Target::Column {
                            column: "price".to_string()
                        },
                        value: Value::Number(10.0)
                    },
                    Predicate::Substring {
                        target: Target::Navigation {
                            relation: "author".to_string(),
                            column: "name".to_string()
                        },
                        value: "Frank Herbert".to_string()
                    },
                ]
            }
        );
    }

    #[test]
    fn test_regex_on_number_rejected() {
        let err = engine().compile_str("price=~abc").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidOperation);
        assert!(matches!(
            err,
            QueryError::Resolve(ResolveError::OperatorNotSupported { ref field, .. }) if field == "price"
        ));
    }

    #[test]
    fn test_navigation_substring() {
        let predicate = engine().compile_str("genre:Fiction").unwrap();
        assert_eq!(
            predicate,
            Predicate::Substring {
                target: Target::Navigation {
                    relation: "genre".to_string(),
                    column: "name".to_string()
                },
                value: "Fiction".to_string()
            }
        );
    }

    #[test]
    fn test_missing_value_is_syntax_error() {
        let err = engine().compile_str("price>").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSyntax);
        assert!(matches!(
            err,
            QueryError::Parse(ParseError::UnexpectedToken { span, .. }) if span == Span::point(6)
        ));
    }

    #[test]
    fn test_unknown_field_code() {
        let err = engine().compile_str("colour:red").unwrap_err();
        assert_eq!(err.code().as_str(), "invalid_field");
        assert_eq!(err.span(), Span::new(0, 6));
    }

    #[test]
    fn test_explain_keeps_ast() {
        let compiled = engine().explain("genre:Fiction").unwrap();
        assert_eq!(compiled.query, "genre:Fiction");
        assert_eq!(compiled.ast.leaf_count(), 1);
        assert_eq!(compiled.predicate.leaf_count(), 1);
    }

    #[test]
    fn test_same_text_same_predicate() {
        let engine = engine();
        let query = "NOT status:* OR (pages>=100 edition.year<2000)";
        assert_eq!(
            engine.compile_str(query).unwrap(),
            engine.compile_str(query).unwrap()
        );
    }
}
