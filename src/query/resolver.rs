//! Field Resolver
//!
//! Validates every field reference in an AST against a [`SchemaCatalog`]
//! snapshot, checks the operator against the field's value kind and converts
//! literals into typed [`Value`]s.
//!
//! Field lookup order:
//!
//! 1. exact catalog name
//! 2. the name with a `_name` suffix removed, for navigation fields
//!    (`publisher_name` is `publisher`)
//! 3. explicit `metadata.<path>` references, always accepted
//! 4. the catalog's [`UnknownFieldPolicy`]

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::RegexBuilder;

use crate::catalog::{FieldDef, FieldOrigin, SchemaCatalog, UnknownFieldPolicy, ValueKind};
use crate::query::ast::{AstNode, Comparison, GlobalMode, GlobalTerm, Literal, Operator, Span};
use crate::query::error::ResolveError;
use crate::query::parser::parse_number;
use crate::query::predicate::{Target, Value};

/// Accepted timestamp layouts, interpreted as UTC
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Compiled regex size cap for syntax checks
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// A field reference after catalog lookup
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    /// Canonical catalog name
    pub name: String,
    pub kind: ValueKind,
    pub origin: FieldOrigin,
    pub operators: &'static [Operator],
    /// Free-text fields are never value-sampled
    pub free_text: bool,
}

impl ResolvedField {
    fn from_def(def: &FieldDef) -> Self {
        Self {
            name: def.name.clone(),
            kind: def.kind,
            origin: def.origin.clone(),
            operators: def.kind.operators(),
            free_text: def.free_text,
        }
    }

    fn metadata_probe(path: Vec<String>) -> Self {
        Self {
            name: path.join("."),
            kind: ValueKind::JsonScalar,
            origin: FieldOrigin::Metadata { path },
            operators: ValueKind::JsonScalar.operators(),
            free_text: false,
        }
    }
}

/// Comparison with a resolved field and typed value
#[derive(Debug, Clone, PartialEq)]
pub struct TypedComparison {
    pub field: ResolvedField,
    pub op: Operator,
    /// Kind the comparison is evaluated as. Equal to the field kind except
    /// for JSON-scalar fields, which narrow to number or text.
    pub value_kind: ValueKind,
    /// Absent only for existence checks
    pub value: Option<Value>,
    pub span: Span,
}

/// Global term with the targets it searches
#[derive(Debug, Clone, PartialEq)]
pub struct TypedGlobalTerm {
    pub text: String,
    pub mode: GlobalMode,
    pub targets: Vec<Target>,
    pub span: Span,
}

/// Resolved AST
#[derive(Debug, Clone, PartialEq)]
pub enum TypedAstNode {
    MatchAll,
    Conjunction(Vec<TypedAstNode>),
    Disjunction(Vec<TypedAstNode>),
    Negation(Box<TypedAstNode>),
    Comparison(TypedComparison),
    GlobalTerm(TypedGlobalTerm),
}

/// Resolve an AST against a catalog snapshot
pub fn resolve(ast: &AstNode, schema: &SchemaCatalog) -> Result<TypedAstNode, ResolveError> {
    match ast {
        AstNode::MatchAll => Ok(TypedAstNode::MatchAll),
        AstNode::Conjunction { children } => Ok(TypedAstNode::Conjunction(
            children
                .iter()
                .map(|child| resolve(child, schema))
                .collect::<Result<_, _>>()?,
        )),
        AstNode::Disjunction { children } => Ok(TypedAstNode::Disjunction(
            children
                .iter()
                .map(|child| resolve(child, schema))
                .collect::<Result<_, _>>()?,
        )),
        AstNode::Negation { child } => {
            Ok(TypedAstNode::Negation(Box::new(resolve(child, schema)?)))
        }
        AstNode::Comparison(comparison) => resolve_comparison(comparison, schema),
        AstNode::GlobalTerm(term) => resolve_global(term, schema),
    }
}

/// Look up a field name the way queries do
pub fn lookup_field(
    schema: &SchemaCatalog,
    name: &str,
    span: Span,
) -> Result<ResolvedField, ResolveError> {
    if let Some(field) = lookup_known_field(schema, name) {
        return Ok(field);
    }

    match schema.unknown_fields() {
        UnknownFieldPolicy::MetadataProbe => Ok(ResolvedField::metadata_probe(
            name.split('.').map(str::to_string).collect(),
        )),
        UnknownFieldPolicy::Reject => Err(ResolveError::UnknownField {
            name: name.to_string(),
            span,
        }),
    }
}

/// Field lookup without the unknown-field fallback
pub fn lookup_known_field(schema: &SchemaCatalog, name: &str) -> Option<ResolvedField> {
    if let Some(def) = schema.get(name) {
        return Some(ResolvedField::from_def(def));
    }

    if let Some(def) = name
        .strip_suffix("_name")
        .and_then(|base| schema.get(base))
        .filter(|def| def.is_navigation())
    {
        return Some(ResolvedField::from_def(def));
    }

    let path: Vec<String> = name
        .strip_prefix("metadata.")?
        .split('.')
        .map(str::to_string)
        .collect();
    if path.iter().any(|segment| segment.is_empty()) {
        return None;
    }

    Some(match schema.metadata_field(&path) {
        Some(def) => ResolvedField::from_def(def),
        None => ResolvedField::metadata_probe(path),
    })
}

fn resolve_comparison(
    comparison: &Comparison,
    schema: &SchemaCatalog,
) -> Result<TypedAstNode, ResolveError> {
    let field = lookup_field(schema, &comparison.field, comparison.field_span)?;

    if !field.kind.supports(comparison.op) {
        return Err(ResolveError::OperatorNotSupported {
            field: comparison.field.clone(),
            operator: comparison.op,
            span: comparison.span,
        });
    }

    let (value_kind, value) = match &comparison.value {
        None => (field.kind, None),
        Some(literal) => {
            let (kind, value) = type_value(
                &comparison.field,
                field.kind,
                comparison.op,
                literal,
                comparison.span,
            )?;
            (kind, Some(value))
        }
    };

    Ok(TypedAstNode::Comparison(TypedComparison {
        field,
        op: comparison.op,
        value_kind,
        value,
        span: comparison.span,
    }))
}

fn type_value(
    field: &str,
    kind: ValueKind,
    op: Operator,
    literal: &Literal,
    span: Span,
) -> Result<(ValueKind, Value), ResolveError> {
    let raw = literal.raw();
    let invalid = |expected: &str| ResolveError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        expected: expected.to_string(),
        span,
    };

    match kind {
        ValueKind::Text => {
            if op.is_regex() {
                check_pattern(raw, span)?;
            }
            Ok((ValueKind::Text, Value::Text(raw.to_string())))
        }
        ValueKind::Number => literal
            .as_number()
            .or_else(|| parse_number(raw))
            .map(|n| (ValueKind::Number, Value::Number(n)))
            .ok_or_else(|| invalid("a number")),
        ValueKind::Boolean => parse_bool(raw)
            .map(|b| (ValueKind::Boolean, Value::Boolean(b)))
            .ok_or_else(|| invalid("true or false")),
        ValueKind::Timestamp => parse_timestamp(raw)
            .map(|ts| (ValueKind::Timestamp, Value::Timestamp(ts)))
            .ok_or_else(|| invalid("a date such as 2025-07-20 or 2025-07-20 15:30:00")),
        ValueKind::JsonScalar => {
            let numeric_op = op.is_ordering() || matches!(op, Operator::Equals | Operator::NotEquals);
            match literal.as_number() {
                Some(n) if numeric_op => Ok((ValueKind::Number, Value::Number(n))),
                _ if op.is_ordering() => Err(invalid("a number")),
                _ => {
                    if op.is_regex() {
                        check_pattern(raw, span)?;
                    }
                    Ok((ValueKind::Text, Value::Text(raw.to_string())))
                }
            }
        }
    }
}

fn resolve_global(term: &GlobalTerm, schema: &SchemaCatalog) -> Result<TypedAstNode, ResolveError> {
    let text = term.text.trim();
    if text.is_empty() || text == "*" {
        return Ok(TypedAstNode::MatchAll);
    }

    if term.mode == GlobalMode::Regex {
        check_pattern(text, term.span)?;
    }

    Ok(TypedAstNode::GlobalTerm(TypedGlobalTerm {
        text: text.to_string(),
        mode: term.mode,
        targets: global_targets(schema, text),
        span: term.span,
    }))
}

/// Text targets searched by a field-less term, in catalog order
pub fn global_targets(schema: &SchemaCatalog, text: &str) -> Vec<Target> {
    let mut targets: Vec<Target> = schema
        .fields()
        .filter(|def| def.searchable && def.kind == ValueKind::Text)
        .map(|def| match &def.origin {
            FieldOrigin::System { column } => Target::Column {
                column: column.clone(),
            },
            FieldOrigin::Navigation { relation, column } => Target::Navigation {
                relation: relation.clone(),
                column: column.clone(),
            },
            FieldOrigin::Metadata { path } => Target::JsonText { path: path.clone() },
        })
        .collect();

    if schema.has_flattened_metadata() {
        targets.push(Target::FlattenedMetadata);
    }

    if let Some(column) = schema.uuid_column() {
        if uuid::Uuid::parse_str(text).is_ok() {
            targets.push(Target::Uuid {
                column: column.to_string(),
            });
        }
    }

    targets
}

fn check_pattern(pattern: &str, span: Span) -> Result<(), ResolveError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map(|_| ())
        .map_err(|e| ResolveError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
            span,
        })
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parse a timestamp literal. Date-only values mean midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|dt| dt.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample_catalog;
    use crate::query::parser::parse_query;
    use chrono::TimeZone;

    fn resolve_str(text: &str) -> Result<TypedAstNode, ResolveError> {
        resolve(&parse_query(text).unwrap(), &sample_catalog())
    }

    fn typed_comparison(node: TypedAstNode) -> TypedComparison {
        match node {
            TypedAstNode::Comparison(c) => c,
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_number_field() {
        let c = typed_comparison(resolve_str("price>10").unwrap());
        assert_eq!(c.field.kind, ValueKind::Number);
        assert_eq!(c.value, Some(Value::Number(10.0)));
    }

    #[test]
    fn test_quoted_number_on_number_field() {
        let c = typed_comparison(resolve_str(r#"price="12.5""#).unwrap());
        assert_eq!(c.value, Some(Value::Number(12.5)));
    }

    #[test]
    fn test_number_on_text_field_stays_text() {
        let c = typed_comparison(resolve_str("name:42").unwrap());
        assert_eq!(c.value, Some(Value::Text("42".to_string())));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = resolve_str("colour:red").unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownField {
                name: "colour".to_string(),
                span: Span::new(0, 6)
            }
        );
    }

    #[test]
    fn test_unknown_field_metadata_policy() {
        let catalog = sample_catalog().with_unknown_fields(UnknownFieldPolicy::MetadataProbe);
        let ast = parse_query("colour:red").unwrap();
        let c = typed_comparison(resolve(&ast, &catalog).unwrap());
        assert_eq!(c.field.kind, ValueKind::JsonScalar);
        assert_eq!(
            c.field.origin,
            FieldOrigin::Metadata {
                path: vec!["colour".to_string()]
            }
        );
    }

    #[test]
    fn test_name_suffix_alias() {
        let c = typed_comparison(resolve_str("publisher_name:Ace").unwrap());
        assert_eq!(c.field.name, "publisher");
        assert!(matches!(c.field.origin, FieldOrigin::Navigation { .. }));
    }

    #[test]
    fn test_name_suffix_only_for_navigation() {
        assert!(matches!(
            resolve_str("price_name:x").unwrap_err(),
            ResolveError::UnknownField { .. }
        ));
    }

    #[test]
    fn test_explicit_metadata_path() {
        let c = typed_comparison(resolve_str("metadata.status:draft").unwrap());
        assert_eq!(c.field.name, "status");
        assert_eq!(c.field.kind, ValueKind::Text);

        let c = typed_comparison(resolve_str("metadata.shelf.row>3").unwrap());
        assert_eq!(c.field.kind, ValueKind::JsonScalar);
        assert_eq!(c.value_kind, ValueKind::Number);
        assert_eq!(
            c.field.origin,
            FieldOrigin::Metadata {
                path: vec!["shelf".to_string(), "row".to_string()]
            }
        );
    }

    #[test]
    fn test_operator_not_supported() {
        let err = resolve_str("price=~abc").unwrap_err();
        assert_eq!(
            err,
            ResolveError::OperatorNotSupported {
                field: "price".to_string(),
                operator: Operator::Matches,
                span: Span::new(0, 10)
            }
        );
        assert!(resolve_str("in_stock>1").is_err());
        assert!(resolve_str("name>b").is_err());
        assert!(resolve_str("price:10").is_err());
    }

    #[test]
    fn test_operator_table_round_trip() {
        let fields = [
            ("status", ValueKind::Text, "abc"),
            ("price", ValueKind::Number, "10"),
            ("in_stock", ValueKind::Boolean, "true"),
            ("last_edited_at", ValueKind::Timestamp, "2025-07-20"),
            ("edition.year", ValueKind::JsonScalar, "10"),
        ];

        for (field, kind, value) in fields {
            for (lexeme, op) in Operator::LEXEMES {
                let query = if op.is_unary() {
                    format!("{}{}", field, lexeme)
                } else {
                    format!("{}{}{}", field, lexeme, value)
                };
                let result = resolve_str(&query);

                if kind.supports(op) {
                    let c = typed_comparison(result.unwrap_or_else(|e| panic!("{}: {}", query, e)));
                    assert_eq!(c.op, op, "{}", query);
                    assert_eq!(c.field.kind, kind, "{}", query);
                    let _ = crate::query::compile(&TypedAstNode::Comparison(c));
                } else {
                    assert_eq!(
                        result.unwrap_err(),
                        ResolveError::OperatorNotSupported {
                            field: field.to_string(),
                            operator: op,
                            span: Span::new(0, query.len()),
                        },
                        "{}",
                        query
                    );
                }
            }
        }
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            resolve_str("price>abc").unwrap_err(),
            ResolveError::InvalidValue { .. }
        ));
        assert!(matches!(
            resolve_str("in_stock=maybe").unwrap_err(),
            ResolveError::InvalidValue { .. }
        ));
        assert!(matches!(
            resolve_str("last_edited_at>yesterday").unwrap_err(),
            ResolveError::InvalidValue { .. }
        ));
        assert!(matches!(
            resolve_str("edition.year>new").unwrap_err(),
            ResolveError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_boolean_and_timestamp_values() {
        let c = typed_comparison(resolve_str("in_stock=TRUE").unwrap());
        assert_eq!(c.value, Some(Value::Boolean(true)));

        let c = typed_comparison(resolve_str("last_edited_at>2025-07-20").unwrap());
        assert_eq!(
            c.value,
            Some(Value::Timestamp(Utc.with_ymd_and_hms(2025, 7, 20, 0, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_json_scalar_narrowing() {
        let c = typed_comparison(resolve_str("edition.year=1965").unwrap());
        assert_eq!(c.value_kind, ValueKind::Number);

        let c = typed_comparison(resolve_str("edition.year:first").unwrap());
        assert_eq!(c.value_kind, ValueKind::Text);

        let c = typed_comparison(resolve_str("edition.year=\"1965\"").unwrap());
        assert_eq!(c.value_kind, ValueKind::Text);
    }

    #[test]
    fn test_invalid_regex() {
        let err = resolve_str("name=~(unclosed").unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPattern { .. }));
        let err = resolve_str(r#""[a-""#).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPattern { .. }));
    }

    #[test]
    fn test_global_targets_deterministic() {
        let TypedAstNode::GlobalTerm(term) = resolve_str("dune").unwrap() else {
            panic!("expected global term");
        };
        assert_eq!(
            term.targets,
            vec![
                Target::Navigation {
                    relation: "author".to_string(),
                    column: "name".to_string()
                },
                Target::Navigation {
                    relation: "genre".to_string(),
                    column: "name".to_string()
                },
                Target::Column {
                    column: "name".to_string()
                },
                Target::Navigation {
                    relation: "publisher".to_string(),
                    column: "name".to_string()
                },
                Target::JsonText {
                    path: vec!["status".to_string()]
                },
                Target::FlattenedMetadata,
            ]
        );
    }

    #[test]
    fn test_global_uuid_target() {
        let TypedAstNode::GlobalTerm(term) =
            resolve_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap()
        else {
            panic!("expected global term");
        };
        assert_eq!(
            term.targets.last(),
            Some(&Target::Uuid {
                column: "uuid".to_string()
            })
        );
    }

    #[test]
    fn test_global_star_matches_all() {
        assert_eq!(resolve_str("*").unwrap(), TypedAstNode::MatchAll);
        assert_eq!(resolve_str(r#""""#).unwrap(), TypedAstNode::MatchAll);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 7, 20, 15, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2025-07-20 15:30"), Some(expected));
        assert_eq!(parse_timestamp("2025-07-20T15:30"), Some(expected));
        assert_eq!(parse_timestamp("2025-07-20 15:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-07-20T15:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-07-20T15:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("20/07/2025"), None);
    }
}
