//! Predicate to SQL translation
//!
//! Turns a [`Predicate`] into a SQLite `WHERE` condition over the record
//! table (aliased `e`). Every user-supplied value, JSON path included, is a
//! numbered parameter; identifiers coming from the catalog are always quoted.
//!
//! Each leaf yields a definite 0/1, so `NOT` is two-valued:
//!
//! ```text
//! genre!:drama        records with a genre that does not contain "drama"
//! NOT genre:drama     every record without "drama" in its genre, none included
//! ```

use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use std::sync::Arc;

use crate::query::{Predicate, Target, Value};
use crate::storage::trigram;

/// Record table
pub const ENTITY_TABLE: &str = "entities";

const REGEX_SIZE_LIMIT: usize = 1 << 20;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Parameterized SQL condition
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    /// Bound to `?1`, `?2`, ... in order
    pub params: Vec<SqlValue>,
}

/// Translate a predicate into a standalone condition
pub fn translate(predicate: &Predicate) -> SqlFragment {
    let mut builder = SqlBuilder::new();
    let sql = builder.condition(predicate);
    SqlFragment {
        sql,
        params: builder.into_params(),
    }
}

/// Accumulates parameters while SQL text is generated
#[derive(Debug, Default)]
pub struct SqlBuilder {
    params: Vec<SqlValue>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder
    pub fn bind(&mut self, value: impl Into<SqlValue>) -> String {
        self.params.push(value.into());
        format!("?{}", self.params.len())
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn into_params(self) -> Vec<SqlValue> {
        self.params
    }

    /// Condition evaluating to 0 or 1 for every record
    pub fn condition(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::And { children } => self.join(children, " AND ", "1"),
            Predicate::Or { children } => self.join(children, " OR ", "0"),
            Predicate::Not { child } => format!("NOT ({})", self.condition(child)),

            Predicate::Substring { target, value } => {
                let test = self.like(target, value);
                definite(&test)
            }
            Predicate::NotSubstring { target, value } => {
                let test = self.like(target, value);
                definite(&format!("NOT ({})", test))
            }
            Predicate::RegexMatch { target, pattern } => {
                let test = self.regex(target, pattern);
                definite(&test)
            }
            Predicate::RegexNotMatch { target, pattern } => {
                let test = self.regex(target, pattern);
                definite(&format!("NOT ({})", test))
            }
            Predicate::FuzzyMatch {
                target,
                value,
                threshold,
            } => {
                let expr = self.expr(target);
                let value = self.bind(value.clone());
                let threshold = self.bind(*threshold);
                definite(&format!("similarity({}, {}) >= {}", expr, value, threshold))
            }

            Predicate::Equals { target, value } => match target {
                Target::JsonDocument { path } => {
                    let path = self.bind(json_path(path));
                    let test = self.contains_value(&path, value);
                    definite(&test)
                }
                _ => {
                    let test = self.compare(target, "=", value);
                    definite(&test)
                }
            },
            Predicate::NotEquals { target, value } => match target {
                Target::JsonDocument { path } => {
                    let path = self.bind(json_path(path));
                    let test = self.contains_value(&path, value);
                    definite(&format!(
                        "json_type(e.metadata, {}) IS NOT NULL AND NOT ({})",
                        path, test
                    ))
                }
                _ => {
                    let test = self.compare(target, "<>", value);
                    definite(&test)
                }
            },
            Predicate::GreaterThan { target, value } => {
                let test = self.compare(target, ">", value);
                definite(&test)
            }
            Predicate::LessThan { target, value } => {
                let test = self.compare(target, "<", value);
                definite(&test)
            }
            Predicate::GreaterOrEqual { target, value } => {
                let test = self.compare(target, ">=", value);
                definite(&test)
            }
            Predicate::LessOrEqual { target, value } => {
                let test = self.compare(target, "<=", value);
                definite(&test)
            }

            Predicate::Exists { target } => self.exists(target),
            Predicate::NotExists { target } => format!("NOT ({})", self.exists(target)),
        }
    }

    /// Value expression of a target
    pub fn expr(&mut self, target: &Target) -> String {
        match target {
            Target::Column { column } | Target::Uuid { column } => column_ref(column),
            Target::Navigation { relation, column } => navigation_ref(relation, column),
            Target::JsonText { path } | Target::JsonDocument { path } => {
                format!("json_extract(e.metadata, {})", self.bind(json_path(path)))
            }
            Target::JsonNumber { path } => {
                let path = self.bind(json_path(path));
                format!(
                    "CASE WHEN json_type(e.metadata, {p}) IN ('integer', 'real') \
                     THEN json_extract(e.metadata, {p}) END",
                    p = path
                )
            }
            Target::FlattenedMetadata => "e.metadata_text".to_string(),
        }
    }

    fn join(&mut self, children: &[Predicate], separator: &str, empty: &str) -> String {
        if children.is_empty() {
            return empty.to_string();
        }
        let parts: Vec<String> = children.iter().map(|c| self.condition(c)).collect();
        format!("({})", parts.join(separator))
    }

    fn like(&mut self, target: &Target, value: &str) -> String {
        let expr = self.expr(target);
        let pattern = self.bind(format!("%{}%", escape_like(value)));
        format!("{} LIKE {} ESCAPE '\\'", expr, pattern)
    }

    fn regex(&mut self, target: &Target, pattern: &str) -> String {
        let expr = self.expr(target);
        let pattern = self.bind(pattern.to_string());
        format!("regexp_ci({}, {})", pattern, expr)
    }

    fn compare(&mut self, target: &Target, op: &str, value: &Value) -> String {
        let expr = self.expr(target);
        let placeholder = self.bind(sql_value(value));
        match value {
            Value::Text(_) => format!("{} {} {} COLLATE NOCASE", expr, op, placeholder),
            _ => format!("{} {} {}", expr, op, placeholder),
        }
    }

    /// Containment at a JSON path: the value itself or an element of the
    /// array stored there equals `value`
    fn contains_value(&mut self, path: &str, value: &Value) -> String {
        let element_test = match value {
            Value::Boolean(b) => {
                let kind = self.bind(if *b { "true" } else { "false" }.to_string());
                format!("j.type = {}", kind)
            }
            Value::Number(n) => {
                let n = self.bind(*n);
                format!("j.type IN ('integer', 'real') AND j.value = {}", n)
            }
            Value::Text(_) | Value::Timestamp(_) => {
                let text = self.bind(sql_value(value));
                format!("j.type = 'text' AND j.value = {} COLLATE NOCASE", text)
            }
        };
        format!(
            "EXISTS (SELECT 1 FROM json_each(e.metadata, {p}) AS j \
             WHERE json_type(e.metadata, {p}) <> 'object' AND {t})",
            p = path,
            t = element_test
        )
    }

    fn exists(&mut self, target: &Target) -> String {
        match target {
            Target::Column { column } | Target::Uuid { column } => {
                format!("{} IS NOT NULL", column_ref(column))
            }
            Target::Navigation { relation, .. } => {
                format!("{} IS NOT NULL", column_ref(&foreign_key(relation)))
            }
            Target::JsonText { path }
            | Target::JsonNumber { path }
            | Target::JsonDocument { path } => {
                let path = self.bind(json_path(path));
                format!("json_type(e.metadata, {}) IS NOT NULL", path)
            }
            Target::FlattenedMetadata => "e.metadata_text <> ''".to_string(),
        }
    }
}

fn definite(test: &str) -> String {
    format!("IFNULL({}, 0)", test)
}

/// Quote an identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column of the record table
pub fn column_ref(column: &str) -> String {
    format!("e.{}", quote_ident(column))
}

/// Foreign key column of a navigation relation
pub fn foreign_key(relation: &str) -> String {
    format!("{}_id", relation)
}

/// Related value of a navigation relation
pub fn navigation_ref(relation: &str, column: &str) -> String {
    format!(
        "(SELECT n.{} FROM {} AS n WHERE n.id = {})",
        quote_ident(column),
        quote_ident(relation),
        column_ref(&foreign_key(relation))
    )
}

/// SQLite JSON path of a metadata key path
pub fn json_path(path: &[String]) -> String {
    let mut out = String::from("$");
    for key in path {
        out.push_str(".\"");
        out.push_str(key);
        out.push('"');
    }
    out
}

/// Escape LIKE wildcards; pairs with `ESCAPE '\'`
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Stored text form of a timestamp; fixed width so text order is time order
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

pub fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Number(n) => SqlValue::Real(*n),
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Timestamp(at) => SqlValue::Text(format_timestamp(at)),
    }
}

/// Register `regexp_ci(pattern, text)` and `similarity(a, b)`
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("regexp_ci", 2, flags, |ctx| {
        let regex: Arc<regex::Regex> = ctx.get_or_create_aux(0, |pattern| -> Result<_, BoxError> {
            Ok(RegexBuilder::new(pattern.as_str()?)
                .case_insensitive(true)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()?)
        })?;
        Ok(text_of(ctx.get_raw(1)).map(|text| regex.is_match(&text)))
    })?;

    conn.create_scalar_function("similarity", 2, flags, |ctx| {
        let a = text_of(ctx.get_raw(0));
        let b = text_of(ctx.get_raw(1));
        Ok(match (a, b) {
            (Some(a), Some(b)) => Some(trigram::similarity(&a, &b)),
            _ => None,
        })
    })?;

    Ok(())
}

/// Text view of a SQL value; numbers are rendered, NULL and blobs are absent
fn text_of(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FUZZY_THRESHOLD;

    fn column(name: &str) -> Target {
        Target::Column {
            column: name.to_string(),
        }
    }

    fn path(key: &str) -> Vec<String> {
        key.split('.').map(str::to_string).collect()
    }

    #[test]
    fn test_substring_binds_escaped_pattern() {
        let fragment = translate(&Predicate::Substring {
            target: column("name"),
            value: "100%_off".to_string(),
        });
        assert_eq!(fragment.sql, "IFNULL(e.\"name\" LIKE ?1 ESCAPE '\\', 0)");
        assert_eq!(
            fragment.params,
            vec![SqlValue::Text("%100\\%\\_off%".to_string())]
        );
    }

    #[test]
    fn test_values_never_reach_sql_text() {
        let hostile = "'; DROP TABLE entities; --";
        let predicate = Predicate::Or {
            children: vec![
                Predicate::Equals {
                    target: column("name"),
                    value: Value::Text(hostile.to_string()),
                },
                Predicate::RegexMatch {
                    target: Target::JsonText { path: path("status") },
                    pattern: hostile.to_string(),
                },
                Predicate::FuzzyMatch {
                    target: column("name"),
                    value: hostile.to_string(),
                    threshold: FUZZY_THRESHOLD,
                },
            ],
        };
        let fragment = translate(&predicate);
        assert!(!fragment.sql.contains("DROP"));
        assert_eq!(fragment.params.len(), 5);
    }

    #[test]
    fn test_identifiers_are_quoted() {
        let fragment = translate(&Predicate::Exists {
            target: column("we\"ird"),
        });
        assert_eq!(fragment.sql, "e.\"we\"\"ird\" IS NOT NULL");
    }

    #[test]
    fn test_json_number_reuses_path_parameter() {
        let fragment = translate(&Predicate::GreaterThan {
            target: Target::JsonNumber { path: path("edition.year") },
            value: Value::Number(1990.0),
        });
        assert_eq!(fragment.sql.matches("?1").count(), 2);
        assert_eq!(
            fragment.params,
            vec![
                SqlValue::Text("$.\"edition\".\"year\"".to_string()),
                SqlValue::Real(1990.0)
            ]
        );
    }

    #[test]
    fn test_navigation_subquery() {
        let fragment = translate(&Predicate::Equals {
            target: Target::Navigation {
                relation: "genre".to_string(),
                column: "name".to_string(),
            },
            value: Value::Text("Drama".to_string()),
        });
        assert_eq!(
            fragment.sql,
            "IFNULL((SELECT n.\"name\" FROM \"genre\" AS n WHERE n.id = e.\"genre_id\") = ?1 COLLATE NOCASE, 0)"
        );
    }

    #[test]
    fn test_empty_connectives() {
        assert_eq!(translate(&Predicate::match_all()).sql, "1");
        assert_eq!(translate(&Predicate::Or { children: vec![] }).sql, "0");
    }

    #[test]
    fn test_boolean_and_timestamp_values() {
        let fragment = translate(&Predicate::Equals {
            target: column("in_stock"),
            value: Value::Boolean(true),
        });
        assert_eq!(fragment.params, vec![SqlValue::Integer(1)]);

        let at = "2024-03-01T08:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let fragment = translate(&Predicate::GreaterThan {
            target: column("last_edited_at"),
            value: Value::Timestamp(at),
        });
        assert_eq!(
            fragment.params,
            vec![SqlValue::Text("2024-03-01T08:30:00.000Z".to_string())]
        );
    }

    #[test]
    fn test_json_document_equality_uses_containment() {
        let fragment = translate(&Predicate::NotEquals {
            target: Target::JsonDocument { path: path("status") },
            value: Value::Text("draft".to_string()),
        });
        assert!(fragment.sql.contains("json_each(e.metadata, ?1)"));
        assert!(fragment.sql.starts_with("IFNULL(json_type(e.metadata, ?1) IS NOT NULL AND NOT"));
        assert_eq!(fragment.params.len(), 2);
    }

    #[test]
    fn test_registered_functions() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();

        let matched: bool = conn
            .query_row("SELECT regexp_ci('^du.e$', 'DUNE')", [], |row| row.get(0))
            .unwrap();
        assert!(matched);

        let score: f64 = conn
            .query_row("SELECT similarity('word', 'two words')", [], |row| row.get(0))
            .unwrap();
        assert!((score - 4.0 / 11.0).abs() < 1e-6);

        let missing: Option<bool> = conn
            .query_row("SELECT regexp_ci('x', NULL)", [], |row| row.get(0))
            .unwrap();
        assert_eq!(missing, None);
    }
}
