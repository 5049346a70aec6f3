//! Predicate tree
//!
//! The storage-facing output of the query engine. A predicate owns all of its
//! data, references no schema or connection state, and serializes to JSON so
//! it can cross process boundaries. Literal values are always carried as data
//! and never spliced into query text; the storage adapter binds them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Similarity required by `#` comparisons
pub const FUZZY_THRESHOLD: f64 = 0.70;

/// Where a predicate reads its input from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// Column of the record table
    Column { column: String },
    /// Column of a related table reached through a foreign key
    Navigation { relation: String, column: String },
    /// JSON metadata value at `path`, compared as text
    JsonText { path: Vec<String> },
    /// JSON metadata value at `path`, compared numerically
    JsonNumber { path: Vec<String> },
    /// Whole JSON value at `path`: containment and key presence
    JsonDocument { path: Vec<String> },
    /// Precomputed text of every JSON metadata value
    FlattenedMetadata,
    /// Text form of an identifier column
    Uuid { column: String },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Column { column } | Target::Uuid { column } => f.write_str(column),
            Target::Navigation { relation, column } => write!(f, "{}.{}", relation, column),
            Target::JsonText { path } | Target::JsonDocument { path } => {
                write!(f, "metadata.{}", path.join("."))
            }
            Target::JsonNumber { path } => write!(f, "metadata.{}::number", path.join(".")),
            Target::FlattenedMetadata => f.write_str("metadata::text"),
        }
    }
}

/// Typed literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Text(String),
    Number(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Text used by substring, regex and fuzzy matching
    pub fn to_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{:?}", s),
            other => f.write_str(&other.to_text()),
        }
    }
}

/// Compiled filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Substring { target: Target, value: String },
    NotSubstring { target: Target, value: String },
    RegexMatch { target: Target, pattern: String },
    RegexNotMatch { target: Target, pattern: String },
    FuzzyMatch { target: Target, value: String, threshold: f64 },
    Equals { target: Target, value: Value },
    NotEquals { target: Target, value: Value },
    GreaterThan { target: Target, value: Value },
    LessThan { target: Target, value: Value },
    GreaterOrEqual { target: Target, value: Value },
    LessOrEqual { target: Target, value: Value },
    Exists { target: Target },
    NotExists { target: Target },
    /// Empty `And` is always true
    And { children: Vec<Predicate> },
    /// Empty `Or` is always false
    Or { children: Vec<Predicate> },
    Not { child: Box<Predicate> },
}

impl Predicate {
    /// Predicate matching every record
    pub fn match_all() -> Self {
        Predicate::And {
            children: Vec::new(),
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Predicate::And { children } if children.is_empty())
    }

    pub fn negate(self) -> Self {
        Predicate::Not {
            child: Box::new(self),
        }
    }

    /// Number of leaf conditions
    pub fn leaf_count(&self) -> usize {
        match self {
            Predicate::And { children } | Predicate::Or { children } => {
                children.iter().map(Predicate::leaf_count).sum()
            }
            Predicate::Not { child } => child.leaf_count(),
            _ => 1,
        }
    }

    /// Target of a leaf predicate
    pub fn target(&self) -> Option<&Target> {
        match self {
            Predicate::Substring { target, .. }
            | Predicate::NotSubstring { target, .. }
            | Predicate::RegexMatch { target, .. }
            | Predicate::RegexNotMatch { target, .. }
            | Predicate::FuzzyMatch { target, .. }
            | Predicate::Equals { target, .. }
            | Predicate::NotEquals { target, .. }
            | Predicate::GreaterThan { target, .. }
            | Predicate::LessThan { target, .. }
            | Predicate::GreaterOrEqual { target, .. }
            | Predicate::LessOrEqual { target, .. }
            | Predicate::Exists { target }
            | Predicate::NotExists { target } => Some(target),
            Predicate::And { .. } | Predicate::Or { .. } | Predicate::Not { .. } => None,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Substring { target, value } => write!(f, "{} contains {:?}", target, value),
            Predicate::NotSubstring { target, value } => {
                write!(f, "{} not contains {:?}", target, value)
            }
            Predicate::RegexMatch { target, pattern } => write!(f, "{} ~* {:?}", target, pattern),
            Predicate::RegexNotMatch { target, pattern } => {
                write!(f, "{} !~* {:?}", target, pattern)
            }
            Predicate::FuzzyMatch {
                target,
                value,
                threshold,
            } => write!(f, "similarity({}, {:?}) >= {}", target, value, threshold),
            Predicate::Equals { target, value } => write!(f, "{} = {}", target, value),
            Predicate::NotEquals { target, value } => write!(f, "{} != {}", target, value),
            Predicate::GreaterThan { target, value } => write!(f, "{} > {}", target, value),
            Predicate::LessThan { target, value } => write!(f, "{} < {}", target, value),
            Predicate::GreaterOrEqual { target, value } => write!(f, "{} >= {}", target, value),
            Predicate::LessOrEqual { target, value } => write!(f, "{} <= {}", target, value),
            Predicate::Exists { target } => write!(f, "{} exists", target),
            Predicate::NotExists { target } => write!(f, "{} not exists", target),
            Predicate::And { children } if children.is_empty() => f.write_str("TRUE"),
            Predicate::Or { children } if children.is_empty() => f.write_str("FALSE"),
            Predicate::And { children } => write_joined(f, children, " AND "),
            Predicate::Or { children } => write_joined(f, children, " OR "),
            Predicate::Not { child } => write!(f, "NOT ({})", child),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Predicate], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", child)?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_all() {
        assert!(Predicate::match_all().is_match_all());
        assert_eq!(Predicate::match_all().to_string(), "TRUE");
        assert_eq!(Predicate::match_all().leaf_count(), 0);
    }

    #[test]
    fn test_json_shape() {
        let predicate = Predicate::GreaterThan {
            target: Target::Column {
                column: "price".to_string(),
            },
            value: Value::Number(10.0),
        };
        let json = serde_json::to_value(&predicate).unwrap();
        assert_eq!(json["op"], "greater_than");
        assert_eq!(json["target"]["kind"], "column");
        assert_eq!(json["value"]["type"], "number");
        assert_eq!(json["value"]["value"], 10.0);

        let back: Predicate = serde_json::from_value(json).unwrap();
        assert_eq!(back, predicate);
    }

    #[test]
    fn test_display() {
        let predicate = Predicate::And {
            children: vec![
                Predicate::Substring {
                    target: Target::Navigation {
                        relation: "genre".to_string(),
                        column: "name".to_string(),
                    },
                    value: "Fiction".to_string(),
                },
                Predicate::Exists {
                    target: Target::JsonDocument {
                        path: vec!["status".to_string()],
                    },
                }
                .negate(),
            ],
        };
        assert_eq!(
            predicate.to_string(),
            r#"(genre.name contains "Fiction" AND NOT (metadata.status exists))"#
        );
    }
}
