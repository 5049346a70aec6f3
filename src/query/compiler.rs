//! Predicate Compiler
//!
//! Lowers a [`TypedAstNode`] into a [`Predicate`]. Compilation is pure and
//! total: every resolved tree has exactly one predicate, and the same tree
//! always compiles to the same predicate.
//!
//! Metadata fields pick their storage target from the resolved value kind:
//!
//! ```text
//! text       :  !:  =~  !~  #   -> JsonText      (path-scoped text extraction)
//! text       =  !=              -> JsonDocument  (full-value containment)
//! number     =  !=  >  <  >= <= -> JsonNumber    (path-scoped numeric extraction)
//! boolean    =  !=              -> JsonDocument
//! any        :*  !:*            -> JsonDocument  (key presence)
//! ```

use crate::catalog::{FieldOrigin, ValueKind};
use crate::query::ast::{GlobalMode, Operator};
use crate::query::predicate::{Predicate, Target, Value, FUZZY_THRESHOLD};
use crate::query::resolver::{TypedAstNode, TypedComparison, TypedGlobalTerm};

/// Compile a resolved AST
pub fn compile(typed: &TypedAstNode) -> Predicate {
    match typed {
        TypedAstNode::MatchAll => Predicate::match_all(),
        TypedAstNode::Conjunction(children) => Predicate::And {
            children: children.iter().map(compile).collect(),
        },
        TypedAstNode::Disjunction(children) => Predicate::Or {
            children: children.iter().map(compile).collect(),
        },
        TypedAstNode::Negation(child) => compile(child).negate(),
        TypedAstNode::Comparison(comparison) => compile_comparison(comparison),
        TypedAstNode::GlobalTerm(term) => compile_global(term),
    }
}

fn compile_comparison(c: &TypedComparison) -> Predicate {
    let target = target_for(&c.field.origin, c.value_kind, c.op);
    let value = c
        .value
        .clone()
        .unwrap_or_else(|| Value::Text(String::new()));

    match c.op {
        Operator::Contains => Predicate::Substring {
            target,
            value: value.to_text(),
        },
        Operator::NotContains => Predicate::NotSubstring {
            target,
            value: value.to_text(),
        },
        Operator::Matches => Predicate::RegexMatch {
            target,
            pattern: value.to_text(),
        },
        Operator::NotMatches => Predicate::RegexNotMatch {
            target,
            pattern: value.to_text(),
        },
        Operator::Fuzzy => Predicate::FuzzyMatch {
            target,
            value: value.to_text(),
            threshold: FUZZY_THRESHOLD,
        },
        Operator::Equals => Predicate::Equals { target, value },
        Operator::NotEquals => Predicate::NotEquals { target, value },
        Operator::Gt => Predicate::GreaterThan { target, value },
        Operator::Lt => Predicate::LessThan { target, value },
        Operator::Gte => Predicate::GreaterOrEqual { target, value },
        Operator::Lte => Predicate::LessOrEqual { target, value },
        Operator::Exists => Predicate::Exists { target },
        Operator::NotExists => Predicate::NotExists { target },
    }
}

fn target_for(origin: &FieldOrigin, kind: ValueKind, op: Operator) -> Target {
    match origin {
        FieldOrigin::System { column } => Target::Column {
            column: column.clone(),
        },
        FieldOrigin::Navigation { relation, column } => Target::Navigation {
            relation: relation.clone(),
            column: column.clone(),
        },
        FieldOrigin::Metadata { path } => {
            let path = path.clone();
            match kind {
                _ if op.is_unary() => Target::JsonDocument { path },
                ValueKind::Number => Target::JsonNumber { path },
                ValueKind::Boolean => Target::JsonDocument { path },
                ValueKind::Text if matches!(op, Operator::Equals | Operator::NotEquals) => {
                    Target::JsonDocument { path }
                }
                ValueKind::Text | ValueKind::Timestamp | ValueKind::JsonScalar => {
                    Target::JsonText { path }
                }
            }
        }
    }
}

fn compile_global(term: &TypedGlobalTerm) -> Predicate {
    let children = term
        .targets
        .iter()
        .cloned()
        .map(|target| match term.mode {
            GlobalMode::Substring => Predicate::Substring {
                target,
                value: term.text.clone(),
            },
            GlobalMode::Regex => Predicate::RegexMatch {
                target,
                pattern: term.text.clone(),
            },
        })
        .collect();

    Predicate::Or { children }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample_catalog;
    use crate::query::parser::parse_query;
    use crate::query::resolver::resolve;

    fn compile_str(text: &str) -> Predicate {
        let ast = parse_query(text).unwrap();
        compile(&resolve(&ast, &sample_catalog()).unwrap())
    }

    fn column(name: &str) -> Target {
        Target::Column {
            column: name.to_string(),
        }
    }

    fn json_path(key: &str) -> Vec<String> {
        key.split('.').map(str::to_string).collect()
    }

    #[test]
    fn test_text_operators() {
        assert_eq!(
            compile_str("name:dune"),
            Predicate::Substring {
                target: column("name"),
                value: "dune".to_string()
            }
        );
        assert_eq!(
            compile_str("name!:dune"),
            Predicate::NotSubstring {
                target: column("name"),
                value: "dune".to_string()
            }
        );
        assert_eq!(
            compile_str("name=Dune"),
            Predicate::Equals {
                target: column("name"),
                value: Value::Text("Dune".to_string())
            }
        );
        assert_eq!(
            compile_str("name!=Dune"),
            Predicate::NotEquals {
                target: column("name"),
                value: Value::Text("Dune".to_string())
            }
        );
        assert_eq!(
            compile_str("name=~^du"),
            Predicate::RegexMatch {
                target: column("name"),
                pattern: "^du".to_string()
            }
        );
        assert_eq!(
            compile_str("name!~^du"),
            Predicate::RegexNotMatch {
                target: column("name"),
                pattern: "^du".to_string()
            }
        );
    }

    #[test]
    fn test_fuzzy_threshold() {
        assert_eq!(
            compile_str("name#hobit"),
            Predicate::FuzzyMatch {
                target: column("name"),
                value: "hobit".to_string(),
                threshold: 0.70
            }
        );
    }

    #[test]
    fn test_ordering_operators() {
        let cases = [
            ("price>10", "greater_than"),
            ("price<10", "less_than"),
            ("price>=10", "greater_or_equal"),
            ("price<=10", "less_or_equal"),
            ("price=10", "equals"),
            ("price!=10", "not_equals"),
        ];
        for (query, op) in cases {
            let json = serde_json::to_value(compile_str(query)).unwrap();
            assert_eq!(json["op"], op, "{}", query);
            assert_eq!(json["target"]["column"], "price");
            assert_eq!(json["value"]["value"], 10.0);
        }
    }

    #[test]
    fn test_existence() {
        assert_eq!(
            compile_str("price:*"),
            Predicate::Exists {
                target: column("price")
            }
        );
        assert_eq!(
            compile_str("status!:*"),
            Predicate::NotExists {
                target: Target::JsonDocument {
                    path: json_path("status")
                }
            }
        );
    }

    #[test]
    fn test_navigation_target() {
        assert_eq!(
            compile_str("genre:Fiction"),
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
    fn test_metadata_targets_follow_kind() {
        assert_eq!(
            compile_str("status=draft"),
            Predicate::Equals {
                target: Target::JsonDocument {
                    path: json_path("status")
                },
                value: Value::Text("draft".to_string())
            }
        );
        assert_eq!(
            compile_str("status:dra"),
            Predicate::Substring {
                target: Target::JsonText {
                    path: json_path("status")
                },
                value: "dra".to_string()
            }
        );
        assert_eq!(
            compile_str("pages>=300"),
            Predicate::GreaterOrEqual {
                target: Target::JsonNumber {
                    path: json_path("pages")
                },
                value: Value::Number(300.0)
            }
        );
        assert_eq!(
            compile_str("signed=true"),
            Predicate::Equals {
                target: Target::JsonDocument {
                    path: json_path("signed")
                },
                value: Value::Boolean(true)
            }
        );
        assert_eq!(
            compile_str("edition.year=1965"),
            Predicate::Equals {
                target: Target::JsonNumber {
                    path: json_path("edition.year")
                },
                value: Value::Number(1965.0)
            }
        );
        assert_eq!(
            compile_str("edition.year:first"),
            Predicate::Substring {
                target: Target::JsonText {
                    path: json_path("edition.year")
                },
                value: "first".to_string()
            }
        );
    }

    #[test]
    fn test_global_substring_and_regex() {
        let Predicate::Or { children } = compile_str("H to cu") else {
            panic!("expected disjunction");
        };
        assert!(!children.is_empty());
        assert!(children.iter().all(|c| matches!(
            c,
            Predicate::Substring { value, .. } if value == "H to cu"
        )));
        assert!(children.contains(&Predicate::Substring {
            target: Target::FlattenedMetadata,
            value: "H to cu".to_string()
        }));

        let Predicate::Or { children } = compile_str(r#""Frank Herbert""#) else {
            panic!("expected disjunction");
        };
        assert!(children.iter().all(|c| matches!(
            c,
            Predicate::RegexMatch { pattern, .. } if pattern == "Frank Herbert"
        )));
    }

    #[test]
    fn test_structure_preserved() {
        let predicate = compile_str("price>10 AND author:\"Frank Herbert\"");
        let Predicate::And { children } = &predicate else {
            panic!("expected conjunction");
        };
        assert_eq!(children.len(), 2);
        assert!(matches!(children[0], Predicate::GreaterThan { .. }));
        assert!(matches!(children[1], Predicate::Substring { .. }));

        let predicate = compile_str("NOT (in_stock:* OR price<5)");
        let Predicate::Not { child } = predicate else {
            panic!("expected negation");
        };
        assert!(matches!(*child, Predicate::Or { ref children } if children.len() == 2));
    }

    #[test]
    fn test_empty_query_is_match_all() {
        assert!(compile_str("").is_match_all());
        assert!(compile_str("*").is_match_all());
    }

    #[test]
    fn test_idempotent() {
        let query = "(genre:Fiction OR genre:Drama) AND NOT price>=100 dune";
        let first = compile_str(query);
        let second = compile_str(query);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    fn compile_with(text: &str, catalog: &crate::catalog::SchemaCatalog) -> Predicate {
        compile(&resolve(&parse_query(text).unwrap(), catalog).unwrap())
    }

    #[test]
    fn test_quoted_phrase_with_regex_class() {
        let Predicate::Or { children } = compile_str(r#""H to cu [0-9]+""#) else {
            panic!("expected disjunction");
        };
        assert!(children.iter().all(|c| matches!(
            c,
            Predicate::RegexMatch { pattern, .. } if pattern == "H to cu [0-9]+"
        )));
        assert!(children.contains(&Predicate::RegexMatch {
            target: Target::FlattenedMetadata,
            pattern: "H to cu [0-9]+".to_string()
        }));
    }

    #[test]
    fn test_quoted_operators_and_hyphenated_metadata() {
        use crate::catalog::{FieldDef, SchemaCatalog, ValueKind};

        let catalog = SchemaCatalog::builder()
            .field(FieldDef::system("description", ValueKind::Text).free_text())
            .field(FieldDef::metadata(&["sum-of-weights"], ValueKind::Number))
            .build();
        let predicate = compile_with(
            r#"description:"ee -> Z(nu nu)" AND sum-of-weights>100000"#,
            &catalog,
        );
        assert_eq!(
            predicate,
            Predicate::And {
                children: vec![
                    Predicate::Substring {
                        target: column("description"),
                        value: "ee -> Z(nu nu)".to_string()
                    },
                    Predicate::GreaterThan {
                        target: Target::JsonNumber {
                            path: json_path("sum-of-weights")
                        },
                        value: Value::Number(100000.0)
                    },
                ]
            }
        );
    }

    #[test]
    fn test_group_followed_by_not() {
        use crate::catalog::{FieldDef, SchemaCatalog};

        let catalog = SchemaCatalog::builder()
            .field(FieldDef::navigation("genre"))
            .field(FieldDef::navigation("format"))
            .build();
        let navigation = |relation: &str| Target::Navigation {
            relation: relation.to_string(),
            column: "name".to_string(),
        };

        let predicate = compile_with(
            r#"(genre:Fiction OR genre:"Science Fiction") NOT format:Hardcover"#,
            &catalog,
        );
        assert_eq!(
            predicate,
            Predicate::And {
                children: vec![
                    Predicate::Or {
                        children: vec![
                            Predicate::Substring {
                                target: navigation("genre"),
                                value: "Fiction".to_string()
                            },
                            Predicate::Substring {
                                target: navigation("genre"),
                                value: "Science Fiction".to_string()
                            },
                        ]
                    },
                    Predicate::Not {
                        child: Box::new(Predicate::Substring {
                            target: navigation("format"),
                            value: "Hardcover".to_string()
                        })
                    },
                ]
            }
        );
    }
}
