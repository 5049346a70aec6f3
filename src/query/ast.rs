//! Query AST types
//!
//! Defines the abstract syntax tree produced by the parser. Nodes carry the
//! byte span of the source text they were parsed from so that errors and
//! autocomplete can point back into the original query.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte range `[start, end)` into the query text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero-width span at `offset`
    pub fn point(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Smallest span covering both `self` and `other`
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Slice the source text covered by this span
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.start..self.end).unwrap_or("")
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Comparison operators of the filter language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// `:` case-insensitive substring
    Contains,
    /// `!:` negated substring
    NotContains,
    /// `=` exact match
    Equals,
    /// `!=`
    NotEquals,
    /// `=~` case-insensitive regex
    Matches,
    /// `!~`
    NotMatches,
    /// `#` trigram similarity
    Fuzzy,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Gte,
    /// `<=`
    Lte,
    /// `:*` field has a value
    Exists,
    /// `!:*` field is absent
    NotExists,
}

impl Operator {
    /// Every operator lexeme, longest first. The tokenizer relies on this order.
    pub const LEXEMES: [(&'static str, Operator); 13] = [
        ("!:*", Operator::NotExists),
        ("=~", Operator::Matches),
        ("!~", Operator::NotMatches),
        (":*", Operator::Exists),
        ("!:", Operator::NotContains),
        (">=", Operator::Gte),
        ("<=", Operator::Lte),
        ("!=", Operator::NotEquals),
        ("#", Operator::Fuzzy),
        ("=", Operator::Equals),
        (":", Operator::Contains),
        (">", Operator::Gt),
        ("<", Operator::Lt),
    ];

    /// Source text of the operator
    pub fn lexeme(&self) -> &'static str {
        match self {
            Self::Contains => ":",
            Self::NotContains => "!:",
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::Matches => "=~",
            Self::NotMatches => "!~",
            Self::Fuzzy => "#",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Exists => ":*",
            Self::NotExists => "!:*",
        }
    }

    /// Existence checks take no value
    pub fn is_unary(&self) -> bool {
        matches!(self, Self::Exists | Self::NotExists)
    }

    /// Ordering comparisons
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Gt | Self::Lt | Self::Gte | Self::Lte)
    }

    /// Operators whose literal is a regular expression
    pub fn is_regex(&self) -> bool {
        matches!(self, Self::Matches | Self::NotMatches)
    }

    /// Short human description, used by autocomplete
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::NotContains => "does not contain",
            Self::Equals => "equals",
            Self::NotEquals => "does not equal",
            Self::Matches => "matches regex",
            Self::NotMatches => "does not match regex",
            Self::Fuzzy => "is similar to",
            Self::Gt => "greater than",
            Self::Lt => "less than",
            Self::Gte => "greater than or equal to",
            Self::Lte => "less than or equal to",
            Self::Exists => "has a value",
            Self::NotExists => "has no value",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lexeme())
    }
}

/// A literal on the right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Literal {
    /// Quoted string, or an unquoted word that is not a number
    Text { value: String },
    /// Unquoted numeric word; `raw` keeps the source text
    Number { value: f64, raw: String },
    /// Literal of `=~` / `!~`
    Pattern { value: String },
}

impl Literal {
    /// Text as written by the user (quotes removed)
    pub fn raw(&self) -> &str {
        match self {
            Self::Text { value } | Self::Pattern { value } => value,
            Self::Number { raw, .. } => raw,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number { value, .. } => Some(*value),
            _ => None,
        }
    }
}

/// How a field-less term is matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalMode {
    /// Bare words: case-insensitive substring
    Substring,
    /// Quoted string: case-insensitive regex
    Regex,
}

/// `field OP value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub field: String,
    pub field_span: Span,
    pub op: Operator,
    /// Absent only for `:*` and `!:*`
    pub value: Option<Literal>,
    pub span: Span,
}

/// Search term without a field prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalTerm {
    pub text: String,
    pub mode: GlobalMode,
    pub span: Span,
}

/// Parsed query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum AstNode {
    /// Empty query; matches every record
    MatchAll,
    Conjunction { children: Vec<AstNode> },
    Disjunction { children: Vec<AstNode> },
    Negation { child: Box<AstNode> },
    Comparison(Comparison),
    GlobalTerm(GlobalTerm),
}

impl AstNode {
    /// Build a conjunction, collapsing a single child
    pub fn and(mut children: Vec<AstNode>) -> AstNode {
        if children.len() == 1 {
            children.remove(0)
        } else {
            AstNode::Conjunction { children }
        }
    }

    /// Build a disjunction, collapsing a single child
    pub fn or(mut children: Vec<AstNode>) -> AstNode {
        if children.len() == 1 {
            children.remove(0)
        } else {
            AstNode::Disjunction { children }
        }
    }

    pub fn not(child: AstNode) -> AstNode {
        AstNode::Negation {
            child: Box::new(child),
        }
    }

    /// Number of leaf comparisons and global terms
    pub fn leaf_count(&self) -> usize {
        match self {
            AstNode::MatchAll => 0,
            AstNode::Conjunction { children } | AstNode::Disjunction { children } => {
                children.iter().map(AstNode::leaf_count).sum()
            }
            AstNode::Negation { child } => child.leaf_count(),
            AstNode::Comparison(_) | AstNode::GlobalTerm(_) => 1,
        }
    }
}
