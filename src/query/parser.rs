//! Query Parser
//!
//! Recursive descent over the token stream produced by [`tokenize`].
//!
//! # Grammar
//!
//! ```text
//! query      := orExpr
//! orExpr     := andExpr (OR andExpr)*
//! andExpr    := notExpr (AND? notExpr)*
//! notExpr    := NOT notExpr | primary
//! primary    := '(' orExpr ')' | comparison | globalTerm
//! comparison := WORD OP VALUE | WORD (':*' | '!:*')
//! globalTerm := WORD+ | QUOTED_STRING
//! ```
//!
//! # Examples
//!
//! ```text
//! genre:Fiction
//! price>=10 AND (author:"Frank Herbert" OR author:Asimov)
//! NOT status:*
//! H to cu
//! ```

use crate::query::ast::{AstNode, Comparison, GlobalMode, GlobalTerm, Literal, Operator, Span};
use crate::query::error::{ParseError, QueryResult};
use crate::query::token::{tokenize, Keyword, Token, TokenKind};

/// Deepest allowed nesting of groups and `NOT`. The resolver and compiler
/// walk the tree recursively, so this also bounds their stack use.
pub const MAX_NESTING: usize = 128;

/// Parse query text into an AST
pub fn parse_query(text: &str) -> QueryResult<AstNode> {
    let tokens = tokenize(text)?;
    Ok(parse(&tokens)?)
}

/// Parse a token stream into an AST. Whitespace-only input yields
/// [`AstNode::MatchAll`].
pub fn parse(tokens: &[Token]) -> Result<AstNode, ParseError> {
    let mut parser = Parser::new(tokens);
    parser.parse_query()
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    eof: Token,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
        Self {
            tokens,
            pos: 0,
            depth: 0,
            eof: Token {
                kind: TokenKind::Eof,
                text: String::new(),
                span: Span::point(end),
                terminated: true,
            },
        }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens.get(self.pos + ahead).unwrap_or(&self.eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::UnexpectedToken {
            found: token.describe(),
            expected: expected.to_string(),
            span: token.span,
        }
    }

    fn enter(&mut self, span: Span) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::NestingTooDeep {
                limit: MAX_NESTING,
                span,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_query(&mut self) -> Result<AstNode, ParseError> {
        if self.peek().is_eof() {
            return Ok(AstNode::MatchAll);
        }

        let node = self.or_expr()?;

        if !self.peek().is_eof() {
            return Err(self.unexpected("end of input"));
        }

        Ok(node)
    }

    fn or_expr(&mut self) -> Result<AstNode, ParseError> {
        let mut children = vec![self.and_expr()?];

        while self.peek().kind == TokenKind::Keyword(Keyword::Or) {
            self.advance();
            if !self.starts_primary() {
                return Err(self.unexpected("a search term after OR"));
            }
            children.push(self.and_expr()?);
        }

        Ok(AstNode::or(children))
    }

    fn and_expr(&mut self) -> Result<AstNode, ParseError> {
        let mut children = vec![self.not_expr()?];

        loop {
            if self.peek().kind == TokenKind::Keyword(Keyword::And) {
                self.advance();
                if !self.starts_primary() {
                    return Err(self.unexpected("a search term after AND"));
                }
                children.push(self.not_expr()?);
            } else if self.starts_primary() {
                // Implicit conjunction
                children.push(self.not_expr()?);
            } else {
                break;
            }
        }

        Ok(AstNode::and(children))
    }

    fn not_expr(&mut self) -> Result<AstNode, ParseError> {
        if self.peek().kind == TokenKind::Keyword(Keyword::Not) {
            let not = self.advance();
            if !self.starts_primary() {
                return Err(self.unexpected("a search term after NOT"));
            }
            self.enter(not.span)?;
            let child = self.not_expr()?;
            self.depth -= 1;
            return Ok(AstNode::not(child));
        }

        self.primary()
    }

    fn starts_primary(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Word
                | TokenKind::QuotedString
                | TokenKind::LParen
                | TokenKind::Keyword(Keyword::Not)
        )
    }

    fn primary(&mut self) -> Result<AstNode, ParseError> {
        match self.peek().kind {
            TokenKind::LParen => self.group(),
            TokenKind::Word => {
                if matches!(self.peek_at(1).kind, TokenKind::Operator(_)) {
                    self.comparison()
                } else {
                    Ok(self.global_phrase())
                }
            }
            TokenKind::QuotedString => {
                if let TokenKind::Operator(_) = self.peek_at(1).kind {
                    self.advance();
                    return Err(self.unexpected("an unquoted field name before the operator"));
                }
                let token = self.advance();
                Ok(AstNode::GlobalTerm(GlobalTerm {
                    text: token.text,
                    mode: GlobalMode::Regex,
                    span: token.span,
                }))
            }
            TokenKind::Operator(_) => Err(self.unexpected("a field name before the operator")),
            _ => Err(self.unexpected("a search term")),
        }
    }

    fn group(&mut self) -> Result<AstNode, ParseError> {
        let open = self.advance();

        if self.peek().kind == TokenKind::RParen {
            let close = self.advance();
            return Err(ParseError::EmptyQuery {
                span: open.span.join(close.span),
            });
        }

        self.enter(open.span)?;
        let node = self.or_expr()?;
        self.depth -= 1;

        if self.peek().kind != TokenKind::RParen {
            return Err(self.unexpected("')'"));
        }
        self.advance();

        Ok(node)
    }

    /// Adjacent bare words form a single phrase
    fn global_phrase(&mut self) -> AstNode {
        let first = self.advance();
        let mut text = first.text;
        let mut span = first.span;

        while self.peek().kind == TokenKind::Word
            && !matches!(self.peek_at(1).kind, TokenKind::Operator(_))
        {
            let next = self.advance();
            text.push(' ');
            text.push_str(&next.text);
            span = span.join(next.span);
        }

        AstNode::GlobalTerm(GlobalTerm {
            text,
            mode: GlobalMode::Substring,
            span,
        })
    }

    fn comparison(&mut self) -> Result<AstNode, ParseError> {
        let field = self.advance();
        let op_token = self.advance();
        let TokenKind::Operator(op) = op_token.kind else {
            return Err(ParseError::UnexpectedToken {
                found: op_token.describe(),
                expected: "an operator".to_string(),
                span: op_token.span,
            });
        };

        if op.is_unary() {
            return Ok(AstNode::Comparison(Comparison {
                field: field.text,
                field_span: field.span,
                op,
                value: None,
                span: field.span.join(op_token.span),
            }));
        }

        let value_token = self.peek().clone();
        let (op, value) = match value_token.kind {
            TokenKind::Word if value_token.text == "*" && op == Operator::Contains => {
                (Operator::Exists, None)
            }
            TokenKind::Word if value_token.text == "*" && op == Operator::NotContains => {
                (Operator::NotExists, None)
            }
            TokenKind::Word | TokenKind::Keyword(_) => {
                (op, Some(word_literal(op, &value_token.text)))
            }
            TokenKind::QuotedString => {
                let value = if op.is_regex() {
                    Literal::Pattern {
                        value: value_token.text.clone(),
                    }
                } else {
                    Literal::Text {
                        value: value_token.text.clone(),
                    }
                };
                (op, Some(value))
            }
            _ => {
                return Err(self.unexpected(&format!("a value after '{}'", op)));
            }
        };
        self.advance();

        Ok(AstNode::Comparison(Comparison {
            field: field.text,
            field_span: field.span,
            op,
            value,
            span: field.span.join(value_token.span),
        }))
    }
}

/// Classify an unquoted value word
fn word_literal(op: Operator, word: &str) -> Literal {
    if op.is_regex() {
        return Literal::Pattern {
            value: word.to_string(),
        };
    }

    match parse_number(word) {
        Some(value) => Literal::Number {
            value,
            raw: word.to_string(),
        },
        None => Literal::Text {
            value: word.to_string(),
        },
    }
}

/// Decimal numbers only; rejects `inf`, `NaN` and friends that `f64` accepts
pub(crate) fn parse_number(word: &str) -> Option<f64> {
    if !word.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    if !word
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
    {
        return None;
    }
    word.parse::<f64>().ok().filter(|v| v.is_finite())
}
