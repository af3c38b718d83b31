//! Tokenizer and recursive-descent parser for the KQL-like query grammar
//!
//! A query is a disjunction of conjunctions of clauses. A clause is a bare
//! term (full-text match), a quoted phrase, or `field:value`. `AND`/`OR`
//! keywords are case-insensitive, left-associative, and AND binds tighter
//! than OR; two adjacent clauses with no keyword between them are an
//! implicit AND. Parenthesized groups are accepted.

use crate::search::ast::{BoolOp, MatchOp, QueryNode};
use thiserror::Error;

/// Errors raised while parsing query text. Every variant names the
/// offending fragment and its byte position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty query")]
    Empty,

    #[error("unbalanced quote starting at position {pos}")]
    UnbalancedQuote { pos: usize },

    #[error("field '{field}' is missing a value at position {pos}")]
    EmptyValue { field: String, pos: usize },

    #[error("unexpected token '{token}' at position {pos}")]
    UnexpectedToken { token: String, pos: usize },

    #[error("expected closing parenthesis at position {pos}")]
    UnclosedGroup { pos: usize },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    And,
    Or,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => w.clone(),
            Token::Quoted(q) => format!("\"{}\"", q),
            Token::And => "AND".to_string(),
            Token::Or => "OR".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    pos: usize,
}

// Iterates over char boundaries, never raw bytes: query text is analyst
// input and routinely carries non-ASCII user names and error fragments.
fn tokenize(text: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        match c {
            '(' => tokens.push(Spanned { token: Token::LParen, pos }),
            ')' => tokens.push(Spanned { token: Token::RParen, pos }),
            '"' => {
                let content_start = pos + 1;
                let mut closing = None;
                for (i, d) in chars.by_ref() {
                    if d == '"' {
                        closing = Some(i);
                        break;
                    }
                }
                let Some(content_end) = closing else {
                    return Err(ParseError::UnbalancedQuote { pos });
                };
                tokens.push(Spanned {
                    token: Token::Quoted(text[content_start..content_end].to_string()),
                    pos,
                });
            }
            _ => {
                let mut end = text.len();
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_whitespace() || matches!(d, '(' | ')' | '"') {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                let word = &text[pos..end];
                let token = match word.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    _ => Token::Word(word.to_string()),
                };
                tokens.push(Spanned { token, pos });
            }
        }
    }

    Ok(tokens)
}

/// Parse query text into an AST
pub fn parse(text: &str) -> Result<QueryNode, ParseError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser { tokens, cursor: 0 };
    let node = parser.parse_or()?;
    if let Some(trailing) = parser.peek() {
        return Err(ParseError::UnexpectedToken {
            token: trailing.token.describe(),
            pos: trailing.pos,
        });
    }
    Ok(node)
}

struct Parser {
    tokens: Vec<Spanned>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.cursor).cloned();
        if spanned.is_some() {
            self.cursor += 1;
        }
        spanned
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek().map(|s| &s.token) == Some(token) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<QueryNode, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = QueryNode::Bool {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<QueryNode, ParseError> {
        let mut left = self.parse_clause()?;
        loop {
            let explicit = self.eat(&Token::And);
            let starts_clause = matches!(
                self.peek().map(|s| &s.token),
                Some(Token::Word(_)) | Some(Token::Quoted(_)) | Some(Token::LParen)
            );
            if !explicit && !starts_clause {
                break;
            }
            let right = self.parse_clause()?;
            left = QueryNode::Bool {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_clause(&mut self) -> Result<QueryNode, ParseError> {
        let Some(spanned) = self.advance() else {
            return Err(ParseError::UnexpectedToken {
                token: "<end of query>".to_string(),
                pos: self.tokens.last().map(|s| s.pos).unwrap_or(0),
            });
        };
        match spanned.token {
            Token::Quoted(phrase) => Ok(QueryNode::Term(phrase)),
            Token::Word(word) => self.parse_word_clause(word, spanned.pos),
            Token::LParen => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(ParseError::UnclosedGroup { pos: spanned.pos });
                }
                Ok(inner)
            }
            other => Err(ParseError::UnexpectedToken {
                token: other.describe(),
                pos: spanned.pos,
            }),
        }
    }

    fn parse_word_clause(&mut self, word: String, pos: usize) -> Result<QueryNode, ParseError> {
        let Some(colon) = word.find(':') else {
            return Ok(QueryNode::Term(word));
        };

        let field = word[..colon].to_string();
        if field.is_empty() {
            return Err(ParseError::UnexpectedToken { token: word, pos });
        }

        let rest = &word[colon + 1..];
        if rest.is_empty() {
            // A quoted value may follow the colon: `form:"User Fixes"`.
            // It must still be non-empty; `form:""` is as malformed as
            // `form:`.
            if let Some(Spanned { token: Token::Quoted(_), .. }) = self.peek() {
                if let Some(Spanned { token: Token::Quoted(value), .. }) = self.advance() {
                    if value.is_empty() {
                        return Err(ParseError::EmptyValue { field, pos });
                    }
                    return Ok(QueryNode::Field {
                        field,
                        value,
                        op: MatchOp::Exact,
                    });
                }
            }
            return Err(ParseError::EmptyValue { field, pos });
        }

        let (value, op) = match rest.strip_suffix('*') {
            Some(prefix) if !prefix.is_empty() => (prefix.to_string(), MatchOp::Prefix),
            _ => (rest.to_string(), MatchOp::Exact),
        };
        Ok(QueryNode::Field { field, value, op })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, value: &str) -> QueryNode {
        QueryNode::Field {
            field: name.to_string(),
            value: value.to_string(),
            op: MatchOp::Exact,
        }
    }

    #[test]
    fn test_bare_term() {
        assert_eq!(parse("timeout").unwrap(), QueryNode::Term("timeout".to_string()));
    }

    #[test]
    fn test_quoted_phrase_is_one_term() {
        assert_eq!(
            parse("\"connection refused\"").unwrap(),
            QueryNode::Term("connection refused".to_string())
        );
    }

    #[test]
    fn test_field_value() {
        assert_eq!(parse("user:Demo").unwrap(), field("user", "Demo"));
    }

    #[test]
    fn test_field_with_quoted_value() {
        assert_eq!(parse("form:\"User Fixes\"").unwrap(), field("form", "User Fixes"));
    }

    #[test]
    fn test_trailing_wildcard_is_prefix_match() {
        assert_eq!(
            parse("user:Dem*").unwrap(),
            QueryNode::Field {
                field: "user".to_string(),
                value: "Dem".to_string(),
                op: MatchOp::Prefix,
            }
        );
    }

    #[test]
    fn test_empty_field_value_fails() {
        let err = parse("user:").unwrap_err();
        assert_eq!(
            err,
            ParseError::EmptyValue {
                field: "user".to_string(),
                pos: 0,
            }
        );
    }

    #[test]
    fn test_empty_quoted_value_fails() {
        let err = parse("form:\"\"").unwrap_err();
        assert_eq!(
            err,
            ParseError::EmptyValue {
                field: "form".to_string(),
                pos: 0,
            }
        );
    }

    #[test]
    fn test_non_ascii_terms() {
        assert_eq!(parse("à").unwrap(), QueryNode::Term("à".to_string()));
        assert_eq!(parse("user:Zoë").unwrap(), field("user", "Zoë"));
        assert_eq!(
            parse("user:Zoë AND \"durée dépassée\"").unwrap(),
            QueryNode::Bool {
                op: BoolOp::And,
                left: Box::new(field("user", "Zoë")),
                right: Box::new(QueryNode::Term("durée dépassée".to_string())),
            }
        );
    }

    #[test]
    fn test_empty_query_fails() {
        assert_eq!(parse("").unwrap_err(), ParseError::Empty);
        assert_eq!(parse("   ").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn test_unbalanced_quote_reports_position() {
        let err = parse("user:Demo \"timeout").unwrap_err();
        assert_eq!(err, ParseError::UnbalancedQuote { pos: 10 });
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        // a OR b AND c  =>  Or(a, And(b, c))
        let node = parse("user:a OR user:b AND user:c").unwrap();
        assert_eq!(
            node,
            QueryNode::Bool {
                op: BoolOp::Or,
                left: Box::new(field("user", "a")),
                right: Box::new(QueryNode::Bool {
                    op: BoolOp::And,
                    left: Box::new(field("user", "b")),
                    right: Box::new(field("user", "c")),
                }),
            }
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            parse("user:a and user:b").unwrap(),
            parse("user:a AND user:b").unwrap()
        );
        assert_eq!(
            parse("user:a oR user:b").unwrap(),
            parse("user:a OR user:b").unwrap()
        );
    }

    #[test]
    fn test_adjacent_clauses_are_implicit_and() {
        assert_eq!(
            parse("user:Demo timeout").unwrap(),
            parse("user:Demo AND timeout").unwrap()
        );
    }

    #[test]
    fn test_left_associativity() {
        // a OR b OR c => Or(Or(a, b), c)
        let node = parse("user:a OR user:b OR user:c").unwrap();
        assert_eq!(
            node,
            QueryNode::Bool {
                op: BoolOp::Or,
                left: Box::new(QueryNode::Bool {
                    op: BoolOp::Or,
                    left: Box::new(field("user", "a")),
                    right: Box::new(field("user", "b")),
                }),
                right: Box::new(field("user", "c")),
            }
        );
    }

    #[test]
    fn test_parenthesized_group() {
        let node = parse("user:Demo AND (queue:Fast OR queue:List)").unwrap();
        assert_eq!(
            node,
            QueryNode::Bool {
                op: BoolOp::And,
                left: Box::new(field("user", "Demo")),
                right: Box::new(QueryNode::Bool {
                    op: BoolOp::Or,
                    left: Box::new(field("queue", "Fast")),
                    right: Box::new(field("queue", "List")),
                }),
            }
        );
    }

    #[test]
    fn test_unclosed_group() {
        let err = parse("(user:Demo OR timeout").unwrap_err();
        assert_eq!(err, ParseError::UnclosedGroup { pos: 0 });
    }

    #[test]
    fn test_trailing_operator_fails() {
        assert!(matches!(
            parse("user:Demo AND").unwrap_err(),
            ParseError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn test_leading_operator_fails() {
        assert!(matches!(
            parse("OR user:Demo").unwrap_err(),
            ParseError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn test_canonical_round_trip_is_idempotent() {
        let queries = [
            "timeout",
            "\"connection refused\"",
            "user:Demo",
            "user:Dem*",
            "user:Demo AND timeout",
            "user:a OR user:b AND user:c",
            "user:Demo AND (queue:Fast OR queue:List)",
            "user:a OR (user:b OR user:c)",
            "sql_table:T100 \"deadlock detected\" OR log_type:SQL",
        ];
        for query in queries {
            let first = parse(query).unwrap();
            let canonical = first.to_canonical();
            let second = parse(&canonical).unwrap();
            assert_eq!(first, second, "round trip changed structure for {query:?}");
        }
    }
}
