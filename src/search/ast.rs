//! Query abstract syntax tree, shared by both compilers

use serde::{Deserialize, Serialize};

/// Boolean combinator. AND binds tighter than OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

/// How a `field:value` clause matches its field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOp {
    Exact,
    Prefix,
}

/// One parsed query node. Produced once per query text, immutable,
/// consumed by both compilers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryNode {
    /// Full-text match against all indexed fields
    Term(String),

    /// Match against one named field. The value is never empty; `field:`
    /// with no value is rejected by the parser.
    Field {
        field: String,
        value: String,
        op: MatchOp,
    },

    /// Left-associative boolean combination
    Bool {
        op: BoolOp,
        left: Box<QueryNode>,
        right: Box<QueryNode>,
    },
}

impl QueryNode {
    /// The wildcard match-all term an empty query normalizes to
    pub fn match_all() -> Self {
        QueryNode::Term("*".to_string())
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, QueryNode::Term(t) if t == "*")
    }

    /// Every field name referenced by a `field:value` clause, in query order
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            QueryNode::Term(_) => {}
            QueryNode::Field { field, .. } => out.push(field),
            QueryNode::Bool { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            QueryNode::Bool { op: BoolOp::Or, .. } => 1,
            QueryNode::Bool { op: BoolOp::And, .. } => 2,
            _ => 3,
        }
    }

    /// Render the node back to canonical query text. Re-parsing the result
    /// yields a structurally identical tree.
    pub fn to_canonical(&self) -> String {
        match self {
            QueryNode::Term(text) => quote_if_needed(text),
            QueryNode::Field { field, value, op } => {
                let suffix = match op {
                    MatchOp::Exact => "",
                    MatchOp::Prefix => "*",
                };
                format!("{}:{}{}", field, quote_if_needed(value), suffix)
            }
            QueryNode::Bool { op, left, right } => {
                let keyword = match op {
                    BoolOp::And => "AND",
                    BoolOp::Or => "OR",
                };
                format!(
                    "{} {} {}",
                    self.render_child(left, false),
                    keyword,
                    self.render_child(right, true)
                )
            }
        }
    }

    // Parens are required when a child binds looser than its parent, and on
    // the right side of an equal-precedence chain (the grammar is
    // left-associative).
    fn render_child(&self, child: &QueryNode, is_right: bool) -> String {
        let needs_parens = child.precedence() < self.precedence()
            || (is_right && child.precedence() == self.precedence());
        if needs_parens {
            format!("({})", child.to_canonical())
        } else {
            child.to_canonical()
        }
    }
}

fn quote_if_needed(text: &str) -> String {
    if text.is_empty() || text.contains(char::is_whitespace) || text.contains(['(', ')', ':']) {
        format!("\"{}\"", text)
    } else {
        text.to_string()
    }
}
