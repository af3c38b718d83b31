//! Lowering of the AST into the full-text index's native query tree

use crate::search::ast::{BoolOp, MatchOp, QueryNode};
use serde::{Deserialize, Serialize};

/// A full-text query tree in the inverted index's native combinators.
/// Also constructed directly (bypassing KQL parsing) for structural
/// lookups such as trace assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FullTextQuery {
    /// Matches every document
    All,

    /// Analyzed match against the default field set
    Match { text: String },

    /// Exact term query scoped to one field
    Term { field: String, value: String },

    /// Trailing-wildcard prefix query scoped to one field
    Prefix { field: String, value: String },

    /// Native boolean combinator, left-associative like the grammar
    Bool {
        op: BoolOp,
        clauses: Vec<FullTextQuery>,
    },
}

impl FullTextQuery {
    /// Exact-match lookup for all entries sharing one trace identifier
    pub fn trace_lookup(trace_id: &str) -> Self {
        FullTextQuery::Term {
            field: "trace_id".to_string(),
            value: trace_id.to_string(),
        }
    }
}

/// Lowers the AST for the inverted index
pub struct FullTextCompiler;

impl FullTextCompiler {
    pub fn compile(ast: &QueryNode) -> FullTextQuery {
        match ast {
            QueryNode::Term(text) if text == "*" => FullTextQuery::All,
            QueryNode::Term(text) => FullTextQuery::Match { text: text.clone() },
            QueryNode::Field { field, value, op } => match op {
                MatchOp::Exact => FullTextQuery::Term {
                    field: field.clone(),
                    value: value.clone(),
                },
                MatchOp::Prefix => FullTextQuery::Prefix {
                    field: field.clone(),
                    value: value.clone(),
                },
            },
            QueryNode::Bool { op, left, right } => FullTextQuery::Bool {
                op: *op,
                clauses: vec![Self::compile(left), Self::compile(right)],
            },
        }
    }
}
