//! Lowering of a validated query into the structured-store descriptor

use crate::search::ast::{BoolOp, MatchOp, QueryNode};
use crate::search::validate::{SearchQuery, SortOrder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A column predicate tree in the structured store's native conjunction and
/// disjunction combinators. The tree shape mirrors the AST exactly;
/// re-ordering AND/OR during lowering would change result semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnPredicate {
    /// Matches every row
    All,

    /// Full-row text match
    Text { needle: String },

    /// Column equality
    Eq { column: String, value: String },

    /// Column prefix match
    Prefix { column: String, value: String },

    /// Set membership, OR'd internally
    AnyOf { column: String, values: Vec<String> },

    And(Vec<ColumnPredicate>),
    Or(Vec<ColumnPredicate>),
}

/// Backend-agnostic structured query descriptor executed against the
/// columnar store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    pub tenant_id: String,
    pub job_id: Uuid,

    /// The free-text query string, carried for stores that log or re-rank
    pub query_text: String,

    pub predicate: ColumnPredicate,

    pub offset: u64,
    pub limit: u64,
    pub sort_by: String,
    pub sort_order: SortOrder,

    /// Inclusive lower bound on the timestamp column
    pub time_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the timestamp column
    pub time_to: Option<DateTime<Utc>>,

    /// Export mode relaxes paging limits and disables caching upstream
    pub export: bool,
}

/// Lowers a validated AST plus pagination, sort and time-range parameters
pub struct StructuredCompiler;

impl StructuredCompiler {
    pub fn compile(query: &SearchQuery) -> StructuredQuery {
        let mut clauses = Vec::new();

        let lowered = Self::lower(&query.ast);
        if lowered != ColumnPredicate::All {
            clauses.push(lowered);
        }
        for (column, values) in [
            ("log_type", &query.log_types),
            ("user", &query.users),
            ("queue", &query.queues),
        ] {
            if !values.is_empty() {
                clauses.push(ColumnPredicate::AnyOf {
                    column: column.to_string(),
                    values: values.clone(),
                });
            }
        }

        let predicate = match clauses.len() {
            0 => ColumnPredicate::All,
            1 => clauses.into_iter().next().expect("len checked"),
            _ => ColumnPredicate::And(clauses),
        };

        StructuredQuery {
            tenant_id: query.tenant_id.clone(),
            job_id: query.job_id,
            query_text: query.query_text.clone(),
            predicate,
            offset: (query.page as u64 - 1) * query.page_size as u64,
            limit: query.page_size as u64,
            sort_by: query.sort_by.clone(),
            sort_order: query.sort_order,
            time_from: query.time_from,
            time_to: query.time_to,
            export: query.export,
        }
    }

    fn lower(node: &QueryNode) -> ColumnPredicate {
        match node {
            QueryNode::Term(text) if text == "*" => ColumnPredicate::All,
            QueryNode::Term(text) => ColumnPredicate::Text {
                needle: text.clone(),
            },
            QueryNode::Field { field, value, op } => match op {
                MatchOp::Exact => ColumnPredicate::Eq {
                    column: field.clone(),
                    value: value.clone(),
                },
                MatchOp::Prefix => ColumnPredicate::Prefix {
                    column: field.clone(),
                    value: value.clone(),
                },
            },
            QueryNode::Bool { op, left, right } => {
                let clauses = vec![Self::lower(left), Self::lower(right)];
                match op {
                    BoolOp::And => ColumnPredicate::And(clauses),
                    BoolOp::Or => ColumnPredicate::Or(clauses),
                }
            }
        }
    }
}
