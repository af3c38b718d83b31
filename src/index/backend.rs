//! Query-side adapter: native query trees lowered onto the index

use crate::backend::{BackendError, FullTextHit, FullTextHits, FullTextIndex};
use crate::index::IndexManager;
use crate::search::fulltext::FullTextQuery;
use crate::search::BoolOp;
use async_trait::async_trait;
use std::sync::Arc;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{
    AllQuery, BooleanQuery, EmptyQuery, Occur, Query, QueryParser, RegexQuery, TermQuery,
};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{TantivyDocument, Term};
use uuid::Uuid;

/// `FullTextIndex` implementation backed by the on-disk inverted index
pub struct TantivyIndex {
    manager: Arc<IndexManager>,
}

impl TantivyIndex {
    pub fn new(manager: Arc<IndexManager>) -> Self {
        Self { manager }
    }

    /// Lower one node of the native query tree.
    ///
    /// Unknown fields lower to a match-nothing query rather than an error:
    /// the validator guarantees fields from parsed queries, so an unknown
    /// name here means a caller-constructed lookup against data that was
    /// never indexed.
    fn lower(&self, query: &FullTextQuery) -> Box<dyn Query> {
        let schema = self.manager.schema();
        match query {
            FullTextQuery::All => Box::new(AllQuery),
            FullTextQuery::Match { text } => {
                let default_fields = ["raw_text", "error_encountered"]
                    .into_iter()
                    .filter_map(|name| schema.get_field(name).ok())
                    .collect();
                let parser = QueryParser::for_index(self.manager.index(), default_fields);
                let (parsed, _errors) = parser.parse_query_lenient(text);
                parsed
            }
            FullTextQuery::Term { field, value } => match schema.get_field(field) {
                Ok(field) => Box::new(TermQuery::new(
                    Term::from_field_text(field, value),
                    IndexRecordOption::Basic,
                )),
                Err(_) => Box::new(EmptyQuery),
            },
            FullTextQuery::Prefix { field, value } => match schema.get_field(field) {
                Ok(field) => {
                    let pattern = format!("{}.*", regex::escape(value));
                    match RegexQuery::from_pattern(&pattern, field) {
                        Ok(query) => Box::new(query),
                        Err(err) => {
                            tracing::warn!(error = %err, "prefix pattern rejected by index");
                            Box::new(EmptyQuery)
                        }
                    }
                }
                Err(_) => Box::new(EmptyQuery),
            },
            FullTextQuery::Bool { op, clauses } => {
                let occur = match op {
                    BoolOp::And => Occur::Must,
                    BoolOp::Or => Occur::Should,
                };
                let subqueries = clauses
                    .iter()
                    .map(|clause| (occur, self.lower(clause)))
                    .collect::<Vec<_>>();
                Box::new(BooleanQuery::from(subqueries))
            }
        }
    }

    /// The lowered query scoped to one tenant and job
    fn scoped(&self, tenant_id: &str, job_id: Uuid, query: &FullTextQuery) -> Box<dyn Query> {
        let schema = self.manager.schema();
        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        if let Ok(field) = schema.get_field("tenant_id") {
            subqueries.push((
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(field, tenant_id),
                    IndexRecordOption::Basic,
                )),
            ));
        }
        if let Ok(field) = schema.get_field("job_id") {
            subqueries.push((
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(field, &job_id.to_string()),
                    IndexRecordOption::Basic,
                )),
            ));
        }
        subqueries.push((Occur::Must, self.lower(query)));

        Box::new(BooleanQuery::from(subqueries))
    }

    fn doc_to_hit(&self, doc: &TantivyDocument, score: f32) -> FullTextHit {
        let schema = self.manager.schema();

        let id = schema
            .get_field("id")
            .ok()
            .and_then(|field| doc.get_first(field))
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();

        let fields = schema
            .get_field("payload")
            .ok()
            .and_then(|field| doc.get_first(field))
            .and_then(|value| value.as_str())
            .and_then(|payload| serde_json::from_str::<serde_json::Value>(payload).ok())
            .and_then(|value| match value {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();

        FullTextHit { id, score, fields }
    }
}

#[async_trait]
impl FullTextIndex for TantivyIndex {
    async fn search(
        &self,
        tenant_id: &str,
        job_id: Uuid,
        query: &FullTextQuery,
        limit: usize,
    ) -> Result<FullTextHits, BackendError> {
        if limit == 0 {
            return Ok(FullTextHits {
                hits: Vec::new(),
                total: 0,
            });
        }

        let scoped = self.scoped(tenant_id, job_id, query);
        let searcher = self.manager.reader().searcher();

        let top_docs = searcher
            .search(&*scoped, &TopDocs::with_limit(limit))
            .map_err(|e| BackendError::QueryFailed(format!("index search failed: {}", e)))?;

        let total = searcher
            .search(&*scoped, &Count)
            .map_err(|e| BackendError::QueryFailed(format!("index count failed: {}", e)))?
            as u64;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| BackendError::QueryFailed(format!("doc retrieval failed: {}", e)))?;
            hits.push(self.doc_to_hit(&doc, score));
        }

        Ok(FullTextHits { hits, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogEntry, LogType};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    async fn indexed(entries: Vec<LogEntry>) -> (TempDir, TantivyIndex) {
        let temp_dir = TempDir::new().unwrap();
        let manager = Arc::new(IndexManager::open(temp_dir.path()).unwrap());
        manager.index_entries("acme", &entries).await.unwrap();
        manager.reload().unwrap();
        (temp_dir, TantivyIndex::new(manager))
    }

    fn ts(minute: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_term_query_scoped_to_job() {
        let job_a = Uuid::new_v4();
        let job_b = Uuid::new_v4();
        let (_dir, index) = indexed(vec![
            LogEntry::new(job_a, 1, ts(0), LogType::Api).with_user("Demo"),
            LogEntry::new(job_b, 1, ts(0), LogType::Api).with_user("Demo"),
        ])
        .await;

        let query = FullTextQuery::Term {
            field: "user".to_string(),
            value: "Demo".to_string(),
        };
        let hits = index.search("acme", job_a, &query, 10).await.unwrap();
        assert_eq!(hits.total, 1);
    }

    #[tokio::test]
    async fn test_match_query_over_raw_text() {
        let job_id = Uuid::new_v4();
        let (_dir, index) = indexed(vec![
            LogEntry::new(job_id, 1, ts(0), LogType::Sql)
                .with_raw_text("SELECT blocked by deadlock"),
            LogEntry::new(job_id, 2, ts(1), LogType::Sql).with_raw_text("SELECT ok"),
        ])
        .await;

        let query = FullTextQuery::Match {
            text: "deadlock".to_string(),
        };
        let hits = index.search("acme", job_id, &query, 10).await.unwrap();
        assert_eq!(hits.total, 1);
        assert_eq!(hits.hits[0].fields["line_number"], 1);
    }

    #[tokio::test]
    async fn test_prefix_query() {
        let job_id = Uuid::new_v4();
        let (_dir, index) = indexed(vec![
            LogEntry::new(job_id, 1, ts(0), LogType::Api).with_user("Demo"),
            LogEntry::new(job_id, 2, ts(1), LogType::Api).with_user("Developer"),
            LogEntry::new(job_id, 3, ts(2), LogType::Api).with_user("Admin"),
        ])
        .await;

        let query = FullTextQuery::Prefix {
            field: "user".to_string(),
            value: "De".to_string(),
        };
        let hits = index.search("acme", job_id, &query, 10).await.unwrap();
        assert_eq!(hits.total, 2);
    }

    #[tokio::test]
    async fn test_trace_lookup_returns_payload_fields() {
        let job_id = Uuid::new_v4();
        let (_dir, index) = indexed(vec![
            LogEntry::new(job_id, 1, ts(0), LogType::Api)
                .with_trace_id("t-1")
                .with_duration(100.0),
            LogEntry::new(job_id, 2, ts(1), LogType::Sql).with_trace_id("t-2"),
        ])
        .await;

        let hits = index
            .search("acme", job_id, &FullTextQuery::trace_lookup("t-1"), 10)
            .await
            .unwrap();
        assert_eq!(hits.total, 1);
        assert_eq!(hits.hits[0].fields["duration_ms"], 100.0);
        assert_eq!(hits.hits[0].fields["trace_id"], "t-1");
    }

    #[tokio::test]
    async fn test_unknown_field_matches_nothing() {
        let job_id = Uuid::new_v4();
        let (_dir, index) =
            indexed(vec![LogEntry::new(job_id, 1, ts(0), LogType::Api)]).await;

        let query = FullTextQuery::Term {
            field: "severity".to_string(),
            value: "P0".to_string(),
        };
        let hits = index.search("acme", job_id, &query, 10).await.unwrap();
        assert_eq!(hits.total, 0);
    }

    #[tokio::test]
    async fn test_boolean_or() {
        let job_id = Uuid::new_v4();
        let (_dir, index) = indexed(vec![
            LogEntry::new(job_id, 1, ts(0), LogType::Api).with_user("Demo"),
            LogEntry::new(job_id, 2, ts(1), LogType::Api).with_user("Admin"),
            LogEntry::new(job_id, 3, ts(2), LogType::Api).with_user("Other"),
        ])
        .await;

        let query = FullTextQuery::Bool {
            op: BoolOp::Or,
            clauses: vec![
                FullTextQuery::Term {
                    field: "user".to_string(),
                    value: "Demo".to_string(),
                },
                FullTextQuery::Term {
                    field: "user".to_string(),
                    value: "Admin".to_string(),
                },
            ],
        };
        let hits = index.search("acme", job_id, &query, 10).await.unwrap();
        assert_eq!(hits.total, 2);
    }
}
