//! Backend collaborator seams
//!
//! The engine never sees either backend's on-disk format: the columnar
//! store receives a `StructuredQuery` descriptor and the inverted index
//! receives a `FullTextQuery` tree. Both traits are object-safe so callers
//! can wire in whatever implementation the deployment uses.

pub mod memory;

use crate::models::LogEntry;
use crate::search::fulltext::FullTextQuery;
use crate::search::structured::StructuredQuery;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

pub use memory::MemoryStore;

/// Errors surfaced by either backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend query failed: {0}")]
    QueryFailed(String),
}

/// One page of entries plus the total match count before pagination
#[derive(Debug, Clone)]
pub struct EntryPage {
    pub entries: Vec<LogEntry>,
    pub total: u64,
}

/// A distinct value and its occurrence count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

/// One time bucket of the histogram, with per-log-type counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub counts: BTreeMap<String, u64>,
    pub total: u64,
}

/// The columnar/time-series store queried for exact filters, aggregates,
/// and time-range scans.
#[async_trait]
pub trait StructuredStore: Send + Sync {
    /// Entries and total count for one descriptor
    async fn query_entries(&self, query: &StructuredQuery) -> Result<EntryPage, BackendError>;

    /// Top-N distinct values per requested field within the query's result set
    async fn facets(
        &self,
        query: &StructuredQuery,
        fields: &[String],
        limit: usize,
    ) -> Result<BTreeMap<String, Vec<FacetCount>>, BackendError>;

    /// Per-type counts over `buckets` equal time slices of `range`
    async fn histogram(
        &self,
        query: &StructuredQuery,
        range: (DateTime<Utc>, DateTime<Utc>),
        buckets: usize,
    ) -> Result<Vec<HistogramBucket>, BackendError>;

    /// The observed [min, max] timestamp span of a job's data
    async fn time_span(
        &self,
        tenant_id: &str,
        job_id: Uuid,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, BackendError>;

    /// Prefix-matched value-frequency counts for autocomplete
    async fn value_counts(
        &self,
        tenant_id: &str,
        job_id: Uuid,
        field: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<FacetCount>, BackendError>;
}

/// One scored hit from the inverted index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullTextHit {
    pub id: String,
    pub score: f32,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Hits plus the total match count
#[derive(Debug, Clone)]
pub struct FullTextHits {
    pub hits: Vec<FullTextHit>,
    pub total: u64,
}

/// The inverted-index backend queried for free-text relevance search and
/// exact-id lookups.
#[async_trait]
pub trait FullTextIndex: Send + Sync {
    async fn search(
        &self,
        tenant_id: &str,
        job_id: Uuid,
        query: &FullTextQuery,
        limit: usize,
    ) -> Result<FullTextHits, BackendError>;
}
