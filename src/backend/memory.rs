//! In-memory structured store
//!
//! A per-job columnar scan over parsed entries, used by tests and embedded
//! deployments. Implements the same descriptor semantics a real columnar
//! backend would: predicate evaluation, half-open time-range filtering,
//! whitelisted sorting, offset/limit pagination, facet counting, histogram
//! bucketing, and prefix value-frequency counts.

use crate::backend::{
    BackendError, EntryPage, FacetCount, HistogramBucket, StructuredStore,
};
use crate::models::LogEntry;
use crate::search::structured::{ColumnPredicate, StructuredQuery};
use crate::search::SortOrder;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

type JobKey = (String, Uuid);

/// DashMap-backed store keyed by tenant and job
#[derive(Default)]
pub struct MemoryStore {
    jobs: DashMap<JobKey, Vec<LogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append parsed entries for a job
    pub fn ingest(&self, tenant_id: &str, entries: Vec<LogEntry>) {
        for entry in entries {
            self.jobs
                .entry((tenant_id.to_string(), entry.job_id))
                .or_default()
                .push(entry);
        }
    }

    pub fn entry_count(&self, tenant_id: &str, job_id: Uuid) -> usize {
        self.jobs
            .get(&(tenant_id.to_string(), job_id))
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    fn matching_entries(&self, query: &StructuredQuery) -> Vec<LogEntry> {
        let key = (query.tenant_id.clone(), query.job_id);
        let Some(entries) = self.jobs.get(&key) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|entry| in_time_range(entry, query))
            .filter(|entry| matches(&query.predicate, entry))
            .cloned()
            .collect()
    }
}

// Inclusive lower bound, exclusive upper bound.
fn in_time_range(entry: &LogEntry, query: &StructuredQuery) -> bool {
    if let Some(from) = query.time_from {
        if entry.timestamp < from {
            return false;
        }
    }
    if let Some(to) = query.time_to {
        if entry.timestamp >= to {
            return false;
        }
    }
    true
}

fn matches(predicate: &ColumnPredicate, entry: &LogEntry) -> bool {
    match predicate {
        ColumnPredicate::All => true,
        ColumnPredicate::Text { needle } => entry.matches_text(&needle.to_lowercase()),
        ColumnPredicate::Eq { column, value } => {
            entry.field(column).as_deref() == Some(value.as_str())
        }
        ColumnPredicate::Prefix { column, value } => entry
            .field(column)
            .map(|v| v.starts_with(value.as_str()))
            .unwrap_or(false),
        ColumnPredicate::AnyOf { column, values } => entry
            .field(column)
            .map(|v| values.iter().any(|candidate| candidate == &v))
            .unwrap_or(false),
        ColumnPredicate::And(clauses) => clauses.iter().all(|clause| matches(clause, entry)),
        ColumnPredicate::Or(clauses) => clauses.iter().any(|clause| matches(clause, entry)),
    }
}

fn sort_entries(entries: &mut [LogEntry], sort_by: &str, order: SortOrder) {
    entries.sort_by(|a, b| {
        let ordering = match sort_by {
            "duration_ms" => a
                .duration_ms
                .unwrap_or(0.0)
                .partial_cmp(&b.duration_ms.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal),
            "line_number" => a.line_number.cmp(&b.line_number),
            "user" => a.user.cmp(&b.user),
            "log_type" => a.log_type.to_string().cmp(&b.log_type.to_string()),
            _ => a.timestamp.cmp(&b.timestamp),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

#[async_trait]
impl StructuredStore for MemoryStore {
    async fn query_entries(&self, query: &StructuredQuery) -> Result<EntryPage, BackendError> {
        let mut matched = self.matching_entries(query);
        let total = matched.len() as u64;
        sort_entries(&mut matched, &query.sort_by, query.sort_order);
        let entries = matched
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok(EntryPage { entries, total })
    }

    async fn facets(
        &self,
        query: &StructuredQuery,
        fields: &[String],
        limit: usize,
    ) -> Result<BTreeMap<String, Vec<FacetCount>>, BackendError> {
        let matched = self.matching_entries(query);
        let mut facets = BTreeMap::new();

        for field in fields {
            let mut counts: HashMap<String, u64> = HashMap::new();
            for entry in &matched {
                if let Some(value) = entry.field(field) {
                    *counts.entry(value).or_default() += 1;
                }
            }
            let mut ranked: Vec<FacetCount> = counts
                .into_iter()
                .map(|(value, count)| FacetCount { value, count })
                .collect();
            ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
            ranked.truncate(limit);
            facets.insert(field.clone(), ranked);
        }

        Ok(facets)
    }

    async fn histogram(
        &self,
        query: &StructuredQuery,
        range: (DateTime<Utc>, DateTime<Utc>),
        buckets: usize,
    ) -> Result<Vec<HistogramBucket>, BackendError> {
        let (start, end) = range;
        if buckets == 0 || end <= start {
            return Ok(Vec::new());
        }

        // The span is positive here (end > start), so the unsigned cast is
        // lossless.
        let span_ms = (end - start).num_milliseconds().max(buckets as i64) as u64;
        let width_ms = span_ms.div_ceil(buckets as u64) as i64;
        let mut result: Vec<HistogramBucket> = (0..buckets)
            .map(|i| {
                let bucket_start = start + Duration::milliseconds(width_ms * i as i64);
                let bucket_end = (bucket_start + Duration::milliseconds(width_ms)).min(end);
                HistogramBucket {
                    start: bucket_start,
                    end: bucket_end,
                    counts: BTreeMap::new(),
                    total: 0,
                }
            })
            .collect();

        for entry in self.matching_entries(query) {
            if entry.timestamp < start || entry.timestamp >= end {
                continue;
            }
            let offset_ms = (entry.timestamp - start).num_milliseconds();
            let index = ((offset_ms / width_ms) as usize).min(buckets - 1);
            let bucket = &mut result[index];
            *bucket.counts.entry(entry.log_type.to_string()).or_default() += 1;
            bucket.total += 1;
        }

        Ok(result)
    }

    async fn time_span(
        &self,
        tenant_id: &str,
        job_id: Uuid,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, BackendError> {
        let key = (tenant_id.to_string(), job_id);
        let Some(entries) = self.jobs.get(&key) else {
            return Ok(None);
        };
        let min = entries.iter().map(|e| e.timestamp).min();
        let max = entries.iter().map(|e| e.timestamp).max();
        Ok(min.zip(max))
    }

    async fn value_counts(
        &self,
        tenant_id: &str,
        job_id: Uuid,
        field: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<FacetCount>, BackendError> {
        let key = (tenant_id.to_string(), job_id);
        let Some(entries) = self.jobs.get(&key) else {
            return Ok(Vec::new());
        };

        let prefix = prefix.to_lowercase();
        let mut counts: HashMap<String, u64> = HashMap::new();
        for entry in entries.iter() {
            if let Some(value) = entry.field(field) {
                if value.to_lowercase().starts_with(&prefix) {
                    *counts.entry(value).or_default() += 1;
                }
            }
        }

        let mut ranked: Vec<FacetCount> = counts
            .into_iter()
            .map(|(value, count)| FacetCount { value, count })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
        ranked.truncate(limit);
        Ok(ranked)
    }
}
