//! Search orchestration: cache, backend fan-out, response assembly

use crate::backend::{EntryPage, FacetCount, HistogramBucket, StructuredStore};
use crate::config::EngineConfig;
use crate::search::cache::{CachedPayload, ResponseCache};
use crate::search::error::SearchError;
use crate::search::history::{HistoryRecord, SearchHistoryRecorder};
use crate::search::structured::{StructuredCompiler, StructuredQuery};
use crate::search::validate::SearchQuery;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// One entry projection in a search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,

    /// Relevance score; structured-store hits carry a constant score
    pub score: f32,

    /// The entry's field map
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// The assembled search response, serialized as the wire-level JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "results")]
    pub hits: Vec<SearchHit>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
    pub facets: BTreeMap<String, Vec<FacetCount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram: Option<Vec<HistogramBucket>>,
    pub took_ms: u64,
}

/// `ceil(total / page_size)`, with 0 results producing 0 pages, not 1
pub fn total_pages(total: u64, page_size: u32) -> u64 {
    if total == 0 || page_size == 0 {
        0
    } else {
        total.div_ceil(page_size as u64)
    }
}

/// Orchestrates a validated query: cache lookup, concurrent backend
/// execution, assembly, best-effort cache write and history recording.
pub struct SearchExecutor {
    store: Arc<dyn StructuredStore>,
    cache: ResponseCache,
    history: SearchHistoryRecorder,
    config: EngineConfig,
}

impl SearchExecutor {
    pub fn new(
        store: Arc<dyn StructuredStore>,
        cache: ResponseCache,
        history: SearchHistoryRecorder,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            cache,
            history,
            config,
        }
    }

    pub async fn execute(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        let started = Instant::now();
        let key = ResponseCache::search_key(&query.tenant_id, query.job_id, &query.fingerprint());

        // Export mode bypasses the cache on both read and write.
        if !query.export {
            if let Some(payload) = self.cache.get::<CachedPayload>(&key).await {
                tracing::debug!(key = %key, "search cache hit");
                return Ok(payload.into_result());
            }
            tracing::debug!(key = %key, "search cache miss");
        }

        let descriptor = StructuredCompiler::compile(query);

        let (page, facets, histogram) = tokio::time::timeout(
            self.config.search.request_timeout(),
            self.fan_out(&descriptor, query),
        )
        .await
        .map_err(|_| SearchError::BackendUnavailable("backend query timed out".to_string()))??;

        let hits = page
            .entries
            .iter()
            .map(|entry| SearchHit {
                id: entry.id.to_string(),
                score: 1.0,
                fields: entry.to_field_map(),
            })
            .collect();

        let result = SearchResult {
            hits,
            total: page.total,
            page: query.page,
            page_size: query.page_size,
            total_pages: total_pages(page.total, query.page_size),
            facets,
            histogram,
            took_ms: started.elapsed().as_millis() as u64,
        };

        if !query.export {
            let payload = CachedPayload::Computed {
                result: result.clone(),
            };
            self.cache.put(key, &payload).await;
        }

        // Fire-and-forget, skipped for the wildcard match-all query to
        // avoid recording noise.
        if !query.is_match_all() {
            self.history.record(HistoryRecord {
                tenant_id: query.tenant_id.clone(),
                job_id: query.job_id,
                query_text: query.query_text.clone(),
                recorded_at: Utc::now(),
            });
        }

        Ok(result)
    }

    /// The three independent backend reads, issued concurrently and joined
    /// before assembly. Only the entries query is fatal; facet and
    /// histogram failures degrade to empty sections.
    async fn fan_out(
        &self,
        descriptor: &StructuredQuery,
        query: &SearchQuery,
    ) -> Result<
        (
            EntryPage,
            BTreeMap<String, Vec<FacetCount>>,
            Option<Vec<HistogramBucket>>,
        ),
        SearchError,
    > {
        let entries_fut = self.store.query_entries(descriptor);
        let facets_fut = self.store.facets(
            descriptor,
            &self.config.search.facet_fields,
            self.config.search.facet_limit,
        );
        let histogram_fut = self.histogram(descriptor, query);

        let (entries, facets, histogram) = tokio::join!(entries_fut, facets_fut, histogram_fut);

        let page = entries.map_err(|e| SearchError::BackendUnavailable(e.to_string()))?;
        let facets = match facets {
            Ok(facets) => facets,
            Err(err) => {
                tracing::warn!(error = %err, "facet query failed, returning empty facets");
                BTreeMap::new()
            }
        };

        Ok((page, facets, histogram))
    }

    async fn histogram(
        &self,
        descriptor: &StructuredQuery,
        query: &SearchQuery,
    ) -> Option<Vec<HistogramBucket>> {
        if !query.include_histogram {
            return None;
        }

        let range = match self.histogram_range(query).await? {
            range if range.1 > range.0 => range,
            _ => return None,
        };

        match self
            .store
            .histogram(descriptor, range, self.config.search.histogram_buckets)
            .await
        {
            Ok(buckets) => Some(buckets),
            Err(err) => {
                tracing::warn!(error = %err, "histogram query failed, omitting histogram");
                None
            }
        }
    }

    /// Explicit bounds win; missing bounds default to the data's own
    /// observed span, never the wall clock, since log data is historical.
    async fn histogram_range(
        &self,
        query: &SearchQuery,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        if let (Some(from), Some(to)) = (query.time_from, query.time_to) {
            return Some((from, to));
        }

        let span = match self.store.time_span(&query.tenant_id, query.job_id).await {
            Ok(span) => span?,
            Err(err) => {
                tracing::warn!(error = %err, "time span query failed, omitting histogram");
                return None;
            }
        };
        let (observed_min, observed_max) = span;
        let from = query.time_from.unwrap_or(observed_min);
        // The observed maximum must land inside the final (half-open) bucket.
        let to = query
            .time_to
            .unwrap_or(observed_max + Duration::milliseconds(1));
        Some((from, to))
    }

    /// Store a precomputed upstream result under the query's cache key, so
    /// subsequent identical requests are served without backend calls.
    pub async fn seed_upstream_result(&self, query: &SearchQuery, result: SearchResult) {
        let key = ResponseCache::search_key(&query.tenant_id, query.job_id, &query.fingerprint());
        self.cache.put(key, &CachedPayload::Upstream { result }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MemoryStore};
    use crate::config::EngineConfig;
    use crate::models::{LogEntry, LogType};
    use crate::search::history::MemoryHistorySink;
    use crate::search::structured::StructuredQuery;
    use crate::search::validate::{QueryValidator, RawSearchParams};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;
    use uuid::Uuid;

    #[test]
    fn test_total_pages_property() {
        assert_eq!(total_pages(0, 25), 0);
        assert_eq!(total_pages(1, 25), 1);
        assert_eq!(total_pages(25, 25), 1);
        assert_eq!(total_pages(26, 25), 2);
        assert_eq!(total_pages(100, 25), 4);
        assert_eq!(total_pages(101, 25), 5);
    }

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    fn seeded_store(job_id: Uuid) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.ingest(
            "acme",
            vec![
                LogEntry::new(job_id, 1, ts(0), LogType::Api)
                    .with_user("Demo")
                    .with_duration(100.0),
                LogEntry::new(job_id, 2, ts(30), LogType::Sql).with_user("Demo"),
                LogEntry::new(job_id, 3, ts(59), LogType::Api).with_user("Admin"),
            ],
        );
        store
    }

    struct Harness {
        executor: SearchExecutor,
        sink: Arc<MemoryHistorySink>,
        job_id: Uuid,
    }

    fn harness_with_store(store: Arc<dyn StructuredStore>, job_id: Uuid) -> Harness {
        let config = EngineConfig::default();
        let sink = Arc::new(MemoryHistorySink::new(32));
        let history = SearchHistoryRecorder::new(sink.clone(), 32);
        let cache = ResponseCache::new(100, StdDuration::from_secs(60));
        Harness {
            executor: SearchExecutor::new(store, cache, history, config),
            sink,
            job_id,
        }
    }

    fn harness(job_id: Uuid) -> Harness {
        harness_with_store(seeded_store(job_id), job_id)
    }

    fn validated(job_id: Uuid, params: RawSearchParams) -> SearchQuery {
        let settings = crate::config::SearchSettings::default();
        QueryValidator::new(&settings)
            .validate("acme", job_id, params)
            .unwrap()
    }

    fn params(query: &str) -> RawSearchParams {
        RawSearchParams {
            query: query.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_basic_execution() {
        let job_id = Uuid::new_v4();
        let h = harness(job_id);
        let query = validated(job_id, params("user:Demo"));

        let result = h.executor.execute(&query).await.unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.total_pages, 1);
        assert_eq!(result.hits.len(), 2);
        assert_eq!(result.hits[0].fields["user"], "Demo");
        assert!(result.facets.contains_key("log_type"));
        assert!(result.histogram.is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_returns_identical_payload() {
        let job_id = Uuid::new_v4();
        let h = harness(job_id);
        let query = validated(job_id, params("user:Demo"));

        let first = h.executor.execute(&query).await.unwrap();
        let second = h.executor.execute(&query).await.unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_export_bypasses_cache() {
        let job_id = Uuid::new_v4();
        let h = harness(job_id);
        let query = validated(
            job_id,
            RawSearchParams {
                profile: crate::search::validate::PageProfile::Export,
                ..params("user:Demo")
            },
        );

        h.executor.execute(&query).await.unwrap();
        assert_eq!(h.executor.cache.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_histogram_defaults_to_observed_span() {
        let job_id = Uuid::new_v4();
        let h = harness(job_id);
        let query = validated(
            job_id,
            RawSearchParams {
                include_histogram: true,
                ..params("")
            },
        );

        let result = h.executor.execute(&query).await.unwrap();
        let buckets = result.histogram.unwrap();
        assert!(!buckets.is_empty());
        // Buckets stay strictly within the data's own span, never the wall
        // clock of the request.
        assert_eq!(buckets.first().unwrap().start, ts(0));
        assert!(buckets.last().unwrap().end <= ts(59) + Duration::milliseconds(1));
        let total: u64 = buckets.iter().map(|b| b.total).sum();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_history_recorded_but_not_for_wildcard() {
        let job_id = Uuid::new_v4();
        let h = harness(job_id);

        h.executor
            .execute(&validated(job_id, params("")))
            .await
            .unwrap();
        h.executor
            .execute(&validated(job_id, params("user:Demo")))
            .await
            .unwrap();

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        let records = h.sink.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].query_text, "user:Demo");
    }

    #[tokio::test]
    async fn test_seeded_upstream_result_short_circuits() {
        let job_id = Uuid::new_v4();
        let h = harness(job_id);
        let query = validated(job_id, params("user:Demo"));

        let canned = SearchResult {
            hits: Vec::new(),
            total: 99,
            page: 1,
            page_size: 25,
            total_pages: 4,
            facets: BTreeMap::new(),
            histogram: None,
            took_ms: 1,
        };
        h.executor.seed_upstream_result(&query, canned).await;

        let result = h.executor.execute(&query).await.unwrap();
        assert_eq!(result.total, 99);
    }

    /// Store double whose secondary queries fail
    struct DegradedStore {
        inner: Arc<MemoryStore>,
        fail_facets: bool,
        fail_histogram: bool,
        fail_entries: bool,
    }

    #[async_trait]
    impl StructuredStore for DegradedStore {
        async fn query_entries(&self, query: &StructuredQuery) -> Result<EntryPage, BackendError> {
            if self.fail_entries {
                return Err(BackendError::Unavailable("entries down".to_string()));
            }
            self.inner.query_entries(query).await
        }

        async fn facets(
            &self,
            query: &StructuredQuery,
            fields: &[String],
            limit: usize,
        ) -> Result<BTreeMap<String, Vec<FacetCount>>, BackendError> {
            if self.fail_facets {
                return Err(BackendError::QueryFailed("facets down".to_string()));
            }
            self.inner.facets(query, fields, limit).await
        }

        async fn histogram(
            &self,
            query: &StructuredQuery,
            range: (DateTime<Utc>, DateTime<Utc>),
            buckets: usize,
        ) -> Result<Vec<HistogramBucket>, BackendError> {
            if self.fail_histogram {
                return Err(BackendError::QueryFailed("histogram down".to_string()));
            }
            self.inner.histogram(query, range, buckets).await
        }

        async fn time_span(
            &self,
            tenant_id: &str,
            job_id: Uuid,
        ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, BackendError> {
            self.inner.time_span(tenant_id, job_id).await
        }

        async fn value_counts(
            &self,
            tenant_id: &str,
            job_id: Uuid,
            field: &str,
            prefix: &str,
            limit: usize,
        ) -> Result<Vec<FacetCount>, BackendError> {
            self.inner
                .value_counts(tenant_id, job_id, field, prefix, limit)
                .await
        }
    }

    #[tokio::test]
    async fn test_facet_failure_degrades_to_empty_map() {
        let job_id = Uuid::new_v4();
        let store = Arc::new(DegradedStore {
            inner: seeded_store(job_id),
            fail_facets: true,
            fail_histogram: false,
            fail_entries: false,
        });
        let h = harness_with_store(store, job_id);

        let result = h
            .executor
            .execute(&validated(job_id, params("user:Demo")))
            .await
            .unwrap();
        assert_eq!(result.total, 2);
        assert!(result.facets.is_empty());
    }

    #[tokio::test]
    async fn test_histogram_failure_omits_section() {
        let job_id = Uuid::new_v4();
        let store = Arc::new(DegradedStore {
            inner: seeded_store(job_id),
            fail_facets: false,
            fail_histogram: true,
            fail_entries: false,
        });
        let h = harness_with_store(store, job_id);

        let result = h
            .executor
            .execute(&validated(
                job_id,
                RawSearchParams {
                    include_histogram: true,
                    ..params("user:Demo")
                },
            ))
            .await
            .unwrap();
        assert_eq!(result.total, 2);
        assert!(result.histogram.is_none());
        assert!(!result.facets.is_empty());
    }

    #[tokio::test]
    async fn test_entries_failure_is_fatal() {
        let job_id = Uuid::new_v4();
        let store = Arc::new(DegradedStore {
            inner: seeded_store(job_id),
            fail_facets: false,
            fail_histogram: false,
            fail_entries: true,
        });
        let h = harness_with_store(store, job_id);

        let err = h
            .executor
            .execute(&validated(job_id, params("user:Demo")))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_zero_results_zero_pages() {
        let job_id = Uuid::new_v4();
        let h = harness(job_id);
        let result = h
            .executor
            .execute(&validated(job_id, params("user:Nobody")))
            .await
            .unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(result.total_pages, 0);
        assert!(result.hits.is_empty());
    }
}
