//! Trace reconstruction from the full-text index

use crate::backend::{FullTextHit, FullTextIndex};
use crate::search::cache::ResponseCache;
use crate::search::error::SearchError;
use crate::search::fulltext::FullTextQuery;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

// An AR trace rarely exceeds a few hundred entries; this bound only guards
// against pathological ids.
const MAX_TRACE_ENTRIES: usize = 10_000;

/// The ordered set of log entries sharing one distributed trace identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceBundle {
    pub trace_id: String,
    pub entries: Vec<FullTextHit>,
    pub entry_count: usize,
    pub total_duration_ms: f64,
}

/// Assembles trace bundles via exact-term lookups, bypassing KQL parsing
pub struct TraceAssembler {
    index: Arc<dyn FullTextIndex>,
    cache: ResponseCache,
}

impl TraceAssembler {
    pub fn new(index: Arc<dyn FullTextIndex>, cache: ResponseCache) -> Self {
        Self { index, cache }
    }

    pub async fn assemble(
        &self,
        tenant_id: &str,
        job_id: Uuid,
        trace_id: &str,
    ) -> Result<TraceBundle, SearchError> {
        if trace_id.trim().is_empty() {
            return Err(SearchError::Validation("empty trace id".to_string()));
        }

        let key = ResponseCache::trace_key(tenant_id, job_id, trace_id);
        if let Some(bundle) = self.cache.get::<TraceBundle>(&key).await {
            return Ok(bundle);
        }

        let query = FullTextQuery::trace_lookup(trace_id);
        let hits = self
            .index
            .search(tenant_id, job_id, &query, MAX_TRACE_ENTRIES)
            .await
            .map_err(|e| SearchError::BackendUnavailable(e.to_string()))?;

        let mut entries = hits.hits;
        entries.sort_by_key(|hit| hit_timestamp(hit));

        // Only numeric durations are summed; entries lacking one contribute
        // zero. The schema guarantees duration is numeric where present, so
        // nothing is silently lost.
        let total_duration_ms = entries
            .iter()
            .filter_map(|hit| hit.fields.get("duration_ms"))
            .filter_map(|value| value.as_f64())
            .sum();

        let bundle = TraceBundle {
            trace_id: trace_id.to_string(),
            entry_count: entries.len(),
            entries,
            total_duration_ms,
        };

        self.cache.put(key, &bundle).await;
        Ok(bundle)
    }
}

fn hit_timestamp(hit: &FullTextHit) -> DateTime<Utc> {
    hit.fields
        .get("timestamp")
        .and_then(|value| value.as_str())
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
