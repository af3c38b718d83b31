//! Top-level search service facade

use crate::backend::{FullTextIndex, StructuredStore};
use crate::config::EngineConfig;
use crate::search::autocomplete::{AutocompleteService, Suggestions};
use crate::search::cache::ResponseCache;
use crate::search::error::SearchError;
use crate::search::executor::{SearchExecutor, SearchResult};
use crate::search::history::{HistorySink, SearchHistoryRecorder};
use crate::search::trace::{TraceAssembler, TraceBundle};
use crate::search::validate::{QueryValidator, RawSearchParams, SearchQuery};
use crate::config::SearchSettings;
use std::sync::Arc;
use uuid::Uuid;

/// Wires the validator, executor, trace assembler and autocomplete service
/// behind one entry point per operation. Callers hold one of these per
/// process; everything inside is cheap to share across tasks.
pub struct SearchService {
    settings: SearchSettings,
    executor: SearchExecutor,
    traces: TraceAssembler,
    autocomplete: AutocompleteService,
}

impl SearchService {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn StructuredStore>,
        index: Arc<dyn FullTextIndex>,
        history_sink: Arc<dyn HistorySink>,
    ) -> Self {
        let history = SearchHistoryRecorder::new(history_sink, config.history.queue_depth);
        let search_cache = ResponseCache::new(config.cache.max_entries, config.cache.search_ttl());
        let trace_cache = ResponseCache::new(config.cache.max_entries, config.cache.trace_ttl());

        let settings = config.search.clone();
        let autocomplete = AutocompleteService::new(store.clone(), &settings);
        let executor = SearchExecutor::new(store, search_cache, history, config);
        let traces = TraceAssembler::new(index, trace_cache);

        Self {
            settings,
            executor,
            traces,
            autocomplete,
        }
    }

    /// Validate raw request parameters and run the full search pipeline.
    pub async fn search(
        &self,
        tenant_id: &str,
        job_id: Uuid,
        params: RawSearchParams,
    ) -> Result<SearchResult, SearchError> {
        let query = QueryValidator::new(&self.settings).validate(tenant_id, job_id, params)?;
        tracing::debug!(
            tenant = %query.tenant_id,
            job = %query.job_id,
            query = %query.query_text,
            page = query.page,
            "executing search"
        );
        self.executor.execute(&query).await
    }

    /// Validate only, returning the normalized query without executing it.
    pub fn validate(
        &self,
        tenant_id: &str,
        job_id: Uuid,
        params: RawSearchParams,
    ) -> Result<SearchQuery, SearchError> {
        QueryValidator::new(&self.settings).validate(tenant_id, job_id, params)
    }

    /// Reconstruct all entries sharing a distributed trace identifier.
    pub async fn trace(
        &self,
        tenant_id: &str,
        job_id: Uuid,
        trace_id: &str,
    ) -> Result<TraceBundle, SearchError> {
        self.traces.assemble(tenant_id, job_id, trace_id).await
    }

    /// Field-name or value suggestions for a partially typed query clause.
    pub async fn suggest(
        &self,
        tenant_id: &str,
        job_id: Uuid,
        prefix: &str,
    ) -> Result<Suggestions, SearchError> {
        self.autocomplete.suggest(tenant_id, job_id, prefix).await
    }

    /// Store an upstream-computed result so identical follow-up requests
    /// are served from cache.
    pub async fn seed_result(&self, query: &SearchQuery, result: SearchResult) {
        self.executor.seed_upstream_result(query, result).await;
    }
}
