use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Search execution configuration
    #[serde(default)]
    pub search: SearchSettings,

    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheSettings,

    /// Search history configuration
    #[serde(default)]
    pub history: HistorySettings,
}

impl EngineConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: AR_LOG_)
            .add_source(
                config::Environment::with_prefix("AR_LOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Default page size for interactive search
    #[serde(default = "default_interactive_page_size")]
    pub interactive_page_size: u32,

    /// Page size ceiling for interactive search
    #[serde(default = "default_interactive_max_page_size")]
    pub interactive_max_page_size: u32,

    /// Default page size for export-mode queries
    #[serde(default = "default_export_page_size")]
    pub export_page_size: u32,

    /// Page size ceiling for export-mode queries
    #[serde(default = "default_export_max_page_size")]
    pub export_max_page_size: u32,

    /// Fields faceted on every search
    #[serde(default = "default_facet_fields")]
    pub facet_fields: Vec<String>,

    /// Top-N distinct values per facet
    #[serde(default = "default_facet_limit")]
    pub facet_limit: usize,

    /// Number of time buckets in the histogram
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: usize,

    /// Deadline for the backend fan-out (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum autocomplete value suggestions
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,
}

impl SearchSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            interactive_page_size: default_interactive_page_size(),
            interactive_max_page_size: default_interactive_max_page_size(),
            export_page_size: default_export_page_size(),
            export_max_page_size: default_export_max_page_size(),
            facet_fields: default_facet_fields(),
            facet_limit: default_facet_limit(),
            histogram_buckets: default_histogram_buckets(),
            request_timeout_secs: default_request_timeout(),
            suggestion_limit: default_suggestion_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum cached responses per cache
    #[serde(default = "default_cache_entries")]
    pub max_entries: u64,

    /// TTL for interactive search results (seconds)
    #[serde(default = "default_search_ttl")]
    pub search_ttl_secs: u64,

    /// TTL for assembled trace bundles (seconds)
    #[serde(default = "default_trace_ttl")]
    pub trace_ttl_secs: u64,
}

impl CacheSettings {
    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn trace_ttl(&self) -> Duration {
        Duration::from_secs(self.trace_ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            search_ttl_secs: default_search_ttl(),
            trace_ttl_secs: default_trace_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    /// Bounded depth of the detached history queue
    #[serde(default = "default_history_queue_depth")]
    pub queue_depth: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            queue_depth: default_history_queue_depth(),
        }
    }
}

fn default_interactive_page_size() -> u32 {
    25
}

fn default_interactive_max_page_size() -> u32 {
    100
}

fn default_export_page_size() -> u32 {
    500
}

fn default_export_max_page_size() -> u32 {
    500
}

fn default_facet_fields() -> Vec<String> {
    vec![
        "log_type".to_string(),
        "user".to_string(),
        "queue".to_string(),
    ]
}

fn default_facet_limit() -> usize {
    10
}

fn default_histogram_buckets() -> usize {
    24
}

fn default_request_timeout() -> u64 {
    30
}

fn default_suggestion_limit() -> usize {
    10
}

fn default_cache_entries() -> u64 {
    10_000
}

fn default_search_ttl() -> u64 {
    300
}

fn default_trace_ttl() -> u64 {
    1800
}

fn default_history_queue_depth() -> usize {
    256
}
