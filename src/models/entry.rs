use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Category of a parsed AR-Server log line
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
pub enum LogType {
    #[strum(serialize = "API")]
    #[serde(rename = "API")]
    Api,
    #[strum(serialize = "SQL")]
    #[serde(rename = "SQL")]
    Sql,
    Filter,
    Escalation,
}

/// One parsed log line. Owned by the storage layer; the query engine only
/// reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier
    pub id: Uuid,

    /// Analysis job this entry belongs to
    pub job_id: Uuid,

    /// Line number within the source file
    pub line_number: u64,

    /// Timestamp parsed from the log line
    pub timestamp: DateTime<Utc>,

    /// Log line category
    pub log_type: LogType,

    /// Operation duration in milliseconds, when the line carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,

    /// Whether the logged operation succeeded
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_table: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub esc_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub esc_pool: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_encountered: Option<String>,

    /// The raw log line text
    pub raw_text: String,
}

impl LogEntry {
    /// Create an entry with only the required fields set
    pub fn new(job_id: Uuid, line_number: u64, timestamp: DateTime<Utc>, log_type: LogType) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            line_number,
            timestamp,
            log_type,
            duration_ms: None,
            success: true,
            user: None,
            form: None,
            queue: None,
            thread_id: None,
            trace_id: None,
            rpc_id: None,
            api_code: None,
            operation: None,
            request_id: None,
            sql_table: None,
            filter_name: None,
            esc_name: None,
            esc_pool: None,
            error_encountered: None,
            raw_text: String::new(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn with_form(mut self, form: impl Into<String>) -> Self {
        self.form = Some(form.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_raw_text(mut self, raw_text: impl Into<String>) -> Self {
        self.raw_text = raw_text.into();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error_encountered = Some(error.into());
        self.success = false;
        self
    }

    /// Look up a value by its schema field name
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "log_type" => Some(self.log_type.to_string()),
            "user" => self.user.clone(),
            "queue" => self.queue.clone(),
            "thread_id" => self.thread_id.clone(),
            "trace_id" => self.trace_id.clone(),
            "rpc_id" => self.rpc_id.clone(),
            "api_code" => self.api_code.clone(),
            "form" => self.form.clone(),
            "operation" => self.operation.clone(),
            "request_id" => self.request_id.clone(),
            "sql_table" => self.sql_table.clone(),
            "filter_name" => self.filter_name.clone(),
            "esc_name" => self.esc_name.clone(),
            "esc_pool" => self.esc_pool.clone(),
            "duration_ms" => self.duration_ms.map(|d| d.to_string()),
            "success" => Some(self.success.to_string()),
            "error_encountered" => self.error_encountered.clone(),
            _ => None,
        }
    }

    /// Case-insensitive match of `needle` against every indexed field,
    /// including the raw line text. `needle` must already be lowercased.
    pub fn matches_text(&self, needle: &str) -> bool {
        if self.raw_text.to_lowercase().contains(needle) {
            return true;
        }
        crate::search::SchemaRegistry::global()
            .describe()
            .iter()
            .filter_map(|spec| self.field(spec.name))
            .any(|value| value.to_lowercase().contains(needle))
    }

    /// Serialize to the per-hit field map returned in search responses
    pub fn to_field_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}
