//! The fixed set of searchable fields and sort rules

use once_cell::sync::Lazy;

/// A searchable field and its human-readable description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
}

/// Default sort field when the caller's choice is absent or unknown
pub const DEFAULT_SORT_FIELD: &str = "timestamp";

const FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "log_type", description: "Log line category (API, SQL, Filter, Escalation)" },
    FieldSpec { name: "user", description: "AR user that issued the operation" },
    FieldSpec { name: "queue", description: "Server queue that handled the call" },
    FieldSpec { name: "thread_id", description: "Worker thread identifier" },
    FieldSpec { name: "trace_id", description: "Distributed trace identifier" },
    FieldSpec { name: "rpc_id", description: "RPC call identifier" },
    FieldSpec { name: "api_code", description: "AR API call code" },
    FieldSpec { name: "form", description: "Form the operation targeted" },
    FieldSpec { name: "operation", description: "Operation name" },
    FieldSpec { name: "request_id", description: "Client request identifier" },
    FieldSpec { name: "sql_table", description: "SQL table touched by the statement" },
    FieldSpec { name: "filter_name", description: "Filter that fired" },
    FieldSpec { name: "esc_name", description: "Escalation name" },
    FieldSpec { name: "esc_pool", description: "Escalation pool" },
    FieldSpec { name: "duration_ms", description: "Operation duration in milliseconds" },
    FieldSpec { name: "success", description: "Whether the operation succeeded (true/false)" },
    FieldSpec { name: "error_encountered", description: "Error text, when the line reports one" },
];

// Strict subset of columns the structured store can order by.
const SORT_FIELDS: &[&str] = &["timestamp", "duration_ms", "line_number", "user", "log_type"];

/// The fixed table of known fields, their descriptions, and sort rules.
/// Process-wide and read-only after initialization.
pub struct SchemaRegistry {
    fields: &'static [FieldSpec],
    sort_fields: &'static [&'static str],
}

static REGISTRY: Lazy<SchemaRegistry> = Lazy::new(|| SchemaRegistry {
    fields: FIELDS,
    sort_fields: SORT_FIELDS,
});

impl SchemaRegistry {
    /// The process-wide registry instance
    pub fn global() -> &'static SchemaRegistry {
        &REGISTRY
    }

    /// Whether `name` is a known filter field
    pub fn is_known_field(&self, name: &str) -> bool {
        self.fields.iter().any(|spec| spec.name == name)
    }

    /// Whether `name` may be used as a sort field
    pub fn is_valid_sort_field(&self, name: &str) -> bool {
        self.sort_fields.contains(&name)
    }

    /// The ordered list of known fields with descriptions
    pub fn describe(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Known fields whose name starts with `prefix`, case-insensitively
    pub fn fields_with_prefix(&self, prefix: &str) -> Vec<&'static FieldSpec> {
        let prefix = prefix.to_ascii_lowercase();
        self.fields
            .iter()
            .filter(|spec| spec.name.starts_with(&prefix))
            .collect()
    }
}
