//! Index document schema and conversion

use crate::models::LogEntry;
use tantivy::schema::*;
use tantivy::TantivyDocument;

/// Build the index schema for parsed log entries.
///
/// Field clauses need exact terms, so every schema field is indexed raw
/// (`STRING`); only the raw line and error text are tokenized (`TEXT`) for
/// free-text relevance search. The full entry travels as a stored JSON
/// payload so hits can be returned without a second store lookup.
pub fn build_entry_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    // Identity and scoping
    schema_builder.add_text_field("id", STRING | STORED);
    schema_builder.add_text_field("tenant_id", STRING);
    schema_builder.add_text_field("job_id", STRING);

    // Exact-match fields, mirroring the searchable-field registry
    schema_builder.add_text_field("log_type", STRING);
    schema_builder.add_text_field("user", STRING);
    schema_builder.add_text_field("queue", STRING);
    schema_builder.add_text_field("thread_id", STRING);
    schema_builder.add_text_field("trace_id", STRING);
    schema_builder.add_text_field("rpc_id", STRING);
    schema_builder.add_text_field("api_code", STRING);
    schema_builder.add_text_field("form", STRING);
    schema_builder.add_text_field("operation", STRING);
    schema_builder.add_text_field("request_id", STRING);
    schema_builder.add_text_field("sql_table", STRING);
    schema_builder.add_text_field("filter_name", STRING);
    schema_builder.add_text_field("esc_name", STRING);
    schema_builder.add_text_field("esc_pool", STRING);
    schema_builder.add_text_field("success", STRING);

    // Tokenized fields for free-text search
    schema_builder.add_text_field("raw_text", TEXT);
    schema_builder.add_text_field("error_encountered", TEXT);

    // Timestamp for ordering and range scans
    schema_builder.add_date_field("timestamp", INDEXED | STORED | FAST);

    // The full entry, stored only, returned verbatim in hits
    schema_builder.add_text_field("payload", STORED);

    schema_builder.build()
}

/// Convert an entry into an index document.
///
/// Returns `None` when the payload cannot be serialized; such an entry is
/// skipped rather than indexed without its stored form.
pub fn entry_to_doc(schema: &Schema, tenant_id: &str, entry: &LogEntry) -> Option<TantivyDocument> {
    let payload = serde_json::to_string(entry).ok()?;

    let mut doc = TantivyDocument::new();

    if let Ok(field) = schema.get_field("id") {
        doc.add_text(field, entry.id.to_string());
    }
    if let Ok(field) = schema.get_field("tenant_id") {
        doc.add_text(field, tenant_id);
    }
    if let Ok(field) = schema.get_field("job_id") {
        doc.add_text(field, entry.job_id.to_string());
    }

    // Every registry field present on the entry, plus the raw line
    for name in [
        "log_type",
        "user",
        "queue",
        "thread_id",
        "trace_id",
        "rpc_id",
        "api_code",
        "form",
        "operation",
        "request_id",
        "sql_table",
        "filter_name",
        "esc_name",
        "esc_pool",
        "success",
        "error_encountered",
    ] {
        if let (Ok(field), Some(value)) = (schema.get_field(name), entry.field(name)) {
            doc.add_text(field, &value);
        }
    }

    if let Ok(field) = schema.get_field("raw_text") {
        doc.add_text(field, &entry.raw_text);
    }

    if let Ok(field) = schema.get_field("timestamp") {
        doc.add_date(
            field,
            tantivy::DateTime::from_timestamp_millis(entry.timestamp.timestamp_millis()),
        );
    }

    if let Ok(field) = schema.get_field("payload") {
        doc.add_text(field, &payload);
    }

    Some(doc)
}
