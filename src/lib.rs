//! Hybrid log-search query engine for the AR-Server log analysis pipeline.
//!
//! Sits between the HTTP layer and two storage backends: a structured
//! store holding parsed log entries and an inverted index over their text.
//! Raw KQL-like query strings come in; validated descriptors go out to the
//! backends and the assembled, cached responses come back.
//!
//! ```text
//!   raw params ──► validator ──► compilers ──► executor ──► response
//!                     │                           │
//!               SchemaRegistry          StructuredStore / FullTextIndex
//! ```
//!
//! Entry points live on [`search::SearchService`]: `search()`, `trace()`
//! and `suggest()`.

pub mod backend;
pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod search;

pub use config::EngineConfig;
pub use error::{AppError, Result};
pub use models::{LogEntry, LogType};
pub use search::{RawSearchParams, SearchResult, SearchService};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing for binaries and tests. Safe to call more than once;
/// later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arlog_search=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
