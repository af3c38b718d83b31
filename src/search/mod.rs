//! Hybrid log-search query engine
//!
//! This module turns KQL-like query strings from analysts into validated,
//! backend-specific query descriptors and assembles the paginated, faceted
//! responses, including:
//!
//! - **Query Parsing**: field clauses, quoted phrases, AND/OR, prefix match
//! - **Validation**: schema-checked fields, clamped pagination, sort fallbacks
//! - **Dual Compilation**: structured predicates and full-text query trees
//! - **Fan-Out Execution**: concurrent entries/facets/histogram reads
//! - **Response Caching**: fingerprint-keyed TTL cache, export-aware
//! - **Trace Assembly**: exact-term trace reconstruction with duration totals
//! - **Autocomplete**: schema field discovery and value-frequency suggestions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │            SearchService API                     │
//! ├─────────────────────────────────────────────────┤
//! │  - search()        - trace()                     │
//! │  - suggest()       - validate()                  │
//! └─────────────────────────────────────────────────┘
//!          │                          │
//!          ▼                          ▼
//! ┌──────────────────────┐  ┌──────────────────────┐
//! │   Query Pipeline      │  │   Trace Assembler    │
//! ├──────────────────────┤  ├──────────────────────┤
//! │  parser → validator   │  │  exact trace_id      │
//! │  → compilers          │  │  lookup + ordering   │
//! └──────────────────────┘  └──────────────────────┘
//!          │                          │
//!          ▼                          ▼
//! ┌─────────────────────────────────────────────────┐
//! │   Executor: cache → fan-out → assemble           │
//! ├─────────────────────────────────────────────────┤
//! │  StructuredStore        FullTextIndex            │
//! │  (entries, facets,      (relevance search,       │
//! │   histogram, values)     trace lookups)          │
//! └─────────────────────────────────────────────────┘
//! ```

mod ast;
mod autocomplete;
mod cache;
mod error;
mod executor;
pub mod fulltext;
mod history;
mod parser;
mod schema;
mod service;
pub mod structured;
mod trace;
mod validate;

pub use ast::{BoolOp, MatchOp, QueryNode};
pub use autocomplete::{AutocompleteService, FieldSuggestion, Suggestions};
pub use cache::{CachedPayload, ResponseCache};
pub use error::SearchError;
pub use executor::{total_pages, SearchExecutor, SearchHit, SearchResult};
pub use fulltext::{FullTextCompiler, FullTextQuery};
pub use history::{HistoryRecord, HistorySink, MemoryHistorySink, SearchHistoryRecorder};
pub use parser::{parse, ParseError};
pub use schema::{FieldSpec, SchemaRegistry, DEFAULT_SORT_FIELD};
pub use service::SearchService;
pub use structured::{ColumnPredicate, StructuredCompiler, StructuredQuery};
pub use trace::{TraceAssembler, TraceBundle};
pub use validate::{PageProfile, QueryValidator, RawSearchParams, SearchQuery, SortOrder};
