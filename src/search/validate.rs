//! Query validation and normalization into the executable `SearchQuery`

use crate::config::SearchSettings;
use crate::search::ast::QueryNode;
use crate::search::error::SearchError;
use crate::search::parser;
use crate::search::schema::{SchemaRegistry, DEFAULT_SORT_FIELD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Which page-size defaults and ceilings apply to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageProfile {
    #[default]
    Interactive,
    Export,
}

/// Raw, untrusted request parameters as a transport layer hands them over
#[derive(Debug, Clone, Default)]
pub struct RawSearchParams {
    pub query: String,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub time_from: Option<String>,
    pub time_to: Option<String>,
    pub include_histogram: bool,
    pub profile: PageProfile,
    pub log_types: Vec<String>,
    pub users: Vec<String>,
    pub queues: Vec<String>,
}

/// The validated, normalized query state. Single source of truth for the
/// cache fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub tenant_id: String,
    pub job_id: Uuid,

    /// Normalized query text (`*` for an empty query)
    pub query_text: String,
    pub ast: QueryNode,

    pub page: u32,
    pub page_size: u32,
    pub sort_by: String,
    pub sort_order: SortOrder,

    pub time_from: Option<DateTime<Utc>>,
    pub time_to: Option<DateTime<Utc>>,

    pub include_histogram: bool,
    pub export: bool,

    pub log_types: Vec<String>,
    pub users: Vec<String>,
    pub queues: Vec<String>,
}

impl SearchQuery {
    pub fn is_match_all(&self) -> bool {
        self.ast.is_match_all()
            && self.log_types.is_empty()
            && self.users.is_empty()
            && self.queues.is_empty()
    }

    /// Deterministic hash over every field that affects output, used as the
    /// cache key suffix.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let mut write = |part: &str| {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        };
        write(&self.tenant_id);
        write(&self.job_id.to_string());
        write(&self.ast.to_canonical());
        write(&self.page.to_string());
        write(&self.page_size.to_string());
        write(&self.sort_by);
        write(self.sort_order.as_str());
        write(&self.time_from.map(|t| t.to_rfc3339()).unwrap_or_default());
        write(&self.time_to.map(|t| t.to_rfc3339()).unwrap_or_default());
        write(if self.include_histogram { "1" } else { "0" });
        for filter in [&self.log_types, &self.users, &self.queues] {
            for value in filter {
                write(value);
            }
            write(";");
        }
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Validates raw parameters against the schema and normalizes defaults
pub struct QueryValidator<'a> {
    schema: &'static SchemaRegistry,
    settings: &'a SearchSettings,
}

impl<'a> QueryValidator<'a> {
    pub fn new(settings: &'a SearchSettings) -> Self {
        Self {
            schema: SchemaRegistry::global(),
            settings,
        }
    }

    pub fn validate(
        &self,
        tenant_id: &str,
        job_id: Uuid,
        params: RawSearchParams,
    ) -> Result<SearchQuery, SearchError> {
        // An empty query is the wildcard match-all, normalized here (the
        // caller side of the parser contract).
        let trimmed = params.query.trim();
        let (query_text, ast) = if trimmed.is_empty() {
            ("*".to_string(), QueryNode::match_all())
        } else {
            (trimmed.to_string(), parser::parse(trimmed)?)
        };

        for field in ast.referenced_fields() {
            if !self.schema.is_known_field(field) {
                return Err(SearchError::Validation(format!("unknown field: {}", field)));
            }
        }

        // Out-of-range pages clamp rather than wrap; a page beyond the data
        // simply returns an empty page.
        let page = match params.page {
            Some(p) if p >= 1 => u32::try_from(p).unwrap_or(u32::MAX),
            _ => 1,
        };

        let (default_size, max_size) = match params.profile {
            PageProfile::Interactive => (
                self.settings.interactive_page_size,
                self.settings.interactive_max_page_size,
            ),
            PageProfile::Export => (
                self.settings.export_page_size,
                self.settings.export_max_page_size,
            ),
        };
        let page_size = match params.page_size {
            Some(s) if s >= 1 && s <= max_size as i64 => s as u32,
            _ => default_size,
        };

        // Sort is an optimization hint, not semantic: unknown values fall
        // back silently instead of erroring.
        let sort_by = match params.sort_by {
            Some(ref s) if self.schema.is_valid_sort_field(s) => s.clone(),
            _ => DEFAULT_SORT_FIELD.to_string(),
        };
        let sort_order = match params.sort_order.as_deref() {
            Some(s) if s.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            Some(s) if s.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            _ => SortOrder::Desc,
        };

        let time_from = params.time_from.as_deref().and_then(parse_rfc3339);
        let time_to = params.time_to.as_deref().and_then(parse_rfc3339);

        Ok(SearchQuery {
            tenant_id: tenant_id.to_string(),
            job_id,
            query_text,
            ast,
            page,
            page_size,
            sort_by,
            sort_order,
            time_from,
            time_to,
            include_histogram: params.include_histogram,
            export: params.profile == PageProfile::Export,
            log_types: normalize_filter(params.log_types),
            users: normalize_filter(params.users),
            queues: normalize_filter(params.queues),
        })
    }
}

// Bounds that fail RFC3339 parsing are treated as absent, not errors.
fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

// Sorted and deduplicated so equivalent filter sets fingerprint identically.
fn normalize_filter(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchSettings;

    fn validate(params: RawSearchParams) -> Result<SearchQuery, SearchError> {
        let settings = SearchSettings::default();
        let validator = QueryValidator::new(&settings);
        validator.validate("acme", Uuid::nil(), params)
    }

    fn params(query: &str) -> RawSearchParams {
        RawSearchParams {
            query: query.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_query_normalizes_to_wildcard() {
        let query = validate(params("")).unwrap();
        assert_eq!(query.query_text, "*");
        assert!(query.ast.is_match_all());
        assert!(query.is_match_all());
    }

    #[test]
    fn test_unknown_field_errors_with_name() {
        let err = validate(params("severity:P0")).unwrap_err();
        assert!(err.to_string().contains("unknown field: severity"));
    }

    #[test]
    fn test_syntax_error_propagates() {
        assert!(matches!(
            validate(params("user:")).unwrap_err(),
            SearchError::Syntax(_)
        ));
    }

    #[test]
    fn test_page_defaults() {
        let query = validate(RawSearchParams {
            page: Some(0),
            ..params("user:Demo")
        })
        .unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 25);
    }

    #[test]
    fn test_huge_page_clamps_instead_of_wrapping() {
        let query = validate(RawSearchParams {
            page: Some(i64::MAX),
            ..params("user:Demo")
        })
        .unwrap();
        assert_eq!(query.page, u32::MAX);

        let query = validate(RawSearchParams {
            page: Some(u32::MAX as i64 + 1),
            ..params("user:Demo")
        })
        .unwrap();
        assert_eq!(query.page, u32::MAX);
    }

    #[test]
    fn test_oversized_page_size_falls_back_to_default() {
        let query = validate(RawSearchParams {
            page_size: Some(200),
            ..params("user:Demo")
        })
        .unwrap();
        assert_eq!(query.page_size, 25);
    }

    #[test]
    fn test_export_profile_allows_larger_pages() {
        let query = validate(RawSearchParams {
            page_size: Some(400),
            profile: PageProfile::Export,
            ..params("user:Demo")
        })
        .unwrap();
        assert_eq!(query.page_size, 400);
        assert!(query.export);
    }

    #[test]
    fn test_unknown_sort_field_falls_back_silently() {
        let query = validate(RawSearchParams {
            sort_by: Some("trace_id".to_string()),
            sort_order: Some("sideways".to_string()),
            ..params("user:Demo")
        })
        .unwrap();
        assert_eq!(query.sort_by, "timestamp");
        assert_eq!(query.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_valid_sort_field_kept() {
        let query = validate(RawSearchParams {
            sort_by: Some("duration_ms".to_string()),
            sort_order: Some("ASC".to_string()),
            ..params("user:Demo")
        })
        .unwrap();
        assert_eq!(query.sort_by, "duration_ms");
        assert_eq!(query.sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_bad_time_bounds_treated_as_absent() {
        let query = validate(RawSearchParams {
            time_from: Some("yesterday".to_string()),
            time_to: Some("2024-03-01T12:00:00Z".to_string()),
            ..params("user:Demo")
        })
        .unwrap();
        assert!(query.time_from.is_none());
        assert!(query.time_to.is_some());
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let a = validate(params("user:Demo AND timeout")).unwrap();
        let b = validate(params("user:Demo AND timeout")).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = validate(RawSearchParams {
            page: Some(2),
            ..params("user:Demo AND timeout")
        })
        .unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());

        let d = validate(RawSearchParams {
            include_histogram: true,
            ..params("user:Demo AND timeout")
        })
        .unwrap();
        assert_ne!(a.fingerprint(), d.fingerprint());
    }

    #[test]
    fn test_fingerprint_ignores_filter_order() {
        let a = validate(RawSearchParams {
            users: vec!["b".to_string(), "a".to_string()],
            ..params("*")
        })
        .unwrap();
        let b = validate(RawSearchParams {
            users: vec!["a".to_string(), "b".to_string()],
            ..params("*")
        })
        .unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
