//! Field and value autocomplete

use crate::backend::{FacetCount, StructuredStore};
use crate::config::SearchSettings;
use crate::search::error::SearchError;
use crate::search::schema::SchemaRegistry;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// A suggested field name with its description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSuggestion {
    pub name: String,
    pub description: String,
}

/// Autocomplete output: either field-name discovery or value discovery
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Suggestions {
    Fields { suggestions: Vec<FieldSuggestion> },
    Values {
        field: String,
        suggestions: Vec<FacetCount>,
    },
}

/// Splits an input prefix into field-name or value discovery
pub struct AutocompleteService {
    schema: &'static SchemaRegistry,
    store: Arc<dyn StructuredStore>,
    limit: usize,
}

impl AutocompleteService {
    pub fn new(store: Arc<dyn StructuredStore>, settings: &SearchSettings) -> Self {
        Self {
            schema: SchemaRegistry::global(),
            store,
            limit: settings.suggestion_limit,
        }
    }

    pub async fn suggest(
        &self,
        tenant_id: &str,
        job_id: Uuid,
        prefix: &str,
    ) -> Result<Suggestions, SearchError> {
        match prefix.split_once(':') {
            // No field delimiter: field-name prefix match against the schema.
            None => {
                let suggestions = self
                    .schema
                    .fields_with_prefix(prefix.trim())
                    .into_iter()
                    .map(|spec| FieldSuggestion {
                        name: spec.name.to_string(),
                        description: spec.description.to_string(),
                    })
                    .collect();
                Ok(Suggestions::Fields { suggestions })
            }
            // `field:partial`: the field must be known, the remainder goes
            // to the backend as a bounded value-frequency query.
            Some((field, partial)) => {
                if !self.schema.is_known_field(field) {
                    return Err(SearchError::Validation(format!("unknown field: {}", field)));
                }
                let suggestions = self
                    .store
                    .value_counts(tenant_id, job_id, field, partial, self.limit)
                    .await
                    .map_err(|e| SearchError::BackendUnavailable(e.to_string()))?;
                Ok(Suggestions::Values {
                    field: field.to_string(),
                    suggestions,
                })
            }
        }
    }
}
