//! Translation options.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The root field kind an operation is exposed as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationType::Query => write!(f, "query"),
            OperationType::Mutation => write!(f, "mutation"),
            OperationType::Subscription => write!(f, "subscription"),
        }
    }
}

/// Overrides keyed by document title, then path, then lowercase HTTP method.
pub type OperationTypeOverrides = HashMap<String, HashMap<String, HashMap<String, OperationType>>>;

/// Options controlling how API documents are translated and executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Promote every build-time warning to a hard error
    pub strict: bool,

    /// Substitute a placeholder type for operations without a response schema
    /// instead of dropping them
    pub fill_empty_responses: bool,

    /// Add a `limit` argument to operations returning lists of objects
    pub add_limit_argument: bool,

    /// Name root fields after sanitized operation ids
    pub operation_id_field_names: bool,

    /// Keep the original casing of names, only stripping illegal characters
    pub simple_names: bool,

    /// Group operations that need credentials under per-scheme viewer fields
    pub viewer: bool,

    /// Base URL used for every call instead of the documents' servers
    pub base_url: Option<String>,

    /// Headers sent with every request
    pub headers: IndexMap<String, String>,

    /// Query parameters sent with every request
    pub query_params: IndexMap<String, String>,

    /// String formats that map to the ID scalar in addition to `uuid`
    pub id_formats: Vec<String>,

    /// Append "Equivalent to METHOD path" to operation descriptions
    pub equivalent_to_messages: bool,

    /// Attach request/response details to errors for non-2xx responses
    pub provide_error_extensions: bool,

    /// Nesting level at which schema compilation is aborted
    pub max_recursion_depth: usize,

    /// Force an operation to be a query, mutation or subscription
    pub operation_type_overrides: OperationTypeOverrides,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            strict: false,
            fill_empty_responses: false,
            add_limit_argument: false,
            operation_id_field_names: false,
            simple_names: false,
            viewer: true,
            base_url: None,
            headers: IndexMap::new(),
            query_params: IndexMap::new(),
            id_formats: Vec::new(),
            equivalent_to_messages: true,
            provide_error_extensions: true,
            max_recursion_depth: 50,
            operation_type_overrides: HashMap::new(),
        }
    }
}

impl Options {
    /// Look up a configured operation type override.
    pub fn operation_type_override(
        &self,
        title: &str,
        path: &str,
        method: &str,
    ) -> Option<OperationType> {
        self.operation_type_overrides
            .get(title)
            .and_then(|paths| paths.get(path))
            .and_then(|methods| methods.get(&method.to_lowercase()))
            .copied()
    }

    /// Whether a header is already supplied by the static configuration.
    pub fn has_static_header(&self, name: &str) -> bool {
        self.headers.keys().any(|h| h.eq_ignore_ascii_case(name))
    }

    /// Whether a query parameter is already supplied by the static configuration.
    pub fn has_static_query_param(&self, name: &str) -> bool {
        self.query_params.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert!(options.viewer);
        assert!(!options.strict);
        assert_eq!(options.max_recursion_depth, 50);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let options: Options = toml::from_str("strict = true\nid_formats = [\"objectid\"]").unwrap();
        assert!(options.strict);
        assert!(options.viewer);
        assert_eq!(options.id_formats, vec!["objectid".to_string()]);
    }

    #[test]
    fn test_operation_type_override() {
        let mut options = Options::default();
        options
            .operation_type_overrides
            .entry("Pets".to_string())
            .or_default()
            .entry("/pets/search".to_string())
            .or_default()
            .insert("post".to_string(), OperationType::Query);

        assert_eq!(
            options.operation_type_override("Pets", "/pets/search", "POST"),
            Some(OperationType::Query)
        );
        assert_eq!(options.operation_type_override("Pets", "/pets", "post"), None);
    }

    #[test]
    fn test_static_header_lookup_is_case_insensitive() {
        let mut options = Options::default();
        options.headers.insert("X-Api-Key".to_string(), "k".to_string());
        assert!(options.has_static_header("x-api-key"));
        assert!(!options.has_static_query_param("x-api-key"));
    }
}
