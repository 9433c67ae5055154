//! Per-call state threaded from parent to child resolvers.
//!
//! Nothing here is shared mutably: a resolver copies its parent's
//! [`CallContext`], adds the record of its own call and attaches the copy to
//! the value it returns.

use crate::auth::Credentials;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// What was sent and received by one REST call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallRecord {
    pub operation_id: String,
    pub url: String,
    pub method: String,
    pub status_code: u16,
    /// Original parameter name → value
    pub request_path: IndexMap<String, String>,
    pub request_query: IndexMap<String, String>,
    pub request_headers: IndexMap<String, String>,
    /// Serialized payload, with original field names
    pub request_body: Option<Value>,
    pub response_headers: IndexMap<String, String>,
    /// Parsed body with original field names; `None` for non-JSON bodies
    pub response_body: Option<Value>,
}

/// Records of prior calls keyed by field path, plus credentials collected
/// by viewer fields.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    records: HashMap<String, Arc<CallRecord>>,
    credentials: IndexMap<String, Credentials>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: &str) -> Option<&CallRecord> {
        self.records.get(path).map(Arc::as_ref)
    }

    /// Copy of this context with `record` stored under `path`.
    pub fn with_record(&self, path: impl Into<String>, record: CallRecord) -> Self {
        let mut next = self.clone();
        next.records.insert(path.into(), Arc::new(record));
        next
    }

    /// Copy of this context with credentials for a security scheme.
    pub fn with_credentials(&self, scheme: impl Into<String>, credentials: Credentials) -> Self {
        let mut next = self.clone();
        next.credentials.insert(scheme.into(), credentials);
        next
    }

    /// Credentials keyed by raw security scheme name.
    pub fn credentials(&self) -> &IndexMap<String, Credentials> {
        &self.credentials
    }
}

/// A resolved field value with the context its children resolve in.
#[derive(Debug, Clone)]
pub struct ResolvedValue {
    pub data: Value,
    pub context: CallContext,
}

impl ResolvedValue {
    pub fn new(data: Value, context: CallContext) -> Self {
        Self { data, context }
    }

    /// A child value inheriting this value's context.
    pub fn child(&self, data: Value) -> Self {
        Self {
            data,
            context: self.context.clone(),
        }
    }
}

/// Key of a field path: field names joined by `.`, list indices dropped.
pub fn path_key<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    segments.into_iter().collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_record_leaves_parent_untouched() {
        let parent = CallContext::new();
        let child = parent.with_record(
            "item",
            CallRecord {
                operation_id: "getItem".to_string(),
                ..CallRecord::default()
            },
        );

        assert!(parent.record("item").is_none());
        assert_eq!(child.record("item").unwrap().operation_id, "getItem");
    }

    #[test]
    fn test_child_inherits_context() {
        let context = CallContext::new().with_credentials(
            "apiKey",
            Credentials::ApiKey {
                key: "secret".to_string(),
            },
        );
        let value = ResolvedValue::new(json!({"a": [1]}), context);
        let child = value.child(json!(1));
        assert!(child.context.credentials().contains_key("apiKey"));
    }

    #[test]
    fn test_path_key() {
        assert_eq!(path_key(["viewerApiKey", "item", "owner"]), "viewerApiKey.item.owner");
        assert_eq!(path_key(Vec::<&str>::new()), "");
    }
}
