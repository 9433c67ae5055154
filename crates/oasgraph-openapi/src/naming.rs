//! Sanitization of API identifiers into names legal in a GraphQL schema.
//!
//! Every generated name matches `[_A-Za-z][A-Za-z0-9_]*`. Sanitizing is
//! idempotent, and the originals of stored names can be recovered through
//! a [`NameMap`], which is how payloads are turned back into the field names
//! the REST API expects.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::warn;

/// Case convention applied by [`sanitize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStyle {
    /// Strip illegal characters, keep the original casing
    Simple,
    /// Type names, e.g. `PetOwner`
    PascalCase,
    /// Field and argument names, e.g. `petOwner`
    CamelCase,
    /// Enum values, e.g. `PET_OWNER`
    AllCaps,
}

/// Sanitize a raw identifier into a legal name in the given case style.
pub fn sanitize(raw: &str, style: CaseStyle) -> String {
    let mut sanitized = match style {
        CaseStyle::Simple => raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect(),
        CaseStyle::PascalCase => split_words(raw)
            .iter()
            .map(|w| capitalize(w))
            .collect::<String>(),
        CaseStyle::CamelCase => split_words(raw)
            .iter()
            .enumerate()
            .map(|(i, w)| {
                if i == 0 {
                    w.to_ascii_lowercase()
                } else {
                    capitalize(w)
                }
            })
            .collect::<String>(),
        CaseStyle::AllCaps => split_words(raw)
            .iter()
            .map(|w| w.to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join("_"),
    };

    if sanitized.is_empty() || sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }

    sanitized
}

/// Split an identifier into words at non-alphanumeric characters, case
/// changes, and letter/digit boundaries. `HTTPResponse2xx` becomes
/// `["HTTP", "Response", "2", "xx"]`.
fn split_words(raw: &str) -> Vec<String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(prev) = current.chars().last() {
            let next = chars.get(i + 1).copied();
            let boundary = (prev.is_ascii_digit() != c.is_ascii_digit())
                || (c.is_ascii_uppercase() && prev.is_ascii_lowercase())
                || (c.is_ascii_uppercase()
                    && prev.is_ascii_uppercase()
                    && next.is_some_and(|n| n.is_ascii_lowercase()));
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
        }
        None => String::new(),
    }
}

/// Derive a resource name from an API path, ignoring path parameters:
/// `/users/{id}/car` becomes `UsersCar`.
pub fn infer_resource_name_from_path(path: &str) -> String {
    let name: String = path
        .split('/')
        .filter(|segment| !segment.is_empty() && !segment.starts_with('{'))
        .map(|segment| sanitize(segment, CaseStyle::PascalCase))
        .map(|segment| segment.trim_start_matches('_').to_string())
        .collect();

    if name.is_empty() {
        "Root".to_string()
    } else {
        name
    }
}

/// Append-only map from sanitized names to the raw identifiers they came from.
///
/// Scoped to one translation run.
#[derive(Debug, Clone, Default)]
pub struct NameMap {
    entries: IndexMap<String, String>,
}

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitize `raw` and remember where the result came from.
    ///
    /// The first raw identifier to claim a sanitized name keeps it; a later,
    /// different claim is logged and ignored.
    pub fn sanitize_and_store(&mut self, raw: &str, style: CaseStyle) -> String {
        let sanitized = sanitize(raw, style);
        match self.entries.get(&sanitized) {
            Some(existing) if existing != raw => {
                warn!(
                    "Sanitized name '{}' of '{}' is already mapped to '{}'",
                    sanitized, raw, existing
                );
            }
            Some(_) => {}
            None => {
                self.entries.insert(sanitized.clone(), raw.to_string());
            }
        }
        sanitized
    }

    /// The raw identifier a sanitized name was first stored for.
    pub fn original(&self, sanitized: &str) -> Option<&str> {
        self.entries.get(sanitized).map(String::as_str)
    }

    /// Recursively rewrite object keys back to their stored originals.
    /// Keys without a stored original pass through unchanged.
    pub fn desanitize(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, v) in map {
                    let original = self.original(key).unwrap_or(key).to_string();
                    out.insert(original, self.desanitize(v));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.desanitize(v)).collect()),
            other => other.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLES: &[&str] = &[
        "getUserById",
        "HTTPResponse",
        "already_snake",
        "kebab-case",
        "GET /items/{id}/owner",
        "2fa-code",
        "",
        "___",
        "a2b",
        "ABc",
        "x-api-key",
        "user.name",
        "ÜberType",
        "v2Item",
    ];

    fn is_legal(name: &str) -> bool {
        let mut chars = name.chars();
        matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
            && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
    }

    #[test]
    fn test_case_styles() {
        assert_eq!(sanitize("getUserById", CaseStyle::CamelCase), "getUserById");
        assert_eq!(sanitize("HTTPResponse", CaseStyle::CamelCase), "httpResponse");
        assert_eq!(sanitize("kebab-case", CaseStyle::CamelCase), "kebabCase");
        assert_eq!(sanitize("pet owner", CaseStyle::PascalCase), "PetOwner");
        assert_eq!(sanitize("petOwner", CaseStyle::AllCaps), "PET_OWNER");
        assert_eq!(sanitize("x-api-key", CaseStyle::Simple), "xapikey");
        assert_eq!(
            sanitize("GET /items/{id}", CaseStyle::CamelCase),
            "getItemsId"
        );
    }

    #[test]
    fn test_leading_digit_and_empty() {
        assert_eq!(sanitize("2fa", CaseStyle::CamelCase), "_2Fa");
        assert_eq!(sanitize("", CaseStyle::PascalCase), "_");
        assert_eq!(sanitize("!!!", CaseStyle::AllCaps), "_");
        assert_eq!(sanitize("404", CaseStyle::AllCaps), "_404");
    }

    #[test]
    fn test_generated_names_are_legal() {
        for style in [
            CaseStyle::Simple,
            CaseStyle::PascalCase,
            CaseStyle::CamelCase,
            CaseStyle::AllCaps,
        ] {
            for raw in SAMPLES {
                let name = sanitize(raw, style);
                assert!(is_legal(&name), "{:?} produced illegal name {:?}", style, name);
            }
        }
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for style in [
            CaseStyle::Simple,
            CaseStyle::PascalCase,
            CaseStyle::CamelCase,
            CaseStyle::AllCaps,
        ] {
            for raw in SAMPLES {
                let once = sanitize(raw, style);
                assert_eq!(sanitize(&once, style), once, "{:?} on {:?}", style, raw);
            }
        }
    }

    #[test]
    fn test_desanitize_restores_stored_names() {
        let mut map = NameMap::new();
        let first = map.sanitize_and_store("first-name", CaseStyle::CamelCase);
        let nested = map.sanitize_and_store("home_address", CaseStyle::CamelCase);
        assert_eq!(first, "firstName");

        let mut payload = Map::new();
        payload.insert(first, json!("Ada"));
        payload.insert(nested, json!([{ "zip_code": "1234" }]));
        payload.insert("untouched".to_string(), json!(true));
        let payload = Value::Object(payload);
        let restored = map.desanitize(&payload);
        assert_eq!(
            restored,
            json!({
                "first-name": "Ada",
                "home_address": [{ "zip_code": "1234" }],
                "untouched": true
            })
        );
    }

    #[test]
    fn test_first_claim_wins() {
        let mut map = NameMap::new();
        map.sanitize_and_store("user-id", CaseStyle::CamelCase);
        map.sanitize_and_store("user_id", CaseStyle::CamelCase);
        assert_eq!(map.original("userId"), Some("user-id"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_infer_resource_name_from_path() {
        assert_eq!(infer_resource_name_from_path("/users/{id}/car"), "UsersCar");
        assert_eq!(infer_resource_name_from_path("/"), "Root");
        assert_eq!(infer_resource_name_from_path("/pet-store/v2"), "PetStoreV2");
    }
}
