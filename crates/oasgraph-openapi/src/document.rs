//! API document loading and reference resolution.
//!
//! Documents are kept twice: as the typed `openapiv3` model used to walk
//! paths and operations, and as the JSON value that model serializes to,
//! which is what `$ref` pointers are resolved against. Schemas are always
//! taken from the JSON form so that every schema the type builder compares
//! went through the same normalization.

use crate::error::{OpenApiError, Result};
use openapiv3::{OpenAPI, ReferenceOr};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Upper bound on `$ref` chains (a ref pointing at a ref ...).
const MAX_REFERENCE_CHAIN: usize = 32;

/// One parsed API document.
#[derive(Debug, Clone)]
pub struct Document {
    spec: OpenAPI,
    raw: Value,
}

impl Document {
    /// Load and parse an API document from a file.
    ///
    /// Supports both JSON and YAML formats.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let spec = if path.ends_with(".json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        Self::from_spec(spec)
    }

    /// Load and parse an API document from a URL.
    pub async fn from_url(url: &str) -> Result<Self> {
        let response = reqwest::get(url).await?;
        let content = response.text().await?;
        Self::from_str(&content)
    }

    /// Parse an API document from a string.
    ///
    /// Automatically detects JSON or YAML format.
    pub fn from_str(content: &str) -> Result<Self> {
        let spec = serde_json::from_str(content)
            .or_else(|_| serde_yaml::from_str(content))
            .map_err(|e| OpenApiError::ParseError(e.to_string()))?;

        Self::from_spec(spec)
    }

    /// Wrap an already parsed document.
    pub fn from_spec(spec: OpenAPI) -> Result<Self> {
        if !spec.openapi.starts_with('3') {
            return Err(OpenApiError::InvalidSpec(format!(
                "expected an OpenAPI 3 document, found version '{}'",
                spec.openapi
            )));
        }

        let raw = serde_json::to_value(&spec)?;
        debug!(
            "Loaded document '{}' with {} paths",
            spec.info.title,
            spec.paths.paths.len()
        );
        Ok(Self { spec, raw })
    }

    pub fn spec(&self) -> &OpenAPI {
        &self.spec
    }

    pub fn title(&self) -> &str {
        &self.spec.info.title
    }

    /// Look up a local `#/...` reference in the document.
    pub fn resolve_pointer(&self, reference: &str) -> Result<&Value> {
        let pointer = reference
            .strip_prefix('#')
            .ok_or_else(|| OpenApiError::UnresolvableReference(reference.to_string()))?;
        let decoded = urlencoding::decode(pointer)
            .map_err(|_| OpenApiError::UnresolvableReference(reference.to_string()))?;

        self.raw
            .pointer(&decoded)
            .ok_or_else(|| OpenApiError::UnresolvableReference(reference.to_string()))
    }

    /// Resolve a possibly referenced component into an owned value.
    pub fn resolve<T>(&self, item: &ReferenceOr<T>) -> Result<T>
    where
        T: DeserializeOwned + Clone,
    {
        match item {
            ReferenceOr::Item(value) => Ok(value.clone()),
            ReferenceOr::Reference { reference } => {
                let mut target = self.resolve_pointer(reference)?;
                for _ in 0..MAX_REFERENCE_CHAIN {
                    match target.get("$ref").and_then(Value::as_str) {
                        Some(next) => target = self.resolve_pointer(next)?,
                        None => break,
                    }
                }
                serde_json::from_value(target.clone()).map_err(|e| {
                    OpenApiError::InvalidSpec(format!("'{}' is malformed: {}", reference, e))
                })
            }
        }
    }

    /// Follow a chain of `$ref`s starting at `schema`.
    ///
    /// Returns the referenced schema and the name of the last reference
    /// followed (the final path segment, e.g. `Pet` for
    /// `#/components/schemas/Pet`).
    pub fn deref_schema(&self, schema: &Value) -> Result<(Value, Option<String>)> {
        let mut current = schema;
        let mut name = None;

        for _ in 0..MAX_REFERENCE_CHAIN {
            match current.get("$ref").and_then(Value::as_str) {
                Some(reference) => {
                    name = reference.rsplit('/').next().map(str::to_string);
                    current = self.resolve_pointer(reference)?;
                }
                None => return Ok((current.clone(), name)),
            }
        }

        Err(OpenApiError::UnresolvableReference(format!(
            "reference chain starting at {} is too long",
            schema
        )))
    }
}

/// Convert a typed `openapiv3` value into the JSON form schemas are compiled from.
pub fn to_schema_value<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
