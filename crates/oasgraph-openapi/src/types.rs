//! Canonical operations extracted from API documents.

use crate::definition::DefId;
use indexmap::IndexMap;
use oasgraph_core::{OperationType, Options};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Represents a parameter in an API operation.
#[derive(Debug, Clone)]
pub struct ApiParameter {
    /// Original name from the API document
    pub original_name: String,
    /// Sanitized argument name
    pub name: String,
    /// Location of the parameter
    pub location: ParameterLocation,
    /// Whether the parameter is required
    pub required: bool,
    /// Dereferenced JSON schema for the parameter
    pub schema: Value,
    /// Default value declared by the schema
    pub default: Option<Value>,
    /// Description of the parameter
    pub description: Option<String>,
    /// Definition of the argument's input type
    pub def: DefId,
}

impl ApiParameter {
    /// Parameters with a default value never need to be supplied.
    pub fn is_required_argument(&self) -> bool {
        self.required && self.default.is_none()
    }

    /// Whether the static headers or query params already supply this parameter.
    pub fn is_statically_supplied(&self, options: &Options) -> bool {
        match self.location {
            ParameterLocation::Header => options.has_static_header(&self.original_name),
            ParameterLocation::Query => options.has_static_query_param(&self.original_name),
            ParameterLocation::Path | ParameterLocation::Cookie => false,
        }
    }
}

/// Location where a parameter appears in the request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Path parameter (e.g., /users/{id})
    Path,
    /// Query parameter (e.g., ?search=value)
    Query,
    /// Header parameter (e.g., X-Custom-Header)
    Header,
    /// Cookie parameter
    Cookie,
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Cookie => write!(f, "cookie"),
        }
    }
}

/// A canonical operation: one (document, path, method) triple.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Operation id from the document, or generated from method and path
    pub operation_id: String,
    /// `GET /items/{id}`, used in messages
    pub operation_string: String,
    pub description: String,
    pub path: String,
    /// Uppercase HTTP method
    pub method: String,
    /// Request body definition
    pub payload_def: Option<DefId>,
    pub payload_content_type: Option<String>,
    pub payload_required: bool,
    /// Response definition
    pub response_def: DefId,
    /// Documented response content-type; `None` for placeholder responses
    pub response_content_type: Option<String>,
    /// Status code the response definition was taken from
    pub status_code: String,
    /// Whether the response type is a placeholder for a missing schema
    pub empty_response: bool,
    pub parameters: Vec<ApiParameter>,
    /// Names of the security schemes that can authorize this operation
    pub security_requirements: Vec<String>,
    /// Candidate base URLs, most specific first
    pub servers: Vec<String>,
    pub operation_type: OperationType,
    pub requires_viewer: bool,
    /// Index of the source document
    pub document: usize,
    pub document_title: String,
    pub tags: Vec<String>,
}

impl Operation {
    pub fn parameter(&self, name: &str) -> Option<&ApiParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameter_by_original_name(&self, original_name: &str) -> Option<&ApiParameter> {
        self.parameters
            .iter()
            .find(|p| p.original_name == original_name)
    }
}

/// How a link names its target operation.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    OperationId(String),
    /// A reference such as `#/paths/~1users~1{id}/get`, optionally prefixed
    /// by the URL of another document
    OperationRef(String),
}

/// A link declared on a response.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkDef {
    /// Link key as written in the document
    pub name: String,
    pub target: LinkTarget,
    /// Argument bindings: target parameter name → literal or runtime expression
    pub parameters: IndexMap<String, Value>,
    pub description: Option<String>,
    /// Index of the document the link was declared in
    pub document: usize,
}

/// Kind of a security scheme, as far as request signing is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum SecuritySchemeKind {
    ApiKey {
        name: String,
        location: ApiKeyLocation,
    },
    HttpBasic,
    /// Any other HTTP scheme, e.g. bearer; cannot sign requests
    Http { scheme: String },
    OpenIdConnect,
    OAuth2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

/// A security scheme found in a document.
#[derive(Debug, Clone)]
pub struct SecuritySchemeInfo {
    /// Name under `components.securitySchemes`
    pub raw_name: String,
    pub kind: SecuritySchemeKind,
    pub description: Option<String>,
    /// Credential input definition, for schemes that can sign requests
    pub credential_def: Option<DefId>,
    pub document: usize,
}

impl SecuritySchemeInfo {
    /// Whether credentials for this scheme can be injected into requests.
    pub fn is_supported(&self) -> bool {
        self.credential_def.is_some()
    }
}
