//! Error types for OpenAPI translation and execution.

use serde_json::Value;
use thiserror::Error;

/// Result type for OpenAPI operations.
pub type Result<T> = std::result::Result<T, OpenApiError>;

/// Request and response details attached to a failed call.
#[derive(Debug, Clone)]
pub struct HttpErrorDetails {
    pub method: String,
    pub path: String,
    pub url: String,
    pub status_code: u16,
    pub status_text: String,
    pub response_headers: Value,
    /// Parsed JSON body when possible, raw text otherwise
    pub response_body: Value,
}

/// Errors that can occur while translating API documents or executing calls.
#[derive(Error, Debug)]
pub enum OpenApiError {
    /// API document parsing error
    #[error("Failed to parse API document: {0}")]
    ParseError(String),

    /// Invalid API document
    #[error("Invalid API document: {0}")]
    InvalidSpec(String),

    /// A `$ref` that points nowhere
    #[error("Could not resolve reference '{0}'")]
    UnresolvableReference(String),

    /// Schema nesting exceeded the recursion budget
    #[error("Schema nesting exceeded {limit} levels while compiling '{name}'")]
    RecursionLimit { name: String, limit: usize },

    /// A warning promoted to an error in strict mode
    #[error("Strict mode: {0}")]
    Strict(String),

    /// The outbound schema could not be assembled
    #[error("Failed to assemble schema: {0}")]
    SchemaError(String),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("Could not invoke operation {operation}: {status_code} {status_text}")]
    HttpStatus {
        operation: String,
        status_code: u16,
        status_text: String,
        details: Option<Box<HttpErrorDetails>>,
    },

    /// 2xx response without a content-type header
    #[error("Operation {0} returned a response without a content-type")]
    MissingContentType(String),

    /// Content-type does not match the documented one
    #[error("Operation {operation} should have a content-type '{expected}' but has '{actual}' instead")]
    ContentTypeMismatch {
        operation: String,
        expected: String,
        actual: String,
    },

    /// Response body declared as JSON failed to parse
    #[error("Cannot parse JSON response of operation {operation}: {source}")]
    ResponseParse {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// No credentials for any security requirement of the operation
    #[error("Operation {operation} requires one of the security schemes [{schemes}] but no credentials were provided")]
    MissingCredentials { operation: String, schemes: String },

    /// Security scheme that cannot sign requests
    #[error("Unsupported authentication: {0}")]
    UnsupportedAuth(String),

    /// Invalid runtime expression in a link
    #[error("Invalid runtime expression '{0}'")]
    RuntimeExpression(String),

    /// Invalid `limit` argument
    #[error("Auto-generated 'limit' argument must be greater than or equal to 0, got {0}")]
    NegativeLimit(i64),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing required parameter
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// Operation not found
    #[error("Operation '{0}' not found in API documents")]
    OperationNotFound(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl OpenApiError {
    /// Diagnostics for a failed call, when they were collected.
    pub fn http_details(&self) -> Option<&HttpErrorDetails> {
        match self {
            OpenApiError::HttpStatus { details, .. } => details.as_deref(),
            _ => None,
        }
    }
}
