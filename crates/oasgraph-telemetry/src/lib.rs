//! # oasgraph Telemetry
//!
//! Structured logging and OpenTelemetry tracing for the translator and the
//! REST calls its resolvers make.

mod spans;
mod tracer;

pub use spans::{RestCallSpanAttributes, trace_rest_call};
pub use tracer::{DEFAULT_FILTER, Telemetry, tracer_provider};

/// OpenTelemetry span attribute constants for REST calls.
///
/// Names follow the OpenTelemetry HTTP semantic conventions where one exists.
pub mod attributes {
    pub const HTTP_REQUEST_METHOD: &str = "http.request.method";
    pub const HTTP_RESPONSE_STATUS_CODE: &str = "http.response.status_code";
    pub const URL_FULL: &str = "url.full";

    pub const OASGRAPH_OPERATION_ID: &str = "oasgraph.operation.id";
    pub const OASGRAPH_FIELD_PATH: &str = "oasgraph.field.path";

    // System name constant
    pub const SYSTEM_NAME: &str = "oasgraph";
}
