//! Span helpers for REST calls made by resolvers

use crate::attributes::*;

/// Attributes for tracing one REST call
#[derive(Debug, Clone)]
pub struct RestCallSpanAttributes {
    pub operation_id: String,
    pub field_path: String,
    pub method: String,
    pub url: String,
    pub status_code: Option<u16>,
}

/// Create and record a span for a dispatched REST call.
///
/// The status code is recorded when the call produced a response; network
/// failures leave it empty.
pub fn trace_rest_call(attrs: RestCallSpanAttributes) {
    let span = tracing::info_span!(
        "rest_call",
        { OASGRAPH_OPERATION_ID } = %attrs.operation_id,
        { OASGRAPH_FIELD_PATH } = %attrs.field_path,
        { HTTP_REQUEST_METHOD } = %attrs.method,
        { URL_FULL } = %attrs.url,
        { HTTP_RESPONSE_STATUS_CODE } = tracing::field::Empty,
    );

    if let Some(status) = attrs.status_code {
        span.record(HTTP_RESPONSE_STATUS_CODE, status);
    }

    let _guard = span.enter();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_call_span() {
        trace_rest_call(RestCallSpanAttributes {
            operation_id: "getItem".to_string(),
            field_path: "item".to_string(),
            method: "GET".to_string(),
            url: "http://localhost/items/5".to_string(),
            status_code: Some(200),
        });
    }
}
