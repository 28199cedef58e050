use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// HTTP header name for correlation ID
pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// HTTP header name for request ID (accepted as a fallback)
pub const X_REQUEST_ID: &str = "x-request-id";

/// Correlation ID attached to each request's extensions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Use the caller's correlation ID if it sent one, otherwise mint a new one
pub fn extract_or_generate_correlation_id(headers: &HeaderMap) -> CorrelationId {
    let id = headers
        .get(X_CORRELATION_ID)
        .or_else(|| headers.get(X_REQUEST_ID))
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    CorrelationId(id)
}

/// Axum middleware that tags the request span with a correlation ID and
/// echoes it back in the `x-correlation-id` response header
pub async fn propagate_correlation_id(mut req: Request, next: Next) -> Response {
    let correlation_id = extract_or_generate_correlation_id(req.headers());
    req.extensions_mut().insert(correlation_id.clone());

    let span = tracing::info_span!("request", correlation_id = %correlation_id);
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        response.headers_mut().insert(X_CORRELATION_ID, value);
    }
    response
}
