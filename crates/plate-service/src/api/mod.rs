pub mod routes;

use crate::state::PlateServiceState;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Default cap on uploaded image size
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Build the API router
pub fn router(state: PlateServiceState) -> Router {
    router_with_upload_limit(state, DEFAULT_MAX_UPLOAD_BYTES)
}

/// Build the API router, rejecting request bodies over `max_upload_bytes`
pub fn router_with_upload_limit(state: PlateServiceState, max_upload_bytes: usize) -> Router {
    Router::new()
        // Health and metrics endpoints
        .route("/healthz", get(routes::healthz))
        .route("/readyz", get(routes::readyz))
        .route("/metrics", get(routes::metrics))
        // Plate endpoints
        .route("/detect-plate", post(routes::detect_plate))
        .route("/analytics", get(routes::analytics))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(telemetry::correlation::propagate_correlation_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cross-origin policy for browser clients.
///
/// An empty origin list allows any origin without credentials; otherwise only
/// the listed origins are allowed, with credentials and any method or header.
pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    if allowed_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin '{}'", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}
