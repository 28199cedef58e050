use crate::error::ApiError;
use crate::state::PlateServiceState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use common::plates::{AnalyticsResponse, DetectPlateResponse};
use serde_json::json;

/// Multipart field carrying the uploaded image
const UPLOAD_FIELD: &str = "file";

/// Detect and read every license plate in an uploaded image
pub async fn detect_plate(
    State(state): State<PlateServiceState>,
    mut multipart: Multipart,
) -> Result<Json<DetectPlateResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let image = field.bytes().await?;
        let detections = state.detect_plates(filename.as_deref(), image).await?;

        return Ok(Json(DetectPlateResponse { detections }));
    }

    Err(ApiError::bad_request(format!(
        "missing '{}' field in multipart upload",
        UPLOAD_FIELD
    )))
}

/// Running plate reading statistics
pub async fn analytics(State(state): State<PlateServiceState>) -> Json<AnalyticsResponse> {
    Json(state.analytics_snapshot().await)
}

/// Health check endpoint
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "plate-service"
        })),
    )
}

/// Readiness check endpoint
pub async fn readyz(State(state): State<PlateServiceState>) -> impl IntoResponse {
    let pipeline = state.pipeline();
    let detector_ready = pipeline.detector().health_check();
    let body = Json(json!({
        "status": if detector_ready { "ready" } else { "not ready" },
        "detector": detector_ready,
        "recognizer": pipeline.has_recognizer(),
    }));

    if detector_ready {
        (StatusCode::OK, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body)
    }
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics() -> impl IntoResponse {
    match telemetry::metrics::encode_metrics() {
        Ok(body) => body.into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}
