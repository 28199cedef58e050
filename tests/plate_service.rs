/// Integration tests for the plate service HTTP API
use anyhow::{anyhow, Result};
use axum::http::{HeaderName, HeaderValue};
use axum_test::{
    multipart::{MultipartForm, Part},
    TestServer,
};
use common::plates::{AnalyticsResponse, DetectPlateResponse, NO_PLATE_YET, UNREADABLE_PLATE};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use plate_service::{
    api, PlateDetector, PlatePipeline, PlateRecognizer, PlateServiceState, Recognition, Region,
};
use std::io::Cursor;
use std::sync::Arc;

/// Detector that reports the same regions for every image
struct StubDetector {
    regions: Vec<Region>,
}

impl PlateDetector for StubDetector {
    fn id(&self) -> &'static str {
        "stub_detector"
    }

    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Region>> {
        Ok(self.regions.clone())
    }
}

struct BrokenDetector;

impl PlateDetector for BrokenDetector {
    fn id(&self) -> &'static str {
        "broken_detector"
    }

    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Region>> {
        Err(anyhow!("inference session crashed"))
    }

    fn health_check(&self) -> bool {
        false
    }
}

/// Recognizer that reads a plate by the width of its crop
struct WidthRecognizer {
    readings: Vec<(u32, Recognition)>,
}

impl PlateRecognizer for WidthRecognizer {
    fn id(&self) -> &'static str {
        "width_recognizer"
    }

    fn recognize(&self, plate: &GrayImage) -> Result<Recognition> {
        self.readings
            .iter()
            .find(|(width, _)| *width == plate.width())
            .map(|(_, recognition)| recognition.clone())
            .ok_or_else(|| anyhow!("no reading for crop width {}", plate.width()))
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn upload(bytes: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(bytes).file_name("car.png").mime_type("image/png"),
    )
}

fn three_plate_server() -> TestServer {
    three_plate_service().1
}

/// Three plates of widths 40, 50 and 60; the middle one is unreadable
fn three_plate_service() -> (PlateServiceState, TestServer) {
    let detector = StubDetector {
        regions: vec![
            Region::new(10, 10, 50, 30, 0.9),
            Region::new(100, 10, 150, 30, 0.8),
            Region::new(10, 100, 70, 120, 0.7),
        ],
    };
    let recognizer = WidthRecognizer {
        readings: vec![
            (40, Recognition::Text("ABC123".to_string())),
            (50, Recognition::Nothing),
            (60, Recognition::Candidates(vec!["XYZ999".to_string(), "XYZ990".to_string()])),
        ],
    };
    let recognizer: Arc<dyn PlateRecognizer> = Arc::new(recognizer);
    let state = PlateServiceState::new(PlatePipeline::new(Arc::new(detector), Some(recognizer)));
    let server = TestServer::new(api::router(state.clone())).unwrap();
    (state, server)
}

fn server_with(
    detector: Arc<dyn PlateDetector>,
    recognizer: Option<Arc<dyn PlateRecognizer>>,
) -> TestServer {
    let state = PlateServiceState::new(PlatePipeline::new(detector, recognizer));
    TestServer::new(api::router(state)).unwrap()
}

async fn analytics(server: &TestServer) -> AnalyticsResponse {
    let response = server.get("/analytics").await;
    assert_eq!(response.status_code(), 200);
    response.json()
}

#[tokio::test]
async fn test_analytics_starts_empty() {
    let server = three_plate_server();

    let stats = analytics(&server).await;
    assert_eq!(stats.total_images, 0);
    assert_eq!(stats.successful_plates, 0);
    assert_eq!(stats.accuracy, 0.0);
    assert_eq!(stats.last_plate, NO_PLATE_YET);
}

#[tokio::test]
async fn test_detect_plate_reports_regions_in_detector_order() {
    let server = three_plate_server();

    let response = server
        .post("/detect-plate")
        .multipart(upload(png_bytes(200, 200)))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: serde_json::Value = response.json();
    assert_eq!(
        body,
        serde_json::json!({
            "detections": [
                {"plate": "ABC123", "box": [10, 10, 50, 30]},
                {"plate": UNREADABLE_PLATE, "box": [100, 10, 150, 30]},
                {"plate": "XYZ999", "box": [10, 100, 70, 120]},
            ]
        })
    );

    let stats = analytics(&server).await;
    assert_eq!(stats.total_images, 1);
    assert_eq!(stats.successful_plates, 2);
    assert_eq!(stats.accuracy, 200.0);
    assert_eq!(stats.last_plate, "ABC123, XYZ999");
}

#[tokio::test]
async fn test_undecodable_upload_returns_empty_detections() {
    let server = three_plate_server();

    let response = server
        .post("/detect-plate")
        .multipart(upload(b"definitely not an image".to_vec()))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: DetectPlateResponse = response.json();
    assert!(body.detections.is_empty());

    let stats = analytics(&server).await;
    assert_eq!(stats.total_images, 1);
    assert_eq!(stats.successful_plates, 0);
    assert_eq!(stats.last_plate, NO_PLATE_YET);
}

#[tokio::test]
async fn test_unreadable_request_keeps_last_plate() {
    let server = three_plate_server();

    server
        .post("/detect-plate")
        .multipart(upload(png_bytes(200, 200)))
        .await
        .assert_status_ok();

    // Plates entirely outside a tiny image clamp to nothing
    let response = server
        .post("/detect-plate")
        .multipart(upload(png_bytes(5, 5)))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: DetectPlateResponse = response.json();
    assert!(body.detections.is_empty());

    let stats = analytics(&server).await;
    assert_eq!(stats.total_images, 2);
    assert_eq!(stats.successful_plates, 2);
    assert_eq!(stats.accuracy, 100.0);
    assert_eq!(stats.last_plate, "ABC123, XYZ999");
}

#[tokio::test]
async fn test_missing_recognizer_reads_every_plate_as_unreadable() {
    let detector = StubDetector {
        regions: vec![Region::new(0, 0, 20, 10, 0.95)],
    };
    let server = server_with(Arc::new(detector), None);

    let response = server
        .post("/detect-plate")
        .multipart(upload(png_bytes(64, 64)))
        .await;
    let body: DetectPlateResponse = response.json();
    assert_eq!(body.detections.len(), 1);
    assert_eq!(body.detections[0].plate, UNREADABLE_PLATE);
    assert_eq!(body.detections[0].bbox, [0, 0, 20, 10]);

    let ready: serde_json::Value = server.get("/readyz").await.json();
    assert_eq!(ready["recognizer"], false);
}

#[tokio::test]
async fn test_detector_failure_is_internal_error() {
    let server = server_with(Arc::new(BrokenDetector), None);

    let response = server
        .post("/detect-plate")
        .multipart(upload(png_bytes(64, 64)))
        .await;
    assert_eq!(response.status_code(), 500);

    let body: serde_json::Value = response.json();
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("broken_detector"));
    assert!(message.contains("inference session crashed"));

    let stats = analytics(&server).await;
    assert_eq!(stats.total_images, 0);

    assert_eq!(server.get("/readyz").await.status_code(), 503);
}

#[tokio::test]
async fn test_missing_file_field_is_bad_request() {
    let server = three_plate_server();

    let form = MultipartForm::new().add_text("comment", "no image here");
    let response = server.post("/detect-plate").multipart(form).await;
    assert_eq!(response.status_code(), 400);

    let stats = analytics(&server).await;
    assert_eq!(stats.total_images, 0);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let detector = StubDetector { regions: vec![] };
    let state = PlateServiceState::new(PlatePipeline::new(Arc::new(detector), None));
    let server = TestServer::new(api::router_with_upload_limit(state, 1024)).unwrap();

    let response = server
        .post("/detect-plate")
        .multipart(upload(vec![0u8; 64 * 1024]))
        .await;
    assert_eq!(response.status_code(), 413);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uploads_are_all_counted() {
    let (state, server) = three_plate_service();
    let image = axum::body::Bytes::from(png_bytes(200, 200));

    let mut handles = Vec::new();
    for i in 0..20 {
        let state = state.clone();
        let image = image.clone();
        handles.push(tokio::spawn(async move {
            let filename = format!("car-{}.png", i);
            state.detect_plates(Some(&filename), image).await
        }));
    }
    for handle in handles {
        let detections = handle.await.unwrap().unwrap();
        assert_eq!(detections.len(), 3);
    }

    let stats = analytics(&server).await;
    assert_eq!(stats.total_images, 20);
    assert_eq!(stats.successful_plates, 40);
    assert_eq!(stats.last_plate, "ABC123, XYZ999");
}

#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let server = three_plate_server();

    let health: serde_json::Value = server.get("/healthz").await.json();
    assert_eq!(health["status"], "healthy");

    server
        .post("/detect-plate")
        .multipart(upload(png_bytes(200, 200)))
        .await
        .assert_status_ok();

    let metrics = server.get("/metrics").await;
    assert_eq!(metrics.status_code(), 200);
    assert!(metrics.text().contains("plate_service_images_processed_total"));
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let server = three_plate_server();

    let response = server
        .get("/healthz")
        .add_header(
            HeaderName::from_static("x-correlation-id"),
            HeaderValue::from_static("trace-42"),
        )
        .await;
    assert_eq!(
        response.header(HeaderName::from_static("x-correlation-id")),
        "trace-42"
    );
}

#[tokio::test]
async fn test_cors_allows_listed_origin_with_credentials() {
    let detector = StubDetector { regions: vec![] };
    let state = PlateServiceState::new(PlatePipeline::new(Arc::new(detector), None));
    let cors = api::cors_layer(&["http://localhost:3000".to_string()]).unwrap();
    let server = TestServer::new(api::router(state).layer(cors)).unwrap();

    let response = server
        .get("/analytics")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("http://localhost:3000"),
        )
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.header(HeaderName::from_static("access-control-allow-origin")),
        "http://localhost:3000"
    );
    assert_eq!(
        response.header(HeaderName::from_static("access-control-allow-credentials")),
        "true"
    );

    let foreign = server
        .get("/analytics")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("https://elsewhere.example.com"),
        )
        .await;
    assert!(foreign
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}
