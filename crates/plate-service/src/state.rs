use crate::analytics::AnalyticsAggregate;
use crate::pipeline::PlatePipeline;
use anyhow::{Context, Result};
use axum::body::Bytes;
use common::plates::{AnalyticsResponse, DetectionRecord};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

#[derive(Clone)]
pub struct PlateServiceState {
    inner: Arc<PlateServiceStateInner>,
}

struct PlateServiceStateInner {
    pipeline: Arc<PlatePipeline>,
    analytics: AnalyticsAggregate,
}

impl PlateServiceState {
    pub fn new(pipeline: PlatePipeline) -> Self {
        Self {
            inner: Arc::new(PlateServiceStateInner {
                pipeline: Arc::new(pipeline),
                analytics: AnalyticsAggregate::new(),
            }),
        }
    }

    pub fn pipeline(&self) -> &PlatePipeline {
        &self.inner.pipeline
    }

    pub fn analytics(&self) -> &AnalyticsAggregate {
        &self.inner.analytics
    }

    /// Read every plate in an uploaded image and fold the result into the
    /// analytics.
    ///
    /// Inference runs on the blocking pool; the analytics lock is only taken
    /// once the detections are final. A detector failure returns an error and
    /// leaves the analytics untouched.
    pub async fn detect_plates(
        &self,
        filename: Option<&str>,
        image: Bytes,
    ) -> Result<Vec<DetectionRecord>> {
        let filename = filename.unwrap_or("<unnamed>");
        let start = Instant::now();

        let pipeline = self.inner.pipeline.clone();
        let span = tracing::Span::current();
        let result = tokio::task::spawn_blocking(move || span.in_scope(|| pipeline.process(&image)))
            .await
            .context("Plate pipeline task panicked")
            .and_then(|outcome| outcome);

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                telemetry::metrics::PLATE_SERVICE_IMAGES_PROCESSED
                    .with_label_values(&["failed"])
                    .inc();
                error!(filename = %filename, "Plate detection failed: {:#}", e);
                return Err(e);
            }
        };

        let elapsed = start.elapsed();
        let status = if outcome.image_decoded {
            "decoded"
        } else {
            "undecodable"
        };
        telemetry::metrics::PLATE_SERVICE_IMAGES_PROCESSED
            .with_label_values(&[status])
            .inc();
        telemetry::metrics::PLATE_SERVICE_PIPELINE_LATENCY.observe(elapsed.as_secs_f64());
        telemetry::metrics::PLATE_SERVICE_EMPTY_CROPS.inc_by(outcome.skipped_regions as u64);
        for record in &outcome.detections {
            let read = if record.is_read() { "read" } else { "unreadable" };
            telemetry::metrics::PLATE_SERVICE_PLATES
                .with_label_values(&[read])
                .inc();
        }

        self.inner.analytics.record(&outcome.detections).await;

        info!(
            filename = %filename,
            plates = outcome.detections.len(),
            skipped = outcome.skipped_regions,
            processing_time_ms = elapsed.as_millis() as u64,
            "Found {} plate(s) in {}",
            outcome.detections.len(),
            filename
        );

        Ok(outcome.detections)
    }

    pub async fn analytics_snapshot(&self) -> AnalyticsResponse {
        self.inner.analytics.snapshot().await
    }
}
