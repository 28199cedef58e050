//! Detection-to-recognition pipeline.
//!
//! An upload flows through [`decode::decode_image`], a [`PlateDetector`],
//! [`crop::crop_region`] and a [`PlateRecognizer`] once per region, and ends
//! up as an ordered list of [`DetectionRecord`]s.

pub mod crop;
pub mod decode;
pub mod nms;

use anyhow::{Context, Result};
use common::plates::{DetectionRecord, UNREADABLE_PLATE};
use image::{DynamicImage, GrayImage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Minimum detector confidence for a region to be reported
pub const CONFIDENCE_THRESHOLD: f32 = 0.40;

/// IoU above which an overlapping lower-confidence region is suppressed
pub const IOU_THRESHOLD: f32 = 0.5;

/// Candidate plate area in source image pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub confidence: f32,
}

impl Region {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    pub fn bbox(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    pub fn width(&self) -> i64 {
        (self.x2 as i64 - self.x1 as i64).max(0)
    }

    pub fn height(&self) -> i64 {
        (self.y2 as i64 - self.y1 as i64).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }
}

/// Locates plate regions in a decoded image.
///
/// Implementations apply [`CONFIDENCE_THRESHOLD`] and [`IOU_THRESHOLD`] and
/// return regions in the order they should be reported. An error here fails
/// the whole request.
pub trait PlateDetector: Send + Sync {
    /// Identifier used in logs and metrics (e.g., "yolov8_plate")
    fn id(&self) -> &'static str;

    fn detect(&self, image: &DynamicImage) -> Result<Vec<Region>>;

    /// Whether the detector can serve requests
    fn health_check(&self) -> bool {
        true
    }
}

/// Raw recognizer output before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    /// The recognizer produced no output
    Nothing,
    /// A single reading
    Text(String),
    /// Several readings, best first
    Candidates(Vec<String>),
}

impl Recognition {
    /// The usable reading, if any. Only the first candidate is considered.
    pub fn into_text(self) -> Option<String> {
        let text = match self {
            Recognition::Nothing => None,
            Recognition::Text(text) => Some(text),
            Recognition::Candidates(candidates) => candidates.into_iter().next(),
        }?;
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Reads plate text from a single-channel crop
pub trait PlateRecognizer: Send + Sync {
    /// Identifier used in logs and metrics (e.g., "plate_ocr")
    fn id(&self) -> &'static str;

    fn recognize(&self, plate: &GrayImage) -> Result<Recognition>;
}

/// Map a recognition outcome to the text reported to clients.
///
/// Failures and empty readings become [`UNREADABLE_PLATE`].
pub fn plate_text(outcome: Result<Recognition>) -> String {
    match outcome {
        Ok(recognition) => recognition
            .into_text()
            .unwrap_or_else(|| UNREADABLE_PLATE.to_string()),
        Err(e) => {
            warn!("Plate recognition failed: {:#}", e);
            UNREADABLE_PLATE.to_string()
        }
    }
}

/// Result of running one upload through the pipeline
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    /// One record per non-empty region, in detector order
    pub detections: Vec<DetectionRecord>,

    /// False when the upload was not a decodable image
    pub image_decoded: bool,

    /// Regions dropped because they clamped to zero area
    pub skipped_regions: usize,
}

/// Detector and optional recognizer shared by all requests
pub struct PlatePipeline {
    detector: Arc<dyn PlateDetector>,
    recognizer: Option<Arc<dyn PlateRecognizer>>,
}

impl PlatePipeline {
    pub fn new(
        detector: Arc<dyn PlateDetector>,
        recognizer: Option<Arc<dyn PlateRecognizer>>,
    ) -> Self {
        Self {
            detector,
            recognizer,
        }
    }

    pub fn detector(&self) -> &Arc<dyn PlateDetector> {
        &self.detector
    }

    pub fn has_recognizer(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Run an uploaded image through detection and recognition.
    ///
    /// Blocks on inference; call from a blocking context.
    pub fn process(&self, bytes: &[u8]) -> Result<PipelineOutcome> {
        let Some(image) = decode::decode_image(bytes) else {
            return Ok(PipelineOutcome::default());
        };

        let regions = self
            .detector
            .detect(&image)
            .with_context(|| format!("Plate detector '{}' failed", self.detector.id()))?;

        let mut outcome = PipelineOutcome {
            detections: Vec::with_capacity(regions.len()),
            image_decoded: true,
            skipped_regions: 0,
        };

        for region in regions {
            let Some(plate) = crop::crop_region(&image, &region) else {
                debug!(bbox = ?region.bbox(), "Skipping empty plate crop");
                outcome.skipped_regions += 1;
                continue;
            };

            let text = self.read_plate(&plate);
            outcome.detections.push(DetectionRecord::new(text, region.bbox()));
        }

        Ok(outcome)
    }

    fn read_plate(&self, plate: &DynamicImage) -> String {
        let Some(recognizer) = &self.recognizer else {
            return UNREADABLE_PLATE.to_string();
        };

        let gray = plate.to_luma8();
        let start = Instant::now();
        let text = plate_text(recognizer.recognize(&gray));
        debug!(
            recognizer = recognizer.id(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            plate = %text,
            "Recognized plate"
        );
        text
    }
}
