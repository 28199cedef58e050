//! Plate reading contracts for the plate service HTTP API.
//!
//! These types are shared between the service and its clients (and the
//! integration tests), so the JSON shape lives in exactly one place.

use serde::{Deserialize, Serialize};

/// Text reported for a plate region the recognizer could not read
pub const UNREADABLE_PLATE: &str = "Unreadable";

/// `last_plate` value before any plate has been read
pub const NO_PLATE_YET: &str = "N/A";

/// Separator used when a request reads more than one plate
pub const PLATE_SEPARATOR: &str = ", ";

/// One plate found in an uploaded image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Recognized plate text, or [`UNREADABLE_PLATE`]
    pub plate: String,

    /// Region in source pixels as `[x1, y1, x2, y2]`
    #[serde(rename = "box")]
    pub bbox: [i32; 4],
}

impl DetectionRecord {
    pub fn new(plate: impl Into<String>, bbox: [i32; 4]) -> Self {
        Self {
            plate: plate.into(),
            bbox,
        }
    }

    /// Whether the recognizer produced usable text for this plate
    pub fn is_read(&self) -> bool {
        self.plate != UNREADABLE_PLATE
    }
}

/// Response to `POST /detect-plate`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectPlateResponse {
    pub detections: Vec<DetectionRecord>,
}

/// Response to `GET /analytics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResponse {
    /// Images processed since startup
    pub total_images: u64,

    /// Plates read successfully since startup
    pub successful_plates: u64,

    /// `successful_plates / total_images * 100`, two decimal places
    pub accuracy: f64,

    /// Plates read by the most recent request that read any
    pub last_plate: String,
}
