/// YOLOv8 license plate detector running on ONNX Runtime
use super::session::{ExecutionConfig, OnnxModel};
use crate::pipeline::{nms, PlateDetector, Region, CONFIDENCE_THRESHOLD, IOU_THRESHOLD};
use anyhow::{ensure, Result};
use image::DynamicImage;
use ndarray::{Array, IxDyn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Path to the plate detection ONNX model file
    pub model_path: String,

    /// Model input size (width and height)
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// Maximum number of plates to report per image
    #[serde(default = "default_max_detections")]
    pub max_detections: usize,
}

fn default_input_size() -> u32 {
    640
}

fn default_max_detections() -> usize {
    300
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "weights/best.onnx".to_string(),
            input_size: default_input_size(),
            max_detections: default_max_detections(),
        }
    }
}

pub struct OnnxPlateDetector {
    config: DetectorConfig,
    model: OnnxModel,
}

impl OnnxPlateDetector {
    pub fn load(config: DetectorConfig, execution: &ExecutionConfig) -> Result<Self> {
        let model = OnnxModel::load("detector", &config.model_path, execution)?;
        Ok(Self { config, model })
    }

    pub fn execution_provider(&self) -> &str {
        self.model.execution_provider()
    }
}

impl PlateDetector for OnnxPlateDetector {
    fn id(&self) -> &'static str {
        "yolov8_plate"
    }

    fn detect(&self, image: &DynamicImage) -> Result<Vec<Region>> {
        let input = preprocess(image, self.config.input_size);
        let output = self.model.run(input, &["output0", "output", "boxes"])?;

        decode_predictions(
            &output,
            self.config.input_size,
            self.config.max_detections,
            image.width(),
            image.height(),
        )
    }
}

/// Resize to the square model input and convert to normalized NCHW RGB
fn preprocess(img: &DynamicImage, size: u32) -> Array<f32, IxDyn> {
    let resized = img.resize_exact(size, size, image::imageops::FilterType::Triangle);
    let rgb_img = resized.to_rgb8();

    let mut input = Array::zeros(IxDyn(&[1, 3, size as usize, size as usize]));
    for (x, y, pixel) in rgb_img.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    input
}

/// Turn raw YOLOv8 output into suppressed regions in source pixels.
///
/// Output layout is `[1, 4 + classes, predictions]` with rows cx, cy, w, h
/// followed by per-class scores; a prediction's confidence is its best class
/// score. Boxes are clipped to the image and at most `max_detections` of the
/// most confident survivors are kept.
fn decode_predictions(
    output: &Array<f32, IxDyn>,
    input_size: u32,
    max_detections: usize,
    original_width: u32,
    original_height: u32,
) -> Result<Vec<Region>> {
    let shape = output.shape();
    ensure!(
        shape.len() == 3 && shape[1] >= 5,
        "Unexpected detector output shape {:?}",
        shape
    );

    let num_classes = shape[1] - 4;
    let num_predictions = shape[2];
    let scale_x = original_width as f32 / input_size as f32;
    let scale_y = original_height as f32 / input_size as f32;
    let max_x = original_width as f32;
    let max_y = original_height as f32;

    let mut candidates = Vec::new();
    for i in 0..num_predictions {
        let confidence = (0..num_classes)
            .map(|class_idx| output[[0, 4 + class_idx, i]])
            .fold(f32::MIN, f32::max);
        if confidence < CONFIDENCE_THRESHOLD {
            continue;
        }

        let cx = output[[0, 0, i]];
        let cy = output[[0, 1, i]];
        let w = output[[0, 2, i]];
        let h = output[[0, 3, i]];

        let x1 = ((cx - w / 2.0) * scale_x).clamp(0.0, max_x) as i32;
        let y1 = ((cy - h / 2.0) * scale_y).clamp(0.0, max_y) as i32;
        let x2 = ((cx + w / 2.0) * scale_x).clamp(0.0, max_x) as i32;
        let y2 = ((cy + h / 2.0) * scale_y).clamp(0.0, max_y) as i32;

        if x1 < x2 && y1 < y2 {
            candidates.push(Region::new(x1, y1, x2, y2, confidence));
        }
    }

    let mut regions = nms::non_max_suppression(candidates, IOU_THRESHOLD);
    regions.truncate(max_detections);
    Ok(regions)
}
