//! ONNX Runtime implementations of the pipeline's inference seams.

pub mod detector;
pub mod recognizer;
pub mod session;

pub use detector::{DetectorConfig, OnnxPlateDetector};
pub use recognizer::{OnnxPlateRecognizer, RecognizerConfig, TextDecoder};
pub use session::{ExecutionConfig, OnnxModel};
