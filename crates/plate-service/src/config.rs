use crate::api::DEFAULT_MAX_UPLOAD_BYTES;
use crate::inference::{DetectorConfig, ExecutionConfig, RecognizerConfig, TextDecoder};
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct PlateServiceConfig {
    /// Address to bind the HTTP server to
    pub bind_addr: String,

    /// Plate detector model settings
    pub detector: DetectorConfig,

    /// Plate OCR model settings; `None` reads every plate as unreadable
    pub recognizer: Option<RecognizerConfig>,

    /// ONNX Runtime settings for both models
    pub execution: ExecutionConfig,

    /// Origins allowed to call the API from a browser (empty = any)
    pub allowed_origins: Vec<String>,

    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
}

impl PlateServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = var("PLATE_SERVICE_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());

        let mut detector = DetectorConfig::default();
        if let Some(path) = var("PLATE_DETECTOR_MODEL") {
            detector.model_path = path;
        }
        if let Some(size) = parse(&var, "PLATE_DETECTOR_INPUT_SIZE")? {
            detector.input_size = size;
        }

        let recognizer = match var("PLATE_RECOGNIZER_MODEL") {
            Some(path) => {
                let mut recognizer = RecognizerConfig::new(path);
                if let Some(vocab) = var("PLATE_RECOGNIZER_VOCAB") {
                    recognizer.vocab = vocab;
                }
                if let Some(decoder) = parse::<TextDecoder>(&var, "PLATE_RECOGNIZER_DECODER")? {
                    recognizer.decoder = decoder;
                }
                if let Some(width) = parse(&var, "PLATE_RECOGNIZER_INPUT_WIDTH")? {
                    recognizer.input_width = width;
                }
                if let Some(height) = parse(&var, "PLATE_RECOGNIZER_INPUT_HEIGHT")? {
                    recognizer.input_height = height;
                }
                Some(recognizer)
            }
            None => None,
        };

        let mut execution = ExecutionConfig::default();
        if let Some(provider) = var("PLATE_EXECUTION_PROVIDER") {
            execution.execution_provider = provider;
        }
        if let Some(device_id) = parse(&var, "PLATE_DEVICE_ID")? {
            execution.device_id = device_id;
        }
        if let Some(threads) = parse(&var, "PLATE_INTRA_THREADS")? {
            execution.intra_threads = threads;
        }

        let allowed_origins = var("PLATE_ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let max_upload_bytes =
            parse(&var, "PLATE_MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Ok(Self {
            bind_addr,
            detector,
            recognizer,
            execution,
            allowed_origins,
            max_upload_bytes,
        })
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("Invalid {}: '{}'", key, value))
        })
        .transpose()
}
