use anyhow::{anyhow, Context, Result};
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session},
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// ONNX Runtime settings shared by the detector and recognizer sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Execution provider preference (CPU, CUDA, TensorRT)
    #[serde(default = "default_execution_provider")]
    pub execution_provider: String,

    /// GPU device ID (0, 1, 2, etc.)
    #[serde(default)]
    pub device_id: i32,

    /// Number of intra-operation threads
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    /// Number of inter-operation threads
    #[serde(default = "default_inter_threads")]
    pub inter_threads: usize,
}

fn default_execution_provider() -> String {
    "CPU".to_string()
}

fn default_intra_threads() -> usize {
    4
}

fn default_inter_threads() -> usize {
    1
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            execution_provider: default_execution_provider(),
            device_id: 0,
            intra_threads: default_intra_threads(),
            inter_threads: default_inter_threads(),
        }
    }
}

/// A loaded ONNX model.
///
/// `Session::run` needs exclusive access, so concurrent requests take turns
/// on the same model while the rest of their pipeline runs in parallel.
pub struct OnnxModel {
    name: &'static str,
    execution_provider: String,
    session: Mutex<Session>,
}

impl OnnxModel {
    /// Load a model, falling back TensorRT -> CUDA -> CPU as needed
    pub fn load(name: &'static str, model_path: &str, config: &ExecutionConfig) -> Result<Self> {
        let (session, execution_provider) = create_session(model_path, config)?;

        tracing::info!(
            model = name,
            path = model_path,
            provider = %execution_provider,
            device = config.device_id,
            "Loaded ONNX model"
        );

        Ok(Self {
            name,
            execution_provider,
            session: Mutex::new(session),
        })
    }

    pub fn execution_provider(&self) -> &str {
        &self.execution_provider
    }

    /// Run the model on one input tensor and return the first output found
    /// under any of `output_names`.
    pub fn run(&self, input: Array<f32, IxDyn>, output_names: &[&str]) -> Result<Array<f32, IxDyn>> {
        let input_tensor = Value::from_array(input)?;

        let (output, elapsed) = with_session(&self.session, self.name, |session| {
            let outputs = session.run(ort::inputs![input_tensor])?;

            let output_value = output_names
                .iter()
                .find_map(|name| outputs.get(*name))
                .with_context(|| {
                    format!(
                        "No {} output tensor found (tried: {})",
                        self.name,
                        output_names.join(", ")
                    )
                })?;
            let (shape, data) = output_value.try_extract_tensor::<f32>()?;

            let shape_usize: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();
            Ok(Array::from_shape_vec(IxDyn(&shape_usize), data.to_vec())?)
        })?;

        telemetry::metrics::PLATE_SERVICE_INFERENCE_TIME
            .with_label_values(&[self.name, &self.execution_provider])
            .observe(elapsed.as_secs_f64());

        Ok(output)
    }
}

/// Lock a session and run `f` on it. The returned duration covers only the
/// time the lock was held.
fn with_session<S, T>(
    session: &Mutex<S>,
    name: &str,
    f: impl FnOnce(&mut S) -> Result<T>,
) -> Result<(T, Duration)> {
    let mut guard = session
        .lock()
        .map_err(|e| anyhow!("Failed to lock {} session: {}", name, e))?;
    let start = Instant::now();
    let value = f(&mut guard)?;
    Ok((value, start.elapsed()))
}

fn session_builder(config: &ExecutionConfig) -> Result<SessionBuilder> {
    Session::builder()
        .context("Failed to create session builder")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(config.intra_threads)
        .context("Failed to set intra threads")?
        .with_inter_threads(config.inter_threads)
        .context("Failed to set inter threads")
}

fn create_session(model_path: &str, config: &ExecutionConfig) -> Result<(Session, String)> {
    match config.execution_provider.to_uppercase().as_str() {
        "TENSORRT" => {
            tracing::info!("Attempting TensorRT for {}", model_path);
            let result = session_builder(config)?
                .with_execution_providers([
                    TensorRTExecutionProvider::default()
                        .with_device_id(config.device_id)
                        .build(),
                    CUDAExecutionProvider::default()
                        .with_device_id(config.device_id)
                        .build(),
                    CPUExecutionProvider::default().build(),
                ])
                .context("Failed to set execution providers")?
                .commit_from_file(model_path);

            match result {
                Ok(session) => Ok((session, "TensorRT".to_string())),
                Err(e) => {
                    tracing::warn!("TensorRT failed, trying CUDA: {}", e);
                    try_cuda(model_path, config)
                }
            }
        }
        "CUDA" => try_cuda(model_path, config),
        _ => try_cpu(model_path, config),
    }
}

fn try_cuda(model_path: &str, config: &ExecutionConfig) -> Result<(Session, String)> {
    tracing::info!("Attempting CUDA for {}", model_path);
    let result = session_builder(config)?
        .with_execution_providers([
            CUDAExecutionProvider::default()
                .with_device_id(config.device_id)
                .build(),
            CPUExecutionProvider::default().build(),
        ])
        .context("Failed to set execution providers")?
        .commit_from_file(model_path);

    match result {
        Ok(session) => Ok((session, "CUDA".to_string())),
        Err(e) => {
            tracing::warn!("CUDA failed, using CPU: {}", e);
            try_cpu(model_path, config)
        }
    }
}

fn try_cpu(model_path: &str, config: &ExecutionConfig) -> Result<(Session, String)> {
    let session = session_builder(config)?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load model from {}", model_path))?;
    Ok((session, "CPU".to_string()))
}
