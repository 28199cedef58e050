pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod state;

pub use analytics::AnalyticsAggregate;
pub use config::PlateServiceConfig;
pub use pipeline::{PlateDetector, PlatePipeline, PlateRecognizer, Recognition, Region};
pub use state::PlateServiceState;
