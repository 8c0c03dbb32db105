pub mod arch;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod loss;
pub mod metrics;
pub mod optimization;
pub mod report;
pub mod trainer;

pub use config::EngineConfig;
pub use error::{EngineErr, Result};
pub use metrics::RunningMetrics;
pub use trainer::TrajPredEngine;
