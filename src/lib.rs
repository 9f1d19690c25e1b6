pub mod config;
pub mod constants;
pub mod error;
pub mod handshake;
pub mod output;
pub mod pipeline;
pub mod ranging;
pub mod render;
pub mod shutdown;
pub mod smoothing;
pub mod state;
pub mod telemetry;
pub mod trilateration;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use config::LocatorConfig;
pub use error::{LocatorError, Result};
pub use pipeline::{EstimationPipeline, IterationOutcome, PipelineState};
pub use shutdown::Shutdown;
pub use state::{EstimateReader, EstimateSnapshot, PositionEstimate, estimate_channel};
