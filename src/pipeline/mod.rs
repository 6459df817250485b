//! Threaded gesture pipeline.
//!
//! Each station runs in its own thread, connected by bounded crossbeam
//! channels for backpressure. A session's stabilizer and buffer live on the
//! token station's thread only.

pub mod error;
pub mod gateway_station;
pub mod normalizer_station;
pub mod orchestrator;
pub mod sink;
pub mod station;
pub mod token_station;
pub mod types;

pub use error::{ErrorReporter, LogReporter, StationError};
pub use gateway_station::GatewayStation;
pub use normalizer_station::NormalizerStation;
pub use orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
pub use sink::{CollectorSink, JsonLinesSink, WordSink};
pub use station::{Station, StationRunner};
pub use token_station::TokenStation;
pub use types::{FeatureFrame, LabelFrame, StreamItem, TimedFrame};
