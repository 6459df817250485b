//! signstream - hand-sign token streams to dictionary words
//!
//! Per-frame classifier output goes in; settled letters, segmented words and
//! completion suggestions come out.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod accumulator;
pub mod classifier;
#[cfg(feature = "cli")]
pub mod cli;
pub mod clock;
pub mod config;
pub mod defaults;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod landmarks;
pub mod pipeline;
pub mod replay;
pub mod segmenter;
pub mod stabilizer;
pub mod suggest;

// Core components (landmarks → label → token → word)
pub use accumulator::TokenAccumulator;
pub use classifier::{Classifier, MockClassifier, RawPrediction};
#[cfg(feature = "http-classifier")]
pub use classifier::HttpClassifier;
pub use dictionary::Dictionary;
pub use gateway::{ClassificationGateway, ClassificationResult};
pub use landmarks::{DetectedHand, FeatureVector, HandFrame, Handedness, Landmark, normalize};
pub use segmenter::{SegmentationResult, segment};
pub use stabilizer::{SettledToken, Stabilizer};
pub use suggest::SuggestionRanker;

// Sessions
pub use engine::{EngineConfig, EngineEvent, FlushReport, FlushTrigger, Session, TokenEngine};

// Pipeline
pub use pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
pub use pipeline::sink::{CollectorSink, JsonLinesSink, WordSink};

// Time
pub use clock::{Clock, MockClock, SystemClock};

// Error handling
pub use error::{Result, SignstreamError};

// Config
pub use config::Config;

// Station framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::station::Station;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_has_hash_suffix_only_with_git_hash() {
        let ver = version_string();
        match option_env!("GIT_HASH").filter(|h| !h.is_empty()) {
            Some(hash) => assert_eq!(ver, format!("{}+{}", env!("CARGO_PKG_VERSION"), hash)),
            None => assert_eq!(ver, env!("CARGO_PKG_VERSION")),
        }
    }

    #[test]
    fn embedded_git_hash_is_hex() {
        if let Some(hash) = option_env!("GIT_HASH") {
            assert!(!hash.is_empty());
            assert!(hash.chars().all(|c| c.is_ascii_hexdigit()), "got {:?}", hash);
        }
    }
}
