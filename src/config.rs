use crate::accumulator::AccumulatorConfig;
use crate::defaults;
use crate::engine::EngineConfig;
use crate::error::{Result, SignstreamError};
use crate::gateway::GatewayConfig;
use crate::pipeline::PipelineConfig;
use crate::stabilizer::StabilizerConfig;
use crate::suggest::SuggestionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub classifier: ClassifierSection,
    pub stabilizer: StabilizerSection,
    pub accumulator: AccumulatorSection,
    pub suggestions: SuggestionsSection,
    pub dictionary: DictionarySection,
}

/// Classifier service and confidence gate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierSection {
    /// HTTP endpoint of the classifier service. Absent: no remote classifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub confidence_threshold: f32,
    pub timeout_ms: u64,
}

/// Consensus window and cooldowns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StabilizerSection {
    pub window: usize,
    pub consensus: usize,
    pub switch_cooldown_ms: u64,
    pub repeat_cooldown_ms: u64,
    pub reset_after_frames: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccumulatorSection {
    pub idle_flush_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuggestionsSection {
    pub max_suggestions: usize,
    pub min_similarity: f32,
}

/// Word list source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DictionarySection {
    /// Word-list file. Absent: the builtin list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            confidence_threshold: defaults::CONFIDENCE_THRESHOLD,
            timeout_ms: defaults::CLASSIFIER_TIMEOUT_MS,
        }
    }
}

impl Default for StabilizerSection {
    fn default() -> Self {
        Self {
            window: defaults::STABILIZER_WINDOW,
            consensus: defaults::STABILIZER_CONSENSUS,
            switch_cooldown_ms: defaults::SWITCH_COOLDOWN_MS,
            repeat_cooldown_ms: defaults::REPEAT_COOLDOWN_MS,
            reset_after_frames: defaults::RESET_AFTER_FRAMES,
        }
    }
}

impl Default for AccumulatorSection {
    fn default() -> Self {
        Self {
            idle_flush_ms: defaults::IDLE_FLUSH_MS,
        }
    }
}

impl Default for SuggestionsSection {
    fn default() -> Self {
        Self {
            max_suggestions: defaults::MAX_SUGGESTIONS,
            min_similarity: defaults::MIN_SIMILARITY,
        }
    }
}

fn invalid(key: &str, message: &str) -> SignstreamError {
    SignstreamError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SignstreamError::ConfigFileNotFound {
                path: path.display().to_string(),
            },
            _ => SignstreamError::Io(e),
        })?;
        let config: Config = toml::from_str(&contents).map_err(SignstreamError::from)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if matches!(
                    e.downcast_ref::<SignstreamError>(),
                    Some(SignstreamError::ConfigFileNotFound { .. })
                ) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SIGNSTREAM_CLASSIFIER_URL → classifier.endpoint
    /// - SIGNSTREAM_DICTIONARY → dictionary.path
    /// - SIGNSTREAM_IDLE_FLUSH_MS → accumulator.idle_flush_ms
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("SIGNSTREAM_CLASSIFIER_URL")
            && !url.is_empty()
        {
            self.classifier.endpoint = Some(url);
        }

        if let Ok(path) = std::env::var("SIGNSTREAM_DICTIONARY")
            && !path.is_empty()
        {
            self.dictionary.path = Some(PathBuf::from(path));
        }

        if let Ok(ms) = std::env::var("SIGNSTREAM_IDLE_FLUSH_MS")
            && !ms.is_empty()
        {
            match ms.parse() {
                Ok(ms) => self.accumulator.idle_flush_ms = ms,
                Err(_) => warn!("ignoring SIGNSTREAM_IDLE_FLUSH_MS={ms}: not a number"),
            }
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/signstream/config.toml on Linux, or `None` when the
    /// platform has no config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("signstream").join("config.toml"))
    }

    /// Checks the values that would otherwise misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        let s = &self.stabilizer;
        if s.window == 0 {
            return Err(invalid("stabilizer.window", "must be at least 1"));
        }
        if s.consensus == 0 {
            return Err(invalid("stabilizer.consensus", "must be at least 1"));
        }
        if s.consensus > s.window {
            return Err(invalid(
                "stabilizer.consensus",
                &format!("must not exceed window ({})", s.window),
            ));
        }
        if s.reset_after_frames == 0 {
            return Err(invalid("stabilizer.reset_after_frames", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.classifier.confidence_threshold) {
            return Err(invalid(
                "classifier.confidence_threshold",
                "must be between 0 and 1",
            ));
        }
        if self.classifier.timeout_ms == 0 {
            return Err(invalid("classifier.timeout_ms", "must be at least 1"));
        }
        if self.accumulator.idle_flush_ms == 0 {
            return Err(invalid("accumulator.idle_flush_ms", "must be at least 1"));
        }
        if self.suggestions.max_suggestions == 0
            || self.suggestions.max_suggestions > defaults::MAX_SUGGESTIONS
        {
            return Err(invalid(
                "suggestions.max_suggestions",
                &format!("must be between 1 and {}", defaults::MAX_SUGGESTIONS),
            ));
        }
        if !(0.0..=1.0).contains(&self.suggestions.min_similarity) {
            return Err(invalid("suggestions.min_similarity", "must be between 0 and 1"));
        }
        Ok(())
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            confidence_threshold: self.classifier.confidence_threshold,
            timeout: Duration::from_millis(self.classifier.timeout_ms),
        }
    }

    pub fn stabilizer_config(&self) -> StabilizerConfig {
        let s = &self.stabilizer;
        StabilizerConfig {
            window: s.window,
            consensus: s.consensus,
            switch_cooldown: Duration::from_millis(s.switch_cooldown_ms),
            repeat_cooldown: Duration::from_millis(s.repeat_cooldown_ms),
            reset_after_frames: s.reset_after_frames,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            stabilizer: self.stabilizer_config(),
            accumulator: AccumulatorConfig {
                idle_flush: Duration::from_millis(self.accumulator.idle_flush_ms),
            },
            suggestions: SuggestionConfig {
                max_suggestions: self.suggestions.max_suggestions,
                min_similarity: self.suggestions.min_similarity,
            },
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            gateway: self.gateway_config(),
            engine: self.engine_config(),
            ..PipelineConfig::default()
        }
    }
}
