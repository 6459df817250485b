//! Per-session state machine: labels in, settled tokens and word flushes out.
//!
//! [`TokenEngine`] owns the stabilizer and accumulator and runs the segmenter
//! and ranker on each flush. [`Session`] puts the normalizer and the
//! classification gateway in front of it so one call handles a whole frame.
//! Neither reads the clock; every call takes the current `Instant`.

use crate::accumulator::{AccumulatorConfig, TokenAccumulator};
use crate::classifier::{Classifier, RawPrediction};
use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::gateway::{self, ClassificationGateway, GatewayConfig, GatewayStats};
use crate::landmarks::{self, HandFrame};
use crate::segmenter::SegmentationResult;
use crate::stabilizer::{Stabilizer, StabilizerConfig};
use crate::suggest::{SuggestionConfig, SuggestionRanker};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// What caused a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushTrigger {
    /// No token arrived for the idle period.
    Idle,
    /// The session was stopped.
    Stop,
}

/// Output of one flush, as delivered to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub trigger: FlushTrigger,
    pub settled_words: Vec<String>,
    pub remainder: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The stabilizer accepted a token; it is now in the buffer.
    Settled { token: String, at: Instant },
    Flushed(FlushReport),
}

/// Settings for everything behind the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineConfig {
    pub stabilizer: StabilizerConfig,
    pub accumulator: AccumulatorConfig,
    pub suggestions: SuggestionConfig,
}

/// Stabilizer, accumulator, segmenter and ranker for one session.
#[derive(Debug)]
pub struct TokenEngine {
    stabilizer: Stabilizer,
    accumulator: TokenAccumulator,
    ranker: SuggestionRanker,
    dictionary: Arc<Dictionary>,
    transcript: Vec<String>,
}

impl TokenEngine {
    pub fn new(config: EngineConfig, dictionary: Arc<Dictionary>) -> Self {
        Self {
            stabilizer: Stabilizer::new(config.stabilizer),
            accumulator: TokenAccumulator::new(config.accumulator),
            ranker: SuggestionRanker::new(Arc::clone(&dictionary), config.suggestions),
            dictionary,
            transcript: Vec::new(),
        }
    }

    /// Advances the engine by one gated label (empty = nothing recognized).
    ///
    /// An idle flush that came due before `now` is delivered first, so the
    /// events are in the order they would have happened.
    pub fn push_label(&mut self, label: &str, now: Instant) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        if let Some(report) = self.poll(now) {
            events.push(EngineEvent::Flushed(report));
        }
        if let Some(settled) = self.stabilizer.push(label, now) {
            self.accumulator.append(&settled.token, settled.at);
            events.push(EngineEvent::Settled {
                token: settled.token,
                at: settled.at,
            });
        }
        events
    }

    /// Fires the idle flush if it is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<FlushReport> {
        let result = self.accumulator.poll_idle(now, &self.dictionary)?;
        Some(self.report(FlushTrigger::Idle, result))
    }

    /// Flushes whatever is pending and clears stabilizer and accumulator state.
    ///
    /// The transcript survives; only [`reset`](Self::reset) clears it.
    pub fn stop(&mut self) -> FlushReport {
        let result = self.accumulator.stop(&self.dictionary);
        self.stabilizer.reset();
        self.report(FlushTrigger::Stop, result)
    }

    /// Discards the buffer, the stabilizer window and the transcript.
    pub fn reset(&mut self) {
        self.stabilizer.reset();
        self.accumulator.reset();
        self.transcript.clear();
        debug!("engine reset");
    }

    fn report(&mut self, trigger: FlushTrigger, result: SegmentationResult) -> FlushReport {
        let suggestions = self.ranker.suggest(&result.remainder);
        info!(
            ?trigger,
            words = ?result.settled_words,
            remainder = %result.remainder,
            "flush"
        );
        self.transcript.extend(result.settled_words.iter().cloned());
        FlushReport {
            trigger,
            settled_words: result.settled_words,
            remainder: result.remainder,
            suggestions,
        }
    }

    /// When the next idle flush comes due, for schedulers.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.accumulator.next_deadline()
    }

    /// Every word settled since the last reset, in order.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Letters waiting for the next flush.
    pub fn buffer(&self) -> &str {
        self.accumulator.buffer()
    }

    pub fn stabilizer(&self) -> &Stabilizer {
        &self.stabilizer
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }
}

/// Normalizer, gateway and engine for one stream of frames.
#[derive(Debug)]
pub struct Session {
    gateway: ClassificationGateway,
    engine: TokenEngine,
    malformed_frames: u64,
}

impl Session {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        gateway_config: GatewayConfig,
        engine_config: EngineConfig,
        dictionary: Arc<Dictionary>,
    ) -> Result<Self> {
        Ok(Self {
            gateway: ClassificationGateway::new(classifier, gateway_config)?,
            engine: TokenEngine::new(engine_config, dictionary),
            malformed_frames: 0,
        })
    }

    /// Normalizes, classifies and stabilizes one frame.
    ///
    /// Malformed frames and classifier failures count as empty labels.
    /// Frames without any hand skip the classifier.
    pub fn process_frame(&mut self, frame: &HandFrame, now: Instant) -> Vec<EngineEvent> {
        let label = self.classify(frame);
        self.engine.push_label(&label, now)
    }

    /// Feeds a prediction made elsewhere (a replay), still subject to the gate.
    pub fn process_prediction(&mut self, prediction: RawPrediction, now: Instant) -> Vec<EngineEvent> {
        let threshold = self.gateway.config().confidence_threshold;
        let gated = gateway::gate(prediction, threshold);
        self.engine.push_label(&gated.label, now)
    }

    fn classify(&mut self, frame: &HandFrame) -> String {
        if frame.hands.is_empty() {
            return String::new();
        }
        match landmarks::normalize(frame) {
            Ok(features) => self.gateway.classify(features).label,
            Err(e) => {
                self.malformed_frames += 1;
                debug!("dropping frame: {}", e);
                String::new()
            }
        }
    }

    pub fn poll(&mut self, now: Instant) -> Option<FlushReport> {
        self.engine.poll(now)
    }

    pub fn stop(&mut self) -> FlushReport {
        self.engine.stop()
    }

    pub fn reset(&mut self) {
        self.engine.reset();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.engine.next_deadline()
    }

    pub fn transcript(&self) -> &[String] {
        self.engine.transcript()
    }

    pub fn engine(&self) -> &TokenEngine {
        &self.engine
    }

    pub fn gateway_stats(&self) -> GatewayStats {
        self.gateway.stats()
    }

    /// Frames rejected by the normalizer.
    pub fn malformed_frames(&self) -> u64 {
        self.malformed_frames
    }
}
