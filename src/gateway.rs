//! Classification gateway: bounded-time classifier calls plus the confidence gate.
//!
//! The classifier runs on its own worker thread. Each request carries a
//! sequence number and the caller waits at most `timeout` for the matching
//! answer; anything late is discarded when it eventually arrives. Failures,
//! timeouts and a busy worker all come back as an empty label.

use crate::classifier::{Classifier, RawPrediction};
use crate::defaults;
use crate::error::{Result, SignstreamError};
use crate::landmarks::FeatureVector;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded, unbounded};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Gateway settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatewayConfig {
    /// Predictions at or below this confidence become empty labels.
    pub confidence_threshold: f32,
    /// Longest the caller waits for one classification.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: defaults::CONFIDENCE_THRESHOLD,
            timeout: Duration::from_millis(defaults::CLASSIFIER_TIMEOUT_MS),
        }
    }
}

/// Gated classification for one frame. An empty label means "no confident prediction".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// The "nothing recognized" result.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.label.is_empty()
    }
}

/// Applies the confidence gate to a raw prediction.
///
/// Labels are trimmed and uppercased; a blank label or a confidence at or
/// below `threshold` yields an empty label (the confidence is kept for logs).
pub fn gate(raw: RawPrediction, threshold: f32) -> ClassificationResult {
    let label = raw.label.trim();
    // NaN confidence fails this comparison and is gated too.
    let confident = raw.confidence > threshold;
    if !confident || label.is_empty() {
        return ClassificationResult {
            label: String::new(),
            confidence: raw.confidence,
        };
    }
    ClassificationResult::new(label.to_uppercase(), raw.confidence)
}

/// Running counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    pub requests: u64,
    /// Answers dropped by the confidence gate.
    pub gated: u64,
    /// Classifier errors or a vanished worker.
    pub failures: u64,
    pub timeouts: u64,
    /// Frames skipped because the worker was still busy with a late request.
    pub busy: u64,
}

struct Request {
    seq: u64,
    features: FeatureVector,
}

struct Response {
    seq: u64,
    result: Result<RawPrediction>,
}

/// Sends feature vectors to a [`Classifier`] and gates the answers.
pub struct ClassificationGateway {
    config: GatewayConfig,
    classifier_name: String,
    request_tx: Sender<Request>,
    response_rx: Receiver<Response>,
    next_seq: u64,
    consecutive_failures: u32,
    stats: GatewayStats,
}

impl ClassificationGateway {
    /// Spawns the classifier worker thread.
    pub fn new(classifier: Arc<dyn Classifier>, config: GatewayConfig) -> Result<Self> {
        // One queued request at most: a stalled classifier must not build a backlog.
        let (request_tx, request_rx) = bounded::<Request>(1);
        let (response_tx, response_rx) = unbounded::<Response>();
        let classifier_name = classifier.name().to_string();

        thread::Builder::new()
            .name(format!("classifier-{}", classifier_name))
            .spawn(move || {
                while let Ok(request) = request_rx.recv() {
                    let result = classifier.classify(&request.features);
                    let response = Response {
                        seq: request.seq,
                        result,
                    };
                    if response_tx.send(response).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            config,
            classifier_name,
            request_tx,
            response_rx,
            next_seq: 0,
            consecutive_failures: 0,
            stats: GatewayStats::default(),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn stats(&self) -> GatewayStats {
        self.stats
    }

    /// Classifies one frame. Never fails: every problem becomes an empty label.
    pub fn classify(&mut self, features: FeatureVector) -> ClassificationResult {
        self.stats.requests += 1;
        let seq = self.next_seq;
        self.next_seq += 1;

        self.drain_stale();

        match self.request_tx.try_send(Request { seq, features }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.stats.busy += 1;
                debug!(classifier = %self.classifier_name, seq, "classifier busy, frame skipped");
                return ClassificationResult::empty();
            }
            Err(TrySendError::Disconnected(_)) => {
                self.stats.failures += 1;
                self.note_failure("classifier worker stopped");
                return ClassificationResult::empty();
            }
        }

        let deadline = Instant::now() + self.config.timeout;
        loop {
            match self.response_rx.recv_deadline(deadline) {
                Ok(response) if response.seq == seq => return self.finish(response.result),
                Ok(stale) => {
                    debug!(seq = stale.seq, "discarding late classifier answer");
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.stats.timeouts += 1;
                    let err = SignstreamError::ClassifierTimeout {
                        timeout_ms: self.config.timeout.as_millis() as u64,
                    };
                    self.note_failure(&err.to_string());
                    return ClassificationResult::empty();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.stats.failures += 1;
                    self.note_failure("classifier worker stopped");
                    return ClassificationResult::empty();
                }
            }
        }
    }

    fn drain_stale(&mut self) {
        while let Ok(stale) = self.response_rx.try_recv() {
            debug!(seq = stale.seq, "discarding late classifier answer");
        }
    }

    fn finish(&mut self, result: Result<RawPrediction>) -> ClassificationResult {
        match result {
            Ok(raw) => {
                if self.consecutive_failures > 0 {
                    info!(
                        classifier = %self.classifier_name,
                        after = self.consecutive_failures,
                        "classifier recovered"
                    );
                    self.consecutive_failures = 0;
                }
                let gated = gate(raw, self.config.confidence_threshold);
                if gated.is_empty() {
                    self.stats.gated += 1;
                }
                gated
            }
            Err(e) => {
                self.stats.failures += 1;
                self.note_failure(&e.to_string());
                ClassificationResult::empty()
            }
        }
    }

    /// Warns once per failure streak; later failures in the streak go to debug.
    fn note_failure(&mut self, reason: &str) {
        self.consecutive_failures += 1;
        if self.consecutive_failures == 1 {
            warn!(classifier = %self.classifier_name, "classification failed: {}", reason);
        } else {
            debug!(
                classifier = %self.classifier_name,
                streak = self.consecutive_failures,
                "classification failed: {}",
                reason
            );
        }
    }
}

impl std::fmt::Debug for ClassificationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationGateway")
            .field("classifier", &self.classifier_name)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
