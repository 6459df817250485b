//! Data types passed between pipeline stations.

use crate::classifier::RawPrediction;
use crate::landmarks::{FeatureVector, HandFrame};
use std::time::Instant;

/// A payload or an in-band reset.
///
/// Resets travel through the same channels as frames, so a reset is applied
/// after every frame sent before it and before every frame sent after it.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem<T> {
    Item(T),
    Reset,
}

impl<T> StreamItem<T> {
    /// Applies `f` to the payload, passing resets through.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StreamItem<U> {
        match self {
            StreamItem::Item(item) => StreamItem::Item(f(item)),
            StreamItem::Reset => StreamItem::Reset,
        }
    }
}

/// A hand frame as it enters the pipeline.
#[derive(Debug, Clone)]
pub struct TimedFrame {
    pub frame: HandFrame,
    /// When the frame was captured.
    pub at: Instant,
    /// Prediction made upstream (replays); skips the classifier but not the gate.
    pub prediction: Option<RawPrediction>,
}

impl TimedFrame {
    pub fn new(frame: HandFrame, at: Instant) -> Self {
        Self {
            frame,
            at,
            prediction: None,
        }
    }

    pub fn with_prediction(mut self, prediction: RawPrediction) -> Self {
        self.prediction = Some(prediction);
        self
    }
}

/// Normalizer output.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    /// `None` when there was nothing to classify (no hands, or a malformed frame).
    pub features: Option<FeatureVector>,
    pub at: Instant,
    pub prediction: Option<RawPrediction>,
}

/// Gated label for one frame; empty means nothing was recognized.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelFrame {
    pub label: String,
    pub confidence: f32,
    pub at: Instant,
}
