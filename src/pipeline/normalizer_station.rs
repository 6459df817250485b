//! Normalizer station: hand frames to feature vectors.

use crate::landmarks;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::{FeatureFrame, StreamItem, TimedFrame};
use tracing::debug;

/// Runs the landmark normalizer on each frame.
///
/// A malformed frame still produces an output (with no features) so the
/// stabilizer sees it as an empty label.
#[derive(Debug, Default)]
pub struct NormalizerStation {
    malformed: u64,
}

impl NormalizerStation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames rejected so far.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    fn normalize(&mut self, timed: TimedFrame) -> FeatureFrame {
        let features = if timed.prediction.is_some() || timed.frame.hands.is_empty() {
            None
        } else {
            match landmarks::normalize(&timed.frame) {
                Ok(features) => Some(features),
                Err(e) => {
                    self.malformed += 1;
                    debug!("dropping frame: {}", e);
                    None
                }
            }
        };
        FeatureFrame {
            features,
            at: timed.at,
            prediction: timed.prediction,
        }
    }
}

impl Station for NormalizerStation {
    type Input = StreamItem<TimedFrame>;
    type Output = StreamItem<FeatureFrame>;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError> {
        Ok(Some(input.map(|timed| self.normalize(timed))))
    }

    fn name(&self) -> &'static str {
        "normalizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::RawPrediction;
    use crate::landmarks::{DetectedHand, HandFrame, Handedness, Landmark};
    use std::time::Instant;

    fn features_of(output: Option<StreamItem<FeatureFrame>>) -> Option<FeatureFrame> {
        match output {
            Some(StreamItem::Item(frame)) => Some(frame),
            _ => None,
        }
    }

    fn valid_hand() -> DetectedHand {
        let landmarks = (0..21)
            .map(|i| Landmark::new(0.5 + i as f32 * 0.01, 0.5, 0.0))
            .collect();
        DetectedHand::new(Handedness::Left, landmarks)
    }

    #[test]
    fn valid_frame_yields_features() {
        let mut station = NormalizerStation::new();
        let now = Instant::now();
        let frame = TimedFrame::new(HandFrame::new(vec![valid_hand()]), now);

        let out = features_of(station.process(StreamItem::Item(frame)).unwrap()).unwrap();
        assert!(out.features.is_some());
        assert_eq!(out.at, now);
    }

    #[test]
    fn malformed_frame_passes_through_without_features() {
        let mut station = NormalizerStation::new();
        let hand = DetectedHand::new(Handedness::Right, vec![Landmark::default(); 3]);
        let frame = TimedFrame::new(HandFrame::new(vec![hand]), Instant::now());

        let out = features_of(station.process(StreamItem::Item(frame)).unwrap()).unwrap();
        assert!(out.features.is_none());
        assert_eq!(station.malformed(), 1);
    }

    #[test]
    fn empty_frame_has_nothing_to_classify() {
        let mut station = NormalizerStation::new();
        let frame = TimedFrame::new(HandFrame::empty(), Instant::now());
        let out = features_of(station.process(StreamItem::Item(frame)).unwrap()).unwrap();
        assert!(out.features.is_none());
        assert_eq!(station.malformed(), 0);
    }

    #[test]
    fn precomputed_prediction_skips_normalization() {
        let mut station = NormalizerStation::new();
        let frame = TimedFrame::new(HandFrame::new(vec![valid_hand()]), Instant::now())
            .with_prediction(RawPrediction::new("A", 0.99));
        let out = features_of(station.process(StreamItem::Item(frame)).unwrap()).unwrap();
        assert!(out.features.is_none());
        assert!(out.prediction.is_some());
    }

    #[test]
    fn reset_is_forwarded() {
        let mut station = NormalizerStation::new();
        let out = station.process(StreamItem::Reset).unwrap();
        assert!(matches!(out, Some(StreamItem::Reset)));
    }
}
