//! Hand landmark types and the landmark normalizer.
//!
//! The pose detector reports up to two hands per frame, each as 21 (x, y, z)
//! landmarks. The normalizer turns that into a fixed 84-value feature vector:
//! left block then right block, each made wrist-relative and scaled by the
//! largest wrist distance in the block.

use crate::defaults::{FEATURE_LEN, HAND_BLOCK_LEN, HAND_SLOTS, LANDMARKS_PER_HAND};
use crate::error::{Result, SignstreamError};
use serde::{Deserialize, Serialize};

/// Index of the wrist landmark within a hand.
pub const WRIST: usize = 0;

/// One landmark as reported by the pose detector.
///
/// `x`/`y` are image-normalized (0..1), `z` is depth relative to the wrist.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Which hand the detector believes it saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Feature-vector slot for this hand (left block first).
    pub fn slot(self) -> usize {
        match self {
            Handedness::Left => 0,
            Handedness::Right => 1,
        }
    }
}

/// A single detected hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedHand {
    pub handedness: Handedness,
    /// Detector confidence for the handedness label. Not used by the core.
    #[serde(default = "full_score")]
    pub score: f32,
    pub landmarks: Vec<Landmark>,
}

fn full_score() -> f32 {
    1.0
}

impl DetectedHand {
    pub fn new(handedness: Handedness, landmarks: Vec<Landmark>) -> Self {
        Self {
            handedness,
            score: 1.0,
            landmarks,
        }
    }
}

/// Everything the pose detector reported for one video frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandFrame {
    #[serde(default)]
    pub hands: Vec<DetectedHand>,
}

impl HandFrame {
    pub fn new(hands: Vec<DetectedHand>) -> Self {
        Self { hands }
    }

    /// A frame with no detected hands.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Fixed-length classifier input: two hand blocks of 21 (x, y) pairs.
///
/// A missing hand is an all-zero block, so the length never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f32; FEATURE_LEN],
}

impl FeatureVector {
    /// All-zero vector (no hands).
    pub fn zeros() -> Self {
        Self {
            values: [0.0; FEATURE_LEN],
        }
    }

    /// Builds a vector from exactly [`FEATURE_LEN`] values.
    pub fn from_slice(values: &[f32]) -> Result<Self> {
        let values: [f32; FEATURE_LEN] =
            values
                .try_into()
                .map_err(|_| SignstreamError::MalformedLandmarks {
                    message: format!(
                        "feature vector needs {} values, got {}",
                        FEATURE_LEN,
                        values.len()
                    ),
                })?;
        Ok(Self { values })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        FEATURE_LEN
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The 42 values belonging to one hand slot.
    pub fn hand_block(&self, slot: usize) -> &[f32] {
        let start = slot * HAND_BLOCK_LEN;
        &self.values[start..start + HAND_BLOCK_LEN]
    }

    /// True if no hand contributed to this vector.
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }
}

/// Normalizes one frame into a [`FeatureVector`].
///
/// Rejects frames with more than two hands, a hand with the wrong landmark
/// count, or any non-finite coordinate. Two hands with the same handedness
/// label fill both slots in detection order.
pub fn normalize(frame: &HandFrame) -> Result<FeatureVector> {
    if frame.hands.len() > HAND_SLOTS {
        return Err(SignstreamError::MalformedLandmarks {
            message: format!(
                "expected at most {} hands, got {}",
                HAND_SLOTS,
                frame.hands.len()
            ),
        });
    }

    let mut slots: [Option<&DetectedHand>; HAND_SLOTS] = [None; HAND_SLOTS];
    for hand in &frame.hands {
        validate_hand(hand)?;
        let preferred = hand.handedness.slot();
        let slot = if slots[preferred].is_none() {
            preferred
        } else {
            1 - preferred
        };
        slots[slot] = Some(hand);
    }

    let mut features = FeatureVector::zeros();
    for (slot, hand) in slots.iter().enumerate() {
        if let Some(hand) = hand {
            let start = slot * HAND_BLOCK_LEN;
            normalize_block(
                &hand.landmarks,
                &mut features.values[start..start + HAND_BLOCK_LEN],
            );
        }
    }
    Ok(features)
}

fn validate_hand(hand: &DetectedHand) -> Result<()> {
    if hand.landmarks.len() != LANDMARKS_PER_HAND {
        return Err(SignstreamError::MalformedLandmarks {
            message: format!(
                "expected {} landmarks, got {}",
                LANDMARKS_PER_HAND,
                hand.landmarks.len()
            ),
        });
    }
    if let Some(index) = hand.landmarks.iter().position(|lm| !lm.is_finite()) {
        return Err(SignstreamError::MalformedLandmarks {
            message: format!("non-finite coordinate at landmark {}", index),
        });
    }
    Ok(())
}

/// Writes the wrist-relative, max-norm-scaled (x, y) pairs of one hand into `out`.
fn normalize_block(landmarks: &[Landmark], out: &mut [f32]) {
    let wrist = landmarks[WRIST];
    let mut max_norm = 0.0f32;

    for (i, lm) in landmarks.iter().enumerate() {
        let dx = lm.x - wrist.x;
        let dy = lm.y - wrist.y;
        out[2 * i] = dx;
        out[2 * i + 1] = dy;
        max_norm = max_norm.max((dx * dx + dy * dy).sqrt());
    }

    // All points coincide: keep the centered (zero) block.
    if max_norm > 0.0 {
        for v in out.iter_mut() {
            *v /= max_norm;
        }
    }
}
