//! JSON-lines frame source.
//!
//! One object per line:
//!
//! ```json
//! {"t_ms": 0, "hands": [{"handedness": "Right", "score": 0.98, "landmarks": [[0.5, 0.5, 0.0], ...]}]}
//! {"t_ms": 33, "hands": [], "label": "A", "confidence": 0.97}
//! ```
//!
//! Records carrying a `label` were classified upstream and skip the
//! classifier. `t_ms` is relative to the start of the recording and is mapped
//! onto a base [`Instant`], so a replay settles and flushes exactly the same
//! way every time.

use crate::classifier::RawPrediction;
use crate::engine::{EngineEvent, Session};
use crate::error::{Result, SignstreamError};
use crate::landmarks::{DetectedHand, HandFrame, Handedness, Landmark};
use crate::pipeline::TimedFrame;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Confidence assumed for an upstream label recorded without one.
const RECORDED_LABEL_CONFIDENCE: f32 = 1.0;

/// One recorded frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Milliseconds since the start of the recording.
    pub t_ms: u64,
    #[serde(default)]
    pub hands: Vec<HandRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// A hand as written by the detector: landmarks are `[x, y, z]` triples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandRecord {
    pub handedness: Handedness,
    #[serde(default = "full_score")]
    pub score: f32,
    pub landmarks: Vec<[f32; 3]>,
}

fn full_score() -> f32 {
    1.0
}

impl From<&HandRecord> for DetectedHand {
    fn from(record: &HandRecord) -> Self {
        let landmarks = record
            .landmarks
            .iter()
            .map(|&[x, y, z]| Landmark::new(x, y, z))
            .collect();
        DetectedHand {
            handedness: record.handedness,
            score: record.score,
            landmarks,
        }
    }
}

impl FrameRecord {
    pub fn hand_frame(&self) -> HandFrame {
        HandFrame::new(self.hands.iter().map(DetectedHand::from).collect())
    }

    /// The upstream prediction, if this record carries one.
    pub fn prediction(&self) -> Option<RawPrediction> {
        self.label.as_ref().map(|label| {
            RawPrediction::new(
                label.clone(),
                self.confidence.unwrap_or(RECORDED_LABEL_CONFIDENCE),
            )
        })
    }

    /// Capture time relative to `base`.
    pub fn at(&self, base: Instant) -> Instant {
        base + Duration::from_millis(self.t_ms)
    }

    pub fn timed_frame(&self, base: Instant) -> TimedFrame {
        let frame = TimedFrame::new(self.hand_frame(), self.at(base));
        match self.prediction() {
            Some(prediction) => frame.with_prediction(prediction),
            None => frame,
        }
    }
}

/// Iterator over the records of a JSON-lines stream.
///
/// Blank lines and lines starting with `#` are skipped. Errors carry the
/// 1-based line number.
pub struct FrameReader<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Result<FrameRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line += 1,
                Err(e) => {
                    self.line += 1;
                    return Some(Err(e.into()));
                }
            }
            let text = self.buf.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            return Some(serde_json::from_str(text).map_err(|e| SignstreamError::FrameDecode {
                line: self.line,
                message: e.to_string(),
            }));
        }
    }
}

/// Reads every record, stopping at the first malformed line.
pub fn read_frames(reader: impl BufRead) -> Result<Vec<FrameRecord>> {
    FrameReader::new(reader).collect()
}

/// Drives `session` through a recording and finishes with a Stop flush.
///
/// Timestamps that go backwards are clamped to the previous frame so the
/// cooldowns never see time run in reverse.
pub fn replay<I>(session: &mut Session, records: I, base: Instant) -> Result<Vec<EngineEvent>>
where
    I: IntoIterator<Item = Result<FrameRecord>>,
{
    let mut events = Vec::new();
    let mut last = base;
    let mut frames = 0usize;

    for record in records {
        let record = record?;
        let mut at = record.at(base);
        if at < last {
            warn!("frame at {}ms goes back in time, clamping", record.t_ms);
            at = last;
        }
        last = at;
        frames += 1;

        let produced = match record.prediction() {
            Some(prediction) => session.process_prediction(prediction, at),
            None => session.process_frame(&record.hand_frame(), at),
        };
        events.extend(produced);
    }

    events.push(EngineEvent::Flushed(session.stop()));
    debug!("replayed {} frames, {} events", frames, events.len());
    Ok(events)
}
