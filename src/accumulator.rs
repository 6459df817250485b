//! Token accumulator: the pending letter buffer and its idle deadline.
//!
//! The idle timer is an explicit `Instant`, re-armed on every append and
//! disarmed when it fires, on stop, and on reset. Callers poll it with the
//! current time; nothing here reads the clock.

use crate::defaults;
use crate::dictionary::Dictionary;
use crate::segmenter::{self, SegmentationResult};
use std::time::{Duration, Instant};
use tracing::debug;

/// Accumulator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatorConfig {
    /// Quiet period after the last token before the buffer is flushed.
    pub idle_flush: Duration,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            idle_flush: Duration::from_millis(defaults::IDLE_FLUSH_MS),
        }
    }
}

/// Buffer of settled tokens awaiting segmentation.
#[derive(Debug, Default)]
pub struct TokenAccumulator {
    config: AccumulatorConfig,
    buffer: String,
    idle_deadline: Option<Instant>,
}

impl TokenAccumulator {
    pub fn new(config: AccumulatorConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
            idle_deadline: None,
        }
    }

    /// Appends a settled token and re-arms the idle deadline.
    pub fn append(&mut self, token: &str, now: Instant) {
        self.buffer.push_str(token);
        self.idle_deadline = Some(now + self.config.idle_flush);
    }

    /// Instant at which the idle flush becomes due, if armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.idle_deadline
    }

    /// Whether the idle flush should fire at `now`.
    pub fn idle_due(&self, now: Instant) -> bool {
        !self.buffer.is_empty() && self.idle_deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Fires the idle flush if due. Fires at most once per idle period.
    pub fn poll_idle(&mut self, now: Instant, dictionary: &Dictionary) -> Option<SegmentationResult> {
        if !self.idle_due(now) {
            return None;
        }
        debug!(buffer = %self.buffer, "idle flush");
        Some(self.flush(dictionary))
    }

    /// Segments the buffer, keeping only the remainder, and disarms the timer.
    pub fn flush(&mut self, dictionary: &Dictionary) -> SegmentationResult {
        self.idle_deadline = None;
        let result = segmenter::segment(&self.buffer, dictionary);
        self.buffer.clone_from(&result.remainder);
        result
    }

    /// Final flush for the end of a session; leaves the accumulator empty.
    pub fn stop(&mut self, dictionary: &Dictionary) -> SegmentationResult {
        let result = self.flush(dictionary);
        self.buffer.clear();
        result
    }

    /// Discards the buffer and cancels the idle timer.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.idle_deadline = None;
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn config(&self) -> &AccumulatorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> Dictionary {
        Dictionary::from_words(["HELLO", "GOOD", "HI"])
    }

    fn ms(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    fn append_all(acc: &mut TokenAccumulator, base: Instant, start_ms: u64, tokens: &str) {
        for (i, c) in tokens.chars().enumerate() {
            acc.append(&c.to_string(), ms(base, start_ms + i as u64 * 100));
        }
    }

    #[test]
    fn append_arms_idle_deadline() {
        let mut acc = TokenAccumulator::default();
        let base = Instant::now();
        acc.append("H", base);
        assert_eq!(acc.next_deadline(), Some(ms(base, 1500)));
        acc.append("I", ms(base, 400));
        assert_eq!(acc.next_deadline(), Some(ms(base, 1900)));
        assert_eq!(acc.buffer(), "HI");
    }

    #[test]
    fn idle_flush_waits_for_quiet_period() {
        let dict = dictionary();
        let mut acc = TokenAccumulator::default();
        let base = Instant::now();
        append_all(&mut acc, base, 0, "HELLO");

        // Last token at 400ms: not due until 1900ms.
        assert!(acc.poll_idle(ms(base, 1899), &dict).is_none());
        let result = acc.poll_idle(ms(base, 1900), &dict).unwrap();
        assert_eq!(result.settled_words, vec!["HELLO"]);
        assert!(acc.is_empty());
    }

    #[test]
    fn idle_flush_fires_once_per_idle_period() {
        let dict = dictionary();
        let mut acc = TokenAccumulator::default();
        let base = Instant::now();
        append_all(&mut acc, base, 0, "HELLOX");

        let first = acc.poll_idle(ms(base, 3000), &dict).unwrap();
        assert_eq!(first.remainder, "X");
        assert_eq!(acc.buffer(), "X");
        // The remainder stays, but the timer does not re-fire on its own.
        assert!(acc.poll_idle(ms(base, 9000), &dict).is_none());
        assert_eq!(acc.next_deadline(), None);

        acc.append("H", ms(base, 9000));
        assert!(acc.poll_idle(ms(base, 10_500), &dict).is_some());
    }

    #[test]
    fn empty_buffer_never_idle_flushes() {
        let mut acc = TokenAccumulator::default();
        assert!(!acc.idle_due(Instant::now() + Duration::from_secs(60)));
    }

    #[test]
    fn remainder_is_carried_into_next_flush() {
        let dict = dictionary();
        let mut acc = TokenAccumulator::default();
        let base = Instant::now();
        append_all(&mut acc, base, 0, "GOO");
        let first = acc.flush(&dict);
        assert!(first.settled_words.is_empty());
        assert_eq!(first.remainder, "GOO");

        acc.append("D", ms(base, 500));
        let second = acc.flush(&dict);
        assert_eq!(second.settled_words, vec!["GOOD"]);
        assert_eq!(second.remainder, "");
    }

    #[test]
    fn stop_flushes_and_clears() {
        let dict = dictionary();
        let mut acc = TokenAccumulator::default();
        append_all(&mut acc, Instant::now(), 0, "HIXY");
        let result = acc.stop(&dict);
        assert_eq!(result.settled_words, vec!["HI"]);
        assert_eq!(result.remainder, "XY");
        assert!(acc.is_empty());
        assert_eq!(acc.next_deadline(), None);
    }

    #[test]
    fn reset_cancels_pending_timer() {
        let dict = dictionary();
        let mut acc = TokenAccumulator::default();
        let base = Instant::now();
        append_all(&mut acc, base, 0, "HI");
        acc.reset();
        assert!(acc.is_empty());
        assert_eq!(acc.next_deadline(), None);
        assert!(acc.poll_idle(ms(base, 5000), &dict).is_none());
    }
}
