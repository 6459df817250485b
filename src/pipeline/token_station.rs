//! Token station: gated labels to settlements and word flushes.
//!
//! Owns the session's [`TokenEngine`], so every mutation of the stabilizer
//! window and the letter buffer happens on this station's thread. The idle
//! flush is driven through the runner's timeout hook; the stop flush is sent
//! from `shutdown` through a dedicated flush channel.

use crate::clock::Clock;
use crate::engine::{EngineEvent, TokenEngine};
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::{LabelFrame, StreamItem};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct TokenStation {
    engine: TokenEngine,
    clock: Arc<dyn Clock>,
    flush_tx: Option<Sender<Vec<EngineEvent>>>,
}

impl TokenStation {
    pub fn new(engine: TokenEngine, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            clock,
            flush_tx: None,
        }
    }

    /// Set the output channel used to deliver the stop flush on shutdown.
    pub fn with_flush_tx(mut self, tx: Sender<Vec<EngineEvent>>) -> Self {
        self.flush_tx = Some(tx);
        self
    }

    pub fn engine(&self) -> &TokenEngine {
        &self.engine
    }
}

fn non_empty(events: Vec<EngineEvent>) -> Option<Vec<EngineEvent>> {
    (!events.is_empty()).then_some(events)
}

impl Station for TokenStation {
    type Input = StreamItem<LabelFrame>;
    type Output = Vec<EngineEvent>;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError> {
        match input {
            StreamItem::Item(frame) => Ok(non_empty(self.engine.push_label(&frame.label, frame.at))),
            StreamItem::Reset => {
                self.engine.reset();
                Ok(None)
            }
        }
    }

    fn name(&self) -> &'static str {
        "tokens"
    }

    fn timeout(&self) -> Option<Duration> {
        self.engine
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(self.clock.now()))
    }

    fn on_timeout(&mut self) -> Result<Option<Self::Output>, StationError> {
        let now = self.clock.now();
        Ok(self
            .engine
            .poll(now)
            .map(|report| vec![EngineEvent::Flushed(report)]))
    }

    fn shutdown(&mut self) {
        let report = self.engine.stop();
        if let Some(tx) = self.flush_tx.take()
            && tx.send(vec![EngineEvent::Flushed(report)]).is_err()
        {
            warn!("token station shutdown: output receiver already dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::dictionary::Dictionary;
    use crate::engine::{EngineConfig, FlushTrigger};
    use crossbeam_channel::bounded;
    use std::time::Instant;

    fn station(clock: &MockClock) -> TokenStation {
        let dictionary = Arc::new(Dictionary::from_words(["HI"]));
        let engine = TokenEngine::new(EngineConfig::default(), dictionary);
        TokenStation::new(engine, Arc::new(clock.clone()))
    }

    fn label(label: &str, at: Instant) -> StreamItem<LabelFrame> {
        StreamItem::Item(LabelFrame {
            label: label.to_string(),
            confidence: 0.99,
            at,
        })
    }

    /// Settles "H" then "I" using the mock clock's time.
    fn sign_hi(station: &mut TokenStation, clock: &MockClock) {
        for letter in ["H", "I"] {
            for _ in 0..4 {
                station.process(label(letter, clock.now())).unwrap();
                clock.advance_ms(10);
            }
            clock.advance_ms(600);
        }
    }

    #[test]
    fn settlement_is_emitted() {
        let clock = MockClock::new();
        let mut station = station(&clock);
        let mut outputs = Vec::new();
        for _ in 0..4 {
            if let Some(events) = station.process(label("H", clock.now())).unwrap() {
                outputs.extend(events);
            }
        }
        assert_eq!(outputs.len(), 1);
        assert!(matches!(&outputs[0], EngineEvent::Settled { token, .. } if token == "H"));
    }

    #[test]
    fn no_timeout_without_pending_tokens() {
        let clock = MockClock::new();
        let station = station(&clock);
        assert_eq!(station.timeout(), None);
    }

    #[test]
    fn timeout_counts_down_to_idle_flush() {
        let clock = MockClock::new();
        let mut station = station(&clock);
        sign_hi(&mut station, &clock);

        // "I" settled at 660ms and the clock is at 1280ms: 880ms of the
        // 1500ms idle period remain.
        assert_eq!(station.timeout(), Some(Duration::from_millis(880)));
        assert!(station.on_timeout().unwrap().is_none());

        clock.advance_ms(880);
        assert_eq!(station.timeout(), Some(Duration::ZERO));
        let events = station.on_timeout().unwrap().unwrap();
        match &events[..] {
            [EngineEvent::Flushed(report)] => {
                assert_eq!(report.trigger, FlushTrigger::Idle);
                assert_eq!(report.settled_words, vec!["HI"]);
            }
            other => panic!("Expected one idle flush, got {:?}", other),
        }
        assert_eq!(station.timeout(), None);
    }

    #[test]
    fn reset_discards_pending_buffer() {
        let clock = MockClock::new();
        let mut station = station(&clock);
        sign_hi(&mut station, &clock);
        assert!(station.process(StreamItem::Reset).unwrap().is_none());
        assert_eq!(station.engine().buffer(), "");
        assert_eq!(station.timeout(), None);
    }

    #[test]
    fn shutdown_sends_stop_flush() {
        let clock = MockClock::new();
        let (tx, rx) = bounded(1);
        let mut station = station(&clock).with_flush_tx(tx);
        sign_hi(&mut station, &clock);

        station.shutdown();
        let events = rx.try_recv().unwrap();
        match &events[..] {
            [EngineEvent::Flushed(report)] => {
                assert_eq!(report.trigger, FlushTrigger::Stop);
                assert_eq!(report.settled_words, vec!["HI"]);
            }
            other => panic!("Expected one stop flush, got {:?}", other),
        }
    }

    #[test]
    fn shutdown_with_dropped_receiver_does_not_panic() {
        let clock = MockClock::new();
        let (tx, rx) = bounded(1);
        let mut station = station(&clock).with_flush_tx(tx);
        drop(rx);
        station.shutdown();
    }
}
