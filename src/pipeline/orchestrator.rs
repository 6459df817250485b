//! Threaded pipeline: frames → normalizer → gateway → tokens → sink.

use crate::classifier::Classifier;
use crate::clock::{Clock, SystemClock};
use crate::defaults;
use crate::dictionary::Dictionary;
use crate::engine::{EngineConfig, TokenEngine};
use crate::error::{Result, SignstreamError};
use crate::gateway::{ClassificationGateway, GatewayConfig};
use crate::landmarks::HandFrame;
use crate::pipeline::error::{ErrorReporter, LogReporter};
use crate::pipeline::gateway_station::GatewayStation;
use crate::pipeline::normalizer_station::NormalizerStation;
use crate::pipeline::sink::{SinkStation, WordSink};
use crate::pipeline::station::StationRunner;
use crate::pipeline::token_station::TokenStation;
use crate::pipeline::types::{StreamItem, TimedFrame};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, warn};

/// Configuration for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub gateway: GatewayConfig,
    pub engine: EngineConfig,
    /// Capacity of each inter-station channel.
    pub buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            engine: EngineConfig::default(),
            buffer: defaults::STATION_BUFFER,
        }
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    input_tx: Option<Sender<StreamItem<TimedFrame>>>,
    clock: Arc<dyn Clock>,
    /// Join handles for spawned threads
    threads: Vec<JoinHandle<()>>,
    /// Receiver for the sink's finish() result
    result_rx: Option<Receiver<Vec<String>>>,
}

impl PipelineHandle {
    fn input(&self) -> Result<&Sender<StreamItem<TimedFrame>>> {
        self.input_tx
            .as_ref()
            .ok_or_else(|| SignstreamError::Other("pipeline already stopped".to_string()))
    }

    fn push(&self, item: StreamItem<TimedFrame>) -> Result<()> {
        self.input()?
            .send(item)
            .map_err(|_| SignstreamError::Other("pipeline input closed".to_string()))
    }

    /// Sends a frame stamped with the pipeline clock.
    ///
    /// Blocks while the first station's buffer is full so no frame is lost.
    pub fn send(&self, frame: HandFrame) -> Result<()> {
        self.send_frame(TimedFrame::new(frame, self.clock.now()))
    }

    /// Sends a frame with its own timestamp and optional precomputed prediction.
    pub fn send_frame(&self, frame: TimedFrame) -> Result<()> {
        self.push(StreamItem::Item(frame))
    }

    /// Discards the session's buffer, window and transcript.
    ///
    /// Ordered with respect to frames: everything sent before the reset is
    /// processed first.
    pub fn reset(&self) -> Result<()> {
        self.push(StreamItem::Reset)
    }

    /// Stops the pipeline: the pending buffer is flushed to the sink, and the
    /// sink's settled words are returned.
    ///
    /// Waits up to 5s for the result, then 1s for threads to finish.
    /// After the deadline, remaining threads are detached.
    pub fn stop(mut self) -> Vec<String> {
        // Closing the input cascades shutdown through every station in order.
        self.input_tx = None;

        let result = self
            .result_rx
            .take()
            .and_then(|rx| rx.recv_timeout(Duration::from_secs(5)).ok())
            .unwrap_or_default();

        let deadline = Instant::now() + Duration::from_secs(1);
        let poll_interval = Duration::from_millis(20);

        loop {
            let mut remaining = Vec::new();
            for handle in self.threads.drain(..) {
                if handle.is_finished() {
                    if let Err(panic_info) = handle.join() {
                        let msg = panic_info
                            .downcast_ref::<&str>()
                            .copied()
                            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                            .unwrap_or("unknown panic");
                        error!("pipeline thread panicked: {msg}");
                    }
                } else {
                    remaining.push(handle);
                }
            }
            self.threads = remaining;

            if self.threads.is_empty() {
                break;
            }

            if Instant::now() >= deadline {
                warn!(
                    threads = self.threads.len(),
                    "shutdown timeout, detaching threads still running"
                );
                break;
            }

            thread::sleep(poll_interval);
        }

        result
    }
}

/// Gesture pipeline: frames → normalizer → gateway → tokens → WordSink.
pub struct Pipeline {
    config: PipelineConfig,
    error_reporter: Arc<dyn ErrorReporter>,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    /// Creates a new pipeline with default error reporter.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            error_reporter: Arc::new(LogReporter),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Sets a custom clock (for deterministic testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Starts the pipeline.
    ///
    /// # Arguments
    /// * `classifier` - Gesture classifier behind the gateway
    /// * `dictionary` - Shared word set
    /// * `sink` - Output handler (collector, JSON lines, terminal)
    ///
    /// # Returns
    /// Handle to feed frames into and stop the pipeline
    pub fn start(
        self,
        classifier: Arc<dyn Classifier>,
        dictionary: Arc<Dictionary>,
        sink: Box<dyn WordSink>,
    ) -> Result<PipelineHandle> {
        let buffer = self.config.buffer.max(1);
        let (input_tx, input_rx) = bounded(buffer);
        let (feature_tx, feature_rx) = bounded(buffer);
        let (label_tx, label_rx) = bounded(buffer);
        let (event_tx, event_rx) = bounded(buffer);
        let (unit_tx, unit_rx) = bounded::<()>(1);
        let (result_tx, result_rx) = bounded(1);

        let gateway = ClassificationGateway::new(classifier, self.config.gateway)?;
        let engine = TokenEngine::new(self.config.engine, dictionary);
        let token_station =
            TokenStation::new(engine, Arc::clone(&self.clock)).with_flush_tx(event_tx.clone());

        let normalizer_runner = StationRunner::spawn(
            NormalizerStation::new(),
            input_rx,
            feature_tx,
            Arc::clone(&self.error_reporter),
        );
        let gateway_runner = StationRunner::spawn(
            GatewayStation::new(gateway),
            feature_rx,
            label_tx,
            Arc::clone(&self.error_reporter),
        );
        let token_runner = StationRunner::spawn(
            token_station,
            label_rx,
            event_tx,
            Arc::clone(&self.error_reporter),
        );
        // The sink never produces output; its channel only exists to satisfy the runner.
        let sink_runner = StationRunner::spawn(
            SinkStation::new(sink, result_tx),
            event_rx,
            unit_tx,
            Arc::clone(&self.error_reporter),
        );
        drop(unit_rx);

        let threads = vec![
            thread::spawn(move || {
                if let Err(msg) = normalizer_runner.join() {
                    error!("{msg}");
                }
            }),
            thread::spawn(move || {
                if let Err(msg) = gateway_runner.join() {
                    error!("{msg}");
                }
            }),
            thread::spawn(move || {
                if let Err(msg) = token_runner.join() {
                    error!("{msg}");
                }
            }),
            thread::spawn(move || {
                if let Err(msg) = sink_runner.join() {
                    error!("{msg}");
                }
            }),
        ];

        Ok(PipelineHandle {
            input_tx: Some(input_tx),
            clock: self.clock,
            threads,
            result_rx: Some(result_rx),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{MockClassifier, RawPrediction};
    use crate::clock::MockClock;
    use crate::engine::{EngineEvent, FlushTrigger};
    use crate::landmarks::{DetectedHand, Handedness, Landmark};
    use crate::pipeline::sink::CollectorSink;

    fn dictionary() -> Arc<Dictionary> {
        Arc::new(Dictionary::from_words(["HI", "HELLO"]))
    }

    /// Sends four frames per letter carrying precomputed predictions.
    fn sign(handle: &PipelineHandle, base: Instant, letters: &str) {
        let mut t = 0;
        for letter in letters.chars() {
            for _ in 0..4 {
                let frame = TimedFrame::new(HandFrame::empty(), base + Duration::from_millis(t))
                    .with_prediction(RawPrediction::new(letter.to_string(), 0.99));
                handle.send_frame(frame).unwrap();
                t += 10;
            }
            t += 600;
        }
    }

    #[test]
    fn stop_flushes_pending_letters_to_sink() {
        let clock = MockClock::new();
        let sink = CollectorSink::new();
        let reports = sink.clone();
        let handle = Pipeline::new(PipelineConfig::default())
            .with_clock(Arc::new(clock.clone()))
            .start(
                Arc::new(MockClassifier::new("unused")),
                dictionary(),
                Box::new(sink),
            )
            .unwrap();

        sign(&handle, clock.now(), "HIX");
        let words = handle.stop();

        assert_eq!(words, vec!["HI"]);
        let reports = reports.reports();
        let last = reports.last().unwrap();
        assert_eq!(last.trigger, FlushTrigger::Stop);
        assert_eq!(last.remainder, "X");
    }

    #[test]
    fn settlements_arrive_in_order() {
        let clock = MockClock::new();
        let sink = CollectorSink::new();
        let events = sink.events();
        let handle = Pipeline::new(PipelineConfig::default())
            .with_clock(Arc::new(clock.clone()))
            .start(
                Arc::new(MockClassifier::new("unused")),
                dictionary(),
                Box::new(sink),
            )
            .unwrap();

        sign(&handle, clock.now(), "HELO");
        handle.stop();

        let tokens: Vec<String> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Settled { token, .. } => Some(token.clone()),
                EngineEvent::Flushed(_) => None,
            })
            .collect();
        assert_eq!(tokens, vec!["H", "E", "L", "O"]);
    }

    #[test]
    fn reset_discards_frames_sent_before_it() {
        let clock = MockClock::new();
        let sink = CollectorSink::new();
        let handle = Pipeline::new(PipelineConfig::default())
            .with_clock(Arc::new(clock.clone()))
            .start(
                Arc::new(MockClassifier::new("unused")),
                dictionary(),
                Box::new(sink),
            )
            .unwrap();

        sign(&handle, clock.now(), "HELLO");
        handle.reset().unwrap();
        let words = handle.stop();
        assert!(words.is_empty());
    }

    #[test]
    fn classifier_frames_flow_through_gateway() {
        let clock = MockClock::new();
        let sink = CollectorSink::new();
        let events = sink.events();
        let handle = Pipeline::new(PipelineConfig::default())
            .with_clock(Arc::new(clock.clone()))
            .start(
                Arc::new(MockClassifier::new("mock").with_label("h", 0.97)),
                dictionary(),
                Box::new(sink),
            )
            .unwrap();

        let landmarks = (0..21)
            .map(|i| Landmark::new(i as f32 * 0.01, 0.3, 0.0))
            .collect();
        let hand = DetectedHand::new(Handedness::Right, landmarks);
        for _ in 0..4 {
            handle.send(HandFrame::new(vec![hand.clone()])).unwrap();
            clock.advance_ms(33);
        }
        handle.stop();

        let settled = events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| matches!(event, EngineEvent::Settled { .. }))
            .count();
        assert_eq!(settled, 1);
    }

    #[test]
    fn idle_flush_fires_when_clock_passes_deadline() {
        let clock = MockClock::new();
        let sink = CollectorSink::new();
        let observer = sink.clone();
        let handle = Pipeline::new(PipelineConfig::default())
            .with_clock(Arc::new(clock.clone()))
            .start(
                Arc::new(MockClassifier::new("unused")),
                dictionary(),
                Box::new(sink),
            )
            .unwrap();

        sign(&handle, clock.now(), "HI");
        // Let both letters reach the token station before time jumps ahead.
        let settled = |sink: &CollectorSink| {
            sink.events()
                .lock()
                .unwrap()
                .iter()
                .filter(|event| matches!(event, EngineEvent::Settled { .. }))
                .count()
        };
        let waited = Instant::now();
        while settled(&observer) < 2 && waited.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(10));
        }
        clock.advance_ms(10_000);

        let waited = Instant::now();
        while observer.reports().is_empty() && waited.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(10));
        }
        let reports = observer.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].trigger, FlushTrigger::Idle);
        assert_eq!(reports[0].settled_words, vec!["HI"]);

        assert_eq!(handle.stop(), vec!["HI"]);
    }
}
