use crate::engine::{EngineEvent, FlushReport};
use crate::error::Result;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use serde::Serialize;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::warn;

/// Pluggable output handler for engine events.
pub trait WordSink: Send + 'static {
    /// Handle one event. Called in the order events were produced.
    fn handle(&mut self, event: &EngineEvent) -> Result<()>;

    /// Called on pipeline shutdown. Returns every word settled during the run.
    fn finish(&mut self) -> Vec<String> {
        Vec::new()
    }

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Station wrapper for any WordSink implementation.
pub(crate) struct SinkStation {
    sink: Box<dyn WordSink>,
    result_tx: Option<crossbeam_channel::Sender<Vec<String>>>,
}

impl SinkStation {
    pub(crate) fn new(
        sink: Box<dyn WordSink>,
        result_tx: crossbeam_channel::Sender<Vec<String>>,
    ) -> Self {
        Self {
            sink,
            result_tx: Some(result_tx),
        }
    }
}

impl Station for SinkStation {
    type Input = Vec<EngineEvent>;
    type Output = ();

    fn name(&self) -> &'static str {
        self.sink.name()
    }

    fn process(&mut self, events: Vec<EngineEvent>) -> std::result::Result<Option<()>, StationError> {
        for event in &events {
            self.sink
                .handle(event)
                .map_err(|e| StationError::Recoverable(format!("sink failed: {}", e)))?;
        }
        Ok(None)
    }

    fn shutdown(&mut self) {
        let words = self.sink.finish();
        if let Some(tx) = self.result_tx.take()
            && tx.send(words).is_err()
        {
            warn!("sink shutdown: result receiver already dropped");
        }
    }
}

/// Words settled by a list of flush reports, in order.
fn settled_words<'a>(reports: impl IntoIterator<Item = &'a FlushReport>) -> Vec<String> {
    reports
        .into_iter()
        .flat_map(|report| report.settled_words.iter().cloned())
        .collect()
}

/// Sink that records every event, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded events.
    pub fn events(&self) -> Arc<Mutex<Vec<EngineEvent>>> {
        Arc::clone(&self.events)
    }

    /// Copy of the flush reports seen so far.
    pub fn reports(&self) -> Vec<FlushReport> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Flushed(report) => Some(report.clone()),
                EngineEvent::Settled { .. } => None,
            })
            .collect()
    }
}

impl WordSink for CollectorSink {
    fn handle(&mut self, event: &EngineEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }

    fn finish(&mut self) -> Vec<String> {
        settled_words(&self.reports())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum JsonEvent<'a> {
    Settled { token: &'a str, at_ms: u64 },
    Flush(&'a FlushReport),
}

/// Sink that writes one JSON object per event.
///
/// Settlement times are milliseconds since `origin`.
pub struct JsonLinesSink<W: Write + Send + 'static> {
    writer: W,
    origin: Instant,
    words: Vec<String>,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    pub fn new(writer: W, origin: Instant) -> Self {
        Self {
            writer,
            origin,
            words: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send + 'static> WordSink for JsonLinesSink<W> {
    fn handle(&mut self, event: &EngineEvent) -> Result<()> {
        let json = match event {
            EngineEvent::Settled { token, at } => JsonEvent::Settled {
                token,
                at_ms: at.saturating_duration_since(self.origin).as_millis() as u64,
            },
            EngineEvent::Flushed(report) => {
                self.words.extend(report.settled_words.iter().cloned());
                JsonEvent::Flush(report)
            }
        };
        let line = serde_json::to_string(&json)
            .map_err(|e| crate::error::SignstreamError::Other(e.to_string()))?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Vec<String> {
        std::mem::take(&mut self.words)
    }

    fn name(&self) -> &'static str {
        "json-lines"
    }
}
