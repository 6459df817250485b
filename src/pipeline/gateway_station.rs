//! Gateway station: feature vectors to gated labels.

use crate::gateway::{self, ClassificationGateway, ClassificationResult};
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::{FeatureFrame, LabelFrame, StreamItem};

/// Classifies each frame through a [`ClassificationGateway`].
#[derive(Debug)]
pub struct GatewayStation {
    gateway: ClassificationGateway,
}

impl GatewayStation {
    pub fn new(gateway: ClassificationGateway) -> Self {
        Self { gateway }
    }

    fn label(&mut self, frame: FeatureFrame) -> LabelFrame {
        let result = match (frame.prediction, frame.features) {
            (Some(prediction), _) => {
                gateway::gate(prediction, self.gateway.config().confidence_threshold)
            }
            (None, Some(features)) => self.gateway.classify(features),
            (None, None) => ClassificationResult::empty(),
        };
        LabelFrame {
            label: result.label,
            confidence: result.confidence,
            at: frame.at,
        }
    }
}

impl Station for GatewayStation {
    type Input = StreamItem<FeatureFrame>;
    type Output = StreamItem<LabelFrame>;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError> {
        Ok(Some(input.map(|frame| self.label(frame))))
    }

    fn name(&self) -> &'static str {
        "gateway"
    }

    fn shutdown(&mut self) {
        let stats = self.gateway.stats();
        tracing::debug!(
            requests = stats.requests,
            gated = stats.gated,
            failures = stats.failures,
            timeouts = stats.timeouts,
            busy = stats.busy,
            "gateway stopped"
        );
    }
}
