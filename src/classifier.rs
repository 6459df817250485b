//! Gesture classifier seam.
//!
//! The classifier itself is an external service; the core only needs a
//! label and a confidence for each feature vector.

use crate::error::{Result, SignstreamError};
use crate::landmarks::FeatureVector;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the classifier proposed for one frame, before gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPrediction {
    pub label: String,
    pub confidence: f32,
}

impl RawPrediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Trait for gesture classification.
///
/// Implementations must be idempotent and free of side effects visible to
/// the core. Errors are treated as transient by the gateway.
pub trait Classifier: Send + Sync {
    /// Classify one normalized feature vector.
    fn classify(&self, features: &FeatureVector) -> Result<RawPrediction>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// Implement Classifier for Arc<T> to allow sharing across sessions.
impl<T: Classifier + ?Sized> Classifier for Arc<T> {
    fn classify(&self, features: &FeatureVector) -> Result<RawPrediction> {
        (**self).classify(features)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock classifier for testing.
///
/// Answers with a fixed prediction, or walks through a scripted sequence
/// (repeating the last entry once exhausted).
#[derive(Debug, Clone)]
pub struct MockClassifier {
    name: String,
    script: Vec<RawPrediction>,
    cursor: Arc<AtomicUsize>,
    should_fail: bool,
    delay: Option<Duration>,
}

impl MockClassifier {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            script: vec![RawPrediction::new("", 0.0)],
            cursor: Arc::new(AtomicUsize::new(0)),
            should_fail: false,
            delay: None,
        }
    }

    /// Always answer with `label` at `confidence`.
    pub fn with_label(mut self, label: &str, confidence: f32) -> Self {
        self.script = vec![RawPrediction::new(label, confidence)];
        self
    }

    /// Answer with each prediction in turn.
    pub fn with_sequence(mut self, script: Vec<RawPrediction>) -> Self {
        if !script.is_empty() {
            self.script = script;
        }
        self
    }

    /// Fail every call.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Sleep before answering (to exercise timeouts).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls answered so far.
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl Classifier for MockClassifier {
    fn classify(&self, _features: &FeatureVector) -> Result<RawPrediction> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(SignstreamError::Classifier {
                message: "mock classifier failure".to_string(),
            });
        }
        let last = self.script.len() - 1;
        Ok(self.script[index.min(last)].clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(feature = "http-classifier")]
pub use http::HttpClassifier;

#[cfg(feature = "http-classifier")]
mod http {
    use super::*;

    #[derive(Serialize)]
    struct PredictRequest<'a> {
        features: &'a [f32],
    }

    /// Classifier service reached over HTTP.
    ///
    /// POSTs `{"features": [...84 floats]}` and expects
    /// `{"label": "A", "confidence": 0.97}` back.
    pub struct HttpClassifier {
        client: reqwest::blocking::Client,
        endpoint: String,
    }

    impl std::fmt::Debug for HttpClassifier {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("HttpClassifier")
                .field("endpoint", &self.endpoint)
                .finish_non_exhaustive()
        }
    }

    impl HttpClassifier {
        /// Creates a client whose requests give up after `timeout`.
        pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| SignstreamError::ClassifierUnavailable {
                    message: format!("failed to build HTTP client: {}", e),
                })?;
            Ok(Self {
                client,
                endpoint: endpoint.to_string(),
            })
        }
    }

    impl Classifier for HttpClassifier {
        fn classify(&self, features: &FeatureVector) -> Result<RawPrediction> {
            let body = serde_json::to_vec(&PredictRequest {
                features: features.as_slice(),
            })
            .map_err(|e| SignstreamError::Classifier {
                message: format!("failed to encode request: {}", e),
            })?;

            let response = self
                .client
                .post(&self.endpoint)
                .header("content-type", "application/json")
                .body(body)
                .send()
                .map_err(|e| SignstreamError::Classifier {
                    message: format!("request to {} failed: {}", self.endpoint, e),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(SignstreamError::Classifier {
                    message: format!("{} answered with HTTP {}", self.endpoint, status),
                });
            }

            let bytes = response.bytes().map_err(|e| SignstreamError::Classifier {
                message: format!("failed to read response: {}", e),
            })?;
            serde_json::from_slice(&bytes).map_err(|e| SignstreamError::Classifier {
                message: format!("unexpected response body: {}", e),
            })
        }

        fn name(&self) -> &str {
            "http"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn request_body_has_all_features() {
            let features = FeatureVector::zeros();
            let json = serde_json::to_string(&PredictRequest {
                features: features.as_slice(),
            })
            .unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["features"].as_array().unwrap().len(), 84);
        }

        #[test]
        fn unreachable_endpoint_is_an_error_not_a_label() {
            let classifier =
                HttpClassifier::new("http://127.0.0.1:9/predict", Duration::from_millis(200))
                    .unwrap();
            let result = classifier.classify(&FeatureVector::zeros());
            assert!(matches!(result, Err(SignstreamError::Classifier { .. })));
        }
    }
}
