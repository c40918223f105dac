//! Generator trait: the seam to whatever produces AI content
//!
//! The engine never talks to a model directly. A `Generator` receives a
//! request carrying the rendered context bundle and returns a typed
//! response; parsing model output into that shape is the generator's job.

use super::types::{GenerationKind, GenerationRequest, GenerationResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Errors from generator operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("generator not available: {0}")]
    Unavailable(String),
    #[error("generation cancelled")]
    Cancelled,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("generation failed: {0}")]
    Failed(String),
}

/// Client trait for AI generation.
///
/// Abstracts over transport so the pipeline doesn't depend on how the
/// model is reached.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Check if the generator is reachable.
    async fn is_available(&self) -> bool;

    /// Produce content for one request.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError>;
}

/// Mock generator for testing; returns preconfigured responses per kind.
pub struct MockGenerator {
    available: bool,
    responses: HashMap<GenerationKind, Result<GenerationResponse, GenerationError>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    /// Create a mock generator that reports as available.
    pub fn available() -> Self {
        Self {
            available: true,
            responses: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock generator that reports as unavailable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    /// Register the response for a request kind.
    pub fn with_response(mut self, response: GenerationResponse) -> Self {
        self.responses.insert(response.kind(), Ok(response));
        self
    }

    /// Register a failure for a request kind.
    pub fn with_failure(mut self, kind: GenerationKind, error: GenerationError) -> Self {
        self.responses.insert(kind, Err(error));
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        if !self.available {
            return Err(GenerationError::Unavailable(
                "mock generator configured as unavailable".to_string(),
            ));
        }

        match self.responses.get(&request.kind) {
            Some(result) => result.clone(),
            None => Err(GenerationError::Failed(format!(
                "no mock response for kind '{}'",
                request.kind
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;

    fn request(kind: GenerationKind) -> GenerationRequest {
        GenerationRequest {
            node_id: NodeId::from("n"),
            kind,
            prompt: "p".into(),
            context: "ctx".into(),
            model_id: None,
            max_children: None,
        }
    }

    #[tokio::test]
    async fn mock_available_generator_returns_response() {
        let generator =
            MockGenerator::available().with_response(GenerationResponse::Description("A port town".into()));

        assert!(generator.is_available().await);

        let response = generator.generate(&request(GenerationKind::Description)).await.unwrap();
        assert_eq!(response, GenerationResponse::Description("A port town".into()));
        assert_eq!(generator.requests().len(), 1);
    }

    #[tokio::test]
    async fn mock_unavailable_generator_returns_error() {
        let generator = MockGenerator::unavailable();

        assert!(!generator.is_available().await);

        let err = generator.generate(&request(GenerationKind::Children)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Unavailable(_)));
    }

    #[tokio::test]
    async fn mock_missing_kind_fails() {
        let generator = MockGenerator::available();

        let err = generator.generate(&request(GenerationKind::Properties)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Failed(_)));
    }

    #[tokio::test]
    async fn mock_configured_failure_is_returned() {
        let generator = MockGenerator::available().with_failure(GenerationKind::Children, GenerationError::Cancelled);

        let err = generator.generate(&request(GenerationKind::Children)).await.unwrap_err();
        assert_eq!(err, GenerationError::Cancelled);
    }
}
