//! Candidate model: the personalized model under evaluation.
//!
//! The evaluation loop sends synthetic probes to the fine-tuned candidate
//! and scores its answers. The candidate is an external collaborator
//! consumed through this one narrow contract.

use async_trait::async_trait;
use std::sync::Arc;

use crate::backend::traits::{CompletionRequest, ReasoningBackend, ReasoningError};

/// The personalized model under evaluation.
#[async_trait]
pub trait CandidateModel: Send + Sync {
    /// Answer a probe as the owner's personalized model.
    async fn respond(&self, owner_context: &str, prompt: &str) -> Result<String, ReasoningError>;
}

/// Candidate backed by any [`ReasoningBackend`].
///
/// Useful before a dedicated fine-tune exists: the owner context is injected
/// as the system prompt so a base model can stand in for the candidate.
pub struct BackendCandidate {
    backend: Arc<dyn ReasoningBackend>,
}

impl BackendCandidate {
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl CandidateModel for BackendCandidate {
    async fn respond(&self, owner_context: &str, prompt: &str) -> Result<String, ReasoningError> {
        let request = CompletionRequest::user(prompt)
            .with_system(owner_context)
            .with_max_tokens(1024)
            .with_temperature(0.7);

        let completion = self.backend.complete(request).await?;
        Ok(completion.content)
    }
}

/// Scripted candidate for tests.
///
/// Returns a fixed response, and can be told to fail on prompts containing a
/// marker substring so batch skip-and-log behavior is testable.
pub struct MockCandidate {
    response: String,
    fail_on: Option<String>,
}

impl MockCandidate {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            fail_on: None,
        }
    }

    /// Fail any probe whose prompt contains the marker.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_on = Some(marker.into());
        self
    }
}

#[async_trait]
impl CandidateModel for MockCandidate {
    async fn respond(&self, _owner_context: &str, prompt: &str) -> Result<String, ReasoningError> {
        if let Some(marker) = &self.fail_on {
            if prompt.contains(marker.as_str()) {
                return Err(ReasoningError::RequestFailed(format!(
                    "scripted failure on '{marker}'"
                )));
            }
        }
        Ok(self.response.clone())
    }
}
