//! Mock reasoning backend for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use super::traits::*;

/// Mock backend for testing.
///
/// Replays a FIFO queue of scripted responses; once the queue is drained it
/// keeps returning the last default response. Pipeline tests script one
/// response per expected reasoning call.
pub struct MockBackend {
    model_id: String,
    available: AtomicBool,
    default_response: String,
    queued: Mutex<VecDeque<String>>,
    call_count: AtomicU32,
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            available: AtomicBool::new(true),
            default_response: "Mock response".to_string(),
            queued: Mutex::new(VecDeque::new()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Set the default response returned when the queue is empty.
    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.default_response = content.into();
        self
    }

    /// Queue a one-shot response.
    pub fn push_response(&self, content: impl Into<String>) {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(content.into());
        }
    }

    /// Builder variant of [`push_response`](Self::push_response).
    pub fn with_queued(self, content: impl Into<String>) -> Self {
        self.push_response(content);
        self
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Toggle availability at runtime.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Get the number of times complete was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

#[async_trait]
impl ReasoningBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ReasoningError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if !self.available.load(Ordering::SeqCst) {
            return Err(ReasoningError::Unavailable(
                "Mock backend disabled".to_string(),
            ));
        }

        let content = self
            .queued
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| self.default_response.clone());

        // Rough token estimate, enough for usage plumbing in tests
        let prompt_tokens: u32 = request
            .messages
            .iter()
            .map(|m| m.content.len() as u32 / 4)
            .sum();

        Ok(CompletionResponse {
            content: content.clone(),
            finish_reason: FinishReason::Stop,
            usage: Usage {
                prompt_tokens,
                completion_tokens: content.len() as u32 / 4,
            },
        })
    }
}
