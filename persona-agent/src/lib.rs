//! Generative-AI collaborator layer for the persona pipeline.
//!
//! # Key Components
//!
//! - [`ReasoningBackend`]: trait over completion providers (OpenAI-compatible
//!   HTTP, mocks)
//! - [`ReasoningService`]: two-tier (fast / quality) structured generation
//! - [`Structured`]: three-tier result for schema-drifting model output
//! - [`CandidateModel`]: the personalized model under evaluation
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use persona_agent::{MockBackend, QualityTier, ReasoningService, Structured};
//!
//! # #[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
//! # struct Out { #[serde(default)] prompts: Vec<String> }
//! # tokio_test::block_on(async {
//! let backend = Arc::new(MockBackend::default().with_response(r#"{"prompts": ["x"]}"#));
//! let service = ReasoningService::single(backend);
//!
//! let out = service.generate::<Out>(QualityTier::Fast, "sys", "user").await.unwrap();
//! assert!(out.is_valid());
//! # });
//! ```

pub mod backend;
pub mod candidate;
pub mod service;
pub mod structured;

// Re-export main types
pub use backend::{
    CompletionRequest, CompletionResponse, FinishReason, Message, MessageRole, MockBackend,
    OpenAiBackend, ReasoningBackend, ReasoningError, ResponseFormat, Usage,
};
pub use candidate::{BackendCandidate, CandidateModel, MockCandidate};
pub use service::{QualityTier, ReasoningService};
pub use structured::{parse_structured, Structured};
