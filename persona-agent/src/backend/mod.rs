//! Reasoning backend implementations.

mod mock;
mod openai;
pub mod traits;

pub use mock::MockBackend;
pub use openai::OpenAiBackend;
pub use traits::{
    CompletionRequest, CompletionResponse, FinishReason, Message, MessageRole, ReasoningBackend,
    ReasoningError, ResponseFormat, Usage,
};
