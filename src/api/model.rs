//! The language model capability consumed by the pipeline.

use async_trait::async_trait;

use super::types::{ChatMessage, ServiceError};

/// Stateless text completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Instruction-driven rewrite of a single input text.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    pub model: String,
    pub input: String,
    pub instruction: String,
    pub temperature: Option<f32>,
}

/// Chat request carrying the full message history to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// Completion/edit/chat capability of an external LLM service.
///
/// `complete` and `edit` return ranked text candidates, best first.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Vec<String>, ServiceError>;

    async fn edit(&self, request: EditRequest) -> Result<Vec<String>, ServiceError>;

    async fn chat(&self, request: ChatRequest) -> Result<ChatMessage, ServiceError>;
}
