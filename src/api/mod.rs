//! Client for the external language model service.
//!
//! The pipeline only sees the [`LanguageModel`] trait; [`ApiClient`] is the
//! HTTP implementation against an OpenAI-compatible endpoint.

mod client;
mod http;
mod model;
mod types;

pub use client::ApiClient;
pub use model::{ChatRequest, CompletionRequest, EditRequest, LanguageModel};
pub use types::{ApiError, ApiStatus, ChatMessage, Role, ServiceError};
