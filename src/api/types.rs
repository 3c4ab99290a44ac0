//! Request/response types for the OpenAI-compatible completion service.
//!
//! Wire bodies are `pub(super)`; the domain-facing message and error types
//! are re-exported from [`crate::api`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Conversation messages
// ============================================================================

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Wire bodies
// ============================================================================

#[derive(Debug, Serialize)]
pub(super) struct CompletionBody<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize)]
pub(super) struct EditBody<'a> {
    pub model: &'a str,
    pub input: &'a str,
    pub instruction: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
pub(super) struct ChatBody<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
}

/// Text candidate shared by the completions and edits endpoints.
#[derive(Debug, Deserialize)]
pub(super) struct TextChoice {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TextChoicesResponse {
    #[serde(default)]
    pub choices: Vec<TextChoice>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

// ============================================================================
// API Status Codes
// ============================================================================

/// Coarse classification of HTTP failures returned by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    Ok,
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    Timeout,
    TooLarge,
    ResourceExhausted,
    Unavailable,
    Unknown,
}

impl ApiStatus {
    pub fn from_http_status(http_status: u16) -> Self {
        match http_status {
            200..=299 => ApiStatus::Ok,
            400 | 422 => ApiStatus::InvalidArgument,
            401 => ApiStatus::Unauthenticated,
            403 => ApiStatus::PermissionDenied,
            404 => ApiStatus::NotFound,
            408 | 504 => ApiStatus::Timeout,
            413 => ApiStatus::TooLarge,
            429 => ApiStatus::ResourceExhausted,
            500..=599 => ApiStatus::Unavailable,
            _ => ApiStatus::Unknown,
        }
    }

    /// Errors the user has to fix before any retry can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ApiStatus::Unauthenticated | ApiStatus::PermissionDenied | ApiStatus::NotFound
        )
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            ApiStatus::Ok => "Success",
            ApiStatus::InvalidArgument => "Invalid request",
            ApiStatus::Unauthenticated => "Authentication failed",
            ApiStatus::PermissionDenied => "Permission denied",
            ApiStatus::NotFound => "Model or endpoint not found",
            ApiStatus::Timeout => "Request timed out",
            ApiStatus::TooLarge => "Request body too large",
            ApiStatus::ResourceExhausted => "Rate limit exceeded",
            ApiStatus::Unavailable => "Service temporarily unavailable",
            ApiStatus::Unknown => "Unknown error occurred",
        }
    }
}

impl std::fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error_message())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Non-success HTTP response from the service.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: ApiStatus,
    pub http_status: u16,
    pub message: String,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn from_http_response(http_status: u16, body: String, request_id: Option<String>) -> Self {
        let status = ApiStatus::from_http_status(http_status);
        let message = match status {
            ApiStatus::Unauthenticated => format!(
                "Authentication failed (HTTP {}). Check the configured API key.",
                http_status
            ),
            ApiStatus::ResourceExhausted => format!(
                "Rate limit exceeded (HTTP {}). Please wait and try again.",
                http_status
            ),
            _ if body.is_empty() => {
                format!("API error (HTTP {}): {}", http_status, status.error_message())
            }
            _ => format!("API error (HTTP {}): {}", http_status, body),
        };

        Self {
            status,
            http_status,
            message,
            request_id,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.status.is_fatal()
    }

    pub fn user_hint(&self) -> &'static str {
        match self.status {
            ApiStatus::Unauthenticated | ApiStatus::PermissionDenied => {
                "Set CODEMORPH_API_KEY (or OPENAI_API_KEY) to a key with access to the configured models."
            }
            ApiStatus::NotFound => {
                "The configured model may not exist for this endpoint. Check the model settings."
            }
            ApiStatus::ResourceExhausted => {
                "You have exceeded the rate limit. Please wait a moment and try again."
            }
            ApiStatus::TooLarge => "Reduce the size of the input files or the number of files.",
            ApiStatus::Unavailable => "The service is temporarily unavailable. Please try again later.",
            _ => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Failure talking to the language model service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no API key configured; set CODEMORPH_API_KEY or OPENAI_API_KEY")]
    MissingApiKey,

    #[error("invalid service URL: {0}")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {endpoint} failed after {attempts} attempt(s): {source}")]
    Transport {
        endpoint: String,
        attempts: usize,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{endpoint} returned no choices")]
    NoChoices { endpoint: String },
}
