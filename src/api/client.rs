use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use super::http::send_with_retry;
use super::model::{ChatRequest, CompletionRequest, EditRequest, LanguageModel};
use super::types::{
    ApiError, ChatBody, ChatMessage, ChatResponse, CompletionBody, EditBody, ServiceError,
    TextChoicesResponse,
};
use crate::config::Settings;

const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_user_agent() -> String {
    std::env::var("CODEMORPH_USER_AGENT")
        .unwrap_or_else(|_| format!("codemorph/{}", DEFAULT_VERSION))
}

/// HTTP client for an OpenAI-compatible completion service.
pub struct ApiClient {
    client: Client,
    base_url: Url,
    api_key: String,
    user_agent: String,
    session_id: String,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Result<Self, ServiceError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or(ServiceError::MissingApiKey)?;

        let base_url = Self::parse_base_url(&settings.api_url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(ServiceError::Client)?;

        Ok(Self {
            client,
            base_url,
            api_key,
            user_agent: build_user_agent(),
            session_id: Uuid::new_v4().to_string(),
        })
    }

    /// `Url::join` drops the last path segment unless the base ends in `/`.
    fn parse_base_url(raw: &str) -> Result<Url, ServiceError> {
        let normalized = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{}/", raw)
        };
        Url::parse(&normalized).map_err(|e| ServiceError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    fn build_url(&self, endpoint: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(endpoint)
            .map_err(|e| ServiceError::InvalidUrl(format!("{}: {}", endpoint, e)))
    }

    async fn post_json<T, R>(&self, endpoint: &str, body: &T) -> Result<R, ServiceError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = self.build_url(endpoint)?;
        let request_id = Uuid::new_v4().to_string();

        debug!("=== API Request ===");
        debug!("URL: {}", url);

        let response = send_with_retry(endpoint, || {
            self.client
                .post(url.clone())
                .header("Content-Type", "application/json")
                .header("User-Agent", &self.user_agent)
                .header("x-request-id", &request_id)
                .header("x-request-session-id", &self.session_id)
                .bearer_auth(&self.api_key)
                .json(body)
        })
        .await?;

        let status = response.status();
        debug!("=== API Response ===");
        debug!("Status: {}", status);

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let api_error =
                ApiError::from_http_response(status.as_u16(), error_text, Some(request_id));

            if api_error.is_fatal() {
                error!("❌ {}", api_error.message);
                error!("   {}", api_error.user_hint());
            } else {
                error!("API request failed: {}", api_error.message);
            }

            return Err(api_error.into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ServiceError::Transport {
                endpoint: endpoint.to_string(),
                attempts: 1,
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| ServiceError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

fn text_candidates(
    endpoint: &str,
    response: TextChoicesResponse,
) -> Result<Vec<String>, ServiceError> {
    if response.choices.is_empty() {
        return Err(ServiceError::NoChoices {
            endpoint: endpoint.to_string(),
        });
    }
    Ok(response
        .choices
        .into_iter()
        .map(|choice| choice.text.unwrap_or_default())
        .collect())
}

#[async_trait]
impl LanguageModel for ApiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Vec<String>, ServiceError> {
        let body = CompletionBody {
            model: &request.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        let response: TextChoicesResponse = self.post_json("completions", &body).await?;
        text_candidates("completions", response)
    }

    async fn edit(&self, request: EditRequest) -> Result<Vec<String>, ServiceError> {
        let body = EditBody {
            model: &request.model,
            input: &request.input,
            instruction: &request.instruction,
            temperature: request.temperature,
        };
        let response: TextChoicesResponse = self.post_json("edits", &body).await?;
        text_candidates("edits", response)
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatMessage, ServiceError> {
        let body = ChatBody {
            model: &request.model,
            messages: &request.messages,
        };
        let response: ChatResponse = self.post_json("chat/completions", &body).await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ServiceError::NoChoices {
                endpoint: "chat/completions".to_string(),
            })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
