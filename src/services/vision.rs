use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::extraction::TokenUsage;

/// One image + instruction sent to a vision model.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    pub model_id: &'a str,
    pub prompt: &'a str,
    pub image: &'a [u8],
    pub mime_type: &'a str,
}

/// Raw text answer plus the provider's token accounting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// A vision-capable model that answers with text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn analyze(&self, request: VisionRequest<'_>) -> Result<ModelResponse, VisionError>;

    /// Whether credentials are present. Used by health checks only.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Bounded retry with doubling delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Client for OpenAI-compatible chat completion endpoints with image input.
pub struct OpenAiVisionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

impl OpenAiVisionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, VisionError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(VisionError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            retry: RetryPolicy::default(),
            max_tokens: 1024,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn send_once(
        &self,
        api_key: &str,
        body: &ChatRequest<'_>,
    ) -> Result<ModelResponse, VisionError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(VisionError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Status { status, body });
        }

        let chat: ChatResponse = response.json().await.map_err(VisionError::Http)?;
        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| VisionError::InvalidResponse("response has no message content".into()))?;

        let usage = chat
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(ModelResponse { text, usage })
    }
}

#[async_trait]
impl VisionModel for OpenAiVisionClient {
    async fn analyze(&self, request: VisionRequest<'_>) -> Result<ModelResponse, VisionError> {
        let api_key = self.api_key.as_deref().ok_or(VisionError::MissingCredentials)?;

        let image_b64 = base64::engine::general_purpose::STANDARD.encode(request.image);
        let body = ChatRequest {
            model: request.model_id,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: request.prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{};base64,{}", request.mime_type, image_b64),
                        },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
            temperature: 0.0,
        };

        let mut delay = self.retry.base_delay;
        let mut attempt = 1;
        loop {
            match self.send_once(api_key, &body).await {
                Ok(response) => {
                    debug!(model_id = request.model_id, attempt, "Vision model responded");
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    warn!(
                        model_id = request.model_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Vision model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Model API credentials are not configured")]
    MissingCredentials,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Malformed model API response: {0}")]
    InvalidResponse(String),
}

impl VisionError {
    /// Client errors are not retried, except rate limiting.
    pub fn is_retryable(&self) -> bool {
        match self {
            VisionError::MissingCredentials | VisionError::InvalidResponse(_) => false,
            VisionError::Http(e) => !e.is_decode() && e.status().map_or(true, retryable_status),
            VisionError::Status { status, .. } => retryable_status(*status),
        }
    }
}

fn retryable_status(status: StatusCode) -> bool {
    !status.is_client_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_without_key_is_unconfigured() {
        let client =
            OpenAiVisionClient::new("https://api.example.com/v1/", Some("  ".into()), Duration::from_secs(5))
                .unwrap();
        assert!(!client.is_configured());
        assert_eq!(client.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn test_retry_classification() {
        let status = |code: u16| VisionError::Status {
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!VisionError::MissingCredentials.is_retryable());
    }

    #[test]
    fn test_chat_request_shape() {
        let body = ChatRequest {
            model: "gpt-4o",
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: "hi".into() },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/png;base64,AA==".into(),
                        },
                    },
                ],
            }],
            max_tokens: 10,
            temperature: 0.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,AA=="
        );
    }
}
