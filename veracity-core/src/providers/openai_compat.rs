//! OpenAI-compatible chat completions provider.
//!
//! Works with OpenAI and any endpoint that speaks the same chat
//! completions format (vLLM, Ollama, LM Studio, OpenRouter, ...).

use super::{ChatMessage, ChatRequest, LlmProvider, Role};
use crate::config::LlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatibleProvider {
    /// Create a provider from configuration.
    ///
    /// Uses `config.api_key`, then the environment variable named by
    /// `config.api_key_env`. Local endpoints get a dummy bearer token.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let is_local =
            config.base_url.contains("localhost") || config.base_url.contains("127.0.0.1");

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .or_else(|| {
                if is_local {
                    debug!("No API key set for local provider; using dummy bearer token");
                    Some("local".to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| LlmError::AuthFailed {
                provider: format!(
                    "OpenAI-compatible: env var '{}' not set",
                    config.api_key_env
                ),
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ApiRequest {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn messages_to_json(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({ "role": role, "content": msg.content })
            })
            .collect()
    }

    fn request_body(request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": Self::messages_to_json(&request.messages),
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_completion_tokens"] = json!(max_tokens);
        }
        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }

    /// Extract the assistant text from a chat completions response body.
    fn parse_response(body: &Value) -> Result<String, LlmError> {
        let choice =
            body.get("choices")
                .and_then(|c| c.get(0))
                .ok_or_else(|| LlmError::ResponseParse {
                    message: "No choices in response".to_string(),
                })?;

        let message = choice
            .get("message")
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No message in choice".to_string(),
            })?;

        match message.get("content").and_then(|c| c.as_str()) {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            _ => {
                let finish_reason = choice
                    .get("finish_reason")
                    .and_then(|f| f.as_str())
                    .unwrap_or("unknown");
                let refusal = message.get("refusal").and_then(|r| r.as_str());
                debug!(finish_reason, refusal, "Model returned no content");
                Err(LlmError::EmptyResponse)
            }
        }
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        use reqwest::StatusCode;

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!(%status, body = %body, "Chat endpoint rejected credentials");
                LlmError::AuthFailed {
                    provider: "OpenAI-compatible".to_string(),
                }
            }
            StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
                retry_after_secs: retry_delay_secs(body).unwrap_or(DEFAULT_RETRY_SECS),
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {status}: {body}"),
            },
        }
    }
}

const DEFAULT_RETRY_SECS: u64 = 5;

/// Delay hinted by a 429 body such as
/// `{"error": {"message": "Rate limit reached ... try again in 1.5s."}}`,
/// rounded up to whole seconds. Millisecond hints (`850ms`) are accepted too.
fn retry_delay_secs(body: &str) -> Option<u64> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    let message = parsed.get("error")?.get("message")?.as_str()?;
    let (_, tail) = message.rsplit_once("try again in ")?;
    let number: String = tail
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = number.parse().ok()?;
    let secs = if tail[number.len()..].starts_with("ms") {
        value / 1000.0
    } else {
        value
    };
    Some(secs.ceil() as u64)
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(url = %url, model = %request.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest {
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| LlmError::ApiRequest {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON: {}", e),
            })?;

        Self::parse_response(&json)
    }

    fn provider_name(&self) -> &str {
        "openai-compatible"
    }
}
