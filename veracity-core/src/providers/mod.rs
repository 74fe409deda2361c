//! LLM provider abstraction.
//!
//! Query planning and verdict classification both talk to a chat model
//! through [`LlmProvider`]; the OpenAI-compatible client is the production
//! implementation and [`MockLlmProvider`] the test double.

pub mod mock;
pub mod openai_compat;

pub use mock::MockLlmProvider;
pub use openai_compat::OpenAiCompatibleProvider;

use crate::error::LlmError;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    /// Ask the endpoint for a JSON object response.
    pub json_mode: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            json_mode: false,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Trait for chat-completion backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one completion and return the assistant's text.
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError>;

    /// Name of the backend, for logs.
    fn provider_name(&self) -> &str;
}

fn fenced_json() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("static regex is valid")
    })
}

/// Parse a JSON object out of a model reply, tolerating markdown code
/// fences around it.
pub fn parse_json_reply(raw: &str) -> Result<serde_json::Value, LlmError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let body = if trimmed.contains("```") {
        match fenced_json().captures(trimmed).and_then(|c| c.get(1)) {
            Some(m) => m.as_str().to_string(),
            None => trimmed.replace("```json", "").replace("```", "").trim().to_string(),
        }
    } else {
        trimmed.to_string()
    };

    let value: serde_json::Value =
        serde_json::from_str(&body).map_err(|e| LlmError::ResponseParse {
            message: format!("Invalid JSON from model: {e}"),
        })?;
    if !value.is_object() {
        return Err(LlmError::ResponseParse {
            message: "Expected a JSON object".to_string(),
        });
    }
    Ok(value)
}
