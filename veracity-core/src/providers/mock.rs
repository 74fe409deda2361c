//! Queue-backed provider for tests.

use super::{ChatRequest, LlmProvider};
use crate::error::LlmError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays queued replies in order and records every request it sees.
///
/// When the queue is empty, `complete` fails with `EmptyResponse`.
#[derive(Default)]
pub struct MockLlmProvider {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that answers every call with `text`.
    pub fn with_response(text: &str) -> Self {
        let provider = Self::new();
        for _ in 0..20 {
            provider.queue_response(text);
        }
        provider
    }

    pub fn queue_response(&self, text: &str) {
        self.lock_replies().push_back(Ok(text.to_string()));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.lock_replies().push_back(Err(error));
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, LlmError>>> {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        self.lock_replies()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
