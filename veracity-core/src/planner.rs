//! Search query planning.

use crate::error::LlmError;
use crate::providers::{ChatMessage, ChatRequest, LlmProvider, parse_json_reply};
use crate::types::{Claim, ClaimMetadata};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Turns a claim into a web search query.
#[async_trait]
pub trait QueryPlanner: Send + Sync {
    /// Return a non-empty query, or an error. Callers fall back to the claim
    /// text on error.
    async fn plan(&self, claim: &Claim) -> Result<String, LlmError>;
}

/// Planner that asks a chat model for a fact-check oriented query.
pub struct LlmQueryPlanner {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl LlmQueryPlanner {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
        }
    }

    fn metadata_lines(metadata: &ClaimMetadata) -> String {
        let mut lines = String::new();
        if let Some(author) = metadata.author.as_deref().filter(|s| !s.is_empty()) {
            lines.push_str(&format!("Author: {author}\n"));
        }
        if let Some(context) = metadata.context.as_deref().filter(|s| !s.is_empty()) {
            lines.push_str(&format!("Context: {context}\n"));
        }
        if let Some(date) = metadata.date.as_deref().filter(|s| !s.is_empty()) {
            lines.push_str(&format!("Date: {date}\n"));
        }
        if lines.is_empty() {
            lines.push_str("(none)\n");
        }
        lines
    }

    fn build_prompt(claim: &Claim) -> String {
        format!(
            "You plan web searches for a fact-checking team.\n\
             Write one search query that will surface reliable sources (fact-checkers, \
             major news outlets, official reports) confirming or debunking the claim below. \
             Do not aim for the original post. Include the words \"fact check\".\n\n\
             CLAIM: \"{}\"\n\
             METADATA:\n{}\n\
             Reply with a JSON object only: {{\"query\": \"<search string>\"}}",
            claim.text(),
            Self::metadata_lines(&claim.metadata)
        )
    }
}

#[async_trait]
impl QueryPlanner for LlmQueryPlanner {
    async fn plan(&self, claim: &Claim) -> Result<String, LlmError> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![ChatMessage::user(Self::build_prompt(claim))],
        )
        .with_max_tokens(self.max_tokens)
        .json();

        debug!(provider = self.provider.provider_name(), "Planning search query");
        let raw = self.provider.complete(request).await?;
        let value = parse_json_reply(&raw)?;
        let query = value
            .get("query")
            .and_then(|q| q.as_str())
            .map(str::trim)
            .unwrap_or_default();

        if query.is_empty() {
            return Err(LlmError::ResponseParse {
                message: "Planner reply has no 'query' field".to_string(),
            });
        }
        info!(query = %query, "Planned search query");
        Ok(query.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockLlmProvider;

    fn claim() -> Claim {
        Claim::new("The moon landing was staged.").with_metadata(ClaimMetadata {
            author: Some("Viral post".into()),
            context: None,
            date: Some("2024-07-20".into()),
        })
    }

    #[tokio::test]
    async fn test_plan_extracts_query() {
        let mock = Arc::new(MockLlmProvider::new());
        mock.queue_response(r#"{"query": "  moon landing staged fact check "}"#);
        let planner = LlmQueryPlanner::new(mock.clone(), "planner-model", 1000);

        let query = planner.plan(&claim()).await.unwrap();
        assert_eq!(query, "moon landing staged fact check");

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "planner-model");
        assert!(requests[0].json_mode);
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.contains("The moon landing was staged."));
        assert!(prompt.contains("Author: Viral post"));
        assert!(prompt.contains("Date: 2024-07-20"));
        assert!(!prompt.contains("Context:"));
    }

    #[tokio::test]
    async fn test_plan_rejects_empty_query() {
        let mock = Arc::new(MockLlmProvider::new());
        mock.queue_response(r#"{"query": ""}"#);
        let planner = LlmQueryPlanner::new(mock, "m", 100);
        assert!(planner.plan(&claim()).await.is_err());
    }

    #[tokio::test]
    async fn test_plan_propagates_provider_error() {
        let mock = Arc::new(MockLlmProvider::new());
        mock.queue_error(LlmError::RateLimited {
            retry_after_secs: 5,
        });
        let planner = LlmQueryPlanner::new(mock, "m", 100);
        assert!(matches!(
            planner.plan(&claim()).await,
            Err(LlmError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_metadata_lines_none() {
        assert_eq!(
            LlmQueryPlanner::metadata_lines(&ClaimMetadata::default()),
            "(none)\n"
        );
    }
}
