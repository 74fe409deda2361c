//! Verdict classification.
//!
//! A classifier never fails: provider errors and malformed replies come back
//! as [`Verdict::Error`] with the reason in the rationale.

use crate::error::LlmError;
use crate::providers::{ChatMessage, ChatRequest, LlmProvider, parse_json_reply};
use crate::types::Verdict;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Label plus explanation returned by a classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub verdict: Verdict,
    pub rationale: String,
}

impl Classification {
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Error,
            rationale: reason.into(),
        }
    }
}

/// Judges a claim against rendered evidence.
#[async_trait]
pub trait VerdictClassifier: Send + Sync {
    async fn classify(&self, claim: &str, context: &str) -> Classification;
}

const SYSTEM_PROMPT: &str = "You are an experienced fact-checking analyst. \
Judge whether a claim is true using only the evidence provided.";

/// Classifier backed by a chat model returning `{"verdict", "rationale"}`.
pub struct LlmVerdictClassifier {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmVerdictClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    fn build_prompt(claim: &str, context: &str) -> String {
        format!(
            "Evaluate this claim:\nCLAIM: \"{claim}\"\n\n\
             EVIDENCE (web sources, most credible first):\n\
             --- BEGIN EVIDENCE ---\n{context}--- END EVIDENCE ---\n\n\
             Rules:\n\
             1. Fact-check articles often restate a claim in their headline before rating it. \
             Look for the rating (false, misleading, no evidence, correct) rather than the \
             restated text. If a fact-checker rates the claim false, answer NEGATE.\n\
             2. If the claim is about a specific photo or video, the event being real is not \
             enough: if the evidence says the image is AI-generated, altered or out of context, \
             answer NEGATE.\n\
             3. If only unknown blogs or social posts repeat the claim and no authoritative \
             outlet confirms it, be skeptical and answer BASELESS or NEGATE.\n\
             4. Answer SUPPORTED only when the key facts are confirmed; NEGATE when they are \
             contradicted; BASELESS when the evidence does not settle it.\n\n\
             Reply with a JSON object only: \
             {{\"verdict\": \"SUPPORTED|NEGATE|BASELESS\", \"rationale\": \"...\"}}"
        )
    }

    fn interpret(raw: &str) -> Result<Classification, LlmError> {
        let value = parse_json_reply(raw)?;
        let label = value
            .get("verdict")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Reply has no 'verdict' field".to_string(),
            })?;
        let verdict = Verdict::parse_lenient(label).ok_or_else(|| LlmError::ResponseParse {
            message: format!("Unknown verdict label '{label}'"),
        })?;
        let rationale = value
            .get("rationale")
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();
        Ok(Classification { verdict, rationale })
    }
}

#[async_trait]
impl VerdictClassifier for LlmVerdictClassifier {
    async fn classify(&self, claim: &str, context: &str) -> Classification {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(Self::build_prompt(claim, context)),
            ],
        )
        .json();

        debug!(model = %self.model, "Requesting verdict");
        let raw = match self.provider.complete(request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Verdict request failed");
                return Classification::error(format!("Verdict request failed: {e}"));
            }
        };

        Self::interpret(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Unusable verdict reply");
            Classification::error(format!("Unusable verdict reply: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockLlmProvider;

    async fn classify_with(reply: Result<&str, LlmError>) -> Classification {
        let mock = Arc::new(MockLlmProvider::new());
        match reply {
            Ok(text) => mock.queue_response(text),
            Err(e) => mock.queue_error(e),
        }
        LlmVerdictClassifier::new(mock, "judge")
            .classify("claim", "EVIDENCE 1 (Source: https://a.org)\nCONTENT: x\n\n")
            .await
    }

    #[tokio::test]
    async fn test_classify_supported() {
        let reply = r#"{"verdict": "SUPPORTED", "rationale": " Confirmed by AP. "}"#;
        let c = classify_with(Ok(reply)).await;
        assert_eq!(c.verdict, Verdict::Supported);
        assert_eq!(c.rationale, "Confirmed by AP.");
    }

    #[tokio::test]
    async fn test_classify_fenced_negate() {
        let reply = "```json\n{\"verdict\": \"negate\", \"rationale\": \"Debunked\"}\n```";
        let c = classify_with(Ok(reply)).await;
        assert_eq!(c.verdict, Verdict::Negate);
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_error_verdict() {
        let c = classify_with(Err(LlmError::ApiRequest {
            message: "connection reset".into(),
        }))
        .await;
        assert_eq!(c.verdict, Verdict::Error);
        assert!(c.rationale.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_malformed_reply_becomes_error_verdict() {
        let c = classify_with(Ok("I think it's true")).await;
        assert_eq!(c.verdict, Verdict::Error);
        assert!(!c.rationale.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_label_becomes_error_verdict() {
        let c = classify_with(Ok(r#"{"verdict": "HALF-TRUE", "rationale": "r"}"#)).await;
        assert_eq!(c.verdict, Verdict::Error);
        assert!(c.rationale.contains("HALF-TRUE"));
    }

    #[tokio::test]
    async fn test_prompt_carries_claim_and_context() {
        let mock = Arc::new(MockLlmProvider::new());
        mock.queue_response(r#"{"verdict": "BASELESS", "rationale": "thin"}"#);
        let classifier = LlmVerdictClassifier::new(mock.clone(), "judge");
        classifier.classify("Water is dry", "CTX-MARKER").await;

        let req = &mock.requests()[0];
        assert_eq!(req.model, "judge");
        assert_eq!(req.messages.len(), 2);
        assert!(req.messages[1].content.contains("Water is dry"));
        assert!(req.messages[1].content.contains("CTX-MARKER"));
    }
}
