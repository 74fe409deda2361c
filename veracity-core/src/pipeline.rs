//! The fact-checking pipeline: plan, retrieve, rerank, judge.

use crate::classifier::{LlmVerdictClassifier, VerdictClassifier};
use crate::config::VeracityConfig;
use crate::error::VeracityError;
use crate::planner::{LlmQueryPlanner, QueryPlanner};
use crate::providers::{LlmProvider, OpenAiCompatibleProvider};
use crate::reranker::CredibilityReranker;
use crate::search::{Retriever, TavilyRetriever};
use crate::types::{Claim, EvidenceItem, Verdict, VerdictResult};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Produces one verdict per claim. Implementations do not fail; problems
/// are reported through [`Verdict::Error`].
#[async_trait]
pub trait ClaimChecker: Send + Sync {
    async fn check(&self, claim: &Claim) -> VerdictResult;
}

pub struct FactCheckPipeline {
    planner: Arc<dyn QueryPlanner>,
    retriever: Arc<dyn Retriever>,
    reranker: CredibilityReranker,
    classifier: Arc<dyn VerdictClassifier>,
    top_k: usize,
}

impl FactCheckPipeline {
    pub fn new(
        planner: Arc<dyn QueryPlanner>,
        retriever: Arc<dyn Retriever>,
        reranker: CredibilityReranker,
        classifier: Arc<dyn VerdictClassifier>,
        top_k: usize,
    ) -> Self {
        Self {
            planner,
            retriever,
            reranker,
            classifier,
            top_k: top_k.max(1),
        }
    }

    /// Wire the OpenAI-compatible model, Tavily search and the configured
    /// credibility table together.
    pub fn from_config(config: &VeracityConfig) -> Result<Self, VeracityError> {
        let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::new(&config.llm)?);
        let planner = Arc::new(LlmQueryPlanner::new(
            Arc::clone(&provider),
            config.llm.query_model.clone(),
            config.llm.max_tokens,
        ));
        let classifier = Arc::new(LlmVerdictClassifier::new(
            provider,
            config.llm.verdict_model.clone(),
        ));
        let retriever = Arc::new(TavilyRetriever::new(&config.retrieval)?);
        let reranker = CredibilityReranker::from_config(&config.reranker);

        Ok(Self::new(
            planner,
            retriever,
            reranker,
            classifier,
            config.pipeline.top_k,
        ))
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Render ranked evidence as the classifier's context, best first.
    pub fn render_context(evidence: &[EvidenceItem]) -> String {
        let mut context = String::new();
        for (i, item) in evidence.iter().enumerate() {
            let _ = writeln!(context, "EVIDENCE {} (Source: {})", i + 1, item.url);
            if let Some(title) = &item.title {
                let _ = writeln!(context, "TITLE: {title}");
            }
            let content = if item.content.is_empty() { "N/A" } else { &item.content };
            let _ = write!(context, "CONTENT: {content}\n\n");
        }
        context
    }

    async fn query_for(&self, claim: &Claim) -> String {
        match self.planner.plan(claim).await {
            Ok(query) if !query.trim().is_empty() => query,
            Ok(_) => {
                warn!("Query planner returned nothing; searching with the claim text");
                claim.text().to_string()
            }
            Err(e) => {
                warn!(error = %e, "Query planning failed; searching with the claim text");
                claim.text().to_string()
            }
        }
    }

    /// Check one claim end to end.
    pub async fn run(&self, claim: &Claim) -> VerdictResult {
        if claim.text().is_empty() {
            return VerdictResult::new(Verdict::Baseless, "The claim text is empty.");
        }

        let query = self.query_for(claim).await;

        let retrieved = match self.retriever.search(&query).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Evidence retrieval failed");
                return VerdictResult::new(
                    Verdict::Error,
                    format!("Evidence retrieval failed: {e}"),
                );
            }
        };
        if retrieved.is_empty() {
            info!(query = %query, "No evidence found");
            return VerdictResult::new(
                Verdict::Baseless,
                format!("No evidence found for the search query \"{query}\"."),
            );
        }

        let found = retrieved.len();
        let mut evidence = self.reranker.rerank(retrieved);
        evidence.truncate(self.top_k);
        info!(found, kept = evidence.len(), "Evidence reranked");

        let context = Self::render_context(&evidence);
        debug!(bytes = context.len(), "Context rendered");
        let classification = self.classifier.classify(claim.text(), &context).await;
        info!(verdict = %classification.verdict, "Verdict reached");

        VerdictResult {
            verdict: classification.verdict,
            rationale: classification.rationale,
            evidence,
        }
    }
}

#[async_trait]
impl ClaimChecker for FactCheckPipeline {
    async fn check(&self, claim: &Claim) -> VerdictResult {
        self.run(claim).await
    }
}
