//! # Veracity Core
//!
//! Core library for the Veracity fact-checker.
//! Provides the credibility reranker, the plan/retrieve/judge pipeline,
//! the checkpointed batch runner, dataset and results codecs, the metrics
//! engine, configuration, and error types.

pub mod analysis;
pub mod batch;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod planner;
pub mod providers;
pub mod reranker;
pub mod search;
pub mod sink;
pub mod types;

// Re-export commonly used types at the crate root.
pub use analysis::{ErrorKind, LabelDistribution, export_misclassified, label_distribution};
pub use batch::{BatchReport, WorkSurvey, run_batch, survey};
pub use classifier::{Classification, LlmVerdictClassifier, VerdictClassifier};
pub use config::{VeracityConfig, load_config};
pub use dataset::{DatasetProfile, DatasetReader, DatasetRow};
pub use error::{BatchAborted, Result, VeracityError};
pub use metrics::{
    ConfusionMatrix, DerivedMetrics, MetricsReport, TolerancePolicy, TruthBuckets, compute_metrics,
};
pub use pipeline::{ClaimChecker, FactCheckPipeline};
pub use planner::{LlmQueryPlanner, QueryPlanner};
pub use providers::{LlmProvider, MockLlmProvider};
pub use reranker::{CredibilityReranker, CredibilityTable};
pub use search::{Retriever, TavilyRetriever};
pub use sink::{ResultSink, read_output_rows};
pub use types::{Claim, ClaimMetadata, EvidenceItem, OutputRow, Verdict, VerdictResult};
