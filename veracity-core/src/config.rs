//! Configuration system for Veracity.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> explicit file -> environment -> CLI overrides.

use crate::dataset::DatasetProfile;
use crate::error::ConfigError;
use crate::metrics::TruthBuckets;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VeracityConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    /// Named input dataset layouts.
    #[serde(default = "default_datasets")]
    pub datasets: BTreeMap<String, DatasetProfile>,
    #[serde(default)]
    pub metrics: TruthBuckets,
}

impl Default for VeracityConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            pipeline: PipelineConfig::default(),
            reranker: RerankerConfig::default(),
            batch: BatchConfig::default(),
            datasets: default_datasets(),
            metrics: TruthBuckets::default(),
        }
    }
}

impl VeracityConfig {
    /// Look up a dataset profile by name.
    pub fn dataset(&self, name: &str) -> Option<&DatasetProfile> {
        self.datasets.get(name)
    }

    /// Render the effective configuration as TOML. Inline API keys are
    /// never written.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            message: format!("Cannot render configuration: {e}"),
        })
    }
}

/// OpenAI-compatible model endpoint used for query planning and verdicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the chat completions API.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,
    /// Inline API key; takes precedence over `api_key_env`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Model that turns a claim into a search query.
    #[serde(default = "default_query_model")]
    pub query_model: String,
    /// Model that judges the claim against the evidence.
    #[serde(default = "default_verdict_model")]
    pub verdict_model: String,
    /// Completion token cap for query planning.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key_env: default_llm_key_env(),
            api_key: None,
            query_model: default_query_model(),
            verdict_model: default_verdict_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_query_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_verdict_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_llm_timeout() -> u64 {
    120
}

/// Web search (Tavily) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_search_url")]
    pub base_url: String,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Cap on results requested per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_depth")]
    pub search_depth: String,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            api_key_env: default_search_key_env(),
            api_key: None,
            max_results: default_max_results(),
            search_depth: default_search_depth(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_url() -> String {
    "https://api.tavily.com/search".to_string()
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_max_results() -> usize {
    100
}

fn default_search_depth() -> String {
    "advanced".to_string()
}

fn default_search_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Evidence items passed to the verdict classifier after reranking.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    30
}

/// Source credibility reranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// JSON credibility table; unset or unreadable means default scores only.
    /// Relative paths resolve against the workspace.
    #[serde(default = "default_sources_path", skip_serializing_if = "Option::is_none")]
    pub sources_path: Option<PathBuf>,
    /// Multiplier on authority; must dominate the relevance range.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Score for unknown domains when the table does not set one.
    #[serde(default = "default_authority")]
    pub default_score: i64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            sources_path: default_sources_path(),
            weight: default_weight(),
            default_score: default_authority(),
        }
    }
}

fn default_sources_path() -> Option<PathBuf> {
    Some(PathBuf::from("config").join("sources.json"))
}

fn default_weight() -> f64 {
    10.0
}

fn default_authority() -> i64 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// New claims processed per run.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Estimated USD per claim, shown before a run starts.
    #[serde(default = "default_cost_per_claim")]
    pub cost_per_claim: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            cost_per_claim: default_cost_per_claim(),
        }
    }
}

fn default_batch_size() -> usize {
    250
}

fn default_cost_per_claim() -> f64 {
    0.015
}

fn default_datasets() -> BTreeMap<String, DatasetProfile> {
    BTreeMap::from([
        ("politifact".to_string(), DatasetProfile::politifact()),
        ("trump".to_string(), DatasetProfile::trump()),
    ])
}

/// Load configuration from all layers.
///
/// `explicit` must exist if given; the user and workspace files are
/// optional.
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<VeracityConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(VeracityConfig::default()));

    // User-level config
    if let Some(dirs) = directories::ProjectDirs::from("dev", "veracity", "veracity") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".veracity").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (VERACITY_BATCH__BATCH_SIZE, VERACITY_LLM__VERDICT_MODEL, etc.)
    figment = figment.merge(Env::prefixed("VERACITY_").split("__"));

    let mut config: VeracityConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    if let Some(ws) = workspace {
        if let Some(path) = config.reranker.sources_path.as_mut() {
            if path.is_relative() {
                *path = ws.join(&*path);
            }
        }
    }
    validate(&config)?;
    Ok(config)
}

fn validate(config: &VeracityConfig) -> Result<(), ConfigError> {
    if config.pipeline.top_k == 0 {
        return Err(ConfigError::Invalid {
            message: "pipeline.top_k must be at least 1".into(),
        });
    }
    if config.reranker.weight.is_nan() || config.reranker.weight < 10.0 {
        return Err(ConfigError::Invalid {
            message: format!(
                "reranker.weight must be >= 10 so authority dominates relevance (got {})",
                config.reranker.weight
            ),
        });
    }
    for (name, profile) in &config.datasets {
        if profile.text_column.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: format!("datasets.{name}.text_column is empty"),
            });
        }
    }
    Ok(())
}
