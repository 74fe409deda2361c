//! Source-credibility reranking of retrieved evidence.
//!
//! Each item gets `authority(domain) * weight + relevance`. With a weight
//! larger than the relevance range, authority decides the order and
//! relevance only orders items within one authority tier.

use crate::config::RerankerConfig;
use crate::error::ConfigError;
use crate::types::EvidenceItem;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Immutable domain -> authority score table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredibilityTable {
    scores: HashMap<String, i64>,
    default_score: i64,
}

/// On-disk layout:
/// `{"sources": {"default_score": 3, "<category>": {"score": 5, "domains": [...]}}}`.
#[derive(Debug, Deserialize)]
struct SourcesFile {
    sources: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SourceCategory {
    #[serde(default)]
    score: Option<i64>,
    domains: Vec<String>,
}

impl CredibilityTable {
    /// An empty table: every domain gets `default_score`.
    pub fn empty(default_score: i64) -> Self {
        Self {
            scores: HashMap::new(),
            default_score,
        }
    }

    pub fn from_scores<I, S>(scores: I, default_score: i64) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        Self {
            scores: scores
                .into_iter()
                .map(|(d, s)| (normalize_domain(d.as_ref()), s))
                .collect(),
            default_score,
        }
    }

    /// Parse the JSON source table. A top-level `default_score` in the file
    /// replaces `fallback_default`.
    pub fn from_json(json: &str, fallback_default: i64) -> Result<Self, ConfigError> {
        let file: SourcesFile = serde_json::from_str(json).map_err(|e| ConfigError::ParseError {
            message: format!("credibility table: {e}"),
        })?;

        let default_score = file
            .sources
            .get("default_score")
            .and_then(|v| v.as_i64())
            .unwrap_or(fallback_default);

        let mut scores = HashMap::new();
        for (category, value) in &file.sources {
            if !value.is_object() {
                continue;
            }
            let Ok(entry) = serde_json::from_value::<SourceCategory>(value.clone()) else {
                debug!(category = %category, "Skipping credibility category without domains");
                continue;
            };
            let score = entry.score.unwrap_or(default_score);
            for domain in entry.domains {
                scores.insert(normalize_domain(&domain), score);
            }
        }

        Ok(Self {
            scores,
            default_score,
        })
    }

    pub fn load(path: &Path, fallback_default: i64) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        Self::from_json(&json, fallback_default)
    }

    /// Load the table, degrading to an empty one on any failure.
    pub fn load_or_default(path: Option<&Path>, fallback_default: i64) -> Self {
        let Some(path) = path else {
            warn!("No credibility table configured; ranking with default scores only");
            return Self::empty(fallback_default);
        };
        match Self::load(path, fallback_default) {
            Ok(table) => {
                info!(
                    domains = table.len(),
                    path = %path.display(),
                    "Loaded credibility table"
                );
                table
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Credibility table unavailable; ranking with default scores only"
                );
                Self::empty(fallback_default)
            }
        }
    }

    /// Authority of a domain; `None` and unknown domains get the default.
    pub fn authority(&self, domain: Option<&str>) -> i64 {
        domain
            .and_then(|d| self.scores.get(d))
            .copied()
            .unwrap_or(self.default_score)
    }

    pub fn default_score(&self) -> i64 {
        self.default_score
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().to_ascii_lowercase();
    domain
        .strip_prefix("www.")
        .map(str::to_string)
        .unwrap_or(domain)
}

/// Host of `url` without a leading `www.`; `None` if it does not parse.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    Some(normalize_domain(host))
}

/// Orders evidence by source credibility, then retriever relevance.
#[derive(Debug, Clone)]
pub struct CredibilityReranker {
    table: CredibilityTable,
    weight: f64,
}

impl CredibilityReranker {
    pub fn new(table: CredibilityTable, weight: f64) -> Self {
        Self { table, weight }
    }

    pub fn from_config(config: &RerankerConfig) -> Self {
        let table =
            CredibilityTable::load_or_default(config.sources_path.as_deref(), config.default_score);
        Self::new(table, config.weight)
    }

    pub fn table(&self) -> &CredibilityTable {
        &self.table
    }

    /// Composite ranking key of one item.
    pub fn composite_score(&self, item: &EvidenceItem) -> f64 {
        let domain = domain_of(&item.url);
        self.table.authority(domain.as_deref()) as f64 * self.weight + item.relevance()
    }

    /// Reorder `items` by descending composite score. Items are moved, not
    /// modified.
    ///
    /// Equal keys keep their input order only because `sort_by` is stable;
    /// no further tie-break is applied.
    pub fn rerank(&self, items: Vec<EvidenceItem>) -> Vec<EvidenceItem> {
        debug!(count = items.len(), "Reranking evidence by credibility");
        let mut keyed: Vec<(f64, EvidenceItem)> = items
            .into_iter()
            .map(|item| (self.composite_score(&item), item))
            .collect();
        keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
        keyed.into_iter().map(|(_, item)| item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn reranker() -> CredibilityReranker {
        let table = CredibilityTable::from_scores(
            [("reuters.com", 5), ("politifact.com", 5), ("blogspot.com", 1)],
            3,
        );
        CredibilityReranker::new(table, 10.0)
    }

    fn urls(items: &[EvidenceItem]) -> Vec<&str> {
        items.iter().map(|i| i.url.as_str()).collect()
    }

    #[test]
    fn test_domain_of_strips_www() {
        assert_eq!(
            domain_of("https://www.reuters.com/world/x").as_deref(),
            Some("reuters.com")
        );
        assert_eq!(
            domain_of("http://news.bbc.co.uk/a").as_deref(),
            Some("news.bbc.co.uk")
        );
        assert_eq!(domain_of("not a url"), None);
        assert_eq!(domain_of(""), None);
    }

    #[test]
    fn test_high_tier_zero_relevance_before_low_tier_high_relevance() {
        // The weight has to exceed the relevance spread for authority to dominate.
        let table = CredibilityTable::from_scores([("politifact.com", 5), ("blogspot.com", 1)], 3);
        let reranker = CredibilityReranker::new(table, 1000.0);
        let items = vec![
            EvidenceItem::new("https://blogspot.com/b", "low").with_score(100.0),
            EvidenceItem::new("https://politifact.com/a", "high").with_score(0.0),
        ];
        let ranked = reranker.rerank(items);
        assert_eq!(ranked[0].content, "high");
        assert_eq!(ranked[1].content, "low");
    }

    #[test]
    fn test_nan_scores_rank_as_zero_relevance() {
        let items: Vec<EvidenceItem> = (0..50)
            .map(|i| {
                let url = if i % 2 == 0 {
                    format!("https://reuters.com/{i}")
                } else {
                    format!("https://blogspot.com/{i}")
                };
                let score = if i % 3 == 0 { f64::NAN } else { i as f64 / 100.0 };
                EvidenceItem::new(url, format!("{i}")).with_score(score)
            })
            .collect();

        let ranked = reranker().rerank(items);
        assert_eq!(ranked.len(), 50);
        assert!(ranked[..25].iter().all(|e| e.url.contains("reuters.com")));
        assert_eq!(ranked[0].content, "46");
        // NaN ties keep input order at the bottom of each tier.
        assert_eq!(ranked[24].content, "48");
        assert_eq!(ranked[49].content, "45");
    }

    #[test]
    fn test_subdomain_is_not_parent_domain() {
        // someone.blogspot.com is not listed, so it ranks at the default (3),
        // above the listed blogspot.com (1).
        let items = vec![
            EvidenceItem::new("https://blogspot.com/p", "listed").with_score(0.9),
            EvidenceItem::new("https://someone.blogspot.com/p", "sub").with_score(0.1),
        ];
        let ranked = reranker().rerank(items);
        assert_eq!(ranked[0].content, "sub");
    }

    #[test]
    fn test_relevance_orders_within_tier() {
        let items = vec![
            EvidenceItem::new("https://reuters.com/1", "x").with_score(0.2),
            EvidenceItem::new("https://politifact.com/2", "y").with_score(0.9),
        ];
        let ranked = reranker().rerank(items);
        assert_eq!(
            urls(&ranked),
            vec!["https://politifact.com/2", "https://reuters.com/1"]
        );
    }

    #[test]
    fn test_unknown_domain_uses_default_score() {
        let r = reranker();
        let item = EvidenceItem::new("https://example.org/x", "c").with_score(0.5);
        assert_eq!(r.composite_score(&item), 3.0 * 10.0 + 0.5);
    }

    #[test]
    fn test_unparseable_url_uses_default_score() {
        let r = reranker();
        let item = EvidenceItem::new("::::", "c");
        assert_eq!(r.composite_score(&item), 30.0);
    }

    #[test]
    fn test_missing_relevance_is_zero() {
        let r = reranker();
        let item = EvidenceItem::new("https://reuters.com/x", "c");
        assert_eq!(r.composite_score(&item), 50.0);
    }

    #[test]
    fn test_equal_keys_follow_stable_sort_only() {
        // No tie-break exists; equal composite scores keep input order
        // because sort_by is stable, and nothing more is promised.
        let items = vec![
            EvidenceItem::new("https://a.example/1", "first").with_score(0.5),
            EvidenceItem::new("https://b.example/2", "second").with_score(0.5),
        ];
        let ranked = reranker().rerank(items);
        assert_eq!(ranked[0].content, "first");
        assert_eq!(ranked[1].content, "second");
    }

    #[test]
    fn test_rerank_does_not_mutate_items() {
        let items = vec![
            EvidenceItem::new("https://blogspot.com/b", "low")
                .with_score(0.3)
                .with_title("Low"),
            EvidenceItem::new("https://reuters.com/a", "high").with_score(0.1),
        ];
        let mut ranked = reranker().rerank(items.clone());
        ranked.reverse();
        assert_eq!(ranked, items);
    }

    #[test]
    fn test_table_from_json() {
        let json = r#"{
            "sources": {
                "default_score": 2,
                "fact_checkers": {"score": 5, "domains": ["politifact.com", "www.snopes.com"]},
                "wire": {"domains": ["apnews.com"]}
            }
        }"#;
        let table = CredibilityTable::from_json(json, 3).unwrap();
        assert_eq!(table.default_score(), 2);
        assert_eq!(table.authority(Some("politifact.com")), 5);
        assert_eq!(table.authority(Some("snopes.com")), 5);
        assert_eq!(table.authority(Some("apnews.com")), 2);
        assert_eq!(table.authority(Some("unknown.net")), 2);
        assert_eq!(table.authority(None), 2);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_missing_table_degrades_to_default() {
        let missing = Path::new("/nonexistent/sources.json");
        let table = CredibilityTable::load_or_default(Some(missing), 4);
        assert!(table.is_empty());
        assert_eq!(table.authority(Some("reuters.com")), 4);
    }

    #[test]
    fn test_malformed_table_degrades_to_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.json");
        std::fs::write(&path, "{ not json").unwrap();
        let table = CredibilityTable::load_or_default(Some(&path), 3);
        assert!(table.is_empty());
        assert_eq!(table.default_score(), 3);
    }
}
