//! Core data model: claims, evidence, verdicts and persisted result rows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mis-decoded UTF-8 smart quotes as they appear in scraped datasets.
const MOJIBAKE_QUOTES: [(&str, &str); 4] = [
    ("\u{e2}\u{80}\u{9c}", "\u{201c}"),
    ("\u{e2}\u{80}\u{9d}", "\u{201d}"),
    ("\u{e2}\u{80}\u{98}", "\u{2018}"),
    ("\u{e2}\u{80}\u{99}", "\u{2019}"),
];

/// Trim a claim and repair mis-decoded smart quotes.
///
/// The result is the claim's identity for checkpointing: two rows whose
/// normalized text matches are the same unit of work.
pub fn normalize_claim(text: &str) -> String {
    let mut out = text.trim().to_string();
    for (broken, fixed) in MOJIBAKE_QUOTES {
        if out.contains(broken) {
            out = out.replace(broken, fixed);
        }
    }
    out
}

/// Optional context that travels with a claim into query planning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl ClaimMetadata {
    pub fn is_empty(&self) -> bool {
        self.author.is_none() && self.context.is_none() && self.date.is_none()
    }
}

/// A natural-language assertion to verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    text: String,
    #[serde(default)]
    pub metadata: ClaimMetadata,
}

impl Claim {
    /// Build a claim; the text is normalized on the way in.
    pub fn new(text: &str) -> Self {
        Self {
            text: normalize_claim(text),
            metadata: ClaimMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ClaimMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Checkpoint key of this claim.
    pub fn key(&self) -> &str {
        &self.text
    }
}

/// A retrieved document fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    /// Retriever relevance; unbounded, absent means 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl EvidenceItem {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            content: content.into(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Retriever score; absent and non-finite scores count as 0.
    pub fn relevance(&self) -> f64 {
        self.score.filter(|s| s.is_finite()).unwrap_or(0.0)
    }
}

/// The closed verdict taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Supported,
    Negate,
    Baseless,
    Error,
}

impl Verdict {
    pub const ALL: [Verdict; 4] = [
        Verdict::Supported,
        Verdict::Negate,
        Verdict::Baseless,
        Verdict::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Supported => "SUPPORTED",
            Verdict::Negate => "NEGATE",
            Verdict::Baseless => "BASELESS",
            Verdict::Error => "ERROR",
        }
    }

    /// Parse a verdict label as written by a model or found in older result
    /// files. Matching is case-insensitive and accepts stems ("SUPPORT",
    /// "NEGATED") plus the legacy "ERRORE" spelling.
    pub fn parse_lenient(label: &str) -> Option<Verdict> {
        let label = label.trim().to_uppercase();
        if label.is_empty() {
            return None;
        }
        if label.starts_with("SUPPORT") {
            Some(Verdict::Supported)
        } else if label.starts_with("NEGAT") {
            Some(Verdict::Negate)
        } else if label.starts_with("BASELESS") {
            Some(Verdict::Baseless)
        } else if label == "ERROR" || label == "ERRORE" {
            Some(Verdict::Error)
        } else {
            None
        }
    }

    /// Whether the verdict is an actual true/false call.
    pub fn is_prediction(&self) -> bool {
        matches!(self, Verdict::Supported | Verdict::Negate)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictResult {
    pub verdict: Verdict,
    pub rationale: String,
    /// Ranked evidence handed to the classifier, most credible first.
    pub evidence: Vec<EvidenceItem>,
}

impl VerdictResult {
    pub fn new(verdict: Verdict, rationale: impl Into<String>) -> Self {
        Self {
            verdict,
            rationale: rationale.into(),
            evidence: Vec::new(),
        }
    }
}

/// One persisted line of a results file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    pub claim: String,
    #[serde(default)]
    pub ground_truth_label: Option<String>,
    /// Kept as text so hand-edited or legacy labels survive a round trip.
    pub predicted_label: String,
    #[serde(default)]
    pub rationale: String,
}

impl OutputRow {
    pub fn from_result(
        claim: &Claim,
        ground_truth: Option<String>,
        result: &VerdictResult,
    ) -> Self {
        Self {
            claim: claim.text().to_string(),
            ground_truth_label: ground_truth.filter(|l| !l.is_empty()),
            predicted_label: result.verdict.to_string(),
            rationale: result.rationale.clone(),
        }
    }

    pub fn verdict(&self) -> Option<Verdict> {
        Verdict::parse_lenient(&self.predicted_label)
    }
}
