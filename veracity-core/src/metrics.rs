//! Confusion-matrix evaluation of a results file against ground truth.
//!
//! Predictions are binary: `SUPPORTED` is positive, `NEGATE` is negative,
//! everything else is a no-prediction. Ground-truth labels are sorted into
//! buckets by [`TruthBuckets`]; the [`TolerancePolicy`] decides whether the
//! ambiguous bucket is dropped or folded into positive/negative.

use crate::types::{OutputRow, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Binary side a ground-truth label counts toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruthBucket {
    Positive,
    Negative,
}

/// Ground-truth label sets shared by both policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthBuckets {
    #[serde(default = "default_positive")]
    pub truth_positive: Vec<String>,
    #[serde(default = "default_negative")]
    pub truth_negative: Vec<String>,
    /// Dropped under the strict policy.
    #[serde(default = "default_ambiguous")]
    pub truth_ambiguous: Vec<String>,
    /// Where the lenient policy puts ambiguous labels.
    #[serde(default = "default_fold")]
    pub lenient_fold: BTreeMap<String, TruthBucket>,
}

impl Default for TruthBuckets {
    fn default() -> Self {
        Self {
            truth_positive: default_positive(),
            truth_negative: default_negative(),
            truth_ambiguous: default_ambiguous(),
            lenient_fold: default_fold(),
        }
    }
}

fn default_positive() -> Vec<String> {
    vec!["true".into(), "mostly-true".into()]
}

fn default_negative() -> Vec<String> {
    vec!["false".into(), "pants-on-fire".into()]
}

fn default_ambiguous() -> Vec<String> {
    vec!["half-true".into(), "mostly-false".into()]
}

fn default_fold() -> BTreeMap<String, TruthBucket> {
    BTreeMap::from([
        ("half-true".to_string(), TruthBucket::Positive),
        ("mostly-false".to_string(), TruthBucket::Negative),
    ])
}

fn contains_label(set: &[String], label: &str) -> bool {
    set.iter().any(|l| l.trim().eq_ignore_ascii_case(label))
}

/// Where a ground-truth label lands under a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruthClass {
    Scored(TruthBucket),
    Ambiguous,
    Unlabeled,
}

impl TruthBuckets {
    pub fn classify(&self, label: Option<&str>, policy: TolerancePolicy) -> TruthClass {
        let label = match label.map(|l| l.trim().to_lowercase()) {
            Some(l) if !l.is_empty() => l,
            _ => return TruthClass::Unlabeled,
        };

        if contains_label(&self.truth_positive, &label) {
            return TruthClass::Scored(TruthBucket::Positive);
        }
        if contains_label(&self.truth_negative, &label) {
            return TruthClass::Scored(TruthBucket::Negative);
        }
        if policy == TolerancePolicy::Lenient {
            let folded = self
                .lenient_fold
                .iter()
                .find(|(k, _)| k.trim().eq_ignore_ascii_case(&label))
                .map(|(_, bucket)| *bucket);
            if let Some(bucket) = folded {
                return TruthClass::Scored(bucket);
            }
        }
        if contains_label(&self.truth_ambiguous, &label) {
            TruthClass::Ambiguous
        } else {
            TruthClass::Unlabeled
        }
    }
}

/// How ambiguous ground truth is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TolerancePolicy {
    /// Ambiguous labels are excluded.
    Strict,
    /// Ambiguous labels are folded per `lenient_fold`.
    #[default]
    Lenient,
}

impl fmt::Display for TolerancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TolerancePolicy::Strict => f.write_str("strict"),
            TolerancePolicy::Lenient => f.write_str("lenient"),
        }
    }
}

impl FromStr for TolerancePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(TolerancePolicy::Strict),
            "lenient" | "tolerant" => Ok(TolerancePolicy::Lenient),
            other => Err(format!("unknown policy '{other}' (expected strict or lenient)")),
        }
    }
}

/// Fate of a single results row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    TruePositive,
    FalsePositive,
    TrueNegative,
    FalseNegative,
    NoPrediction,
    Ambiguous,
    Unlabeled,
}

/// Classify one row. Prediction exclusion is checked before ground truth.
pub fn row_outcome(row: &OutputRow, buckets: &TruthBuckets, policy: TolerancePolicy) -> RowOutcome {
    let predicted_positive = match row.verdict() {
        Some(Verdict::Supported) => true,
        Some(Verdict::Negate) => false,
        Some(Verdict::Baseless) | Some(Verdict::Error) | None => return RowOutcome::NoPrediction,
    };

    match (
        predicted_positive,
        buckets.classify(row.ground_truth_label.as_deref(), policy),
    ) {
        (_, TruthClass::Ambiguous) => RowOutcome::Ambiguous,
        (_, TruthClass::Unlabeled) => RowOutcome::Unlabeled,
        (true, TruthClass::Scored(TruthBucket::Positive)) => RowOutcome::TruePositive,
        (true, TruthClass::Scored(TruthBucket::Negative)) => RowOutcome::FalsePositive,
        (false, TruthClass::Scored(TruthBucket::Negative)) => RowOutcome::TrueNegative,
        (false, TruthClass::Scored(TruthBucket::Positive)) => RowOutcome::FalseNegative,
    }
}

/// 2x2 matrix plus exclusion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    /// Rows whose prediction was BASELESS, ERROR or unreadable.
    pub no_prediction: usize,
    /// Rows with ambiguous ground truth (strict policy only).
    pub ambiguous: usize,
    /// Rows whose ground truth is missing or in no bucket.
    pub unlabeled: usize,
}

impl ConfusionMatrix {
    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::TruePositive => self.tp += 1,
            RowOutcome::FalsePositive => self.fp += 1,
            RowOutcome::TrueNegative => self.tn += 1,
            RowOutcome::FalseNegative => self.fn_ += 1,
            RowOutcome::NoPrediction => self.no_prediction += 1,
            RowOutcome::Ambiguous => self.ambiguous += 1,
            RowOutcome::Unlabeled => self.unlabeled += 1,
        }
    }

    pub fn scored(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn excluded(&self) -> usize {
        self.no_prediction + self.ambiguous + self.unlabeled
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Derived rates in `[0, 1]`. A zero denominator yields 0.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub specificity: f64,
    pub f1: f64,
}

impl DerivedMetrics {
    pub fn from_matrix(m: &ConfusionMatrix) -> Self {
        let (tp, fp, tn, fn_) = (m.tp as f64, m.fp as f64, m.tn as f64, m.fn_ as f64);
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        Self {
            accuracy: ratio(tp + tn, m.scored() as f64),
            precision,
            recall,
            specificity: ratio(tn, tn + fp),
            f1: ratio(2.0 * precision * recall, precision + recall),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub policy: TolerancePolicy,
    pub total_rows: usize,
    pub matrix: ConfusionMatrix,
    pub metrics: DerivedMetrics,
}

/// Evaluate all `rows` under `policy`. Recomputed from scratch every call.
pub fn compute_metrics(
    rows: &[OutputRow],
    buckets: &TruthBuckets,
    policy: TolerancePolicy,
) -> MetricsReport {
    let mut matrix = ConfusionMatrix::default();
    for row in rows {
        matrix.record(row_outcome(row, buckets, policy));
    }
    MetricsReport {
        policy,
        total_rows: rows.len(),
        matrix,
        metrics: DerivedMetrics::from_matrix(&matrix),
    }
}

fn percent(part: usize, total: usize) -> f64 {
    ratio(part as f64, total as f64) * 100.0
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.matrix;
        let total = self.total_rows;
        writeln!(f, "Policy: {}", self.policy)?;
        writeln!(f, "Total rows: {total}")?;
        writeln!(
            f,
            "  Excluded, no prediction (BASELESS/ERROR): {} ({:.1}%)",
            m.no_prediction,
            percent(m.no_prediction, total)
        )?;
        if self.policy == TolerancePolicy::Strict || m.ambiguous > 0 {
            writeln!(
                f,
                "  Excluded, ambiguous ground truth:         {} ({:.1}%)",
                m.ambiguous,
                percent(m.ambiguous, total)
            )?;
        }
        writeln!(
            f,
            "  Excluded, unlabeled ground truth:         {} ({:.1}%)",
            m.unlabeled,
            percent(m.unlabeled, total)
        )?;
        writeln!(
            f,
            "Scored: {} ({:.1}%)",
            m.scored(),
            percent(m.scored(), total)
        )?;
        writeln!(f)?;
        writeln!(f, "Confusion matrix:")?;
        writeln!(f, "                 truth +   truth -")?;
        writeln!(f, "  predicted +  {:>8}  {:>8}", m.tp, m.fp)?;
        writeln!(f, "  predicted -  {:>8}  {:>8}", m.fn_, m.tn)?;
        writeln!(f)?;
        let d = &self.metrics;
        writeln!(f, "Accuracy:    {:.1}%", d.accuracy * 100.0)?;
        writeln!(f, "Precision:   {:.1}%", d.precision * 100.0)?;
        writeln!(f, "Recall:      {:.1}%", d.recall * 100.0)?;
        writeln!(f, "F1 score:    {:.1}%", d.f1 * 100.0)?;
        write!(f, "Specificity: {:.1}%", d.specificity * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(truth: Option<&str>, predicted: &str) -> OutputRow {
        OutputRow {
            claim: format!("{truth:?} {predicted}"),
            ground_truth_label: truth.map(str::to_string),
            predicted_label: predicted.to_string(),
            rationale: String::new(),
        }
    }

    #[test]
    fn test_balanced_scenario() {
        let rows = vec![
            row(Some("true"), "SUPPORTED"),
            row(Some("false"), "SUPPORTED"),
            row(Some("true"), "NEGATE"),
            row(Some("false"), "NEGATE"),
        ];
        let report = compute_metrics(&rows, &TruthBuckets::default(), TolerancePolicy::Strict);
        let m = &report.matrix;
        assert_eq!((m.tp, m.fp, m.tn, m.fn_), (1, 1, 1, 1));
        assert_eq!(
            report.metrics,
            DerivedMetrics {
                accuracy: 0.5,
                precision: 0.5,
                recall: 0.5,
                specificity: 0.5,
                f1: 0.5,
            }
        );
    }

    #[test]
    fn test_zero_denominators_are_zero() {
        let rows = vec![row(Some("true"), "BASELESS"), row(Some("false"), "ERRORE")];
        let report = compute_metrics(&rows, &TruthBuckets::default(), TolerancePolicy::Lenient);
        assert_eq!(report.matrix.scored(), 0);
        assert_eq!(report.matrix.no_prediction, 2);
        assert_eq!(report.metrics, DerivedMetrics::default());

        let empty = compute_metrics(&[], &TruthBuckets::default(), TolerancePolicy::Strict);
        assert_eq!(empty.metrics, DerivedMetrics::default());
        assert!(empty.to_string().contains("Accuracy:    0.0%"));
    }

    #[test]
    fn test_strict_excludes_ambiguous_lenient_folds() {
        let rows = vec![
            row(Some("half-true"), "SUPPORTED"),
            row(Some("mostly-false"), "SUPPORTED"),
            row(Some("Mostly-True "), "NEGATE"),
        ];
        let buckets = TruthBuckets::default();

        let strict = compute_metrics(&rows, &buckets, TolerancePolicy::Strict);
        assert_eq!(strict.matrix.ambiguous, 2);
        assert_eq!(strict.matrix.fn_, 1);
        assert_eq!(strict.matrix.scored(), 1);

        let lenient = compute_metrics(&rows, &buckets, TolerancePolicy::Lenient);
        assert_eq!(lenient.matrix.ambiguous, 0);
        assert_eq!(lenient.matrix.tp, 1);
        assert_eq!(lenient.matrix.fp, 1);
        assert_eq!(lenient.matrix.fn_, 1);
    }

    #[test]
    fn test_no_prediction_checked_before_truth() {
        let rows = vec![row(Some("half-true"), "BASELESS"), row(None, "ERROR")];
        let report = compute_metrics(&rows, &TruthBuckets::default(), TolerancePolicy::Strict);
        assert_eq!(report.matrix.no_prediction, 2);
        assert_eq!(report.matrix.ambiguous, 0);
        assert_eq!(report.matrix.unlabeled, 0);
    }

    #[test]
    fn test_unknown_labels() {
        let rows = vec![
            row(Some("full-flop"), "SUPPORTED"),
            row(None, "NEGATE"),
            row(Some("true"), "maybe"),
        ];
        let report = compute_metrics(&rows, &TruthBuckets::default(), TolerancePolicy::Lenient);
        assert_eq!(report.matrix.unlabeled, 2);
        assert_eq!(report.matrix.no_prediction, 1);
        assert_eq!(report.matrix.scored(), 0);
    }

    #[test]
    fn test_custom_fold() {
        let mut buckets = TruthBuckets::default();
        buckets
            .lenient_fold
            .insert("half-true".into(), TruthBucket::Negative);
        let rows = vec![row(Some("half-true"), "NEGATE")];
        let report = compute_metrics(&rows, &buckets, TolerancePolicy::Lenient);
        assert_eq!(report.matrix.tn, 1);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("STRICT".parse::<TolerancePolicy>(), Ok(TolerancePolicy::Strict));
        assert_eq!("lenient".parse::<TolerancePolicy>(), Ok(TolerancePolicy::Lenient));
        assert!("fuzzy".parse::<TolerancePolicy>().is_err());
    }

    #[test]
    fn test_report_text() {
        let rows = vec![
            row(Some("true"), "SUPPORTED"),
            row(Some("false"), "SUPPORTED"),
            row(Some("true"), "NEGATE"),
            row(Some("false"), "NEGATE"),
            row(Some("half-true"), "BASELESS"),
        ];
        let text =
            compute_metrics(&rows, &TruthBuckets::default(), TolerancePolicy::Strict).to_string();
        assert!(text.contains("Total rows: 5"));
        assert!(text.contains("no prediction (BASELESS/ERROR): 1 (20.0%)"));
        assert!(text.contains("Scored: 4 (80.0%)"));
        assert!(text.contains("Precision:   50.0%"));
    }

    #[test]
    fn test_report_json() {
        let report = compute_metrics(
            &[row(Some("true"), "SUPPORTED")],
            &TruthBuckets::default(),
            TolerancePolicy::Lenient,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["policy"], "lenient");
        assert_eq!(json["matrix"]["tp"], 1);
        assert_eq!(json["matrix"]["fn"], 0);
        assert_eq!(json["metrics"]["precision"], 1.0);
    }
}
