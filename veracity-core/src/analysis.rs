//! Secondary analyses over a results file: misclassified-row export and
//! verdict distribution for unlabeled datasets.

use crate::error::VeracityError;
use crate::metrics::{RowOutcome, TolerancePolicy, TruthBuckets, row_outcome};
use crate::sink::write_output_rows;
use crate::types::{OutputRow, Verdict};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Which off-diagonal cell of the confusion matrix to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorKind {
    #[default]
    FalsePositive,
    FalseNegative,
}

impl ErrorKind {
    fn outcome(self) -> RowOutcome {
        match self {
            ErrorKind::FalsePositive => RowOutcome::FalsePositive,
            ErrorKind::FalseNegative => RowOutcome::FalseNegative,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::FalsePositive => f.write_str("false positives"),
            ErrorKind::FalseNegative => f.write_str("false negatives"),
        }
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fp" | "false-positive" | "false-positives" => Ok(ErrorKind::FalsePositive),
            "fn" | "false-negative" | "false-negatives" => Ok(ErrorKind::FalseNegative),
            other => Err(format!("unknown error kind '{other}' (expected fp or fn)")),
        }
    }
}

/// Rows that land in the `kind` cell under `policy`, in file order.
pub fn select_misclassified<'a>(
    rows: &'a [OutputRow],
    buckets: &TruthBuckets,
    policy: TolerancePolicy,
    kind: ErrorKind,
) -> Vec<&'a OutputRow> {
    let wanted = kind.outcome();
    rows.iter()
        .filter(|row| row_outcome(row, buckets, policy) == wanted)
        .collect()
}

/// Write the `kind` rows to `path` and return how many were written.
pub fn export_misclassified(
    rows: &[OutputRow],
    buckets: &TruthBuckets,
    policy: TolerancePolicy,
    kind: ErrorKind,
    path: &Path,
) -> Result<usize, VeracityError> {
    let selected: Vec<OutputRow> = select_misclassified(rows, buckets, policy, kind)
        .into_iter()
        .cloned()
        .collect();
    write_output_rows(path, &selected)?;
    info!(
        count = selected.len(),
        kind = %kind,
        path = %path.display(),
        "Exported misclassified rows"
    );
    Ok(selected.len())
}

/// Count and samples for one verdict label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelShare {
    pub label: String,
    pub count: usize,
    pub percent: f64,
    pub examples: Vec<OutputRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelDistribution {
    pub total: usize,
    pub labels: Vec<LabelShare>,
}

/// Canonical label for a stored prediction; unknown labels are kept
/// upper-cased so they still show up in the distribution.
fn canonical_label(raw: &str) -> String {
    match Verdict::parse_lenient(raw) {
        Some(v) => v.as_str().to_string(),
        None if raw.trim().is_empty() => Verdict::Error.as_str().to_string(),
        None => raw.trim().to_uppercase(),
    }
}

/// Count predictions per label and draw up to `samples_per_label` random
/// example rows for each.
///
/// The four verdict labels are always listed, in taxonomy order; any other
/// labels follow alphabetically.
pub fn label_distribution<R: Rng + ?Sized>(
    rows: &[OutputRow],
    samples_per_label: usize,
    rng: &mut R,
) -> LabelDistribution {
    let mut groups: BTreeMap<String, Vec<&OutputRow>> = BTreeMap::new();
    for row in rows {
        groups
            .entry(canonical_label(&row.predicted_label))
            .or_default()
            .push(row);
    }

    let mut order: Vec<String> = Verdict::ALL.iter().map(|v| v.as_str().to_string()).collect();
    let extra: Vec<String> = groups
        .keys()
        .filter(|k| !order.contains(k))
        .cloned()
        .collect();
    order.extend(extra);

    let total = rows.len();
    let labels = order
        .into_iter()
        .map(|label| {
            let members = groups.remove(&label).unwrap_or_default();
            let examples = members
                .choose_multiple(rng, samples_per_label)
                .map(|row| (*row).clone())
                .collect();
            LabelShare {
                count: members.len(),
                percent: if total == 0 {
                    0.0
                } else {
                    members.len() as f64 * 100.0 / total as f64
                },
                examples,
                label,
            }
        })
        .collect();

    LabelDistribution { total, labels }
}

fn one_line(text: &str, max_chars: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

impl fmt::Display for LabelDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Claims analysed: {}", self.total)?;
        for share in &self.labels {
            writeln!(
                f,
                "  {:<10} {:>5}  ({:.1}%)",
                share.label, share.count, share.percent
            )?;
        }
        for share in self.labels.iter().filter(|s| !s.examples.is_empty()) {
            writeln!(f)?;
            writeln!(f, "Examples of {}:", share.label)?;
            for (i, example) in share.examples.iter().enumerate() {
                writeln!(f, "{}. CLAIM: \"{}\"", i + 1, one_line(&example.claim, 100))?;
                writeln!(f, "   RATIONALE: {}", one_line(&example.rationale, 150))?;
            }
        }
        Ok(())
    }
}
