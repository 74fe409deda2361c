//! Checkpointed batch evaluation.
//!
//! A run scans the dataset in order, skips rows the filter rejects and
//! claims the [`ResultSink`] already holds, and checks at most
//! `batch_limit` new claims. Every result is persisted before the next
//! claim starts, so an interrupted run loses nothing and a repeated run
//! redoes nothing.

use crate::dataset::DatasetRow;
use crate::error::{BatchAborted, VeracityError};
use crate::pipeline::ClaimChecker;
use crate::sink::ResultSink;
use crate::types::OutputRow;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

/// Pre-run view of how much work a dataset still holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkSurvey {
    /// Rows that pass the filter, empty text included.
    pub selected: usize,
    /// Selected rows with no claim text.
    pub empty_text: usize,
    /// Distinct evaluable claims already in the results file.
    pub already_completed: usize,
    /// Distinct evaluable claims not yet processed.
    pub remaining: usize,
    /// Claims the next run will process: `min(remaining, batch_limit)`.
    pub next_batch: usize,
}

impl WorkSurvey {
    pub fn estimated_cost(&self, cost_per_claim: f64) -> f64 {
        self.next_batch as f64 * cost_per_claim
    }
}

/// Count remaining work without touching the results file.
pub fn survey<I, P>(
    rows: I,
    completed: &HashSet<String>,
    batch_limit: usize,
    predicate: P,
) -> Result<WorkSurvey, VeracityError>
where
    I: IntoIterator<Item = Result<DatasetRow, VeracityError>>,
    P: Fn(&DatasetRow) -> bool,
{
    let mut survey = WorkSurvey::default();
    let mut seen = HashSet::new();

    for row in rows {
        let row = row?;
        if !predicate(&row) {
            continue;
        }
        survey.selected += 1;
        if row.claim.text().is_empty() {
            warn!(line = row.line, "Selected row has empty claim text");
            survey.empty_text += 1;
            continue;
        }
        if !seen.insert(row.claim.key().to_string()) {
            continue;
        }
        if completed.contains(row.claim.key()) {
            survey.already_completed += 1;
        } else {
            survey.remaining += 1;
        }
    }

    survey.next_batch = survey.remaining.min(batch_limit);
    Ok(survey)
}

/// Outcome of a batch run that finished normally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// New rows written during this run.
    pub completed: usize,
    /// Rows skipped because their claim was already in the results file.
    pub skipped_completed: usize,
    /// Rows rejected by the filter or with empty text.
    pub skipped_filtered: usize,
    /// Whether the run stopped at the batch limit with work left over.
    pub limit_reached: bool,
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().nth(max_chars).is_some() {
        out.push_str("...");
    }
    out
}

/// Check up to `batch_limit` new claims from `rows`, appending each result
/// to `sink` as soon as it is produced.
///
/// Any dataset or sink failure stops the run immediately. Rows written
/// before the failure stay in the file and the error reports their count.
pub async fn run_batch<I, P>(
    rows: I,
    sink: &mut ResultSink,
    batch_limit: usize,
    predicate: P,
    checker: &dyn ClaimChecker,
) -> Result<BatchReport, BatchAborted>
where
    I: IntoIterator<Item = Result<DatasetRow, VeracityError>>,
    P: Fn(&DatasetRow) -> bool,
{
    let mut report = BatchReport::default();

    for row in rows {
        let row = row.map_err(|source| BatchAborted {
            completed: report.completed,
            source,
        })?;

        if !predicate(&row) || row.claim.text().is_empty() {
            report.skipped_filtered += 1;
            continue;
        }
        if sink.is_completed(row.claim.key()) {
            report.skipped_completed += 1;
            continue;
        }
        if report.completed >= batch_limit {
            report.limit_reached = true;
            break;
        }

        info!(
            "[{}/{}] Checking: {}",
            report.completed + 1,
            batch_limit,
            preview(row.claim.text(), 50)
        );
        let result = checker.check(&row.claim).await;
        let output = OutputRow::from_result(&row.claim, row.ground_truth.clone(), &result);

        sink.append(&output).map_err(|source| BatchAborted {
            completed: report.completed,
            source,
        })?;
        report.completed += 1;
        info!(verdict = %result.verdict, line = row.line, "Claim saved");
    }

    info!(
        completed = report.completed,
        skipped = report.skipped_completed,
        limit_reached = report.limit_reached,
        "Batch finished"
    );
    Ok(report)
}
