//! End-to-end batch runs over CSV files: resumption, de-duplication and
//! fail-fast aborts.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use veracity_core::error::{RetrievalError, VeracityError};
use veracity_core::metrics::{TolerancePolicy, TruthBuckets, compute_metrics};
use veracity_core::reranker::CredibilityTable;
use veracity_core::{
    ClaimChecker, CredibilityReranker, DatasetProfile, DatasetReader, EvidenceItem,
    FactCheckPipeline, LlmQueryPlanner, LlmVerdictClassifier, MockLlmProvider, ResultSink,
    Retriever, Verdict, VerdictResult, read_output_rows, run_batch, survey,
};
use veracity_core::types::Claim;

const POLITIFACT: &str = "\
author,quote,rating_label,context,date
A,The sky is green,false,a speech,2020-01-01
B,Water is wet,true,an interview,2020-01-02
C,Half of it is right,half-true,a post,2020-01-03
D,The sky is green,false,a repeat,2020-01-04
E,Taxes went up,mostly-false,an ad,2020-01-05
";

/// Answers SUPPORTED for claims containing "wet", NEGATE otherwise.
#[derive(Default)]
struct KeywordChecker {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ClaimChecker for KeywordChecker {
    async fn check(&self, claim: &Claim) -> VerdictResult {
        self.calls.lock().unwrap().push(claim.text().to_string());
        let verdict = if claim.text().contains("wet") {
            Verdict::Supported
        } else {
            Verdict::Negate
        };
        VerdictResult::new(verdict, format!("keyword judgement of '{}'", claim.text()))
    }
}

fn write_dataset(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("politifact.csv");
    std::fs::write(&path, POLITIFACT).unwrap();
    path
}

async fn run_once(
    input: &Path,
    output: &Path,
    limit: usize,
    checker: &dyn ClaimChecker,
) -> usize {
    let reader = DatasetReader::open(input, &DatasetProfile::politifact()).unwrap();
    let mut sink = ResultSink::open(output).unwrap();
    run_batch(reader.rows(), &mut sink, limit, |r| r.is_evaluable(), checker)
        .await
        .unwrap()
        .completed
}

fn claim_counts(output: &Path) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for row in read_output_rows(output).unwrap() {
        *counts.entry(row.claim).or_insert(0) += 1;
    }
    counts
}

#[tokio::test]
async fn second_run_without_new_data_completes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = write_dataset(&dir);
    let output = dir.path().join("out").join("results.csv");
    let checker = KeywordChecker::default();

    assert_eq!(run_once(&input, &output, 100, &checker).await, 4);
    let after_first = claim_counts(&output);

    assert_eq!(run_once(&input, &output, 100, &checker).await, 0);
    assert_eq!(claim_counts(&output), after_first);
    assert_eq!(checker.calls.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn batches_resume_in_dataset_order_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let input = write_dataset(&dir);
    let output = dir.path().join("results.csv");
    let checker = KeywordChecker::default();

    let mut total = 0;
    for _ in 0..5 {
        total += run_once(&input, &output, 1, &checker).await;
    }
    assert_eq!(total, 4);

    let rows = read_output_rows(&output).unwrap();
    let claims: Vec<&str> = rows.iter().map(|r| r.claim.as_str()).collect();
    assert_eq!(
        claims,
        vec![
            "The sky is green",
            "Water is wet",
            "Half of it is right",
            "Taxes went up"
        ]
    );
    assert!(claim_counts(&output).values().all(|&n| n == 1));
    assert_eq!(rows[1].ground_truth_label.as_deref(), Some("true"));
    assert_eq!(rows[1].predicted_label, "SUPPORTED");
}

#[tokio::test]
async fn abort_keeps_rows_written_before_the_failure() {
    let dir = TempDir::new().unwrap();
    let input = write_dataset(&dir);
    let output = dir.path().join("results.csv");
    let checker = KeywordChecker::default();

    let reader = DatasetReader::open(&input, &DatasetProfile::politifact()).unwrap();
    let failing = reader.rows().take(2).chain(std::iter::once(Err(VeracityError::Io(
        std::io::Error::other("input vanished"),
    ))));

    let mut sink = ResultSink::open(&output).unwrap();
    let err = run_batch(failing, &mut sink, 100, |r| r.is_evaluable(), &checker)
        .await
        .unwrap_err();
    drop(sink);

    assert_eq!(err.completed, 2);
    assert!(matches!(err.source, VeracityError::Io(_)));
    assert_eq!(claim_counts(&output).len(), 2);

    // The next run picks up where the aborted one stopped.
    assert_eq!(run_once(&input, &output, 100, &checker).await, 2);
    assert_eq!(claim_counts(&output).len(), 4);
}

#[tokio::test]
async fn survey_matches_what_a_run_does() {
    let dir = TempDir::new().unwrap();
    let input = write_dataset(&dir);
    let output = dir.path().join("results.csv");
    let checker = KeywordChecker::default();
    run_once(&input, &output, 1, &checker).await;

    let sink = ResultSink::open(&output).unwrap();
    let reader = DatasetReader::open(&input, &DatasetProfile::politifact()).unwrap();
    let s = survey(reader.rows(), sink.completed(), 2, |r| r.selected).unwrap();
    assert_eq!(s.selected, 5);
    assert_eq!(s.already_completed, 1);
    assert_eq!(s.remaining, 3);
    assert_eq!(s.next_batch, 2);
}

#[tokio::test]
async fn metrics_over_a_finished_run() {
    let dir = TempDir::new().unwrap();
    let input = write_dataset(&dir);
    let output = dir.path().join("results.csv");
    run_once(&input, &output, 100, &KeywordChecker::default()).await;

    let rows = read_output_rows(&output).unwrap();
    let strict = compute_metrics(&rows, &TruthBuckets::default(), TolerancePolicy::Strict);
    assert_eq!((strict.matrix.tp, strict.matrix.tn, strict.matrix.ambiguous), (1, 1, 2));

    let lenient = compute_metrics(&rows, &TruthBuckets::default(), TolerancePolicy::Lenient);
    // half-true folds positive and was predicted NEGATE.
    assert_eq!(lenient.matrix.fn_, 1);
    assert_eq!(lenient.matrix.tn, 2);
    assert_eq!(lenient.matrix.scored(), 4);
}

struct FixedRetriever(Vec<EvidenceItem>);

#[async_trait]
impl Retriever for FixedRetriever {
    async fn search(&self, _query: &str) -> Result<Vec<EvidenceItem>, RetrievalError> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn pipeline_with_mock_model_feeds_the_batch() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("one.csv");
    std::fs::write(&input, "quote,rating_label\nThe moon is cheese,false\n").unwrap();
    let output = dir.path().join("results.csv");

    let llm = Arc::new(MockLlmProvider::new());
    llm.queue_response(r#"{"query": "moon cheese fact check"}"#);
    llm.queue_response(r#"{"verdict": "NEGATE", "rationale": "NASA samples are rock."}"#);

    let pipeline = FactCheckPipeline::new(
        Arc::new(LlmQueryPlanner::new(llm.clone(), "planner", 200)),
        Arc::new(FixedRetriever(vec![
            EvidenceItem::new("https://www.nasa.gov/moon", "Lunar samples are basalt.")
                .with_score(0.4),
        ])),
        CredibilityReranker::new(CredibilityTable::from_scores([("nasa.gov", 5)], 3), 10.0),
        Arc::new(LlmVerdictClassifier::new(llm.clone(), "judge")),
        30,
    );

    assert_eq!(run_once(&input, &output, 10, &pipeline).await, 1);
    let rows = read_output_rows(&output).unwrap();
    assert_eq!(rows[0].predicted_label, "NEGATE");
    assert_eq!(rows[0].rationale, "NASA samples are rock.");
    assert_eq!(llm.call_count(), 2);
    assert!(llm.requests()[1].messages[1].content.contains("https://www.nasa.gov/moon"));
}
