//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use veracity_core::analysis::{ErrorKind, export_misclassified, label_distribution};
use veracity_core::dataset::profile_by_name;
use veracity_core::metrics::compute_metrics;
use veracity_core::{
    Claim, ClaimMetadata, DatasetReader, FactCheckPipeline, ResultSink, TolerancePolicy,
    VeracityConfig, VerdictResult, WorkSurvey, read_output_rows, run_batch, survey,
};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, config_path),
        Commands::Check {
            claim,
            author,
            context,
            date,
            json,
        } => {
            let metadata = ClaimMetadata {
                author,
                context,
                date,
            };
            handle_check(&claim, metadata, json, workspace, config_path).await
        }
        Commands::Evaluate {
            dataset,
            input,
            output,
            limit,
            yes,
        } => {
            handle_evaluate(
                &dataset,
                &input,
                output,
                limit,
                yes,
                workspace,
                config_path,
            )
            .await
        }
        Commands::Metrics {
            results,
            policy,
            json,
        } => handle_metrics(&results, policy, json, workspace, config_path),
        Commands::Errors {
            results,
            kind,
            policy,
            output,
        } => handle_errors(&results, kind, policy, &output, workspace, config_path),
        Commands::Distribution {
            results,
            samples,
            json,
        } => handle_distribution(&results, samples, json),
    }
}

fn load(workspace: &Path, config_path: Option<&Path>) -> anyhow::Result<VeracityConfig> {
    veracity_core::load_config(Some(workspace), config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".veracity");
            std::fs::create_dir_all(&config_dir)?;

            let path = config_dir.join("config.toml");
            if path.exists() {
                println!("Configuration file already exists at: {}", path.display());
                return Ok(());
            }

            let toml_str = VeracityConfig::default().to_toml_string()?;
            std::fs::write(&path, toml_str)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, config_path)?;
            println!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn render_check(claim: &Claim, result: &VerdictResult) -> String {
    let mut out = format!(
        "Claim:     {}\nVerdict:   {}\nRationale: {}\n",
        claim.text(),
        result.verdict,
        result.rationale
    );
    if !result.evidence.is_empty() {
        out.push_str(&format!("\nEvidence ({}, most credible first):\n", result.evidence.len()));
        for (i, item) in result.evidence.iter().enumerate() {
            let title = item.title.as_deref().unwrap_or("(untitled)");
            out.push_str(&format!("  {:>2}. {title}\n      {}\n", i + 1, item.url));
        }
    }
    out
}

async fn handle_check(
    text: &str,
    metadata: ClaimMetadata,
    json: bool,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let config = load(workspace, config_path)?;
    let pipeline = FactCheckPipeline::from_config(&config)?;

    let claim = Claim::new(text).with_metadata(metadata);
    if claim.text().is_empty() {
        anyhow::bail!("Claim text is empty");
    }
    let result = pipeline.run(&claim).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_check(&claim, &result));
    }
    Ok(())
}

fn default_output_path(workspace: &Path, dataset: &str) -> PathBuf {
    workspace
        .join("output")
        .join(format!("{dataset}_results.csv"))
}

fn render_survey(survey: &WorkSurvey, sink_rows: usize, cost_per_claim: f64) -> String {
    let rule = "=".repeat(60);
    format!(
        "{rule}\n\
         Claims selected in dataset:   {}\n\
         Rows with empty text:         {}\n\
         Already in results file:      {} ({} rows in file)\n\
         Remaining:                    {}\n\
         {}\n\
         Next batch:                   {} claims\n\
         Estimated cost:               ~${:.2}\n\
         {rule}",
        survey.selected,
        survey.empty_text,
        survey.already_completed,
        sink_rows,
        survey.remaining,
        "-".repeat(60),
        survey.next_batch,
        survey.estimated_cost(cost_per_claim),
    )
}

async fn handle_evaluate(
    dataset: &str,
    input: &Path,
    output: Option<PathBuf>,
    limit: Option<usize>,
    yes: bool,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let config = load(workspace, config_path)?;
    let profile = profile_by_name(&config.datasets, dataset)?;
    let output = output.unwrap_or_else(|| default_output_path(workspace, dataset));
    let batch_limit = limit.unwrap_or(config.batch.batch_size);

    let mut sink = ResultSink::open(&output)
        .with_context(|| format!("Cannot open results file {}", output.display()))?;
    let reader = DatasetReader::open(input, profile)
        .with_context(|| format!("Cannot read dataset {}", input.display()))?;
    let work = survey(reader.rows(), sink.completed(), batch_limit, |r| r.selected)?;
    info!(
        dataset,
        input = %input.display(),
        output = %output.display(),
        next_batch = work.next_batch,
        "Surveyed dataset"
    );

    println!(
        "{}",
        render_survey(&work, sink.completed_count(), config.batch.cost_per_claim)
    );

    if work.next_batch == 0 {
        if work.selected == 0 {
            println!("No claims selected in {}. Check the dataset profile.", input.display());
        } else {
            println!("All claims in this dataset have been processed.");
        }
        return Ok(());
    }

    if !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Process the next {} claims?", work.next_batch))
            .default(false)
            .interact()?;
        if !confirmed {
            info!("Evaluation cancelled at confirmation prompt");
            println!("Cancelled.");
            return Ok(());
        }
    }

    let pipeline = FactCheckPipeline::from_config(&config)?;
    let reader = DatasetReader::open(input, profile)?;
    match run_batch(reader.rows(), &mut sink, batch_limit, |r| r.selected, &pipeline).await {
        Ok(report) => {
            info!(
                completed = report.completed,
                skipped_completed = report.skipped_completed,
                limit_reached = report.limit_reached,
                "Batch finished"
            );
            println!(
                "Batch complete: {} new claims saved to {}",
                report.completed,
                output.display()
            );
            Ok(())
        }
        Err(aborted) => {
            error!(
                completed = aborted.completed,
                output = %output.display(),
                error = %aborted.source,
                "Batch aborted; rows saved before the error are kept"
            );
            Err(aborted.into())
        }
    }
}

fn handle_metrics(
    results: &Path,
    policy: TolerancePolicy,
    json: bool,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let config = load(workspace, config_path)?;
    let rows = read_output_rows(results)
        .with_context(|| format!("Cannot read results file {}", results.display()))?;
    let report = compute_metrics(&rows, &config.metrics, policy);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

fn handle_errors(
    results: &Path,
    kind: ErrorKind,
    policy: TolerancePolicy,
    output: &Path,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let config = load(workspace, config_path)?;
    let rows = read_output_rows(results)
        .with_context(|| format!("Cannot read results file {}", results.display()))?;
    let count = export_misclassified(&rows, &config.metrics, policy, kind, output)?;
    println!("Found {count} {kind} ({policy} policy). Saved to {}", output.display());
    Ok(())
}

fn handle_distribution(results: &Path, samples: usize, json: bool) -> anyhow::Result<()> {
    let rows = read_output_rows(results)
        .with_context(|| format!("Cannot read results file {}", results.display()))?;
    let distribution = label_distribution(&rows, samples, &mut rand::thread_rng());

    if json {
        println!("{}", serde_json::to_string_pretty(&distribution)?);
    } else {
        print!("{distribution}");
    }
    Ok(())
}
