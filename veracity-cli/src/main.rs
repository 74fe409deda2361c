//! Veracity CLI: fact-check claims and score batch runs from the terminal.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use veracity_core::TolerancePolicy;
use veracity_core::analysis::ErrorKind;

/// Veracity: credibility-ranked, evidence-based claim verification
#[derive(Parser, Debug)]
#[command(name = "veracity", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds .veracity/config.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fact-check a single claim
    Check {
        /// The claim to verify
        claim: String,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        date: Option<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the next batch of a dataset, resuming from the results file
    Evaluate {
        /// Dataset profile name (see `config show`)
        #[arg(short, long, default_value = "politifact")]
        dataset: String,
        /// Input CSV
        #[arg(short, long)]
        input: PathBuf,
        /// Results CSV (default: output/<dataset>_results.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Claims to process in this run (default: batch.batch_size)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Confusion matrix and derived metrics for a results file
    Metrics {
        /// Results CSV
        results: PathBuf,
        /// strict drops ambiguous ground truth, lenient folds it
        #[arg(short, long, default_value = "lenient")]
        policy: TolerancePolicy,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export misclassified rows of a results file
    Errors {
        /// Results CSV
        results: PathBuf,
        /// fp (false positives) or fn (false negatives)
        #[arg(short, long, default_value = "fp")]
        kind: ErrorKind,
        #[arg(short, long, default_value = "lenient")]
        policy: TolerancePolicy,
        /// Destination CSV
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Verdict distribution with random examples, for unlabeled runs
    Distribution {
        /// Results CSV
        results: PathBuf,
        /// Examples shown per label
        #[arg(short, long, default_value = "3")]
        samples: usize,
        /// Print the distribution as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default .veracity/config.toml in the workspace
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "veracity", "veracity")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "veracity.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_evaluate() {
        let cli = Cli::try_parse_from([
            "veracity", "evaluate", "-d", "trump", "-i", "posts.csv", "--limit", "5", "--yes",
        ])
        .unwrap();
        match cli.command {
            Commands::Evaluate {
                dataset,
                input,
                output,
                limit,
                yes,
            } => {
                assert_eq!(dataset, "trump");
                assert_eq!(input, PathBuf::from("posts.csv"));
                assert_eq!(output, None);
                assert_eq!(limit, Some(5));
                assert!(yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_metrics_policy() {
        let cli =
            Cli::try_parse_from(["veracity", "metrics", "out.csv", "--policy", "strict"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Metrics {
                policy: TolerancePolicy::Strict,
                json: false,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["veracity", "metrics", "out.csv", "-p", "fuzzy"]).is_err());
    }

    #[test]
    fn test_parse_errors_kind() {
        let args = ["veracity", "errors", "r.csv", "-k", "fn", "-o", "fn.csv"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Errors {
                kind: ErrorKind::FalseNegative,
                ..
            }
        ));
    }
}
