use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tumorclf_core::{init_tracing, ConfigManager, ForestParams};
use tumorclf_tracking::open_store;
use tumorclf_train::{
    default_runs, run_batch, train_model, BatchOutcome, FailurePolicy, RunSummary, TrainSettings,
};

#[derive(Parser)]
#[command(name = "tumorclf-train")]
#[command(about = "Train, evaluate and register breast-cancer tumor classifiers", long_about = None)]
#[command(version)]
struct Cli {
    /// Tracking server URI (file:<dir> or http(s)://host:port)
    #[arg(long, global = true)]
    tracking_uri: Option<String>,

    /// Experiment that receives the runs
    #[arg(long, global = true)]
    experiment: Option<String>,

    /// Registered model name
    #[arg(long, global = true)]
    model_name: Option<String>,

    /// Directory for local artifact copies
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the three reference configurations (default)
    Batch {
        /// Keep going when a run in the batch fails
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Train a single configuration
    Run {
        /// Run name shown in the tracker
        #[arg(short, long)]
        name: String,

        /// Number of trees
        #[arg(long, default_value_t = 100)]
        n_estimators: u16,

        /// Maximum tree depth; unbounded when omitted
        #[arg(long)]
        max_depth: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = ConfigManager::load().context("Failed to load configuration")?;
    let mut config = manager.config().clone();
    if let Some(uri) = cli.tracking_uri {
        config.tracking.tracking_uri = uri;
    }
    if let Some(experiment) = cli.experiment {
        config.tracking.experiment_name = experiment;
    }
    if let Some(model_name) = cli.model_name {
        config.tracking.model_name = model_name;
    }
    if let Some(work_dir) = cli.work_dir {
        config.training.work_dir = work_dir;
    }

    init_tracing(&config.logging);

    let store = open_store(&config.tracking.tracking_uri)
        .with_context(|| format!("Failed to open tracking store {}", config.tracking.tracking_uri))?;
    let settings = TrainSettings::from_config(&config);
    println!(
        "{} {} ({})",
        "Tracking:".bold(),
        store.location(),
        settings.experiment_name
    );

    let command = cli.command.unwrap_or(Commands::Batch {
        continue_on_error: false,
    });
    match command {
        Commands::Batch { continue_on_error } => {
            let policy = if continue_on_error {
                FailurePolicy::Skip
            } else {
                FailurePolicy::Abort
            };
            let outcome = run_batch(store, &settings, &default_runs(), policy).await?;
            print_outcome(&outcome);
            if !outcome.is_success() {
                bail!("{} of the batch runs failed", outcome.failed.len());
            }
        }
        Commands::Run {
            name,
            n_estimators,
            max_depth,
        } => {
            let params = ForestParams::new(n_estimators, max_depth);
            let summary = train_model(store, &settings, params, &name)
                .await
                .with_context(|| format!("Run {} failed", name))?;
            print_summary(&summary);
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} {} [{}] accuracy={:.4} f1={:.4} -> version {}",
        "✓".green(),
        summary.run_name.bold(),
        summary.params,
        summary.metrics.accuracy,
        summary.metrics.f1_score,
        summary.model_version.to_string().cyan()
    );
}

fn print_outcome(outcome: &BatchOutcome) {
    for summary in &outcome.completed {
        print_summary(summary);
    }
    for (name, error) in &outcome.failed {
        println!("{} {} {}", "✗".red(), name.bold(), error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn continue_on_error_belongs_to_batch() {
        let cli = Cli::try_parse_from(["tumorclf-train", "batch", "--continue-on-error"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Batch {
                continue_on_error: true
            })
        ));

        let single = Cli::try_parse_from([
            "tumorclf-train",
            "run",
            "--name",
            "Single",
            "--continue-on-error",
        ]);
        assert!(single.is_err());
    }

    #[test]
    fn no_subcommand_means_batch() {
        let cli = Cli::try_parse_from(["tumorclf-train", "--experiment", "Exp"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.experiment.as_deref(), Some("Exp"));
    }
}
