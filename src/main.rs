//! flaky-reporter CLI - run a test command and publish its failure report.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use flaky_reporter::config;
use flaky_reporter::pipeline::{Pipeline, PipelineOptions, RunSummary};
use flaky_reporter::publisher::{AmqpPublisher, ReportPublisher, StdoutPublisher};

#[derive(Parser)]
#[command(name = "flaky-reporter")]
#[command(
    about = "Run a test command and publish its failure report to RabbitMQ",
    long_about = "Run a test command and publish its failure report to RabbitMQ.\n\n\
                  All run settings are read from FLAKY_* environment variables."
)]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Skip the synthetic disk write before the test run
    #[arg(long)]
    no_prime: bool,

    /// Print the report to stdout instead of publishing it
    #[arg(long)]
    dry_run: bool,

    /// Publish a report even when the test command exits non-zero
    #[arg(long)]
    publish_on_failure: bool,

    /// Directory scanned for XML artifacts, relative to FLAKY_APP_PATH
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::load_config().context("Invalid configuration")?;
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }

    info!(
        "Loaded configuration for project '{}', run '{}'",
        config.metadata.project_id, config.metadata.test_run_id
    );

    let options = PipelineOptions {
        prime_disk: !cli.no_prime,
        publish_on_failure: cli.publish_on_failure,
    };

    let summary = if cli.dry_run {
        run_with(&config, StdoutPublisher, options).await?
    } else {
        let publisher = AmqpPublisher::new(config.broker.clone());
        run_with(&config, publisher, options).await?
    };

    print_summary(&summary);
    Ok(())
}

async fn run_with<P: ReportPublisher>(
    config: &config::RunConfiguration,
    publisher: P,
    options: PipelineOptions,
) -> Result<RunSummary> {
    Pipeline::new(config, publisher)
        .with_options(options)
        .run()
        .await
        .map_err(|e| {
            let stage = e.stage();
            anyhow::Error::new(e).context(format!("Aborted while {}", stage))
        })
}

/// Prints a short summary of the run to stderr.
fn print_summary(summary: &RunSummary) {
    let message = &summary.message;
    eprintln!();
    eprintln!("Report:");
    eprintln!("  Artifacts:  {}", summary.stats.parsed + summary.stats.unparsed);
    if summary.stats.unparsed > 0 {
        eprintln!(
            "  Unparsed:   {}",
            console::style(summary.stats.unparsed).yellow()
        );
    }
    eprintln!(
        "  Test cases: {}",
        console::style(message.test_case_count()).red()
    );
    eprintln!("  Duration:   {} ms", message.duration);
    if summary.exit_code != Some(0) {
        eprintln!(
            "  Exit code:  {}",
            console::style(
                summary
                    .exit_code
                    .map_or_else(|| "signal".to_string(), |c| c.to_string())
            )
            .red()
        );
    }
    eprintln!();
    eprintln!(
        "{}",
        console::style(format!("Report sent via {}.", summary.publisher))
            .green()
            .bold()
    );
}
