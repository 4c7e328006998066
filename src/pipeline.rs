//! The collect-and-publish pipeline.
//!
//! A run moves through a fixed sequence of stages and stops at the first
//! unrecoverable error:
//!
//! ```text
//! Configuring → Priming → Running → Collecting → Assembling → Publishing → Done
//!      └───────────┴──────────┴───────────┴────────────┴────────────┴──→ Aborted
//! ```
//!
//! Configuration happens before a [`Pipeline`] exists (it needs a
//! [`RunConfiguration`]); every later stage is driven by [`Pipeline::run`].
//! Stages never terminate the process themselves. They return errors tagged
//! with the [`Stage`] they failed in, and the caller decides the exit code.

use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use crate::collector::{ArtifactCollector, CollectError, CollectStats};
use crate::config::{ConfigError, RunConfiguration};
use crate::primer::{self, PrimerError};
use crate::publisher::{PublishError, ReportPublisher};
use crate::report::{ReportError, TestEndMessage};
use crate::runner::{RunError, TestRunner};

/// A step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuring,
    Priming,
    Running,
    Collecting,
    Assembling,
    Publishing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuring => "configuring",
            Stage::Priming => "priming",
            Stage::Running => "running",
            Stage::Collecting => "collecting",
            Stage::Assembling => "assembling",
            Stage::Publishing => "publishing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why a run was aborted.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Primer(#[from] PrimerError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl PipelineError {
    /// The stage the run was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Config(_) => Stage::Configuring,
            PipelineError::Primer(_) => Stage::Priming,
            PipelineError::Run(_) => Stage::Running,
            PipelineError::Collect(_) => Stage::Collecting,
            PipelineError::Report(_) => Stage::Assembling,
            PipelineError::Publish(_) => Stage::Publishing,
        }
    }
}

/// Knobs that change how a run behaves, beyond the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Perform the synthetic disk write before running tests.
    pub prime_disk: bool,

    /// Publish a report even if the test command exits non-zero.
    ///
    /// Off by default: a failed run produces no report.
    pub publish_on_failure: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            prime_disk: true,
            publish_on_failure: false,
        }
    }
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub message: TestEndMessage,
    pub stats: CollectStats,
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub publisher: &'static str,
}

/// Drives a single run from priming to publishing.
pub struct Pipeline<'a, P: ReportPublisher> {
    config: &'a RunConfiguration,
    publisher: P,
    options: PipelineOptions,
}

impl<'a, P: ReportPublisher> Pipeline<'a, P> {
    pub fn new(config: &'a RunConfiguration, publisher: P) -> Self {
        Self {
            config,
            publisher,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs every stage after configuration.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error, tagged with its stage. Priming
    /// failures other than changing directory are logged and ignored.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        info!("Stage: {}", Stage::Priming);
        primer::enter_application_dir(&self.config.app_path)?;
        if self.options.prime_disk {
            self.prime().await;
        }

        info!("Stage: {}", Stage::Running);
        let runner = TestRunner::new(&self.config.test_run_cmd);
        let outcome = match runner.run().await {
            Ok(outcome) => outcome,
            Err(RunError::Failed { outcome, .. }) if self.options.publish_on_failure => {
                warn!("Test command failed, publishing report anyway");
                *outcome
            }
            Err(e) => return Err(e.into()),
        };

        info!("Stage: {}", Stage::Collecting);
        let artifacts = ArtifactCollector::new(&self.config.output_dir).collect()?;
        let stats = CollectStats::from_artifacts(&artifacts);

        info!("Stage: {}", Stage::Assembling);
        let message = TestEndMessage::assemble(artifacts, &self.config.metadata, &outcome);
        info!("TestEndMessage created");
        let body = message.to_json()?;
        info!("TestEndMessage JSON created ({} bytes)", body.len());

        info!("Stage: {} via {}", Stage::Publishing, self.publisher.name());
        self.publisher.publish(&body).await?;

        info!("Stage: {}", Stage::Done);
        Ok(RunSummary {
            message,
            stats,
            exit_code: outcome.exit_code,
            duration: outcome.duration,
            publisher: self.publisher.name(),
        })
    }

    async fn prime(&self) {
        let prime = self.config.prime;
        let result = tokio::task::spawn_blocking(move || primer::prime_disk(&prime)).await;
        match result {
            Ok(Ok(bytes)) => info!("Disk primed ({} bytes)", bytes),
            Ok(Err(e)) => warn!("{}", e),
            Err(e) => warn!("Disk priming task failed: {}", e),
        }
    }
}
