//! Test command execution.
//!
//! Runs the configured test command as a single child process and records
//! what the report needs from it: stdout (the execution log), the exit
//! status and the wall-clock time between launch and exit.
//!
//! The command is executed directly, never through a shell, and is not split
//! into arguments. No timeout is applied.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

/// Errors raised while running the test command.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("No test command configured (FLAKY_TEST_RUN_CMD is empty)")]
    EmptyCommand,

    #[error("Failed to execute command `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran but did not exit successfully.
    ///
    /// `exit_code` is `None` when the process was terminated by a signal.
    #[error("Test command failed with {}", describe_exit(.exit_code))]
    Failed {
        exit_code: Option<i32>,
        outcome: Box<RunOutcome>,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "no exit status (terminated by signal)".to_string(),
    }
}

/// Everything captured from one execution of the test command.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Exit code, or `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output, decoded lossily as UTF-8.
    pub stdout: String,
    /// Captured standard error, decoded lossily as UTF-8.
    pub stderr: String,
    /// Wall-clock time from just before launch to process exit.
    pub duration: Duration,
}

impl RunOutcome {
    /// Returns true if the process exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Elapsed time in whole milliseconds, rendered as base-10 text.
    pub fn duration_millis(&self) -> String {
        self.duration.as_millis().to_string()
    }
}

/// Launches test commands.
#[derive(Debug, Clone)]
pub struct TestRunner {
    command: String,
}

impl TestRunner {
    /// Creates a runner for the given executable.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The executable this runner launches.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Runs the command to completion.
    ///
    /// Returns the captured outcome when the command exits with status 0.
    ///
    /// # Errors
    ///
    /// - [`RunError::EmptyCommand`] if no command is configured
    /// - [`RunError::Launch`] if the process cannot be spawned
    /// - [`RunError::Failed`] if it exits non-zero or is killed; the error
    ///   still carries the captured [`RunOutcome`]
    pub async fn run(&self) -> Result<RunOutcome, RunError> {
        if self.command.trim().is_empty() {
            return Err(RunError::EmptyCommand);
        }

        let mut process = tokio::process::Command::new(&self.command);
        process.stdin(Stdio::null());
        process.stdout(Stdio::piped());
        process.stderr(Stdio::piped());

        debug!("Launching test command: {}", self.command);

        let start = Instant::now();
        let output = process.output().await.map_err(|source| RunError::Launch {
            command: self.command.clone(),
            source,
        })?;
        let duration = start.elapsed();

        let outcome = RunOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration,
        };

        if !outcome.stderr.is_empty() {
            debug!("Test command stderr:\n{}", outcome.stderr);
        }

        if outcome.success() {
            info!("Test command finished in {} ms", outcome.duration_millis());
            Ok(outcome)
        } else {
            error!(
                "Test command exited with {}",
                describe_exit(&outcome.exit_code)
            );
            Err(RunError::Failed {
                exit_code: outcome.exit_code,
                outcome: Box::new(outcome),
            })
        }
    }
}
