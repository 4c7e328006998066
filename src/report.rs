//! The outbound test-end report.
//!
//! One [`TestEndMessage`] is built per run from the collected artifacts, the
//! run metadata and the test command's output, then serialized to JSON for
//! publishing. All metadata travels as strings, including the duration.

pub mod artifact;

pub use artifact::Artifact;

use serde::{Deserialize, Serialize};

use crate::config::RunMetadata;
use crate::runner::RunOutcome;

/// Errors raised while building the report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One failed assertion taken from an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub classname: String,
    pub display_name: String,
    pub message: String,
    pub name: String,
    pub stacktrace: String,
}

/// The failures recorded by one artifact file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFailures {
    pub duration: String,
    pub test_cases: Vec<TestCase>,
}

/// The single message published at the end of a run.
///
/// # JSON Shape
///
/// ```json
/// {
///   "testFailures": [{"duration": "1.2", "testCases": [...]}],
///   "isLastConfig": true,
///   "projectId": "p", "testRunId": "r", "configFile": "c",
///   "scenarioConfiguration": "s", "testMethodName": "m",
///   "executionLog": "...", "numberOfScenarios": "3", "duration": "1534"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEndMessage {
    #[serde(rename = "testFailures")]
    pub test_failures_list: Vec<TestFailures>,
    pub is_last_config: bool,
    pub project_id: String,
    pub test_run_id: String,
    pub config_file: String,
    pub scenario_configuration: String,
    pub test_method_name: String,
    pub execution_log: String,
    pub number_of_scenarios: String,
    /// Wall-clock duration of the test command in milliseconds.
    pub duration: String,
}

impl TestEndMessage {
    /// Assembles the report for one run.
    ///
    /// Artifacts keep their discovery order. Unparsed artifacts contribute
    /// an empty entry.
    pub fn assemble(artifacts: Vec<Artifact>, metadata: &RunMetadata, run: &RunOutcome) -> Self {
        Self {
            test_failures_list: artifacts.into_iter().map(Artifact::into_failures).collect(),
            is_last_config: metadata.is_last_config,
            project_id: metadata.project_id.clone(),
            test_run_id: metadata.test_run_id.clone(),
            config_file: metadata.config_file.clone(),
            scenario_configuration: metadata.scenario_configuration.clone(),
            test_method_name: metadata.test_method_name.clone(),
            execution_log: run.stdout.clone(),
            number_of_scenarios: metadata.number_of_scenarios.clone(),
            duration: run.duration_millis(),
        }
    }

    /// Total number of test cases across all entries.
    pub fn test_case_count(&self) -> usize {
        self.test_failures_list
            .iter()
            .map(|f| f.test_cases.len())
            .sum()
    }

    /// Serializes the report to its JSON wire form.
    pub fn to_json(&self) -> Result<Vec<u8>, ReportError> {
        Ok(serde_json::to_vec(self)?)
    }
}
