//! flaky-reporter: run a test suite and publish its failures for flaky-test
//! detection.
//!
//! A single invocation runs one test command and publishes one report. Many
//! invocations across different configurations and scenarios feed a
//! downstream service that decides which tests are flaky.
//!
//! # Architecture
//!
//! The main components, in pipeline order, are:
//!
//! - **Config**: Reads `FLAKY_*` environment variables into a `RunConfiguration`
//! - **Primer**: Enters the application directory and warms up the disk
//! - **Runner**: Executes the test command and times it
//! - **Collector**: Walks the output directory and decodes XML artifacts
//! - **Report**: Assembles and serializes the `TestEndMessage`
//! - **Publisher**: Sends the report to a RabbitMQ topic exchange
//!
//! The [`pipeline`] module ties them together.
//!
//! # Example
//!
//! ```no_run
//! use flaky_reporter::config::load_config;
//! use flaky_reporter::pipeline::Pipeline;
//! use flaky_reporter::publisher::AmqpPublisher;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let publisher = AmqpPublisher::new(config.broker.clone());
//!     let summary = Pipeline::new(&config, publisher).run().await?;
//!     println!("{} test cases reported", summary.message.test_case_count());
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod pipeline;
pub mod primer;
pub mod publisher;
pub mod report;
pub mod runner;

// Re-export commonly used types
pub use config::{RunConfiguration, load_config};
pub use pipeline::{Pipeline, PipelineError, PipelineOptions, Stage};
pub use publisher::{AmqpPublisher, ReportPublisher};
pub use report::{Artifact, TestCase, TestEndMessage, TestFailures};
