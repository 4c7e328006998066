//! Publishing the report to RabbitMQ.
//!
//! The report is sent as a single message to a topic exchange. The exchange
//! is declared on every run; the declaration is idempotent as long as the
//! existing exchange has the same properties.
//!
//! | Setting | Value |
//! |---------|-------|
//! | Exchange | `flaky-topic-exchange` (topic, non-durable) |
//! | Routing key | `project.test.end` |
//! | Content type | `text/plain` |
//! | Mandatory / immediate | false / false |

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;

/// Exchange the report is published to.
pub const EXCHANGE_NAME: &str = "flaky-topic-exchange";

/// Routing key for end-of-run reports.
pub const ROUTING_KEY: &str = "project.test.end";

/// Content type attached to the message.
pub const CONTENT_TYPE: &str = "text/plain";

/// Result type for publisher operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Errors that can occur while publishing. Each variant names the step.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("RabbitMQ connection failed: {0}")]
    Connect(#[source] lapin::Error),

    #[error("Channel open failed: {0}")]
    Channel(#[source] lapin::Error),

    #[error("ExchangeDeclare failed: {0}")]
    Declare(#[source] lapin::Error),

    #[error("Publish failed: {0}")]
    Publish(#[source] lapin::Error),
}

/// Sends a serialized report somewhere.
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    /// Publishes one message body.
    async fn publish(&self, body: &[u8]) -> PublishResult<()>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Publisher backed by an AMQP 0-9-1 broker.
///
/// A connection and a single channel are opened per [`publish`] call and
/// closed again before it returns, whether or not publishing succeeded.
///
/// [`publish`]: ReportPublisher::publish
pub struct AmqpPublisher {
    config: BrokerConfig,
}

impl AmqpPublisher {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }

    async fn publish_on(channel: &Channel, body: &[u8]) -> PublishResult<()> {
        channel
            .exchange_declare(
                EXCHANGE_NAME,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    passive: false,
                    durable: false,
                    auto_delete: false,
                    internal: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
            .map_err(PublishError::Declare)?;

        debug!("Declared exchange {}", EXCHANGE_NAME);

        channel
            .basic_publish(
                EXCHANGE_NAME,
                ROUTING_KEY,
                BasicPublishOptions {
                    mandatory: false,
                    immediate: false,
                },
                body,
                BasicProperties::default().with_content_type(CONTENT_TYPE.into()),
            )
            .await
            .map_err(PublishError::Publish)?
            .await
            .map_err(PublishError::Publish)?;

        Ok(())
    }
}

#[async_trait]
impl ReportPublisher for AmqpPublisher {
    async fn publish(&self, body: &[u8]) -> PublishResult<()> {
        let uri = self.config.connection_uri();
        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(PublishError::Connect)?;

        let result = match connection.create_channel().await {
            Ok(channel) => {
                info!("Rabbit Connected");
                let result = Self::publish_on(&channel, body).await;
                if let Err(e) = channel.close(200, "OK").await {
                    warn!("Failed to close channel: {}", e);
                }
                result
            }
            Err(e) => Err(PublishError::Channel(e)),
        };

        if let Err(e) = connection.close(200, "OK").await {
            warn!("Failed to close connection: {}", e);
        }

        if result.is_ok() {
            info!(
                "Correctly sent {} bytes to {} ({})",
                body.len(),
                EXCHANGE_NAME,
                ROUTING_KEY
            );
        }
        result
    }

    fn name(&self) -> &'static str {
        "amqp"
    }
}

/// Publisher that writes the body to stdout instead of a broker.
pub struct StdoutPublisher;

#[async_trait]
impl ReportPublisher for StdoutPublisher {
    async fn publish(&self, body: &[u8]) -> PublishResult<()> {
        println!("{}", String::from_utf8_lossy(body));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_constants() {
        assert_eq!(EXCHANGE_NAME, "flaky-topic-exchange");
        assert_eq!(ROUTING_KEY, "project.test.end");
        assert_eq!(CONTENT_TYPE, "text/plain");
    }

    #[tokio::test]
    async fn test_unreachable_broker_is_connect_error() {
        let publisher = AmqpPublisher::new(BrokerConfig {
            // Port 1 on localhost refuses connections.
            uri_template: "amqp://<username>:<password>@127.0.0.1:1/%2f".into(),
            username: "guest".into(),
            password: "guest".into(),
        });

        let err = publisher.publish(b"{}").await.unwrap_err();
        assert!(matches!(err, PublishError::Connect(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_stdout_publisher_succeeds() {
        StdoutPublisher.publish(b"{\"a\":1}").await.unwrap();
        assert_eq!(StdoutPublisher.name(), "stdout");
    }
}
