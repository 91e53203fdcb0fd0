
//! Republishing failed messages for a delayed retry.

use crate::error::PublishError;
use async_trait::async_trait;
use lapin::{options::BasicPublishOptions, publisher_confirm::Confirmation, BasicProperties, Channel};

/// Publishes a message so that the broker redelivers it later.
///
/// The worker passes the original properties with `expiration` set to the
/// computed delay; realising the delay (e.g. a TTL queue dead-lettering back
/// into the work queue) is up to the broker topology.
#[async_trait]
pub trait ReschedulePublisher: Send + Sync {
    async fn publish(&self, body: &[u8], routing_key: &str, properties: BasicProperties) -> Result<(), PublishError>;
}

/// [`ReschedulePublisher`] backed by a `lapin` channel and a reschedule exchange.
#[derive(Clone)]
pub struct AmqpReschedulePublisher {
    channel: Channel,
    exchange: String,
}

impl AmqpReschedulePublisher {
    /// Creates a publisher for an exchange that already exists on the broker.
    pub fn new(channel: Channel, exchange: impl Into<String>) -> Self {
        Self {
            channel,
            exchange: exchange.into(),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }
}

#[async_trait]
impl ReschedulePublisher for AmqpReschedulePublisher {
    async fn publish(&self, body: &[u8], routing_key: &str, properties: BasicProperties) -> Result<(), PublishError> {
        publish_confirmed(&self.channel, &self.exchange, routing_key, body, properties).await?;

        log::debug!(
            "Message republished to '{}' with routing key '{}'.",
            self.exchange, routing_key
        );
        Ok(())
    }
}

/// Publishes and waits for the broker's confirm when the channel is in confirm mode.
pub(crate) async fn publish_confirmed(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    body: &[u8],
    properties: BasicProperties,
) -> Result<(), PublishError> {
    let confirmation = channel
        .basic_publish(exchange, routing_key, BasicPublishOptions::default(), body, properties)
        .await?
        .await?;

    if let Confirmation::Nack(_) = confirmation {
        return Err(PublishError::Nacked);
    }
    Ok(())
}
