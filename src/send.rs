
//! Sending commands to the command exchange.

use crate::command::{Command, TYPE_TAG_HEADER};
use crate::error::{PublishError, SendError};
use crate::publish::publish_confirmed;
use async_trait::async_trait;
use lapin::{
    types::{AMQPValue, FieldTable, ShortString},
    BasicProperties, Channel,
};
use serde::Serialize;

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

/// Publishes an encoded command. Implemented for `lapin::Channel`.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: BasicProperties,
    ) -> Result<(), PublishError>;
}

#[async_trait]
impl CommandTransport for Channel {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: BasicProperties,
    ) -> Result<(), PublishError> {
        publish_confirmed(self, exchange, routing_key, body, properties).await
    }
}

/// Serializes commands to JSON and publishes them with their type tag header,
/// producing messages a [`CommandRegistry`](crate::command::CommandRegistry) can consume.
pub struct CommandSender<T = Channel> {
    transport: T,
    exchange: String,
    type_tag_header: String,
}

impl<T: CommandTransport> CommandSender<T> {
    /// Creates a sender for an exchange that already exists on the broker.
    pub fn new(transport: T, exchange: impl Into<String>) -> Self {
        Self {
            transport,
            exchange: exchange.into(),
            type_tag_header: TYPE_TAG_HEADER.to_string(),
        }
    }

    /// Writes the type tag to `header` instead of [`TYPE_TAG_HEADER`].
    pub fn with_type_tag_header(mut self, header: impl Into<String>) -> Self {
        self.type_tag_header = header.into();
        self
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub async fn send<C: Command + Serialize>(&self, command: &C, routing_key: &str) -> Result<(), SendError> {
        let (body, properties) = encode_command(command, &self.type_tag_header)?;
        self.transport
            .publish(&self.exchange, routing_key, &body, properties)
            .await?;

        log::debug!(
            "Command '{}' sent to '{}' with routing key '{}'.",
            command.command_type(),
            self.exchange,
            routing_key
        );
        Ok(())
    }
}

/// Encodes `command` as a persistent JSON message tagged with its command type.
pub fn encode_command<C: Command + Serialize>(
    command: &C,
    type_tag_header: &str,
) -> Result<(Vec<u8>, BasicProperties), serde_json::Error> {
    let body = serde_json::to_vec(command)?;

    let mut headers = FieldTable::default();
    headers.insert(
        ShortString::from(type_tag_header),
        AMQPValue::LongString(command.command_type().into()),
    );

    let properties = BasicProperties::default()
        .with_content_type(ShortString::from("application/json"))
        .with_delivery_mode(PERSISTENT)
        .with_headers(headers);

    Ok((body, properties))
}
