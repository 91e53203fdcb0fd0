
//! Broker deliveries as seen by the worker.

use lapin::message::Delivery;
use lapin::types::FieldTable;
use lapin::BasicProperties;

/// One broker delivery, detached from its acknowledgement handle.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub body: Vec<u8>,
    pub headers: FieldTable,
    pub routing_key: String,
    pub properties: BasicProperties,
}

impl InboundMessage {
    pub fn new(body: impl Into<Vec<u8>>, routing_key: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            routing_key: routing_key.into(),
            ..Default::default()
        }
    }

    /// Sets the application headers, keeping `properties.headers` in sync.
    pub fn with_headers(mut self, headers: FieldTable) -> Self {
        self.properties = self.properties.with_headers(headers.clone());
        self.headers = headers;
        self
    }

    pub fn with_properties(mut self, properties: BasicProperties) -> Self {
        self.headers = properties.headers().clone().unwrap_or_default();
        self.properties = properties;
        self
    }
}

impl From<&Delivery> for InboundMessage {
    fn from(delivery: &Delivery) -> Self {
        Self {
            body: delivery.data.clone(),
            headers: delivery.properties.headers().clone().unwrap_or_default(),
            routing_key: delivery.routing_key.as_str().to_string(),
            properties: delivery.properties.clone(),
        }
    }
}
