
//! Commands and their header-driven deserialization.

use crate::error::TranslateError;
use lapin::types::{AMQPValue, FieldTable};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Default header naming the concrete command type of a message.
pub const TYPE_TAG_HEADER: &str = "x-class-name";

/// A unit of work carried by a queue message.
///
/// Implemented by every type that can be registered in a [`CommandRegistry`].
pub trait Command: fmt::Debug + Send + Sync + 'static {
    /// The type tag this command is registered under.
    fn command_type(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Command {
    /// Returns the concrete command if it is of type `T`.
    pub fn downcast_ref<T: Command>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Turns a raw message body plus its headers into a command.
pub trait Deserializer: Send + Sync {
    fn deserialize(&self, body: &[u8], headers: &FieldTable) -> Result<Box<dyn Command>, TranslateError>;
}

type Decoder = fn(Value) -> Result<Box<dyn Command>, serde_json::Error>;

fn decode<T: Command + DeserializeOwned>(value: Value) -> Result<Box<dyn Command>, serde_json::Error> {
    let command: T = serde_json::from_value(value)?;
    Ok(Box::new(command))
}

/// Closed registry mapping type tags to JSON decoders.
pub struct CommandRegistry {
    type_tag_header: String,
    decoders: HashMap<String, Decoder>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            type_tag_header: TYPE_TAG_HEADER.to_string(),
            decoders: HashMap::new(),
        }
    }

    /// Reads the type tag from `header` instead of [`TYPE_TAG_HEADER`].
    pub fn with_type_tag_header(mut self, header: impl Into<String>) -> Self {
        self.type_tag_header = header.into();
        self
    }

    /// Registers `T` under `type_tag`, replacing any previous registration.
    pub fn register<T: Command + DeserializeOwned>(mut self, type_tag: impl Into<String>) -> Self {
        self.decoders.insert(type_tag.into(), decode::<T>);
        self
    }

    pub fn is_registered(&self, type_tag: &str) -> bool {
        self.decoders.contains_key(type_tag)
    }

    fn type_tag(&self, headers: &FieldTable) -> Option<String> {
        let tag = match headers.inner().get(self.type_tag_header.as_str())? {
            AMQPValue::LongString(s) => s.to_string(),
            AMQPValue::ShortString(s) => s.as_str().to_string(),
            _ => return None,
        };
        (!tag.is_empty()).then_some(tag)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer for CommandRegistry {
    fn deserialize(&self, body: &[u8], headers: &FieldTable) -> Result<Box<dyn Command>, TranslateError> {
        let type_tag = self.type_tag(headers).ok_or_else(|| TranslateError::MissingTypeTag {
            header: self.type_tag_header.clone(),
        })?;

        let value: Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(TranslateError::InvalidPayload { found: json_kind(&value) });
        }

        let decoder = self
            .decoders
            .get(&type_tag)
            .ok_or(TranslateError::TypeMismatch { type_tag })?;
        Ok(decoder(value)?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::types::ShortString;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct SendEmail {
        to: String,
        subject: String,
    }

    impl Command for SendEmail {
        fn command_type(&self) -> &str {
            "SendEmail"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn registry() -> CommandRegistry {
        CommandRegistry::new().register::<SendEmail>("SendEmail")
    }

    fn tagged(tag: &str) -> FieldTable {
        let mut headers = FieldTable::default();
        headers.insert(ShortString::from(TYPE_TAG_HEADER), AMQPValue::LongString(tag.into()));
        headers
    }

    #[test]
    fn test_deserialize_registered_command() {
        let body = br#"{"to": "ops@example.com", "subject": "disk full"}"#;
        let command = registry().deserialize(body, &tagged("SendEmail")).unwrap();

        assert_eq!(command.command_type(), "SendEmail");
        let email = command.downcast_ref::<SendEmail>().unwrap();
        assert_eq!(email.to, "ops@example.com");
        assert_eq!(email.subject, "disk full");
    }

    #[test]
    fn test_missing_tag_fails_before_parsing() {
        let result = registry().deserialize(b"not json at all", &FieldTable::default());
        assert!(matches!(result, Err(TranslateError::MissingTypeTag { .. })));
    }

    #[test]
    fn test_empty_tag_is_missing() {
        let result = registry().deserialize(b"{}", &tagged(""));
        assert!(matches!(result, Err(TranslateError::MissingTypeTag { .. })));
    }

    #[test]
    fn test_short_string_tag_is_accepted() {
        let mut headers = FieldTable::default();
        headers.insert(ShortString::from(TYPE_TAG_HEADER), AMQPValue::ShortString("SendEmail".into()));
        let body = br#"{"to": "a@b.c", "subject": "hi"}"#;
        assert!(registry().deserialize(body, &headers).is_ok());
    }

    #[test]
    fn test_malformed_body() {
        let result = registry().deserialize(b"{\"to\": ", &tagged("SendEmail"));
        assert!(matches!(result, Err(TranslateError::Deserialization(_))));
    }

    #[test]
    fn test_non_object_payload() {
        let result = registry().deserialize(b"null", &tagged("SendEmail"));
        assert!(matches!(result, Err(TranslateError::InvalidPayload { found: "null" })));

        let result = registry().deserialize(b"[1, 2]", &tagged("SendEmail"));
        assert!(matches!(result, Err(TranslateError::InvalidPayload { found: "an array" })));
    }

    #[test]
    fn test_unknown_type_tag() {
        let result = registry().deserialize(b"{}", &tagged("DropDatabase"));
        match result {
            Err(TranslateError::TypeMismatch { type_tag }) => assert_eq!(type_tag, "DropDatabase"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_object_with_wrong_shape() {
        let result = registry().deserialize(br#"{"to": 3}"#, &tagged("SendEmail"));
        assert!(matches!(result, Err(TranslateError::Deserialization(_))));
    }

    #[test]
    fn test_custom_type_tag_header() {
        let registry = registry().with_type_tag_header("x-command");
        let mut headers = FieldTable::default();
        headers.insert(ShortString::from("x-command"), AMQPValue::LongString("SendEmail".into()));
        let body = br#"{"to": "a@b.c", "subject": "hi"}"#;

        assert!(registry.deserialize(body, &headers).is_ok());
        assert!(matches!(
            registry.deserialize(body, &tagged("SendEmail")),
            Err(TranslateError::MissingTypeTag { header }) if header == "x-command"
        ));
    }
}
