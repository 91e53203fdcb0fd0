
//! # RabbitMQ Command Worker
//! Sends typed command messages to RabbitMQ and consumes them: commands are dispatched
//! to processors, and failed messages are rescheduled with a linear backoff before
//! being rejected.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod failure_log;
pub mod message;
pub mod publish;
pub mod retry;
pub mod send;
pub mod worker;

// Re-export key components for easy access
pub use command::{Command, CommandRegistry, Deserializer, TYPE_TAG_HEADER};
pub use config::{WorkerConfig, WorkerConfigBuilder};
pub use dispatch::{CommandProcessor, Dispatcher, ProcessorRegistry};
pub use error::{BoxError, DispatchError, FailureKind, ProcessingError, PublishError, SendError, TranslateError, WorkerError};
pub use failure_log::{FailureLog, LogFailureLog};
pub use message::InboundMessage;
pub use publish::{AmqpReschedulePublisher, ReschedulePublisher};
pub use retry::{RetryDecision, RetryPolicy, DEATH_HEADER};
pub use send::{encode_command, CommandSender, CommandTransport};
pub use worker::{Ack, CommandWorker, Outcome};
