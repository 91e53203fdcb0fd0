
use thiserror::Error;

/// Boxed error returned by command processors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Generic error type for the worker runtime (consumer loop, acknowledgements, config).
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Error originating from the underlying `lapin` library.
    #[error("RabbitMQ communication error: {0}")]
    Lapin(#[from] lapin::Error),

    /// Custom configuration-related error.
    #[error("Worker configuration error: {message}")]
    Configuration {
        message: String,
    },
}

// Allow converting from a string-like type into a Configuration error
impl From<&str> for WorkerError {
    fn from(s: &str) -> Self {
        WorkerError::Configuration { message: s.to_string() }
    }
}

impl From<String> for WorkerError {
    fn from(s: String) -> Self {
        WorkerError::Configuration { message: s }
    }
}

/// Failure to turn a message body and its headers into a command.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("Type tag header '{header}' not found")]
    MissingTypeTag { header: String },

    #[error("Failed to deserialize command payload: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Translated command should be an object, got {found}")]
    InvalidPayload { found: &'static str },

    #[error("Type '{type_tag}' is not a registered command")]
    TypeMismatch { type_tag: String },
}

/// Failure reported by a [`Dispatcher`](crate::dispatch::Dispatcher).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The processor ran and failed.
    #[error("Processor '{processor}' failed: {source}")]
    Processor {
        processor: String,
        #[source]
        source: BoxError,
    },

    #[error("No processor registered for command '{command_type}'")]
    ProcessorNotFound { command_type: String },

    /// Anything else. Never retried.
    #[error("Unclassified dispatch error: {0}")]
    Unclassified(#[source] BoxError),
}

/// Failure while publishing a message, either a rescheduled copy or a new command.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publish failed: {0}")]
    Transport(#[from] lapin::Error),

    #[error("Publish was not acknowledged by the broker")]
    Nacked,
}

/// Failure to send a command with a [`CommandSender`](crate::send::CommandSender).
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Failed to serialize command: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Failure class used by the worker to pick between retry and immediate reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Translation,
    Processor,
    ProcessorNotFound,
    Unknown,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureKind::Unknown)
    }
}

/// A failed processing attempt of a single message.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ProcessingError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProcessingError::Translate(_) => FailureKind::Translation,
            ProcessingError::Dispatch(DispatchError::Processor { .. }) => FailureKind::Processor,
            ProcessingError::Dispatch(DispatchError::ProcessorNotFound { .. }) => {
                FailureKind::ProcessorNotFound
            }
            ProcessingError::Dispatch(DispatchError::Unclassified(_)) => FailureKind::Unknown,
        }
    }

    /// Name of the failing processor, when the failure came from one.
    pub fn processor(&self) -> Option<&str> {
        match self {
            ProcessingError::Dispatch(DispatchError::Processor { processor, .. }) => Some(processor),
            _ => None,
        }
    }
}
