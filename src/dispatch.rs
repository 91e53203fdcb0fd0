
//! Dispatching commands to their processors.

use crate::command::Command;
use crate::error::{BoxError, DispatchError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Executes a deserialized command.
///
/// Implement this trait to plug a custom routing mechanism into the worker;
/// [`ProcessorRegistry`] covers the common case of one processor per command type.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, command: Box<dyn Command>) -> Result<(), DispatchError>;
}

/// Business logic for one command type.
#[async_trait]
pub trait CommandProcessor: Send + Sync {
    /// A name for the processor, used for logging and identification.
    fn name(&self) -> &str;

    /// Processes a single command.
    ///
    /// # Returns
    /// `Ok(())` if the command was processed successfully. Any error is reported
    /// as a processor failure and makes the message eligible for a retry.
    async fn process(&self, command: &dyn Command) -> Result<(), BoxError>;
}

/// Routes commands to processors registered by command type.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn CommandProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, command_type: impl Into<String>, processor: Arc<dyn CommandProcessor>) -> Self {
        self.processors.insert(command_type.into(), processor);
        self
    }

    pub fn processor_for(&self, command_type: &str) -> Option<&Arc<dyn CommandProcessor>> {
        self.processors.get(command_type)
    }
}

#[async_trait]
impl Dispatcher for ProcessorRegistry {
    async fn dispatch(&self, command: Box<dyn Command>) -> Result<(), DispatchError> {
        let processor = self
            .processor_for(command.command_type())
            .ok_or_else(|| DispatchError::ProcessorNotFound {
                command_type: command.command_type().to_string(),
            })?;

        log::debug!("Dispatching '{}' to processor '{}'", command.command_type(), processor.name());

        processor
            .process(command.as_ref())
            .await
            .map_err(|source| DispatchError::Processor {
                processor: processor.name().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Resize {
        width: u32,
    }

    impl Command for Resize {
        fn command_type(&self) -> &str {
            "Resize"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Default)]
    struct ResizeProcessor {
        seen: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl CommandProcessor for ResizeProcessor {
        fn name(&self) -> &str {
            "ResizeProcessor"
        }

        async fn process(&self, command: &dyn Command) -> Result<(), BoxError> {
            let resize = command.downcast_ref::<Resize>().ok_or("expected Resize")?;
            if resize.width == 0 {
                return Err("width must be positive".into());
            }
            self.seen.lock().unwrap().push(resize.width);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_to_registered_processor() {
        let processor = Arc::new(ResizeProcessor::default());
        let registry = ProcessorRegistry::new().register("Resize", processor.clone());

        registry.dispatch(Box::new(Resize { width: 640 })).await.unwrap();

        assert_eq!(*processor.seen.lock().unwrap(), vec![640]);
    }

    #[tokio::test]
    async fn test_missing_processor() {
        let registry = ProcessorRegistry::new();
        let err = registry.dispatch(Box::new(Resize { width: 640 })).await.unwrap_err();
        assert!(matches!(err, DispatchError::ProcessorNotFound { command_type } if command_type == "Resize"));
    }

    #[tokio::test]
    async fn test_processor_failure_names_processor() {
        let registry = ProcessorRegistry::new().register("Resize", Arc::new(ResizeProcessor::default()));
        let err = registry.dispatch(Box::new(Resize { width: 0 })).await.unwrap_err();

        match err {
            DispatchError::Processor { processor, source } => {
                assert_eq!(processor, "ResizeProcessor");
                assert_eq!(source.to_string(), "width must be positive");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
