
//! Worker configuration.

use crate::error::WorkerError;
use crate::retry::RetryPolicy;

/// Log target used by workers unless overridden.
pub const DEFAULT_LOG_TARGET: &str = "RabbitMqWorker";

/// Configuration for a [`CommandWorker`](crate::worker::CommandWorker).
///
/// Use the `WorkerConfig::builder()` method to construct this struct.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// The name of the queue to consume messages from.
    pub queue_name: String,
    /// A unique identifier for the consumer on this queue.
    pub consumer_tag: String,
    /// Exchange failed messages are republished to for a delayed retry.
    pub reschedule_exchange: String,
    /// The number of messages to fetch from the server at a time (QoS prefetch count).
    pub prefetch_count: u16,
    /// The policy deciding whether and when failed messages are retried.
    pub retry_policy: RetryPolicy,
    /// Target of the worker's log records.
    pub log_target: String,
}

impl WorkerConfig {
    /// Creates a new `WorkerConfigBuilder` to start building the worker configuration.
    ///
    /// # Arguments
    /// * `queue_name` - The name of the queue to consume from.
    pub fn builder(queue_name: impl Into<String>) -> WorkerConfigBuilder {
        WorkerConfigBuilder::new(queue_name.into())
    }

    /// Reads the configuration from the environment.
    ///
    /// `WORKER_QUEUE` is required; `WORKER_CONSUMER_TAG`, `WORKER_RESCHEDULE_EXCHANGE`
    /// and `WORKER_PREFETCH` override the builder defaults.
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WorkerError> {
        let queue_name = lookup("WORKER_QUEUE").ok_or("WORKER_QUEUE is not set")?;
        let mut builder = Self::builder(queue_name);

        if let Some(tag) = lookup("WORKER_CONSUMER_TAG") {
            builder = builder.consumer_tag(tag);
        }
        if let Some(exchange) = lookup("WORKER_RESCHEDULE_EXCHANGE") {
            builder = builder.reschedule_exchange(exchange);
        }
        if let Some(prefetch) = lookup("WORKER_PREFETCH") {
            let count = prefetch
                .parse::<u16>()
                .map_err(|e| format!("invalid WORKER_PREFETCH '{}': {}", prefetch, e))?;
            builder = builder.prefetch_count(count);
        }

        builder.build()
    }
}

/// A builder for creating `WorkerConfig` instances.
pub struct WorkerConfigBuilder {
    queue_name: String,
    consumer_tag: Option<String>,
    reschedule_exchange: Option<String>,
    prefetch_count: Option<u16>,
    retry_policy: Option<RetryPolicy>,
    log_target: Option<String>,
}

impl WorkerConfigBuilder {
    fn new(queue_name: String) -> Self {
        Self {
            queue_name,
            consumer_tag: None,
            reschedule_exchange: None,
            prefetch_count: None,
            retry_policy: None,
            log_target: None,
        }
    }

    /// Sets a custom consumer tag.
    /// Defaults to `{queue_name}_consumer` if not set.
    pub fn consumer_tag(mut self, consumer_tag: impl Into<String>) -> Self {
        self.consumer_tag = Some(consumer_tag.into());
        self
    }

    /// Sets the exchange used to reschedule failed messages.
    /// Defaults to `{queue_name}_reschedule` if not set.
    pub fn reschedule_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.reschedule_exchange = Some(exchange.into());
        self
    }

    /// Sets a custom prefetch count (QoS).
    /// Defaults to 1.
    ///
    /// **Warning:** with a value greater than 1 the broker keeps more messages
    /// in flight than the worker processes at once.
    pub fn prefetch_count(mut self, count: u16) -> Self {
        self.prefetch_count = Some(count);
        self
    }

    /// Sets a custom retry policy.
    /// Defaults to `RetryPolicy::default()`.
    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }

    /// Sets the log target. Defaults to [`DEFAULT_LOG_TARGET`].
    pub fn log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = Some(target.into());
        self
    }

    /// Builds the final `WorkerConfig`, applying defaults for any unset options.
    pub fn build(self) -> Result<WorkerConfig, WorkerError> {
        let queue_name = self.queue_name;
        if queue_name.is_empty() {
            return Err("queue name must not be empty".into());
        }

        let prefetch_count = self.prefetch_count.unwrap_or(1);
        if prefetch_count == 0 {
            return Err("prefetch count must be at least 1".into());
        }

        let retry_policy = self.retry_policy.unwrap_or_default();
        if retry_policy.max_retries == 0 {
            return Err("retry policy must allow at least one try".into());
        }

        Ok(WorkerConfig {
            consumer_tag: self.consumer_tag.unwrap_or_else(|| format!("{}_consumer", queue_name)),
            reschedule_exchange: self
                .reschedule_exchange
                .unwrap_or_else(|| format!("{}_reschedule", queue_name)),
            log_target: self.log_target.unwrap_or_else(|| DEFAULT_LOG_TARGET.to_string()),
            prefetch_count,
            retry_policy,
            queue_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_worker_config_builder_defaults() {
        let config = WorkerConfig::builder("commands").build().unwrap();

        assert_eq!(config.queue_name, "commands");
        assert_eq!(config.consumer_tag, "commands_consumer");
        assert_eq!(config.reschedule_exchange, "commands_reschedule");
        assert_eq!(config.prefetch_count, 1);
        assert_eq!(config.log_target, "RabbitMqWorker");
        assert_eq!(config.retry_policy, RetryPolicy::new(10, 5, 10));
    }

    #[test]
    fn test_worker_config_builder_custom_values() {
        let config = WorkerConfig::builder("commands")
            .consumer_tag("custom_consumer")
            .reschedule_exchange("delayed")
            .prefetch_count(4)
            .retry_policy(RetryPolicy::new(3, 1, 2))
            .log_target("billing")
            .build()
            .unwrap();

        assert_eq!(config.consumer_tag, "custom_consumer");
        assert_eq!(config.reschedule_exchange, "delayed");
        assert_eq!(config.prefetch_count, 4);
        assert_eq!(config.retry_policy.max_retries, 3);
        assert_eq!(config.log_target, "billing");
    }

    #[test]
    fn test_worker_config_rejects_invalid_values() {
        assert!(WorkerConfig::builder("").build().is_err());
        assert!(WorkerConfig::builder("commands").prefetch_count(0).build().is_err());
        assert!(WorkerConfig::builder("commands")
            .retry_policy(RetryPolicy::new(0, 5, 10))
            .build()
            .is_err());
    }

    #[test]
    fn test_worker_config_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("WORKER_QUEUE", "jobs"),
            ("WORKER_PREFETCH", "2"),
            ("WORKER_RESCHEDULE_EXCHANGE", "jobs_delay"),
        ]);
        let config = WorkerConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.queue_name, "jobs");
        assert_eq!(config.prefetch_count, 2);
        assert_eq!(config.reschedule_exchange, "jobs_delay");
        assert_eq!(config.consumer_tag, "jobs_consumer");
    }

    #[test]
    fn test_worker_config_from_lookup_errors() {
        assert!(WorkerConfig::from_lookup(|_| None).is_err());

        let err = WorkerConfig::from_lookup(|key| match key {
            "WORKER_QUEUE" => Some("jobs".to_string()),
            "WORKER_PREFETCH" => Some("many".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("WORKER_PREFETCH"));
    }
}
