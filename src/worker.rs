//! The command worker: consumption loop and retry-reschedule handling.

use crate::command::Deserializer;
use crate::config::WorkerConfig;
use crate::dispatch::Dispatcher;
use crate::error::{FailureKind, ProcessingError, WorkerError};
use crate::failure_log::{FailureLog, LogFailureLog};
use crate::message::InboundMessage;
use crate::publish::ReschedulePublisher;
use crate::retry::RetryDecision;
use futures_util::{Stream, StreamExt};
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions},
    types::{FieldTable, ShortString},
    Channel,
};
use std::future::Future;
use std::sync::Arc;

/// Signal returned to the broker for a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Accept,
    Reject,
}

/// How a single delivery was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command was processed.
    Completed,
    /// A delayed copy of the message was published.
    Rescheduled(RetryDecision),
    /// Publishing the delayed copy failed.
    RescheduleFailed(RetryDecision),
    /// The message is given up on. `retry` is `None` for non-retryable failures.
    Dropped {
        kind: FailureKind,
        retry: Option<RetryDecision>,
    },
}

impl Outcome {
    pub fn ack(&self) -> Ack {
        match self {
            Outcome::Completed => Ack::Accept,
            _ => Ack::Reject,
        }
    }
}

/// Consumes command messages, dispatches them, and reschedules failures.
pub struct CommandWorker<D, P, R> {
    deserializer: D,
    dispatcher: P,
    publisher: R,
    failure_log: Arc<dyn FailureLog>,
    config: WorkerConfig,
}

impl<D, P, R> CommandWorker<D, P, R>
where
    D: Deserializer,
    P: Dispatcher,
    R: ReschedulePublisher,
{
    /// Creates a new worker logging failures under `config.log_target`.
    pub fn new(deserializer: D, dispatcher: P, publisher: R, config: WorkerConfig) -> Self {
        let failure_log = Arc::new(LogFailureLog::new(config.log_target.clone()));
        Self {
            deserializer,
            dispatcher,
            publisher,
            failure_log,
            config,
        }
    }

    /// Replaces the failure log.
    pub fn with_failure_log(mut self, failure_log: Arc<dyn FailureLog>) -> Self {
        self.failure_log = failure_log;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Starts consuming from the configured queue and resolves deliveries one at a time.
    ///
    /// The queue and the reschedule topology must already exist. This function
    /// runs until the consumer is cancelled or the channel fails; reconnecting
    /// is up to the caller.
    pub async fn run(&self, channel: &Channel) -> Result<(), WorkerError> {
        channel.basic_qos(self.config.prefetch_count, BasicQosOptions::default()).await?;
        log::info!("QoS prefetch count set to {}", self.config.prefetch_count);

        let mut consumer = channel
            .basic_consume(
                &self.config.queue_name,
                &self.config.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        log::info!(
            "Consumer started with tag '{}' on queue '{}'. Waiting for messages...",
            consumer.tag().as_str(),
            self.config.queue_name
        );

        consume_each(consumer, |delivery| self.handle_delivery(delivery)).await?;

        log::info!("Consumer '{}' stopped.", self.config.consumer_tag);
        Ok(())
    }

    /// Handles one delivery and acknowledges or rejects it.
    pub async fn handle_delivery(&self, delivery: Delivery) -> Result<Outcome, WorkerError> {
        let message = InboundMessage::from(&delivery);
        let outcome = self.handle(&message).await;

        match outcome.ack() {
            Ack::Accept => delivery.acker.ack(BasicAckOptions::default()).await?,
            // Never requeue: a retry, if any, was already published.
            Ack::Reject => delivery.acker.reject(BasicRejectOptions { requeue: false }).await?,
        }

        log::debug!("Delivery {} resolved: {:?}", delivery.delivery_tag, outcome);
        Ok(outcome)
    }

    /// Processes a message and applies the retry policy on failure.
    ///
    /// Never fails: every error ends in an [`Outcome`] and a failure log record.
    pub async fn handle(&self, message: &InboundMessage) -> Outcome {
        let error = match self.process(message).await {
            Ok(()) => return Outcome::Completed,
            Err(e) => e,
        };

        let kind = error.kind();
        if !kind.is_retryable() {
            self.failure_log.dropped(&error);
            return Outcome::Dropped { kind, retry: None };
        }

        let decision = self.config.retry_policy.evaluate(&message.headers);
        if !decision.should_retry {
            self.failure_log.rejected(&decision, &error);
            return Outcome::Dropped {
                kind,
                retry: Some(decision),
            };
        }

        self.reschedule(message, decision, &error).await
    }

    async fn process(&self, message: &InboundMessage) -> Result<(), ProcessingError> {
        let command = self.deserializer.deserialize(&message.body, &message.headers)?;
        self.dispatcher.dispatch(command).await?;
        Ok(())
    }

    async fn reschedule(&self, message: &InboundMessage, decision: RetryDecision, error: &ProcessingError) -> Outcome {
        let properties = message
            .properties
            .clone()
            .with_expiration(ShortString::from(decision.expiration_millis().to_string()));

        match self.publisher.publish(&message.body, &message.routing_key, properties).await {
            Ok(()) => {
                self.failure_log.rescheduled(&decision, error);
                Outcome::Rescheduled(decision)
            }
            Err(e) => {
                self.failure_log.reschedule_failed(&decision, error, &e);
                Outcome::RescheduleFailed(decision)
            }
        }
    }
}

/// Resolves deliveries in order until the stream ends.
///
/// A failure to resolve one delivery is logged and consumption continues;
/// an error from the stream itself ends it.
async fn consume_each<S, T, F, Fut>(mut deliveries: S, mut resolve: F) -> Result<(), WorkerError>
where
    S: Stream<Item = Result<T, lapin::Error>> + Unpin,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<Outcome, WorkerError>>,
{
    while let Some(delivery) = deliveries.next().await {
        if let Err(e) = resolve(delivery?).await {
            log::error!("Message processing failed with a recoverable error: {}", e);
        }
    }
    Ok(())
}
