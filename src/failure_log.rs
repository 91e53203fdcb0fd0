
//! Operator-facing records of failed messages.

use crate::error::{ProcessingError, PublishError};
use crate::retry::RetryDecision;

/// Receives one call per failed message.
///
/// The worker owns an instance of this trait instead of writing to a global
/// logger, so several workers can report under different targets.
pub trait FailureLog: Send + Sync {
    /// A delayed copy was published; the message comes back after `decision.delay_secs`.
    fn rescheduled(&self, decision: &RetryDecision, error: &ProcessingError);

    /// The message exhausted its retries and is rejected.
    fn rejected(&self, decision: &RetryDecision, error: &ProcessingError);

    /// The message was eligible for a retry, but publishing the delayed copy failed.
    fn reschedule_failed(&self, decision: &RetryDecision, error: &ProcessingError, publish_error: &PublishError);

    /// The failure is not retryable; the message is rejected without evaluation.
    fn dropped(&self, error: &ProcessingError);
}

/// [`FailureLog`] writing through the `log` facade.
#[derive(Debug, Clone)]
pub struct LogFailureLog {
    target: String,
}

impl LogFailureLog {
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into() }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl FailureLog for LogFailureLog {
    fn rescheduled(&self, decision: &RetryDecision, error: &ProcessingError) {
        log::error!(
            target: self.target.as_str(),
            "Error while executing processor (retry count: {} - retry in {}s): {}",
            decision.attempt(),
            decision.delay_secs,
            error
        );
    }

    fn rejected(&self, decision: &RetryDecision, error: &ProcessingError) {
        log::error!(
            target: self.target.as_str(),
            "Error while executing processor (retry count: {} - reject): {}",
            decision.attempt(),
            error
        );
    }

    fn reschedule_failed(&self, decision: &RetryDecision, error: &ProcessingError, publish_error: &PublishError) {
        log::error!(
            target: self.target.as_str(),
            "Error while executing processor (retry count: {} - reject, reschedule failed): {}",
            decision.attempt(),
            error
        );
        log::error!(
            target: self.target.as_str(),
            "Failed to publish rescheduled message (retry count: {}): {}",
            decision.attempt(),
            publish_error
        );
    }

    fn dropped(&self, error: &ProcessingError) {
        log::warn!(target: self.target.as_str(), "Unclassified error, rejecting message without retry: {}", error);
    }
}
