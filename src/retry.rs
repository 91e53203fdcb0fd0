
//! Retry policy: derives retry eligibility and reschedule delay from delivery history.

use lapin::types::{AMQPValue, FieldTable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header in which RabbitMQ records dead-letter history.
pub const DEATH_HEADER: &str = "x-death";

/// Linear backoff policy applied to failed messages.
///
/// With the defaults a message is retried while fewer than 9 dead-letter
/// records exist, first after 10 seconds and then 5 seconds later per retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of tries, including the first delivery.
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub base_offset_secs: u64,
}

impl RetryPolicy {
    /// Creates a new retry policy.
    ///
    /// # Arguments
    /// * `max_retries` - Total number of tries, including the first delivery.
    /// * `base_delay_secs` - Delay added per prior retry.
    /// * `base_offset_secs` - Delay before the first retry.
    pub fn new(max_retries: u32, base_delay_secs: u64, base_offset_secs: u64) -> Self {
        Self {
            max_retries,
            base_delay_secs,
            base_offset_secs,
        }
    }

    /// Evaluates the retry decision for a message carrying `headers`.
    pub fn evaluate(&self, headers: &FieldTable) -> RetryDecision {
        let retry_count = retry_count(headers);
        RetryDecision {
            retry_count,
            should_retry: retry_count < self.max_retries.saturating_sub(1),
            delay_secs: self
                .base_delay_secs
                .saturating_mul(u64::from(retry_count))
                .saturating_add(self.base_offset_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, 5, 10)
    }
}

/// Outcome of evaluating the [`RetryPolicy`] for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry_count: u32,
    pub should_retry: bool,
    pub delay_secs: u64,
}

impl RetryDecision {
    /// 1-indexed number of the attempt that just failed.
    pub fn attempt(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    /// Value for the AMQP `expiration` property. Saturates instead of overflowing.
    pub fn expiration_millis(&self) -> u64 {
        self.delay_secs.saturating_mul(1000)
    }
}

/// Number of times this message (or its dead-lettered ancestor) was redelivered.
///
/// Prefers the `count` of the first `x-death` record and falls back to the
/// number of records when `count` is missing or zero.
pub fn retry_count(headers: &FieldTable) -> u32 {
    let records = match headers.inner().get(DEATH_HEADER) {
        Some(AMQPValue::FieldArray(records)) => records.as_slice(),
        _ => return 0,
    };

    let explicit = records.first().and_then(|record| match record {
        AMQPValue::FieldTable(table) => table.inner().get("count").and_then(as_count),
        _ => None,
    });

    match explicit {
        Some(count) if count > 0 => count,
        _ => u32::try_from(records.len()).unwrap_or(u32::MAX),
    }
}

fn as_count(value: &AMQPValue) -> Option<u32> {
    let count = match value {
        AMQPValue::ShortShortInt(v) => i64::from(*v),
        AMQPValue::ShortShortUInt(v) => i64::from(*v),
        AMQPValue::ShortInt(v) => i64::from(*v),
        AMQPValue::ShortUInt(v) => i64::from(*v),
        AMQPValue::LongInt(v) => i64::from(*v),
        AMQPValue::LongUInt(v) => i64::from(*v),
        AMQPValue::LongLongInt(v) => *v,
        // Some publishers copy x-death between brokers with stringly-typed values.
        AMQPValue::LongString(v) => v.to_string().trim().parse::<i64>().ok()?,
        AMQPValue::ShortString(v) => v.as_str().trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Some(u32::try_from(count.max(0)).unwrap_or(u32::MAX))
}
