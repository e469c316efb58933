//! Retry policy for notification delivery.
//!
//! A failed delivery is retried with exponential backoff until the task has
//! failed [`MAX_RETRY_COUNT`] times, after which it stays failed and is left
//! for an operator.

/// Number of failed attempts after which a task is no longer retried.
pub const MAX_RETRY_COUNT: i32 = 3;

/// Base delay of the backoff, in minutes.
const BASE_DELAY_MINUTES: i64 = 5;

/// Delay before the next attempt: `5 × 2^retry_count` minutes.
pub fn retry_delay(retry_count: i32) -> time::Duration {
    let exponent = retry_count.clamp(0, MAX_RETRY_COUNT) as u32;
    time::Duration::minutes(BASE_DELAY_MINUTES * 2i64.pow(exponent))
}

/// What a single delivery attempt means for a claimed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Delivered; the task is done.
    Sent { at: time::OffsetDateTime },
    /// Failed, but another attempt is scheduled.
    Retrying {
        at: time::OffsetDateTime,
        attempt: i32,
        error: String,
    },
    /// Failed for the last time.
    PermanentlyFailed { attempts: i32, error: String },
}

impl DeliveryOutcome {
    pub fn sent(now: time::OffsetDateTime) -> Self {
        DeliveryOutcome::Sent { at: now }
    }

    /// Outcome for a failed attempt of a task that had already failed
    /// `retry_count` times before.
    pub fn after_failure(retry_count: i32, error: String, now: time::OffsetDateTime) -> Self {
        let attempt = retry_count.saturating_add(1);
        if attempt < MAX_RETRY_COUNT {
            DeliveryOutcome::Retrying {
                at: now + retry_delay(attempt),
                attempt,
                error,
            }
        } else {
            DeliveryOutcome::PermanentlyFailed {
                attempts: attempt,
                error,
            }
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent { .. })
    }
}
