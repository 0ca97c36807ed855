//! Retry policy: backoff delay and outcome classification.

use std::time::Duration;

use crate::transport::{
    ERROR_DATA_SOURCE_NOT_FOUND, ErrorCondition, STATUS_NOT_FOUND, WireResponse, is_success_status,
};

/// Shortest spacing between two attempts of one request.
pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Longest spacing between two attempts of one request.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Delay before the next attempt, given the time elapsed since the request
/// started.
///
/// The delay grows with elapsed time rather than attempt count, bounded to
/// `[MIN_RETRY_DELAY, MAX_RETRY_DELAY]`.
pub fn retry_delay(elapsed: Duration) -> Duration {
    elapsed.clamp(MIN_RETRY_DELAY, MAX_RETRY_DELAY)
}

/// Classification of one completed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Terminal success.
    Succeeded,
    /// Eligible for another attempt before the deadline.
    Retry,
    /// Terminal failure with the given condition.
    Failed(ErrorCondition),
}

/// Classify the completion of an attempt.
pub fn classify(
    error: ErrorCondition,
    response: Option<&WireResponse>,
    retry_on_not_found: bool,
) -> Outcome {
    match error {
        ErrorCondition::NoError => match response {
            // The transport promised a response with NoError.
            None => Outcome::Failed(ErrorCondition::ProtocolError),
            Some(response) if is_success_status(response.status) => Outcome::Succeeded,
            Some(response)
                if retry_on_not_found
                    && response.status == STATUS_NOT_FOUND
                    && response.error_num() == Some(ERROR_DATA_SOURCE_NOT_FOUND) =>
            {
                Outcome::Retry
            }
            Some(_) => Outcome::Failed(ErrorCondition::Canceled),
        },
        ErrorCondition::CouldNotConnect | ErrorCondition::Timeout => Outcome::Retry,
        other => Outcome::Failed(other),
    }
}
