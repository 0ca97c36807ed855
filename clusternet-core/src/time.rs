//! Time provider abstraction.
//!
//! All times handed around by clusternet are [`Duration`]s measured from the
//! provider's own epoch (its creation instant). Deadlines are therefore plain
//! `start + timeout` sums and never depend on the wall clock.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during time operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The operation timed out.
    #[error("operation timed out")]
    Elapsed,
}

/// Provider trait for time operations.
///
/// Implementations must be monotonic: `now()` never goes backwards.
#[async_trait]
pub trait TimeProvider: Clone + Send + Sync + 'static {
    /// Sleep for the specified duration.
    async fn sleep(&self, duration: Duration);

    /// Get the current time, measured from the provider's epoch.
    fn now(&self) -> Duration;

    /// Run a future with a timeout.
    ///
    /// Returns `Ok(result)` if the future completes within the timeout,
    /// or `Err(TimeError::Elapsed)` if it times out.
    async fn timeout<F, T>(&self, duration: Duration, future: F) -> Result<T, TimeError>
    where
        F: std::future::Future<Output = T> + Send,
        T: Send;
}

/// Real time provider using Tokio's time facilities.
///
/// Uses [`tokio::time::Instant`] rather than `std::time::Instant` so that a
/// paused Tokio clock (`#[tokio::test(start_paused = true)]`) drives it.
#[derive(Debug, Clone)]
pub struct TokioTimeProvider {
    /// Epoch for calculating elapsed durations
    pub(crate) start_time: tokio::time::Instant,
}

impl TokioTimeProvider {
    /// Create a new Tokio time provider whose epoch is "now".
    pub fn new() -> Self {
        Self {
            start_time: tokio::time::Instant::now(),
        }
    }

    /// Convert a provider-relative time into a Tokio instant.
    pub(crate) fn instant_at(&self, at: Duration) -> tokio::time::Instant {
        self.start_time + at
    }
}

impl Default for TokioTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimeProvider for TokioTimeProvider {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> Duration {
        self.start_time.elapsed()
    }

    async fn timeout<F, T>(&self, duration: Duration, future: F) -> Result<T, TimeError>
    where
        F: std::future::Future<Output = T> + Send,
        T: Send,
    {
        match tokio::time::timeout(duration, future).await {
            Ok(result) => Ok(result),
            Err(_) => Err(TimeError::Elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_now_follows_paused_clock() {
        let time = TokioTimeProvider::new();
        assert_eq!(time.now(), Duration::ZERO);

        time.sleep(Duration::from_millis(250)).await;
        assert_eq!(time.now(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_elapsed() {
        let time = TokioTimeProvider::new();
        let result = time
            .timeout(Duration::from_millis(10), std::future::pending::<()>())
            .await;
        assert_eq!(result, Err(TimeError::Elapsed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_completes() {
        let time = TokioTimeProvider::new();
        let result = time.timeout(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }
}
