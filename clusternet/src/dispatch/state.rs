//! Lifecycle of one retrying request.
//!
//! ```text
//! Idle ─► Resolving ─► Leasing ─► InFlight ─┬─► Succeeded
//!  ▲                                        ├─► Failed(condition)
//!  │                                        └─► Retrying ─(timer)─┐
//!  └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The state machine runs as a loop inside one spawned task that owns the
//! [`RequestState`]. Each iteration suspends at most twice: on the transport
//! completion and on the retry timer. The next attempt is only started
//! after the previous completion was classified, so at most one attempt is
//! ever outstanding.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;

use super::backoff::{Outcome, classify, retry_delay};
use crate::feature::NetworkFeature;
use crate::promise::{Response, ResponsePromise};
use crate::transport::{ErrorCondition, WireResponse};
use crate::{DestinationId, Headers, Providers, RestVerb, TimeProvider, TimerHandle, TimerService};

/// Parameters of a retrying request.
#[derive(Debug, Clone)]
pub struct RetryRequest {
    /// Logical destination.
    pub destination: DestinationId,
    /// Request method.
    pub verb: RestVerb,
    /// Request path, optionally carrying a database segment.
    pub path: String,
    /// Request body, replayed unchanged on every attempt.
    pub payload: Bytes,
    /// Total time budget.
    pub timeout: Duration,
    /// Caller headers.
    pub headers: Headers,
    /// Retry a "data source not found" 404.
    pub retry_on_not_found: bool,
}

enum Step {
    Done(Response),
    Retry(Option<WireResponse>),
}

/// Live state of one logical request.
pub struct RequestState<P: Providers> {
    feature: NetworkFeature<P>,
    request: RetryRequest,
    start_time: Duration,
    /// Absolute deadline, fixed at creation.
    end_time: Duration,
    promise: ResponsePromise,
    timer: Option<TimerHandle>,
    last_response: Option<WireResponse>,
    attempts: u32,
}

impl<P: Providers> RequestState<P> {
    /// Capture the start time and derive the deadline.
    pub fn new(feature: NetworkFeature<P>, request: RetryRequest, promise: ResponsePromise) -> Self {
        let start_time = feature.providers().time().now();
        let end_time = start_time.saturating_add(request.timeout);
        Self {
            feature,
            request,
            start_time,
            end_time,
            promise,
            timer: None,
            last_response: None,
            attempts: 0,
        }
    }

    /// Drive the request to a terminal outcome and fulfil the promise.
    pub async fn run(mut self) {
        let response = loop {
            let response = match self.attempt().await {
                Step::Done(response) => response,
                Step::Retry(last) => match self.backoff(last).await {
                    Some(response) => response,
                    None => continue,
                },
            };
            break response;
        };

        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
        tracing::debug!(
            destination = %self.request.destination,
            attempts = self.attempts,
            error = %response.error,
            status = ?response.status_code(),
            "request finished"
        );
        self.promise.set_value(response);
    }

    fn respond(&mut self, error: ErrorCondition, response: Option<WireResponse>) -> Step {
        Step::Done(Response::new(self.request.destination.clone(), error, response))
    }

    async fn attempt(&mut self) -> Step {
        let now = self.feature.providers().time().now();
        if self.feature.is_stopping() {
            let last = self.last_response.take();
            return self.respond(ErrorCondition::Canceled, last);
        }
        if now >= self.end_time {
            let last = self.last_response.take();
            return self.respond(ErrorCondition::Timeout, last);
        }

        let endpoint = match self.feature.resolver().resolve(&self.request.destination) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                tracing::debug!(
                    destination = %self.request.destination,
                    error = %err,
                    "destination unresolved"
                );
                return self.respond(ErrorCondition::Canceled, None);
            }
        };

        let Some(pool) = self.feature.pool() else {
            tracing::warn!(destination = %self.request.destination, "connection pool unavailable");
            return self.respond(ErrorCondition::Canceled, None);
        };
        let lease = match pool.lease(&endpoint) {
            Ok(lease) => lease,
            Err(err) => {
                tracing::warn!(
                    destination = %self.request.destination,
                    endpoint = %endpoint,
                    error = %err,
                    "lease failed"
                );
                return self.respond(ErrorCondition::Canceled, None);
            }
        };

        let remaining = self.end_time.saturating_sub(now);
        let wire = self.feature.requests().build(
            self.request.verb,
            &self.request.path,
            self.request.payload.clone(),
            remaining,
            &self.request.headers,
        );

        self.attempts += 1;
        tracing::debug!(
            destination = %self.request.destination,
            endpoint = %endpoint,
            attempt = self.attempts,
            remaining_ms = wire.timeout.as_millis() as u64,
            "sending request"
        );

        let (done_tx, done_rx) = oneshot::channel();
        let connection = lease.connection().clone();
        connection.send_request(
            wire,
            Box::new(move |error, response| {
                // Return the connection before waking the request.
                drop(lease);
                let _ = done_tx.send((error, response));
            }),
        );
        // A transport that never answers must not outlive the budget.
        let time = self.feature.providers().time().clone();
        let (error, response) = match time.timeout(remaining, done_rx).await {
            Ok(Ok(completion)) => completion,
            Ok(Err(_)) => (ErrorCondition::ConnectionClosed, None),
            Err(_) => {
                tracing::debug!(
                    destination = %self.request.destination,
                    attempt = self.attempts,
                    "no completion before deadline"
                );
                (ErrorCondition::Timeout, None)
            }
        };

        match classify(error, response.as_ref(), self.request.retry_on_not_found) {
            Outcome::Succeeded => self.respond(ErrorCondition::NoError, response),
            Outcome::Failed(condition) => self.respond(condition, response),
            Outcome::Retry => {
                tracing::debug!(
                    destination = %self.request.destination,
                    attempt = self.attempts,
                    error = %error,
                    status = ?response.as_ref().map(|r| r.status),
                    "attempt failed, retrying"
                );
                Step::Retry(response)
            }
        }
    }

    /// Park until the next attempt is due.
    ///
    /// Returns a terminal response when no attempt fits before the deadline.
    async fn backoff(&mut self, last: Option<WireResponse>) -> Option<Response> {
        let time = self.feature.providers().time().clone();
        let now = time.now();
        let delay = retry_delay(now.saturating_sub(self.start_time));
        let due = now + delay;
        if due >= self.end_time {
            tracing::debug!(
                destination = %self.request.destination,
                attempts = self.attempts,
                "deadline reached before next attempt"
            );
            return Some(Response::new(
                self.request.destination.clone(),
                ErrorCondition::Timeout,
                last,
            ));
        }

        self.last_response = last;
        tracing::debug!(
            destination = %self.request.destination,
            delay_ms = delay.as_millis() as u64,
            "retry scheduled"
        );

        let (fired_tx, fired_rx) = oneshot::channel();
        self.timer = Some(time.arm(
            due,
            Box::new(move || {
                let _ = fired_tx.send(());
            }),
        ));

        tokio::select! {
            _ = fired_rx => {}
            _ = self.feature.stopped() => {
                tracing::debug!(
                    destination = %self.request.destination,
                    "retry interrupted by shutdown"
                );
            }
        }
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
        None
    }
}
