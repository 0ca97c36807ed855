//! Dispatch entry points.
//!
//! - [`send_request`]: one attempt, raw transport outcome.
//! - [`send_request_retry`]: retries connection failures, timeouts and
//!   (optionally) the "data source not found" race until the deadline.
//!
//! Both return a [`ResponseFuture`] and never fail directly: every outcome,
//! including resolution and pool failures, arrives as a [`Response`].
//!
//! [`Response`]: crate::Response

/// Backoff delay and outcome classification
pub mod backoff;

/// Retrying request state machine
pub mod state;

use std::time::Duration;

use bytes::Bytes;

pub use backoff::{MAX_RETRY_DELAY, MIN_RETRY_DELAY, Outcome, classify, retry_delay};
pub use state::{RequestState, RetryRequest};

use crate::feature::NetworkFeature;
use crate::promise::{Response, ResponseFuture, response_channel};
use crate::transport::ErrorCondition;
use crate::{DestinationId, Headers, Providers, RestVerb, TaskProvider};

/// Send a request once, without retries.
///
/// The pool is checked before the destination is resolved; either failing
/// yields `Canceled`. The wire timeout is the full `timeout`.
pub fn send_request<P: Providers>(
    feature: &NetworkFeature<P>,
    destination: DestinationId,
    verb: RestVerb,
    path: &str,
    payload: Bytes,
    timeout: Duration,
    headers: &Headers,
) -> ResponseFuture {
    let Some(pool) = feature.pool() else {
        tracing::warn!(destination = %destination, "connection pool unavailable");
        return ResponseFuture::ready(Response::error(destination, ErrorCondition::Canceled));
    };

    let endpoint = match feature.resolver().resolve(&destination) {
        Ok(endpoint) => endpoint,
        Err(err) => {
            tracing::debug!(destination = %destination, error = %err, "destination unresolved");
            return ResponseFuture::ready(Response::error(destination, ErrorCondition::Canceled));
        }
    };

    let request = feature
        .requests()
        .build(verb, path, payload, timeout, headers);

    let lease = match pool.lease(&endpoint) {
        Ok(lease) => lease,
        Err(err) => {
            tracing::warn!(destination = %destination, error = %err, "lease failed");
            return ResponseFuture::ready(Response::error(destination, ErrorCondition::Canceled));
        }
    };

    tracing::debug!(destination = %destination, endpoint = %endpoint, "sending request");
    let (promise, future) = response_channel(destination.clone());
    let connection = lease.connection().clone();
    connection.send_request(
        request,
        Box::new(move |error, response| {
            drop(lease);
            promise.set_value(Response::new(destination, error, response));
        }),
    );
    future
}

/// Send a request, retrying until it succeeds, fails terminally, or
/// `timeout` runs out.
///
/// The deadline is fixed when this is called. Must be called from within
/// the runtime the feature's task provider spawns on.
#[allow(clippy::too_many_arguments)]
pub fn send_request_retry<P: Providers>(
    feature: &NetworkFeature<P>,
    destination: DestinationId,
    verb: RestVerb,
    path: &str,
    payload: Bytes,
    timeout: Duration,
    headers: &Headers,
    retry_on_not_found: bool,
) -> ResponseFuture {
    dispatch_retry(
        feature,
        RetryRequest {
            destination,
            verb,
            path: path.to_string(),
            payload,
            timeout,
            headers: headers.clone(),
            retry_on_not_found,
        },
    )
}

/// [`send_request_retry`] taking its parameters as a [`RetryRequest`].
pub fn dispatch_retry<P: Providers>(
    feature: &NetworkFeature<P>,
    request: RetryRequest,
) -> ResponseFuture {
    let (promise, future) = response_channel(request.destination.clone());
    let state = RequestState::new(feature.clone(), request, promise);
    feature
        .providers()
        .task()
        .spawn_task("clusternet-request", state.run());
    future
}
