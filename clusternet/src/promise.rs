//! Single-assignment result delivery for dispatched requests.
//!
//! A [`ResponsePromise`] is fulfilled exactly once with a [`Response`]; the
//! paired [`ResponseFuture`] resolves to it. Fulfilment consumes the
//! promise, so a second fulfilment does not type-check. If the promise is
//! dropped unfulfilled, the future resolves to [`ErrorCondition::Canceled`]
//! instead of hanging.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::DestinationId;
use crate::transport::{ErrorCondition, WireResponse};

/// Outcome of a dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The destination the request was addressed to.
    pub destination: DestinationId,
    /// Transport-level outcome.
    pub error: ErrorCondition,
    /// The last raw response received, if any.
    pub response: Option<WireResponse>,
}

impl Response {
    /// Create a response.
    pub fn new(
        destination: DestinationId,
        error: ErrorCondition,
        response: Option<WireResponse>,
    ) -> Self {
        Self {
            destination,
            error,
            response,
        }
    }

    /// A response carrying only an error condition.
    pub fn error(destination: DestinationId, error: ErrorCondition) -> Self {
        Self::new(destination, error, None)
    }

    /// Whether the transport reported no error.
    pub fn ok(&self) -> bool {
        self.error.is_ok()
    }

    /// Status code of the raw response, if one was received.
    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }
}

/// Create a connected promise/future pair for `destination`.
pub fn response_channel(destination: DestinationId) -> (ResponsePromise, ResponseFuture) {
    let (sender, receiver) = oneshot::channel();
    (
        ResponsePromise {
            destination: destination.clone(),
            sender: Some(sender),
        },
        ResponseFuture {
            destination,
            receiver,
        },
    )
}

/// Write side of a response channel.
pub struct ResponsePromise {
    destination: DestinationId,
    sender: Option<oneshot::Sender<Response>>,
}

impl ResponsePromise {
    /// The destination this promise answers for.
    pub fn destination(&self) -> &DestinationId {
        &self.destination
    }

    /// Fulfil the promise.
    ///
    /// A caller that already dropped its future is not an error.
    pub fn set_value(mut self, response: Response) {
        debug_assert!(self.sender.is_some(), "response promise fulfilled twice");
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(response);
        }
    }
}

impl Drop for ResponsePromise {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            tracing::warn!(
                destination = %self.destination,
                "response promise dropped without fulfillment"
            );
            let _ = sender.send(Response::error(
                self.destination.clone(),
                ErrorCondition::Canceled,
            ));
        }
    }
}

impl std::fmt::Debug for ResponsePromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsePromise")
            .field("destination", &self.destination)
            .field("fulfilled", &self.sender.is_none())
            .finish()
    }
}

/// Read side of a response channel.
#[derive(Debug)]
pub struct ResponseFuture {
    destination: DestinationId,
    receiver: oneshot::Receiver<Response>,
}

impl ResponseFuture {
    /// A future that is already resolved.
    pub fn ready(response: Response) -> Self {
        let (promise, future) = response_channel(response.destination.clone());
        promise.set_value(response);
        future
    }

    /// The destination this future answers for.
    pub fn destination(&self) -> &DestinationId {
        &self.destination
    }
}

impl Future for ResponseFuture {
    type Output = Response;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(response)) => Poll::Ready(response),
            // Sender gone without a value.
            Poll::Ready(Err(_)) => Poll::Ready(Response::error(
                self.destination.clone(),
                ErrorCondition::Canceled,
            )),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::STATUS_OK;

    fn destination() -> DestinationId {
        DestinationId::from("server:PRMR-1")
    }

    #[tokio::test]
    async fn test_set_value_resolves_future() {
        let (promise, future) = response_channel(destination());
        promise.set_value(Response::new(
            destination(),
            ErrorCondition::NoError,
            Some(WireResponse::new(STATUS_OK, "{}")),
        ));

        let response = future.await;
        assert!(response.ok());
        assert_eq!(response.status_code(), Some(STATUS_OK));
        assert_eq!(response.destination, destination());
    }

    #[tokio::test]
    async fn test_dropped_promise_cancels() {
        let (promise, future) = response_channel(destination());
        drop(promise);

        let response = future.await;
        assert_eq!(response.error, ErrorCondition::Canceled);
        assert!(response.response.is_none());
    }

    #[tokio::test]
    async fn test_ready_future() {
        let response = ResponseFuture::ready(Response::error(
            destination(),
            ErrorCondition::CouldNotConnect,
        ))
        .await;
        assert_eq!(response.error, ErrorCondition::CouldNotConnect);
    }

    #[test]
    fn test_set_value_after_future_dropped() {
        let (promise, future) = response_channel(destination());
        drop(future);
        promise.set_value(Response::error(destination(), ErrorCondition::NoError));
    }
}
