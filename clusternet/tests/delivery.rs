//! Property tests: every retrying request resolves exactly once, with the
//! outcome and attempt count the retry policy prescribes for its reply
//! sequence.

mod common;

use std::time::Duration;

use bytes::Bytes;
use clusternet::transport::{STATUS_INTERNAL_SERVER_ERROR, STATUS_NOT_FOUND, STATUS_OK};
use clusternet::{DestinationId, ErrorCondition, Headers, RestVerb, send_request_retry};
use common::{NOT_FOUND_BODY, Reply, ScriptedConnector, feature};
use proptest::prelude::*;

/// What the scripted peer does for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    CouldNotConnect,
    Timeout,
    WriteError,
    NotFound,
    ServerError,
    Ok,
    Drop,
}

impl ReplyKind {
    fn reply(self) -> Reply {
        match self {
            ReplyKind::CouldNotConnect => Reply::error(ErrorCondition::CouldNotConnect),
            ReplyKind::Timeout => Reply::error(ErrorCondition::Timeout),
            ReplyKind::WriteError => Reply::error(ErrorCondition::WriteError),
            ReplyKind::NotFound => Reply::status(STATUS_NOT_FOUND, NOT_FOUND_BODY),
            ReplyKind::ServerError => Reply::status(STATUS_INTERNAL_SERVER_ERROR, ""),
            ReplyKind::Ok => Reply::status(STATUS_OK, "{}"),
            ReplyKind::Drop => Reply::Drop,
        }
    }

    /// `None` when the attempt is retried, else the terminal condition.
    fn terminal(self, retry_on_not_found: bool) -> Option<ErrorCondition> {
        match self {
            ReplyKind::CouldNotConnect | ReplyKind::Timeout => None,
            ReplyKind::NotFound if retry_on_not_found => None,
            ReplyKind::NotFound | ReplyKind::ServerError => Some(ErrorCondition::Canceled),
            ReplyKind::Ok => Some(ErrorCondition::NoError),
            ReplyKind::WriteError => Some(ErrorCondition::WriteError),
            ReplyKind::Drop => Some(ErrorCondition::ConnectionClosed),
        }
    }
}

fn reply_strategy() -> impl Strategy<Value = ReplyKind> {
    prop_oneof![
        Just(ReplyKind::CouldNotConnect),
        Just(ReplyKind::Timeout),
        Just(ReplyKind::WriteError),
        Just(ReplyKind::NotFound),
        Just(ReplyKind::ServerError),
        Just(ReplyKind::Ok),
        Just(ReplyKind::Drop),
    ]
}

/// Budgets chosen away from the retry schedule's boundaries.
fn timeout_strategy() -> impl Strategy<Value = Duration> {
    prop_oneof![
        Just(Duration::ZERO),
        Just(Duration::from_millis(150)),
        Just(Duration::from_secs(1)),
        Just(Duration::from_secs(3)),
        Just(Duration::from_secs(30)),
    ]
}

const FALLBACK: ReplyKind = ReplyKind::CouldNotConnect;

/// Outcome and attempt count on an ideal clock.
///
/// Retries wait for the time elapsed so far, kept between 200ms and 10s.
fn expected(script: &[ReplyKind], timeout: Duration, retry_on_not_found: bool) -> (ErrorCondition, usize) {
    if timeout.is_zero() {
        return (ErrorCondition::Timeout, 0);
    }
    let mut elapsed = Duration::ZERO;
    let mut attempts = 0;
    let mut replies = script.iter().copied().chain(std::iter::repeat(FALLBACK));
    loop {
        attempts += 1;
        let kind = replies.next().expect("endless replies");
        if let Some(condition) = kind.terminal(retry_on_not_found) {
            return (condition, attempts);
        }
        let delay = elapsed.clamp(Duration::from_millis(200), Duration::from_secs(10));
        if elapsed + delay >= timeout {
            return (ErrorCondition::Timeout, attempts);
        }
        elapsed += delay;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_exactly_one_result(
        script in prop::collection::vec(reply_strategy(), 0..8),
        timeout in timeout_strategy(),
        retry_on_not_found in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .expect("build runtime");

        let (error, attempts, leased, payloads_match) = runtime.block_on(async {
            let connector = ScriptedConnector::new(
                script.iter().map(|kind| kind.reply()),
                FALLBACK.reply(),
            );
            let feature = feature(&connector);
            let payload = Bytes::from_static(b"[1,2,3]");

            let response = send_request_retry(
                &feature,
                DestinationId::from("server:PRMR-1"),
                RestVerb::Post,
                "/_db/shop/_api/cursor",
                payload.clone(),
                timeout,
                &Headers::new(),
                retry_on_not_found,
            )
            .await;

            let recorded = connector.recorded();
            let leased = feature
                .pool()
                .map(|pool| pool.metrics().leased_connections)
                .unwrap_or_default();
            let payloads_match = recorded.iter().all(|r| r.request.payload == payload);
            (response.error, recorded.len(), leased, payloads_match)
        });

        let (expected_error, expected_attempts) = expected(&script, timeout, retry_on_not_found);
        prop_assert_eq!(error, expected_error);
        prop_assert_eq!(attempts, expected_attempts);
        prop_assert_eq!(leased, 0);
        prop_assert!(payloads_match);
    }
}
