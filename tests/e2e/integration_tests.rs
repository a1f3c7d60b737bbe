//! Session lifecycle scenarios against a fully wired node.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::harness::PROPOSAL_ID;
use super::TestHarness;
use bytes::Bytes;
use paygate_node::config::TrackerMode;
use paygate_node::event::NodeEventsChannel;
use paygate_node::{Earnings, Error, Identity, NodeEvent};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn consumer(n: u8) -> Identity {
    Identity::from_address(&format!("0x{n:040x}"))
}

/// Wait for the first event accepted by `matches`, skipping the rest.
async fn next_event<F>(events: &mut NodeEventsChannel, mut matches: F) -> NodeEvent
where
    F: FnMut(&NodeEvent) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("event channel open");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// A funded channel keeps a session alive until the node shuts down.
#[tokio::test]
async fn test_funded_session_lives_until_shutdown() {
    let mut harness = TestHarness::setup(1_000_000).expect("Failed to setup harness");
    let mut events = harness.events();
    harness.start();
    next_event(&mut events, |e| matches!(e, NodeEvent::Started)).await;

    let alice = consumer(1);
    let session = harness.open_session(&alice).await.expect("admitted");
    assert_eq!(session.consumer_id, alice);
    assert_eq!(session.config["endpoint"], "10.0.0.1:51820");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(harness.is_live(&alice, &session.id));
    assert!(!session.done.is_closed());

    harness.teardown().await.expect("Failed to teardown");
    assert!(session.done.is_closed());
    next_event(&mut events, |e| matches!(e, NodeEvent::ShuttingDown)).await;
}

/// Sessions against any other proposal are refused and leave no trace.
#[tokio::test]
async fn test_foreign_proposal_is_refused() {
    let harness = TestHarness::setup(1_000_000).expect("Failed to setup harness");
    let manager = harness.node().session_manager();
    let alice = consumer(1);

    let result = manager
        .create(
            alice.clone(),
            alice,
            PROPOSAL_ID + 1,
            serde_json::Value::Null,
            serde_json::Value::Null,
        )
        .await;
    assert!(matches!(result, Err(Error::InvalidProposal)));
    assert_eq!(manager.session_count(), 0);
}

/// An empty channel ends the session on the first balance check.
#[tokio::test]
async fn test_empty_channel_ends_session() {
    let harness = TestHarness::setup(0).expect("Failed to setup harness");
    let mut events = harness.events();
    let alice = consumer(1);

    let session = harness.open_session(&alice).await.expect("admitted");
    tokio::time::timeout(WAIT, session.done.wait())
        .await
        .expect("session should end");

    let id = session.id.clone();
    next_event(&mut events, |e| {
        matches!(e, NodeEvent::SessionClosed { session_id } if *session_id == id)
    })
    .await;
    assert!(!harness.is_live(&alice, &session.id));
}

/// Promises that catch up with the channel balance end a running session.
#[tokio::test]
async fn test_promises_exhaust_running_session() {
    let harness = TestHarness::setup(5_000).expect("Failed to setup harness");
    let alice = consumer(1);
    let session = harness.open_session(&alice).await.expect("admitted");

    harness.promise(2_000);
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(harness.is_live(&alice, &session.id));

    harness.promise(5_000);
    tokio::time::timeout(WAIT, session.done.wait())
        .await
        .expect("session should end once promises cover the balance");
    assert!(!harness.is_live(&alice, &session.id));
}

/// Each balance check publishes earnings chained on the previous check.
#[tokio::test]
async fn test_balance_checks_publish_earnings_chain() {
    let harness = TestHarness::setup(5_000).expect("Failed to setup harness");
    let mut events = harness.events();
    harness.promise(1_000);

    let session = harness.open_session(&consumer(1)).await.expect("admitted");

    let first = match next_event(&mut events, |e| matches!(e, NodeEvent::EarningsChanged(_))).await
    {
        NodeEvent::EarningsChanged(change) => change,
        other => panic!("unexpected event: {other:?}"),
    };
    assert_eq!(first.identity, TestHarness::provider());
    assert_eq!(first.previous, Earnings::default());
    assert_eq!(
        first.current,
        Earnings {
            lifetime_balance: 4_000,
            unsettled_balance: 5_000,
        }
    );

    harness.promise(3_000);
    let second = match next_event(&mut events, |e| matches!(e, NodeEvent::EarningsChanged(_))).await
    {
        NodeEvent::EarningsChanged(change) => change,
        other => panic!("unexpected event: {other:?}"),
    };
    assert_eq!(second.previous, first.current);
    assert_eq!(second.current.lifetime_balance, 2_000);

    let cached = harness
        .node()
        .channel_repository()
        .cached_earnings(&TestHarness::provider(), &TestHarness::hermes());
    assert_eq!(cached, Some(second.current));
    assert!(!session.done.is_closed());
}

/// Transient channel lookup failures are tolerated, persistent ones are not.
#[tokio::test]
async fn test_unreachable_channel_ends_session() {
    let harness = TestHarness::setup(5_000).expect("Failed to setup harness");
    let alice = consumer(1);
    harness.channels().fail_with(Some("rpc unavailable"));

    let session = harness.open_session(&alice).await.expect("admitted");
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert!(harness.is_live(&alice, &session.id));

    tokio::time::timeout(WAIT, session.done.wait())
        .await
        .expect("session should end after repeated failures");
    assert!(!harness.is_live(&alice, &session.id));
}

/// Without payment tracking an empty channel does not end sessions.
#[tokio::test]
async fn test_noop_tracking_ignores_balance() {
    let mut config = TestHarness::config();
    config.session.tracker = TrackerMode::Noop;
    let harness = TestHarness::setup_with_config(config, 0).expect("Failed to setup harness");
    let alice = consumer(1);

    let session = harness.open_session(&alice).await.expect("admitted");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(harness.is_live(&alice, &session.id));

    harness
        .node()
        .session_manager()
        .destroy(&alice, &session.id)
        .expect("owner may destroy");
    assert!(session.done.is_closed());
}

/// Only the owner can end a session.
#[tokio::test]
async fn test_destroy_checks_owner() {
    let harness = TestHarness::setup(1_000_000).expect("Failed to setup harness");
    let manager = harness.node().session_manager();
    let alice = consumer(1);
    let mallory = consumer(2);

    let session = harness.open_session(&alice).await.expect("admitted");
    assert!(manager.find_session(&mallory, &session.id).is_none());
    assert!(matches!(
        manager.destroy(&mallory, &session.id),
        Err(Error::WrongSessionOwner(_))
    ));
    assert!(harness.is_live(&alice, &session.id));

    manager.destroy(&alice, &session.id).expect("owner may destroy");
    assert!(matches!(
        manager.destroy(&alice, &session.id),
        Err(Error::SessionNotFound(_))
    ));
}

/// A new session tells the previous tunnel owner to stand down.
#[tokio::test]
async fn test_new_session_signals_last_session_shutdown() {
    let harness = TestHarness::setup(1_000_000).expect("Failed to setup harness");
    let mut shutdowns = harness.node().subscribe_last_session_shutdown();

    let first = harness.open_session(&consumer(1)).await.expect("admitted");
    assert_eq!(shutdowns.try_recv().expect("signalled"), first.id);

    let second = harness.open_session(&consumer(2)).await.expect("admitted");
    assert_eq!(shutdowns.try_recv().expect("signalled"), second.id);
    assert_ne!(first.id, second.id);
}

/// NAT handshake payloads reach the session's own queue only.
#[tokio::test]
async fn test_nat_signals_are_per_session() {
    let harness = TestHarness::setup(1_000_000).expect("Failed to setup harness");
    let first = harness.open_session(&consumer(1)).await.expect("admitted");
    let second = harness.open_session(&consumer(2)).await.expect("admitted");
    assert!(!first.nat_signals.same_queue(&second.nat_signals));

    let mut rx = first.nat_signals.take_receiver().expect("receiver available");
    first
        .nat_signals
        .send(Bytes::from_static(b"ping"))
        .await
        .expect("queued");
    assert_eq!(rx.recv().await, Some(Bytes::from_static(b"ping")));
    assert!(second.nat_signals.try_send(Bytes::from_static(b"pong")).is_ok());
    assert!(first.nat_signals.take_receiver().is_none());
}
