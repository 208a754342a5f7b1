#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for the Candor session client lifecycle.
//!
//! Timer-driven properties (backoff schedule, heartbeat cadence) run under
//! tokio's paused clock, so the exact delays are asserted deterministically
//! via the instants recorded by the mock connector.

mod common;

use std::time::Duration;

use candor_session_client::{
    CandorClient, CandorConfig, CandorEvent, ConnectionState,
};
use common::{status_json, transcript_json, wire_type, MockConnector, Script};

fn config(base_delay_ms: u64, max_attempts: u32) -> CandorConfig {
    CandorConfig::new()
        .with_base_reconnect_delay(Duration::from_millis(base_delay_ms))
        .with_max_reconnect_attempts(max_attempts)
}

// ── Outbound buffering ──────────────────────────────────────────────

#[tokio::test]
async fn envelopes_queued_while_closed_are_delivered_in_order_exactly_once() {
    let (connector, sent, _attempts) = MockConnector::new(vec![Script::Open(vec![])]);
    let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

    client.send_answer("x").unwrap();
    client.send_answer("y").unwrap();
    assert_eq!(client.state(), ConnectionState::Closed);

    client.connect().unwrap();
    let event = events.recv().await.unwrap();
    assert!(matches!(event, CandorEvent::Connected));
    tokio::time::sleep(Duration::from_millis(50)).await;

    {
        let messages = sent.lock().unwrap();
        assert_eq!(messages.len(), 2, "queue drained exactly once");
        assert!(messages[0].contains("\"answer\":\"x\""));
        assert!(messages[1].contains("\"answer\":\"y\""));
    }

    // The queue is empty now: a new send goes straight out, after the two.
    client.send_answer("z").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sent.lock().unwrap().len(), 3);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn mid_flush_failure_retains_unsent_envelopes_for_next_open() {
    let (connector, sent, _attempts) = MockConnector::new(vec![
        Script::OpenWithSendLimit {
            accept: 1,
            incoming: vec![],
        },
        Script::Open(vec![]),
    ]);
    let (mut client, mut events) =
        CandorClient::start(connector, config(1000, 3));

    client.send_answer("a").unwrap();
    client.send_answer("b").unwrap();
    client.send_answer("c").unwrap();
    client.connect().unwrap();

    // First open accepts only "a", then the wire goes down mid-flush.
    let event = events.recv().await.unwrap();
    assert!(matches!(event, CandorEvent::Connected));
    let event = events.recv().await.unwrap();
    assert!(matches!(event, CandorEvent::Disconnected { .. }));

    // The retry (after backoff) delivers the remainder, in order.
    let event = events.recv().await.unwrap();
    assert!(matches!(event, CandorEvent::Connected));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let messages = sent.lock().unwrap();
    assert_eq!(messages.len(), 3);
    assert!(messages[0].contains("\"answer\":\"a\""));
    assert!(messages[1].contains("\"answer\":\"b\""));
    assert!(messages[2].contains("\"answer\":\"c\""));

    drop(messages);
    client.shutdown().await;
}

// ── Reconnect backoff ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn backoff_schedule_doubles_until_attempts_are_exhausted() {
    // Every attempt is refused; base 1000ms, budget 3.
    let (connector, _sent, attempts) = MockConnector::new(vec![
        Script::Refuse,
        Script::Refuse,
        Script::Refuse,
        Script::Refuse,
    ]);
    let (mut client, mut events) =
        CandorClient::start(connector, config(1000, 3));

    client.connect().unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event, CandorEvent::ConnectionLost { attempts: 3 });

    {
        let recorded = attempts.lock().unwrap();
        assert_eq!(recorded.len(), 4, "initial attempt plus three retries");
        assert_eq!(recorded[1] - recorded[0], Duration::from_millis(1000));
        assert_eq!(recorded[2] - recorded[1], Duration::from_millis(2000));
        assert_eq!(recorded[3] - recorded[2], Duration::from_millis(4000));
    }

    // Budget exhausted: nothing further is ever scheduled.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(attempts.lock().unwrap().len(), 4);
    assert_eq!(client.state(), ConnectionState::Error);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_the_attempt_counter() {
    // Fail once, open, lose the connection immediately, then refuse.
    let (connector, _sent, attempts) = MockConnector::new(vec![
        Script::Refuse,
        Script::Open(vec![None]),
        Script::Refuse,
    ]);
    let (mut client, mut events) =
        CandorClient::start(connector, config(1000, 1));

    client.connect().unwrap();

    let event = events.recv().await.unwrap();
    assert!(matches!(event, CandorEvent::Connected));
    let event = events.recv().await.unwrap();
    assert!(matches!(event, CandorEvent::Disconnected { .. }));
    let event = events.recv().await.unwrap();
    assert_eq!(event, CandorEvent::ConnectionLost { attempts: 1 });

    let recorded = attempts.lock().unwrap();
    assert_eq!(recorded.len(), 3);
    // First retry after the refused attempt: base delay.
    assert_eq!(recorded[1] - recorded[0], Duration::from_millis(1000));
    // Retry after the abnormal close: base delay again — the counter was
    // reset by the successful open, not carried over.
    assert_eq!(recorded[2] - recorded[1], Duration::from_millis(1000));

    drop(recorded);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_resumes_after_exhaustion() {
    let (connector, _sent, attempts) =
        MockConnector::new(vec![Script::Refuse, Script::Open(vec![])]);
    let (mut client, mut events) =
        CandorClient::start(connector, config(1000, 0));

    client.connect().unwrap();
    let event = events.recv().await.unwrap();
    assert_eq!(event, CandorEvent::ConnectionLost { attempts: 0 });
    assert_eq!(client.state(), ConnectionState::Error);
    assert_eq!(attempts.lock().unwrap().len(), 1);

    // The soft-terminal state is resumable: reconnect() resets the counter
    // and tries again.
    client.reconnect().unwrap();
    let event = events.recv().await.unwrap();
    assert!(matches!(event, CandorEvent::Connected));
    assert!(client.is_open());

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_backoff_cancels_the_pending_retry() {
    let (connector, _sent, attempts) = MockConnector::new(vec![Script::Refuse]);
    let (mut client, _events) = CandorClient::start(connector, config(1000, 3));

    client.connect().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(client.state(), ConnectionState::Error);
    assert_eq!(attempts.lock().unwrap().len(), 1);

    // Disconnect while the 1000ms retry timer is pending.
    client.disconnect().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(client.state(), ConnectionState::Closed);

    // Long past the scheduled retry: no connection attempt happened.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(attempts.lock().unwrap().len(), 1);
    assert_eq!(client.state(), ConnectionState::Closed);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_while_connecting_aborts_the_attempt() {
    let (connector, _sent, attempts) = MockConnector::new(vec![Script::Hang]);
    let (mut client, _events) = CandorClient::start(connector, CandorConfig::new());

    client.connect().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(client.state(), ConnectionState::Connecting);

    client.disconnect().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(attempts.lock().unwrap().len(), 1);

    client.shutdown().await;
}

// ── Heartbeat ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn heartbeat_is_sent_once_per_interval_while_open() {
    let (connector, sent, _attempts) = MockConnector::new(vec![Script::Open(vec![])]);
    let heartbeat_config = CandorConfig::new().with_heartbeat_interval(Duration::from_secs(30));
    let (mut client, mut events) = CandorClient::start(connector, heartbeat_config);

    client.connect().unwrap();
    let event = events.recv().await.unwrap();
    assert!(matches!(event, CandorEvent::Connected));

    // 90 seconds with no other activity: exactly 3 heartbeats.
    tokio::time::sleep(Duration::from_millis(90_500)).await;

    let messages = sent.lock().unwrap();
    assert_eq!(messages.len(), 3);
    for message in messages.iter() {
        assert_eq!(wire_type(message), "heartbeat");
        let value: serde_json::Value = serde_json::from_str(message).unwrap();
        assert_eq!(value["payload"], serde_json::json!({}));
    }

    drop(messages);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn no_heartbeats_while_not_open() {
    let (connector, sent, _attempts) = MockConnector::new(vec![]);
    let heartbeat_config = CandorConfig::new().with_heartbeat_interval(Duration::from_secs(30));
    let (mut client, _events) = CandorClient::start(connector, heartbeat_config);

    // Never connected: two minutes pass, nothing is sent.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(sent.lock().unwrap().is_empty());

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn heartbeat_stops_immediately_on_disconnect() {
    let (connector, sent, _attempts) = MockConnector::new(vec![Script::Open(vec![])]);
    let heartbeat_config = CandorConfig::new().with_heartbeat_interval(Duration::from_secs(30));
    let (mut client, mut events) = CandorClient::start(connector, heartbeat_config);

    client.connect().unwrap();
    let _ = events.recv().await; // Connected

    tokio::time::sleep(Duration::from_millis(30_500)).await;
    assert_eq!(sent.lock().unwrap().len(), 1);

    client.disconnect().unwrap();
    let event = events.recv().await.unwrap();
    assert!(matches!(event, CandorEvent::Disconnected { .. }));

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(sent.lock().unwrap().len(), 1, "no heartbeats after leaving open");

    client.shutdown().await;
}

// ── Inbound routing ─────────────────────────────────────────────────

#[tokio::test]
async fn transcript_events_are_scoped_to_the_joined_session() {
    let (connector, _sent, _attempts) = MockConnector::new(vec![Script::Open(vec![
        Some(Ok(transcript_json("candidate", "hi", "S1"))),
        Some(Ok(transcript_json("candidate", "intruder", "S2"))),
        Some(Ok(status_json("wrapping_up"))),
    ])]);
    let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

    client.join_session("S1").unwrap();
    client.connect().unwrap();

    let event = events.recv().await.unwrap();
    assert!(matches!(event, CandorEvent::Connected));

    let event = events.recv().await.unwrap();
    match event {
        CandorEvent::TranscriptAppended {
            speaker,
            text,
            session_id,
        } => {
            assert_eq!(speaker, "candidate");
            assert_eq!(text, "hi");
            assert_eq!(session_id.as_deref(), Some("S1"));
        }
        other => panic!("expected TranscriptAppended, got {other:?}"),
    }

    // The S2 transcript was discarded; the next event is the status change
    // that followed it.
    let event = events.recv().await.unwrap();
    match event {
        CandorEvent::StatusChanged { status, .. } => assert_eq!(status, "wrapping_up"),
        other => panic!("expected StatusChanged, got {other:?}"),
    }

    client.shutdown().await;
}

#[tokio::test]
async fn unroutable_inbound_messages_do_not_break_dispatch() {
    let (connector, _sent, _attempts) = MockConnector::new(vec![Script::Open(vec![
        Some(Ok("{not json".to_string())),
        Some(Ok(
            serde_json::json!({
                "type": "future_feature",
                "payload": { "v": 2 },
                "timestamp": "2026-08-05T12:00:00Z",
            })
            .to_string(),
        )),
        Some(Ok(status_json("in_progress"))),
    ])]);
    let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

    client.connect().unwrap();
    let _ = events.recv().await; // Connected

    // Both garbage messages were dropped silently; the valid one arrives.
    let event = events.recv().await.unwrap();
    assert!(matches!(event, CandorEvent::StatusChanged { .. }));
    assert!(client.is_open());

    client.shutdown().await;
}

#[tokio::test]
async fn server_close_is_reported_and_reconnect_is_attempted() {
    let (connector, _sent, attempts) = MockConnector::new(vec![
        Script::Open(vec![None]),
        Script::Open(vec![]),
    ]);
    let (mut client, mut events) = CandorClient::start(
        connector,
        config(1, 3), // 1ms backoff keeps the test quick on the real clock
    );

    client.connect().unwrap();
    let _ = events.recv().await; // Connected

    let event = events.recv().await.unwrap();
    match event {
        CandorEvent::Disconnected { reason } => {
            assert_eq!(reason.as_deref(), Some("connection closed by server"));
        }
        other => panic!("expected Disconnected, got {other:?}"),
    }

    // Auto-reconnect brings the connection back without caller involvement.
    let event = events.recv().await.unwrap();
    assert!(matches!(event, CandorEvent::Connected));
    assert_eq!(attempts.lock().unwrap().len(), 2);

    client.shutdown().await;
}
