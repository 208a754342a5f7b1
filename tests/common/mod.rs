#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Candor session client integration tests.
//!
//! Provides a scripted [`MockConnector`]/[`MockTransport`] pair and helpers
//! for constructing inbound server JSON. The connector records the
//! (tokio-clock) instant of every connection attempt, which is how the
//! backoff-schedule tests verify the exact delays.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use candor_session_client::{CandorError, Connector, Transport};
use tokio::time::Instant;

// ── MockTransport ───────────────────────────────────────────────────

/// A mock transport that records sent messages into a shared log and
/// replays scripted responses, hanging once the script runs out.
pub struct MockTransport {
    /// Scripted server responses (consumed in order by `recv`). An explicit
    /// `None` entry signals a clean transport close.
    incoming: VecDeque<Option<Result<String, CandorError>>>,
    /// Shared log of accepted outgoing messages, ordered across transports.
    sent: Arc<StdMutex<Vec<String>>>,
    /// Messages accepted so far by this transport.
    accepted: usize,
    /// After this many accepted messages, `send` fails.
    send_limit: Option<usize>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), CandorError> {
        if let Some(limit) = self.send_limit {
            if self.accepted >= limit {
                return Err(CandorError::TransportSend("wire down".into()));
            }
        }
        self.accepted += 1;
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, CandorError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // No more scripted messages — hang so the connection stays open
            // until the client closes it.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), CandorError> {
        Ok(())
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Scripted outcome for one connection attempt.
pub enum Script {
    /// The attempt fails immediately.
    Refuse,
    /// The attempt never completes (until cancelled).
    Hang,
    /// The attempt yields a transport that replays `incoming`.
    Open(Vec<Option<Result<String, CandorError>>>),
    /// Like `Open`, but the transport accepts only `accept` sends before
    /// failing.
    OpenWithSendLimit {
        accept: usize,
        incoming: Vec<Option<Result<String, CandorError>>>,
    },
}

/// Connector that replays a script of connection outcomes and records when
/// each attempt happened.
pub struct MockConnector {
    scripts: VecDeque<Script>,
    sent: Arc<StdMutex<Vec<String>>>,
    attempts: Arc<StdMutex<Vec<Instant>>>,
}

impl MockConnector {
    /// Build a connector from per-attempt scripts. Attempts beyond the
    /// script are refused.
    ///
    /// Returns the connector plus shared handles: the ordered log of every
    /// message accepted by any produced transport, and the instants of
    /// every connection attempt.
    #[allow(clippy::type_complexity)]
    pub fn new(
        scripts: Vec<Script>,
    ) -> (
        Self,
        Arc<StdMutex<Vec<String>>>,
        Arc<StdMutex<Vec<Instant>>>,
    ) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let attempts = Arc::new(StdMutex::new(Vec::new()));
        let connector = Self {
            scripts: VecDeque::from(scripts),
            sent: Arc::clone(&sent),
            attempts: Arc::clone(&attempts),
        };
        (connector, sent, attempts)
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&mut self) -> Result<MockTransport, CandorError> {
        self.attempts.lock().unwrap().push(Instant::now());
        match self.scripts.pop_front() {
            Some(Script::Open(incoming)) => Ok(MockTransport {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&self.sent),
                accepted: 0,
                send_limit: None,
            }),
            Some(Script::OpenWithSendLimit { accept, incoming }) => Ok(MockTransport {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&self.sent),
                accepted: 0,
                send_limit: Some(accept),
            }),
            Some(Script::Hang) => std::future::pending().await,
            Some(Script::Refuse) | None => {
                Err(CandorError::TransportSend("connection refused".into()))
            }
        }
    }
}

// ── Inbound JSON helpers ────────────────────────────────────────────

/// A `transcript` server message scoped to `session_id`.
pub fn transcript_json(speaker: &str, text: &str, session_id: &str) -> String {
    serde_json::json!({
        "type": "transcript",
        "payload": { "speaker": speaker, "text": text },
        "timestamp": "2026-08-05T12:00:00Z",
        "sessionId": session_id,
    })
    .to_string()
}

/// An `interview_status` server message.
pub fn status_json(status: &str) -> String {
    serde_json::json!({
        "type": "interview_status",
        "payload": { "status": status },
        "timestamp": "2026-08-05T12:00:00Z",
    })
    .to_string()
}

/// The wire `type` tag of a serialized envelope.
pub fn wire_type(json: &str) -> String {
    let value: serde_json::Value = serde_json::from_str(json).unwrap();
    value["type"].as_str().unwrap_or_default().to_string()
}
