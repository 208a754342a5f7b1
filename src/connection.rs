//! Connection lifecycle: state machine, reconnect backoff, outbound
//! buffering, heartbeat.
//!
//! The connection manager is a background task that exclusively owns the
//! transport. All lifecycle mutation — state transitions, the attempt
//! counter, timers — happens inside its single loop, so there is no locking
//! around the transport and no stale timer callbacks: the heartbeat interval
//! and the backoff sleep live on the loop's stack and are dropped the moment
//! the loop changes phase.
//!
//! Phases:
//!
//! - **Idle** — closed (or reconnect attempts exhausted). Waits for
//!   commands; outbound envelopes are queued.
//! - **Connecting** — one [`Connector::connect`] attempt in flight,
//!   abortable by `disconnect()`.
//! - **Open** — transport live. Sends go straight to the wire, inbound text
//!   is routed, the heartbeat interval ticks.
//! - **Backoff** — waiting out the exponential delay before the next
//!   attempt, cancellable by `disconnect()`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::auth::CredentialProvider;
use crate::error::CandorError;
use crate::event::CandorEvent;
use crate::protocol::{ClientMessage, Envelope};
use crate::router::MessageRouter;
use crate::transport::{Connector, Transport};

// ── Connection state ────────────────────────────────────────────────

/// Lifecycle state of the single connection owned by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport. The initial state, and the result of `disconnect()`.
    Closed,
    /// A connection attempt is in flight.
    Connecting,
    /// The transport is live.
    Open,
    /// A caller-initiated close is in progress.
    Closing,
    /// The last attempt failed or the transport closed abnormally.
    Error,
}

impl ConnectionState {
    /// Returns `true` if the transport is live.
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Returns `true` if a connection attempt is in flight.
    pub fn is_connecting(self) -> bool {
        matches!(self, ConnectionState::Connecting)
    }
}

// ── Reconnect policy ────────────────────────────────────────────────

/// Exponential backoff policy for reconnection.
///
/// The delay before attempt *n* (1-indexed) is `base_delay × 2^(n−1)`,
/// uncapped. Once the attempt counter exceeds `max_attempts`, automatic
/// reconnection stops and the client reports a fatal
/// [`ConnectionLost`](CandorEvent::ConnectionLost).
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Attempt budget before giving up. `0` disables auto-reconnect.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay to wait before attempt `attempt` (1-indexed).
    ///
    /// Saturates instead of overflowing for absurdly large attempt numbers.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the client handle and the connection manager.
///
/// The manager is the only writer of `state` and `reconnect_attempts`; the
/// handle writes `session_id` (synchronously, when the caller joins or
/// leaves a session) and reads everything.
pub(crate) struct SharedState {
    state_tx: watch::Sender<ConnectionState>,
    reconnect_attempts: AtomicU32,
    session_id: StdMutex<Option<String>>,
}

impl SharedState {
    pub(crate) fn new() -> (Arc<Self>, watch::Receiver<ConnectionState>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Closed);
        let shared = Arc::new(Self {
            state_tx,
            reconnect_attempts: AtomicU32::new(0),
            session_id: StdMutex::new(None),
        });
        (shared, state_rx)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(?previous, ?state, "connection state changed");
        }
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Acquire)
    }

    /// Increment the attempt counter and return the new value.
    pub(crate) fn bump_attempts(&self) -> u32 {
        self.reconnect_attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn reset_attempts(&self) {
        self.reconnect_attempts.store(0, Ordering::Release);
    }

    pub(crate) fn session_id(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_session_id(&self, session_id: Option<String>) {
        *self
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = session_id;
    }

    /// Clear and return the current session id.
    pub(crate) fn take_session_id(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

// ── Outbound queue ──────────────────────────────────────────────────

/// FIFO buffer for outbound envelopes while the connection is not open.
///
/// Unbounded: callers are responsible for not flooding it. Drained in
/// arrival order exactly once per transition into the open state. If the
/// transport fails mid-flush, the failed envelope and everything behind it
/// stay queued for the next open.
#[derive(Default)]
pub(crate) struct OutboundQueue {
    items: VecDeque<Envelope<ClientMessage>>,
}

impl OutboundQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append an envelope at the tail. Always succeeds.
    pub(crate) fn enqueue(&mut self, envelope: Envelope<ClientMessage>) {
        self.items.push_back(envelope);
    }

    /// Put an envelope back at the head after a failed direct send, so it
    /// goes out first on the next open.
    pub(crate) fn requeue_front(&mut self, envelope: Envelope<ClientMessage>) {
        self.items.push_front(envelope);
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Send every queued envelope to the transport in original order.
    ///
    /// An envelope is removed from the queue only after the transport
    /// accepted it. Envelopes that fail to serialize are logged and dropped
    /// (a programming bug, not a connectivity problem); a transport error
    /// aborts the flush with everything unsent still queued.
    pub(crate) async fn flush<T: Transport>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), CandorError> {
        while !self.items.is_empty() {
            let json = match self.items.front() {
                Some(envelope) => match serde_json::to_string(envelope) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("failed to serialize queued envelope, dropping it: {e}");
                        self.items.pop_front();
                        continue;
                    }
                },
                None => break,
            };
            transport.send(json).await?;
            self.items.pop_front();
        }
        Ok(())
    }
}

// ── Commands ────────────────────────────────────────────────────────

/// Commands sent from the client handle to the connection manager.
pub(crate) enum Command {
    /// Begin connecting. No-op while connecting or open.
    Connect,
    /// Close the transport and stop reconnecting. Idempotent.
    Disconnect,
    /// Force-close, reset the attempt counter, and connect again.
    Reconnect,
    /// Deliver an envelope: sent directly while open, queued otherwise.
    Send(Envelope<ClientMessage>),
}

/// Next phase for the manager loop.
enum Phase {
    Idle,
    Connect,
    Backoff { delay: Duration },
    Shutdown,
}

/// Outcome of a single connection attempt.
enum Attempt<T> {
    Result(Result<T, CandorError>),
    Aborted,
    Shutdown,
}

// ── Connection manager ──────────────────────────────────────────────

/// Background task owning the transport and its lifecycle.
pub(crate) struct ConnectionManager<C: Connector> {
    connector: C,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    shutdown_rx: oneshot::Receiver<()>,
    events: mpsc::Sender<CandorEvent>,
    router: MessageRouter,
    shared: Arc<SharedState>,
    queue: OutboundQueue,
    policy: ReconnectPolicy,
    heartbeat_interval: Duration,
    credentials: Option<Arc<dyn CredentialProvider>>,
    user_id: Option<String>,
}

impl<C: Connector> ConnectionManager<C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        connector: C,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        shutdown_rx: oneshot::Receiver<()>,
        events: mpsc::Sender<CandorEvent>,
        shared: Arc<SharedState>,
        policy: ReconnectPolicy,
        heartbeat_interval: Duration,
        credentials: Option<Arc<dyn CredentialProvider>>,
        user_id: Option<String>,
    ) -> Self {
        let router = MessageRouter::new(events.clone(), Arc::clone(&shared));
        Self {
            connector,
            cmd_rx,
            shutdown_rx,
            events,
            router,
            shared,
            queue: OutboundQueue::new(),
            policy,
            heartbeat_interval,
            credentials,
            user_id,
        }
    }

    /// Drive the connection until the client shuts down.
    pub(crate) async fn run(mut self) {
        debug!("connection manager started");
        let mut phase = Phase::Idle;
        loop {
            phase = match phase {
                Phase::Idle => self.idle().await,
                Phase::Connect => self.establish().await,
                Phase::Backoff { delay } => self.backoff(delay).await,
                Phase::Shutdown => break,
            };
        }
        self.shared.set_state(ConnectionState::Closed);
        debug!("connection manager exited");
    }

    // ── Idle ────────────────────────────────────────────────────────

    async fn idle(&mut self) -> Phase {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Connect) => return Phase::Connect,
                    Some(Command::Reconnect) => {
                        self.shared.reset_attempts();
                        return Phase::Connect;
                    }
                    Some(Command::Disconnect) => {
                        // Already idle; just pin the state down.
                        self.shared.set_state(ConnectionState::Closed);
                    }
                    Some(Command::Send(envelope)) => self.queue.enqueue(envelope),
                    None => return Phase::Shutdown,
                },
                _ = &mut self.shutdown_rx => return Phase::Shutdown,
            }
        }
    }

    // ── Connecting ──────────────────────────────────────────────────

    async fn establish(&mut self) -> Phase {
        self.shared.set_state(ConnectionState::Connecting);
        let attempt_no = self.shared.attempts() + 1;
        debug!(attempt = attempt_no, "establishing connection");

        let outcome = {
            let connect = self.connector.connect();
            tokio::pin!(connect);
            loop {
                tokio::select! {
                    result = &mut connect => break Attempt::Result(result),
                    cmd = self.cmd_rx.recv() => match cmd {
                        Some(Command::Send(envelope)) => self.queue.enqueue(envelope),
                        Some(Command::Connect) => {} // already connecting
                        Some(Command::Reconnect) => self.shared.reset_attempts(),
                        Some(Command::Disconnect) => break Attempt::Aborted,
                        None => break Attempt::Shutdown,
                    },
                    _ = &mut self.shutdown_rx => break Attempt::Shutdown,
                }
            }
        };

        match outcome {
            Attempt::Result(Ok(transport)) => self.session(transport).await,
            Attempt::Result(Err(e)) => {
                warn!("connection attempt failed: {e}");
                self.failed().await
            }
            Attempt::Aborted => {
                debug!("connection attempt aborted by caller");
                self.shared.set_state(ConnectionState::Closed);
                Phase::Idle
            }
            Attempt::Shutdown => Phase::Shutdown,
        }
    }

    // ── Open ────────────────────────────────────────────────────────

    async fn session(&mut self, mut transport: C::Transport) -> Phase {
        self.shared.set_state(ConnectionState::Open);
        self.shared.reset_attempts();
        info!("connection open");
        self.emit_lossy(CandorEvent::Connected);

        // One-time credential envelope, ahead of any queued application
        // messages.
        if let Some(token) = self.credentials.as_ref().and_then(|p| p.credential()) {
            let envelope = self.envelope(ClientMessage::Auth { token });
            match send_envelope(&mut transport, &envelope).await {
                Ok(()) | Err(SendFailure::Serialization) => {}
                Err(SendFailure::Transport(e)) => {
                    return self.lost(format!("auth send failed: {e}")).await;
                }
            }
        } else {
            debug!("no credential available, skipping auth envelope");
        }

        // Drain everything buffered while we were away, oldest first.
        if !self.queue.is_empty() {
            debug!(queued = self.queue.len(), "flushing outbound queue");
            if let Err(e) = self.queue.flush(&mut transport).await {
                return self.lost(format!("flush failed: {e}")).await;
            }
        }

        // First heartbeat one full interval after open.
        let mut heartbeat =
            time::interval_at(Instant::now() + self.heartbeat_interval, self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Send(envelope)) => {
                        match send_envelope(&mut transport, &envelope).await {
                            Ok(()) | Err(SendFailure::Serialization) => {}
                            Err(SendFailure::Transport(e)) => {
                                // Not accepted by the transport: keep it for
                                // the next open.
                                self.queue.requeue_front(envelope);
                                return self.lost(format!("transport send error: {e}")).await;
                            }
                        }
                    }
                    Some(Command::Disconnect) => {
                        self.shared.set_state(ConnectionState::Closing);
                        if let Err(e) = transport.close().await {
                            debug!("error closing transport: {e}");
                        }
                        self.shared.set_state(ConnectionState::Closed);
                        self.emit_disconnected(Some("disconnected by caller".into())).await;
                        return Phase::Idle;
                    }
                    Some(Command::Reconnect) => {
                        let _ = transport.close().await;
                        self.shared.reset_attempts();
                        self.emit_disconnected(Some("reconnect requested".into())).await;
                        return Phase::Connect;
                    }
                    Some(Command::Connect) => {} // already open
                    None => {
                        let _ = transport.close().await;
                        self.shared.set_state(ConnectionState::Closed);
                        self.emit_disconnected(Some("client shut down".into())).await;
                        return Phase::Shutdown;
                    }
                },

                _ = heartbeat.tick() => {
                    let envelope = self.envelope(ClientMessage::Heartbeat {});
                    match send_envelope(&mut transport, &envelope).await {
                        Ok(()) | Err(SendFailure::Serialization) => {}
                        Err(SendFailure::Transport(e)) => {
                            // Heartbeats are not application intent; no requeue.
                            return self.lost(format!("heartbeat send failed: {e}")).await;
                        }
                    }
                }

                incoming = transport.recv() => match incoming {
                    Some(Ok(text)) => self.router.dispatch(&text),
                    Some(Err(e)) => {
                        return self.lost(format!("transport receive error: {e}")).await;
                    }
                    None => {
                        return self.lost("connection closed by server".into()).await;
                    }
                },

                _ = &mut self.shutdown_rx => {
                    self.shared.set_state(ConnectionState::Closing);
                    let _ = transport.close().await;
                    self.shared.set_state(ConnectionState::Closed);
                    self.emit_disconnected(Some("client shut down".into())).await;
                    return Phase::Shutdown;
                }
            }
        }
    }

    // ── Failure handling ────────────────────────────────────────────

    /// The transport dropped out from under an open connection.
    async fn lost(&mut self, reason: String) -> Phase {
        warn!(%reason, "connection lost");
        self.emit_disconnected(Some(reason)).await;
        self.failed().await
    }

    /// Account for a failed attempt or abnormal close and decide whether to
    /// back off or give up.
    async fn failed(&mut self) -> Phase {
        self.shared.set_state(ConnectionState::Error);
        let attempt = self.shared.bump_attempts();
        if attempt > self.policy.max_attempts {
            warn!(
                attempts = self.policy.max_attempts,
                "reconnect attempts exhausted, giving up"
            );
            self.emit_reliable(CandorEvent::ConnectionLost {
                attempts: self.policy.max_attempts,
            })
            .await;
            Phase::Idle
        } else {
            let delay = self.policy.delay_for_attempt(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
            Phase::Backoff { delay }
        }
    }

    // ── Backoff ─────────────────────────────────────────────────────

    async fn backoff(&mut self, delay: Duration) -> Phase {
        let timer = time::sleep(delay);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                _ = &mut timer => return Phase::Connect,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Send(envelope)) => self.queue.enqueue(envelope),
                    Some(Command::Connect) => return Phase::Connect, // skip the wait
                    Some(Command::Reconnect) => {
                        self.shared.reset_attempts();
                        return Phase::Connect;
                    }
                    Some(Command::Disconnect) => {
                        // Cancels the pending retry.
                        self.shared.set_state(ConnectionState::Closed);
                        return Phase::Idle;
                    }
                    None => return Phase::Shutdown,
                },
                _ = &mut self.shutdown_rx => return Phase::Shutdown,
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn envelope(&self, message: ClientMessage) -> Envelope<ClientMessage> {
        let mut envelope = Envelope::new(message);
        envelope.user_id = self.user_id.clone();
        envelope
    }

    /// Emit an event, dropping it if the consumer is not keeping up.
    fn emit_lossy(&self, event: CandorEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!("event channel full, dropping event: {dropped:?}");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }

    /// Emit an event that must not be dropped, waiting for channel space.
    async fn emit_reliable(&self, event: CandorEvent) {
        if self.events.send(event).await.is_err() {
            debug!("event channel closed, receiver dropped");
        }
    }

    async fn emit_disconnected(&self, reason: Option<String>) {
        self.emit_reliable(CandorEvent::Disconnected { reason }).await;
    }
}

// ── Send helper ─────────────────────────────────────────────────────

/// How a direct send failed.
enum SendFailure {
    /// The envelope could not be serialized; logged and skipped, the
    /// connection stays up.
    Serialization,
    /// The transport rejected the message; the connection is gone.
    Transport(CandorError),
}

async fn send_envelope<T: Transport>(
    transport: &mut T,
    envelope: &Envelope<ClientMessage>,
) -> Result<(), SendFailure> {
    let json = match serde_json::to_string(envelope) {
        Ok(json) => json,
        Err(e) => {
            error!("failed to serialize outbound envelope: {e}");
            return Err(SendFailure::Serialization);
        }
    };
    transport
        .send(json)
        .await
        .map_err(SendFailure::Transport)
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    // ── ReconnectPolicy ─────────────────────────────────────────────

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(1000),
            max_attempts: 5,
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(8000));
    }

    #[test]
    fn backoff_scales_with_base_delay() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(250),
            max_attempts: 3,
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(1000));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_secs(1),
            max_attempts: u32::MAX,
        };
        // Far past any practical attempt count; must not panic.
        let delay = policy.delay_for_attempt(500);
        assert!(delay >= policy.delay_for_attempt(499));
    }

    #[test]
    fn backoff_attempt_zero_is_treated_as_first() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(100),
            max_attempts: 3,
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
    }

    // ── ConnectionState ─────────────────────────────────────────────

    #[test]
    fn state_predicates() {
        assert!(ConnectionState::Open.is_open());
        assert!(!ConnectionState::Closed.is_open());
        assert!(ConnectionState::Connecting.is_connecting());
        assert!(!ConnectionState::Open.is_connecting());
    }

    // ── SharedState ─────────────────────────────────────────────────

    #[test]
    fn attempt_counter_bumps_and_resets() {
        let (shared, _rx) = SharedState::new();
        assert_eq!(shared.attempts(), 0);
        assert_eq!(shared.bump_attempts(), 1);
        assert_eq!(shared.bump_attempts(), 2);
        shared.reset_attempts();
        assert_eq!(shared.attempts(), 0);
    }

    #[test]
    fn session_id_set_and_take() {
        let (shared, _rx) = SharedState::new();
        assert!(shared.session_id().is_none());
        shared.set_session_id(Some("S1".into()));
        assert_eq!(shared.session_id().as_deref(), Some("S1"));
        assert_eq!(shared.take_session_id().as_deref(), Some("S1"));
        assert!(shared.session_id().is_none());
    }

    #[test]
    fn state_watch_publishes_transitions() {
        let (shared, rx) = SharedState::new();
        assert_eq!(*rx.borrow(), ConnectionState::Closed);
        shared.set_state(ConnectionState::Connecting);
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);
        shared.set_state(ConnectionState::Open);
        assert!(rx.borrow().is_open());
    }

    // ── OutboundQueue ───────────────────────────────────────────────

    /// Transport that records sends and can be scripted to fail after a
    /// number of accepted messages.
    struct RecordingTransport {
        accepted: Vec<String>,
        fail_after: Option<usize>,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                accepted: Vec::new(),
                fail_after: None,
            }
        }

        fn failing_after(n: usize) -> Self {
            Self {
                accepted: Vec::new(),
                fail_after: Some(n),
            }
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&mut self, message: String) -> Result<(), CandorError> {
            if let Some(limit) = self.fail_after {
                if self.accepted.len() >= limit {
                    return Err(CandorError::TransportSend("wire down".into()));
                }
            }
            self.accepted.push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String, CandorError>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), CandorError> {
            Ok(())
        }
    }

    fn answer(text: &str) -> Envelope<ClientMessage> {
        Envelope::new(ClientMessage::CandidateAnswer {
            answer: text.into(),
        })
    }

    #[tokio::test]
    async fn flush_preserves_enqueue_order() {
        let mut queue = OutboundQueue::new();
        queue.enqueue(answer("one"));
        queue.enqueue(answer("two"));
        queue.enqueue(answer("three"));

        let mut transport = RecordingTransport::new();
        queue.flush(&mut transport).await.unwrap();

        assert!(queue.is_empty());
        assert_eq!(transport.accepted.len(), 3);
        assert!(transport.accepted[0].contains("one"));
        assert!(transport.accepted[1].contains("two"));
        assert!(transport.accepted[2].contains("three"));
    }

    #[tokio::test]
    async fn flush_retains_unsent_on_transport_failure() {
        let mut queue = OutboundQueue::new();
        queue.enqueue(answer("one"));
        queue.enqueue(answer("two"));
        queue.enqueue(answer("three"));

        let mut transport = RecordingTransport::failing_after(1);
        let result = queue.flush(&mut transport).await;

        assert!(result.is_err());
        assert_eq!(transport.accepted.len(), 1);
        assert!(transport.accepted[0].contains("one"));
        // The failed envelope and everything behind it are still queued.
        assert_eq!(queue.len(), 2);

        // A later flush delivers the remainder in order.
        let mut transport = RecordingTransport::new();
        queue.flush(&mut transport).await.unwrap();
        assert!(queue.is_empty());
        assert!(transport.accepted[0].contains("two"));
        assert!(transport.accepted[1].contains("three"));
    }

    #[tokio::test]
    async fn requeue_front_goes_out_first() {
        let mut queue = OutboundQueue::new();
        queue.enqueue(answer("second"));
        queue.requeue_front(answer("first"));

        let mut transport = RecordingTransport::new();
        queue.flush(&mut transport).await.unwrap();
        assert!(transport.accepted[0].contains("first"));
        assert!(transport.accepted[1].contains("second"));
    }
}
