//! Async client for the Candor session protocol.
//!
//! [`CandorClient`] is a thin handle that communicates with a background
//! connection manager task via an unbounded MPSC channel. Domain events are
//! emitted on a bounded channel returned from [`CandorClient::start`].
//!
//! The client is an ordinary value — construct as many independent
//! instances as you need and pass them around explicitly; there is no
//! process-wide singleton.
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new("wss://sync.candorhq.dev/ws");
//! let config = CandorConfig::new()
//!     .with_credentials(StaticCredential::new(token));
//! let (client, mut events) = CandorClient::start(connector, config);
//!
//! client.connect()?;
//! client.join_session("sess_123")?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         CandorEvent::TranscriptAppended { speaker, text, .. } => { /* … */ }
//!         CandorEvent::ConnectionLost { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::auth::CredentialProvider;
use crate::connection::{Command, ConnectionManager, ConnectionState, ReconnectPolicy, SharedState};
use crate::error::{CandorError, Result};
use crate::event::CandorEvent;
use crate::protocol::{ClientMessage, Envelope};
use crate::transport::Connector;

/// Default delay before the first reconnect attempt.
const DEFAULT_BASE_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Default reconnect attempt budget.
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Default heartbeat cadence.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`CandorClient`].
///
/// Every field has a sensible default; construct with [`CandorConfig::new`]
/// and override what you need.
///
/// # Example
///
/// ```
/// use candor_session_client::client::CandorConfig;
/// use std::time::Duration;
///
/// let config = CandorConfig::new()
///     .with_base_reconnect_delay(Duration::from_millis(500))
///     .with_max_reconnect_attempts(5)
///     .with_heartbeat_interval(Duration::from_secs(20));
/// assert_eq!(config.max_reconnect_attempts, 5);
/// ```
#[derive(Clone)]
pub struct CandorConfig {
    /// Delay before the first reconnect attempt; attempt *n* waits
    /// `base_reconnect_delay × 2^(n−1)`.
    pub base_reconnect_delay: Duration,
    /// How many consecutive failed attempts before auto-reconnect gives up
    /// and a [`ConnectionLost`](CandorEvent::ConnectionLost) is reported.
    pub max_reconnect_attempts: u32,
    /// Cadence of the heartbeat envelope while the connection is open.
    pub heartbeat_interval: Duration,
    /// Identity stamped on outbound envelopes as `userId`, when known.
    pub user_id: Option<String>,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up with incoming events, ordinary
    /// events are dropped (with a warning logged) to avoid blocking the
    /// connection manager. `Disconnected` and `ConnectionLost` are always
    /// delivered regardless of capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`CandorClient::shutdown`] is called, the connection manager is
    /// given this much time to close the transport; after that the task is
    /// aborted.
    pub shutdown_timeout: Duration,
    /// Source of the credential for the one-time auth envelope. When absent,
    /// the auth step is skipped silently on every open.
    pub credentials: Option<Arc<dyn CredentialProvider>>,
}

impl CandorConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            base_reconnect_delay: DEFAULT_BASE_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            user_id: None,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            credentials: None,
        }
    }

    /// Set the base reconnect delay.
    #[must_use]
    pub fn with_base_reconnect_delay(mut self, delay: Duration) -> Self {
        self.base_reconnect_delay = delay;
        self
    }

    /// Set the reconnect attempt budget. `0` disables auto-reconnect.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the heartbeat cadence. Values below 1ms are clamped to 1ms.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the user identity stamped on outbound envelopes.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the credential provider for the auth envelope.
    #[must_use]
    pub fn with_credentials(mut self, provider: impl CredentialProvider) -> Self {
        self.credentials = Some(Arc::new(provider));
        self
    }
}

impl Default for CandorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CandorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandorConfig")
            .field("base_reconnect_delay", &self.base_reconnect_delay)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("user_id", &self.user_id)
            .field("event_channel_capacity", &self.event_channel_capacity)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("has_credentials", &self.credentials.is_some())
            .finish()
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to a running Candor session client.
///
/// Created via [`CandorClient::start`], which spawns the background
/// connection manager and returns this handle together with the event
/// receiver.
///
/// All operations are fire-and-forget: they hand an envelope (or a
/// lifecycle command) to the manager and return once it is queued. While the
/// connection is not open, envelopes are buffered and flushed in order on
/// the next open — sending never fails for connectivity reasons. The only
/// error any operation returns is [`CandorError::ClientClosed`], after the
/// client has been shut down.
pub struct CandorClient {
    /// Sender half of the command channel to the connection manager.
    cmd_tx: mpsc::UnboundedSender<Command>,
    /// Connection state published by the manager.
    state_rx: watch::Receiver<ConnectionState>,
    /// State shared with the manager (session id, attempt counter).
    shared: Arc<SharedState>,
    /// Handle to the background manager task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot used to ask the manager to shut down gracefully.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
    /// Identity stamped on outbound envelopes.
    user_id: Option<String>,
}

impl CandorClient {
    /// Spawn the connection manager and return a handle plus event receiver.
    ///
    /// The client starts in the [`Closed`](ConnectionState::Closed) state;
    /// call [`connect`](CandorClient::connect) to establish the connection.
    /// Envelopes queued before the first open are delivered in order once
    /// the connection is up.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        connector: impl Connector,
        config: CandorConfig,
    ) -> (Self, mpsc::Receiver<CandorEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<CandorEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let (shared, state_rx) = SharedState::new();

        let policy = ReconnectPolicy {
            base_delay: config.base_reconnect_delay,
            max_attempts: config.max_reconnect_attempts,
        };
        let manager = ConnectionManager::new(
            connector,
            cmd_rx,
            shutdown_rx,
            event_tx,
            Arc::clone(&shared),
            policy,
            config.heartbeat_interval.max(Duration::from_millis(1)),
            config.credentials,
            config.user_id.clone(),
        );
        let task = tokio::spawn(manager.run());

        let client = Self {
            cmd_tx,
            state_rx,
            shared,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
            user_id: config.user_id,
        };

        (client, event_rx)
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Begin connecting. No-op while already connecting or open.
    ///
    /// # Errors
    ///
    /// Returns [`CandorError::ClientClosed`] if the client was shut down.
    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect)
    }

    /// Close the connection and stop reconnecting. Idempotent and safe from
    /// any state; cancels any pending reconnect timer.
    ///
    /// # Errors
    ///
    /// Returns [`CandorError::ClientClosed`] if the client was shut down.
    pub fn disconnect(&self) -> Result<()> {
        self.command(Command::Disconnect)
    }

    /// Force-close the current transport (if any), reset the reconnect
    /// attempt counter, and connect again. This is the resume path after
    /// [`ConnectionLost`](CandorEvent::ConnectionLost).
    ///
    /// # Errors
    ///
    /// Returns [`CandorError::ClientClosed`] if the client was shut down.
    pub fn reconnect(&self) -> Result<()> {
        self.command(Command::Reconnect)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Returns `true` if the transport is live.
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// The session this client has joined, if any.
    pub fn current_session_id(&self) -> Option<String> {
        self.shared.session_id()
    }

    // ── Session operations ──────────────────────────────────────────

    /// Join an interview session. The session id becomes the correlation
    /// key stamped on subsequent outbound envelopes and the scope filter
    /// for inbound session-state events.
    ///
    /// # Errors
    ///
    /// Returns [`CandorError::ClientClosed`] if the client was shut down.
    pub fn join_session(&self, session_id: impl Into<String>) -> Result<()> {
        let session_id = session_id.into();
        self.shared.set_session_id(Some(session_id));
        self.dispatch(ClientMessage::JoinSession {})
    }

    /// Leave the current session.
    ///
    /// # Errors
    ///
    /// Returns [`CandorError::ClientClosed`] if the client was shut down.
    pub fn leave_session(&self) -> Result<()> {
        let session_id = self.shared.take_session_id();
        let mut envelope = Envelope::new(ClientMessage::LeaveSession {});
        envelope.session_id = session_id;
        envelope.user_id = self.user_id.clone();
        self.command(Command::Send(envelope))
    }

    /// Submit a candidate's answer.
    ///
    /// # Errors
    ///
    /// Returns [`CandorError::ClientClosed`] if the client was shut down.
    pub fn send_answer(&self, answer: impl Into<String>) -> Result<()> {
        self.dispatch(ClientMessage::CandidateAnswer {
            answer: answer.into(),
        })
    }

    /// Ask the avatar renderer to play an animation.
    ///
    /// # Errors
    ///
    /// Returns [`CandorError::ClientClosed`] if the client was shut down.
    pub fn request_animation(
        &self,
        animation: impl Into<String>,
        parameters: Option<serde_json::Value>,
    ) -> Result<()> {
        self.dispatch(ClientMessage::AvatarAnimation {
            animation: animation.into(),
            parameters,
        })
    }

    /// Set the avatar's facial expression.
    ///
    /// # Errors
    ///
    /// Returns [`CandorError::ClientClosed`] if the client was shut down.
    pub fn set_expression(&self, expression: impl Into<String>) -> Result<()> {
        self.dispatch(ClientMessage::AvatarExpression {
            expression: expression.into(),
        })
    }

    /// Start the interview.
    ///
    /// # Errors
    ///
    /// Returns [`CandorError::ClientClosed`] if the client was shut down.
    pub fn start_session(&self) -> Result<()> {
        self.dispatch(ClientMessage::StartInterview {})
    }

    /// End the interview.
    ///
    /// # Errors
    ///
    /// Returns [`CandorError::ClientClosed`] if the client was shut down.
    pub fn end_session(&self) -> Result<()> {
        self.dispatch(ClientMessage::EndInterview {})
    }

    // ── Shutdown ────────────────────────────────────────────────────

    /// Shut down the client, closing the transport and stopping the
    /// background task.
    ///
    /// After this method returns, the event receiver yields `None` once
    /// drained and every operation returns
    /// [`CandorError::ClientClosed`].
    pub async fn shutdown(&mut self) {
        debug!("CandorClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the manager with a timeout. If it doesn't exit in time,
        // abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("connection manager terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("connection manager did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("connection manager aborted: {join_err}");
                    }
                }
            }
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Build an envelope stamped with the current session and user identity
    /// and hand it to the manager.
    fn dispatch(&self, message: ClientMessage) -> Result<()> {
        let mut envelope = Envelope::new(message);
        envelope.session_id = self.shared.session_id();
        envelope.user_id = self.user_id.clone();
        self.command(Command::Send(envelope))
    }

    fn command(&self, command: Command) -> Result<()> {
        self.cmd_tx
            .send(command)
            .map_err(|_| CandorError::ClientClosed)
    }
}

impl std::fmt::Debug for CandorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandorClient")
            .field("state", &self.state())
            .field("session_id", &self.current_session_id())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for CandorClient {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown.
        // The only safe action is to abort the spawned task, which drops
        // the manager future (and with it the transport) immediately. The
        // `shutdown_tx` oneshot is intentionally *not* sent here: it would
        // trigger a graceful path that awaits `transport.close()`, and
        // there is no executor context to drive it inside `Drop`.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
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
    use crate::auth::StaticCredential;
    use crate::transport::Transport;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport & connector ──────────────────────────────────

    /// A mock transport that records sent messages and replays scripted
    /// responses, hanging once the script runs out.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, CandorError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), CandorError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, CandorError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                // Script exhausted — hang so the connection stays open.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), CandorError> {
            Ok(())
        }
    }

    /// Connector scripted with the incoming messages of each successive
    /// connection; attempts beyond the script are refused.
    struct MockConnector {
        scripts: VecDeque<Vec<Option<std::result::Result<String, CandorError>>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        connects: Arc<StdMutex<u32>>,
    }

    impl MockConnector {
        #[allow(clippy::type_complexity)]
        fn new(
            scripts: Vec<Vec<Option<std::result::Result<String, CandorError>>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<StdMutex<u32>>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let connects = Arc::new(StdMutex::new(0));
            let connector = Self {
                scripts: VecDeque::from(scripts),
                sent: Arc::clone(&sent),
                connects: Arc::clone(&connects),
            };
            (connector, sent, connects)
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Transport = MockTransport;

        async fn connect(&mut self) -> std::result::Result<MockTransport, CandorError> {
            *self.connects.lock().unwrap() += 1;
            match self.scripts.pop_front() {
                Some(incoming) => Ok(MockTransport {
                    incoming: VecDeque::from(incoming),
                    sent: Arc::clone(&self.sent),
                }),
                None => Err(CandorError::TransportSend("connection refused".into())),
            }
        }
    }

    fn open_forever() -> Vec<Vec<Option<std::result::Result<String, CandorError>>>> {
        vec![vec![]]
    }

    fn wire_type(json: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        value["type"].as_str().unwrap_or_default().to_string()
    }

    // ── Config ──────────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = CandorConfig::new();
        assert_eq!(config.base_reconnect_delay, Duration::from_millis(1000));
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert!(config.user_id.is_none());
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert!(config.credentials.is_none());
    }

    #[test]
    fn config_builder_methods() {
        let config = CandorConfig::new()
            .with_base_reconnect_delay(Duration::from_millis(200))
            .with_max_reconnect_attempts(3)
            .with_heartbeat_interval(Duration::from_secs(10))
            .with_user_id("user_1")
            .with_event_channel_capacity(512)
            .with_shutdown_timeout(Duration::from_secs(5))
            .with_credentials(StaticCredential::new("tok"));
        assert_eq!(config.base_reconnect_delay, Duration::from_millis(200));
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.user_id.as_deref(), Some("user_1"));
        assert_eq!(config.event_channel_capacity, 512);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(config.credentials.is_some());
    }

    #[test]
    fn config_clamps_degenerate_values() {
        let config = CandorConfig::new()
            .with_event_channel_capacity(0)
            .with_heartbeat_interval(Duration::ZERO);
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.heartbeat_interval, Duration::from_millis(1));
    }

    #[test]
    fn config_debug_does_not_leak_credentials() {
        let config = CandorConfig::new().with_credentials(StaticCredential::new("sekrit"));
        let printed = format!("{config:?}");
        assert!(!printed.contains("sekrit"));
        assert!(printed.contains("has_credentials: true"));
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    #[tokio::test]
    async fn start_does_not_connect_automatically() {
        let (connector, _sent, connects) = MockConnector::new(open_forever());
        let (mut client, _events) = CandorClient::start(connector, CandorConfig::new());

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(client.state(), ConnectionState::Closed);
        assert_eq!(*connects.lock().unwrap(), 0);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn connect_opens_and_emits_connected() {
        let (connector, _sent, connects) = MockConnector::new(open_forever());
        let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

        client.connect().unwrap();
        let event = events.recv().await.unwrap();
        assert!(matches!(event, CandorEvent::Connected));
        assert!(client.is_open());
        assert_eq!(*connects.lock().unwrap(), 1);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn connect_while_open_is_noop() {
        let (connector, _sent, connects) = MockConnector::new(open_forever());
        let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

        client.connect().unwrap();
        let _ = events.recv().await; // Connected
        client.connect().unwrap();
        client.connect().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*connects.lock().unwrap(), 1);
        assert!(client.is_open());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn messages_queued_while_closed_flush_in_order_on_open() {
        let (connector, sent, _connects) = MockConnector::new(open_forever());
        let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

        client.send_answer("first").unwrap();
        client.send_answer("second").unwrap();
        assert_eq!(client.state(), ConnectionState::Closed);

        client.connect().unwrap();
        let _ = events.recv().await; // Connected
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            assert_eq!(messages.len(), 2);
            assert!(messages[0].contains("first"));
            assert!(messages[1].contains("second"));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn auth_envelope_is_sent_first_when_credential_available() {
        let (connector, sent, _connects) = MockConnector::new(open_forever());
        let config = CandorConfig::new().with_credentials(StaticCredential::new("tok_123"));
        let (mut client, mut events) = CandorClient::start(connector, config);

        client.send_answer("queued before open").unwrap();
        client.connect().unwrap();
        let _ = events.recv().await; // Connected
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            assert!(messages.len() >= 2);
            assert_eq!(wire_type(&messages[0]), "auth");
            assert!(messages[0].contains("tok_123"));
            assert_eq!(wire_type(&messages[1]), "candidate_answer");
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn auth_is_skipped_without_credential() {
        let (connector, sent, _connects) = MockConnector::new(open_forever());
        let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

        client.connect().unwrap();
        let _ = events.recv().await; // Connected
        client.send_answer("x").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            assert_eq!(messages.len(), 1);
            assert_eq!(wire_type(&messages[0]), "candidate_answer");
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn credential_provider_closure_is_queried_per_open() {
        let (connector, sent, _connects) = MockConnector::new(open_forever());
        let config = CandorConfig::new().with_credentials(|| Some("closure_tok".to_string()));
        let (mut client, mut events) = CandorClient::start(connector, config);

        client.connect().unwrap();
        let _ = events.recv().await; // Connected
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(wire_type(&sent.lock().unwrap()[0]), "auth");

        client.shutdown().await;
    }

    // ── Facade operations ───────────────────────────────────────────

    #[tokio::test]
    async fn join_session_stamps_envelope_and_tracks_session() {
        let (connector, sent, _connects) = MockConnector::new(open_forever());
        let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

        client.connect().unwrap();
        let _ = events.recv().await; // Connected
        client.join_session("sess_42").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(client.current_session_id().as_deref(), Some("sess_42"));
        {
            let messages = sent.lock().unwrap();
            let value: serde_json::Value = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(value["type"], "join_session");
            assert_eq!(value["sessionId"], "sess_42");
            assert!(value["timestamp"].is_string());
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn leave_session_clears_session_and_keeps_correlation() {
        let (connector, sent, _connects) = MockConnector::new(open_forever());
        let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

        client.connect().unwrap();
        let _ = events.recv().await; // Connected
        client.join_session("sess_42").unwrap();
        client.leave_session().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(client.current_session_id().is_none());
        {
            let messages = sent.lock().unwrap();
            let value: serde_json::Value = serde_json::from_str(&messages[1]).unwrap();
            assert_eq!(value["type"], "leave_session");
            // The departing envelope still names the session it leaves.
            assert_eq!(value["sessionId"], "sess_42");
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn facade_operations_produce_expected_wire_types() {
        let (connector, sent, _connects) = MockConnector::new(open_forever());
        let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

        client.connect().unwrap();
        let _ = events.recv().await; // Connected

        client.start_session().unwrap();
        client.send_answer("42").unwrap();
        client
            .request_animation("wave", Some(serde_json::json!({ "speed": 2 })))
            .unwrap();
        client.set_expression("smile").unwrap();
        client.end_session().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let types: Vec<String> = messages.iter().map(|m| wire_type(m)).collect();
            assert_eq!(
                types,
                vec![
                    "start_interview",
                    "candidate_answer",
                    "avatar_animation",
                    "avatar_expression",
                    "end_interview",
                ]
            );
            assert!(messages[2].contains("\"speed\":2"));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn user_id_is_stamped_on_outbound_envelopes() {
        let (connector, sent, _connects) = MockConnector::new(open_forever());
        let config = CandorConfig::new().with_user_id("user_7");
        let (mut client, mut events) = CandorClient::start(connector, config);

        client.connect().unwrap();
        let _ = events.recv().await; // Connected
        client.send_answer("x").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let value: serde_json::Value = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(value["userId"], "user_7");
        }

        client.shutdown().await;
    }

    // ── Shutdown & teardown ─────────────────────────────────────────

    #[tokio::test]
    async fn disconnect_results_in_closed() {
        let (connector, _sent, _connects) = MockConnector::new(open_forever());
        let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

        client.connect().unwrap();
        let _ = events.recv().await; // Connected
        client.disconnect().unwrap();

        let event = events.recv().await.unwrap();
        assert!(matches!(event, CandorEvent::Disconnected { .. }));
        assert_eq!(client.state(), ConnectionState::Closed);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn disconnect_while_closed_is_idempotent() {
        let (connector, _sent, connects) = MockConnector::new(open_forever());
        let (mut client, _events) = CandorClient::start(connector, CandorConfig::new());

        client.disconnect().unwrap();
        client.disconnect().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(client.state(), ConnectionState::Closed);
        assert_eq!(*connects.lock().unwrap(), 0);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn operations_fail_with_client_closed_after_shutdown() {
        let (connector, _sent, _connects) = MockConnector::new(open_forever());
        let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

        client.connect().unwrap();
        let _ = events.recv().await; // Connected
        client.shutdown().await;

        assert!(matches!(
            client.send_answer("late"),
            Err(CandorError::ClientClosed)
        ));
        assert!(matches!(client.connect(), Err(CandorError::ClientClosed)));
    }

    #[tokio::test]
    async fn shutdown_emits_disconnected_while_open() {
        let (connector, _sent, _connects) = MockConnector::new(open_forever());
        let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

        client.connect().unwrap();
        let _ = events.recv().await; // Connected
        client.shutdown().await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event, CandorEvent::Disconnected { .. }));
        if let CandorEvent::Disconnected { reason } = event {
            assert_eq!(reason.as_deref(), Some("client shut down"));
        }
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (connector, _sent, _connects) = MockConnector::new(open_forever());
        let (mut client, mut events) = CandorClient::start(connector, CandorConfig::new());

        client.connect().unwrap();
        let _ = events.recv().await; // Connected
        client.shutdown().await;
        client.shutdown().await; // should not panic
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown_does_not_hang() {
        let (connector, _sent, _connects) = MockConnector::new(open_forever());
        let (client, mut events) = CandorClient::start(connector, CandorConfig::new());

        client.connect().unwrap();
        let _ = events.recv().await; // Connected

        drop(client);

        // The manager task is aborted; the event channel closes.
        while events.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (connector, _sent, _connects) = MockConnector::new(open_forever());
        let (mut client, _events) = CandorClient::start(connector, CandorConfig::new());

        let printed = format!("{client:?}");
        assert!(printed.contains("CandorClient"));
        assert!(printed.contains("state"));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn independent_clients_do_not_share_state() {
        let (connector_a, _sent_a, _connects_a) = MockConnector::new(open_forever());
        let (connector_b, _sent_b, connects_b) = MockConnector::new(open_forever());
        let (mut a, mut events_a) = CandorClient::start(connector_a, CandorConfig::new());
        let (mut b, _events_b) = CandorClient::start(connector_b, CandorConfig::new());

        a.connect().unwrap();
        let _ = events_a.recv().await; // Connected
        a.join_session("only-a").unwrap();

        assert!(a.is_open());
        assert!(!b.is_open());
        assert!(b.current_session_id().is_none());
        assert_eq!(*connects_b.lock().unwrap(), 0);

        a.shutdown().await;
        b.shutdown().await;
    }
}
