//! Transport abstraction for the Candor session protocol.
//!
//! The [`Transport`] trait defines a bidirectional text message channel
//! between client and server. The session protocol uses JSON text messages,
//! so every transport implementation must handle message framing internally
//! (e.g., WebSocket frames, length-prefixed TCP, QUIC streams).
//!
//! Because the client reconnects automatically, it cannot be handed a single
//! connected transport — it needs to create a fresh one per attempt. The
//! [`Connector`] trait is that factory: `connect()` is called once for every
//! connection attempt, including backoff retries.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use candor_session_client::error::CandorError;
//! use candor_session_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), CandorError> {
//!         // Send the JSON text message over your transport
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, CandorError>> {
//!         // Receive the next JSON text message
//!         // Return None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), CandorError> {
//!         // Gracefully shut down the connection
//!         todo!()
//!     }
//! }
//!
//! struct MyConnector { /* endpoint, TLS config, ... */ }
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     async fn connect(&mut self) -> Result<MyTransport, CandorError> {
//!         // Establish a fresh connection
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::CandorError;

/// A bidirectional text message transport for the Candor session protocol.
///
/// Implementors shuttle serialized JSON strings between client and server.
/// Each call to [`send`](Transport::send) transmits one complete JSON
/// message; each call to [`recv`](Transport::recv) returns one.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it
/// is polled inside `tokio::select!`. If `recv` is cancelled before
/// completion, calling it again must not lose data. Channel-based
/// implementations (e.g., wrapping `mpsc::Receiver`) are naturally
/// cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`CandorError::TransportSend`] if the message could not be
    /// sent (e.g., connection broken, write buffer full).
    async fn send(&mut self, message: String) -> Result<(), CandorError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` — a complete message was received
    /// - `Some(Err(e))` — a transport error occurred
    /// - `None` — the connection was closed cleanly by the server
    ///
    /// # Cancel Safety
    ///
    /// This method **MUST** be cancel-safe (see [trait documentation](Transport)).
    async fn recv(&mut self) -> Option<Result<String, CandorError>>;

    /// Close the transport connection gracefully.
    ///
    /// After calling this method, subsequent calls to [`send`](Transport::send)
    /// and [`recv`](Transport::recv) may return errors or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations
    /// should still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), CandorError>;
}

/// Factory for [`Transport`] instances, called once per connection attempt.
///
/// Connection parameters (URLs, host:port pairs, TLS configuration) differ
/// per transport, so they live in the connector, not in the client
/// configuration. Exactly one transport produced by a connector is live at
/// any time — the connection manager drops the old one before asking for the
/// next.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport type this connector produces.
    type Transport: Transport;

    /// Establish a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns any [`CandorError`] describing why the connection could not
    /// be established. The connection manager treats a failure here as a
    /// failed attempt and applies the reconnect backoff policy.
    async fn connect(&mut self) -> Result<Self::Transport, CandorError>;
}
