//! # Candor Session Client
//!
//! Transport-agnostic Rust client for the Candor real-time interview
//! session protocol.
//!
//! The crate maintains a single persistent bidirectional connection to a
//! session server, survives transient disconnects without losing
//! application intent, and fans inbound typed events into the application
//! while fanning outbound intents onto the wire.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] and [`Connector`]
//!   traits for any backend
//! - **Self-healing** — exponential-backoff reconnection with a bounded
//!   attempt budget; outbound envelopes are buffered in order across
//!   outages and flushed on reconnect
//! - **Heartbeat liveness** — a periodic `heartbeat` envelope while the
//!   connection is open
//! - **Event-driven** — inbound envelopes arrive as typed [`CandorEvent`]s
//!   on a channel
//! - **WebSocket built-in** — the default `transport-websocket` feature
//!   provides [`WebSocketTransport`] and [`WebSocketConnector`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), candor_session_client::CandorError> {
//! use candor_session_client::{
//!     CandorClient, CandorConfig, CandorEvent, StaticCredential, WebSocketConnector,
//! };
//!
//! let connector = WebSocketConnector::new("wss://sync.candorhq.dev/ws");
//! let config = CandorConfig::new()
//!     .with_credentials(StaticCredential::new("issued-token"));
//!
//! let (client, mut events) = CandorClient::start(connector, config);
//! client.connect()?;
//! client.join_session("sess_123")?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         CandorEvent::TranscriptAppended { speaker, text, .. } => {
//!             println!("{speaker}: {text}");
//!         }
//!         CandorEvent::ConnectionLost { .. } => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod event;
pub mod protocol;
pub mod transport;
pub mod transports;

mod router;

// Re-export primary types for ergonomic imports.
pub use auth::{CredentialProvider, StaticCredential};
pub use client::{CandorClient, CandorConfig};
pub use connection::{ConnectionState, ReconnectPolicy};
pub use error::CandorError;
pub use event::{CandorEvent, NotificationKind};
pub use protocol::{ClientMessage, Envelope, ServerMessage};
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
