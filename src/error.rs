//! Error types for the Candor session client.

use thiserror::Error;

/// Errors that can occur when using the Candor session client.
#[derive(Debug, Error)]
pub enum CandorError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a wire envelope.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client has been shut down (or its background task has exited);
    /// no further operations can be queued.
    #[error("client is closed")]
    ClientClosed,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Candor session client operations.
pub type Result<T> = std::result::Result<T, CandorError>;
