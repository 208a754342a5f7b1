//! # Live Session Example
//!
//! Demonstrates a complete Candor session client lifecycle:
//!
//! 1. Connect to a session server via WebSocket
//! 2. Authenticate with an issued token
//! 3. Join an interview session
//! 4. React to session events (status changes, transcript lines, avatar state)
//! 5. Shut down gracefully on Ctrl+C or when the connection is lost
//!
//! ## Running
//!
//! ```sh
//! # Start a Candor session server on localhost:4820, then:
//! cargo run --example live_session
//!
//! # Override the server URL and session:
//! CANDOR_URL=wss://sync.candorhq.dev/ws CANDOR_SESSION=sess_123 \
//!     cargo run --example live_session
//! ```

use candor_session_client::{
    CandorClient, CandorConfig, CandorEvent, StaticCredential, WebSocketConnector,
};

/// Default server URL when `CANDOR_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:4820/ws";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("CANDOR_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let session_id = std::env::var("CANDOR_SESSION").unwrap_or_else(|_| "sess_demo".to_string());
    tracing::info!("Connecting to {url}");

    let mut config = CandorConfig::new().with_user_id("demo-user");
    if let Ok(token) = std::env::var("CANDOR_TOKEN") {
        config = config.with_credentials(StaticCredential::new(token));
    }

    // ── Start ───────────────────────────────────────────────────────
    // The client owns a background task that dials, authenticates, and
    // reconnects with exponential backoff on its own.
    let connector =
        WebSocketConnector::new(url).with_connect_timeout(std::time::Duration::from_secs(10));
    let (mut client, mut events) = CandorClient::start(connector, config);

    client.connect()?;
    client.join_session(session_id.clone())?;
    tracing::info!("Joining session {session_id}");

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    CandorEvent::Connected => {
                        tracing::info!("Connected");
                    }

                    CandorEvent::StatusChanged { status, .. } => {
                        tracing::info!("Interview status → {status}");
                        if status == "awaiting_answer" {
                            client.send_answer("I'd reach for a hash map here.")?;
                        }
                    }

                    CandorEvent::TranscriptAppended { speaker, text, .. } => {
                        tracing::info!("{speaker}: {text}");
                    }

                    CandorEvent::AvatarStateChanged { state_type, value } => {
                        tracing::debug!("Avatar {state_type} → {value}");
                    }

                    CandorEvent::Notification { kind, payload, .. } => {
                        tracing::info!("Notification [{kind:?}]: {payload}");
                    }

                    CandorEvent::Disconnected { reason } => {
                        tracing::warn!(
                            "Disconnected: {} (reconnecting automatically)",
                            reason.as_deref().unwrap_or("unknown")
                        );
                    }

                    CandorEvent::ConnectionLost { attempts } => {
                        tracing::error!("Connection lost after {attempts} attempts, giving up");
                        break;
                    }
                }
            }

            // Ctrl+C — shut down gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}
