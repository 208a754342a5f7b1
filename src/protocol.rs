//! Wire types for the Candor session protocol.
//!
//! Every message on the wire is a single JSON object — an [`Envelope`]
//! carrying a tagged message body plus correlation metadata:
//!
//! ```json
//! { "type": "candidate_answer",
//!   "payload": { "answer": "..." },
//!   "timestamp": "2026-08-05T12:00:00Z",
//!   "sessionId": "sess_123",
//!   "userId": "user_456" }
//! ```
//!
//! The message kinds form a closed set: [`ClientMessage`] for the outbound
//! direction and [`ServerMessage`] for the inbound direction. Tagging the
//! enums with `type`/`payload` keeps dispatch exhaustive at compile time
//! instead of string-matching on message kinds at runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The wire unit exchanged over the connection.
///
/// Generic over the message body so the same envelope shape serves both
/// directions: `Envelope<ClientMessage>` outbound, `Envelope<ServerMessage>`
/// inbound. The body's `type` and `payload` fields are flattened into the
/// top-level object.
///
/// Envelopes are immutable once constructed; the builder methods consume
/// `self`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<M> {
    /// Tagged message body, flattened to top-level `type` + `payload`.
    #[serde(flatten)]
    pub message: M,
    /// Wall-clock send time, ISO-8601 on the wire.
    pub timestamp: DateTime<Utc>,
    /// Correlation key for the session this message belongs to.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Identity of the sending user, when known.
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl<M> Envelope<M> {
    /// Create an envelope around `message`, stamped with the current time
    /// and no correlation metadata.
    pub fn new(message: M) -> Self {
        Self {
            message,
            timestamp: Utc::now(),
            session_id: None,
            user_id: None,
        }
    }

    /// Set the session correlation key.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the sending user's identity.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Message kinds sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One-time credential envelope, sent immediately after the connection
    /// opens when a credential is available.
    Auth {
        /// Opaque server-issued credential.
        token: String,
    },
    /// Periodic liveness signal. Empty payload.
    Heartbeat {},
    /// Join the interview session named by the envelope's `sessionId`.
    JoinSession {},
    /// Leave the interview session named by the envelope's `sessionId`.
    LeaveSession {},
    /// A candidate's answer to the current question.
    CandidateAnswer { answer: String },
    /// Ask the avatar renderer to play an animation.
    AvatarAnimation {
        animation: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parameters: Option<serde_json::Value>,
    },
    /// Set the avatar's facial expression.
    AvatarExpression { expression: String },
    /// Start the interview.
    StartInterview {},
    /// End the interview.
    EndInterview {},
}

/// Message kinds sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The interview's status changed.
    InterviewStatus { status: String },
    /// A facet of the avatar's state changed.
    AvatarState {
        #[serde(rename = "stateType")]
        state_type: String,
        value: serde_json::Value,
    },
    /// A line of transcript was produced.
    Transcript { speaker: String, text: String },
    /// Free-form system notification for the user.
    SystemNotification(serde_json::Value),
    /// Invitation to an interview session.
    InterviewInvite(serde_json::Value),
    /// A candidate responded (free-form).
    CandidateResponse(serde_json::Value),
}
