//! Domain events emitted to the application.
//!
//! The client never mutates application state directly. Inbound envelopes
//! are converted to [`CandorEvent`]s and emitted on the channel returned
//! from [`CandorClient::start`](crate::CandorClient::start); the state layer
//! subscribes and applies them with whatever state-management technology it
//! likes.
//!
//! `Connected`, `Disconnected` and `ConnectionLost` are synthetic — they are
//! produced by the connection manager, not parsed off the wire.

use crate::protocol::{Envelope, ServerMessage};

/// Events emitted by the client on its event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum CandorEvent {
    /// The transport connection is open.
    Connected,
    /// The transport connection closed. Emitted on every departure from the
    /// open state, whether caller-initiated or abnormal.
    Disconnected {
        /// Reason for the disconnect, when one is known.
        reason: Option<String>,
    },
    /// Automatic reconnection gave up after exhausting the configured
    /// attempt budget. The client stays resumable via
    /// [`reconnect`](crate::CandorClient::reconnect).
    ConnectionLost {
        /// Number of reconnection attempts that were made.
        attempts: u32,
    },
    /// The interview session's status changed.
    StatusChanged {
        status: String,
        session_id: Option<String>,
    },
    /// A facet of the avatar's state changed.
    AvatarStateChanged {
        state_type: String,
        value: serde_json::Value,
    },
    /// A line was appended to the transcript.
    TranscriptAppended {
        speaker: String,
        text: String,
        session_id: Option<String>,
    },
    /// A user-facing notification arrived.
    Notification {
        kind: NotificationKind,
        payload: serde_json::Value,
        session_id: Option<String>,
    },
}

/// Which wire message kind produced a [`CandorEvent::Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// A `system_notification` message.
    System,
    /// An `interview_invite` message.
    InterviewInvite,
    /// A `candidate_response` message.
    CandidateResponse,
}

impl From<Envelope<ServerMessage>> for CandorEvent {
    fn from(envelope: Envelope<ServerMessage>) -> Self {
        let session_id = envelope.session_id;
        match envelope.message {
            ServerMessage::InterviewStatus { status } => {
                CandorEvent::StatusChanged { status, session_id }
            }
            ServerMessage::AvatarState { state_type, value } => {
                CandorEvent::AvatarStateChanged { state_type, value }
            }
            ServerMessage::Transcript { speaker, text } => CandorEvent::TranscriptAppended {
                speaker,
                text,
                session_id,
            },
            ServerMessage::SystemNotification(payload) => CandorEvent::Notification {
                kind: NotificationKind::System,
                payload,
                session_id,
            },
            ServerMessage::InterviewInvite(payload) => CandorEvent::Notification {
                kind: NotificationKind::InterviewInvite,
                payload,
                session_id,
            },
            ServerMessage::CandidateResponse(payload) => CandorEvent::Notification {
                kind: NotificationKind::CandidateResponse,
                payload,
                session_id,
            },
        }
    }
}
