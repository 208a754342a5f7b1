//! Inbound envelope routing.
//!
//! The router turns raw transport text into [`CandorEvent`]s. It holds no
//! business logic: parse, scope-check, convert, emit. Malformed text and
//! unrecognized message kinds are logged and discarded — they never crash
//! dispatch of subsequent messages. Dispatch is sequential in
//! transport-delivery order because the connection manager calls it from
//! its single loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::connection::SharedState;
use crate::event::CandorEvent;
use crate::protocol::{Envelope, ServerMessage};

pub(crate) struct MessageRouter {
    events: mpsc::Sender<CandorEvent>,
    shared: Arc<SharedState>,
}

impl MessageRouter {
    pub(crate) fn new(events: mpsc::Sender<CandorEvent>, shared: Arc<SharedState>) -> Self {
        Self { events, shared }
    }

    /// Parse one inbound message and emit the corresponding event.
    pub(crate) fn dispatch(&self, raw: &str) {
        let envelope: Envelope<ServerMessage> = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("discarding unroutable inbound message: {e} — raw: {raw}");
                return;
            }
        };

        if self.is_foreign_session(&envelope) {
            debug!(
                session = envelope.session_id.as_deref().unwrap_or(""),
                "discarding message for a session we are not in"
            );
            return;
        }

        let event = CandorEvent::from(envelope);
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

    /// Session-scoping check: a session-state message addressed to a
    /// different session than the one we joined is not ours to apply.
    /// Notification kinds are exempt — an invite for a session we have not
    /// joined must still reach the user.
    fn is_foreign_session(&self, envelope: &Envelope<ServerMessage>) -> bool {
        let scoped = matches!(
            envelope.message,
            ServerMessage::InterviewStatus { .. }
                | ServerMessage::AvatarState { .. }
                | ServerMessage::Transcript { .. }
        );
        if !scoped {
            return false;
        }
        match (&envelope.session_id, self.shared.session_id()) {
            (Some(theirs), Some(ours)) => *theirs != ours,
            _ => false,
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
    use crate::event::NotificationKind;

    fn router_with_session(session: Option<&str>) -> (MessageRouter, mpsc::Receiver<CandorEvent>) {
        let (shared, _state_rx) = SharedState::new();
        shared.set_session_id(session.map(String::from));
        let (tx, rx) = mpsc::channel(16);
        (MessageRouter::new(tx, shared), rx)
    }

    fn transcript_json(session_id: &str) -> String {
        format!(
            r#"{{"type":"transcript","payload":{{"speaker":"candidate","text":"hi"}},"timestamp":"2026-08-05T12:00:00Z","sessionId":"{session_id}"}}"#
        )
    }

    #[test]
    fn transcript_is_routed_with_payload_fields() {
        let (router, mut rx) = router_with_session(Some("S1"));
        router.dispatch(&transcript_json("S1"));

        let event = rx.try_recv().unwrap();
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
    }

    #[test]
    fn transcript_for_other_session_is_discarded() {
        let (router, mut rx) = router_with_session(Some("S1"));
        router.dispatch(&transcript_json("S2"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn transcript_without_session_id_is_delivered() {
        let (router, mut rx) = router_with_session(Some("S1"));
        router.dispatch(
            r#"{"type":"transcript","payload":{"speaker":"interviewer","text":"hello"},"timestamp":"2026-08-05T12:00:00Z"}"#,
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            CandorEvent::TranscriptAppended { .. }
        ));
    }

    #[test]
    fn status_change_is_routed() {
        let (router, mut rx) = router_with_session(None);
        router.dispatch(
            r#"{"type":"interview_status","payload":{"status":"in_progress"},"timestamp":"2026-08-05T12:00:00Z"}"#,
        );
        match rx.try_recv().unwrap() {
            CandorEvent::StatusChanged { status, .. } => assert_eq!(status, "in_progress"),
            other => panic!("expected StatusChanged, got {other:?}"),
        }
    }

    #[test]
    fn avatar_state_is_routed() {
        let (router, mut rx) = router_with_session(None);
        router.dispatch(
            r#"{"type":"avatar_state","payload":{"stateType":"gaze","value":{"x":0.2}},"timestamp":"2026-08-05T12:00:00Z"}"#,
        );
        match rx.try_recv().unwrap() {
            CandorEvent::AvatarStateChanged { state_type, value } => {
                assert_eq!(state_type, "gaze");
                assert_eq!(value, serde_json::json!({"x": 0.2}));
            }
            other => panic!("expected AvatarStateChanged, got {other:?}"),
        }
    }

    #[test]
    fn invite_for_unjoined_session_is_delivered() {
        // Notifications bypass the scoping check.
        let (router, mut rx) = router_with_session(Some("S1"));
        router.dispatch(
            r#"{"type":"interview_invite","payload":{"title":"Backend interview"},"timestamp":"2026-08-05T12:00:00Z","sessionId":"S9"}"#,
        );
        match rx.try_recv().unwrap() {
            CandorEvent::Notification {
                kind, session_id, ..
            } => {
                assert_eq!(kind, NotificationKind::InterviewInvite);
                assert_eq!(session_id.as_deref(), Some("S9"));
            }
            other => panic!("expected Notification, got {other:?}"),
        }
    }

    #[test]
    fn system_notification_kind_is_tagged() {
        let (router, mut rx) = router_with_session(None);
        router.dispatch(
            r#"{"type":"system_notification","payload":{"message":"maintenance at noon"},"timestamp":"2026-08-05T12:00:00Z"}"#,
        );
        match rx.try_recv().unwrap() {
            CandorEvent::Notification { kind, payload, .. } => {
                assert_eq!(kind, NotificationKind::System);
                assert_eq!(payload["message"], "maintenance at noon");
            }
            other => panic!("expected Notification, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_discarded_without_panic() {
        let (router, mut rx) = router_with_session(Some("S1"));
        router.dispatch(
            r#"{"type":"telemetry_blob","payload":{"a":1},"timestamp":"2026-08-05T12:00:00Z"}"#,
        );
        assert!(rx.try_recv().is_err());

        // Dispatch of subsequent messages is unaffected.
        router.dispatch(&transcript_json("S1"));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn malformed_json_is_discarded_without_panic() {
        let (router, mut rx) = router_with_session(None);
        router.dispatch("{not json");
        router.dispatch("");
        router.dispatch("42");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (shared, _state_rx) = SharedState::new();
        let (tx, mut rx) = mpsc::channel(1);
        let router = MessageRouter::new(tx, shared);

        router.dispatch(
            r#"{"type":"interview_status","payload":{"status":"a"},"timestamp":"2026-08-05T12:00:00Z"}"#,
        );
        router.dispatch(
            r#"{"type":"interview_status","payload":{"status":"b"},"timestamp":"2026-08-05T12:00:00Z"}"#,
        );

        // Only the first fit; the second was dropped, not queued.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
