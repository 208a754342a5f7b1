#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the Candor session protocol.
//!
//! Outbound envelopes must serialize to the exact JSON shape the server
//! expects (`type` + `payload` + `timestamp` + optional `sessionId`/`userId`
//! at the top level); inbound fixtures mirror real server output.

use candor_session_client::protocol::{ClientMessage, Envelope, ServerMessage};

fn to_value(envelope: &Envelope<ClientMessage>) -> serde_json::Value {
    serde_json::to_value(envelope).expect("serialize")
}

// ── Outbound envelope shape ─────────────────────────────────────────

#[test]
fn outbound_envelope_has_flat_wire_shape() {
    let envelope = Envelope::new(ClientMessage::CandidateAnswer {
        answer: "a binary search".into(),
    })
    .with_session_id("sess_1")
    .with_user_id("user_9");

    let value = to_value(&envelope);
    assert_eq!(value["type"], "candidate_answer");
    assert_eq!(value["payload"]["answer"], "a binary search");
    assert_eq!(value["sessionId"], "sess_1");
    assert_eq!(value["userId"], "user_9");
    // ISO-8601 timestamp at the top level.
    let timestamp = value["timestamp"].as_str().expect("timestamp string");
    assert!(timestamp.contains('T'));
    timestamp
        .parse::<chrono::DateTime<chrono::Utc>>()
        .expect("RFC 3339 timestamp");
}

#[test]
fn optional_correlation_keys_are_omitted_when_absent() {
    let envelope = Envelope::new(ClientMessage::StartInterview {});
    let value = to_value(&envelope);
    assert!(value.get("sessionId").is_none());
    assert!(value.get("userId").is_none());
}

#[test]
fn heartbeat_payload_is_an_empty_object() {
    let value = to_value(&Envelope::new(ClientMessage::Heartbeat {}));
    assert_eq!(value["type"], "heartbeat");
    assert_eq!(value["payload"], serde_json::json!({}));
}

#[test]
fn auth_payload_carries_the_token() {
    let value = to_value(&Envelope::new(ClientMessage::Auth {
        token: "tok_xyz".into(),
    }));
    assert_eq!(value["type"], "auth");
    assert_eq!(value["payload"], serde_json::json!({ "token": "tok_xyz" }));
}

#[test]
fn every_outbound_kind_uses_its_snake_case_tag() {
    let cases: Vec<(ClientMessage, &str)> = vec![
        (ClientMessage::Auth { token: "t".into() }, "auth"),
        (ClientMessage::Heartbeat {}, "heartbeat"),
        (ClientMessage::JoinSession {}, "join_session"),
        (ClientMessage::LeaveSession {}, "leave_session"),
        (
            ClientMessage::CandidateAnswer { answer: "a".into() },
            "candidate_answer",
        ),
        (
            ClientMessage::AvatarAnimation {
                animation: "wave".into(),
                parameters: None,
            },
            "avatar_animation",
        ),
        (
            ClientMessage::AvatarExpression {
                expression: "smile".into(),
            },
            "avatar_expression",
        ),
        (ClientMessage::StartInterview {}, "start_interview"),
        (ClientMessage::EndInterview {}, "end_interview"),
    ];

    for (message, expected) in cases {
        let value = to_value(&Envelope::new(message));
        assert_eq!(value["type"], expected);
    }
}

#[test]
fn animation_parameters_are_omitted_when_none() {
    let value = to_value(&Envelope::new(ClientMessage::AvatarAnimation {
        animation: "nod".into(),
        parameters: None,
    }));
    assert!(value["payload"].get("parameters").is_none());

    let value = to_value(&Envelope::new(ClientMessage::AvatarAnimation {
        animation: "nod".into(),
        parameters: Some(serde_json::json!({ "repeat": 3 })),
    }));
    assert_eq!(value["payload"]["parameters"]["repeat"], 3);
}

#[test]
fn outbound_envelope_round_trips() {
    let envelope = Envelope::new(ClientMessage::AvatarExpression {
        expression: "thoughtful".into(),
    })
    .with_session_id("sess_7");

    let json = serde_json::to_string(&envelope).expect("serialize");
    let back: Envelope<ClientMessage> = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(back.session_id.as_deref(), Some("sess_7"));
    assert_eq!(back.timestamp, envelope.timestamp);
    match back.message {
        ClientMessage::AvatarExpression { expression } => assert_eq!(expression, "thoughtful"),
        other => panic!("expected AvatarExpression, got {other:?}"),
    }
}

// ── Inbound fixtures ────────────────────────────────────────────────

fn parse(raw: &str) -> Envelope<ServerMessage> {
    serde_json::from_str(raw).expect("inbound fixture parses")
}

#[test]
fn interview_status_fixture_parses() {
    let envelope = parse(
        r#"{"type":"interview_status","payload":{"status":"in_progress"},"timestamp":"2026-08-05T09:30:00Z","sessionId":"sess_1"}"#,
    );
    assert_eq!(envelope.session_id.as_deref(), Some("sess_1"));
    match envelope.message {
        ServerMessage::InterviewStatus { status } => assert_eq!(status, "in_progress"),
        other => panic!("expected InterviewStatus, got {other:?}"),
    }
}

#[test]
fn avatar_state_fixture_uses_camel_case_state_type() {
    let envelope = parse(
        r#"{"type":"avatar_state","payload":{"stateType":"mouth","value":"open"},"timestamp":"2026-08-05T09:30:00Z"}"#,
    );
    match envelope.message {
        ServerMessage::AvatarState { state_type, value } => {
            assert_eq!(state_type, "mouth");
            assert_eq!(value, serde_json::json!("open"));
        }
        other => panic!("expected AvatarState, got {other:?}"),
    }
}

#[test]
fn transcript_fixture_parses() {
    let envelope = parse(
        r#"{"type":"transcript","payload":{"speaker":"interviewer","text":"Tell me about a project."},"timestamp":"2026-08-05T09:31:12Z","sessionId":"sess_1","userId":"user_2"}"#,
    );
    assert_eq!(envelope.user_id.as_deref(), Some("user_2"));
    match envelope.message {
        ServerMessage::Transcript { speaker, text } => {
            assert_eq!(speaker, "interviewer");
            assert_eq!(text, "Tell me about a project.");
        }
        other => panic!("expected Transcript, got {other:?}"),
    }
}

#[test]
fn notification_fixtures_carry_free_form_payloads() {
    let envelope = parse(
        r#"{"type":"system_notification","payload":{"severity":"info","message":"recording started"},"timestamp":"2026-08-05T09:30:00Z"}"#,
    );
    match envelope.message {
        ServerMessage::SystemNotification(payload) => {
            assert_eq!(payload["severity"], "info");
        }
        other => panic!("expected SystemNotification, got {other:?}"),
    }

    let envelope = parse(
        r#"{"type":"interview_invite","payload":{"role":"Backend Engineer","startsAt":"2026-08-06T10:00:00Z"},"timestamp":"2026-08-05T09:30:00Z","sessionId":"sess_9"}"#,
    );
    match envelope.message {
        ServerMessage::InterviewInvite(payload) => {
            assert_eq!(payload["role"], "Backend Engineer");
        }
        other => panic!("expected InterviewInvite, got {other:?}"),
    }

    let envelope = parse(
        r#"{"type":"candidate_response","payload":{"accepted":true},"timestamp":"2026-08-05T09:30:00Z"}"#,
    );
    assert!(matches!(
        envelope.message,
        ServerMessage::CandidateResponse(_)
    ));
}

#[test]
fn unknown_payload_fields_are_tolerated() {
    // Servers may add fields; the client must not reject them.
    let envelope = parse(
        r#"{"type":"transcript","payload":{"speaker":"candidate","text":"hi","confidence":0.97,"lang":"en"},"timestamp":"2026-08-05T09:30:00Z"}"#,
    );
    assert!(matches!(envelope.message, ServerMessage::Transcript { .. }));
}

#[test]
fn unknown_message_type_fails_to_parse() {
    // The closed kind set is enforced at the type level; the router treats
    // this parse failure as "log and discard".
    let result: Result<Envelope<ServerMessage>, _> = serde_json::from_str(
        r#"{"type":"telemetry","payload":{},"timestamp":"2026-08-05T09:30:00Z"}"#,
    );
    assert!(result.is_err());
}
