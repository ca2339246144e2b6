//! Wire protocol between the candidate client and the remote interview agent.
//!
//! Every frame is a JSON object tagged by `type`. One connection carries one
//! session.

use serde::{Deserialize, Serialize};

/// Close code for an orderly shutdown. Any other code is treated as abnormal.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the peer's close frame carried no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Close code reported when the link died without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// What the remote side must do in response to an integrity violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationAction {
    Terminate,
}

/// Messages sent from the candidate client to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CandidateResponse {
        content: String,
    },
    EndInterview {
        integrity_violation: bool,
        fullscreen_exits: u32,
    },
    IntegrityFlag {
        flag_type: String,
        description: String,
    },
    IntegrityViolation {
        reason: String,
        action: ViolationAction,
    },
    Ping,
}

impl ClientMessage {
    /// Wire name of this message kind, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CandidateResponse { .. } => "candidate_response",
            Self::EndInterview { .. } => "end_interview",
            Self::IntegrityFlag { .. } => "integrity_flag",
            Self::IntegrityViolation { .. } => "integrity_violation",
            Self::Ping => "ping",
        }
    }
}

/// Messages received from the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Heartbeat acknowledgement.
    Pong {},
    /// Agent utterance.
    AiMessage { content: String },
    /// Agent-side failure; the session continues.
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    /// The remote side has finished scoring; the report is ready.
    Evaluation {
        #[serde(default)]
        content: Option<String>,
    },
    /// Any message type this client does not understand.
    #[serde(other)]
    Unknown,
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns [`ProctorError::Protocol`](crate::error::ProctorError::Protocol) when
/// the frame is not a JSON object with a string `type` field.
pub fn decode_server_message(text: &str) -> crate::error::Result<ServerMessage> {
    serde_json::from_str(text)
        .map_err(|e| crate::error::ProctorError::Protocol(format!("bad server frame: {e}")))
}

/// Encode one outbound message as a text frame.
///
/// # Errors
///
/// Returns [`ProctorError::Protocol`](crate::error::ProctorError::Protocol) if
/// serialization fails.
pub fn encode_client_message(msg: &ClientMessage) -> crate::error::Result<String> {
    serde_json::to_string(msg)
        .map_err(|e| crate::error::ProctorError::Protocol(format!("encode {}: {e}", msg.kind())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn encoded(msg: &ClientMessage) -> Value {
        let text = encode_client_message(msg).unwrap_or_else(|e| panic!("encode failed: {e}"));
        serde_json::from_str(&text).unwrap_or_else(|e| panic!("not json: {e}"))
    }

    #[test]
    fn candidate_response_shape() {
        let value = encoded(&ClientMessage::CandidateResponse {
            content: "My answer".into(),
        });
        assert_eq!(value, json!({"type": "candidate_response", "content": "My answer"}));
    }

    #[test]
    fn end_interview_shape() {
        let value = encoded(&ClientMessage::EndInterview {
            integrity_violation: true,
            fullscreen_exits: 3,
        });
        assert_eq!(
            value,
            json!({"type": "end_interview", "integrity_violation": true, "fullscreen_exits": 3})
        );
    }

    #[test]
    fn integrity_messages_shape() {
        let flag = encoded(&ClientMessage::IntegrityFlag {
            flag_type: "fullscreen_exit_attempt".into(),
            description: "Escape (1/3)".into(),
        });
        assert_eq!(flag["type"], "integrity_flag");
        assert_eq!(flag["flag_type"], "fullscreen_exit_attempt");

        let violation = encoded(&ClientMessage::IntegrityViolation {
            reason: "Exceeded fullscreen exit attempts".into(),
            action: ViolationAction::Terminate,
        });
        assert_eq!(violation["type"], "integrity_violation");
        assert_eq!(violation["action"], "terminate");
    }

    #[test]
    fn ping_is_bare_type() {
        assert_eq!(encoded(&ClientMessage::Ping), json!({"type": "ping"}));
    }

    #[test]
    fn decode_known_server_messages() {
        let ai = decode_server_message(r#"{"type":"ai_message","content":"Tell me about Rust"}"#);
        assert!(matches!(ai, Ok(ServerMessage::AiMessage { ref content }) if content == "Tell me about Rust"));

        let pong = decode_server_message(r#"{"type":"pong"}"#);
        assert!(matches!(pong, Ok(ServerMessage::Pong {})));

        let err = decode_server_message(r#"{"type":"error","message":"model overloaded"}"#);
        assert!(
            matches!(err, Ok(ServerMessage::Error { message: Some(ref m) }) if m == "model overloaded")
        );

        let eval = decode_server_message(r#"{"type":"evaluation","content":"{}"}"#);
        assert!(matches!(eval, Ok(ServerMessage::Evaluation { .. })));
    }

    #[test]
    fn decode_error_without_message() {
        let err = decode_server_message(r#"{"type":"error"}"#);
        assert!(matches!(err, Ok(ServerMessage::Error { message: None })));
    }

    #[test]
    fn decode_unknown_type_is_tolerated() {
        let msg = decode_server_message(r#"{"type":"welcome","session_id":"abc"}"#);
        assert!(matches!(msg, Ok(ServerMessage::Unknown)));
    }

    #[test]
    fn decode_garbage_is_protocol_error() {
        let msg = decode_server_message("not json");
        assert!(matches!(msg, Err(crate::error::ProctorError::Protocol(_))));
    }
}
