//! WebSocket protocol messages for the Code Player server.
//!
//! Defines the message types exchanged between client and server.

use codeplayer_core::{ExecutionId, LogRecord, RunPhase, SourceBuffers, SourceKind};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request current session state.
    GetState,

    /// Replace one editor buffer.
    EditSource {
        /// Which buffer.
        kind: SourceKind,
        /// New buffer contents.
        source: String,
    },

    /// Replace all three buffers at once.
    SetSources { sources: SourceBuffers },

    /// Start a capturing run.
    Run,

    /// Empty the console.
    Clear,

    /// Store the current buffers under the session's share id.
    Save,

    /// Load a shared snippet into the editor.
    Load { share_id: String },
}

impl ClientMessage {
    /// Decode one text frame from the client.
    pub fn parse(text: &str) -> ServerResult<Self> {
        serde_json::from_str(text).map_err(|e| ServerError::InvalidRequest(e.to_string()))
    }
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full session state (sent on connection or request).
    SessionState {
        sources: SourceBuffers,
        logs: Vec<LogRecord>,
        execution_id: ExecutionId,
        phase: RunPhase,
        /// Share id of the snippet this session was saved to or loaded from.
        share_id: Option<String>,
    },

    /// The accumulated console log changed.
    ConsoleUpdated { logs: Vec<LogRecord> },

    /// The sandbox finished rendering a document.
    PreviewUpdated {
        execution_id: ExecutionId,
        /// The composed document that was rendered.
        document: String,
    },

    /// A capturing run was accepted.
    RunStarted { execution_id: ExecutionId },

    /// A run request arrived while a capturing run was in flight.
    RunIgnored,

    /// Buffers were stored.
    Saved { share_id: String },

    /// A shared snippet replaced the buffers.
    Loaded {
        share_id: String,
        sources: SourceBuffers,
    },

    /// Error message.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_tags() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"edit_source","kind":"css","source":"p{}"}"#).unwrap();
        match msg {
            ClientMessage::EditSource { kind, source } => {
                assert_eq!(kind, SourceKind::Css);
                assert_eq!(source, "p{}");
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"run"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Run));
    }

    #[test]
    fn test_set_sources_fills_missing_buffers() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"set_sources","sources":{"js":"go()"}}"#).unwrap();
        let ClientMessage::SetSources { sources } = msg else {
            panic!("expected set_sources");
        };
        assert_eq!(sources, SourceBuffers::new("", "", "go()"));
    }

    #[test]
    fn test_malformed_frame_is_invalid_request() {
        let err = ClientMessage::parse(r#"{"type":"edit_source","kind":"rust"}"#).unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("Invalid request:"));

        assert!(matches!(ClientMessage::parse(r#"{"type":"clear"}"#), Ok(ClientMessage::Clear)));
    }

    #[test]
    fn test_run_started_shape() {
        let json = serde_json::to_value(ServerMessage::RunStarted {
            execution_id: ExecutionId::new(3),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "type": "run_started", "execution_id": 3 }));
    }
}
