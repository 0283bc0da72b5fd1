use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::code_session::ExecutionResult;
use crate::models::participant::ParticipantRole;
use crate::sync::engine::SyncSnapshot;
use crate::sync::{CodeEdit, CollaborativeCursor};

/// Sender id used on messages originated by the gateway itself
/// (sync responses, execution results, join/leave notifications).
pub const GATEWAY_SENDER: &str = "gateway";

/// The nine relay message kinds, dispatched by exhaustive match so a new
/// kind is a compile-time-checked addition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum RelayMessage {
    CodeEdit(CodeEdit),
    CursorMove { cursor: CollaborativeCursor },
    ParticipantJoin {
        user_id: String,
        user_name: String,
        role: ParticipantRole,
    },
    ParticipantLeave { user_id: String },
    LanguageChange { language: String },
    CodeExecute { code: String, language: String },
    ExecutionResult(ExecutionResult),
    SyncRequest {},
    SyncResponse(SyncSnapshot),
}

/// Wire envelope: `{ type, payload, sender_id, timestamp }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEnvelope {
    #[serde(flatten)]
    pub message: RelayMessage,
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
}

impl RelayEnvelope {
    pub fn new(sender_id: &str, message: RelayMessage) -> Self {
        Self {
            message,
            sender_id: sender_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{CursorPosition, EditKind, EditRange};

    #[test]
    fn envelope_wire_shape() {
        let envelope = RelayEnvelope::new(
            "user-a",
            RelayMessage::CodeEdit(CodeEdit {
                kind: EditKind::Insert,
                range: EditRange {
                    start_line: 1,
                    start_column: 1,
                    end_line: 1,
                    end_column: 1,
                },
                text: "print(1)".to_string(),
                user_id: "user-a".to_string(),
                timestamp: Utc::now(),
            }),
        );

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "code_edit");
        assert_eq!(value["sender_id"], "user-a");
        assert_eq!(value["payload"]["type"], "insert");
        assert_eq!(value["payload"]["range"]["startLine"], 1);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn sync_request_round_trips_with_empty_payload() {
        let raw = r#"{"type":"sync_request","payload":{},"sender_id":"user-b","timestamp":"2025-01-01T10:00:00Z"}"#;
        let envelope: RelayEnvelope = serde_json::from_str(raw).unwrap();
        assert!(matches!(envelope.message, RelayMessage::SyncRequest {}));
        assert_eq!(envelope.sender_id, "user-b");
    }

    #[test]
    fn cursor_move_round_trips() {
        let envelope = RelayEnvelope::new(
            "user-b",
            RelayMessage::CursorMove {
                cursor: CollaborativeCursor {
                    user_id: "user-b".to_string(),
                    user_name: "Bea".to_string(),
                    color: "#00ff00".to_string(),
                    position: CursorPosition { line: 3, column: 7 },
                    selection: None,
                },
            },
        );

        let raw = serde_json::to_string(&envelope).unwrap();
        let parsed: RelayEnvelope = serde_json::from_str(&raw).unwrap();
        match parsed.message {
            RelayMessage::CursorMove { cursor } => {
                assert_eq!(cursor.position, CursorPosition { line: 3, column: 7 });
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
