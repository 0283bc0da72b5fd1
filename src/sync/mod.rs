//! Best-effort shared-editor state. Incoming edits are applied in arrival
//! order with no transformation against concurrent local edits (no OT/CRDT);
//! under concurrent edits to overlapping ranges peers can diverge until the
//! next full resync. Known limitation, accepted for low-concurrency
//! interview sessions.

pub mod buffer;
pub mod engine;
pub mod templates;

pub use buffer::TextBuffer;
pub use engine::CodeSyncEngine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    Insert,
    Delete,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRange {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

/// Ephemeral wire-level edit; relayed, applied, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEdit {
    #[serde(rename = "type")]
    pub kind: EditKind,
    pub range: EditRange,
    pub text: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborativeCursor {
    pub user_id: String,
    pub user_name: String,
    pub color: String,
    pub position: CursorPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<EditRange>,
}
