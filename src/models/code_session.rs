use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_LANGUAGE: &str = "javascript";
pub const DEFAULT_THEME: &str = "vs-dark";

/// Persisted shared-editor state, one per interview. The live buffer is
/// owned by the relay room; this record is the durable snapshot of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEditorSession {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub language: String,
    pub theme: String,
    pub code: String,
    /// Set once the interview ends; the session is read-only afterwards.
    pub final_code: Option<String>,
    pub snapshots: Vec<CodeSnapshot>,
    pub execution_history: Vec<ExecutionResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodeEditorSession {
    pub fn new(interview_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            interview_id,
            language: DEFAULT_LANGUAGE.to_string(),
            theme: DEFAULT_THEME.to_string(),
            code: String::new(),
            final_code: None,
            snapshots: Vec::new(),
            execution_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.final_code.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSnapshot {
    pub taken_at: DateTime<Utc>,
    pub language: String,
    pub code: String,
    /// What triggered the snapshot: "language_change" or "interview_end".
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub runtime_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<u64>,
    pub exit_code: i32,
}
