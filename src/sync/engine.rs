use std::collections::HashMap;

use crate::models::code_session::CodeEditorSession;
use crate::sync::templates::starter_template;
use crate::sync::{CodeEdit, CollaborativeCursor, TextBuffer};
use serde::{Deserialize, Serialize};

/// Authoritative shared-editor state for one interview room. Lives inside
/// the relay room and answers resync requests for late joiners.
#[derive(Debug)]
pub struct CodeSyncEngine {
    buffer: TextBuffer,
    language: String,
    theme: String,
    cursors: HashMap<String, CollaborativeCursor>,
}

/// Full-state snapshot carried by a `sync_response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub code: String,
    pub language: String,
    pub cursors: Vec<CollaborativeCursor>,
}

impl CodeSyncEngine {
    pub fn new(language: &str, theme: &str) -> Self {
        Self {
            buffer: TextBuffer::new(),
            language: language.to_string(),
            theme: theme.to_string(),
            cursors: HashMap::new(),
        }
    }

    /// Restores the live state from the persisted session record.
    pub fn from_session(session: &CodeEditorSession) -> Self {
        Self {
            buffer: TextBuffer::from_text(&session.code),
            language: session.language.clone(),
            theme: session.theme.clone(),
            cursors: HashMap::new(),
        }
    }

    pub fn apply_edit(&mut self, edit: &CodeEdit) {
        self.buffer.apply(edit.kind, &edit.range, &edit.text);
    }

    /// Cursor updates replace the previous cursor wholesale.
    pub fn update_cursor(&mut self, cursor: CollaborativeCursor) {
        self.cursors.insert(cursor.user_id.clone(), cursor);
    }

    pub fn remove_participant(&mut self, user_id: &str) {
        self.cursors.remove(user_id);
    }

    /// Switches language and resets the buffer to that language's starter
    /// template. Returns the new buffer text so it can be rebroadcast.
    pub fn change_language(&mut self, language: &str) -> String {
        self.language = language.to_string();
        let template = starter_template(language);
        self.buffer.set_text(&template);
        template
    }

    pub fn code(&self) -> String {
        self.buffer.text()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            code: self.buffer.text(),
            language: self.language.clone(),
            cursors: self.cursors.values().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{CursorPosition, EditKind, EditRange};
    use chrono::Utc;

    fn edit(kind: EditKind, sl: u32, sc: u32, el: u32, ec: u32, text: &str) -> CodeEdit {
        CodeEdit {
            kind,
            range: EditRange {
                start_line: sl,
                start_column: sc,
                end_line: el,
                end_column: ec,
            },
            text: text.to_string(),
            user_id: "user-a".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn cursor(user_id: &str, line: u32, column: u32) -> CollaborativeCursor {
        CollaborativeCursor {
            user_id: user_id.to_string(),
            user_name: user_id.to_string(),
            color: "#ff0000".to_string(),
            position: CursorPosition { line, column },
            selection: None,
        }
    }

    #[test]
    fn edits_apply_in_arrival_order() {
        let mut engine = CodeSyncEngine::new("python", "vs-dark");
        engine.apply_edit(&edit(EditKind::Insert, 1, 1, 1, 1, "print(1)"));
        engine.apply_edit(&edit(EditKind::Replace, 1, 7, 1, 8, "2"));
        assert_eq!(engine.code(), "print(2)");
    }

    #[test]
    fn snapshot_reflects_current_state() {
        let mut engine = CodeSyncEngine::new("javascript", "vs-dark");
        engine.apply_edit(&edit(EditKind::Insert, 1, 1, 1, 1, "const x = 1;"));
        engine.update_cursor(cursor("user-a", 1, 13));

        let snap = engine.snapshot();
        assert_eq!(snap.code, "const x = 1;");
        assert_eq!(snap.language, "javascript");
        assert_eq!(snap.cursors.len(), 1);
    }

    #[test]
    fn cursor_replaced_not_merged() {
        let mut engine = CodeSyncEngine::new("javascript", "vs-dark");
        engine.update_cursor(cursor("user-a", 1, 1));
        engine.update_cursor(cursor("user-a", 5, 3));

        let snap = engine.snapshot();
        assert_eq!(snap.cursors.len(), 1);
        assert_eq!(snap.cursors[0].position, CursorPosition { line: 5, column: 3 });
    }

    #[test]
    fn leaving_participant_drops_cursor() {
        let mut engine = CodeSyncEngine::new("javascript", "vs-dark");
        engine.update_cursor(cursor("user-a", 1, 1));
        engine.update_cursor(cursor("user-b", 2, 2));
        engine.remove_participant("user-a");
        assert_eq!(engine.cursor_count(), 1);
    }

    #[test]
    fn language_change_resets_to_template() {
        let mut engine = CodeSyncEngine::new("javascript", "vs-dark");
        engine.apply_edit(&edit(EditKind::Insert, 1, 1, 1, 1, "const x = 1;"));
        let template = engine.change_language("python");
        assert_eq!(engine.language(), "python");
        assert_eq!(engine.code(), template);
        assert!(engine.code().starts_with("# Python"));
    }
}
