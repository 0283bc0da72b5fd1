use crate::sync::{EditKind, EditRange};

/// Line-oriented text buffer. Positions are 1-based (line, column) pairs in
/// editor convention; columns count characters, not bytes.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    lines: Vec<String>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(|l| l.to_string()).collect(),
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn set_text(&mut self, text: &str) {
        self.lines = text.split('\n').map(|l| l.to_string()).collect();
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Applies an edit. Inserts collapse the range to its start position;
    /// deletes ignore the replacement text. Out-of-range positions are
    /// clamped to the buffer rather than rejected, since remote edits can
    /// race ahead of the local buffer in the best-effort protocol.
    pub fn apply(&mut self, kind: EditKind, range: &EditRange, text: &str) {
        match kind {
            EditKind::Insert => {
                let collapsed = EditRange {
                    start_line: range.start_line,
                    start_column: range.start_column,
                    end_line: range.start_line,
                    end_column: range.start_column,
                };
                self.replace_range(&collapsed, text);
            }
            EditKind::Delete => self.replace_range(range, ""),
            EditKind::Replace => self.replace_range(range, text),
        }
    }

    fn replace_range(&mut self, range: &EditRange, text: &str) {
        let (start_line, start_col) = self.clamp(range.start_line, range.start_column);
        let (end_line, end_col) = self.clamp(range.end_line, range.end_column);

        // Normalize an inverted range to an insert at its start.
        let (start_line, start_col, end_line, end_col) =
            if (end_line, end_col) < (start_line, start_col) {
                (start_line, start_col, start_line, start_col)
            } else {
                (start_line, start_col, end_line, end_col)
            };

        let prefix: String = self.lines[start_line].chars().take(start_col).collect();
        let suffix: String = self.lines[end_line].chars().skip(end_col).collect();

        let replacement = format!("{}{}{}", prefix, text, suffix);
        let new_lines: Vec<String> = replacement.split('\n').map(|l| l.to_string()).collect();
        self.lines.splice(start_line..=end_line, new_lines);

        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
    }

    /// Converts a 1-based position to clamped 0-based (line index, char
    /// offset) coordinates.
    fn clamp(&self, line: u32, column: u32) -> (usize, usize) {
        let line_idx = (line.max(1) as usize - 1).min(self.lines.len() - 1);
        let line_len = self.lines[line_idx].chars().count();
        let col_idx = (column.max(1) as usize - 1).min(line_len);
        (line_idx, col_idx)
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> EditRange {
        EditRange {
            start_line: sl,
            start_column: sc,
            end_line: el,
            end_column: ec,
        }
    }

    #[test]
    fn insert_at_origin_of_empty_buffer() {
        let mut buf = TextBuffer::new();
        buf.apply(EditKind::Insert, &range(1, 1, 1, 1), "print(1)");
        assert_eq!(buf.text(), "print(1)");
    }

    #[test]
    fn insert_in_middle_of_line() {
        let mut buf = TextBuffer::from_text("hello world");
        buf.apply(EditKind::Insert, &range(1, 6, 1, 6), ",");
        assert_eq!(buf.text(), "hello, world");
    }

    #[test]
    fn multiline_insert_splits_lines() {
        let mut buf = TextBuffer::from_text("ab");
        buf.apply(EditKind::Insert, &range(1, 2, 1, 2), "1\n2");
        assert_eq!(buf.text(), "a1\n2b");
        assert_eq!(buf.line_count(), 2);
    }

    #[test]
    fn delete_within_line() {
        let mut buf = TextBuffer::from_text("hello world");
        buf.apply(EditKind::Delete, &range(1, 6, 1, 12), "");
        assert_eq!(buf.text(), "hello");
    }

    #[test]
    fn delete_across_lines() {
        let mut buf = TextBuffer::from_text("one\ntwo\nthree");
        buf.apply(EditKind::Delete, &range(1, 4, 3, 1), "");
        assert_eq!(buf.text(), "onethree");
    }

    #[test]
    fn replace_range_with_text() {
        let mut buf = TextBuffer::from_text("let x = 1;");
        buf.apply(EditKind::Replace, &range(1, 9, 1, 10), "42");
        assert_eq!(buf.text(), "let x = 42;");
    }

    #[test]
    fn out_of_range_positions_are_clamped() {
        let mut buf = TextBuffer::from_text("ab");
        buf.apply(EditKind::Insert, &range(9, 9, 9, 9), "!");
        assert_eq!(buf.text(), "ab!");
    }

    #[test]
    fn unicode_columns_count_chars_not_bytes() {
        let mut buf = TextBuffer::from_text("héllo");
        buf.apply(EditKind::Insert, &range(1, 6, 1, 6), "!");
        assert_eq!(buf.text(), "héll!o");
    }
}
