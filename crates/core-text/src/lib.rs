//! Rope-based host buffer and text reconciliation.
//!
//! The branching engine never owns the text the user edits; it talks to a
//! host buffer through the narrow [`HostBuffer`] trait (whole-value get/set,
//! an absolute byte cursor, line-indexed reads). [`Buffer`] is the rope-backed
//! implementation used by the runtime and by tests.
//!
//! [`reconcile`] holds the pure planner that diffs a buffer value against the
//! ordered segments of the active path. It has no tree or buffer dependency so
//! every edge case is testable on plain strings.

use ropey::Rope;

pub mod reconcile;

pub use reconcile::{EditPolicy, ReconcilePlan};

/// Host editor surface consumed by the engine.
///
/// Cursor values are absolute byte offsets into [`HostBuffer::value`] and
/// always sit on a char boundary.
pub trait HostBuffer {
    fn value(&self) -> String;
    fn set_value(&mut self, text: &str);
    fn cursor(&self) -> usize;
    fn set_cursor(&mut self, offset: usize);
    fn line_count(&self) -> usize;
    /// Requested line including its trailing newline, if any.
    fn line(&self, idx: usize) -> Option<String>;
}

/// A text buffer backed by a `ropey::Rope`.
#[derive(Clone)]
pub struct Buffer {
    rope: Rope,
    cursor: usize,
    pub name: String,
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("name", &self.name)
            .field("len_bytes", &self.rope.len_bytes())
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Buffer {
    /// Construct a buffer from an in-memory string slice. The cursor starts at the end.
    pub fn from_str(name: impl Into<String>, content: &str) -> Self {
        Self {
            rope: Rope::from_str(content),
            cursor: content.len(),
            name: name.into(),
        }
    }

    /// Append text at the end of the buffer and park the cursor after it.
    pub fn append(&mut self, text: &str) {
        let end = self.rope.len_chars();
        self.rope.insert(end, text);
        self.cursor = self.rope.len_bytes();
    }

    fn clamp_offset(&self, offset: usize) -> usize {
        let offset = offset.min(self.rope.len_bytes());
        // Snap back onto a char boundary.
        let char_idx = self.rope.byte_to_char(offset);
        self.rope.char_to_byte(char_idx)
    }
}

impl HostBuffer for Buffer {
    fn value(&self) -> String {
        self.rope.to_string()
    }

    fn set_value(&mut self, text: &str) {
        self.rope = Rope::from_str(text);
        self.cursor = self.clamp_offset(self.cursor);
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, offset: usize) {
        self.cursor = self.clamp_offset(offset);
    }

    fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn line(&self, idx: usize) -> Option<String> {
        if idx < self.rope.len_lines() {
            Some(self.rope.line(idx).to_string())
        } else {
            None
        }
    }
}

/// Grapheme helpers used to keep split points on user-perceived characters.
pub mod grapheme {
    use unicode_segmentation::UnicodeSegmentation;

    /// Previous grapheme boundary (returns 0 if already at or below 1st boundary).
    pub fn prev_boundary(text: &str, byte: usize) -> usize {
        if byte == 0 || byte > text.len() {
            return 0;
        }
        let mut last = 0;
        for (idx, _) in text.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            last = idx;
        }
        last
    }

    /// Largest grapheme boundary `<= byte` (the end of the text counts as a boundary).
    pub fn snap_back(text: &str, byte: usize) -> usize {
        if byte >= text.len() {
            return text.len();
        }
        if text.grapheme_indices(true).any(|(idx, _)| idx == byte) {
            return byte;
        }
        prev_boundary(text, byte)
    }
}

#[cfg(test)]
mod tests {
    use super::grapheme;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn create_buffer_and_read_line() {
        let b = Buffer::from_str("test", "hello\nworld");
        assert_eq!(b.line_count(), 2);
        assert_eq!(b.line(0).unwrap(), "hello\n");
        assert_eq!(b.line(1).unwrap(), "world");
        assert_eq!(b.cursor(), "hello\nworld".len());
    }

    #[test]
    fn set_value_clamps_cursor() {
        let mut b = Buffer::from_str("t", "a long line of text");
        b.set_value("short");
        assert_eq!(b.value(), "short");
        assert_eq!(b.cursor(), 5);
    }

    #[test]
    fn set_cursor_snaps_to_char_boundary() {
        let mut b = Buffer::from_str("t", "aé");
        // byte 2 is inside the two-byte 'é'
        b.set_cursor(2);
        assert_eq!(b.cursor(), 1);
    }

    #[test]
    fn append_moves_cursor_to_end() {
        let mut b = Buffer::from_str("t", "Once");
        b.set_cursor(0);
        b.append(" upon");
        assert_eq!(b.value(), "Once upon");
        assert_eq!(b.cursor(), 9);
    }

    #[test]
    fn grapheme_combining_mark_is_one_cluster() {
        let s = "e\u{0301}x";
        assert_eq!(grapheme::prev_boundary(s, 3), 0);
        // inside the cluster snaps back to its start
        assert_eq!(grapheme::snap_back(s, 1), 0);
        assert_eq!(grapheme::snap_back(s, 3), 3);
        assert_eq!(grapheme::snap_back(s, 99), s.len());
    }
}
