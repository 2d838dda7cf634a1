/// Cursor-aware line buffer shared by every editable surface: the compose box,
/// the in-place passage editor and the one-line prompts.
///
/// Columns count chars, never bytes, so every edit lands on a UTF-8 boundary.
/// Out-of-range requests are clamped rather than rejected.
use crate::wrap::{self, WrapLayout};

// ── Cursor ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
}

// ── TextBuffer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TextBuffer {
    /// Always holds at least one (possibly empty) line.
    lines: Vec<String>,
    cursor: Cursor,
    /// First visible display row, kept in step with the cursor by `viewport`.
    scroll: usize,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
            cursor: Cursor::default(),
            scroll: 0,
        }
    }

    /// Split `text` on `\n` into logical lines; the cursor starts at the top.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
            cursor: Cursor::default(),
            scroll: 0,
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.is_empty())
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Move the cursor, clamping both coordinates into range.
    pub fn set_cursor(&mut self, row: usize, col: usize) {
        let row = row.min(self.lines.len() - 1);
        let col = col.min(char_len(&self.lines[row]));
        self.cursor = Cursor { row, col };
    }

    // ── Editing ───────────────────────────────────────────────────────────────

    pub fn insert_char(&mut self, ch: char) {
        if ch == '\n' {
            self.insert_newline();
            return;
        }
        let line = &mut self.lines[self.cursor.row];
        let at = byte_index(line, self.cursor.col);
        line.insert(at, ch);
        self.cursor.col += 1;
    }

    /// Insert pasted text. `\r\n`, `\r` and `\n` all split lines, tabs
    /// become four spaces, other control characters are dropped.
    pub fn insert_str(&mut self, text: &str) {
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        for ch in text.chars() {
            match ch {
                '\n' => self.insert_newline(),
                '\t' => {
                    for _ in 0..4 {
                        self.insert_char(' ');
                    }
                }
                c if c.is_control() => {}
                c => self.insert_char(c),
            }
        }
    }

    pub fn insert_newline(&mut self) {
        let row = self.cursor.row;
        let at = byte_index(&self.lines[row], self.cursor.col);
        let tail = self.lines[row].split_off(at);
        self.lines.insert(row + 1, tail);
        self.cursor = Cursor { row: row + 1, col: 0 };
    }

    /// Delete the char before the cursor, or join this line onto the previous
    /// one when sitting at column 0. No-op at (0, 0).
    pub fn backspace(&mut self) {
        let Cursor { row, col } = self.cursor;
        if col > 0 {
            let line = &mut self.lines[row];
            let start = byte_index(line, col - 1);
            let end = byte_index(line, col);
            line.replace_range(start..end, "");
            self.cursor.col -= 1;
        } else if row > 0 {
            let current = self.lines.remove(row);
            let prev = &mut self.lines[row - 1];
            let joint = char_len(prev);
            prev.push_str(&current);
            self.cursor = Cursor { row: row - 1, col: joint };
        }
    }

    /// Delete the char under the cursor, or pull the next line up when at the
    /// end of a line. No-op at the end of the last line.
    pub fn delete(&mut self) {
        let Cursor { row, col } = self.cursor;
        let len = char_len(&self.lines[row]);
        if col < len {
            let line = &mut self.lines[row];
            let start = byte_index(line, col);
            let end = byte_index(line, col + 1);
            line.replace_range(start..end, "");
        } else if row + 1 < self.lines.len() {
            let next = self.lines.remove(row + 1);
            self.lines[row].push_str(&next);
        }
    }

    // ── Movement ──────────────────────────────────────────────────────────────

    pub fn move_left(&mut self) {
        if self.cursor.col > 0 {
            self.cursor.col -= 1;
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
            self.cursor.col = char_len(&self.lines[self.cursor.row]);
        }
    }

    pub fn move_right(&mut self) {
        if self.cursor.col < char_len(&self.lines[self.cursor.row]) {
            self.cursor.col += 1;
        } else if self.cursor.row + 1 < self.lines.len() {
            self.cursor.row += 1;
            self.cursor.col = 0;
        }
    }

    pub fn move_up(&mut self) {
        if self.cursor.row > 0 {
            self.cursor.row -= 1;
            self.clamp_col();
        }
    }

    pub fn move_down(&mut self) {
        if self.cursor.row + 1 < self.lines.len() {
            self.cursor.row += 1;
            self.clamp_col();
        }
    }

    pub fn move_home(&mut self) {
        self.cursor.col = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor.col = char_len(&self.lines[self.cursor.row]);
    }

    fn clamp_col(&mut self) {
        self.cursor.col = self.cursor.col.min(char_len(&self.lines[self.cursor.row]));
    }

    // ── Display ───────────────────────────────────────────────────────────────

    /// Wrap the buffer for a `width` × `height` viewport and scroll just enough
    /// to keep the cursor row on screen. Recomputed on every call, so a resize
    /// is picked up on the next frame.
    pub fn viewport(&mut self, width: usize, height: usize) -> WrapLayout {
        let layout = wrap::layout(&self.lines, self.cursor, width);
        self.scroll = wrap::follow_cursor(self.scroll, layout.cursor_row, layout.rows.len(), height);
        layout
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of char column `col`, or the string length past the end.
fn byte_index(s: &str, col: usize) -> usize {
    s.char_indices().nth(col).map(|(i, _)| i).unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_cursor_valid(buf: &TextBuffer) {
        let c = buf.cursor();
        assert!(c.row < buf.lines().len(), "row {} out of range", c.row);
        assert!(
            c.col <= buf.lines()[c.row].chars().count(),
            "col {} past end of {:?}",
            c.col,
            buf.lines()[c.row]
        );
    }

    #[derive(Clone, Copy, Debug)]
    enum Op {
        Char,
        Newline,
        Backspace,
        Delete,
        Left,
        Right,
        Up,
        Down,
        Home,
        End,
    }

    const OPS: [Op; 10] = [
        Op::Char,
        Op::Newline,
        Op::Backspace,
        Op::Delete,
        Op::Left,
        Op::Right,
        Op::Up,
        Op::Down,
        Op::Home,
        Op::End,
    ];

    fn apply(buf: &mut TextBuffer, op: Op, step: usize) {
        match op {
            Op::Char => buf.insert_char(if step % 3 == 0 { 'é' } else { 'x' }),
            Op::Newline => buf.insert_newline(),
            Op::Backspace => buf.backspace(),
            Op::Delete => buf.delete(),
            Op::Left => buf.move_left(),
            Op::Right => buf.move_right(),
            Op::Up => buf.move_up(),
            Op::Down => buf.move_down(),
            Op::Home => buf.move_home(),
            Op::End => buf.move_end(),
        }
    }

    #[test]
    fn test_cursor_stays_in_range_for_op_sequences() {
        // Walk a family of pseudo-random op sequences from several seeds.
        for seed in 0..40usize {
            let mut buf = TextBuffer::from_text("ab\n\ncdéf gh\nz");
            let mut state = seed.wrapping_mul(2654435761) | 1;
            for step in 0..300 {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let op = OPS[state % OPS.len()];
                apply(&mut buf, op, step);
                assert_cursor_valid(&buf);
            }
        }
    }

    #[test]
    fn test_backspace_at_origin_is_noop() {
        let mut buf = TextBuffer::from_text("hello\nworld");
        buf.backspace();
        assert_eq!(buf.text(), "hello\nworld");
        assert_eq!(buf.cursor(), Cursor { row: 0, col: 0 });
    }

    #[test]
    fn test_delete_at_end_of_last_line_is_noop() {
        let mut buf = TextBuffer::from_text("hello\nworld");
        buf.set_cursor(1, 5);
        buf.delete();
        assert_eq!(buf.text(), "hello\nworld");
        assert_eq!(buf.cursor(), Cursor { row: 1, col: 5 });
    }

    #[test]
    fn test_newline_then_backspace_round_trips() {
        for col in 0..=5 {
            let mut buf = TextBuffer::from_text("hello");
            buf.set_cursor(0, col);
            buf.insert_newline();
            assert_eq!(buf.lines().len(), 2);
            assert_eq!(buf.cursor(), Cursor { row: 1, col: 0 });
            buf.backspace();
            assert_eq!(buf.text(), "hello");
            assert_eq!(buf.cursor(), Cursor { row: 0, col });
        }
    }

    #[test]
    fn test_backspace_joins_lines() {
        let mut buf = TextBuffer::from_text("foo\nbar");
        buf.set_cursor(1, 0);
        buf.backspace();
        assert_eq!(buf.text(), "foobar");
        assert_eq!(buf.cursor(), Cursor { row: 0, col: 3 });
    }

    #[test]
    fn test_delete_pulls_next_line_up() {
        let mut buf = TextBuffer::from_text("foo\nbar");
        buf.set_cursor(0, 3);
        buf.delete();
        assert_eq!(buf.text(), "foobar");
        assert_eq!(buf.cursor(), Cursor { row: 0, col: 3 });
    }

    #[test]
    fn test_insert_char_is_utf8_safe() {
        let mut buf = TextBuffer::from_text("naïve");
        buf.set_cursor(0, 3);
        buf.insert_char('X');
        assert_eq!(buf.text(), "naïXve");
        buf.backspace();
        buf.backspace();
        assert_eq!(buf.text(), "nave");
        assert_eq!(buf.cursor(), Cursor { row: 0, col: 2 });
    }

    #[test]
    fn test_left_right_wrap_across_lines() {
        let mut buf = TextBuffer::from_text("ab\ncd");
        buf.set_cursor(1, 0);
        buf.move_left();
        assert_eq!(buf.cursor(), Cursor { row: 0, col: 2 });
        buf.move_right();
        assert_eq!(buf.cursor(), Cursor { row: 1, col: 0 });
    }

    #[test]
    fn test_up_down_clamp_to_shorter_line() {
        let mut buf = TextBuffer::from_text("long line\nab\nanother long");
        buf.set_cursor(0, 8);
        buf.move_down();
        assert_eq!(buf.cursor(), Cursor { row: 1, col: 2 });
        buf.move_down();
        assert_eq!(buf.cursor(), Cursor { row: 2, col: 2 });
        buf.move_down();
        assert_eq!(buf.cursor(), Cursor { row: 2, col: 2 });
    }

    #[test]
    fn test_home_end() {
        let mut buf = TextBuffer::from_text("abc");
        buf.move_end();
        assert_eq!(buf.cursor().col, 3);
        buf.move_home();
        assert_eq!(buf.cursor().col, 0);
    }

    #[test]
    fn test_set_cursor_clamps() {
        let mut buf = TextBuffer::from_text("abc\nd");
        buf.set_cursor(10, 10);
        assert_eq!(buf.cursor(), Cursor { row: 1, col: 1 });
    }

    #[test]
    fn test_insert_str_splits_lines_on_crlf() {
        let mut buf = TextBuffer::new();
        buf.insert_str("one\r\ntwo\tx");
        assert_eq!(buf.text(), "one\ntwo    x");
        assert_eq!(buf.cursor(), Cursor { row: 1, col: 8 });
    }

    #[test]
    fn test_insert_str_treats_bare_cr_as_newline() {
        let mut buf = TextBuffer::new();
        buf.insert_str("first paragraph\rsecond paragraph");
        assert_eq!(buf.text(), "first paragraph\nsecond paragraph");
        assert_eq!(buf.lines().len(), 2);

        let mut buf = TextBuffer::new();
        buf.insert_str("a\r\rb\r\nc\u{7}");
        assert_eq!(buf.text(), "a\n\nb\nc");
        assert_eq!(buf.cursor(), Cursor { row: 3, col: 1 });
    }

    #[test]
    fn test_is_empty() {
        assert!(TextBuffer::new().is_empty());
        assert!(TextBuffer::from_text("\n\n").is_empty());
        assert!(!TextBuffer::from_text("\na").is_empty());
    }

    #[test]
    fn test_viewport_follows_cursor() {
        let mut buf = TextBuffer::from_text("1\n2\n3\n4\n5\n6");
        buf.set_cursor(5, 0);
        let layout = buf.viewport(10, 3);
        assert_eq!(layout.cursor_row, 5);
        assert_eq!(buf.scroll(), 3);
        buf.set_cursor(0, 0);
        buf.viewport(10, 3);
        assert_eq!(buf.scroll(), 0);
    }
}
