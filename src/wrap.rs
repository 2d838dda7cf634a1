/// Soft wrap: maps logical lines onto display rows for a given viewport width.
///
/// Everything here is a pure function of its inputs. Widths are terminal
/// cells (via `unicode-width`), columns into source lines are chars.
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::buffer::Cursor;

/// One on-screen row, borrowed from a slice of a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    /// Index of the logical line this row came from.
    pub source: usize,
    /// Char column in the source line where this row starts.
    pub start_col: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapLayout {
    pub rows: Vec<DisplayRow>,
    pub cursor_row: usize,
    /// Cell offset of the cursor within `rows[cursor_row]`.
    pub cursor_col: usize,
}

fn cell_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

/// Split a line into packing units: a run of non-space chars followed by the
/// spaces after it. A line that starts with spaces yields a spaces-only unit.
fn tokens(line: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut seen_space = false;
    for (i, ch) in line.char_indices() {
        if ch == ' ' {
            seen_space = true;
        } else if seen_space {
            out.push(&line[start..i]);
            start = i;
            seen_space = false;
        }
    }
    if start < line.len() {
        out.push(&line[start..]);
    }
    out
}

/// Wrap a single line into `(start_col, text)` chunks no wider than `width`
/// (a lone wide char excepted). Spaces are kept, so joining the chunks gives
/// back the input exactly.
fn wrap_line(line: &str, width: usize) -> Vec<(usize, String)> {
    let width = width.max(1);
    if line.is_empty() {
        return vec![(0, String::new())];
    }

    let mut rows: Vec<(usize, String)> = Vec::new();
    let mut current = String::new();
    let mut current_start = 0usize;
    let mut current_width = 0usize;
    let mut col = 0usize;

    for token in tokens(line) {
        let word = token.trim_end_matches(' ');
        let spaces = &token[word.len()..];
        let word_width = word.width();

        if current_width + word_width > width && !current.is_empty() {
            rows.push((current_start, std::mem::take(&mut current)));
            current_start = col;
            current_width = 0;
        }

        if word_width > width {
            // Hard split, at least one char per row.
            for ch in word.chars() {
                let w = cell_width(ch);
                if current_width + w > width && !current.is_empty() {
                    rows.push((current_start, std::mem::take(&mut current)));
                    current_start = col;
                    current_width = 0;
                }
                current.push(ch);
                current_width += w;
                col += 1;
            }
        } else {
            current.push_str(word);
            current_width += word_width;
            col += word.chars().count();
        }

        // Spaces that do not fit start the next row rather than overhang.
        for ch in spaces.chars() {
            if current_width + 1 > width && !current.is_empty() {
                rows.push((current_start, std::mem::take(&mut current)));
                current_start = col;
                current_width = 0;
            }
            current.push(ch);
            current_width += 1;
            col += 1;
        }
    }

    if !current.is_empty() {
        rows.push((current_start, current));
    }
    rows
}

/// Wrap every line; each line contributes at least one row.
pub fn wrap_lines(lines: &[String], width: usize) -> Vec<DisplayRow> {
    lines
        .iter()
        .enumerate()
        .flat_map(|(source, line)| {
            wrap_line(line, width)
                .into_iter()
                .map(move |(start_col, text)| DisplayRow { source, start_col, text })
        })
        .collect()
}

/// Wrap `lines` and locate `cursor` on screen.
///
/// A cursor at the end of a line whose last row is already full lands at the
/// start of an empty continuation row, which is where the next typed char
/// would appear.
pub fn layout(lines: &[String], cursor: Cursor, width: usize) -> WrapLayout {
    let width = width.max(1);
    let mut rows = wrap_lines(lines, width);

    let Some(first) = rows.iter().position(|r| r.source == cursor.row) else {
        return WrapLayout { rows, cursor_row: 0, cursor_col: 0 };
    };
    let last = rows[first..]
        .iter()
        .take_while(|r| r.source == cursor.row)
        .count()
        + first
        - 1;

    let line_len = lines[cursor.row].chars().count();
    let col = cursor.col.min(line_len);

    let mut cursor_row = last;
    for (i, row) in rows.iter().enumerate().take(last + 1).skip(first) {
        let len = row.text.chars().count();
        if col < row.start_col + len {
            cursor_row = i;
            break;
        }
    }

    let row = &rows[cursor_row];
    let before: String = row.text.chars().take(col - row.start_col).collect();
    let mut cursor_col = before.width();

    if col == line_len && cursor_row == last && row.text.width() >= width {
        rows.insert(
            last + 1,
            DisplayRow { source: cursor.row, start_col: line_len, text: String::new() },
        );
        return WrapLayout { rows, cursor_row: last + 1, cursor_col: 0 };
    }

    // Only reachable when a single wide char is wider than the viewport.
    if cursor_col >= width {
        cursor_col = width - 1;
    }
    WrapLayout { rows, cursor_row, cursor_col }
}

/// Smallest scroll change that keeps `cursor_row` within a `height`-row
/// window; unchanged when it is already visible.
pub fn follow_cursor(scroll: usize, cursor_row: usize, total_rows: usize, height: usize) -> usize {
    let height = height.max(1);
    let mut scroll = scroll;
    if cursor_row < scroll {
        scroll = cursor_row;
    } else if cursor_row >= scroll + height {
        scroll = cursor_row + 1 - height;
    }
    scroll.min(total_rows.saturating_sub(height))
}
