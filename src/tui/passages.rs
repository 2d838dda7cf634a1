/// Passage list: one card per passage, soft-wrapped to the pane width.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, List, ListItem, Paragraph},
};

use super::{AppState, Mode};
use crate::passage::Passage;
use crate::wrap;

// ── Spinner ───────────────────────────────────────────────────────────────────

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_MSGS: &[(&str, Color)] = &[
    ("drafting…",       Color::Cyan),
    ("polishing…",      Color::Rgb(0, 200, 255)),
    ("choosing words…", Color::Rgb(0, 220, 180)),
    ("reading context…", Color::Cyan),
    ("almost there…",   Color::Rgb(100, 200, 255)),
];

pub fn spinner_frame(tick: u32) -> (&'static str, &'static str, Color) {
    let glyph = SPINNER_GLYPHS[(tick as usize) % SPINNER_GLYPHS.len()];
    // ~2s per message at the 120ms tick
    let (msg, color) = SPINNER_MSGS[(tick as usize / 16) % SPINNER_MSGS.len()];
    (glyph, msg, color)
}

// ── Items ─────────────────────────────────────────────────────────────────────

/// Rows for every passage, plus the `[start, end)` row range of the selected
/// card so the caller can scroll it into view.
pub fn build_items(
    passages: &[Passage],
    selected: Option<usize>,
    highlight: bool,
    tick: u32,
    width: u16,
) -> (Vec<ListItem<'static>>, Option<(usize, usize)>) {
    let mut items: Vec<ListItem<'static>> = Vec::new();
    let mut selected_range = None;
    // "▌ " gutter
    let text_width = (width as usize).saturating_sub(2).max(1);

    for (i, p) in passages.iter().enumerate() {
        let start = items.len();
        let is_selected = highlight && selected == Some(i);
        let (gutter, gutter_color) = if is_selected {
            ("▌ ", Color::Cyan)
        } else {
            ("  ", Color::Reset)
        };

        // Card header
        let mut header = vec![
            Span::styled(gutter, Style::default().fg(gutter_color)),
            Span::styled(
                format!("#{}", i + 1),
                Style::default().fg(if is_selected { Color::White } else { Color::DarkGray })
                    .add_modifier(Modifier::BOLD),
            ),
        ];
        if p.pending {
            let (glyph, msg, color) = spinner_frame(tick);
            header.push(Span::styled(format!("  {glyph} {msg}"), Style::default().fg(color)));
        } else if !p.model.is_empty() {
            header.push(Span::styled(
                format!("  {}", p.model),
                Style::default().fg(Color::Rgb(60, 60, 80)),
            ));
        }
        if p.manual_edited {
            header.push(Span::styled("  ✎", Style::default().fg(Color::Rgb(200, 160, 50))));
        }
        if p.audit_log.len() > 1 {
            header.push(Span::styled(
                format!("  {} revisions", p.audit_log.len()),
                Style::default().fg(Color::Rgb(80, 70, 140)),
            ));
        }
        items.push(ListItem::new(Line::from(header)));

        // Body
        let body_color = if p.pending {
            Color::Rgb(110, 110, 130)
        } else if p.text.starts_with("[ERROR:") {
            Color::Red
        } else {
            Color::Rgb(210, 210, 220)
        };
        let lines: Vec<String> = p.text.split('\n').map(str::to_string).collect();
        for row in wrap::wrap_lines(&lines, text_width) {
            items.push(ListItem::new(Line::from(vec![
                Span::styled(gutter, Style::default().fg(gutter_color)),
                Span::styled(row.text, Style::default().fg(body_color)),
            ])));
        }

        if is_selected {
            selected_range = Some((start, items.len()));
        }
        items.push(ListItem::new(Line::raw("")));
    }

    (items, selected_range)
}

/// First visible row: keep the selected card on screen (its top when it is
/// taller than the pane), otherwise stick to the bottom.
pub fn scroll_for(
    scroll: usize,
    selected: Option<(usize, usize)>,
    total: usize,
    height: usize,
) -> usize {
    let max_scroll = total.saturating_sub(height);
    match selected {
        None => max_scroll,
        Some((start, end)) if end - start > height => start.min(max_scroll),
        Some((start, end)) => {
            let scroll = wrap::follow_cursor(scroll, end.saturating_sub(1), total, height);
            scroll.min(start)
        }
    }
}

pub fn draw_passages(f: &mut Frame, state: &mut AppState, area: Rect) {
    let bg = Block::default().style(Style::default().bg(Color::Rgb(8, 8, 14)));

    if state.doc.is_empty() {
        let hint = Line::from(Span::styled(
            "  No passages yet. Write a draft below and press Enter.",
            Style::default().fg(Color::Rgb(70, 70, 90)),
        ));
        f.render_widget(Paragraph::new(hint).block(bg), area);
        return;
    }

    let highlight = state.mode != Mode::Composing;
    let (items, selected_range) = build_items(
        state.doc.passages(),
        state.selected,
        highlight,
        state.spinner_tick,
        area.width,
    );
    let total = items.len();
    let height = area.height as usize;
    state.list_scroll = scroll_for(state.list_scroll, selected_range, total, height);

    let sliced: Vec<ListItem<'static>> = items.into_iter().skip(state.list_scroll).collect();
    f.render_widget(List::new(sliced).block(bg), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passages(texts: &[&str]) -> Vec<Passage> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mut p = Passage::new_pending(t, i);
                p.complete_pending(t, "m");
                p
            })
            .collect()
    }

    #[test]
    fn test_card_rows_and_selected_range() {
        let ps = passages(&["one", "two\nlines"]);
        let (items, range) = build_items(&ps, Some(1), true, 0, 40);
        // header + 1 row + gap, header + 2 rows + gap
        assert_eq!(items.len(), 7);
        assert_eq!(range, Some((3, 6)));
    }

    #[test]
    fn test_no_highlight_while_composing() {
        let ps = passages(&["one"]);
        let (_, range) = build_items(&ps, Some(0), false, 0, 40);
        assert_eq!(range, None);
    }

    #[test]
    fn test_long_text_wraps_to_width() {
        let ps = passages(&["aaaa bbbb cccc dddd"]);
        let (items, _) = build_items(&ps, None, false, 0, 12);
        // 10 usable cells: two words per row
        assert_eq!(items.len(), 1 + 2 + 1);
    }

    #[test]
    fn test_scroll_sticks_to_bottom_without_selection() {
        assert_eq!(scroll_for(0, None, 50, 10), 40);
        assert_eq!(scroll_for(0, None, 5, 10), 0);
    }

    #[test]
    fn test_scroll_reveals_selection() {
        // Selection below the viewport: scroll until its last row is visible.
        assert_eq!(scroll_for(0, Some((20, 24)), 50, 10), 14);
        // Selection above: scroll up to its first row.
        assert_eq!(scroll_for(30, Some((5, 8)), 50, 10), 5);
        // Already visible: unchanged.
        assert_eq!(scroll_for(10, Some((12, 15)), 50, 10), 10);
        // Taller than the pane: show its top.
        assert_eq!(scroll_for(0, Some((20, 40)), 50, 10), 20);
    }

    #[test]
    fn test_spinner_cycles() {
        assert_eq!(spinner_frame(0).0, SPINNER_GLYPHS[0]);
        assert_eq!(spinner_frame(SPINNER_GLYPHS.len() as u32).0, SPINNER_GLYPHS[0]);
    }
}
