/// Ratatui draw entry-point for scribe.
/// Thin dispatcher; the passage list lives in passages.rs, popups in overlays.rs.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use super::passages::spinner_frame;
use super::{AppState, Mode};
use crate::buffer::TextBuffer;

pub fn draw(f: &mut Frame, state: &mut AppState) {
    let area = match &state.debug_log {
        Some(log) => {
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(f.area());
            super::debug_pane::draw_debug(f, log, cols[1]);
            cols[0]
        }
        None => f.area(),
    };

    // The passage editor gets more room than the compose box.
    let input_height = if state.mode == Mode::EditingPassage {
        (area.height / 2).max(5)
    } else {
        7
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),            // header
            Constraint::Min(0),               // passages
            Constraint::Length(input_height), // compose / editor
            Constraint::Length(1),            // status bar
            Constraint::Length(1),            // key hints
        ])
        .split(area);

    draw_header(f, state, chunks[0]);
    super::passages::draw_passages(f, state, chunks[1]);
    draw_input(f, state, chunks[2]);
    draw_status_bar(f, state, chunks[3]);
    draw_hints(f, state, chunks[4]);

    match state.mode {
        Mode::Menu(side) => super::overlays::draw_menu(f, state, side, area),
        Mode::SaveAs { .. } | Mode::Instructions(_) => {
            super::overlays::draw_prompt(f, state, area)
        }
        Mode::ConfirmQuit => super::overlays::draw_confirm_quit(f, area),
        _ => {}
    }
}

// ── Header ────────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, state: &AppState, area: Rect) {
    let name = &state.doc.meta.document_name;
    let dirty = if state.doc.is_modified() { " *" } else { "" };
    let mode_color = match state.mode {
        Mode::Composing => Color::Cyan,
        Mode::Browsing | Mode::Menu(_) => Color::Rgb(140, 120, 220),
        Mode::EditingPassage => Color::Rgb(200, 160, 50),
        _ => Color::Yellow,
    };

    let line = Line::from(vec![
        Span::styled(" ✎ scribe", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::styled("  ", Style::default()),
        Span::styled(name.clone(), Style::default().fg(Color::Rgb(100, 180, 220))),
        Span::styled(dirty, Style::default().fg(Color::Rgb(255, 140, 0)).add_modifier(Modifier::BOLD)),
        Span::styled("  ·  ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("[{}]", state.mode.label()),
            Style::default().fg(mode_color).add_modifier(Modifier::BOLD),
        ),
        Span::styled("  ·  ", Style::default().fg(Color::DarkGray)),
        Span::styled(state.profile.clone(), Style::default().fg(Color::Cyan)),
        Span::styled(" / ", Style::default().fg(Color::DarkGray)),
        Span::styled(state.model.clone(), Style::default().fg(Color::Rgb(100, 180, 220))),
    ]);

    f.render_widget(
        Paragraph::new(line).style(Style::default().bg(Color::Rgb(6, 6, 12))),
        area,
    );
}

// ── Compose box / passage editor ──────────────────────────────────────────────

fn draw_input(f: &mut Frame, state: &mut AppState, area: Rect) {
    if state.mode == Mode::EditingPassage {
        let title = match state.selected {
            Some(i) => format!(" Editing passage {} ", i + 1),
            None => " Editing ".to_string(),
        };
        draw_buffer(
            f,
            &mut state.editor,
            area,
            BufferStyle { title: &title, placeholder: "", focused: true, accent: Color::Rgb(200, 160, 50) },
        );
        return;
    }

    let focused = state.mode == Mode::Composing;
    let accent = if focused { Color::Cyan } else { Color::Rgb(60, 60, 80) };
    draw_buffer(
        f,
        &mut state.compose,
        area,
        BufferStyle {
            title: " Compose ",
            placeholder: "write a rough draft · Enter submit · Alt+Enter newline",
            focused,
            accent,
        },
    );
}

pub(super) struct BufferStyle<'a> {
    pub title: &'a str,
    pub placeholder: &'a str,
    pub focused: bool,
    pub accent: Color,
}

/// Render a soft-wrapped `TextBuffer` inside a bordered box and, when focused,
/// put the terminal cursor on its edit position.
pub(super) fn draw_buffer(f: &mut Frame, buf: &mut TextBuffer, area: Rect, style: BufferStyle<'_>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(style.accent))
        .title(Span::styled(style.title.to_string(), Style::default().fg(style.accent)))
        .style(Style::default().bg(Color::Rgb(8, 8, 14)));
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    if buf.is_empty() && !style.placeholder.is_empty() {
        f.render_widget(
            Paragraph::new(Span::styled(
                style.placeholder.to_string(),
                Style::default().fg(Color::Rgb(70, 70, 90)),
            )),
            inner,
        );
        if style.focused {
            f.set_cursor_position((inner.x, inner.y));
        }
        return;
    }

    let height = inner.height as usize;
    let layout = buf.viewport(inner.width as usize, height);
    let scroll = buf.scroll();
    let lines: Vec<Line> = layout
        .rows
        .iter()
        .skip(scroll)
        .take(height)
        .map(|row| Line::from(Span::styled(row.text.clone(), Style::default().fg(Color::White))))
        .collect();
    f.render_widget(Paragraph::new(lines), inner);

    if style.focused && layout.cursor_row >= scroll && layout.cursor_row < scroll + height {
        let x = inner.x + (layout.cursor_col as u16).min(inner.width.saturating_sub(1));
        let y = inner.y + (layout.cursor_row - scroll) as u16;
        f.set_cursor_position((x, y));
    }
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let busy = state.jobs.is_busy();
    let (glyph, msg, glyph_color) = if busy {
        spinner_frame(state.spinner_tick)
    } else {
        ("▲", "", Color::White)
    };

    let mut spans = vec![
        Span::raw(" "),
        Span::styled(glyph, Style::default().fg(glyph_color).add_modifier(Modifier::BOLD)),
    ];
    if busy {
        spans.push(Span::styled(
            format!(" {} running · {msg}", state.jobs.in_flight()),
            Style::default().fg(glyph_color),
        ));
    }
    let words = state.doc.full_text().split_whitespace().count();
    spans.push(Span::styled(
        format!("  {} passages · {words} words", state.doc.len()),
        Style::default().fg(Color::DarkGray),
    ));
    if let Some(status) = &state.status {
        let color = if status.contains("failed") || status.starts_with("Error") {
            Color::Red
        } else {
            Color::Rgb(0, 180, 80)
        };
        spans.push(Span::styled("  ·  ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(status.clone(), Style::default().fg(color)));
    }

    let bar_style = if busy {
        Style::default().bg(Color::Rgb(15, 15, 25))
    } else {
        Style::default().bg(Color::Rgb(10, 10, 18))
    };
    f.render_widget(Paragraph::new(Line::from(spans)).style(bar_style), area);
}

// ── Key hints ─────────────────────────────────────────────────────────────────

fn hints(mode: Mode) -> &'static str {
    match mode {
        Mode::Composing => "Enter submit · Alt+Enter newline · Tab browse · Ctrl+S save · Ctrl+Q quit",
        Mode::Browsing => {
            "↑↓ select · ← reroll · → refine · Enter edit · Del delete · Alt+↑↓ move · Tab compose"
        }
        Mode::EditingPassage => "Ctrl+S commit · Esc cancel",
        Mode::Menu(_) => "↑↓ choose · Enter run · letter hotkey · Esc close",
        Mode::SaveAs { .. } => "type a file name · Enter save · Esc cancel",
        Mode::ConfirmQuit => "y save and quit · n quit · c cancel",
        Mode::Instructions(_) => "type instructions · Enter run · Esc cancel",
    }
}

fn draw_hints(f: &mut Frame, state: &AppState, area: Rect) {
    let line = Line::from(Span::styled(
        format!(" {}", hints(state.mode)),
        Style::default().fg(Color::Rgb(55, 50, 90)),
    ));
    f.render_widget(
        Paragraph::new(line).style(Style::default().bg(Color::Rgb(7, 7, 14))),
        area,
    );
}
