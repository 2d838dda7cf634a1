/// Popups drawn over the main layout: operation menus and the small
/// save / quit / instructions prompts.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use super::render::{BufferStyle, draw_buffer};
use super::{AppState, MenuSide, Mode, menu_items};

// ── Operation menus ───────────────────────────────────────────────────────────

/// Left menu hugs the left edge, right menu the right edge, both centred
/// vertically.
pub fn draw_menu(f: &mut Frame, state: &AppState, side: MenuSide, area: Rect) {
    let items = menu_items(side);
    let width = 34u16.min(area.width.saturating_sub(4));
    let height = (items.len() as u16 + 2).min(area.height.saturating_sub(2));
    let x = match side {
        MenuSide::Left => area.x + 2,
        MenuSide::Right => area.x + area.width.saturating_sub(width + 2),
    };
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let popup_area = Rect { x, y, width, height };

    f.render_widget(Clear, popup_area);

    let list_items: Vec<ListItem<'static>> = items
        .iter()
        .enumerate()
        .map(|(i, (kind, hotkey))| {
            let (key_style, label_style) = if i == state.menu_selected {
                (
                    Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD),
                    Style::default().fg(Color::Black).bg(Color::Cyan),
                )
            } else {
                (
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    Style::default().fg(Color::White),
                )
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!(" [{hotkey}] "), key_style),
                Span::styled(format!("{:<24}", kind.title()), label_style),
            ]))
        })
        .collect();

    let title = match side {
        MenuSide::Left => " ← Reroll ",
        MenuSide::Right => " Refine → ",
    };
    let block = Block::default()
        .title(Span::styled(
            title,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    f.render_widget(List::new(list_items).block(block), popup_area);
}

// ── Text prompts ──────────────────────────────────────────────────────────────

pub fn draw_prompt(f: &mut Frame, state: &mut AppState, area: Rect) {
    let (title, placeholder, height) = match state.mode {
        Mode::SaveAs { .. } => (
            " Save as ".to_string(),
            "document.json",
            3u16,
        ),
        Mode::Instructions(kind) => (
            format!(" {} ", kind.title()),
            "what should change?",
            5u16,
        ),
        _ => return,
    };

    let width = 64u16.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let popup_area = Rect { x, y, width, height };

    f.render_widget(Clear, popup_area);
    draw_buffer(
        f,
        &mut state.prompt,
        popup_area,
        BufferStyle { title: &title, placeholder, focused: true, accent: Color::Yellow },
    );
}

pub fn draw_confirm_quit(f: &mut Frame, area: Rect) {
    let width = 44u16.min(area.width.saturating_sub(4));
    let height = 3u16.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let popup_area = Rect { x, y, width, height };

    f.render_widget(Clear, popup_area);

    let line = Line::from(vec![
        Span::styled(" Unsaved changes. Save? ", Style::default().fg(Color::White)),
        Span::styled("y", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::styled(" / ", Style::default().fg(Color::DarkGray)),
        Span::styled("n", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::styled(" / ", Style::default().fg(Color::DarkGray)),
        Span::styled("c", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
    ]);
    let block = Block::default()
        .title(Span::styled(
            " Quit ",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    f.render_widget(Paragraph::new(line).block(block), popup_area);
}
