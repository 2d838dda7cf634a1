/// Scrolling tail of recent log events, drawn beside the main view.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use tracing::Level;

use crate::logging::DebugLog;

fn level_style(level: Level) -> Style {
    let color = match level {
        Level::ERROR => Color::Red,
        Level::WARN => Color::Yellow,
        Level::INFO => Color::Rgb(0, 180, 80),
        Level::DEBUG => Color::Rgb(100, 180, 220),
        Level::TRACE => Color::DarkGray,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Always pinned to the newest lines.
pub fn draw_debug(f: &mut Frame, log: &DebugLog, area: Rect) {
    let block = Block::default()
        .title(Span::styled(
            format!(" Debug log ({}) ", log.len()),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Rgb(60, 60, 80)))
        .style(Style::default().bg(Color::Rgb(6, 6, 12)));
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    if log.is_empty() {
        f.render_widget(
            Paragraph::new(Span::styled("no events yet", Style::default().fg(Color::Rgb(70, 70, 90)))),
            inner,
        );
        return;
    }

    let lines: Vec<Line> = log
        .tail(inner.height as usize)
        .into_iter()
        .map(|line| {
            Line::from(vec![
                Span::styled(format!("{} ", line.time), Style::default().fg(Color::DarkGray)),
                Span::styled(format!("{:<5} ", line.level.as_str()), level_style(line.level)),
                Span::styled(line.text, Style::default().fg(Color::White)),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}
