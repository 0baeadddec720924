use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style, Modifier},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};

use autodraw_core::types::SessionState;
use crate::App;

fn banner(state: &SessionState) -> (String, Color) {
    match state {
        SessionState::Idle => ("READY (Press S to draw)".into(), Color::Blue),
        SessionState::Planning => ("PLANNING...".into(), Color::Yellow),
        SessionState::Executing => ("DRAWING (Press Esc to stop)".into(), Color::Green),
        SessionState::Cancelled => ("STOPPED (Press S to draw again)".into(), Color::Yellow),
        SessionState::Completed => ("DONE (Press S to draw again)".into(), Color::Cyan),
        SessionState::Failed(_) => ("FAILED (see logs)".into(), Color::Red),
    }
}

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    // -- Left panel: drawing summary and progress --

    let state = app.session_state();
    let (banner_label, banner_bg) = banner(&state);

    let mut lines: Vec<Line> = Vec::new();

    // Help line as first content line inside the bordered panel
    lines.push(Line::from(vec![
        Span::styled(" s", Style::default().fg(Color::Yellow)),
        Span::raw(" draw, "),
        Span::styled("esc", Style::default().fg(Color::Yellow)),
        Span::raw(" stop, "),
        Span::styled("l", Style::default().fg(Color::Yellow)),
        Span::raw(" logs, "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" quit"),
    ]));
    lines.push(Line::from(""));

    let label_width = app.summary.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (label, value) in &app.summary {
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {:<width$}  ", label, width = label_width),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(
                value.clone(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    if let SessionState::Failed(reason) = &state {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", reason),
            Style::default().fg(Color::Red),
        )));
    }

    // Split left panel into banner (1 line) + summary (fills space) + gauge
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(3)])
        .split(chunks[0]);

    // Full-width centered banner
    let banner_width = left_chunks[0].width as usize;
    let pad_total = banner_width.saturating_sub(banner_label.len());
    let pad_left = pad_total / 2;
    let pad_right = pad_total - pad_left;
    let centered_banner = format!("{}{}{}", " ".repeat(pad_left), banner_label, " ".repeat(pad_right));
    let banner = Paragraph::new(Line::from(Span::styled(
        centered_banner,
        Style::default().fg(Color::Black).bg(banner_bg).add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, left_chunks[0]);

    let summary = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(summary, left_chunks[1]);

    let (ratio, label) = match app.progress {
        Some(p) => (
            (p.percent() / 100.0).clamp(0.0, 1.0),
            format!("{}/{} actions  {:.1}s", p.completed, p.total, p.elapsed.as_secs_f64()),
        ),
        None => (0.0, "not started".to_string()),
    };
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Progress ")
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .gauge_style(Style::default().fg(banner_bg).bg(Color::Black))
        .ratio(ratio)
        .label(label);
    f.render_widget(gauge, left_chunks[2]);

    // -- Right panel: logs --
    if app.log_visible && chunks.len() > 1 {
        let visible_height = chunks[1].height.saturating_sub(2) as usize;
        let total = app.log_messages.len();
        let max_scroll = total.saturating_sub(visible_height);
        let scroll = app.log_scroll.min(max_scroll);
        let start = total.saturating_sub(visible_height + scroll);
        let end = total.saturating_sub(scroll);
        let log_lines: Vec<Line> = app.log_messages[start..end]
            .iter()
            .map(|m| parse_log_line(m))
            .collect();

        let log_panel = Paragraph::new(log_lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Logs ")
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(log_panel, chunks[1]);
    }

    if let Some(dialog) = &app.confirm {
        dialog.render(f);
    }
}

fn prefix_color(idx: &str) -> Color {
    match idx {
        "1" => Color::DarkGray,
        "2" => Color::LightBlue,
        "3" => Color::LightMagenta,
        _ => Color::White,
    }
}

/// Render a `level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage` line. Anything
/// else is shown as is.
fn parse_log_line(raw: &str) -> Line<'_> {
    let parts: Vec<&str> = raw.splitn(5, '\x1f').collect();
    let [level, prefix, color, timestamp, message] = parts[..] else {
        return Line::from(raw);
    };
    let tint = Style::default().fg(prefix_color(color));

    let mut spans = vec![Span::styled(timestamp, Style::default().fg(Color::DarkGray)), Span::raw(" ")];
    match level {
        "ERROR" => spans.push(Span::styled("error ", Style::default().fg(Color::Red))),
        "WARN" => spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow))),
        _ => {}
    }
    if !prefix.is_empty() {
        spans.push(Span::styled(prefix, tint.add_modifier(Modifier::BOLD)));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(message, tint));
    Line::from(spans)
}
