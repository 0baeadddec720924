use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};

/// Yes/No prompt drawn over the main view. Starts on "No" so a stray Enter
/// never begins a drawing.
pub struct ConfirmDialog {
    pub question: String,
    /// Dimmed lines under the question.
    pub details: Vec<String>,
    pub selected: bool,
}

impl ConfirmDialog {
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into(), details: Vec::new(), selected: false }
    }

    pub fn with_detail(mut self, line: impl Into<String>) -> Self {
        self.details.push(line.into());
        self
    }

    pub fn toggle(&mut self) {
        self.selected = !self.selected;
    }

    fn lines(&self) -> Vec<Line<'_>> {
        let mut lines = vec![
            Line::raw(""),
            Line::from(Span::styled(
                self.question.as_str(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            )),
        ];
        lines.extend(
            self.details
                .iter()
                .map(|d| Line::from(Span::styled(d.as_str(), Style::default().fg(Color::DarkGray)))),
        );
        lines.push(Line::raw(""));
        lines.push(Line::from(vec![
            button(" Draw ", self.selected, Color::Green),
            Span::raw("    "),
            button(" Not yet ", !self.selected, Color::Red),
        ]));
        lines
    }

    pub fn render(&self, f: &mut Frame) {
        let lines = self.lines();
        let widest = lines.iter().map(|l| l.width()).max().unwrap_or(0) as u16;
        let area = centered_rect(widest.saturating_add(8).max(36), lines.len() as u16 + 2, f.area());

        let dialog = Paragraph::new(lines).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Yellow))
                .title(" autodraw "),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn button(label: &str, active: bool, color: Color) -> Span<'_> {
    let style = if active {
        Style::default().fg(Color::Black).bg(color).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Span::styled(format!("[{}]", label), style)
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
