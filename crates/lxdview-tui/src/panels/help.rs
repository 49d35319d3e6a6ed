//! Help panel: documentation links, key bindings and the issue-report summary.

use std::path::PathBuf;

use lxdview_core::{HELP_LINKS, IssueReport, help::ISSUE_TRACKER_URL};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

use super::PanelState;

const KEY_BINDINGS: [(&str, &str); 7] = [
    ("r", "refresh the active panel"),
    ("R", "refresh everything"),
    ("s", "stop warning about an unsupported environment"),
    ("Tab/l, BackTab/h", "next / previous panel"),
    ("1-6", "jump to a panel"),
    ("j/k, d/u, gg/G", "move, half page, top / bottom"),
    ("q", "quit"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum HelpLine {
    Heading(&'static str),
    Entry(String, String),
    Blank,
}

pub struct HelpPanel {
    report: IssueReport,
    lines: Vec<HelpLine>,
    scroll_offset: usize,
}

impl HelpPanel {
    pub fn new(report: IssueReport) -> Self {
        let lines = build_lines(&report);
        Self {
            report,
            lines,
            scroll_offset: 0,
        }
    }

    /// Update the socket row after the service switched sockets.
    pub fn set_socket(&mut self, socket: Option<PathBuf>) {
        if self.report.socket != socket {
            self.report.socket = socket;
            self.lines = build_lines(&self.report);
        }
    }

    pub fn report(&self) -> &IssueReport {
        &self.report
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let visible_height = area.height.saturating_sub(2) as usize;

        let visible: Vec<Line> = self
            .lines
            .iter()
            .skip(self.scroll_offset)
            .take(visible_height)
            .map(|line| match line {
                HelpLine::Heading(title) => Line::from(Span::styled(
                    *title,
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
                HelpLine::Entry(label, value) => Line::from(vec![
                    Span::styled(format!("  {label:<18} "), Style::default().fg(Color::Yellow)),
                    Span::raw(value.as_str()),
                ]),
                HelpLine::Blank => Line::default(),
            })
            .collect();

        let paragraph =
            Paragraph::new(visible).block(Block::default().title(" Help ").borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }
}

fn build_lines(report: &IssueReport) -> Vec<HelpLine> {
    let mut lines = vec![HelpLine::Heading("Documentation")];
    lines.extend(
        HELP_LINKS
            .iter()
            .map(|link| HelpLine::Entry(link.label.to_string(), link.url.to_string())),
    );

    lines.push(HelpLine::Blank);
    lines.push(HelpLine::Heading("Keys"));
    lines.extend(
        KEY_BINDINGS
            .iter()
            .map(|(key, what)| HelpLine::Entry(key.to_string(), what.to_string())),
    );

    lines.push(HelpLine::Blank);
    lines.push(HelpLine::Heading("Reporting an issue"));
    lines.push(HelpLine::Entry(
        "tracker".to_string(),
        ISSUE_TRACKER_URL.to_string(),
    ));
    lines.extend(
        report
            .rows()
            .into_iter()
            .map(|(label, value)| HelpLine::Entry(label.to_string(), value)),
    );
    lines
}

impl PanelState for HelpPanel {
    fn scroll_down(&mut self, n: usize) {
        let max = self.lines.len().saturating_sub(1);
        self.scroll_offset = (self.scroll_offset + n).min(max);
    }

    fn scroll_up(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }

    fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll_offset = self.lines.len().saturating_sub(1);
    }
}
