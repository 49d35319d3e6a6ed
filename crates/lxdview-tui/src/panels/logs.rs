//! Captured service events: LXD requests, refresh failures and socket notices.

use lxdview_core::{LogEntry, LogReader};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Row, Table},
};
use tracing::Level;

use super::PanelState;

/// Targets are shown without the crate prefix.
const TARGET_PREFIX: &str = "lxdview_core::";

pub struct LogsPanel {
    reader: LogReader,
    entries: Vec<LogEntry>,
    /// Rows between the newest entry and the bottom of the view.
    from_newest: usize,
    /// Pinned to the newest entry; any upward scroll releases it.
    pinned: bool,
}

impl LogsPanel {
    pub fn new(reader: LogReader) -> Self {
        Self {
            reader,
            entries: Vec::new(),
            from_newest: 0,
            pinned: true,
        }
    }

    /// Take a fresh snapshot. An unpinned view keeps its distance from the
    /// newest entry, clamped to what is still buffered.
    pub fn refresh(&mut self) {
        self.entries = self.reader.entries();
        self.from_newest = if self.pinned {
            0
        } else {
            self.from_newest.min(self.entries.len().saturating_sub(1))
        };
    }

    /// Entries at WARN or ERROR in the current snapshot.
    pub fn problem_count(&self) -> usize {
        self.entries.iter().filter(|e| e.level <= Level::WARN).count()
    }

    /// Label for the tab bar; problems are counted so they show from any panel.
    pub fn tab_label(&self) -> String {
        match self.problem_count() {
            0 => "Logs".to_string(),
            n => format!("Logs ({n}!)"),
        }
    }

    fn title(&self) -> String {
        let failures = self.entries.iter().filter(|e| is_refresh_failure(e)).count();
        let mut title = format!(" Logs ({})", self.entries.len());
        if failures > 0 {
            title.push_str(&format!(" {failures} refresh failed"));
        }
        if !self.pinned {
            title.push_str(" [paused]");
        }
        title.push(' ');
        title
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().title(self.title()).borders(Borders::ALL);

        if self.entries.is_empty() {
            let empty = Paragraph::new("  (nothing logged yet)")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(empty, area);
            return;
        }

        let height = area.height.saturating_sub(2) as usize;
        let end = self.entries.len() - self.from_newest;
        let start = end.saturating_sub(height);

        let rows: Vec<Row> = self.entries[start..end].iter().map(entry_row).collect();
        let widths = [
            Constraint::Length(9),
            Constraint::Length(5),
            Constraint::Length(14),
            Constraint::Fill(2),
            Constraint::Fill(3),
        ];
        frame.render_widget(Table::new(rows, widths).block(block), area);
    }
}

fn entry_row(entry: &LogEntry) -> Row<'static> {
    let level_color = match entry.level {
        Level::ERROR => Color::Red,
        Level::WARN => Color::Yellow,
        Level::INFO => Color::Green,
        Level::DEBUG => Color::Blue,
        Level::TRACE => Color::DarkGray,
    };
    let message_style = if is_refresh_failure(entry) {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let fields: Vec<Span> = split_fields(&entry.fields)
        .into_iter()
        .flat_map(|(key, value)| {
            [
                Span::styled(format!("{key}="), Style::default().fg(Color::DarkGray)),
                Span::styled(format!("{value} "), field_style(key, value)),
            ]
        })
        .collect();

    Row::new(vec![
        Line::styled(
            format!("{:>8.2}s", entry.elapsed_secs),
            Style::default().fg(Color::DarkGray),
        ),
        Line::styled(entry.level.to_string(), Style::default().fg(level_color)),
        Line::styled(
            entry.target.trim_start_matches(TARGET_PREFIX).to_string(),
            Style::default().fg(Color::DarkGray),
        ),
        Line::styled(entry.message.clone(), message_style),
        Line::from(fields),
    ])
}

fn field_style(key: &str, value: &str) -> Style {
    match key {
        "uri" => Style::default().fg(Color::Cyan),
        "status" if value.starts_with('2') => Style::default().fg(Color::Green),
        "status" => Style::default().fg(Color::Red),
        "kind" => Style::default().fg(Color::Magenta),
        "error" => Style::default().fg(Color::Red),
        _ => Style::default(),
    }
}

/// A failed refresh is logged at ERROR with the resource kind attached.
fn is_refresh_failure(entry: &LogEntry) -> bool {
    entry.level == Level::ERROR && split_fields(&entry.fields).iter().any(|(k, _)| *k == "kind")
}

/// Split `key=value` pairs. Values may contain spaces (`status=200 OK`), so a
/// new pair starts only at a word that carries its own `=`.
fn split_fields(fields: &str) -> Vec<(&str, &str)> {
    let mut pairs: Vec<(&str, &str)> = Vec::new();
    let mut rest = fields;
    while let Some((key, after)) = rest.split_once('=') {
        let mut end = after.len();
        let mut search = 0;
        while let Some(space) = after[search..].find(' ') {
            let at = search + space;
            let word = after[at + 1..].split(' ').next().unwrap_or_default();
            if word.contains('=') {
                end = at;
                break;
            }
            search = at + 1;
        }
        pairs.push((key.trim(), &after[..end]));
        rest = after[end..].trim_start();
    }
    pairs
}

impl PanelState for LogsPanel {
    fn scroll_down(&mut self, n: usize) {
        self.from_newest = self.from_newest.saturating_sub(n);
        if self.from_newest == 0 {
            self.pinned = true;
        }
    }

    fn scroll_up(&mut self, n: usize) {
        let oldest = self.entries.len().saturating_sub(1);
        self.from_newest = (self.from_newest + n).min(oldest);
        self.pinned = false;
    }

    fn scroll_to_top(&mut self) {
        self.scroll_up(self.entries.len());
    }

    fn scroll_to_bottom(&mut self) {
        self.from_newest = 0;
        self.pinned = true;
    }
}
