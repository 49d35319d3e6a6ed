//! Core TUI application state and event handling.

use lxdview_core::{
    Image, Instance, IssueReport, LogReader, Network, Notice, NoticeKind, NoticeLevel,
    ResourceCollection, ResourceKind, StoragePool,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Tabs},
};

use crate::keymap::{Action, KeyMapper};
use crate::panels::{HelpPanel, LogsPanel, PanelState, ResourcePanel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Instances,
    Images,
    Networks,
    Storage,
    Help,
    Logs,
}

pub const ALL_PANELS: [Panel; 6] = [
    Panel::Instances,
    Panel::Images,
    Panel::Networks,
    Panel::Storage,
    Panel::Help,
    Panel::Logs,
];

impl Panel {
    pub fn title(self) -> &'static str {
        match self {
            Panel::Instances => "Instances",
            Panel::Images => "Images",
            Panel::Networks => "Networks",
            Panel::Storage => "Storage",
            Panel::Help => "Help",
            Panel::Logs => "Logs",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Panel::Instances => 0,
            Panel::Images => 1,
            Panel::Networks => 2,
            Panel::Storage => 3,
            Panel::Help => 4,
            Panel::Logs => 5,
        }
    }

    pub fn next(self) -> Self {
        ALL_PANELS[(self.index() + 1) % ALL_PANELS.len()]
    }

    pub fn prev(self) -> Self {
        ALL_PANELS[(self.index() + ALL_PANELS.len() - 1) % ALL_PANELS.len()]
    }

    /// The resource kind this panel shows, if any.
    pub fn kind(self) -> Option<ResourceKind> {
        match self {
            Panel::Instances => Some(ResourceKind::Instances),
            Panel::Images => Some(ResourceKind::Images),
            Panel::Networks => Some(ResourceKind::Networks),
            Panel::Storage => Some(ResourceKind::StoragePools),
            Panel::Help | Panel::Logs => None,
        }
    }
}

/// Updates forwarded from the service into the UI loop.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Instances(ResourceCollection<Instance>),
    Images(ResourceCollection<Image>),
    Networks(ResourceCollection<Network>),
    StoragePools(ResourceCollection<StoragePool>),
    Notice(Notice),
    /// One-line feedback for a user command.
    Status(String),
}

/// Work the app asks the event loop to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Refresh(ResourceKind),
    RefreshAll,
    SuppressUnsupportedWarning,
}

pub struct App {
    pub should_quit: bool,
    pub active_panel: Panel,
    pub keymap: KeyMapper,
    pub instances: ResourcePanel<Instance>,
    pub images: ResourcePanel<Image>,
    pub networks: ResourcePanel<Network>,
    pub storage_pools: ResourcePanel<StoragePool>,
    pub help: HelpPanel,
    pub logs: LogsPanel,
    /// Latest notice from the service, cleared once acted on.
    pub notice: Option<Notice>,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(report: IssueReport, log_reader: LogReader) -> Self {
        Self {
            should_quit: false,
            active_panel: Panel::Instances,
            keymap: KeyMapper::new(),
            instances: ResourcePanel::new(),
            images: ResourcePanel::new(),
            networks: ResourcePanel::new(),
            storage_pools: ResourcePanel::new(),
            help: HelpPanel::new(report),
            logs: LogsPanel::new(log_reader),
            notice: None,
            status_message: None,
        }
    }

    pub fn handle_action(&mut self, action: Action) -> Option<Command> {
        match action {
            Action::Quit => self.should_quit = true,
            Action::NextPanel => self.active_panel = self.active_panel.next(),
            Action::PrevPanel => self.active_panel = self.active_panel.prev(),
            Action::GoToPanel(n) => {
                if let Some(&panel) = ALL_PANELS.get(n) {
                    self.active_panel = panel;
                }
            }
            Action::ScrollDown => self.active_panel_state_mut().scroll_down(1),
            Action::ScrollUp => self.active_panel_state_mut().scroll_up(1),
            Action::HalfPageDown => self.active_panel_state_mut().scroll_down(10),
            Action::HalfPageUp => self.active_panel_state_mut().scroll_up(10),
            Action::ScrollToTop => self.active_panel_state_mut().scroll_to_top(),
            Action::ScrollToBottom => self.active_panel_state_mut().scroll_to_bottom(),
            Action::Refresh => {
                let kind = self.active_panel.kind()?;
                self.status_message = Some(format!("Refreshing {}...", kind.title()));
                return Some(Command::Refresh(kind));
            }
            Action::RefreshAll => {
                self.status_message = Some("Refreshing all resources...".to_string());
                return Some(Command::RefreshAll);
            }
            Action::SuppressWarning => {
                let unsupported = self
                    .notice
                    .as_ref()
                    .is_some_and(|n| n.kind == NoticeKind::UnsupportedEnvironment);
                if unsupported {
                    self.notice = None;
                    return Some(Command::SuppressUnsupportedWarning);
                }
            }
            Action::None => {}
        }
        None
    }

    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Instances(c) => self.instances.update(c),
            UiEvent::Images(c) => self.images.update(c),
            UiEvent::Networks(c) => self.networks.update(c),
            UiEvent::StoragePools(c) => self.storage_pools.update(c),
            UiEvent::Notice(n) => self.notice = Some(n),
            UiEvent::Status(s) => self.status_message = Some(s),
        }
    }

    /// Pull data from sources that are read rather than pushed.
    pub fn tick(&mut self) {
        self.logs.refresh();
    }

    fn active_panel_state_mut(&mut self) -> &mut dyn PanelState {
        match self.active_panel {
            Panel::Instances => &mut self.instances,
            Panel::Images => &mut self.images,
            Panel::Networks => &mut self.networks,
            Panel::Storage => &mut self.storage_pools,
            Panel::Help => &mut self.help,
            Panel::Logs => &mut self.logs,
        }
    }

    fn is_stale(&self, panel: Panel) -> bool {
        match panel {
            Panel::Instances => self.instances.is_stale(),
            Panel::Images => self.images.is_stale(),
            Panel::Networks => self.networks.is_stale(),
            Panel::Storage => self.storage_pools.is_stale(),
            Panel::Help | Panel::Logs => false,
        }
    }

    fn tab_label(&self, panel: Panel) -> String {
        match panel {
            Panel::Logs => self.logs.tab_label(),
            other => other.title().to_string(),
        }
    }

    pub fn status_line(&self) -> String {
        format!(
            " q:quit  Tab/h/l:panels  j/k:move  r:refresh  R:refresh all  1-6:jump  [{panel}]",
            panel = self.active_panel.title()
        )
    }

    pub fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(1),
                Constraint::Length(2),
                Constraint::Length(1),
            ])
            .split(frame.area());

        let titles: Vec<Line> = ALL_PANELS
            .iter()
            .map(|&p| {
                let label = format!("{} {}", p.index() + 1, self.tab_label(p));
                if self.is_stale(p) {
                    Line::from(Span::styled(label, Style::default().fg(Color::Yellow)))
                } else if p == Panel::Logs && self.logs.problem_count() > 0 {
                    Line::from(Span::styled(label, Style::default().fg(Color::Red)))
                } else {
                    Line::from(label)
                }
            })
            .collect();
        let tabs = Tabs::new(titles)
            .select(self.active_panel.index())
            .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(tabs, chunks[0]);

        let area = chunks[1];
        match self.active_panel {
            Panel::Instances => self.instances.render(frame, area),
            Panel::Images => self.images.render(frame, area),
            Panel::Networks => self.networks.render(frame, area),
            Panel::Storage => self.storage_pools.render(frame, area),
            Panel::Help => self.help.render(frame, area),
            Panel::Logs => self.logs.render(frame, area),
        }

        frame.render_widget(self.notice_line(), chunks[2]);

        let status = Paragraph::new(self.status_line()).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(status, chunks[3]);
    }

    fn notice_line(&self) -> Paragraph<'_> {
        let block = Block::default().borders(Borders::TOP);
        match (&self.notice, &self.status_message) {
            (Some(notice), _) => {
                let color = match notice.level {
                    NoticeLevel::Warning => Color::Yellow,
                    NoticeLevel::Error => Color::Red,
                };
                let mut text = notice.to_string();
                if notice.kind == NoticeKind::UnsupportedEnvironment {
                    text.push_str("  [s: don't show again]");
                }
                Paragraph::new(text).style(Style::default().fg(color)).block(block)
            }
            (None, Some(message)) => Paragraph::new(message.as_str()).block(block),
            (None, None) => Paragraph::new("").block(block),
        }
    }
}
