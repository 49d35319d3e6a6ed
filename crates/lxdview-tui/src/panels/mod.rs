//! TUI panel implementations.

mod help;
mod logs;
mod resource;

pub use help::HelpPanel;
pub use logs::LogsPanel;
pub use resource::ResourcePanel;

/// Cursor movement shared by every panel.
pub trait PanelState {
    fn scroll_down(&mut self, n: usize);

    fn scroll_up(&mut self, n: usize);

    fn scroll_to_top(&mut self);

    fn scroll_to_bottom(&mut self);
}
