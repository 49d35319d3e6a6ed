//! Key bindings.
//!
//! Single keys map straight to an [`Action`]; `g` starts the two-key `gg`
//! sequence.

use crossterm::event::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    NextPanel,
    PrevPanel,
    GoToPanel(usize),
    ScrollDown,
    ScrollUp,
    HalfPageDown,
    HalfPageUp,
    ScrollToTop,
    ScrollToBottom,
    /// Refresh the kind shown in the active panel.
    Refresh,
    RefreshAll,
    /// Stop showing the unsupported-environment warning and persist that.
    SuppressWarning,
    None,
}

pub struct KeyMapper {
    /// First key of a pending two-key sequence.
    pending: Option<KeyCode>,
}

impl KeyMapper {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Feed one key press. Returns [`Action::None`] while a sequence is
    /// pending; an unknown sequence drops the first key.
    pub fn resolve(&mut self, key: KeyCode) -> Action {
        if let Some(prev) = self.pending.take() {
            return self.resolve_sequence(prev, key);
        }

        match key {
            KeyCode::Char('q') => Action::Quit,

            KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => Action::NextPanel,
            KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => Action::PrevPanel,
            KeyCode::Char(c @ '1'..='6') => Action::GoToPanel((c as u8 - b'1') as usize),

            KeyCode::Char('j') | KeyCode::Down => Action::ScrollDown,
            KeyCode::Char('k') | KeyCode::Up => Action::ScrollUp,
            KeyCode::Char('d') | KeyCode::PageDown => Action::HalfPageDown,
            KeyCode::Char('u') | KeyCode::PageUp => Action::HalfPageUp,
            KeyCode::Char('G') | KeyCode::End => Action::ScrollToBottom,
            KeyCode::Home => Action::ScrollToTop,

            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Char('R') => Action::RefreshAll,
            KeyCode::Char('s') => Action::SuppressWarning,

            KeyCode::Char('g') => {
                self.pending = Some(key);
                Action::None
            }

            _ => Action::None,
        }
    }

    fn resolve_sequence(&mut self, first: KeyCode, second: KeyCode) -> Action {
        match (first, second) {
            (KeyCode::Char('g'), KeyCode::Char('g')) => Action::ScrollToTop,
            (_, KeyCode::Esc) => Action::None,
            _ => self.resolve(second),
        }
    }
}

impl Default for KeyMapper {
    fn default() -> Self {
        Self::new()
    }
}
