//! User-facing notices published by the service.
//!
//! Socket discovery problems are not errors for the caller: the service keeps
//! running with empty collections. They are surfaced to the user through
//! notices, which the CLI prints and the TUI shows in its status bar.

use std::fmt;
use std::path::Path;

/// Install instructions shown when no socket can be found.
pub const INSTALL_URL: &str = "https://documentation.ubuntu.com/lxd/latest/installing/";

/// Host requirements shown for unsupported environments.
pub const REQUIREMENTS_URL: &str = "https://documentation.ubuntu.com/lxd/latest/requirements/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// What a notice is about, so displays can offer the matching action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Not a desktop host or not Linux. Can be suppressed in the config.
    UnsupportedEnvironment,
    /// `lxd.socket_path` points at nothing.
    ConfiguredSocketMissing,
    /// None of the default socket locations exist.
    SocketNotFound,
    /// A socket path exists but a client could not be created for it.
    ConnectFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub kind: NoticeKind,
    pub message: String,
    /// Documentation link offered alongside the message.
    pub link: Option<&'static str>,
}

impl Notice {
    pub fn unsupported_environment(reason: &str) -> Self {
        Self {
            level: NoticeLevel::Warning,
            kind: NoticeKind::UnsupportedEnvironment,
            message: format!(
                "LXD is not supported in the current environment ({reason}). LXD requires a Linux kernel."
            ),
            link: Some(REQUIREMENTS_URL),
        }
    }

    pub fn configured_socket_missing(path: &Path) -> Self {
        Self {
            level: NoticeLevel::Error,
            kind: NoticeKind::ConfiguredSocketMissing,
            message: format!(
                "The configured LXD unix-socket path '{}' does not exist.",
                path.display()
            ),
            link: None,
        }
    }

    pub fn socket_not_found() -> Self {
        Self {
            level: NoticeLevel::Error,
            kind: NoticeKind::SocketNotFound,
            message: "Could not find LXD unix-socket. Either LXD is not running or not installed."
                .to_string(),
            link: Some(INSTALL_URL),
        }
    }

    pub fn connect_failed(path: &Path, reason: &str) -> Self {
        Self {
            level: NoticeLevel::Error,
            kind: NoticeKind::ConnectFailed,
            message: format!("Cannot use LXD unix-socket '{}': {reason}", path.display()),
            link: None,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(link) = self.link {
            write!(f, " ({link})")?;
        }
        Ok(())
    }
}
