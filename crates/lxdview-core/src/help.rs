//! Documentation links and the environment summary for issue reports.

use std::fmt;
use std::path::PathBuf;

use crate::build_info;
use crate::discovery::HostEnvironment;

/// Where issues are filed.
pub const ISSUE_TRACKER_URL: &str = "https://github.com/lxdview/lxdview/issues";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelpLink {
    pub label: &'static str,
    pub url: &'static str,
}

/// Links shown in the Help panel, in display order.
pub const HELP_LINKS: [HelpLink; 4] = [
    HelpLink {
        label: "First steps with LXD",
        url: "https://documentation.ubuntu.com/lxd/latest/tutorial/first_steps/",
    },
    HelpLink {
        label: "LXD documentation",
        url: "https://documentation.ubuntu.com/lxd/latest/",
    },
    HelpLink {
        label: "LXC man pages",
        url: "https://documentation.ubuntu.com/lxd/latest/reference/manpages/lxc/",
    },
    HelpLink {
        label: "Review existing issues",
        url: ISSUE_TRACKER_URL,
    },
];

/// Facts about this build and host to paste into a bug report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueReport {
    pub version: String,
    pub target: &'static str,
    pub host: HostEnvironment,
    /// Socket in use, if one was found.
    pub socket: Option<PathBuf>,
}

impl IssueReport {
    pub fn collect(host: HostEnvironment, socket: Option<PathBuf>) -> Self {
        Self {
            version: build_info::version_string(),
            target: build_info::TARGET,
            host,
            socket,
        }
    }

    /// `(label, value)` rows in display order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let supported = match self.host.unsupported_reason() {
            None => "yes".to_string(),
            Some(reason) => format!("no ({reason})"),
        };
        vec![
            ("lxdview", self.version.clone()),
            ("target", self.target.to_string()),
            ("host", self.host.app_host.to_string()),
            ("os", self.host.os.clone()),
            ("supported", supported),
            (
                "socket",
                self.socket
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "not found".to_string()),
            ),
        ]
    }
}

impl fmt::Display for IssueReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Please include the following when filing an issue at {ISSUE_TRACKER_URL}:")?;
        writeln!(f)?;
        for (label, value) in self.rows() {
            writeln!(f, "- {label}: {value}")?;
        }
        Ok(())
    }
}
