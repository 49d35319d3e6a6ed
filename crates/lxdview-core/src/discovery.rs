//! Locating the LXD unix socket on the host.
//!
//! Resolution order, each step gated on the path existing:
//!
//! 1. the configured `lxd.socket_path`, if non-empty (no fallback when it
//!    is missing);
//! 2. `$LXD_DIR/unix.socket`;
//! 3. the snap socket;
//! 4. the classic system socket.

use std::fmt;
use std::path::{Path, PathBuf};

use lxdview_config::LxdConfig;
use tracing::debug;

/// Socket of the classic (deb/rpm) LXD packaging.
pub const CLASSIC_SOCKET_PATH: &str = "/var/lib/lxd/unix.socket";

/// Socket of the snap-packaged LXD.
pub const SNAP_SOCKET_PATH: &str = "/var/snap/lxd/common/lxd/unix.socket";

/// Environment variable naming the LXD state directory.
pub const LXD_DIR_ENV: &str = "LXD_DIR";

pub const SOCKET_FILE_NAME: &str = "unix.socket";

/// How the process is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppHost {
    /// A native process with access to the local filesystem.
    Desktop,
    /// A sandboxed web/wasm host without local sockets.
    Web,
}

impl fmt::Display for AppHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppHost::Desktop => f.write_str("desktop"),
            AppHost::Web => f.write_str("web"),
        }
    }
}

/// The facts about the host that decide whether LXD can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    pub app_host: AppHost,
    /// `std::env::consts::OS` style name.
    pub os: String,
}

impl HostEnvironment {
    pub fn detect() -> Self {
        let app_host = if cfg!(target_family = "wasm") {
            AppHost::Web
        } else {
            AppHost::Desktop
        };
        Self {
            app_host,
            os: std::env::consts::OS.to_string(),
        }
    }

    /// `None` if supported, otherwise the reason it is not.
    pub fn unsupported_reason(&self) -> Option<String> {
        if self.app_host != AppHost::Desktop {
            Some(format!("App host = {}", self.app_host))
        } else if self.os != "linux" {
            Some(format!("Platform = {}", self.os))
        } else {
            None
        }
    }
}

/// Where a discovered socket came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketSource {
    Configured,
    LxdDir,
    Snap,
    Classic,
}

impl fmt::Display for SocketSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SocketSource::Configured => "configured",
            SocketSource::LxdDir => "LXD_DIR",
            SocketSource::Snap => "snap",
            SocketSource::Classic => "classic",
        };
        f.write_str(s)
    }
}

/// Outcome of socket resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Unsupported { reason: String },
    ConfiguredMissing(PathBuf),
    NotFound { tried: Vec<PathBuf> },
    Found { path: PathBuf, source: SocketSource },
}

/// Inputs for socket resolution. Built from the real host with
/// [`from_env`](Self::from_env); tests point the paths at temp dirs.
#[derive(Debug, Clone)]
pub struct SocketDiscovery {
    pub host: HostEnvironment,
    pub lxd_dir: Option<PathBuf>,
    pub snap_path: PathBuf,
    pub classic_path: PathBuf,
}

impl SocketDiscovery {
    pub fn from_env() -> Self {
        let lxd_dir = std::env::var_os(LXD_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self {
            host: HostEnvironment::detect(),
            lxd_dir,
            snap_path: PathBuf::from(SNAP_SOCKET_PATH),
            classic_path: PathBuf::from(CLASSIC_SOCKET_PATH),
        }
    }

    /// Autodetect candidates in the order they are tried.
    pub fn candidates(&self) -> Vec<(PathBuf, SocketSource)> {
        let mut candidates = Vec::with_capacity(3);
        if let Some(dir) = &self.lxd_dir {
            candidates.push((dir.join(SOCKET_FILE_NAME), SocketSource::LxdDir));
        }
        candidates.push((self.snap_path.clone(), SocketSource::Snap));
        candidates.push((self.classic_path.clone(), SocketSource::Classic));
        candidates
    }

    pub fn resolve(&self, config: &LxdConfig) -> Discovery {
        if let Some(reason) = self.host.unsupported_reason() {
            return Discovery::Unsupported { reason };
        }

        if let Some(path) = config.socket_override() {
            return if path_exists(&path) {
                Discovery::Found {
                    path,
                    source: SocketSource::Configured,
                }
            } else {
                Discovery::ConfiguredMissing(path)
            };
        }

        let candidates = self.candidates();
        for (path, source) in &candidates {
            debug!(path = %path.display(), source = %source, "Checking LXD socket candidate");
            if path_exists(path) {
                return Discovery::Found {
                    path: path.clone(),
                    source: *source,
                };
            }
        }

        Discovery::NotFound {
            tried: candidates.into_iter().map(|(path, _)| path).collect(),
        }
    }
}

fn path_exists(path: &Path) -> bool {
    // follows symlinks
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn linux() -> HostEnvironment {
        HostEnvironment {
            app_host: AppHost::Desktop,
            os: "linux".to_string(),
        }
    }

    struct Layout {
        _tmp: TempDir,
        discovery: SocketDiscovery,
    }

    fn layout(with_lxd_dir: bool) -> Layout {
        let tmp = TempDir::new().unwrap();
        let lxd_dir = tmp.path().join("lxd-dir");
        std::fs::create_dir_all(&lxd_dir).unwrap();
        let discovery = SocketDiscovery {
            host: linux(),
            lxd_dir: with_lxd_dir.then_some(lxd_dir),
            snap_path: tmp.path().join("snap.socket"),
            classic_path: tmp.path().join("classic.socket"),
        };
        Layout {
            _tmp: tmp,
            discovery,
        }
    }

    fn touch(path: &Path) {
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_unsupported_platform() {
        let mut l = layout(false);
        l.discovery.host.os = "macos".to_string();
        assert_eq!(
            l.discovery.resolve(&LxdConfig::default()),
            Discovery::Unsupported {
                reason: "Platform = macos".to_string()
            }
        );
    }

    #[test]
    fn test_unsupported_app_host_checked_first() {
        let mut l = layout(false);
        l.discovery.host = HostEnvironment {
            app_host: AppHost::Web,
            os: "windows".to_string(),
        };
        assert!(matches!(
            l.discovery.resolve(&LxdConfig::default()),
            Discovery::Unsupported { reason } if reason == "App host = web"
        ));
    }

    #[test]
    fn test_configured_path_wins() {
        let l = layout(true);
        touch(&l.discovery.classic_path);
        let configured = l.discovery.snap_path.with_file_name("custom.socket");
        touch(&configured);

        let config = LxdConfig {
            socket_path: configured.display().to_string(),
            ..LxdConfig::default()
        };
        assert_eq!(
            l.discovery.resolve(&config),
            Discovery::Found {
                path: configured,
                source: SocketSource::Configured
            }
        );
    }

    #[test]
    fn test_configured_path_missing_does_not_fall_back() {
        let l = layout(false);
        touch(&l.discovery.classic_path);
        let config = LxdConfig {
            socket_path: "/definitely/not/here.socket".to_string(),
            ..LxdConfig::default()
        };
        assert_eq!(
            l.discovery.resolve(&config),
            Discovery::ConfiguredMissing(PathBuf::from("/definitely/not/here.socket"))
        );
    }

    #[test]
    fn test_lxd_dir_before_snap_and_classic() {
        let l = layout(true);
        let lxd_dir_socket = l.discovery.lxd_dir.as_ref().unwrap().join(SOCKET_FILE_NAME);
        touch(&lxd_dir_socket);
        touch(&l.discovery.snap_path);
        touch(&l.discovery.classic_path);

        assert_eq!(
            l.discovery.resolve(&LxdConfig::default()),
            Discovery::Found {
                path: lxd_dir_socket,
                source: SocketSource::LxdDir
            }
        );
    }

    #[test]
    fn test_missing_lxd_dir_socket_falls_back_to_snap() {
        let l = layout(true);
        touch(&l.discovery.snap_path);
        touch(&l.discovery.classic_path);

        assert_eq!(
            l.discovery.resolve(&LxdConfig::default()),
            Discovery::Found {
                path: l.discovery.snap_path.clone(),
                source: SocketSource::Snap
            }
        );
    }

    #[test]
    fn test_classic_is_last_resort() {
        let l = layout(false);
        touch(&l.discovery.classic_path);

        assert_eq!(
            l.discovery.resolve(&LxdConfig::default()),
            Discovery::Found {
                path: l.discovery.classic_path.clone(),
                source: SocketSource::Classic
            }
        );
    }

    #[test]
    fn test_nothing_found_reports_every_candidate() {
        let l = layout(true);
        let Discovery::NotFound { tried } = l.discovery.resolve(&LxdConfig::default()) else {
            panic!("expected NotFound");
        };
        assert_eq!(tried.len(), 3);
        assert!(tried[0].ends_with(SOCKET_FILE_NAME));
        assert_eq!(tried[1], l.discovery.snap_path);
        assert_eq!(tried[2], l.discovery.classic_path);
    }
}
