//! Configuration builders for tests.

use std::path::Path;

use lxdview_config::{AppConfig, LxdConfig};

/// Fluent builder for [`AppConfig`] in tests.
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .socket_path(fake.socket_path())
///     .refresh_interval_secs(1)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn socket_path(mut self, path: &Path) -> Self {
        self.config.lxd.socket_path = path.display().to_string();
        self
    }

    pub fn refresh_interval_secs(mut self, secs: u64) -> Self {
        self.config.lxd.refresh_interval_secs = secs;
        self
    }

    pub fn suppress_unsupported_environment_warning(mut self, suppress: bool) -> Self {
        self.config.lxd.suppress_unsupported_environment_warning = suppress;
        self
    }

    pub fn all_projects(mut self, all: bool) -> Self {
        self.config.lxd.all_projects = all;
        self
    }

    pub fn project(mut self, project: &str) -> Self {
        self.config.lxd.project = project.to_string();
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }

    /// Just the `[lxd]` section.
    pub fn build_lxd(self) -> LxdConfig {
        self.config.lxd
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
