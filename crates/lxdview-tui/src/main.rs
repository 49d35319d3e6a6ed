#![deny(unsafe_code)]

//! lxdview TUI: browse the local LXD daemon's resources in the terminal.

mod app;
mod keymap;
mod panels;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use lxdview_config::{AppConfig, DEFAULT_CONFIG_FILE};
use lxdview_core::logging::DEFAULT_LOG_CAPACITY;
use lxdview_core::{
    Dispose, HostEnvironment, IssueReport, LogCollector, StateService, Subscription, env_filter,
};
use ratatui::prelude::*;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::app::{App, Command, UiEvent};

const TICK: Duration = Duration::from_millis(100);

/// Terminal panels for the instances, images, networks, and storage pools of
/// the local LXD daemon.
#[derive(Parser, Debug)]
#[command(name = "lxdview-tui", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Talk to this LXD unix socket instead of the configured or detected one.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// The file configuration with command-line overrides applied.
    fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(socket) = &self.socket {
            config.lxd.socket_path = socket.display().to_string();
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone();
    let config = AppConfig::load_or_default(&config_path)
        .await
        .with_context(|| format!("loading {}", config_path.display()))?;
    let config = cli.apply(config);

    // Events go to the Logs panel only; stdout belongs to the terminal UI.
    let collector = LogCollector::new(DEFAULT_LOG_CAPACITY);
    let log_reader = collector.reader();
    tracing_subscriber::registry()
        .with(env_filter(&config.logging.level, cli.verbose))
        .with(collector)
        .init();

    info!(version = %lxdview_core::build_info::version_string(), "Starting lxdview TUI");

    let service = StateService::from_env(config.lxd.clone());
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let subscriptions = forward_changes(&service, &ui_tx);

    let report = IssueReport::collect(HostEnvironment::detect(), service.socket_path());
    let mut app = App::new(report, log_reader);
    for notice in service.notices() {
        app.apply(UiEvent::Notice(notice));
    }

    let (config_tx, config_rx) = watch::channel(config);
    let watcher = service.watch_config(config_rx);
    let poller = service.start();

    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let result = run(
        &mut terminal,
        &mut app,
        &service,
        &mut ui_rx,
        &ui_tx,
        &config_tx,
        &config_path,
    )
    .await;

    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    for subscription in &subscriptions {
        subscription.unsubscribe();
    }
    service.dispose()?;
    let _ = poller.await;
    let _ = watcher.await;

    result
}

/// Subscribe to every service event and forward it into the UI loop.
fn forward_changes(
    service: &Arc<StateService>,
    tx: &mpsc::UnboundedSender<UiEvent>,
) -> Vec<Subscription> {
    let notices = tx.clone();
    let instances = tx.clone();
    let images = tx.clone();
    let networks = tx.clone();
    let pools = tx.clone();
    vec![
        service
            .on_notice()
            .subscribe(move |n| {
                let _ = notices.send(UiEvent::Notice(n.clone()));
            }),
        service
            .on_did_change_instances()
            .subscribe(move |c| {
                let _ = instances.send(UiEvent::Instances(c.clone()));
            }),
        service
            .on_did_change_images()
            .subscribe(move |c| {
                let _ = images.send(UiEvent::Images(c.clone()));
            }),
        service
            .on_did_change_networks()
            .subscribe(move |c| {
                let _ = networks.send(UiEvent::Networks(c.clone()));
            }),
        service
            .on_did_change_storage_pools()
            .subscribe(move |c| {
                let _ = pools.send(UiEvent::StoragePools(c.clone()));
            }),
    ]
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    service: &Arc<StateService>,
    ui_rx: &mut mpsc::UnboundedReceiver<UiEvent>,
    ui_tx: &mpsc::UnboundedSender<UiEvent>,
    config_tx: &watch::Sender<AppConfig>,
    config_path: &Path,
) -> Result<()> {
    while !app.should_quit {
        while let Ok(event) = ui_rx.try_recv() {
            app.apply(event);
        }
        app.help.set_socket(service.socket_path());
        app.tick();

        terminal.draw(|frame| app.render(frame))?;

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let action = app.keymap.resolve(key.code);
                    if let Some(command) = app.handle_action(action) {
                        execute(command, service, ui_tx, config_tx, config_path).await;
                    }
                }
            }
        }
    }
    Ok(())
}

async fn execute(
    command: Command,
    service: &Arc<StateService>,
    ui_tx: &mpsc::UnboundedSender<UiEvent>,
    config_tx: &watch::Sender<AppConfig>,
    config_path: &Path,
) {
    match command {
        Command::Refresh(kind) => {
            let service = Arc::clone(service);
            let tx = ui_tx.clone();
            tokio::spawn(async move {
                let status = match service.refresh_kind(kind).await {
                    Ok(()) => format!("{} refreshed", kind.title()),
                    Err(e) => format!("Refresh failed: {e}"),
                };
                let _ = tx.send(UiEvent::Status(status));
            });
        }
        Command::RefreshAll => {
            let service = Arc::clone(service);
            let tx = ui_tx.clone();
            tokio::spawn(async move {
                let status = match service.refresh().await {
                    Ok(()) => "All resources refreshed".to_string(),
                    Err(e) => format!("Refresh failed: {e}"),
                };
                let _ = tx.send(UiEvent::Status(status));
            });
        }
        Command::SuppressUnsupportedWarning => {
            let status = match suppress_in_file(config_path).await {
                Ok(()) => format!("Saved to {}", config_path.display()),
                Err(e) => {
                    warn!(path = %config_path.display(), error = %e, "Could not save configuration");
                    format!("Could not save configuration: {e}")
                }
            };
            config_tx.send_modify(|config| config.lxd.suppress_unsupported_environment_warning = true);
            let _ = ui_tx.send(UiEvent::Status(status));
        }
    }
}

/// Persist the flag without writing command-line overrides into the file.
async fn suppress_in_file(path: &Path) -> Result<()> {
    let mut config = AppConfig::load_or_default(path).await?;
    config.lxd.suppress_unsupported_environment_warning = true;
    config.save(path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["lxdview-tui"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(cli.socket, None);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "lxdview-tui",
            "-c",
            "/etc/lxdview.toml",
            "--socket",
            "/run/lxd.socket",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/lxdview.toml"));
        assert_eq!(cli.verbose, 2);

        let config = cli.apply(AppConfig::default());
        assert_eq!(config.lxd.socket_path, "/run/lxd.socket");
    }

    #[test]
    fn test_cli_rejects_positional_config() {
        assert!(Cli::try_parse_from(["lxdview-tui", "lxdview.toml"]).is_err());
    }

    #[tokio::test]
    async fn test_suppress_keeps_socket_override_out_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lxdview.toml");
        AppConfig::default().save(&path).await.unwrap();

        let cli = Cli::try_parse_from(["lxdview-tui", "--socket", "/tmp/other.socket"]).unwrap();
        let (config_tx, config_rx) = watch::channel(cli.apply(AppConfig::load(&path).await.unwrap()));
        let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
        let service = StateService::from_env(config_rx.borrow().lxd.clone());

        execute(Command::SuppressUnsupportedWarning, &service, &ui_tx, &config_tx, &path).await;

        let saved = AppConfig::load(&path).await.unwrap();
        assert!(saved.lxd.suppress_unsupported_environment_warning);
        assert_eq!(saved.lxd.socket_path, AppConfig::default().lxd.socket_path);
        assert!(config_rx.borrow().lxd.suppress_unsupported_environment_warning);
        assert_eq!(config_rx.borrow().lxd.socket_path, "/tmp/other.socket");
        assert!(matches!(ui_rx.try_recv(), Ok(UiEvent::Status(s)) if s.starts_with("Saved to")));
    }
}
