#![deny(unsafe_code)]

//! lxdview CLI: list and watch the state of the local LXD daemon.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use lxdview_config::{AppConfig, DEFAULT_CONFIG_FILE, LxdConfig};
use lxdview_core::discovery::{Discovery, HostEnvironment, SocketDiscovery};
use lxdview_core::{
    Dispose, Image, Instance, IssueReport, ListOptions, LxdClient, Network, Notice, NoticeLevel,
    ResourceCollection, ResourceKind, ResourceRow, StateService, StoragePool, env_filter,
};

/// lxdview: observe instances, images, networks, and storage pools of the
/// local LXD daemon.
#[derive(Parser)]
#[command(name = "lxdview", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Talk to this LXD unix socket instead of the configured or detected one.
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List one kind of resource once and exit.
    List(ListArgs),

    /// Poll the daemon and print every change until interrupted.
    ///
    /// Send SIGHUP to reload the configuration file.
    Watch,

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },

    /// Print the environment summary to include in bug reports.
    ReportIssue,
}

#[derive(Args, Debug, Clone, PartialEq)]
struct ListArgs {
    kind: KindArg,

    /// List across all projects.
    #[arg(long, conflicts_with = "project")]
    all_projects: bool,

    /// Project to list from.
    #[arg(long)]
    project: Option<String>,

    /// Server-side filter expression, e.g. `status eq Running`.
    #[arg(long)]
    filter: Option<String>,

    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

impl ListArgs {
    fn list_options(&self) -> ListOptions {
        ListOptions {
            all_projects: self.all_projects.then_some(true),
            project: self.project.clone(),
            filter: self.filter.clone(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum KindArg {
    Instances,
    Images,
    Networks,
    StoragePools,
}

impl From<KindArg> for ResourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Instances => ResourceKind::Instances,
            KindArg::Images => ResourceKind::Images,
            KindArg::Networks => ResourceKind::Networks,
            KindArg::StoragePools => ResourceKind::StoragePools,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config).await?;
    apply_socket_override(&mut config.lxd, cli.socket.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.logging.level, cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List(args) => {
            let output = list_output(&config.lxd, &args).await?;
            print!("{output}");
        }
        Commands::Watch => cmd_watch(&cli.config, cli.socket.as_deref(), config).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
        Commands::ReportIssue => cmd_report_issue(&config.lxd),
    }

    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    Ok(AppConfig::load_or_default(path).await?)
}

fn apply_socket_override(lxd: &mut LxdConfig, socket: Option<&Path>) {
    if let Some(socket) = socket {
        lxd.socket_path = socket.display().to_string();
    }
}

/// Resolve the socket and connect, turning discovery failures into the same
/// messages the service publishes as notices.
fn connect(lxd: &LxdConfig) -> Result<LxdClient> {
    match SocketDiscovery::from_env().resolve(lxd) {
        Discovery::Found { path, source } => {
            debug!(path = %path.display(), source = %source, "Using LXD unix-socket");
            Ok(LxdClient::connect(path)?)
        }
        Discovery::Unsupported { reason } => bail!("{}", Notice::unsupported_environment(&reason)),
        Discovery::ConfiguredMissing(path) => bail!("{}", Notice::configured_socket_missing(&path)),
        Discovery::NotFound { .. } => bail!("{}", Notice::socket_not_found()),
    }
}

async fn list_output(lxd: &LxdConfig, args: &ListArgs) -> Result<String> {
    let client = connect(lxd)?;
    let options = args.list_options();
    info!(kind = %ResourceKind::from(args.kind), "Listing");

    let output = match args.kind {
        KindArg::Instances => render(&client.list_instances(&options).await?, args.json)?,
        KindArg::Images => render(&client.list_images(&options).await?, args.json)?,
        KindArg::Networks => render(&client.list_networks(&options).await?, args.json)?,
        KindArg::StoragePools => render(&client.list_storage_pools(&options).await?, args.json)?,
    };
    Ok(output)
}

// ── Rendering ──────────────────────────────────────────────────────────

fn render<T: ResourceRow + Serialize>(items: &[T], json: bool) -> Result<String> {
    if json {
        let mut out = serde_json::to_string_pretty(items)?;
        out.push('\n');
        Ok(out)
    } else {
        Ok(render_table(items))
    }
}

fn render_table<T: ResourceRow>(items: &[T]) -> String {
    let rows: Vec<Vec<String>> = items.iter().map(ResourceRow::cells).collect();
    let mut widths: Vec<usize> = T::HEADERS.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| -> String {
        let line = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        format!("{}\n", line.trim_end())
    };

    let headers: Vec<String> = T::HEADERS.iter().map(|h| h.to_string()).collect();
    let mut out = format_row(&headers);
    for row in &rows {
        out.push_str(&format_row(row));
    }
    out
}

fn render_change<T: ResourceRow>(collection: &ResourceCollection<T>) -> String {
    let marker = if collection.stale { " [stale]" } else { "" };
    format!(
        "── {} ({}){marker}\n{}",
        T::KIND.title(),
        collection.len(),
        render_table(&collection.items)
    )
}

fn print_notice(notice: &Notice) {
    let level = match notice.level {
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    eprintln!("{level}: {notice}");
}

// ── Commands ───────────────────────────────────────────────────────────

async fn cmd_watch(config_path: &Path, socket: Option<&Path>, config: AppConfig) -> Result<()> {
    let service = StateService::from_env(config.lxd.clone());
    for notice in service.notices() {
        print_notice(&notice);
    }

    let _subscriptions = [
        service.on_notice().subscribe(print_notice),
        service
            .on_did_change_instances()
            .subscribe(|c| print!("{}", render_change(c))),
        service
            .on_did_change_images()
            .subscribe(|c| print!("{}", render_change(c))),
        service
            .on_did_change_networks()
            .subscribe(|c| print!("{}", render_change(c))),
        service
            .on_did_change_storage_pools()
            .subscribe(|c| print!("{}", render_change(c))),
    ];

    let (config_tx, config_rx) = watch::channel(config);
    let watcher = service.watch_config(config_rx);
    let poller = service.start();
    let mut hangup = signal(SignalKind::hangup())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
            _ = hangup.recv() => match load_config(config_path).await {
                Ok(mut reloaded) => {
                    apply_socket_override(&mut reloaded.lxd, socket);
                    info!(path = %config_path.display(), "Reloaded configuration");
                    config_tx.send_replace(reloaded);
                }
                Err(e) => warn!(path = %config_path.display(), error = %e, "Keeping previous configuration"),
            },
        }
    }

    service.dispose()?;
    let _ = poller.await;
    let _ = watcher.await;
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        println!("{}", config.to_toml()?);
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

fn cmd_report_issue(lxd: &LxdConfig) {
    let socket = match SocketDiscovery::from_env().resolve(lxd) {
        Discovery::Found { path, .. } => Some(path),
        _ => None,
    };
    print!("{}", IssueReport::collect(HostEnvironment::detect(), socket));
}

#[cfg(test)]
mod tests {
    use super::*;
    use lxdview_test_utils::config::TestConfigBuilder;
    use lxdview_test_utils::fake_lxd::FakeLxd;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_list_with_options() {
        let cli = Cli::try_parse_from([
            "lxdview",
            "list",
            "storage-pools",
            "--filter",
            "name eq default",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::List(args) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.kind, KindArg::StoragePools);
        assert_eq!(
            args.list_options(),
            ListOptions::default().with_filter("name eq default")
        );
    }

    #[test]
    fn test_all_projects_conflicts_with_project() {
        let result = Cli::try_parse_from([
            "lxdview",
            "list",
            "instances",
            "--all-projects",
            "--project",
            "dev",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Cli::try_parse_from(["lxdview", "list", "containers"]).is_err());
    }

    #[test]
    fn test_socket_override() {
        let cli = Cli::try_parse_from(["lxdview", "watch", "--socket", "/tmp/lxd.sock"]).unwrap();
        let mut lxd = LxdConfig::default();
        apply_socket_override(&mut lxd, cli.socket.as_deref());
        assert_eq!(lxd.socket_path, "/tmp/lxd.sock");
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let instances = vec![
            Instance {
                name: "web".to_string(),
                status: "Running".to_string(),
            },
            Instance {
                name: "database".to_string(),
                status: "Stopped".to_string(),
            },
        ];
        assert_eq!(
            render_table(&instances),
            "NAME      STATUS\nweb       Running\ndatabase  Stopped\n"
        );
    }

    #[test]
    fn test_render_change_marks_stale() {
        let collection = ResourceCollection {
            items: vec![Network {
                name: "lxdbr0".to_string(),
            }],
            stale: true,
        };
        let text = render_change(&collection);
        assert!(text.starts_with("── Networks (1) [stale]\n"));
        assert!(text.ends_with("lxdbr0\n"));
    }

    #[test_log::test(tokio::test)]
    async fn test_list_output_against_fake_daemon() {
        let fake = FakeLxd::start().await;
        fake.add_image("06b86454720d");
        let lxd = TestConfigBuilder::new()
            .socket_path(fake.socket_path())
            .build_lxd();
        let args = ListArgs {
            kind: KindArg::Images,
            all_projects: false,
            project: None,
            filter: None,
            json: true,
        };

        let output = list_output(&lxd, &args).await.unwrap();
        let images: Vec<Image> = serde_json::from_str(&output).unwrap();
        assert_eq!(
            images,
            vec![Image {
                fingerprint: "06b86454720d".to_string()
            }]
        );

        fake.shutdown().await;
    }

    #[test_log::test(tokio::test)]
    async fn test_list_output_missing_configured_socket() {
        let tmp = tempfile::TempDir::new().unwrap();
        let lxd = TestConfigBuilder::new()
            .socket_path(&tmp.path().join("missing.socket"))
            .build_lxd();
        let args = ListArgs {
            kind: KindArg::Instances,
            all_projects: false,
            project: None,
            filter: None,
            json: false,
        };

        let err = list_output(&lxd, &args).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
