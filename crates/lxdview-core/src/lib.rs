#![deny(unsafe_code)]

//! lxdview core runtime.
//!
//! Talks to the local LXD daemon over its Unix socket REST API and keeps the
//! four resource collections (instances, images, networks, storage pools) up
//! to date. Display adapters (CLI, TUI) subscribe to the [`StateService`]
//! change events and re-render.

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Locating the LXD unix socket on the host.
pub mod discovery;
/// Ordered release of owned resources.
pub mod dispose;
/// Documentation links and issue report summary.
pub mod help;
/// Listener lists with explicit unsubscribe.
pub mod event;
/// Log collector and filter setup.
pub mod logging;
/// LXD REST API client over the unix socket.
pub mod lxd;
/// User-facing notices published by the service.
pub mod notice;
/// Polling state service.
pub mod service;

pub use discovery::{AppHost, Discovery, HostEnvironment, SocketDiscovery, SocketSource};
pub use dispose::{DisposableStack, Dispose, DisposeError};
pub use event::{Event, EventEmitter, Subscription};
pub use help::{HELP_LINKS, HelpLink, IssueReport};
pub use logging::{LogCollector, LogEntry, LogReader, env_filter};
pub use lxd::{
    DaemonError, Image, Instance, InstanceIdentifier, ListOptions, LxdClient, LxdError, Network,
    ResourceKind, ResourceRow, StoragePool,
};
pub use notice::{Notice, NoticeKind, NoticeLevel};
pub use service::{ResourceCollection, ServiceError, StateService};
