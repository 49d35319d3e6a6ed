//! LXD REST API client: HTTP/1.1 over the daemon's Unix domain socket.
//!
//! Only read endpoints are used. Each collection is listed in two phases:
//! the collection endpoint returns resource URIs, then every URI is fetched
//! concurrently and decoded into a display record.
//!
//! ```text
//! ┌──────────────┐  GET /1.0/instances     ┌──────────────┐
//! │  LxdClient   │────────────────────────▶│  LXD daemon  │
//! │              │◀── ["/1.0/instances/a", │  unix.socket │
//! │              │     "/1.0/instances/b"] │              │
//! │              │  GET /1.0/instances/a   │              │
//! │              │  GET /1.0/instances/b   │              │
//! └──────────────┘  (concurrent fan-out)   └──────────────┘
//! ```

pub mod client;
pub mod error;
pub mod identifier;
pub mod types;

pub use client::{BASE_URL, LxdClient};
pub use error::{DaemonError, LxdError};
pub use identifier::InstanceIdentifier;
pub use types::*;
