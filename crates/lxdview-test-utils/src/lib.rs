#![deny(unsafe_code)]

//! Shared test utilities for the lxdview workspace.
//!
//! Provides a fake LXD daemon, config builders, and tracing helpers so that
//! individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! lxdview-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fake_lxd;
pub mod tracing_setup;
