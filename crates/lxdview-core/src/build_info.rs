//! Build-time metadata embedded by the build script.
//!
//! Used for the `User-Agent` header sent to the daemon and for the
//! environment summary in issue reports.

/// The git commit hash at build time (short form).
pub const GIT_HASH: &str = env!("LXDVIEW_GIT_HASH");

/// The build profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("LXDVIEW_BUILD_PROFILE");

/// `<arch>-<os>` of the build target.
pub const TARGET: &str = env!("LXDVIEW_TARGET");

/// The crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Return a formatted version string including git hash and profile.
///
/// Example: `"0.1.0 (abc1234, debug)"`
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}

/// Value of the `User-Agent` header on daemon requests.
pub fn user_agent() -> String {
    format!("lxdview/{VERSION}")
}
