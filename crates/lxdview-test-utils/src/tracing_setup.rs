//! Tracing initialisation for tests that do not use `test-log`.
//!
//! The subscriber is installed at most once per process, so calling
//! [`init_test_tracing`] from every test is fine.

use tracing_subscriber::EnvFilter;

/// Install a subscriber that writes to the test-harness writer and honours
/// `RUST_LOG` (default `debug` for the lxdview crates).
///
/// ```ignore
/// #[tokio::test]
/// async fn polls() {
///     lxdview_test_utils::tracing_setup::init_test_tracing();
///     tracing::info!("visible with --nocapture");
/// }
/// ```
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lxdview_core=debug,lxdview_config=debug")),
        )
        .with_test_writer()
        .try_init();
    tracing::trace!("test tracing initialised");
}
