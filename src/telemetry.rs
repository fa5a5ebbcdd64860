//! Tracing subscriber installation.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a stderr `fmt` subscriber once per process.
///
/// `RUST_LOG` takes precedence over `default_directive`. Later calls are no-ops, as is
/// the first call when another subscriber is already registered.
pub fn install_tracing_subscriber(default_directive: &str) {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
