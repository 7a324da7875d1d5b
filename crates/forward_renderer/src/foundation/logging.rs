//! Logging utilities
//!
//! The passes log through the `log` facade: `trace!` for per-pass detail,
//! `debug!` for per-frame summaries and `warn!` for skipped surfaces.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a default filter when `RUST_LOG` is unset
pub fn init_with_default(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}
