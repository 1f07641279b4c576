//! `tracing-subscriber` initialization, ported from the donor's
//! `ando-server::main` setup: `RUST_LOG` wins when set, otherwise the
//! `--log-level` CLI flag picks the global filter.

use tracing_subscriber::EnvFilter;

/// Install the process-wide `tracing` subscriber. `default_level` is used
/// when the `RUST_LOG` environment variable is unset.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
