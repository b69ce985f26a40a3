//! tracing subscriber setup for the binary
//!
//! The library only emits events; installing a subscriber is left to
//! whoever runs it.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter directive for a verbosity level (`-v` count)
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn,odincode_fix=info",
        1 => "info,odincode_fix=debug",
        2 => "debug,odincode_fix=trace",
        _ => "trace",
    }
}

/// Install the global subscriber, writing to stderr
///
/// `RUST_LOG` overrides the verbosity-derived filter when set. A second
/// call is a no-op.
pub fn init_logging(verbosity: u8, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let installed = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
