//! Tracing initialisation for the command-line binary

use std::io::IsTerminal;

use tracing_subscriber::{fmt, EnvFilter};

/// Filter for a verbosity count; `RUST_LOG` wins when nothing was requested
pub fn env_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Install the global subscriber, logging to stderr
///
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(verbose: u8) -> bool {
    fmt()
        .with_env_filter(env_filter(verbose))
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
