//! Logging initialization.
//!
//! stdout is reserved for command payloads (status tables, JSON views);
//! all log output goes to stderr. The filter honors `CSCTL_LOG` first,
//! then the verbosity flags.

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem. Call once at startup.
pub fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    // A bare level directive, not per-crate ones: the binary's own events
    // carry the `csctl` target and must pass the filter too.
    let filter =
        EnvFilter::try_from_env("CSCTL_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .without_time();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
