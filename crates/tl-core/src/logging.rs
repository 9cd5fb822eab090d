//! Structured logging setup.
//!
//! Filter precedence: `TXLAT_LOG`, then `RUST_LOG`, then the level implied
//! by `-v` (info, debug, trace). Logs go to stderr so report output on
//! stdout stays machine-readable.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a txlat-specific filter directive.
pub const ENV_LOG: &str = "TXLAT_LOG";

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Default level for a verbosity count.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(ENV_LOG)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)))
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(verbosity: u8, format: LogFormat) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = match format {
        LogFormat::Json => subscriber.json().try_init(),
        LogFormat::Text => subscriber.try_init(),
    };
}
