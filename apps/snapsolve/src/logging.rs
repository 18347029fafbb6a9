//! Tracing setup. Logs always go to stderr so stdout stays parseable.

use snapsolve_core::config::LoggingConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// `RUST_LOG` wins, then `-v` flags, then the configured level. Without a
/// config only warnings are shown.
pub fn init(verbose: u8, config: Option<&LoggingConfig>) {
    let level = match verbose {
        0 => config.map_or("warn", |c| c.level.as_str()),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = config.is_some_and(|c| c.json);

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("failed to initialize logging: {e}");
    }
}
