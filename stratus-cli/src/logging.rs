//! Logging setup for the CLI
//!
//! Human-readable logs go to stderr so command output on stdout stays
//! parseable. With a log directory, JSON logs are also written to a daily
//! rolling file.

use anyhow::{anyhow, Result};
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `level`. The returned guard flushes the
/// file writer and must be held until exit.
pub fn init(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow!("Invalid log level '{}': {}", level, e))?;

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            let (writer, guard) = non_blocking(rolling::daily(dir, "stratus.log"));
            let file_layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .with(file_layer)
                .try_init()?;

            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init()?;

            Ok(None)
        }
    }
}
