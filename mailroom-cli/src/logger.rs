//! Logging setup: fmt layer on stderr, optionally teed to a log file.

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;

use tracing_subscriber::{
    fmt::format::FmtSpan, fmt::writer::MakeWriterExt, layer::SubscriberExt,
    util::SubscriberInitExt, EnvFilter, Registry,
};

/// Installs the global subscriber.
///
/// Level comes from `RUST_LOG` (default `info`); load `.env` before calling.
/// Output goes to stderr so command output on stdout stays clean.
pub fn init_tracing(log_file_path: Option<&str>) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = match log_file_path {
        Some(path) => Some(Arc::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    let registry = Registry::default().with(env_filter);
    let result = match file {
        Some(file) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr.and(file))
                    .with_span_events(FmtSpan::CLOSE)
                    .with_ansi(false)
                    .with_target(true),
            )
            .try_init(),
        None => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true),
            )
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to set global subscriber: {}", e))
}
