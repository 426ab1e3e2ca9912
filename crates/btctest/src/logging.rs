//! Logging setup for the btctest CLI

use btctest_core::config::LoggingConfig;
use std::io;
use std::sync::Arc;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing from the resolved logging configuration.
///
/// Console events go to stderr in compact form; when a log file is
/// configured, a second plain-text (no ANSI) layer appends to it.
/// `RUST_LOG` overrides the configured level when set.
pub fn init_tracing(config: &LoggingConfig) -> miette::Result<()> {
    let level = config.level.to_lowercase();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(format!(
                "btctest={level},btctest_core={level},btctest_vcs={level},btctest_docker={level}"
            ))
        })
        .map_err(|e| miette::miette!("Failed to create tracing filter: {e}"))?;

    let console = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_target(false);

    let registry = tracing_subscriber::registry().with(env_filter).with(console);

    if let Some(path) = &config.file {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| miette::miette!("Failed to create log directory: {e}"))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| miette::miette!("Failed to open log file {}: {e}", path.display()))?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Arc::new(file));
        registry.with(file_layer).init();
    } else {
        registry.init();
    }

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        level = %level,
        "Tracing initialized"
    );
    Ok(())
}
