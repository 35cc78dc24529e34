//! Logging bootstrap for the simulator.
//!
//! - Text or JSON output, RFC3339 (UTC) timestamps.
//! - EnvFilter from an explicit directive, then `RUST_LOG`, then "info".
//! - Writes to stderr; stdout carries the report.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info,launchpad=debug".
    pub env_filter: Option<String>,
    pub json: bool,
    /// Print target, file and line.
    pub with_targets_and_lines: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { env_filter: None, json: false, with_targets_and_lines: true }
    }
}

/// Call once at process start.
pub fn init(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match &cfg.env_filter {
        Some(s) => EnvFilter::try_new(s.as_str()).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let registry = tracing_subscriber::registry().with(filter);

    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(cfg.with_targets_and_lines)
        .with_file(cfg.with_targets_and_lines)
        .with_line_number(cfg.with_targets_and_lines)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    if cfg.json {
        registry
            .with(base.json().with_ansi(false).with_current_span(true).flatten_event(true))
            .try_init()?;
    } else {
        registry.with(base).try_init()?;
    }
    Ok(())
}
