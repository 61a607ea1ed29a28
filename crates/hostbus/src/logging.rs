//! Logging setup

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for the binary.
///
/// `default_level` applies when `RUST_LOG` is unset; the variable
/// takes full directive syntax and overrides it entirely.
pub fn setup_logging(default_level: &str) -> Result<()> {
    let spec = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| default_level.to_string());
    let filter = EnvFilter::try_new(&spec).with_context(|| format!("invalid log filter {spec:?}"))?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
