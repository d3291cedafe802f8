//! Tracing initialization
//!
//! The engine logs through `tracing` everywhere; the host application
//! calls [`init`] once at startup. `RUST_LOG` overrides the configured
//! level when set.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs the global tracing subscriber
///
/// Safe to call only once per process; later calls return an error from
/// the subscriber registry.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))?;
    Ok(())
}
