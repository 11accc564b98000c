//! Tracing initialization.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! embedding process's choice. This helper installs the default one.

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Install a global JSON subscriber on stderr filtered by `RUST_LOG`
/// (default `info`).
pub fn init_tracing() -> Result<(), anyhow::Error> {
    let fmt_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_installs_once() {
        assert!(init_tracing().is_ok());
        tracing::info!(target: "telemetry", "subscriber installed");
        assert!(init_tracing().is_err());
    }
}
