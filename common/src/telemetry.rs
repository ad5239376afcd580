use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber: compact fmt output filtered by `RUST_LOG` (default `info`).
/// A second call is a no-op so tests and binaries can share it.
pub fn init_telemetry(service_name: &'static str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_target(false))
        .try_init();

    if installed.is_ok() {
        tracing::info!(service = service_name, "telemetry initialised");
    }
}
