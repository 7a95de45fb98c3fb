//! Tracing subscriber setup for binaries.
//!
//! Library code only emits `tracing` events; the binary decides where they go.
//! Output is written to stderr so that stdout stays free for structured results.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Log level filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Whether to output JSON format
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "vault-secret".to_string(),
            log_level: "info".to_string(),
            json_output: false,
        }
    }
}

impl TracingConfig {
    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Initialize tracing with the given configuration.
///
/// Installs the global subscriber. Calling it a second time is a no-op, which
/// keeps it safe to use from tests.
pub fn init_tracing(config: &TracingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let installed = if config.json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if installed.is_ok() {
        tracing::debug!(service = %config.service_name, "Tracing initialized");
    }
}
