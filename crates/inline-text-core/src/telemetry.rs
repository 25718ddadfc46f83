//! Console logging for native hosts and demos.
//!
//! ```ignore
//! use inline_text_core::telemetry::{self, TelemetryConfig};
//!
//! telemetry::init(TelemetryConfig::for_widget(&config))?;
//! ```

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::WidgetConfig;

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Console log level when `RUST_LOG` is not set.
    pub console_level: Level,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };
        Self { console_level }
    }
}

impl TelemetryConfig {
    /// Debug widgets log node-change diagnostics at debug level, so the
    /// console has to let them through.
    pub fn for_widget(config: &WidgetConfig) -> Self {
        if config.debug {
            Self {
                console_level: Level::DEBUG,
            }
        } else {
            Self::default()
        }
    }
}

/// Install a compact console subscriber. `RUST_LOG` overrides the level.
///
/// Fails if a global subscriber is already set.
pub fn init(config: TelemetryConfig) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.as_str().to_lowercase()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(env_filter);

    tracing_subscriber::registry().with(console_layer).try_init()
}
