//! Structured logging for es-core.
//!
//! Two output modes:
//! - Human-readable console output for interactive use
//! - JSONL for pipelines and batch jobs
//!
//! stdout is reserved for command payloads; all logs go to stderr.
//!
//! ```ignore
//! use es_core::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::from_env(0, false));
//! tracing::info!(event = event_names::RUN_STARTED, "starting");
//! ```

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, LogEvent, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem.
///
/// `RUST_LOG` directives win when set; otherwise only es-core and its
/// storage crate log, at the configured level. Calling twice is a no-op.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "es_core={level},es_store={level}",
            level = config.level
        ))
    });

    let result = match config.format {
        LogFormat::Human => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(JsonlLayer::stderr())
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}
