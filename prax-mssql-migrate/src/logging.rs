//! Logging setup for the migrator.
//!
//! The crate logs through `tracing`: every statement sent at `debug`, every
//! schema change at `info`, dry-run suppressed statements at `warn`. Nothing
//! is printed unless a subscriber is installed, either by the application or
//! by [`init`] with the `tracing-subscriber` feature.
//!
//! # Environment Variables
//!
//! - `PRAX_DEBUG=true|1|yes` - Enable debug logging
//! - `PRAX_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `PRAX_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! ```rust,no_run
//! use prax_mssql_migrate::logging::{self, LogFormat, LogSettings};
//!
//! // From the environment
//! logging::init();
//!
//! // Or explicitly
//! logging::init_with(LogSettings::new("info", LogFormat::Compact));
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }
}

/// Level and format for the installed subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub level: &'static str,
    /// Output format.
    pub format: LogFormat,
}

fn parse_level(value: &str) -> Option<&'static str> {
    match value.to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

impl LogSettings {
    /// Create settings; unknown levels fall back to `warn`.
    pub fn new(level: &str, format: LogFormat) -> Self {
        Self {
            level: parse_level(level).unwrap_or("warn"),
            format,
        }
    }

    /// Read settings from the process environment.
    ///
    /// Returns `None` when neither `PRAX_DEBUG` nor `PRAX_LOG_LEVEL` asks
    /// for logging.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through a variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let debug = lookup("PRAX_DEBUG").is_some_and(|v| truthy(&v));
        let level = lookup("PRAX_LOG_LEVEL");
        if !debug && level.is_none() {
            return None;
        }

        let level = level
            .as_deref()
            .and_then(parse_level)
            .unwrap_or(if debug { "debug" } else { "warn" });
        let format = lookup("PRAX_LOG_FORMAT")
            .map(|f| LogFormat::parse(&f))
            .unwrap_or_default();

        Some(Self { level, format })
    }

    /// Filter directive scoping the level to this crate.
    pub fn filter_directive(&self) -> String {
        format!("prax_mssql_migrate={},tiberius=warn", self.level)
    }
}

/// Initialize logging from the environment. Later calls are no-ops.
pub fn init() {
    if let Some(settings) = LogSettings::from_env() {
        init_with(settings);
    }
}

/// Initialize logging with explicit settings. Later calls are no-ops.
///
/// Without the `tracing-subscriber` feature this does nothing and the
/// application is expected to install its own subscriber.
pub fn init_with(settings: LogSettings) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(settings.filter_directive())
                .unwrap_or_else(|_| EnvFilter::new("warn"));

            match settings.format {
                LogFormat::Json => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json())
                        .init();
                }
                LogFormat::Compact => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().compact())
                        .init();
                }
                LogFormat::Pretty => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().pretty())
                        .init();
                }
            }

            tracing::info!(
                level = settings.level,
                format = ?settings.format,
                "Migrator logging initialized"
            );
        }

        #[cfg(not(feature = "tracing-subscriber"))]
        let _ = settings;
    });
}
