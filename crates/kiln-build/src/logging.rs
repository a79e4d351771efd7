//! Subscriber setup for binaries that drive builds (`logging` feature).
//!
//! Builds report through `tracing`: one `info` line per stale SCC and per
//! finished build, `debug` for discovery and cache seeding, `trace` for
//! interface comparisons and record reads. Embedders with their own
//! subscriber do not need this module.

use std::sync::Once;

use kiln_config::{BuildConfig, ConfigError};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Verbosity of build output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Silent,
    Error,
    /// Failed cache writes.
    Warn,
    /// Stale SCCs with the reason they are stale, and build totals.
    #[default]
    Info,
    /// Module parses, records seeded from cache, fresh SCC queueing.
    Debug,
    /// Interface hash comparisons, missing and stale records.
    Trace,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    fn as_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Silent => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("Invalid log level: {}", other)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter())
    }
}

/// Install a compact stderr subscriber at `level`. `RUST_LOG` directives
/// still apply on top. Only the first call in a process has any effect.
///
/// # Example
///
/// ```rust,no_run
/// use kiln_build::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Info);
/// ```
pub fn init_logging(level: LogLevel) {
    install(|| filter_at(level.as_level_filter()));
}

/// Initialize logging at the configuration's `log-level`, or Info when it
/// is unset.
pub fn init_logging_from_config(config: &BuildConfig) -> Result<(), ConfigError> {
    let level = match &config.log_level {
        Some(level) => level.parse().map_err(|hint| ConfigError::InvalidValue {
            field: "log-level".to_string(),
            hint,
        })?,
        None => LogLevel::default(),
    };
    init_logging(level);
    Ok(())
}

/// Install the subscriber with `RUST_LOG` as the only filter, or at `info`
/// when it is unset or unparsable.
///
/// # Example
///
/// ```rust,no_run
/// use kiln_build::logging::init_logging_from_env;
///
/// init_logging_from_env();
/// ```
pub fn init_logging_from_env() {
    install(|| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_at(LevelFilter::INFO))
    });
}

fn filter_at(default: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy()
}

fn install(filter: impl FnOnce() -> EnvFilter) {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(filter())
            .with(fmt::layer().compact().with_target(false).without_time())
            .init();
    });
}
