//! Logging setup for the command-line tool.
//!
//! Everything goes through `tracing`. Levels are used as follows:
//!
//! - `error`: the run failed
//! - `warn`: suspicious input such as an empty framework mapping
//! - `info`: setup and the final summary
//! - `debug`: each skipped record
//! - `trace`: each row written
//!
//! `RUST_LOG` takes precedence over the configured level.

use std::io;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{ExportError, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-field lines
    #[default]
    Pretty,
    /// Single-line format
    Compact,
    /// One JSON object per event
    Json,
}

/// How logs are filtered and rendered.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for this crate's events
    pub level: Level,
    /// Prefix lines with a timestamp
    pub with_timestamps: bool,
    /// Color output
    pub with_ansi: bool,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: Level::INFO,
            with_timestamps: false,
            with_ansi: true,
            format: LogFormat::default(),
        }
    }
}

impl LogConfig {
    /// Level from `-v`/`-q` counts: `-q` gives warn, `-v` debug, `-vv` trace.
    #[must_use]
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        let level = if quiet {
            Level::WARN
        } else {
            match verbose {
                0 => Level::INFO,
                1 => Level::DEBUG,
                _ => Level::TRACE,
            }
        };
        LogConfig {
            level,
            ..LogConfig::default()
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable timestamps.
    #[must_use]
    pub fn with_timestamps(mut self, enable: bool) -> Self {
        self.with_timestamps = enable;
        self
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }
}

/// Install the global subscriber, writing to stderr.
///
/// # Errors
///
/// Returns [`ExportError::Config`] if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    init_logging_with_writer(config, io::stderr)
}

/// Install the global subscriber with a custom writer.
///
/// # Errors
///
/// Returns [`ExportError::Config`] if a subscriber is already installed.
pub fn init_logging_with_writer<W>(config: &LogConfig, writer: W) -> Result<()>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = build_env_filter(config.level);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(writer)
                .with_ansi(config.with_ansi)
                .with_target(false);
            if config.with_timestamps {
                registry.with(layer).try_init()
            } else {
                registry.with(layer.without_time()).try_init()
            }
        },
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(config.with_ansi)
                .with_target(false);
            if config.with_timestamps {
                registry.with(layer).try_init()
            } else {
                registry.with(layer.without_time()).try_init()
            }
        },
    };
    installed.map_err(|e| ExportError::Config(format!("cannot install logger: {e}")))
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Other crates stay at warn.
        let level = level.as_str().to_lowercase();
        EnvFilter::new(format!("warn,marc_items_csv={level}"))
    })
}
