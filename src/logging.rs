//! Logging System
//!
//! Structured logging implementation using the `tracing` crate. Log records are
//! single lines, `timestamp - LEVEL - [run mode -] message`, written to stdout
//! or appended to a log file. [`init_logging`] returns a [`Dispatch`] instead of
//! installing a process-wide subscriber; callers scope it with
//! `tracing::dispatcher::with_default`.

use crate::error::IsoenvError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{Dispatch, Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt as subscriber_fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Environment variable holding a full filter directive, e.g. `isoenv=trace`.
pub const LOG_FILTER_ENV: &str = "ISOENV_LOG";

/// Environment variable overriding the output format.
pub const LOG_FORMAT_ENV: &str = "ISOENV_LOG_FORMAT";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// When false, nothing is logged unless a log file is set
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Append to this file instead of writing to stdout
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Label added to every text record ("live run", "dry run")
    #[serde(skip)]
    pub run_mode: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            file: None,
            run_mode: None,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.format != "json" && self.format != "text" {
            return Err(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                self.format
            ));
        }
        if self.level.parse::<tracing::level_filters::LevelFilter>().is_err() {
            return Err(format!("Invalid log level: {}", self.level));
        }
        Ok(())
    }

    /// Whether any records will be written at all.
    pub fn is_active(&self) -> bool {
        self.enabled || self.file.is_some()
    }
}

/// Build the dispatcher for `config`
///
/// Priority order (highest to lowest):
/// 1. `ISOENV_LOG` / `ISOENV_LOG_FORMAT` environment variables
/// 2. The given configuration (CLI flags already applied)
pub fn init_logging(config: &LoggingConfig) -> Result<Dispatch, IsoenvError> {
    if !config.is_active() {
        return Ok(Dispatch::new(Registry::default().with(EnvFilter::new("off"))));
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let writer = make_writer(config)?;

    let base_subscriber = Registry::default().with(filter);

    let dispatch = if format == "json" {
        Dispatch::new(
            base_subscriber.with(
                subscriber_fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            ),
        )
    } else {
        Dispatch::new(
            base_subscriber.with(
                subscriber_fmt::layer()
                    .event_format(LineFormat {
                        run_mode: config.run_mode.clone(),
                    })
                    .with_ansi(false)
                    .with_writer(writer),
            ),
        )
    };

    Ok(dispatch)
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, IsoenvError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_FILTER_ENV) {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.level)
        .map_err(|e| IsoenvError::Config(format!("Invalid log level {}: {}", config.level, e)))
}

/// Determine output format from config or environment
fn determine_format(config: &LoggingConfig) -> Result<String, IsoenvError> {
    if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }

    config.validate().map_err(IsoenvError::Config)?;
    Ok(config.format.clone())
}

fn make_writer(config: &LoggingConfig) -> Result<BoxMakeWriter, IsoenvError> {
    let Some(log_file) = &config.file else {
        return Ok(BoxMakeWriter::new(std::io::stdout));
    };

    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            IsoenvError::Config(format!("Failed to create log directory: {}", e))
        })?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| {
            IsoenvError::Config(format!("Failed to open log file {:?}: {}", log_file, e))
        })?;
    Ok(BoxMakeWriter::new(Mutex::new(file)))
}

/// `2024-01-31 12:00:00,123 - INFO - dry run - message field=value`
struct LineFormat {
    run_mode: Option<String>,
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        write!(writer, "{} - {}", now, event.metadata().level())?;
        if let Some(mode) = &self.run_mode {
            write!(writer, " - {}", mode)?;
        }
        write!(writer, " - ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
