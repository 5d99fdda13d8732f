//! Logging configuration and initialization
//!
//! Every csvlake binary logs through `tracing`. Invocations usually run inside a
//! serverless container where stdout is shipped to a log service, so the default
//! is one JSON object per line on stdout. Local runs can switch to text output or
//! a daily rolling file.
//!
//! Use the structured macros (`info!`, `warn!`, ...) with fields rather than
//! `println!`:
//!
//! ```rust
//! use tracing::info;
//!
//! let bucket = "raw";
//! let key = "incoming/sales.csv";
//! info!(bucket, key, "processing object");
//! ```
//!
//! # Example
//!
//! ```no_run
//! use csvlake_common::logging::{init_logging, LogConfig, LogLevel};
//!
//! let config = LogConfig {
//!     level: LogLevel::Debug,
//!     ..LogConfig::default()
//! };
//! let _guard = init_logging(&config).unwrap();
//! ```

use crate::error::{LakeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = LakeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // Python-style names (WARNING, CRITICAL) show up in deployment templates.
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "critical" => Ok(LogLevel::Error),
            _ => Err(LakeError::Config(format!("Invalid log level: {}", s))),
        }
    }
}

/// Output target for logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    /// Daily rolling file under `log_dir`
    File,
}

impl std::str::FromStr for LogOutput {
    type Err = LakeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            _ => Err(LakeError::Config(format!("Invalid log output: {}", s))),
        }
    }
}

/// Log format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    #[default]
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = LakeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(LakeError::Config(format!("Invalid log format: {}", s))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,

    pub output: LogOutput,

    pub format: LogFormat,

    /// Directory for log files (only used with [`LogOutput::File`])
    pub log_dir: PathBuf,

    /// Log file name prefix (e.g., "csvlake" -> "csvlake.2024-01-18")
    pub log_file_prefix: String,

    /// Additional filter directives (e.g., "aws_smithy_runtime=warn")
    pub filter_directives: Option<String>,

    /// Emit an event when each span closes, with its timing
    pub span_events: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            output: LogOutput::Console,
            format: LogFormat::Json,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "csvlake".to_string(),
            filter_directives: None,
            span_events: true,
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables
    ///
    /// - `LOG_LEVEL`: trace, debug, info, warn, error
    /// - `LOG_OUTPUT`: console, file
    /// - `LOG_FORMAT`: text, json
    /// - `LOG_DIR`, `LOG_FILE_PREFIX`: file output location
    /// - `LOG_FILTER`: extra filter directives
    /// - `ENABLE_XRAY`: span timing events (true/false)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`LogConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(level) = lookup("LOG_LEVEL") {
            config.level = level.parse()?;
        }

        if let Some(output) = lookup("LOG_OUTPUT") {
            config.output = output.parse()?;
        }

        if let Some(format) = lookup("LOG_FORMAT") {
            config.format = format.parse()?;
        }

        if let Some(dir) = lookup("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        if let Some(prefix) = lookup("LOG_FILE_PREFIX") {
            config.log_file_prefix = prefix;
        }

        if let Some(filter) = lookup("LOG_FILTER") {
            config.filter_directives = Some(filter);
        }

        if let Some(val) = lookup("ENABLE_XRAY") {
            config.span_events = val.eq_ignore_ascii_case("true");
        }

        Ok(config)
    }
}

/// Keeps the non-blocking file writer flushing; drop it only at shutdown.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global tracing subscriber. Call once at startup.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard> {
    let mut filter =
        EnvFilter::from_default_env().add_directive(config.level.to_tracing_level().into());

    if let Some(ref directives) = config.filter_directives {
        for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
            let parsed = directive.trim().parse().map_err(|e| {
                LakeError::Logging(format!("bad filter directive {:?}: {}", directive, e))
            })?;
            filter = filter.add_directive(parsed);
        }
    }

    let span_events = if config.span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match config.output {
        LogOutput::Console => {
            let layer = fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(true)
                .with_span_events(span_events);

            match config.format {
                LogFormat::Text => tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init(),
                LogFormat::Json => tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.json().with_current_span(true))
                    .try_init(),
            }
            .map_err(|e| LakeError::Logging(e.to_string()))?;

            Ok(LoggingGuard { _file: None })
        },
        LogOutput::File => {
            std::fs::create_dir_all(&config.log_dir)?;

            let appender =
                tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_span_events(span_events)
                .with_ansi(false);

            match config.format {
                LogFormat::Text => tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init(),
                LogFormat::Json => tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.json())
                    .try_init(),
            }
            .map_err(|e| LakeError::Logging(e.to_string()))?;

            Ok(LoggingGuard { _file: Some(guard) })
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("Info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("CRITICAL".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_output_and_format_from_str() {
        assert_eq!("stdout".parse::<LogOutput>().unwrap(), LogOutput::Console);
        assert_eq!("file".parse::<LogOutput>().unwrap(), LogOutput::File);
        assert!("both".parse::<LogOutput>().is_err());
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }

    #[test]
    fn test_defaults_are_json_on_stdout() {
        let config = LogConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.output, LogOutput::Console);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.span_events);
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let config = LogConfig::from_lookup(lookup_from(&[
            ("LOG_LEVEL", "WARNING"),
            ("LOG_FORMAT", "text"),
            ("LOG_OUTPUT", "file"),
            ("LOG_DIR", "/var/log/csvlake"),
            ("ENABLE_XRAY", "false"),
        ]))
        .unwrap();

        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.output, LogOutput::File);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/csvlake"));
        assert!(!config.span_events);
    }

    #[test]
    fn test_from_lookup_rejects_bad_level() {
        let err = LogConfig::from_lookup(lookup_from(&[("LOG_LEVEL", "chatty")])).unwrap_err();
        assert!(err.to_string().contains("chatty"));
    }

    #[test]
    fn test_env_overrides_keep_other_defaults() {
        let config = LogConfig::from_lookup(lookup_from(&[
            ("LOG_FILE_PREFIX", "ingest"),
            ("LOG_FILTER", "aws_smithy_runtime=warn"),
        ]))
        .unwrap();

        assert_eq!(config.log_file_prefix, "ingest");
        assert_eq!(
            config.filter_directives.as_deref(),
            Some("aws_smithy_runtime=warn")
        );
        assert_eq!(config.log_dir, PathBuf::from("./logs"));
        assert_eq!(config.level, LogLevel::Info);
    }
}
