//! Logging configuration and initialization
//!
//! Every binary in the workspace installs its subscriber through [`init_logging`]
//! so that console/file output, text/JSON format and filtering behave the same way.
//!
//! Use the `tracing` macros with structured fields rather than `println!`:
//!
//! ```rust
//! use tracing::{info, warn};
//!
//! let path = "metrics-0001.gz";
//! info!(path = %path, lines = 250, "file imported");
//! warn!(path = %path, "file could not be opened");
//! ```
//!
//! # Environment
//!
//! | Variable          | Values                               |
//! |-------------------|--------------------------------------|
//! | `LOG_LEVEL`       | trace, debug, info, warn, error      |
//! | `LOG_OUTPUT`      | console, file, both                  |
//! | `LOG_FORMAT`      | text, json                           |
//! | `LOG_DIR`         | directory for rolling log files      |
//! | `LOG_FILE_PREFIX` | file name prefix                     |
//! | `LOG_FILTER`      | extra directives, e.g. `reqwest=warn` |

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
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
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(CommonError::invalid_value("log level", s)),
        }
    }
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    fn console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl std::str::FromStr for LogOutput {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(CommonError::invalid_value("log output", s)),
        }
    }
}

/// Line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(CommonError::invalid_value("log format", s)),
        }
    }
}

/// Logging configuration
///
/// Deserializes from a partial document; missing fields keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level that is emitted
    pub level: LogLevel,

    pub output: LogOutput,

    pub format: LogFormat,

    /// Directory for rolling log files, used when `output` includes a file
    pub log_dir: PathBuf,

    /// Log file name prefix ("tsdb-import" -> "tsdb-import.2024-01-18")
    pub log_file_prefix: String,

    /// Additional comma separated filter directives (e.g. "reqwest=warn,hyper=warn")
    pub filter_directives: Option<String>,

    pub include_thread_ids: bool,

    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            output: LogOutput::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "tsdb-import".to_string(),
            filter_directives: None,
            include_thread_ids: false,
            include_targets: true,
        }
    }
}

impl LogConfig {
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    /// Defaults overridden by the `LOG_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    /// Apply the `LOG_*` environment variables on top of `self`
    pub fn merge_env(mut self) -> Result<Self> {
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.level = level.parse()?;
        }

        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.output = output.parse()?;
        }

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.format = format.parse()?;
        }

        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }

        if let Ok(prefix) = std::env::var("LOG_FILE_PREFIX") {
            self.log_file_prefix = prefix;
        }

        if let Ok(filter) = std::env::var("LOG_FILTER") {
            self.filter_directives = Some(filter);
        }

        Ok(self)
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter =
            EnvFilter::from_default_env().add_directive(self.level.to_tracing_level().into());

        if let Some(ref directives) = self.filter_directives {
            for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                let parsed = directive
                    .parse()
                    .map_err(|_| CommonError::invalid_value("filter directive", directive))?;
                filter = filter.add_directive(parsed);
            }
        }

        Ok(filter)
    }
}

/// Builder for [`LogConfig`]
#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_file_prefix = prefix.into();
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn include_thread_ids(mut self, include: bool) -> Self {
        self.config.include_thread_ids = include;
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn fmt_layer<W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(config.include_targets)
        .with_thread_ids(config.include_thread_ids);

    match config.format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// Install the global subscriber.
///
/// When file output is enabled the returned guard flushes the non-blocking
/// writer on drop, so keep it alive until the process exits.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = config.env_filter()?;
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if config.output.console() {
        layers.push(fmt_layer(config, std::io::stdout, true));
    }

    if config.output.file() {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt_layer(config, writer, false));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| CommonError::config(format!("failed to install subscriber: {}", e)))?;

    Ok(guard)
}
