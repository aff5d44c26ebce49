//! Logging configuration and the global sink.

use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self as tracing_fmt, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{TelemetryError, TelemetryResult};

/// The sink installed for this process, if any.
static ACTIVE_SINK: Mutex<Option<LogTarget>> = Mutex::new(None);

/// Helper to convert init errors to our error type.
fn init_err<E: fmt::Display>(e: E) -> TelemetryError {
    TelemetryError::InitError(e.to_string())
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line format.
    Pretty,
    /// Compact single-line format (default).
    #[default]
    Compact,
    /// JSON format for structured logging.
    Json,
}

/// Log output target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to stdout.
    Stdout,
    /// Log to stderr.
    #[default]
    Stderr,
    /// Append to a single file, created if missing.
    File(PathBuf),
}

impl LogTarget {
    /// Interpret a path the way the engine's log-file entry point does:
    /// `"stdout"` and `"stderr"` select the standard streams, anything else
    /// is a file.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match path.to_str() {
            Some("stdout") => Self::Stdout,
            Some("stderr") => Self::Stderr,
            _ => Self::File(path.to_path_buf()),
        }
    }
}

impl fmt::Display for LogTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    #[serde(default = "default_level")]
    pub level: String,
    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
    /// Log target.
    #[serde(default)]
    pub target: LogTarget,
    /// Whether to use ANSI colors.
    #[serde(default = "default_true")]
    pub ansi: bool,
    /// Directive overrides (e.g., `wasmtime=warn`).
    #[serde(default)]
    pub directives: Vec<String>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            ansi: true,
            directives: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Create a new log config with the specified level.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Config for a path + level pair, as accepted by [`set_log_file`].
    ///
    /// File targets never use ANSI colors.
    #[must_use]
    pub fn for_path(path: impl AsRef<Path>, level: impl Into<String>) -> Self {
        Self::new(level).with_target(LogTarget::from_path(path))
    }

    /// Set the log format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the log target.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        if matches!(target, LogTarget::File(_)) {
            self.ansi = false;
        }
        self.target = target;
        self
    }

    /// Add a directive override.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Disable ANSI colors.
    #[must_use]
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// Build the env filter from config.
    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|e| TelemetryError::ConfigError(e.to_string()))?;

        for directive in &self.directives {
            filter = filter.add_directive(directive.parse().map_err(
                |e: tracing_subscriber::filter::ParseError| {
                    TelemetryError::ConfigError(e.to_string())
                },
            )?);
        }

        Ok(filter)
    }

    /// Open the writer for the configured target.
    fn build_writer(&self) -> TelemetryResult<BoxMakeWriter> {
        let writer = match &self.target {
            LogTarget::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogTarget::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                BoxMakeWriter::new(Mutex::new(file))
            },
        };
        Ok(writer)
    }

    fn build_layer(&self, writer: BoxMakeWriter) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = tracing_fmt::layer()
            .with_writer(writer)
            .with_ansi(self.ansi);

        match self.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
        }
    }
}

/// Install the process-wide logging sink.
///
/// The filter is validated and the target opened before the sink is
/// registered, so a failed call leaves the process free to try again.
///
/// # Errors
///
/// Returns [`TelemetryError::AlreadyInitialized`] if a sink was installed
/// earlier, a config error for a bad level or directive, an IO error if the
/// log file cannot be opened, or an init error if another global subscriber
/// was installed outside this crate.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let mut active = ACTIVE_SINK.lock().map_err(init_err)?;
    if let Some(existing) = active.as_ref() {
        return Err(TelemetryError::AlreadyInitialized {
            target: existing.to_string(),
        });
    }

    let filter = config.build_filter()?;
    let writer = config.build_writer()?;
    let layer = config.build_layer(writer);

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(init_err)?;

    *active = Some(config.target.clone());
    tracing::debug!(target_sink = %config.target, level = %config.level, "logging sink installed");
    Ok(())
}

/// Route all engine and binding logs at `level` or above to `path`.
///
/// # Errors
///
/// See [`setup_logging`].
pub fn set_log_file(path: impl AsRef<Path>, level: &str) -> TelemetryResult<()> {
    setup_logging(&LogConfig::for_path(path, level))
}

/// The target of the installed sink, if one was installed by this crate.
#[must_use]
pub fn active_target() -> Option<LogTarget> {
    ACTIVE_SINK
        .lock()
        .map_or_else(|e| e.into_inner().clone(), |guard| guard.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.target, LogTarget::Stderr);
        assert!(config.ansi);
    }

    #[test]
    fn log_config_builder() {
        let config = LogConfig::new("debug")
            .with_format(LogFormat::Json)
            .with_directive("wasmtime=warn");

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.directives, vec!["wasmtime=warn"]);
    }

    #[test]
    fn file_target_disables_ansi() {
        let config = LogConfig::for_path("/tmp/plugins.log", "trace");
        assert_eq!(
            config.target,
            LogTarget::File(PathBuf::from("/tmp/plugins.log"))
        );
        assert!(!config.ansi);
    }

    #[test]
    fn special_paths_select_streams() {
        assert_eq!(LogTarget::from_path("stdout"), LogTarget::Stdout);
        assert_eq!(LogTarget::from_path("stderr"), LogTarget::Stderr);
        assert_eq!(
            LogTarget::from_path("logs/stdout"),
            LogTarget::File(PathBuf::from("logs/stdout"))
        );
        assert!(LogConfig::for_path("stderr", "info").ansi);
    }

    #[test]
    fn log_config_serialization() {
        let config = LogConfig::new("warn").with_format(LogFormat::Pretty);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"level\":\"warn\""));
        assert!(json.contains("\"format\":\"pretty\""));

        let parsed: LogConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.level, "warn");
        assert_eq!(parsed.format, LogFormat::Pretty);

        assert!(serde_json::from_str::<LogFormat>("\"full\"").is_err());
        assert_eq!(
            serde_json::from_str::<LogFormat>("\"json\"").unwrap(),
            LogFormat::Json
        );
    }

    #[test]
    fn build_filter() {
        let config = LogConfig::new("debug").with_directive("wasmbind=trace");
        assert!(config.build_filter().is_ok());
    }

    #[test]
    fn build_filter_invalid() {
        // EnvFilter is permissive with unknown targets, so we test invalid syntax
        let config = LogConfig::new("debug").with_directive("[invalid=syntax");
        assert!(config.build_filter().is_err());
    }

    #[test]
    fn file_writer_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/plugins.log");
        let config = LogConfig::for_path(&path, "info");

        assert!(config.build_writer().is_ok());
        assert!(path.exists());
    }

    #[test]
    fn target_display() {
        assert_eq!(LogTarget::Stdout.to_string(), "stdout");
        assert_eq!(
            LogTarget::File(PathBuf::from("a/b.log")).to_string(),
            "a/b.log"
        );
    }
}
