use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggerSettings;
use crate::error::{AppError, Result};

/// Configuration for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub output: LogOutput,
    pub format: LogFormat,
    pub include_target: bool,
    pub include_file: bool,
    pub include_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stdout,
            format: LogFormat::Json,
            include_target: true,
            include_file: true,
            include_line: true,
        }
    }
}

impl LogConfig {
    /// Debug level, console output on stdout.
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Console,
            ..Self::default()
        }
    }

    /// Info level, JSON output on stdout.
    pub fn production() -> Self {
        Self::default()
    }

    /// Reads `LOG_LEVEL`, `LOG_OUTPUT` and `LOG_FORMAT` through `lookup`.
    /// `ENV=dev` or `ENV=development` forces console output.
    pub fn from_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let mut config = Self::default();

        if let Some(level) = var("LOG_LEVEL") {
            config.level = level;
        }
        if let Some(output) = var("LOG_OUTPUT") {
            config.output = LogOutput::from(output.as_str());
        }
        if let Some(format) = var("LOG_FORMAT") {
            config.format = LogFormat::from(format.as_str());
        }

        config.with_env_switch(lookup)
    }

    /// Forces console output when `ENV` is `dev` or `development`.
    pub fn with_env_switch<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if matches!(lookup("ENV").as_deref(), Some("dev") | Some("development")) {
            self.format = LogFormat::Console;
        }
        self
    }

    /// Directive handed to the `EnvFilter` when `RUST_LOG` is unset.
    pub fn filter_directive(&self) -> &'static str {
        match self.level.to_lowercase().as_str() {
            "debug" => "debug",
            "warn" | "warning" => "warn",
            "error" => "error",
            _ => "info",
        }
    }
}

impl From<&LoggerSettings> for LogConfig {
    fn from(settings: &LoggerSettings) -> Self {
        Self {
            level: settings.level.clone(),
            output: LogOutput::from(settings.output_path.as_str()),
            format: LogFormat::from(settings.format.as_str()),
            ..Self::default()
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Console,
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "console" | "pretty" => LogFormat::Console,
            _ => LogFormat::Json,
        }
    }
}

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File(PathBuf),
}

impl From<&str> for LogOutput {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "stdout" | "" => LogOutput::Stdout,
            "stderr" => LogOutput::Stderr,
            _ => LogOutput::File(PathBuf::from(s)),
        }
    }
}

impl LogOutput {
    fn make_writer(&self) -> Result<BoxMakeWriter> {
        Ok(match self {
            LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogOutput::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                BoxMakeWriter::new(Mutex::new(file))
            }
        })
    }

    fn is_terminal_stream(&self) -> bool {
        !matches!(self, LogOutput::File(_))
    }
}

/// Installs the global subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if the log
/// file cannot be opened or a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));
    let writer = config.output.make_writer()?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_target(config.include_target)
                .with_file(config.include_file)
                .with_line_number(config.include_line)
                .with_writer(writer);

            registry.with(fmt_layer).try_init()
        }
        LogFormat::Console => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_ansi(config.output.is_terminal_stream())
                .with_target(config.include_target)
                .with_file(config.include_file)
                .with_line_number(config.include_line)
                .with_writer(writer);

            registry.with(fmt_layer).try_init()
        }
    };
    installed.map_err(|e| AppError::Logging(e.to_string()))?;

    tracing::info!("Logging initialized with level: {}", config.filter_directive());
    Ok(())
}

/// Span carrying the service name; enter it to tag every event below.
pub fn service_span(service: &str) -> tracing::Span {
    tracing::info_span!("service", service = %service)
}

/// Span carrying a request correlation id.
pub fn request_span(request_id: &str) -> tracing::Span {
    tracing::info_span!("request", request_id = %request_id)
}

/// Masks sensitive data in strings (e.g. passwords, keys), keeping
/// `visible_chars` characters at each end.
pub fn mask_sensitive(value: &str, visible_chars: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= visible_chars * 2 {
        return "*".repeat(chars.len());
    }

    let prefix: String = chars[..visible_chars].iter().collect();
    let suffix: String = chars[chars.len() - visible_chars..].iter().collect();
    let masked_len = chars.len() - (visible_chars * 2);

    format!("{}{}{}", prefix, "*".repeat(masked_len), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_sensitive_short_string() {
        assert_eq!(mask_sensitive("abc", 2), "***");
    }

    #[test]
    fn test_mask_sensitive_long_string() {
        assert_eq!(mask_sensitive("1234567890", 2), "12******90");
    }

    #[test]
    fn test_mask_sensitive_multibyte() {
        assert_eq!(mask_sensitive("пароль123", 1), "п*******3");
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!(LogFormat::from("json"), LogFormat::Json);
        assert_eq!(LogFormat::from("CONSOLE"), LogFormat::Console);
        assert_eq!(LogFormat::from("pretty"), LogFormat::Console);
        assert_eq!(LogFormat::from("unknown"), LogFormat::Json);
    }

    #[test]
    fn test_log_output_keeps_path_case() {
        assert_eq!(LogOutput::from("STDERR"), LogOutput::Stderr);
        assert_eq!(
            LogOutput::from("/var/log/App.log"),
            LogOutput::File(PathBuf::from("/var/log/App.log"))
        );
    }
}
