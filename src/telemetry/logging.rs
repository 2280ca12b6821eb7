//! Structured logging for workflow runs.
//!
//! Composes a `tracing` subscriber out of up to three layers: a daily-rolling
//! file layer (JSON by default), a console layer, and an OpenTelemetry bridge
//! layer that turns `tracing` spans into OTel spans on the workflow's tracer.
//! Keep the returned [`LoggingGuard`] alive for the life of the process or
//! buffered file output is lost.

use std::path::PathBuf;

use opentelemetry_sdk::trace as sdktrace;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::FmtSpan, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::error::FraudWatchError;

/// Configuration for file and console logging
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for rolling log files
    pub log_dir: PathBuf,
    /// Whether to write log files at all
    pub file_enabled: bool,
    /// Filter directives for the file layer
    pub file_log_level: String,
    /// Whether to log to the console
    pub console_enabled: bool,
    /// Filter directives for the console layer
    pub console_log_level: String,
    /// Whether file output is JSON (one object per line) or plain text
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            file_enabled: true,
            file_log_level: "fraudwatch=debug,info".to_string(),
            console_enabled: true,
            console_log_level: "fraudwatch=info,warn".to_string(),
            json_format: true,
        }
    }
}

impl LoggingConfig {
    /// Create configuration from environment variables
    ///
    /// Recognized variables: `FRAUDWATCH_LOG_DIR`, `FRAUDWATCH_FILE_LOGGING`,
    /// `FRAUDWATCH_FILE_LOG_LEVEL`, `FRAUDWATCH_CONSOLE_LOGGING`,
    /// `FRAUDWATCH_CONSOLE_LOG_LEVEL`, `FRAUDWATCH_JSON_LOGS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_dir: std::env::var("FRAUDWATCH_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            file_enabled: std::env::var("FRAUDWATCH_FILE_LOGGING")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.file_enabled),
            file_log_level: std::env::var("FRAUDWATCH_FILE_LOG_LEVEL")
                .unwrap_or(defaults.file_log_level),
            console_enabled: std::env::var("FRAUDWATCH_CONSOLE_LOGGING")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.console_enabled),
            console_log_level: std::env::var("FRAUDWATCH_CONSOLE_LOG_LEVEL")
                .unwrap_or(defaults.console_log_level),
            json_format: std::env::var("FRAUDWATCH_JSON_LOGS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.json_format),
        }
    }
}

/// Keeps the non-blocking file writer alive; drop flushes remaining output
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global tracing subscriber
///
/// Passing the workflow tracer bridges `tracing` spans into the OpenTelemetry
/// pipeline so log-level spans and exported traces share trace IDs. Fails if
/// a subscriber is already installed.
pub fn init_logging(
    config: &LoggingConfig,
    otel_tracer: Option<sdktrace::Tracer>,
) -> Result<LoggingGuard, FraudWatchError> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut file_guard = None;

    if config.file_enabled {
        std::fs::create_dir_all(&config.log_dir).map_err(|e| {
            FraudWatchError::configuration_error(format!(
                "Failed to create log directory {}: {}",
                config.log_dir.display(),
                e
            ))
        })?;

        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "fraudwatch.log");
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        file_guard = Some(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .with_timer(ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string()));

        if config.json_format {
            layers.push(
                file_layer
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_filter(build_filter(&config.file_log_level))
                    .boxed(),
            );
        } else {
            layers.push(
                file_layer
                    .with_filter(build_filter(&config.file_log_level))
                    .boxed(),
            );
        }
    }

    if config.console_enabled {
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(build_filter(&config.console_log_level))
                .boxed(),
        );
    }

    if let Some(tracer) = otel_tracer {
        layers.push(
            tracing_opentelemetry::layer()
                .with_tracer(tracer)
                .with_location(true)
                .with_tracked_inactivity(true)
                .with_threads(true)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| {
            FraudWatchError::configuration_error(format!(
                "Failed to install tracing subscriber: {}",
                e
            ))
        })?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Build a filter from configured directives, silencing transport noise
fn build_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives)
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("tokio=warn".parse().unwrap())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("h2=warn".parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap())
        .add_directive("tonic=warn".parse().unwrap())
        .add_directive("tower=warn".parse().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert!(config.file_enabled);
        assert!(config.console_enabled);
        assert!(config.json_format);
        assert_eq!(config.log_dir, PathBuf::from("./logs"));
    }

    #[test]
    fn test_filter_accepts_invalid_directives() {
        // Falls back to "info" rather than refusing to log.
        let _ = build_filter("fraudwatch=debug,info");
        let _ = build_filter("not a ,,, directive !!!");
    }

    #[test]
    fn test_init_logging_installs_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            log_dir: dir.path().join("logs"),
            console_enabled: false,
            ..LoggingConfig::default()
        };

        let guard = init_logging(&config, None).unwrap();
        tracing::info!("logging initialized");
        assert!(config.log_dir.exists());

        // A second install must fail rather than silently replace the subscriber.
        assert!(init_logging(&config, None).is_err());
        drop(guard);
    }
}
