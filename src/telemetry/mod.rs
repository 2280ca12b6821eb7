//! Observability for the fraud detection workflow.
//!
//! This module provides the telemetry backbone used by every stage of the
//! pipeline: OpenTelemetry tracing with OTLP and Application Insights export,
//! business event emission, and the eight fraud-detection business metrics.
//! Configuration is environment-driven and degrades to a no-op pipeline when
//! no backend is available, so callers never branch on "is telemetry enabled".
//!
//! # Quick Start
//!
//! Initialize from the environment and instrument a workflow:
//! ```no_run
//! use fraudwatch::telemetry::{semantic_conventions, KeyValue, TelemetryConfig, TelemetryManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads APPLICATIONINSIGHTS_CONNECTION_STRING, OTEL_EXPORTER_OTLP_ENDPOINT,
//!     // FRAUDWATCH_DEBUG_PORT and friends; falls back to a no-op pipeline.
//!     let telemetry = TelemetryManager::initialize(TelemetryConfig::from_env())?;
//!
//!     let span = telemetry.create_workflow_span(
//!         "fraud_detection_workflow",
//!         vec![KeyValue::new(semantic_conventions::TRANSACTION_ID, "TX1001")],
//!     );
//!     telemetry.send_business_event(
//!         &span.context(),
//!         semantic_conventions::EVENT_CUSTOMER_DATA_STARTED,
//!         vec![KeyValue::new("transaction_id", "TX1001")],
//!     );
//!     span.set_success();
//!     span.finish();
//!
//!     telemetry.flush();
//!     Ok(())
//! }
//! ```
//!
//! Configure explicitly for a known collector:
//! ```no_run
//! use fraudwatch::telemetry::{LogLevel, TelemetryConfig, TelemetryManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TelemetryConfig::default()
//!         .with_otlp_endpoint("http://localhost:4318")
//!         .with_service_name("fraud-detection-workflow")
//!         .with_batch_processing()
//!         .with_log_level(LogLevel::INFO);
//!
//!     let telemetry = TelemetryManager::initialize(config)?;
//!     telemetry.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Key Types
//!
//! - [`TelemetryConfig`] - environment-driven exporter configuration
//! - [`TelemetryManager`] - span factories, business events, metric recorders
//! - [`WorkflowSpan`] - context-carrying span guaranteed to close on drop
//! - [`MetricsCollector`] - recording trait with OTLP and no-op implementations

use std::fmt;

pub mod logging;
pub mod metrics;
pub mod otel;

pub use logging::{init_logging, LoggingConfig, LoggingGuard};
pub use metrics::{
    MetricsCollector, NoOpMetricsCollector, OtelMetricsCollector, SharedMetricsCollector,
};
pub use otel::{TelemetryManager, WorkflowSpan};

pub use opentelemetry::{Context, KeyValue};

use crate::error::FraudWatchError;

/// Log level for telemetry console output control
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// No telemetry output at all
    OFF,
    /// Only error messages
    ERROR,
    /// Error and warning messages
    WARN,
    /// Error, warning, and info messages
    INFO,
    /// Error, warning, info, and debug messages
    DEBUG,
    /// All messages including trace
    TRACE,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::INFO
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::OFF => write!(f, "OFF"),
            LogLevel::ERROR => write!(f, "ERROR"),
            LogLevel::WARN => write!(f, "WARN"),
            LogLevel::INFO => write!(f, "INFO"),
            LogLevel::DEBUG => write!(f, "DEBUG"),
            LogLevel::TRACE => write!(f, "TRACE"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OFF" => Ok(LogLevel::OFF),
            "ERROR" => Ok(LogLevel::ERROR),
            "WARN" | "WARNING" => Ok(LogLevel::WARN),
            "INFO" => Ok(LogLevel::INFO),
            "DEBUG" => Ok(LogLevel::DEBUG),
            "TRACE" => Ok(LogLevel::TRACE),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// Configuration for telemetry and observability
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Whether telemetry export is enabled; a disabled config installs a no-op pipeline
    pub enabled: bool,
    /// Azure Application Insights connection string; the IngestionEndpoint
    /// segment is used as the OTLP/HTTP export base
    pub app_insights_connection_string: Option<String>,
    /// OTLP endpoint for generic collector export
    pub otlp_endpoint: Option<String>,
    /// Local debug exporter port; exports over OTLP/HTTP to localhost
    pub debug_port: Option<u16>,
    /// Whether to export spans to stdout for development
    pub console_export: bool,
    /// Service name for telemetry identification
    pub service_name: String,
    /// Service version for telemetry identification
    pub service_version: String,
    /// Whether to use batch processors for higher throughput
    pub enable_batch_processor: bool,
    /// Log level for telemetry console output
    pub log_level: LogLevel,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_insights_connection_string: None,
            otlp_endpoint: None,
            debug_port: None,
            console_export: false,
            service_name: "fraud-detection-workflow".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            enable_batch_processor: false,
            log_level: LogLevel::default(),
        }
    }
}

impl TelemetryConfig {
    /// Create a disabled configuration; initialization yields a no-op pipeline
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the Application Insights connection string
    pub fn with_app_insights_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.app_insights_connection_string = Some(connection_string.into());
        self
    }

    /// Set explicit OTLP endpoint
    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Set the local debug exporter port
    pub fn with_debug_port(mut self, port: u16) -> Self {
        self.debug_port = Some(port);
        self
    }

    /// Enable console export for local debugging
    pub fn with_console_export(mut self) -> Self {
        self.console_export = true;
        self
    }

    /// Set service name for telemetry identification
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set service version for telemetry identification
    pub fn with_service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable batch processing for production environments (higher throughput)
    pub fn with_batch_processing(mut self) -> Self {
        self.enable_batch_processor = true;
        self
    }

    /// Enable simple processing for development (immediate export)
    pub fn with_simple_processing(mut self) -> Self {
        self.enable_batch_processor = false;
        self
    }

    /// Set log level for telemetry output
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Create configuration from environment variables
    ///
    /// Recognized variables (all optional):
    /// - `OTEL_ENABLED`: enable/disable telemetry export
    /// - `APPLICATIONINSIGHTS_CONNECTION_STRING`: Application Insights export
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint URL
    /// - `FRAUDWATCH_DEBUG_PORT`: local debug exporter port
    /// - `FRAUDWATCH_CONSOLE_EXPORT`: span export to stdout
    /// - `OTEL_SERVICE_NAME` / `OTEL_SERVICE_VERSION`: service identity
    /// - `OTEL_BATCH_PROCESSOR`: batch span processing
    /// - `FRAUDWATCH_LOG_LEVEL`: telemetry console log level
    ///
    /// When none of the export targets is present the pipeline is a no-op.
    pub fn from_env() -> Self {
        if let Ok(enabled) = std::env::var("OTEL_ENABLED") {
            if enabled.to_lowercase() == "false" || enabled == "0" {
                return Self {
                    enabled: false,
                    ..Self::default()
                };
            }
        }

        Self {
            enabled: true,
            app_insights_connection_string: std::env::var("APPLICATIONINSIGHTS_CONNECTION_STRING")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            debug_port: std::env::var("FRAUDWATCH_DEBUG_PORT")
                .ok()
                .and_then(|p| p.parse().ok()),
            console_export: std::env::var("FRAUDWATCH_CONSOLE_EXPORT")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            service_name: std::env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "fraud-detection-workflow".to_string()),
            service_version: std::env::var("OTEL_SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            enable_batch_processor: std::env::var("OTEL_BATCH_PROCESSOR")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            log_level: std::env::var("FRAUDWATCH_LOG_LEVEL")
                .ok()
                .and_then(|l| l.parse().ok())
                .unwrap_or_default(),
        }
    }

    /// Validate the configuration before installing exporter pipelines
    pub fn validate(&self) -> Result<(), FraudWatchError> {
        if let Some(ref connection_string) = self.app_insights_connection_string {
            if parse_ingestion_endpoint(connection_string).is_none() {
                return Err(FraudWatchError::configuration_error(
                    "Application Insights connection string has no IngestionEndpoint segment",
                ));
            }
        }
        if let Some(ref endpoint) = self.otlp_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(FraudWatchError::configuration_error(format!(
                    "OTLP endpoint must be an http(s) URL, got '{}'",
                    endpoint
                )));
            }
        }
        if self.debug_port == Some(0) {
            return Err(FraudWatchError::configuration_error(
                "debug port must be non-zero",
            ));
        }
        if self.service_name.trim().is_empty() {
            return Err(FraudWatchError::configuration_error(
                "service name cannot be empty",
            ));
        }
        Ok(())
    }

    /// Ingestion endpoint extracted from the Application Insights connection string
    pub fn ingestion_endpoint(&self) -> Option<String> {
        self.app_insights_connection_string
            .as_deref()
            .and_then(parse_ingestion_endpoint)
    }

    /// Whether any export target is configured
    pub fn has_export_target(&self) -> bool {
        self.app_insights_connection_string.is_some()
            || self.otlp_endpoint.is_some()
            || self.debug_port.is_some()
            || self.console_export
    }

    /// Check if the given log level should be printed
    pub fn should_log(&self, level: LogLevel) -> bool {
        self.log_level >= level
    }

    /// Print an info message if log level allows
    pub fn log_info(&self, message: &str) {
        if self.should_log(LogLevel::INFO) {
            eprintln!("{}", message);
        }
    }

    /// Print a debug message if log level allows
    pub fn log_debug(&self, message: &str) {
        if self.should_log(LogLevel::DEBUG) {
            eprintln!("{}", message);
        }
    }

    /// Print a warning message if log level allows
    pub fn log_warn(&self, message: &str) {
        if self.should_log(LogLevel::WARN) {
            eprintln!("{}", message);
        }
    }
}

/// Extract the ingestion endpoint from an Application Insights connection string
///
/// Connection strings are semicolon-separated `Key=Value` pairs, e.g.
/// `InstrumentationKey=...;IngestionEndpoint=https://westeurope-5.in.applicationinsights.azure.com/;...`.
/// The trailing slash is stripped so the result can be used as an OTLP base URL.
pub fn parse_ingestion_endpoint(connection_string: &str) -> Option<String> {
    connection_string
        .split(';')
        .find_map(|part| part.trim().strip_prefix("IngestionEndpoint="))
        .map(|endpoint| endpoint.trim_end_matches('/').to_string())
        .filter(|endpoint| !endpoint.is_empty())
}

/// Attribute keys, business event names, and metric names for the fraud
/// detection pipeline
///
/// Attribute keys follow the `<namespace>.<field>` convention; business event
/// names follow `fraud_detection.<stage>.<event>`. Dashboards key on these
/// strings, so they are fixed here rather than built ad hoc.
pub mod semantic_conventions {
    /// Workflow span attributes
    pub const WORKFLOW_NAME: &str = "workflow.name";
    pub const WORKFLOW_VERSION: &str = "workflow.version";

    /// Agent span attributes
    pub const AGENT_NAME: &str = "agent.name";
    pub const AGENT_OPERATION: &str = "agent.operation";
    pub const AI_PROCESSING_TIME: &str = "ai.processing_time";

    /// Transaction attributes
    pub const TRANSACTION_ID: &str = "transaction.id";
    pub const CUSTOMER_ID: &str = "customer.id";
    pub const TRANSACTION_AMOUNT: &str = "transaction.amount";
    pub const TRANSACTION_CURRENCY: &str = "transaction.currency";

    /// Risk analysis attributes
    pub const RISK_SCORE: &str = "risk.score";
    pub const RISK_LEVEL: &str = "risk.level";
    pub const RISK_RECOMMENDATION: &str = "risk.recommendation";

    /// Fraud alert attributes
    pub const ALERT_CREATED: &str = "alert.created";
    pub const ALERT_SEVERITY: &str = "alert.severity";

    /// Error attributes
    pub const ERROR: &str = "error";
    pub const ERROR_TYPE: &str = "error.type";
    pub const ERROR_MESSAGE: &str = "error.message";
    pub const EXCEPTION_TYPE: &str = "exception.type";
    pub const EXCEPTION_MESSAGE: &str = "exception.message";

    /// Batch processing attributes
    pub const BATCH_SIZE: &str = "batch.size";
    pub const BATCH_PROCESSED: &str = "batch.processed";
    pub const BATCH_ALERTED: &str = "batch.alerted";
    pub const BATCH_BLOCKED: &str = "batch.blocked";
    pub const BATCH_ERRORED: &str = "batch.errored";

    /// Stage business events
    pub const EVENT_CUSTOMER_DATA_STARTED: &str = "fraud_detection.customer_data.started";
    pub const EVENT_CUSTOMER_DATA_COMPLETED: &str = "fraud_detection.customer_data.completed";
    pub const EVENT_RISK_ANALYSIS_STARTED: &str = "fraud_detection.risk_analysis.started";
    pub const EVENT_RISK_ANALYSIS_COMPLETED: &str = "fraud_detection.risk_analysis.completed";
    pub const EVENT_FRAUD_ALERT_STARTED: &str = "fraud_detection.fraud_alert.started";
    pub const EVENT_FRAUD_ALERT_COMPLETED: &str = "fraud_detection.fraud_alert.completed";

    /// Business KPI events
    pub const EVENT_FRAUD_PREVENTED: &str = "fraud_detection.fraud.prevented";
    pub const EVENT_FALSE_POSITIVE_CONFIRMED: &str = "fraud_detection.false_positive.confirmed";
    pub const EVENT_CUSTOMER_FRICTION: &str = "fraud_detection.customer.friction";
    pub const EVENT_MODEL_PREDICTION: &str = "fraud_detection.model.prediction";
    pub const EVENT_SAR_FILED: &str = "fraud_detection.compliance.sar_filed";

    /// Batch runner events
    pub const EVENT_BATCH_STARTED: &str = "fraud_detection.batch.started";
    pub const EVENT_BATCH_COMPLETED: &str = "fraud_detection.batch.completed";

    /// Business metric names
    pub const METRIC_TRANSACTIONS_PROCESSED: &str = "fraud_detection.transactions.processed";
    pub const METRIC_RISK_SCORE_DISTRIBUTION: &str = "fraud_detection.risk_score.distribution";
    pub const METRIC_ALERTS_CREATED: &str = "fraud_detection.alerts.created";
    pub const METRIC_AMOUNT_BLOCKED: &str = "fraud_detection.amount_blocked";
    pub const METRIC_FALSE_POSITIVES: &str = "fraud_detection.false_positives";
    pub const METRIC_CUSTOMER_FRICTION: &str = "fraud_detection.customer_friction";
    pub const METRIC_MODEL_CONFIDENCE: &str = "fraud_detection.model.confidence";
    pub const METRIC_SAR_FILED: &str = "fraud_detection.compliance.sar_filed";

    /// Common values
    pub const WORKFLOW_VERSION_VALUE: &str = "1.0.0";
}
