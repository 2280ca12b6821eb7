//! OpenTelemetry pipeline installation and span management.
//!
//! [`TelemetryManager::initialize`] validates the configuration, installs the
//! tracer and meter pipelines exactly once per process, and hands back a
//! cheaply cloneable manager. When no export target is configured the manager
//! still works: spans are created against a provider with no processors and
//! metrics hit a no-op collector, so workflow code never checks whether
//! telemetry is on.
//!
//! Spans are wrapped in [`WorkflowSpan`], which carries its own
//! [`Context`]. Parent/child relationships are established by passing that
//! context explicitly; nothing here consults thread-local or task-local
//! state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use opentelemetry::{
    global,
    metrics::MeterProvider as _,
    trace::{SpanKind, Status, TraceContextExt, Tracer, TracerProvider as _},
    Array, Context, KeyValue, StringValue, Value,
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    metrics::{
        reader::{DefaultAggregationSelector, DefaultTemporalitySelector},
        PeriodicReader, SdkMeterProvider,
    },
    runtime,
    trace::{self as sdktrace, BatchSpanProcessor, TracerProvider},
    Resource,
};
use tracing::warn;

use super::metrics::{NoOpMetricsCollector, OtelMetricsCollector, SharedMetricsCollector};
use super::semantic_conventions as conv;
use super::TelemetryConfig;
use crate::error::FraudWatchError;
use crate::types::{AlertSeverity, FrictionType, Recommendation, RiskLevel};

/// Pipelines installed once per process
struct InstalledPipelines {
    config: TelemetryConfig,
    tracer_provider: TracerProvider,
    meter_provider: Option<SdkMeterProvider>,
    metrics: SharedMetricsCollector,
}

static INSTALLED: OnceCell<InstalledPipelines> = OnceCell::new();

/// Central telemetry coordinator for the fraud detection workflow
///
/// Create one with [`TelemetryManager::initialize`] and pass it by reference
/// (or clone; clones share the underlying pipelines) into the workflow. Spans,
/// business events, and business metrics all go through this type.
#[derive(Clone, Debug)]
pub struct TelemetryManager {
    config: TelemetryConfig,
    tracer_provider: TracerProvider,
    meter_provider: Option<SdkMeterProvider>,
    metrics: SharedMetricsCollector,
    global_install: bool,
}

impl TelemetryManager {
    /// Initialize telemetry, installing exporter pipelines on first call
    ///
    /// Initialization is idempotent: the first call installs the pipelines
    /// described by its configuration and every later call returns a manager
    /// sharing those same pipelines, ignoring the configuration it was given.
    /// Must run inside a Tokio runtime when batch span processing or OTLP
    /// metrics export is configured.
    pub fn initialize(config: TelemetryConfig) -> crate::Result<Self> {
        let pipelines = INSTALLED.get_or_try_init(|| install(&config))?;
        Ok(Self {
            config: pipelines.config.clone(),
            tracer_provider: pipelines.tracer_provider.clone(),
            meter_provider: pipelines.meter_provider.clone(),
            metrics: pipelines.metrics.clone(),
            global_install: true,
        })
    }

    /// Build a manager around an externally constructed tracer provider
    ///
    /// Nothing is installed globally, so tests can wire an in-memory exporter
    /// and inspect finished spans, and embedders can route spans into an
    /// existing pipeline.
    pub fn with_pipeline(
        config: TelemetryConfig,
        tracer_provider: TracerProvider,
        metrics: SharedMetricsCollector,
    ) -> Self {
        Self {
            config,
            tracer_provider,
            meter_provider: None,
            metrics,
            global_install: false,
        }
    }

    /// The configuration this manager was initialized with
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Metrics collector backing the `record_*` methods
    pub fn metrics(&self) -> &SharedMetricsCollector {
        &self.metrics
    }

    /// Tracer from this manager's provider, also used by the logging bridge
    pub fn tracer(&self) -> sdktrace::Tracer {
        self.tracer_provider.tracer("fraud-detection-workflow")
    }

    /// Create a root span for one workflow execution
    ///
    /// The span carries `workflow.name` and `workflow.version` plus any
    /// caller attributes. It ends when [`WorkflowSpan::finish`] is called or
    /// when the guard drops.
    pub fn create_workflow_span(&self, name: &str, attributes: Vec<KeyValue>) -> WorkflowSpan {
        self.create_workflow_span_with_parent(name, &Context::new(), attributes)
    }

    /// Create a workflow span under an explicit parent context
    ///
    /// A context with no active span yields a root; a context carrying one
    /// makes the new span its child.
    pub fn create_workflow_span_with_parent(
        &self,
        name: &str,
        parent: &Context,
        attributes: Vec<KeyValue>,
    ) -> WorkflowSpan {
        let mut span_attributes = vec![
            KeyValue::new(conv::WORKFLOW_NAME, name.to_string()),
            KeyValue::new(conv::WORKFLOW_VERSION, conv::WORKFLOW_VERSION_VALUE),
        ];
        span_attributes.extend(attributes);

        let tracer = self.tracer();
        let span = tracer
            .span_builder(name.to_string())
            .with_kind(SpanKind::Client)
            .with_attributes(span_attributes)
            .start_with_context(&tracer, parent);

        WorkflowSpan::new(span, name, parent)
    }

    /// Create a span for one agent call, nested under the given parent
    ///
    /// The span is named `agent.<agent_name>.<operation>` and tagged with
    /// `agent.name` and `agent.operation`. The returned guard ends the span
    /// on drop, so an early `?` return still closes it.
    pub fn create_agent_span(
        &self,
        agent_name: &str,
        operation: &str,
        parent: &Context,
        attributes: Vec<KeyValue>,
    ) -> crate::Result<WorkflowSpan> {
        if agent_name.trim().is_empty() {
            return Err(FraudWatchError::invalid_input("agent name cannot be empty"));
        }
        if operation.trim().is_empty() {
            return Err(FraudWatchError::invalid_input(
                "agent operation cannot be empty",
            ));
        }

        let span_name = format!("agent.{}.{}", agent_name, operation);
        let mut span_attributes = vec![
            KeyValue::new(conv::AGENT_NAME, agent_name.to_string()),
            KeyValue::new(conv::AGENT_OPERATION, operation.to_string()),
        ];
        span_attributes.extend(attributes);

        let tracer = self.tracer();
        let span = tracer
            .span_builder(span_name.clone())
            .with_kind(SpanKind::Client)
            .with_attributes(span_attributes)
            .start_with_context(&tracer, parent);

        Ok(WorkflowSpan::new(span, span_name, parent))
    }

    /// Attach a business event to the active span in `cx`
    ///
    /// Event names follow `fraud_detection.<stage>.<event>`. If the context
    /// has no active span the event is dropped with a warning rather than
    /// silently lost or parked on an unrelated span.
    pub fn send_business_event(&self, cx: &Context, event_name: &str, attributes: Vec<KeyValue>) {
        if !cx.has_active_span() {
            warn!(
                event_name = event_name,
                "dropping business event: no active span in the provided context"
            );
            return;
        }
        cx.span().add_event(event_name.to_string(), attributes);
    }

    /// Count a transaction passing through a workflow step
    pub fn record_transaction_processed(&self, step: &str, transaction_id: &str) {
        self.metrics.increment(
            conv::METRIC_TRANSACTIONS_PROCESSED,
            &[
                KeyValue::new("step", step.to_string()),
                KeyValue::new("transaction_id", transaction_id.to_string()),
            ],
        );
    }

    /// Record a risk score into the score distribution
    pub fn record_risk_score(
        &self,
        score: u8,
        transaction_id: &str,
        recommendation: Recommendation,
    ) {
        self.metrics.record_histogram(
            conv::METRIC_RISK_SCORE_DISTRIBUTION,
            f64::from(score),
            &[
                KeyValue::new("transaction_id", transaction_id.to_string()),
                KeyValue::new("recommendation", recommendation.to_string()),
            ],
        );
    }

    /// Count a created fraud alert by severity and decision
    pub fn record_fraud_alert_created(
        &self,
        alert_id: &str,
        severity: AlertSeverity,
        decision_action: Recommendation,
        transaction_id: &str,
    ) {
        self.metrics.increment(
            conv::METRIC_ALERTS_CREATED,
            &[
                KeyValue::new("alert_id", alert_id.to_string()),
                KeyValue::new("severity", severity.to_string()),
                KeyValue::new("decision_action", decision_action.to_string()),
                KeyValue::new("transaction_id", transaction_id.to_string()),
            ],
        );
    }

    /// Record a blocked fraudulent amount and emit `fraud.prevented`
    pub fn record_fraud_prevented(
        &self,
        cx: &Context,
        transaction_id: &str,
        blocked_amount: f64,
        currency: &str,
        fraud_type: &str,
        risk_score: u8,
    ) {
        self.metrics.record_amount(
            conv::METRIC_AMOUNT_BLOCKED,
            blocked_amount,
            &[
                KeyValue::new("transaction_id", transaction_id.to_string()),
                KeyValue::new("currency", currency.to_string()),
                KeyValue::new("fraud_type", fraud_type.to_string()),
            ],
        );
        self.send_business_event(
            cx,
            conv::EVENT_FRAUD_PREVENTED,
            vec![
                KeyValue::new("transaction_id", transaction_id.to_string()),
                KeyValue::new("blocked_amount", blocked_amount),
                KeyValue::new("currency", currency.to_string()),
                KeyValue::new("fraud_type", fraud_type.to_string()),
                KeyValue::new("risk_score", i64::from(risk_score)),
            ],
        );
    }

    /// Record a confirmed false positive and emit `false_positive.confirmed`
    pub fn record_false_positive(
        &self,
        cx: &Context,
        transaction_id: &str,
        original_decision: Recommendation,
        customer_friction_score: f64,
        resolution_time_hours: f64,
        compensation_amount: f64,
    ) {
        self.metrics.increment(
            conv::METRIC_FALSE_POSITIVES,
            &[
                KeyValue::new("transaction_id", transaction_id.to_string()),
                KeyValue::new("original_decision", original_decision.to_string()),
            ],
        );
        self.send_business_event(
            cx,
            conv::EVENT_FALSE_POSITIVE_CONFIRMED,
            vec![
                KeyValue::new("transaction_id", transaction_id.to_string()),
                KeyValue::new("original_decision", original_decision.to_string()),
                KeyValue::new("customer_friction_score", customer_friction_score),
                KeyValue::new("resolution_time_hours", resolution_time_hours),
                KeyValue::new("compensation_amount", compensation_amount),
            ],
        );
    }

    /// Record a customer friction event and emit `customer.friction`
    pub fn record_customer_friction(
        &self,
        cx: &Context,
        customer_id: &str,
        transaction_id: &str,
        friction_type: FrictionType,
        transaction_declined: bool,
    ) {
        self.metrics.increment(
            conv::METRIC_CUSTOMER_FRICTION,
            &[
                KeyValue::new("friction_type", friction_type.as_str()),
                KeyValue::new("transaction_declined", transaction_declined),
            ],
        );
        self.send_business_event(
            cx,
            conv::EVENT_CUSTOMER_FRICTION,
            vec![
                KeyValue::new("customer_id", customer_id.to_string()),
                KeyValue::new("transaction_id", transaction_id.to_string()),
                KeyValue::new("friction_type", friction_type.as_str()),
                KeyValue::new("transaction_declined", transaction_declined),
            ],
        );
    }

    /// Record a model prediction and emit `model.prediction`
    pub fn record_model_prediction(
        &self,
        cx: &Context,
        transaction_id: &str,
        model_version: &str,
        confidence_score: f64,
        prediction: RiskLevel,
        top_features: Vec<String>,
    ) {
        self.metrics.record_histogram(
            conv::METRIC_MODEL_CONFIDENCE,
            confidence_score,
            &[
                KeyValue::new("model_version", model_version.to_string()),
                KeyValue::new("prediction", prediction.as_str()),
            ],
        );
        let features = Value::Array(Array::String(
            top_features.into_iter().map(StringValue::from).collect(),
        ));
        self.send_business_event(
            cx,
            conv::EVENT_MODEL_PREDICTION,
            vec![
                KeyValue::new("transaction_id", transaction_id.to_string()),
                KeyValue::new("model_version", model_version.to_string()),
                KeyValue::new("confidence_score", confidence_score),
                KeyValue::new("prediction", prediction.as_str()),
                KeyValue::new("top_features", features),
            ],
        );
    }

    /// Record a filed Suspicious Activity Report and emit `compliance.sar_filed`
    pub fn record_sar_filed(
        &self,
        cx: &Context,
        transaction_id: &str,
        sar_id: &str,
        filing_deadline: &str,
        amount_threshold_exceeded: bool,
        customer_id: &str,
    ) {
        self.metrics.increment(
            conv::METRIC_SAR_FILED,
            &[KeyValue::new(
                "amount_threshold_exceeded",
                amount_threshold_exceeded,
            )],
        );
        self.send_business_event(
            cx,
            conv::EVENT_SAR_FILED,
            vec![
                KeyValue::new("transaction_id", transaction_id.to_string()),
                KeyValue::new("sar_id", sar_id.to_string()),
                KeyValue::new("filing_deadline", filing_deadline.to_string()),
                KeyValue::new("amount_threshold_exceeded", amount_threshold_exceeded),
                KeyValue::new("customer_id", customer_id.to_string()),
            ],
        );
    }

    /// Flush pending spans and metrics without tearing the pipelines down
    pub fn flush(&self) {
        for result in self.tracer_provider.force_flush() {
            if let Err(e) = result {
                self.config.log_warn(&format!("Span flush failed: {}", e));
            }
        }
        if let Some(ref meter_provider) = self.meter_provider {
            if let Err(e) = meter_provider.force_flush() {
                self.config.log_warn(&format!("Metrics flush failed: {}", e));
            }
        }
    }

    /// Flush and shut down the globally installed pipelines
    ///
    /// Managers built with [`TelemetryManager::with_pipeline`] only flush;
    /// the externally owned provider is left to its owner.
    pub fn shutdown(&self) {
        self.flush();
        if self.global_install {
            global::shutdown_tracer_provider();
            if let Some(ref meter_provider) = self.meter_provider {
                if let Err(e) = meter_provider.shutdown() {
                    self.config
                        .log_warn(&format!("Metrics shutdown failed: {}", e));
                }
            }
        }
    }
}

fn install(config: &TelemetryConfig) -> Result<InstalledPipelines, FraudWatchError> {
    config.validate()?;

    if !config.enabled || !config.has_export_target() {
        config.log_debug("No telemetry export target configured; spans and metrics are no-ops");
        return Ok(InstalledPipelines {
            config: config.clone(),
            tracer_provider: TracerProvider::builder().build(),
            meter_provider: None,
            metrics: Arc::new(NoOpMetricsCollector),
        });
    }

    let resource = Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", config.service_version.clone()),
    ]);

    let mut builder = TracerProvider::builder()
        .with_config(sdktrace::Config::default().with_resource(resource.clone()));

    if config.console_export {
        config.log_debug("Console span export enabled");
        builder = builder.with_simple_exporter(opentelemetry_stdout::SpanExporter::default());
    }

    // One OTLP processor per configured backend, in a fixed priority order.
    let mut otlp_bases: Vec<String> = Vec::new();
    if let Some(endpoint) = config.ingestion_endpoint() {
        otlp_bases.push(endpoint);
    }
    if let Some(ref endpoint) = config.otlp_endpoint {
        otlp_bases.push(endpoint.trim_end_matches('/').to_string());
    }
    if let Some(port) = config.debug_port {
        otlp_bases.push(format!("http://localhost:{}", port));
    }

    for endpoint in &otlp_bases {
        let exporter = build_span_exporter(config, endpoint)?;
        if config.enable_batch_processor {
            let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio).build();
            builder = builder.with_span_processor(processor);
        } else {
            builder = builder.with_simple_exporter(exporter);
        }
    }

    let tracer_provider = builder.build();
    global::set_tracer_provider(tracer_provider.clone());

    // Metrics ride the first OTLP backend. Traces still flow if the metrics
    // pipeline cannot be built.
    let (meter_provider, metrics) = match otlp_bases.first() {
        Some(endpoint) => match install_metrics_pipeline(endpoint, resource) {
            Ok((provider, collector)) => (Some(provider), collector),
            Err(e) => {
                config.log_warn(&format!(
                    "Metrics pipeline unavailable, continuing with traces only: {}",
                    e
                ));
                (None, Arc::new(NoOpMetricsCollector) as SharedMetricsCollector)
            }
        },
        None => (None, Arc::new(NoOpMetricsCollector) as SharedMetricsCollector),
    };

    config.log_info(&format!(
        "Telemetry initialized for {} v{}: {} OTLP span exporter(s), console export {}, metrics {}",
        config.service_name,
        config.service_version,
        otlp_bases.len(),
        if config.console_export { "on" } else { "off" },
        if meter_provider.is_some() { "on" } else { "off" },
    ));

    Ok(InstalledPipelines {
        config: config.clone(),
        tracer_provider,
        meter_provider,
        metrics,
    })
}

fn build_span_exporter(
    config: &TelemetryConfig,
    endpoint: &str,
) -> Result<opentelemetry_otlp::SpanExporter, FraudWatchError> {
    let exporter = if use_http_protocol(endpoint) {
        config.log_debug(&format!("Using OTLP/HTTP span export to {}", endpoint));
        opentelemetry_otlp::new_exporter()
            .http()
            .with_endpoint(traces_url(endpoint))
            .with_timeout(Duration::from_secs(10))
            .build_span_exporter()
    } else {
        config.log_debug(&format!("Using OTLP/gRPC span export to {}", endpoint));
        opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint.to_string())
            .with_timeout(Duration::from_secs(10))
            .build_span_exporter()
    };
    exporter.map_err(|e| {
        FraudWatchError::configuration_error(format!(
            "Failed to build OTLP span exporter for {}: {}",
            endpoint, e
        ))
    })
}

fn install_metrics_pipeline(
    endpoint: &str,
    resource: Resource,
) -> Result<(SdkMeterProvider, SharedMetricsCollector), FraudWatchError> {
    let exporter = if use_http_protocol(endpoint) {
        opentelemetry_otlp::new_exporter()
            .http()
            .with_endpoint(metrics_url(endpoint))
            .with_timeout(Duration::from_secs(10))
            .build_metrics_exporter(
                Box::new(DefaultAggregationSelector::new()),
                Box::new(DefaultTemporalitySelector::new()),
            )
    } else {
        opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint.to_string())
            .with_timeout(Duration::from_secs(10))
            .build_metrics_exporter(
                Box::new(DefaultAggregationSelector::new()),
                Box::new(DefaultTemporalitySelector::new()),
            )
    }
    .map_err(|e| {
        FraudWatchError::telemetry_error(format!(
            "Failed to build OTLP metrics exporter for {}: {}",
            endpoint, e
        ))
    })?;

    let reader = PeriodicReader::builder(exporter, runtime::Tokio)
        .with_interval(Duration::from_secs(10))
        .with_timeout(Duration::from_secs(30))
        .build();

    let meter_provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build();
    global::set_meter_provider(meter_provider.clone());

    let meter = meter_provider.meter("fraud-detection-workflow");
    let collector = OtelMetricsCollector::new(meter)?;
    Ok((meter_provider, Arc::new(collector)))
}

/// Decide between OTLP/HTTP and OTLP/gRPC for an endpoint
///
/// Standard OTLP ports decide outright. Everything else defaults to HTTP,
/// which covers https endpoints, hosted backends like Application Insights
/// and Honeycomb, and unknown collectors.
fn use_http_protocol(endpoint: &str) -> bool {
    if endpoint.contains(":4318") || endpoint.contains(":4320") || endpoint.contains(":8080") {
        return true;
    }
    if endpoint.contains(":4317") || endpoint.contains(":4319") {
        return false;
    }
    true
}

fn traces_url(endpoint: &str) -> String {
    if endpoint.ends_with("/v1/traces") {
        endpoint.to_string()
    } else if endpoint.ends_with('/') {
        format!("{}v1/traces", endpoint)
    } else {
        format!("{}/v1/traces", endpoint)
    }
}

fn metrics_url(endpoint: &str) -> String {
    if endpoint.ends_with("/v1/metrics") {
        endpoint.to_string()
    } else if endpoint.ends_with('/') {
        format!("{}v1/metrics", endpoint)
    } else {
        format!("{}/v1/metrics", endpoint)
    }
}

/// Context-carrying span with guaranteed closure
///
/// Wraps an OpenTelemetry span together with the [`Context`] that makes it
/// the active span, so child spans and business events can be parented
/// explicitly via [`WorkflowSpan::context`]. The span ends exactly once:
/// through [`WorkflowSpan::finish`] or on drop, whichever comes first. Panics
/// and early returns still produce a closed span.
pub struct WorkflowSpan {
    cx: Context,
    operation: String,
    start_time: Instant,
    finished: bool,
}

impl WorkflowSpan {
    fn new<S>(span: S, operation: impl Into<String>, parent_cx: &Context) -> Self
    where
        S: opentelemetry::trace::Span + Send + Sync + 'static,
    {
        Self {
            cx: parent_cx.with_span(span),
            operation: operation.into(),
            start_time: Instant::now(),
            finished: false,
        }
    }

    /// Context in which this span is active; pass to children and events
    pub fn context(&self) -> Context {
        self.cx.clone()
    }

    /// Span name this guard was created with
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Hex trace ID, if the span has a valid recording context
    pub fn trace_id(&self) -> Option<String> {
        let span = self.cx.span();
        let span_context = span.span_context();
        if span_context.is_valid() {
            Some(span_context.trace_id().to_string())
        } else {
            None
        }
    }

    /// Set a single attribute on the span
    pub fn set_attribute(&self, key: &str, value: impl Into<Value>) {
        self.cx
            .span()
            .set_attribute(KeyValue::new(key.to_string(), value.into()));
    }

    /// Set multiple attributes on the span
    pub fn set_attributes(&self, attributes: Vec<KeyValue>) {
        for attribute in attributes {
            self.cx.span().set_attribute(attribute);
        }
    }

    /// Add a timestamped event to the span
    pub fn add_event(&self, name: &str, attributes: Vec<KeyValue>) {
        self.cx.span().add_event(name.to_string(), attributes);
    }

    /// Mark the span as successful
    pub fn set_success(&self) {
        self.cx.span().set_status(Status::Ok);
    }

    /// Record a failure: error attributes, an `exception` event, error status
    ///
    /// The caller still propagates the error; this only captures it on the
    /// span before the guard closes.
    pub fn record_error(&self, error: &FraudWatchError) {
        let span = self.cx.span();
        span.set_attribute(KeyValue::new(conv::ERROR, true));
        span.set_attribute(KeyValue::new(conv::ERROR_TYPE, error.category()));
        span.set_attribute(KeyValue::new(conv::ERROR_MESSAGE, error.to_string()));
        span.add_event(
            "exception".to_string(),
            vec![
                KeyValue::new(conv::EXCEPTION_TYPE, error.category()),
                KeyValue::new(conv::EXCEPTION_MESSAGE, error.to_string()),
            ],
        );
        span.set_status(Status::error(error.to_string()));
    }

    /// Time elapsed since the span was created
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// End the span now instead of waiting for drop
    pub fn finish(mut self) {
        self.end();
    }

    fn end(&mut self) {
        if !self.finished {
            self.cx.span().end();
            self.finished = true;
        }
    }
}

impl Drop for WorkflowSpan {
    fn drop(&mut self) {
        self.end();
    }
}

impl std::fmt::Debug for WorkflowSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowSpan")
            .field("operation", &self.operation)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
