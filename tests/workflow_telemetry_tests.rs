//! End-to-end telemetry tests for the fraud detection workflow.
//!
//! These tests run the production workflow against an in-memory span
//! exporter and a recording metrics collector, then assert on the exact
//! spans, business events, and metrics a live OTLP backend would receive:
//! 1. A clean transaction produces the full span cascade with stage events
//! 2. A stage failure is captured on its spans and stops the pipeline
//! 3. A high-risk transaction triggers friction, prevented fraud, and a SAR
//! 4. A batch isolates per-transaction failures, each under a fresh trace
//! 5. A model reply with a high score drives the block path end to end

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use opentelemetry::trace::{Event, SpanId, Status};
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;

use fraudwatch::agents::{AgentClient, AgentReply, FraudAlertAgent};
use fraudwatch::telemetry::{
    semantic_conventions as conv, LogLevel, MetricsCollector, TelemetryConfig, TelemetryManager,
};
use fraudwatch::workflow::{BatchOptions, BatchRunner, FraudDetectionWorkflow, TransactionOutcome};
use fraudwatch::{AlertSeverity, FraudWatchError, Recommendation, RiskLevel, TransactionRequest};

/// Collector that records every metric call for later assertions
#[derive(Debug, Default)]
struct RecordingCollector {
    counters: Mutex<Vec<(String, u64, Vec<KeyValue>)>>,
    amounts: Mutex<Vec<(String, f64, Vec<KeyValue>)>>,
    histograms: Mutex<Vec<(String, f64, Vec<KeyValue>)>>,
}

impl MetricsCollector for RecordingCollector {
    fn record_counter(&self, name: &str, value: u64, labels: &[KeyValue]) {
        self.counters
            .lock()
            .unwrap()
            .push((name.to_string(), value, labels.to_vec()));
    }

    fn record_amount(&self, name: &str, value: f64, labels: &[KeyValue]) {
        self.amounts
            .lock()
            .unwrap()
            .push((name.to_string(), value, labels.to_vec()));
    }

    fn record_histogram(&self, name: &str, value: f64, labels: &[KeyValue]) {
        self.histograms
            .lock()
            .unwrap()
            .push((name.to_string(), value, labels.to_vec()));
    }
}

/// Agent that always fails, for exercising the error path
#[derive(Debug)]
struct FailingAgent {
    name: &'static str,
}

#[async_trait]
impl AgentClient for FailingAgent {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, _prompt: &str) -> fraudwatch::Result<AgentReply> {
        Err(FraudWatchError::agent_error("simulated agent outage"))
    }
}

/// Agent that returns a canned reply regardless of the prompt
#[derive(Debug)]
struct FixedReplyAgent {
    name: &'static str,
    reply: &'static str,
}

#[async_trait]
impl AgentClient for FixedReplyAgent {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, _prompt: &str) -> fraudwatch::Result<AgentReply> {
        Ok(AgentReply::new(self.reply))
    }
}

fn test_manager() -> (
    Arc<TelemetryManager>,
    InMemorySpanExporter,
    Arc<RecordingCollector>,
) {
    let exporter = InMemorySpanExporter::default();
    let provider = TracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let collector = Arc::new(RecordingCollector::default());
    let manager = TelemetryManager::with_pipeline(
        TelemetryConfig::default().with_log_level(LogLevel::OFF),
        provider,
        collector.clone(),
    );
    (Arc::new(manager), exporter, collector)
}

fn find_span<'a>(spans: &'a [SpanData], name: &str) -> &'a SpanData {
    spans
        .iter()
        .find(|span| span.name == name)
        .unwrap_or_else(|| panic!("no span named {name}"))
}

fn attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

fn event<'a>(span: &'a SpanData, name: &str) -> Option<&'a Event> {
    span.events.events.iter().find(|event| event.name == name)
}

fn event_names(span: &SpanData) -> Vec<String> {
    span.events
        .events
        .iter()
        .map(|event| event.name.to_string())
        .collect()
}

fn event_attribute<'a>(event: &'a Event, key: &str) -> Option<&'a Value> {
    event
        .attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

/// Test 1: a clean low-risk transaction emits the full span cascade
#[tokio::test]
async fn test_clean_transaction_emits_full_span_cascade() {
    let (telemetry, exporter, collector) = test_manager();
    let workflow = FraudDetectionWorkflow::new(telemetry);

    let outcome = workflow
        .run(TransactionRequest::new("TX1001", "CUST1001", 5200.0, "USD"))
        .await
        .expect("clean transaction should complete");

    assert_eq!(outcome.risk.score, 10);
    assert_eq!(outcome.risk.level, RiskLevel::Low);
    assert_eq!(outcome.risk.recommendation, Recommendation::Allow);
    assert!(!outcome.alert.created);
    assert!(outcome.alert.alert_id.is_none());
    assert!(outcome.alert.sar_id.is_none());
    assert!(outcome.trace_id.is_some());

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 4, "three stage spans plus the workflow span");

    let workflow_span = find_span(&spans, "fraud_detection_workflow");
    let customer_span = find_span(&spans, "agent.CustomerDataAgent.data_retrieval");
    let risk_span = find_span(&spans, "agent.RiskAnalyserAgent.risk_analysis");
    let alert_span = find_span(&spans, "agent.FraudAlertAgent.alert_creation");

    assert_eq!(workflow_span.status, Status::Ok);
    assert_eq!(
        attribute(workflow_span, conv::TRANSACTION_AMOUNT),
        Some(&Value::F64(5200.0))
    );
    for stage_span in [customer_span, risk_span, alert_span] {
        assert_eq!(
            stage_span.span_context.trace_id(),
            workflow_span.span_context.trace_id()
        );
        assert_eq!(
            stage_span.parent_span_id,
            workflow_span.span_context.span_id()
        );
        assert_eq!(stage_span.status, Status::Ok);
        assert!(
            attribute(stage_span, conv::AI_PROCESSING_TIME).is_some(),
            "stage {} should record its processing time",
            stage_span.name
        );
    }

    assert_eq!(
        event_names(customer_span),
        vec![
            conv::EVENT_CUSTOMER_DATA_STARTED,
            conv::EVENT_CUSTOMER_DATA_COMPLETED
        ]
    );
    let completed = event(customer_span, conv::EVENT_CUSTOMER_DATA_COMPLETED).unwrap();
    assert_eq!(
        event_attribute(completed, "customer_id"),
        Some(&Value::from("CUST1001"))
    );

    let risk_events = event_names(risk_span);
    assert!(risk_events.contains(&conv::EVENT_RISK_ANALYSIS_STARTED.to_string()));
    assert!(risk_events.contains(&conv::EVENT_MODEL_PREDICTION.to_string()));
    assert!(risk_events.contains(&conv::EVENT_RISK_ANALYSIS_COMPLETED.to_string()));
    assert!(
        !risk_events.contains(&conv::EVENT_CUSTOMER_FRICTION.to_string()),
        "an allowed transaction causes no friction"
    );
    assert_eq!(attribute(risk_span, conv::RISK_SCORE), Some(&Value::I64(10)));
    assert_eq!(
        attribute(risk_span, conv::RISK_LEVEL),
        Some(&Value::from("LOW"))
    );
    assert_eq!(
        attribute(risk_span, conv::RISK_RECOMMENDATION),
        Some(&Value::from("ALLOW"))
    );

    assert_eq!(
        attribute(alert_span, conv::ALERT_CREATED),
        Some(&Value::Bool(false))
    );
    assert_eq!(
        attribute(alert_span, conv::ALERT_SEVERITY),
        Some(&Value::from("NONE"))
    );
    assert!(event(alert_span, conv::EVENT_FRAUD_PREVENTED).is_none());
    assert!(event(alert_span, conv::EVENT_SAR_FILED).is_none());

    let counters = collector.counters.lock().unwrap();
    assert!(counters.iter().any(|(name, _, labels)| {
        name == conv::METRIC_TRANSACTIONS_PROCESSED
            && labels
                .iter()
                .any(|kv| kv.key.as_str() == "step" && kv.value == Value::from("customer_data"))
    }));
    assert!(!counters
        .iter()
        .any(|(name, _, _)| name == conv::METRIC_ALERTS_CREATED));

    let histograms = collector.histograms.lock().unwrap();
    assert!(histograms
        .iter()
        .any(|(name, value, _)| name == conv::METRIC_RISK_SCORE_DISTRIBUTION && *value == 10.0));
    assert!(histograms
        .iter()
        .any(|(name, value, _)| name == conv::METRIC_MODEL_CONFIDENCE && (*value - 0.8).abs() < 1e-9));
}

/// Test 2: a stage failure marks its spans and stops the pipeline
#[tokio::test]
async fn test_stage_failure_marks_spans_and_propagates() {
    let (telemetry, exporter, collector) = test_manager();
    let failing = Arc::new(FailingAgent {
        name: "CustomerDataAgent",
    });
    let workflow = FraudDetectionWorkflow::with_agents(
        telemetry,
        failing.clone(),
        failing.clone(),
        failing,
    );

    let error = workflow
        .run(TransactionRequest::new("TX1001", "CUST1001", 5200.0, "USD"))
        .await
        .expect_err("failing agent should fail the workflow");
    assert_eq!(error.category(), "agent");

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(
        spans.len(),
        2,
        "only the failed stage and the workflow span; later stages never start"
    );

    let stage_span = find_span(&spans, "agent.CustomerDataAgent.data_retrieval");
    let workflow_span = find_span(&spans, "fraud_detection_workflow");

    assert!(matches!(stage_span.status, Status::Error { .. }));
    assert!(matches!(workflow_span.status, Status::Error { .. }));
    assert_eq!(attribute(stage_span, conv::ERROR), Some(&Value::Bool(true)));
    assert_eq!(
        attribute(stage_span, conv::ERROR_TYPE),
        Some(&Value::from("agent"))
    );

    let stage_events = event_names(stage_span);
    assert!(stage_events.contains(&conv::EVENT_CUSTOMER_DATA_STARTED.to_string()));
    assert!(
        !stage_events.contains(&conv::EVENT_CUSTOMER_DATA_COMPLETED.to_string()),
        "a failed stage must not claim completion"
    );
    let exception = event(stage_span, "exception").expect("exception event on the failed stage");
    assert_eq!(
        event_attribute(exception, conv::EXCEPTION_TYPE),
        Some(&Value::from("agent"))
    );

    let counters = collector.counters.lock().unwrap();
    assert!(
        !counters
            .iter()
            .any(|(name, _, _)| name == conv::METRIC_TRANSACTIONS_PROCESSED),
        "a failed retrieval stage is not counted as processed"
    );
}

/// Test 3: a high-risk seeded transaction triggers the full block cascade
#[tokio::test]
async fn test_high_risk_transaction_triggers_block_cascade() {
    let (telemetry, exporter, collector) = test_manager();
    let workflow = FraudDetectionWorkflow::new(telemetry);

    let outcome = workflow
        .run(TransactionRequest::new("TX1005", "CUST1005", 200.0, "EUR"))
        .await
        .expect("high-risk transaction should still complete");

    assert_eq!(outcome.risk.score, 75);
    assert_eq!(outcome.risk.level, RiskLevel::High);
    assert_eq!(outcome.risk.recommendation, Recommendation::Block);
    assert!(outcome.blocked());
    assert!(outcome.alert.created);
    assert_eq!(outcome.alert.alert_id.as_deref(), Some("ALERT-TX1005"));
    assert_eq!(outcome.alert.severity, Some(AlertSeverity::High));
    assert!(
        outcome.alert.sar_id.is_some(),
        "HIGH severity files a SAR even under the amount threshold"
    );

    let spans = exporter.get_finished_spans().unwrap();
    let risk_span = find_span(&spans, "agent.RiskAnalyserAgent.risk_analysis");
    let alert_span = find_span(&spans, "agent.FraudAlertAgent.alert_creation");

    let friction = event(risk_span, conv::EVENT_CUSTOMER_FRICTION)
        .expect("a blocked transaction frustrates the customer");
    assert_eq!(
        event_attribute(friction, "friction_type"),
        Some(&Value::from("transaction_blocked"))
    );
    assert_eq!(
        event_attribute(friction, "transaction_declined"),
        Some(&Value::Bool(true))
    );

    assert_eq!(
        attribute(alert_span, conv::ALERT_CREATED),
        Some(&Value::Bool(true))
    );
    assert_eq!(
        attribute(alert_span, conv::ALERT_SEVERITY),
        Some(&Value::from("HIGH"))
    );

    let prevented = event(alert_span, conv::EVENT_FRAUD_PREVENTED).unwrap();
    assert_eq!(
        event_attribute(prevented, "blocked_amount"),
        Some(&Value::F64(200.0))
    );
    assert_eq!(
        event_attribute(prevented, "currency"),
        Some(&Value::from("EUR"))
    );
    assert_eq!(
        event_attribute(prevented, "risk_score"),
        Some(&Value::I64(75))
    );

    let sar = event(alert_span, conv::EVENT_SAR_FILED).unwrap();
    assert_eq!(
        event_attribute(sar, "amount_threshold_exceeded"),
        Some(&Value::Bool(false))
    );
    assert_eq!(
        event_attribute(sar, "customer_id"),
        Some(&Value::from("CUST1005"))
    );

    let counters = collector.counters.lock().unwrap();
    assert!(counters.iter().any(|(name, _, labels)| {
        name == conv::METRIC_ALERTS_CREATED
            && labels
                .iter()
                .any(|kv| kv.key.as_str() == "severity" && kv.value == Value::from("HIGH"))
    }));
    assert!(counters.iter().any(|(name, _, labels)| {
        name == conv::METRIC_CUSTOMER_FRICTION
            && labels.iter().any(|kv| {
                kv.key.as_str() == "friction_type"
                    && kv.value == Value::from("transaction_blocked")
            })
    }));
    assert!(counters
        .iter()
        .any(|(name, _, _)| name == conv::METRIC_SAR_FILED));

    let amounts = collector.amounts.lock().unwrap();
    assert!(amounts
        .iter()
        .any(|(name, value, _)| name == conv::METRIC_AMOUNT_BLOCKED && *value == 200.0));
}

/// Test 4: a batch isolates per-transaction failures, each under a fresh trace
#[tokio::test]
async fn test_batch_isolates_failures_with_fresh_traces() {
    let (telemetry, exporter, _collector) = test_manager();
    let runner = BatchRunner::new(FraudDetectionWorkflow::new(telemetry));

    let options = BatchOptions {
        transactions: vec![
            TransactionRequest::new("TX1001", "CUST1001", 5200.0, "USD"),
            TransactionRequest::new("TX1003", "CUST1003", 300.0, "CNY"),
            TransactionRequest::new("TX9999", "CUST9999", 50.0, "USD"),
            TransactionRequest::new("TX1006", "CUST1006", 70.0, "GBP"),
            TransactionRequest::new("TX1013", "CUST1013", 60.0, "EUR"),
        ],
        delay_between: Duration::ZERO,
        randomize_delay: false,
        shuffle: false,
    };
    let summary = runner.run(options).await.expect("batch should complete");

    assert_eq!(summary.processed, 5, "processed counts every attempt");
    assert_eq!(summary.errored, 1);
    assert_eq!(summary.alerted, 0);
    assert_eq!(summary.blocked, 0);
    assert_eq!(summary.outcomes.len(), 5);
    assert!(matches!(
        &summary.outcomes[2],
        TransactionOutcome::Errored { transaction_id, .. } if transaction_id == "TX9999"
    ));

    let spans = exporter.get_finished_spans().unwrap();
    // 4 completed transactions x 4 spans, 2 spans for the failed one, 1 batch span
    assert_eq!(spans.len(), 19);

    let batch_span = find_span(&spans, "fraud_detection_batch");
    assert_eq!(batch_span.status, Status::Ok);
    assert_eq!(
        attribute(batch_span, conv::BATCH_SIZE),
        Some(&Value::I64(5))
    );
    assert_eq!(
        attribute(batch_span, conv::BATCH_PROCESSED),
        Some(&Value::I64(5))
    );
    assert_eq!(
        attribute(batch_span, conv::BATCH_ERRORED),
        Some(&Value::I64(1))
    );

    assert!(event_names(batch_span).contains(&conv::EVENT_BATCH_STARTED.to_string()));
    let completed = event(batch_span, conv::EVENT_BATCH_COMPLETED).unwrap();
    assert_eq!(event_attribute(completed, "processed"), Some(&Value::I64(5)));
    assert_eq!(event_attribute(completed, "errored"), Some(&Value::I64(1)));
    assert!(event_attribute(completed, "duration_seconds").is_some());

    // every transaction runs as its own root trace, separate from the batch span
    let workflow_spans: Vec<&SpanData> = spans
        .iter()
        .filter(|span| span.name == "fraud_detection_workflow")
        .collect();
    assert_eq!(workflow_spans.len(), 5);
    let mut trace_ids = std::collections::HashSet::new();
    for span in &workflow_spans {
        assert_eq!(span.parent_span_id, SpanId::INVALID);
        assert_ne!(
            span.span_context.trace_id(),
            batch_span.span_context.trace_id()
        );
        trace_ids.insert(span.span_context.trace_id());
    }
    assert_eq!(trace_ids.len(), 5, "each transaction gets a fresh trace");
    assert_eq!(
        summary.trace_id,
        Some(batch_span.span_context.trace_id().to_string())
    );
}

/// Test 5: a model reply with a high score drives the block path end to end
#[tokio::test]
async fn test_model_reply_drives_high_risk_path() {
    let (telemetry, exporter, collector) = test_manager();
    let customer = Arc::new(FixedReplyAgent {
        name: "CustomerDataAgent",
        reply: "Customer CUST1002 holds an established account on a recognized device. \
                Destination carries no elevated country risk.",
    });
    let risk = Arc::new(FixedReplyAgent {
        name: "RiskAnalyserAgent",
        reply: "Risk assessment for transaction TX1002:\nRisk Score: 78/100\n\
                Risk Level: HIGH\nRecommendation: BLOCK",
    });
    let workflow = FraudDetectionWorkflow::with_agents(
        telemetry,
        customer,
        risk,
        Arc::new(FraudAlertAgent::new()),
    );

    let outcome = workflow
        .run(TransactionRequest::new("TX1002", "CUST1002", 15000.0, "USD"))
        .await
        .expect("workflow should complete");

    assert_eq!(outcome.risk.score, 78);
    assert_eq!(outcome.risk.level, RiskLevel::High);
    assert_eq!(outcome.risk.recommendation, Recommendation::Block);
    assert!((outcome.risk.model_confidence - 0.56).abs() < 1e-9);
    assert!(outcome.alert.created);
    assert_eq!(outcome.alert.alert_id.as_deref(), Some("ALERT-TX1002"));
    assert_eq!(outcome.alert.severity, Some(AlertSeverity::High));
    let sar_id = outcome.alert.sar_id.as_deref().expect("SAR over the amount threshold");
    assert!(sar_id.starts_with("SAR-"));

    let spans = exporter.get_finished_spans().unwrap();
    let risk_span = find_span(&spans, "agent.RiskAnalyserAgent.risk_analysis");
    let alert_span = find_span(&spans, "agent.FraudAlertAgent.alert_creation");

    assert_eq!(attribute(risk_span, conv::RISK_SCORE), Some(&Value::I64(78)));
    let prediction = event(risk_span, conv::EVENT_MODEL_PREDICTION).unwrap();
    assert_eq!(
        event_attribute(prediction, "prediction"),
        Some(&Value::from("HIGH"))
    );
    assert_eq!(
        event_attribute(prediction, "model_version"),
        Some(&Value::from("v2.3.1"))
    );
    assert!(event(risk_span, conv::EVENT_CUSTOMER_FRICTION).is_some());

    let prevented = event(alert_span, conv::EVENT_FRAUD_PREVENTED).unwrap();
    assert_eq!(
        event_attribute(prevented, "blocked_amount"),
        Some(&Value::F64(15000.0))
    );
    let sar = event(alert_span, conv::EVENT_SAR_FILED).unwrap();
    assert_eq!(
        event_attribute(sar, "amount_threshold_exceeded"),
        Some(&Value::Bool(true))
    );

    let amounts = collector.amounts.lock().unwrap();
    assert!(amounts
        .iter()
        .any(|(name, value, _)| name == conv::METRIC_AMOUNT_BLOCKED && *value == 15000.0));
    let counters = collector.counters.lock().unwrap();
    assert!(counters.iter().any(|(name, _, labels)| {
        name == conv::METRIC_SAR_FILED
            && labels.iter().any(|kv| {
                kv.key.as_str() == "amount_threshold_exceeded" && kv.value == Value::Bool(true)
            })
    }));
}
