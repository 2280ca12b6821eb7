//! Sequential fraud detection workflow.
//!
//! One run takes a [`TransactionRequest`] through three agent stages in
//! order: customer data retrieval, risk analysis, and the fraud alert
//! decision. Each stage gets its own child span under the workflow span,
//! emits `started`/`completed` business events, and records the business
//! metrics for its part of the pipeline. A stage failure is captured on the
//! stage span and propagated; later stages do not run on partial data.
//!
//! The workflow holds its [`TelemetryManager`] by shared reference and
//! passes span contexts explicitly, so unit tests can run the exact
//! production path against an in-memory exporter.

pub mod batch;
pub mod scoring;

pub use batch::{BatchOptions, BatchRunner, BatchSummary, TransactionOutcome};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use opentelemetry::{Context, KeyValue};
use tracing::{debug, info};
use uuid::Uuid;

use crate::agents::{
    AgentClient, CustomerDataAgent, CustomerDirectory, FraudAlertAgent, RiskAnalyserAgent,
};
use crate::telemetry::{semantic_conventions as conv, TelemetryManager, WorkflowSpan};
use crate::types::{
    AlertDecision, AlertSeverity, CustomerAnalysis, FrictionType, Recommendation, RiskAssessment,
    RiskLevel, TransactionRequest, WorkflowOutcome, WorkflowStage,
};

/// Span name for one complete workflow execution
pub const WORKFLOW_SPAN_NAME: &str = "fraud_detection_workflow";

/// Request amount at or above which a SAR is filed regardless of severity
pub const SAR_AMOUNT_THRESHOLD: f64 = 10_000.0;

/// Days until a filed SAR is due with the regulator
const SAR_FILING_WINDOW_DAYS: i64 = 30;

/// The three-agent fraud detection pipeline
#[derive(Clone)]
pub struct FraudDetectionWorkflow {
    telemetry: Arc<TelemetryManager>,
    customer_data: Arc<dyn AgentClient>,
    risk_analyser: Arc<dyn AgentClient>,
    fraud_alert: Arc<dyn AgentClient>,
}

impl FraudDetectionWorkflow {
    /// Workflow over the scripted agents and the seeded customer directory
    pub fn new(telemetry: Arc<TelemetryManager>) -> Self {
        let directory = Arc::new(CustomerDirectory::with_seed_data());
        Self {
            telemetry,
            customer_data: Arc::new(CustomerDataAgent::new(directory.clone())),
            risk_analyser: Arc::new(RiskAnalyserAgent::new(directory)),
            fraud_alert: Arc::new(FraudAlertAgent::new()),
        }
    }

    /// Workflow over caller-provided agents
    ///
    /// This is the seam tests use to inject failing or fixed-reply agents.
    pub fn with_agents(
        telemetry: Arc<TelemetryManager>,
        customer_data: Arc<dyn AgentClient>,
        risk_analyser: Arc<dyn AgentClient>,
        fraud_alert: Arc<dyn AgentClient>,
    ) -> Self {
        Self {
            telemetry,
            customer_data,
            risk_analyser,
            fraud_alert,
        }
    }

    /// Telemetry manager this workflow reports through
    pub fn telemetry(&self) -> &Arc<TelemetryManager> {
        &self.telemetry
    }

    /// Run the full pipeline for one transaction as a new trace
    pub async fn run(&self, request: TransactionRequest) -> crate::Result<WorkflowOutcome> {
        self.run_in_context(request, &Context::new()).await
    }

    /// Run the full pipeline with the workflow span nested under `parent`
    ///
    /// With an empty context the workflow span starts a new trace; a context
    /// carrying an active span makes this run a child of it.
    pub async fn run_in_context(
        &self,
        request: TransactionRequest,
        parent: &Context,
    ) -> crate::Result<WorkflowOutcome> {
        request.validate()?;
        let started = Instant::now();

        info!(
            transaction_id = %request.transaction_id,
            customer_id = %request.customer_id,
            amount = request.amount,
            currency = %request.currency,
            "starting fraud detection workflow"
        );

        let span = self.telemetry.create_workflow_span_with_parent(
            WORKFLOW_SPAN_NAME,
            parent,
            vec![
                KeyValue::new(conv::TRANSACTION_ID, request.transaction_id.clone()),
                KeyValue::new(conv::CUSTOMER_ID, request.customer_id.clone()),
                KeyValue::new(conv::TRANSACTION_AMOUNT, request.amount),
                KeyValue::new(conv::TRANSACTION_CURRENCY, request.currency.clone()),
            ],
        );
        let trace_id = span.trace_id();

        match self.run_stages(&request, &span).await {
            Ok((customer, risk, alert)) => {
                span.set_success();
                span.finish();

                let outcome = WorkflowOutcome {
                    request,
                    customer,
                    risk,
                    alert,
                    processing_time: started.elapsed(),
                    trace_id,
                };
                info!(
                    transaction_id = %outcome.request.transaction_id,
                    risk_score = outcome.risk.score,
                    recommendation = %outcome.risk.recommendation,
                    alert_created = outcome.alert.created,
                    elapsed_ms = outcome.processing_time.as_millis() as u64,
                    "fraud detection workflow finished"
                );
                Ok(outcome)
            }
            Err(error) => {
                span.record_error(&error);
                span.finish();
                Err(error)
            }
        }
    }

    async fn run_stages(
        &self,
        request: &TransactionRequest,
        workflow_span: &WorkflowSpan,
    ) -> crate::Result<(CustomerAnalysis, RiskAssessment, AlertDecision)> {
        let cx = workflow_span.context();
        let customer = self.run_customer_data_stage(request, &cx).await?;
        let risk = self.run_risk_analysis_stage(request, &customer, &cx).await?;
        let alert = self.run_fraud_alert_stage(request, &risk, &cx).await?;
        Ok((customer, risk, alert))
    }

    async fn run_customer_data_stage(
        &self,
        request: &TransactionRequest,
        parent: &Context,
    ) -> crate::Result<CustomerAnalysis> {
        let stage = WorkflowStage::CustomerData;
        debug!(agent = self.customer_data.name(), stage = stage.as_str(), "running stage");

        let span = self.telemetry.create_agent_span(
            self.customer_data.name(),
            stage.operation(),
            parent,
            vec![
                KeyValue::new(conv::TRANSACTION_ID, request.transaction_id.clone()),
                KeyValue::new(conv::CUSTOMER_ID, request.customer_id.clone()),
            ],
        )?;
        let cx = span.context();

        self.telemetry.send_business_event(
            &cx,
            conv::EVENT_CUSTOMER_DATA_STARTED,
            vec![
                KeyValue::new("transaction_id", request.transaction_id.clone()),
                KeyValue::new("customer_id", request.customer_id.clone()),
            ],
        );

        let prompt = format!(
            "Analyze customer {} and their transactions comprehensively for fraud \
             detection purposes. Transaction ID: {}",
            request.customer_id, request.transaction_id
        );

        match self.customer_data.run(&prompt).await {
            Ok(reply) => {
                let elapsed = span.elapsed().as_secs_f64();
                span.set_attribute(conv::AI_PROCESSING_TIME, elapsed);

                self.telemetry
                    .record_transaction_processed(stage.as_str(), &request.transaction_id);
                self.telemetry.send_business_event(
                    &cx,
                    conv::EVENT_CUSTOMER_DATA_COMPLETED,
                    vec![
                        KeyValue::new("transaction_id", request.transaction_id.clone()),
                        KeyValue::new("customer_id", request.customer_id.clone()),
                        KeyValue::new("processing_time", elapsed),
                    ],
                );

                span.set_success();
                span.finish();
                Ok(CustomerAnalysis {
                    transaction_id: request.transaction_id.clone(),
                    customer_id: request.customer_id.clone(),
                    analysis: reply.text,
                })
            }
            Err(error) => {
                span.record_error(&error);
                span.finish();
                Err(error)
            }
        }
    }

    async fn run_risk_analysis_stage(
        &self,
        request: &TransactionRequest,
        customer: &CustomerAnalysis,
        parent: &Context,
    ) -> crate::Result<RiskAssessment> {
        let stage = WorkflowStage::RiskAnalysis;
        debug!(agent = self.risk_analyser.name(), stage = stage.as_str(), "running stage");

        let span = self.telemetry.create_agent_span(
            self.risk_analyser.name(),
            stage.operation(),
            parent,
            vec![
                KeyValue::new(conv::TRANSACTION_ID, request.transaction_id.clone()),
                KeyValue::new(conv::CUSTOMER_ID, request.customer_id.clone()),
            ],
        )?;
        let cx = span.context();

        self.telemetry.send_business_event(
            &cx,
            conv::EVENT_RISK_ANALYSIS_STARTED,
            vec![
                KeyValue::new("transaction_id", request.transaction_id.clone()),
                KeyValue::new("customer_id", request.customer_id.clone()),
            ],
        );

        let prompt = format!(
            "Based on this customer data analysis, perform a comprehensive risk \
             assessment:\n\n{}\n\nTransaction ID: {}\nCustomer ID: {}\n\n\
             Provide a complete risk assessment with score (0-100), level \
             (LOW/MEDIUM/HIGH), and recommendation (ALLOW/INVESTIGATE/BLOCK).",
            customer.analysis, request.transaction_id, request.customer_id
        );

        match self.risk_analyser.run(&prompt).await {
            Ok(reply) => {
                let elapsed = span.elapsed().as_secs_f64();
                span.set_attribute(conv::AI_PROCESSING_TIME, elapsed);

                let score = scoring::parse_risk_score(&reply.text);
                let level = RiskLevel::from_score(score);
                let recommendation = Recommendation::for_level(level);
                let confidence = scoring::model_confidence(score);

                span.set_attributes(vec![
                    KeyValue::new(conv::RISK_SCORE, i64::from(score)),
                    KeyValue::new(conv::RISK_LEVEL, level.as_str()),
                    KeyValue::new(conv::RISK_RECOMMENDATION, recommendation.as_str()),
                ]);

                self.telemetry
                    .record_risk_score(score, &request.transaction_id, recommendation);
                self.telemetry.record_model_prediction(
                    &cx,
                    &request.transaction_id,
                    scoring::MODEL_VERSION,
                    confidence,
                    level,
                    vec![scoring::TOP_FEATURE.to_string()],
                );

                // Anything short of ALLOW interrupts the customer's payment.
                if recommendation != Recommendation::Allow {
                    let declined = recommendation == Recommendation::Block;
                    let friction_type = if declined {
                        FrictionType::TransactionBlocked
                    } else {
                        FrictionType::StepUpAuth
                    };
                    self.telemetry.record_customer_friction(
                        &cx,
                        &request.customer_id,
                        &request.transaction_id,
                        friction_type,
                        declined,
                    );
                }

                self.telemetry.send_business_event(
                    &cx,
                    conv::EVENT_RISK_ANALYSIS_COMPLETED,
                    vec![
                        KeyValue::new("transaction_id", request.transaction_id.clone()),
                        KeyValue::new("risk_score", i64::from(score)),
                        KeyValue::new("risk_level", level.as_str()),
                        KeyValue::new("recommendation", recommendation.as_str()),
                    ],
                );

                span.set_success();
                span.finish();
                Ok(RiskAssessment {
                    transaction_id: request.transaction_id.clone(),
                    customer_id: request.customer_id.clone(),
                    analysis: reply.text,
                    score,
                    level,
                    recommendation,
                    model_confidence: confidence,
                })
            }
            Err(error) => {
                span.record_error(&error);
                span.finish();
                Err(error)
            }
        }
    }

    async fn run_fraud_alert_stage(
        &self,
        request: &TransactionRequest,
        risk: &RiskAssessment,
        parent: &Context,
    ) -> crate::Result<AlertDecision> {
        let stage = WorkflowStage::FraudAlert;
        debug!(agent = self.fraud_alert.name(), stage = stage.as_str(), "running stage");

        let severity = AlertSeverity::from_score(risk.score);
        let span = self.telemetry.create_agent_span(
            self.fraud_alert.name(),
            stage.operation(),
            parent,
            vec![KeyValue::new(
                conv::TRANSACTION_ID,
                request.transaction_id.clone(),
            )],
        )?;
        let cx = span.context();

        self.telemetry.send_business_event(
            &cx,
            conv::EVENT_FRAUD_ALERT_STARTED,
            vec![
                KeyValue::new("transaction_id", request.transaction_id.clone()),
                KeyValue::new("risk_score", i64::from(risk.score)),
                KeyValue::new("risk_level", risk.level.as_str()),
            ],
        );

        let prompt = format!(
            "Based on this risk analysis, determine if a fraud alert should be \
             created:\n\nRisk Analysis:\n{}\n\nTransaction ID: {}\nCustomer ID: {}\n\
             Risk Score: {}/100\nRisk Level: {}\nRecommendation: {}\nSeverity: {}\n\n\
             If risk score >= 40, create a fraud alert. Otherwise explain why no \
             alert is needed.",
            risk.analysis,
            request.transaction_id,
            request.customer_id,
            risk.score,
            risk.level,
            risk.recommendation,
            severity,
        );

        match self.fraud_alert.run(&prompt).await {
            Ok(reply) => {
                let elapsed = span.elapsed().as_secs_f64();
                span.set_attribute(conv::AI_PROCESSING_TIME, elapsed);

                let alert_created =
                    reply.text.to_lowercase().contains("alert created") || risk.score >= 40;

                let mut alert_id = None;
                let mut sar_id = None;
                if alert_created {
                    let id = format!("ALERT-{}", request.transaction_id);
                    self.telemetry.record_fraud_alert_created(
                        &id,
                        severity,
                        risk.recommendation,
                        &request.transaction_id,
                    );

                    if risk.recommendation == Recommendation::Block && request.amount > 0.0 {
                        self.telemetry.record_fraud_prevented(
                            &cx,
                            &request.transaction_id,
                            request.amount,
                            &request.currency,
                            "general_fraud",
                            risk.score,
                        );
                    }

                    let threshold_exceeded = request.amount >= SAR_AMOUNT_THRESHOLD;
                    if severity.requires_sar() || threshold_exceeded {
                        let filed = new_sar_id();
                        let deadline = sar_filing_deadline();
                        self.telemetry.record_sar_filed(
                            &cx,
                            &request.transaction_id,
                            &filed,
                            &deadline,
                            threshold_exceeded,
                            &request.customer_id,
                        );
                        sar_id = Some(filed);
                    }

                    alert_id = Some(id);
                }

                let severity_label = if alert_created {
                    severity.as_str()
                } else {
                    "NONE"
                };
                span.set_attributes(vec![
                    KeyValue::new(conv::ALERT_CREATED, alert_created),
                    KeyValue::new(conv::ALERT_SEVERITY, severity_label),
                ]);

                self.telemetry.send_business_event(
                    &cx,
                    conv::EVENT_FRAUD_ALERT_COMPLETED,
                    vec![
                        KeyValue::new("transaction_id", request.transaction_id.clone()),
                        KeyValue::new("alert_created", alert_created),
                        KeyValue::new("severity", severity_label),
                    ],
                );

                span.set_success();
                span.finish();
                Ok(AlertDecision {
                    transaction_id: request.transaction_id.clone(),
                    response: reply.text,
                    created: alert_created,
                    alert_id,
                    severity: alert_created.then_some(severity),
                    sar_id,
                })
            }
            Err(error) => {
                span.record_error(&error);
                span.finish();
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for FraudDetectionWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FraudDetectionWorkflow")
            .field("customer_data", &self.customer_data.name())
            .field("risk_analyser", &self.risk_analyser.name())
            .field("fraud_alert", &self.fraud_alert.name())
            .finish_non_exhaustive()
    }
}

/// `SAR-<year>-<8 hex chars>`, matching the compliance team's register format
fn new_sar_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("SAR-{}-{}", Utc::now().format("%Y"), suffix)
}

fn sar_filing_deadline() -> String {
    (Utc::now() + chrono::Duration::days(SAR_FILING_WINDOW_DAYS))
        .format("%Y-%m-%d")
        .to_string()
}
