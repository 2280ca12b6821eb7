//! Fraud detection agent workflow with end-to-end OpenTelemetry instrumentation.
//!
//! FraudWatch runs card transactions through a three-agent pipeline
//! (customer data retrieval, risk analysis, fraud alert decision) and
//! reports everything the fraud operations team needs to watch it live:
//! one trace per transaction with a span per agent, business events for
//! every stage transition, and counters and histograms for scores, alerts,
//! blocked amounts, customer friction, and SAR filings.
//!
//! Telemetry degrades gracefully: with no exporter configured the same
//! code paths run against a no-op pipeline, so the workflow never needs an
//! observability backend to function.
//!
//! # Quick Start
//!
//! ## Score One Transaction
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fraudwatch::telemetry::{TelemetryConfig, TelemetryManager};
//! use fraudwatch::workflow::FraudDetectionWorkflow;
//! use fraudwatch::TransactionRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let telemetry = Arc::new(TelemetryManager::initialize(TelemetryConfig::from_env())?);
//!     let workflow = FraudDetectionWorkflow::new(telemetry.clone());
//!
//!     let outcome = workflow
//!         .run(TransactionRequest::new("TX1005", "CUST1005", 200.0, "EUR"))
//!         .await?;
//!     println!(
//!         "risk {} -> {} (alert created: {})",
//!         outcome.risk.score, outcome.risk.recommendation, outcome.alert.created
//!     );
//!
//!     telemetry.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Run a Batch
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fraudwatch::telemetry::{TelemetryConfig, TelemetryManager};
//! use fraudwatch::workflow::{BatchOptions, BatchRunner, FraudDetectionWorkflow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let telemetry = Arc::new(TelemetryManager::initialize(
//!         TelemetryConfig::from_env().with_otlp_endpoint("http://localhost:4318"),
//!     )?);
//!     let runner = BatchRunner::new(FraudDetectionWorkflow::new(telemetry.clone()));
//!
//!     let summary = runner.run(BatchOptions::quick_demo()).await?;
//!     println!(
//!         "processed {} / alerted {} / blocked {} / errored {}",
//!         summary.processed, summary.alerted, summary.blocked, summary.errored
//!     );
//!
//!     telemetry.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Architecture Overview
//!
//! Three components cooperate on every transaction:
//!
//! - **[`workflow::FraudDetectionWorkflow`]** - Orchestrates the agent stages and
//!   owns the span/event/metric choreography
//! - **[`agents`]** - The scripted stage agents behind the [`agents::AgentClient`]
//!   seam, backed by a seeded customer directory
//! - **[`telemetry::TelemetryManager`]** - Traces, business events, and the fixed
//!   set of fraud metrics, exported over OTLP or kept in-process for tests
//!
//! The manager is passed by reference everywhere, and span contexts travel
//! explicitly from the workflow span down to each stage, so tests can swap in
//! an in-memory exporter and assert on the exact spans production would emit.
//!
//! # Module Organization
//!
//! - [`workflow`] - Sequential pipeline, batch runner, and risk score parsing
//! - [`agents`] - Stage agents, the `AgentClient` trait, and the customer directory
//! - [`telemetry`] - Telemetry manager, metrics collector, and logging setup
//! - [`types`] - Transactions, risk levels, recommendations, and outcomes
//! - [`error`] - Crate-wide error type with stable categories

pub mod agents;
pub mod error;
pub mod telemetry;
pub mod types;
pub mod workflow;

pub use error::FraudWatchError;
pub use types::*;

pub type Result<T> = std::result::Result<T, FraudWatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_reexports() {
        let request = TransactionRequest::new("TX1", "CUST1", 10.0, "USD");
        assert!(request.validate().is_ok());
        assert_eq!(RiskLevel::from_score(80), RiskLevel::High);
    }
}
