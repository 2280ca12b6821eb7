//! Fraud detection agents.
//!
//! The pipeline talks to its three agents through [`AgentClient`], a narrow
//! prompt-in, text-out interface. The implementations here are scripted:
//! they answer deterministically from [`CustomerDirectory`] reference data,
//! which keeps workflow runs reproducible and lets tests assert on exact
//! scores and alert decisions. A hosted model endpoint would slot in behind
//! the same trait.

pub mod customer_data;
pub mod directory;
pub mod fraud_alert;
pub mod risk_analyser;

pub use customer_data::CustomerDataAgent;
pub use directory::{CustomerDirectory, CustomerProfile, TransactionRecord};
pub use fraud_alert::FraudAlertAgent;
pub use risk_analyser::RiskAnalyserAgent;

use async_trait::async_trait;

/// Text reply from one agent call
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    /// The agent's full analysis text
    pub text: String,
}

impl AgentReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A fraud detection agent the workflow can call
///
/// Agents receive a prompt assembled by the workflow and return free-form
/// analysis text. Failures surface as errors; an agent never fabricates a
/// reply for data it cannot find.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Stable agent name, used in span names and attributes
    fn name(&self) -> &str;

    /// Run one analysis for the given prompt
    async fn run(&self, prompt: &str) -> crate::Result<AgentReply>;
}
