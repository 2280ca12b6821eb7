//! Core type definitions for the FraudWatch workflow.
//!
//! This module contains the domain structures passed between the three agent
//! stages and the classification enums derived from the model's risk score.
//! Score thresholds live here so every stage classifies the same way.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FraudWatchError;

/// A transaction submitted to the fraud detection workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Unique transaction identifier, e.g. `TX1001`
    pub transaction_id: String,
    /// Customer that initiated the transaction
    pub customer_id: String,
    /// Transaction amount in the given currency
    pub amount: f64,
    /// ISO 4217 currency code
    pub currency: String,
}

impl TransactionRequest {
    /// Create a new transaction request
    pub fn new(
        transaction_id: impl Into<String>,
        customer_id: impl Into<String>,
        amount: f64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            customer_id: customer_id.into(),
            amount,
            currency: currency.into(),
        }
    }

    /// Validate the request before it enters the workflow
    pub fn validate(&self) -> Result<(), FraudWatchError> {
        if self.transaction_id.trim().is_empty() {
            return Err(FraudWatchError::invalid_input(
                "transaction_id cannot be empty",
            ));
        }
        if self.customer_id.trim().is_empty() {
            return Err(FraudWatchError::invalid_input("customer_id cannot be empty"));
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(FraudWatchError::invalid_input(format!(
                "amount must be a non-negative number, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Risk classification derived from the 0-100 risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Classify a risk score: >= 75 is HIGH, >= 40 is MEDIUM, below is LOW
    pub fn from_score(score: u8) -> Self {
        if score >= 75 {
            RiskLevel::High
        } else if score >= 40 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = FraudWatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            _ => Err(FraudWatchError::invalid_input(format!(
                "unknown risk level: {}",
                s
            ))),
        }
    }
}

/// Action recommended for a transaction after risk analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Allow,
    Investigate,
    Block,
}

impl Recommendation {
    /// Map a risk level to its recommendation: HIGH blocks, MEDIUM investigates
    pub fn for_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::High => Recommendation::Block,
            RiskLevel::Medium => Recommendation::Investigate,
            RiskLevel::Low => Recommendation::Allow,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Allow => "ALLOW",
            Recommendation::Investigate => "INVESTIGATE",
            Recommendation::Block => "BLOCK",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Recommendation {
    type Err = FraudWatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ALLOW" => Ok(Recommendation::Allow),
            "INVESTIGATE" => Ok(Recommendation::Investigate),
            "BLOCK" => Ok(Recommendation::Block),
            _ => Err(FraudWatchError::invalid_input(format!(
                "unknown recommendation: {}",
                s
            ))),
        }
    }
}

/// Severity assigned to a fraud alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    /// Classify a risk score: >= 90 CRITICAL, >= 75 HIGH, >= 50 MEDIUM, below LOW
    pub fn from_score(score: u8) -> Self {
        if score >= 90 {
            AlertSeverity::Critical
        } else if score >= 75 {
            AlertSeverity::High
        } else if score >= 50 {
            AlertSeverity::Medium
        } else {
            AlertSeverity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "LOW",
            AlertSeverity::Medium => "MEDIUM",
            AlertSeverity::High => "HIGH",
            AlertSeverity::Critical => "CRITICAL",
        }
    }

    /// Severities that mandate a suspicious activity report on their own
    pub fn requires_sar(&self) -> bool {
        matches!(self, AlertSeverity::High | AlertSeverity::Critical)
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = FraudWatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOW" => Ok(AlertSeverity::Low),
            "MEDIUM" => Ok(AlertSeverity::Medium),
            "HIGH" => Ok(AlertSeverity::High),
            "CRITICAL" => Ok(AlertSeverity::Critical),
            _ => Err(FraudWatchError::invalid_input(format!(
                "unknown alert severity: {}",
                s
            ))),
        }
    }
}

/// Kind of friction imposed on a customer by a risk decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrictionType {
    /// Additional authentication was demanded before the transaction proceeds
    StepUpAuth,
    /// The transaction was declined outright
    TransactionBlocked,
}

impl FrictionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrictionType::StepUpAuth => "step_up_auth",
            FrictionType::TransactionBlocked => "transaction_blocked",
        }
    }
}

impl fmt::Display for FrictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The three sequential stages of the fraud detection pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    CustomerData,
    RiskAnalysis,
    FraudAlert,
}

impl WorkflowStage {
    /// Stage label used in metric attributes and business event names
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::CustomerData => "customer_data",
            WorkflowStage::RiskAnalysis => "risk_analysis",
            WorkflowStage::FraudAlert => "fraud_alert",
        }
    }

    /// Agent identity recorded on the stage span
    pub fn agent_name(&self) -> &'static str {
        match self {
            WorkflowStage::CustomerData => "CustomerDataAgent",
            WorkflowStage::RiskAnalysis => "RiskAnalyserAgent",
            WorkflowStage::FraudAlert => "FraudAlertAgent",
        }
    }

    /// Operation recorded on the stage span
    pub fn operation(&self) -> &'static str {
        match self {
            WorkflowStage::CustomerData => "data_retrieval",
            WorkflowStage::RiskAnalysis => "risk_analysis",
            WorkflowStage::FraudAlert => "alert_creation",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output of the customer data stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerAnalysis {
    pub transaction_id: String,
    pub customer_id: String,
    /// Free-text analysis of the customer and their transaction history
    pub analysis: String,
}

/// Output of the risk analysis stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub transaction_id: String,
    pub customer_id: String,
    /// Free-text assessment the score was extracted from
    pub analysis: String,
    /// Risk score on a 0-100 scale
    pub score: u8,
    pub level: RiskLevel,
    pub recommendation: Recommendation,
    /// Model confidence derived from the score's distance from the midpoint
    pub model_confidence: f64,
}

/// Output of the fraud alert stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDecision {
    pub transaction_id: String,
    /// Free-text alert response from the agent
    pub response: String,
    /// Whether an alert was raised for this transaction
    pub created: bool,
    /// `ALERT-<transaction_id>` when an alert was raised
    #[serde(default)]
    pub alert_id: Option<String>,
    /// Severity of the raised alert, absent when no alert was created
    #[serde(default)]
    pub severity: Option<AlertSeverity>,
    /// Suspicious activity report identifier when one was filed
    #[serde(default)]
    pub sar_id: Option<String>,
}

/// Final result of one complete workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub request: TransactionRequest,
    pub customer: CustomerAnalysis,
    pub risk: RiskAssessment,
    pub alert: AlertDecision,
    /// Wall-clock duration of the full three-stage run
    pub processing_time: Duration,
    /// Trace identifier of the workflow span, absent under a no-op pipeline
    #[serde(default)]
    pub trace_id: Option<String>,
}

impl WorkflowOutcome {
    /// Whether the risk stage recommended blocking the transaction
    pub fn blocked(&self) -> bool {
        self.risk.recommendation == Recommendation::Block
    }
}
