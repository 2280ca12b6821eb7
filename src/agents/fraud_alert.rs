//! Fraud alert decision agent.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{AgentClient, AgentReply};
use crate::error::FraudWatchError;

static RISK_SCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)risk\s*score[:\s]*(\d{1,3})").expect("valid regex"));
static TRANSACTION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)transaction\s*id[:\s]*([A-Za-z0-9-]+)").expect("valid regex"));
static SEVERITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)severity[:\s]*([A-Za-z]+)").expect("valid regex"));

/// Final stage of the pipeline: turns a risk assessment into an alert
/// decision
///
/// Stateless; everything it needs arrives in the prompt. An alert is
/// warranted at risk score 40 and above, matching the workflow's own
/// threshold.
#[derive(Debug, Clone, Default)]
pub struct FraudAlertAgent;

impl FraudAlertAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AgentClient for FraudAlertAgent {
    fn name(&self) -> &str {
        "FraudAlertAgent"
    }

    async fn run(&self, prompt: &str) -> crate::Result<AgentReply> {
        let score: u32 = RISK_SCORE_RE
            .captures(prompt)
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .filter(|score| *score <= 100)
            .ok_or_else(|| {
                FraudWatchError::agent_error(
                    "FraudAlertAgent could not find a risk score in the request",
                )
            })?;

        let transaction_id = TRANSACTION_ID_RE
            .captures(prompt)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string());

        let severity = SEVERITY_RE
            .captures(prompt)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| "LOW".to_string());

        let text = if score >= 40 {
            format!(
                "FRAUD ALERT CREATED\n\
                 Alert ID: ALERT-{tx}\n\
                 Severity: {severity}\n\
                 Risk score {score} meets the alerting threshold of 40. \
                 Escalating to the fraud operations queue for review.",
                tx = transaction_id,
                severity = severity,
                score = score,
            )
        } else {
            format!(
                "No fraud alert needed. Risk score {score} is below the alerting \
                 threshold of 40. Transaction {tx} proceeds under standard monitoring.",
                score = score,
                tx = transaction_id,
            )
        };

        Ok(AgentReply::new(text))
    }
}
