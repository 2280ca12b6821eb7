//! Risk analysis agent.

use std::sync::Arc;

use async_trait::async_trait;

use super::directory::{CustomerDirectory, CustomerProfile, TransactionRecord, HIGH_RISK_DESTINATIONS};
use super::{AgentClient, AgentReply};
use crate::error::FraudWatchError;
use crate::types::{Recommendation, RiskLevel};

/// Second stage of the pipeline: scores the transaction against a small
/// additive risk model and writes the assessment the downstream parser
/// expects, with the score on a `Risk Score: N/100` line
#[derive(Debug, Clone)]
pub struct RiskAnalyserAgent {
    directory: Arc<CustomerDirectory>,
}

impl RiskAnalyserAgent {
    pub fn new(directory: Arc<CustomerDirectory>) -> Self {
        Self { directory }
    }
}

/// Additive risk model over the directory features
///
/// Base risk is 10; corridor, amount, account age, and device factors add on
/// top, capped at 100.
fn score_transaction(
    transaction: &TransactionRecord,
    profile: &CustomerProfile,
) -> (u8, Vec<String>) {
    let mut score: u32 = 10;
    let mut factors = Vec::new();

    if HIGH_RISK_DESTINATIONS.contains(&transaction.destination_country.as_str()) {
        score += 30;
        factors.push(format!(
            "destination {} is a high-risk corridor",
            transaction.destination_country
        ));
    }
    if transaction.amount_usd >= 10_000.0 {
        score += 25;
        factors.push(format!(
            "amount {:.2} USD exceeds the large-transfer threshold",
            transaction.amount_usd
        ));
    }
    if profile.account_age_days <= 30 {
        score += 20;
        factors.push(format!(
            "account is only {} days old",
            profile.account_age_days
        ));
    }
    if transaction.device_trust_score < 0.5 {
        score += 15;
        factors.push(format!(
            "device trust score {:.2} is below 0.5",
            transaction.device_trust_score
        ));
    }

    (score.min(100) as u8, factors)
}

#[async_trait]
impl AgentClient for RiskAnalyserAgent {
    fn name(&self) -> &str {
        "RiskAnalyserAgent"
    }

    async fn run(&self, prompt: &str) -> crate::Result<AgentReply> {
        let (transaction, profile) = self.directory.lookup(prompt).ok_or_else(|| {
            FraudWatchError::agent_error(
                "RiskAnalyserAgent found no transaction matching the request",
            )
        })?;

        let (score, factors) = score_transaction(transaction, profile);
        let level = RiskLevel::from_score(score);
        let recommendation = Recommendation::for_level(level);

        let factor_lines = if factors.is_empty() {
            "No elevated risk factors identified.".to_string()
        } else {
            factors
                .iter()
                .map(|factor| format!("- {}", factor))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let text = format!(
            "Risk assessment for transaction {tx}:\n\
             Risk Score: {score}/100\n\
             Risk Level: {level}\n\
             Recommendation: {recommendation}\n\
             Contributing factors:\n\
             {factor_lines}",
            tx = transaction.transaction_id,
            score = score,
            level = level,
            recommendation = recommendation,
            factor_lines = factor_lines,
        );

        Ok(AgentReply::new(text))
    }
}
