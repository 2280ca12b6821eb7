//! Customer data retrieval agent.

use std::sync::Arc;

use async_trait::async_trait;

use super::directory::{CustomerDirectory, HIGH_RISK_DESTINATIONS};
use super::{AgentClient, AgentReply};
use crate::error::FraudWatchError;

/// First stage of the pipeline: pulls the customer's profile and recent
/// activity and summarizes what the risk analyser should pay attention to
#[derive(Debug, Clone)]
pub struct CustomerDataAgent {
    directory: Arc<CustomerDirectory>,
}

impl CustomerDataAgent {
    pub fn new(directory: Arc<CustomerDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl AgentClient for CustomerDataAgent {
    fn name(&self) -> &str {
        "CustomerDataAgent"
    }

    async fn run(&self, prompt: &str) -> crate::Result<AgentReply> {
        let (transaction, profile) = self.directory.lookup(prompt).ok_or_else(|| {
            FraudWatchError::agent_error(
                "CustomerDataAgent found no customer records matching the request",
            )
        })?;

        let account_note = if profile.account_age_days <= 30 {
            "newly opened account"
        } else {
            "established account"
        };
        let device_note = if transaction.device_trust_score < 0.5 {
            "low-trust or unrecognized device"
        } else {
            "recognized device"
        };
        let destination_note = if HIGH_RISK_DESTINATIONS
            .contains(&transaction.destination_country.as_str())
        {
            format!(
                "Destination {} is on the elevated-risk country list.",
                transaction.destination_country
            )
        } else {
            format!(
                "Destination {} carries no elevated country risk.",
                transaction.destination_country
            )
        };

        let text = format!(
            "Customer data analysis for {customer}:\n\
             - Account age: {age} days ({account_note})\n\
             - Home country: {home}\n\
             - Transaction {tx}: {amount:.2} USD equivalent to {dest}\n\
             - Device trust score: {device:.2} ({device_note})\n\
             {destination_note}",
            customer = profile.customer_id,
            age = profile.account_age_days,
            account_note = account_note,
            home = profile.home_country,
            tx = transaction.transaction_id,
            amount = transaction.amount_usd,
            dest = transaction.destination_country,
            device = transaction.device_trust_score,
            device_note = device_note,
            destination_note = destination_note,
        );

        Ok(AgentReply::new(text))
    }
}
