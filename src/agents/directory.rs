//! Reference data the scripted agents answer from.
//!
//! A [`CustomerDirectory`] holds customer profiles and transaction records
//! keyed by their IDs. Agents locate the record a prompt refers to by
//! scanning the prompt text for a known transaction ID, so prompts stay
//! free-form. The seed data covers the interesting corners of the scoring
//! model: clean domestic payments, high-risk corridors, fresh accounts,
//! low-trust devices, and one customer structuring transfers just under the
//! reporting threshold.

use std::collections::BTreeMap;

/// Destination countries that add corridor risk to a transaction
pub const HIGH_RISK_DESTINATIONS: [&str; 4] = ["NG", "IR", "RU", "KP"];

/// A customer known to the bank
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerProfile {
    pub customer_id: String,
    pub account_age_days: u32,
    pub home_country: String,
}

/// One transaction with the features the risk model looks at
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub customer_id: String,
    /// Amount normalized to USD for threshold comparisons
    pub amount_usd: f64,
    pub destination_country: String,
    /// 0.0 (unknown device) to 1.0 (fully trusted)
    pub device_trust_score: f64,
}

/// Profiles and transactions the agents can look up
#[derive(Debug, Clone, Default)]
pub struct CustomerDirectory {
    profiles: BTreeMap<String, CustomerProfile>,
    transactions: BTreeMap<String, TransactionRecord>,
}

impl CustomerDirectory {
    /// Empty directory; useful for tests that insert their own records
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory pre-populated with the demo customer base
    pub fn with_seed_data() -> Self {
        let mut directory = Self::new();

        for (customer_id, account_age_days, home_country) in [
            ("CUST1001", 2190, "US"),
            ("CUST1002", 1460, "US"),
            ("CUST1003", 730, "CN"),
            ("CUST1004", 21, "AE"),
            ("CUST1005", 12, "PT"),
            ("CUST1006", 3650, "GB"),
            ("CUST1007", 365, "DE"),
            ("CUST1008", 540, "KE"),
            ("CUST1009", 1095, "IL"),
            ("CUST1010", 25, "TR"),
            ("CUST1011", 800, "KR"),
            ("CUST1012", 18, "JO"),
            ("CUST1013", 1900, "FR"),
            ("CUST1014", 200, "EG"),
        ] {
            directory.insert_profile(CustomerProfile {
                customer_id: customer_id.to_string(),
                account_age_days,
                home_country: home_country.to_string(),
            });
        }

        for (transaction_id, customer_id, amount_usd, destination_country, device_trust_score) in [
            ("TX1001", "CUST1001", 5200.0, "US", 0.92),
            ("TX1002", "CUST1002", 15000.0, "US", 0.88),
            ("TX1003", "CUST1003", 42.0, "CN", 0.81),
            ("TX1004", "CUST1004", 2695.0, "AE", 0.77),
            ("TX1005", "CUST1005", 216.0, "NG", 0.31),
            ("TX1006", "CUST1006", 89.0, "GB", 0.95),
            ("TX1007", "CUST1007", 1800.0, "RU", 0.83),
            ("TX1008", "CUST1008", 450.0, "SO", 0.45),
            ("TX1009", "CUST1009", 24.0, "IL", 0.90),
            ("TX1010", "CUST1010", 600.0, "IR", 0.74),
            ("TX1011", "CUST1011", 160.0, "KR", 0.86),
            ("TX1012", "CUST1012", 1100.0, "SY", 0.42),
            ("TX1013", "CUST1013", 65.0, "FR", 0.91),
            ("TX1014", "CUST1014", 25.0, "YE", 0.48),
            // CUST1005 keeps each transfer just under the 10,000 USD
            // reporting threshold.
            ("TX2001", "CUST1005", 9999.0, "NG", 0.31),
            ("TX2002", "CUST1005", 9998.0, "NG", 0.29),
            ("TX2003", "CUST1005", 9997.0, "NG", 0.33),
        ] {
            directory.insert_transaction(TransactionRecord {
                transaction_id: transaction_id.to_string(),
                customer_id: customer_id.to_string(),
                amount_usd,
                destination_country: destination_country.to_string(),
                device_trust_score,
            });
        }

        directory
    }

    pub fn insert_profile(&mut self, profile: CustomerProfile) {
        self.profiles.insert(profile.customer_id.clone(), profile);
    }

    pub fn insert_transaction(&mut self, transaction: TransactionRecord) {
        self.transactions
            .insert(transaction.transaction_id.clone(), transaction);
    }

    pub fn profile(&self, customer_id: &str) -> Option<&CustomerProfile> {
        self.profiles.get(customer_id)
    }

    pub fn transaction(&self, transaction_id: &str) -> Option<&TransactionRecord> {
        self.transactions.get(transaction_id)
    }

    /// All known transaction IDs, in sorted order
    pub fn transaction_ids(&self) -> impl Iterator<Item = &str> {
        self.transactions.keys().map(String::as_str)
    }

    /// Find the transaction a free-form prompt refers to
    ///
    /// Matches by substring so derived IDs like `TX1001-3` (batch replay
    /// suffixes) still resolve to their base record. The longest matching ID
    /// wins.
    pub fn find_transaction_in(&self, text: &str) -> Option<&TransactionRecord> {
        self.transactions
            .keys()
            .filter(|id| text.contains(id.as_str()))
            .max_by_key(|id| id.len())
            .and_then(|id| self.transactions.get(id))
    }

    /// Find the transaction a prompt refers to, together with its customer
    pub fn lookup(&self, text: &str) -> Option<(&TransactionRecord, &CustomerProfile)> {
        let transaction = self.find_transaction_in(text)?;
        let profile = self.profiles.get(&transaction.customer_id)?;
        Some((transaction, profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_data_is_consistent() {
        let directory = CustomerDirectory::with_seed_data();
        assert_eq!(directory.transaction_ids().count(), 17);

        // Every transaction's customer must exist.
        for id in directory.transaction_ids().collect::<Vec<_>>() {
            let transaction = directory.transaction(id).unwrap();
            assert!(
                directory.profile(&transaction.customer_id).is_some(),
                "transaction {} references unknown customer {}",
                id,
                transaction.customer_id
            );
        }
    }

    #[test]
    fn test_lookup_resolves_embedded_transaction_id() {
        let directory = CustomerDirectory::with_seed_data();
        let (transaction, profile) = directory
            .lookup("Analyze customer CUST1005 and transaction TX1005 for fraud.")
            .unwrap();
        assert_eq!(transaction.transaction_id, "TX1005");
        assert_eq!(profile.customer_id, "CUST1005");
    }

    #[test]
    fn test_lookup_resolves_suffixed_replay_id() {
        let directory = CustomerDirectory::with_seed_data();
        let transaction = directory
            .find_transaction_in("Transaction ID: TX1001-3")
            .unwrap();
        assert_eq!(transaction.transaction_id, "TX1001");
    }

    #[test]
    fn test_lookup_distinguishes_similar_ids() {
        let directory = CustomerDirectory::with_seed_data();
        let transaction = directory.find_transaction_in("details for TX2001 please").unwrap();
        assert_eq!(transaction.transaction_id, "TX2001");
    }

    #[test]
    fn test_lookup_misses_unknown_id() {
        let directory = CustomerDirectory::with_seed_data();
        assert!(directory.find_transaction_in("TX9999 is not seeded").is_none());
    }
}
