//! Batch execution over the seeded transaction set.
//!
//! Every transaction runs under its own fresh trace, fully closed before the
//! next begins. The batch itself gets one wrapping span that carries the
//! `batch.started`/`batch.completed` events and the aggregate counts, and it
//! isolates per-transaction failures: an errored transaction is tallied and
//! the batch moves on.

use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tracing::{info, warn};

use super::FraudDetectionWorkflow;
use crate::error::FraudWatchError;
use crate::telemetry::semantic_conventions as conv;
use crate::types::{RiskLevel, TransactionRequest, WorkflowOutcome};

/// Span name wrapping one batch run
pub const BATCH_SPAN_NAME: &str = "fraud_detection_batch";

/// What to run and how fast to feed it
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub transactions: Vec<TransactionRequest>,
    /// Pause between consecutive transactions
    pub delay_between: Duration,
    /// Jitter the pause to 50%-150% of `delay_between`
    pub randomize_delay: bool,
    /// Shuffle the transaction order before running
    pub shuffle: bool,
}

impl BatchOptions {
    /// First five seeded transactions at a leisurely pace
    pub fn quick_demo() -> Self {
        Self {
            transactions: seed_requests().into_iter().take(5).collect(),
            delay_between: Duration::from_secs(1),
            randomize_delay: true,
            shuffle: false,
        }
    }

    /// Twenty shuffled transactions with short pauses
    pub fn stress_test() -> Self {
        Self {
            transactions: requests_cycling(20),
            delay_between: Duration::from_millis(500),
            randomize_delay: true,
            shuffle: true,
        }
    }

    /// Fifty shuffled transactions, paced like a slow business day
    pub fn business_day() -> Self {
        Self {
            transactions: requests_cycling(50),
            delay_between: Duration::from_secs(2),
            randomize_delay: true,
            shuffle: true,
        }
    }
}

/// The seeded demo transactions, matching the customer directory
pub fn seed_requests() -> Vec<TransactionRequest> {
    vec![
        TransactionRequest::new("TX1001", "CUST1001", 5200.0, "USD"),
        TransactionRequest::new("TX1002", "CUST1002", 15000.0, "USD"),
        TransactionRequest::new("TX1003", "CUST1003", 300.0, "CNY"),
        TransactionRequest::new("TX1004", "CUST1004", 9900.0, "AED"),
        TransactionRequest::new("TX1005", "CUST1005", 200.0, "EUR"),
        TransactionRequest::new("TX1006", "CUST1006", 70.0, "GBP"),
        TransactionRequest::new("TX1007", "CUST1007", 1800.0, "USD"),
        TransactionRequest::new("TX1008", "CUST1008", 450.0, "USD"),
        TransactionRequest::new("TX1009", "CUST1009", 90.0, "ILS"),
        TransactionRequest::new("TX1010", "CUST1010", 600.0, "USD"),
        TransactionRequest::new("TX1011", "CUST1011", 220000.0, "KRW"),
        TransactionRequest::new("TX1012", "CUST1012", 1100.0, "USD"),
        TransactionRequest::new("TX1013", "CUST1013", 60.0, "EUR"),
        TransactionRequest::new("TX1014", "CUST1014", 25.0, "USD"),
        TransactionRequest::new("TX2001", "CUST1005", 9999.0, "EUR"),
        TransactionRequest::new("TX2002", "CUST1005", 9998.0, "EUR"),
        TransactionRequest::new("TX2003", "CUST1005", 9997.0, "EUR"),
    ]
}

/// `count` requests cycling through the seed set
///
/// Repeat passes get a `-<cycle>` suffix on the transaction id so every
/// request in a large batch stays distinct.
pub fn requests_cycling(count: usize) -> Vec<TransactionRequest> {
    let seed = seed_requests();
    (0..count)
        .map(|index| {
            let mut request = seed[index % seed.len()].clone();
            let cycle = index / seed.len();
            if cycle > 0 {
                request.transaction_id = format!("{}-{}", request.transaction_id, cycle);
            }
            request
        })
        .collect()
}

/// How one transaction in a batch ended up
#[derive(Debug)]
pub enum TransactionOutcome {
    Completed(WorkflowOutcome),
    Errored {
        transaction_id: String,
        error: FraudWatchError,
    },
}

/// Tallies for a finished batch
#[derive(Debug)]
pub struct BatchSummary {
    /// Transactions attempted, errored ones included
    pub processed: usize,
    pub alerted: usize,
    pub blocked: usize,
    /// Transactions that failed; always a subset of `processed`
    pub errored: usize,
    pub total_amount_blocked: f64,
    pub outcomes: Vec<TransactionOutcome>,
    pub elapsed: Duration,
    pub trace_id: Option<String>,
}

impl BatchSummary {
    /// Completed transactions whose risk stage classified at `level`
    pub fn completed_at_level(&self, level: RiskLevel) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| {
                matches!(outcome, TransactionOutcome::Completed(done) if done.risk.level == level)
            })
            .count()
    }

    /// Mean workflow duration across the completed transactions
    pub fn average_processing_time(&self) -> Option<Duration> {
        let durations: Vec<Duration> = self
            .outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                TransactionOutcome::Completed(done) => Some(done.processing_time),
                TransactionOutcome::Errored { .. } => None,
            })
            .collect();
        if durations.is_empty() {
            return None;
        }
        Some(durations.iter().sum::<Duration>() / durations.len() as u32)
    }
}

/// Runs batches of transactions through a workflow
#[derive(Debug, Clone)]
pub struct BatchRunner {
    workflow: FraudDetectionWorkflow,
}

impl BatchRunner {
    pub fn new(workflow: FraudDetectionWorkflow) -> Self {
        Self { workflow }
    }

    /// Run every transaction in `options`, continuing past failures
    pub async fn run(&self, options: BatchOptions) -> crate::Result<BatchSummary> {
        let BatchOptions {
            mut transactions,
            delay_between,
            randomize_delay,
            shuffle,
        } = options;
        if transactions.is_empty() {
            return Err(FraudWatchError::invalid_input(
                "batch contains no transactions",
            ));
        }
        if shuffle {
            fastrand::shuffle(&mut transactions);
        }

        let batch_size = transactions.len();
        let started = Instant::now();
        let telemetry = self.workflow.telemetry();

        info!(batch_size, "starting fraud detection batch");

        let span = telemetry.create_workflow_span(
            BATCH_SPAN_NAME,
            vec![KeyValue::new(conv::BATCH_SIZE, batch_size as i64)],
        );
        let trace_id = span.trace_id();
        let batch_cx = span.context();

        telemetry.send_business_event(
            &batch_cx,
            conv::EVENT_BATCH_STARTED,
            vec![KeyValue::new("batch_size", batch_size as i64)],
        );

        let mut processed = 0usize;
        let mut alerted = 0usize;
        let mut blocked = 0usize;
        let mut errored = 0usize;
        let mut total_amount_blocked = 0.0f64;
        let mut outcomes = Vec::with_capacity(batch_size);

        for (index, request) in transactions.into_iter().enumerate() {
            let transaction_id = request.transaction_id.clone();
            // Each transaction gets a fresh trace, closed before the next starts.
            processed += 1;
            match self.workflow.run(request).await {
                Ok(outcome) => {
                    if outcome.alert.created {
                        alerted += 1;
                    }
                    if outcome.blocked() {
                        blocked += 1;
                        total_amount_blocked += outcome.request.amount;
                    }
                    outcomes.push(TransactionOutcome::Completed(outcome));
                }
                Err(error) => {
                    errored += 1;
                    warn!(
                        transaction_id = %transaction_id,
                        error = %error,
                        "transaction failed; continuing batch"
                    );
                    outcomes.push(TransactionOutcome::Errored {
                        transaction_id,
                        error,
                    });
                }
            }

            if index + 1 < batch_size {
                tokio::time::sleep(next_delay(delay_between, randomize_delay)).await;
            }
        }

        span.set_attributes(vec![
            KeyValue::new(conv::BATCH_PROCESSED, processed as i64),
            KeyValue::new(conv::BATCH_ALERTED, alerted as i64),
            KeyValue::new(conv::BATCH_BLOCKED, blocked as i64),
            KeyValue::new(conv::BATCH_ERRORED, errored as i64),
        ]);
        let elapsed = started.elapsed();
        telemetry.send_business_event(
            &batch_cx,
            conv::EVENT_BATCH_COMPLETED,
            vec![
                KeyValue::new("batch_size", batch_size as i64),
                KeyValue::new("processed", processed as i64),
                KeyValue::new("alerted", alerted as i64),
                KeyValue::new("blocked", blocked as i64),
                KeyValue::new("errored", errored as i64),
                KeyValue::new("duration_seconds", elapsed.as_secs_f64()),
            ],
        );
        span.set_success();
        span.finish();
        telemetry.flush();

        info!(
            processed,
            alerted, blocked, errored, "fraud detection batch finished"
        );

        Ok(BatchSummary {
            processed,
            alerted,
            blocked,
            errored,
            total_amount_blocked,
            outcomes,
            elapsed,
            trace_id,
        })
    }
}

fn next_delay(base: Duration, randomize: bool) -> Duration {
    if randomize {
        base.mul_f64(0.5 + fastrand::f64())
    } else {
        base
    }
}
