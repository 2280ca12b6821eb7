//! Batch runner entry point.
//!
//! Feeds the seeded demo transactions through the fraud detection workflow
//! and prints a per-transaction summary. Telemetry export targets come from
//! the environment (`OTEL_EXPORTER_OTLP_ENDPOINT`,
//! `APPLICATIONINSIGHTS_CONNECTION_STRING`); without one the run still works
//! against the no-op pipeline.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use fraudwatch::telemetry::{init_logging, LoggingConfig, TelemetryConfig, TelemetryManager};
use fraudwatch::workflow::{
    batch::requests_cycling, BatchOptions, BatchRunner, FraudDetectionWorkflow,
    TransactionOutcome,
};
use fraudwatch::RiskLevel;

#[derive(Parser)]
#[command(name = "batch_run")]
#[command(about = "Run a batch of transactions through the fraud detection workflow")]
#[command(version)]
struct Args {
    /// Batch shape to start from
    #[arg(short, long, value_enum, default_value_t = Preset::QuickDemo)]
    preset: Preset,

    /// Override the transaction count, cycling through the seeded set
    #[arg(short, long)]
    count: Option<usize>,

    /// Override the pause between transactions, in milliseconds
    #[arg(short, long)]
    delay_ms: Option<u64>,

    /// Shuffle the transaction order even if the preset does not
    #[arg(long)]
    shuffle: bool,

    /// Emit one JSON line per transaction instead of the table
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Preset {
    /// First five seeded transactions, one second apart
    QuickDemo,
    /// Twenty shuffled transactions with short pauses
    StressTest,
    /// Fifty shuffled transactions at business-day pace
    BusinessDay,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let telemetry = Arc::new(TelemetryManager::initialize(TelemetryConfig::from_env())?);
    let _logging_guard = init_logging(&LoggingConfig::from_env(), Some(telemetry.tracer()))?;

    let mut options = match args.preset {
        Preset::QuickDemo => BatchOptions::quick_demo(),
        Preset::StressTest => BatchOptions::stress_test(),
        Preset::BusinessDay => BatchOptions::business_day(),
    };
    if let Some(count) = args.count {
        options.transactions = requests_cycling(count);
    }
    if let Some(delay_ms) = args.delay_ms {
        options.delay_between = Duration::from_millis(delay_ms);
    }
    if args.shuffle {
        options.shuffle = true;
    }

    let runner = BatchRunner::new(FraudDetectionWorkflow::new(telemetry.clone()));
    let summary = runner.run(options).await?;

    println!();
    for outcome in &summary.outcomes {
        match outcome {
            TransactionOutcome::Completed(done) => {
                if args.json {
                    println!("{}", serde_json::to_string(done)?);
                } else {
                    println!(
                        "  {:<12} score {:>3}  {:<11} alert: {}",
                        done.request.transaction_id,
                        done.risk.score,
                        done.risk.recommendation.as_str(),
                        done.alert.alert_id.as_deref().unwrap_or("-"),
                    );
                }
            }
            TransactionOutcome::Errored {
                transaction_id,
                error,
            } => {
                if args.json {
                    println!(
                        "{}",
                        serde_json::json!({
                            "transaction_id": transaction_id,
                            "error": error.to_string(),
                            "category": error.category(),
                        })
                    );
                } else {
                    println!("  {:<12} FAILED: {}", transaction_id, error);
                }
            }
        }
    }

    println!();
    println!("Batch finished in {:.1}s", summary.elapsed.as_secs_f64());
    println!("  processed: {}", summary.processed);
    println!(
        "  risk mix:  {} low / {} medium / {} high",
        summary.completed_at_level(RiskLevel::Low),
        summary.completed_at_level(RiskLevel::Medium),
        summary.completed_at_level(RiskLevel::High),
    );
    println!("  alerted:   {}", summary.alerted);
    println!(
        "  blocked:   {} (${:.2} prevented)",
        summary.blocked, summary.total_amount_blocked
    );
    println!("  errored:   {}", summary.errored);
    if let Some(average) = summary.average_processing_time() {
        println!("  avg time:  {}ms per transaction", average.as_millis());
    }
    if let Some(trace_id) = &summary.trace_id {
        println!("  trace id:  {}", trace_id);
    }

    telemetry.shutdown();
    Ok(())
}
