//! Business metrics collection for the fraud detection pipeline.
//!
//! The eight fraud-detection metrics are pre-registered on construction so
//! every recording hits a cached instrument. Recording goes through the
//! [`MetricsCollector`] trait, which lets the workflow run against the OTLP
//! pipeline in production and a no-op (or recording fake) in tests.

use std::sync::Arc;

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

use super::semantic_conventions as conv;

/// Recording interface for fraud detection business metrics
///
/// Metric names are the fixed dotted names from
/// [`semantic_conventions`](super::semantic_conventions); unknown names are
/// still recorded through ad hoc instruments so a renamed dashboard query
/// never silently loses data.
pub trait MetricsCollector: Send + Sync + std::fmt::Debug {
    /// Record a count of occurrences
    fn record_counter(&self, name: &str, value: u64, labels: &[KeyValue]);

    /// Record a monetary amount; kept separate from counts so currency
    /// values never get truncated to integers
    fn record_amount(&self, name: &str, value: f64, labels: &[KeyValue]);

    /// Record a value into a distribution
    fn record_histogram(&self, name: &str, value: f64, labels: &[KeyValue]);

    /// Increment a counter by one
    fn increment(&self, name: &str, labels: &[KeyValue]) {
        self.record_counter(name, 1, labels);
    }
}

/// Shared reference to a metrics collector
pub type SharedMetricsCollector = Arc<dyn MetricsCollector>;

/// OpenTelemetry-backed metrics collector
///
/// Holds the eight business instruments created from the meter at
/// construction time. Dispatch is by metric name so callers only ever deal
/// in the shared constants.
#[derive(Clone, Debug)]
pub struct OtelMetricsCollector {
    meter: Meter,
    transactions_processed: Counter<u64>,
    risk_score_distribution: Histogram<f64>,
    alerts_created: Counter<u64>,
    amount_blocked: Counter<f64>,
    false_positives: Counter<u64>,
    customer_friction: Counter<u64>,
    model_confidence: Histogram<f64>,
    sar_filed: Counter<u64>,
}

impl OtelMetricsCollector {
    /// Create a collector with all business instruments registered
    pub fn new(meter: Meter) -> crate::Result<Self> {
        let transactions_processed = meter
            .u64_counter(conv::METRIC_TRANSACTIONS_PROCESSED)
            .with_description("Number of transactions processed")
            .with_unit("1")
            .init();

        let risk_score_distribution = meter
            .f64_histogram(conv::METRIC_RISK_SCORE_DISTRIBUTION)
            .with_description("Distribution of risk scores")
            .with_unit("1")
            .init();

        let alerts_created = meter
            .u64_counter(conv::METRIC_ALERTS_CREATED)
            .with_description("Number of fraud alerts created by severity")
            .with_unit("1")
            .init();

        let amount_blocked = meter
            .f64_counter(conv::METRIC_AMOUNT_BLOCKED)
            .with_description("Total monetary amount blocked due to fraud prevention")
            .with_unit("USD")
            .init();

        let false_positives = meter
            .u64_counter(conv::METRIC_FALSE_POSITIVES)
            .with_description("Number of false positive fraud detections")
            .with_unit("1")
            .init();

        let customer_friction = meter
            .u64_counter(conv::METRIC_CUSTOMER_FRICTION)
            .with_description("Number of customer friction events triggered")
            .with_unit("1")
            .init();

        let model_confidence = meter
            .f64_histogram(conv::METRIC_MODEL_CONFIDENCE)
            .with_description("Distribution of model confidence scores")
            .with_unit("1")
            .init();

        let sar_filed = meter
            .u64_counter(conv::METRIC_SAR_FILED)
            .with_description("Number of Suspicious Activity Reports filed")
            .with_unit("1")
            .init();

        Ok(Self {
            meter,
            transactions_processed,
            risk_score_distribution,
            alerts_created,
            amount_blocked,
            false_positives,
            customer_friction,
            model_confidence,
            sar_filed,
        })
    }
}

impl MetricsCollector for OtelMetricsCollector {
    fn record_counter(&self, name: &str, value: u64, labels: &[KeyValue]) {
        match name {
            conv::METRIC_TRANSACTIONS_PROCESSED => self.transactions_processed.add(value, labels),
            conv::METRIC_ALERTS_CREATED => self.alerts_created.add(value, labels),
            conv::METRIC_FALSE_POSITIVES => self.false_positives.add(value, labels),
            conv::METRIC_CUSTOMER_FRICTION => self.customer_friction.add(value, labels),
            conv::METRIC_SAR_FILED => self.sar_filed.add(value, labels),
            _ => {
                let counter = self.meter.u64_counter(name.to_string()).init();
                counter.add(value, labels);
            }
        }
    }

    fn record_amount(&self, name: &str, value: f64, labels: &[KeyValue]) {
        match name {
            conv::METRIC_AMOUNT_BLOCKED => self.amount_blocked.add(value, labels),
            _ => {
                let counter = self.meter.f64_counter(name.to_string()).init();
                counter.add(value, labels);
            }
        }
    }

    fn record_histogram(&self, name: &str, value: f64, labels: &[KeyValue]) {
        match name {
            conv::METRIC_RISK_SCORE_DISTRIBUTION => self.risk_score_distribution.record(value, labels),
            conv::METRIC_MODEL_CONFIDENCE => self.model_confidence.record(value, labels),
            _ => {
                let histogram = self.meter.f64_histogram(name.to_string()).init();
                histogram.record(value, labels);
            }
        }
    }
}

/// No-op metrics collector for disabled telemetry
#[derive(Default, Clone, Debug)]
pub struct NoOpMetricsCollector;

impl MetricsCollector for NoOpMetricsCollector {
    fn record_counter(&self, _name: &str, _value: u64, _labels: &[KeyValue]) {}
    fn record_amount(&self, _name: &str, _value: f64, _labels: &[KeyValue]) {}
    fn record_histogram(&self, _name: &str, _value: f64, _labels: &[KeyValue]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_collector() -> OtelMetricsCollector {
        let meter = opentelemetry::global::meter("fraudwatch-test");
        OtelMetricsCollector::new(meter).unwrap()
    }

    #[test]
    fn test_known_metric_names_dispatch_without_panic() {
        let collector = test_collector();
        let labels = [KeyValue::new("transaction_id", "TX1001")];

        collector.record_counter(conv::METRIC_TRANSACTIONS_PROCESSED, 1, &labels);
        collector.record_counter(conv::METRIC_ALERTS_CREATED, 1, &labels);
        collector.record_counter(conv::METRIC_FALSE_POSITIVES, 1, &labels);
        collector.record_counter(conv::METRIC_CUSTOMER_FRICTION, 1, &labels);
        collector.record_counter(conv::METRIC_SAR_FILED, 1, &labels);
        collector.record_amount(conv::METRIC_AMOUNT_BLOCKED, 5200.0, &labels);
        collector.record_histogram(conv::METRIC_RISK_SCORE_DISTRIBUTION, 78.0, &labels);
        collector.record_histogram(conv::METRIC_MODEL_CONFIDENCE, 0.56, &labels);
    }

    #[test]
    fn test_unknown_metric_falls_back_to_ad_hoc_instrument() {
        let collector = test_collector();
        collector.record_counter("fraud_detection.experimental.count", 2, &[]);
        collector.record_amount("fraud_detection.experimental.amount", 1.5, &[]);
        collector.record_histogram("fraud_detection.experimental.latency", 0.25, &[]);
    }

    #[test]
    fn test_increment_defaults_to_one() {
        let collector = NoOpMetricsCollector;
        collector.increment(conv::METRIC_TRANSACTIONS_PROCESSED, &[]);
    }

    #[test]
    fn test_noop_collector_accepts_all_recordings() {
        let collector = NoOpMetricsCollector;
        collector.record_counter(conv::METRIC_SAR_FILED, 1, &[]);
        collector.record_amount(conv::METRIC_AMOUNT_BLOCKED, 100.0, &[]);
        collector.record_histogram(conv::METRIC_RISK_SCORE_DISTRIBUTION, 50.0, &[]);
    }
}
