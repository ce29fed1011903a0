//! Metrics and observability utilities
//!
//! Prometheus metric descriptions and recording helpers shared by the
//! gateway and the allocator.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Papertrail metrics
pub const METRICS_PREFIX: &str = "papertrail";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,
    0.005,
    0.010,
    0.025,
    0.050,
    0.100,
    0.250,
    0.500,
    1.000,
    2.500,
    5.000,
    10.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_submissions_total", METRICS_PREFIX),
        Unit::Count,
        "Papers submitted, by kind (new author or additional paper)"
    );

    describe_counter!(
        format!("{}_uploaded_bytes_total", METRICS_PREFIX),
        Unit::Bytes,
        "Manuscript bytes written to storage"
    );

    describe_counter!(
        format!("{}_allocations_total", METRICS_PREFIX),
        Unit::Count,
        "Reviewer allocation attempts, by outcome"
    );

    describe_histogram!(
        format!("{}_allocation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Time spent inside the allocation transaction"
    );

    describe_counter!(
        format!("{}_reviews_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Reviews recorded or replaced"
    );

    describe_counter!(
        format!("{}_status_changes_total", METRICS_PREFIX),
        Unit::Count,
        "Paper status transitions, by target status"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a paper submission and the size of its stored file
pub fn record_submission(kind: &str, bytes: usize) {
    counter!(
        format!("{}_submissions_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);

    counter!(format!("{}_uploaded_bytes_total", METRICS_PREFIX)).increment(bytes as u64);
}

/// Record one allocation attempt
pub fn record_allocation(duration_secs: f64, outcome: &str) {
    counter!(
        format!("{}_allocations_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_allocation_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

pub fn record_review() {
    counter!(format!("{}_reviews_submitted_total", METRICS_PREFIX)).increment(1);
}

pub fn record_status_change(status: &str) {
    counter!(
        format!("{}_status_changes_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

/// In-process counter totals for asserting on recorded metrics
#[cfg(test)]
pub(crate) mod testing {
    use metrics::{
        Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Totals = Arc<Mutex<HashMap<String, u64>>>;

    struct Tally {
        key: String,
        totals: Totals,
    }

    impl CounterFn for Tally {
        fn increment(&self, value: u64) {
            if let Ok(mut totals) = self.totals.lock() {
                *totals.entry(self.key.clone()).or_default() += value;
            }
        }

        fn absolute(&self, value: u64) {
            if let Ok(mut totals) = self.totals.lock() {
                totals.insert(self.key.clone(), value);
            }
        }
    }

    /// Counters keyed as `name{label=value,...}`; gauges and histograms are dropped
    #[derive(Clone, Default)]
    pub(crate) struct CountingRecorder {
        totals: Totals,
    }

    impl CountingRecorder {
        pub(crate) fn total(&self, key: &str) -> u64 {
            self.totals
                .lock()
                .map(|totals| totals.get(key).copied().unwrap_or(0))
                .unwrap_or(0)
        }
    }

    fn render(key: &Key) -> String {
        let labels: Vec<String> = key
            .labels()
            .map(|label| format!("{}={}", label.key(), label.value()))
            .collect();
        if labels.is_empty() {
            key.name().to_string()
        } else {
            format!("{}{{{}}}", key.name(), labels.join(","))
        }
    }

    impl Recorder for CountingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            Counter::from_arc(Arc::new(Tally {
                key: render(key),
                totals: self.totals.clone(),
            }))
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }
}
