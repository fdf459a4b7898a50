//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub transactions_submitted: IntCounter,
    pub transactions_confirmed: IntCounter,
    pub transactions_failed: IntCounterVec,
    pub rent_queries: IntCounter,
    pub derivation_attempts: IntCounter,
    pub token_account_refreshes: IntCounter,
    pub refreshes_coalesced: IntCounter,

    // Histograms
    pub confirmation_latency: Histogram,
    pub bootstrap_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transactions_submitted = IntCounter::with_opts(Opts::new(
            "transactions_submitted_total",
            "Transactions handed to the ledger",
        ))?;

        let transactions_confirmed = IntCounter::with_opts(Opts::new(
            "transactions_confirmed_total",
            "Transactions that reached the requested commitment",
        ))?;

        let transactions_failed = IntCounterVec::new(
            Opts::new(
                "transactions_failed_total",
                "Failed submissions by error category",
            ),
            &["category"],
        )?;

        let rent_queries = IntCounter::with_opts(Opts::new(
            "rent_queries_total",
            "Rent-exemption minimum lookups",
        ))?;

        let derivation_attempts = IntCounter::with_opts(Opts::new(
            "derivation_attempts_total",
            "Hash evaluations spent on program address derivation",
        ))?;

        let token_account_refreshes = IntCounter::with_opts(Opts::new(
            "token_account_refreshes_total",
            "Token-account snapshots fetched",
        ))?;

        let refreshes_coalesced = IntCounter::with_opts(Opts::new(
            "token_account_refreshes_coalesced_total",
            "Refresh requests folded into an in-flight refresh",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from send to requested commitment",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0]),
        )?;

        let bootstrap_latency = Histogram::with_opts(
            HistogramOpts::new("bootstrap_latency_seconds", "End-to-end pool bootstrap time")
                .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(transactions_submitted.clone()))?;
        registry.register(Box::new(transactions_confirmed.clone()))?;
        registry.register(Box::new(transactions_failed.clone()))?;
        registry.register(Box::new(rent_queries.clone()))?;
        registry.register(Box::new(derivation_attempts.clone()))?;
        registry.register(Box::new(token_account_refreshes.clone()))?;
        registry.register(Box::new(refreshes_coalesced.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(bootstrap_latency.clone()))?;

        Ok(Self {
            registry,
            transactions_submitted,
            transactions_confirmed,
            transactions_failed,
            rent_queries,
            derivation_attempts,
            token_account_refreshes,
            refreshes_coalesced,
            confirmation_latency,
            bootstrap_latency,
        })
    }

    pub fn record_failure(&self, category: &str) {
        self.transactions_failed.with_label_values(&[category]).inc();
    }

    /// Render the registry in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
