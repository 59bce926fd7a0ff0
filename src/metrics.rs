//! Metrics collection and export module

use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Process-wide token creation metrics
pub struct Metrics {
    registry: Registry,

    // Counters
    pub token_creations_total: IntCounter,
    pub token_creations_success: IntCounter,
    pub token_creations_failed: IntCounter,
    pub submission_attempts_total: IntCounter,
    pub mint_collisions_total: IntCounter,
    pub stale_blockhash_retries_total: IntCounter,
    pub ambiguous_recoveries_total: IntCounter,
    pub airdrops_requested_total: IntCounter,

    // Histograms
    pub token_creation_latency: Histogram,
    pub signer_wait: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let token_creations_total = IntCounter::with_opts(Opts::new(
            "token_creations_total",
            "Total number of token creation requests",
        ))?;

        let token_creations_success = IntCounter::with_opts(Opts::new(
            "token_creations_success",
            "Number of tokens created successfully",
        ))?;

        let token_creations_failed = IntCounter::with_opts(Opts::new(
            "token_creations_failed",
            "Number of failed token creation requests",
        ))?;

        let submission_attempts_total = IntCounter::with_opts(Opts::new(
            "submission_attempts_total",
            "Signed envelopes handed to the ledger",
        ))?;

        let mint_collisions_total = IntCounter::with_opts(Opts::new(
            "mint_collisions_total",
            "Mint addresses found occupied, before or during submission",
        ))?;

        let stale_blockhash_retries_total = IntCounter::with_opts(Opts::new(
            "stale_blockhash_retries_total",
            "Retries caused by expired or unknown block references",
        ))?;

        let ambiguous_recoveries_total = IntCounter::with_opts(Opts::new(
            "ambiguous_recoveries_total",
            "Failed submissions later found finalized on the ledger",
        ))?;

        let airdrops_requested_total = IntCounter::with_opts(Opts::new(
            "airdrops_requested_total",
            "Faucet credits requested on test networks",
        ))?;

        let token_creation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "token_creation_latency_seconds",
                "End-to-end token creation latency",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;

        let signer_wait = Histogram::with_opts(
            HistogramOpts::new("signer_wait_seconds", "Time spent waiting on the external signer")
                .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(token_creations_total.clone()))?;
        registry.register(Box::new(token_creations_success.clone()))?;
        registry.register(Box::new(token_creations_failed.clone()))?;
        registry.register(Box::new(submission_attempts_total.clone()))?;
        registry.register(Box::new(mint_collisions_total.clone()))?;
        registry.register(Box::new(stale_blockhash_retries_total.clone()))?;
        registry.register(Box::new(ambiguous_recoveries_total.clone()))?;
        registry.register(Box::new(airdrops_requested_total.clone()))?;
        registry.register(Box::new(token_creation_latency.clone()))?;
        registry.register(Box::new(signer_wait.clone()))?;

        Ok(Self {
            registry,
            token_creations_total,
            token_creations_success,
            token_creations_failed,
            submission_attempts_total,
            mint_collisions_total,
            stale_blockhash_retries_total,
            ambiguous_recoveries_total,
            airdrops_requested_total,
            token_creation_latency,
            signer_wait,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn export_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

static METRICS: Lazy<Option<Metrics>> = Lazy::new(|| match Metrics::new() {
    Ok(m) => Some(m),
    Err(e) => {
        tracing::warn!(error = %e, "Failed to initialize metrics, recording disabled");
        None
    }
});

/// Global metrics instance
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.as_ref()
}

/// Run `f` against the global metrics, if they initialized
pub fn record(f: impl FnOnce(&Metrics)) {
    if let Some(m) = metrics() {
        f(m);
    }
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

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_export() {
        let m = Metrics::new().unwrap();
        m.mint_collisions_total.inc();
        m.signer_wait.observe(0.2);

        let text = m.export_text().unwrap();
        assert!(text.contains("mint_collisions_total 1"));
        assert!(text.contains("signer_wait_seconds_count 1"));
    }

    #[test]
    fn test_global_metrics_available() {
        let before = metrics().map(|m| m.airdrops_requested_total.get()).unwrap_or(0);
        record(|m| m.airdrops_requested_total.inc());
        let after = metrics().map(|m| m.airdrops_requested_total.get()).unwrap_or(0);
        assert!(after > before);
    }
}
