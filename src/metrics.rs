//! Ingestion metrics.
//!
//! Recording is always safe: without an installed recorder the macros are
//! no-ops, so tests and CLI runs need no setup.

use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

pub const RUNS_TOTAL: &str = "ingest_runs_total";
pub const FETCH_DURATION_SECONDS: &str = "ingest_fetch_duration_seconds";
pub const CANDIDATES_TOTAL: &str = "ingest_candidates_total";
pub const EXTRACTION_FAILURES_TOTAL: &str = "ingest_extraction_failures_total";
pub const EVENTS_CREATED_TOTAL: &str = "ingest_events_created_total";
pub const EVENTS_UPDATED_TOTAL: &str = "ingest_events_updated_total";
pub const EVENTS_DUPLICATE_TOTAL: &str = "ingest_events_duplicate_total";
pub const EVENTS_FAILED_TOTAL: &str = "ingest_events_failed_total";

/// Installs the Prometheus exporter on `port`. Idempotent.
pub fn init_metrics(port: u16) {
    INIT.call_once(|| {
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();
        let builder =
            metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
        match builder.install() {
            Ok(()) => {
                register_metrics();
                info!("Prometheus exporter listening on http://{}/metrics", addr);
            }
            Err(e) => warn!("Prometheus exporter install failed: {}", e),
        }
    });
}

// Pre-register so every series shows up on /metrics before first use.
fn register_metrics() {
    for name in [
        EVENTS_CREATED_TOTAL,
        EVENTS_UPDATED_TOTAL,
        EVENTS_DUPLICATE_TOTAL,
        EVENTS_FAILED_TOTAL,
        EXTRACTION_FAILURES_TOTAL,
    ] {
        let _ = ::metrics::counter!(name);
    }
    let _ = ::metrics::histogram!(FETCH_DURATION_SECONDS);
}

pub struct IngestMetrics;

impl IngestMetrics {
    pub fn record_run(trigger: &'static str, status: &'static str) {
        ::metrics::counter!(RUNS_TOTAL, "trigger" => trigger, "status" => status).increment(1);
    }

    pub fn record_fetch_duration(duration_secs: f64) {
        ::metrics::histogram!(FETCH_DURATION_SECONDS).record(duration_secs);
    }

    pub fn record_candidates(strategy: String, candidates: usize, failures: usize) {
        ::metrics::counter!(CANDIDATES_TOTAL, "strategy" => strategy).increment(candidates as u64);
        ::metrics::counter!(EXTRACTION_FAILURES_TOTAL).increment(failures as u64);
    }

    pub fn record_writes(created: usize, updated: usize, duplicates: usize, failed: usize) {
        ::metrics::counter!(EVENTS_CREATED_TOTAL).increment(created as u64);
        ::metrics::counter!(EVENTS_UPDATED_TOTAL).increment(updated as u64);
        ::metrics::counter!(EVENTS_DUPLICATE_TOTAL).increment(duplicates as u64);
        ::metrics::counter!(EVENTS_FAILED_TOTAL).increment(failed as u64);
    }
}
