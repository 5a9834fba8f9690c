//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wallet_jobs_total` (counter): job deliveries by queue, outcome
//! - `wallet_job_duration_seconds` (histogram): handler latency by queue
//! - `wallet_transactions_total` (counter): ledger status changes by type, status
//! - `wallet_queue_depth` (gauge): ready plus delayed jobs by queue
//! - `wallet_chain_provider_up` (gauge): 1=healthy, 0=unhealthy, by chain
//!
//! Recording is a no-op until a recorder is installed.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

use crate::ledger::types::{TransactionStatus, TransactionType};

/// Install the Prometheus recorder and its HTTP listener. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_job(queue: &'static str, outcome: &'static str, duration: Duration) {
    metrics::counter!("wallet_jobs_total", "queue" => queue, "outcome" => outcome).increment(1);
    metrics::histogram!("wallet_job_duration_seconds", "queue" => queue).record(duration.as_secs_f64());
}

pub fn record_transaction(kind: TransactionType, status: TransactionStatus) {
    metrics::counter!(
        "wallet_transactions_total",
        "type" => kind.as_str(),
        "status" => status.as_str()
    )
    .increment(1);
}

pub fn set_queue_depth(queue: &'static str, depth: usize) {
    metrics::gauge!("wallet_queue_depth", "queue" => queue).set(depth as f64);
}

pub fn record_provider_health(chain: &'static str, healthy: bool) {
    metrics::gauge!("wallet_chain_provider_up", "chain" => chain).set(if healthy { 1.0 } else { 0.0 });
}
