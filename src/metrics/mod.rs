//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Flow runs started and rejected
//! - Per-step outcomes and latency
//! - Capture search probe counts

use crate::error::{TracerError, TracerResult};
use crate::flow::{FlowStep, StepState};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Flow metrics
    pub static ref FLOWS_STARTED: CounterVec = register_counter_vec!(
        "flow_tracer_flows_started_total",
        "Total flow runs started",
        &["origin_chain_id", "destination_chain_id"]
    ).unwrap();

    pub static ref FLOWS_REJECTED: CounterVec = register_counter_vec!(
        "flow_tracer_flows_rejected_total",
        "Flow requests rejected before any lookup, by reason",
        &["reason"]
    ).unwrap();

    // Step metrics
    pub static ref STEP_OUTCOMES: CounterVec = register_counter_vec!(
        "flow_tracer_step_outcomes_total",
        "Step results by step and status",
        &["step", "status"]
    ).unwrap();

    pub static ref STEP_LATENCY: HistogramVec = register_histogram_vec!(
        "flow_tracer_step_latency_seconds",
        "Time spent verifying each step",
        &["step"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // Capture search metrics
    pub static ref CAPTURE_PROBES: Histogram = register_histogram!(
        "flow_tracer_capture_probes",
        "RVM transaction batches fetched per capture search",
        vec![1.0, 2.0, 4.0, 6.0, 8.0, 10.0, 12.0]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> TracerResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TracerError::Config(format!("Cannot bind metrics on {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| TracerError::Internal(format!("Metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_flow_started(origin_chain_id: u64, destination_chain_id: u64) {
    FLOWS_STARTED
        .with_label_values(&[&origin_chain_id.to_string(), &destination_chain_id.to_string()])
        .inc();
}

pub fn record_flow_rejected(reason: &str) {
    FLOWS_REJECTED.with_label_values(&[reason]).inc();
}

pub fn record_step(step: FlowStep, status: StepState) {
    STEP_OUTCOMES
        .with_label_values(&[step.name(), status.name()])
        .inc();
}

pub fn record_step_latency(step: FlowStep, latency_secs: f64) {
    STEP_LATENCY
        .with_label_values(&[step.name()])
        .observe(latency_secs);
}

pub fn record_capture_probes(probes: u32) {
    CAPTURE_PROBES.observe(f64::from(probes));
}
