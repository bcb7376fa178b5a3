//! Prometheus metrics for the gateway.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static CHAT_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static TOKENS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static STREAM_CHUNKS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PROVIDER_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static DB_OPERATION_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize all metrics. Must be called once at startup.
pub fn init_metrics() {
    let registry = Registry::new();

    let chat_requests = IntCounterVec::new(
        Opts::new("gateway_chat_requests_total", "Total chat relay requests"),
        &["provider", "model", "outcome"],
    )
    .expect("Failed to create gateway_chat_requests_total metric");

    let tokens = IntCounterVec::new(
        Opts::new("gateway_tokens_total", "Total tokens metered"),
        &["provider", "model", "type"], // type: input, output
    )
    .expect("Failed to create gateway_tokens_total metric");

    let stream_chunks = IntCounterVec::new(
        Opts::new(
            "gateway_stream_chunks_total",
            "Chunks relayed to clients",
        ),
        &["provider"],
    )
    .expect("Failed to create gateway_stream_chunks_total metric");

    let provider_errors = IntCounterVec::new(
        Opts::new("gateway_provider_errors_total", "Total AI provider errors"),
        &["provider", "error_type"],
    )
    .expect("Failed to create gateway_provider_errors_total metric");

    let db_duration = HistogramVec::new(
        HistogramOpts::new(
            "gateway_db_operation_duration_seconds",
            "Database operation duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["operation"],
    )
    .expect("Failed to create gateway_db_operation_duration_seconds metric");

    registry
        .register(Box::new(chat_requests.clone()))
        .expect("Failed to register gateway_chat_requests_total");
    registry
        .register(Box::new(tokens.clone()))
        .expect("Failed to register gateway_tokens_total");
    registry
        .register(Box::new(stream_chunks.clone()))
        .expect("Failed to register gateway_stream_chunks_total");
    registry
        .register(Box::new(provider_errors.clone()))
        .expect("Failed to register gateway_provider_errors_total");
    registry
        .register(Box::new(db_duration.clone()))
        .expect("Failed to register gateway_db_operation_duration_seconds");

    let _ = REGISTRY.set(registry);
    let _ = CHAT_REQUESTS_TOTAL.set(chat_requests);
    let _ = TOKENS_TOTAL.set(tokens);
    let _ = STREAM_CHUNKS_TOTAL.set(stream_chunks);
    let _ = PROVIDER_ERRORS_TOTAL.set(provider_errors);
    let _ = DB_OPERATION_DURATION_SECONDS.set(db_duration);

    tracing::info!("Prometheus metrics initialized");
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
        format!("# Failed to convert metrics to UTF-8: {}\n", e)
    })
}

// Helper functions for recording metrics

/// Record a completed chat relay request.
pub fn record_chat_request(provider: &str, model: &str, outcome: &str) {
    if let Some(counter) = CHAT_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[provider, model, outcome]).inc();
    }
}

/// Record metered token usage.
pub fn record_tokens(provider: &str, model: &str, input_tokens: i64, output_tokens: i64) {
    if let Some(counter) = TOKENS_TOTAL.get() {
        counter
            .with_label_values(&[provider, model, "input"])
            .inc_by(input_tokens.max(0) as u64);
        counter
            .with_label_values(&[provider, model, "output"])
            .inc_by(output_tokens.max(0) as u64);
    }
}

/// Record one chunk relayed to a client.
pub fn record_stream_chunk(provider: &str) {
    if let Some(counter) = STREAM_CHUNKS_TOTAL.get() {
        counter.with_label_values(&[provider]).inc();
    }
}

/// Record a provider error.
pub fn record_provider_error(provider: &str, error_type: &str) {
    if let Some(counter) = PROVIDER_ERRORS_TOTAL.get() {
        counter.with_label_values(&[provider, error_type]).inc();
    }
}

/// Record database operation duration.
pub fn record_db_operation(operation: &str, duration_secs: f64) {
    if let Some(histogram) = DB_OPERATION_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[operation])
            .observe(duration_secs);
    }
}
