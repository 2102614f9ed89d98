//! Prometheus Metrics Module
//!
//! Provides gateway-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Open channels and online users gauges
//! - Delivery outcomes per channel (delivered, backpressure, closed, no_channel)
//! - Handshake rejections by reason
//! - Channel closes by reason

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Channels currently present in the connection registry
pub static CHANNELS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("channels_active", "Number of live WebSocket channels")
            .namespace("alert_gateway"),
    )
    .expect("Failed to create CHANNELS_ACTIVE metric")
});

/// Users with at least one live channel
pub static USERS_ONLINE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("users_online", "Number of users with at least one live channel")
            .namespace("alert_gateway"),
    )
    .expect("Failed to create USERS_ONLINE metric")
});

/// Delivery attempts by outcome
pub static DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deliveries_total", "Payload delivery attempts by outcome")
            .namespace("alert_gateway"),
        &["outcome"], // "delivered", "backpressure", "closed", "no_channel"
    )
    .expect("Failed to create DELIVERIES_TOTAL metric")
});

/// Rejected handshakes by reason
pub static HANDSHAKE_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("handshake_rejections_total", "Rejected WebSocket handshakes")
            .namespace("alert_gateway"),
        &["reason"],
    )
    .expect("Failed to create HANDSHAKE_REJECTIONS_TOTAL metric")
});

/// Closed channels by reason
pub static CHANNEL_CLOSES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("channel_closes_total", "Closed channels by reason").namespace("alert_gateway"),
        &["reason"],
    )
    .expect("Failed to create CHANNEL_CLOSES_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CHANNELS_ACTIVE.clone()))
        .expect("Failed to register CHANNELS_ACTIVE");
    registry
        .register(Box::new(USERS_ONLINE.clone()))
        .expect("Failed to register USERS_ONLINE");
    registry
        .register(Box::new(DELIVERIES_TOTAL.clone()))
        .expect("Failed to register DELIVERIES_TOTAL");
    registry
        .register(Box::new(HANDSHAKE_REJECTIONS_TOTAL.clone()))
        .expect("Failed to register HANDSHAKE_REJECTIONS_TOTAL");
    registry
        .register(Box::new(CHANNEL_CLOSES_TOTAL.clone()))
        .expect("Failed to register CHANNEL_CLOSES_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record one delivery outcome
pub fn record_delivery(outcome: &str) {
    DELIVERIES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a rejected handshake
pub fn record_handshake_rejection(reason: &str) {
    HANDSHAKE_REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a channel leaving the registry
pub fn record_channel_closed(reason: &str) {
    CHANNEL_CLOSES_TOTAL.with_label_values(&[reason]).inc();
}
