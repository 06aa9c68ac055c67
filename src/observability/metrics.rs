//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `deploy_operator_deploy_requests_total` - Total number of deploy requests
//! - `deploy_operator_deploy_request_errors_total` - Deploy requests answered with a top-level error
//! - `deploy_operator_deploy_duration_seconds` - Duration of deploy requests
//! - `deploy_operator_services_total` - Reconciled descriptors by action
//! - `deploy_operator_service_errors_total` - Descriptors that ended with an error description
//! - `deploy_operator_release_lookups_total` - Release lookups by provider and result
//! - `deploy_operator_release_lookup_duration_seconds` - Duration of release lookups by provider

use crate::api::Action;
use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static DEPLOY_REQUESTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "deploy_operator_deploy_requests_total",
        "Total number of deploy requests",
    )
    .expect("Failed to create DEPLOY_REQUESTS_TOTAL metric - this should never happen")
});

static DEPLOY_REQUEST_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "deploy_operator_deploy_request_errors_total",
        "Total number of deploy requests answered with a top-level error",
    )
    .expect("Failed to create DEPLOY_REQUEST_ERRORS_TOTAL metric - this should never happen")
});

static DEPLOY_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "deploy_operator_deploy_duration_seconds",
            "Duration of deploy requests in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create DEPLOY_DURATION metric - this should never happen")
});

static SERVICES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "deploy_operator_services_total",
            "Total number of reconciled descriptors by action",
        ),
        &["action"],
    )
    .expect("Failed to create SERVICES_TOTAL metric - this should never happen")
});

static SERVICE_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "deploy_operator_service_errors_total",
        "Total number of descriptors that failed to reconcile",
    )
    .expect("Failed to create SERVICE_ERRORS_TOTAL metric - this should never happen")
});

static RELEASE_LOOKUPS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "deploy_operator_release_lookups_total",
            "Total number of release lookups by provider and result",
        ),
        &["provider", "result"],
    )
    .expect("Failed to create RELEASE_LOOKUPS_TOTAL metric - this should never happen")
});

static RELEASE_LOOKUP_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "deploy_operator_release_lookup_duration_seconds",
            "Duration of release lookups in seconds by provider",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["provider"],
    )
    .expect("Failed to create RELEASE_LOOKUP_DURATION metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(DEPLOY_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEPLOY_REQUEST_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEPLOY_DURATION.clone()))?;
    REGISTRY.register(Box::new(SERVICES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SERVICE_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RELEASE_LOOKUPS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RELEASE_LOOKUP_DURATION.clone()))?;

    Ok(())
}

pub fn increment_deploy_requests() {
    DEPLOY_REQUESTS_TOTAL.inc();
}

pub fn increment_deploy_request_errors() {
    DEPLOY_REQUEST_ERRORS_TOTAL.inc();
}

pub fn observe_deploy_duration(duration: f64) {
    DEPLOY_DURATION.observe(duration);
}

pub fn record_service_action(action: Action) {
    SERVICES_TOTAL.with_label_values(&[action.as_str()]).inc();
}

pub fn increment_service_errors() {
    SERVICE_ERRORS_TOTAL.inc();
}

pub fn record_release_lookup(provider: &str, success: bool, duration: f64) {
    let result = if success { "success" } else { "error" };
    RELEASE_LOOKUPS_TOTAL
        .with_label_values(&[provider, result])
        .inc();
    RELEASE_LOOKUP_DURATION
        .with_label_values(&[provider])
        .observe(duration);
}

/// Gather all registered metric families
#[must_use]
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}
