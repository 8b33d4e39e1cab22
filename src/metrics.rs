// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the pod controller.
//!
//! All metrics use the namespace prefix `pgo_controller_`.
//!
//! # Metrics Categories
//!
//! - **Notification Metrics** - pod notifications by kind and outcome, handler latency
//! - **Action Metrics** - downstream action invocations and task creation
//! - **Error Metrics** - failures by operation and category, watch stream errors
//!
//! # Example
//!
//! ```rust,no_run
//! use pgo_controller::metrics::record_notification;
//!
//! record_notification("added", "handled", std::time::Duration::from_millis(12));
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all controller metrics
const METRICS_NAMESPACE: &str = "pgo_controller";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Notification Metrics
// ============================================================================

/// Total number of pod notifications processed
///
/// Labels:
/// - `kind`: `added`, `updated`, `deleted`
/// - `outcome`: `handled`, `filtered`, `error`
pub static NOTIFICATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_notifications_total"),
        "Total number of pod notifications by kind and outcome",
    );
    let counter = CounterVec::new(opts, &["kind", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of notification handlers in seconds
///
/// Labels:
/// - `kind`: `added`, `updated`, `deleted`
pub static HANDLER_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_handler_duration_seconds"),
        "Duration of pod notification handlers in seconds by kind",
    )
    .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]);
    let histogram = HistogramVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of service-routing labels assigned
///
/// Labels:
/// - `source`: `role` (derived from the role label) or `deployment` (reused)
pub static ROUTING_ASSIGNMENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_routing_assignments_total"),
        "Total number of service-routing label assignments by value source",
    );
    let counter = CounterVec::new(opts, &["source"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Action Metrics
// ============================================================================

/// Total number of downstream action invocations
///
/// Labels:
/// - `action`: action name (e.g. `bootstrap_backup_stanza`)
/// - `status`: `success`, `error`
pub static ACTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_actions_total"),
        "Total number of downstream action invocations by action and status",
    );
    let counter = CounterVec::new(opts, &["action", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of task records created by the action layer
///
/// Labels:
/// - `task_type`: e.g. `stanza-create`, `autofail`
pub static TASKS_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_tasks_created_total"),
        "Total number of Pgtask records created by type",
    );
    let counter = CounterVec::new(opts, &["task_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of handler errors
///
/// Labels:
/// - `operation`: failing step (e.g. `get_deployment`, `label_pod`)
/// - `error_type`: category from `ControllerError::category`
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of handler errors by operation and category",
    );
    let counter = CounterVec::new(opts, &["operation", "error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of errors returned by the pod watch stream
///
/// Labels:
/// - `namespace`: watched namespace
pub static WATCH_ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_watch_errors_total"),
        "Total number of pod watch stream errors by namespace",
    );
    let counter = CounterVec::new(opts, &["namespace"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a processed notification
///
/// # Arguments
/// * `kind` - `added`, `updated` or `deleted`
/// * `outcome` - `handled`, `filtered` or `error`
/// * `duration` - Time spent in the handler
pub fn record_notification(kind: &str, outcome: &str, duration: Duration) {
    NOTIFICATIONS_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
    HANDLER_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record a service-routing assignment
pub fn record_routing_assignment(source: &str) {
    ROUTING_ASSIGNMENTS_TOTAL.with_label_values(&[source]).inc();
}

/// Record a downstream action outcome
pub fn record_action(action: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    ACTIONS_TOTAL.with_label_values(&[action, status]).inc();
}

/// Record creation of a task record
pub fn record_task_created(task_type: &str) {
    TASKS_CREATED_TOTAL.with_label_values(&[task_type]).inc();
}

/// Record a handler error
///
/// # Arguments
/// * `operation` - Step that failed
/// * `error_type` - Error category
pub fn record_error(operation: &str, error_type: &str) {
    ERRORS_TOTAL
        .with_label_values(&[operation, error_type])
        .inc();
}

/// Record a watch stream error
pub fn record_watch_error(namespace: &str) {
    WATCH_ERRORS_TOTAL.with_label_values(&[namespace]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
