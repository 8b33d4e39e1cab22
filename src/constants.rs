// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the pod controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group of the operator's custom resources
pub const API_GROUP: &str = "cr.client-go.k8s.io";

/// API version of the operator's custom resources
pub const API_VERSION: &str = "v1";

/// Kind name for `Pgcluster` resource
pub const KIND_PGCLUSTER: &str = "Pgcluster";

/// Kind name for `Pgtask` resource
pub const KIND_PGTASK: &str = "Pgtask";

/// Field manager used for every patch issued by the controller
pub const FIELD_MANAGER: &str = "pgo-pod-controller";

// ============================================================================
// Pod Inspection Constants
// ============================================================================

/// Name of the PostgreSQL container whose readiness drives the workflow
pub const DATABASE_CONTAINER: &str = "database";

/// Default value of the `name` label carried by the operator's own pod
pub const DEFAULT_OPERATOR_NAME: &str = "postgres-operator";

// ============================================================================
// Task Constants
// ============================================================================

/// Suffix of the stanza-create task name (`<cluster>-stanza-create`)
pub const STANZA_CREATE_SUFFIX: &str = "-stanza-create";

/// Suffix of the autofail task name (`<cluster>-autofail`)
pub const AUTOFAIL_SUFFIX: &str = "-autofail";

/// Suffix of the pending-policies task name (`<cluster>-policies`)
pub const POLICIES_SUFFIX: &str = "-policies";

/// Suffix of the create-cluster workflow task name (`<cluster>-createcluster`)
pub const CREATE_CLUSTER_WORKFLOW_SUFFIX: &str = "-createcluster";

/// Task type for pgBackRest stanza creation
pub const TASK_TYPE_STANZA_CREATE: &str = "stanza-create";

/// Task type for autofail tracking
pub const TASK_TYPE_AUTOFAIL: &str = "autofail";

/// Task parameter recording when the primary was first seen not ready
pub const PARAM_NOT_READY_SINCE: &str = "notReadySince";

/// Task parameter recording when the create-cluster workflow completed
pub const PARAM_WORKFLOW_COMPLETED: &str = "completed";

/// Task parameter carrying the cluster name
pub const PARAM_CLUSTER: &str = "pg-cluster";

/// Task parameter carrying the namespace
pub const PARAM_NAMESPACE: &str = "namespace";

// ============================================================================
// Controller Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default capacity of the notification channel between watcher and dispatcher
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Default number of dispatcher lanes (1 processes notifications strictly in order)
pub const DEFAULT_WORKERS: usize = 1;

/// Default resync interval in seconds (0 disables resync)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 0;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for liveness endpoint
pub const HEALTH_SERVER_PATH: &str = "/healthz";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
