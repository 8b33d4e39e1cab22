// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # pgo-controller - pod reconciliation for clustered PostgreSQL
//!
//! A namespace-scoped controller that watches the operator's database pods
//! and keeps their service routing and cluster workflows in step with pod
//! lifecycle events.
//!
//! ## Overview
//!
//! - On pod **add**, the pod and its Deployment get a `service-name` label
//!   (`<cluster>` for the primary, `<cluster>-replica` for replicas). An
//!   existing value on the Deployment always wins.
//! - On pod **update**, the `database` container's readiness drives the
//!   failover check (every update, when autofail is enabled) and the
//!   post-startup workflow (only on the not-ready → ready edge).
//! - On pod **delete**, nothing beyond logging.
//!
//! ## Modules
//!
//! - [`event_source`] - pod watch, snapshot cache and typed notifications
//! - [`classifier`] - which pods are managed database pods
//! - [`routing`] - service-routing assignment for added pods
//! - [`readiness`] - readiness edge detection for updated pods
//! - [`dispatcher`] - per-pod ordered routing of notifications to handlers
//! - [`store`] / [`actions`] - Kubernetes reads, label patches and task records
//! - [`context`] - dependencies shared by every handler
//!
//! ## Example
//!
//! ```rust,no_run
//! use pgo_controller::classifier::is_managed_database_pod;
//! use std::collections::BTreeMap;
//!
//! let mut labels = BTreeMap::new();
//! labels.insert("pg-cluster".to_string(), "mycluster".to_string());
//! labels.insert("pgo-backrest-repo".to_string(), "true".to_string());
//!
//! assert!(!is_managed_database_pod(&labels, "postgres-operator"));
//! ```

pub mod actions;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod dispatcher;
pub mod errors;
pub mod event_source;
pub mod health;
pub mod labels;
pub mod metrics;
pub mod pod;
pub mod readiness;
pub mod routing;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
