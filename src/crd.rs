// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions shared with the PostgreSQL operator.
//!
//! The pod controller only needs two of the operator's resources:
//!
//! - [`Pgcluster`] - the cluster record; its `autofail` label gates failover checks
//! - [`Pgtask`] - named task records consumed by the backup, failover and
//!   workflow subsystems (e.g. `<cluster>-stanza-create`)
//!
//! Field names follow the operator's existing wire format (lower-case keys),
//! so records written by other components deserialize unchanged.
//!
//! # Example: Building a stanza-create task
//!
//! ```rust,no_run
//! use pgo_controller::crd::{Pgtask, PgtaskSpec};
//! use std::collections::BTreeMap;
//!
//! let mut parameters = BTreeMap::new();
//! parameters.insert("pg-cluster".to_string(), "mycluster".to_string());
//!
//! let task = Pgtask::new(
//!     "mycluster-stanza-create",
//!     PgtaskSpec {
//!         name: "mycluster-stanza-create".to_string(),
//!         task_type: "stanza-create".to_string(),
//!         status: None,
//!         parameters,
//!     },
//! );
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `Pgcluster` describes a managed PostgreSQL cluster.
///
/// The pod controller treats it as read-only apart from the policy labels
/// stamped by the policy action.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cr.client-go.k8s.io",
    version = "v1",
    kind = "Pgcluster",
    plural = "pgclusters",
    namespaced,
    doc = "Pgcluster describes a PostgreSQL cluster managed by the operator, including its primary/replica topology and feature flags."
)]
#[kube(status = "PgclusterStatus")]
pub struct PgclusterSpec {
    /// Resource name of the cluster
    #[serde(default)]
    pub name: String,

    /// Cluster name used in pod labels and service names
    #[serde(default)]
    pub clustername: String,

    /// Comma-separated list of policies to apply once the primary is ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<String>,

    /// PostgreSQL port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    /// Number of replicas requested at creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<String>,

    /// Free-form user labels copied onto cluster objects
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub userlabels: BTreeMap<String, String>,
}

/// Observed state of a `Pgcluster`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct PgclusterStatus {
    /// Lifecycle state (e.g. "pgcluster Processed")
    #[serde(default)]
    pub state: String,

    /// Human-readable status message
    #[serde(default)]
    pub message: String,
}

/// `Pgtask` is a named unit of work handed between operator components.
///
/// Task names are deterministic (`<cluster>-<suffix>`), so creating the same
/// task twice fails with `AlreadyExists` and existence doubles as a claim.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cr.client-go.k8s.io",
    version = "v1",
    kind = "Pgtask",
    plural = "pgtasks",
    namespaced,
    doc = "Pgtask records a unit of work (stanza creation, autofail tracking, workflow progress) to be carried out by an operator component."
)]
#[kube(status = "PgtaskStatus")]
pub struct PgtaskSpec {
    /// Task name, identical to the resource name
    #[serde(default)]
    pub name: String,

    /// Kind of work (e.g. "stanza-create", "autofail")
    #[serde(default, rename = "tasktype")]
    pub task_type: String,

    /// Processing state written by the consuming component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Task parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Observed state of a `Pgtask`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct PgtaskStatus {
    /// Lifecycle state
    #[serde(default)]
    pub state: String,

    /// Human-readable status message
    #[serde(default)]
    pub message: String,
}

impl Pgtask {
    /// Build a task owned by `namespace` with the given type and parameters.
    #[must_use]
    pub fn named(
        name: &str,
        namespace: &str,
        task_type: &str,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        let mut task = Pgtask::new(
            name,
            PgtaskSpec {
                name: name.to_string(),
                task_type: task_type.to_string(),
                status: None,
                parameters,
            },
        );
        task.metadata.namespace = Some(namespace.to_string());
        task
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
