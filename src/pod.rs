// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Strongly-typed pod snapshots.
//!
//! Raw `Pod` objects are converted once, at the event-source boundary, into a
//! [`PodSnapshot`] holding only what the controller reads: identity, labels
//! and per-container readiness. Handlers never see the raw API object.

use crate::constants::DATABASE_CONTAINER;
use crate::labels::{label_value, LABEL_PG_CLUSTER, LABEL_SERVICE_NAME};
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a pod: `namespace/name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Readiness of one container in the pod.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerReadiness {
    pub name: String,
    pub ready: bool,
}

/// The parts of a pod the controller reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodSnapshot {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub containers: Vec<ContainerReadiness>,
}

impl PodSnapshot {
    /// Empty snapshot for `namespace/name`.
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    /// Builder: add or replace a label.
    #[must_use]
    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Builder: add a container status.
    #[must_use]
    pub fn with_container(mut self, name: &str, ready: bool) -> Self {
        self.containers.push(ContainerReadiness {
            name: name.to_string(),
            ready,
        });
        self
    }

    #[must_use]
    pub fn key(&self) -> PodKey {
        PodKey::new(&self.namespace, &self.name)
    }

    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        label_value(&self.labels, key)
    }

    /// Cluster name from the `pg-cluster` label, empty when absent.
    #[must_use]
    pub fn cluster_name(&self) -> &str {
        self.label(LABEL_PG_CLUSTER).unwrap_or_default()
    }

    /// Current service-routing value, empty when absent.
    #[must_use]
    pub fn service_name(&self) -> &str {
        self.label(LABEL_SERVICE_NAME).unwrap_or_default()
    }

    /// Ready flag of the `database` container; a missing status counts as not ready.
    #[must_use]
    pub fn database_ready(&self) -> bool {
        self.containers
            .iter()
            .find(|c| c.name == DATABASE_CONTAINER)
            .is_some_and(|c| c.ready)
    }
}

impl From<&Pod> for PodSnapshot {
    fn from(pod: &Pod) -> Self {
        let containers = pod
            .status
            .as_ref()
            .and_then(|status| status.container_statuses.as_ref())
            .map(|statuses| {
                statuses
                    .iter()
                    .map(|s| ContainerReadiness {
                        name: s.name.clone(),
                        ready: s.ready,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            labels: pod.metadata.labels.clone().unwrap_or_default(),
            containers,
        }
    }
}

#[cfg(test)]
#[path = "pod_tests.rs"]
mod pod_tests;
