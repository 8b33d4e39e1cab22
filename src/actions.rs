// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Downstream orchestration actions invoked by the readiness detector.
//!
//! The controller only decides *when* these run; what they do belongs to the
//! failover, policy, workflow and backup subsystems. [`KubeActions`] hands
//! each request to those subsystems by writing a deterministic [`Pgtask`]:
//!
//! | Action | Task | Effect |
//! |--------|------|--------|
//! | failover check, not ready | `<cluster>-autofail` | created if absent, stamped `notReadySince` |
//! | failover check, ready | `<cluster>-autofail` | deleted |
//! | apply policies | `<cluster>-policies` | each listed policy labeled on the `Pgcluster`, task deleted; fails if the `Pgcluster` is missing |
//! | workflow completion | `<cluster>-createcluster` | `completed` timestamp merged into parameters |
//! | stanza bootstrap | `<cluster>-stanza-create` | created if absent |
//!
//! All of them are safe to call repeatedly with the same arguments.

use crate::constants::{
    AUTOFAIL_SUFFIX, CREATE_CLUSTER_WORKFLOW_SUFFIX, PARAM_CLUSTER, PARAM_NAMESPACE,
    PARAM_NOT_READY_SINCE, PARAM_WORKFLOW_COMPLETED, POLICIES_SUFFIX, STANZA_CREATE_SUFFIX,
    TASK_TYPE_AUTOFAIL, TASK_TYPE_STANZA_CREATE,
};
use crate::crd::Pgtask;
use crate::errors::ControllerError;
use crate::labels::VALUE_POLICY_APPLIED;
use crate::metrics;
use crate::store::{ClusterStore, TaskCreation};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the stanza-create task for a cluster.
#[must_use]
pub fn stanza_task_name(cluster: &str) -> String {
    format!("{cluster}{STANZA_CREATE_SUFFIX}")
}

/// Orchestration actions driven by pod readiness.
#[async_trait]
pub trait ClusterActions: Send + Sync {
    /// Report the primary's database readiness to the failover subsystem.
    async fn trigger_failover_check(
        &self,
        ready: bool,
        cluster: &str,
        namespace: &str,
    ) -> Result<(), ControllerError>;

    /// Apply the cluster's pending policies.
    async fn apply_policies(&self, cluster: &str, namespace: &str) -> Result<(), ControllerError>;

    /// Mark the create-cluster workflow complete.
    async fn complete_create_cluster_workflow(
        &self,
        cluster: &str,
        namespace: &str,
    ) -> Result<(), ControllerError>;

    /// Request one-time initialization of the cluster's backup repository.
    async fn bootstrap_backup_stanza(
        &self,
        namespace: &str,
        cluster: &str,
    ) -> Result<(), ControllerError>;
}

/// [`ClusterActions`] that hand work to other components through `Pgtask`s.
pub struct KubeActions {
    store: Arc<dyn ClusterStore>,
}

impl KubeActions {
    #[must_use]
    pub fn new(store: Arc<dyn ClusterStore>) -> Self {
        Self { store }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl ClusterActions for KubeActions {
    async fn trigger_failover_check(
        &self,
        ready: bool,
        cluster: &str,
        namespace: &str,
    ) -> Result<(), ControllerError> {
        let task_name = format!("{cluster}{AUTOFAIL_SUFFIX}");

        if ready {
            // Primary recovered: cancel any pending failover countdown
            self.store.delete_task(&task_name, namespace).await?;
            debug!(cluster = cluster, task = %task_name, "primary ready, autofail task cleared");
            return Ok(());
        }

        let mut parameters = BTreeMap::new();
        parameters.insert(PARAM_CLUSTER.to_string(), cluster.to_string());
        parameters.insert(PARAM_NOT_READY_SINCE.to_string(), now_rfc3339());
        let task = Pgtask::named(&task_name, namespace, TASK_TYPE_AUTOFAIL, parameters);

        match self.store.create_task_if_absent(&task).await? {
            TaskCreation::Created => {
                metrics::record_task_created(TASK_TYPE_AUTOFAIL);
                info!(cluster = cluster, task = %task_name, "primary not ready, autofail task created");
            }
            TaskCreation::AlreadyExists => {
                debug!(cluster = cluster, task = %task_name, "autofail countdown already running");
            }
        }
        Ok(())
    }

    async fn apply_policies(&self, cluster: &str, namespace: &str) -> Result<(), ControllerError> {
        let task_name = format!("{cluster}{POLICIES_SUFFIX}");
        let Some(task) = self.store.get_task(&task_name, namespace).await? else {
            debug!(cluster = cluster, "no pending policies");
            return Ok(());
        };

        if self.store.get_cluster(cluster, namespace).await?.is_none() {
            // Keep the task so the next ready edge can apply it
            return Err(ControllerError::Action {
                action: "apply_policies",
                cluster: cluster.to_string(),
                reason: format!("pending policies but no Pgcluster in namespace {namespace}"),
            });
        }

        for policy in task.spec.parameters.keys() {
            self.store
                .add_cluster_label(cluster, namespace, policy, VALUE_POLICY_APPLIED)
                .await?;
            info!(cluster = cluster, policy = %policy, "policy applied");
        }

        self.store.delete_task(&task_name, namespace).await
    }

    async fn complete_create_cluster_workflow(
        &self,
        cluster: &str,
        namespace: &str,
    ) -> Result<(), ControllerError> {
        let task_name = format!("{cluster}{CREATE_CLUSTER_WORKFLOW_SUFFIX}");
        let Some(task) = self.store.get_task(&task_name, namespace).await? else {
            debug!(cluster = cluster, "no create-cluster workflow to complete");
            return Ok(());
        };

        if task.spec.parameters.contains_key(PARAM_WORKFLOW_COMPLETED) {
            debug!(cluster = cluster, "create-cluster workflow already complete");
            return Ok(());
        }

        let mut parameters = BTreeMap::new();
        parameters.insert(PARAM_WORKFLOW_COMPLETED.to_string(), now_rfc3339());
        self.store
            .patch_task_parameters(&task_name, namespace, &parameters)
            .await?;
        info!(cluster = cluster, "create-cluster workflow completed");
        Ok(())
    }

    async fn bootstrap_backup_stanza(
        &self,
        namespace: &str,
        cluster: &str,
    ) -> Result<(), ControllerError> {
        let task_name = stanza_task_name(cluster);
        let mut parameters = BTreeMap::new();
        parameters.insert(PARAM_CLUSTER.to_string(), cluster.to_string());
        parameters.insert(PARAM_NAMESPACE.to_string(), namespace.to_string());
        let task = Pgtask::named(&task_name, namespace, TASK_TYPE_STANZA_CREATE, parameters);

        match self.store.create_task_if_absent(&task).await? {
            TaskCreation::Created => {
                metrics::record_task_created(TASK_TYPE_STANZA_CREATE);
                info!(cluster = cluster, task = %task_name, "stanza-create task created");
            }
            TaskCreation::AlreadyExists => {
                info!(cluster = cluster, task = %task_name, "stanza-create task already exists, skipping");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod actions_tests;
