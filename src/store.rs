// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Read, label and create primitives over the cluster store.
//!
//! Handlers depend on the [`ClusterStore`] trait rather than on `kube::Client`
//! directly, so they can be exercised against in-memory fakes. [`KubeStore`]
//! is the production implementation.
//!
//! Lookups return `Ok(None)` for a missing object. Label writes are JSON merge
//! patches of `metadata.labels`, which are idempotent by value.
//!
//! # Example
//!
//! ```rust,no_run
//! use pgo_controller::store::{ClusterStore, KubeStore};
//! use kube::Client;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let store = KubeStore::new(Client::try_default().await?);
//!     if let Some(dep) = store.get_deployment("mycluster", "pgo").await? {
//!         println!("found {:?}", dep.metadata.name);
//!     }
//!     Ok(())
//! }
//! ```

use crate::constants::FIELD_MANAGER;
use crate::crd::{Pgcluster, Pgtask};
use crate::errors::{is_already_exists, is_not_found, ControllerError};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::debug;

/// Outcome of a create-if-absent call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskCreation {
    /// This call created the task
    Created,
    /// A task with that name was already present; nothing was written
    AlreadyExists,
}

/// Store primitives consumed by the controller and its actions.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Fetch a Deployment by name.
    async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Deployment>, ControllerError>;

    /// Fetch a `Pgcluster` by cluster name.
    async fn get_cluster(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Pgcluster>, ControllerError>;

    /// Fetch a `Pgtask` by task name.
    async fn get_task(&self, name: &str, namespace: &str)
        -> Result<Option<Pgtask>, ControllerError>;

    /// Set one label on a pod.
    async fn add_pod_label(
        &self,
        pod: &str,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ControllerError>;

    /// Set one label on a Deployment.
    async fn add_deployment_label(
        &self,
        deployment: &str,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ControllerError>;

    /// Set one label on a `Pgcluster`.
    async fn add_cluster_label(
        &self,
        cluster: &str,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ControllerError>;

    /// Create a task unless one with the same name exists.
    ///
    /// The API server enforces name uniqueness, so concurrent callers cannot
    /// both observe [`TaskCreation::Created`].
    async fn create_task_if_absent(&self, task: &Pgtask) -> Result<TaskCreation, ControllerError>;

    /// Delete a task; deleting a missing task succeeds.
    async fn delete_task(&self, name: &str, namespace: &str) -> Result<(), ControllerError>;

    /// Merge the given entries into a task's `spec.parameters`.
    async fn patch_task_parameters(
        &self,
        name: &str,
        namespace: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), ControllerError>;
}

/// [`ClusterStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = kube::core::NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

async fn get_optional<K>(api: &Api<K>, name: &str, kind: &str) -> Result<Option<K>, ControllerError>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(e) if is_not_found(&e) => {
            debug!(kind = kind, name = name, "object not found");
            Ok(None)
        }
        Err(e) => Err(ControllerError::kube(format!("get {kind} {name}"), e)),
    }
}

async fn merge_label<K>(
    api: &Api<K>,
    name: &str,
    kind: &str,
    key: &str,
    value: &str,
) -> Result<(), ControllerError>
where
    K: Clone + DeserializeOwned + Debug,
{
    let patch = json!({ "metadata": { "labels": { key: value } } });
    api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
        .await
        .map_err(|e| ControllerError::kube(format!("label {kind} {name} {key}={value}"), e))?;
    debug!(kind = kind, name = name, label = key, value = value, "label patched");
    Ok(())
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Deployment>, ControllerError> {
        get_optional(&self.api::<Deployment>(namespace), name, "Deployment").await
    }

    async fn get_cluster(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Pgcluster>, ControllerError> {
        get_optional(&self.api::<Pgcluster>(namespace), name, "Pgcluster").await
    }

    async fn get_task(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Pgtask>, ControllerError> {
        get_optional(&self.api::<Pgtask>(namespace), name, "Pgtask").await
    }

    async fn add_pod_label(
        &self,
        pod: &str,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ControllerError> {
        merge_label(&self.api::<Pod>(namespace), pod, "Pod", key, value).await
    }

    async fn add_deployment_label(
        &self,
        deployment: &str,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ControllerError> {
        merge_label(
            &self.api::<Deployment>(namespace),
            deployment,
            "Deployment",
            key,
            value,
        )
        .await
    }

    async fn add_cluster_label(
        &self,
        cluster: &str,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ControllerError> {
        merge_label(&self.api::<Pgcluster>(namespace), cluster, "Pgcluster", key, value).await
    }

    async fn create_task_if_absent(&self, task: &Pgtask) -> Result<TaskCreation, ControllerError> {
        let namespace = task.metadata.namespace.as_deref().unwrap_or_default();
        let name = task.metadata.name.as_deref().unwrap_or_default();
        let api = self.api::<Pgtask>(namespace);

        match api.create(&PostParams::default(), task).await {
            Ok(_) => Ok(TaskCreation::Created),
            Err(e) if is_already_exists(&e) => Ok(TaskCreation::AlreadyExists),
            Err(e) => Err(ControllerError::kube(format!("create Pgtask {name}"), e)),
        }
    }

    async fn delete_task(&self, name: &str, namespace: &str) -> Result<(), ControllerError> {
        match self
            .api::<Pgtask>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(ControllerError::kube(format!("delete Pgtask {name}"), e)),
        }
    }

    async fn patch_task_parameters(
        &self,
        name: &str,
        namespace: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), ControllerError> {
        let patch = json!({ "spec": { "parameters": parameters } });
        self.api::<Pgtask>(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
            .map_err(|e| ControllerError::kube(format!("patch Pgtask {name} parameters"), e))?;
        Ok(())
    }
}
