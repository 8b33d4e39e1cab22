// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory fakes of the store and action layers for unit tests.

use crate::actions::{stanza_task_name, ClusterActions};
use crate::config::ControllerConfig;
use crate::context::Context;
use crate::crd::{Pgcluster, PgclusterSpec, Pgtask};
use crate::errors::ControllerError;
use crate::store::{ClusterStore, TaskCreation};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "pgo";

/// Every store or action call, in invocation order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    GetDeployment(String),
    GetCluster(String),
    GetTask(String),
    LabelPod { pod: String, key: String, value: String },
    LabelDeployment { deployment: String, key: String, value: String },
    LabelCluster { cluster: String, key: String, value: String },
    CreateTask(String),
    DeleteTask(String),
    PatchTask(String),
    FailoverCheck { ready: bool, cluster: String },
    ApplyPolicies(String),
    CompleteWorkflow(String),
    BootstrapStanza(String),
}

fn backend_error(operation: &str) -> ControllerError {
    ControllerError::kube(
        operation,
        kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: "injected failure".to_string(),
            reason: "InternalError".to_string(),
            code: 500,
            metadata: None,
            details: None,
        })),
    )
}

#[derive(Default)]
struct StoreState {
    deployments: HashMap<String, Deployment>,
    clusters: HashMap<String, Pgcluster>,
    tasks: HashMap<String, Pgtask>,
    pod_labels: HashMap<String, BTreeMap<String, String>>,
    fail_pod_label: bool,
    fail_deployment_label: bool,
    fail_task_lookup: bool,
    stall_deployment_lookup: bool,
}

/// Fake [`ClusterStore`]; mutations are applied so later reads observe them.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<StoreState>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calls(calls: Arc<Mutex<Vec<Call>>>) -> Self {
        Self {
            state: Arc::default(),
            calls,
        }
    }

    pub fn add_deployment(&self, name: &str, service_name: Option<&str>) {
        let mut labels = BTreeMap::new();
        if let Some(value) = service_name {
            labels.insert("service-name".to_string(), value.to_string());
        }
        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(NAMESPACE.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        };
        self.state
            .lock()
            .unwrap()
            .deployments
            .insert(name.to_string(), deployment);
    }

    pub fn add_cluster(&self, name: &str, autofail: bool) {
        let mut cluster = Pgcluster::new(
            name,
            PgclusterSpec {
                name: name.to_string(),
                clustername: name.to_string(),
                ..Default::default()
            },
        );
        let mut labels = BTreeMap::new();
        labels.insert("autofail".to_string(), autofail.to_string());
        cluster.metadata.labels = Some(labels);
        self.state
            .lock()
            .unwrap()
            .clusters
            .insert(name.to_string(), cluster);
    }

    pub fn add_task(&self, task: Pgtask) {
        let name = task.metadata.name.clone().unwrap_or_default();
        self.state.lock().unwrap().tasks.insert(name, task);
    }

    pub fn fail_pod_label(&self) {
        self.state.lock().unwrap().fail_pod_label = true;
    }

    pub fn fail_deployment_label(&self) {
        self.state.lock().unwrap().fail_deployment_label = true;
    }

    /// Deployment lookups never complete, like a hung API server.
    pub fn stall_deployment_lookup(&self) {
        self.state.lock().unwrap().stall_deployment_lookup = true;
    }

    pub fn fail_task_lookup(&self) {
        self.state.lock().unwrap().fail_task_lookup = true;
    }

    pub fn task(&self, name: &str) -> Option<Pgtask> {
        self.state.lock().unwrap().tasks.get(name).cloned()
    }

    pub fn deployment_label(&self, name: &str, key: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .deployments
            .get(name)
            .and_then(|d| d.metadata.labels.as_ref())
            .and_then(|l| l.get(key).cloned())
    }

    pub fn cluster_label(&self, name: &str, key: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .clusters
            .get(name)
            .and_then(|c| c.metadata.labels.as_ref())
            .and_then(|l| l.get(key).cloned())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ClusterStore for FakeStore {
    async fn get_deployment(
        &self,
        name: &str,
        _namespace: &str,
    ) -> Result<Option<Deployment>, ControllerError> {
        self.record(Call::GetDeployment(name.to_string()));
        let stalled = self.state.lock().unwrap().stall_deployment_lookup;
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(self.state.lock().unwrap().deployments.get(name).cloned())
    }

    async fn get_cluster(
        &self,
        name: &str,
        _namespace: &str,
    ) -> Result<Option<Pgcluster>, ControllerError> {
        self.record(Call::GetCluster(name.to_string()));
        Ok(self.state.lock().unwrap().clusters.get(name).cloned())
    }

    async fn get_task(
        &self,
        name: &str,
        _namespace: &str,
    ) -> Result<Option<Pgtask>, ControllerError> {
        self.record(Call::GetTask(name.to_string()));
        let state = self.state.lock().unwrap();
        if state.fail_task_lookup {
            return Err(backend_error("get Pgtask"));
        }
        Ok(state.tasks.get(name).cloned())
    }

    async fn add_pod_label(
        &self,
        pod: &str,
        _namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ControllerError> {
        self.record(Call::LabelPod {
            pod: pod.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if state.fail_pod_label {
            return Err(backend_error("label Pod"));
        }
        state
            .pod_labels
            .entry(pod.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn add_deployment_label(
        &self,
        deployment: &str,
        _namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ControllerError> {
        self.record(Call::LabelDeployment {
            deployment: deployment.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if state.fail_deployment_label {
            return Err(backend_error("label Deployment"));
        }
        if let Some(dep) = state.deployments.get_mut(deployment) {
            dep.metadata
                .labels
                .get_or_insert_with(BTreeMap::new)
                .insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn add_cluster_label(
        &self,
        cluster: &str,
        _namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ControllerError> {
        self.record(Call::LabelCluster {
            cluster: cluster.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.clusters.get_mut(cluster) {
            c.metadata
                .labels
                .get_or_insert_with(BTreeMap::new)
                .insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn create_task_if_absent(&self, task: &Pgtask) -> Result<TaskCreation, ControllerError> {
        let name = task.metadata.name.clone().unwrap_or_default();
        self.record(Call::CreateTask(name.clone()));
        let mut state = self.state.lock().unwrap();
        if state.tasks.contains_key(&name) {
            return Ok(TaskCreation::AlreadyExists);
        }
        state.tasks.insert(name, task.clone());
        Ok(TaskCreation::Created)
    }

    async fn delete_task(&self, name: &str, _namespace: &str) -> Result<(), ControllerError> {
        self.record(Call::DeleteTask(name.to_string()));
        self.state.lock().unwrap().tasks.remove(name);
        Ok(())
    }

    async fn patch_task_parameters(
        &self,
        name: &str,
        _namespace: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), ControllerError> {
        self.record(Call::PatchTask(name.to_string()));
        if let Some(task) = self.state.lock().unwrap().tasks.get_mut(name) {
            task.spec.parameters.extend(parameters.clone());
        }
        Ok(())
    }
}

/// Fake [`ClusterActions`] that records calls. A stanza bootstrap also
/// creates the task in the paired store, like the real implementation.
/// Actions named in `failing` record the call and then fail.
#[derive(Clone)]
pub struct RecordingActions {
    store: FakeStore,
    calls: Arc<Mutex<Vec<Call>>>,
    failing: Arc<Mutex<HashSet<&'static str>>>,
}

impl RecordingActions {
    pub fn new(store: FakeStore, calls: Arc<Mutex<Vec<Call>>>) -> Self {
        Self {
            store,
            calls,
            failing: Arc::default(),
        }
    }

    pub fn fail(&self, action: &'static str) {
        self.failing.lock().unwrap().insert(action);
    }

    fn record(
        &self,
        call: Call,
        action: &'static str,
        cluster: &str,
    ) -> Result<(), ControllerError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(action) {
            return Err(ControllerError::Action {
                action,
                cluster: cluster.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterActions for RecordingActions {
    async fn trigger_failover_check(
        &self,
        ready: bool,
        cluster: &str,
        _namespace: &str,
    ) -> Result<(), ControllerError> {
        self.record(
            Call::FailoverCheck {
                ready,
                cluster: cluster.to_string(),
            },
            "trigger_failover_check",
            cluster,
        )
    }

    async fn apply_policies(&self, cluster: &str, _namespace: &str) -> Result<(), ControllerError> {
        self.record(Call::ApplyPolicies(cluster.to_string()), "apply_policies", cluster)
    }

    async fn complete_create_cluster_workflow(
        &self,
        cluster: &str,
        _namespace: &str,
    ) -> Result<(), ControllerError> {
        self.record(
            Call::CompleteWorkflow(cluster.to_string()),
            "complete_create_cluster_workflow",
            cluster,
        )
    }

    async fn bootstrap_backup_stanza(
        &self,
        namespace: &str,
        cluster: &str,
    ) -> Result<(), ControllerError> {
        self.record(
            Call::BootstrapStanza(cluster.to_string()),
            "bootstrap_backup_stanza",
            cluster,
        )?;
        let task = Pgtask::named(
            &stanza_task_name(cluster),
            namespace,
            "stanza-create",
            BTreeMap::new(),
        );
        self.store.add_task(task);
        Ok(())
    }
}

/// A context wired to fakes sharing one call log.
pub struct Harness {
    pub ctx: Context,
    pub store: FakeStore,
    actions: RecordingActions,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Harness {
    pub fn new() -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let store = FakeStore::with_calls(calls.clone());
        let actions = RecordingActions::new(store.clone(), calls.clone());
        let ctx = Context::new(
            Arc::new(store.clone()),
            Arc::new(actions.clone()),
            ControllerConfig::for_namespace(NAMESPACE),
        );
        Self {
            ctx,
            store,
            actions,
            calls,
        }
    }

    /// Make the named [`ClusterActions`] method fail from now on.
    pub fn fail_action(&self, action: &'static str) {
        self.actions.fail(action);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }
}
