// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service-routing assignment for newly added database pods.
//!
//! Every database pod carries a fixed role (`primary=true|false`) from the
//! moment it is created. The pod and its owning Deployment must both carry the
//! `service-name` label that the cluster's Services select on:
//!
//! - primary: `<cluster>`
//! - replica: `<cluster>-replica`
//!
//! Assignment is sticky. When the Deployment already carries a value (the pod
//! was restarted, or a failover promoted it) that value wins and the pod is
//! made to match it; it is never re-derived from the role.

use crate::context::Context;
use crate::errors::ControllerError;
use crate::labels::{
    label_value, LABEL_DEPLOYMENT_NAME, LABEL_PRIMARY, LABEL_SERVICE_NAME, REPLICA_SUFFIX,
    VALUE_FALSE, VALUE_TRUE,
};
use crate::metrics;
use crate::pod::PodSnapshot;
use std::fmt;
use tracing::{debug, info};

/// Role of a database pod, fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Primary,
    Replica,
}

impl Role {
    /// Parse the `primary` label. Anything but "true"/"false" is unknown.
    #[must_use]
    pub fn from_label(value: Option<&str>) -> Option<Self> {
        match value {
            Some(VALUE_TRUE) => Some(Self::Primary),
            Some(VALUE_FALSE) => Some(Self::Replica),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Replica => f.write_str("replica"),
        }
    }
}

/// A resolved `service-name` label value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceRouting(String);

impl ServiceRouting {
    /// Routing value derived from the cluster name and role.
    #[must_use]
    pub fn for_role(cluster: &str, role: Role) -> Self {
        match role {
            Role::Primary => Self(cluster.to_string()),
            Role::Replica => Self(format!("{cluster}{REPLICA_SUFFIX}")),
        }
    }

    /// Wrap a value already present on an object; empty means unassigned.
    #[must_use]
    pub fn existing(value: Option<&str>) -> Option<Self> {
        value.filter(|v| !v.is_empty()).map(|v| Self(v.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceRouting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a resolved routing value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutingSource {
    /// Reused from the owning Deployment
    Deployment,
    /// Derived from the pod's role
    Role,
}

impl RoutingSource {
    fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::Role => "role",
        }
    }
}

/// Pick the routing value for a pod.
#[must_use]
pub fn resolve_service_routing(
    cluster: &str,
    role: Role,
    deployment_value: Option<&str>,
) -> (ServiceRouting, RoutingSource) {
    match ServiceRouting::existing(deployment_value) {
        Some(existing) => (existing, RoutingSource::Deployment),
        None => (ServiceRouting::for_role(cluster, role), RoutingSource::Role),
    }
}

/// Result of handling an Added notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// Pod and Deployment now carry this value
    Assigned(ServiceRouting),
    /// The pod has no usable role label yet
    NoRole,
    /// The pod has no `pg-cluster` label, so there is nothing to route to
    NoCluster,
}

/// True when an Updated notification should go through routing again.
///
/// Covers pods whose Added handling failed: they still lack a
/// `service-name`, or the notification is a resync (`old == new`) and the
/// Deployment may still disagree with the pod. A `service-name` change
/// between `old` and `new` is someone else's relabel and is left alone.
#[must_use]
pub fn needs_routing(old: &PodSnapshot, new: &PodSnapshot) -> bool {
    if Role::from_label(new.label(LABEL_PRIMARY)).is_none()
        || new.cluster_name().is_empty()
        || new.label(LABEL_DEPLOYMENT_NAME).is_none_or(str::is_empty)
    {
        return false;
    }
    new.service_name().is_empty() || old == new
}

/// Handle an Added notification for a database pod.
///
/// # Errors
///
/// Returns an error when the pod has no `deployment-name` label, when the
/// Deployment cannot be found or fetched, or when either label patch fails.
/// The caller logs it and drops the event; the next resync starts over.
pub async fn reconcile_added(
    ctx: &Context,
    pod: &PodSnapshot,
) -> Result<AddOutcome, ControllerError> {
    let deployment_name = pod
        .label(LABEL_DEPLOYMENT_NAME)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ControllerError::MissingLabel {
            pod: pod.name.clone(),
            label: LABEL_DEPLOYMENT_NAME,
        })?;

    let deployment = ctx
        .store
        .get_deployment(deployment_name, &pod.namespace)
        .await?
        .ok_or_else(|| ControllerError::NotFound {
            kind: "Deployment",
            name: deployment_name.to_string(),
            namespace: pod.namespace.clone(),
        })?;

    let Some(role) = Role::from_label(pod.label(LABEL_PRIMARY)) else {
        debug!(pod = %pod.key(), "no primary label yet, not assigning service routing");
        return Ok(AddOutcome::NoRole);
    };

    if pod.cluster_name().is_empty() {
        debug!(pod = %pod.key(), "no pg-cluster label, not assigning service routing");
        return Ok(AddOutcome::NoCluster);
    }

    let deployment_value = deployment
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| label_value(labels, LABEL_SERVICE_NAME));

    let (routing, source) = resolve_service_routing(pod.cluster_name(), role, deployment_value);
    if source == RoutingSource::Deployment {
        debug!(
            pod = %pod.key(),
            deployment = deployment_name,
            service_name = %routing,
            "deployment already labeled, pod was restarted; reusing its service name"
        );
    }

    if pod.service_name() != routing.as_str() {
        ctx.store
            .add_pod_label(&pod.name, &pod.namespace, LABEL_SERVICE_NAME, routing.as_str())
            .await?;
    }

    if deployment_value != Some(routing.as_str()) {
        ctx.store
            .add_deployment_label(
                deployment_name,
                &pod.namespace,
                LABEL_SERVICE_NAME,
                routing.as_str(),
            )
            .await?;
    }

    metrics::record_routing_assignment(source.as_str());
    info!(
        pod = %pod.key(),
        role = %role,
        service_name = %routing,
        "service routing assigned"
    );
    Ok(AddOutcome::Assigned(routing))
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod routing_tests;
