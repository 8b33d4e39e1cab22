// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Readiness edge detection for updated database pods.
//!
//! An Updated notification drives two independent branches:
//!
//! - **Autofail** (level-triggered): while the pod is routed as its cluster's
//!   primary and the `Pgcluster` has `autofail=true`, every update reports the
//!   current readiness of the `database` container to the failover subsystem.
//! - **Workflow** (edge-triggered): when the primary's `database` container
//!   goes from not-ready to ready, pending policies are applied, the
//!   create-cluster workflow is completed and, for clusters with pgBackRest,
//!   the stanza bootstrap is requested once.
//!
//! Both branches are skipped while the pod's `service-name` label is changing,
//! since a failover may be relabeling it underneath us.

use crate::actions::stanza_task_name;
use crate::context::Context;
use crate::errors::ControllerError;
use crate::labels::{is_true, LABEL_AUTOFAIL, LABEL_BACKREST};
use crate::metrics;
use crate::pod::PodSnapshot;
use tracing::{debug, info, warn};

/// Change in `database` container readiness between two pod snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadinessTransition {
    BecameReady,
    BecameNotReady,
    StillReady,
    StillNotReady,
}

impl ReadinessTransition {
    #[must_use]
    pub fn between(old_ready: bool, new_ready: bool) -> Self {
        match (old_ready, new_ready) {
            (false, true) => Self::BecameReady,
            (true, false) => Self::BecameNotReady,
            (true, true) => Self::StillReady,
            (false, false) => Self::StillNotReady,
        }
    }

    /// Readiness after the transition.
    #[must_use]
    pub fn is_ready(self) -> bool {
        matches!(self, Self::BecameReady | Self::StillReady)
    }
}

/// What an Updated notification ended up doing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// `service-name` changed between snapshots; nothing else ran
    pub relabel_in_progress: bool,
    /// A failover check was sent
    pub failover_checked: bool,
    /// The ready edge fired the workflow branch
    pub workflow_fired: bool,
    /// The stanza bootstrap was requested
    pub stanza_requested: bool,
    /// Actions that returned an error
    pub failed_actions: Vec<&'static str>,
}

/// True when the pod is routed as its cluster's primary.
fn routed_as_primary(pod: &PodSnapshot) -> bool {
    let cluster = pod.cluster_name();
    !cluster.is_empty() && pod.service_name() == cluster
}

/// Run one action, recording its outcome. Failures are logged and reported
/// back so the remaining steps still run.
async fn run_action<F>(
    report: &mut UpdateReport,
    action: &'static str,
    pod: &PodSnapshot,
    fut: F,
) -> bool
where
    F: std::future::Future<Output = Result<(), ControllerError>>,
{
    match fut.await {
        Ok(()) => {
            metrics::record_action(action, true);
            true
        }
        Err(e) => {
            metrics::record_action(action, false);
            metrics::record_error(action, e.category());
            warn!(
                pod = %pod.name,
                namespace = %pod.namespace,
                cluster = pod.cluster_name(),
                action = action,
                error = %e,
                "action failed"
            );
            report.failed_actions.push(action);
            false
        }
    }
}

/// True when the cluster record has `autofail=true`. A missing record or a
/// failed lookup counts as autofail disabled.
async fn autofail_enabled(ctx: &Context, cluster: &str, namespace: &str) -> bool {
    match ctx.store.get_cluster(cluster, namespace).await {
        Ok(Some(record)) => record
            .metadata
            .labels
            .as_ref()
            .is_some_and(|labels| is_true(labels, LABEL_AUTOFAIL)),
        Ok(None) => {
            debug!(cluster = cluster, namespace = namespace, "no Pgcluster record, autofail off");
            false
        }
        Err(e) => {
            warn!(
                cluster = cluster,
                namespace = namespace,
                error = %e,
                "Pgcluster lookup failed, treating autofail as off"
            );
            false
        }
    }
}

/// Handle an Updated notification for a database pod.
pub async fn reconcile_updated(ctx: &Context, old: &PodSnapshot, new: &PodSnapshot) -> UpdateReport {
    let mut report = UpdateReport::default();

    if old.service_name() != new.service_name() {
        debug!(
            pod = %new.key(),
            old = old.service_name(),
            new = new.service_name(),
            "service-name changing, skipping readiness handling"
        );
        report.relabel_in_progress = true;
        return report;
    }

    let transition = ReadinessTransition::between(old.database_ready(), new.database_ready());
    if !routed_as_primary(new) {
        return report;
    }

    let cluster = new.cluster_name();
    let namespace = new.namespace.as_str();

    if autofail_enabled(ctx, cluster, namespace).await {
        debug!(cluster = cluster, ready = transition.is_ready(), "autofail check");
        let checked = run_action(
            &mut report,
            "trigger_failover_check",
            new,
            ctx.actions
                .trigger_failover_check(transition.is_ready(), cluster, namespace),
        )
        .await;
        report.failover_checked = checked;
    }

    if transition != ReadinessTransition::BecameReady {
        return report;
    }

    info!(pod = %new.key(), cluster = cluster, "primary database container became ready");
    report.workflow_fired = true;

    run_action(
        &mut report,
        "apply_policies",
        new,
        ctx.actions.apply_policies(cluster, namespace),
    )
    .await;
    run_action(
        &mut report,
        "complete_create_cluster_workflow",
        new,
        ctx.actions.complete_create_cluster_workflow(cluster, namespace),
    )
    .await;

    if !is_true(&new.labels, LABEL_BACKREST) {
        return report;
    }

    let task_name = stanza_task_name(cluster);
    match ctx.store.get_task(&task_name, namespace).await {
        Ok(None) => {
            let requested = run_action(
                &mut report,
                "bootstrap_backup_stanza",
                new,
                ctx.actions.bootstrap_backup_stanza(namespace, cluster),
            )
            .await;
            report.stanza_requested = requested;
        }
        Ok(Some(_)) => {
            debug!(cluster = cluster, task = %task_name, "stanza-create task already exists");
        }
        Err(e) => {
            metrics::record_error("get_stanza_task", e.category());
            warn!(
                pod = %new.name,
                namespace = namespace,
                task = %task_name,
                error = %e,
                "stanza task lookup failed, skipping bootstrap"
            );
        }
    }

    report
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod readiness_tests;
