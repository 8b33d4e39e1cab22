// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation dispatcher.
//!
//! The dispatcher owns the pod subscription and routes each notification:
//!
//! - `Added` → [`reconcile_added`]
//! - `Updated` → [`reconcile_added`] again when [`needs_routing`] says so,
//!   then [`reconcile_updated`]
//! - `Deleted` → logged only
//!
//! Notifications are sharded onto `workers` lanes by a stable hash of the
//! pod's `namespace/name`. Each lane handles its queue sequentially, so
//! notifications for one pod are handled in delivery order and never
//! concurrently. Pods on different lanes proceed independently.
//!
//! Handler failures are logged and counted, then dropped. Nothing is retried
//! here; the next resync redelivers the pod.

use crate::classifier::classify;
use crate::context::Context;
use crate::errors::ControllerError;
use crate::event_source::{EventSource, PodEvent};
use crate::metrics;
use crate::pod::{PodKey, PodSnapshot};
use crate::readiness::reconcile_updated;
use crate::routing::{needs_routing, reconcile_added, AddOutcome};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Why the dispatcher stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A process signal (e.g. `SIGTERM`)
    Signal(&'static str),
    /// Shutdown requested by the embedding code
    Requested(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "received {name}"),
            Self::Requested(reason) => write!(f, "shutdown requested: {reason}"),
        }
    }
}

/// Lane index for a pod.
#[must_use]
pub fn lane_for(key: &PodKey, lanes: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    // Truncation is fine, only the low bits pick the lane
    #[allow(clippy::cast_possible_truncation)]
    let hash = hasher.finish() as usize;
    hash % lanes.max(1)
}

/// Routes pod notifications to the routing and readiness handlers.
pub struct Dispatcher<S> {
    ctx: Arc<Context>,
    source: S,
}

struct Lane {
    tx: mpsc::Sender<PodEvent>,
    handle: JoinHandle<()>,
}

impl<S: EventSource> Dispatcher<S> {
    #[must_use]
    pub fn new(ctx: Arc<Context>, source: S) -> Self {
        Self { ctx, source }
    }

    /// Run until `shutdown` resolves, returning its reason.
    ///
    /// On shutdown the subscription is stopped and queued notifications are
    /// dropped. Handlers already running finish in the background; `run`
    /// returns without waiting for them.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::SubscriptionClosed`] if the subscription
    /// ends before shutdown was requested. Queued notifications are handled
    /// before it returns.
    pub async fn run<F>(&self, shutdown: F) -> Result<ShutdownReason, ControllerError>
    where
        F: Future<Output = ShutdownReason>,
    {
        let config = &self.ctx.config;
        let namespace = self.ctx.namespace().to_string();
        let workers = config.workers.max(1);
        info!(
            namespace = %namespace,
            workers = workers,
            resync = ?config.resync_interval(),
            "starting pod dispatcher"
        );

        let mut subscription =
            self.source
                .subscribe(&namespace, config.resync_interval(), config.event_buffer);
        let (stop_tx, stop_rx) = watch::channel(false);
        let lanes: Vec<Lane> = (0..workers)
            .map(|_| spawn_lane(self.ctx.clone(), config.event_buffer, stop_rx.clone()))
            .collect();

        tokio::pin!(shutdown);
        let result = loop {
            tokio::select! {
                biased;
                reason = &mut shutdown => break Ok(reason),
                event = subscription.events.recv() => {
                    let Some(event) = event else {
                        break Err(ControllerError::SubscriptionClosed {
                            namespace: namespace.clone(),
                        });
                    };
                    let lane = &lanes[lane_for(&event.key(), lanes.len())];
                    // A full lane must not hold up shutdown
                    tokio::select! {
                        biased;
                        reason = &mut shutdown => break Ok(reason),
                        sent = lane.tx.send(event) => if sent.is_err() {
                            warn!(namespace = %namespace, "dispatcher lane stopped, dropping notification");
                        },
                    }
                }
            }
        };

        subscription.cancel();
        let handles: Vec<JoinHandle<()>> = lanes.into_iter().map(|lane| lane.handle).collect();
        if result.is_ok() {
            // Lanes drop their queues and exit once the running handler returns.
            // That handler may be stuck on the API server, so it is not awaited.
            let _ = stop_tx.send(true);
            debug!(namespace = %namespace, lanes = handles.len(), "detaching dispatcher lanes");
        } else {
            // Senders are gone; lanes drain what is queued and exit
            for handle in handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "dispatcher lane panicked");
                }
            }
        }

        match &result {
            Ok(reason) => info!(namespace = %namespace, reason = %reason, "pod dispatcher stopped"),
            Err(e) => error!(namespace = %namespace, error = %e, "pod dispatcher stopped"),
        }
        result
    }
}

fn spawn_lane(ctx: Arc<Context>, buffer: usize, mut stop: watch::Receiver<bool>) -> Lane {
    let (tx, mut rx) = mpsc::channel::<PodEvent>(buffer);
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                event = rx.recv() => match event {
                    Some(event) => {
                        handle_event(&ctx, event).await;
                    }
                    None => break,
                },
            }
        }
    });
    Lane { tx, handle }
}

/// How a notification was disposed of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    /// Not a managed database pod
    Filtered,
    /// At least one step failed and was logged
    Error,
}

impl Outcome {
    /// Metrics label value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Handled => "handled",
            Self::Filtered => "filtered",
            Self::Error => "error",
        }
    }
}

/// Handle one notification end to end.
pub async fn handle_event(ctx: &Context, event: PodEvent) -> Outcome {
    let kind = event.kind();
    let started = Instant::now();
    let outcome = match event {
        PodEvent::Added(pod) => handle_added(ctx, &pod).await,
        PodEvent::Updated { old, new } => handle_updated(ctx, &old, &new).await,
        PodEvent::Deleted(pod) => {
            debug!(pod = %pod.name, namespace = %pod.namespace, "pod deleted");
            Outcome::Handled
        }
    };
    metrics::record_notification(kind, outcome.as_str(), started.elapsed());
    outcome
}

fn is_filtered(ctx: &Context, pod: &PodSnapshot) -> bool {
    match classify(&pod.labels, ctx.operator_name()) {
        Ok(()) => false,
        Err(exclusion) => {
            debug!(pod = %pod.name, namespace = %pod.namespace, reason = %exclusion, "skipping pod");
            true
        }
    }
}

async fn handle_added(ctx: &Context, pod: &PodSnapshot) -> Outcome {
    if is_filtered(ctx, pod) {
        return Outcome::Filtered;
    }
    assign_routing(ctx, pod).await
}

async fn assign_routing(ctx: &Context, pod: &PodSnapshot) -> Outcome {
    match reconcile_added(ctx, pod).await {
        Ok(AddOutcome::Assigned(_) | AddOutcome::NoRole | AddOutcome::NoCluster) => {
            Outcome::Handled
        }
        Err(e) => {
            metrics::record_error("reconcile_added", e.category());
            error!(
                pod = %pod.name,
                namespace = %pod.namespace,
                operation = "reconcile_added",
                error = %e,
                "failed to assign service routing"
            );
            Outcome::Error
        }
    }
}

async fn handle_updated(ctx: &Context, old: &PodSnapshot, new: &PodSnapshot) -> Outcome {
    if is_filtered(ctx, new) {
        return Outcome::Filtered;
    }
    // Resync is the retry path for a failed Added
    let routing = if needs_routing(old, new) {
        assign_routing(ctx, new).await
    } else {
        Outcome::Handled
    };

    let report = reconcile_updated(ctx, old, new).await;
    if report.failed_actions.is_empty() {
        routing
    } else {
        error!(
            pod = %new.name,
            namespace = %new.namespace,
            operation = "reconcile_updated",
            failed = ?report.failed_actions,
            "readiness handling had failed actions"
        );
        Outcome::Error
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod dispatcher_tests;
