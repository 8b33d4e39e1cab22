// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pod notifications for a single namespace.
//!
//! The raw watch stream only says "this object now looks like X". A local
//! [`PodCache`] turns that into [`PodEvent`]s carrying the previous snapshot,
//! which is what readiness edge detection needs. Events for one pod are sent
//! in the order the watch observed them.
//!
//! # Resync
//!
//! With a resync interval configured, every cached pod is re-delivered as
//! `Updated { old: s, new: s }`. Handlers are idempotent, so resync is how a
//! dropped event or failed patch eventually gets another attempt.

use crate::metrics;
use crate::pod::{PodKey, PodSnapshot};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A typed pod notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PodEvent {
    Added(PodSnapshot),
    Updated { old: PodSnapshot, new: PodSnapshot },
    Deleted(PodSnapshot),
}

impl PodEvent {
    /// Metrics label for the notification kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Updated { .. } => "updated",
            Self::Deleted(_) => "deleted",
        }
    }

    #[must_use]
    pub fn key(&self) -> PodKey {
        match self {
            Self::Added(pod) | Self::Deleted(pod) => pod.key(),
            Self::Updated { new, .. } => new.key(),
        }
    }
}

/// Last observed snapshot of every pod in the watched namespace.
#[derive(Debug, Default)]
pub struct PodCache {
    pods: BTreeMap<PodKey, PodSnapshot>,
    /// Keys seen since the current relist started
    relisted: Option<BTreeSet<PodKey>>,
}

impl PodCache {
    #[must_use]
    pub fn len(&self) -> usize {
        self.pods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    fn upsert(&mut self, pod: &Pod) -> PodEvent {
        let snapshot = PodSnapshot::from(pod);
        match self.pods.insert(snapshot.key(), snapshot.clone()) {
            Some(old) => PodEvent::Updated { old, new: snapshot },
            None => PodEvent::Added(snapshot),
        }
    }

    /// Fold one watcher event into the cache, returning the notifications it implies.
    pub fn apply(&mut self, event: watcher::Event<Pod>) -> Vec<PodEvent> {
        match event {
            watcher::Event::Apply(pod) => vec![self.upsert(&pod)],
            watcher::Event::Delete(pod) => {
                let snapshot = PodSnapshot::from(&pod);
                let last = self.pods.remove(&snapshot.key()).unwrap_or(snapshot);
                vec![PodEvent::Deleted(last)]
            }
            watcher::Event::Init => {
                self.relisted = Some(BTreeSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(pod) => {
                let event = self.upsert(&pod);
                self.relisted
                    .get_or_insert_with(BTreeSet::new)
                    .insert(event.key());
                vec![event]
            }
            watcher::Event::InitDone => {
                let seen = self.relisted.take().unwrap_or_default();
                let gone: Vec<PodKey> = self
                    .pods
                    .keys()
                    .filter(|k| !seen.contains(*k))
                    .cloned()
                    .collect();
                // Deleted while the watch was down
                gone.into_iter()
                    .filter_map(|k| self.pods.remove(&k))
                    .map(PodEvent::Deleted)
                    .collect()
            }
        }
    }

    /// One `Updated { old: s, new: s }` per cached pod.
    #[must_use]
    pub fn resync(&self) -> Vec<PodEvent> {
        self.pods
            .values()
            .map(|s| PodEvent::Updated {
                old: s.clone(),
                new: s.clone(),
            })
            .collect()
    }
}

/// A live subscription. Dropping it stops the producer.
pub struct Subscription {
    pub events: mpsc::Receiver<PodEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    #[must_use]
    pub fn new(events: mpsc::Receiver<PodEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { events, task }
    }

    /// Stop the producer task; already queued notifications stay readable.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Source of pod notifications for one namespace.
pub trait EventSource: Send + Sync {
    /// Start delivering notifications on a bounded channel of `buffer` slots.
    fn subscribe(&self, namespace: &str, resync: Option<Duration>, buffer: usize) -> Subscription;
}

/// [`EventSource`] backed by a Kubernetes pod watch.
#[derive(Clone)]
pub struct KubePodWatcher {
    client: Client,
}

impl KubePodWatcher {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl EventSource for KubePodWatcher {
    fn subscribe(&self, namespace: &str, resync: Option<Duration>, buffer: usize) -> Subscription {
        let (tx, rx) = mpsc::channel(buffer);
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let namespace = namespace.to_string();
        let task = tokio::spawn(watch_pods(api, namespace, resync, tx));
        Subscription::new(rx, Some(task))
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn watch_pods(
    api: Api<Pod>,
    namespace: String,
    resync: Option<Duration>,
    tx: mpsc::Sender<PodEvent>,
) {
    info!(namespace = %namespace, resync = ?resync, "starting pod watch");

    let stream = watcher(api, watcher::Config::default()).default_backoff();
    let mut stream = std::pin::pin!(stream);
    let mut cache = PodCache::default();
    let mut ticker = resync.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        let events = tokio::select! {
            item = stream.next() => match item {
                Some(Ok(event)) => cache.apply(event),
                Some(Err(e)) => {
                    metrics::record_watch_error(&namespace);
                    warn!(namespace = %namespace, error = %e, "pod watch error, backing off");
                    continue;
                }
                None => {
                    warn!(namespace = %namespace, "pod watch stream ended");
                    return;
                }
            },
            () = next_tick(&mut ticker) => {
                debug!(namespace = %namespace, pods = cache.len(), "resync");
                cache.resync()
            }
        };

        for event in events {
            if tx.send(event).await.is_err() {
                debug!(namespace = %namespace, "subscriber gone, stopping pod watch");
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "event_source_tests.rs"]
mod event_source_tests;
