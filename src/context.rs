// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the pod controller.
//!
//! The context is built once at startup and handed to the dispatcher as an
//! `Arc<Context>`. It carries every dependency a handler may touch:
//! - the [`ClusterStore`] for lookups and label patches
//! - the [`ClusterActions`] invoked on readiness edges
//! - the controller configuration (namespace, operator name, ...)
//!
//! Tests build it from in-memory fakes through [`Context::new`].

use crate::actions::{ClusterActions, KubeActions};
use crate::config::ControllerConfig;
use crate::store::{ClusterStore, KubeStore};
use kube::Client;
use std::sync::Arc;

/// Dependencies shared by every handler.
#[derive(Clone)]
pub struct Context {
    /// Lookups and label patches
    pub store: Arc<dyn ClusterStore>,

    /// Downstream orchestration actions
    pub actions: Arc<dyn ClusterActions>,

    /// Controller configuration
    pub config: ControllerConfig,
}

impl Context {
    #[must_use]
    pub fn new(
        store: Arc<dyn ClusterStore>,
        actions: Arc<dyn ClusterActions>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            actions,
            config,
        }
    }

    /// Production context: store and actions both backed by `client`.
    #[must_use]
    pub fn from_client(client: Client, config: ControllerConfig) -> Self {
        let store: Arc<dyn ClusterStore> = Arc::new(KubeStore::new(client));
        let actions = Arc::new(KubeActions::new(store.clone()));
        Self::new(store, actions, config)
    }

    /// Namespace the controller is scoped to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Value of the `name` label that identifies the operator's own pod.
    #[must_use]
    pub fn operator_name(&self) -> &str {
        &self.config.operator_name
    }
}
