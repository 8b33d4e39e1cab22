// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Runtime configuration for the pod controller.
//!
//! Every option can be given as a command-line flag or through the
//! environment, which is how the operator Deployment passes it in.
//!
//! | Flag | Environment | Default |
//! |------|-------------|---------|
//! | `--namespace` | `NAMESPACE` | required |
//! | `--resync-interval-secs` | `RESYNC_INTERVAL_SECS` | `0` (disabled) |
//! | `--operator-name` | `OPERATOR_NAME` | `postgres-operator` |
//! | `--workers` | `CONTROLLER_WORKERS` | `1` |
//! | `--event-buffer` | `EVENT_BUFFER` | `256` |
//! | `--metrics-port` | `METRICS_PORT` | `8080` |

use crate::constants::{
    DEFAULT_EVENT_BUFFER, DEFAULT_OPERATOR_NAME, DEFAULT_RESYNC_INTERVAL_SECS, DEFAULT_WORKERS,
    METRICS_SERVER_PORT,
};
use clap::Parser;
use std::time::Duration;
use thiserror::Error;

/// Controller configuration.
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[command(
    name = "pgo-controller",
    about = "Pod-event reconciliation controller for clustered PostgreSQL"
)]
pub struct ControllerConfig {
    /// Namespace whose pods are watched
    #[arg(long, env = "NAMESPACE")]
    pub namespace: String,

    /// Seconds between resync redeliveries of every cached pod (0 disables)
    #[arg(long, env = "RESYNC_INTERVAL_SECS", default_value_t = DEFAULT_RESYNC_INTERVAL_SECS)]
    pub resync_interval_secs: u64,

    /// Value of the `name` label carried by the operator's own pod
    #[arg(long, env = "OPERATOR_NAME", default_value = DEFAULT_OPERATOR_NAME)]
    pub operator_name: String,

    /// Number of dispatcher lanes; notifications for one pod always share a lane
    #[arg(long, env = "CONTROLLER_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Capacity of the notification channel between watcher and dispatcher
    #[arg(long, env = "EVENT_BUFFER", default_value_t = DEFAULT_EVENT_BUFFER)]
    pub event_buffer: usize,

    /// Port of the metrics and health HTTP server
    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,
}

/// Configuration rejected at startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("namespace must not be empty")]
    EmptyNamespace,

    #[error("operator name must not be empty")]
    EmptyOperatorName,

    #[error("workers must be at least 1")]
    ZeroWorkers,

    #[error("event buffer must be at least 1")]
    ZeroEventBuffer,
}

impl ControllerConfig {
    /// Configuration for `namespace` with every other option at its default.
    #[must_use]
    pub fn for_namespace(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            operator_name: DEFAULT_OPERATOR_NAME.to_string(),
            workers: DEFAULT_WORKERS,
            event_buffer: DEFAULT_EVENT_BUFFER,
            metrics_port: METRICS_SERVER_PORT,
        }
    }

    /// Resync interval, `None` when resync is disabled.
    #[must_use]
    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_secs > 0).then(|| Duration::from_secs(self.resync_interval_secs))
    }

    /// Check the values clap cannot express as types.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        if self.operator_name.trim().is_empty() {
            return Err(ConfigError::EmptyOperatorName);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::ZeroEventBuffer);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
