// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the pod controller.
//!
//! Every handler failure is local to the notification being processed: the
//! dispatcher logs it, records it in metrics and moves on. Nothing here is
//! retried automatically; resync redelivery is the recovery path.
//!
//! The taxonomy mirrors how handlers react:
//! - **Not found** - lookups return `Ok(None)` instead of an error, so callers
//!   decide whether absence means "skip" or "proceed to create"
//! - **Backend** - [`ControllerError::Kube`], any API server or network failure
//! - **Malformed state** - [`ControllerError::MissingLabel`], used only where a
//!   label is strictly required to address an object

use thiserror::Error;

/// Errors surfaced by the store, action and dispatcher layers.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Kubernetes API call failed
    #[error("Kubernetes API error during {operation}: {source}")]
    Kube {
        /// Operation being performed (e.g. "get deployment")
        operation: String,
        /// Underlying client error
        #[source]
        source: kube::Error,
    },

    /// A referenced object does not exist
    #[error("{kind} '{name}' not found in namespace {namespace}")]
    NotFound {
        /// Kind of the missing object
        kind: &'static str,
        /// Name of the missing object
        name: String,
        /// Namespace that was searched
        namespace: String,
    },

    /// A pod lacks a label needed to address a related object
    #[error("pod '{pod}' has no '{label}' label")]
    MissingLabel {
        /// Pod name
        pod: String,
        /// Label key that was expected
        label: &'static str,
    },

    /// A downstream action reported a failure
    #[error("action {action} failed for cluster '{cluster}': {reason}")]
    Action {
        /// Action name (e.g. "bootstrap_backup_stanza")
        action: &'static str,
        /// Cluster the action was invoked for
        cluster: String,
        /// Failure description
        reason: String,
    },

    /// The pod subscription ended without a cancellation request
    #[error("pod subscription for namespace {namespace} closed unexpectedly")]
    SubscriptionClosed {
        /// Namespace of the subscription
        namespace: String,
    },
}

impl ControllerError {
    /// Wrap a `kube::Error` with the operation that produced it.
    #[must_use]
    pub fn kube(operation: impl Into<String>, source: kube::Error) -> Self {
        Self::Kube {
            operation: operation.into(),
            source,
        }
    }

    /// Short, stable category used as a metrics label.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Kube { source, .. } if is_transient(source) => "transient_api_error",
            Self::Kube { .. } => "api_error",
            Self::NotFound { .. } => "not_found",
            Self::MissingLabel { .. } => "malformed_state",
            Self::Action { .. } => "action_error",
            Self::SubscriptionClosed { .. } => "subscription_closed",
        }
    }
}

/// True when the API server answered 404.
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// True when the API server answered 409 (object already exists or conflict).
#[must_use]
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409)
}

/// Determine if a Kubernetes error is transient.
///
/// Rate limiting (429), server errors (5xx) and transport failures are
/// transient. Everything else is a permanent client-side failure. The
/// controller never retries either kind inline; the distinction only feeds
/// logs and metrics.
#[must_use]
pub fn is_transient(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => {
            api_err.code == 429 || (api_err.code >= 500 && api_err.code < 600)
        }
        kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
