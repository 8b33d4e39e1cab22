// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Decide whether a pod is a managed PostgreSQL database pod.
//!
//! Only database pods are reconciled. Everything else running in the
//! namespace (backup repositories, jobs, the operator itself, connection
//! poolers) is filtered out before any lookup or patch happens.

use crate::labels::{
    is_true, label_value, LABEL_JOB_NAME, LABEL_NAME, LABEL_PGBOUNCER, LABEL_PGO_BACKREST_REPO,
    LABEL_PGPOOL,
};
use std::collections::BTreeMap;
use std::fmt;

/// Why a pod was excluded from reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exclusion {
    /// pgBackRest repository pod
    BackrestRepo,
    /// Pod created by a Job
    Job,
    /// The operator's own pod
    Operator,
    /// pgpool connection pooler
    Pgpool,
    /// pgbouncer connection pooler
    Pgbouncer,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BackrestRepo => "pgo-backrest-repo pod",
            Self::Job => "job pod",
            Self::Operator => "operator pod",
            Self::Pgpool => "pgpool pod",
            Self::Pgbouncer => "pgbouncer pod",
        };
        f.write_str(s)
    }
}

/// Classify a pod by its labels.
///
/// # Errors
///
/// Returns the first matching [`Exclusion`] when the pod is not a managed
/// database pod.
pub fn classify(labels: &BTreeMap<String, String>, operator_name: &str) -> Result<(), Exclusion> {
    if is_true(labels, LABEL_PGO_BACKREST_REPO) {
        return Err(Exclusion::BackrestRepo);
    }
    if label_value(labels, LABEL_JOB_NAME).is_some_and(|v| !v.is_empty()) {
        return Err(Exclusion::Job);
    }
    if label_value(labels, LABEL_NAME) == Some(operator_name) {
        return Err(Exclusion::Operator);
    }
    if is_true(labels, LABEL_PGPOOL) {
        return Err(Exclusion::Pgpool);
    }
    if is_true(labels, LABEL_PGBOUNCER) {
        return Err(Exclusion::Pgbouncer);
    }
    Ok(())
}

/// True when the pod is a managed database pod eligible for reconciliation.
#[must_use]
pub fn is_managed_database_pod(labels: &BTreeMap<String, String>, operator_name: &str) -> bool {
    classify(labels, operator_name).is_ok()
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod classifier_tests;
