// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label keys and values shared with the rest of the PostgreSQL operator.
//!
//! These strings are the serialization boundary with the cluster store. Inside
//! the controller roles and routing values are typed (see [`crate::routing`]);
//! they only become strings again when read from or written to object labels.

// ============================================================================
// Cluster Membership Labels
// ============================================================================

/// Name of the PostgreSQL cluster a pod or deployment belongs to
pub const LABEL_PG_CLUSTER: &str = "pg-cluster";

/// Role flag set at pod creation: "true" for the primary, "false" for a replica
pub const LABEL_PRIMARY: &str = "primary";

/// Service-routing label matched by the cluster's primary and replica Services
pub const LABEL_SERVICE_NAME: &str = "service-name";

/// Name of the Deployment that owns a database pod
pub const LABEL_DEPLOYMENT_NAME: &str = "deployment-name";

/// Generic component name label
pub const LABEL_NAME: &str = "name";

// ============================================================================
// Feature Flags
// ============================================================================

/// Set to "true" on database pods whose cluster uses pgBackRest
pub const LABEL_BACKREST: &str = "pgo-backrest";

/// Set to "true" on a `Pgcluster` with automated failover enabled
pub const LABEL_AUTOFAIL: &str = "autofail";

// ============================================================================
// Non-Database Pod Markers
// ============================================================================

/// Set to "true" on pgBackRest repository pods
pub const LABEL_PGO_BACKREST_REPO: &str = "pgo-backrest-repo";

/// Present on pods created by a Job
pub const LABEL_JOB_NAME: &str = "job-name";

/// Set to "true" on pgpool connection pooler pods
pub const LABEL_PGPOOL: &str = "crunchy-pgpool";

/// Set to "true" on pgbouncer connection pooler pods
pub const LABEL_PGBOUNCER: &str = "crunchy-pgbouncer";

// ============================================================================
// Label Values
// ============================================================================

/// Truthy label value
pub const VALUE_TRUE: &str = "true";

/// Falsy label value
pub const VALUE_FALSE: &str = "false";

/// Suffix appended to the cluster name to form the replica routing value
pub const REPLICA_SUFFIX: &str = "-replica";

/// Label value stamped on a `Pgcluster` for every applied policy
pub const VALUE_POLICY_APPLIED: &str = "pgpolicy";

/// Read a label, treating a missing label map and a missing key the same way.
#[must_use]
pub fn label_value<'a>(
    labels: &'a std::collections::BTreeMap<String, String>,
    key: &str,
) -> Option<&'a str> {
    labels.get(key).map(String::as_str)
}

/// True when the label is present and equal to "true".
#[must_use]
pub fn is_true(labels: &std::collections::BTreeMap<String, String>, key: &str) -> bool {
    label_value(labels, key) == Some(VALUE_TRUE)
}
