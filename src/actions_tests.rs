// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `actions.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::test_support::{Call, FakeStore, NAMESPACE};

    fn actions(store: &FakeStore) -> KubeActions {
        KubeActions::new(Arc::new(store.clone()))
    }

    #[test]
    fn test_stanza_task_name() {
        assert_eq!(stanza_task_name("mycluster"), "mycluster-stanza-create");
    }

    #[tokio::test]
    async fn test_failover_not_ready_creates_autofail_task() {
        let store = FakeStore::new();
        actions(&store)
            .trigger_failover_check(false, "mycluster", NAMESPACE)
            .await
            .unwrap();

        let task = store.task("mycluster-autofail").expect("autofail task created");
        assert_eq!(task.spec.task_type, "autofail");
        assert_eq!(
            task.spec.parameters.get("pg-cluster").map(String::as_str),
            Some("mycluster")
        );
        assert!(task.spec.parameters.contains_key("notReadySince"));
    }

    #[tokio::test]
    async fn test_failover_not_ready_keeps_running_countdown() {
        let store = FakeStore::new();
        let mut params = BTreeMap::new();
        params.insert("notReadySince".to_string(), "2025-01-01T00:00:00Z".to_string());
        store.add_task(Pgtask::named("mycluster-autofail", NAMESPACE, "autofail", params));

        actions(&store)
            .trigger_failover_check(false, "mycluster", NAMESPACE)
            .await
            .unwrap();

        let task = store.task("mycluster-autofail").unwrap();
        assert_eq!(
            task.spec.parameters.get("notReadySince").map(String::as_str),
            Some("2025-01-01T00:00:00Z"),
            "the original timestamp is preserved"
        );
    }

    #[tokio::test]
    async fn test_failover_ready_clears_autofail_task() {
        let store = FakeStore::new();
        store.add_task(Pgtask::named(
            "mycluster-autofail",
            NAMESPACE,
            "autofail",
            BTreeMap::new(),
        ));

        actions(&store)
            .trigger_failover_check(true, "mycluster", NAMESPACE)
            .await
            .unwrap();

        assert!(store.task("mycluster-autofail").is_none());
    }

    #[tokio::test]
    async fn test_apply_policies_labels_cluster_and_consumes_task() {
        let store = FakeStore::new();
        store.add_cluster("mycluster", false);
        let mut params = BTreeMap::new();
        params.insert("audit".to_string(), String::new());
        params.insert("pgaudit".to_string(), String::new());
        store.add_task(Pgtask::named("mycluster-policies", NAMESPACE, "policies", params));

        actions(&store)
            .apply_policies("mycluster", NAMESPACE)
            .await
            .unwrap();

        assert_eq!(
            store.cluster_label("mycluster", "audit"),
            Some("pgpolicy".to_string())
        );
        assert_eq!(
            store.cluster_label("mycluster", "pgaudit"),
            Some("pgpolicy".to_string())
        );
        assert!(store.task("mycluster-policies").is_none());
    }

    #[tokio::test]
    async fn test_apply_policies_without_cluster_keeps_task() {
        let store = FakeStore::new();
        let mut params = BTreeMap::new();
        params.insert("audit".to_string(), String::new());
        store.add_task(Pgtask::named("mycluster-policies", NAMESPACE, "policies", params));

        let err = actions(&store)
            .apply_policies("mycluster", NAMESPACE)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControllerError::Action {
                action: "apply_policies",
                ..
            }
        ));
        assert_eq!(err.category(), "action_error");
        assert!(store.task("mycluster-policies").is_some());
        assert!(!store
            .calls()
            .iter()
            .any(|c| matches!(c, Call::LabelCluster { .. } | Call::DeleteTask(_))));
    }

    #[tokio::test]
    async fn test_apply_policies_without_task_is_noop() {
        let store = FakeStore::new();
        actions(&store)
            .apply_policies("mycluster", NAMESPACE)
            .await
            .unwrap();

        assert_eq!(
            store.calls(),
            vec![Call::GetTask("mycluster-policies".to_string())]
        );
    }

    #[tokio::test]
    async fn test_complete_workflow_stamps_once() {
        let store = FakeStore::new();
        store.add_task(Pgtask::named(
            "mycluster-createcluster",
            NAMESPACE,
            "workflow",
            BTreeMap::new(),
        ));
        let actions = actions(&store);

        actions
            .complete_create_cluster_workflow("mycluster", NAMESPACE)
            .await
            .unwrap();
        let first = store.task("mycluster-createcluster").unwrap();
        assert!(first.spec.parameters.contains_key("completed"));

        actions
            .complete_create_cluster_workflow("mycluster", NAMESPACE)
            .await
            .unwrap();
        let patches = store
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::PatchTask(_)))
            .count();
        assert_eq!(patches, 1);
    }

    #[tokio::test]
    async fn test_bootstrap_stanza_created_once() {
        let store = FakeStore::new();
        let actions = actions(&store);

        actions
            .bootstrap_backup_stanza(NAMESPACE, "mycluster")
            .await
            .unwrap();
        actions
            .bootstrap_backup_stanza(NAMESPACE, "mycluster")
            .await
            .unwrap();

        let task = store.task("mycluster-stanza-create").unwrap();
        assert_eq!(task.spec.task_type, "stanza-create");
        assert_eq!(
            task.metadata.namespace.as_deref(),
            Some(NAMESPACE)
        );
        assert_eq!(
            task.spec.parameters.get("pg-cluster").map(String::as_str),
            Some("mycluster")
        );
    }
}
