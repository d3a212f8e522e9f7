//! Unit tests for the delete path

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use cluster_store::{StoreError, StoreOp};
    use crds::SparkNotebook;
    use std::collections::BTreeSet;

    /// Removes a notebook from the store and returns its last state
    fn delete(store: &cluster_store::MockClusterStore, name: &str) -> SparkNotebook {
        store
            .remove_notebook(TEST_NAMESPACE, name)
            .unwrap_or_else(|| panic!("SparkNotebook {name} missing from store"))
    }

    #[tokio::test]
    async fn test_delete_removes_artifact() {
        let store = create_test_store(1000, 8100);
        store.add_notebook(create_test_notebook("a", None));
        let reconciler = create_test_reconciler(&store);
        reconciler.reconcile_create(&key("a")).await.unwrap();
        assert!(store.config_map(TEST_NAMESPACE, "a-nexus-config").is_some());

        let deleted = delete(&store, "a");
        reconciler.reconcile_delete(&key("a"), &deleted).await.unwrap();

        assert!(store.config_map(TEST_NAMESPACE, "a-nexus-config").is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_artifact_is_benign() {
        let store = create_test_store(1000, 8100);
        store.add_notebook(create_test_initialized_notebook("a", 0, 8100));
        let reconciler = create_test_reconciler(&store);

        let deleted = delete(&store, "a");
        reconciler.reconcile_delete(&key("a"), &deleted).await.unwrap();

        assert_eq!(store.call_count(StoreOp::DeleteConfigMap), 1);
    }

    #[tokio::test]
    async fn test_delete_artifact_failure_is_retried() {
        let store = create_test_store(1000, 8100);
        store.add_notebook(create_test_initialized_notebook("a", 0, 8100));
        store.fail_next(
            StoreOp::DeleteConfigMap,
            StoreError::Api {
                code: 500,
                message: "internal error".to_string(),
            },
        );
        let reconciler = create_test_reconciler(&store);

        let deleted = delete(&store, "a");
        let err = reconciler.reconcile_delete(&key("a"), &deleted).await.unwrap_err();

        assert!(!err.is_permanent());
        assert_eq!(store.call_count(StoreOp::ListNotebooks), 0);
    }

    #[tokio::test]
    async fn test_delete_backfills_pending_notebook() {
        let store = create_test_store(3, 8100);
        for (name, id) in [("a", 0), ("b", 1), ("c", 2), ("d", 3)] {
            store.add_notebook(create_test_initialized_notebook(name, id, 8100));
        }
        store.add_notebook(create_test_notebook("e", None));
        let reconciler = create_test_reconciler(&store);
        // e could not be placed while the pool was full
        assert!(reconciler.reconcile_create(&key("e")).await.is_err());

        let deleted = delete(&store, "b");
        reconciler.reconcile_delete(&key("b"), &deleted).await.unwrap();

        let nb = stored(&store, "e");
        assert!(nb.is_initialized());
        assert_eq!(nb.assigned_id(), Some(1));
        assert_eq!(nb.ports(), Some([8103, 8104, 8105]));
        assert!(nb.status_error().is_none());
        assert!(store.config_map(TEST_NAMESPACE, "e-nexus-config").is_some());
    }

    #[tokio::test]
    async fn test_delete_backfills_in_listing_order() {
        let store = create_test_store(1, 8100);
        store.add_notebook(create_test_initialized_notebook("a", 0, 8100));
        store.add_notebook(create_test_initialized_notebook("b", 1, 8100));
        store.add_notebook(create_test_notebook("x", None));
        store.add_notebook(create_test_notebook("y", None));
        let reconciler = create_test_reconciler(&store);

        let deleted = delete(&store, "a");
        reconciler.reconcile_delete(&key("a"), &deleted).await.unwrap();

        // one slot for two pending notebooks: the first listed wins
        assert_eq!(stored(&store, "x").assigned_id(), Some(0));
        assert_eq!(stored(&store, "y").assigned_id(), None);
        assert!(!stored(&store, "y").is_initialized());
    }

    #[tokio::test]
    async fn test_delete_backfill_assigns_distinct_ids() {
        let store = create_test_store(1000, 8100);
        store.add_notebook(create_test_initialized_notebook("a", 0, 8100));
        store.add_notebook(create_test_initialized_notebook("b", 2, 8100));
        for name in ["p", "q", "r"] {
            store.add_notebook(create_test_notebook(name, None));
        }
        let reconciler = create_test_reconciler(&store);

        let deleted = delete(&store, "a");
        reconciler.reconcile_delete(&key("a"), &deleted).await.unwrap();

        let ids: Vec<Option<u32>> = ["p", "q", "r"]
            .iter()
            .map(|name| stored(&store, name).assigned_id())
            .collect();
        assert_eq!(ids, vec![Some(0), Some(1), Some(3)]);
    }

    #[tokio::test]
    async fn test_delete_backfill_continues_after_failure() {
        let store = create_test_store(1000, 8100);
        store.add_notebook(create_test_initialized_notebook("a", 0, 8100));
        store.add_notebook(create_test_notebook("p", None));
        store.add_notebook(create_test_notebook("q", None));
        store.fail_next(
            StoreOp::PatchNotebook,
            StoreError::Api {
                code: 500,
                message: "internal error".to_string(),
            },
        );
        let reconciler = create_test_reconciler(&store);

        let deleted = delete(&store, "a");
        reconciler.reconcile_delete(&key("a"), &deleted).await.unwrap();

        assert!(!stored(&store, "p").is_initialized());
        let q = stored(&store, "q");
        assert!(q.is_initialized());
        // the ID claimed for p stays out of this sweep
        assert_eq!(q.assigned_id(), Some(1));
    }

    #[tokio::test]
    async fn test_backfill_with_lost_status_is_finished_by_create() {
        let store = create_test_store(0, 8100);
        store.add_notebook(create_test_initialized_notebook("a", 0, 8100));
        store.add_notebook(create_test_notebook("p", None));
        let reconciler = create_test_reconciler(&store);
        assert!(reconciler.reconcile_create(&key("p")).await.is_err());
        store.fail_next(
            StoreOp::PatchNotebookStatus,
            StoreError::Api {
                code: 500,
                message: "internal error".to_string(),
            },
        );

        let deleted = delete(&store, "a");
        reconciler.reconcile_delete(&key("a"), &deleted).await.unwrap();

        let p = stored(&store, "p");
        assert_eq!(p.assigned_id(), Some(0));
        assert!(!p.is_initialized());
        assert!(p.status_error().is_some());

        // the watcher queues a create for an ID without status
        reconciler.reconcile_create(&key("p")).await.unwrap();

        let p = stored(&store, "p");
        assert!(p.is_initialized());
        assert_eq!(p.assigned_id(), Some(0));
        assert_eq!(p.ports(), Some([8100, 8101, 8102]));
        assert!(p.status_error().is_none());
        assert!(store.config_map(TEST_NAMESPACE, "p-nexus-config").is_some());
    }

    #[tokio::test]
    async fn test_delete_without_id_skips_backfill() {
        let store = create_test_store(1000, 8100);
        store.add_notebook(create_test_notebook("a", None));
        store.add_notebook(create_test_notebook("p", None));
        let reconciler = create_test_reconciler(&store);

        let deleted = delete(&store, "a");
        reconciler.reconcile_delete(&key("a"), &deleted).await.unwrap();

        assert_eq!(store.call_count(StoreOp::ListNotebooks), 0);
        assert!(!stored(&store, "p").is_initialized());
    }

    #[tokio::test]
    async fn test_delete_with_stale_listing_frees_id() {
        let store = create_test_store(0, 8100);
        store.add_notebook(create_test_initialized_notebook("a", 0, 8100));
        store.add_notebook(create_test_notebook("p", None));
        let reconciler = create_test_reconciler(&store);

        // the delete event arrives before the listing stops showing a
        let deleted = stored(&store, "a");
        reconciler.reconcile_delete(&key("a"), &deleted).await.unwrap();

        assert_eq!(stored(&store, "p").assigned_id(), Some(0));
    }

    #[tokio::test]
    async fn test_delete_with_no_pending_notebooks() {
        let store = create_test_store(1000, 8100);
        store.add_notebook(create_test_notebook("a", None));
        store.add_notebook(create_test_notebook("b", None));
        let reconciler = create_test_reconciler(&store);
        reconciler.reconcile_create(&key("a")).await.unwrap();
        reconciler.reconcile_create(&key("b")).await.unwrap();
        store.clear_calls();

        let deleted = delete(&store, "a");
        reconciler.reconcile_delete(&key("a"), &deleted).await.unwrap();

        assert_eq!(store.call_count(StoreOp::PatchNotebook), 0);
        let ids: BTreeSet<u32> = store.notebooks().iter().filter_map(SparkNotebook::assigned_id).collect();
        assert_eq!(ids, BTreeSet::from([1]));
        assert!(store.config_map(TEST_NAMESPACE, "a-nexus-config").is_none());
        assert!(store.config_map(TEST_NAMESPACE, "b-nexus-config").is_some());
    }
}
