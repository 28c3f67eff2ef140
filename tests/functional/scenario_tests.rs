//! Reconcile scenarios against the in-memory state store.

use dragonfly_operator::controller::error::Error;
use dragonfly_operator::controller::{DuplicatePolicy, ReconcileOutcome};
use dragonfly_operator::crd::ObjectKey;
use dragonfly_operator::resources::{ChildKind, ChildResource, DragonflyResourceFactory, ResourceFactory};

use crate::fixtures::{DragonflyDbBuilder, test_resource};
use crate::mock_state::{Call, Failure, MockStateStore, reconciler};

const EXPECTED_CHILDREN: [&str; 3] = [
    r#"workload:"cache""#,
    r#"endpoint:"cache""#,
    r#"config:"cache-config""#,
];

fn key(name: &str) -> ObjectKey {
    ObjectKey::new("default", name)
}

// ============================================================================
// Creation path
// ============================================================================

#[tokio::test]
async fn test_first_reconcile_creates_children_in_order() {
    let store = MockStateStore::with(test_resource("cache"));
    let reconciler = reconciler(&store);

    let outcome = reconciler.reconcile(&key("cache")).await.unwrap();

    assert_eq!(
        outcome,
        ReconcileOutcome::Created {
            created: 3,
            adopted: 0
        }
    );
    assert_eq!(store.child_names(), EXPECTED_CHILDREN);
    assert!(store.is_created(&key("cache")));
    assert_eq!(
        store.calls(),
        vec![
            Call::Get(key("cache")),
            Call::Create(ChildKind::Workload, "cache".to_string()),
            Call::Create(ChildKind::Endpoint, "cache".to_string()),
            Call::Create(ChildKind::Config, "cache-config".to_string()),
            Call::UpdateStatus(key("cache")),
        ]
    );
}

#[tokio::test]
async fn test_second_reconcile_is_noop() {
    let store = MockStateStore::with(test_resource("cache"));
    let reconciler = reconciler(&store);

    reconciler.reconcile(&key("cache")).await.unwrap();
    store.clear_calls();

    for _ in 0..3 {
        let outcome = reconciler.reconcile(&key("cache")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::AlreadyCreated);
    }

    assert!(store.writes().is_empty());
    assert_eq!(store.calls().len(), 3);
    assert_eq!(store.children().len(), 3);
}

#[tokio::test]
async fn test_store_matches_factory_output() {
    let resource = DragonflyDbBuilder::new("sessions")
        .namespace("web")
        .config("maxmemory", "2gb")
        .arg("--cache_mode=true")
        .build();
    let expected = DragonflyResourceFactory.desired_resources(&resource).unwrap();
    let store = MockStateStore::with(resource);

    reconciler(&store)
        .reconcile(&ObjectKey::new("web", "sessions"))
        .await
        .unwrap();

    assert_eq!(store.children(), expected);
    assert!(store.is_created(&ObjectKey::new("web", "sessions")));
}

#[tokio::test]
async fn test_status_records_observed_generation() {
    let store = MockStateStore::with(DragonflyDbBuilder::new("cache").generation(7).build());

    reconciler(&store).reconcile(&key("cache")).await.unwrap();

    let status = store.status(&key("cache")).unwrap();
    assert!(status.created);
    assert_eq!(status.observed_generation, Some(7));
}

#[tokio::test]
async fn test_status_write_leaves_spec_untouched() {
    let store = MockStateStore::with(DragonflyDbBuilder::new("cache").tag("v1.20.0").build());

    reconciler(&store).reconcile(&key("cache")).await.unwrap();

    let stored = store.resource(&key("cache")).unwrap();
    assert_eq!(stored.spec.image.tag, "v1.20.0");
    assert_eq!(stored.metadata.generation, Some(1));
}

#[tokio::test]
async fn test_children_reference_parent() {
    let store = MockStateStore::with(test_resource("cache"));

    reconciler(&store).reconcile(&key("cache")).await.unwrap();

    for child in store.children() {
        let owners = match &child {
            ChildResource::Workload(sts) => sts.metadata.owner_references.clone(),
            ChildResource::Endpoint(svc) => svc.metadata.owner_references.clone(),
            ChildResource::Config(cm) => cm.metadata.owner_references.clone(),
        }
        .unwrap();
        assert_eq!(owners.len(), 1, "{child} should have one owner");
        assert_eq!(owners[0].kind, "DragonflyDb");
        assert_eq!(owners[0].uid, "uid-cache");
        assert_eq!(owners[0].controller, Some(true));
        assert_eq!(child.namespace(), Some("default"));
    }
}

#[tokio::test]
async fn test_resources_in_different_namespaces_are_independent() {
    let store = MockStateStore::new();
    store.insert(DragonflyDbBuilder::new("cache").namespace("a").build());
    store.insert(DragonflyDbBuilder::new("cache").namespace("b").build());
    let reconciler = reconciler(&store);

    reconciler.reconcile(&ObjectKey::new("a", "cache")).await.unwrap();

    assert!(store.is_created(&ObjectKey::new("a", "cache")));
    assert!(!store.is_created(&ObjectKey::new("b", "cache")));

    let outcome = reconciler.reconcile(&ObjectKey::new("b", "cache")).await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Created {
            created: 3,
            adopted: 0
        }
    );
    assert_eq!(store.children().len(), 6);
}

// ============================================================================
// Absent and settled resources
// ============================================================================

#[tokio::test]
async fn test_not_found_is_success_without_writes() {
    let store = MockStateStore::new();

    let outcome = reconciler(&store).reconcile(&key("missing")).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Absent);
    assert!(outcome.is_settled());
    assert_eq!(store.calls(), vec![Call::Get(key("missing"))]);
}

#[tokio::test]
async fn test_deleted_after_creation_is_absent() {
    let store = MockStateStore::with(test_resource("cache"));
    let reconciler = reconciler(&store);
    reconciler.reconcile(&key("cache")).await.unwrap();

    store.remove(&key("cache"));
    store.clear_calls();

    assert_eq!(
        reconciler.reconcile(&key("cache")).await.unwrap(),
        ReconcileOutcome::Absent
    );
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_already_created_resource_is_left_alone() {
    let store = MockStateStore::with(DragonflyDbBuilder::new("cache").created().build());

    let outcome = reconciler(&store).reconcile(&key("cache")).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::AlreadyCreated);
    assert!(store.children().is_empty());
    assert_eq!(store.calls(), vec![Call::Get(key("cache"))]);
}

#[tokio::test]
async fn test_spec_edit_after_creation_is_not_applied() {
    let store = MockStateStore::with(test_resource("cache"));
    let reconciler = reconciler(&store);
    reconciler.reconcile(&key("cache")).await.unwrap();
    let before = store.children();

    store.edit_spec(&key("cache"), |r| r.spec.image.tag = "v2.0.0".to_string());
    store.clear_calls();

    assert_eq!(
        reconciler.reconcile(&key("cache")).await.unwrap(),
        ReconcileOutcome::AlreadyCreated
    );
    assert!(store.writes().is_empty());
    assert_eq!(store.children(), before);
}

#[tokio::test]
async fn test_explicit_false_status_triggers_creation() {
    let store = MockStateStore::with(DragonflyDbBuilder::new("cache").status(false).build());

    let outcome = reconciler(&store).reconcile(&key("cache")).await.unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Created { created: 3, .. }));
    assert!(store.is_created(&key("cache")));
}

// ============================================================================
// Fetch failures
// ============================================================================

#[tokio::test]
async fn test_fetch_failure_is_returned_and_retryable() {
    let store = MockStateStore::with(test_resource("cache"));
    store.fail_get(Failure::Unavailable);

    let err = reconciler(&store).reconcile(&key("cache")).await.unwrap_err();

    assert!(matches!(err, Error::Fetch(_)));
    assert!(err.is_retryable());
    assert!(!err.is_not_found());
    assert_eq!(err.reason(), "FetchFailed");
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_forbidden_fetch_is_not_retryable() {
    let store = MockStateStore::with(test_resource("cache"));
    store.fail_get(Failure::Forbidden);

    let err = reconciler(&store).reconcile(&key("cache")).await.unwrap_err();

    assert!(matches!(err, Error::Fetch(_)));
    assert!(!err.is_retryable());
}

// ============================================================================
// Factory failures
// ============================================================================

#[tokio::test]
async fn test_invalid_spec_creates_nothing() {
    let store = MockStateStore::with(DragonflyDbBuilder::new("cache").port(0).build());

    let err = reconciler(&store).reconcile(&key("cache")).await.unwrap_err();

    assert!(matches!(err, Error::SpecComputation { .. }));
    assert!(!err.is_retryable());
    assert_eq!(err.reason(), "InvalidSpec");
    assert!(store.children().is_empty());
    assert!(store.writes().is_empty());
    assert!(!store.is_created(&key("cache")));
}

#[tokio::test]
async fn test_missing_uid_creates_nothing() {
    let store = MockStateStore::with(DragonflyDbBuilder::new("cache").without_uid().build());

    let err = reconciler(&store).reconcile(&key("cache")).await.unwrap_err();

    assert!(matches!(err, Error::SpecComputation { .. }));
    assert!(store.children().is_empty());
}

#[tokio::test]
async fn test_multiline_config_value_creates_nothing() {
    let store = MockStateStore::with(
        DragonflyDbBuilder::new("cache")
            .config("requirepass", "a\n--port=1")
            .build(),
    );

    let err = reconciler(&store).reconcile(&key("cache")).await.unwrap_err();

    assert!(matches!(err, Error::SpecComputation { .. }));
    assert!(store.writes().is_empty());
}

// ============================================================================
// Child creation failures
// ============================================================================

#[tokio::test]
async fn test_first_child_failure_creates_nothing() {
    let store = MockStateStore::with(test_resource("cache"));
    store.fail_create_at(0, Failure::Unavailable);

    let err = reconciler(&store).reconcile(&key("cache")).await.unwrap_err();

    match err {
        Error::ChildCreation { kind, ref name, .. } => {
            assert_eq!(kind, ChildKind::Workload);
            assert_eq!(name, "cache");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.children().is_empty());
    assert!(!store.is_created(&key("cache")));
}

#[tokio::test]
async fn test_kth_child_failure_keeps_earlier_children() {
    for k in 1..EXPECTED_CHILDREN.len() {
        let store = MockStateStore::with(test_resource("cache"));
        store.fail_create_at(k, Failure::Unavailable);

        let err = reconciler(&store).reconcile(&key("cache")).await.unwrap_err();

        assert!(matches!(err, Error::ChildCreation { .. }), "k={k}");
        assert!(err.is_retryable());
        assert_eq!(err.reason(), "CreateFailed");
        assert_eq!(store.child_names(), EXPECTED_CHILDREN[..k], "k={k}");
        assert!(!store.is_created(&key("cache")), "k={k}");
        assert!(
            !store.calls().contains(&Call::UpdateStatus(key("cache"))),
            "status must not be written when child {k} fails"
        );
    }
}

#[tokio::test]
async fn test_children_after_failure_are_not_attempted() {
    let store = MockStateStore::with(test_resource("cache"));
    store.fail_create_at(1, Failure::Forbidden);

    let err = reconciler(&store).reconcile(&key("cache")).await.unwrap_err();

    assert!(!err.is_retryable());
    let creates = store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Create(..)))
        .count();
    assert_eq!(creates, 2);
}

// ============================================================================
// Retry after partial failure
// ============================================================================

#[tokio::test]
async fn test_retry_adopts_children_from_failed_attempt() {
    let store = MockStateStore::with(test_resource("cache"));
    store.fail_create_at(2, Failure::Unavailable);
    let reconciler = reconciler(&store);

    reconciler.reconcile(&key("cache")).await.unwrap_err();
    assert_eq!(store.children().len(), 2);

    store.clear_failures();
    let outcome = reconciler.reconcile(&key("cache")).await.unwrap();

    assert_eq!(
        outcome,
        ReconcileOutcome::Created {
            created: 1,
            adopted: 2
        }
    );
    assert_eq!(store.child_names(), EXPECTED_CHILDREN);
    assert!(store.is_created(&key("cache")));
}

#[tokio::test]
async fn test_fail_policy_rejects_existing_children() {
    let store = MockStateStore::with(test_resource("cache"));
    store.fail_create_at(1, Failure::Unavailable);
    let reconciler = reconciler(&store).with_duplicate_policy(DuplicatePolicy::Fail);
    assert_eq!(reconciler.duplicate_policy(), DuplicatePolicy::Fail);

    reconciler.reconcile(&key("cache")).await.unwrap_err();
    store.clear_failures();

    let err = reconciler.reconcile(&key("cache")).await.unwrap_err();

    match &err {
        Error::ChildCreation { kind, source, .. } => {
            assert_eq!(*kind, ChildKind::Workload);
            assert!(source.is_already_exists());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_retryable());
    assert_eq!(store.children().len(), 1);
    assert!(!store.is_created(&key("cache")));
}

#[tokio::test]
async fn test_preexisting_child_is_adopted() {
    let resource = test_resource("cache");
    let desired = DragonflyResourceFactory.desired_resources(&resource).unwrap();
    let store = MockStateStore::with(resource);
    store.seed_child(desired[1].clone());

    let outcome = reconciler(&store).reconcile(&key("cache")).await.unwrap();

    assert_eq!(
        outcome,
        ReconcileOutcome::Created {
            created: 2,
            adopted: 1
        }
    );
    assert_eq!(store.children().len(), 3);
}

#[tokio::test]
async fn test_unowned_existing_child_is_not_adopted() {
    let resource = test_resource("cache");
    let mut desired = DragonflyResourceFactory.desired_resources(&resource).unwrap();
    let ChildResource::Config(cm) = &mut desired[2] else {
        panic!("third child should be the config");
    };
    cm.metadata.owner_references = None;
    cm.data = Some([("other".to_string(), "data".to_string())].into());
    let store = MockStateStore::with(resource);
    store.seed_child(desired[2].clone());

    let err = reconciler(&store).reconcile(&key("cache")).await.unwrap_err();

    match &err {
        Error::ChildCreation { kind, name, source } => {
            assert_eq!(*kind, ChildKind::Config);
            assert_eq!(name, "cache-config");
            assert!(source.is_already_exists());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(
        store
            .calls()
            .contains(&Call::OwnerLookup(ChildKind::Config, "cache-config".to_string()))
    );
    assert!(!store.is_created(&key("cache")));
}

#[tokio::test]
async fn test_child_of_previous_incarnation_is_not_adopted() {
    let previous = DragonflyDbBuilder::new("cache").build();
    let mut leftover = DragonflyResourceFactory.desired_resources(&previous).unwrap();
    let ChildResource::Workload(sts) = &mut leftover[0] else {
        panic!("first child should be the workload");
    };
    for owner in sts.metadata.owner_references.iter_mut().flatten() {
        owner.uid = "uid-deleted".to_string();
    }
    let store = MockStateStore::with(previous);
    store.seed_child(leftover[0].clone());

    let err = reconciler(&store).reconcile(&key("cache")).await.unwrap_err();

    assert!(matches!(
        err,
        Error::ChildCreation {
            kind: ChildKind::Workload,
            ..
        }
    ));
    assert_eq!(store.children().len(), 1);
    assert!(!store.is_created(&key("cache")));
}

// ============================================================================
// Status write failures
// ============================================================================

#[tokio::test]
async fn test_status_conflict_keeps_children_and_retries() {
    let store = MockStateStore::with(test_resource("cache"));
    store.fail_status(Failure::Conflict);
    let reconciler = reconciler(&store);

    let err = reconciler.reconcile(&key("cache")).await.unwrap_err();

    assert!(matches!(err, Error::StatusWrite { .. }));
    assert!(err.is_retryable());
    assert!(!err.is_not_found());
    assert_eq!(err.reason(), "StatusUpdateFailed");
    assert_eq!(store.children().len(), 3);
    assert!(!store.is_created(&key("cache")));

    store.clear_failures();
    let outcome = reconciler.reconcile(&key("cache")).await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Created {
            created: 0,
            adopted: 3
        }
    );
    assert!(store.is_created(&key("cache")));
}

#[tokio::test]
async fn test_status_write_server_error_is_retryable() {
    let store = MockStateStore::with(test_resource("cache"));
    store.fail_status(Failure::Unavailable);

    let err = reconciler(&store).reconcile(&key("cache")).await.unwrap_err();

    assert!(matches!(err, Error::StatusWrite { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_fetched_copy_carries_resource_version_into_status_write() {
    let store = MockStateStore::with(test_resource("cache"));
    let before = store.resource(&key("cache")).unwrap().metadata.resource_version;

    reconciler(&store).reconcile(&key("cache")).await.unwrap();

    let after = store.resource(&key("cache")).unwrap().metadata.resource_version;
    assert_ne!(before, after);
}
