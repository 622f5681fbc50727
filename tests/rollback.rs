// ABOUTME: Integration tests for operator-initiated rollback.
// ABOUTME: Covers lease discipline and the no-known-good edge case.

mod support;

use apostello::deploy::{DeployError, StateStore, manual_rollback};
use support::{MockExecutor, MockVerifier, previous_reference, test_spec};

#[tokio::test]
async fn manual_rollback_redeploys_and_verifies_known_good() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::at(dir.path());
    store
        .record_known_good("vm.test.invalid", &previous_reference())
        .unwrap();

    let executor = MockExecutor::succeeding();
    let verifier = MockVerifier::succeeding();

    let reference = manual_rollback(&executor, &verifier, &store, &test_spec(), false)
        .await
        .unwrap();

    assert_eq!(reference, previous_reference());
    assert_eq!(executor.deployed_references(), vec![previous_reference()]);
    assert_eq!(verifier.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(!dir.path().join("vm.test.invalid.lease").exists());
}

#[tokio::test]
async fn manual_rollback_without_marker_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::at(dir.path());
    let executor = MockExecutor::succeeding();
    let verifier = MockVerifier::succeeding();

    let result = manual_rollback(&executor, &verifier, &store, &test_spec(), false).await;

    assert!(matches!(result, Err(DeployError::State(_))));
    assert!(executor.deployed_references().is_empty());
}

#[tokio::test]
async fn manual_rollback_respects_a_held_lease() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::at(dir.path());
    store
        .record_known_good("vm.test.invalid", &previous_reference())
        .unwrap();
    let holder = store.acquire_lease("vm.test.invalid", false).unwrap();

    let executor = MockExecutor::succeeding();
    let verifier = MockVerifier::succeeding();

    let result = manual_rollback(&executor, &verifier, &store, &test_spec(), false).await;

    assert!(matches!(
        result,
        Err(DeployError::ConcurrentDeployment { .. })
    ));
    assert!(executor.deployed_references().is_empty());
    holder.release();
}
