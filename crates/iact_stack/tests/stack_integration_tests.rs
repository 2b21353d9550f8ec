//! Integration tests for complete test runs against the mock cloud.

use std::sync::Arc;
use std::time::Duration;

use mockall::mock;

use iact_cloud::{
    CloudConnector, CloudFacade, CloudResult, Credential, MockCloud, StackScript, TemplateRef,
};
use iact_config::{SpecError, TestSpecification};
use iact_stack::{CleanupPolicy, StackError, Stacker, StatusBucket, TestRun};

mock! {
    pub Connector {}

    impl CloudConnector for Connector {
        fn connect(&self, region: &str, credential: &Credential) -> CloudResult<Arc<dyn CloudFacade>>;
    }
}

fn spec(test: &str) -> TestSpecification {
    TestSpecification::new(test, "cn-hangzhou", TemplateRef::from_body("{}"))
}

/// Test that a rejected creation fails the run without affecting its sibling.
#[tokio::test(start_paused = true)]
async fn test_one_success_one_rejected_create() {
    let cloud = MockCloud::new().add_stack_script(
        StackScript::new()
            .named("broken")
            .fail_create("QuotaExceeded", "stack quota exceeded"),
    );
    let stacker = Stacker::new("demo", vec![spec("ok"), spec("broken")], Arc::new(cloud.clone()));
    let run = TestRun::new(stacker, CleanupPolicy::default());

    let err = run.run_until(std::future::pending()).await.unwrap_err();
    match &err {
        StackError::FailedStacks { count, details } => {
            assert_eq!(*count, 1);
            assert!(details.contains("stack quota exceeded"));
        }
        other => panic!("unexpected error: {}", other),
    }

    let stacks = run.stacker().stacks();
    assert!(stacks[0].launch_succeeded());
    assert_eq!(stacks[1].status(), "QuotaExceeded");
    assert_eq!(stacks[1].bucket(), StatusBucket::Failed);

    // Only the created stack is deleted.
    let deletes = cloud.get_method_calls("delete_stack");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].target.as_deref(), stacks[0].stack_id());
}

/// Test that keep_failed retains failed stacks and still fails the run.
#[tokio::test(start_paused = true)]
async fn test_keep_failed_retains_failed_stacks() {
    let cloud = MockCloud::new().add_stack_script(
        StackScript::new()
            .named("failing")
            .statuses(&["CREATE_IN_PROGRESS", "CREATE_FAILED"])
            .reason("resource ECS instance failed"),
    );
    let stacker = Stacker::new("demo", vec![spec("good"), spec("failing")], Arc::new(cloud.clone()));
    let policy = CleanupPolicy {
        keep_failed: true,
        ..CleanupPolicy::default()
    };
    let run = TestRun::new(stacker, policy);

    let err = run.run_until(std::future::pending()).await.unwrap_err();
    let stacks = run.stacker().stacks();
    assert!(err.to_string().contains(stacks[1].stack_id().unwrap()));

    let deletes = cloud.get_method_calls("delete_stack");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].target.as_deref(), stacks[0].stack_id());
    assert_eq!(stacks[0].status(), "DELETE_COMPLETE");
    assert_eq!(stacks[1].status(), "CREATE_FAILED");
}

/// Test that failed stacks deleted by cleanup no longer fail the run.
#[tokio::test(start_paused = true)]
async fn test_deleted_failures_do_not_fail_the_run() {
    let cloud = MockCloud::new().add_stack_script(
        StackScript::new()
            .named("failing")
            .statuses(&["CREATE_IN_PROGRESS", "CREATE_FAILED"]),
    );
    let stacker = Stacker::new("demo", vec![spec("failing")], Arc::new(cloud.clone()));
    let run = TestRun::new(stacker, CleanupPolicy::default());

    run.run_until(std::future::pending()).await.unwrap();
    let stack = &run.stacker().stacks()[0];
    assert_eq!(stack.status(), "DELETE_COMPLETE");
    assert!(!stack.launch_succeeded());
}

/// Test that a configuration error never reaches the cloud, not even on delete.
#[tokio::test]
async fn test_spec_error_never_connects() {
    let mut connector = MockConnector::new();
    connector.expect_connect().never();

    let stacker = Stacker::new(
        "demo",
        vec![spec("bad").with_error(SpecError::new("TemplateNotFound", "no template in ./tpl"))],
        Arc::new(connector),
    );
    let stacks = stacker.create_all().await.unwrap();
    assert_eq!(stacks[0].bucket(), StatusBucket::Failed);
    assert!(stacks[0].stack_id().is_none());

    stacker.delete_all(None).await.unwrap();
    let err = stacker.failure_error().unwrap();
    assert!(err.to_string().contains("no template in ./tpl"));
}

/// Test that an interrupt deletes every stack launched so far.
#[tokio::test(start_paused = true)]
async fn test_interrupt_cleans_up_launched_stacks() {
    let cloud = MockCloud::new()
        .add_stack_script(StackScript::new().statuses(&["CREATE_IN_PROGRESS"]));
    let stacker = Stacker::new("demo", vec![spec("a"), spec("b")], Arc::new(cloud.clone()));
    let run = TestRun::new(stacker, CleanupPolicy::default());

    let err = run
        .run_until(tokio::time::sleep(Duration::from_secs(300)))
        .await
        .unwrap_err();

    assert!(matches!(err, StackError::Interrupted));
    assert_eq!(run.stacker().launched().len(), 2);
    assert_eq!(cloud.get_method_calls("delete_stack").len(), 2);
}

/// Test the snapshot of one completed stack and one rejected creation.
#[tokio::test(start_paused = true)]
async fn test_snapshot_after_partial_creation_failure() {
    let cloud = MockCloud::new().add_stack_script(
        StackScript::new()
            .named("broken")
            .fail_create("InvalidParameter", "ZoneId is invalid"),
    );
    let stacker = Stacker::new("demo", vec![spec("ok"), spec("broken")], Arc::new(cloud));

    let stacks = stacker.create_all().await.unwrap();
    assert_eq!(stacks.len(), 2);
    assert!(stacks[0].is_refreshing());
    assert!(!stacks[1].is_refreshing());
    assert!(stacks[1].stack_id().is_none());

    tokio::time::sleep(Duration::from_secs(61)).await;
    let snapshot = stacker.status_snapshot();
    let buckets: Vec<StatusBucket> = snapshot.keys().copied().collect();
    assert_eq!(buckets, vec![StatusBucket::Complete, StatusBucket::Failed]);
    assert_eq!(snapshot[&StatusBucket::Complete].stack_id.as_deref(), stacks[0].stack_id());
    assert_eq!(snapshot[&StatusBucket::Failed].reason, "ZoneId is invalid");
    assert!(!stacks[0].is_refreshing());
}

/// Test that an undeletable stack is reported with the retained failures.
#[tokio::test(start_paused = true)]
async fn test_undeletable_stack_fails_the_run() {
    let cloud = MockCloud::new()
        .add_stack_script(
            StackScript::new()
                .named("protected")
                .fail_delete("Forbidden", "deletion protection is enabled"),
        )
        .add_stack_script(
            StackScript::new()
                .named("failing")
                .statuses(&["CREATE_IN_PROGRESS", "CREATE_FAILED"])
                .reason("resource ECS instance failed"),
        );
    let stacker = Stacker::new(
        "demo",
        vec![spec("protected"), spec("failing"), spec("good")],
        Arc::new(cloud.clone()),
    );
    let policy = CleanupPolicy {
        keep_failed: true,
        ..CleanupPolicy::default()
    };
    let run = TestRun::new(stacker, policy);

    let err = run.run_until(std::future::pending()).await.unwrap_err();
    match &err {
        StackError::FailedStacks { count, details } => {
            assert_eq!(*count, 2);
            assert!(details.contains("deletion protection is enabled"));
            assert!(details.contains("resource ECS instance failed"));
        }
        other => panic!("unexpected error: {}", other),
    }

    let stacks = run.stacker().stacks();
    assert_eq!(stacks[0].status(), "DELETE_FAILED");
    assert_eq!(stacks[0].bucket(), StatusBucket::Failed);
    assert_eq!(stacks[1].status(), "CREATE_FAILED");
    assert_eq!(stacks[2].status(), "DELETE_COMPLETE");
    assert_eq!(cloud.get_method_calls("delete_stack").len(), 2);
}
