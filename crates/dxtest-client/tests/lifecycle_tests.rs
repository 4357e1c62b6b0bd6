use dxtest_client::error::{LifecycleError, RunError};
use dxtest_client::events::{LifecycleEvent, LifecycleState};
use dxtest_client::{LaunchSettings, LifecycleManager, TestRequest};
use dxtest_core::model::{RunStamp, TerminalStatus};
use dxtest_test_utils::{artifact_tarball, Call, Failure, FixtureTree, Operation, StubGateway};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::time::Duration;

const STAMP: &str = "20240101120000";

fn settings(output_dir: &std::path::Path) -> LaunchSettings {
    LaunchSettings {
        instance_type: "mem1_ssd1_v2_x4".to_string(),
        poll_interval: Duration::ZERO,
        output_dir: output_dir.to_path_buf(),
    }
}

fn request(fixture: &FixtureTree) -> TestRequest {
    TestRequest {
        script: fixture.script.clone(),
        files: fixture.files_dir.clone(),
        src_dir: fixture.src_dir.clone(),
        manifest: None,
        modules: vec!["burden:v1.2.0".parse().unwrap()],
        add_opts: vec!["association_tarballs:file-ABC123".parse().unwrap()],
    }
}

fn teardown_calls(gateway: &StubGateway) -> Vec<Call> {
    gateway
        .calls()
        .into_iter()
        .filter(|c| c.is_removal())
        .collect()
}

#[test]
fn test_successful_run_reports_and_tears_down_once() {
    let fixture = FixtureTree::new();
    let gateway = StubGateway::new()
        .with_job_states(&["idle", "running", "done"])
        .with_artifact(artifact_tarball(STAMP));
    let manager = LifecycleManager::new(&gateway, settings(&fixture.root.join("test_out")))
        .with_stamp(RunStamp::from(STAMP));

    let report = manager.run(&request(&fixture)).unwrap();

    assert_eq!(report.testing_status, TerminalStatus::Complete);
    assert_eq!(report.job_id.as_str(), "job-7");
    assert_eq!(report.test_time.as_str(), STAMP);
    assert_eq!(manager.state(), LifecycleState::TornDown);
    assert_eq!(
        teardown_calls(&gateway),
        vec![
            Call::RemoveObjects(vec!["applet-2".to_string()]),
            Call::RemoveFolder {
                folder: "/mrcepid-testapplet_test_20240101120000_tmpdata/".to_string(),
                recurse: true,
            },
        ]
    );
}

#[test]
fn test_job_input_links_script_and_scratch_folder() {
    let fixture = FixtureTree::new();
    let gateway = StubGateway::new().with_job_states(&["failed"]);
    let manager = LifecycleManager::new(&gateway, settings(&fixture.root.join("test_out")))
        .with_stamp(RunStamp::from(STAMP));

    let report = manager.run(&request(&fixture)).unwrap();
    assert_eq!(report.testing_status, TerminalStatus::Failed);

    let Some(Call::RunJob { spec, .. }) = gateway
        .calls()
        .into_iter()
        .find(|c| c.operation() == Operation::RunJob)
    else {
        panic!("job was never launched");
    };
    assert_eq!(
        serde_json::Value::Object(spec.input),
        serde_json::json!({
            "testing_script": {"$dnanexus_link": "file-3"},
            "testing_directory": "/mrcepid-testapplet_test_20240101120000_tmpdata/",
            "output_prefix": STAMP,
            "association_tarballs": {"$dnanexus_link": "file-ABC123"},
        })
    );
}

#[test]
fn test_resolved_modules_reach_the_applet_build() {
    let fixture = FixtureTree::new();
    let gateway = StubGateway::new().with_job_states(&["failed"]);
    let manager = LifecycleManager::new(&gateway, settings(&fixture.root.join("test_out")))
        .with_stamp(RunStamp::from(STAMP));

    manager.run(&request(&fixture)).unwrap();

    let applet = gateway
        .calls()
        .into_iter()
        .find(|c| c.operation() == Operation::UploadApplet)
        .unwrap();
    assert_eq!(
        applet,
        Call::UploadApplet {
            name: "mrcepid-testapplet_test_20240101120000".to_string(),
            exec_depends: vec![
                "burden".to_string(),
                "pytest".to_string(),
                "test_loader".to_string()
            ],
        }
    );
}

#[test]
fn test_run_failure_still_tears_down_once() {
    let fixture = FixtureTree::new();
    let gateway = StubGateway::new().fail_on(Operation::DescribeJob, Failure::Api);
    let manager = LifecycleManager::new(&gateway, settings(&fixture.root.join("test_out")));

    let err = manager.run(&request(&fixture)).unwrap_err();

    assert!(matches!(err, LifecycleError::Run(RunError::Gateway(_))));
    assert_eq!(gateway.count(Operation::RemoveObjects), 1);
    assert_eq!(gateway.count(Operation::RemoveFolder), 1);
}

#[test]
fn test_run_and_teardown_failures_are_both_reported() {
    let fixture = FixtureTree::new();
    let gateway = StubGateway::new()
        .fail_on(Operation::RunJob, Failure::InvalidInput)
        .fail_on(Operation::RemoveFolder, Failure::Api);
    let manager = LifecycleManager::new(&gateway, settings(&fixture.root.join("test_out")));

    let err = manager.run(&request(&fixture)).unwrap_err();

    match &err {
        LifecycleError::RunAndTeardown { run, teardown } => {
            assert!(matches!(run, RunError::InvalidInput { .. }));
            assert_eq!(teardown.failed.len(), 1);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.teardown_error().is_some());
}

#[test]
fn test_teardown_failure_after_success_is_surfaced() {
    let fixture = FixtureTree::new();
    let gateway = StubGateway::new()
        .with_job_states(&["failed"])
        .fail_on(Operation::RemoveObjects, Failure::Api);
    let manager = LifecycleManager::new(&gateway, settings(&fixture.root.join("test_out")));

    let err = manager.run(&request(&fixture)).unwrap_err();

    assert!(matches!(err, LifecycleError::Teardown(_)));
    assert_eq!(gateway.count(Operation::RemoveFolder), 1);
}

#[test]
fn test_panic_during_run_still_tears_down() {
    let fixture = FixtureTree::new();
    let gateway = StubGateway::new().fail_on(Operation::DescribeJob, Failure::Panic);
    let manager = LifecycleManager::new(&gateway, settings(&fixture.root.join("test_out")));

    let result = panic::catch_unwind(AssertUnwindSafe(|| manager.run(&request(&fixture))));

    assert!(result.is_err());
    assert_eq!(gateway.count(Operation::RemoveObjects), 1);
    assert_eq!(gateway.count(Operation::RemoveFolder), 1);
}

#[test]
fn test_build_failure_skips_teardown() {
    let fixture = FixtureTree::new();
    let gateway = StubGateway::new().fail_on(Operation::UploadApplet, Failure::Api);
    let manager = LifecycleManager::new(&gateway, settings(&fixture.root.join("test_out")));

    let err = manager.run(&request(&fixture)).unwrap_err();

    assert!(matches!(err, LifecycleError::Build(_)));
    assert_eq!(gateway.count(Operation::RemoveFolder), 0);
    assert_eq!(gateway.count(Operation::RunJob), 0);
    assert_eq!(manager.state(), LifecycleState::Init);
}

#[test]
fn test_missing_manifest_fails_before_any_remote_call() {
    let fixture = FixtureTree::new();
    let gateway = StubGateway::new();
    let manager = LifecycleManager::new(&gateway, settings(&fixture.root.join("test_out")));
    let mut request = request(&fixture);
    request.manifest = Some(fixture.root.join("missing.json"));

    let err = manager.run(&request).unwrap_err();

    assert!(matches!(err, LifecycleError::Manifest(_)));
    assert!(gateway.calls().is_empty());
}

#[test]
fn test_events_follow_the_lifecycle() {
    let fixture = FixtureTree::new();
    let gateway = StubGateway::new().with_job_states(&["failed"]);
    let (tx, rx) = mpsc::channel();
    let manager = LifecycleManager::new(&gateway, settings(&fixture.root.join("test_out")))
        .with_events(tx)
        .with_stamp(RunStamp::from(STAMP));

    manager.run(&request(&fixture)).unwrap();

    let events: Vec<LifecycleEvent> = rx.try_iter().collect();
    assert!(matches!(events.first(), Some(LifecycleEvent::Building { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, LifecycleEvent::EnvironmentReady { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        LifecycleEvent::JobFinished {
            status: TerminalStatus::Failed,
            ..
        }
    )));
    assert!(matches!(
        events.last(),
        Some(LifecycleEvent::TornDown { clean: true })
    ));
}
