use dxtest_client::archive;
use dxtest_client::entry::{EntryInputs, PytestEntry};
use dxtest_client::error::EntryError;
use dxtest_core::model::FileId;
use dxtest_test_utils::{Call, Operation, StubGateway};
use std::fs;

fn inputs() -> EntryInputs {
    EntryInputs {
        output_prefix: "20240101120000".to_string(),
        testing_script: FileId::from("file-SCRIPT"),
        testing_directory: "/applet_test_20240101120000_tmpdata/".to_string(),
        env: vec![("EXTRA".to_string(), "yes".to_string())],
    }
}

#[test]
fn test_runs_script_and_publishes_log() {
    let work = tempfile::tempdir().unwrap();
    let script = "echo \"dir=$TEST_DIR ci=$CI extra=$EXTRA\"\necho oops >&2\nexit 1\n";
    let gateway = StubGateway::new().with_artifact(script.as_bytes().to_vec());
    let entry = PytestEntry::new(&gateway, work.path().to_path_buf()).with_program("sh");
    let job_output = work.path().join("job_output.json");

    let file_id = entry.run(&inputs(), &job_output).unwrap();

    let tarball = work.path().join("20240101120000.assoc_results.tar.gz");
    assert_eq!(
        gateway.calls().last(),
        Some(&Call::UploadFile {
            local: tarball.clone(),
            folder: "/".to_string(),
        })
    );

    let unpacked = work.path().join("unpacked");
    fs::create_dir(&unpacked).unwrap();
    archive::unpack(&tarball, &unpacked).unwrap();
    let log = fs::read_to_string(unpacked.join("pytest.20240101120000.log")).unwrap();
    assert!(log.contains("dir=/applet_test_20240101120000_tmpdata/ ci=500 extra=yes"));
    assert!(log.contains("oops"));

    let output: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&job_output).unwrap()).unwrap();
    assert_eq!(
        output,
        serde_json::json!({"output_tarball": {"$dnanexus_link": file_id.as_str()}})
    );
}

#[test]
fn test_missing_runner_is_an_error() {
    let work = tempfile::tempdir().unwrap();
    let gateway = StubGateway::new().with_artifact(b"exit 0\n".to_vec());
    let entry = PytestEntry::new(&gateway, work.path().to_path_buf())
        .with_program("dxtest-no-such-runner");

    let err = entry
        .run(&inputs(), &work.path().join("job_output.json"))
        .unwrap_err();

    assert!(matches!(err, EntryError::Spawn { .. }));
    assert_eq!(gateway.count(Operation::UploadFile), 0);
}
