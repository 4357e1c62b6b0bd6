use dxtest_runner::cli::Commands;
use harness::TestHarness;
use predicates::prelude::*;
use std::fs;

#[test]
fn test_help_lists_commands() {
    let harness = TestHarness::new();
    harness
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("launch"))
        .stdout(predicate::str::contains("completions"))
        .stdout(predicate::str::contains("internal-pytest").not());
}

#[test]
fn test_launch_requires_script_files_and_root_dir() {
    let harness = TestHarness::new();
    harness
        .cmd()
        .arg("launch")
        .arg("--script")
        .arg(&harness.script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--files"));
}

#[test]
fn test_malformed_module_is_rejected() {
    let harness = TestHarness::new();
    harness
        .launch()
        .arg("--modules")
        .arg("burden:")
        .assert()
        .failure()
        .stderr(predicate::str::contains("burden:"));
}

#[test]
fn test_option_without_separator_is_rejected() {
    let harness = TestHarness::new();
    harness
        .launch()
        .arg("--add_opts")
        .arg("novalue")
        .assert()
        .failure()
        .stderr(predicate::str::contains("novalue"));
}

#[test]
fn test_parse_command_line_collects_repeated_values() {
    let cli = dxtest_runner::parse_command_line([
        "dxtest",
        "-vv",
        "--project",
        "project-1",
        "launch",
        "--script",
        "test.py",
        "--files",
        "data",
        "--root_dir",
        "applet",
        "--modules",
        "general_utilities",
        "burden:v1.2.0",
        "--add_opts",
        "opt:file-ABC123",
        "other:plainvalue",
    ])
    .unwrap();

    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.project.as_deref(), Some("project-1"));
    let Commands::Launch(args) = cli.command else {
        panic!("expected launch");
    };
    assert_eq!(args.modules.len(), 2);
    assert_eq!(args.modules[1].version, "v1.2.0");
    assert!(args.modules[0].is_main());
    assert_eq!(args.add_opts.len(), 2);
    assert_eq!(args.add_opts[0].name, "opt");
    assert_eq!(args.json, None);
}

#[test]
fn test_completions_for_bash() {
    let harness = TestHarness::new();
    harness
        .cmd()
        .arg("completions")
        .arg("--shell")
        .arg("bash")
        .assert()
        .success()
        .stdout(predicate::str::contains("dxtest"));
}

#[test]
fn test_missing_dx_executable_fails_with_error() {
    let harness = TestHarness::new();
    harness
        .launch()
        .arg("--dx")
        .arg(harness.root.join("no-such-dx"))
        .arg("--project")
        .arg("project-1")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[ERROR]"));
}

#[test]
fn test_malformed_config_fails_before_any_platform_call() {
    let harness = TestHarness::new();
    harness.write_config("[launch]\ninstance_type = \"\"\n");
    harness
        .launch()
        .arg("--dx")
        .arg(harness.root.join("no-such-dx"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("instance_type"));
}

#[cfg(unix)]
#[test]
fn test_platform_failure_during_build_exits_nonzero() {
    let harness = TestHarness::new();
    let (dx, calls) = harness.fake_dx("dxpy.exceptions.PermissionDenied: not allowed, code 401");

    harness
        .launch()
        .arg("--dx")
        .arg(&dx)
        .arg("--project")
        .arg("project-1")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("PermissionDenied"));

    let recorded = fs::read_to_string(calls).unwrap();
    let lines: Vec<&str> = recorded.lines().collect();
    assert_eq!(lines.len(), 1, "build must stop at the first failure");
    assert!(lines[0].starts_with("upload "));
    assert!(lines[0].contains("project-1:/"));
}

#[cfg(unix)]
#[test]
fn test_project_is_discovered_from_dx_env() {
    let harness = TestHarness::new();
    let (dx, calls) = harness.fake_dx("no project selected");

    harness
        .launch()
        .arg("--dx")
        .arg(&dx)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[ERROR]"));

    let recorded = fs::read_to_string(calls).unwrap();
    assert_eq!(recorded.trim(), "env --bash");
}

#[cfg(unix)]
#[test]
fn test_internal_pytest_uploads_results_to_job_workspace() {
    let harness = TestHarness::new();
    let (dx, calls) = harness.answering_dx("file-RESULTS");
    let work = harness.root.join("work");
    fs::create_dir_all(&work).unwrap();

    harness
        .cmd()
        .env("DX_PROJECT_CONTEXT_ID", "project-1")
        .env("DX_WORKSPACE_ID", "container-1")
        .arg("--dx")
        .arg(&dx)
        .arg("internal-pytest")
        .arg("--output_prefix")
        .arg("20240101120000")
        .arg("--testing_script")
        .arg("file-SCRIPT")
        .arg("--testing_directory")
        .arg("/applet_test_20240101120000_tmpdata/")
        .arg("--work_dir")
        .arg(&work)
        .arg("--job_output")
        .arg(work.join("job_output.json"))
        .arg("--pytest")
        .arg("true")
        .assert()
        .success();

    let recorded = fs::read_to_string(calls).unwrap();
    let upload = recorded
        .lines()
        .find(|line| line.starts_with("upload "))
        .expect("results were not uploaded");
    assert!(upload.contains("20240101120000.assoc_results.tar.gz"));
    assert!(upload.contains("--destination container-1:/"));
    assert!(!recorded.contains("project-1"));

    let output = fs::read_to_string(work.join("job_output.json")).unwrap();
    assert!(output.contains("file-RESULTS"));
}
