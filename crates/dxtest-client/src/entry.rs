//! The half of a test run that executes inside the launched platform job.

use crate::archive;
use crate::error::EntryError;
use dxtest_core::{
    constants::{artifacts, platform},
    gateway::Gateway,
    logging,
    model::FileId,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const SCRIPT_NAME: &str = "test.py";
pub const JOB_OUTPUT_FILE: &str = "job_output.json";
const CI_WORKERS: &str = "500";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInputs {
    pub output_prefix: String,
    pub testing_script: FileId,
    pub testing_directory: String,
    pub env: Vec<(String, String)>,
}

pub fn results_name(output_prefix: &str) -> String {
    format!("{}.assoc_results.tar.gz", output_prefix)
}

pub fn parse_env_pair(pair: &str) -> Option<(String, String)> {
    let (key, value) = pair.split_once('=')?;
    (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
}

pub struct PytestEntry<'a> {
    gateway: &'a dyn Gateway,
    work_dir: PathBuf,
    program: OsString,
}

impl<'a> PytestEntry<'a> {
    pub fn new(gateway: &'a dyn Gateway, work_dir: PathBuf) -> Self {
        Self {
            gateway,
            work_dir,
            program: OsString::from("pytest"),
        }
    }

    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn log_path(&self, output_prefix: &str) -> PathBuf {
        self.work_dir
            .join(format!("{}.{}.log", artifacts::LOG_PREFIX, output_prefix))
    }

    /// Runs the downloaded test script and publishes its log. Returns the uploaded
    /// results file.
    pub fn run(&self, inputs: &EntryInputs, job_output: &Path) -> Result<FileId, EntryError> {
        let script = self.work_dir.join(SCRIPT_NAME);
        self.gateway.download_file(&inputs.testing_script, &script)?;

        let log_path = self.log_path(&inputs.output_prefix);
        let log = fs_err::File::create(&log_path).map_err(|e| EntryError::Io {
            path: log_path.clone(),
            source: e,
        })?;
        let log_err = log.try_clone().map_err(|e| EntryError::Io {
            path: log_path.clone(),
            source: e,
        })?;

        let mut cmd = Command::new(&self.program);
        cmd.arg(SCRIPT_NAME)
            .current_dir(&self.work_dir)
            .env("TEST_DIR", &inputs.testing_directory)
            .env("CI", CI_WORKERS)
            .envs(inputs.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(Stdio::from(std::fs::File::from(log)))
            .stderr(Stdio::from(std::fs::File::from(log_err)));
        logging::log_command(&cmd);

        let status = cmd.status().map_err(|e| EntryError::Spawn {
            command: logging::format_command_for_display(&cmd),
            source: e,
        })?;
        if status.success() {
            tracing::info!("All tests passed");
        } else {
            tracing::info!("Tests finished with {}; see {}", status, log_path.display());
        }

        let tarball = self.work_dir.join(results_name(&inputs.output_prefix));
        archive::pack_files(&[log_path.as_path()], &tarball).map_err(|e| EntryError::Io {
            path: tarball.clone(),
            source: e,
        })?;
        let file_id = self.gateway.upload_file(&tarball, "/")?;

        let output = serde_json::json!({
            (artifacts::OUTPUT_FIELD): { (platform::LINK_KEY): file_id.as_str() }
        });
        let content = serde_json::to_string_pretty(&output)?;
        fs_err::write(job_output, content).map_err(|e| EntryError::Io {
            path: job_output.to_path_buf(),
            source: e,
        })?;

        Ok(file_id)
    }
}
