use dxtest_core::errors::{ConfigError, GatewayError, ParseError};
use dxtest_core::model::JobId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Invalid applet source directory '{path}': {source}")]
    SourceDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to upload resources from '{src_dir}': {source}")]
    Resources {
        src_dir: PathBuf,
        #[source]
        source: GatewayError,
    },

    #[error("Failed to upload applet '{name}': {source}")]
    Applet {
        name: String,
        #[source]
        source: GatewayError,
    },

    #[error("Failed to stage test data in '{folder}': {source}")]
    TestData {
        folder: String,
        #[source]
        source: GatewayError,
    },
}

impl BuildError {
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            BuildError::SourceDir { .. } => None,
            BuildError::Resources { source, .. }
            | BuildError::Applet { source, .. }
            | BuildError::TestData { source, .. } => Some(source),
        }
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Instance type '{instance_type}' is no longer valid and will need to be changed to run tests: {source}")]
    InvalidInput {
        instance_type: String,
        #[source]
        source: GatewayError,
    },

    #[error(transparent)]
    Gateway(GatewayError),

    #[error("Job '{job_id}' reported a state this tool does not know: {source}")]
    UnknownJobState {
        job_id: JobId,
        #[source]
        source: ParseError,
    },

    #[error("Job '{job_id}' completed without an '{field}' output.")]
    MissingOutput { job_id: JobId, field: String },

    #[error("Failed to unpack test output at '{path}': {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Raised after every teardown step was attempted; `last` is the final failure seen.
#[derive(Error, Debug)]
#[error("Failed to remove test object(s) {}: {last}", failed.join(", "))]
pub struct TeardownError {
    pub failed: Vec<String>,
    #[source]
    pub last: GatewayError,
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Manifest(ConfigError),

    #[error(transparent)]
    Build(BuildError),

    #[error(transparent)]
    Run(RunError),

    #[error(transparent)]
    Teardown(TeardownError),

    #[error("{run}\nCleanup was also incomplete: {teardown}")]
    RunAndTeardown {
        run: RunError,
        teardown: TeardownError,
    },
}

impl LifecycleError {
    pub fn teardown_error(&self) -> Option<&TeardownError> {
        match self {
            LifecycleError::Teardown(t) | LifecycleError::RunAndTeardown { teardown: t, .. } => {
                Some(t)
            }
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum EntryError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
