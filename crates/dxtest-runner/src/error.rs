use dxtest_core::model::JobId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] dxtest_core::errors::ConfigError),

    #[error(transparent)]
    Gateway(#[from] dxtest_core::errors::GatewayError),

    #[error(transparent)]
    Lifecycle(#[from] dxtest_client::error::LifecycleError),

    #[error(transparent)]
    Entry(#[from] dxtest_client::error::EntryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Tests failed in job {job_id}")]
    TestFailed { job_id: JobId },

    #[error("The test run stopped unexpectedly: {0}")]
    WorkerPanicked(String),
}
