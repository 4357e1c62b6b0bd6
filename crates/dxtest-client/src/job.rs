use crate::archive;
use crate::error::RunError;
use crate::events::{EventSink, LifecycleEvent};
use dxtest_core::{
    constants::{artifacts, naming, platform},
    errors::GatewayError,
    gateway::{Gateway, JobSpec},
    model::{canonical_status, AppletId, FileId, JobId, JobOutcome, RunStamp, TerminalStatus},
};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

pub fn job_name(stamp: &RunStamp) -> String {
    format!("{}_{}", naming::JOB_PREFIX, stamp)
}

pub struct JobRunner<'a> {
    gateway: &'a dyn Gateway,
    poll_interval: Duration,
    output_dir: PathBuf,
    events: EventSink,
    stamp: &'a RunStamp,
}

impl<'a> JobRunner<'a> {
    pub fn new(
        gateway: &'a dyn Gateway,
        poll_interval: Duration,
        output_dir: PathBuf,
        events: EventSink,
        stamp: &'a RunStamp,
    ) -> Self {
        Self {
            gateway,
            poll_interval,
            output_dir,
            events,
            stamp,
        }
    }

    fn classify(&self, error: GatewayError, instance_type: &str) -> RunError {
        if error.is_invalid_input() {
            tracing::error!(
                "Instance type '{}' is no longer valid and will need to be changed to run tests: {}",
                instance_type,
                error
            );
            RunError::InvalidInput {
                instance_type: instance_type.to_string(),
                source: error,
            }
        } else {
            tracing::error!("Unexpected error while running tests: {}", error);
            RunError::Gateway(error)
        }
    }

    pub fn run_and_await(
        &self,
        applet: &AppletId,
        input: serde_json::Map<String, serde_json::Value>,
        folder_name: &str,
        instance_type: &str,
    ) -> Result<JobOutcome, RunError> {
        let spec = JobSpec {
            name: job_name(self.stamp),
            input,
            folder: folder_name.to_string(),
            instance_type: instance_type.to_string(),
        };
        let job_id = self
            .gateway
            .run_job(applet, &spec)
            .map_err(|e| self.classify(e, instance_type))?;
        tracing::info!("Launched job {} ({}) on {}", job_id, spec.name, instance_type);
        self.events.send(LifecycleEvent::JobLaunched {
            job_id: job_id.clone(),
        });

        let (status, description) = loop {
            let description = self
                .gateway
                .describe_job(&job_id)
                .map_err(|e| self.classify(e, instance_type))?;
            let state = description
                .job_state()
                .map_err(|e| RunError::UnknownJobState {
                    job_id: job_id.clone(),
                    source: e,
                })?;
            tracing::debug!("Job {} is {}", job_id, state);
            self.events.send(LifecycleEvent::JobState {
                job_id: job_id.clone(),
                state,
            });
            if let Some(status) = canonical_status(state).terminal() {
                break (status, description);
            }
            thread::sleep(self.poll_interval);
        };

        tracing::info!("Job {} finished: {}", job_id, status);
        self.events.send(LifecycleEvent::JobFinished {
            job_id: job_id.clone(),
            status,
        });

        let artifact_path = match status {
            TerminalStatus::Failed => None,
            TerminalStatus::Complete => {
                let file = description
                    .output_file(artifacts::OUTPUT_FIELD)
                    .ok_or_else(|| RunError::MissingOutput {
                        job_id: job_id.clone(),
                        field: artifacts::OUTPUT_FIELD.to_string(),
                    })?;
                Some(
                    self.retrieve_artifact(&job_id, &file)
                        .map_err(|e| match e {
                            RunError::Gateway(g) => self.classify(g, instance_type),
                            other => other,
                        })?,
                )
            }
        };

        Ok(JobOutcome {
            status,
            job_id,
            artifact_path,
        })
    }

    fn retrieve_artifact(&self, job_id: &JobId, file: &FileId) -> Result<PathBuf, RunError> {
        loop {
            let state = self.gateway.file_state(file).map_err(RunError::Gateway)?;
            if state == platform::FILE_CLOSED {
                break;
            }
            tracing::debug!("Output {} of job {} is {}; waiting", file, job_id, state);
            thread::sleep(self.poll_interval);
        }

        fs_err::create_dir_all(&self.output_dir).map_err(|e| RunError::Archive {
            path: self.output_dir.clone(),
            source: e,
        })?;
        let tarball = self.output_dir.join(artifacts::DOWNLOAD_NAME);
        self.gateway
            .download_file(file, &tarball)
            .map_err(RunError::Gateway)?;

        archive::unpack(&tarball, &self.output_dir).map_err(|e| RunError::Archive {
            path: tarball.clone(),
            source: e,
        })?;
        fs_err::remove_file(&tarball).map_err(|e| RunError::Archive {
            path: tarball.clone(),
            source: e,
        })?;

        tracing::info!(
            "Test log available at {}",
            log_path(&self.output_dir, self.stamp).display()
        );
        self.events.send(LifecycleEvent::ArtifactUnpacked {
            dir: self.output_dir.clone(),
        });
        Ok(self.output_dir.clone())
    }
}

pub fn log_path(output_dir: &Path, stamp: &RunStamp) -> PathBuf {
    output_dir.join(format!("{}.{}.log", artifacts::LOG_PREFIX, stamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_name_and_log_path() {
        let stamp = RunStamp::from("20240101120000");
        assert_eq!(job_name(&stamp), "dxtest_20240101120000");
        assert_eq!(
            log_path(Path::new("test_out"), &stamp),
            PathBuf::from("test_out/pytest.20240101120000.log")
        );
    }
}
