use dxtest_core::{
    errors::GatewayError,
    gateway::{Gateway, GatewayResult, JobDescription, JobSpec},
    manifest::AppletOverrides,
    model::{AppletId, FileId, JobId, ResourceBundle},
};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const OUTPUT_FILE_ID: &str = "file-OUTPUT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    UploadFile,
    UploadResources,
    UploadApplet,
    NewFolder,
    RemoveObjects,
    RemoveFolder,
    RunJob,
    DescribeJob,
    FileState,
    DownloadFile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    UploadFile { local: PathBuf, folder: String },
    UploadResources { src_dir: PathBuf },
    UploadApplet { name: String, exec_depends: Vec<String> },
    NewFolder(String),
    RemoveObjects(Vec<String>),
    RemoveFolder { folder: String, recurse: bool },
    RunJob { applet: AppletId, spec: JobSpec },
    DescribeJob(JobId),
    FileState(FileId),
    DownloadFile { file: FileId, dest: PathBuf },
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Call::UploadFile { .. } => Operation::UploadFile,
            Call::UploadResources { .. } => Operation::UploadResources,
            Call::UploadApplet { .. } => Operation::UploadApplet,
            Call::NewFolder(_) => Operation::NewFolder,
            Call::RemoveObjects(_) => Operation::RemoveObjects,
            Call::RemoveFolder { .. } => Operation::RemoveFolder,
            Call::RunJob { .. } => Operation::RunJob,
            Call::DescribeJob(_) => Operation::DescribeJob,
            Call::FileState(_) => Operation::FileState,
            Call::DownloadFile { .. } => Operation::DownloadFile,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Call::RemoveObjects(_) | Call::RemoveFolder { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    InvalidInput,
    Api,
    Panic,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    counts: HashMap<Operation, usize>,
    next_id: usize,
    job_states: VecDeque<String>,
    file_states: VecDeque<String>,
}

/// In-memory platform double: records every call, replays scripted job and file states,
/// and fails chosen operations on demand.
pub struct StubGateway {
    state: Mutex<State>,
    failures: HashMap<Operation, (usize, Failure)>,
    with_resources: bool,
    artifact: Option<Vec<u8>>,
}

impl Default for StubGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl StubGateway {
    pub fn new() -> Self {
        let state = State {
            job_states: VecDeque::from(vec!["done".to_string()]),
            file_states: VecDeque::from(vec!["closed".to_string()]),
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
            failures: HashMap::new(),
            with_resources: true,
            artifact: None,
        }
    }

    /// States reported by successive `describe_job` calls; the last one repeats.
    pub fn with_job_states(self, states: &[&str]) -> Self {
        self.lock().job_states = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_file_states(self, states: &[&str]) -> Self {
        self.lock().file_states = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn without_resources(mut self) -> Self {
        self.with_resources = false;
        self
    }

    /// Bytes written by `download_file`.
    pub fn with_artifact(mut self, bytes: Vec<u8>) -> Self {
        self.artifact = Some(bytes);
        self
    }

    pub fn fail_on(self, op: Operation, failure: Failure) -> Self {
        self.fail_after(op, 0, failure)
    }

    /// Lets `succeed` calls of `op` through, then fails every later one.
    pub fn fail_after(mut self, op: Operation, succeed: usize, failure: Failure) -> Self {
        self.failures.insert(op, (succeed, failure));
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: Operation) -> usize {
        self.lock().calls.iter().filter(|c| c.operation() == op).count()
    }

    pub fn removals(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_removal())
            .cloned()
            .collect()
    }

    fn record(&self, call: Call) -> GatewayResult<()> {
        let op = call.operation();
        let failure = {
            let mut state = self.lock();
            state.calls.push(call);
            let seen = state.counts.entry(op).or_insert(0);
            *seen += 1;
            match self.failures.get(&op) {
                Some((succeed, failure)) if *seen > *succeed => Some(*failure),
                _ => None,
            }
        };
        match failure {
            None => Ok(()),
            Some(Failure::InvalidInput) => Err(GatewayError::InvalidInput(format!(
                "stubbed invalid input for {:?}",
                op
            ))),
            Some(Failure::Api) => Err(GatewayError::Api {
                kind: "InternalError".to_string(),
                message: format!("stubbed failure for {:?}", op),
            }),
            Some(Failure::Panic) => panic!("stubbed panic in {:?}", op),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        format!("{}-{}", prefix, state.next_id)
    }

    fn next_scripted(queue: &mut VecDeque<String>) -> String {
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        }
    }
}

impl Gateway for StubGateway {
    fn upload_file(&self, local: &Path, folder: &str) -> GatewayResult<FileId> {
        self.record(Call::UploadFile {
            local: local.to_path_buf(),
            folder: folder.to_string(),
        })?;
        Ok(FileId(self.next_id("file")))
    }

    fn upload_resources(&self, src_dir: &Path) -> GatewayResult<Vec<ResourceBundle>> {
        self.record(Call::UploadResources {
            src_dir: src_dir.to_path_buf(),
        })?;
        if !self.with_resources {
            return Ok(Vec::new());
        }
        let id = FileId(self.next_id("file"));
        Ok(vec![ResourceBundle::new("resources.tar.gz", &id)])
    }

    fn upload_applet(
        &self,
        _src_dir: &Path,
        _resources: &[ResourceBundle],
        override_name: &str,
        overrides: &AppletOverrides,
    ) -> GatewayResult<AppletId> {
        self.record(Call::UploadApplet {
            name: override_name.to_string(),
            exec_depends: overrides
                .exec_depends()
                .iter()
                .map(|d| d.name.clone())
                .collect(),
        })?;
        Ok(AppletId(self.next_id("applet")))
    }

    fn new_folder(&self, folder: &str) -> GatewayResult<()> {
        self.record(Call::NewFolder(folder.to_string()))
    }

    fn remove_objects(&self, ids: &[String]) -> GatewayResult<()> {
        self.record(Call::RemoveObjects(ids.to_vec()))
    }

    fn remove_folder(&self, folder: &str, recurse: bool) -> GatewayResult<()> {
        self.record(Call::RemoveFolder {
            folder: folder.to_string(),
            recurse,
        })
    }

    fn run_job(&self, applet: &AppletId, spec: &JobSpec) -> GatewayResult<JobId> {
        self.record(Call::RunJob {
            applet: applet.clone(),
            spec: spec.clone(),
        })?;
        Ok(JobId(self.next_id("job")))
    }

    fn describe_job(&self, job: &JobId) -> GatewayResult<JobDescription> {
        self.record(Call::DescribeJob(job.clone()))?;
        let state = Self::next_scripted(&mut self.lock().job_states);
        let output = (state == "done").then(|| {
            let mut map = serde_json::Map::new();
            map.insert(
                "output_tarball".to_string(),
                serde_json::json!({ "$dnanexus_link": OUTPUT_FILE_ID }),
            );
            map
        });
        Ok(JobDescription {
            id: job.clone(),
            state,
            output,
        })
    }

    fn file_state(&self, file: &FileId) -> GatewayResult<String> {
        self.record(Call::FileState(file.clone()))?;
        Ok(Self::next_scripted(&mut self.lock().file_states))
    }

    fn download_file(&self, file: &FileId, dest: &Path) -> GatewayResult<()> {
        self.record(Call::DownloadFile {
            file: file.clone(),
            dest: dest.to_path_buf(),
        })?;
        if let Some(bytes) = &self.artifact {
            std::fs::write(dest, bytes).map_err(|e| GatewayError::io(dest, e))?;
        }
        Ok(())
    }
}
