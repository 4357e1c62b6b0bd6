use crate::environment::{Environment, EnvironmentBuilder};
use crate::error::LifecycleError;
use crate::events::{EventSink, LifecycleEvent, LifecycleState};
use crate::job::JobRunner;
use dxtest_core::{
    config::LaunchConfig,
    constants::{defaults, inputs},
    gateway::Gateway,
    manifest::Manifest,
    model::{AppletOption, DependencyRequest, DxLink, RunStamp, TerminalStatus, TestRunReport},
    resolver,
};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRequest {
    pub script: PathBuf,
    pub files: PathBuf,
    pub src_dir: PathBuf,
    pub manifest: Option<PathBuf>,
    pub modules: Vec<DependencyRequest>,
    pub add_opts: Vec<AppletOption>,
}

impl TestRequest {
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| self.src_dir.join(defaults::MANIFEST_FILE))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    pub instance_type: String,
    pub poll_interval: Duration,
    pub output_dir: PathBuf,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self::from(&LaunchConfig::default())
    }
}

impl From<&LaunchConfig> for LaunchSettings {
    fn from(config: &LaunchConfig) -> Self {
        Self {
            instance_type: config.instance_type.clone(),
            poll_interval: config.poll_interval(),
            output_dir: config.output_dir.clone(),
        }
    }
}

/// Input mapping for the test job; extra options win on a name clash.
pub fn job_input(
    script_id: &str,
    folder_name: &str,
    stamp: &RunStamp,
    add_opts: &[AppletOption],
) -> serde_json::Map<String, serde_json::Value> {
    let mut input = serde_json::Map::new();
    input.insert(
        inputs::TESTING_SCRIPT.to_string(),
        serde_json::json!(DxLink::new(script_id)),
    );
    input.insert(
        inputs::TESTING_DIRECTORY.to_string(),
        serde_json::json!(folder_name),
    );
    input.insert(
        inputs::OUTPUT_PREFIX.to_string(),
        serde_json::json!(stamp.as_str()),
    );
    for opt in add_opts {
        input.insert(opt.name.clone(), opt.value.to_json());
    }
    input
}

pub struct LifecycleManager<'a> {
    gateway: &'a dyn Gateway,
    settings: LaunchSettings,
    events: EventSink,
    stamp: Option<RunStamp>,
    state: Cell<LifecycleState>,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(gateway: &'a dyn Gateway, settings: LaunchSettings) -> Self {
        Self {
            gateway,
            settings,
            events: EventSink::none(),
            stamp: None,
            state: Cell::new(LifecycleState::Init),
        }
    }

    pub fn with_events(mut self, sender: Sender<LifecycleEvent>) -> Self {
        self.events = EventSink::new(sender);
        self
    }

    /// Fixes the run stamp instead of taking the current time.
    pub fn with_stamp(mut self, stamp: RunStamp) -> Self {
        self.stamp = Some(stamp);
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    fn transition(&self, next: LifecycleState) {
        tracing::debug!("Lifecycle {:?} -> {:?}", self.state.get(), next);
        self.state.set(next);
    }

    pub fn run(&self, request: &TestRequest) -> Result<TestRunReport, LifecycleError> {
        let manifest_path = request.manifest_path();
        let manifest = Manifest::load(&manifest_path).map_err(LifecycleError::Manifest)?;
        let overrides = resolver::resolve(&manifest, &request.modules);

        let stamp = self.stamp.clone().unwrap_or_else(RunStamp::now);
        self.events.send(LifecycleEvent::Building {
            applet_name: display_name(&request.src_dir),
            stamp: stamp.clone(),
        });

        let handle = EnvironmentBuilder::new(self.gateway, &stamp)
            .build(&request.script, &request.files, &request.src_dir, &overrides)
            .map_err(LifecycleError::Build)?;
        self.transition(LifecycleState::Built);
        self.events.send(LifecycleEvent::EnvironmentReady {
            applet_id: handle.applet_id.clone(),
            folder: handle.folder_name.clone(),
        });

        let environment = Environment::new(self.gateway, handle, self.events.clone());
        let input = job_input(
            environment.handle().script_id.as_str(),
            &environment.handle().folder_name,
            &stamp,
            &request.add_opts,
        );

        self.transition(LifecycleState::Running);
        let runner = JobRunner::new(
            self.gateway,
            self.settings.poll_interval,
            self.settings.output_dir.clone(),
            self.events.clone(),
            &stamp,
        );
        let outcome = runner.run_and_await(
            &environment.handle().applet_id,
            input,
            &environment.handle().folder_name,
            &self.settings.instance_type,
        );
        match &outcome {
            Ok(o) if o.status == TerminalStatus::Complete => {
                self.transition(LifecycleState::Succeeded)
            }
            _ => self.transition(LifecycleState::Failed),
        }

        let teardown = environment.release();
        self.transition(LifecycleState::TornDown);

        match (outcome, teardown) {
            (Ok(outcome), Ok(())) => Ok(TestRunReport {
                testing_status: outcome.status,
                job_id: outcome.job_id,
                test_time: stamp,
            }),
            (Ok(_), Err(teardown)) => Err(LifecycleError::Teardown(teardown)),
            (Err(run), Ok(())) => Err(LifecycleError::Run(run)),
            (Err(run), Err(teardown)) => Err(LifecycleError::RunAndTeardown { run, teardown }),
        }
    }
}

fn display_name(src_dir: &Path) -> String {
    src_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| src_dir.display().to_string())
}
