use dxtest_core::model::{AppletId, JobId, JobState, RunStamp, TerminalStatus};
use std::path::PathBuf;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Init,
    Built,
    Running,
    Succeeded,
    Failed,
    TornDown,
}

#[derive(Debug)]
pub enum LifecycleEvent {
    Building {
        applet_name: String,
        stamp: RunStamp,
    },
    EnvironmentReady {
        applet_id: AppletId,
        folder: String,
    },
    JobLaunched {
        job_id: JobId,
    },
    JobState {
        job_id: JobId,
        state: JobState,
    },
    JobFinished {
        job_id: JobId,
        status: TerminalStatus,
    },
    ArtifactUnpacked {
        dir: PathBuf,
    },
    TearingDown,
    TornDown {
        clean: bool,
    },
}

/// Optional event channel; a dropped receiver is ignored.
#[derive(Debug, Clone, Default)]
pub struct EventSink(Option<Sender<LifecycleEvent>>);

impl EventSink {
    pub fn new(sender: Sender<LifecycleEvent>) -> Self {
        Self(Some(sender))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn send(&self, event: LifecycleEvent) {
        if let Some(sender) = &self.0 {
            let _ = sender.send(event);
        }
    }
}

impl From<Option<Sender<LifecycleEvent>>> for EventSink {
    fn from(sender: Option<Sender<LifecycleEvent>>) -> Self {
        Self(sender)
    }
}
