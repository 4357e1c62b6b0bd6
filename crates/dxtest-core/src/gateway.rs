//! The remote platform as seen by the test lifecycle.
//!
//! Every call is blocking and attempted once. Implementations report platform-side
//! validation failures as [`GatewayError::InvalidInput`].

use crate::errors::GatewayError;
use crate::manifest::AppletOverrides;
use crate::model::{AppletId, DxLink, FileId, JobId, JobState, ResourceBundle};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSpec {
    pub name: String,
    pub input: serde_json::Map<String, serde_json::Value>,
    pub folder: String,
    pub instance_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobDescription {
    pub id: JobId,
    pub state: String,
    #[serde(default)]
    pub output: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OutputRef {
    Bare(String),
    Link(DxLink),
    Qualified {
        #[serde(rename = "$dnanexus_link")]
        link: QualifiedLink,
    },
}

#[derive(Deserialize)]
struct QualifiedLink {
    id: String,
}

impl JobDescription {
    pub fn job_state(&self) -> Result<JobState, crate::errors::ParseError> {
        self.state.parse()
    }

    /// Resolves a file output that may be a bare id, a link, or a project-qualified link.
    pub fn output_file(&self, field: &str) -> Option<FileId> {
        let value = self.output.as_ref()?.get(field)?.clone();
        match serde_json::from_value::<OutputRef>(value).ok()? {
            OutputRef::Bare(id) => Some(FileId(id)),
            OutputRef::Link(link) => Some(FileId(link.id)),
            OutputRef::Qualified { link } => Some(FileId(link.id)),
        }
    }
}

pub trait Gateway {
    fn upload_file(&self, local: &Path, folder: &str) -> GatewayResult<FileId>;

    fn upload_resources(&self, src_dir: &Path) -> GatewayResult<Vec<ResourceBundle>>;

    fn upload_applet(
        &self,
        src_dir: &Path,
        resources: &[ResourceBundle],
        override_name: &str,
        overrides: &AppletOverrides,
    ) -> GatewayResult<AppletId>;

    fn new_folder(&self, folder: &str) -> GatewayResult<()>;

    fn remove_objects(&self, ids: &[String]) -> GatewayResult<()>;

    fn remove_folder(&self, folder: &str, recurse: bool) -> GatewayResult<()>;

    fn run_job(&self, applet: &AppletId, spec: &JobSpec) -> GatewayResult<JobId>;

    fn describe_job(&self, job: &JobId) -> GatewayResult<JobDescription>;

    fn file_state(&self, file: &FileId) -> GatewayResult<String>;

    fn download_file(&self, file: &FileId, dest: &Path) -> GatewayResult<()>;
}
