use crate::constants::{defaults, naming};
use crate::errors::ParseError;
use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
static FILE_LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^file-[0-9A-Za-z]+$").unwrap());

macro_rules! remote_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

remote_id!(FileId);
remote_id!(AppletId);
remote_id!(JobId);

/// Platform object link, serialised as `{"$dnanexus_link": "<id>"}`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DxLink {
    #[serde(rename = "$dnanexus_link")]
    pub id: String,
}

impl DxLink {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResourceBundle {
    pub name: String,
    pub id: DxLink,
}

impl ResourceBundle {
    pub fn new(name: impl Into<String>, id: &FileId) -> Self {
        Self {
            name: name.into(),
            id: DxLink::new(id.as_str()),
        }
    }

    pub fn file_id(&self) -> FileId {
        FileId(self.id.id.clone())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DependencyRequest {
    pub name: String,
    pub version: String,
}

impl DependencyRequest {
    pub fn is_main(&self) -> bool {
        self.version == defaults::MAIN_VERSION
    }
}

impl fmt::Display for DependencyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_main() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.name, self.version)
        }
    }
}

impl FromStr for DependencyRequest {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = match s.split_once(':') {
            Some((name, version)) => {
                if version.is_empty() {
                    return Err(ParseError::EmptyModuleVersion(s.to_string()));
                }
                (name, version)
            }
            None => (s, defaults::MAIN_VERSION),
        };
        if name.is_empty() {
            return Err(ParseError::EmptyModuleName(s.to_string()));
        }
        Ok(DependencyRequest {
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum OptionValue {
    Link(DxLink),
    Plain(String),
}

impl OptionValue {
    pub fn parse(value: &str) -> Self {
        if FILE_LINK_PATTERN.is_match(value) {
            OptionValue::Link(DxLink::new(value))
        } else {
            OptionValue::Plain(value.to_string())
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            OptionValue::Link(link) => serde_json::json!({ "$dnanexus_link": link.id }),
            OptionValue::Plain(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OptionValue::Link(link) => link.serialize(serializer),
            OptionValue::Plain(s) => serializer.serialize_str(s),
        }
    }
}

/// An extra applet input given on the command line as `name:value`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AppletOption {
    pub name: String,
    pub value: OptionValue,
}

impl FromStr for AppletOption {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once(':')
            .ok_or_else(|| ParseError::MissingOptionDelimiter(s.to_string()))?;
        if name.is_empty() {
            return Err(ParseError::EmptyOptionName(s.to_string()));
        }
        Ok(AppletOption {
            name: name.to_string(),
            value: OptionValue::parse(value),
        })
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Runnable,
    Running,
    WaitingOnOutput,
    WaitingOnInput,
    Terminating,
    Terminated,
    Failed,
    Done,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Idle => "idle",
            JobState::Runnable => "runnable",
            JobState::Running => "running",
            JobState::WaitingOnOutput => "waiting_on_output",
            JobState::WaitingOnInput => "waiting_on_input",
            JobState::Terminating => "terminating",
            JobState::Terminated => "terminated",
            JobState::Failed => "failed",
            JobState::Done => "done",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for JobState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim_end().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "idle" => Ok(JobState::Idle),
            "runnable" => Ok(JobState::Runnable),
            "running" => Ok(JobState::Running),
            "waiting_on_output" => Ok(JobState::WaitingOnOutput),
            "waiting_on_input" => Ok(JobState::WaitingOnInput),
            "terminating" => Ok(JobState::Terminating),
            "terminated" => Ok(JobState::Terminated),
            "failed" => Ok(JobState::Failed),
            "done" => Ok(JobState::Done),
            _ => Err(ParseError::UnknownJobState(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CanonicalStatus {
    Complete,
    Running,
    Failed,
}

pub fn canonical_status(state: JobState) -> CanonicalStatus {
    match state {
        JobState::Done => CanonicalStatus::Complete,
        JobState::Idle
        | JobState::Runnable
        | JobState::Running
        | JobState::WaitingOnOutput
        | JobState::WaitingOnInput
        | JobState::Terminating => CanonicalStatus::Running,
        JobState::Terminated | JobState::Failed => CanonicalStatus::Failed,
    }
}

impl CanonicalStatus {
    pub fn terminal(self) -> Option<TerminalStatus> {
        match self {
            CanonicalStatus::Complete => Some(TerminalStatus::Complete),
            CanonicalStatus::Failed => Some(TerminalStatus::Failed),
            CanonicalStatus::Running => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TerminalStatus {
    Complete,
    Failed,
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalStatus::Complete => write!(f, "Complete"),
            TerminalStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Seconds-resolution run identifier, `YYYYMMDDhhmmss`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunStamp(String);

impl RunStamp {
    pub fn now() -> Self {
        Self::from_datetime(Local::now())
    }

    pub fn from_datetime(time: DateTime<Local>) -> Self {
        RunStamp(time.format(naming::RUN_STAMP_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunStamp {
    fn from(s: &str) -> Self {
        RunStamp(s.to_string())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JobOutcome {
    pub status: TerminalStatus,
    pub job_id: JobId,
    pub artifact_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TestRunReport {
    pub testing_status: TerminalStatus,
    pub job_id: JobId,
    pub test_time: RunStamp,
}
