use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on path '{path}': {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse applet manifest '{path}': {source}")]
    ManifestJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("XDG Base Directory Error: {0}")]
    Xdg(String),

    #[error("Dependency '{0}' is declared more than once in the applet manifest.")]
    DuplicateDependency(String),

    #[error("Applet manifest '{0}' has no 'runSpec' object.")]
    MissingRunSpec(PathBuf),

    #[error("Invalid configuration: {0}")]
    General(String),
}

/// Errors raised by a remote platform gateway.
///
/// `InvalidInput` is the one class callers treat as user-actionable; the platform
/// raises it for malformed requests such as an unknown instance type.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("InvalidInput: {0}")]
    InvalidInput(String),

    #[error("{kind}: {message}")]
    Api { kind: String, message: String },

    #[error("Failed to execute '{command}': {source}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected response from '{command}': {detail}")]
    MalformedResponse { command: String, detail: String },

    #[error("I/O error on path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Error walking directory: {0}")]
    WalkDir(#[from] walkdir::Error),
}

impl GatewayError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, GatewayError::InvalidInput(_))
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GatewayError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Module request '{0}' has an empty name.")]
    EmptyModuleName(String),

    #[error("Module request '{0}' has an empty version after ':'.")]
    EmptyModuleVersion(String),

    #[error("Applet option '{0}' must be given as 'name:value'.")]
    MissingOptionDelimiter(String),

    #[error("Applet option '{0}' has an empty name.")]
    EmptyOptionName(String),

    #[error("Unknown job state '{0}'.")]
    UnknownJobState(String),
}
