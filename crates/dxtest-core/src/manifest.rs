use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One entry of `runSpec.execDepends`. Keys this crate does not interpret are kept in
/// `extra` so a copied descriptor round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_commands: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Dependency {
    pub fn new(name: &str, package_manager: &str) -> Self {
        Self {
            name: name.to_string(),
            package_manager: Some(package_manager.to_string()),
            url: None,
            tag: None,
            build_commands: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    dependencies: Vec<Dependency>,
}

impl Manifest {
    pub fn new(dependencies: Vec<Dependency>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for dep in &dependencies {
            if !seen.insert(dep.name.as_str()) {
                return Err(ConfigError::DuplicateDependency(dep.name.clone()));
            }
        }
        Ok(Self { dependencies })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs_err::read_to_string(path).map_err(|e| ConfigError::PathIo {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_dxapp_json(path, &content)
    }

    pub fn from_dxapp_json(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let json: serde_json::Value =
            serde_json::from_str(content).map_err(|e| ConfigError::ManifestJson {
                path: path.to_path_buf(),
                source: e,
            })?;

        let run_spec = json
            .get("runSpec")
            .filter(|v| v.is_object())
            .ok_or_else(|| ConfigError::MissingRunSpec(path.to_path_buf()))?;

        let dependencies = match run_spec.get("execDepends") {
            Some(value) => serde_json::from_value::<Vec<Dependency>>(value.clone()).map_err(
                |e| ConfigError::ManifestJson {
                    path: path.to_path_buf(),
                    source: e,
                },
            )?,
            None => Vec::new(),
        };

        Self::new(dependencies)
    }

    pub fn find(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|dep| dep.name == name)
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpecOverrides {
    #[serde(rename = "execDepends")]
    pub exec_depends: Vec<Dependency>,
}

/// Partial applet specification merged over `dxapp.json` when the test applet is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppletOverrides {
    #[serde(rename = "runSpec")]
    pub run_spec: RunSpecOverrides,
}

impl AppletOverrides {
    pub fn exec_depends(&self) -> &[Dependency] {
        &self.run_spec.exec_depends
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "runSpec": {
                "execDepends": self.run_spec.exec_depends,
            }
        })
    }
}
