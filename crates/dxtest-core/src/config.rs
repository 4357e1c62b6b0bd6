use crate::constants::defaults;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub launch: LaunchConfig,
    pub dx: DxConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    pub instance_type: String,
    pub poll_interval_secs: u64,
    pub output_dir: PathBuf,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            instance_type: defaults::INSTANCE_TYPE.to_string(),
            poll_interval_secs: defaults::POLL_INTERVAL_SECS,
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
        }
    }
}

impl LaunchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DxConfig {
    pub executable: Option<PathBuf>,
    pub project: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub max_files: usize,
    pub max_age_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            max_files: 20,
            max_age_days: 7,
        }
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.launch.output_dir = expand_path(&config.launch.output_dir);
        config.dx.executable = config.dx.executable.as_deref().map(expand_path);
        if config.launch.instance_type.trim().is_empty() {
            return Err(ConfigError::General(
                "launch.instance_type must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        match fs_err::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "No config file at {}, using defaults.",
                    path.display()
                );
                Ok(Config::default())
            }
            Err(e) => Err(ConfigError::PathIo {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dxtest");
    xdg_dirs
        .get_config_home()
        .map(|home| home.join(CONFIG_FILE))
        .ok_or_else(|| ConfigError::Xdg("Could not find config home directory".to_string()))
}

pub fn load_config() -> Result<Config, ConfigError> {
    Config::load_from_path(&config_path()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.launch.instance_type, "mem1_ssd1_v2_x4");
        assert_eq!(config.launch.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.launch.output_dir, PathBuf::from("test_out"));
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
[launch]
instance_type = "mem2_ssd1_v2_x8"

[dx]
project = "project-123"
"#,
        )
        .unwrap();
        assert_eq!(config.launch.instance_type, "mem2_ssd1_v2_x8");
        assert_eq!(config.launch.poll_interval_secs, 10);
        assert_eq!(config.dx.project.as_deref(), Some("project-123"));
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_tilde_is_expanded() {
        let config = Config::from_toml_str(
            r#"
[dx]
executable = "~/bin/dx"
"#,
        )
        .unwrap();
        let exe = config.dx.executable.unwrap();
        assert!(!exe.to_string_lossy().starts_with('~'));
        assert!(exe.ends_with("bin/dx"));
    }

    #[test]
    fn test_empty_instance_type_rejected() {
        let err = Config::from_toml_str("[launch]\ninstance_type = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::General(_)));
    }

    #[test]
    fn test_malformed_config_is_error() {
        let err = Config::from_toml_str("[launch\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }
}
