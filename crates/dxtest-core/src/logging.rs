use crate::config::LoggingConfig;
use crate::errors::ConfigError;
use chrono::Local;
use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const LOG_LEVEL_ENV: &str = "DXTEST_LOG_LEVEL";
const LOG_PREFIX: &str = "dxtest_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_verbosity(verbose: u8) -> Self {
        match verbose {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn from_env() -> Option<Self> {
        let level = env::var(LOG_LEVEL_ENV).ok()?;
        match level.to_uppercase().as_str() {
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()))
}

fn log_age_from_name(name: &str) -> Option<SystemTime> {
    let date_part = name.strip_prefix(LOG_PREFIX)?.split('_').next()?;
    let date = chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    let midnight = date
        .and_hms_opt(0, 0, 0)?
        .and_local_timezone(Local)
        .single()?;
    Some(SystemTime::from(midnight))
}

pub(crate) fn rotate_logs(log_dir: &Path, config: &LoggingConfig) -> Result<(), ConfigError> {
    fs_err::create_dir_all(log_dir)?;

    let mut entries: Vec<PathBuf> = fs_err::read_dir(log_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(LOG_PREFIX) && n.ends_with(".log"))
        })
        .collect();
    entries.sort();

    if config.max_files > 0 && entries.len() > config.max_files {
        let to_delete = entries.len() - config.max_files;
        for path in entries.drain(0..to_delete) {
            let _ = fs_err::remove_file(path);
        }
    }

    if config.max_age_days > 0 {
        let now = SystemTime::now();
        let max_age = Duration::from_secs(config.max_age_days * 24 * 60 * 60);
        for path in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let expired = log_age_from_name(name)
                .and_then(|created| now.duration_since(created).ok())
                .is_some_and(|age| age > max_age);
            if expired {
                let _ = fs_err::remove_file(&path);
            }
        }
    }

    Ok(())
}

/// Session logging for interactive runs: a rotated log file under the XDG cache
/// directory plus a human-readable stderr stream.
pub fn init_session_logger(config: &LoggingConfig, verbose: u8) -> Result<PathBuf, ConfigError> {
    let level = LogLevel::from_env().unwrap_or_else(|| LogLevel::from_verbosity(verbose));

    let xdg_dirs = xdg::BaseDirectories::with_prefix("dxtest");
    let cache_home = xdg_dirs
        .get_cache_home()
        .ok_or_else(|| ConfigError::Xdg("Could not find cache home directory".to_string()))?;
    let logs_dir = cache_home.join("logs");
    rotate_logs(&logs_dir, config)?;

    let filename = format!(
        "{}{}_{}.log",
        LOG_PREFIX,
        Local::now().format("%Y-%m-%d_%H-%M-%S"),
        std::process::id()
    );
    let log_path = logs_dir.join(&filename);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| ConfigError::PathIo {
            path: log_path.clone(),
            source: e,
        })?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_timer(LocalTimeFormatter)
        .with_ansi(false)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTimeFormatter)
        .with_ansi(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| ConfigError::General(format!("Failed to install logger: {}", e)))?;

    let symlink_path = cache_home.join("dxtest.log");
    let _ = fs_err::remove_file(&symlink_path);
    #[cfg(unix)]
    {
        let _ = std::os::unix::fs::symlink(Path::new("logs").join(&filename), &symlink_path);
    }

    tracing::debug!("--- Logger Initialized ({}) ---", log_path.display());
    Ok(log_path)
}

/// Stderr-only logging, used inside the platform job where no cache directory is kept.
pub fn init_stderr_logger(verbose: u8) {
    let level = LogLevel::from_env().unwrap_or_else(|| LogLevel::from_verbosity(verbose));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .with_timer(LocalTimeFormatter)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

pub fn format_command_for_display(command: &Command) -> String {
    let program = command.get_program().to_string_lossy();
    let args = command
        .get_args()
        .map(|arg| {
            let s = arg.to_string_lossy();
            if s.contains(char::is_whitespace) || s.is_empty() {
                format!("'{}'", s)
            } else {
                s.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} {}", program, args)
}

pub fn log_command(command: &Command) {
    tracing::debug!("[CMD] {}", format_command_for_display(command));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_rotate_logs_max_files() {
        let dir = tempdir().unwrap();
        let path = dir.path();

        let filenames = [
            "dxtest_2023-01-01_10-00-00_1.log",
            "dxtest_2023-01-02_10-00-00_1.log",
            "dxtest_2023-01-03_10-00-00_1.log",
            "dxtest_2023-01-04_10-00-00_1.log",
        ];
        for name in &filenames {
            File::create(path.join(name)).unwrap();
        }
        File::create(path.join("notes.txt")).unwrap();

        let config = LoggingConfig {
            max_files: 2,
            max_age_days: 0,
        };
        rotate_logs(path, &config).unwrap();

        assert!(!path.join(filenames[0]).exists());
        assert!(!path.join(filenames[1]).exists());
        assert!(path.join(filenames[2]).exists());
        assert!(path.join(filenames[3]).exists());
        assert!(path.join("notes.txt").exists(), "Non-log file should be kept");
    }

    #[test]
    fn test_rotate_logs_max_age() {
        let dir = tempdir().unwrap();
        let path = dir.path();

        let now = Local::now();
        let recent = format!("dxtest_{}_10-00-00_1.log", now.format("%Y-%m-%d"));
        let old = format!(
            "dxtest_{}_10-00-00_1.log",
            (now - ChronoDuration::days(10)).format("%Y-%m-%d")
        );
        File::create(path.join(&recent)).unwrap();
        File::create(path.join(&old)).unwrap();

        let config = LoggingConfig {
            max_files: 0,
            max_age_days: 7,
        };
        rotate_logs(path, &config).unwrap();

        assert!(path.join(&recent).exists());
        assert!(!path.join(&old).exists());
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Info);
        assert_eq!(LogLevel::from_verbosity(1), LogLevel::Debug);
        assert_eq!(LogLevel::from_verbosity(5), LogLevel::Trace);
    }

    #[test]
    fn test_command_display_quotes_whitespace() {
        let mut cmd = Command::new("dx");
        cmd.arg("upload").arg("my file.txt").arg("");
        assert_eq!(format_command_for_display(&cmd), "dx upload 'my file.txt' ''");
    }
}
