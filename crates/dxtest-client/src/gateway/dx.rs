use crate::archive;
use dxtest_core::{
    constants::{artifacts, defaults, platform},
    errors::GatewayError,
    gateway::{Gateway, GatewayResult, JobDescription, JobSpec},
    logging,
    manifest::AppletOverrides,
    model::{AppletId, FileId, JobId, ResourceBundle},
};
use regex::Regex;
use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
static API_ERROR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(InvalidInput|InvalidType|InvalidState|ResourceNotFound|PermissionDenied|InvalidAuthentication|SpendingLimitExceeded|ServiceUnavailable|InternalError)\b",
    )
    .unwrap()
});

const APP_ONLY_KEYS: &[&str] = &[
    "version",
    "categories",
    "developers",
    "authorizedUsers",
    "openSource",
    "regionalOptions",
    "billTo",
];

/// Gateway backed by the platform's own `dx` command line client, which owns the
/// login session.
pub struct DxCliGateway {
    executable: PathBuf,
    project: String,
}

pub fn classify_error(command: &str, stderr: &str) -> GatewayError {
    let message = stderr.trim().to_string();
    match API_ERROR_PATTERN.captures(stderr).map(|c| c[1].to_string()) {
        Some(kind) if kind == "InvalidInput" => GatewayError::InvalidInput(message),
        Some(kind) => GatewayError::Api { kind, message },
        None => GatewayError::Api {
            kind: "CommandError".to_string(),
            message: format!("'{}' failed: {}", command, message),
        },
    }
}

pub fn parse_project_from_env(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let line = line.trim().trim_start_matches("export ").trim();
        let value = line.strip_prefix(platform::PROJECT_ENV)?.strip_prefix('=')?;
        let value = value.trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn folder_arg(folder: &str) -> String {
    if folder.ends_with('/') {
        folder.to_string()
    } else {
        format!("{}/", folder)
    }
}

fn trim_folder(folder: &str) -> String {
    let trimmed = folder.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Turns a `dxapp.json` into an `applet/new` request for a throwaway test build.
pub fn build_applet_spec(
    src_dir: &Path,
    mut dxapp: Value,
    project: &str,
    resources: &[ResourceBundle],
    override_name: &str,
    overrides: &AppletOverrides,
) -> GatewayResult<Value> {
    let Some(spec) = dxapp.as_object_mut() else {
        return Err(GatewayError::MalformedResponse {
            command: src_dir.join(defaults::MANIFEST_FILE).display().to_string(),
            detail: "applet manifest is not a JSON object".to_string(),
        });
    };
    for key in APP_ONLY_KEYS {
        spec.remove(*key);
    }
    spec.insert("name".to_string(), json!(override_name));
    spec.insert("project".to_string(), json!(project));
    spec.entry("dxapi").or_insert_with(|| json!("1.0.0"));

    merge_json(&mut dxapp, &overrides.to_json());

    let run_spec = dxapp
        .get_mut("runSpec")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| GatewayError::MalformedResponse {
            command: src_dir.join(defaults::MANIFEST_FILE).display().to_string(),
            detail: "applet manifest has no runSpec object".to_string(),
        })?;

    if let Some(file) = run_spec.remove("file") {
        let code_path = src_dir.join(file.as_str().unwrap_or_default());
        let code = fs_err::read_to_string(&code_path)
            .map_err(|e| GatewayError::io(&code_path, e))?;
        run_spec.insert("code".to_string(), json!(code));
    }

    if !resources.is_empty() {
        let bundled = run_spec
            .entry("bundledDepends")
            .or_insert_with(|| json!([]));
        if let Some(list) = bundled.as_array_mut() {
            for bundle in resources {
                list.push(serde_json::to_value(bundle)?);
            }
        }
    }

    Ok(dxapp)
}

impl DxCliGateway {
    pub fn new(executable: PathBuf, project: String) -> Self {
        Self {
            executable,
            project,
        }
    }

    pub fn locate(configured: Option<&Path>) -> GatewayResult<PathBuf> {
        if let Some(path) = configured {
            return Ok(path.to_path_buf());
        }
        which::which("dx").map_err(|e| GatewayError::CommandFailed {
            command: "dx".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        })
    }

    pub fn discover_project(executable: &Path) -> GatewayResult<String> {
        if let Ok(project) = std::env::var(platform::PROJECT_ENV) {
            if !project.is_empty() {
                return Ok(project);
            }
        }
        let mut cmd = Command::new(executable);
        cmd.arg("env").arg("--bash");
        let output = run_command(cmd)?;
        parse_project_from_env(&output).ok_or_else(|| GatewayError::MalformedResponse {
            command: "dx env --bash".to_string(),
            detail: format!("no {} selected; run 'dx select' first", platform::PROJECT_ENV),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn command(&self) -> Command {
        Command::new(&self.executable)
    }

    fn qualified(&self, path: &str) -> String {
        format!("{}:{}", self.project, path)
    }

    fn api(&self, object: &str, method: &str, input: &Value) -> GatewayResult<Value> {
        let mut input_file = tempfile::Builder::new()
            .prefix("dxtest-api-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| GatewayError::io(std::env::temp_dir(), e))?;
        serde_json::to_writer(&mut input_file, input)?;
        input_file
            .flush()
            .map_err(|e| GatewayError::io(input_file.path(), e))?;

        let mut cmd = self.command();
        cmd.arg("api")
            .arg(object)
            .arg(method)
            .arg("--input")
            .arg(input_file.path());
        let stdout = run_command(cmd)?;
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(trimmed).map_err(|e| GatewayError::MalformedResponse {
            command: format!("dx api {} {}", object, method),
            detail: e.to_string(),
        })
    }

    fn new_object_id(response: &Value, command: &str) -> GatewayResult<String> {
        response
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::MalformedResponse {
                command: command.to_string(),
                detail: format!("no 'id' in response: {}", response),
            })
    }
}

fn run_command(mut cmd: Command) -> GatewayResult<String> {
    logging::log_command(&cmd);
    let display = logging::format_command_for_display(&cmd);
    let output = cmd.output().map_err(|e| GatewayError::CommandFailed {
        command: display.clone(),
        source: e,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(classify_error(&display, &stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

impl Gateway for DxCliGateway {
    fn upload_file(&self, local: &Path, folder: &str) -> GatewayResult<FileId> {
        let mut cmd = self.command();
        cmd.arg("upload")
            .arg(local)
            .arg("--destination")
            .arg(self.qualified(&folder_arg(folder)))
            .arg("--brief")
            .arg("--wait");
        let stdout = run_command(cmd)?;
        let id = stdout.trim();
        if id.is_empty() {
            return Err(GatewayError::MalformedResponse {
                command: "dx upload".to_string(),
                detail: format!("no file id returned for '{}'", local.display()),
            });
        }
        Ok(FileId::from(id))
    }

    fn upload_resources(&self, src_dir: &Path) -> GatewayResult<Vec<ResourceBundle>> {
        let resources_dir = src_dir.join(artifacts::RESOURCES_DIR);
        if !resources_dir.is_dir() {
            tracing::debug!("No resources directory in {}", src_dir.display());
            return Ok(Vec::new());
        }

        let staging = tempfile::Builder::new()
            .prefix("dxtest-resources-")
            .tempdir()
            .map_err(|e| GatewayError::io(std::env::temp_dir(), e))?;
        let tarball = staging.path().join(artifacts::RESOURCES_BUNDLE);
        archive::pack_dir(&resources_dir, &tarball).map_err(|e| GatewayError::io(&tarball, e))?;

        let mut cmd = self.command();
        cmd.arg("upload")
            .arg(&tarball)
            .arg("--destination")
            .arg(self.qualified("/"))
            .arg("--visibility")
            .arg("hidden")
            .arg("--brief")
            .arg("--wait");
        let stdout = run_command(cmd)?;
        let id = FileId::from(stdout.trim());
        tracing::info!("Uploaded resources bundle {}", id);
        Ok(vec![ResourceBundle::new(artifacts::RESOURCES_BUNDLE, &id)])
    }

    fn upload_applet(
        &self,
        src_dir: &Path,
        resources: &[ResourceBundle],
        override_name: &str,
        overrides: &AppletOverrides,
    ) -> GatewayResult<AppletId> {
        let dxapp_path = src_dir.join(defaults::MANIFEST_FILE);
        let content =
            fs_err::read_to_string(&dxapp_path).map_err(|e| GatewayError::io(&dxapp_path, e))?;
        let dxapp: Value = serde_json::from_str(&content)?;
        let spec = build_applet_spec(
            src_dir,
            dxapp,
            &self.project,
            resources,
            override_name,
            overrides,
        )?;
        let response = self.api("applet", "new", &spec)?;
        Ok(AppletId(Self::new_object_id(&response, "dx api applet new")?))
    }

    fn new_folder(&self, folder: &str) -> GatewayResult<()> {
        let mut cmd = self.command();
        cmd.arg("mkdir").arg("-p").arg(self.qualified(&trim_folder(folder)));
        run_command(cmd)?;
        Ok(())
    }

    fn remove_objects(&self, ids: &[String]) -> GatewayResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.api(&self.project, "removeObjects", &json!({ "objects": ids }))?;
        Ok(())
    }

    fn remove_folder(&self, folder: &str, recurse: bool) -> GatewayResult<()> {
        self.api(
            &self.project,
            "removeFolder",
            &json!({ "folder": trim_folder(folder), "recurse": recurse }),
        )?;
        Ok(())
    }

    fn run_job(&self, applet: &AppletId, spec: &JobSpec) -> GatewayResult<JobId> {
        let request = json!({
            "name": spec.name,
            "input": spec.input,
            "project": self.project,
            "folder": trim_folder(&spec.folder),
            "systemRequirements": {
                "*": { "instanceType": spec.instance_type }
            },
        });
        let response = self.api(applet.as_str(), "run", &request)?;
        Ok(JobId(Self::new_object_id(&response, "dx api applet run")?))
    }

    fn describe_job(&self, job: &JobId) -> GatewayResult<JobDescription> {
        let response = self.api(
            job.as_str(),
            "describe",
            &json!({ "fields": { "id": true, "state": true, "output": true } }),
        )?;
        Ok(serde_json::from_value(response)?)
    }

    fn file_state(&self, file: &FileId) -> GatewayResult<String> {
        let response = self.api(
            file.as_str(),
            "describe",
            &json!({ "fields": { "state": true } }),
        )?;
        response
            .get("state")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::MalformedResponse {
                command: format!("dx api {} describe", file),
                detail: "no 'state' in response".to_string(),
            })
    }

    fn download_file(&self, file: &FileId, dest: &Path) -> GatewayResult<()> {
        let mut cmd = self.command();
        cmd.arg("download")
            .arg(file.as_str())
            .arg("--output")
            .arg(dest)
            .arg("--overwrite");
        run_command(cmd)?;
        Ok(())
    }
}
