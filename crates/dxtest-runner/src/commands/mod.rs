use dxtest_client::gateway::DxCliGateway;
use dxtest_core::config::DxConfig;
use dxtest_core::errors::GatewayError;
use std::path::PathBuf;

pub mod completions;
pub mod entry;
pub mod launch;

pub struct GlobalArgs {
    pub verbose: u8,
    pub project: Option<String>,
    pub dx: Option<PathBuf>,
}

/// Flags win over config; the project falls back to whatever `dx` has selected.
pub(crate) fn connect(global: &GlobalArgs, dx: &DxConfig) -> Result<DxCliGateway, GatewayError> {
    let executable = DxCliGateway::locate(global.dx.as_deref().or(dx.executable.as_deref()))?;
    let project = match global.project.clone().or_else(|| dx.project.clone()) {
        Some(project) => project,
        None => DxCliGateway::discover_project(&executable)?,
    };
    tracing::debug!("Using {} in {}", executable.display(), project);
    Ok(DxCliGateway::new(executable, project))
}
