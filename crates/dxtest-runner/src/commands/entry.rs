use crate::cli::InternalPytestArgs;
use crate::commands::{connect, GlobalArgs};
use crate::error::CliError;
use dxtest_client::entry::{EntryInputs, PytestEntry};
use dxtest_core::config::DxConfig;
use dxtest_core::constants::platform;
use dxtest_core::model::FileId;

/// Results go to the job's own workspace container; the platform moves job
/// outputs into the output folder from there.
fn job_workspace() -> DxConfig {
    DxConfig {
        project: std::env::var(platform::WORKSPACE_ENV)
            .ok()
            .filter(|w| !w.is_empty()),
        ..DxConfig::default()
    }
}

pub fn handle_internal_pytest(
    args: InternalPytestArgs,
    global: &GlobalArgs,
) -> Result<(), CliError> {
    let gateway = connect(global, &job_workspace())?;
    let inputs = EntryInputs {
        output_prefix: args.output_prefix,
        testing_script: FileId(args.testing_script),
        testing_directory: args.testing_directory,
        env: args.env,
    };
    let file_id = PytestEntry::new(&gateway, args.work_dir)
        .with_program(args.pytest)
        .run(&inputs, &args.job_output)?;
    tracing::info!("Uploaded test results as {}", file_id);
    Ok(())
}
