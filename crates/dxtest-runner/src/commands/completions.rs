use crate::cli::{Cli, CompletionsArgs};
use crate::error::CliError;
use clap::CommandFactory;
use clap_complete::generate;
use std::io::Write;

pub fn handle_completions(args: CompletionsArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "dxtest", out);
    Ok(())
}
