use crate::cli::{Cli, Commands};
use crate::error::CliError;
use clap::Parser;
use std::ffi::OsString;

pub mod cli;
pub mod commands;
pub mod error;

pub fn parse_command_line<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args)
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    let global = commands::GlobalArgs {
        verbose: cli.verbose,
        project: cli.project,
        dx: cli.dx,
    };
    match cli.command {
        Commands::Launch(args) => {
            let config = dxtest_core::config::load_config()?;
            commands::launch::handle_launch(args, &global, &config)
        }
        Commands::InternalPytest(args) => commands::entry::handle_internal_pytest(args, &global),
        Commands::Completions(args) => {
            commands::completions::handle_completions(args, &mut std::io::stdout())
        }
    }
}
