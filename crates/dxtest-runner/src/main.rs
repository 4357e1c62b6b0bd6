use colored::Colorize;
use dxtest_runner::cli::Commands;

fn main() {
    let cli = match dxtest_runner::parse_command_line(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    match &cli.command {
        Commands::Launch(_) => {
            let logging_config = dxtest_core::config::load_config()
                .map(|c| c.logging)
                .unwrap_or_default();

            if let Err(e) = dxtest_core::logging::init_session_logger(&logging_config, cli.verbose)
            {
                eprintln!(
                    "{}",
                    format!("[ERROR] Failed to initialize session logger: {}", e).red()
                );
            }
        }
        Commands::InternalPytest(_) => dxtest_core::logging::init_stderr_logger(cli.verbose),
        Commands::Completions(_) => {}
    }

    if let Err(e) = dxtest_runner::run(cli) {
        eprintln!("{}", format!("[ERROR] {}", e).red());
        std::process::exit(1);
    }
}
