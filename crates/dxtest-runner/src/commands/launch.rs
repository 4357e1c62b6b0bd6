use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets, Attribute, Cell, Color, Table};
use dxtest_client::job::log_path;
use dxtest_client::{LaunchSettings, LifecycleEvent, LifecycleManager, TestRequest};
use dxtest_core::config::Config;
use dxtest_core::model::{TerminalStatus, TestRunReport};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::cli::LaunchArgs;
use crate::commands::{connect, GlobalArgs};
use crate::error::CliError;

pub fn settings_from(args: &LaunchArgs, config: &Config) -> LaunchSettings {
    let mut settings = LaunchSettings::from(&config.launch);
    if let Some(instance_type) = &args.instance_type {
        settings.instance_type = instance_type.clone();
    }
    if let Some(secs) = args.poll_interval {
        settings.poll_interval = Duration::from_secs(secs);
    }
    if let Some(output_dir) = &args.output_dir {
        settings.output_dir = output_dir.clone();
    }
    settings
}

fn job_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let template =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}");
    if let Ok(style) = template {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub fn summary_table(report: &TestRunReport, output_dir: &Path) -> Table {
    let status = match report.testing_status {
        TerminalStatus::Complete => Cell::new("Complete").fg(Color::Green),
        TerminalStatus::Failed => Cell::new("Failed").fg(Color::Red),
    };
    let log = match report.testing_status {
        TerminalStatus::Complete => log_path(output_dir, &report.test_time)
            .display()
            .to_string(),
        TerminalStatus::Failed => "-".to_string(),
    };

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Testing status")
                .add_attribute(Attribute::Bold)
                .fg(Color::Cyan),
            Cell::new("Job ID")
                .add_attribute(Attribute::Bold)
                .fg(Color::Cyan),
            Cell::new("Test time")
                .add_attribute(Attribute::Bold)
                .fg(Color::Cyan),
            Cell::new("Log")
                .add_attribute(Attribute::Bold)
                .fg(Color::Cyan),
        ]);
    table.add_row(vec![
        status.add_attribute(Attribute::Bold),
        Cell::new(report.job_id.as_str()).fg(Color::Yellow),
        Cell::new(report.test_time.as_str()),
        Cell::new(log),
    ]);
    table
}

pub fn handle_launch(
    args: LaunchArgs,
    global: &GlobalArgs,
    config: &Config,
) -> Result<(), CliError> {
    let settings = settings_from(&args, config);
    let gateway = connect(global, &config.dx)?;
    println!(
        "- Testing '{}' in project {} on {}...",
        args.root_dir.display().to_string().cyan(),
        gateway.project().cyan(),
        settings.instance_type.cyan()
    );

    let request = TestRequest {
        script: args.script,
        files: args.files,
        src_dir: args.root_dir,
        manifest: args.json,
        modules: args.modules,
        add_opts: args.add_opts,
    };
    let output_dir = settings.output_dir.clone();

    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        LifecycleManager::new(&gateway, settings)
            .with_events(tx)
            .run(&request)
    });

    let mut pb: Option<ProgressBar> = None;
    for event in rx {
        match event {
            LifecycleEvent::Building { applet_name, stamp } => {
                println!(
                    "- Building test applet for {} (run {})...",
                    applet_name.bold(),
                    stamp.to_string().dimmed()
                );
            }
            LifecycleEvent::EnvironmentReady { applet_id, folder } => {
                println!(
                    "  {} applet {} with test data in {}",
                    "OK".green().bold(),
                    applet_id.to_string().dimmed(),
                    folder
                );
            }
            LifecycleEvent::JobLaunched { job_id } => {
                println!("- Launched job {}", job_id.to_string().bold());
                let spinner = job_spinner();
                spinner.set_message("waiting for job to start");
                pb = Some(spinner);
            }
            LifecycleEvent::JobState { job_id, state } => {
                if let Some(pb) = pb.as_ref() {
                    pb.set_message(format!("{} is {}", job_id, state));
                }
            }
            LifecycleEvent::JobFinished { job_id, status } => {
                if let Some(pb) = pb.take() {
                    pb.finish_and_clear();
                }
                match status {
                    TerminalStatus::Complete => {
                        println!("  {} {}", "DONE".green().bold(), job_id.to_string().dimmed())
                    }
                    TerminalStatus::Failed => {
                        println!("  {} {}", "FAIL".red().bold(), job_id.to_string().dimmed())
                    }
                }
            }
            LifecycleEvent::ArtifactUnpacked { dir } => {
                println!("- Test log unpacked into {}", dir.display());
            }
            LifecycleEvent::TearingDown => {
                println!("- Removing test applet and scratch folder...");
            }
            LifecycleEvent::TornDown { clean } => {
                if !clean {
                    println!(
                        "  {} some test objects could not be removed; see the log",
                        "WARN".yellow().bold()
                    );
                }
            }
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let report = worker
        .join()
        .map_err(|e| {
            let message = e
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| e.downcast_ref::<&str>().map(|s| s.to_string()))
                .unwrap_or_else(|| "unknown panic".to_string());
            CliError::WorkerPanicked(message)
        })??;

    println!("{}", summary_table(&report, &output_dir));

    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }

    match report.testing_status {
        TerminalStatus::Complete => Ok(()),
        TerminalStatus::Failed => Err(CliError::TestFailed {
            job_id: report.job_id,
        }),
    }
}

fn write_report(path: &Path, report: &TestRunReport) -> Result<(), CliError> {
    let content = serde_json::to_string_pretty(report)?;
    fs_err::write(path, content)?;
    tracing::info!("Wrote run report to {}", path.display());
    Ok(())
}
