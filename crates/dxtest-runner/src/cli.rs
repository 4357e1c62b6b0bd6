use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use dxtest_core::model::{AppletOption, DependencyRequest};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dxtest",
    author,
    version,
    about = "Build, run and clean up a throwaway test applet on DNAnexus.",
    long_about = "Builds a temporary copy of an applet with a minimal set of dependencies, \
                  stages a pytest script and its data in a scratch folder, runs the tests as a \
                  platform job, downloads the log and removes everything it created."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity level (-v for debug, -vv for trace)")]
    pub verbose: u8,

    #[arg(
        long,
        global = true,
        help = "Project to build and run in (defaults to the currently selected project)"
    )]
    pub project: Option<String>,

    #[arg(long, global = true, help = "Path to the dx executable")]
    pub dx: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Build a test applet, run a test script and collect its log")]
    Launch(LaunchArgs),

    #[command(hide = true)]
    InternalPytest(InternalPytestArgs),

    #[command(about = "Generate shell completions")]
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct LaunchArgs {
    #[arg(long, help = "pytest script to run inside the job")]
    pub script: PathBuf,

    #[arg(long, help = "Directory of test data to upload next to the script")]
    pub files: PathBuf,

    #[arg(long = "root_dir", help = "Root directory of the applet to test")]
    pub root_dir: PathBuf,

    #[arg(long, help = "Applet manifest (defaults to <root_dir>/dxapp.json)")]
    pub json: Option<PathBuf>,

    #[arg(long = "instance_type", help = "Instance type for the test job")]
    pub instance_type: Option<String>,

    #[arg(
        long = "add_opts",
        num_args = 1..,
        value_name = "NAME:VALUE",
        help = "Extra applet inputs; values that look like file-xxxx become file links"
    )]
    pub add_opts: Vec<AppletOption>,

    #[arg(
        long,
        num_args = 1..,
        value_name = "NAME[:VERSION]",
        help = "Modules from the manifest to install, optionally at a given tag"
    )]
    pub modules: Vec<DependencyRequest>,

    #[arg(long = "output_dir", help = "Where the test log is unpacked")]
    pub output_dir: Option<PathBuf>,

    #[arg(long = "poll_interval", value_name = "SECONDS", help = "Seconds between job status checks")]
    pub poll_interval: Option<u64>,

    #[arg(long, help = "Write the run report as JSON to this path")]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InternalPytestArgs {
    #[arg(long = "output_prefix")]
    pub output_prefix: String,

    #[arg(long = "testing_script")]
    pub testing_script: String,

    #[arg(long = "testing_directory")]
    pub testing_directory: String,

    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
    pub env: Vec<(String, String)>,

    #[arg(long = "work_dir", default_value = ".")]
    pub work_dir: PathBuf,

    #[arg(long = "job_output", default_value = "job_output.json")]
    pub job_output: PathBuf,

    #[arg(long, default_value = "pytest")]
    pub pytest: String,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    #[arg(long, help = "Shell to generate completions for")]
    pub shell: Shell,
}

fn parse_env(value: &str) -> Result<(String, String), String> {
    dxtest_client::entry::parse_env_pair(value)
        .ok_or_else(|| format!("'{}' is not of the form KEY=VALUE", value))
}
