use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "multisect")]
#[command(version, about = "Locate the commits where command output changes across a range")]
pub struct Cli {
    /// Repository whose commit range is studied
    #[arg(long, default_value = ".", global = true)]
    pub repository: PathBuf,

    /// Branch to restore when the session ends (defaults to the current one)
    #[arg(long, global = true)]
    pub branch: Option<String>,

    /// Directory the commands run in (defaults to the repository)
    #[arg(long, global = true)]
    pub workdir: Option<PathBuf>,

    /// Directory receiving one raw capture per probed commit and target
    #[arg(long, default_value = "multisect-out", global = true)]
    pub outputdir: PathBuf,

    /// Oldest commit of the range (included)
    #[arg(long, global = true)]
    pub first: Option<String>,

    /// Last known-good commit; the range starts just after it
    #[arg(long, global = true)]
    pub last_before: Option<String>,

    /// Newest commit of the range (included)
    #[arg(long, global = true)]
    pub last: Option<String>,

    /// Short commit id prefix length
    #[arg(long, default_value = "12", global = true)]
    pub short: usize,

    /// Target whose output to observe (repeatable)
    #[arg(short, long = "target", global = true)]
    pub target: Vec<String>,

    /// Observe the make command's own output instead of per-target tests
    #[arg(long, global = true)]
    pub build: bool,

    /// Command run at every probed commit before anything is observed
    #[arg(long, global = true)]
    pub configure_command: Option<String>,

    /// Build command; with --build its output is the observation
    #[arg(long, global = true)]
    pub make_command: Option<String>,

    /// Test command run per target; `{}` is replaced by the target path
    #[arg(long, global = true)]
    pub test_command: Option<String>,

    /// Where to write the JSON report (default: <outputdir>/report.json)
    #[arg(long, global = true)]
    pub json: Option<PathBuf>,

    /// Disable the progress bars
    #[arg(long, global = true)]
    pub quiet: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Locate every output transition while probing as few commits as possible
    Run,
    /// Probe every commit in the range
    Sweep,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run => cmd::cmd_run(&cli),
        Commands::Sweep => cmd::cmd_sweep(&cli),
    }
}
