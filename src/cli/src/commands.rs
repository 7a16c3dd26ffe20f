use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

fn about_message() -> String {
    format!(
        "Runs the analytics pipeline scripts in order, with per-step resource monitoring\nVersion: {}",
        env!("CARGO_PKG_VERSION")
    )
}

#[derive(Parser, Clone)]
#[clap(name = "pipeline-runner", about = about_message(), version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// TOML configuration file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project root containing `dataset/` and `scripts/`; overrides the configured one
    #[clap(long, global = true)]
    pub project_root: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run every configured step and write a timestamped log
    Run(RunArgs),

    /// Show the effective configuration and the state of the project
    Info {
        /// Output information in JSON format
        #[clap(long)]
        json: bool,
    },

    /// List previous run logs, oldest first
    Logs {
        /// Print the most recent run log
        #[clap(long)]
        last: bool,
    },

    /// Query each configured GPU probe once and show what it reports
    ProbeGpu {
        /// Output readings in JSON format
        #[clap(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Answer yes to every prompt (installs missing modules, deletes old logs)
    #[clap(long, conflicts_with = "no_input")]
    pub yes: bool,

    /// Never prompt; every question is answered with no
    #[clap(long)]
    pub no_input: bool,

    /// Skip collecting host details for the log header
    #[clap(long)]
    pub no_debug_info: bool,
}
