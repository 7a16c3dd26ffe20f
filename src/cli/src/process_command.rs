use crate::commands::{Cli, Command};
use crate::handlers;
use anyhow::Result;
use clap::Parser;
use pipeline_runner::config::{Config, ConfigLoader};

/// Process the command line.
pub fn process_command() -> Result<()> {
    // NOTE: this exits the process if there is a parsing error
    let cli = Cli::parse();

    // Use the --config flag, if provided, when loading the configuration
    let mut config: Config = ConfigLoader::load(cli.config.as_deref())?;
    if let Some(root) = cli.project_root {
        config.project_root = root;
    }

    match cli.command {
        Command::Run(args) => handlers::run(config, args),
        Command::Info { json } => handlers::info(&config, json),
        Command::Logs { last } => handlers::logs(&config, last),
        Command::ProbeGpu { json } => handlers::probe_gpu(&config, json),
    }
}
