use anyhow::Context;
use pipeline_cli::process_command::process_command;

pub fn main() -> anyhow::Result<()> {
    process_command().context("Can't process CLI command")?;
    Ok(())
}
