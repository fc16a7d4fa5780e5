use crate::cli::NetcoordCli;
use crate::command::RunContext;
use crate::settings::AnalysisSettings;
use anyhow::Context;

pub mod bucket;
pub mod cli;
pub mod command;
pub mod compare;
pub mod derived;
pub mod extract;
pub mod frame;
pub mod model;
mod partition;
pub mod plot;
pub mod report;
pub mod settings;
pub mod stats;

/// Run the command selected on the command line with the settings it points to.
pub fn execute_command(cli: NetcoordCli) -> anyhow::Result<()> {
    let settings = AnalysisSettings::load(cli.config.as_deref())
        .context("Failed to load settings")?
        .quiet(cli.quiet);
    settings.validate()?;
    log::debug!("Using settings: {settings:?}");

    let context = RunContext {
        command: cli.command.name(),
        settings,
        json_output: cli.json,
    };
    cli.command
        .execute(&context)
        .with_context(|| format!("Command `{}` failed", context.command))
}
