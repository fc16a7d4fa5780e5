use crate::command::Command;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about, version, long_about = None)]
pub struct NetcoordCli {
    /// Path to a TOML settings file. Command line flags override its values.
    #[arg(long, global = true, env = "NETCOORD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write the results of the command as JSON to this path.
    #[arg(long, global = true, env = "NETCOORD_JSON_OUTPUT")]
    pub json: Option<PathBuf>,

    /// Write reports to file only, without printing them.
    #[arg(long, global = true, default_value = "false")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Parse `label=path`. Without a label the file stem is used, `logs/5D.log` becomes `5D`.
pub(crate) fn parse_labelled_path(s: &str) -> anyhow::Result<(String, PathBuf)> {
    if let Some((label, path)) = s.split_once('=') {
        if label.is_empty() || path.is_empty() {
            anyhow::bail!("Expected `label=path`, got `{s}`");
        }
        return Ok((label.to_string(), PathBuf::from(path)));
    }

    let path = PathBuf::from(s);
    let label = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or(anyhow::anyhow!("No label or file name in `{s}`"))?;
    Ok((label, path))
}
