use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Machine readable result of one command run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryOutput {
    pub command: String,
    pub inputs: Vec<PathBuf>,
    pub data: serde_json::Value,
}

impl SummaryOutput {
    pub fn new<V>(command: &str, inputs: Vec<PathBuf>, data: V) -> anyhow::Result<Self>
    where
        V: Serialize,
    {
        Ok(Self {
            command: command.to_string(),
            inputs,
            data: serde_json::to_value(data)?,
        })
    }

    /// Write the summary as pretty printed JSON.
    pub fn write_to<P>(&self, path: P) -> anyhow::Result<()>
    where
        P: AsRef<Path>,
    {
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        log::info!("Wrote JSON summary to {}", path.as_ref().display());
        Ok(())
    }
}
