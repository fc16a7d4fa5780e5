use super::RunContext;
use crate::derived;
use anyhow::Context as _;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    /// By source then destination node number, within each section
    Node,
    /// By RTT within each source node, headers and timestamps dropped
    Rtt,
}

#[derive(Debug, Args)]
pub struct SortCommand {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value = "node")]
    pub by: SortOrder,
}

impl SortCommand {
    pub fn execute(self, context: &RunContext) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(&self.input)
            .with_context(|| format!("Failed to read {}", self.input.display()))?;
        let lines = content.lines().collect::<Vec<_>>();

        let sorted = match self.by {
            SortOrder::Node => derived::sort_by_node(&lines),
            SortOrder::Rtt => derived::sort_by_rtt(&lines),
        };
        if sorted.is_empty() {
            log::warn!("Nothing to sort in {}", self.input.display());
        }

        let mut out = sorted.join("\n");
        out.push('\n');
        std::fs::write(&self.output, out)
            .with_context(|| format!("Failed to write {}", self.output.display()))?;
        log::info!(
            "Wrote {} sorted lines to {}",
            sorted.len(),
            self.output.display()
        );

        context.write_json(vec![self.input], serde_json::json!({ "lines": sorted.len() }))
    }
}
