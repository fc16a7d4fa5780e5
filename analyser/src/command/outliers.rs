use super::RunContext;
use crate::derived::Outliers;
use anyhow::Context as _;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct OutliersCommand {
    /// A signed difference log, as written by `diff`.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = "outliers.txt")]
    pub output: PathBuf,

    /// Lines kept per group.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

impl OutliersCommand {
    pub fn execute(self, context: &RunContext) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(&self.input)
            .with_context(|| format!("Failed to read {}", self.input.display()))?;
        let lines = content.lines().collect::<Vec<_>>();

        let outliers = Outliers::select(&lines, self.top);
        if outliers.closest.is_empty() {
            anyhow::bail!(
                "{} holds no signed difference lines with serf_rtt and ping_rtt",
                self.input.display()
            );
        }

        let rendered = outliers.render();
        std::fs::write(&self.output, &rendered)
            .with_context(|| format!("Failed to write {}", self.output.display()))?;
        log::info!("Wrote outliers to {}", self.output.display());
        if context.settings.echo {
            println!("{rendered}");
        }

        context.write_json(vec![self.input], &outliers)
    }
}
