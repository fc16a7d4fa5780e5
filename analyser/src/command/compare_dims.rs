use super::{extract_non_empty, RunContext};
use crate::cli::parse_labelled_path;
use crate::compare::compare_dimensions;
use crate::extract::RecordPattern;
use crate::report::MetricsReport;
use anyhow::Context as _;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct CompareDimsCommand {
    /// First signed difference log as `label=path`.
    #[arg(long, value_parser = parse_labelled_path)]
    pub a: (String, PathBuf),

    /// Second signed difference log as `label=path`.
    #[arg(long, value_parser = parse_labelled_path)]
    pub b: (String, PathBuf),

    /// Where the comparison report is written.
    #[arg(long, default_value = "dimension_comparison.txt")]
    pub output: PathBuf,
}

impl CompareDimsCommand {
    pub fn execute(self, context: &RunContext) -> anyhow::Result<()> {
        let (label_a, path_a) = self.a;
        let (label_b, path_b) = self.b;

        let a = extract_non_empty(RecordPattern::Rtt, &path_a)?;
        let b = extract_non_empty(RecordPattern::Rtt, &path_b)?;
        let comparison = compare_dimensions(label_a, &a.records, label_b, &b.records);
        if comparison.rows.is_empty() {
            anyhow::bail!(
                "{} and {} share no node pair",
                path_a.display(),
                path_b.display()
            );
        }

        let mut report = MetricsReport::new(format!(
            "{} vs {}",
            comparison.label_a, comparison.label_b
        ));
        report.add_dimensions(&comparison);
        report
            .write_to(&self.output, context.settings.echo)
            .with_context(|| format!("Failed to write {}", self.output.display()))?;

        context.write_json(vec![path_a, path_b], &comparison)
    }
}
