use super::{create_dir, extract_non_empty, RunContext};
use crate::compare::{Comparator, ComparisonSummary, KeyScope, Pairing};
use crate::derived::{DerivedLogs, LineStyle};
use crate::extract::{ExtractionReport, RecordPattern};
use crate::frame::{self, DifferenceRow, PingRanges};
use crate::report::MetricsReport;
use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

pub const SIGNED_LOG: &str = "signed_diff.log";
pub const ABSOLUTE_LOG: &str = "absolute_diff.log";
pub const RELATIVE_LOG: &str = "relative_diff.log";
pub const SUMMARY: &str = "summary.txt";

#[derive(Debug, Args)]
pub struct DiffCommand {
    /// The measured RTT log, used as ground truth.
    #[arg(long)]
    pub ping: PathBuf,

    /// The estimated RTT log, e.g. RTTs computed from network coordinates.
    #[arg(long)]
    pub estimate: PathBuf,

    /// Directory the difference logs and the summary are written to.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    #[arg(long, value_enum, default_value_t)]
    pub pairing: Pairing,

    #[arg(long, value_enum, default_value_t)]
    pub scope: KeyScope,

    /// Overrides the configured line style.
    #[arg(long, value_enum)]
    pub style: Option<LineStyle>,

    /// Percentile to report, may be repeated. Overrides the configured percentiles.
    #[arg(long = "percentile")]
    pub percentiles: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct DiffOutput<'a> {
    #[serde(flatten)]
    summary: &'a ComparisonSummary,
    lines: InputLines,
}

/// Line accounting of both inputs.
#[derive(Debug, Serialize)]
struct InputLines {
    ping: ExtractionReport,
    estimate: ExtractionReport,
}

impl DiffCommand {
    pub fn execute(self, context: &RunContext) -> anyhow::Result<()> {
        let settings = context
            .settings
            .clone()
            .line_style(self.style)
            .percentiles(self.percentiles);
        settings.validate()?;

        let ping = extract_non_empty(RecordPattern::Rtt, &self.ping)?;
        let estimate = extract_non_empty(RecordPattern::Rtt, &self.estimate)?;

        let comparison =
            Comparator::new(self.pairing, self.scope).compare(&ping.records, &estimate.records);
        let summary = comparison
            .summary(&settings.percentiles)
            .context("No measurement could be paired between the two logs")?;

        let logs = DerivedLogs::render(&comparison, settings.line_style);
        create_dir(&self.out_dir)?;
        for (name, content) in [
            (SIGNED_LOG, &logs.signed),
            (ABSOLUTE_LOG, &logs.absolute),
            (RELATIVE_LOG, &logs.relative),
        ] {
            let path = self.out_dir.join(name);
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }

        let mut report = MetricsReport::new(format!(
            "{} vs {}",
            self.estimate.display(),
            self.ping.display()
        ));
        report
            .add_comparison(&summary)
            .add_lines(format!("Lines of {}", self.ping.display()), &ping.report)
            .add_lines(format!("Lines of {}", self.estimate.display()), &estimate.report);

        let rows = comparison
            .entries
            .iter()
            .map(DifferenceRow::from_entry)
            .collect::<Vec<_>>();
        let ranges = PingRanges::new(settings.ping_range_edges.clone());
        let frame = frame::difference_frame(&rows, settings.deviation_threshold_ms, &ranges)?;
        report
            .add_groups("Network types", &frame::network_type_summary(&frame)?)
            .add_groups("Ping RTT range impact", &frame::ping_range_summary(&frame, &ranges)?);
        let report_path = self.out_dir.join(SUMMARY);
        report
            .write_to(&report_path, settings.echo)
            .with_context(|| format!("Failed to write {}", report_path.display()))?;

        context.write_json(
            vec![self.ping, self.estimate],
            DiffOutput {
                summary: &summary,
                lines: InputLines {
                    ping: ping.report,
                    estimate: estimate.report,
                },
            },
        )
    }
}
