use super::{extract_non_empty, RunContext};
use crate::extract::{Extraction, RecordPattern};
use crate::report::{summary_line, MetricValue, MetricsReport};
use crate::stats::{self, AggregateStatistics};
use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct StatsCommand {
    #[arg(long)]
    pub input: PathBuf,

    /// Shape of the input lines: rtt, coordinate, node_drift or centroid_drift.
    #[arg(long, default_value = "rtt")]
    pub pattern: RecordPattern,

    /// Percentile to report, may be repeated. Overrides the configured percentiles.
    #[arg(long = "percentile")]
    pub percentiles: Vec<f64>,

    /// Also write the report to this file.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct StatsOutput<'a> {
    signed: bool,
    min_line: usize,
    max_line: usize,
    statistics: &'a AggregateStatistics,
}

impl StatsCommand {
    pub fn execute(self, context: &RunContext) -> anyhow::Result<()> {
        let settings = context.settings.clone().percentiles(self.percentiles);
        settings.validate()?;

        let extraction = extract_non_empty(self.pattern, &self.input)?;
        let values = extraction.values();
        let statistics = AggregateStatistics::compute(&values, &settings.percentiles)
            .with_context(|| format!("Statistics of {}", self.input.display()))?;

        // first occurrence of the extremes
        let records = extraction.records.as_slice();
        let min_at = values
            .iter()
            .position(|v| *v == statistics.min)
            .context("Minimum not found")?;
        let max_at = values
            .iter()
            .position(|v| *v == statistics.max)
            .context("Maximum not found")?;

        let signed = has_differences(&extraction);
        let value = |v: f64| {
            if signed {
                MetricValue::Signed(v)
            } else {
                MetricValue::Plain(v)
            }
        };
        let p99 = stats::percentile(&values, 99.0)?;
        if settings.echo {
            for (name, index) in [("Min", min_at), ("Max", max_at)] {
                println!(
                    "{} (line {})",
                    summary_line(name, &value(values[index])),
                    records[index].line_number
                );
            }
            println!("{}", summary_line("p99", &value(p99)));
        }

        let report = statistics_report(&self.input, &extraction, &statistics, signed);
        match &self.report {
            Some(path) => report
                .write_to(path, settings.echo)
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None if settings.echo => println!("{}", report.render()),
            None => {}
        }

        context.write_json(
            vec![self.input],
            StatsOutput {
                signed,
                min_line: records[min_at].line_number,
                max_line: records[max_at].line_number,
                statistics: &statistics,
            },
        )
    }
}

/// Difference logs hold negative values, so their statistics are shown signed with the sign
/// split.
fn has_differences(extraction: &Extraction) -> bool {
    extraction
        .records
        .iter()
        .any(|record| record.measurement.is_difference())
}

fn statistics_report(
    input: &Path,
    extraction: &Extraction,
    statistics: &AggregateStatistics,
    signed: bool,
) -> MetricsReport {
    let mut report = MetricsReport::new(format!("Statistics of {}", input.display()));
    report
        .add_statistics("Values", statistics, signed)
        .add_lines("Lines", &extraction.report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Extractor;

    const DIFFERENCES: &str = "\
=== Intra-network pings for net_1 ===
a → b: +2.500ms [serf_rtt:12.500ms, ping_rtt:10.000ms]
b → c: -1.000ms [serf_rtt:3.000ms, ping_rtt:4.000ms]
";

    fn report_of(log: &str) -> anyhow::Result<String> {
        let extraction = Extractor::new(RecordPattern::Rtt).extract_reader(log.as_bytes())?;
        let statistics = AggregateStatistics::compute(&extraction.values(), &[50.0])?;
        let signed = has_differences(&extraction);
        Ok(statistics_report(Path::new("diff.log"), &extraction, &statistics, signed).render())
    }

    #[test]
    fn difference_logs_are_reported_signed() -> anyhow::Result<()> {
        let rendered = report_of(DIFFERENCES)?;
        assert!(rendered.contains("+2.500"));
        assert!(rendered.contains("-1.000"));
        assert!(rendered.contains("positive"));
        assert!(rendered.contains("50.000%"));
        Ok(())
    }

    #[test]
    fn plain_rtt_logs_have_no_sign_split() -> anyhow::Result<()> {
        let rendered = report_of("a → b: 12.500ms\nb → c: 3.000ms\n")?;
        assert!(rendered.contains("12.500"));
        assert!(!rendered.contains("+12.500"));
        assert!(!rendered.contains("positive"));
        Ok(())
    }
}
