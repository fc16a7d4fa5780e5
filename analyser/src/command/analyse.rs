use super::{create_dir, extract_non_empty, RunContext};
use crate::extract::{ExtractionReport, RecordPattern};
use crate::frame::{self, DifferenceRow, GroupSummary, PingRanges};
use crate::plot::{self, BoxStats};
use crate::report::{MetricValue, MetricsReport};
use crate::stats::{self, AggregateStatistics, StatsError};
use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

const HISTOGRAM_BINS: usize = 30;

#[derive(Debug, Args)]
pub struct AnalyseCommand {
    /// A signed difference log, as written by `diff`.
    #[arg(long)]
    pub input: PathBuf,

    /// Where the text report is written.
    #[arg(long, default_value = "analysis_output.txt")]
    pub report: PathBuf,

    /// Directory for the distribution charts. No charts are drawn without it.
    #[arg(long)]
    pub charts: Option<PathBuf>,

    /// Differences within this many ms count as a low deviation.
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
struct AnalysisOutput {
    diff: AggregateStatistics,
    serf_rtt: AggregateStatistics,
    ping_rtt: AggregateStatistics,
    mae: f64,
    rmse: f64,
    correlation: Option<f64>,
    network_types: Vec<GroupSummary>,
    deviations: Vec<GroupSummary>,
    ping_ranges: Vec<GroupSummary>,
    lines: ExtractionReport,
}

impl AnalyseCommand {
    pub fn execute(self, context: &RunContext) -> anyhow::Result<()> {
        let settings = context
            .settings
            .clone()
            .deviation_threshold_ms(self.threshold);
        settings.validate()?;

        let extraction = extract_non_empty(RecordPattern::Rtt, &self.input)?;
        let rows = extraction
            .records
            .iter()
            .filter_map(DifferenceRow::from_record)
            .collect::<Vec<_>>();
        if rows.is_empty() {
            anyhow::bail!(
                "{} holds no signed difference lines with serf_rtt and ping_rtt",
                self.input.display()
            );
        }
        log::debug!("Analysing {} differences", rows.len());

        let ranges = PingRanges::new(settings.ping_range_edges.clone());
        let frame = frame::difference_frame(&rows, settings.deviation_threshold_ms, &ranges)?;

        let diffs = frame::column_values(&frame, "diff")?;
        let serf = frame::column_values(&frame, "serf_rtt")?;
        let ping = frame::column_values(&frame, "ping_rtt")?;

        let correlation = match stats::pearson_correlation(&ping, &serf) {
            Ok(r) => Some(r),
            Err(StatsError::UndefinedCorrelation) => None,
            Err(e) => return Err(e.into()),
        };
        let output = AnalysisOutput {
            diff: AggregateStatistics::compute(&diffs, &settings.percentiles)?,
            serf_rtt: AggregateStatistics::compute(&serf, &settings.percentiles)?,
            ping_rtt: AggregateStatistics::compute(&ping, &settings.percentiles)?,
            mae: stats::mean_absolute_error(&serf, &ping)?,
            rmse: stats::root_mean_square_error(&serf, &ping)?,
            correlation,
            network_types: frame::network_type_summary(&frame)?,
            deviations: frame::deviation_summary(&frame)?,
            ping_ranges: frame::ping_range_summary(&frame, &ranges)?,
            lines: extraction.report,
        };

        let mut report = MetricsReport::new(format!("Analysis of {}", self.input.display()));
        report
            .add_statistics("RTT difference (ms)", &output.diff, true)
            .add_statistics("Serf RTT (ms)", &output.serf_rtt, false)
            .add_statistics("Ping RTT (ms)", &output.ping_rtt, false)
            .add_metrics(
                "Error",
                vec![
                    ("MAE", MetricValue::Plain(output.mae)),
                    ("RMSE", MetricValue::Plain(output.rmse)),
                    (
                        "correlation",
                        output
                            .correlation
                            .map(MetricValue::Plain)
                            .unwrap_or_else(|| MetricValue::Text("undefined".to_string())),
                    ),
                ],
            )
            .add_groups("Network types", &output.network_types)
            .add_groups(
                format!("Deviation (threshold ±{} ms)", settings.deviation_threshold_ms),
                &output.deviations,
            )
            .add_groups("Ping RTT range impact", &output.ping_ranges)
            .add_lines(format!("Lines of {}", self.input.display()), &output.lines);
        report
            .write_to(&self.report, settings.echo)
            .with_context(|| format!("Failed to write {}", self.report.display()))?;

        if let Some(dir) = &self.charts {
            create_dir(dir)?;
            draw_charts(dir, &rows, &diffs, &serf, &ping)?;
        }

        context.write_json(vec![self.input], &output)
    }
}

fn draw_charts(
    dir: &std::path::Path,
    rows: &[DifferenceRow],
    diffs: &[f64],
    serf: &[f64],
    ping: &[f64],
) -> anyhow::Result<()> {
    let mut by_type: Vec<(String, Vec<f64>)> = Vec::new();
    for row in rows {
        let network_type = row.network_type();
        match by_type.iter_mut().find(|(t, _)| t == network_type) {
            Some((_, values)) => values.push(row.diff),
            None => by_type.push((network_type.to_string(), vec![row.diff])),
        }
    }
    if by_type.len() < 2 {
        by_type = vec![("all".to_string(), diffs.to_vec())];
    }

    let histogram = plot::histogram_bins(&by_type, HISTOGRAM_BINS)?;
    plot::histogram_chart(
        &histogram,
        "Distribution of RTT differences",
        "Serf RTT - ping RTT (ms)",
        &dir.join("rtt_difference_distribution.png"),
    )?;

    let points = ping.iter().copied().zip(serf.iter().copied()).collect::<Vec<_>>();
    plot::scatter_chart(
        &points,
        "Serf RTT against ping RTT",
        "Ping RTT (ms)",
        "Serf RTT (ms)",
        &dir.join("serf_vs_ping_scatter.png"),
    )?;

    let boxes = by_type
        .iter()
        .map(|(label, values)| BoxStats::compute(label.as_str(), values))
        .collect::<Result<Vec<_>, _>>()?;
    plot::box_chart(
        &boxes,
        "RTT difference by network type",
        "Serf RTT - ping RTT (ms)",
        &dir.join("rtt_difference_by_network_type.png"),
    )?;

    Ok(())
}
