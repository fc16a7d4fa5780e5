use super::{extract_non_empty, RunContext};
use crate::bucket::{self, BucketSummary, CentroidPoint};
use crate::extract::RecordPattern;
use crate::plot::{self, Band};
use crate::report::{MetricValue, MetricsReport};
use crate::settings::AnalysisSettings;
use crate::stats::AggregateStatistics;
use anyhow::Context as _;
use clap::{Args, ValueEnum};
use netcoord_log_model::{LogRecord, RecordStore};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    /// `Time: .. - Node: .. | Vec: [..]` lines, bucketed by window
    Coordinates,
    /// `NODE_DRIFT,...` lines, summarised per timestamp
    Node,
    /// `DRIFT_DATA,...` lines, plotted as logged
    Centroid,
}

impl DriftKind {
    fn pattern(&self) -> RecordPattern {
        match self {
            DriftKind::Coordinates => RecordPattern::Coordinate,
            DriftKind::Node => RecordPattern::NodeDrift,
            DriftKind::Centroid => RecordPattern::CentroidDrift,
        }
    }
}

/// The node drift series charted for `--kind node`. Both are kept in the JSON output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSeries {
    /// Vector distance of each node from the origin
    #[default]
    Distance,
    /// Accumulated drift of each node
    Total,
}

#[derive(Debug, Args)]
pub struct DriftCommand {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, value_enum, default_value = "coordinates")]
    pub kind: DriftKind,

    /// Bucket width for coordinate logs. Overrides the configured drift window.
    #[arg(long)]
    pub window_minutes: Option<i64>,

    /// Series charted for node drift logs.
    #[arg(long, value_enum, default_value_t)]
    pub series: NodeSeries,

    #[arg(long, value_enum, default_value_t)]
    pub band: Band,

    /// Where the chart is written.
    #[arg(long, default_value = "drift.png")]
    pub output: PathBuf,

    /// Also write the report to this file.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct DriftOutput {
    kind: DriftKind,
    /// The charted series.
    buckets: Vec<BucketSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    centroids: Vec<CentroidPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    vec_distance: Vec<BucketSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    total_drift: Vec<BucketSummary>,
}

struct DriftChart {
    output: DriftOutput,
    title: String,
    y_label: &'static str,
}

impl DriftCommand {
    pub fn execute(self, context: &RunContext) -> anyhow::Result<()> {
        let settings = context
            .settings
            .clone()
            .drift_window_minutes(self.window_minutes);
        settings.validate()?;

        let extraction = extract_non_empty(self.kind.pattern(), &self.input)?;
        let DriftChart {
            output,
            title,
            y_label,
        } = self.chart(&extraction.records, &settings)?;
        log::info!("Built {} drift points", output.buckets.len());

        let mut report = MetricsReport::new(format!("{title} from {}", self.input.display()));
        let means = output.buckets.iter().map(|b| b.mean).collect::<Vec<_>>();
        let stats = AggregateStatistics::compute(&means, &settings.percentiles)
            .context("No timestamped samples to summarise")?;
        report.add_statistics("Bucket means", &stats, false);
        for (name, series) in [
            ("Latest vector distance", &output.vec_distance),
            ("Latest total drift", &output.total_drift),
        ] {
            if let Some(latest) = series.last() {
                report.add_metrics(
                    name,
                    vec![
                        ("mean", MetricValue::Plain(latest.mean)),
                        ("max", MetricValue::Plain(latest.max)),
                    ],
                );
            }
        }
        if !output.centroids.is_empty() {
            let migrations = output
                .centroids
                .iter()
                .filter_map(|c| c.migration)
                .collect::<Vec<_>>();
            let migrated = migrations.iter().sum::<f64>();
            let spread = output.centroids.last().map(|c| c.spread).unwrap_or_default();
            report.add_metrics(
                "Centroid",
                vec![
                    ("timestamps", MetricValue::Count(output.centroids.len())),
                    ("total migration", MetricValue::Plain(migrated)),
                    ("latest spread", MetricValue::Plain(spread)),
                ],
            );
        }
        match &self.report {
            Some(path) => report
                .write_to(path, settings.echo)
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None if settings.echo => println!("{}", report.render()),
            None => {}
        }

        plot::time_series_chart(&output.buckets, self.band, &title, y_label, &self.output)
            .with_context(|| format!("Failed to draw {}", self.output.display()))?;

        context.write_json(vec![self.input], &output)
    }

    fn chart(
        &self,
        records: &RecordStore<LogRecord>,
        settings: &AnalysisSettings,
    ) -> anyhow::Result<DriftChart> {
        let mut output = DriftOutput {
            kind: self.kind,
            buckets: Vec::new(),
            centroids: Vec::new(),
            vec_distance: Vec::new(),
            total_drift: Vec::new(),
        };
        let (title, y_label) = match self.kind {
            DriftKind::Coordinates => {
                let buckets = bucket::bucket_by_window(
                    bucket::coordinate_magnitudes(records),
                    settings.drift_window()?,
                )?;
                output.buckets = bucket::summarise(&buckets)?;
                output.centroids = bucket::centroid_series(&bucket::coordinates(records));
                (
                    format!(
                        "Coordinate magnitude per {} minutes",
                        settings.drift_window_minutes
                    ),
                    "Distance from origin (ms)",
                )
            }
            DriftKind::Node => {
                let samples = bucket::node_drift(records);
                output.vec_distance =
                    bucket::summarise(&bucket::bucket_by_timestamp(samples.vec_distance))?;
                output.total_drift =
                    bucket::summarise(&bucket::bucket_by_timestamp(samples.total_drift))?;
                match self.series {
                    NodeSeries::Distance => {
                        output.buckets = output.vec_distance.clone();
                        (
                            "Node distance from origin".to_string(),
                            "Vector distance (ms)",
                        )
                    }
                    NodeSeries::Total => {
                        output.buckets = output.total_drift.clone();
                        ("Node total drift".to_string(), "Total drift (ms)")
                    }
                }
            }
            DriftKind::Centroid => {
                output.buckets =
                    bucket::summarise(&bucket::bucket_by_timestamp(bucket::centroid_drift(records)))?;
                ("Centroid drift".to_string(), "Centroid distance (ms)")
            }
        };

        Ok(DriftChart {
            output,
            title,
            y_label,
        })
    }
}
