use super::{extract_non_empty, RunContext};
use crate::cli::parse_labelled_path;
use crate::extract::RecordPattern;
use crate::plot::{self, LabelledValues};
use crate::report::{float3, percent3, MetricsReport};
use crate::stats;
use anyhow::Context as _;
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CdfKind {
    Signed,
    Absolute,
    /// Values are fractions and are shown as percentages
    Relative,
}

impl CdfKind {
    fn prepare(&self, value: f64) -> f64 {
        match self {
            CdfKind::Signed => value,
            CdfKind::Absolute => value.abs(),
            CdfKind::Relative => value * 100.0,
        }
    }

    fn format(&self, value: f64) -> String {
        match self {
            CdfKind::Relative => percent3(&value),
            _ => format!("{} ms", float3(&value)),
        }
    }

    fn axis_label(&self) -> &'static str {
        match self {
            CdfKind::Signed => "Signed difference (ms)",
            CdfKind::Absolute => "Absolute difference (ms)",
            CdfKind::Relative => "Relative difference (%)",
        }
    }
}

#[derive(Debug, Args)]
pub struct CdfCommand {
    /// A difference log as `label=path`, may be repeated.
    #[arg(long, required = true, value_parser = parse_labelled_path)]
    pub input: Vec<(String, PathBuf)>,

    #[arg(long, value_enum, default_value = "absolute")]
    pub kind: CdfKind,

    /// Where the chart is written.
    #[arg(long, default_value = "cdf.png")]
    pub output: PathBuf,
}

#[derive(Tabled)]
struct CdfRow {
    #[tabled(rename = "Series")]
    label: String,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Median")]
    median: String,
    #[tabled(rename = "p80")]
    p80: String,
    #[tabled(rename = "p90")]
    p90: String,
}

#[derive(Debug, Serialize)]
struct CdfSummary {
    label: String,
    kind: CdfKind,
    count: usize,
    median: f64,
    p80: f64,
    p90: f64,
}

impl CdfCommand {
    pub fn execute(self, context: &RunContext) -> anyhow::Result<()> {
        let mut series: Vec<LabelledValues> = Vec::with_capacity(self.input.len());
        for (label, path) in &self.input {
            let values = extract_non_empty(RecordPattern::Rtt, path)?
                .values()
                .into_iter()
                .map(|v| self.kind.prepare(v))
                .collect();
            series.push((label.clone(), values));
        }

        let mut summaries = Vec::with_capacity(series.len());
        for (label, values) in &series {
            let mut sorted = values.clone();
            sorted.sort_by(f64::total_cmp);
            summaries.push(CdfSummary {
                label: label.clone(),
                kind: self.kind,
                count: sorted.len(),
                median: stats::percentile_of_sorted(&sorted, 50.0)?,
                p80: stats::percentile_of_sorted(&sorted, 80.0)?,
                p90: stats::percentile_of_sorted(&sorted, 90.0)?,
            });
        }

        let rows = summaries
            .iter()
            .map(|s| CdfRow {
                label: s.label.clone(),
                count: s.count,
                median: self.kind.format(s.median),
                p80: self.kind.format(s.p80),
                p90: self.kind.format(s.p90),
            })
            .collect::<Vec<_>>();
        let mut report = MetricsReport::new(format!("CDF of {}", self.kind.axis_label()));
        report.add_table("Percentiles", &rows);
        if context.settings.echo {
            println!("{}", report.render());
        }

        plot::cdf_chart(
            &series,
            &format!("CDF of {}", self.kind.axis_label()),
            self.kind.axis_label(),
            &self.output,
        )
        .with_context(|| format!("Failed to draw {}", self.output.display()))?;

        context.write_json(
            self.input.into_iter().map(|(_, path)| path).collect(),
            &summaries,
        )
    }
}
