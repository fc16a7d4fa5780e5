use crate::compare::{ComparisonSummary, DimensionComparison};
use crate::extract::ExtractionReport;
use crate::frame::GroupSummary;
use crate::stats::AggregateStatistics;
use std::fmt;
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// A single reported number and how it should be shown.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// `12.345`
    Plain(f64),
    /// `+12.345`, `-0.500`
    Signed(f64),
    /// `12.345%`
    Percent(f64),
    Count(usize),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Plain(v) => f.write_str(&float3(v)),
            MetricValue::Signed(v) => f.write_str(&signed3(v)),
            MetricValue::Percent(v) => f.write_str(&percent3(v)),
            MetricValue::Count(c) => write!(f, "{c}"),
            MetricValue::Text(t) => f.write_str(t),
        }
    }
}

pub fn float3(n: &f64) -> String {
    format!("{n:.3}")
}

pub fn signed3(n: &f64) -> String {
    format!("{n:+.3}")
}

pub fn percent3(n: &f64) -> String {
    format!("{n:.3}%")
}

#[derive(Tabled)]
pub struct MetricRow {
    #[tabled(rename = "Metric")]
    pub name: String,
    #[tabled(rename = "Value")]
    pub value: MetricValue,
}

#[derive(Tabled)]
pub struct GroupRow {
    #[tabled(rename = "Group")]
    pub group: String,
    #[tabled(rename = "Count")]
    pub count: usize,
    #[tabled(rename = "Share", display = "percent3")]
    pub share_pct: f64,
    #[tabled(rename = "Mean diff", display = "signed3")]
    pub mean_diff: f64,
    #[tabled(rename = "Std diff", display = "float3")]
    pub std_diff: f64,
    #[tabled(rename = "Mean |diff|", display = "float3")]
    pub mean_abs_diff: f64,
}

impl From<&GroupSummary> for GroupRow {
    fn from(summary: &GroupSummary) -> Self {
        Self {
            group: summary.group.clone(),
            count: summary.count,
            share_pct: summary.share_pct,
            mean_diff: summary.mean_diff,
            std_diff: summary.std_diff,
            mean_abs_diff: summary.mean_abs_diff,
        }
    }
}

#[derive(Tabled)]
pub struct DimensionRowView {
    #[tabled(rename = "Pair")]
    pub label: String,
    #[tabled(rename = "A", display = "signed3")]
    pub a: f64,
    #[tabled(rename = "B", display = "signed3")]
    pub b: f64,
    #[tabled(rename = "Better")]
    pub better: String,
}

#[derive(Debug, Clone)]
enum Section {
    Metrics { name: String, rows: Vec<(String, MetricValue)> },
    Table { name: String, rendered: String },
}

/// A text report assembled in memory and written in one go.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    title: String,
    sections: Vec<Section>,
}

impl MetricsReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    pub fn add_metrics<N>(&mut self, name: impl Into<String>, rows: Vec<(N, MetricValue)>) -> &mut Self
    where
        N: Into<String>,
    {
        self.sections.push(Section::Metrics {
            name: name.into(),
            rows: rows.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        });
        self
    }

    pub fn add_table<T>(&mut self, name: impl Into<String>, rows: &[T]) -> &mut Self
    where
        T: Tabled,
    {
        let mut table = Table::new(rows);
        table.with(Style::modern());
        self.sections.push(Section::Table {
            name: name.into(),
            rendered: table.to_string(),
        });
        self
    }

    /// Count, mean, median, std, min, max, the configured percentiles and the sign split.
    ///
    /// `signed` shows the location values with an explicit sign.
    pub fn add_statistics(
        &mut self,
        name: impl Into<String>,
        stats: &AggregateStatistics,
        signed: bool,
    ) -> &mut Self {
        let value = |v: f64| {
            if signed {
                MetricValue::Signed(v)
            } else {
                MetricValue::Plain(v)
            }
        };

        let mut rows = vec![
            ("count".to_string(), MetricValue::Count(stats.count)),
            ("mean".to_string(), value(stats.mean)),
            ("median".to_string(), value(stats.median)),
            ("std".to_string(), MetricValue::Plain(stats.std_dev)),
            ("min".to_string(), value(stats.min)),
            ("max".to_string(), value(stats.max)),
        ];
        rows.extend(
            stats
                .percentiles
                .iter()
                .map(|(label, v)| (label.clone(), value(*v))),
        );
        if signed {
            rows.push(("positive".to_string(), MetricValue::Percent(stats.signs.positive_pct)));
            rows.push(("negative".to_string(), MetricValue::Percent(stats.signs.negative_pct)));
        }

        self.add_metrics(name, rows)
    }

    /// How the lines of one input were classified.
    pub fn add_lines(&mut self, name: impl Into<String>, lines: &ExtractionReport) -> &mut Self {
        self.add_metrics(
            name,
            vec![
                ("valid", MetricValue::Count(lines.valid)),
                ("invalid", MetricValue::Count(lines.invalid)),
                ("headers", MetricValue::Count(lines.headers)),
                ("blank", MetricValue::Count(lines.blank)),
            ],
        )
    }

    pub fn add_comparison(&mut self, summary: &ComparisonSummary) -> &mut Self {
        self.add_metrics(
            "Comparison",
            vec![
                ("pairs", MetricValue::Count(summary.pairs)),
                ("unmatched estimates", MetricValue::Count(summary.unmatched_estimates)),
                ("unmatched ground truth", MetricValue::Count(summary.unmatched_ground_truth)),
                ("MAE", MetricValue::Plain(summary.mae)),
                ("RMSE", MetricValue::Plain(summary.rmse)),
                (
                    "correlation",
                    summary
                        .correlation
                        .map(MetricValue::Plain)
                        .unwrap_or_else(|| MetricValue::Text("undefined".to_string())),
                ),
            ],
        );
        self.add_statistics("Signed difference (ms)", &summary.signed, true);
        self.add_statistics("Absolute difference (ms)", &summary.absolute, false);
        if let Some(relative) = &summary.relative {
            self.add_statistics("Relative difference", relative, false);
        }
        self
    }

    pub fn add_groups(&mut self, name: impl Into<String>, groups: &[GroupSummary]) -> &mut Self {
        let rows = groups.iter().map(GroupRow::from).collect::<Vec<_>>();
        self.add_table(name, &rows)
    }

    pub fn add_dimensions(&mut self, comparison: &DimensionComparison) -> &mut Self {
        let rows = comparison
            .rows
            .iter()
            .map(|row| DimensionRowView {
                label: row.label.clone(),
                a: row.a,
                b: row.b,
                better: comparison.label_of(row.better).to_string(),
            })
            .collect::<Vec<_>>();
        self.add_table(
            format!("{} (A) vs {} (B)", comparison.label_a, comparison.label_b),
            &rows,
        );
        self.add_metrics(
            "Wins",
            vec![
                (comparison.label_a.clone(), MetricValue::Count(comparison.wins_a)),
                (comparison.label_b.clone(), MetricValue::Count(comparison.wins_b)),
                ("Tie".to_string(), MetricValue::Count(comparison.ties)),
                ("unmatched".to_string(), MetricValue::Count(comparison.unmatched)),
                (
                    "overall".to_string(),
                    MetricValue::Text(comparison.label_of(comparison.overall()).to_string()),
                ),
            ],
        )
    }

    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self.title);
        for section in &self.sections {
            match section {
                Section::Metrics { name, rows } => {
                    let rows = rows
                        .iter()
                        .map(|(name, value)| MetricRow {
                            name: name.clone(),
                            value: value.clone(),
                        })
                        .collect::<Vec<_>>();
                    let mut table = Table::new(rows);
                    table.with(Style::modern());
                    out.push_str(&format!("\n{name}\n{table}\n"));
                }
                Section::Table { name, rendered } => {
                    out.push_str(&format!("\n{name}\n{rendered}\n"));
                }
            }
        }
        out
    }

    /// Write the whole report to `path`, and to stdout when `echo` is set.
    pub fn write_to<P>(&self, path: P, echo: bool) -> std::io::Result<()>
    where
        P: AsRef<Path>,
    {
        let rendered = self.render();
        std::fs::write(path.as_ref(), &rendered)?;
        log::info!("Wrote report to {}", path.as_ref().display());

        if echo {
            println!("{rendered}");
        }
        Ok(())
    }
}

/// Console summary line, `name: value`.
pub fn summary_line(name: &str, value: &MetricValue) -> String {
    format!("{name}: {value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::AggregateStatistics;
    use pretty_assertions::assert_eq;

    #[test]
    fn value_formatting() {
        assert_eq!(MetricValue::Plain(2.5).to_string(), "2.500");
        assert_eq!(MetricValue::Signed(2.5).to_string(), "+2.500");
        assert_eq!(MetricValue::Signed(-0.25).to_string(), "-0.250");
        assert_eq!(MetricValue::Percent(12.3456).to_string(), "12.346%");
        assert_eq!(
            summary_line("Min RTT", &MetricValue::Plain(1.0)),
            "Min RTT: 1.000"
        );
    }

    #[test]
    fn report_contains_all_sections() -> anyhow::Result<()> {
        let stats = AggregateStatistics::compute(&[-1.0, 2.0, 3.5], &[50.0, 90.0])?;
        let mut report = MetricsReport::new("Serf vs ping");
        report
            .add_statistics("Signed difference (ms)", &stats, true)
            .add_metrics("Counts", vec![("intra", MetricValue::Count(2))]);

        let rendered = report.render();
        assert!(rendered.starts_with("Serf vs ping\n"));
        assert!(rendered.contains("Signed difference (ms)"));
        assert!(rendered.contains("+2.000"));
        assert!(rendered.contains("p90"));
        assert!(rendered.contains("66.667%"));
        assert!(rendered.contains("intra"));
        Ok(())
    }

    #[test]
    fn written_report_matches_rendering() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.txt");

        let mut report = MetricsReport::new("Report");
        report.add_metrics("Values", vec![("MAE", MetricValue::Plain(1.0))]);
        report.write_to(&path, false)?;

        assert_eq!(std::fs::read_to_string(&path)?, report.render());
        Ok(())
    }

    #[test]
    fn failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.txt");

        let report = MetricsReport::new("Report");
        assert!(report.write_to(&path, false).is_err());
        assert!(!path.exists());
    }
}
