//! PNG charts rendered with [`plotters`] on the bitmap backend, fixed 1200x800.

use crate::bucket::BucketSummary;
use crate::stats::{self, StatsError};
use chrono::{DateTime, Utc};
use plotters::prelude::*;
use std::path::Path;
use thiserror::Error;

const SIZE: (u32, u32) = (1200, 800);

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Failed to create drawing area: {0}")]
    DrawingArea(String),

    #[error("Failed to configure chart: {0}")]
    ChartConfig(String),

    #[error("Failed to draw chart elements: {0}")]
    Drawing(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Stats(#[from] StatsError),
}

type Result<T> = core::result::Result<T, PlotError>;

/// Labelled values, one chart series each.
pub type LabelledValues = (String, Vec<f64>);

/// Lower and upper bound of all values, widened when they coincide.
fn bounds<I>(values: I) -> Result<(f64, f64)>
where
    I: IntoIterator<Item = f64>,
{
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        return Err(PlotError::InvalidData("No finite values to plot".to_string()));
    }
    if min == max {
        return Ok((min - 1.0, max + 1.0));
    }
    Ok((min, max))
}

fn style(index: usize) -> ShapeStyle {
    Palette99::pick(index).stroke_width(2)
}

/// Empirical CDF of each series, `y = i / n`.
pub fn cdf_chart(series: &[LabelledValues], title: &str, x_label: &str, output: &Path) -> Result<()> {
    let curves = series
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(label, values)| (label, stats::empirical_cdf(values)))
        .collect::<Vec<_>>();
    if curves.is_empty() {
        return Err(PlotError::InvalidData("Every series is empty".to_string()));
    }
    let (x_min, x_max) = bounds(curves.iter().flat_map(|(_, c)| c.iter().map(|(x, _)| *x)))?;

    let root = BitMapBackend::new(output, SIZE).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| PlotError::DrawingArea(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 40))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(85)
        .build_cartesian_2d(x_min..x_max, 0.0..1.0)
        .map_err(|e| PlotError::ChartConfig(e.to_string()))?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc("CDF")
        .label_style(("sans-serif", 25))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    for (index, (label, curve)) in curves.into_iter().enumerate() {
        let style = style(index);
        chart
            .draw_series(LineSeries::new(curve, style))
            .map_err(|e| PlotError::Drawing(e.to_string()))?
            .label(label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 25))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    root.present()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;
    log::info!("Wrote CDF chart to {}", output.display());
    Ok(())
}

/// Shaded area drawn around the mean of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Band {
    /// 25th to 75th percentile
    #[default]
    Iqr,
    MinMax,
}

impl Band {
    fn of(&self, bucket: &BucketSummary) -> (f64, f64) {
        match self {
            Band::Iqr => (bucket.p25, bucket.p75),
            Band::MinMax => (bucket.min, bucket.max),
        }
    }
}

fn minutes_since(start: DateTime<Utc>, t: DateTime<Utc>) -> f64 {
    (t - start).num_milliseconds() as f64 / 60_000.0
}

/// Mean per bucket with a shaded band, x in minutes since the first bucket.
pub fn time_series_chart(
    buckets: &[BucketSummary],
    band: Band,
    title: &str,
    y_label: &str,
    output: &Path,
) -> Result<()> {
    let Some(first) = buckets.first() else {
        return Err(PlotError::InvalidData("No buckets to plot".to_string()));
    };
    let start = first.start;

    let x = |b: &BucketSummary| minutes_since(start, b.start);
    let (x_min, x_max) = bounds(buckets.iter().map(x))?;
    let (y_min, y_max) = bounds(buckets.iter().flat_map(|b| {
        let (lo, hi) = band.of(b);
        [lo, hi, b.mean]
    }))?;

    let root = BitMapBackend::new(output, SIZE).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| PlotError::DrawingArea(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 40))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(85)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| PlotError::ChartConfig(e.to_string()))?;

    let x_formatter = |minutes: &f64| {
        let t = start + chrono::TimeDelta::milliseconds((minutes * 60_000.0) as i64);
        t.format("%H:%M").to_string()
    };
    chart
        .configure_mesh()
        .x_desc("Time (UTC)")
        .y_desc(y_label)
        .x_label_formatter(&x_formatter)
        .label_style(("sans-serif", 25))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    let upper = buckets.iter().map(|b| (x(b), band.of(b).1));
    let lower = buckets.iter().rev().map(|b| (x(b), band.of(b).0));
    chart
        .draw_series(std::iter::once(Polygon::new(
            upper.chain(lower).collect::<Vec<_>>(),
            BLUE.mix(0.2).filled(),
        )))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    chart
        .draw_series(LineSeries::new(
            buckets.iter().map(|b| (x(b), b.mean)),
            BLUE.stroke_width(2),
        ))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    root.present()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;
    log::info!("Wrote time series chart to {}", output.display());
    Ok(())
}

/// Points with the `y = x` reference diagonal.
pub fn scatter_chart(
    points: &[(f64, f64)],
    title: &str,
    x_label: &str,
    y_label: &str,
    output: &Path,
) -> Result<()> {
    let (lo, hi) = bounds(points.iter().flat_map(|(x, y)| [*x, *y]))?;

    let root = BitMapBackend::new(output, SIZE).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| PlotError::DrawingArea(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 40))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(85)
        .build_cartesian_2d(lo..hi, lo..hi)
        .map_err(|e| PlotError::ChartConfig(e.to_string()))?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .label_style(("sans-serif", 25))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    chart
        .draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 3, BLUE.mix(0.5).filled())),
        )
        .map_err(|e| PlotError::Drawing(e.to_string()))?;
    chart
        .draw_series(LineSeries::new([(lo, lo), (hi, hi)], RED.stroke_width(2)))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    root.present()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;
    log::info!("Wrote scatter chart to {}", output.display());
    Ok(())
}

/// Shared equal width bins and the per label counts in each bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` ascending edges
    pub edges: Vec<f64>,
    /// One row of `bins` counts per group, in group order
    pub groups: Vec<(String, Vec<usize>)>,
}

impl Histogram {
    pub fn max_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|(_, counts)| counts.iter().copied())
            .max()
            .unwrap_or_default()
    }
}

/// Count the values of every group into `bins` equal width bins spanning all groups.
///
/// The last bin is closed so the maximum is counted.
pub fn histogram_bins(groups: &[LabelledValues], bins: usize) -> Result<Histogram> {
    if bins == 0 {
        return Err(PlotError::InvalidData("At least one bin is required".to_string()));
    }
    let (min, max) = bounds(groups.iter().flat_map(|(_, values)| values.iter().copied()))?;
    let width = (max - min) / bins as f64;
    let edges = (0..=bins).map(|i| min + width * i as f64).collect();

    let groups = groups
        .iter()
        .map(|(label, values)| {
            let mut counts = vec![0; bins];
            for value in values.iter().filter(|v| v.is_finite()) {
                let index = (((value - min) / width).floor() as usize).min(bins - 1);
                counts[index] += 1;
            }
            (label.clone(), counts)
        })
        .collect();

    Ok(Histogram { edges, groups })
}

/// Bars of all groups side by side within each bin.
pub fn histogram_chart(histogram: &Histogram, title: &str, x_label: &str, output: &Path) -> Result<()> {
    let (Some(&x_min), Some(&x_max)) = (histogram.edges.first(), histogram.edges.last()) else {
        return Err(PlotError::InvalidData("Histogram has no bins".to_string()));
    };
    let y_max = histogram.max_count().max(1) as f64 * 1.05;

    let root = BitMapBackend::new(output, SIZE).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| PlotError::DrawingArea(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 40))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(85)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)
        .map_err(|e| PlotError::ChartConfig(e.to_string()))?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc("Count")
        .label_style(("sans-serif", 25))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    let group_count = histogram.groups.len().max(1) as f64;
    for (index, (label, counts)) in histogram.groups.iter().enumerate() {
        let color = Palette99::pick(index).mix(0.7);
        let bars = histogram.edges.windows(2).zip(counts).map(|(edge, count)| {
            let width = (edge[1] - edge[0]) / group_count;
            let left = edge[0] + width * index as f64;
            Rectangle::new([(left, 0.0), (left + width, *count as f64)], color.filled())
        });
        chart
            .draw_series(bars)
            .map_err(|e| PlotError::Drawing(e.to_string()))?
            .label(label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 25))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    root.present()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;
    log::info!("Wrote histogram to {}", output.display());
    Ok(())
}

/// Five number summary of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub label: String,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

impl BoxStats {
    pub fn compute(label: impl Into<String>, values: &[f64]) -> core::result::Result<Self, StatsError> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        Ok(Self {
            label: label.into(),
            min: stats::percentile_of_sorted(&sorted, 0.0)?,
            p25: stats::percentile_of_sorted(&sorted, 25.0)?,
            median: stats::percentile_of_sorted(&sorted, 50.0)?,
            p75: stats::percentile_of_sorted(&sorted, 75.0)?,
            max: stats::percentile_of_sorted(&sorted, 100.0)?,
        })
    }
}

/// One box per group: p25 to p75, a median line and min to max whiskers.
pub fn box_chart(boxes: &[BoxStats], title: &str, y_label: &str, output: &Path) -> Result<()> {
    let (y_min, y_max) = bounds(boxes.iter().flat_map(|b| [b.min, b.max]))?;

    let root = BitMapBackend::new(output, SIZE).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| PlotError::DrawingArea(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 40))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(85)
        .build_cartesian_2d(-0.5..boxes.len() as f64 - 0.5, y_min..y_max)
        .map_err(|e| PlotError::ChartConfig(e.to_string()))?;

    let x_formatter = |x: &f64| {
        let index = x.round();
        if (x - index).abs() > 0.01 || index < 0.0 {
            return String::new();
        }
        boxes
            .get(index as usize)
            .map(|b| b.label.clone())
            .unwrap_or_default()
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(boxes.len() * 2 + 1)
        .x_label_formatter(&x_formatter)
        .y_desc(y_label)
        .label_style(("sans-serif", 25))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    for (index, b) in boxes.iter().enumerate() {
        let x = index as f64;
        let color = Palette99::pick(index);
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x - 0.25, b.p25), (x + 0.25, b.p75)],
                color.mix(0.4).filled(),
            )))
            .map_err(|e| PlotError::Drawing(e.to_string()))?;

        let lines = [
            vec![(x - 0.25, b.median), (x + 0.25, b.median)],
            vec![(x, b.p75), (x, b.max)],
            vec![(x, b.p25), (x, b.min)],
            vec![(x - 0.1, b.max), (x + 0.1, b.max)],
            vec![(x - 0.1, b.min), (x + 0.1, b.min)],
        ];
        chart
            .draw_series(
                lines
                    .into_iter()
                    .map(|points| PathElement::new(points, BLACK.stroke_width(2))),
            )
            .map_err(|e| PlotError::Drawing(e.to_string()))?;
    }

    root.present()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;
    log::info!("Wrote box chart to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn histogram_counts_every_value_once() -> anyhow::Result<()> {
        let groups = vec![
            ("intra".to_string(), vec![0.0, 1.0, 2.0, 10.0]),
            ("inter".to_string(), vec![5.0, 9.0]),
        ];
        let histogram = histogram_bins(&groups, 2)?;

        assert_eq!(histogram.edges, vec![0.0, 5.0, 10.0]);
        assert_eq!(histogram.groups[0], ("intra".to_string(), vec![3, 1]));
        assert_eq!(histogram.groups[1], ("inter".to_string(), vec![0, 2]));
        assert_eq!(histogram.max_count(), 3);
        Ok(())
    }

    #[test]
    fn histogram_of_a_single_value() -> anyhow::Result<()> {
        let histogram = histogram_bins(&[("a".to_string(), vec![4.0, 4.0])], 4)?;
        assert_eq!(histogram.edges, vec![3.0, 3.5, 4.0, 4.5, 5.0]);
        assert_eq!(histogram.groups[0].1, vec![0, 0, 2, 0]);
        Ok(())
    }

    #[test]
    fn histogram_rejects_bad_input() {
        assert!(matches!(
            histogram_bins(&[("a".to_string(), vec![1.0])], 0),
            Err(PlotError::InvalidData(_))
        ));
        assert!(matches!(
            histogram_bins(&[("a".to_string(), vec![])], 3),
            Err(PlotError::InvalidData(_))
        ));
    }

    #[test]
    fn box_stats() -> anyhow::Result<()> {
        let stats = BoxStats::compute("intra", &[5.0, 1.0, 3.0, 2.0, 4.0])?;
        assert_eq!(
            stats,
            BoxStats {
                label: "intra".to_string(),
                min: 1.0,
                p25: 2.0,
                median: 3.0,
                p75: 4.0,
                max: 5.0,
            }
        );
        assert!(BoxStats::compute("empty", &[]).is_err());
        Ok(())
    }

    #[test]
    fn charts_reject_empty_data() {
        let output = std::env::temp_dir().join("netcoord_empty_chart.png");
        assert!(matches!(
            cdf_chart(&[("a".to_string(), vec![])], "CDF", "ms", &output),
            Err(PlotError::InvalidData(_))
        ));
        assert!(matches!(
            time_series_chart(&[], Band::Iqr, "Drift", "ms", &output),
            Err(PlotError::InvalidData(_))
        ));
        assert!(matches!(
            scatter_chart(&[], "Serf vs ping", "ping", "serf", &output),
            Err(PlotError::InvalidData(_))
        ));
        assert!(!output.exists());
    }

    #[test]
    #[ignore = "Font rendering not available in test environment"]
    fn renders_cdf_chart() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("cdf.png");
        cdf_chart(
            &[
                ("5D".to_string(), vec![1.0, 2.0, 3.0]),
                ("8D".to_string(), vec![0.5, 1.5, 2.5]),
            ],
            "CDF of absolute differences",
            "ms",
            &output,
        )?;
        assert!(output.exists());
        Ok(())
    }
}
