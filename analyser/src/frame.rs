use crate::compare::ComparisonEntry;
use crate::partition::{partition_by_tags, tag_value, Partition};
use netcoord_log_model::{LogRecord, Measurement};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Label used for a missing network, network type or section.
pub const UNKNOWN: &str = "unknown";

/// How far an estimate is off, relative to a threshold in ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deviation {
    /// `|diff| <= threshold`
    Low,
    /// Overestimate beyond the threshold
    HighPositive,
    /// Underestimate beyond the threshold
    HighNegative,
}

impl Deviation {
    pub fn classify(diff: f64, threshold: f64) -> Self {
        if diff.abs() <= threshold {
            Deviation::Low
        } else if diff > 0.0 {
            Deviation::HighPositive
        } else {
            Deviation::HighNegative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Deviation::Low => "low",
            Deviation::HighPositive => "high+",
            Deviation::HighNegative => "high-",
        }
    }

    pub fn all() -> [Deviation; 3] {
        [
            Deviation::Low,
            Deviation::HighPositive,
            Deviation::HighNegative,
        ]
    }
}

/// Half-open ping RTT bins `[edge_i, edge_i+1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PingRanges {
    edges: Vec<f64>,
}

impl PingRanges {
    pub const OUT_OF_RANGE: &'static str = "out of range";

    /// `edges` must be strictly ascending.
    pub fn new(edges: Vec<f64>) -> Self {
        Self { edges }
    }

    pub fn label(&self, ping: f64) -> String {
        self.edges
            .windows(2)
            .find(|w| ping >= w[0] && ping < w[1])
            .map(|w| range_label(w[0], w[1]))
            .unwrap_or_else(|| Self::OUT_OF_RANGE.to_string())
    }

    /// All labels in ascending order, [PingRanges::OUT_OF_RANGE] last.
    pub fn labels(&self) -> Vec<String> {
        self.edges
            .windows(2)
            .map(|w| range_label(w[0], w[1]))
            .chain(std::iter::once(Self::OUT_OF_RANGE.to_string()))
            .collect()
    }
}

fn range_label(low: f64, high: f64) -> String {
    format!("{low}-{high}ms")
}

/// One signed difference with the two values it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct DifferenceRow {
    pub source_network: Option<String>,
    pub destination_network: Option<String>,
    pub section: Option<String>,
    pub diff: f64,
    pub serf_rtt: f64,
    pub ping_rtt: f64,
}

impl DifferenceRow {
    /// A row from a signed difference line, [None] for lines without the source values.
    pub fn from_record(record: &LogRecord) -> Option<Self> {
        let Measurement::Rtt {
            value,
            serf_rtt: Some(serf_rtt),
            ping_rtt: Some(ping_rtt),
            ..
        } = record.measurement
        else {
            return None;
        };

        Some(Self {
            source_network: record.source.as_ref().and_then(|e| e.network.clone()),
            destination_network: record.destination.as_ref().and_then(|e| e.network.clone()),
            section: record.section.clone(),
            diff: value,
            serf_rtt,
            ping_rtt,
        })
    }

    pub fn from_entry(entry: &ComparisonEntry) -> Self {
        Self {
            source_network: entry.source.network.clone(),
            destination_network: entry.destination.network.clone(),
            section: entry.section.clone(),
            diff: entry.signed(),
            serf_rtt: entry.estimate,
            ping_rtt: entry.ground_truth,
        }
    }

    /// `intra`, `inter` or [UNKNOWN] when a network label is missing.
    pub fn network_type(&self) -> &'static str {
        match (&self.source_network, &self.destination_network) {
            (Some(a), Some(b)) if a == b => "intra",
            (Some(_), Some(_)) => "inter",
            _ => UNKNOWN,
        }
    }
}

/// Build the analysis frame with one row per difference.
///
/// Columns: `source_network`, `destination_network`, `network_type`, `section`, `diff`,
/// `serf_rtt`, `ping_rtt`, `deviation` and `ping_range`.
pub fn difference_frame(
    rows: &[DifferenceRow],
    threshold_ms: f64,
    ranges: &PingRanges,
) -> anyhow::Result<DataFrame> {
    let label = |value: &Option<String>| value.clone().unwrap_or_else(|| UNKNOWN.to_string());

    let frame = df!(
        "source_network" => rows.iter().map(|r| label(&r.source_network)).collect::<Vec<_>>(),
        "destination_network" => rows.iter().map(|r| label(&r.destination_network)).collect::<Vec<_>>(),
        "network_type" => rows.iter().map(|r| r.network_type().to_string()).collect::<Vec<_>>(),
        "section" => rows.iter().map(|r| label(&r.section)).collect::<Vec<_>>(),
        "diff" => rows.iter().map(|r| r.diff).collect::<Vec<_>>(),
        "serf_rtt" => rows.iter().map(|r| r.serf_rtt).collect::<Vec<_>>(),
        "ping_rtt" => rows.iter().map(|r| r.ping_rtt).collect::<Vec<_>>(),
        "deviation" => rows
            .iter()
            .map(|r| Deviation::classify(r.diff, threshold_ms).as_str().to_string())
            .collect::<Vec<_>>(),
        "ping_range" => rows.iter().map(|r| ranges.label(r.ping_rtt)).collect::<Vec<_>>(),
    )?;

    log::debug!("Built difference frame with {} rows", frame.height());
    Ok(frame)
}

/// Values of a float column, nulls skipped.
pub fn column_values(frame: &DataFrame, column: &str) -> anyhow::Result<Vec<f64>> {
    Ok(frame.column(column)?.f64()?.into_iter().flatten().collect())
}

/// The differences of one group of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: String,
    pub count: usize,
    /// Share of all rows in the frame
    pub share_pct: f64,
    pub mean_diff: f64,
    pub std_diff: f64,
    pub mean_abs_diff: f64,
}

/// Summarise the `diff` column per value of the `tag` column.
///
/// Groups listed in `order` come first in that order, any other group follows alphabetically.
pub fn group_summary(
    frame: &DataFrame,
    tag: &str,
    order: &[String],
) -> anyhow::Result<Vec<GroupSummary>> {
    let total = frame.height();
    let Partition::Partitioned(partitioned) = partition_by_tags(frame.clone(), &[tag])? else {
        return Ok(Vec::new());
    };

    let mut groups = Vec::with_capacity(partitioned.len());
    for (key, sub_frame) in partitioned {
        let diffs = sub_frame.column("diff")?.f64()?;
        let count = sub_frame.height();
        if count == 0 {
            continue;
        }
        let mean_abs_diff =
            diffs.into_iter().flatten().map(f64::abs).sum::<f64>() / count as f64;

        groups.push(GroupSummary {
            group: tag_value(&key, tag).unwrap_or(&key).to_string(),
            count,
            share_pct: count as f64 * 100.0 / total as f64,
            mean_diff: diffs.mean().unwrap_or(f64::NAN),
            std_diff: diffs.std(0).unwrap_or(f64::NAN),
            mean_abs_diff,
        });
    }

    groups.sort_by_key(|g| {
        order
            .iter()
            .position(|o| *o == g.group)
            .unwrap_or(order.len())
    });
    Ok(groups)
}

/// Network type counts, intra first.
pub fn network_type_summary(frame: &DataFrame) -> anyhow::Result<Vec<GroupSummary>> {
    group_summary(
        frame,
        "network_type",
        &["intra".to_string(), "inter".to_string(), UNKNOWN.to_string()],
    )
}

pub fn deviation_summary(frame: &DataFrame) -> anyhow::Result<Vec<GroupSummary>> {
    let order = Deviation::all().map(|d| d.as_str().to_string());
    group_summary(frame, "deviation", &order)
}

pub fn ping_range_summary(
    frame: &DataFrame,
    ranges: &PingRanges,
) -> anyhow::Result<Vec<GroupSummary>> {
    group_summary(frame, "ping_range", &ranges.labels())
}
