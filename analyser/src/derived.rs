//! Derived log files: per key difference logs and reordered RTT logs.
//!
//! Every line written here can be read back with [RecordPattern::Rtt].

use crate::compare::{Comparison, ComparisonEntry};
use crate::extract::RecordPattern;
use indexmap::IndexMap;
use itertools::Itertools as _;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Spacing between a number and its unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    /// `12.500ms [serf_rtt:12.500ms, ping_rtt:10.000ms]`
    #[default]
    Compact,
    /// `12.500 ms [serf_rtt: 12.500 ms, ping_rtt: 10.000 ms]`
    Spaced,
}

impl LineStyle {
    fn ms(&self, value: f64) -> String {
        match self {
            LineStyle::Compact => format!("{value:.3}ms"),
            LineStyle::Spaced => format!("{value:.3} ms"),
        }
    }

    fn sources(&self, entry: &ComparisonEntry) -> String {
        let (serf, ping) = (self.ms(entry.estimate), self.ms(entry.ground_truth));
        match self {
            LineStyle::Compact => format!("[serf_rtt:{serf}, ping_rtt:{ping}]"),
            LineStyle::Spaced => format!("[serf_rtt: {serf}, ping_rtt: {ping}]"),
        }
    }
}

/// `<key>: +2.500ms [serf_rtt:12.500ms, ping_rtt:10.000ms]`
pub fn signed_line(entry: &ComparisonEntry, style: LineStyle) -> String {
    let signed = entry.signed();
    let sign = if signed >= 0.0 { '+' } else { '-' };
    format!(
        "{}: {sign}{} {}",
        entry.pair_label(),
        style.ms(signed.abs()),
        style.sources(entry)
    )
}

/// `<key>: 2.500 [serf_rtt:12.500ms, ping_rtt:10.000ms]`
pub fn absolute_line(entry: &ComparisonEntry, style: LineStyle) -> String {
    format!(
        "{}: {:.3} {}",
        entry.pair_label(),
        entry.absolute(),
        style.sources(entry)
    )
}

/// `<key>: 0.250 [serf_rtt:12.500ms, ping_rtt:10.000ms]`, [None] without a relative value.
pub fn relative_line(entry: &ComparisonEntry, style: LineStyle) -> Option<String> {
    let relative = entry.relative()?;
    Some(format!(
        "{}: {relative:.3} {}",
        entry.pair_label(),
        style.sources(entry)
    ))
}

/// The three difference logs of one comparison, fully rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedLogs {
    pub signed: String,
    pub absolute: String,
    pub relative: String,
}

impl DerivedLogs {
    /// Render all entries, grouped under `=== section ===` headers when entries carry a section.
    pub fn render(comparison: &Comparison, style: LineStyle) -> Self {
        let mut sections: IndexMap<Option<&str>, Vec<&ComparisonEntry>> = IndexMap::new();
        for entry in &comparison.entries {
            sections
                .entry(entry.section.as_deref())
                .or_default()
                .push(entry);
        }

        let mut logs = Self::default();
        for (section, entries) in sections {
            if let Some(section) = section {
                let header = format!("=== {section} ===\n");
                logs.signed.push_str(&header);
                logs.absolute.push_str(&header);
                logs.relative.push_str(&header);
            }
            for entry in entries {
                // writing to a String cannot fail
                let _ = writeln!(logs.signed, "{}", signed_line(entry, style));
                let _ = writeln!(logs.absolute, "{}", absolute_line(entry, style));
                if let Some(line) = relative_line(entry, style) {
                    let _ = writeln!(logs.relative, "{line}");
                }
            }
        }

        logs
    }
}

/// Reorder an RTT log by node number, source first then destination, within each section.
///
/// Section headers are kept, blank lines are dropped, lines that do not parse sort last.
pub fn sort_by_node<S>(lines: &[S]) -> Vec<String>
where
    S: AsRef<str>,
{
    let mut sections: Vec<(Option<&str>, Vec<&str>)> = Vec::new();
    for line in lines {
        let line = line.as_ref().trim_end();
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with("===") {
            sections.push((Some(line), Vec::new()));
            continue;
        }
        match sections.last_mut() {
            Some((_, section)) => section.push(line),
            None => sections.push((None, vec![line])),
        }
    }

    let mut sorted = Vec::with_capacity(lines.len());
    for (header, mut section) in sections {
        if section.is_empty() {
            continue;
        }
        section.sort_by_key(|line| node_order(line));
        sorted.extend(header.map(str::to_string));
        sorted.extend(section.into_iter().map(str::to_string));
    }
    sorted
}

fn node_order(line: &str) -> (u64, u64) {
    RecordPattern::Rtt
        .parse_line(0, line)
        .and_then(|record| {
            Some((
                record.source?.numeric_suffix()?,
                record.destination?.numeric_suffix()?,
            ))
        })
        .unwrap_or((u64::MAX, u64::MAX))
}

/// Group an RTT log by source node, in order of first appearance, each group ordered by
/// ascending RTT.
///
/// Headers, timestamps and trailing annotations are dropped, each line is rewritten as
/// `<source> → <destination>: 7.707ms`.
pub fn sort_by_rtt<S>(lines: &[S]) -> Vec<String>
where
    S: AsRef<str>,
{
    let mut groups: IndexMap<String, Vec<(f64, String)>> = IndexMap::new();
    for (index, line) in lines.iter().enumerate() {
        let Some(record) = RecordPattern::Rtt.parse_line(index + 1, line.as_ref()) else {
            continue;
        };
        let (Some(source), Some(destination), Some(rtt)) =
            (&record.source, &record.destination, record.rtt())
        else {
            continue;
        };
        groups
            .entry(source.to_string())
            .or_default()
            .push((rtt, format!("{source} → {destination}: {rtt:.3}ms")));
    }

    groups
        .into_values()
        .flat_map(|group| {
            group
                .into_iter()
                .sorted_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, line)| line)
        })
        .collect()
}

/// The most extreme and the closest lines of a signed difference log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Outliers {
    /// Estimate above ground truth, largest difference first
    pub above: Vec<String>,
    /// Estimate below ground truth, most negative difference first
    pub below: Vec<String>,
    /// Smallest absolute difference first
    pub closest: Vec<String>,
}

impl Outliers {
    /// Pick up to `top` lines per group from the difference lines of `lines`.
    ///
    /// Lines without a `[serf_rtt:.., ping_rtt:..]` pair are ignored. Ties keep input order.
    pub fn select<S>(lines: &[S], top: usize) -> Self
    where
        S: AsRef<str>,
    {
        let differences = lines
            .iter()
            .enumerate()
            .filter_map(|(index, line)| {
                let line = line.as_ref().trim();
                let record = RecordPattern::Rtt.parse_line(index + 1, line)?;
                record
                    .measurement
                    .is_difference()
                    .then(|| (record.measurement.primary_value(), line))
            })
            .collect::<Vec<_>>();

        let pick = |mut group: Vec<(f64, &str)>, key: fn(f64) -> f64| {
            group.sort_by(|a, b| key(a.0).total_cmp(&key(b.0)));
            group
                .into_iter()
                .take(top)
                .map(|(_, line)| line.to_string())
                .collect::<Vec<_>>()
        };

        Self {
            above: pick(
                differences.iter().copied().filter(|(d, _)| *d > 0.0).collect(),
                |d| -d,
            ),
            below: pick(
                differences.iter().copied().filter(|(d, _)| *d < 0.0).collect(),
                |d| d,
            ),
            closest: pick(differences, f64::abs),
        }
    }

    /// The three groups under `=== Serf RTT > Real RTT ===` style headers.
    pub fn render(&self) -> String {
        [
            ("Serf RTT > Real RTT", &self.above),
            ("Serf RTT < Real RTT", &self.below),
            ("Serf RTT ≈ Real RTT", &self.closest),
        ]
        .iter()
        .map(|(title, lines)| {
            let mut section = format!("=== {title} ===\n");
            for line in lines.iter() {
                section.push_str(line);
                section.push('\n');
            }
            section
        })
        .join("\n")
    }
}
