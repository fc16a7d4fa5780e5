mod analyse;
mod cdf;
mod compare_dims;
mod diff;
mod drift;
mod outliers;
mod sort;
mod stats;

use crate::extract::{Extraction, Extractor, RecordPattern};
use crate::model::SummaryOutput;
use crate::settings::AnalysisSettings;
use anyhow::Context as _;
use clap::Subcommand;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub use self::analyse::AnalyseCommand;
pub use self::cdf::{CdfCommand, CdfKind};
pub use self::compare_dims::CompareDimsCommand;
pub use self::diff::DiffCommand;
pub use self::drift::{DriftCommand, DriftKind, NodeSeries};
pub use self::outliers::OutliersCommand;
pub use self::sort::{SortCommand, SortOrder};
pub use self::stats::StatsCommand;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pair an estimated RTT log with a ping log and write signed, absolute and relative
    /// difference logs.
    Diff(DiffCommand),

    /// Descriptive statistics over the values of an RTT or difference log.
    Stats(StatsCommand),

    /// Percentile summary and CDF chart of one or more difference logs.
    Cdf(CdfCommand),

    /// Full analysis report of a signed difference log.
    Analyse(AnalyseCommand),

    /// Time bucketed drift series of coordinate or drift logs.
    Drift(DriftCommand),

    /// Largest positive, largest negative and closest lines of a signed difference log.
    Outliers(OutliersCommand),

    /// Reorder an RTT log by node number or by RTT.
    Sort(SortCommand),

    /// Compare two signed difference logs key by key, e.g. two coordinate dimensions.
    CompareDims(CompareDimsCommand),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Diff(_) => "diff",
            Command::Stats(_) => "stats",
            Command::Cdf(_) => "cdf",
            Command::Analyse(_) => "analyse",
            Command::Drift(_) => "drift",
            Command::Outliers(_) => "outliers",
            Command::Sort(_) => "sort",
            Command::CompareDims(_) => "compare-dims",
        }
    }

    pub fn execute(self, context: &RunContext) -> anyhow::Result<()> {
        match self {
            Command::Diff(cmd) => cmd.execute(context),
            Command::Stats(cmd) => cmd.execute(context),
            Command::Cdf(cmd) => cmd.execute(context),
            Command::Analyse(cmd) => cmd.execute(context),
            Command::Drift(cmd) => cmd.execute(context),
            Command::Outliers(cmd) => cmd.execute(context),
            Command::Sort(cmd) => cmd.execute(context),
            Command::CompareDims(cmd) => cmd.execute(context),
        }
    }
}

/// State shared by every command of one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub command: &'static str,
    pub settings: AnalysisSettings,
    pub json_output: Option<PathBuf>,
}

impl RunContext {
    /// Write `data` as the JSON summary of this run, if one was requested.
    pub(crate) fn write_json<V>(&self, inputs: Vec<PathBuf>, data: V) -> anyhow::Result<()>
    where
        V: Serialize,
    {
        let Some(path) = &self.json_output else {
            return Ok(());
        };
        SummaryOutput::new(self.command, inputs, data)?
            .write_to(path)
            .with_context(|| format!("Failed to write JSON summary to {}", path.display()))
    }
}

/// Extract `path`, failing when the file holds no valid record at all.
pub(crate) fn extract_non_empty(pattern: RecordPattern, path: &Path) -> anyhow::Result<Extraction> {
    let extraction = Extractor::new(pattern)
        .extract_file(path)
        .with_context(|| format!("Cannot analyse {}", path.display()))?;
    if extraction.report.is_empty() {
        anyhow::bail!(
            "No valid records in {} ({} lines skipped)",
            path.display(),
            extraction.report.total()
        );
    }
    log::info!(
        "Read {} valid and {} invalid lines from {}",
        extraction.report.valid,
        extraction.report.invalid,
        path.display()
    );
    Ok(extraction)
}

pub(crate) fn create_dir(path: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))
}
