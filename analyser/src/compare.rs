use crate::stats::{self, AggregateStatistics, StatsError};
use indexmap::IndexMap;
use netcoord_log_model::{
    Endpoint, EndpointKey, LogRecord, NetworkType, RecordStore, ScopedKey,
};
use serde::{Deserialize, Serialize};

/// How repeated measurements of the same key are paired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Pairing {
    /// One value per key on each side, a later line replacing an earlier one.
    #[default]
    LastWins,
    /// Every estimate is compared with the mean of all ground truth samples for its key.
    #[value(name = "mean")]
    MeanGroundTruth,
}

/// What identifies a measurement when pairing the two logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KeyScope {
    /// Source and destination node ids.
    #[default]
    Endpoints,
    /// Source and destination node ids within the same `=== section ===`.
    Section,
}

impl KeyScope {
    fn key(&self, record: &LogRecord) -> Option<ScopedKey> {
        // only RTT records can be paired
        record.rtt()?;
        match self {
            KeyScope::Endpoints => record.endpoint_key().map(|key| ScopedKey { section: None, key }),
            KeyScope::Section => record.scoped_key(),
        }
    }
}

/// One matched key: the estimate against its ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub key: ScopedKey,
    pub section: Option<String>,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub estimate: f64,
    pub ground_truth: f64,
    /// How many ground truth samples went into [ComparisonEntry::ground_truth]
    pub ground_truth_samples: usize,
}

impl ComparisonEntry {
    /// `estimate - ground_truth`, negative when the estimate is too low.
    pub fn signed(&self) -> f64 {
        self.estimate - self.ground_truth
    }

    pub fn absolute(&self) -> f64 {
        self.signed().abs()
    }

    /// `|estimate - ground_truth| / ground_truth`, undefined for a zero ground truth.
    pub fn relative(&self) -> Option<f64> {
        (self.ground_truth != 0.0).then(|| self.absolute() / self.ground_truth)
    }

    pub fn network_type(&self) -> Option<NetworkType> {
        match (&self.source.network, &self.destination.network) {
            (Some(a), Some(b)) if a == b => Some(NetworkType::Intra),
            (Some(_), Some(_)) => Some(NetworkType::Inter),
            _ => None,
        }
    }

    /// `[net] a (addr) → [net] b (addr)`
    pub fn pair_label(&self) -> String {
        format!("{} → {}", self.source, self.destination)
    }
}

/// Pairs an estimate log with a ground truth log.
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    pairing: Pairing,
    scope: KeyScope,
}

impl Comparator {
    pub fn new(pairing: Pairing, scope: KeyScope) -> Self {
        Self { pairing, scope }
    }

    /// Match both logs by key.
    ///
    /// Entries follow the order in which keys first appear in the estimate log. Keys present on
    /// one side only are left out of the entries and counted.
    pub fn compare(
        &self,
        ground_truth: &RecordStore<LogRecord>,
        estimates: &RecordStore<LogRecord>,
    ) -> Comparison {
        let comparison = match self.pairing {
            Pairing::LastWins => self.compare_last_wins(ground_truth, estimates),
            Pairing::MeanGroundTruth => self.compare_mean(ground_truth, estimates),
        };

        if comparison.unmatched_estimates > 0 || comparison.unmatched_ground_truth > 0 {
            log::warn!(
                "Unmatched keys: {} estimates without ground truth, {} ground truth without estimate",
                comparison.unmatched_estimates,
                comparison.unmatched_ground_truth
            );
        }
        log::debug!("Paired {} measurements", comparison.entries.len());

        comparison
    }

    fn compare_last_wins(
        &self,
        ground_truth: &RecordStore<LogRecord>,
        estimates: &RecordStore<LogRecord>,
    ) -> Comparison {
        let truth = ground_truth.index_last_wins(|r| self.scope.key(r));
        let estimated = estimates.index_last_wins(|r| self.scope.key(r));

        let mut entries = Vec::with_capacity(estimated.len());
        let mut unmatched_estimates = 0;
        for (key, estimate) in &estimated {
            match truth.get(key) {
                Some(truth) => entries.push(entry(key, estimate, truth, rtt(truth), 1)),
                None => {
                    log::debug!("No ground truth for {key}");
                    unmatched_estimates += 1;
                }
            }
        }

        Comparison {
            entries,
            unmatched_estimates,
            unmatched_ground_truth: count_missing(truth.keys(), &estimated),
        }
    }

    fn compare_mean(
        &self,
        ground_truth: &RecordStore<LogRecord>,
        estimates: &RecordStore<LogRecord>,
    ) -> Comparison {
        let truth = ground_truth.group_all(|r| self.scope.key(r));
        let estimated = estimates.group_all(|r| self.scope.key(r));

        let mut entries = Vec::with_capacity(estimates.len());
        let mut unmatched_estimates = 0;
        for (key, records) in &estimated {
            let Some(samples) = truth.get(key) else {
                log::debug!("No ground truth for {key}");
                unmatched_estimates += 1;
                continue;
            };
            let mean = samples.iter().map(|r| rtt(r)).sum::<f64>() / samples.len() as f64;
            // the latest sample provides the endpoint descriptors
            let Some(last) = samples.last() else {
                continue;
            };
            for estimate in records {
                entries.push(entry(key, estimate, last, mean, samples.len()));
            }
        }

        Comparison {
            entries,
            unmatched_estimates,
            unmatched_ground_truth: count_missing(truth.keys(), &estimated),
        }
    }
}

fn rtt(record: &LogRecord) -> f64 {
    record.rtt().unwrap_or_default()
}

fn entry(
    key: &ScopedKey,
    estimate: &LogRecord,
    truth: &LogRecord,
    ground_truth: f64,
    samples: usize,
) -> ComparisonEntry {
    // the key exists, so both records carry both endpoints
    let source = truth.source.clone().unwrap_or_else(|| Endpoint::new(&key.key.source));
    let destination = truth
        .destination
        .clone()
        .unwrap_or_else(|| Endpoint::new(&key.key.destination));

    ComparisonEntry {
        key: key.clone(),
        section: truth.section.clone().or_else(|| estimate.section.clone()),
        source,
        destination,
        estimate: rtt(estimate),
        ground_truth,
        ground_truth_samples: samples,
    }
}

fn count_missing<'a, K, V>(keys: impl Iterator<Item = &'a K>, other: &IndexMap<K, V>) -> usize
where
    K: std::hash::Hash + Eq + 'a,
{
    keys.filter(|key| !other.contains_key(*key)).count()
}

/// The paired measurements of two logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub entries: Vec<ComparisonEntry>,
    /// Estimate keys with no ground truth
    pub unmatched_estimates: usize,
    /// Ground truth keys with no estimate
    pub unmatched_ground_truth: usize,
}

impl Comparison {
    pub fn unmatched(&self) -> usize {
        self.unmatched_estimates + self.unmatched_ground_truth
    }

    pub fn signed(&self) -> Vec<f64> {
        self.entries.iter().map(ComparisonEntry::signed).collect()
    }

    pub fn absolute(&self) -> Vec<f64> {
        self.entries.iter().map(ComparisonEntry::absolute).collect()
    }

    pub fn relative(&self) -> Vec<f64> {
        self.entries.iter().filter_map(ComparisonEntry::relative).collect()
    }

    pub fn estimates(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.estimate).collect()
    }

    pub fn ground_truths(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.ground_truth).collect()
    }

    /// Error metrics over all paired entries.
    ///
    /// Fails with [StatsError::EmptyInput] when nothing could be paired.
    pub fn summary(&self, percentiles: &[f64]) -> Result<ComparisonSummary, StatsError> {
        let estimates = self.estimates();
        let truths = self.ground_truths();

        let correlation = match stats::pearson_correlation(&truths, &estimates) {
            Ok(r) => Some(r),
            Err(StatsError::UndefinedCorrelation) => {
                log::warn!("Correlation is undefined for these measurements");
                None
            }
            Err(e) => return Err(e),
        };

        let relative = self.relative();
        let relative = if relative.is_empty() {
            None
        } else {
            Some(AggregateStatistics::compute(&relative, percentiles)?)
        };

        Ok(ComparisonSummary {
            pairs: self.entries.len(),
            unmatched_estimates: self.unmatched_estimates,
            unmatched_ground_truth: self.unmatched_ground_truth,
            mae: stats::mean_absolute_error(&estimates, &truths)?,
            rmse: stats::root_mean_square_error(&estimates, &truths)?,
            correlation,
            signed: AggregateStatistics::compute(&self.signed(), percentiles)?,
            absolute: AggregateStatistics::compute(&self.absolute(), percentiles)?,
            relative,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub pairs: usize,
    pub unmatched_estimates: usize,
    pub unmatched_ground_truth: usize,
    pub mae: f64,
    pub rmse: f64,
    pub correlation: Option<f64>,
    pub signed: AggregateStatistics,
    pub absolute: AggregateStatistics,
    pub relative: Option<AggregateStatistics>,
}

/// Which of two difference logs is closer to the ground truth for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Better {
    A,
    B,
    Tie,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRow {
    /// `[net] a → [net] b`
    pub label: String,
    pub a: f64,
    pub b: f64,
    pub better: Better,
}

/// Head to head comparison of two signed difference logs, e.g. a 5D against an 8D run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionComparison {
    pub label_a: String,
    pub label_b: String,
    pub rows: Vec<DimensionRow>,
    pub wins_a: usize,
    pub wins_b: usize,
    pub ties: usize,
    /// Keys present in only one of the two logs
    pub unmatched: usize,
}

impl DimensionComparison {
    pub fn overall(&self) -> Better {
        match self.wins_a.cmp(&self.wins_b) {
            std::cmp::Ordering::Greater => Better::A,
            std::cmp::Ordering::Less => Better::B,
            std::cmp::Ordering::Equal => Better::Tie,
        }
    }

    pub fn label_of(&self, better: Better) -> &str {
        match better {
            Better::A => &self.label_a,
            Better::B => &self.label_b,
            Better::Tie => "Tie",
        }
    }
}

/// Compare two signed difference logs key by key, keeping the order of log `a`.
pub fn compare_dimensions(
    label_a: impl Into<String>,
    a: &RecordStore<LogRecord>,
    label_b: impl Into<String>,
    b: &RecordStore<LogRecord>,
) -> DimensionComparison {
    let key_of = |r: &LogRecord| -> Option<EndpointKey> {
        r.rtt()?;
        r.endpoint_key()
    };
    let index_a = a.index_last_wins(key_of);
    let index_b = b.index_last_wins(key_of);

    let mut comparison = DimensionComparison {
        label_a: label_a.into(),
        label_b: label_b.into(),
        rows: Vec::with_capacity(index_a.len()),
        wins_a: 0,
        wins_b: 0,
        ties: 0,
        unmatched: 0,
    };

    for (key, record_a) in &index_a {
        let Some(record_b) = index_b.get(key) else {
            comparison.unmatched += 1;
            continue;
        };
        let (diff_a, diff_b) = (rtt(record_a), rtt(record_b));
        let better = if diff_a.abs() < diff_b.abs() {
            comparison.wins_a += 1;
            Better::A
        } else if diff_b.abs() < diff_a.abs() {
            comparison.wins_b += 1;
            Better::B
        } else {
            comparison.ties += 1;
            Better::Tie
        };
        comparison.rows.push(DimensionRow {
            label: short_label(record_a),
            a: diff_a,
            b: diff_b,
            better,
        });
    }
    comparison.unmatched += count_missing(index_b.keys(), &index_a);

    comparison
}

fn short_label(record: &LogRecord) -> String {
    let strip = |endpoint: &Option<Endpoint>| {
        endpoint
            .as_ref()
            .map(|e| Endpoint {
                address: None,
                ..e.clone()
            })
            .map(|e| e.to_string())
            .unwrap_or_default()
    };
    format!("{} → {}", strip(&record.source), strip(&record.destination))
}
