use crate::stats::{self, StatsError};
use chrono::{DateTime, TimeDelta, Utc};
use netcoord_log_model::{LogRecord, Measurement, NetworkCoordinate, RecordStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A timestamped value.
pub type Sample = (DateTime<Utc>, f64);

#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    #[error("Bucket width must be positive, got {0}")]
    InvalidWidth(TimeDelta),
    #[error(transparent)]
    Stats(#[from] StatsError),
}

/// The values that fell into one bucket, `start` being the timestamp of its first sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    pub values: Vec<f64>,
}

impl TimeBucket {
    pub fn summary(&self) -> Result<BucketSummary, StatsError> {
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);

        Ok(BucketSummary {
            start: self.start,
            count: stats::count(&sorted)?,
            mean: stats::mean(&sorted)?,
            min: stats::min(&sorted)?,
            max: stats::max(&sorted)?,
            p25: stats::percentile_of_sorted(&sorted, 25.0)?,
            p75: stats::percentile_of_sorted(&sorted, 75.0)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub start: DateTime<Utc>,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p75: f64,
}

/// One bucket per distinct timestamp, ordered by timestamp.
pub fn bucket_by_timestamp<I>(samples: I) -> Vec<TimeBucket>
where
    I: IntoIterator<Item = Sample>,
{
    let mut grouped: BTreeMap<DateTime<Utc>, Vec<f64>> = BTreeMap::new();
    for (timestamp, value) in samples {
        grouped.entry(timestamp).or_default().push(value);
    }
    grouped
        .into_iter()
        .map(|(start, values)| TimeBucket { start, values })
        .collect()
}

/// Group samples into consecutive windows of `width`.
///
/// A window opens at the first sample not covered by the previous one, so windows never overlap
/// but may leave gaps where there was no data. The last window is always kept even when it is
/// shorter than `width`.
pub fn bucket_by_window<I>(samples: I, width: TimeDelta) -> Result<Vec<TimeBucket>, BucketError>
where
    I: IntoIterator<Item = Sample>,
{
    if width <= TimeDelta::zero() {
        return Err(BucketError::InvalidWidth(width));
    }

    let mut samples = samples.into_iter().collect::<Vec<_>>();
    samples.sort_by_key(|(timestamp, _)| *timestamp);

    let mut buckets = Vec::new();
    let mut current: Option<TimeBucket> = None;
    for (timestamp, value) in samples {
        if let Some(bucket) = current.as_mut() {
            if timestamp - bucket.start < width {
                bucket.values.push(value);
                continue;
            }
        }
        if let Some(done) = current.replace(TimeBucket {
            start: timestamp,
            values: vec![value],
        }) {
            buckets.push(done);
        }
    }
    buckets.extend(current);

    log::debug!("Grouped samples into {} windows of {width}", buckets.len());
    Ok(buckets)
}

pub fn summarise(buckets: &[TimeBucket]) -> Result<Vec<BucketSummary>, BucketError> {
    buckets
        .iter()
        .map(|bucket| bucket.summary().map_err(BucketError::from))
        .collect()
}

/// Distance from the origin of every coordinate record.
pub fn coordinate_magnitudes(records: &RecordStore<LogRecord>) -> Vec<Sample> {
    records
        .iter()
        .filter_map(LogRecord::coordinate)
        .map(|c| (c.timestamp, c.magnitude()))
        .collect()
}

pub fn coordinates(records: &RecordStore<LogRecord>) -> Vec<NetworkCoordinate> {
    records.iter().filter_map(LogRecord::coordinate).collect()
}

/// The `vec_distance_ms` and `total_drift_ms` samples of a node drift log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDriftSamples {
    pub vec_distance: Vec<Sample>,
    pub total_drift: Vec<Sample>,
}

pub fn node_drift(records: &RecordStore<LogRecord>) -> NodeDriftSamples {
    let mut samples = NodeDriftSamples::default();
    for record in records.iter() {
        if let (
            Some(timestamp),
            Measurement::NodeDrift {
                vec_distance_ms,
                total_drift_ms,
                ..
            },
        ) = (record.timestamp, &record.measurement)
        {
            samples.vec_distance.push((timestamp, *vec_distance_ms));
            samples.total_drift.push((timestamp, *total_drift_ms));
        }
    }
    samples
}

/// The raw `centroid_ms` series of a centroid drift log, in input order.
pub fn centroid_drift(records: &RecordStore<LogRecord>) -> Vec<Sample> {
    records
        .iter()
        .filter_map(|record| match record.measurement {
            Measurement::CentroidDrift { centroid_ms } => Some((record.timestamp?, centroid_ms)),
            _ => None,
        })
        .collect()
}

/// The centroid of all coordinates sharing one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidPoint {
    pub timestamp: DateTime<Utc>,
    pub nodes: usize,
    pub centroid: Vec<f64>,
    /// Distance to the previous centroid, [None] for the first one
    pub migration: Option<f64>,
    /// Euclidean norm of the per axis sample standard deviations
    pub spread: f64,
}

/// Centroid per timestamp, ordered by timestamp.
///
/// Coordinates whose dimension differs from the first coordinate of their timestamp are skipped.
pub fn centroid_series(coordinates: &[NetworkCoordinate]) -> Vec<CentroidPoint> {
    let mut grouped: BTreeMap<DateTime<Utc>, Vec<&[f64]>> = BTreeMap::new();
    for coordinate in coordinates {
        grouped
            .entry(coordinate.timestamp)
            .or_default()
            .push(coordinate.vec.as_slice());
    }

    let mut points: Vec<CentroidPoint> = Vec::with_capacity(grouped.len());
    for (timestamp, vecs) in grouped {
        let Some(dimensions) = vecs.first().map(|v| v.len()) else {
            continue;
        };
        let vecs = vecs
            .into_iter()
            .filter(|v| v.len() == dimensions)
            .collect::<Vec<_>>();
        let n = vecs.len() as f64;

        let centroid = (0..dimensions)
            .map(|axis| vecs.iter().map(|v| v[axis]).sum::<f64>() / n)
            .collect::<Vec<_>>();

        let spread = if vecs.len() < 2 {
            0.0
        } else {
            (0..dimensions)
                .map(|axis| {
                    vecs.iter()
                        .map(|v| (v[axis] - centroid[axis]).powi(2))
                        .sum::<f64>()
                        / (n - 1.0)
                })
                .sum::<f64>()
                .sqrt()
        };

        let migration = points
            .last()
            .filter(|previous| previous.centroid.len() == centroid.len())
            .map(|previous| distance(&previous.centroid, &centroid));

        points.push(CentroidPoint {
            timestamp,
            nodes: vecs.len(),
            centroid,
            migration,
            spread,
        });
    }

    points
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}
