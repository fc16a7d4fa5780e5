use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One side of a directed measurement, as written in the logs: `[network] id (address)`.
///
/// Only the `id` is mandatory. Older producers omit the network label and the address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// The network segment label, e.g. `net_1`
    pub network: Option<String>,
    /// The node identifier, e.g. `clab-nebula-serf3`
    pub id: String,
    /// The node address, usually an IPv4 address
    pub address: Option<String>,
}

impl Endpoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            network: None,
            id: id.into(),
            address: None,
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// The trailing number of the node id, `3` for `clab-nebula-serf3`.
    pub fn numeric_suffix(&self) -> Option<u64> {
        let digits = self
            .id
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>();
        if digits.is_empty() {
            return None;
        }
        digits.chars().rev().collect::<String>().parse().ok()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(network) = &self.network {
            write!(f, "[{network}] ")?;
        }
        write!(f, "{}", self.id)?;
        if let Some(address) = &self.address {
            write!(f, " ({address})")?;
        }
        Ok(())
    }
}

/// Directed pair of node ids. `a → b` and `b → a` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointKey {
    pub source: String,
    pub destination: String,
}

impl EndpointKey {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.source, self.destination)
    }
}

/// An [EndpointKey] optionally scoped by the section it was logged under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopedKey {
    pub section: Option<String>,
    pub key: EndpointKey,
}

impl fmt::Display for ScopedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.section {
            Some(section) => write!(f, "[{section}] {}", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}

/// Whether both endpoints of a measurement sit in the same labelled network segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    Intra,
    Inter,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Intra => "intra",
            NetworkType::Inter => "inter",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The numeric payload of a record, one variant per log shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measurement {
    /// A round trip time, or a difference between an estimated and a measured round trip time.
    ///
    /// Difference lines carry the two source values in `serf_rtt` and `ping_rtt`.
    Rtt {
        value: f64,
        unit_ms: bool,
        serf_rtt: Option<f64>,
        ping_rtt: Option<f64>,
    },
    /// A synthetic coordinate of any dimension.
    Coordinate { vec: Vec<f64> },
    /// Per node drift relative to the origin.
    NodeDrift {
        vec_distance_ms: f64,
        total_drift_ms: f64,
        height: f64,
        adjustment: f64,
    },
    /// Drift of the centroid of all coordinates.
    CentroidDrift { centroid_ms: f64 },
}

impl Measurement {
    /// The scalar most analyses look at for this record.
    ///
    /// For coordinates this is the distance from the origin.
    pub fn primary_value(&self) -> f64 {
        match self {
            Measurement::Rtt { value, .. } => *value,
            Measurement::Coordinate { vec } => euclidean_norm(vec),
            Measurement::NodeDrift {
                vec_distance_ms, ..
            } => *vec_distance_ms,
            Measurement::CentroidDrift { centroid_ms } => *centroid_ms,
        }
    }

    /// True for difference lines, which may legitimately hold negative values.
    pub fn is_difference(&self) -> bool {
        matches!(
            self,
            Measurement::Rtt {
                serf_rtt: Some(_),
                ping_rtt: Some(_),
                ..
            }
        )
    }
}

/// One parsed log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// 1-based line number in the source file
    pub line_number: usize,
    pub timestamp: Option<DateTime<Utc>>,
    /// The measuring node, or the node a coordinate belongs to
    pub source: Option<Endpoint>,
    pub destination: Option<Endpoint>,
    /// The `=== ... ===` section the record was logged under
    pub section: Option<String>,
    pub measurement: Measurement,
}

impl LogRecord {
    pub fn new(line_number: usize, measurement: Measurement) -> Self {
        Self {
            line_number,
            timestamp: None,
            source: None,
            destination: None,
            section: None,
            measurement,
        }
    }

    pub fn endpoint_key(&self) -> Option<EndpointKey> {
        match (&self.source, &self.destination) {
            (Some(source), Some(destination)) => {
                Some(EndpointKey::new(&source.id, &destination.id))
            }
            _ => None,
        }
    }

    pub fn scoped_key(&self) -> Option<ScopedKey> {
        self.endpoint_key().map(|key| ScopedKey {
            section: self.section.clone(),
            key,
        })
    }

    /// Intra when both endpoints carry the same network label, inter when they differ.
    ///
    /// Returns [None] if either endpoint has no network label.
    pub fn network_type(&self) -> Option<NetworkType> {
        let source = self.source.as_ref()?.network.as_ref()?;
        let destination = self.destination.as_ref()?.network.as_ref()?;
        if source == destination {
            Some(NetworkType::Intra)
        } else {
            Some(NetworkType::Inter)
        }
    }

    /// The value of an RTT or difference record.
    pub fn rtt(&self) -> Option<f64> {
        match self.measurement {
            Measurement::Rtt { value, .. } => Some(value),
            _ => None,
        }
    }

    /// `[net] a (addr) → [net] b (addr)`, the prefix shared by all RTT line shapes.
    pub fn pair_label(&self) -> Option<String> {
        match (&self.source, &self.destination) {
            (Some(source), Some(destination)) => Some(format!("{source} → {destination}")),
            _ => None,
        }
    }

    pub fn coordinate(&self) -> Option<NetworkCoordinate> {
        match &self.measurement {
            Measurement::Coordinate { vec } => Some(NetworkCoordinate {
                node: self.source.as_ref()?.id.clone(),
                timestamp: self.timestamp?,
                vec: vec.clone(),
            }),
            _ => None,
        }
    }
}

/// A node's synthetic coordinate sampled at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkCoordinate {
    pub node: String,
    pub timestamp: DateTime<Utc>,
    pub vec: Vec<f64>,
}

impl NetworkCoordinate {
    pub fn dimensions(&self) -> usize {
        self.vec.len()
    }

    /// Euclidean distance from the origin.
    pub fn magnitude(&self) -> f64 {
        euclidean_norm(&self.vec)
    }
}

fn euclidean_norm(vec: &[f64]) -> f64 {
    vec.iter().map(|v| v * v).sum::<f64>().sqrt()
}
