use chrono::{DateTime, NaiveDateTime, Utc};
use netcoord_log_model::{Endpoint, LogRecord, Measurement};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

/// Timestamp prefix written by the Go `log` package.
const LOG_PREFIX_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// RTT and RTT difference lines.
///
/// Accepts both the compact (`12.5ms`, `[serf_rtt:12.5ms, ...]`) and the spaced (`12.5 ms`,
/// `[serf_rtt: 12.5 ms, ...]`) producers, with or without the network label and address of
/// each endpoint. An optional producer tag such as `ping:` may precede the endpoints.
static RTT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^\s*
        (?:(?P<timestamp>\d{4}/\d{2}/\d{2}\s\d{2}:\d{2}:\d{2})\s+)?
        (?:[A-Za-z_][\w-]*:\s+)?   # producer tag, e.g. `ping:` or `serf:`
        (?:\[(?P<src_net>[^\]]+)\]\s*)?
        (?P<src>[^\s\[\]()→:]+)
        (?:\s*\((?P<src_addr>[^)]*)\))?
        \s*(?:→|->)\s*
        (?:\[(?P<dst_net>[^\]]+)\]\s*)?
        (?P<dst>[^\s\[\]()→:]+)
        (?:\s*\((?P<dst_addr>[^)]*)\))?
        \s*:\s*
        (?P<value>[+-]?\d+(?:\.\d+)?)
        (?:\s*(?P<unit>ms))?
        (?:\s*\[serf_rtt:\s*(?P<serf>\d+(?:\.\d+)?)\s*ms\s*,\s*ping_rtt:\s*(?P<ping>\d+(?:\.\d+)?)\s*ms\s*\])?
        ",
    )
    .expect("RTT line pattern is valid")
});

static COORDINATE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        Time:\s*(?P<timestamp>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2}))
        \s*-\s*Node:\s*(?P<node>\S+)
        \s*\|\s*Vec:\s*\[(?P<vec>[^\]]*)\]
        ",
    )
    .expect("Coordinate line pattern is valid")
});

static NODE_DRIFT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^\s*NODE_DRIFT,
        time=(?P<timestamp>[^,]+),
        node=(?P<node>[^,]+),
        vec_distance_ms=(?P<vec_distance>[+-]?\d+(?:\.\d+)?),
        total_drift_ms=(?P<total_drift>[+-]?\d+(?:\.\d+)?),
        height=(?P<height>[+-]?\d+(?:\.\d+)?),
        adjustment=(?P<adjustment>[+-]?\d+(?:\.\d+)?)
        \s*$
        ",
    )
    .expect("Node drift line pattern is valid")
});

static CENTROID_DRIFT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^\s*DRIFT_DATA,
        time=(?P<timestamp>[^,]+),
        centroid_ms=(?P<centroid>[+-]?\d+(?:\.\d+)?)
        \s*$
        ",
    )
    .expect("Centroid drift line pattern is valid")
});

/// The shape of the log being read. Each variant is matched by one tolerant expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPattern {
    /// `[net] a (addr) → [net] b (addr): 12.5ms`, optionally with a `[serf_rtt:.., ping_rtt:..]`
    /// suffix
    Rtt,
    /// `Time: <RFC3339> - Node: <id> | Vec: [<f64> ...]`
    Coordinate,
    /// `NODE_DRIFT,time=..,node=..,vec_distance_ms=..,total_drift_ms=..,height=..,adjustment=..`
    NodeDrift,
    /// `DRIFT_DATA,time=..,centroid_ms=..`
    CentroidDrift,
}

impl RecordPattern {
    /// Match a single line. Returns [None] for lines that do not fit the pattern.
    pub fn parse_line(&self, line_number: usize, line: &str) -> Option<LogRecord> {
        match self {
            RecordPattern::Rtt => parse_rtt(line_number, &RTT_LINE.captures(line)?),
            RecordPattern::Coordinate => {
                parse_coordinate(line_number, &COORDINATE_LINE.captures(line)?)
            }
            RecordPattern::NodeDrift => {
                parse_node_drift(line_number, &NODE_DRIFT_LINE.captures(line)?)
            }
            RecordPattern::CentroidDrift => {
                parse_centroid_drift(line_number, &CENTROID_DRIFT_LINE.captures(line)?)
            }
        }
    }
}

impl FromStr for RecordPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rtt" => Ok(RecordPattern::Rtt),
            "coordinate" | "coordinates" => Ok(RecordPattern::Coordinate),
            "node_drift" | "node" => Ok(RecordPattern::NodeDrift),
            "centroid_drift" | "centroid" => Ok(RecordPattern::CentroidDrift),
            other => Err(format!("Unknown record pattern: {other}")),
        }
    }
}

fn parse_rtt(line_number: usize, caps: &Captures) -> Option<LogRecord> {
    let value = number(caps, "value")?;
    let serf_rtt = optional_number(caps, "serf")?;
    let ping_rtt = optional_number(caps, "ping")?;
    let measurement = Measurement::Rtt {
        value,
        unit_ms: caps.name("unit").is_some(),
        serf_rtt,
        ping_rtt,
    };

    // A raw RTT can never be negative, only differences can
    if value < 0.0 && !measurement.is_difference() {
        return None;
    }

    let timestamp = match caps.name("timestamp") {
        Some(ts) => Some(
            NaiveDateTime::parse_from_str(ts.as_str(), LOG_PREFIX_FORMAT)
                .ok()?
                .and_utc(),
        ),
        None => None,
    };

    Some(LogRecord {
        timestamp,
        source: Some(endpoint(caps, "src_net", "src", "src_addr")?),
        destination: Some(endpoint(caps, "dst_net", "dst", "dst_addr")?),
        ..LogRecord::new(line_number, measurement)
    })
}

fn parse_coordinate(line_number: usize, caps: &Captures) -> Option<LogRecord> {
    let vec = caps
        .name("vec")?
        .as_str()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if vec.is_empty() {
        return None;
    }

    Some(LogRecord {
        timestamp: Some(rfc3339(caps, "timestamp")?),
        source: Some(Endpoint::new(caps.name("node")?.as_str())),
        ..LogRecord::new(line_number, Measurement::Coordinate { vec })
    })
}

fn parse_node_drift(line_number: usize, caps: &Captures) -> Option<LogRecord> {
    let measurement = Measurement::NodeDrift {
        vec_distance_ms: number(caps, "vec_distance")?,
        total_drift_ms: number(caps, "total_drift")?,
        height: number(caps, "height")?,
        adjustment: number(caps, "adjustment")?,
    };

    Some(LogRecord {
        timestamp: Some(rfc3339(caps, "timestamp")?),
        source: Some(Endpoint::new(caps.name("node")?.as_str().trim())),
        ..LogRecord::new(line_number, measurement)
    })
}

fn parse_centroid_drift(line_number: usize, caps: &Captures) -> Option<LogRecord> {
    let measurement = Measurement::CentroidDrift {
        centroid_ms: number(caps, "centroid")?,
    };

    Some(LogRecord {
        timestamp: Some(rfc3339(caps, "timestamp")?),
        ..LogRecord::new(line_number, measurement)
    })
}

fn endpoint(caps: &Captures, network: &str, id: &str, address: &str) -> Option<Endpoint> {
    let mut endpoint = Endpoint::new(caps.name(id)?.as_str());
    if let Some(network) = caps.name(network) {
        endpoint = endpoint.with_network(network.as_str().trim());
    }
    if let Some(address) = caps.name(address) {
        endpoint = endpoint.with_address(address.as_str().trim());
    }
    Some(endpoint)
}

fn number(caps: &Captures, name: &str) -> Option<f64> {
    caps.name(name)?.as_str().parse().ok()
}

/// `Some(None)` when the group is absent, [None] when it is present but not a number.
fn optional_number(caps: &Captures, name: &str) -> Option<Option<f64>> {
    match caps.name(name) {
        Some(m) => m.as_str().parse().ok().map(Some),
        None => Some(None),
    }
}

fn rfc3339(caps: &Captures, name: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(caps.name(name)?.as_str().trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
