//! Record model shared by the network coordinate analysis tooling.
//!
//! A [LogRecord] is one parsed line from either a coordinate log or an RTT log. Records are
//! collected into a [RecordStore] which offers the two keyed access modes the analyses need.

mod record;
mod store;

pub use record::{
    Endpoint, EndpointKey, LogRecord, Measurement, NetworkCoordinate, NetworkType, ScopedKey,
};
pub use store::RecordStore;
