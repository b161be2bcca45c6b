//! The decoded record published for each resolvable channel of a data
//! frame.

use serde::{Deserialize, Serialize};

/// One channel's worth of samples with station and time metadata,
/// serialized as JSON when handed to downstream transports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StationDataRecord {
    pub station: String,
    /// Logical channel name from the resolver, not the raw 10-byte
    /// channel string.
    pub channel: String,
    pub location: String,
    /// UTC time of the first sample, epoch milliseconds.
    pub timestamp_ms: i64,
    /// Time spanned by the samples, milliseconds.
    pub time_length_ms: u32,
    pub sample_count: u32,
    /// Sequence number of the data frame this record came from.
    pub sequence: u64,
    /// Raw sample bytes, opaque to the receiver.
    pub payload: Vec<u8>,
}

impl StationDataRecord {
    /// Publication key, one per station/channel pair.
    pub fn key(&self) -> String {
        format!("{}/{}", self.station, self.channel)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
