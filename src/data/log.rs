//! Temperature log bookkeeping.
//!
//! The actual log bytes are downloaded and persisted by collaborators this
//! crate does not implement (§1: "persistent log storage" is out of
//! scope). What the Probe State Machine does own is *progress*: how many
//! records have been downloaded against the probe's advertised
//! min/max sequence range, so it can report `records_downloaded` and
//! `log_upload_percent` on the snapshot and decide when a transfer is
//! complete (§4.4.8).

use crate::error::{Error, Result};

use super::temperatures::ProbeTemperatures;

/// A single logged data point received during a log transfer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoggedDataPoint {
    /// Sequence number of this data point.
    pub sequence_number: u32,
    /// Temperature readings from all 8 sensors at this sample.
    pub temperatures: ProbeTemperatures,
}

impl LoggedDataPoint {
    /// Minimum payload size: a 4-byte sequence number plus 13 packed
    /// temperature bytes.
    const MIN_PAYLOAD_SIZE: usize = 17;

    /// Create a new logged data point.
    pub fn new(sequence_number: u32, temperatures: ProbeTemperatures) -> Self {
        Self {
            sequence_number,
            temperatures,
        }
    }

    /// Parse one record out of a `ReadLogsResponse` UART message payload
    /// (sequence number, little-endian u32, followed by the same 13-byte
    /// packed temperature layout as a status notification).
    pub fn from_uart_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::MIN_PAYLOAD_SIZE {
            return Err(Error::InvalidData {
                context: format!(
                    "log record too short: {} bytes (need at least {})",
                    payload.len(),
                    Self::MIN_PAYLOAD_SIZE
                ),
            });
        }
        let sequence_number = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let temperatures = ProbeTemperatures::from_packed_bytes(&payload[4..17]).ok_or_else(|| Error::InvalidData {
            context: "malformed packed temperature data in log record".to_string(),
        })?;
        Ok(Self::new(sequence_number, temperatures))
    }
}

/// Tracks download progress for one probe's temperature log against its
/// advertised `[min_sequence, max_sequence]` range.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemperatureLog {
    /// Number of records received in the current transfer.
    records_downloaded: u32,
}

impl TemperatureLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that one more data point has arrived.
    pub fn record_received(&mut self, _point: &LoggedDataPoint) {
        self.records_downloaded += 1;
    }

    /// Reset progress, e.g. when a session changes or a transfer restarts.
    pub fn reset(&mut self) {
        self.records_downloaded = 0;
    }

    /// Number of records received so far in the current transfer.
    pub fn records_downloaded(&self) -> u32 {
        self.records_downloaded
    }

    /// Percentage of `[min_seq, max_seq]` downloaded so far (0.0-100.0).
    ///
    /// An empty or inverted range (`max_seq < min_seq`) is considered fully
    /// synced.
    pub fn percent_synced(&self, min_seq: u32, max_seq: u32) -> f64 {
        if max_seq <= min_seq {
            return 100.0;
        }
        let total_expected = (max_seq - min_seq + 1) as f64;
        (self.records_downloaded as f64 / total_expected * 100.0).min(100.0)
    }
}
