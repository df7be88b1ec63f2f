//! Immutable probe snapshot (§3 "Probe snapshot").
//!
//! Every externally observable fact about a logical probe is collapsed
//! into one of these values each time anything changes. Consumers never
//! see partial updates: the Probe State Machine publishes a whole new
//! `ProbeSnapshot` to `snapshot_flow` (§4.4, §5).

use crate::data::{PredictionInfo, SessionInfo, VirtualTemperatures};
use crate::data::temperatures::ProbeTemperatures;
use crate::advertisement::wire::{BatteryStatus, Overheating, ProbeColor, ProbeId};
use crate::link::ConnectionState;

/// Log-transfer state for a probe (referenced by §4.4.1, §4.4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadState {
    /// No transfer in progress or requested.
    #[default]
    Unavailable,
    /// A transfer has been requested but records haven't started arriving.
    ProbeUploadRequested,
    /// Records are actively being downloaded.
    ProbeUploadInProgress,
    /// The owning link disappeared or lost route mid-transfer.
    ProbeUploadFailed,
}

/// One immutable, fully-fused view of a logical probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSnapshot {
    /// Stable hex serial number.
    pub serial_number: String,
    /// `device_id` of whichever link is currently preferred.
    pub preferred_link_device_id: Option<String>,
    /// Reported connection state (§4.4.1).
    pub connection_state: ConnectionState,
    /// Firmware version string, once read.
    pub fw_version: Option<String>,
    /// Hardware revision string, once read.
    pub hw_revision: Option<String>,
    /// Model information string, once read.
    pub model_info: Option<String>,
    /// Current cooking session, if any.
    pub session_info: Option<SessionInfo>,
    /// Minimum sequence number available on the probe for this session.
    pub min_sequence_number: Option<u32>,
    /// Maximum sequence number available (monotonic within a session, I5).
    pub max_sequence_number: Option<u32>,
    /// Smoothed instant-read temperature, Celsius.
    pub instant_read_smoothed_celsius: Option<f64>,
    /// Raw instant-read temperature, Celsius.
    pub instant_read_raw_celsius: Option<f64>,
    /// All 8 raw sensor temperatures in normal mode.
    pub temperatures: Option<ProbeTemperatures>,
    /// Derived core/surface/ambient temperatures.
    pub virtual_temperatures: Option<VirtualTemperatures>,
    /// Prediction fields, when a prediction is active.
    pub prediction: Option<PredictionInfo>,
    /// Linearized seconds-remaining for display (§4.4.4).
    pub prediction_seconds_remaining: Option<u32>,
    /// `percent_through_cook`, when a prediction is active.
    pub percent_through_cook: Option<f64>,
    /// Battery status of the preferred link.
    pub battery_status: Option<BatteryStatus>,
    /// Silicone ring color.
    pub color: Option<ProbeColor>,
    /// Probe id (1-8).
    pub probe_id: Option<ProbeId>,
    /// Hop count of the currently preferred link (0 = direct).
    pub hop_count: Option<u8>,
    /// Log transfer state.
    pub upload_state: UploadState,
    /// Records downloaded in the current log transfer.
    pub records_downloaded: u32,
    /// Percent of the advertised log range downloaded so far.
    pub log_upload_percent: f64,
    /// True once `status_notifications` has gone idle past its timeout.
    pub status_notifications_stale: bool,
    /// True once `prediction` has gone idle past its timeout while predicting.
    pub prediction_stale: bool,
    /// Overheating sensor flags from the most recent status/advertisement.
    pub overheating: Overheating,
}

impl Default for ProbeSnapshot {
    fn default() -> Self {
        Self {
            serial_number: String::new(),
            preferred_link_device_id: None,
            connection_state: ConnectionState::OutOfRange,
            fw_version: None,
            hw_revision: None,
            model_info: None,
            session_info: None,
            min_sequence_number: None,
            max_sequence_number: None,
            instant_read_smoothed_celsius: None,
            instant_read_raw_celsius: None,
            temperatures: None,
            virtual_temperatures: None,
            prediction: None,
            prediction_seconds_remaining: None,
            percent_through_cook: None,
            battery_status: None,
            color: None,
            probe_id: None,
            hop_count: None,
            upload_state: UploadState::Unavailable,
            records_downloaded: 0,
            log_upload_percent: 0.0,
            status_notifications_stale: false,
            prediction_stale: false,
            overheating: Overheating::default(),
        }
    }
}

impl ProbeSnapshot {
    /// A freshly created snapshot for a probe that has just been discovered.
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_snapshot_starts_out_of_range() {
        let snap = ProbeSnapshot::new("12345678");
        assert_eq!(snap.serial_number, "12345678");
        assert_eq!(snap.connection_state, ConnectionState::OutOfRange);
        assert_eq!(snap.upload_state, UploadState::Unavailable);
    }
}
