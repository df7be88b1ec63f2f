//! Per-link observed state, as tracked by the Link Arbiter.

use std::time::{Duration, Instant};

use crate::idle_monitor::IdleMonitor;

use super::types::{ConnectionState, LinkId, LinkKind};

/// A link not touched by an advertisement, status notification, or RSSI
/// poll within this long is considered out of range (§6).
pub const OUT_OF_RANGE_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Everything the engine knows about one physical radio path to a probe
/// (§3 "Link record").
///
/// This is purely observational bookkeeping: nothing here drives the
/// connection itself. The actual connect/disconnect calls go out through
/// the [`Link`](super::traits::Link) trait; this struct just remembers
/// what was last reported so the arbiter (§4.3) can compare links against
/// each other.
#[derive(Debug, Clone)]
pub struct LinkRecord {
    /// Identity of this link.
    pub id: LinkId,
    /// Whether this is the probe's own radio or a MeatNet repeater.
    pub kind: LinkKind,
    /// Last reported connection state.
    pub connection_state: ConnectionState,
    /// Last reported RSSI, in dBm.
    pub rssi: Option<i16>,
    /// Mesh hop count (0 for a direct link).
    pub hop_count: u8,
    /// Whether the link's most recent advertisement/status reported
    /// connectability.
    pub is_connectable: bool,
    /// Whether DFU mode was last reported on this link.
    pub is_in_dfu: bool,
    /// Firmware version string, once read.
    pub fw_version: Option<String>,
    /// Hardware revision string, once read.
    pub hw_revision: Option<String>,
    /// Model information string, once read.
    pub model_info: Option<String>,
    /// Whether the arbiter should attempt to reconnect this link
    /// automatically after it disconnects.
    pub should_auto_reconnect: bool,
    /// Count of consecutive RSSI polls that failed to produce a reading.
    /// Five consecutive failures (§4.3) is treated as link loss.
    pub consecutive_rssi_failures: u32,
    /// When this link was last observed at all (advertisement, status
    /// notification, or successful RSSI poll).
    pub last_seen: Option<Instant>,
    /// Liveness timer backing [`is_out_of_range`](Self::is_out_of_range);
    /// touched on every advertisement, status notification, and RSSI poll.
    liveness: IdleMonitor,
}

impl LinkRecord {
    /// Create a fresh record for a newly discovered link.
    pub fn new(id: LinkId, kind: LinkKind, hop_count: u8) -> Self {
        Self {
            id,
            kind,
            connection_state: ConnectionState::OutOfRange,
            rssi: None,
            hop_count,
            is_connectable: false,
            is_in_dfu: false,
            fw_version: None,
            hw_revision: None,
            model_info: None,
            should_auto_reconnect: true,
            consecutive_rssi_failures: 0,
            last_seen: None,
            liveness: IdleMonitor::new(),
        }
    }

    /// Record a successful RSSI reading, resetting the failure streak.
    pub fn record_rssi(&mut self, rssi: i16, now: Instant) {
        self.rssi = Some(rssi);
        self.consecutive_rssi_failures = 0;
        self.last_seen = Some(now);
        self.liveness.touch();
    }

    /// Record a failed RSSI poll. Returns `true` once the failure streak
    /// reaches the link-loss threshold (5, per §4.3).
    pub fn record_rssi_failure(&mut self) -> bool {
        self.consecutive_rssi_failures += 1;
        self.consecutive_rssi_failures >= Self::RSSI_FAILURE_THRESHOLD
    }

    /// Consecutive RSSI poll failures after which a link is treated as lost.
    pub const RSSI_FAILURE_THRESHOLD: u32 = 5;

    /// Mark this link as observed right now (advertisement or status
    /// notification arrival).
    pub fn touch_liveness(&mut self) {
        self.liveness.touch();
    }

    /// True once [`OUT_OF_RANGE_TIMEOUT`] has passed without a touch (§6).
    pub fn is_out_of_range(&self) -> bool {
        self.liveness.is_idle(OUT_OF_RANGE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rssi_failure_threshold_trips_at_five() {
        let mut rec = LinkRecord::new(LinkId::new("d", "s"), LinkKind::Direct, 0);
        for _ in 0..4 {
            assert!(!rec.record_rssi_failure());
        }
        assert!(rec.record_rssi_failure());
    }

    #[test]
    fn success_resets_failure_streak() {
        let mut rec = LinkRecord::new(LinkId::new("d", "s"), LinkKind::Direct, 0);
        rec.record_rssi_failure();
        rec.record_rssi_failure();
        rec.record_rssi(-60, Instant::now());
        assert_eq!(rec.consecutive_rssi_failures, 0);
    }
}
