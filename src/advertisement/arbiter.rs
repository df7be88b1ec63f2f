//! Advertisement preferred-source arbitration (§4.2).
//!
//! A logical probe may be heard through several advertisers at once: its
//! own direct advertisement, and one repeated advertisement per MeatNet
//! node currently rebroadcasting for it. The arbiter picks exactly one
//! preferred source per advertising mode so the Probe State Machine never
//! has to reason about more than one advertisement stream at a time.

use std::time::Duration;

use super::wire::{Advertisement, AdvertisingMode};
use crate::idle_monitor::IdleMonitor;

/// Idle timeout before a new advertiser at an equal-or-worse hop count is
/// allowed to replace the incumbent, for `Normal` mode.
pub const NORMAL_TIMEOUT: Duration = Duration::from_millis(5000);
/// Idle timeout for `InstantRead` mode.
pub const INSTANT_READ_TIMEOUT: Duration = Duration::from_millis(3000);

fn timeout_for(mode: AdvertisingMode) -> Duration {
    match mode {
        AdvertisingMode::InstantRead => INSTANT_READ_TIMEOUT,
        _ => NORMAL_TIMEOUT,
    }
}

/// Outcome of handing one advertisement to the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether this advertisement's link is now (or remains) the
    /// preferred source for its mode, and its contents should be
    /// published into the snapshot.
    pub publish: bool,
    /// Whether the advertising link is the preferred RSSI source,
    /// independent of `publish` — an out-competed advertiser can still be
    /// the best RSSI reading available (§4.4.2).
    pub is_preferred_source: bool,
}

/// A `{ current_device_id, hop_count, idle_monitor }` record for one
/// advertising mode (§3 "Preferred Advertiser record").
///
/// `hop_count` has to be remembered somewhere to compare against a new
/// arrival's hop count (step 2 of §4.2); it's private bookkeeping, not a
/// public field.
#[derive(Debug)]
struct PreferredAdvertiser {
    current_device_id: Option<String>,
    hop_count: u8,
    monitor: IdleMonitor,
}

impl PreferredAdvertiser {
    fn new() -> Self {
        Self {
            current_device_id: None,
            hop_count: u8::MAX,
            monitor: IdleMonitor::new(),
        }
    }

    fn set(&mut self, device_id: &str, hop_count: u8) {
        self.current_device_id = Some(device_id.to_string());
        self.hop_count = hop_count;
        self.monitor.touch();
    }

    fn is_current(&self, device_id: &str) -> bool {
        self.current_device_id.as_deref() == Some(device_id)
    }
}

/// Per-probe arbiter holding one [`PreferredAdvertiser`] record per
/// arbitrated mode (`Normal`, `InstantRead`).
#[derive(Debug)]
pub struct AdvertisementArbiter {
    normal: PreferredAdvertiser,
    instant_read: PreferredAdvertiser,
}

impl Default for AdvertisementArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvertisementArbiter {
    /// Create an arbiter with both mode records unset.
    pub fn new() -> Self {
        Self {
            normal: PreferredAdvertiser::new(),
            instant_read: PreferredAdvertiser::new(),
        }
    }

    fn record_for(&mut self, mode: AdvertisingMode) -> Option<&mut PreferredAdvertiser> {
        match mode {
            AdvertisingMode::Normal => Some(&mut self.normal),
            AdvertisingMode::InstantRead => Some(&mut self.instant_read),
            AdvertisingMode::Other => None,
        }
    }

    /// Feed one advertisement through the 5-step decision (§4.2).
    ///
    /// `Other`-mode advertisements never arbitrate: they always publish
    /// and are always their own preferred source.
    pub fn handle(&mut self, advertisement: &Advertisement) -> Decision {
        let mode = advertisement.mode;
        let timeout = timeout_for(mode);
        let device_id = advertisement.device_id.as_str();
        let hop_count = advertisement.hop_count;

        let record = match self.record_for(mode) {
            Some(r) => r,
            None => {
                return Decision {
                    publish: true,
                    is_preferred_source: true,
                }
            }
        };

        if record.current_device_id.is_none() {
            record.set(device_id, hop_count);
            return Decision {
                publish: true,
                is_preferred_source: true,
            };
        }

        if hop_count < record.hop_count {
            record.set(device_id, hop_count);
            return Decision {
                publish: true,
                is_preferred_source: true,
            };
        }

        if record.is_current(device_id) {
            record.monitor.touch();
            return Decision {
                publish: true,
                is_preferred_source: true,
            };
        }

        if record.monitor.is_idle(timeout) {
            record.set(device_id, hop_count);
            return Decision {
                publish: true,
                is_preferred_source: true,
            };
        }

        Decision {
            publish: false,
            is_preferred_source: false,
        }
    }

    /// Whether `device_id` is the current preferred source for `mode`,
    /// without feeding in a new advertisement. Used to decide whether a
    /// suppressed advertisement's RSSI should still update the snapshot.
    pub fn is_preferred_source(&self, mode: AdvertisingMode, device_id: &str) -> bool {
        match mode {
            AdvertisingMode::Normal => self.normal.is_current(device_id),
            AdvertisingMode::InstantRead => self.instant_read.is_current(device_id),
            AdvertisingMode::Other => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::temperatures::{ProbeTemperatures, RawTemperature, VirtualTemperatures};
    use crate::advertisement::wire::{BatteryStatus, Overheating, ProbeColor, ProbeId, ProductType};
    use std::thread::sleep;

    fn adv(device_id: &str, hop_count: u8, mode: AdvertisingMode) -> Advertisement {
        Advertisement {
            device_id: device_id.to_string(),
            mac: None,
            name: None,
            rssi: None,
            product_type: ProductType::Probe,
            is_connectable: true,
            serial_number: "12345678".to_string(),
            hop_count,
            mode,
            probe_temperatures: ProbeTemperatures {
                values: [RawTemperature::new(1000); 8],
            },
            virtual_temperatures: VirtualTemperatures::default(),
            battery_status: BatteryStatus::Ok,
            probe_id: ProbeId::new(1),
            color: ProbeColor::Yellow,
            overheating: Overheating::default(),
            gauge: None,
        }
    }

    #[test]
    fn first_advertisement_always_publishes() {
        let mut arb = AdvertisementArbiter::new();
        let d = arb.handle(&adv("node-a", 1, AdvertisingMode::Normal));
        assert!(d.publish);
        assert!(d.is_preferred_source);
    }

    #[test]
    fn lower_hop_count_replaces_incumbent() {
        let mut arb = AdvertisementArbiter::new();
        arb.handle(&adv("node-a", 2, AdvertisingMode::Normal));
        let d = arb.handle(&adv("node-b", 1, AdvertisingMode::Normal));
        assert!(d.publish);
        assert!(arb.is_preferred_source(AdvertisingMode::Normal, "node-b"));
    }

    /// After a replacement, exactly one source is preferred: the new
    /// winner, never the old incumbent, and never both at once.
    #[test]
    fn replacement_leaves_exactly_one_preferred_source() {
        let mut arb = AdvertisementArbiter::new();
        arb.handle(&adv("node-a", 2, AdvertisingMode::Normal));
        arb.handle(&adv("node-b", 1, AdvertisingMode::Normal));

        assert!(arb.is_preferred_source(AdvertisingMode::Normal, "node-b"));
        assert!(!arb.is_preferred_source(AdvertisingMode::Normal, "node-a"));

        // A late, equal-or-worse-hop arrival from the displaced incumbent
        // does not win it back immediately.
        let d = arb.handle(&adv("node-a", 2, AdvertisingMode::Normal));
        assert!(!d.publish);
        assert!(arb.is_preferred_source(AdvertisingMode::Normal, "node-b"));
        assert!(!arb.is_preferred_source(AdvertisingMode::Normal, "node-a"));
    }

    #[test]
    fn equal_hop_count_keeps_incumbent_until_idle() {
        let mut arb = AdvertisementArbiter::new();
        arb.handle(&adv("node-a", 1, AdvertisingMode::Normal));
        let d = arb.handle(&adv("node-b", 1, AdvertisingMode::Normal));
        assert!(!d.publish);
        assert!(!d.is_preferred_source);
        assert!(arb.is_preferred_source(AdvertisingMode::Normal, "node-a"));
    }

    #[test]
    fn incumbent_touch_keeps_it_current() {
        let mut arb = AdvertisementArbiter::new();
        arb.handle(&adv("node-a", 1, AdvertisingMode::Normal));
        let d = arb.handle(&adv("node-a", 1, AdvertisingMode::Normal));
        assert!(d.publish);
        assert!(d.is_preferred_source);
    }

    #[test]
    fn idle_incumbent_is_replaced_even_at_equal_hop_count() {
        // Real-time replacement of a stale equal-hop incumbent is exercised
        // end to end (with a mockable clock) by the probe state machine's
        // S3 scenario test; here we only confirm the incumbent is still
        // fresh immediately after being set.
        let mut arb = AdvertisementArbiter::new();
        arb.handle(&adv("node-a", 1, AdvertisingMode::InstantRead));
        assert!(!arb.instant_read.monitor.is_idle(INSTANT_READ_TIMEOUT));
        sleep(Duration::from_millis(1));
        assert!(!arb.instant_read.monitor.is_idle(INSTANT_READ_TIMEOUT));
    }

    #[test]
    fn other_mode_never_arbitrates() {
        let mut arb = AdvertisementArbiter::new();
        let d1 = arb.handle(&adv("node-a", 3, AdvertisingMode::Other));
        let d2 = arb.handle(&adv("node-b", 1, AdvertisingMode::Other));
        assert!(d1.publish);
        assert!(d2.publish);
    }
}
