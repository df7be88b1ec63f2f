//! Probe State Machine (§4.4) — the fusion engine's heart.
//!
//! Owns one [`LinkArbiter`], one [`AdvertisementArbiter`], the three idle
//! monitors that drive staleness, a [`PredictionLinearizer`], an
//! [`InstantReadFilter`], the session-info cache, log-transfer bookkeeping,
//! and the current [`ProbeSnapshot`]. Every public method here corresponds
//! to one of the inputs listed in §4.4 ("advertisement", "status
//! notification", "connection state change", ...); each returns whatever
//! side effect the caller (the Network Manager, or the owning task) needs
//! to carry out, since this struct never touches a socket itself.

use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::debug;

use crate::advertisement::wire::{Advertisement, AdvertisingMode};
use crate::advertisement::arbiter::AdvertisementArbiter;
use crate::data::log::{LoggedDataPoint, TemperatureLog};
use crate::data::prediction::PredictionInfo;
use crate::data::session::SessionInfo;
use crate::idle_monitor::IdleMonitor;
use crate::instant_read::InstantReadFilter;
use crate::link::{ConnectionState, LinkArbiter, LinkArbiterSettings, LinkId, LinkKind};
use crate::prediction::PredictionLinearizer;
use crate::protocol::status::ProbeStatus;

use super::snapshot::{ProbeSnapshot, UploadState};

/// Staleness watchdog timing (§4.4.6).
pub const STATUS_NOTIFICATIONS_STALE_TIMEOUT: Duration = Duration::from_millis(15_000);
/// Prediction staleness timeout (§4.4.6, §6).
pub const PREDICTION_STALE_TIMEOUT: Duration = Duration::from_millis(60_000);
/// Warm-up before the staleness watchdog starts evaluating (§4.4.6).
pub const STALENESS_WARMUP: Duration = Duration::from_millis(30_000);
/// Staleness watchdog poll interval (§4.4.6).
pub const STALENESS_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

/// Flow capacity for `snapshot_flow`/`probe_status_flow` (§5 "buffer ~10").
const BROADCAST_DROP_OLDEST_CAPACITY: usize = 10;
/// `log_response_flow` must never drop a record (§5), so it gets a much
/// larger buffer; a real backpressure-suspend producer is a property of
/// the concrete Link implementation, not of this channel.
const LOG_RESPONSE_CAPACITY: usize = 256;

/// The fused, owner-scope-confined state for one logical probe.
pub struct ProbeStateMachine {
    serial_number: String,
    link_arbiter: LinkArbiter,
    advertisement_arbiter: AdvertisementArbiter,
    status_notifications_monitor: IdleMonitor,
    prediction_monitor: IdleMonitor,
    instant_read_filter: InstantReadFilter,
    linearizer: PredictionLinearizer,
    session_info: Option<SessionInfo>,
    session_info_timeout: bool,
    last_mesh_enabled: bool,
    log: TemperatureLog,
    log_owner: Option<LinkId>,
    snapshot: ProbeSnapshot,
    snapshot_tx: broadcast::Sender<ProbeSnapshot>,
    status_tx: broadcast::Sender<ProbeStatus>,
    log_tx: broadcast::Sender<LoggedDataPoint>,
}

impl ProbeStateMachine {
    /// Create a new state machine for a just-discovered probe.
    pub fn new(serial_number: impl Into<String>) -> Self {
        let serial_number = serial_number.into();
        let (snapshot_tx, _) = broadcast::channel(BROADCAST_DROP_OLDEST_CAPACITY);
        let (status_tx, _) = broadcast::channel(BROADCAST_DROP_OLDEST_CAPACITY);
        let (log_tx, _) = broadcast::channel(LOG_RESPONSE_CAPACITY);
        Self {
            snapshot: ProbeSnapshot::new(serial_number.clone()),
            serial_number,
            link_arbiter: LinkArbiter::new(),
            advertisement_arbiter: AdvertisementArbiter::new(),
            status_notifications_monitor: IdleMonitor::new(),
            prediction_monitor: IdleMonitor::new(),
            instant_read_filter: InstantReadFilter::new(),
            linearizer: PredictionLinearizer::new(),
            session_info: None,
            session_info_timeout: false,
            last_mesh_enabled: true,
            log: TemperatureLog::new(),
            log_owner: None,
            snapshot_tx,
            status_tx,
            log_tx,
        }
    }

    /// This probe's serial number.
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> &ProbeSnapshot {
        &self.snapshot
    }

    /// Mutable access to the link arbiter, for the Network Manager to
    /// attach/detach links as they're discovered or removed.
    pub fn link_arbiter_mut(&mut self) -> &mut LinkArbiter {
        &mut self.link_arbiter
    }

    /// Subscribe to whole-snapshot updates.
    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<ProbeSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Subscribe to raw status notifications (`probe_status_flow`).
    pub fn subscribe_status(&self) -> broadcast::Receiver<ProbeStatus> {
        self.status_tx.subscribe()
    }

    /// Subscribe to the log-response stream (`log_response_flow`).
    pub fn subscribe_log_responses(&self) -> broadcast::Receiver<LoggedDataPoint> {
        self.log_tx.subscribe()
    }

    fn publish_snapshot(&mut self) {
        self.recompute_connection_state();
        let _ = self.snapshot_tx.send(self.snapshot.clone());
    }

    /// §4.4.1: fuse link connection states (plus session-info timeout)
    /// into the probe's reported `connection_state`.
    fn recompute_connection_state(&mut self) {
        let direct_state = self.link_arbiter.direct_record().map(|r| r.connection_state);
        let repeated_states: Vec<ConnectionState> = self
            .link_arbiter
            .repeated_records()
            .iter()
            .map(|r| r.connection_state)
            .collect();

        let settings_mesh_enabled = self.last_mesh_enabled;
        let settings = LinkArbiterSettings {
            mesh_enabled: settings_mesh_enabled,
            ..LinkArbiterSettings::default()
        };
        let coincides_with_preferred = self
            .link_arbiter
            .direct_record()
            .zip(self.link_arbiter.preferred_meatnet_link(&settings))
            .is_some_and(|(direct, preferred)| direct.id == preferred.id);

        let reported = if !settings_mesh_enabled {
            direct_state.unwrap_or(ConnectionState::OutOfRange)
        } else if coincides_with_preferred {
            direct_state.expect("coincides_with_preferred implies a direct record exists")
        } else if self.link_arbiter.meatnet_is_out_of_range() {
            ConnectionState::OutOfRange
        } else if self.any_connected()
            && self.session_info_timeout
            && self.snapshot.upload_state != UploadState::ProbeUploadInProgress
        {
            ConnectionState::NoRoute
        } else if self.any_connected() {
            ConnectionState::Connected
        } else if Self::any_state(&direct_state, &repeated_states, ConnectionState::Connecting) {
            ConnectionState::Connecting
        } else if Self::any_state(&direct_state, &repeated_states, ConnectionState::Disconnecting) {
            ConnectionState::Disconnecting
        } else if Self::any_state(&direct_state, &repeated_states, ConnectionState::AdvertisingConnectable) {
            ConnectionState::AdvertisingConnectable
        } else if Self::any_state(&direct_state, &repeated_states, ConnectionState::AdvertisingNotConnectable) {
            ConnectionState::AdvertisingNotConnectable
        } else {
            ConnectionState::NoRoute
        };

        self.snapshot.connection_state = reported;
    }

    fn any_connected(&self) -> bool {
        self.link_arbiter
            .direct_record()
            .is_some_and(|r| r.connection_state.is_connected())
            || self
                .link_arbiter
                .repeated_records()
                .iter()
                .any(|r| r.connection_state.is_connected())
    }

    fn any_state(
        direct: &Option<ConnectionState>,
        repeated: &[ConnectionState],
        target: ConnectionState,
    ) -> bool {
        *direct == Some(target) || repeated.iter().any(|s| *s == target)
    }

    /// §4.4.2: handle one advertisement arriving on `link_id`.
    ///
    /// Returns `true` if the caller should now issue `connect()` to this
    /// link (the engine decides; the caller performs the I/O).
    pub fn handle_advertisement(
        &mut self,
        link_id: &LinkId,
        kind: LinkKind,
        advertisement: &Advertisement,
        settings: &LinkArbiterSettings,
        now: Instant,
    ) -> bool {
        self.last_mesh_enabled = settings.mesh_enabled;
        let decision = self.advertisement_arbiter.handle(advertisement);

        if decision.publish {
            self.apply_advertisement_fields(advertisement);
        } else if self
            .advertisement_arbiter
            .is_preferred_source(AdvertisingMode::Normal, &advertisement.device_id)
            || self
                .advertisement_arbiter
                .is_preferred_source(AdvertisingMode::InstantRead, &advertisement.device_id)
        {
            self.snapshot.hop_count = Some(advertisement.hop_count);
        }

        self.publish_snapshot();
        if matches!(
            self.snapshot.connection_state,
            ConnectionState::AdvertisingConnectable
                | ConnectionState::AdvertisingNotConnectable
                | ConnectionState::Connecting
        ) {
            debug!(serial = %self.serial_number, state = %self.snapshot.connection_state, "advertising state stamped");
        }

        self.link_arbiter
            .should_connect(link_id, kind, false, settings, now)
    }

    fn apply_advertisement_fields(&mut self, advertisement: &Advertisement) {
        self.snapshot.battery_status = Some(advertisement.battery_status);
        self.snapshot.probe_id = Some(advertisement.probe_id);
        self.snapshot.color = Some(advertisement.color);
        self.snapshot.overheating = advertisement.overheating;
        self.snapshot.hop_count = Some(advertisement.hop_count);
        self.snapshot.preferred_link_device_id = Some(advertisement.device_id.clone());

        match advertisement.mode {
            AdvertisingMode::InstantRead => {
                if let Some(core) = advertisement.virtual_temperatures.core {
                    self.instant_read_filter.update(core);
                }
                self.snapshot.instant_read_smoothed_celsius = self.instant_read_filter.smoothed_celsius();
                self.snapshot.instant_read_raw_celsius = self.instant_read_filter.raw_celsius();
            }
            _ => {
                self.snapshot.temperatures = Some(advertisement.probe_temperatures.clone());
                self.snapshot.virtual_temperatures = Some(advertisement.virtual_temperatures.clone());
            }
        }
    }

    /// §4.4.3: handle a status notification arriving on `link_id`.
    ///
    /// Only notifications from the preferred link (the one
    /// `link_arbiter.preferred_meatnet_link` currently names) are applied;
    /// others are dropped silently.
    pub fn handle_status_notification(
        &mut self,
        link_id: &LinkId,
        status: ProbeStatus,
        settings: &LinkArbiterSettings,
    ) {
        let is_preferred = self
            .link_arbiter
            .preferred_meatnet_link(settings)
            .is_some_and(|r| &r.id == link_id);
        if !is_preferred {
            return;
        }

        self.status_notifications_monitor.touch();
        self.snapshot.status_notifications_stale = false;
        if let Some((record, _)) = self.link_arbiter.record_mut_by_id(link_id) {
            record.touch_liveness();
        }

        self.snapshot.temperatures = Some(status.temperatures.clone());
        self.snapshot.virtual_temperatures = Some(status.virtual_temperatures.clone());
        self.snapshot.battery_status = Some(status.battery_status);
        self.snapshot.probe_id = Some(status.probe_id);
        self.snapshot.color = Some(status.color);
        self.snapshot.overheating = status.overheating;

        // Session identity changes are reported through a dedicated
        // session-info response (`handle_session_info_response`), not
        // through the status packet itself; here we only track the
        // sequence-number range against whatever session is current,
        // keeping `max_sequence_number` monotonic within it (I5).
        self.snapshot.min_sequence_number = Some(status.min_sequence_number);
        self.snapshot.max_sequence_number = Some(
            self.snapshot
                .max_sequence_number
                .unwrap_or(status.max_sequence_number)
                .max(status.max_sequence_number),
        );

        if let Some(prediction) = &status.prediction {
            self.apply_prediction(prediction, status.max_sequence_number);
        } else {
            self.snapshot.prediction = None;
            self.snapshot.prediction_seconds_remaining = None;
            self.snapshot.percent_through_cook = None;
        }

        let _ = self.status_tx.send(status);
        self.publish_snapshot();
    }

    fn apply_prediction(&mut self, prediction: &PredictionInfo, sequence_number: u32) {
        self.prediction_monitor.touch();
        self.snapshot.prediction_stale = false;
        self.snapshot.prediction = Some(prediction.clone());

        if let Some(seconds_remaining) = self.linearizer.on_sample(
            prediction.prediction_value_seconds,
            sequence_number,
            prediction.set_point_temperature,
            prediction.state,
        ) {
            self.snapshot.prediction_seconds_remaining = seconds_remaining;
        }

        self.snapshot.percent_through_cook = self.snapshot.virtual_temperatures.as_ref().and_then(|v| {
            v.core.map(|core| {
                PredictionLinearizer::percent_through_cook(
                    core,
                    prediction.heat_start_temperature,
                    prediction.set_point_temperature,
                )
            })
        });
    }

    /// Advance the fine-resolution prediction ticker by one step (§4.4.4).
    /// The owning task calls this every 200ms while
    /// [`is_prediction_ticker_active`](Self::is_prediction_ticker_active)
    /// is true.
    pub fn tick_prediction(&mut self) {
        let was_active = self.linearizer.is_fine_resolution_active();
        match self.linearizer.tick() {
            Some(value) => {
                self.snapshot.prediction_seconds_remaining = Some(value);
                self.publish_snapshot();
            }
            None if was_active => {
                // the stale timeout just expired and cleared the ticker
                self.publish_snapshot();
            }
            None => {}
        }
    }

    /// Whether the 200ms prediction ticker should currently be running.
    pub fn is_prediction_ticker_active(&self) -> bool {
        self.linearizer.is_fine_resolution_active()
    }

    /// §4.4.6: evaluate staleness. Call every
    /// [`STALENESS_POLL_INTERVAL`] after a [`STALENESS_WARMUP`] delay.
    pub fn evaluate_staleness(&mut self) {
        let status_stale = self
            .status_notifications_monitor
            .is_idle(STATUS_NOTIFICATIONS_STALE_TIMEOUT);
        let is_predicting = self
            .snapshot
            .prediction
            .as_ref()
            .is_some_and(|p| p.state.is_predicting());
        let prediction_stale =
            is_predicting && self.prediction_monitor.is_idle(PREDICTION_STALE_TIMEOUT);

        // The instant-read filter clears its own readings once idle; this
        // is the only place that re-polls it outside of a fresh
        // InstantRead advertisement, so a probe that stops InstantRead
        // advertising still gets its stale snapshot fields cleared.
        let instant_read_smoothed = self.instant_read_filter.smoothed_celsius();
        let instant_read_raw = self.instant_read_filter.raw_celsius();

        let changed = status_stale != self.snapshot.status_notifications_stale
            || prediction_stale != self.snapshot.prediction_stale
            || instant_read_smoothed != self.snapshot.instant_read_smoothed_celsius
            || instant_read_raw != self.snapshot.instant_read_raw_celsius;
        self.snapshot.status_notifications_stale = status_stale;
        self.snapshot.prediction_stale = prediction_stale;
        self.snapshot.instant_read_smoothed_celsius = instant_read_smoothed;
        self.snapshot.instant_read_raw_celsius = instant_read_raw;
        if changed {
            self.publish_snapshot();
        }

        self.evaluate_link_liveness();
    }

    /// §4.4.1 input: a link's connection state changed.
    pub fn handle_connection_state_change(
        &mut self,
        link_id: &LinkId,
        kind: LinkKind,
        new_state: ConnectionState,
    ) {
        match kind {
            LinkKind::Direct => {
                if let Some(direct) = self.link_arbiter.direct_record().filter(|r| &r.id == link_id) {
                    let mut updated = direct.clone();
                    updated.connection_state = new_state;
                    self.link_arbiter.upsert_direct(updated);
                }
            }
            LinkKind::Repeated => {
                if let Some(record) = self
                    .link_arbiter
                    .repeated_records()
                    .iter()
                    .find(|r| &r.id == link_id)
                {
                    let mut updated = record.clone();
                    updated.connection_state = new_state;
                    self.link_arbiter.upsert_repeated(updated);
                }
            }
        }

        if new_state == ConnectionState::Disconnected || new_state == ConnectionState::OutOfRange {
            if self.log_owner.as_ref() == Some(link_id) {
                self.finish_log_transfer();
            }
        }

        self.publish_snapshot();
    }

    /// §4.4 input: an RSSI reading (or failed poll) arrived for `link_id`
    /// (§4.6). Returns `true` if this failure just tripped the
    /// [`LinkRecord::RSSI_FAILURE_THRESHOLD`](crate::link::LinkRecord::RSSI_FAILURE_THRESHOLD)
    /// and the caller should disconnect this link so it can reconnect via
    /// arbitration.
    pub fn handle_remote_rssi(&mut self, link_id: &LinkId, rssi: Option<i16>, now: Instant) -> bool {
        let Some((record, _)) = self.link_arbiter.record_mut_by_id(link_id) else {
            return false;
        };

        let should_disconnect = match rssi {
            Some(value) => {
                record.record_rssi(value, now);
                false
            }
            None => record.record_rssi_failure(),
        };

        self.publish_snapshot();
        should_disconnect
    }

    /// §4.4 input: `link_id` has gone out of range (no advertisement,
    /// status notification, or RSSI poll for
    /// [`OUT_OF_RANGE_TIMEOUT`](crate::link::OUT_OF_RANGE_TIMEOUT)).
    pub fn handle_out_of_range(&mut self, link_id: &LinkId, kind: LinkKind) {
        self.handle_connection_state_change(link_id, kind, ConnectionState::OutOfRange);
    }

    /// Sweep every link for silence past
    /// [`OUT_OF_RANGE_TIMEOUT`](crate::link::OUT_OF_RANGE_TIMEOUT) and
    /// demote any that have gone quiet (§6). Called from
    /// [`evaluate_staleness`](Self::evaluate_staleness).
    fn evaluate_link_liveness(&mut self) {
        for (link_id, kind) in self.link_arbiter.stale_links() {
            self.handle_out_of_range(&link_id, kind);
        }
    }

    /// §4.4.8: request a log transfer, pinning the current preferred link.
    ///
    /// Returns the pinned link id so the caller can issue the actual
    /// `request_log_records` call, or `None` if no link is eligible right
    /// now.
    pub fn request_log_transfer(&mut self, settings: &LinkArbiterSettings) -> Option<LinkId> {
        let preferred = self.link_arbiter.preferred_meatnet_link(settings)?.id.clone();
        self.log_owner = Some(preferred.clone());
        self.log.reset();
        self.snapshot.upload_state = UploadState::ProbeUploadRequested;
        self.snapshot.records_downloaded = 0;
        self.publish_snapshot();
        Some(preferred)
    }

    /// A log data point arrived on `link_id`. Dropped if it didn't come
    /// from the pinned owner (§4.4.8 "do not migrate the in-flight
    /// transfer").
    pub fn handle_log_data_point(&mut self, link_id: &LinkId, point: LoggedDataPoint) {
        if self.log_owner.as_ref() != Some(link_id) {
            return;
        }
        self.log.record_received(&point);
        self.snapshot.upload_state = UploadState::ProbeUploadInProgress;
        self.snapshot.records_downloaded = self.log.records_downloaded();
        if let (Some(min), Some(max)) = (self.snapshot.min_sequence_number, self.snapshot.max_sequence_number) {
            self.snapshot.log_upload_percent = self.log.percent_synced(min, max);
            if self.snapshot.log_upload_percent >= 100.0 {
                self.finish_log_transfer();
            }
        }
        let _ = self.log_tx.send(point);
        self.publish_snapshot();
    }

    fn finish_log_transfer(&mut self) {
        if self.log_owner.is_none() && self.snapshot.upload_state == UploadState::Unavailable {
            return;
        }
        self.log_owner = None;
        self.snapshot.upload_state = UploadState::Unavailable;
    }

    /// §4.6: a session-info request timed out.
    pub fn handle_session_info_timeout(&mut self) {
        self.session_info_timeout = true;
        self.publish_snapshot();
    }

    /// A session-info response arrived; clears the timeout flag.
    pub fn handle_session_info_response(&mut self, session_info: SessionInfo) {
        self.session_info_timeout = false;
        if self.session_info.as_ref() != Some(&session_info) {
            self.finish_log_transfer();
            // New session: the sequence-number range tracked against the
            // old session no longer means anything (I5).
            self.snapshot.min_sequence_number = None;
            self.snapshot.max_sequence_number = None;
        }
        self.session_info = Some(session_info.clone());
        self.snapshot.session_info = Some(session_info);
        self.publish_snapshot();
    }

    /// §4.3 log-transfer optimization: whether the direct link should be
    /// dropped in favor of mesh right now.
    pub fn should_drop_direct_for_mesh(&self) -> bool {
        self.link_arbiter
            .should_drop_direct_for_mesh(self.snapshot.upload_state == UploadState::ProbeUploadInProgress)
    }

    /// Cancel all cooperative work owned by this state machine (§5
    /// `finish()`). Concretely: nothing is spawned *inside* this struct
    /// (the owning task drives ticks/polls), so this only resets transient
    /// bookkeeping the next owner shouldn't inherit.
    pub fn finish(&mut self) {
        self.finish_log_transfer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertisement::wire::{BatteryStatus, Overheating, ProbeColor, ProbeId, ProductType};
    use crate::data::temperatures::{ProbeTemperatures, RawTemperature, VirtualTemperatures};

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
                values: [RawTemperature::new(900); 8],
            },
            virtual_temperatures: VirtualTemperatures::default(),
            battery_status: BatteryStatus::Ok,
            probe_id: ProbeId::new(1),
            color: ProbeColor::Yellow,
            overheating: Overheating::default(),
            gauge: None,
        }
    }

    fn direct_record(device_id: &str, serial: &str) -> crate::link::LinkRecord {
        let mut r = crate::link::LinkRecord::new(LinkId::new(device_id, serial), LinkKind::Direct, 0);
        r.is_connectable = true;
        r
    }

    /// S1: single direct probe, normal mode — discovery transitions the
    /// snapshot out of `OutOfRange`, and attributes the preferred link.
    #[test]
    fn s1_single_direct_probe_normal_mode() {
        let mut sm = ProbeStateMachine::new("12345678");
        sm.link_arbiter_mut().upsert_direct(direct_record("D1", "12345678"));

        let settings = LinkArbiterSettings::default();
        let a1 = adv("D1", 0, AdvertisingMode::Normal);
        sm.handle_advertisement(&LinkId::new("D1", "12345678"), LinkKind::Direct, &a1, &settings, Instant::now());

        assert_eq!(sm.snapshot().preferred_link_device_id.as_deref(), Some("D1"));
        assert!(sm.snapshot().temperatures.is_some());
    }

    /// S2: advertiser switch by hop count — a lower-hop-count source
    /// replaces the incumbent even on the very next advertisement.
    #[test]
    fn s2_advertiser_switch_by_hop_count() {
        let mut sm = ProbeStateMachine::new("12345678");
        let settings = LinkArbiterSettings::default();
        let now = Instant::now();

        let a1 = adv("node-1", 1, AdvertisingMode::Normal);
        sm.handle_advertisement(&LinkId::new("node-1", "12345678"), LinkKind::Repeated, &a1, &settings, now);
        assert_eq!(sm.snapshot().preferred_link_device_id.as_deref(), Some("node-1"));

        let a2 = adv("node-2", 0, AdvertisingMode::Normal);
        sm.handle_advertisement(&LinkId::new("node-2", "12345678"), LinkKind::Repeated, &a2, &settings, now);
        assert_eq!(sm.snapshot().preferred_link_device_id.as_deref(), Some("node-2"));
        assert_eq!(sm.snapshot().hop_count, Some(0));
    }

    /// S3: advertiser sticky on equal hop until idle — a same-hop
    /// challenger is suppressed while the incumbent keeps advertising.
    #[test]
    fn s3_advertiser_sticky_on_equal_hop() {
        let mut sm = ProbeStateMachine::new("12345678");
        let settings = LinkArbiterSettings::default();
        let now = Instant::now();

        let a1 = adv("node-1", 1, AdvertisingMode::Normal);
        sm.handle_advertisement(&LinkId::new("node-1", "12345678"), LinkKind::Repeated, &a1, &settings, now);

        let a2 = adv("node-2", 1, AdvertisingMode::Normal);
        sm.handle_advertisement(&LinkId::new("node-2", "12345678"), LinkKind::Repeated, &a2, &settings, now);

        assert_eq!(sm.snapshot().preferred_link_device_id.as_deref(), Some("node-1"));
    }

    #[test]
    fn idempotent_reapplying_same_advertisement_yields_same_snapshot() {
        let mut sm = ProbeStateMachine::new("12345678");
        let settings = LinkArbiterSettings::default();
        let now = Instant::now();
        let a1 = adv("D1", 0, AdvertisingMode::Normal);
        let id = LinkId::new("D1", "12345678");

        sm.handle_advertisement(&id, LinkKind::Direct, &a1, &settings, now);
        let first = sm.snapshot().clone();
        sm.handle_advertisement(&id, LinkKind::Direct, &a1, &settings, now);
        let second = sm.snapshot().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn status_notification_from_non_preferred_link_is_dropped() {
        let mut sm = ProbeStateMachine::new("12345678");
        sm.link_arbiter_mut().upsert_direct({
            let mut r = direct_record("D1", "12345678");
            r.connection_state = ConnectionState::Connected;
            r
        });
        let settings = LinkArbiterSettings::default();

        let other = LinkId::new("node-99", "12345678");
        let status = ProbeStatus {
            min_sequence_number: 0,
            max_sequence_number: 10,
            temperatures: ProbeTemperatures {
                values: [RawTemperature::new(900); 8],
            },
            mode: AdvertisingMode::Normal,
            probe_id: ProbeId::new(1),
            color: ProbeColor::Yellow,
            battery_status: BatteryStatus::Ok,
            virtual_temperatures: VirtualTemperatures::default(),
            prediction: None,
            overheating: Overheating::default(),
        };
        sm.handle_status_notification(&other, status, &settings);
        assert_eq!(sm.snapshot().max_sequence_number, None);
    }

    #[test]
    fn max_sequence_number_is_monotonic_within_a_session() {
        let mut sm = ProbeStateMachine::new("12345678");
        let id = LinkId::new("D1", "12345678");
        sm.link_arbiter_mut().upsert_direct({
            let mut r = direct_record("D1", "12345678");
            r.connection_state = ConnectionState::Connected;
            r
        });
        let settings = LinkArbiterSettings::default();

        let make_status = |max: u32| ProbeStatus {
            min_sequence_number: 0,
            max_sequence_number: max,
            temperatures: ProbeTemperatures {
                values: [RawTemperature::new(900); 8],
            },
            mode: AdvertisingMode::Normal,
            probe_id: ProbeId::new(1),
            color: ProbeColor::Yellow,
            battery_status: BatteryStatus::Ok,
            virtual_temperatures: VirtualTemperatures::default(),
            prediction: None,
            overheating: Overheating::default(),
        };

        sm.handle_status_notification(&id, make_status(50), &settings);
        assert_eq!(sm.snapshot().max_sequence_number, Some(50));
        sm.handle_status_notification(&id, make_status(30), &settings);
        assert_eq!(sm.snapshot().max_sequence_number, Some(50));
        sm.handle_status_notification(&id, make_status(60), &settings);
        assert_eq!(sm.snapshot().max_sequence_number, Some(60));
    }

    #[test]
    fn log_transfer_pins_its_link_and_ignores_other_sources() {
        let mut sm = ProbeStateMachine::new("12345678");
        sm.link_arbiter_mut().upsert_direct({
            let mut r = direct_record("D1", "12345678");
            r.connection_state = ConnectionState::Connected;
            r
        });
        let settings = LinkArbiterSettings::default();
        let owner = sm.request_log_transfer(&settings).unwrap();
        assert_eq!(owner.device_id, "D1");

        let point = LoggedDataPoint::new(
            0,
            ProbeTemperatures {
                values: [RawTemperature::new(900); 8],
            },
        );
        sm.handle_log_data_point(&LinkId::new("node-other", "12345678"), point.clone());
        assert_eq!(sm.snapshot().records_downloaded, 0);

        sm.handle_log_data_point(&owner, point);
        assert_eq!(sm.snapshot().records_downloaded, 1);
    }

    /// §4.4.1 row 3: a connected direct link that is also the preferred
    /// meatnet link reports its own state even when a session-info timeout
    /// would otherwise force `NoRoute` (row 5). Coincidence wins because it
    /// sits earlier in the fusion table.
    #[test]
    fn coincident_direct_and_preferred_link_overrides_session_timeout_no_route() {
        let mut sm = ProbeStateMachine::new("12345678");
        sm.link_arbiter_mut().upsert_direct({
            let mut r = direct_record("D1", "12345678");
            r.connection_state = ConnectionState::Connected;
            r
        });

        sm.handle_session_info_timeout();

        assert_eq!(sm.snapshot().connection_state, ConnectionState::Connected);
    }

    /// I5: a new session invalidates the sequence-number range tracked
    /// against the old one.
    #[test]
    fn session_change_resets_min_max_sequence_numbers() {
        let mut sm = ProbeStateMachine::new("12345678");
        let id = LinkId::new("D1", "12345678");
        sm.link_arbiter_mut().upsert_direct({
            let mut r = direct_record("D1", "12345678");
            r.connection_state = ConnectionState::Connected;
            r
        });
        let settings = LinkArbiterSettings::default();

        let status = ProbeStatus {
            min_sequence_number: 10,
            max_sequence_number: 50,
            temperatures: ProbeTemperatures {
                values: [RawTemperature::new(900); 8],
            },
            mode: AdvertisingMode::Normal,
            probe_id: ProbeId::new(1),
            color: ProbeColor::Yellow,
            battery_status: BatteryStatus::Ok,
            virtual_temperatures: VirtualTemperatures::default(),
            prediction: None,
            overheating: Overheating::default(),
        };
        sm.handle_status_notification(&id, status, &settings);
        assert_eq!(sm.snapshot().min_sequence_number, Some(10));
        assert_eq!(sm.snapshot().max_sequence_number, Some(50));

        sm.handle_session_info_response(SessionInfo::new(0x1, 1000));
        assert_eq!(sm.snapshot().min_sequence_number, None);
        assert_eq!(sm.snapshot().max_sequence_number, None);

        // Re-delivering the *same* session must not re-clear.
        sm.handle_status_notification(
            &id,
            ProbeStatus {
                min_sequence_number: 60,
                max_sequence_number: 90,
                temperatures: ProbeTemperatures {
                    values: [RawTemperature::new(900); 8],
                },
                mode: AdvertisingMode::Normal,
                probe_id: ProbeId::new(1),
                color: ProbeColor::Yellow,
                battery_status: BatteryStatus::Ok,
                virtual_temperatures: VirtualTemperatures::default(),
                prediction: None,
                overheating: Overheating::default(),
            },
            &settings,
        );
        assert_eq!(sm.snapshot().max_sequence_number, Some(90));
        sm.handle_session_info_response(SessionInfo::new(0x1, 1000));
        assert_eq!(sm.snapshot().max_sequence_number, Some(90));
    }

    /// §4.4.5: the staleness watchdog re-polls the instant-read filter on
    /// every tick, not just when a fresh InstantRead advertisement arrives,
    /// so a value it already holds keeps surfacing in the snapshot between
    /// advertisements.
    #[test]
    fn evaluate_staleness_repolls_instant_read_fields() {
        let mut sm = ProbeStateMachine::new("12345678");
        sm.link_arbiter_mut().upsert_direct(direct_record("D1", "12345678"));
        let settings = LinkArbiterSettings::default();
        let mut a1 = adv("D1", 0, AdvertisingMode::InstantRead);
        a1.virtual_temperatures.core = Some(55.0);
        sm.handle_advertisement(&LinkId::new("D1", "12345678"), LinkKind::Direct, &a1, &settings, Instant::now());

        assert_eq!(sm.snapshot().instant_read_smoothed_celsius, Some(55.0));
        assert_eq!(sm.snapshot().instant_read_raw_celsius, Some(55.0));

        // A poll on its own, with no new advertisement, keeps surfacing the
        // still-fresh reading rather than leaving it stuck at whatever was
        // set at arrival time.
        sm.evaluate_staleness();
        assert_eq!(sm.snapshot().instant_read_smoothed_celsius, Some(55.0));
        assert_eq!(sm.snapshot().instant_read_raw_celsius, Some(55.0));
    }

    /// §4.6: five consecutive failed RSSI polls trips the disconnect
    /// threshold; a success in between resets the streak.
    #[test]
    fn handle_remote_rssi_trips_disconnect_at_threshold() {
        let mut sm = ProbeStateMachine::new("12345678");
        let id = LinkId::new("D1", "12345678");
        sm.link_arbiter_mut().upsert_direct(direct_record("D1", "12345678"));
        let now = Instant::now();

        for _ in 0..4 {
            assert!(!sm.handle_remote_rssi(&id, None, now));
        }
        assert!(sm.handle_remote_rssi(&id, None, now));

        assert!(!sm.handle_remote_rssi(&id, Some(-50), now));
        for _ in 0..4 {
            assert!(!sm.handle_remote_rssi(&id, None, now));
        }
    }

    /// §6: a link that's never been touched by an advertisement, status
    /// notification, or RSSI poll is out of range from the start (the idle
    /// monitor's "never touched = idle forever" rule), so the staleness
    /// sweep demotes it on the very first poll.
    #[test]
    fn evaluate_staleness_demotes_untouched_link_to_out_of_range() {
        let mut sm = ProbeStateMachine::new("12345678");
        sm.link_arbiter_mut().upsert_direct({
            let mut r = direct_record("D1", "12345678");
            r.connection_state = ConnectionState::Connected;
            r
        });

        sm.evaluate_staleness();

        assert_eq!(
            sm.link_arbiter_mut().direct_record().unwrap().connection_state,
            ConnectionState::OutOfRange
        );
    }
}
