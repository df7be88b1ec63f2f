//! Link Arbiter (§4.3): owns the candidate links for one probe and decides
//! which should be connected.

use std::time::{Duration, Instant};

use super::record::LinkRecord;
use super::types::{ConnectionState, LinkId, LinkKind};

/// Settling window before the arbiter will let a newly seen direct link
/// win over an existing mesh route.
pub const DIRECT_LINK_SETTLING_TIMEOUT: Duration = Duration::from_millis(5000);

/// Settings the arbiter consults; owned by the Network Manager and shared
/// read-only with every probe's arbiter (§4.3, §6 `Settings`).
#[derive(Debug, Clone, Copy)]
pub struct LinkArbiterSettings {
    /// Whether MeatNet mesh routing is enabled at all.
    pub mesh_enabled: bool,
    /// Whether a direct link should reconnect automatically after a drop.
    pub auto_reconnect: bool,
    /// Whether an explicit API call may disconnect a still-useful mesh link.
    pub can_disconnect_from_meatnet_devices: bool,
}

impl Default for LinkArbiterSettings {
    fn default() -> Self {
        Self {
            mesh_enabled: true,
            auto_reconnect: true,
            can_disconnect_from_meatnet_devices: false,
        }
    }
}

/// Per-probe set of candidate links plus the connect/disconnect policy
/// over them.
///
/// Holds at most one direct link (invariant I1) and any number of
/// repeated links (invariant I2, enforced by keying on `device_id`).
#[derive(Debug, Default)]
pub struct LinkArbiter {
    direct: Option<LinkRecord>,
    repeated: Vec<LinkRecord>,
    direct_link_discover_timestamp: Option<Instant>,
}

impl LinkArbiter {
    /// Create an arbiter with no links yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the direct link record.
    pub fn upsert_direct(&mut self, record: LinkRecord) {
        self.direct = Some(record);
    }

    /// Insert or update a repeated link record, keyed by `device_id`.
    pub fn upsert_repeated(&mut self, record: LinkRecord) {
        if let Some(existing) = self
            .repeated
            .iter_mut()
            .find(|r| r.id.device_id == record.id.device_id)
        {
            *existing = record;
        } else {
            self.repeated.push(record);
        }
    }

    /// Remove the repeated link from `device_id`, if any.
    pub fn remove_repeated(&mut self, device_id: &str) {
        self.repeated.retain(|r| r.id.device_id != device_id);
    }

    /// The direct link's record, by reference.
    pub fn direct_record(&self) -> Option<&LinkRecord> {
        self.direct.as_ref()
    }

    /// All repeated link records, by reference.
    pub fn repeated_records(&self) -> &[LinkRecord] {
        &self.repeated
    }

    /// The direct link if connected, else `None` (§4.3 `direct_link`).
    pub fn direct_link(&self) -> Option<&LinkRecord> {
        self.direct
            .as_ref()
            .filter(|r| r.connection_state.is_connected())
    }

    /// Repeated links currently connected (§4.3 `connected_node_links`).
    pub fn connected_node_links(&self) -> Vec<&LinkRecord> {
        self.repeated
            .iter()
            .filter(|r| r.connection_state.is_connected())
            .collect()
    }

    /// The link the engine should treat as the mesh-preferred source
    /// (§3 I3, §4.3 `preferred_meatnet_link`).
    ///
    /// If mesh routing is disabled, this degenerates to `direct_link`.
    /// Otherwise the connected direct link wins if present; failing that,
    /// the connected repeated link with the lowest `(hop_count, device_id)`
    /// that isn't itself `NoRoute`.
    pub fn preferred_meatnet_link(&self, settings: &LinkArbiterSettings) -> Option<&LinkRecord> {
        if !settings.mesh_enabled {
            return self.direct_link();
        }
        if let Some(direct) = self.direct_link() {
            return Some(direct);
        }
        self.repeated
            .iter()
            .filter(|r| r.connection_state.is_connected() && r.connection_state != ConnectionState::NoRoute)
            .min_by(|a, b| (a.hop_count, &a.id.device_id).cmp(&(b.hop_count, &b.id.device_id)))
    }

    /// Whether any repeated link offers a usable route (§4.3 `has_meatnet_route`).
    pub fn has_meatnet_route(&self) -> bool {
        self.repeated
            .iter()
            .any(|r| r.connection_state.is_connected() && r.connection_state != ConnectionState::NoRoute)
    }

    /// Whether no link at all is currently in range (§4.3 `meatnet_is_out_of_range`).
    pub fn meatnet_is_out_of_range(&self) -> bool {
        let direct_in_range = self
            .direct
            .as_ref()
            .is_some_and(|r| r.connection_state != ConnectionState::OutOfRange);
        let any_repeated_in_range = self
            .repeated
            .iter()
            .any(|r| r.connection_state != ConnectionState::OutOfRange);
        !direct_in_range && !any_repeated_in_range
    }

    fn can_connect(record: &LinkRecord) -> bool {
        record.connection_state.is_disconnected() && record.is_connectable && !record.is_in_dfu
    }

    /// Policy `should_connect(link, from_api_call)` (§4.3).
    pub fn should_connect(
        &mut self,
        id: &LinkId,
        kind: LinkKind,
        from_api_call: bool,
        settings: &LinkArbiterSettings,
        now: Instant,
    ) -> bool {
        let record = match self.record_mut(id, kind) {
            Some(r) => r,
            None => return false,
        };
        let can_connect = Self::can_connect(record);

        if settings.mesh_enabled {
            match kind {
                LinkKind::Repeated => can_connect,
                LinkKind::Direct => {
                    if !can_connect {
                        return false;
                    }
                    match self.direct_link_discover_timestamp {
                        None => {
                            self.direct_link_discover_timestamp = Some(now);
                            false
                        }
                        Some(ts) if now >= ts + DIRECT_LINK_SETTLING_TIMEOUT => {
                            !self.has_meatnet_route()
                        }
                        Some(_) => false,
                    }
                }
            }
        } else {
            match kind {
                LinkKind::Direct => {
                    if from_api_call {
                        record.should_auto_reconnect = settings.auto_reconnect;
                        Self::can_connect(record)
                    } else {
                        record.should_auto_reconnect && Self::can_connect(record)
                    }
                }
                LinkKind::Repeated => false,
            }
        }
    }

    /// Policy `should_disconnect(link, from_api_call)` (§4.3).
    pub fn should_disconnect(
        &mut self,
        id: &LinkId,
        kind: LinkKind,
        from_api_call: bool,
        settings: &LinkArbiterSettings,
    ) -> bool {
        if settings.mesh_enabled {
            return false;
        }
        match kind {
            LinkKind::Direct => {
                let record = match self.record_mut(id, kind) {
                    Some(r) => r,
                    None => return false,
                };
                if from_api_call {
                    record.should_auto_reconnect = false;
                }
                record.connection_state.is_connected()
            }
            LinkKind::Repeated => false,
        }
    }

    /// Whether the log-transfer optimization should drop the direct link in
    /// favor of mesh links right now (§4.3 "Log-transfer optimization").
    ///
    /// `upload_in_progress` is the state machine's upload state; the
    /// optimization never runs mid-transfer.
    pub fn should_drop_direct_for_mesh(&self, upload_in_progress: bool) -> bool {
        !upload_in_progress && self.direct_link().is_some() && self.has_meatnet_route()
    }

    fn record_mut(&mut self, id: &LinkId, kind: LinkKind) -> Option<&mut LinkRecord> {
        match kind {
            LinkKind::Direct => self.direct.as_mut().filter(|r| &r.id == id),
            LinkKind::Repeated => self
                .repeated
                .iter_mut()
                .find(|r| &r.id == id),
        }
    }

    /// Mutable lookup by id alone, for callers (e.g. a status-notification
    /// or RSSI handler) that don't already know whether the link is direct
    /// or repeated.
    pub fn record_mut_by_id(&mut self, id: &LinkId) -> Option<(&mut LinkRecord, LinkKind)> {
        if self.direct.as_ref().is_some_and(|r| &r.id == id) {
            return self.direct.as_mut().map(|r| (r, LinkKind::Direct));
        }
        self.repeated
            .iter_mut()
            .find(|r| &r.id == id)
            .map(|r| (r, LinkKind::Repeated))
    }

    /// Links that have gone quiet long enough to be considered out of
    /// range (§6), but aren't already reported as such.
    pub fn stale_links(&self) -> Vec<(LinkId, LinkKind)> {
        let mut stale = Vec::new();
        if let Some(direct) = self.direct.as_ref().filter(|r| Self::is_stale(r)) {
            stale.push((direct.id.clone(), LinkKind::Direct));
        }
        stale.extend(
            self.repeated
                .iter()
                .filter(|r| Self::is_stale(r))
                .map(|r| (r.id.clone(), LinkKind::Repeated)),
        );
        stale
    }

    fn is_stale(record: &LinkRecord) -> bool {
        record.connection_state != ConnectionState::OutOfRange && record.is_out_of_range()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connectable_record(device_id: &str, serial: &str, hop_count: u8) -> LinkRecord {
        let mut r = LinkRecord::new(LinkId::new(device_id, serial), LinkKind::Direct, hop_count);
        r.connection_state = ConnectionState::Disconnected;
        r.is_connectable = true;
        r
    }

    #[test]
    fn preferred_meatnet_link_prefers_connected_direct() {
        let mut arb = LinkArbiter::new();
        let mut direct = connectable_record("probe-1", "S1", 0);
        direct.connection_state = ConnectionState::Connected;
        arb.upsert_direct(direct);

        let mut repeated = LinkRecord::new(LinkId::new("node-1", "S1"), LinkKind::Repeated, 1);
        repeated.connection_state = ConnectionState::Connected;
        arb.upsert_repeated(repeated);

        let settings = LinkArbiterSettings::default();
        let preferred = arb.preferred_meatnet_link(&settings).unwrap();
        assert_eq!(preferred.id.device_id, "probe-1");
    }

    #[test]
    fn preferred_meatnet_link_picks_lowest_hop_repeated_when_direct_down() {
        let mut arb = LinkArbiter::new();
        let mut a = LinkRecord::new(LinkId::new("node-a", "S1"), LinkKind::Repeated, 2);
        a.connection_state = ConnectionState::Connected;
        let mut b = LinkRecord::new(LinkId::new("node-b", "S1"), LinkKind::Repeated, 1);
        b.connection_state = ConnectionState::Connected;
        arb.upsert_repeated(a);
        arb.upsert_repeated(b);

        let settings = LinkArbiterSettings::default();
        let preferred = arb.preferred_meatnet_link(&settings).unwrap();
        assert_eq!(preferred.id.device_id, "node-b");
    }

    #[test]
    fn mesh_disabled_collapses_to_direct_link() {
        let mut arb = LinkArbiter::new();
        let mut direct = connectable_record("probe-1", "S1", 0);
        direct.connection_state = ConnectionState::Connected;
        arb.upsert_direct(direct);
        let mut repeated = LinkRecord::new(LinkId::new("node-1", "S1"), LinkKind::Repeated, 1);
        repeated.connection_state = ConnectionState::Connected;
        arb.upsert_repeated(repeated);

        let settings = LinkArbiterSettings {
            mesh_enabled: false,
            ..Default::default()
        };
        let preferred = arb.preferred_meatnet_link(&settings).unwrap();
        assert_eq!(preferred.id.device_id, "probe-1");
    }

    #[test]
    fn repeated_link_connects_freely_when_mesh_enabled() {
        let mut arb = LinkArbiter::new();
        let record = LinkRecord::new(LinkId::new("node-1", "S1"), LinkKind::Repeated, 1);
        let id = record.id.clone();
        arb.upsert_repeated(record);
        let mut direct = arb.repeated[0].clone();
        direct.connection_state = ConnectionState::Disconnected;
        direct.is_connectable = true;
        arb.repeated[0] = direct;

        let settings = LinkArbiterSettings::default();
        assert!(arb.should_connect(&id, LinkKind::Repeated, false, &settings, Instant::now()));
    }

    #[test]
    fn direct_link_waits_for_settling_then_checks_mesh_route() {
        let mut arb = LinkArbiter::new();
        let record = connectable_record("probe-1", "S1", 0);
        let id = record.id.clone();
        arb.upsert_direct(record);

        let settings = LinkArbiterSettings::default();
        let t0 = Instant::now();
        assert!(!arb.should_connect(&id, LinkKind::Direct, false, &settings, t0));
        assert!(arb.direct_link_discover_timestamp.is_some());

        // Still settling.
        assert!(!arb.should_connect(&id, LinkKind::Direct, false, &settings, t0 + Duration::from_millis(100)));

        // Settled, no mesh route -> should connect.
        assert!(arb.should_connect(
            &id,
            LinkKind::Direct,
            false,
            &settings,
            t0 + DIRECT_LINK_SETTLING_TIMEOUT
        ));
    }

    #[test]
    fn direct_link_stays_down_after_settling_if_mesh_route_exists() {
        let mut arb = LinkArbiter::new();
        let record = connectable_record("probe-1", "S1", 0);
        let id = record.id.clone();
        arb.upsert_direct(record);
        let mut repeated = LinkRecord::new(LinkId::new("node-1", "S1"), LinkKind::Repeated, 1);
        repeated.connection_state = ConnectionState::Connected;
        arb.upsert_repeated(repeated);

        let settings = LinkArbiterSettings::default();
        let t0 = Instant::now();
        arb.should_connect(&id, LinkKind::Direct, false, &settings, t0);
        assert!(!arb.should_connect(
            &id,
            LinkKind::Direct,
            false,
            &settings,
            t0 + DIRECT_LINK_SETTLING_TIMEOUT
        ));
    }

    #[test]
    fn mesh_disabled_direct_link_honors_auto_reconnect_flag() {
        let mut arb = LinkArbiter::new();
        let mut record = connectable_record("probe-1", "S1", 0);
        record.should_auto_reconnect = false;
        let id = record.id.clone();
        arb.upsert_direct(record);

        let settings = LinkArbiterSettings {
            mesh_enabled: false,
            ..Default::default()
        };
        assert!(!arb.should_connect(&id, LinkKind::Direct, false, &settings, Instant::now()));
        assert!(arb.should_connect(&id, LinkKind::Direct, true, &settings, Instant::now()));
    }

    #[test]
    fn should_disconnect_never_fires_when_mesh_enabled() {
        let mut arb = LinkArbiter::new();
        let mut record = connectable_record("probe-1", "S1", 0);
        record.connection_state = ConnectionState::Connected;
        let id = record.id.clone();
        arb.upsert_direct(record);

        let settings = LinkArbiterSettings::default();
        assert!(!arb.should_disconnect(&id, LinkKind::Direct, true, &settings));
    }

    #[test]
    fn log_transfer_optimization_prefers_mesh_when_idle() {
        let mut arb = LinkArbiter::new();
        let mut direct = connectable_record("probe-1", "S1", 0);
        direct.connection_state = ConnectionState::Connected;
        arb.upsert_direct(direct);
        let mut repeated = LinkRecord::new(LinkId::new("node-1", "S1"), LinkKind::Repeated, 1);
        repeated.connection_state = ConnectionState::Connected;
        arb.upsert_repeated(repeated);

        assert!(arb.should_drop_direct_for_mesh(false));
        assert!(!arb.should_drop_direct_for_mesh(true));
    }

    /// I1: an arbiter holds at most one direct link. Upserting a second
    /// direct record for the same probe replaces the first rather than
    /// accumulating a list.
    #[test]
    fn at_most_one_direct_link() {
        let mut arb = LinkArbiter::new();
        arb.upsert_direct(connectable_record("probe-1", "S1", 0));
        arb.upsert_direct(connectable_record("probe-1", "S1", 0));

        assert!(arb.direct_record().is_some());
        // There is no way to hold two direct records at once: the slot is
        // a single `Option`, not a collection.
    }

    /// S5: with no direct link and three repeaters connected, the mesh
    /// settles on the lowest-hop-count one; a tie at the lowest hop count
    /// settles deterministically on `device_id` ordering rather than
    /// whichever connected last.
    #[test]
    fn multi_node_mesh_settles_on_lowest_hop_then_device_id() {
        let mut arb = LinkArbiter::new();
        let settings = LinkArbiterSettings::default();

        let mut far = LinkRecord::new(LinkId::new("node-far", "S1"), LinkKind::Repeated, 3);
        far.connection_state = ConnectionState::Connected;
        arb.upsert_repeated(far);

        let mut near_b = LinkRecord::new(LinkId::new("node-near-b", "S1"), LinkKind::Repeated, 1);
        near_b.connection_state = ConnectionState::Connected;
        arb.upsert_repeated(near_b);

        let mut near_a = LinkRecord::new(LinkId::new("node-near-a", "S1"), LinkKind::Repeated, 1);
        near_a.connection_state = ConnectionState::Connected;
        arb.upsert_repeated(near_a);

        let preferred = arb.preferred_meatnet_link(&settings).unwrap();
        assert_eq!(preferred.id.device_id, "node-near-a");

        // Losing the winning node settles the mesh on the next-best tied
        // node rather than falling back to the far one.
        arb.remove_repeated("node-near-a");
        let preferred = arb.preferred_meatnet_link(&settings).unwrap();
        assert_eq!(preferred.id.device_id, "node-near-b");
    }

    /// I2: two different repeating nodes for the same probe are tracked
    /// as two distinct repeated links, keyed by `device_id`; re-upserting
    /// the same `device_id` updates in place instead of duplicating.
    #[test]
    fn repeated_links_are_keyed_by_device_id() {
        let mut arb = LinkArbiter::new();
        arb.upsert_repeated(LinkRecord::new(LinkId::new("node-1", "S1"), LinkKind::Repeated, 1));
        arb.upsert_repeated(LinkRecord::new(LinkId::new("node-2", "S1"), LinkKind::Repeated, 2));
        assert_eq!(arb.repeated_records().len(), 2);

        let mut updated = LinkRecord::new(LinkId::new("node-1", "S1"), LinkKind::Repeated, 5);
        updated.rssi = Some(-40);
        arb.upsert_repeated(updated);

        assert_eq!(arb.repeated_records().len(), 2);
        let node_1 = arb
            .repeated_records()
            .iter()
            .find(|r| r.id.device_id == "node-1")
            .unwrap();
        assert_eq!(node_1.hop_count, 5);
        assert_eq!(node_1.rssi, Some(-40));
    }
}
