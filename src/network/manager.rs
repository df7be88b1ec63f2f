//! Network Manager (§4.5): the single upstream dispatcher that owns every
//! device, link, and [`ProbeStateMachine`] the host process knows about.
//!
//! One process-wide owner holds three indexed collections (devices,
//! links, probe managers), routes scanner/GATT callbacks down into the
//! right per-probe state, and exposes a `finish()` that tears everything
//! down deterministically. The indexing is three-level rather than
//! one-to-one because a probe's data can arrive over more than one
//! physical path (its own radio, plus any number of repeaters).
//!
//! As with the rest of the engine, this struct never touches a socket: it
//! decides, the caller (the task driving the real [`Scanner`] and
//! [`Link`](crate::link::Link) collaborators) acts.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::advertisement::wire::{Advertisement, ProductType};
use crate::collaborators::Settings;
use crate::link::{ConnectionState, LinkArbiterSettings, LinkId, LinkKind, LinkRecord};
use crate::probe::ProbeStateMachine;

/// Serial number reserved for a MeatNet repeater advertising without an
/// associated probe (§4.5).
const ORPHAN_REPEATER_SERIAL: &str = "0";

/// Flow capacity for `discovered-probes`/node-connection flows (§5, same
/// "buffer ~10, drop oldest" policy as the per-probe flows).
const EVENT_FLOW_CAPACITY: usize = 10;

/// Record of a device the manager has seen, independent of which probe(s)
/// it currently serves (§4.5 `devices`).
#[derive(Debug, Clone)]
struct DeviceRecord {
    product_type: ProductType,
    is_connectable: bool,
}

/// Firmware facts read from an orphaned MeatNet repeater, i.e. one
/// advertising with no probe attached (§4.5 `firmware_state_of_network`).
#[derive(Debug, Clone, Default)]
pub struct OrphanFirmwareState {
    /// Firmware version string.
    pub fw_version: Option<String>,
    /// Hardware revision string.
    pub hw_revision: Option<String>,
    /// Model information string.
    pub model_info: Option<String>,
}

/// Network-wide lifecycle events (§5 "discovered-probes" flow).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A probe's serial number was seen for the first time.
    ProbeDiscovered(String),
    /// A probe was unlinked and its state machine torn down.
    ProbeRemoved(String),
}

/// What the caller should do in response to one advertisement, after the
/// manager has updated its own bookkeeping (§4.5).
#[derive(Debug, Clone, PartialEq)]
pub enum AdvertisementOutcome {
    /// Dropped: mesh disabled and not a probe, or the serial isn't on the
    /// allowlist, or an already-tracked/mesh-disabled orphan repeater.
    Dropped,
    /// A MeatNet repeater with no probe attached advertised for the first
    /// time; the caller should connect, read firmware info, and report it
    /// back via [`NetworkManager::record_orphan_firmware`].
    FirmwareReadNeeded {
        /// The repeater's device id.
        device_id: String,
    },
    /// The advertisement was routed into a probe manager.
    Routed {
        /// Serial number of the probe this advertisement updated.
        serial_number: String,
        /// True if this probe had never been seen before this call.
        newly_discovered: bool,
        /// Identity of the link this advertisement arrived on.
        link_id: LinkId,
        /// Direct or repeated.
        kind: LinkKind,
        /// Whether the caller should now call `connect()` on this link.
        should_connect: bool,
    },
}

/// The outcome of an `unlink(serial)` call (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlinkOutcome {
    /// Device ids that served *only* this probe; the caller should
    /// disconnect from these. Devices still serving another probe are
    /// left connected.
    pub sole_providers: Vec<String>,
}

/// Owns every device, link, and probe manager in the process (§4.5, §5).
pub struct NetworkManager {
    settings: Settings,
    devices: HashMap<String, DeviceRecord>,
    meat_net_links: HashMap<LinkId, LinkKind>,
    probe_managers: HashMap<String, ProbeStateMachine>,
    firmware_state_of_network: HashMap<String, OrphanFirmwareState>,
    events_tx: broadcast::Sender<NetworkEvent>,
}

impl NetworkManager {
    /// Create a new, empty manager under the given settings.
    pub fn new(settings: Settings) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_FLOW_CAPACITY);
        Self {
            settings,
            devices: HashMap::new(),
            meat_net_links: HashMap::new(),
            probe_managers: HashMap::new(),
            firmware_state_of_network: HashMap::new(),
            events_tx,
        }
    }

    /// Current network-wide settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the network-wide settings (e.g. the user flipped
    /// mesh-enabled or auto-reconnect in the host application).
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Subscribe to probe discovery/removal events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<NetworkEvent> {
        self.events_tx.subscribe()
    }

    /// Look up a probe manager by serial number.
    pub fn probe(&self, serial_number: &str) -> Option<&ProbeStateMachine> {
        self.probe_managers.get(serial_number)
    }

    /// Mutable lookup of a probe manager by serial number.
    pub fn probe_mut(&mut self, serial_number: &str) -> Option<&mut ProbeStateMachine> {
        self.probe_managers.get_mut(serial_number)
    }

    /// Iterate over every tracked probe manager.
    pub fn probes(&self) -> impl Iterator<Item = &ProbeStateMachine> {
        self.probe_managers.values()
    }

    /// Firmware state of an orphaned repeater, if one was ever read.
    pub fn orphan_firmware(&self, device_id: &str) -> Option<&OrphanFirmwareState> {
        self.firmware_state_of_network.get(device_id)
    }

    /// Route one advertisement through the manager (§4.5).
    ///
    /// Updates `devices`, `probe_managers`, and `meat_net_links` as
    /// needed, then hands the advertisement to the right probe manager.
    /// Never performs I/O; the returned [`AdvertisementOutcome`] tells the
    /// caller what I/O (if any) is now warranted.
    pub fn handle_advertisement(&mut self, advertisement: Advertisement, now: Instant) -> AdvertisementOutcome {
        if !self.settings.mesh_enabled && advertisement.product_type != ProductType::Probe {
            return AdvertisementOutcome::Dropped;
        }
        if !self.settings.allows(&advertisement.serial_number) {
            return AdvertisementOutcome::Dropped;
        }
        if advertisement.serial_number == ORPHAN_REPEATER_SERIAL {
            return self.handle_orphan_repeater(&advertisement);
        }

        self.devices
            .entry(advertisement.device_id.clone())
            .or_insert_with(|| DeviceRecord {
                product_type: advertisement.product_type,
                is_connectable: advertisement.is_connectable,
            })
            .is_connectable = advertisement.is_connectable;

        let newly_discovered = !self.probe_managers.contains_key(&advertisement.serial_number);
        if newly_discovered {
            info!(serial = %advertisement.serial_number, "probe discovered");
            self.probe_managers.insert(
                advertisement.serial_number.clone(),
                ProbeStateMachine::new(advertisement.serial_number.clone()),
            );
            let _ = self
                .events_tx
                .send(NetworkEvent::ProbeDiscovered(advertisement.serial_number.clone()));
        }

        let kind = if advertisement.hop_count == 0 {
            LinkKind::Direct
        } else {
            LinkKind::Repeated
        };
        let link_id = LinkId::new(advertisement.device_id.clone(), advertisement.serial_number.clone());
        self.meat_net_links.entry(link_id.clone()).or_insert(kind);

        let probe = self
            .probe_managers
            .get_mut(&advertisement.serial_number)
            .expect("just inserted above");
        Self::ensure_link_record(probe, &link_id, kind, &advertisement);

        let link_settings: LinkArbiterSettings = (&self.settings).into();
        let should_connect = probe.handle_advertisement(&link_id, kind, &advertisement, &link_settings, now);

        AdvertisementOutcome::Routed {
            serial_number: advertisement.serial_number,
            newly_discovered,
            link_id,
            kind,
            should_connect,
        }
    }

    fn handle_orphan_repeater(&mut self, advertisement: &Advertisement) -> AdvertisementOutcome {
        if !self.settings.mesh_enabled {
            return AdvertisementOutcome::Dropped;
        }
        if self.firmware_state_of_network.contains_key(&advertisement.device_id) {
            return AdvertisementOutcome::Dropped;
        }
        AdvertisementOutcome::FirmwareReadNeeded {
            device_id: advertisement.device_id.clone(),
        }
    }

    fn ensure_link_record(
        probe: &mut ProbeStateMachine,
        link_id: &LinkId,
        kind: LinkKind,
        advertisement: &Advertisement,
    ) {
        let arbiter = probe.link_arbiter_mut();
        let existing = match kind {
            LinkKind::Direct => arbiter.direct_record().cloned(),
            LinkKind::Repeated => arbiter
                .repeated_records()
                .iter()
                .find(|r| r.id == *link_id)
                .cloned(),
        };
        let mut record = existing.unwrap_or_else(|| LinkRecord::new(link_id.clone(), kind, advertisement.hop_count));
        record.hop_count = advertisement.hop_count;
        record.is_connectable = advertisement.is_connectable;
        if !record.connection_state.is_connected() {
            record.connection_state = if advertisement.is_connectable {
                ConnectionState::AdvertisingConnectable
            } else {
                ConnectionState::AdvertisingNotConnectable
            };
        }
        record.touch_liveness();
        match kind {
            LinkKind::Direct => arbiter.upsert_direct(record),
            LinkKind::Repeated => arbiter.upsert_repeated(record),
        }
    }

    /// The caller finished connecting to, reading, and disconnecting from
    /// an orphan repeater (§4.5); record what it learned.
    pub fn record_orphan_firmware(&mut self, device_id: impl Into<String>, state: OrphanFirmwareState) {
        self.firmware_state_of_network.insert(device_id.into(), state);
    }

    /// Unlink a probe (§4.5): compute which devices solely served it,
    /// disconnect only those, remove all its links, and tear down its
    /// state machine.
    pub fn unlink(&mut self, serial_number: &str) -> Option<UnlinkOutcome> {
        if !self.probe_managers.contains_key(serial_number) {
            return None;
        }

        let providers: Vec<String> = self
            .meat_net_links
            .keys()
            .filter(|id| id.serial_number == serial_number)
            .map(|id| id.device_id.clone())
            .collect();
        let non_providers: std::collections::HashSet<String> = self
            .meat_net_links
            .keys()
            .filter(|id| id.serial_number != serial_number)
            .map(|id| id.device_id.clone())
            .collect();
        let sole_providers: Vec<String> = providers
            .into_iter()
            .filter(|device_id| !non_providers.contains(device_id))
            .collect();

        self.meat_net_links.retain(|id, _| id.serial_number != serial_number);
        for device_id in &sole_providers {
            self.devices.remove(device_id);
        }

        if let Some(mut probe) = self.probe_managers.remove(serial_number) {
            probe.finish();
        }

        debug!(serial = %serial_number, disconnect = ?sole_providers, "probe unlinked");
        let _ = self
            .events_tx
            .send(NetworkEvent::ProbeRemoved(serial_number.to_string()));

        Some(UnlinkOutcome { sole_providers })
    }

    /// Tear down every probe manager and return every device id the
    /// caller should now disconnect from (§5 `finish()`).
    pub fn finish(&mut self) -> Vec<String> {
        for probe in self.probe_managers.values_mut() {
            probe.finish();
        }
        self.probe_managers.clear();
        self.meat_net_links.clear();
        let devices: Vec<String> = self.devices.keys().cloned().collect();
        self.devices.clear();
        self.firmware_state_of_network.clear();
        devices
    }
}
