//! External collaborator interfaces (§6).
//!
//! This crate is the arbitration and fusion engine; it does not scan for
//! BLE advertisements, open GATT connections, or persist logs. Those are
//! collaborator responsibilities named here as traits so the engine can be
//! driven by a real BLE stack or a test harness without caring which.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::advertisement::wire::Advertisement;
use crate::link::LinkArbiterSettings;

pub use crate::link::Link;

/// Emits parsed advertisements from nearby Combustion devices (§6).
///
/// A concrete implementation owns platform BLE scanning (vendor id
/// `0x09C7`) and the manufacturer-data codec; this crate only consumes the
/// resulting [`Advertisement`] values.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Start scanning, if not already started.
    async fn start_scan(&self) -> crate::error::Result<()>;

    /// Stop scanning.
    async fn stop_scan(&self) -> crate::error::Result<()>;

    /// Stream of parsed advertisements, hop count already attached.
    fn observe_advertisements(&self) -> BoxStream<'static, Advertisement>;
}

/// Invoked when a log transfer ends, successfully or not, so the
/// application can persist what was downloaded. This crate tracks
/// transfer *progress* only (§1 "persistent log storage" is out of scope).
#[async_trait]
pub trait PersistenceHook: Send + Sync {
    /// Called once per finished (or abandoned) log transfer.
    async fn log_transfer_complete(&self, serial_number: &str);
}

/// Network-wide policy knobs (§6 `Settings`).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Whether MeatNet mesh routing is enabled.
    pub mesh_enabled: bool,
    /// Whether direct links reconnect automatically after a drop.
    pub auto_reconnect: bool,
    /// Whether an explicit API call may disconnect a still-useful mesh link.
    pub can_disconnect_from_meatnet_devices: bool,
    /// If set, only these serial numbers are tracked; advertisements for
    /// any other serial are dropped at the Network Manager (§4.5).
    pub probe_allowlist: Option<std::collections::HashSet<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mesh_enabled: true,
            auto_reconnect: true,
            can_disconnect_from_meatnet_devices: false,
            probe_allowlist: None,
        }
    }
}

impl Settings {
    /// Whether `serial_number` is allowed to be tracked under the current
    /// allowlist (an unset allowlist allows everything).
    pub fn allows(&self, serial_number: &str) -> bool {
        match &self.probe_allowlist {
            Some(set) => set.contains(serial_number),
            None => true,
        }
    }
}

impl From<&Settings> for LinkArbiterSettings {
    /// Every probe's [`LinkArbiter`](crate::link::LinkArbiter) sees the
    /// same three policy knobs out of the network-wide `Settings`; the
    /// allowlist is consulted only by the Network Manager, before a probe
    /// manager ever exists to hand an arbiter to.
    fn from(settings: &Settings) -> Self {
        Self {
            mesh_enabled: settings.mesh_enabled,
            auto_reconnect: settings.auto_reconnect,
            can_disconnect_from_meatnet_devices: settings.can_disconnect_from_meatnet_devices,
        }
    }
}
