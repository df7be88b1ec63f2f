// Allow holding locks across await points - we use parking_lot which is designed for this
#![allow(clippy::await_holding_lock)]
// Allow derivable impls for clarity
#![allow(clippy::derivable_impls)]
// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # combustion-mesh
//!
//! A data-link arbitration and state-fusion engine for Combustion Inc's
//! MeatNet mesh: a probe's own direct Bluetooth connection plus any number
//! of repeating nodes that can also see it.
//!
//! This crate does not scan for advertisements, open GATT connections, or
//! persist logs itself — those are collaborator responsibilities (see
//! [`collaborators`]), so the engine can run against a real `btleplug`
//! stack (a reference implementation is included as
//! [`link::BtleplugLink`]) or a test harness without caring which. What it
//! owns is arbitration: which physical link is the current best source
//! for a probe, how connection state across all of a probe's links fuses
//! into one reported state, and how raw samples turn into one clean
//! [`probe::ProbeSnapshot`] per probe.
//!
//! ## Architecture
//!
//! - [`idle_monitor`]: the shared "has this gone quiet" primitive used by
//!   both advertisement and link timeout logic.
//! - [`advertisement`]: the manufacturer-data wire codec and the per-mode
//!   advertisement arbiter (one winning source at a time per mode).
//! - [`link`]: link identity, per-link observed state, the
//!   connect/disconnect policy arbiter, and a concrete `btleplug`-backed
//!   [`link::Link`] implementation.
//! - [`prediction`]: the linearizer that turns coarse prediction samples
//!   into a smooth per-second countdown.
//! - [`instant_read`]: smoothing for instant-read mode samples.
//! - [`probe`]: the fused, immutable [`probe::ProbeSnapshot`] and the
//!   [`probe::ProbeStateMachine`] that produces it.
//! - [`network`]: the process-wide [`network::NetworkManager`] that routes
//!   advertisements into the right probe manager and owns the `unlink`
//!   lifecycle.
//! - [`collaborators`]: the `Scanner`/`PersistenceHook`/`Settings`
//!   interfaces a host application implements.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use combustion_mesh::collaborators::Settings;
//! use combustion_mesh::network::NetworkManager;
//! use std::time::Instant;
//!
//! # async fn example(advertisement: combustion_mesh::advertisement::Advertisement) {
//! let mut network = NetworkManager::new(Settings::default());
//! let outcome = network.handle_advertisement(advertisement, Instant::now());
//! // `outcome` tells the caller whether to connect, read an orphan
//! // repeater's firmware info, or do nothing; the manager never performs
//! // I/O itself.
//! for serial in network.probes().map(|p| p.serial_number().to_string()).collect::<Vec<_>>() {
//!     println!("tracking probe {serial}");
//! }
//! # let _ = outcome;
//! # }
//! ```
//!
//! ## Platform Notes
//!
//! [`link::BtleplugLink`] is built on `btleplug`, so the same platform
//! notes apply as for any `btleplug` consumer: macOS requires Bluetooth
//! permission (`NSBluetoothAlwaysUsageDescription` for bundled apps),
//! Linux requires BlueZ (the user may need to be in the `bluetooth`
//! group), and Windows requires Windows 10 or later with Bluetooth LE
//! support.
//!
//! ## Feature Flags
//!
//! - `serde`: enable serialization/deserialization for data types.

// Public modules
pub mod advertisement;
pub mod ble;
pub mod collaborators;
pub mod data;
pub mod error;
pub mod idle_monitor;
pub mod instant_read;
pub mod link;
pub mod network;
pub mod prediction;
pub mod probe;
pub mod protocol;
pub mod utils;

// Re-exports for convenience
pub use collaborators::{PersistenceHook, Scanner, Settings};
pub use error::{Error, Result};
pub use link::{ConnectionState, Link, LinkArbiter, LinkId, LinkKind};
pub use network::NetworkManager;
pub use probe::{ProbeSnapshot, ProbeStateMachine};
pub use utils::{celsius_to_fahrenheit, fahrenheit_to_celsius};

// Re-export commonly used types from submodules
pub use advertisement::Advertisement;
pub use advertisement::wire::{BatteryStatus, Overheating, ProbeColor, ProbeId};
pub use data::{
    LoggedDataPoint, PredictionInfo, PredictionMode, PredictionState, PredictionType,
    ProbeTemperatures, RawTemperature, SessionInfo, TemperatureLog, VirtualSensorSelection,
    VirtualTemperatures,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that key types are exported
        let _ = std::any::TypeId::of::<NetworkManager>();
        let _ = std::any::TypeId::of::<ProbeStateMachine>();
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<ProbeTemperatures>();
        let _ = std::any::TypeId::of::<VirtualTemperatures>();
        let _ = std::any::TypeId::of::<PredictionInfo>();
        let _ = std::any::TypeId::of::<Settings>();
    }

    #[test]
    fn test_temperature_conversion() {
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < 0.001);
        assert!((fahrenheit_to_celsius(212.0) - 100.0).abs() < 0.001);
    }
}
