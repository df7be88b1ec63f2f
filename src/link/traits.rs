//! The [`Link`] collaborator trait: everything the fusion engine needs from
//! a single physical radio path to a probe, without knowing whether that
//! path is a direct BLE connection, a MeatNet repeater hop, or a test
//! double.
//!
//! Connection lifecycle (see [`crate::ble::connection::ConnectionManager`])
//! and characteristic reads/writes/notifications (see
//! [`crate::ble::characteristics::CharacteristicHandler`]) live behind one
//! trait object so the engine can hold a `Box<dyn Link>` per link without
//! caring which concrete radio stack backs it.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::advertisement::wire::{ProbeColor, ProbeId};
use crate::data::PredictionMode;
use crate::error::Result;
use crate::link::types::{ConnectionState, LinkId, LinkKind};
use crate::protocol::ProbeStatus;
use crate::data::LoggedDataPoint;

/// A single physical radio path to a probe: either the probe's own direct
/// connection, or a repeating MeatNet node forwarding on its behalf (§6).
///
/// Implementations own the transport (BLE GATT, a UART-framed MeatNet
/// repeater connection, or a test harness) and translate it into this
/// shape. The fusion engine never reaches past this trait to the
/// underlying radio.
#[async_trait]
pub trait Link: Send + Sync {
    /// This link's identity.
    fn id(&self) -> &LinkId;

    /// Whether this link reaches the probe directly or through a repeater.
    fn kind(&self) -> LinkKind;

    /// Mesh hop count last observed for this link (0 for direct).
    fn hop_count(&self) -> u8;

    /// Current connection state, as last observed.
    fn connection_state(&self) -> ConnectionState;

    /// Most recently observed RSSI, in dBm.
    fn rssi(&self) -> Option<i16>;

    /// Open a GATT connection (or, for a repeated link, register interest
    /// with the repeating node).
    async fn connect(&self) -> Result<()>;

    /// Close the connection, or withdraw interest from the repeater.
    async fn disconnect(&self) -> Result<()>;

    /// Read the probe's firmware version string.
    async fn read_fw_version(&self) -> Result<String>;

    /// Read the probe's hardware revision string.
    async fn read_hw_revision(&self) -> Result<String>;

    /// Read the probe's model information string.
    async fn read_model_information(&self) -> Result<String>;

    /// Stream of parsed status notifications from this link.
    fn observe_status_notifications(&self) -> BoxStream<'static, ProbeStatus>;

    /// Stream of log data points returned in response to
    /// [`request_log_records`](Link::request_log_records).
    fn observe_log_responses(&self) -> BoxStream<'static, LoggedDataPoint>;

    /// Stream of connection-state transitions observed for this link (§6).
    fn observe_connection_state(&self) -> BoxStream<'static, ConnectionState>;

    /// Stream of RSSI readings for this link; `None` marks a failed poll
    /// (§4.6 "RSSI read").
    fn observe_remote_rssi(&self) -> BoxStream<'static, Option<i16>>;

    /// Stream of out-of-range events for this link (§6).
    fn observe_out_of_range(&self) -> BoxStream<'static, ()>;

    /// Ask the probe to start (or stop) predicting, targeting the given
    /// set point temperature in Celsius.
    async fn send_set_prediction(&self, mode: PredictionMode, set_point_celsius: Option<f64>) -> Result<()>;

    /// Request log records in `[min_sequence, max_sequence]`, inclusive.
    async fn request_log_records(&self, min_sequence: u32, max_sequence: u32) -> Result<()>;

    /// Forward a food-safety configuration payload. The engine never
    /// interprets the bytes; food safety is out of this crate's scope
    /// (§10.2) but the wire call still needs to reach the probe.
    async fn send_configure_food_safe(&self, payload: &[u8]) -> Result<()>;

    /// Forward a food-safety reset command.
    async fn send_reset_food_safe(&self) -> Result<()>;

    /// Forward a power-mode configuration payload.
    async fn send_set_power_mode(&self, payload: &[u8]) -> Result<()>;

    /// Request the probe's current session information (§4.4.5).
    async fn send_session_information_request(&self) -> Result<()>;

    /// Set the probe's silicone ring color.
    async fn send_set_probe_color(&self, color: ProbeColor) -> Result<()>;

    /// Set the probe's id (1-8).
    async fn send_set_probe_id(&self, id: ProbeId) -> Result<()>;

    /// Reset the probe to factory defaults.
    async fn send_reset_probe(&self) -> Result<()>;
}
