//! A concrete, `btleplug`-backed [`Link`] implementation.
//!
//! Composes a [`ConnectionManager`](crate::ble::connection::ConnectionManager)
//! for GATT lifecycle with a
//! [`CharacteristicHandler`](crate::ble::characteristics::CharacteristicHandler)
//! for reads/writes/notifications. A probe may have several of these
//! alive at once — one per physical path — with the Network Manager
//! constructing one per discovered `(device_id, serial_number)` pair and
//! owning it from then on; the Link Arbiter picks which one is preferred.

use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use btleplug::platform::Peripheral;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::advertisement::wire::{ProbeColor, ProbeId};
use crate::ble::characteristics::{CharacteristicHandler, NotificationEvent};
use crate::ble::connection::ConnectionManager;
use crate::ble::uuids::{PROBE_STATUS_CHARACTERISTIC_UUID, UART_TX_UUID};
use crate::data::{LoggedDataPoint, PredictionMode};
use crate::error::Result;
use crate::protocol::status::ProbeStatus;
use crate::protocol::uart_messages::{
    build_cancel_prediction_request, build_read_logs_request, build_read_session_info_request,
    build_reset_food_safe_request, build_reset_thermometer_request, build_set_prediction_request,
    build_set_probe_color_request, build_set_probe_id_request, UartMessage, UartMessageType,
};

use super::types::{ConnectionState, LinkId, LinkKind};
use super::Link;

/// Flow capacity for the RSSI observation stream (§5, same "drop oldest"
/// policy as the status/log flows).
const RSSI_FLOW_CAPACITY: usize = 10;

/// Flow capacity for the per-link parsed status/log streams (§5, same
/// "drop oldest"/"never drop" split as the probe-level flows).
const STATUS_FLOW_CAPACITY: usize = 10;
const LOG_FLOW_CAPACITY: usize = 256;

/// Resolution of the `SetPrediction` wire format's set-point field: 0.1°C
/// per unit, 10 bits (per `build_set_prediction_request`'s doc comment).
fn set_point_to_raw(celsius: f64) -> u16 {
    (celsius * 10.0).round().clamp(0.0, 1023.0) as u16
}

/// One physical radio path to a probe, backed by a real `btleplug`
/// peripheral.
pub struct BtleplugLink {
    id: LinkId,
    kind: LinkKind,
    hop_count: AtomicU8,
    rssi: RwLock<Option<i16>>,
    rssi_tx: broadcast::Sender<Option<i16>>,
    connection: ConnectionManager,
    characteristics: CharacteristicHandler,
    status_tx: broadcast::Sender<ProbeStatus>,
    log_tx: broadcast::Sender<LoggedDataPoint>,
    forwarder: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl BtleplugLink {
    /// Construct a link for a just-discovered peripheral. `hop_count` is 0
    /// for the probe's own radio, >=1 for a repeating MeatNet node.
    pub fn new(id: LinkId, kind: LinkKind, hop_count: u8, peripheral: Peripheral) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_FLOW_CAPACITY);
        let (log_tx, _) = broadcast::channel(LOG_FLOW_CAPACITY);
        let (rssi_tx, _) = broadcast::channel(RSSI_FLOW_CAPACITY);
        Self {
            id,
            kind,
            hop_count: AtomicU8::new(hop_count),
            rssi: RwLock::new(None),
            rssi_tx,
            connection: ConnectionManager::new(peripheral.clone()),
            characteristics: CharacteristicHandler::new(peripheral),
            status_tx,
            log_tx,
            forwarder: RwLock::new(None),
        }
    }

    /// Record a fresh RSSI observation from an advertisement seen while
    /// this link is active (§4.6 "RSSI read").
    pub fn set_rssi(&self, rssi: Option<i16>) {
        *self.rssi.write() = rssi;
        let _ = self.rssi_tx.send(rssi);
    }

    /// Update the hop count, e.g. when a repeater reports a new depth.
    pub fn set_hop_count(&self, hop_count: u8) {
        self.hop_count.store(hop_count, Ordering::Relaxed);
    }

    fn spawn_forwarder(&self) {
        let mut notifications = self.characteristics.subscribe_notifications();
        let status_tx = self.status_tx.clone();
        let log_tx = self.log_tx.clone();
        let id = self.id.clone();

        let handle = tokio::spawn(async move {
            loop {
                let event = match notifications.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(link = %id, skipped = n, "notification forwarder lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                Self::forward_one(&id, event, &status_tx, &log_tx);
            }
        });
        *self.forwarder.write() = Some(handle);
    }

    fn forward_one(
        id: &LinkId,
        event: NotificationEvent,
        status_tx: &broadcast::Sender<ProbeStatus>,
        log_tx: &broadcast::Sender<LoggedDataPoint>,
    ) {
        if event.characteristic_uuid == PROBE_STATUS_CHARACTERISTIC_UUID {
            match ProbeStatus::parse(&event.data) {
                Ok(status) => {
                    let _ = status_tx.send(status);
                }
                Err(e) => warn!(link = %id, error = %e, "malformed status notification"),
            }
        } else if event.characteristic_uuid == UART_TX_UUID {
            match UartMessage::parse(&event.data) {
                Ok(message) if message.message_type() == UartMessageType::ReadLogsResponse => {
                    match LoggedDataPoint::from_uart_payload(&message.payload) {
                        Ok(point) => {
                            let _ = log_tx.send(point);
                        }
                        Err(e) => warn!(link = %id, error = %e, "malformed log record"),
                    }
                }
                Ok(message) => {
                    debug!(link = %id, message_type = ?message.message_type(), "uart response");
                }
                Err(e) => warn!(link = %id, error = %e, "malformed uart message"),
            }
        }
    }

    fn broadcast_stream<T>(rx: broadcast::Receiver<T>) -> BoxStream<'static, T>
    where
        T: Clone + Send + 'static,
    {
        Box::pin(stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(item) => return Some((item, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }))
    }

    async fn write_uart(&self, message: UartMessage) -> Result<()> {
        self.characteristics.write_uart(&message.to_bytes()).await
    }
}

#[async_trait]
impl Link for BtleplugLink {
    fn id(&self) -> &LinkId {
        &self.id
    }

    fn kind(&self) -> LinkKind {
        self.kind
    }

    fn hop_count(&self) -> u8 {
        self.hop_count.load(Ordering::Relaxed)
    }

    fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    fn rssi(&self) -> Option<i16> {
        *self.rssi.read()
    }

    async fn connect(&self) -> Result<()> {
        self.connection.connect(true).await?;
        self.characteristics.discover_characteristics().await?;
        self.characteristics.subscribe(&PROBE_STATUS_CHARACTERISTIC_UUID).await?;
        self.characteristics.subscribe_uart().await?;
        self.characteristics.start_notifications().await?;
        self.spawn_forwarder();
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(handle) = self.forwarder.write().take() {
            handle.abort();
        }
        self.characteristics.stop_notifications().await;
        self.connection.disconnect().await
    }

    async fn read_fw_version(&self) -> Result<String> {
        self.characteristics.read_firmware_revision().await
    }

    async fn read_hw_revision(&self) -> Result<String> {
        self.characteristics.read_hardware_revision().await
    }

    async fn read_model_information(&self) -> Result<String> {
        self.characteristics.read_model_number().await
    }

    fn observe_status_notifications(&self) -> BoxStream<'static, ProbeStatus> {
        Self::broadcast_stream(self.status_tx.subscribe())
    }

    fn observe_log_responses(&self) -> BoxStream<'static, LoggedDataPoint> {
        Self::broadcast_stream(self.log_tx.subscribe())
    }

    fn observe_connection_state(&self) -> BoxStream<'static, ConnectionState> {
        Box::pin(Self::broadcast_stream(self.connection.subscribe()).map(|event| event.state))
    }

    fn observe_remote_rssi(&self) -> BoxStream<'static, Option<i16>> {
        Self::broadcast_stream(self.rssi_tx.subscribe())
    }

    fn observe_out_of_range(&self) -> BoxStream<'static, ()> {
        Box::pin(
            Self::broadcast_stream(self.connection.subscribe())
                .filter_map(|event| async move { (event.state == ConnectionState::OutOfRange).then_some(()) }),
        )
    }

    async fn send_set_prediction(&self, mode: PredictionMode, set_point_celsius: Option<f64>) -> Result<()> {
        let message = if mode == PredictionMode::None {
            build_cancel_prediction_request()
        } else {
            let raw = set_point_celsius.map(set_point_to_raw).unwrap_or(0);
            build_set_prediction_request(mode.to_raw(), raw)
        };
        self.write_uart(message).await
    }

    async fn request_log_records(&self, min_sequence: u32, max_sequence: u32) -> Result<()> {
        self.write_uart(build_read_logs_request(min_sequence, max_sequence)).await
    }

    async fn send_configure_food_safe(&self, payload: &[u8]) -> Result<()> {
        self.write_uart(UartMessage::new(UartMessageType::ConfigureFoodSafe, payload.to_vec()))
            .await
    }

    async fn send_reset_food_safe(&self) -> Result<()> {
        self.write_uart(build_reset_food_safe_request()).await
    }

    async fn send_set_power_mode(&self, payload: &[u8]) -> Result<()> {
        self.write_uart(UartMessage::new(UartMessageType::SetPowerMode, payload.to_vec()))
            .await
    }

    async fn send_session_information_request(&self) -> Result<()> {
        self.write_uart(build_read_session_info_request()).await
    }

    async fn send_set_probe_color(&self, color: ProbeColor) -> Result<()> {
        self.write_uart(build_set_probe_color_request(color as u8)).await
    }

    async fn send_set_probe_id(&self, id: ProbeId) -> Result<()> {
        self.write_uart(build_set_probe_id_request(id.0)).await
    }

    async fn send_reset_probe(&self) -> Result<()> {
        self.write_uart(build_reset_thermometer_request()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_point_raw_clamps_to_10_bits() {
        assert_eq!(set_point_to_raw(0.0), 0);
        assert_eq!(set_point_to_raw(10.0), 100);
        assert_eq!(set_point_to_raw(500.0), 1023);
    }
}
