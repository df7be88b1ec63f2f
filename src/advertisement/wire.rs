//! Advertisement parsing.
//!
//! Parses manufacturer-specific advertising data from Combustion devices
//! (vendor id `0x09C7`). This is the wire codec the rest of the crate treats
//! as an external collaborator output: the [`Scanner`](crate::collaborators::Scanner)
//! trait hands out [`Advertisement`] values built from these bytes, and
//! nothing downstream cares how they got built.

use crate::data::temperatures::{ProbeTemperatures, VirtualSensorSelection, VirtualTemperatures};
use crate::error::{Error, Result};

/// Product type identifier from advertising data.
///
/// Values per the MeatNet Node BLE specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProductType {
    /// Unknown product type.
    Unknown = 0,
    /// Predictive Thermometer probe.
    Probe = 1,
    /// MeatNet Repeater Node.
    MeatNetRepeater = 2,
    /// Giant Grill Gauge.
    Gauge = 3,
    /// Display (Timer).
    Display = 4,
    /// Booster (Charger).
    Charger = 5,
}

impl ProductType {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Self {
        match value {
            1 => Self::Probe,
            2 => Self::MeatNetRepeater,
            3 => Self::Gauge,
            4 => Self::Display,
            5 => Self::Charger,
            _ => Self::Unknown,
        }
    }

    /// True for devices that carry a probe serial number and participate in
    /// link arbitration (probes and gauges; repeaters relay on behalf of
    /// others and are never link endpoints themselves).
    pub fn is_probe_like(&self) -> bool {
        matches!(self, Self::Probe | Self::Gauge)
    }
}

/// Advertising mode carried in the packet. Only `Normal` and `InstantRead`
/// participate in advertisement arbitration (§4.2); `Other` covers reserved
/// or not-yet-understood mode bits and is passed through unarbitrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdvertisingMode {
    /// Normal cooking mode (250ms advertising interval).
    #[default]
    Normal,
    /// Instant read mode with fast updates.
    InstantRead,
    /// Reserved/unknown mode value.
    Other,
}

impl AdvertisingMode {
    /// Create from the raw 2-bit mode field.
    pub fn from_raw(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::Normal,
            1 => Self::InstantRead,
            _ => Self::Other,
        }
    }
}

/// Battery status from advertising data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BatteryStatus {
    /// Battery is OK.
    #[default]
    Ok,
    /// Battery is low.
    Low,
}

impl BatteryStatus {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Self {
        if value == 0 {
            Self::Ok
        } else {
            Self::Low
        }
    }
}

/// Probe ID (1-8) from advertising data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProbeId(pub u8);

impl ProbeId {
    /// Minimum valid probe ID.
    pub const MIN: u8 = 1;
    /// Maximum valid probe ID.
    pub const MAX: u8 = 8;

    /// Create a new ProbeId, clamping to valid range.
    pub fn new(value: u8) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    /// Create from the raw 0-indexed wire value.
    pub fn from_raw(value: u8) -> Self {
        Self::new((value & 0x07) + 1)
    }

    /// Get the raw 0-indexed value for transmission.
    pub fn to_raw(&self) -> u8 {
        self.0.saturating_sub(1) & 0x07
    }
}

/// Probe silicone ring color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ProbeColor {
    /// Yellow ring.
    #[default]
    Yellow = 0,
    /// Grey ring.
    Grey = 1,
    /// Red ring.
    Red = 2,
    /// Orange ring.
    Orange = 3,
    /// Blue ring.
    Blue = 4,
    /// Green ring.
    Green = 5,
    /// Purple ring.
    Purple = 6,
    /// Pink ring.
    Pink = 7,
}

impl ProbeColor {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Self {
        match value & 0x07 {
            0 => Self::Yellow,
            1 => Self::Grey,
            2 => Self::Red,
            3 => Self::Orange,
            4 => Self::Blue,
            5 => Self::Green,
            6 => Self::Purple,
            _ => Self::Pink,
        }
    }
}

/// Bitmask of sensors currently flagged as overheating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Overheating {
    /// Bit N set means sensor T(N+1) is overheating.
    pub sensors: u8,
}

impl Overheating {
    /// Build from the raw bitmask byte.
    pub fn new(sensors: u8) -> Self {
        Self { sensors }
    }

    /// True if any sensor is overheating.
    pub fn is_any(&self) -> bool {
        self.sensors != 0
    }
}

/// A single parsed advertisement from a Combustion device, as produced by
/// the (external) [`Scanner`](crate::collaborators::Scanner) collaborator.
///
/// Carries `hop_count`: a direct advertisement from the probe itself
/// always has `hop_count == 0`; a repeated advertisement rebroadcast by a
/// MeatNet node has `hop_count` equal to the number of mesh hops to the
/// probe.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    /// Platform-level identifier of the radio that sent this advertisement
    /// (a repeater's MAC for a repeated advertisement, the probe's MAC for
    /// a direct one). This is the `device_id` half of a link id.
    pub device_id: String,
    /// BLE MAC address, when the platform exposes one (not all platforms
    /// expose real MACs — e.g. macOS hands out an opaque UUID instead).
    pub mac: Option<String>,
    /// Advertised local name, if present.
    pub name: Option<String>,
    /// Received signal strength in dBm.
    pub rssi: Option<i16>,
    /// What kind of Combustion device sent this.
    pub product_type: ProductType,
    /// Whether the advertisement indicates the device accepts connections.
    pub is_connectable: bool,
    /// The logical probe this advertisement is about (hex string, e.g. "100120BA").
    pub serial_number: String,
    /// Mesh hops from the host to the probe on this link (0 = direct).
    pub hop_count: u8,
    /// Advertising mode (Normal / InstantRead / Other).
    pub mode: AdvertisingMode,
    /// Raw temperature readings.
    pub probe_temperatures: ProbeTemperatures,
    /// Computed virtual (core/surface/ambient) temperatures.
    pub virtual_temperatures: VirtualTemperatures,
    /// Battery status.
    pub battery_status: BatteryStatus,
    /// Probe id (1-8).
    pub probe_id: ProbeId,
    /// Silicone ring color.
    pub color: ProbeColor,
    /// Overheating sensor flags.
    pub overheating: Overheating,
    /// Giant Grill Gauge fields, present only when `product_type == Gauge`.
    pub gauge: Option<GaugeFields>,
}

/// Fields specific to Giant Grill Gauge advertisements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GaugeFields {
    /// Ambient temperature from the gauge's own sensor, as a raw 13-bit value.
    pub ambient_raw: u16,
}

impl Advertisement {
    const MIN_SIZE: usize = 20;

    /// Parse a manufacturer-data payload into an [`Advertisement`].
    ///
    /// `device_id` and `hop_count` are not carried in the payload itself —
    /// `device_id` comes from the platform-level peripheral identity, and
    /// `hop_count` comes from the MeatNet repeated-advertisement envelope
    /// (0 when the scanner saw the probe directly) — so both are supplied
    /// by the caller alongside the raw manufacturer-data bytes.
    pub fn parse(device_id: impl Into<String>, hop_count: u8, data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE {
            return Err(Error::InvalidData {
                context: format!(
                    "advertising data too short: {} bytes (need at least {})",
                    data.len(),
                    Self::MIN_SIZE
                ),
            });
        }

        let product_type = ProductType::from_raw(data[0]);
        let serial_raw = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
        let serial_number = format!("{:08X}", serial_raw);

        let probe_temperatures =
            ProbeTemperatures::from_packed_bytes(&data[5..18]).ok_or_else(|| Error::InvalidData {
                context: "failed to parse packed temperatures".to_string(),
            })?;

        let mode_id_byte = data[18];
        let mode = AdvertisingMode::from_raw(mode_id_byte & 0x03);
        let color = ProbeColor::from_raw((mode_id_byte >> 2) & 0x07);
        let probe_id = ProbeId::from_raw((mode_id_byte >> 5) & 0x07);

        let status_byte = data[19];
        let battery_status = BatteryStatus::from_raw(status_byte & 0x01);
        let sensor_selection = VirtualSensorSelection::from_byte(status_byte >> 1);
        let virtual_temperatures =
            VirtualTemperatures::from_selection(&probe_temperatures, sensor_selection);

        let overheating = Overheating::new(if data.len() >= 22 { data[21] } else { 0 });

        let gauge = if product_type == ProductType::Gauge && data.len() >= 24 {
            Some(GaugeFields {
                ambient_raw: u16::from_le_bytes([data[22], data[23]]),
            })
        } else {
            None
        };

        Ok(Self {
            device_id: device_id.into(),
            mac: None,
            name: None,
            rssi: None,
            product_type,
            is_connectable: true,
            serial_number,
            hop_count,
            mode,
            probe_temperatures,
            virtual_temperatures,
            battery_status,
            probe_id,
            color,
            overheating,
            gauge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes() -> Vec<u8> {
        let mut data = vec![0u8; 22];
        data[0] = 1; // Probe
        data[1..5].copy_from_slice(&0x12345678u32.to_le_bytes());
        // temperatures all zero -> parses, doesn't matter for this test
        data[18] = 0b0100_0100; // mode=0 normal, color=1 grey, id=2 (-> 3)
        data[19] = 0x00; // battery ok
        data
    }

    #[test]
    fn parses_minimal_probe_advertisement() {
        let adv = Advertisement::parse("AA:BB:CC:DD:EE:FF", 0, &sample_bytes()).unwrap();
        assert_eq!(adv.serial_number, "12345678");
        assert_eq!(adv.product_type, ProductType::Probe);
        assert_eq!(adv.mode, AdvertisingMode::Normal);
        assert_eq!(adv.color, ProbeColor::Grey);
        assert_eq!(adv.probe_id.0, 3);
        assert_eq!(adv.hop_count, 0);
    }

    #[test]
    fn hop_count_is_caller_supplied() {
        let adv = Advertisement::parse("node-1", 2, &sample_bytes()).unwrap();
        assert_eq!(adv.hop_count, 2);
        assert_eq!(adv.device_id, "node-1");
    }

    #[test]
    fn rejects_short_payloads() {
        let data = vec![0u8; 5];
        assert!(Advertisement::parse("x", 0, &data).is_err());
    }

    #[test]
    fn product_type_probe_like() {
        assert!(ProductType::Probe.is_probe_like());
        assert!(ProductType::Gauge.is_probe_like());
        assert!(!ProductType::MeatNetRepeater.is_probe_like());
        assert!(!ProductType::Display.is_probe_like());
    }
}
