//! Link identity and connection-state types.

use std::fmt;

/// Connection state of a single link, or (derived) of a whole probe.
///
/// The full 8-variant set from §3 is one type because the probe's reported
/// `connection_state` (§4.4.1) is computed by scanning the connection
/// states of all of a probe's links and picking one of these same
/// variants — plus `NoRoute`, which only ever appears at the probe level
/// (no single link is ever "NoRoute"; that's a derived judgment about the
/// whole set of links).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No link has been seen recently enough to be considered reachable.
    #[default]
    OutOfRange,
    /// Seen advertising, but the advertisement says it won't accept a connection.
    AdvertisingNotConnectable,
    /// Seen advertising and connectable, not yet connecting.
    AdvertisingConnectable,
    /// A connection attempt is in flight.
    Connecting,
    /// GATT-connected.
    Connected,
    /// A disconnect is in flight.
    Disconnecting,
    /// Explicitly disconnected (distinct from simply not having been seen).
    Disconnected,
    /// At least one link is connected, but session info can't be obtained
    /// from it — effectively unreachable at the application layer. Only
    /// produced by probe-level derivation (§4.4.1), never a single link's
    /// own state.
    NoRoute,
}

impl ConnectionState {
    /// True for `Connected`.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// True for `Disconnected` (the only state `should_connect` treats as
    /// a clean starting point — see §4.3).
    pub fn is_disconnected(self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// True for either advertising variant.
    pub fn is_advertising(self) -> bool {
        matches!(self, Self::AdvertisingConnectable | Self::AdvertisingNotConnectable)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OutOfRange => "OutOfRange",
            Self::AdvertisingNotConnectable => "AdvertisingNotConnectable",
            Self::AdvertisingConnectable => "AdvertisingConnectable",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting",
            Self::Disconnected => "Disconnected",
            Self::NoRoute => "NoRoute",
        };
        write!(f, "{s}")
    }
}

/// Identifies one physical radio source that can deliver data for a probe:
/// `(device_id, serial_number)` (§3).
///
/// `device_id` is the source radio's MAC (or platform peripheral id): the
/// probe itself for a direct link, or the repeating node for a repeated
/// link. Two different nodes repeating the same probe produce two
/// different `LinkId`s with the same `serial_number` (invariant I2); a
/// probe's direct link is the only `LinkId` whose `device_id` equals the
/// probe's own radio address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkId {
    /// MAC (or platform identifier) of the radio that carries this link.
    pub device_id: String,
    /// Logical probe serial number this link delivers data for.
    pub serial_number: String,
}

impl LinkId {
    /// Construct a link id.
    pub fn new(device_id: impl Into<String>, serial_number: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            serial_number: serial_number.into(),
        }
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.serial_number, self.device_id)
    }
}

/// Whether a link reaches its probe directly or via a MeatNet repeater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// The link's `device_id` is the probe's own radio.
    Direct,
    /// The link's `device_id` is a repeating node; `hop_count >= 1`.
    Repeated,
}

impl LinkKind {
    /// True for `Repeated`.
    pub fn is_repeated(self) -> bool {
        matches!(self, Self::Repeated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(ConnectionState::Disconnected.is_disconnected());
        assert!(ConnectionState::AdvertisingConnectable.is_advertising());
        assert!(ConnectionState::AdvertisingNotConnectable.is_advertising());
        assert!(!ConnectionState::Connected.is_advertising());
    }

    #[test]
    fn link_id_equality_is_by_pair() {
        let a = LinkId::new("D1", "S1");
        let b = LinkId::new("D1", "S1");
        let c = LinkId::new("D2", "S1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_formats() {
        assert_eq!(ConnectionState::NoRoute.to_string(), "NoRoute");
        assert_eq!(LinkId::new("D1", "S1").to_string(), "S1@D1");
    }
}
