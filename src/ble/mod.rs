//! Low-level `btleplug` plumbing: GATT connection lifecycle and
//! characteristic read/write/notify handling.
//!
//! Advertisement scanning and parsing live in [`crate::advertisement`]:
//! a single scan stream is shared by every probe rather than owned
//! per-connection.

pub mod characteristics;
pub mod connection;
pub mod uuids;

pub use characteristics::CharacteristicHandler;
pub use connection::ConnectionManager;
pub use uuids::*;
