//! Link identity, records, the collaborator trait, the per-probe
//! connect/disconnect arbiter, and a concrete `btleplug`-backed
//! implementation of the trait (§3, §4.3, §6).

pub mod arbiter;
pub mod ble;
pub mod record;
pub mod traits;
pub mod types;

pub use arbiter::{LinkArbiter, LinkArbiterSettings};
pub use ble::BtleplugLink;
pub use record::{LinkRecord, OUT_OF_RANGE_TIMEOUT};
pub use traits::Link;
pub use types::{ConnectionState, LinkId, LinkKind};
