//! Network Manager: the process-wide dispatcher that owns every device,
//! link, and per-probe state machine (§4.5).

pub mod manager;

pub use manager::{AdvertisementOutcome, NetworkEvent, NetworkManager, OrphanFirmwareState, UnlinkOutcome};
