//! Per-probe state: the immutable snapshot and the state machine that
//! produces it (§3, §4.4).

pub mod snapshot;
pub mod state_machine;

pub use snapshot::{ProbeSnapshot, UploadState};
pub use state_machine::ProbeStateMachine;
