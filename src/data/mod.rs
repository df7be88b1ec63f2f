//! Core data types shared by the wire codec, the fusion engine, and the
//! snapshot it produces.
//!
//! Alarm configuration, food-safety configuration, and power-mode
//! preferences are not modeled here: interpreting and validating that
//! configuration is public application API surface, not link
//! arbitration. The [`Link`](crate::link::Link) trait still exposes the
//! collaborator calls that would carry them, as opaque payloads the
//! engine never interprets.

pub mod log;
pub mod prediction;
pub mod session;
pub mod temperatures;

pub use log::{LoggedDataPoint, TemperatureLog};
pub use prediction::{PredictionInfo, PredictionMode, PredictionState, PredictionType};
pub use session::SessionInfo;
pub use temperatures::{
    ProbeTemperatures, RawTemperature, VirtualSensorSelection, VirtualTemperatures,
};
