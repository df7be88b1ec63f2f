//! Prediction Linearizer (§4.4.4).
//!
//! The probe reports a raw "seconds remaining" prediction roughly once
//! every 5 seconds. Displaying that number as-is makes a countdown that
//! visibly jumps every 5 seconds; this module turns it into a smooth
//! per-200ms countdown once the prediction is close enough to be
//! interesting, and a coarsely-rounded, rarely-updated number otherwise.

use crate::data::PredictionState;
use crate::idle_monitor::IdleMonitor;

/// Predictions beyond this many seconds are not displayed at all.
pub const MAX_SECONDS: u32 = 21_600;
/// Below this many seconds remaining, switch to fine-resolution ticking.
pub const LOW_RES_CUTOFF_SECONDS: u32 = 300;
/// Rounding granularity while in the low-resolution regime.
pub const LOW_RES_PRECISION_SECONDS: u32 = 15;
/// Nominal interval between raw prediction samples from the probe.
pub const PREDICTION_CADENCE_MS: u64 = 5000;
/// Interval between linearizer ticks while in the fine-resolution regime.
pub const TICK_MS: u64 = 200;
/// How long without a new sample before the linearizer gives up and stops.
pub const STALE_TIMEOUT_MS: u64 = 15_000;

fn stale_timeout() -> std::time::Duration {
    std::time::Duration::from_millis(STALE_TIMEOUT_MS)
}

#[derive(Debug, Clone, Copy)]
struct FineState {
    current_ms: i64,
    delta_ms: i64,
}

/// Smooths the probe's raw prediction countdown into a displayable
/// `seconds_remaining` stream.
#[derive(Debug)]
pub struct PredictionLinearizer {
    low_res_previous: Option<u32>,
    fine: Option<FineState>,
    last_sequence_number: Option<u32>,
    last_set_point: Option<f64>,
    idle: IdleMonitor,
}

impl Default for PredictionLinearizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionLinearizer {
    /// Create a linearizer with no prediction history.
    pub fn new() -> Self {
        Self {
            low_res_previous: None,
            fine: None,
            last_sequence_number: None,
            last_set_point: None,
            idle: IdleMonitor::new(),
        }
    }

    /// Whether a fine-resolution ticker should currently be running for
    /// this linearizer (the owning task uses this to start/stop its
    /// 200ms interval).
    pub fn is_fine_resolution_active(&self) -> bool {
        self.fine.is_some()
    }

    /// Feed one raw prediction sample `(raw_seconds, sequence_number)`.
    ///
    /// Returns `None` if the sample was a silently-dropped duplicate
    /// (firmware resends the initial prediction message); the caller
    /// should keep displaying whatever it last published. Otherwise
    /// returns `Some(value)`, where `value` may itself be `None` meaning
    /// "no prediction to display".
    pub fn on_sample(
        &mut self,
        raw_seconds: u32,
        sequence_number: u32,
        set_point_celsius: f64,
        state: PredictionState,
    ) -> Option<Option<u32>> {
        if self.last_sequence_number == Some(sequence_number)
            && self.last_set_point == Some(set_point_celsius)
        {
            return None;
        }
        self.last_sequence_number = Some(sequence_number);
        self.last_set_point = Some(set_point_celsius);
        self.idle.touch();

        if !state.is_predicting() {
            self.fine = None;
            return Some(None);
        }
        if raw_seconds > MAX_SECONDS {
            self.fine = None;
            return Some(None);
        }

        if raw_seconds > LOW_RES_CUTOFF_SECONDS {
            self.fine = None;
            if self.low_res_previous.is_none() || sequence_number % 3 == 0 {
                self.low_res_previous = Some(round_to_nearest(raw_seconds, LOW_RES_PRECISION_SECONDS));
            }
            return Some(self.low_res_previous);
        }

        let target_ms = raw_seconds.saturating_sub(5) as i64 * 1000;
        match self.fine.as_mut() {
            None => {
                self.fine = Some(FineState {
                    current_ms: raw_seconds as i64 * 1000,
                    delta_ms: TICK_MS as i64,
                });
            }
            Some(fine) => {
                let ticks_to_cadence = (PREDICTION_CADENCE_MS / TICK_MS) as i64;
                fine.delta_ms = (fine.current_ms - target_ms) / ticks_to_cadence;
            }
        }
        Some(Some((self.fine.unwrap().current_ms / 1000) as u32))
    }

    /// Advance the fine-resolution ticker by one 200ms step.
    ///
    /// Returns `None` when the ticker should stop: either no fine-resolution
    /// prediction is active, or no sample has arrived within the stale
    /// timeout.
    pub fn tick(&mut self) -> Option<u32> {
        if self.idle.is_idle(stale_timeout()) {
            self.fine = None;
            return None;
        }
        let fine = self.fine.as_mut()?;
        fine.current_ms = (fine.current_ms - fine.delta_ms).max(0);
        Some((fine.current_ms / 1000) as u32)
    }

    /// `percent_through_cook` (§4.4.4).
    pub fn percent_through_cook(core: f64, heat_start: f64, set_point: f64) -> f64 {
        if set_point == heat_start {
            return 100.0;
        }
        if core > set_point {
            return 100.0;
        }
        if heat_start > core {
            return 0.0;
        }
        (((core - heat_start) / (set_point - heat_start)) * 100.0).clamp(0.0, 100.0)
    }
}

fn round_to_nearest(value: u32, precision: u32) -> u32 {
    let remainder = value % precision;
    if remainder > precision / 2 {
        value - remainder + precision
    } else {
        value - remainder
    }
}
