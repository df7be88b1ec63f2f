//! Prediction sample smoothing (§4.4.4).

pub mod linearizer;

pub use linearizer::PredictionLinearizer;
