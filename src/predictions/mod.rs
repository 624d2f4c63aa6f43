pub mod service;

pub use service::{PredictionError, PredictionService, PredictionStats};
