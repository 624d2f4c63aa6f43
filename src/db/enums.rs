use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a farmed channel.
///
/// Invariant: a channel is `Active` exactly while a farming timer is
/// registered for its id (see `FarmingService`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    Active,
    Paused,
    Offline,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Outcome of a prediction bet. Transitions exactly once, from `Pending`
/// to either `Win` or `Loss`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionOutcome {
    Pending,
    Win,
    Loss,
}

impl fmt::Display for PredictionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionOutcome::Pending => write!(f, "pending"),
            PredictionOutcome::Win => write!(f, "win"),
            PredictionOutcome::Loss => write!(f, "loss"),
        }
    }
}
