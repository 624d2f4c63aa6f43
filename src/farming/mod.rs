pub mod service;

pub use service::{FarmingError, FarmingService};
