mod bdp_controller;
mod congestion_controller;
mod error;
mod fixed_aimd;
mod rtt_threshold_aimd;

pub use bdp_controller::*;
pub use congestion_controller::*;
pub use error::*;
pub use fixed_aimd::*;
pub use rtt_threshold_aimd::*;

/// Inter-packet spacing: the [Pacer](pacing::Pacer) and its gain cycle.
pub mod pacing;

/// Time windowed estimators backing the controllers, such as the
/// [RttTracker](trackers::RttTracker) and [DeliveryTracker](trackers::DeliveryTracker).
pub mod trackers;
