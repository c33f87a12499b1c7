mod bandwidth_tracker;
mod delivery_tracker;
mod rtt_tracker;
mod sample_window;

pub use bandwidth_tracker::*;
pub use delivery_tracker::*;
pub use rtt_tracker::*;
pub use sample_window::*;
