mod gain_cycle;
mod pacer;

pub use gain_cycle::*;
pub use pacer::*;
