pub mod power;
pub mod snr;

pub use power::{measure_power_at_frequencies, TX_TARGETS_GHZ};
pub use snr::SnrEngine;
