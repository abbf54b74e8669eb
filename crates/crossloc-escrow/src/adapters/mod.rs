pub mod simulated;

pub use simulated::{SimClock, SimulatedLedger};
