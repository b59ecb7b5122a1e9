//! Outbound ports for the envelope protocol.

pub mod clock;

pub use clock::{Clock, FixedClock, SystemClock};
