//! Reference peripherals shipped with the core.

/// Countdown timer addressable through `PHL`.
pub mod timer;

pub use timer::{TimerPeripheral, MODE_TIMER_WAIT};
