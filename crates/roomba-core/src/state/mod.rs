//! VM state model primitives.

/// Mode identifiers, mode data and the typed mode state machine.
pub mod mode;
/// Register file types and saturation.
pub mod registers;

pub use mode::{Mode, ModeData, ModeId, ModeValue, MODE_NAMESPACE};
pub use registers::{
    saturate, Register, RegisterFile, REGISTER_COUNT, REGISTER_MAX, REGISTER_MIN,
};
