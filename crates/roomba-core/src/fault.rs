use thiserror::Error;

/// Runtime faults raised by instruction execution.
///
/// A fault never leaves partial side effects: the faulting instruction is
/// skipped and the pointer advances past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u8)]
pub enum FaultCode {
    /// `DVM` with a zero divisor.
    #[error("division by zero")]
    DivideByZero = 0x01,
}

impl FaultCode {
    /// Stable numeric code.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable numeric code back into a fault.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::DivideByZero),
            _ => None,
        }
    }
}
