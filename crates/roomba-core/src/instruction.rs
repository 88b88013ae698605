//! Instruction model: opcode, argument and conditional flag.

use std::fmt;

use crate::encoding::Opcode;
use crate::state::{Register, RegisterFile};

/// Predicate on the sign of register `C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionalFlag {
    /// Eligible while `C < 0`.
    Neg,
    /// Eligible while `C == 0`.
    Equ,
    /// Eligible while `C > 0`.
    Pos,
}

impl ConditionalFlag {
    /// All flags.
    pub const ALL: [Self; 3] = [Self::Neg, Self::Equ, Self::Pos];

    /// Returns `true` when `c` has the sign this flag asks for.
    #[must_use]
    pub const fn matches(self, c: i16) -> bool {
        match self {
            Self::Neg => c < 0,
            Self::Equ => c == 0,
            Self::Pos => c > 0,
        }
    }

    /// Persisted byte form.
    #[must_use]
    pub const fn as_i8(self) -> i8 {
        match self {
            Self::Neg => -1,
            Self::Equ => 0,
            Self::Pos => 1,
        }
    }

    /// Decodes the persisted byte. Anything other than `-1`/`1` is `EQU`.
    #[must_use]
    pub const fn from_i8(byte: i8) -> Self {
        match byte {
            -1 => Self::Neg,
            1 => Self::Pos,
            _ => Self::Equ,
        }
    }

    /// Source-level name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Neg => "NEG",
            Self::Equ => "EQU",
            Self::Pos => "POS",
        }
    }

    /// Looks up a flag by its exact source-level name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.name() == name)
    }
}

/// Instruction argument: a literal or a register read at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Argument {
    /// Immediate signed value.
    Literal(i16),
    /// Current value of a register.
    Register(Register),
}

impl Argument {
    /// Resolves the argument against the current register file.
    #[must_use]
    pub const fn resolve(self, registers: &RegisterFile) -> i16 {
        match self {
            Self::Literal(value) => value,
            Self::Register(reg) => registers.get(reg),
        }
    }
}

impl Default for Argument {
    fn default() -> Self {
        Self::Literal(0)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Register(reg) => write!(f, "{reg}"),
        }
    }
}

/// One immutable program slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// Operation to perform.
    pub opcode: Opcode,
    /// Operand.
    pub argument: Argument,
    /// Optional gate on the sign of `C`; `None` is always eligible.
    pub flag: Option<ConditionalFlag>,
}

impl Instruction {
    /// Creates an unconditional instruction.
    #[must_use]
    pub const fn new(opcode: Opcode, argument: Argument) -> Self {
        Self {
            opcode,
            argument,
            flag: None,
        }
    }

    /// Shorthand for an unconditional instruction with a literal argument.
    #[must_use]
    pub const fn literal(opcode: Opcode, value: i16) -> Self {
        Self::new(opcode, Argument::Literal(value))
    }

    /// Shorthand for an unconditional instruction reading a register.
    #[must_use]
    pub const fn register(opcode: Opcode, reg: Register) -> Self {
        Self::new(opcode, Argument::Register(reg))
    }

    /// Returns a copy gated by `flag`.
    #[must_use]
    pub const fn with_flag(mut self, flag: ConditionalFlag) -> Self {
        self.flag = Some(flag);
        self
    }

    /// Returns `true` when this instruction may run given the value of `C`.
    #[must_use]
    pub const fn is_eligible(&self, c: i16) -> bool {
        match self.flag {
            None => true,
            Some(flag) => flag.matches(c),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(flag) = self.flag {
            write!(f, "{} ", flag.name())?;
        }
        write!(f, "{} {}", self.opcode, self.argument)
    }
}
