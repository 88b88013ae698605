//! Mnemonic, flag-word and register resolution against the core opcode table.

use roomba_core::{ConditionalFlag, Opcode, Register};

/// How a symbolic operand is interpreted for a given opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRole {
    /// Plain value; symbols are not allowed.
    Value,
    /// Absolute position on the current card (`JMP`).
    Position,
    /// Offset from the instruction itself (`JBY`).
    Offset,
    /// Card index (`CRD`, `CRJ`).
    Card,
}

/// Resolves a mnemonic, ignoring case.
#[must_use]
pub fn resolve_mnemonic(text: &str) -> Option<Opcode> {
    Opcode::from_mnemonic(&text.to_ascii_uppercase())
}

/// Resolves a conditional flag word, ignoring case.
#[must_use]
pub fn resolve_flag(text: &str) -> Option<ConditionalFlag> {
    ConditionalFlag::from_name(&text.to_ascii_uppercase())
}

/// Resolves a register name, ignoring case.
#[must_use]
pub fn resolve_register(text: &str) -> Option<Register> {
    Register::from_name(&text.to_ascii_uppercase())
}

/// Operand role for `opcode`.
#[must_use]
pub const fn operand_role(opcode: Opcode) -> OperandRole {
    match opcode {
        Opcode::Jmp => OperandRole::Position,
        Opcode::Jby => OperandRole::Offset,
        Opcode::Crd | Opcode::Crj => OperandRole::Card,
        _ => OperandRole::Value,
    }
}

/// Returns `true` when `name` cannot be used as a label or card name.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    resolve_register(name).is_some()
        || resolve_flag(name).is_some()
        || resolve_mnemonic(name).is_some()
}
