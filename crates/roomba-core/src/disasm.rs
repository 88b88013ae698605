//! Human-readable listings of loaded programs.

use std::fmt::Write as _;

use serde::Serialize;

use crate::api::VmState;
use crate::instruction::Instruction;

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisassemblyRow {
    /// Card the instruction lives on.
    pub card: usize,
    /// Position on the card.
    pub index: usize,
    /// Conditional flag name, when present.
    pub flag: Option<&'static str>,
    /// Upper-case mnemonic.
    pub mnemonic: &'static str,
    /// Formatted argument.
    pub operand: String,
    /// Whether this is the instruction at `(card_idx, ip)`.
    pub is_current: bool,
}

impl DisassemblyRow {
    /// Source text of the row, `[FLAG ]MNEMONIC ARG`.
    #[must_use]
    pub fn text(&self) -> String {
        match self.flag {
            Some(flag) => format!("{flag} {} {}", self.mnemonic, self.operand),
            None => format!("{} {}", self.mnemonic, self.operand),
        }
    }
}

/// Renders one instruction as `[FLAG ]MNEMONIC ARG`.
#[must_use]
pub fn disassemble_instruction(instr: &Instruction) -> String {
    instr.to_string()
}

/// Disassembles one card of the loaded program.
///
/// Out-of-range cards yield no rows.
#[must_use]
pub fn disassemble_card(state: &VmState, card: usize) -> Vec<DisassemblyRow> {
    let Some(instructions) = state.program.card(card) else {
        return Vec::new();
    };

    instructions
        .iter()
        .enumerate()
        .map(|(index, instr)| DisassemblyRow {
            card,
            index,
            flag: instr.flag.map(|flag| flag.name()),
            mnemonic: instr.opcode.mnemonic(),
            operand: instr.argument.to_string(),
            is_current: card == usize::from(state.card_idx) && index == usize::from(state.ip),
        })
        .collect()
}

/// Disassembles every card in order.
#[must_use]
pub fn disassemble_program(state: &VmState) -> Vec<DisassemblyRow> {
    (0..state.program.card_count())
        .flat_map(|card| disassemble_card(state, card))
        .collect()
}

/// Formats the whole program as text with one `.card N` header per card and
/// `>` marking the current instruction.
#[must_use]
pub fn format_listing(state: &VmState) -> String {
    let mut out = String::new();
    for card in 0..state.program.card_count() {
        let _ = writeln!(out, ".card {card}");
        for row in disassemble_card(state, card) {
            let marker = if row.is_current { '>' } else { ' ' };
            let _ = writeln!(out, "{marker} {:>2}  {}", row.index, row.text());
        }
    }
    out
}
