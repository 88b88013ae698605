//! Card layout and symbol resolution.
//!
//! Pass 1 walks parsed lines, opens a card at every `.card` directive (or
//! implicitly at the first instruction), numbers instructions within their
//! card and records labels and card names. Pass 2 resolves symbolic operands:
//! labels are card-local, `JMP` takes the label's index, `JBY` the distance
//! from the jumping instruction, `CRD`/`CRJ` a card name's index.

use std::collections::HashMap;
use std::fmt;

use roomba_core::{Argument, Opcode};

use crate::mnemonic::{operand_role, OperandRole};
use crate::parser::{Operand, ParsedInstruction, ParsedLine};

/// A named position with its definition line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Card index for card names, instruction index for labels.
    pub index: usize,
    /// Source line number where the name was defined.
    pub defined_at: usize,
}

/// Symbol table mapping names to their definitions.
pub type SymbolTable = HashMap<String, Symbol>;

/// An instruction with its place in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedInstruction {
    /// The parsed instruction.
    pub instruction: ParsedInstruction,
    /// Original source line number.
    pub source_line: usize,
}

/// One card produced by pass 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardLayout {
    /// Name from the `.card` directive.
    pub name: Option<String>,
    /// Line that opened the card.
    pub defined_at: usize,
    /// Card-local labels.
    pub labels: SymbolTable,
    /// Instructions in card order.
    pub instructions: Vec<PlacedInstruction>,
}

impl CardLayout {
    fn open(name: Option<String>, defined_at: usize) -> Self {
        Self {
            name,
            defined_at,
            labels: SymbolTable::new(),
            instructions: Vec::new(),
        }
    }
}

/// Result of pass 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    /// Cards in source order.
    pub cards: Vec<CardLayout>,
    /// Card names.
    pub card_names: SymbolTable,
}

/// Error during layout or resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolError {
    /// Kind of error.
    pub kind: SymbolErrorKind,
    /// Source line where the error occurred.
    pub line: usize,
    /// 1-indexed column, 1 when the whole line is at fault.
    pub column: usize,
}

/// Classification of symbol errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolErrorKind {
    /// Label defined twice on the same card.
    DuplicateLabel {
        /// The label name.
        name: String,
        /// Line of the first definition.
        first_definition: usize,
    },
    /// Card name used twice.
    DuplicateCard {
        /// The card name.
        name: String,
        /// Line of the first definition.
        first_definition: usize,
    },
    /// No label with this name on the instruction's card.
    UndefinedLabel(String),
    /// No card with this name.
    UndefinedCard(String),
    /// A symbol was used where only a value is accepted.
    SymbolNotAllowed {
        /// The symbol.
        name: String,
        /// Opcode that received it.
        opcode: Opcode,
    },
    /// A resolved position does not fit an argument.
    OutOfRange(String),
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for SymbolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateLabel {
                name,
                first_definition,
            } => write!(
                f,
                "duplicate label '{name}' (first defined at line {first_definition})"
            ),
            Self::DuplicateCard {
                name,
                first_definition,
            } => write!(
                f,
                "duplicate card '{name}' (first defined at line {first_definition})"
            ),
            Self::UndefinedLabel(name) => write!(f, "undefined label '{name}' on this card"),
            Self::UndefinedCard(name) => write!(f, "undefined card '{name}'"),
            Self::SymbolNotAllowed { name, opcode } => {
                write!(f, "{opcode} takes a value, not the symbol '{name}'")
            }
            Self::OutOfRange(name) => write!(f, "position of '{name}' does not fit an argument"),
        }
    }
}

impl std::error::Error for SymbolError {}

fn insert_unique(
    table: &mut SymbolTable,
    name: &str,
    symbol: Symbol,
    duplicate: impl FnOnce(String, usize) -> SymbolErrorKind,
) -> Result<(), SymbolError> {
    if let Some(existing) = table.get(name) {
        return Err(SymbolError {
            kind: duplicate(name.to_string(), existing.defined_at),
            line: symbol.defined_at,
            column: 1,
        });
    }
    table.insert(name.to_string(), symbol);
    Ok(())
}

/// Pass 1: groups instructions into cards and records every name.
///
/// `lines` pairs each parsed line with its original source line number.
///
/// # Errors
///
/// Returns a [`SymbolError`] for a label defined twice on one card or a card
/// name used twice.
pub fn assign_layout(lines: &[(ParsedLine, usize)]) -> Result<Layout, SymbolError> {
    let mut layout = Layout::default();

    for (parsed, source_line) in lines {
        let source_line = *source_line;
        let (label, instruction) = match parsed {
            ParsedLine::Blank => continue,
            ParsedLine::Card { name } => {
                if let Some(name) = name {
                    let symbol = Symbol {
                        index: layout.cards.len(),
                        defined_at: source_line,
                    };
                    insert_unique(&mut layout.card_names, name, symbol, |name, first| {
                        SymbolErrorKind::DuplicateCard {
                            name,
                            first_definition: first,
                        }
                    })?;
                }
                layout
                    .cards
                    .push(CardLayout::open(name.clone(), source_line));
                continue;
            }
            ParsedLine::Label { name } => (Some(name), None),
            ParsedLine::Instruction { label, instruction } => (label.as_ref(), Some(instruction)),
        };

        if layout.cards.is_empty() {
            layout.cards.push(CardLayout::open(None, source_line));
        }
        let Some(card) = layout.cards.last_mut() else {
            continue;
        };

        if let Some(name) = label {
            let symbol = Symbol {
                index: card.instructions.len(),
                defined_at: source_line,
            };
            insert_unique(&mut card.labels, name, symbol, |name, first| {
                SymbolErrorKind::DuplicateLabel {
                    name,
                    first_definition: first,
                }
            })?;
        }
        if let Some(instruction) = instruction {
            card.instructions.push(PlacedInstruction {
                instruction: instruction.clone(),
                source_line,
            });
        }
    }

    Ok(layout)
}

/// Pass 2: resolves the operand of the instruction at `index` on `card`.
///
/// # Errors
///
/// Returns a [`SymbolError`] when a symbol is undefined, used with an opcode
/// that takes a plain value, or resolves outside the argument range.
pub fn resolve_operand(
    layout: &Layout,
    card: usize,
    index: usize,
    placed: &PlacedInstruction,
) -> Result<Argument, SymbolError> {
    let instruction = &placed.instruction;
    let name = match &instruction.operand {
        Operand::Literal(value) => return Ok(Argument::Literal(*value)),
        Operand::Register(reg) => return Ok(Argument::Register(*reg)),
        Operand::Symbol(name) => name,
    };
    let error = |kind| SymbolError {
        kind,
        line: placed.source_line,
        column: instruction.operand_column,
    };

    let labels = layout.cards.get(card).map(|c| &c.labels);
    let label = || {
        labels
            .and_then(|labels| labels.get(name))
            .ok_or_else(|| error(SymbolErrorKind::UndefinedLabel(name.clone())))
    };

    let value = match operand_role(instruction.opcode) {
        OperandRole::Value => {
            return Err(error(SymbolErrorKind::SymbolNotAllowed {
                name: name.clone(),
                opcode: instruction.opcode,
            }));
        }
        OperandRole::Position => i64::try_from(label()?.index).ok(),
        OperandRole::Offset => {
            let target = i64::try_from(label()?.index).ok();
            target
                .zip(i64::try_from(index).ok())
                .map(|(target, here)| target - here)
        }
        OperandRole::Card => {
            let symbol = layout
                .card_names
                .get(name)
                .ok_or_else(|| error(SymbolErrorKind::UndefinedCard(name.clone())))?;
            i64::try_from(symbol.index).ok()
        }
    };

    value
        .and_then(|value| i16::try_from(value).ok())
        .map(Argument::Literal)
        .ok_or_else(|| error(SymbolErrorKind::OutOfRange(name.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    fn layout(source: &[&str]) -> Result<Layout, SymbolError> {
        let lines: Vec<_> = source
            .iter()
            .enumerate()
            .map(|(i, s)| (parse_line(s).expect("line parses"), i + 1))
            .collect();
        assign_layout(&lines)
    }

    fn resolved(layout: &Layout, card: usize, index: usize) -> Result<Argument, SymbolError> {
        let placed = &layout.cards[card].instructions[index];
        resolve_operand(layout, card, index, placed)
    }

    #[test]
    fn empty_source_has_no_cards() {
        assert!(layout(&[]).expect("lays out").cards.is_empty());
        assert!(layout(&["; only a comment", ""])
            .expect("lays out")
            .cards
            .is_empty());
    }

    #[test]
    fn instructions_before_any_card_open_an_implicit_one() {
        let result = layout(&["LDA 1", "ADD 2", ".card next", "SUB 1"]).expect("lays out");
        assert_eq!(result.cards.len(), 2);
        assert_eq!(result.cards[0].name, None);
        assert_eq!(result.cards[0].instructions.len(), 2);
        assert_eq!(result.card_names["next"].index, 1);
    }

    #[test]
    fn empty_cards_are_kept() {
        let result = layout(&[".card a_", ".card b_", "ADD 1"]).expect("lays out");
        assert_eq!(result.cards.len(), 2);
        assert!(result.cards[0].instructions.is_empty());
    }

    #[test]
    fn labels_index_the_next_instruction() {
        let result =
            layout(&[".card", "ADD 1", "loop:", "end: SUB 1", "JMP loop"]).expect("lays out");
        let labels = &result.cards[0].labels;
        assert_eq!(labels["loop"].index, 1);
        assert_eq!(labels["end"].index, 1);
        assert_eq!(labels["loop"].defined_at, 3);
    }

    #[test]
    fn labels_are_card_local() {
        let result = layout(&[".card", "top: ADD 1", ".card", "top: SUB 1", "JMP top"])
            .expect("same label on two cards");
        assert_eq!(resolved(&result, 1, 1), Ok(Argument::Literal(0)));
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = layout(&["x: ADD 1", "x: ADD 2"]).expect_err("duplicate label");
        assert_eq!(
            err.kind,
            SymbolErrorKind::DuplicateLabel {
                name: "x".into(),
                first_definition: 1
            }
        );
        assert_eq!(err.line, 2);

        let err = layout(&[".card main", ".card main"]).expect_err("duplicate card");
        assert!(matches!(err.kind, SymbolErrorKind::DuplicateCard { .. }));
    }

    #[test]
    fn jump_targets_resolve_by_role() {
        let result = layout(&[
            ".card main",
            "start: ADD 1",
            "ADD 1",
            "back: ADD 1",
            "JBY back",
            "JBY ahead",
            "JMP start",
            "ahead: CRD turn",
            ".card turn",
            "CRJ main",
        ])
        .expect("lays out");

        assert_eq!(resolved(&result, 0, 3), Ok(Argument::Literal(-1)));
        assert_eq!(resolved(&result, 0, 4), Ok(Argument::Literal(2)));
        assert_eq!(resolved(&result, 0, 5), Ok(Argument::Literal(0)));
        assert_eq!(resolved(&result, 0, 6), Ok(Argument::Literal(1)));
        assert_eq!(resolved(&result, 1, 0), Ok(Argument::Literal(0)));
    }

    #[test]
    fn unresolvable_symbols_report_operand_column() {
        let result = layout(&["JMP nowhere", "CRD nowhere", "LDA count"]).expect("lays out");

        let err = resolved(&result, 0, 0).expect_err("undefined label");
        assert_eq!(err.kind, SymbolErrorKind::UndefinedLabel("nowhere".into()));
        assert_eq!((err.line, err.column), (1, 5));

        let err = resolved(&result, 0, 1).expect_err("undefined card");
        assert_eq!(err.kind, SymbolErrorKind::UndefinedCard("nowhere".into()));

        let err = resolved(&result, 0, 2).expect_err("symbol as value");
        assert!(matches!(
            err.kind,
            SymbolErrorKind::SymbolNotAllowed {
                opcode: Opcode::Lda,
                ..
            }
        ));
    }
}
