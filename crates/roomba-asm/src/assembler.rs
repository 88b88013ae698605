//! Top-level assembler pipeline.
//!
//! 1. Source extraction (`source::extract_source`)
//! 2. Line parsing, collecting every parse error
//! 3. Pass 1 card layout and name tables (`symbols::assign_layout`)
//! 4. Pass 2 operand resolution into a [`Program`]
//!
//! Capacity limits are advisory: oversized programs assemble with warnings.

use std::fs;
use std::path::Path;

use roomba_core::{
    Argument, Instruction, Program, VmState, ADDRESSABLE_LIMIT, MAX_CARD_COUNT, MAX_CARD_LENGTH,
    REGISTER_MAX, REGISTER_MIN,
};

use crate::errors::{
    AssembleError, AssembleErrorKind, AssembleWarning, AssembleWarningKind, ErrorCollection,
    SourceLoc,
};
use crate::parser::{parse_line, ParsedLine};
use crate::source::{extract_source, SourceContent};
use crate::symbols::{assign_layout, resolve_operand, Layout};

/// Name and origin of an assembled card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    /// Name from the `.card` directive.
    pub name: Option<String>,
    /// Line that opened the card.
    pub defined_at: usize,
}

/// An entry in the card/instruction-to-source listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Card index.
    pub card: usize,
    /// Instruction index on the card.
    pub index: usize,
    /// The assembled instruction.
    pub instruction: Instruction,
    /// Where it was written.
    pub location: SourceLoc,
}

/// Result of a successful assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    /// Assembled program.
    pub program: Program,
    /// Per-card metadata in card order.
    pub cards: Vec<CardInfo>,
    /// Non-fatal diagnostics.
    pub warnings: Vec<AssembleWarning>,
    /// Source listing in program order.
    pub listing: Vec<ListingEntry>,
}

impl Assembly {
    /// Fresh VM state with this program loaded.
    #[must_use]
    pub fn to_state(&self) -> VmState {
        VmState::with_program(self.program.clone())
    }

    /// Consumes the assembly into a fresh VM state.
    #[must_use]
    pub fn into_state(self) -> VmState {
        VmState::with_program(self.program)
    }
}

/// Reads and assembles the file at `path`.
///
/// # Errors
///
/// Returns every error found: an unreadable file, unparsable lines, duplicate
/// names or unresolvable symbols.
pub fn assemble(path: &Path) -> Result<Assembly, ErrorCollection> {
    let content = fs::read_to_string(path).map_err(|e| {
        AssembleError::new(AssembleErrorKind::Io(format!(
            "failed to read {}: {e}",
            path.display()
        )))
    })?;
    assemble_source(path, &content)
}

/// Assembles `content`, using `path` for diagnostics and to detect literate
/// Markdown input.
///
/// # Errors
///
/// Returns every parse error, or the first layout error, or every resolution
/// error, in source order.
pub fn assemble_source(path: &Path, content: &str) -> Result<Assembly, ErrorCollection> {
    let source = extract_source(path, content);
    let file = source.file_path.as_str();

    let parsed = parse_source(&source)?;
    let layout = assign_layout(&parsed).map_err(|e| AssembleError::symbol(file, e))?;
    check_addressable(&layout, file)?;
    let (program, listing) = resolve_program(&layout, file)?;

    let warnings = capacity_warnings(&layout, file)
        .into_iter()
        .chain(literal_warnings(&listing))
        .collect();
    let cards = layout
        .cards
        .iter()
        .map(|card| CardInfo {
            name: card.name.clone(),
            defined_at: card.defined_at,
        })
        .collect();

    Ok(Assembly {
        program,
        cards,
        warnings,
        listing,
    })
}

fn parse_source(source: &SourceContent) -> Result<Vec<(ParsedLine, usize)>, ErrorCollection> {
    let mut parsed = Vec::with_capacity(source.lines.len());
    let mut errors = ErrorCollection::new();

    for line in &source.lines {
        match parse_line(&line.text) {
            Ok(item) => parsed.push((item, line.original_line)),
            Err(e) => errors.push(AssembleError::parse(
                &source.file_path,
                line.original_line,
                e,
            )),
        }
    }

    if errors.is_empty() {
        Ok(parsed)
    } else {
        Err(errors)
    }
}

fn resolve_program(
    layout: &Layout,
    file: &str,
) -> Result<(Program, Vec<ListingEntry>), ErrorCollection> {
    let mut cards = Vec::with_capacity(layout.cards.len());
    let mut listing = Vec::new();
    let mut errors = ErrorCollection::new();

    for (card_idx, card) in layout.cards.iter().enumerate() {
        let mut instructions = Vec::with_capacity(card.instructions.len());
        for (index, placed) in card.instructions.iter().enumerate() {
            let argument = match resolve_operand(layout, card_idx, index, placed) {
                Ok(argument) => argument,
                Err(e) => {
                    errors.push(AssembleError::symbol(file, e));
                    continue;
                }
            };
            let instruction = Instruction {
                opcode: placed.instruction.opcode,
                argument,
                flag: placed.instruction.flag,
            };
            instructions.push(instruction);
            listing.push(ListingEntry {
                card: card_idx,
                index,
                instruction,
                location: SourceLoc::new(
                    file,
                    placed.source_line,
                    placed.instruction.operand_column,
                ),
            });
        }
        cards.push(instructions);
    }

    if errors.is_empty() {
        Ok((Program::from_cards(cards), listing))
    } else {
        Err(errors)
    }
}

fn check_addressable(layout: &Layout, file: &str) -> Result<(), ErrorCollection> {
    let mut errors = ErrorCollection::new();

    if let Some(first_extra) = layout.cards.get(ADDRESSABLE_LIMIT) {
        errors.push(
            AssembleError::new(AssembleErrorKind::Unaddressable(format!(
                "card {ADDRESSABLE_LIMIT}"
            )))
            .with_location(SourceLoc::new(file, first_extra.defined_at, 1)),
        );
    }
    for (card, layout_card) in layout.cards.iter().enumerate() {
        if let Some(first_extra) = layout_card.instructions.get(ADDRESSABLE_LIMIT) {
            errors.push(
                AssembleError::new(AssembleErrorKind::Unaddressable(format!(
                    "instruction {ADDRESSABLE_LIMIT} of card {card}"
                )))
                .with_location(SourceLoc::new(file, first_extra.source_line, 1)),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn capacity_warnings(layout: &Layout, file: &str) -> Vec<AssembleWarning> {
    let mut warnings = Vec::new();

    if let Some(first_extra) = layout.cards.get(MAX_CARD_COUNT) {
        warnings.push(AssembleWarning {
            kind: AssembleWarningKind::TooManyCards {
                count: layout.cards.len(),
            },
            location: Some(SourceLoc::new(file, first_extra.defined_at, 1)),
        });
    }

    for (card, layout_card) in layout.cards.iter().enumerate() {
        if let Some(first_extra) = layout_card.instructions.get(MAX_CARD_LENGTH) {
            warnings.push(AssembleWarning {
                kind: AssembleWarningKind::CardTooLong {
                    card,
                    length: layout_card.instructions.len(),
                },
                location: Some(SourceLoc::new(file, first_extra.source_line, 1)),
            });
        }
    }

    warnings
}

fn literal_warnings(listing: &[ListingEntry]) -> Vec<AssembleWarning> {
    listing
        .iter()
        .filter_map(|entry| match entry.instruction.argument {
            Argument::Literal(value) if !(REGISTER_MIN..=REGISTER_MAX).contains(&value) => {
                Some(AssembleWarning {
                    kind: AssembleWarningKind::LiteralSaturates { value },
                    location: Some(entry.location.clone()),
                })
            }
            _ => None,
        })
        .collect()
}
