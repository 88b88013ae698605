//! Program store: an ordered list of cards, each an ordered instruction list.
//!
//! The interpreter only reads the program. Hosts replace it wholesale through
//! [`crate::VmState::load_program`] or one card at a time through
//! [`Program::set_card`].

use thiserror::Error;

use crate::instruction::Instruction;

/// Recommended maximum number of cards in a program.
pub const MAX_CARD_COUNT: usize = 16;
/// Recommended maximum number of instructions on one card.
pub const MAX_CARD_LENGTH: usize = 16;
/// Hard limit on cards and on instructions per card: every position must be
/// reachable through the 8-bit `card_idx` and `ip` pointers.
pub const ADDRESSABLE_LIMIT: usize = 256;

/// One card of the program.
pub type Card = Vec<Instruction>;

/// Errors returned by card-level program edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ProgramError {
    /// Replacement targeted a card index past the end of the program.
    #[error("card index {index} is out of range for a program with {count} cards")]
    CardOutOfRange {
        /// Requested card index.
        index: usize,
        /// Number of cards currently in the program.
        count: usize,
    },
}

/// Ordered sequence of cards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    cards: Vec<Card>,
}

impl Program {
    /// The empty program.
    #[must_use]
    pub const fn empty() -> Self {
        Self { cards: Vec::new() }
    }

    /// Builds a program from its cards.
    ///
    /// Cards and instructions past [`ADDRESSABLE_LIMIT`] are dropped.
    #[must_use]
    pub fn from_cards(mut cards: Vec<Card>) -> Self {
        cards.truncate(ADDRESSABLE_LIMIT);
        for card in &mut cards {
            card.truncate(ADDRESSABLE_LIMIT);
        }
        Self { cards }
    }

    /// Returns `true` when every card and instruction is addressable.
    #[must_use]
    pub fn is_addressable(cards: &[Card]) -> bool {
        cards.len() <= ADDRESSABLE_LIMIT
            && cards.iter().all(|card| card.len() <= ADDRESSABLE_LIMIT)
    }

    /// Returns `true` when the program holds no cards.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Number of cards.
    #[must_use]
    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    /// Returns a card by index.
    #[must_use]
    pub fn card(&self, index: usize) -> Option<&[Instruction]> {
        self.cards.get(index).map(Vec::as_slice)
    }

    /// Length of a card, `0` when the index is out of range.
    #[must_use]
    pub fn card_len(&self, index: usize) -> usize {
        self.cards.get(index).map_or(0, Vec::len)
    }

    /// Returns one instruction by position.
    #[must_use]
    pub fn instruction(&self, card: usize, ip: usize) -> Option<&Instruction> {
        self.cards.get(card)?.get(ip)
    }

    /// All cards in order.
    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Consumes the program, returning its cards.
    #[must_use]
    pub fn into_cards(self) -> Vec<Card> {
        self.cards
    }

    /// Replaces an existing card, dropping instructions past
    /// [`ADDRESSABLE_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::CardOutOfRange`] when `index` does not name an
    /// existing card.
    pub fn set_card(&mut self, index: usize, card: Card) -> Result<(), ProgramError> {
        let count = self.cards.len();
        let slot = self
            .cards
            .get_mut(index)
            .ok_or(ProgramError::CardOutOfRange { index, count })?;
        *slot = card;
        slot.truncate(ADDRESSABLE_LIMIT);
        Ok(())
    }

    /// Appends a card and returns its index, or `None` when the program
    /// already holds [`ADDRESSABLE_LIMIT`] cards.
    pub fn push_card(&mut self, mut card: Card) -> Option<usize> {
        if self.cards.len() >= ADDRESSABLE_LIMIT {
            return None;
        }
        card.truncate(ADDRESSABLE_LIMIT);
        self.cards.push(card);
        Some(self.cards.len() - 1)
    }

    /// Returns `true` when the program fits the recommended capacity.
    #[must_use]
    pub fn within_capacity(&self) -> bool {
        self.cards.len() <= MAX_CARD_COUNT
            && self.cards.iter().all(|card| card.len() <= MAX_CARD_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::{Program, ProgramError, ADDRESSABLE_LIMIT, MAX_CARD_COUNT, MAX_CARD_LENGTH};
    use crate::encoding::Opcode;
    use crate::instruction::Instruction;

    fn card(len: usize) -> Vec<Instruction> {
        vec![Instruction::literal(Opcode::Add, 1); len]
    }

    #[test]
    fn empty_program_has_no_cards() {
        let program = Program::empty();
        assert!(program.is_empty());
        assert_eq!(program.card_count(), 0);
        assert_eq!(program.card_len(0), 0);
        assert!(program.card(0).is_none());
        assert!(program.instruction(0, 0).is_none());
    }

    #[test]
    fn cards_are_addressed_by_card_then_ip() {
        let program = Program::from_cards(vec![
            vec![Instruction::literal(Opcode::Lda, 1)],
            vec![
                Instruction::literal(Opcode::Add, 2),
                Instruction::literal(Opcode::Sub, 3),
            ],
        ]);

        assert_eq!(program.card_count(), 2);
        assert_eq!(program.card_len(1), 2);
        assert_eq!(
            program.instruction(1, 1),
            Some(&Instruction::literal(Opcode::Sub, 3))
        );
        assert!(program.instruction(1, 2).is_none());
    }

    #[test]
    fn set_card_replaces_existing_and_rejects_out_of_range() {
        let mut program = Program::from_cards(vec![card(1)]);
        program.set_card(0, card(3)).expect("card 0 exists");
        assert_eq!(program.card_len(0), 3);

        assert_eq!(
            program.set_card(1, card(1)),
            Err(ProgramError::CardOutOfRange { index: 1, count: 1 })
        );
    }

    #[test]
    fn push_card_returns_new_index() {
        let mut program = Program::empty();
        assert_eq!(program.push_card(card(2)), Some(0));
        assert_eq!(program.push_card(Vec::new()), Some(1));
        assert_eq!(program.card_len(1), 0);
    }

    #[test]
    fn capacity_is_reported_not_enforced() {
        let full = Program::from_cards(vec![card(MAX_CARD_LENGTH); MAX_CARD_COUNT]);
        assert!(full.within_capacity());

        let long_card = Program::from_cards(vec![card(MAX_CARD_LENGTH + 1)]);
        assert!(!long_card.within_capacity());
        assert_eq!(long_card.card_len(0), MAX_CARD_LENGTH + 1);

        let many_cards = Program::from_cards(vec![card(1); MAX_CARD_COUNT + 1]);
        assert!(!many_cards.within_capacity());
    }

    #[test]
    fn unaddressable_positions_are_dropped() {
        let cards = vec![card(ADDRESSABLE_LIMIT + 44); ADDRESSABLE_LIMIT + 3];
        assert!(!Program::is_addressable(&cards));

        let mut program = Program::from_cards(cards);
        assert_eq!(program.card_count(), ADDRESSABLE_LIMIT);
        assert_eq!(program.card_len(0), ADDRESSABLE_LIMIT);
        assert!(Program::is_addressable(program.cards()));
        assert_eq!(program.push_card(card(1)), None);

        program.set_card(7, card(ADDRESSABLE_LIMIT + 1)).expect("card 7 exists");
        assert_eq!(program.card_len(7), ADDRESSABLE_LIMIT);
    }
}
