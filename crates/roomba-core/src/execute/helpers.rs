//! Pointer arithmetic and instruction selection helpers.

use crate::api::VmState;
use crate::instruction::Instruction;

/// Result of the conditional scan over one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The card has no instructions.
    EmptyCard,
    /// No instruction on the card is eligible for the current `C`.
    NoneEligible,
    /// First eligible instruction at or after the start position.
    Selected {
        /// Position of the instruction on the card.
        index: usize,
        /// The instruction.
        instruction: Instruction,
    },
}

/// Scans at most one full lap of `card`, starting at `start`, for the first
/// instruction eligible under `c`.
#[must_use]
pub fn select_instruction(card: &[Instruction], start: usize, c: i16) -> Selection {
    let len = card.len();
    if len == 0 {
        return Selection::EmptyCard;
    }

    (0..len)
        .map(|offset| (start + offset) % len)
        .find_map(|index| {
            let instruction = card[index];
            instruction
                .is_eligible(c)
                .then_some(Selection::Selected { index, instruction })
        })
        .unwrap_or(Selection::NoneEligible)
}

/// Jump target clamped to `[0, card_len]`.
///
/// The upper bound is inclusive; normalization later wraps it back to `0`.
#[must_use]
pub fn clamp_jump(target: i64, card_len: usize) -> i64 {
    target.clamp(0, i64::try_from(card_len).unwrap_or(i64::MAX))
}

/// Returns `true` when `target` names an existing card.
#[must_use]
pub fn card_target_valid(target: i16, card_count: usize) -> bool {
    usize::try_from(target).is_ok_and(|index| index < card_count)
}

/// Euclidean modulo that maps negative values into `0..len`.
#[must_use]
pub fn floor_mod(value: i64, len: usize) -> i64 {
    match i64::try_from(len) {
        Ok(0) | Err(_) => 0,
        Ok(len) => value.rem_euclid(len),
    }
}

/// Narrows a non-negative index into a pointer register.
#[must_use]
pub fn narrow(index: i64) -> u8 {
    u8::try_from(index.max(0)).unwrap_or(u8::MAX)
}

/// Brings both pointers back into range after a step.
///
/// An out-of-range card resets to card `0`; `ip` is taken modulo the length of
/// the (possibly new) current card.
pub fn normalize_pointers(state: &mut VmState, ip: i64) {
    if usize::from(state.card_idx) >= state.program.card_count() {
        state.card_idx = 0;
    }
    let len = state.program.card_len(usize::from(state.card_idx));
    state.ip = narrow(floor_mod(ip, len));
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{card_target_valid, clamp_jump, floor_mod, select_instruction, Selection};
    use crate::encoding::Opcode;
    use crate::instruction::{ConditionalFlag, Instruction};

    fn gated(flag: ConditionalFlag) -> Instruction {
        Instruction::literal(Opcode::Add, 1).with_flag(flag)
    }

    #[test]
    fn empty_card_is_reported() {
        assert_eq!(select_instruction(&[], 0, 0), Selection::EmptyCard);
    }

    #[test]
    fn scan_wraps_from_start_position() {
        let card = [
            gated(ConditionalFlag::Neg),
            gated(ConditionalFlag::Pos),
            gated(ConditionalFlag::Equ),
        ];

        let Selection::Selected { index, .. } = select_instruction(&card, 2, -1) else {
            panic!("NEG instruction should be found after wrapping");
        };
        assert_eq!(index, 0);

        let Selection::Selected { index, .. } = select_instruction(&card, 0, 5) else {
            panic!("POS instruction should be found");
        };
        assert_eq!(index, 1);
    }

    #[test]
    fn scan_with_nothing_eligible() {
        let card = [gated(ConditionalFlag::Pos), gated(ConditionalFlag::Neg)];
        assert_eq!(select_instruction(&card, 1, 0), Selection::NoneEligible);
    }

    #[rstest]
    #[case(-5, 4, 0)]
    #[case(2, 4, 2)]
    #[case(4, 4, 4)]
    #[case(90, 4, 4)]
    fn jump_clamp_keeps_inclusive_upper_bound(
        #[case] target: i64,
        #[case] len: usize,
        #[case] expected: i64,
    ) {
        assert_eq!(clamp_jump(target, len), expected);
    }

    #[rstest]
    #[case(-1, 3, 2)]
    #[case(3, 3, 0)]
    #[case(7, 3, 1)]
    #[case(5, 0, 0)]
    fn floor_mod_is_euclidean(#[case] value: i64, #[case] len: usize, #[case] expected: i64) {
        assert_eq!(floor_mod(value, len), expected);
    }

    #[test]
    fn card_targets_must_name_existing_cards() {
        assert!(card_target_valid(0, 1));
        assert!(card_target_valid(2, 3));
        assert!(!card_target_valid(3, 3));
        assert!(!card_target_valid(-1, 3));
        assert!(!card_target_valid(0, 0));
    }
}
