#![no_main]

use libfuzzer_sys::fuzz_target;
use roomba_core::{
    decode_value, encode, run_until, Argument, ConditionalFlag, CoreConfig, Instruction,
    PeripheralSlots, Program, Register, RunBoundary, TimerPeripheral, VmState, MAX_CARD_LENGTH,
    OPCODE_TABLE,
};

/// Three bytes per instruction: opcode, argument, flag/argument-kind bits.
fn instruction(bytes: &[u8]) -> Instruction {
    let (_, opcode, _) = OPCODE_TABLE[usize::from(bytes[0]) % OPCODE_TABLE.len()];
    let argument = if bytes[2] & 0x80 == 0 {
        Argument::Literal(i16::from(bytes[1] as i8) * 8)
    } else {
        Argument::Register(Register::ALL[usize::from(bytes[1] & 0x03)])
    };
    let flag = match bytes[2] & 0x03 {
        0 => None,
        other => Some(ConditionalFlag::ALL[usize::from(other - 1)]),
    };
    Instruction {
        opcode,
        argument,
        flag,
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let card_len = usize::from(data[0] % 8) + 1;
    let cards: Vec<Vec<Instruction>> = data[1..]
        .chunks_exact(3)
        .map(instruction)
        .collect::<Vec<_>>()
        .chunks(card_len.min(MAX_CARD_LENGTH))
        .map(<[Instruction]>::to_vec)
        .collect();

    let mut state = VmState::with_program(Program::from_cards(cards));
    let mut slots = PeripheralSlots::new().with(0, Box::new(TimerPeripheral::new()));
    let config = CoreConfig::default();

    let _ = run_until(&mut state, &mut slots, &config, RunBoundary::Fault, 256);

    let card = usize::from(state.card_idx);
    if !state.program.is_empty() {
        assert!(card < state.program.card_count());
        assert!(usize::from(state.ip) < state.program.card_len(card).max(1));
    }

    if let Ok(value) = encode(&state) {
        assert_eq!(decode_value(&value).state, state);
    }
});
