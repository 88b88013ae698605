//! Deterministic run fingerprint used for cross-host comparison.

use proptest as _;
use roomba_core::{
    drive_tick, run_until, to_json, ConditionalFlag, CoreConfig, Instruction, Opcode,
    PeripheralSlots, PlanarChassis, Program, Register, RunBoundary, TimerPeripheral, VmState,
};
use rstest as _;
use serde as _;
use serde_json as _;
use thiserror as _;

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

/// Square patrol: four legs of move then turn, counting laps in `B` and
/// waiting on the timer between laps.
fn patrol() -> VmState {
    VmState::with_program(Program::from_cards(vec![
        vec![
            Instruction::literal(Opcode::Lda, 4),
            Instruction::literal(Opcode::Rlc, 0),
            Instruction::literal(Opcode::Crd, 1),
        ],
        vec![
            Instruction::literal(Opcode::Mov, 2),
            Instruction::literal(Opcode::Rot, 90),
            Instruction::register(Opcode::Lda, Register::C),
            Instruction::literal(Opcode::Sub, 1),
            Instruction::literal(Opcode::Rlc, 0),
            Instruction::literal(Opcode::Jmp, 0).with_flag(ConditionalFlag::Pos),
            Instruction::literal(Opcode::Lda, 3).with_flag(ConditionalFlag::Equ),
            Instruction::literal(Opcode::Rld, 0),
            Instruction::literal(Opcode::Phl, 0),
            Instruction::literal(Opcode::Crd, 0),
        ],
    ]))
}

fn fingerprint() -> String {
    let config = CoreConfig::default();
    let mut slots = PeripheralSlots::new().with(0, Box::new(TimerPeripheral::new()));
    let mut chassis = PlanarChassis::default();
    let mut state = patrol();

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for _ in 0..600 {
        let outcome = drive_tick(&mut state, &mut chassis, &mut slots, &config);
        hash_bytes(&mut hash, format!("{outcome:?}").as_bytes());
    }

    let mut scratch = patrol();
    let run = run_until(
        &mut scratch,
        &mut slots,
        &config,
        RunBoundary::TickLimit,
        64,
    );
    hash_bytes(&mut hash, &run.ticks.to_le_bytes());

    for value in [chassis.x, chassis.z, chassis.heading] {
        hash_bytes(&mut hash, &value.to_bits().to_le_bytes());
    }
    for state in [&state, &scratch] {
        match to_json(state) {
            Ok(text) => hash_bytes(&mut hash, text.as_bytes()),
            Err(err) => {
                eprintln!("fingerprint: {err}");
                std::process::exit(1);
            }
        }
    }

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
