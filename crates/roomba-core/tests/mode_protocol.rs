//! Mode handoff between the interpreter, peripherals and the host driver.

use proptest as _;
use roomba_core::{
    drive_tick, run_until, tick, tick_traced, Activity, ConditionalFlag, CoreConfig, DriveOutcome,
    FaultCode, Instruction, Mode, ModeData, ModeId, NoPeripherals, Opcode, Peripheral,
    PeripheralSlots, PlanarChassis, Program, Register, RunBoundary, StepOutcome, TickOutcome,
    TimerPeripheral, TraceEvent, VmState,
};
use rstest as _;
use serde as _;
use serde_json as _;
use thiserror as _;

fn lit(opcode: Opcode, value: i16) -> Instruction {
    Instruction::literal(opcode, value)
}

fn program(cards: Vec<Vec<Instruction>>) -> VmState {
    VmState::with_program(Program::from_cards(cards))
}

#[test]
fn mov_enters_start_mode_and_advances() {
    let mut state = program(vec![vec![lit(Opcode::Mov, 5), lit(Opcode::Add, 1)]]);

    let outcome = tick(&mut state, &mut NoPeripherals, &CoreConfig::default());

    assert_eq!(
        outcome,
        TickOutcome::Executed(StepOutcome::Retired { opcode: Opcode::Mov })
    );
    assert_eq!(state.mode, Mode::MoveStart { distance: 5 });
    assert_eq!(state.mode.id(), ModeId::roombas("move/start"));
    assert_eq!(state.mode.data().int("distance"), Some(5));
    assert_eq!(state.ip, 1);
}

#[test]
fn non_executing_mode_never_runs_instructions() {
    let mut state = program(vec![vec![lit(Opcode::Add, 1)]]);
    state.set_mode(Mode::MoveStart { distance: 3 });
    let before = state.clone();

    for _ in 0..5 {
        let outcome = tick(&mut state, &mut NoPeripherals, &CoreConfig::default());
        assert_eq!(outcome, TickOutcome::ModeUnclaimed);
    }

    assert_eq!(state, before);
}

/// Claims `drill:spin` for a fixed number of ticks, counting down in mode
/// data, and starts it on `PHL`.
struct Drill;

impl Peripheral for Drill {
    fn execute_phl(&mut self, vm: &mut VmState) -> bool {
        let data = ModeData::new().with_int("left", 2);
        vm.set_mode(Mode::other(ModeId::new("drill", "spin"), data));
        true
    }

    fn tick_mode(&mut self, vm: &mut VmState) -> bool {
        if vm.mode.id() != ModeId::new("drill", "spin") {
            return false;
        }
        let left = vm.mode.data().int("left").unwrap_or(0);
        if left <= 1 {
            vm.resume_executing();
        } else {
            let data = ModeData::new().with_int("left", left - 1);
            vm.set_mode(Mode::other(ModeId::new("drill", "spin"), data));
        }
        true
    }
}

#[test]
fn peripheral_claims_its_own_mode_until_done() {
    let mut state = program(vec![vec![lit(Opcode::Phl, 1), lit(Opcode::Add, 1)]]);
    let mut slots = PeripheralSlots::new()
        .with(0, Box::new(TimerPeripheral::new()))
        .with(1, Box::new(Drill));
    let config = CoreConfig::default();

    tick(&mut state, &mut slots, &config);
    assert_eq!(state.mode.id(), ModeId::new("drill", "spin"));
    assert_eq!(state.ip, 1);

    assert_eq!(
        tick(&mut state, &mut slots, &config),
        TickOutcome::ModeClaimed { slot: 1 }
    );
    assert_eq!(
        tick(&mut state, &mut slots, &config),
        TickOutcome::ModeClaimed { slot: 1 }
    );
    assert!(state.mode.is_executing());
    assert_eq!(state.register(Register::A), 0);

    tick(&mut state, &mut slots, &config);
    assert_eq!(state.register(Register::A), 1);
}

#[test]
fn timer_wait_blocks_for_d_ticks_then_reports() {
    let mut state = program(vec![vec![
        lit(Opcode::Lda, 3),
        lit(Opcode::Rld, 0),
        lit(Opcode::Phl, 0),
        lit(Opcode::Rld, 0),
        lit(Opcode::Phl, 0),
        lit(Opcode::Slp, 100),
    ]]);
    let mut slots = PeripheralSlots::new().with(0, Box::new(TimerPeripheral::new()));

    let run = run_until(
        &mut state,
        &mut slots,
        &CoreConfig::default(),
        RunBoundary::ModeChange,
        50,
    );
    assert!(run.boundary_reached);
    assert_eq!(run.ticks, 3);
    assert_eq!(state.mode.id(), ModeId::roombas("timer/wait"));

    let run = run_until(
        &mut state,
        &mut slots,
        &CoreConfig::default(),
        RunBoundary::ModeChange,
        50,
    );
    assert_eq!(run.ticks, 3);
    assert!(state.mode.is_executing());

    let run = run_until(
        &mut state,
        &mut slots,
        &CoreConfig::default(),
        RunBoundary::ModeChange,
        50,
    );
    assert_eq!(run.ticks, 3);
    assert_eq!(state.mode, Mode::SleepStart { ticks: 100 });
    assert_eq!(state.register(Register::A), 1);
}

#[test]
fn reduced_slot_count_hides_later_peripherals() {
    let mut state = program(vec![vec![lit(Opcode::Add, 1)]]);
    state.set_mode(Mode::other(ModeId::new("drill", "spin"), ModeData::new()));
    let mut slots = PeripheralSlots::new().with(3, Box::new(Drill));
    let config = CoreConfig {
        peripheral_slot_count: 3,
        ..CoreConfig::default()
    };

    assert_eq!(tick(&mut state, &mut slots, &config), TickOutcome::ModeUnclaimed);
    assert_eq!(
        tick(&mut state, &mut slots, &CoreConfig::default()),
        TickOutcome::ModeClaimed { slot: 3 }
    );
}

#[test]
fn driver_runs_full_move_cycle_then_resumes_program() {
    let mut state = program(vec![vec![lit(Opcode::Mov, 1), lit(Opcode::Lda, 9)]]);
    let mut chassis = PlanarChassis::default();
    let config = CoreConfig::default();
    let mut outcomes = Vec::new();

    for _ in 0..20 {
        outcomes.push(drive_tick(&mut state, &mut chassis, &mut NoPeripherals, &config));
        if state.register(Register::A) == 9 {
            break;
        }
    }

    assert_eq!(
        outcomes.first(),
        Some(&DriveOutcome::Core(TickOutcome::Executed(
            StepOutcome::Retired { opcode: Opcode::Mov }
        )))
    );
    assert_eq!(outcomes[1], DriveOutcome::Started(Activity::Moving));
    assert!(outcomes.contains(&DriveOutcome::Finished(Activity::Moving)));
    assert!((chassis.x - 1.0).abs() < 1e-6);
    assert_eq!(state.register(Register::A), 9);
}

#[test]
fn driver_leaves_foreign_modes_to_peripherals() {
    let mut state = program(vec![vec![lit(Opcode::Add, 1)]]);
    state.set_mode(Mode::other(ModeId::new("drill", "spin"), ModeData::new()));
    let mut slots = PeripheralSlots::new().with(2, Box::new(Drill));

    let outcome = drive_tick(
        &mut state,
        &mut PlanarChassis::default(),
        &mut slots,
        &CoreConfig::default(),
    );

    assert_eq!(outcome, DriveOutcome::Core(TickOutcome::ModeClaimed { slot: 2 }));
}

#[test]
fn trace_reports_fault_then_scan_failure() {
    let mut state = program(vec![vec![
        lit(Opcode::Dvm, 0).with_flag(ConditionalFlag::Equ),
        lit(Opcode::Add, 1).with_flag(ConditionalFlag::Neg),
    ]]);
    let config = CoreConfig {
        tracing_enabled: true,
        ..CoreConfig::default()
    };
    let mut events: Vec<TraceEvent> = Vec::new();

    tick_traced(&mut state, &mut NoPeripherals, &config, &mut events);
    state.set_register(Register::C, 1);
    tick_traced(&mut state, &mut NoPeripherals, &config, &mut events);

    assert_eq!(
        events,
        vec![
            TraceEvent::FaultRaised {
                cause: FaultCode::DivideByZero,
                card: 0,
                ip: 0,
            },
            TraceEvent::ConditionsFailed { card: 0, ip: 1 },
        ]
    );
}

/// Hands control back by writing the executing identifier straight into the
/// mode field.
struct Beacon;

impl Peripheral for Beacon {
    fn execute_phl(&mut self, _vm: &mut VmState) -> bool {
        true
    }

    fn tick_mode(&mut self, vm: &mut VmState) -> bool {
        if vm.mode.id() != ModeId::new("beacon", "ping") {
            return false;
        }
        vm.mode = Mode::Other {
            id: ModeId::roombas("executing"),
            data: ModeData::new(),
        };
        true
    }
}

#[test]
fn executing_id_written_by_a_peripheral_resumes_the_interpreter() {
    let mut state = program(vec![vec![lit(Opcode::Add, 1)]]);
    state.set_mode(Mode::other(ModeId::new("beacon", "ping"), ModeData::new()));
    let mut slots = PeripheralSlots::new().with(0, Box::new(Beacon));
    let config = CoreConfig::default();

    assert_eq!(
        tick(&mut state, &mut slots, &config),
        TickOutcome::ModeClaimed { slot: 0 }
    );
    for _ in 0..5 {
        tick(&mut state, &mut slots, &config);
    }

    assert!(state.mode.is_executing());
    assert_eq!(state.register(Register::A), 5);
}
