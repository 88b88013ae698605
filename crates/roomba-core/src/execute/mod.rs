//! Instruction execution pipeline and tick driver.
//!
//! One `execute` call performs one instruction transition:
//! 1. Conditional scan from `ip` for the first eligible instruction
//! 2. Argument resolution
//! 3. Dispatch, gathering side effects into an [`ExecuteState`]
//! 4. Commit of register, mode and card writes
//! 5. Pointer advance and normalization
//!
//! A faulting instruction commits nothing except the pointer advance.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::similar_names,
    unknown_lints,
    missing_docs
)]

mod helpers;

pub use helpers::{
    card_target_valid, clamp_jump, floor_mod, narrow, normalize_pointers, select_instruction,
    Selection,
};

use crate::encoding::Opcode;
use crate::fault::FaultCode;
use crate::instruction::Instruction;
use crate::peripheral::PeripheralProvider;
use crate::state::{Mode, Register, REGISTER_COUNT};
use crate::{
    CoreConfig, RunBoundary, RunOutcome, StepOutcome, TickOutcome, TraceEvent, TraceSink, VmState,
};

/// Side effects accumulated while dispatching one instruction.
///
/// Nothing here touches [`VmState`] until [`commit_execution`] runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteState {
    /// Position the selected instruction was found at.
    pub selected_ip: u8,
    /// Pending register writes, indexed by [`Register::index`].
    pub register_writes: [Option<i64>; REGISTER_COUNT],
    /// Instruction pointer before advance and normalization.
    pub next_ip: i64,
    /// Card to switch to.
    pub next_card: Option<u8>,
    /// Whether the pointer moves past the instruction.
    pub advance: bool,
    /// Mode to enter.
    pub mode: Option<Mode>,
    /// Raw `PHL` slot argument, dispatched before commit.
    pub peripheral_slot: Option<i16>,
    /// Fault raised during dispatch.
    pub fault: Option<FaultCode>,
}

impl ExecuteState {
    /// Creates a pending state for the instruction at `selected_ip`.
    ///
    /// Defaults to resuming at the instruction and advancing past it.
    #[must_use]
    pub fn new(selected_ip: u8) -> Self {
        Self {
            selected_ip,
            register_writes: [None; REGISTER_COUNT],
            next_ip: i64::from(selected_ip),
            next_card: None,
            advance: true,
            mode: None,
            peripheral_slot: None,
            fault: None,
        }
    }

    fn write(&mut self, reg: Register, value: i64) {
        self.register_writes[reg.index()] = Some(value);
    }
}

/// Dispatches one already selected instruction against `state`.
///
/// `state` is only read. The returned pending effects are applied by
/// [`commit_execution`].
#[must_use]
pub fn execute_instruction(instr: &Instruction, selected_ip: u8, state: &VmState) -> ExecuteState {
    let mut exec = ExecuteState::new(selected_ip);
    let arg = i64::from(instr.argument.resolve(&state.registers));
    let a = i64::from(state.register(Register::A));

    match instr.opcode {
        Opcode::Add => exec.write(Register::A, a + arg),
        Opcode::Sub => exec.write(Register::A, a - arg),
        Opcode::Mul => exec.write(Register::A, a * arg),
        Opcode::Dvm => execute_dvm(&mut exec, a, arg),
        Opcode::Jmp => execute_jump(&mut exec, state, arg),
        Opcode::Jby => execute_jump(&mut exec, state, i64::from(selected_ip) + arg),
        Opcode::Crd => execute_card(&mut exec, state, instr, true),
        Opcode::Crj => execute_card(&mut exec, state, instr, false),
        Opcode::Lda => exec.write(Register::A, arg),
        Opcode::Rlb => execute_roll(&mut exec, Register::B, a, arg),
        Opcode::Rlc => execute_roll(&mut exec, Register::C, a, arg),
        Opcode::Rld => execute_roll(&mut exec, Register::D, a, arg),
        Opcode::Mov | Opcode::Rot | Opcode::Slp => {
            exec.mode = Some(start_mode(instr.opcode, instr.argument.resolve(&state.registers)));
        }
        Opcode::Phl => {
            exec.peripheral_slot = Some(instr.argument.resolve(&state.registers));
        }
    }

    exec
}

fn execute_dvm(exec: &mut ExecuteState, a: i64, divisor: i64) {
    if divisor == 0 {
        exec.fault = Some(FaultCode::DivideByZero);
        return;
    }
    exec.write(Register::A, a / divisor);
    exec.write(Register::B, a % divisor);
}

fn execute_jump(exec: &mut ExecuteState, state: &VmState, target: i64) {
    let len = state.program.card_len(usize::from(state.card_idx));
    exec.next_ip = clamp_jump(target, len);
    exec.advance = false;
}

fn execute_card(exec: &mut ExecuteState, state: &VmState, instr: &Instruction, rewind: bool) {
    exec.advance = false;
    let target = instr.argument.resolve(&state.registers);
    if !card_target_valid(target, state.program.card_count()) {
        return;
    }
    exec.next_card = Some(narrow(i64::from(target)));
    if rewind {
        exec.next_ip = 0;
    }
}

fn execute_roll(exec: &mut ExecuteState, backup: Register, a: i64, arg: i64) {
    exec.write(backup, a);
    exec.write(Register::A, arg);
}

fn start_mode(opcode: Opcode, magnitude: i16) -> Mode {
    match opcode {
        Opcode::Mov => Mode::MoveStart {
            distance: magnitude,
        },
        Opcode::Rot => Mode::RotateStart { angle: magnitude },
        _ => Mode::SleepStart { ticks: magnitude },
    }
}

/// Applies pending effects, then advances and normalizes both pointers.
///
/// A faulted dispatch only advances the pointer.
pub fn commit_execution(state: &mut VmState, exec: &ExecuteState) {
    if exec.fault.is_none() {
        for reg in Register::ALL {
            if let Some(value) = exec.register_writes[reg.index()] {
                state.set_register(reg, value);
            }
        }
        if let Some(mode) = &exec.mode {
            state.set_mode(mode.clone());
        }
        if let Some(card) = exec.next_card {
            state.card_idx = card;
        }
    }

    let ip = exec.next_ip + i64::from(exec.advance);
    normalize_pointers(state, ip);
}

/// Runs exactly one instruction transition with the default configuration.
pub fn execute(state: &mut VmState, peripherals: &mut dyn PeripheralProvider) -> StepOutcome {
    step(state, peripherals, &CoreConfig::default(), &mut None)
}

/// Runs exactly one instruction transition honoring `config`.
pub fn execute_with_config(
    state: &mut VmState,
    peripherals: &mut dyn PeripheralProvider,
    config: &CoreConfig,
) -> StepOutcome {
    step(state, peripherals, config, &mut None)
}

type Trace<'a> = Option<&'a mut dyn TraceSink>;

fn emit(trace: &mut Trace<'_>, event: impl FnOnce() -> TraceEvent) {
    if let Some(sink) = trace {
        sink.on_event(event());
    }
}

fn step(
    state: &mut VmState,
    peripherals: &mut dyn PeripheralProvider,
    config: &CoreConfig,
    trace: &mut Trace<'_>,
) -> StepOutcome {
    if state.program.is_empty() {
        return StepOutcome::EmptyProgram;
    }
    if usize::from(state.card_idx) >= state.program.card_count() {
        state.card_idx = 0;
    }

    let card = state.card_idx;
    let start = usize::from(state.ip);
    let c = state.register(Register::C);
    let selection = match state.program.card(usize::from(card)) {
        Some(instructions) => select_instruction(instructions, start, c),
        None => Selection::EmptyCard,
    };

    let (index, instruction) = match selection {
        Selection::EmptyCard => return StepOutcome::EmptyCard,
        Selection::NoneEligible => {
            emit(trace, || TraceEvent::ConditionsFailed {
                card,
                ip: state.ip,
            });
            return StepOutcome::NoEligibleInstruction;
        }
        Selection::Selected { index, instruction } => (narrow(index as i64), instruction),
    };

    let mut exec = execute_instruction(&instruction, index, state);

    if let Some(slot) = exec.peripheral_slot {
        state.ip = index;
        exec.advance = dispatch_phl(state, peripherals, config, slot);
        exec.next_ip = i64::from(state.ip);
    }

    commit_execution(state, &exec);

    match exec.fault {
        Some(cause) => {
            emit(trace, || TraceEvent::FaultRaised {
                cause,
                card,
                ip: index,
            });
            StepOutcome::Fault { cause }
        }
        None => {
            emit(trace, || TraceEvent::InstructionRetired {
                card,
                ip: index,
                instruction,
            });
            StepOutcome::Retired {
                opcode: instruction.opcode,
            }
        }
    }
}

/// Invokes the peripheral named by a `PHL` argument.
///
/// Returns whether the pointer should advance. Slots outside the configured
/// range or without a peripheral always advance.
fn dispatch_phl(
    state: &mut VmState,
    peripherals: &mut dyn PeripheralProvider,
    config: &CoreConfig,
    slot: i16,
) -> bool {
    let Some(slot) = u8::try_from(slot)
        .ok()
        .filter(|slot| *slot < config.slot_count())
    else {
        return true;
    };

    match peripherals.peripheral(slot) {
        Some(peripheral) => peripheral.execute_phl(state),
        None => true,
    }
}

/// Advances the VM by one tick.
///
/// While executing this runs one instruction. In any other mode the current
/// mode is offered to each present peripheral in slot order until one claims
/// it; an unclaimed mode leaves the state untouched.
pub fn tick(
    state: &mut VmState,
    peripherals: &mut dyn PeripheralProvider,
    config: &CoreConfig,
) -> TickOutcome {
    run_tick(state, peripherals, config, &mut None)
}

/// [`tick`] with trace hooks, dispatched only when
/// [`CoreConfig::tracing_enabled`] is set.
pub fn tick_traced(
    state: &mut VmState,
    peripherals: &mut dyn PeripheralProvider,
    config: &CoreConfig,
    sink: &mut dyn TraceSink,
) -> TickOutcome {
    if config.tracing_enabled {
        run_tick(state, peripherals, config, &mut Some(sink))
    } else {
        run_tick(state, peripherals, config, &mut None)
    }
}

fn run_tick(
    state: &mut VmState,
    peripherals: &mut dyn PeripheralProvider,
    config: &CoreConfig,
    trace: &mut Trace<'_>,
) -> TickOutcome {
    state.canonicalize_mode();
    let mode_before = trace.is_some().then(|| state.mode.id());

    let outcome = if state.mode.is_executing() {
        TickOutcome::Executed(step(state, peripherals, config, trace))
    } else {
        offer_mode(state, peripherals, config, trace)
    };

    if let Some(before) = mode_before {
        let after = state.mode.id();
        if after != before {
            emit(trace, || TraceEvent::ModeEntered { mode: after });
        }
    }

    outcome
}

fn offer_mode(
    state: &mut VmState,
    peripherals: &mut dyn PeripheralProvider,
    config: &CoreConfig,
    trace: &mut Trace<'_>,
) -> TickOutcome {
    let offered = trace.is_some().then(|| state.mode.id());

    for slot in 0..config.slot_count() {
        let Some(peripheral) = peripherals.peripheral(slot) else {
            continue;
        };
        if peripheral.tick_mode(state) {
            if let Some(mode) = offered {
                emit(trace, || TraceEvent::ModeClaimed { slot, mode });
            }
            return TickOutcome::ModeClaimed { slot };
        }
    }

    if let Some(mode) = offered {
        emit(trace, || TraceEvent::ModeUnclaimed { mode });
    }
    TickOutcome::ModeUnclaimed
}

/// Runs ticks until `boundary` is hit or `max_ticks` ticks have run.
pub fn run_until(
    state: &mut VmState,
    peripherals: &mut dyn PeripheralProvider,
    config: &CoreConfig,
    boundary: RunBoundary,
    max_ticks: u32,
) -> RunOutcome {
    let mut outcome = RunOutcome {
        ticks: 0,
        last: None,
        boundary_reached: false,
    };

    while outcome.ticks < max_ticks {
        let mode_before = (boundary == RunBoundary::ModeChange).then(|| state.mode.id());
        let last = tick(state, peripherals, config);
        outcome.ticks += 1;
        outcome.last = Some(last);

        let reached = match boundary {
            RunBoundary::ModeChange => mode_before.is_some_and(|before| before != state.mode.id()),
            RunBoundary::Fault => matches!(last, TickOutcome::Executed(StepOutcome::Fault { .. })),
            RunBoundary::TickLimit => false,
        };
        if reached {
            outcome.boundary_reached = true;
            break;
        }
    }

    outcome
}
