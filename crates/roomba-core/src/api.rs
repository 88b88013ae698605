//! Public host-facing API contracts for embedding the VM.

use crate::encoding::Opcode;
use crate::fault::FaultCode;
use crate::instruction::Instruction;
use crate::peripheral::MAX_PERIPHERAL_COUNT;
use crate::program::{Card, Program, ProgramError};
use crate::state::{Mode, ModeId, Register, RegisterFile};

/// Top-level configuration for a VM instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Enables trace callback dispatch from [`crate::tick_traced`].
    pub tracing_enabled: bool,
    /// Number of peripheral slots `PHL` and mode offers may reach.
    ///
    /// Values above [`MAX_PERIPHERAL_COUNT`] are clamped.
    pub peripheral_slot_count: u8,
}

#[allow(clippy::cast_possible_truncation)]
const SLOT_LIMIT: u8 = MAX_PERIPHERAL_COUNT as u8;

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tracing_enabled: false,
            peripheral_slot_count: SLOT_LIMIT,
        }
    }
}

impl CoreConfig {
    /// Returns the effective slot count after clamping.
    #[must_use]
    pub fn slot_count(&self) -> u8 {
        self.peripheral_slot_count.min(SLOT_LIMIT)
    }
}

/// Complete machine state of one agent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VmState {
    /// Index of the next instruction within the current card.
    pub ip: u8,
    /// Index of the current card.
    pub card_idx: u8,
    /// Register file.
    pub registers: RegisterFile,
    /// Loaded program.
    pub program: Program,
    /// Current mode together with its data.
    pub mode: Mode,
}

impl VmState {
    /// Creates a state with `program` loaded and everything else at defaults.
    #[must_use]
    pub fn with_program(program: Program) -> Self {
        Self {
            program,
            ..Self::default()
        }
    }

    /// Reads a register.
    #[must_use]
    pub const fn register(&self, reg: Register) -> i16 {
        self.registers.get(reg)
    }

    /// Writes a register with saturation.
    pub fn set_register(&mut self, reg: Register, value: i64) {
        self.registers.set(reg, value);
    }

    /// Replaces the whole program and rewinds both pointers.
    pub fn load_program(&mut self, program: Program) {
        self.program = program;
        self.ip = 0;
        self.card_idx = 0;
    }

    /// Replaces one card of the loaded program.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::CardOutOfRange`] when the card does not exist.
    pub fn replace_card(&mut self, index: usize, card: Card) -> Result<(), ProgramError> {
        self.program.set_card(index, card)
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Replaces the current mode, in canonical form.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode.canonical();
    }

    /// Brings a mode written straight into [`VmState::mode`] into canonical
    /// form.
    pub fn canonicalize_mode(&mut self) {
        if matches!(self.mode, Mode::Other { .. }) {
            self.mode = std::mem::take(&mut self.mode).canonical();
        }
    }

    /// Hands control back to the interpreter, dropping any mode data.
    pub fn resume_executing(&mut self) {
        self.mode = Mode::Executing;
    }

    /// Instruction at the current position, if the position is valid.
    #[must_use]
    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.program
            .instruction(usize::from(self.card_idx), usize::from(self.ip))
    }

    /// Applies canonical reset semantics.
    ///
    /// Registers, pointers and mode return to defaults. The loaded program
    /// is kept.
    pub fn reset_canonical(&mut self) {
        self.ip = 0;
        self.card_idx = 0;
        self.registers.clear();
        self.mode = Mode::Executing;
    }
}

/// Result of one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// An instruction ran and its side effects were committed.
    Retired {
        /// Opcode of the retired instruction.
        opcode: Opcode,
    },
    /// No program is loaded; nothing changed.
    EmptyProgram,
    /// The current card holds no instructions; nothing else changed.
    EmptyCard,
    /// Every instruction on the card is gated off by `C`; nothing changed.
    NoEligibleInstruction,
    /// The selected instruction faulted and was skipped.
    Fault {
        /// Raised fault.
        cause: FaultCode,
    },
}

/// Result of one `tick` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickOutcome {
    /// The VM was executing and ran one `execute` step.
    Executed(StepOutcome),
    /// A peripheral recognized the current mode and handled it.
    ModeClaimed {
        /// Slot of the claiming peripheral.
        slot: u8,
    },
    /// No peripheral recognized the current mode; nothing changed.
    ModeUnclaimed,
}

/// Stop conditions for batched execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunBoundary {
    /// Stop after the first tick that changes the mode identifier.
    ModeChange,
    /// Stop after the first tick that raises a fault.
    Fault,
    /// Run until the tick limit.
    TickLimit,
}

/// Aggregated outcome from running several ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Ticks performed during this call.
    pub ticks: u32,
    /// Last tick outcome, `None` when no tick ran.
    pub last: Option<TickOutcome>,
    /// `true` when the requested boundary stopped the run before the limit.
    pub boundary_reached: bool,
}

/// Stable persisted-state version identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SnapshotVersion {
    /// Initial document layout.
    V1 = 1,
}

impl SnapshotVersion {
    /// Current version written by the encoder.
    pub const CURRENT: Self = Self::V1;

    /// Wire value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Converts a wire value to a known version.
    #[must_use]
    pub const fn from_u16(version: u16) -> Option<Self> {
        match version {
            1 => Some(Self::V1),
            _ => None,
        }
    }
}

/// Trace events emitted during a tick when tracing is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// An instruction ran to completion.
    InstructionRetired {
        /// Card the instruction lives on.
        card: u8,
        /// Position of the instruction on its card.
        ip: u8,
        /// The instruction itself.
        instruction: Instruction,
    },
    /// The conditional scan found nothing to run.
    ConditionsFailed {
        /// Card that was scanned.
        card: u8,
        /// Scan start position.
        ip: u8,
    },
    /// An instruction faulted.
    FaultRaised {
        /// Raised fault.
        cause: FaultCode,
        /// Card of the faulting instruction.
        card: u8,
        /// Position of the faulting instruction.
        ip: u8,
    },
    /// The tick left the VM in a different mode.
    ModeEntered {
        /// Identifier of the new mode.
        mode: ModeId,
    },
    /// A peripheral claimed the current mode.
    ModeClaimed {
        /// Claiming slot.
        slot: u8,
        /// Mode that was offered.
        mode: ModeId,
    },
    /// No peripheral claimed the current mode.
    ModeUnclaimed {
        /// Mode that was offered.
        mode: ModeId,
    },
}

/// Sink for trace hooks.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}
