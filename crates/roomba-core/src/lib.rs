//! Card-programmed register VM with a cooperative host mode protocol.

/// Register file and mode state primitives.
pub mod state;
pub use state::{
    saturate, Mode, ModeData, ModeId, ModeValue, Register, RegisterFile, MODE_NAMESPACE,
    REGISTER_COUNT, REGISTER_MAX, REGISTER_MIN,
};

/// Opcode table and classification.
pub mod encoding;
pub use encoding::{Opcode, OpcodeClass, OPCODE_TABLE};

/// Instructions, arguments and conditional flags.
pub mod instruction;
pub use instruction::{Argument, ConditionalFlag, Instruction};

/// Card-based program store.
pub mod program;
pub use program::{Card, Program, ProgramError, ADDRESSABLE_LIMIT, MAX_CARD_COUNT, MAX_CARD_LENGTH};

/// Runtime fault taxonomy.
pub mod fault;
pub use fault::FaultCode;

/// Public host-facing API contract and integration types.
pub mod api;
pub use api::{
    CoreConfig, RunBoundary, RunOutcome, SnapshotVersion, StepOutcome, TickOutcome, TraceEvent,
    TraceSink, VmState,
};

/// Peripheral extension-point contracts.
pub mod peripheral;
pub use peripheral::{
    NoPeripherals, Peripheral, PeripheralProvider, PeripheralSlots, MAX_PERIPHERAL_COUNT,
};

/// Instruction execution pipeline and tick driver.
pub mod execute;
pub use execute::{
    commit_execution, execute, execute_instruction, execute_with_config, run_until, tick,
    tick_traced, ExecuteState,
};

/// Built-in host recognizers for movement, rotation and sleep.
pub mod driver;
pub use driver::{drive_tick, drive_tick_traced, Activity, Chassis, DriveOutcome, PlanarChassis};

/// Reference peripherals.
pub mod peripherals;
pub use peripherals::TimerPeripheral;

/// Persisted JSON form of the VM state.
pub mod codec;
pub use codec::{decode_value, encode, from_json, to_json, CodecError, DecodeReport, DecodeWarning};

/// Program listings.
pub mod disasm;
pub use disasm::{
    disassemble_card, disassemble_instruction, disassemble_program, format_listing,
    DisassemblyRow,
};

#[cfg(test)]
use proptest as _;
