use std::path::Path;

use roomba_asm::assemble_source;
use roomba_core::{
    drive_tick, format_listing, from_json, to_json, Activity, CoreConfig, DriveOutcome,
    PeripheralSlots, PlanarChassis, Register, StepOutcome, TickOutcome, TimerPeripheral, VmState,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

macro_rules! console_log {
    ($($t:tt)*) => (log(&format!($($t)*)))
}

/// JS-compatible version of `DriveOutcome`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WasmTickOutcome {
    Started { activity: String },
    Progressed { activity: String },
    Finished { activity: String },
    Retired { opcode: String },
    EmptyProgram,
    EmptyCard,
    NoEligibleInstruction,
    Fault { cause: String },
    ModeClaimed { slot: u8 },
    ModeUnclaimed,
}

impl From<DriveOutcome> for WasmTickOutcome {
    fn from(outcome: DriveOutcome) -> Self {
        match outcome {
            DriveOutcome::Started(activity) => Self::Started {
                activity: activity_name(activity).to_string(),
            },
            DriveOutcome::Progressed(activity) => Self::Progressed {
                activity: activity_name(activity).to_string(),
            },
            DriveOutcome::Finished(activity) => Self::Finished {
                activity: activity_name(activity).to_string(),
            },
            DriveOutcome::Core(TickOutcome::Executed(step)) => match step {
                StepOutcome::Retired { opcode } => Self::Retired {
                    opcode: opcode.mnemonic().to_string(),
                },
                StepOutcome::EmptyProgram => Self::EmptyProgram,
                StepOutcome::EmptyCard => Self::EmptyCard,
                StepOutcome::NoEligibleInstruction => Self::NoEligibleInstruction,
                StepOutcome::Fault { cause } => Self::Fault {
                    cause: cause.to_string(),
                },
            },
            DriveOutcome::Core(TickOutcome::ModeClaimed { slot }) => Self::ModeClaimed { slot },
            DriveOutcome::Core(TickOutcome::ModeUnclaimed) => Self::ModeUnclaimed,
        }
    }
}

const fn activity_name(activity: Activity) -> &'static str {
    match activity {
        Activity::Moving => "moving",
        Activity::Turning => "turning",
        Activity::Sleeping => "sleeping",
    }
}

/// JS-compatible view of the VM and its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasmSnapshot {
    pub ip: u8,
    pub card_idx: u8,
    pub registers: [i16; 4],
    pub mode: String,
    pub x: f64,
    pub z: f64,
    pub heading: f64,
    pub ticks: u64,
}

/// A VM instance with a simulated body and a timer in peripheral slot 0.
#[wasm_bindgen]
pub struct WasmRoomba {
    state: VmState,
    chassis: PlanarChassis,
    peripherals: PeripheralSlots,
    config: CoreConfig,
    ticks: u64,
}

impl Default for WasmRoomba {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl WasmRoomba {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        console_error_panic_hook::set_once();
        Self {
            state: VmState::default(),
            chassis: PlanarChassis::default(),
            peripherals: default_peripherals(),
            config: CoreConfig::default(),
            ticks: 0,
        }
    }

    /// Assembles card source and loads it into a fresh state.
    /// Set `literate` for Markdown with fenced `cards` blocks.
    /// Returns the assembler warnings as an array of strings.
    pub fn load_source(&mut self, source: &str, literate: bool) -> Result<js_sys::Array, JsError> {
        let warnings = self.assemble_into(source, literate).map_err(|e| JsError::new(&e))?;
        console_log!(
            "Loaded {} cards",
            self.state.program.card_count()
        );
        Ok(string_array(&warnings))
    }

    /// Loads a saved state document leniently.
    /// Returns the decode warnings as an array of strings.
    pub fn load_state(&mut self, json: &str) -> js_sys::Array {
        let warnings = self.restore(json);
        for warning in &warnings {
            web_sys::console::warn_1(&JsValue::from_str(warning));
        }
        string_array(&warnings)
    }

    /// Serializes the VM state to its persisted JSON form.
    pub fn save_state(&self) -> Result<String, JsError> {
        to_json(&self.state).map_err(|e| JsError::new(&e.to_string()))
    }

    /// Runs `count` host ticks and returns the last outcome.
    pub fn tick(&mut self, count: u32) -> Result<JsValue, JsValue> {
        let outcome = self.run_ticks(count);
        Ok(serde_wasm_bindgen::to_value(&outcome)?)
    }

    /// Returns registers, pointers, mode and body position.
    pub fn get_state(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.snapshot())?)
    }

    /// Returns the program listing with the current instruction marked.
    pub fn get_listing(&self) -> String {
        format_listing(&self.state)
    }

    /// Resets the VM, body and peripherals. The program is kept.
    pub fn reset(&mut self) {
        let program = std::mem::take(&mut self.state.program);
        self.state = VmState::with_program(program);
        self.chassis = PlanarChassis::default();
        self.peripherals = default_peripherals();
        self.ticks = 0;
    }
}

impl WasmRoomba {
    fn assemble_into(&mut self, source: &str, literate: bool) -> Result<Vec<String>, String> {
        let name = if literate { "input.md" } else { "input.cards" };
        let assembly =
            assemble_source(Path::new(name), source).map_err(|e| e.format_for_stderr())?;
        let warnings = assembly
            .warnings
            .iter()
            .map(roomba_asm::AssembleWarning::format_for_stderr)
            .collect();
        self.state = assembly.into_state();
        self.reset();
        Ok(warnings)
    }

    fn restore(&mut self, json: &str) -> Vec<String> {
        let report = from_json(json);
        self.state = report.state;
        self.chassis = PlanarChassis::default();
        self.peripherals = default_peripherals();
        self.ticks = 0;
        report.warnings.iter().map(ToString::to_string).collect()
    }

    fn run_ticks(&mut self, count: u32) -> Option<WasmTickOutcome> {
        let mut last = None;
        for _ in 0..count {
            let outcome = drive_tick(
                &mut self.state,
                &mut self.chassis,
                &mut self.peripherals,
                &self.config,
            );
            self.ticks += 1;
            last = Some(WasmTickOutcome::from(outcome));
        }
        last
    }

    fn snapshot(&self) -> WasmSnapshot {
        WasmSnapshot {
            ip: self.state.ip,
            card_idx: self.state.card_idx,
            registers: Register::ALL.map(|reg| self.state.register(reg)),
            mode: self.state.mode.id().to_string(),
            x: self.chassis.x,
            z: self.chassis.z,
            heading: self.chassis.heading,
            ticks: self.ticks,
        }
    }
}

fn default_peripherals() -> PeripheralSlots {
    PeripheralSlots::new().with(0, Box::new(TimerPeripheral::new()))
}

fn string_array(items: &[String]) -> js_sys::Array {
    items.iter().map(|s| JsValue::from_str(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembled_program_runs_from_the_start() {
        let mut roomba = WasmRoomba::new();
        let warnings = roomba
            .assemble_into("LDA 4\nADD 3\nSLP 2\n", false)
            .expect("assembles");
        assert!(warnings.is_empty());

        assert_eq!(
            roomba.run_ticks(2),
            Some(WasmTickOutcome::Retired {
                opcode: "ADD".into()
            })
        );
        let snapshot = roomba.snapshot();
        assert_eq!(snapshot.registers, [7, 0, 0, 0]);
        assert_eq!(snapshot.ip, 2);
        assert_eq!(snapshot.ticks, 2);
    }

    #[test]
    fn movement_is_reported_through_the_snapshot() {
        let mut roomba = WasmRoomba::new();
        roomba.assemble_into("MOV 1\n", false).expect("assembles");

        assert_eq!(
            roomba.run_ticks(1),
            Some(WasmTickOutcome::Retired {
                opcode: "MOV".into()
            })
        );
        assert_eq!(roomba.snapshot().mode, "roombas:move/start");
        assert_eq!(
            roomba.run_ticks(1),
            Some(WasmTickOutcome::Started {
                activity: "moving".into()
            })
        );
        roomba.run_ticks(1);
        assert!(roomba.snapshot().x > 0.0);
    }

    #[test]
    fn assembly_errors_are_reported_with_location() {
        let mut roomba = WasmRoomba::new();
        let error = roomba.assemble_into("FOO 1\n", false).expect_err("bad mnemonic");
        assert_eq!(error, "input.cards:1:1: error: unknown mnemonic: FOO");
    }

    #[test]
    fn literate_source_is_extracted() {
        let mut roomba = WasmRoomba::new();
        roomba
            .assemble_into("# Demo\n\n```cards\nLDA 9\n```\n", true)
            .expect("assembles");
        assert!(roomba.get_listing().contains("LDA 9"));
    }

    #[test]
    fn saved_state_restores() {
        let mut roomba = WasmRoomba::new();
        roomba.assemble_into("LDA 4\nADD 3\n", false).expect("assembles");
        roomba.run_ticks(1);
        let saved = roomba.save_state().expect("encodes");

        let mut other = WasmRoomba::new();
        assert!(other.restore(&saved).is_empty());
        assert_eq!(other.snapshot().registers, [4, 0, 0, 0]);
        assert_eq!(other.snapshot().ip, 1);
        assert_eq!(other.get_listing(), roomba.get_listing());
    }

    #[test]
    fn malformed_state_loads_with_warnings() {
        let mut roomba = WasmRoomba::new();
        let warnings = roomba.restore("{\"ip\": \"one\"}");
        assert!(!warnings.is_empty());
        assert_eq!(roomba.snapshot().ip, 0);
    }

    #[test]
    fn reset_keeps_the_program() {
        let mut roomba = WasmRoomba::new();
        roomba.assemble_into("LDA 4\n", false).expect("assembles");
        roomba.run_ticks(3);
        roomba.reset();

        let snapshot = roomba.snapshot();
        assert_eq!(snapshot.registers, [0, 0, 0, 0]);
        assert_eq!(snapshot.ticks, 0);
        assert_eq!(roomba.state.program.card_count(), 1);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let roomba = WasmRoomba::new();
        let value = serde_json::to_value(roomba.snapshot()).expect("serializes");
        assert_eq!(value["cardIdx"], 0);
        assert_eq!(value["mode"], "roombas:executing");

        let outcome = serde_json::to_value(WasmTickOutcome::ModeClaimed { slot: 0 })
            .expect("serializes");
        assert_eq!(outcome, serde_json::json!({"kind": "ModeClaimed", "slot": 0}));
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn ticks_through_the_js_boundary() {
        let mut roomba = WasmRoomba::new();
        let warnings = roomba.load_source("LDA 2\n", false).expect("assembles");
        assert_eq!(warnings.length(), 0);

        let outcome: WasmTickOutcome =
            serde_wasm_bindgen::from_value(roomba.tick(1).expect("ticks")).expect("decodes");
        assert_eq!(
            outcome,
            WasmTickOutcome::Retired {
                opcode: "LDA".into()
            }
        );

        let snapshot: WasmSnapshot =
            serde_wasm_bindgen::from_value(roomba.get_state().expect("state")).expect("decodes");
        assert_eq!(snapshot.registers[0], 2);
    }
}
