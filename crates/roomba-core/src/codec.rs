//! Persistent JSON form of [`VmState`].
//!
//! Encoding is exact. Decoding is lenient field by field: anything malformed
//! falls back to its default and is reported as a [`DecodeWarning`], so a
//! damaged document always yields a runnable state.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::api::{SnapshotVersion, VmState};
use crate::encoding::Opcode;
use crate::instruction::{Argument, ConditionalFlag, Instruction};
use crate::program::Program;
use crate::state::{saturate, Mode, ModeData, ModeId, ModeValue, Register};

const FIELD_VERSION: &str = "version";
const FIELD_IP: &str = "ip";
const FIELD_CARD_IDX: &str = "cardIdx";
const FIELD_CARDS: &str = "cards";
const FIELD_REGISTERS: &str = "registers";
const FIELD_MODE: &str = "mode";
const FIELD_MODE_DATA: &str = "modeData";
const FIELD_OPCODE: &str = "opcode";
const FIELD_ARGUMENT: &str = "argument";
const FIELD_FLAG: &str = "flag";

/// Failure while producing the persisted form.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The JSON serializer rejected the document.
    #[error("failed to serialize VM state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Soft diagnostics produced by lenient decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeWarning {
    /// The input was not parseable JSON.
    #[error("document is not valid JSON ({message}); loaded default state")]
    NotJson {
        /// Parser message.
        message: String,
    },
    /// The top-level value was not an object.
    #[error("document is not a JSON object; loaded default state")]
    NotAnObject,
    /// The document declared a version this build does not know.
    #[error("unknown document version {version}; loading anyway")]
    UnknownVersion {
        /// Declared version.
        version: i64,
    },
    /// A top-level field had the wrong shape and was replaced by its default.
    #[error("field `{field}` is malformed; using default")]
    MalformedField {
        /// Wire name of the field.
        field: &'static str,
    },
    /// A register value was outside the representable range.
    #[error("register {register} value {value} saturated")]
    RegisterSaturated {
        /// Affected register.
        register: Register,
        /// Value found in the document.
        value: i64,
    },
    /// An instruction named an unknown opcode; the whole program was dropped.
    #[error("card {card} instruction {index}: unknown opcode `{name}`; program discarded")]
    UnknownOpcode {
        /// Card index.
        card: usize,
        /// Instruction index.
        index: usize,
        /// Name found in the document, empty when missing.
        name: String,
    },
    /// An argument was missing or malformed and became literal `0`.
    #[error("card {card} instruction {index}: malformed argument; using 0")]
    MalformedArgument {
        /// Card index.
        card: usize,
        /// Instruction index.
        index: usize,
    },
    /// Cards or instructions past the 8-bit pointer range were dropped.
    #[error("program exceeds 256 cards or 256 instructions per card; extras dropped")]
    Unaddressable,
    /// A flag byte other than `-1`, `0` or `1` was read as `EQU`.
    #[error("card {card} instruction {index}: invalid flag; using EQU")]
    InvalidFlag {
        /// Card index.
        card: usize,
        /// Instruction index.
        index: usize,
    },
}

/// Decoded state together with every soft diagnostic raised while loading.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeReport {
    /// The loaded state.
    pub state: VmState,
    /// Diagnostics in document order.
    pub warnings: Vec<DecodeWarning>,
}

impl DecodeReport {
    /// Returns `true` when the document loaded without diagnostics.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateDocument {
    version: u16,
    ip: u8,
    card_idx: u8,
    cards: Vec<Vec<InstructionDocument>>,
    registers: BTreeMap<&'static str, i16>,
    mode: String,
    mode_data: ModeData,
}

#[derive(Serialize)]
struct InstructionDocument {
    opcode: &'static str,
    argument: ArgumentDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    flag: Option<i8>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ArgumentDocument {
    Literal(i16),
    Register(&'static str),
}

impl From<&Instruction> for InstructionDocument {
    fn from(instr: &Instruction) -> Self {
        Self {
            opcode: instr.opcode.mnemonic(),
            argument: match instr.argument {
                Argument::Literal(value) => ArgumentDocument::Literal(value),
                Argument::Register(reg) => ArgumentDocument::Register(reg.name()),
            },
            flag: instr.flag.map(ConditionalFlag::as_i8),
        }
    }
}

/// Encodes `state` into its JSON value.
///
/// # Errors
///
/// Returns [`CodecError::Serialize`] if the serializer rejects the document.
pub fn encode(state: &VmState) -> Result<Value, CodecError> {
    let document = StateDocument {
        version: SnapshotVersion::CURRENT.as_u16(),
        ip: state.ip,
        card_idx: state.card_idx,
        cards: state
            .program
            .cards()
            .iter()
            .map(|card| card.iter().map(InstructionDocument::from).collect())
            .collect(),
        registers: Register::ALL
            .into_iter()
            .map(|reg| (reg.name(), state.register(reg)))
            .collect(),
        mode: state.mode.id().to_string(),
        mode_data: state.mode.data(),
    };
    Ok(serde_json::to_value(document)?)
}

/// Encodes `state` as pretty-printed JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Serialize`] if the serializer rejects the document.
pub fn to_json(state: &VmState) -> Result<String, CodecError> {
    Ok(serde_json::to_string_pretty(&encode(state)?)?)
}

/// Decodes JSON text. Never fails; see [`decode_value`].
#[must_use]
pub fn from_json(text: &str) -> DecodeReport {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => decode_value(&value),
        Err(err) => DecodeReport {
            state: VmState::default(),
            warnings: vec![DecodeWarning::NotJson {
                message: err.to_string(),
            }],
        },
    }
}

/// Decodes a JSON value into a state, defaulting anything malformed.
#[must_use]
pub fn decode_value(value: &Value) -> DecodeReport {
    let mut warnings = Vec::new();
    let Some(doc) = value.as_object() else {
        return DecodeReport {
            state: VmState::default(),
            warnings: vec![DecodeWarning::NotAnObject],
        };
    };

    decode_version(doc, &mut warnings);

    let ip = decode_pointer(doc, FIELD_IP, &mut warnings);
    let card_idx = decode_pointer(doc, FIELD_CARD_IDX, &mut warnings);
    let program = decode_program(doc, &mut warnings);
    let mut state = VmState::with_program(program);
    state.ip = ip;
    state.card_idx = card_idx;

    decode_registers(doc, &mut state, &mut warnings);

    let data = decode_mode_data(doc, &mut warnings);
    let id = match doc.get(FIELD_MODE) {
        None => None,
        Some(Value::String(text)) if !text.is_empty() => Some(ModeId::parse(text)),
        Some(_) => {
            warnings.push(DecodeWarning::MalformedField { field: FIELD_MODE });
            None
        }
    };
    state.mode = id.map_or(Mode::Executing, |id| Mode::from_parts(id, data));

    DecodeReport { state, warnings }
}

fn decode_version(doc: &Map<String, Value>, warnings: &mut Vec<DecodeWarning>) {
    let Some(raw) = doc.get(FIELD_VERSION) else {
        return;
    };
    let Some(version) = raw.as_i64() else {
        warnings.push(DecodeWarning::MalformedField {
            field: FIELD_VERSION,
        });
        return;
    };
    let known = u16::try_from(version)
        .ok()
        .and_then(SnapshotVersion::from_u16)
        .is_some();
    if !known {
        warnings.push(DecodeWarning::UnknownVersion { version });
    }
}

fn decode_pointer(
    doc: &Map<String, Value>,
    field: &'static str,
    warnings: &mut Vec<DecodeWarning>,
) -> u8 {
    let Some(raw) = doc.get(field) else {
        return 0;
    };
    match raw.as_u64().and_then(|value| u8::try_from(value).ok()) {
        Some(value) => value,
        None => {
            warnings.push(DecodeWarning::MalformedField { field });
            0
        }
    }
}

fn decode_registers(
    doc: &Map<String, Value>,
    state: &mut VmState,
    warnings: &mut Vec<DecodeWarning>,
) {
    let Some(raw) = doc.get(FIELD_REGISTERS) else {
        return;
    };
    let Some(registers) = raw.as_object() else {
        warnings.push(DecodeWarning::MalformedField {
            field: FIELD_REGISTERS,
        });
        return;
    };

    for reg in Register::ALL {
        let Some(raw) = registers.get(reg.name()) else {
            continue;
        };
        let Some(value) = raw.as_i64() else {
            warnings.push(DecodeWarning::MalformedField {
                field: FIELD_REGISTERS,
            });
            continue;
        };
        if i64::from(saturate(value)) != value {
            warnings.push(DecodeWarning::RegisterSaturated {
                register: reg,
                value,
            });
        }
        state.set_register(reg, value);
    }
}

fn decode_program(doc: &Map<String, Value>, warnings: &mut Vec<DecodeWarning>) -> Program {
    let Some(raw) = doc.get(FIELD_CARDS) else {
        return Program::empty();
    };
    let Some(cards) = raw.as_array() else {
        warnings.push(DecodeWarning::MalformedField { field: FIELD_CARDS });
        return Program::empty();
    };

    let mut program = Vec::with_capacity(cards.len());
    for (card_idx, raw_card) in cards.iter().enumerate() {
        let Some(raw_card) = raw_card.as_array() else {
            warnings.push(DecodeWarning::MalformedField { field: FIELD_CARDS });
            return Program::empty();
        };
        let mut card = Vec::with_capacity(raw_card.len());
        for (index, raw_instr) in raw_card.iter().enumerate() {
            match decode_instruction(raw_instr, card_idx, index, warnings) {
                Some(instr) => card.push(instr),
                None => return Program::empty(),
            }
        }
        program.push(card);
    }
    if !Program::is_addressable(&program) {
        warnings.push(DecodeWarning::Unaddressable);
    }
    Program::from_cards(program)
}

/// Returns `None` when the opcode is unknown, which discards the program.
fn decode_instruction(
    raw: &Value,
    card: usize,
    index: usize,
    warnings: &mut Vec<DecodeWarning>,
) -> Option<Instruction> {
    let name = raw
        .get(FIELD_OPCODE)
        .and_then(Value::as_str)
        .unwrap_or_default();
    let Some(opcode) = Opcode::from_mnemonic(name) else {
        warnings.push(DecodeWarning::UnknownOpcode {
            card,
            index,
            name: name.to_string(),
        });
        return None;
    };

    let argument = match raw.get(FIELD_ARGUMENT) {
        Some(Value::String(name)) => Register::from_name(name).map(Argument::Register),
        Some(Value::Number(number)) => number
            .as_i64()
            .and_then(|value| i16::try_from(value).ok())
            .map(Argument::Literal),
        _ => None,
    };
    let argument = argument.unwrap_or_else(|| {
        warnings.push(DecodeWarning::MalformedArgument { card, index });
        Argument::default()
    });

    let flag = match raw.get(FIELD_FLAG) {
        None | Some(Value::Null) => None,
        Some(raw_flag) => {
            let byte = raw_flag.as_i64().and_then(|value| i8::try_from(value).ok());
            if !matches!(byte, Some(-1..=1)) {
                warnings.push(DecodeWarning::InvalidFlag { card, index });
            }
            Some(ConditionalFlag::from_i8(byte.unwrap_or(0)))
        }
    };

    Some(Instruction {
        opcode,
        argument,
        flag,
    })
}

fn decode_mode_data(doc: &Map<String, Value>, warnings: &mut Vec<DecodeWarning>) -> ModeData {
    let mut data = ModeData::new();
    let Some(raw) = doc.get(FIELD_MODE_DATA) else {
        return data;
    };
    let Some(entries) = raw.as_object() else {
        warnings.push(DecodeWarning::MalformedField {
            field: FIELD_MODE_DATA,
        });
        return data;
    };

    for (key, raw_value) in entries {
        let value = match raw_value {
            Value::Number(number) => number
                .as_i64()
                .map(ModeValue::Int)
                .or_else(|| number.as_f64().map(ModeValue::Float)),
            Value::String(text) => Some(ModeValue::Text(text.clone())),
            _ => None,
        };
        match value {
            Some(value) => data.insert(key.clone(), value),
            None => warnings.push(DecodeWarning::MalformedField {
                field: FIELD_MODE_DATA,
            }),
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{decode_value, encode, from_json, to_json, DecodeWarning};
    use crate::api::VmState;
    use crate::encoding::Opcode;
    use crate::instruction::{ConditionalFlag, Instruction};
    use crate::program::Program;
    use crate::state::{Mode, ModeData, ModeId, ModeValue, Register};

    fn sample_state() -> VmState {
        let mut state = VmState::with_program(Program::from_cards(vec![
            vec![
                Instruction::literal(Opcode::Add, 5),
                Instruction::register(Opcode::Sub, Register::D).with_flag(ConditionalFlag::Neg),
            ],
            vec![Instruction::literal(Opcode::Crd, 0).with_flag(ConditionalFlag::Equ)],
        ]));
        state.ip = 1;
        state.card_idx = 1;
        state.set_register(Register::A, -999);
        state.set_register(Register::C, 12);
        state.set_mode(Mode::MoveStart { distance: 5 });
        state
    }

    #[test]
    fn encode_writes_documented_layout() {
        let value = encode(&sample_state()).expect("encodes");

        assert_eq!(value["version"], json!(1));
        assert_eq!(value["ip"], json!(1));
        assert_eq!(value["cardIdx"], json!(1));
        assert_eq!(value["mode"], json!("roombas:move/start"));
        assert_eq!(value["modeData"], json!({ "distance": 5 }));
        assert_eq!(
            value["registers"],
            json!({ "A": -999, "B": 0, "C": 12, "D": 0 })
        );
        assert_eq!(
            value["cards"][0][1],
            json!({ "opcode": "SUB", "argument": "D", "flag": -1 })
        );
        assert!(value["cards"][0][0].get("flag").is_none());
    }

    #[test]
    fn text_round_trip_is_exact_and_clean() {
        let state = sample_state();
        let report = from_json(&to_json(&state).expect("encodes"));
        assert!(report.is_clean(), "{:?}", report.warnings);
        assert_eq!(report.state, state);
    }

    #[test]
    fn generic_mode_data_round_trips() {
        let mut state = VmState::default();
        let mut data = ModeData::new().with_int("time", 4).with_float("startX", 1.5);
        data.insert("label", ModeValue::Text("dock".to_string()));
        state.set_mode(Mode::other(ModeId::new("sonar", "scan"), data));

        let report = decode_value(&encode(&state).expect("encodes"));
        assert!(report.is_clean());
        assert_eq!(report.state.mode, state.mode);
    }

    #[test]
    fn garbage_text_loads_default_state() {
        let report = from_json("not json {");
        assert_eq!(report.state, VmState::default());
        assert!(matches!(report.warnings[..], [DecodeWarning::NotJson { .. }]));

        let report = decode_value(&json!([1, 2]));
        assert_eq!(report.warnings, vec![DecodeWarning::NotAnObject]);
    }

    #[test]
    fn missing_fields_default_silently() {
        let report = decode_value(&json!({}));
        assert!(report.is_clean());
        assert_eq!(report.state, VmState::default());
    }

    #[test]
    fn registers_saturate_on_load() {
        let report = decode_value(&json!({ "registers": { "A": 5000, "B": -1200, "C": 7 } }));
        assert_eq!(report.state.register(Register::A), 999);
        assert_eq!(report.state.register(Register::B), -999);
        assert_eq!(report.state.register(Register::C), 7);
        assert_eq!(report.state.register(Register::D), 0);
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn unknown_opcode_discards_whole_program() {
        let report = decode_value(&json!({
            "cards": [
                [{ "opcode": "ADD", "argument": 1 }],
                [{ "opcode": "NOP", "argument": 1 }]
            ],
            "registers": { "A": 3 }
        }));

        assert!(report.state.program.is_empty());
        assert_eq!(report.state.register(Register::A), 3);
        assert_eq!(
            report.warnings,
            vec![DecodeWarning::UnknownOpcode {
                card: 1,
                index: 0,
                name: "NOP".to_string()
            }]
        );
    }

    #[test]
    fn malformed_arguments_and_flags_are_repaired() {
        let report = decode_value(&json!({
            "cards": [[
                { "opcode": "LDA" },
                { "opcode": "LDA", "argument": "Q" },
                { "opcode": "LDA", "argument": 40000 },
                { "opcode": "ADD", "argument": 2, "flag": 9 },
                { "opcode": "ADD", "argument": 2, "flag": 1 }
            ]]
        }));

        let card = report.state.program.card(0).expect("card 0");
        assert_eq!(card[0], Instruction::literal(Opcode::Lda, 0));
        assert_eq!(card[1], Instruction::literal(Opcode::Lda, 0));
        assert_eq!(card[2], Instruction::literal(Opcode::Lda, 0));
        assert_eq!(card[3].flag, Some(ConditionalFlag::Equ));
        assert_eq!(card[4].flag, Some(ConditionalFlag::Pos));
        assert_eq!(report.warnings.len(), 4);
    }

    #[test]
    fn malformed_mode_and_pointers_fall_back() {
        let report = decode_value(&json!({
            "ip": -3,
            "cardIdx": "two",
            "mode": 17,
            "modeData": [1]
        }));

        assert_eq!(report.state.ip, 0);
        assert_eq!(report.state.card_idx, 0);
        assert!(report.state.mode.is_executing());
        assert_eq!(report.warnings.len(), 4);
    }

    #[test]
    fn unknown_version_still_loads() {
        let report = decode_value(&json!({ "version": 7, "registers": { "D": 4 } }));
        assert_eq!(report.state.register(Register::D), 4);
        assert_eq!(
            report.warnings,
            vec![DecodeWarning::UnknownVersion { version: 7 }]
        );
    }

    #[test]
    fn start_mode_without_data_reads_zero_magnitude() {
        let report = decode_value(&json!({ "mode": "roombas:sleep/start" }));
        assert_eq!(report.state.mode, Mode::SleepStart { ticks: 0 });
    }

    #[test]
    fn reserved_ids_round_trip_exactly() {
        let mut state = VmState::default();
        let data = ModeData::new().with_int("distance", 5).with_float("startX", 1.5);
        state.set_mode(Mode::other(ModeId::roombas("move/start"), data));
        assert_eq!(state.mode, Mode::MoveStart { distance: 5 });

        let report = decode_value(&encode(&state).expect("encodes"));
        assert!(report.is_clean());
        assert_eq!(report.state, state);
    }

    #[test]
    fn unaddressable_cards_are_truncated_with_a_warning() {
        let card: Vec<_> = (0..300).map(|_| json!({ "opcode": "ADD", "argument": 1 })).collect();
        let report = decode_value(&json!({ "cards": [card] }));

        assert_eq!(report.state.program.card_len(0), 256);
        assert_eq!(report.warnings, vec![DecodeWarning::Unaddressable]);
    }
}
