use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Namespace owned by the VM and its built-in host driver.
pub const MODE_NAMESPACE: &str = "roombas";

/// Mode path of the default instruction-executing mode.
pub const MODE_EXECUTING: &str = "executing";
/// Mode path set by `MOV`.
pub const MODE_MOVE_START: &str = "move/start";
/// Mode path set by `ROT`.
pub const MODE_ROTATE_START: &str = "rotate/start";
/// Mode path set by `SLP`.
pub const MODE_SLEEP_START: &str = "sleep/start";

/// Mode-data key carrying the `MOV` distance.
pub const KEY_DISTANCE: &str = "distance";
/// Mode-data key carrying the `ROT` angle.
pub const KEY_ANGLE: &str = "angle";
/// Mode-data key carrying the `SLP` duration in ticks.
pub const KEY_TIME: &str = "time";

/// Namespaced mode identifier, written `namespace:path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModeId {
    namespace: String,
    path: String,
}

impl ModeId {
    /// Creates an identifier from its parts.
    #[must_use]
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    /// Creates an identifier in the VM's own namespace.
    #[must_use]
    pub fn roombas(path: impl Into<String>) -> Self {
        Self::new(MODE_NAMESPACE, path)
    }

    /// Parses `namespace:path`. A bare path lands in the VM namespace.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((namespace, path)) => Self::new(namespace, path),
            None => Self::roombas(text),
        }
    }

    /// Namespace part.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Path part.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns `true` when this is `roombas:<path>`.
    #[must_use]
    pub fn is_roombas(&self, path: &str) -> bool {
        self.namespace == MODE_NAMESPACE && self.path == path
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

/// A single mode-data value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModeValue {
    /// Integral value (distances, angles, tick counts).
    Int(i64),
    /// Floating-point value (host positions and headings).
    Float(f64),
    /// Free-form text.
    Text(String),
}

/// Generic key-value progress data owned by whoever owns the current mode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeData(BTreeMap<String, ModeValue>);

impl ModeData {
    /// Creates empty mode data.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns `true` when no keys are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Raw value lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ModeValue> {
        self.0.get(key)
    }

    /// Reads an integer. Floats are truncated, text is ignored.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            ModeValue::Int(value) => Some(*value),
            ModeValue::Float(value) => Some(*value as i64),
            ModeValue::Text(_) => None,
        }
    }

    /// Reads an integer clamped into `i16`, the width of VM arguments.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn short(&self, key: &str) -> Option<i16> {
        self.int(key)
            .map(|value| value.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16)
    }

    /// Reads a float. Integers are widened.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn float(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            ModeValue::Int(value) => Some(*value as f64),
            ModeValue::Float(value) => Some(*value),
            ModeValue::Text(_) => None,
        }
    }

    /// Reads a text value.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            ModeValue::Text(value) => Some(value),
            ModeValue::Int(_) | ModeValue::Float(_) => None,
        }
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: impl Into<String>, value: ModeValue) {
        self.0.insert(key.into(), value);
    }

    /// Builder form of [`ModeData::insert`] for integers.
    #[must_use]
    pub fn with_int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.insert(key, ModeValue::Int(value));
        self
    }

    /// Builder form of [`ModeData::insert`] for floats.
    #[must_use]
    pub fn with_float(mut self, key: impl Into<String>, value: f64) -> Self {
        self.insert(key, ModeValue::Float(value));
        self
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModeValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

/// Who currently owns per-tick control, with that owner's progress data.
///
/// The request markers set by `MOV`, `ROT` and `SLP` carry their magnitude
/// as typed payloads. Every other mode, including the active modes the host
/// driver and peripherals define, is carried generically.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Mode {
    /// The interpreter runs one instruction per tick.
    #[default]
    Executing,
    /// Movement requested, not yet picked up by the host.
    MoveStart {
        /// Requested distance.
        distance: i16,
    },
    /// Rotation requested, not yet picked up by the host.
    RotateStart {
        /// Requested angle in degrees.
        angle: i16,
    },
    /// Sleep requested, not yet picked up by the host.
    SleepStart {
        /// Requested duration in ticks.
        ticks: i16,
    },
    /// Any mode owned by the host or a peripheral.
    Other {
        /// Mode identifier.
        id: ModeId,
        /// Owner-defined progress data.
        data: ModeData,
    },
}

impl Mode {
    /// Creates a mode from an identifier and its data.
    ///
    /// The VM's own identifiers come back as their typed variants, so
    /// `roombas:executing` is [`Mode::Executing`] however it was written.
    #[must_use]
    pub fn other(id: ModeId, data: ModeData) -> Self {
        Self::from_parts(id, data)
    }

    /// Rewrites an `Other` carrying one of the VM's own identifiers into its
    /// typed variant. Every other mode is returned unchanged.
    #[must_use]
    pub fn canonical(self) -> Self {
        match self {
            Self::Other { id, data } => Self::from_parts(id, data),
            typed => typed,
        }
    }

    /// Returns `true` in the default executing mode.
    #[must_use]
    pub const fn is_executing(&self) -> bool {
        matches!(self, Self::Executing)
    }

    /// Returns the identifier this mode is persisted and matched under.
    #[must_use]
    pub fn id(&self) -> ModeId {
        match self {
            Self::Executing => ModeId::roombas(MODE_EXECUTING),
            Self::MoveStart { .. } => ModeId::roombas(MODE_MOVE_START),
            Self::RotateStart { .. } => ModeId::roombas(MODE_ROTATE_START),
            Self::SleepStart { .. } => ModeId::roombas(MODE_SLEEP_START),
            Self::Other { id, .. } => id.clone(),
        }
    }

    /// Returns the generic data view of this mode.
    #[must_use]
    pub fn data(&self) -> ModeData {
        match self {
            Self::Executing => ModeData::new(),
            Self::MoveStart { distance } => {
                ModeData::new().with_int(KEY_DISTANCE, i64::from(*distance))
            }
            Self::RotateStart { angle } => ModeData::new().with_int(KEY_ANGLE, i64::from(*angle)),
            Self::SleepStart { ticks } => ModeData::new().with_int(KEY_TIME, i64::from(*ticks)),
            Self::Other { data, .. } => data.clone(),
        }
    }

    /// Rebuilds a mode from its generic parts, recovering typed payloads for
    /// the VM's own identifiers. Missing magnitudes read as zero.
    #[must_use]
    pub fn from_parts(id: ModeId, data: ModeData) -> Self {
        if id.namespace() != MODE_NAMESPACE {
            return Self::Other { id, data };
        }

        match id.path() {
            MODE_EXECUTING => Self::Executing,
            MODE_MOVE_START => Self::MoveStart {
                distance: data.short(KEY_DISTANCE).unwrap_or(0),
            },
            MODE_ROTATE_START => Self::RotateStart {
                angle: data.short(KEY_ANGLE).unwrap_or(0),
            },
            MODE_SLEEP_START => Self::SleepStart {
                ticks: data.short(KEY_TIME).unwrap_or(0),
            },
            _ => Self::Other { id, data },
        }
    }
}
