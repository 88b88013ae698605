//! Host-side recognizers for the built-in movement, rotation and sleep modes.
//!
//! `MOV`, `ROT` and `SLP` only leave start markers in the VM. A host that owns
//! a physical body runs [`drive_tick`] instead of [`crate::tick`]: it turns
//! each marker into an active mode, drives the body through a [`Chassis`]
//! until the request is satisfied, then hands control back to the
//! interpreter. Anything it does not recognize goes to the core tick.

use crate::api::{CoreConfig, TickOutcome, TraceEvent, TraceSink, VmState};
use crate::execute::{tick, tick_traced};
use crate::peripheral::PeripheralProvider;
use crate::state::{Mode, ModeData, ModeId, ModeValue};

/// Blocks travelled per tick.
pub const MOVEMENT_PER_TICK: f64 = 0.1;
/// Radians turned per tick.
pub const TURNING_PER_TICK: f64 = 0.314;
/// Heading error under which a turn counts as finished.
pub const TURN_TOLERANCE: f64 = 1e-4;

const MOVE_TOLERANCE: f64 = 1e-6;

/// Mode path while a move is in progress.
pub const MODE_MOVING: &str = "entity/moving";
/// Mode path while a turn is in progress.
pub const MODE_TURNING: &str = "entity/turning";
/// Mode path while a sleep is in progress.
pub const MODE_SLEEPING: &str = "entity/sleeping";

const KEY_DISTANCE: &str = "distance";
const KEY_START_X: &str = "startX";
const KEY_START_Z: &str = "startZ";
const KEY_ANGLE: &str = "angle";
const KEY_TARGET_HEADING: &str = "targetHeading";
const KEY_TIME: &str = "time";

/// The physical body a host drives on the VM's behalf.
pub trait Chassis {
    /// Current `(x, z)` position.
    fn position(&self) -> (f64, f64);
    /// Current heading in radians.
    fn heading(&self) -> f64;
    /// Moves along the current heading; negative distances move backwards.
    fn advance(&mut self, distance: f64);
    /// Turns by `radians`, positive counter-clockwise.
    fn turn(&mut self, radians: f64);
}

/// Frictionless chassis on an unbounded plane.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlanarChassis {
    /// X coordinate.
    pub x: f64,
    /// Z coordinate.
    pub z: f64,
    /// Heading in radians, not wrapped.
    pub heading: f64,
}

impl Chassis for PlanarChassis {
    fn position(&self) -> (f64, f64) {
        (self.x, self.z)
    }

    fn heading(&self) -> f64 {
        self.heading
    }

    fn advance(&mut self, distance: f64) {
        self.x += self.heading.cos() * distance;
        self.z += self.heading.sin() * distance;
    }

    fn turn(&mut self, radians: f64) {
        self.heading += radians;
    }
}

/// Built-in activity handled by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    /// `MOV`.
    Moving,
    /// `ROT`.
    Turning,
    /// `SLP`.
    Sleeping,
}

/// Result of one [`drive_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveOutcome {
    /// A start marker was converted into an active mode.
    Started(Activity),
    /// The activity made progress and is still running.
    Progressed(Activity),
    /// The activity finished; the VM is executing again.
    Finished(Activity),
    /// The mode was not a built-in one; the core tick ran.
    Core(TickOutcome),
}

/// Runs one host tick.
pub fn drive_tick(
    state: &mut VmState,
    chassis: &mut dyn Chassis,
    peripherals: &mut dyn PeripheralProvider,
    config: &CoreConfig,
) -> DriveOutcome {
    drive(state, chassis).unwrap_or_else(|| DriveOutcome::Core(tick(state, peripherals, config)))
}

/// [`drive_tick`] with trace hooks, dispatched only when tracing is enabled.
pub fn drive_tick_traced(
    state: &mut VmState,
    chassis: &mut dyn Chassis,
    peripherals: &mut dyn PeripheralProvider,
    config: &CoreConfig,
    sink: &mut dyn TraceSink,
) -> DriveOutcome {
    match drive(state, chassis) {
        Some(outcome) => {
            if config.tracing_enabled
                && matches!(outcome, DriveOutcome::Started(_) | DriveOutcome::Finished(_))
            {
                sink.on_event(TraceEvent::ModeEntered {
                    mode: state.mode.id(),
                });
            }
            outcome
        }
        None => DriveOutcome::Core(tick_traced(state, peripherals, config, sink)),
    }
}

fn drive(state: &mut VmState, chassis: &mut dyn Chassis) -> Option<DriveOutcome> {
    state.canonicalize_mode();
    match state.mode {
        Mode::MoveStart { distance } => {
            let (x, z) = chassis.position();
            let data = ModeData::new()
                .with_int(KEY_DISTANCE, i64::from(distance))
                .with_float(KEY_START_X, x)
                .with_float(KEY_START_Z, z);
            state.set_mode(Mode::other(ModeId::roombas(MODE_MOVING), data));
            Some(DriveOutcome::Started(Activity::Moving))
        }
        Mode::RotateStart { angle } => {
            let target = chassis.heading() + f64::from(angle).to_radians();
            let data = ModeData::new()
                .with_int(KEY_ANGLE, i64::from(angle))
                .with_float(KEY_TARGET_HEADING, target);
            state.set_mode(Mode::other(ModeId::roombas(MODE_TURNING), data));
            Some(DriveOutcome::Started(Activity::Turning))
        }
        Mode::SleepStart { ticks } => {
            let data = ModeData::new().with_int(KEY_TIME, i64::from(ticks));
            state.set_mode(Mode::other(ModeId::roombas(MODE_SLEEPING), data));
            Some(DriveOutcome::Started(Activity::Sleeping))
        }
        Mode::Other { ref id, .. } if id.is_roombas(MODE_MOVING) => {
            Some(drive_move(state, chassis))
        }
        Mode::Other { ref id, .. } if id.is_roombas(MODE_TURNING) => {
            Some(drive_turn(state, chassis))
        }
        Mode::Other { ref id, .. } if id.is_roombas(MODE_SLEEPING) => Some(drive_sleep(state)),
        Mode::Executing | Mode::Other { .. } => None,
    }
}

fn drive_move(state: &mut VmState, chassis: &mut dyn Chassis) -> DriveOutcome {
    let data = state.mode.data();
    let distance = data.float(KEY_DISTANCE).unwrap_or(0.0);
    let (x, z) = chassis.position();
    let start_x = data.float(KEY_START_X).unwrap_or(x);
    let start_z = data.float(KEY_START_Z).unwrap_or(z);
    let travelled = (x - start_x).hypot(z - start_z);
    let target = distance.abs();

    if travelled + MOVE_TOLERANCE >= target {
        state.resume_executing();
        return DriveOutcome::Finished(Activity::Moving);
    }

    let step = MOVEMENT_PER_TICK.min(target - travelled);
    chassis.advance(step.copysign(distance));
    DriveOutcome::Progressed(Activity::Moving)
}

fn drive_turn(state: &mut VmState, chassis: &mut dyn Chassis) -> DriveOutcome {
    let target = state
        .mode
        .data()
        .float(KEY_TARGET_HEADING)
        .unwrap_or_else(|| chassis.heading());
    let error = target - chassis.heading();

    if error.abs() < TURN_TOLERANCE {
        state.resume_executing();
        return DriveOutcome::Finished(Activity::Turning);
    }

    chassis.turn(error.clamp(-TURNING_PER_TICK, TURNING_PER_TICK));
    DriveOutcome::Progressed(Activity::Turning)
}

fn drive_sleep(state: &mut VmState) -> DriveOutcome {
    let Mode::Other { data, .. } = &mut state.mode else {
        return DriveOutcome::Progressed(Activity::Sleeping);
    };
    let time = data.int(KEY_TIME).unwrap_or(0);
    if time <= 0 {
        state.resume_executing();
        return DriveOutcome::Finished(Activity::Sleeping);
    }
    data.insert(KEY_TIME, ModeValue::Int(time - 1));
    DriveOutcome::Progressed(Activity::Sleeping)
}
