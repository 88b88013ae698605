use crate::api::VmState;
use crate::peripheral::Peripheral;
use crate::state::{Mode, ModeData, ModeId, ModeValue, Register};

/// Mode path the timer owns while a wait is in progress.
pub const MODE_TIMER_WAIT: &str = "timer/wait";

const KEY_REMAINING: &str = "remaining";

/// Countdown timer.
///
/// `PHL` with `D > 0` enters `roombas:timer/wait` for `D` ticks. `PHL` with
/// `D <= 0` loads the number of completed waits into `A`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerPeripheral {
    completed: u32,
}

impl TimerPeripheral {
    /// Creates a timer with no completed waits.
    #[must_use]
    pub const fn new() -> Self {
        Self { completed: 0 }
    }

    /// Number of waits that ran to completion.
    #[must_use]
    pub const fn completed(&self) -> u32 {
        self.completed
    }
}

impl Peripheral for TimerPeripheral {
    fn execute_phl(&mut self, vm: &mut VmState) -> bool {
        let ticks = vm.register(Register::D);
        if ticks > 0 {
            let data = ModeData::new().with_int(KEY_REMAINING, i64::from(ticks));
            vm.set_mode(Mode::other(ModeId::roombas(MODE_TIMER_WAIT), data));
        } else {
            vm.set_register(Register::A, i64::from(self.completed));
        }
        true
    }

    fn tick_mode(&mut self, vm: &mut VmState) -> bool {
        let Mode::Other { id, data } = &mut vm.mode else {
            return false;
        };
        if !id.is_roombas(MODE_TIMER_WAIT) {
            return false;
        }

        let remaining = data.int(KEY_REMAINING).unwrap_or(0);
        if remaining <= 1 {
            self.completed = self.completed.saturating_add(1);
            vm.resume_executing();
        } else {
            data.insert(KEY_REMAINING, ModeValue::Int(remaining - 1));
        }
        true
    }
}
