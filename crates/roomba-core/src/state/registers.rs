/// Number of architecturally visible registers (`A`, `B`, `C`, `D`).
pub const REGISTER_COUNT: usize = 4;
/// Lowest value any register can hold.
pub const REGISTER_MIN: i16 = -999;
/// Highest value any register can hold.
pub const REGISTER_MAX: i16 = 999;

/// Named register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Register {
    /// Accumulator, target of all arithmetic.
    A = 0,
    /// Backup, receives the `DVM` remainder and the old `A` on `RLB`.
    B = 1,
    /// Conditional, its sign gates flagged instructions.
    C = 2,
    /// Device, parameter slot read by peripherals.
    D = 3,
}

impl Register {
    /// Ordered list of all registers.
    pub const ALL: [Self; REGISTER_COUNT] = [Self::A, Self::B, Self::C, Self::D];

    /// Returns the array index for this register (`0..=3`).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns the single-letter register name used on the wire and in source.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }

    /// Looks up a register by its exact name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reg| reg.name() == name)
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Clamps a wide intermediate result into the register range.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn saturate(value: i64) -> i16 {
    value.clamp(i64::from(REGISTER_MIN), i64::from(REGISTER_MAX)) as i16
}

/// The full register file. Every register always holds a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegisterFile {
    values: [i16; REGISTER_COUNT],
}

impl RegisterFile {
    /// Reads a register.
    #[must_use]
    pub const fn get(&self, reg: Register) -> i16 {
        self.values[reg.index()]
    }

    /// Writes a register, saturating into `REGISTER_MIN..=REGISTER_MAX`.
    pub fn set(&mut self, reg: Register, value: i64) {
        self.values[reg.index()] = saturate(value);
    }

    /// Returns all register values in `A, B, C, D` order.
    #[must_use]
    pub const fn values(&self) -> [i16; REGISTER_COUNT] {
        self.values
    }

    /// Zeroes every register.
    pub const fn clear(&mut self) {
        self.values = [0; REGISTER_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::{saturate, Register, RegisterFile, REGISTER_COUNT, REGISTER_MAX, REGISTER_MIN};

    #[test]
    fn register_names_round_trip() {
        assert_eq!(REGISTER_COUNT, 4);

        for reg in Register::ALL {
            assert_eq!(Register::from_name(reg.name()), Some(reg));
        }

        assert!(Register::from_name("E").is_none());
        assert!(Register::from_name("a").is_none());
    }

    #[test]
    fn register_file_tracks_each_register_independently() {
        let mut regs = RegisterFile::default();

        for (offset, reg) in (0_i64..).zip(Register::ALL) {
            regs.set(reg, 100 + offset);
        }

        for (offset, reg) in (0_i16..).zip(Register::ALL) {
            assert_eq!(regs.get(reg), 100 + offset);
        }
    }

    #[test]
    fn writes_saturate_at_both_ends() {
        let mut regs = RegisterFile::default();

        regs.set(Register::A, 5_000);
        assert_eq!(regs.get(Register::A), REGISTER_MAX);

        regs.set(Register::B, -5_000);
        assert_eq!(regs.get(Register::B), REGISTER_MIN);

        regs.set(Register::C, i64::from(i16::MIN));
        assert_eq!(regs.get(Register::C), REGISTER_MIN);
    }

    #[test]
    fn saturate_leaves_in_range_values_alone() {
        assert_eq!(saturate(0), 0);
        assert_eq!(saturate(-999), -999);
        assert_eq!(saturate(999), 999);
        assert_eq!(saturate(1000), 999);
        assert_eq!(saturate(i64::MIN), -999);
    }

    #[test]
    fn clear_zeroes_everything() {
        let mut regs = RegisterFile::default();
        regs.set(Register::D, 42);
        regs.clear();
        assert_eq!(regs.values(), [0; REGISTER_COUNT]);
    }
}
