//! Extension-point contracts between the VM and host-supplied peripherals.

use crate::api::VmState;

/// Number of peripheral slots addressable by `PHL`.
pub const MAX_PERIPHERAL_COUNT: usize = 4;

/// A pluggable capability addressed by slot index.
///
/// Both hooks receive the full VM state and may read or mutate registers,
/// pointers, the mode and mode data.
pub trait Peripheral {
    /// Runs when `PHL` selects this peripheral's slot.
    ///
    /// Returns `true` when the instruction pointer should advance past the
    /// `PHL`; `false` keeps it in place so the call repeats next tick.
    fn execute_phl(&mut self, vm: &mut VmState) -> bool;

    /// Offered every tick while the VM is not executing.
    ///
    /// Returns `true` when this peripheral recognized and handled the current
    /// mode, which stops the offer from reaching later slots.
    fn tick_mode(&mut self, vm: &mut VmState) -> bool;
}

/// Resolves peripherals by slot, fresh on every call.
pub trait PeripheralProvider {
    /// Returns the peripheral installed in `slot`, if any.
    fn peripheral(&mut self, slot: u8) -> Option<&mut dyn Peripheral>;
}

/// Provider with every slot empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPeripherals;

impl PeripheralProvider for NoPeripherals {
    fn peripheral(&mut self, _slot: u8) -> Option<&mut dyn Peripheral> {
        None
    }
}

/// Fixed bank of boxed peripherals, one per slot.
#[derive(Default)]
pub struct PeripheralSlots {
    slots: [Option<Box<dyn Peripheral>>; MAX_PERIPHERAL_COUNT],
}

impl PeripheralSlots {
    /// Creates a bank with every slot empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `peripheral` in `slot`, returning the previous occupant.
    ///
    /// Out-of-range slots hand the peripheral straight back.
    pub fn install(
        &mut self,
        slot: usize,
        peripheral: Box<dyn Peripheral>,
    ) -> Option<Box<dyn Peripheral>> {
        match self.slots.get_mut(slot) {
            Some(entry) => entry.replace(peripheral),
            None => Some(peripheral),
        }
    }

    /// Builder form of [`PeripheralSlots::install`].
    #[must_use]
    pub fn with(mut self, slot: usize, peripheral: Box<dyn Peripheral>) -> Self {
        let _ = self.install(slot, peripheral);
        self
    }

    /// Empties `slot`, returning its peripheral.
    pub fn remove(&mut self, slot: usize) -> Option<Box<dyn Peripheral>> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Returns `true` when `slot` holds a peripheral.
    #[must_use]
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(Option::is_some)
    }
}

impl std::fmt::Debug for PeripheralSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let occupied: Vec<bool> = self.slots.iter().map(Option::is_some).collect();
        f.debug_struct("PeripheralSlots")
            .field("occupied", &occupied)
            .finish()
    }
}

impl PeripheralProvider for PeripheralSlots {
    fn peripheral(&mut self, slot: u8) -> Option<&mut dyn Peripheral> {
        let boxed = self.slots.get_mut(usize::from(slot))?.as_mut()?;
        let peripheral: &mut dyn Peripheral = &mut **boxed;
        Some(peripheral)
    }
}
