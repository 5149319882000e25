// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Fake implementations of the CP15 register accessors for unit tests.
//!
//! Each thread owns its own fake machine: a list of cores, each with its own identification
//! registers and PMU, and a cursor selecting the core that the accessors act on.

use crate::{Midr, Mpidr, Pmcr, PmuRegister};
use std::cell::RefCell;

/// Generates a public function named `read_$name` to read the fake register `$reg` of the current
/// fake core.
#[macro_export]
macro_rules! read_cp15 {
    ($name:ident : $reg:ident, $type:ty, $op1:literal, $crn:ident, $crm:ident, $op2:literal) => {
        $crate::_paste::paste! {
            #[doc = "Returns the value of the `"]
            #[doc = stringify!($name)]
            #[doc = "` register."]
            pub fn [< read_ $name >]() -> $type {
                $crate::fake::read($crate::PmuRegister::$reg)
            }
        }
    };
    (
        $name:ident : $reg:ident, $type:ty : $bitflags_type:ty,
        $op1:literal, $crn:ident, $crm:ident, $op2:literal
    ) => {
        $crate::_paste::paste! {
            #[doc = "Returns the value of the `"]
            #[doc = stringify!($name)]
            #[doc = "` register."]
            pub fn [< read_ $name >]() -> $bitflags_type {
                <$bitflags_type>::from_bits_retain($crate::fake::read($crate::PmuRegister::$reg))
            }
        }
    };
}

/// Generates a public function named `write_$name` to write to the fake register `$reg` of the
/// current fake core.
#[macro_export]
macro_rules! write_cp15 {
    ($name:ident : $reg:ident, $type:ty, $op1:literal, $crn:ident, $crm:ident, $op2:literal) => {
        $crate::_paste::paste! {
            #[doc = "Writes `value` to the `"]
            #[doc = stringify!($name)]
            #[doc = "` register."]
            pub fn [< write_ $name >](value: $type) {
                $crate::fake::write($crate::PmuRegister::$reg, value);
            }
        }
    };
    (
        $name:ident : $reg:ident, $type:ty : $bitflags_type:ty,
        $op1:literal, $crn:ident, $crm:ident, $op2:literal
    ) => {
        $crate::_paste::paste! {
            #[doc = "Writes `value` to the `"]
            #[doc = stringify!($name)]
            #[doc = "` register."]
            pub fn [< write_ $name >](value: $bitflags_type) {
                $crate::fake::write($crate::PmuRegister::$reg, value.bits());
            }
        }
    };
}

/// Largest number of event counters an ARMv7 PMU can implement.
pub const MAX_EVENT_COUNTERS: usize = 31;

const CYCLE_COUNTER_BIT: u32 = 1 << 31;

/// Model of the Performance Monitors of a single core.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FakePmu {
    event_counters: u32,
    control: Pmcr,
    count_enable: u32,
    interrupt_enable: u32,
    overflow: u32,
    select: u32,
    user_enable: u32,
    cycle_count: u32,
    common_events: [u32; 2],
    event_types: [u32; MAX_EVENT_COUNTERS],
    event_counts: [u32; MAX_EVENT_COUNTERS],
    accesses: usize,
}

impl FakePmu {
    /// Creates a PMU with `event_counters` event counters in addition to the cycle counter.
    pub fn new(event_counters: u32) -> Self {
        assert!(event_counters as usize <= MAX_EVENT_COUNTERS);
        Self {
            event_counters,
            control: Pmcr::empty(),
            count_enable: 0,
            interrupt_enable: 0,
            overflow: 0,
            select: 0,
            user_enable: 0,
            cycle_count: 0,
            common_events: [0x3fff_ffff, 0],
            event_types: [0; MAX_EVENT_COUNTERS],
            event_counts: [0; MAX_EVENT_COUNTERS],
            accesses: 0,
        }
    }

    /// Returns the bits of the per-counter registers which correspond to implemented counters.
    fn implemented(&self) -> u32 {
        CYCLE_COUNTER_BIT | ((1u64 << self.event_counters) - 1) as u32
    }

    fn selected(&self) -> Option<usize> {
        let index = self.select as usize;
        (index < self.event_counters as usize).then_some(index)
    }

    fn read(&mut self, register: PmuRegister) -> u32 {
        self.accesses += 1;
        match register {
            PmuRegister::Pmcr => {
                self.control.bits() | self.event_counters << Pmcr::N_SHIFT
            }
            PmuRegister::Pmcntenset | PmuRegister::Pmcntenclr => self.count_enable,
            PmuRegister::Pmintenset | PmuRegister::Pmintenclr => self.interrupt_enable,
            PmuRegister::Pmovsr | PmuRegister::Pmovsset => self.overflow,
            PmuRegister::Pmswinc => 0,
            PmuRegister::Pmselr => self.select,
            PmuRegister::Pmceid0 => self.common_events[0],
            PmuRegister::Pmceid1 => self.common_events[1],
            PmuRegister::Pmccntr => self.cycle_count,
            PmuRegister::Pmxevtyper => self.selected().map_or(0, |i| self.event_types[i]),
            PmuRegister::Pmxevcntr => self.selected().map_or(0, |i| self.event_counts[i]),
            PmuRegister::Pmuserenr => self.user_enable,
        }
    }

    fn write(&mut self, register: PmuRegister, value: u32) {
        self.accesses += 1;
        let implemented = self.implemented();
        match register {
            PmuRegister::Pmcr => {
                let value = Pmcr::from_bits_truncate(value & Pmcr::WRITABLE_MASK);
                if value.contains(Pmcr::P) {
                    self.event_counts = [0; MAX_EVENT_COUNTERS];
                }
                if value.contains(Pmcr::C) {
                    self.cycle_count = 0;
                }
                self.control = value - (Pmcr::P | Pmcr::C);
            }
            PmuRegister::Pmcntenset => self.count_enable |= value & implemented,
            PmuRegister::Pmcntenclr => self.count_enable &= !value,
            PmuRegister::Pmintenset => self.interrupt_enable |= value & implemented,
            PmuRegister::Pmintenclr => self.interrupt_enable &= !value,
            PmuRegister::Pmovsr => self.overflow &= !value,
            PmuRegister::Pmovsset => self.overflow |= value & implemented,
            PmuRegister::Pmswinc => {
                if self.control.contains(Pmcr::E) {
                    for counter in 0..self.event_counters as usize {
                        if value & self.count_enable & (1 << counter) != 0 {
                            self.event_counts[counter] = self.event_counts[counter].wrapping_add(1);
                        }
                    }
                }
            }
            PmuRegister::Pmselr => self.select = value & 0x1f,
            PmuRegister::Pmceid0 | PmuRegister::Pmceid1 => {}
            PmuRegister::Pmccntr => self.cycle_count = value,
            PmuRegister::Pmxevtyper => {
                if let Some(index) = self.selected() {
                    self.event_types[index] = value;
                }
            }
            PmuRegister::Pmxevcntr => {
                if let Some(index) = self.selected() {
                    self.event_counts[index] = value;
                }
            }
            PmuRegister::Pmuserenr => self.user_enable = value & 1,
        }
    }

    /// Returns the number of register reads and writes performed so far.
    pub fn accesses(&self) -> usize {
        self.accesses
    }

    /// Returns the control register, with the N field included.
    pub fn control(&self) -> Pmcr {
        Pmcr::from_bits_retain(self.control.bits() | self.event_counters << Pmcr::N_SHIFT)
    }

    /// Returns the set of enabled counters, in `PMCNTENSET` layout.
    pub fn count_enable(&self) -> u32 {
        self.count_enable
    }

    /// Returns the set of counters with their overflow interrupt enabled.
    pub fn interrupt_enable(&self) -> u32 {
        self.interrupt_enable
    }

    /// Returns the pending overflow flags.
    pub fn overflow(&self) -> u32 {
        self.overflow
    }

    /// Raises the overflow flags in `mask`, as if the corresponding counters had wrapped.
    pub fn raise_overflow(&mut self, mask: u32) {
        self.overflow |= mask & self.implemented();
    }

    /// Returns the value of the cycle counter.
    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    /// Sets the value of the cycle counter.
    pub fn set_cycle_count(&mut self, value: u32) {
        self.cycle_count = value;
    }

    /// Returns the event type programmed into event counter `counter`.
    pub fn event_type(&self, counter: usize) -> u32 {
        self.event_types[counter]
    }

    /// Returns the value of event counter `counter`.
    pub fn event_count(&self, counter: usize) -> u32 {
        self.event_counts[counter]
    }

    /// Sets the value of event counter `counter`.
    pub fn set_event_count(&mut self, counter: usize, value: u32) {
        self.event_counts[counter] = value;
    }

    /// Returns the counter selected by `PMSELR`.
    pub fn select(&self) -> u32 {
        self.select
    }

    /// Returns the user enable register.
    pub fn user_enable(&self) -> u32 {
        self.user_enable
    }

    /// Sets the common event identification registers.
    pub fn set_common_events(&mut self, pmceid0: u32, pmceid1: u32) {
        self.common_events = [pmceid0, pmceid1];
    }
}

/// A fake physical core.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FakeCore {
    /// Value of the core's MIDR register.
    pub midr: Midr,
    /// Value of the core's MPIDR register.
    pub mpidr: Mpidr,
    /// The core's PMU.
    pub pmu: FakePmu,
}

impl FakeCore {
    /// Creates a core whose PMU has `event_counters` event counters.
    pub fn new(midr: Midr, mpidr: Mpidr, event_counters: u32) -> Self {
        Self {
            midr,
            mpidr,
            pmu: FakePmu::new(event_counters),
        }
    }
}

#[derive(Debug, Default)]
struct FakeMachine {
    cores: Vec<FakeCore>,
    current: usize,
}

impl FakeMachine {
    fn current_core(&mut self) -> &mut FakeCore {
        let current = self.current;
        self.cores
            .get_mut(current)
            .unwrap_or_else(|| panic!("No fake core {current} installed"))
    }
}

thread_local! {
    static MACHINE: RefCell<FakeMachine> = RefCell::new(FakeMachine::default());
}

/// Replaces the current thread's fake machine with the given cores, and selects the first one.
pub fn install(cores: Vec<FakeCore>) {
    MACHINE.with_borrow_mut(|machine| {
        *machine = FakeMachine { cores, current: 0 };
    });
}

/// Returns the number of installed fake cores.
pub fn core_count() -> usize {
    MACHINE.with_borrow(|machine| machine.cores.len())
}

/// Returns the index of the core which the accessors currently act on.
pub fn current_core() -> usize {
    MACHINE.with_borrow(|machine| machine.current)
}

/// Runs `f` with the accessors acting on core `index`, then switches back.
pub fn run_on_core<T>(index: usize, f: impl FnOnce() -> T) -> T {
    let previous = MACHINE.with_borrow_mut(|machine| {
        assert!(index < machine.cores.len(), "No fake core {index} installed");
        core::mem::replace(&mut machine.current, index)
    });
    let result = f();
    MACHINE.with_borrow_mut(|machine| machine.current = previous);
    result
}

/// Gives `f` direct access to fake core `index`, for inspection or setup.
pub fn with_core<T>(index: usize, f: impl FnOnce(&mut FakeCore) -> T) -> T {
    MACHINE.with_borrow_mut(|machine| f(&mut machine.cores[index]))
}

/// Reads the fake PMU register `register` of the current core.
pub fn read(register: PmuRegister) -> u32 {
    MACHINE.with_borrow_mut(|machine| machine.current_core().pmu.read(register))
}

/// Writes `value` to the fake PMU register `register` of the current core.
pub fn write(register: PmuRegister, value: u32) {
    MACHINE.with_borrow_mut(|machine| machine.current_core().pmu.write(register, value));
}

/// Returns the `MIDR` value of the current fake core.
pub fn read_midr() -> Midr {
    MACHINE.with_borrow_mut(|machine| machine.current_core().midr)
}

/// Returns the `MPIDR` value of the current fake core.
pub fn read_mpidr() -> Mpidr {
    MACHINE.with_borrow_mut(|machine| machine.current_core().mpidr)
}

/// Does nothing; the fake registers take effect immediately.
pub fn isb() {}
