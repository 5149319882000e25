// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Access to a PMU which may or may not be the one of the core we are running on.
//!
//! While the core that a PMU belongs to is running the CPU, register accesses go to the hardware.
//! Otherwise they go to an in-memory copy of the registers, which is saved from the hardware when
//! the core powers down and restored to it when the core powers back up.

use alloc::vec::Vec;
use armv7_pmu_regs::{PmuRegister, read_register, write_register};

/// Saved `PMXEVTYPER` and `PMXEVCNTR` of one event counter.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CounterRegisters {
    /// Event type select.
    pub evtyper: u32,
    /// Event count.
    pub evcntr: u32,
}

/// In-memory copy of a PMU's registers.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LogicalState {
    pmcr: u32,
    pmcntenset: u32,
    pmcntenclr: u32,
    pmovsr: u32,
    pmswinc: u32,
    pmselr: u32,
    pmceid0: u32,
    pmceid1: u32,
    pmccntr: u32,
    pmuserenr: u32,
    pmintenset: u32,
    pmintenclr: u32,
    pmovsset: u32,
    counters: Vec<CounterRegisters>,
}

impl LogicalState {
    /// Creates an all-zero copy of a PMU with `num_counters` counters, including the cycle counter.
    ///
    /// # Panics
    ///
    /// Panics if the counter array cannot be allocated.
    pub fn new(num_counters: usize) -> Self {
        let mut counters = Vec::new();
        if counters.try_reserve_exact(num_counters).is_err() {
            panic!("Failed to allocate saved registers for {num_counters} PMU counters");
        }
        counters.resize(num_counters, CounterRegisters::default());
        Self {
            counters,
            ..Default::default()
        }
    }

    /// Returns the saved value of `register`.
    ///
    /// `PMXEVTYPER` and `PMXEVCNTR` are those of the counter selected by the saved `PMSELR`.
    pub fn get(&self, register: PmuRegister) -> u32 {
        match register {
            PmuRegister::Pmcr => self.pmcr,
            PmuRegister::Pmcntenset => self.pmcntenset,
            PmuRegister::Pmcntenclr => self.pmcntenclr,
            PmuRegister::Pmovsr => self.pmovsr,
            PmuRegister::Pmswinc => self.pmswinc,
            PmuRegister::Pmselr => self.pmselr,
            PmuRegister::Pmceid0 => self.pmceid0,
            PmuRegister::Pmceid1 => self.pmceid1,
            PmuRegister::Pmccntr => self.pmccntr,
            PmuRegister::Pmxevtyper => self.selected().map_or(0, |counter| counter.evtyper),
            PmuRegister::Pmxevcntr => self.selected().map_or(0, |counter| counter.evcntr),
            PmuRegister::Pmuserenr => self.pmuserenr,
            PmuRegister::Pmintenset => self.pmintenset,
            PmuRegister::Pmintenclr => self.pmintenclr,
            PmuRegister::Pmovsset => self.pmovsset,
        }
    }

    /// Sets the saved value of `register`.
    pub fn set(&mut self, register: PmuRegister, value: u32) {
        let slot = match register {
            PmuRegister::Pmcr => &mut self.pmcr,
            PmuRegister::Pmcntenset => &mut self.pmcntenset,
            PmuRegister::Pmcntenclr => &mut self.pmcntenclr,
            PmuRegister::Pmovsr => &mut self.pmovsr,
            PmuRegister::Pmswinc => &mut self.pmswinc,
            PmuRegister::Pmselr => &mut self.pmselr,
            PmuRegister::Pmceid0 => &mut self.pmceid0,
            PmuRegister::Pmceid1 => &mut self.pmceid1,
            PmuRegister::Pmccntr => &mut self.pmccntr,
            PmuRegister::Pmxevtyper => match self.selected_mut() {
                Some(counter) => &mut counter.evtyper,
                None => return,
            },
            PmuRegister::Pmxevcntr => match self.selected_mut() {
                Some(counter) => &mut counter.evcntr,
                None => return,
            },
            PmuRegister::Pmuserenr => &mut self.pmuserenr,
            PmuRegister::Pmintenset => &mut self.pmintenset,
            PmuRegister::Pmintenclr => &mut self.pmintenclr,
            PmuRegister::Pmovsset => &mut self.pmovsset,
        };
        *slot = value;
    }

    /// Returns the saved registers of counter `index`.
    pub fn counter(&self, index: usize) -> Option<&CounterRegisters> {
        self.counters.get(index)
    }

    /// Returns the number of counters which have saved registers.
    pub fn num_counters(&self) -> usize {
        self.counters.len()
    }

    fn selected(&self) -> Option<&CounterRegisters> {
        self.counters.get(self.pmselr as usize)
    }

    fn selected_mut(&mut self) -> Option<&mut CounterRegisters> {
        self.counters.get_mut(self.pmselr as usize)
    }
}

/// The registers of one PMU, routed to the hardware or to the in-memory copy.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegisterFile {
    active: bool,
    logical: LogicalState,
}

impl RegisterFile {
    /// Creates an inactive register file backed by `logical`.
    pub fn new(logical: LogicalState) -> Self {
        Self {
            active: false,
            logical,
        }
    }

    /// Returns whether accesses currently go to the hardware.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Routes accesses to the hardware if `active`, otherwise to the in-memory copy.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Returns the in-memory copy.
    pub fn logical(&self) -> &LogicalState {
        &self.logical
    }

    /// Returns the in-memory copy for modification.
    pub fn logical_mut(&mut self) -> &mut LogicalState {
        &mut self.logical
    }

    /// Reads `register`.
    pub fn read(&self, register: PmuRegister) -> u32 {
        if self.active {
            read_register(register)
        } else {
            self.logical.get(register)
        }
    }

    /// Writes `value` to `register`.
    pub fn write(&mut self, register: PmuRegister, value: u32) {
        if self.active {
            write_register(register, value);
        } else {
            self.logical.set(register, value);
        }
    }

    /// Sets `mask` by writing it to the hardware `register`, or by setting it in the in-memory
    /// copy of `logical_register`.
    ///
    /// This is how the write-one-to-set registers such as `PMCNTENSET` are used: their in-memory
    /// copy records the accumulated set of bits.
    pub fn set_bits(&mut self, register: PmuRegister, logical_register: PmuRegister, mask: u32) {
        if self.active {
            write_register(register, mask);
        } else {
            let value = self.logical.get(logical_register);
            self.logical.set(logical_register, value | mask);
        }
    }

    /// Clears `mask` by writing it to the hardware `register`, or by clearing it in the in-memory
    /// copy of `logical_register`.
    pub fn clear_bits(&mut self, register: PmuRegister, logical_register: PmuRegister, mask: u32) {
        if self.active {
            write_register(register, mask);
        } else {
            let value = self.logical.get(logical_register);
            self.logical.set(logical_register, value & !mask);
        }
    }

    /// Copies `register` from the hardware into the in-memory copy, returning the value.
    pub fn save(&mut self, register: PmuRegister) -> u32 {
        let value = read_register(register);
        self.logical.set(register, value);
        value
    }

    /// Copies `register` from the in-memory copy to the hardware, returning the value.
    pub fn restore(&mut self, register: PmuRegister) -> u32 {
        let value = self.logical.get(register);
        write_register(register, value);
        value
    }
}
