// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Access to the ARMv7 CP15 Performance Monitors registers and the CPU identification registers.
//!
//! On 32-bit Arm targets the accessors issue `mrc`/`mcr` instructions. Everywhere else, or with the
//! `fakes` feature, they operate on a per-thread fake machine which can be inspected by unit tests.

#![cfg_attr(
    all(target_arch = "arm", not(any(test, feature = "fakes"))),
    no_std
)]

#[cfg(all(target_arch = "arm", not(any(test, feature = "fakes"))))]
mod armv7;
#[cfg(not(all(target_arch = "arm", not(any(test, feature = "fakes")))))]
pub mod fake;
mod macros;

#[cfg(all(target_arch = "arm", not(any(test, feature = "fakes"))))]
pub use armv7::{isb, read_midr, read_mpidr};
#[cfg(not(all(target_arch = "arm", not(any(test, feature = "fakes")))))]
pub use fake::{isb, read_midr, read_mpidr};

use bitflags::bitflags;
use core::fmt::{self, Debug, Formatter};

#[doc(hidden)]
pub use paste as _paste;

/// The CP15 Performance Monitors registers of an ARMv7 PMU.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PmuRegister {
    /// Performance Monitors Control Register.
    Pmcr,
    /// Count Enable Set Register.
    Pmcntenset,
    /// Count Enable Clear Register.
    Pmcntenclr,
    /// Overflow Flag Status Register.
    Pmovsr,
    /// Software Increment Register. Write-only.
    Pmswinc,
    /// Event Counter Selection Register.
    Pmselr,
    /// Common Event Identification Register 0. Read-only.
    Pmceid0,
    /// Common Event Identification Register 1. Read-only.
    Pmceid1,
    /// Cycle Count Register.
    Pmccntr,
    /// Event Type Select Register of the counter selected by `PMSELR`.
    Pmxevtyper,
    /// Event Count Register of the counter selected by `PMSELR`.
    Pmxevcntr,
    /// User Enable Register.
    Pmuserenr,
    /// Interrupt Enable Set Register.
    Pmintenset,
    /// Interrupt Enable Clear Register.
    Pmintenclr,
    /// Overflow Flag Status Set Register.
    Pmovsset,
}

impl PmuRegister {
    /// All PMU registers, in encoding order.
    pub const ALL: [Self; 15] = [
        Self::Pmcr,
        Self::Pmcntenset,
        Self::Pmcntenclr,
        Self::Pmovsr,
        Self::Pmswinc,
        Self::Pmselr,
        Self::Pmceid0,
        Self::Pmceid1,
        Self::Pmccntr,
        Self::Pmxevtyper,
        Self::Pmxevcntr,
        Self::Pmuserenr,
        Self::Pmintenset,
        Self::Pmintenclr,
        Self::Pmovsset,
    ];
}

bitflags! {
    /// PMCR register value.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct Pmcr: u32 {
        /// Enable all counters.
        const E = 1 << 0;
        /// Reset all event counters to zero.
        const P = 1 << 1;
        /// Reset the cycle counter to zero.
        const C = 1 << 2;
        /// Cycle counter counts every 64th cycle.
        const D = 1 << 3;
        /// Export events to an external debug device.
        const X = 1 << 4;
        /// Disable the cycle counter where event counting is prohibited.
        const DP = 1 << 5;
    }
}

impl Pmcr {
    /// Bits of PMCR which software may write.
    pub const WRITABLE_MASK: u32 = 0x3f;
    /// Position of the lowest bit of the N field.
    pub const N_SHIFT: u32 = 11;
    /// Mask for the N field, after shifting.
    pub const N_MASK: u32 = 0x1f;

    /// Returns the number of event counters implemented, not including the cycle counter.
    pub const fn event_counters(self) -> u32 {
        (self.bits() >> Self::N_SHIFT) & Self::N_MASK
    }
}

bitflags! {
    /// MPIDR register value.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct Mpidr: u32 {
        /// MT
        const MT = 1 << 24;
        /// U
        const U = 1 << 30;
        /// Multiprocessing Extensions register format.
        const M = 1 << 31;
    }
}

impl Mpidr {
    /// Mask for the three affinity levels.
    pub const AFFINITY_MASK: u32 = 0x00ff_ffff;
    /// Position of the lowest bit in the Aff0 field.
    pub const AFF0_SHIFT: u32 = 0;
    /// Position of the lowest bit in the Aff1 field.
    pub const AFF1_SHIFT: u32 = 8;
    /// Position of the lowest bit in the Aff2 field.
    pub const AFF2_SHIFT: u32 = 16;

    /// Builds a multiprocessor-format value for core `aff0` of cluster `aff1`.
    pub const fn from_affinity(aff1: u8, aff0: u8) -> Self {
        Self::from_bits_retain(
            Self::M.bits() | (aff1 as u32) << Self::AFF1_SHIFT | (aff0 as u32) << Self::AFF0_SHIFT,
        )
    }

    /// Returns the Aff0 field, the core within its cluster.
    pub const fn aff0(self) -> u8 {
        (self.bits() >> Self::AFF0_SHIFT) as u8
    }

    /// Returns the Aff1 field, the cluster.
    pub const fn aff1(self) -> u8 {
        (self.bits() >> Self::AFF1_SHIFT) as u8
    }

    /// Returns the Aff2 field.
    pub const fn aff2(self) -> u8 {
        (self.bits() >> Self::AFF2_SHIFT) as u8
    }

    /// Returns the affinity fields only, with the format bits masked off.
    pub const fn affinity(self) -> u32 {
        self.bits() & Self::AFFINITY_MASK
    }
}

/// MIDR register value.
#[derive(Clone, Copy, Eq, PartialEq)]
#[repr(transparent)]
pub struct Midr(u32);

impl Midr {
    /// Implementer code of Arm Limited.
    pub const IMPLEMENTER_ARM: u8 = 0x41;
    /// Implementer code of Intel, used by XScale cores.
    pub const IMPLEMENTER_INTEL: u8 = 0x69;

    const IMPLEMENTER_MASK: u32 = 0xff00_0000;
    const IMPLEMENTER_SHIFT: u32 = 24;
    const PART_NUMBER_MASK: u32 = 0xfff0;
    const XSCALE_ARCH_SHIFT: u32 = 13;
    const XSCALE_ARCH_MASK: u32 = 0x7;

    /// Wraps a raw MIDR value.
    pub const fn from_bits_retain(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns the implementer code.
    pub const fn implementer(self) -> u8 {
        ((self.0 & Self::IMPLEMENTER_MASK) >> Self::IMPLEMENTER_SHIFT) as u8
    }

    /// Returns the primary part number, with the revision nibble masked off.
    pub const fn part_number(self) -> u16 {
        (self.0 & Self::PART_NUMBER_MASK) as u16
    }

    /// Returns the XScale architecture version field, which Intel cores report in place of the
    /// part number.
    pub const fn xscale_arch(self) -> u16 {
        ((self.0 >> Self::XSCALE_ARCH_SHIFT) & Self::XSCALE_ARCH_MASK) as u16
    }
}

impl Debug for Midr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Midr({:#010x})", self.0)
    }
}

read_write_cp15!(pmcr: Pmcr, u32: Pmcr, 0, c9, c12, 0);
read_write_cp15!(pmcntenset: Pmcntenset, u32, 0, c9, c12, 1);
read_write_cp15!(pmcntenclr: Pmcntenclr, u32, 0, c9, c12, 2);
read_write_cp15!(pmovsr: Pmovsr, u32, 0, c9, c12, 3);
write_cp15!(pmswinc: Pmswinc, u32, 0, c9, c12, 4);
read_write_cp15!(pmselr: Pmselr, u32, 0, c9, c12, 5);
read_cp15!(pmceid0: Pmceid0, u32, 0, c9, c12, 6);
read_cp15!(pmceid1: Pmceid1, u32, 0, c9, c12, 7);
read_write_cp15!(pmccntr: Pmccntr, u32, 0, c9, c13, 0);
read_write_cp15!(pmxevtyper: Pmxevtyper, u32, 0, c9, c13, 1);
read_write_cp15!(pmxevcntr: Pmxevcntr, u32, 0, c9, c13, 2);
read_write_cp15!(pmuserenr: Pmuserenr, u32, 0, c9, c14, 0);
read_write_cp15!(pmintenset: Pmintenset, u32, 0, c9, c14, 1);
read_write_cp15!(pmintenclr: Pmintenclr, u32, 0, c9, c14, 2);
read_write_cp15!(pmovsset: Pmovsset, u32, 0, c9, c14, 3);

/// Reads the given PMU register of the current CPU.
///
/// Reading the write-only `PMSWINC` returns zero without touching the hardware.
pub fn read_register(register: PmuRegister) -> u32 {
    match register {
        PmuRegister::Pmcr => read_pmcr().bits(),
        PmuRegister::Pmcntenset => read_pmcntenset(),
        PmuRegister::Pmcntenclr => read_pmcntenclr(),
        PmuRegister::Pmovsr => read_pmovsr(),
        PmuRegister::Pmswinc => 0,
        PmuRegister::Pmselr => read_pmselr(),
        PmuRegister::Pmceid0 => read_pmceid0(),
        PmuRegister::Pmceid1 => read_pmceid1(),
        PmuRegister::Pmccntr => read_pmccntr(),
        PmuRegister::Pmxevtyper => read_pmxevtyper(),
        PmuRegister::Pmxevcntr => read_pmxevcntr(),
        PmuRegister::Pmuserenr => read_pmuserenr(),
        PmuRegister::Pmintenset => read_pmintenset(),
        PmuRegister::Pmintenclr => read_pmintenclr(),
        PmuRegister::Pmovsset => read_pmovsset(),
    }
}

/// Writes `value` to the given PMU register of the current CPU.
///
/// Writes to the read-only `PMCEID0` and `PMCEID1` are ignored.
pub fn write_register(register: PmuRegister, value: u32) {
    match register {
        PmuRegister::Pmcr => write_pmcr(Pmcr::from_bits_retain(value)),
        PmuRegister::Pmcntenset => write_pmcntenset(value),
        PmuRegister::Pmcntenclr => write_pmcntenclr(value),
        PmuRegister::Pmovsr => write_pmovsr(value),
        PmuRegister::Pmswinc => write_pmswinc(value),
        PmuRegister::Pmselr => write_pmselr(value),
        PmuRegister::Pmceid0 | PmuRegister::Pmceid1 => {}
        PmuRegister::Pmccntr => write_pmccntr(value),
        PmuRegister::Pmxevtyper => write_pmxevtyper(value),
        PmuRegister::Pmxevcntr => write_pmxevcntr(value),
        PmuRegister::Pmuserenr => write_pmuserenr(value),
        PmuRegister::Pmintenset => write_pmintenset(value),
        PmuRegister::Pmintenclr => write_pmintenclr(value),
        PmuRegister::Pmovsset => write_pmovsset(value),
    }
}
