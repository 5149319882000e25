// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Operations common to all ARMv7 Performance Monitors.

use crate::{
    allocator::{self, CYCLE_COUNTER_INDEX, FIRST_EVENT_COUNTER_INDEX, MAX_COUNTERS},
    cpu::Microarchitecture,
    error::PmuError,
    event::{CacheEventMap, EventAttr, EventConfig, HardwareEventMap, ModeExclusion, map_event},
    instance::CpuPmuState,
    regs::LogicalState,
};
use armv7_pmu_regs::{Midr, Pmcr, PmuRegister, isb, read_pmceid0, read_pmceid1, read_pmcr};
use bitflags::bitflags;
use core::marker::PhantomData;
use log::{error, info};

/// Software increment.
pub const SW_INCR: u32 = 0x00;
/// Level 1 instruction cache refill.
pub const L1_ICACHE_REFILL: u32 = 0x01;
/// Instruction TLB refill.
pub const ITLB_REFILL: u32 = 0x02;
/// Level 1 data cache refill.
pub const L1_DCACHE_REFILL: u32 = 0x03;
/// Level 1 data cache access.
pub const L1_DCACHE_ACCESS: u32 = 0x04;
/// Data TLB refill.
pub const DTLB_REFILL: u32 = 0x05;
/// Memory read.
pub const MEM_READ: u32 = 0x06;
/// Memory write.
pub const MEM_WRITE: u32 = 0x07;
/// Instruction architecturally executed.
pub const INSTR_EXECUTED: u32 = 0x08;
/// Exception taken.
pub const EXC_TAKEN: u32 = 0x09;
/// Exception return.
pub const EXC_EXECUTED: u32 = 0x0a;
/// Write to CONTEXTIDR.
pub const CID_WRITE: u32 = 0x0b;
/// Software change of the PC.
pub const PC_WRITE: u32 = 0x0c;
/// Immediate branch.
pub const PC_IMM_BRANCH: u32 = 0x0d;
/// Procedure return.
pub const PC_PROC_RETURN: u32 = 0x0e;
/// Unaligned load or store.
pub const MEM_UNALIGNED_ACCESS: u32 = 0x0f;
/// Mispredicted or not predicted branch.
pub const PC_BRANCH_MIS_PRED: u32 = 0x10;
/// Cycle.
pub const CLOCK_CYCLES: u32 = 0x11;
/// Predictable branch.
pub const PC_BRANCH_PRED: u32 = 0x12;
/// Data memory access.
pub const MEM_ACCESS: u32 = 0x13;
/// Level 1 instruction cache access.
pub const L1_ICACHE_ACCESS: u32 = 0x14;
/// Level 1 data cache write-back.
pub const L1_DCACHE_WB: u32 = 0x15;
/// Level 2 data cache access.
pub const L2_CACHE_ACCESS: u32 = 0x16;
/// Level 2 data cache refill.
pub const L2_CACHE_REFILL: u32 = 0x17;
/// Level 2 data cache write-back.
pub const L2_CACHE_WB: u32 = 0x18;
/// Bus access.
pub const BUS_ACCESS: u32 = 0x19;
/// Local memory error.
pub const MEM_ERROR: u32 = 0x1a;
/// Instruction speculatively executed.
pub const INSTR_SPEC: u32 = 0x1b;
/// Write to TTBR.
pub const TTBR_WRITE: u32 = 0x1c;
/// Bus cycle.
pub const BUS_CYCLES: u32 = 0x1d;
/// Event number which selects the dedicated cycle counter.
pub const CPU_CYCLES: u32 = 0xff;

/// Largest raw event number.
pub const MAX_EVENT: u32 = 0xff;

/// Bits of `PMXEVTYPER` which software may write.
const EVTYPE_MASK: u32 = 0xc800_00ff;
/// The event number field of `PMXEVTYPER`.
const EVTYPE_EVENT: u32 = 0xff;
/// The overflow flags of all counters.
const FLAG_MASK: u32 = 0xffff_ffff;

bitflags! {
    /// Mode filter bits of `PMXEVTYPER`, on cores with the Virtualization Extensions.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct EventFilter: u32 {
        /// Don't count in PL1.
        const EXCLUDE_PL1 = 1 << 31;
        /// Don't count in PL0.
        const EXCLUDE_USER = 1 << 30;
        /// Count in Hyp mode too.
        const INCLUDE_HYP = 1 << 27;
    }
}

/// Describes one ARMv7 core whose PMU follows the common programming model.
pub trait ArmV7Part: Sync + 'static {
    /// PMU name.
    const NAME: &'static str;
    /// Device tree compatible string.
    const COMPATIBLE: &'static str;
    /// MIDR primary part number.
    const PART_NUMBER: u16;
    /// Whether `PMXEVTYPER` has the mode filter bits.
    const EVENT_FILTER: bool;
    /// Hardware event numbers of the generic hardware events.
    const PERF_MAP: HardwareEventMap;
    /// Hardware event numbers of the generic cache events.
    const CACHE_MAP: CacheEventMap;
}

/// The ARMv7 PMU of part `T`.
#[derive(Debug)]
pub struct ArmV7Pmu<T: ArmV7Part>(PhantomData<T>);

impl<T: ArmV7Part> ArmV7Pmu<T> {
    /// The descriptor of this PMU.
    pub const DESCRIPTOR: Self = Self(PhantomData);
}

/// Converts a counter index into the counter number used by the per-counter register bits.
///
/// The cycle counter is bit 31, event counter `n` is index `n + 1`.
fn idx_to_counter(idx: usize) -> u32 {
    (idx.wrapping_sub(FIRST_EVENT_COUNTER_INDEX) & (MAX_COUNTERS - 1)) as u32
}

fn counter_bit(idx: usize) -> u32 {
    1 << idx_to_counter(idx)
}

fn counter_valid(pmu: &CpuPmuState, idx: usize) -> bool {
    idx < pmu.num_counters()
}

fn pmnc_read(pmu: &CpuPmuState) -> u32 {
    pmu.regs().read(PmuRegister::Pmcr)
}

fn pmnc_write(pmu: &mut CpuPmuState, value: u32) {
    pmu.regs_mut().write(PmuRegister::Pmcr, value & Pmcr::WRITABLE_MASK);
    isb();
}

fn select_counter(pmu: &mut CpuPmuState, idx: usize) {
    pmu.regs_mut().write(PmuRegister::Pmselr, idx_to_counter(idx));
    isb();
}

fn write_evtsel(pmu: &mut CpuPmuState, idx: usize, value: u32) {
    select_counter(pmu, idx);
    pmu.regs_mut()
        .write(PmuRegister::Pmxevtyper, value & EVTYPE_MASK);
}

fn enable_counter(pmu: &mut CpuPmuState, idx: usize) {
    pmu.regs_mut().set_bits(
        PmuRegister::Pmcntenset,
        PmuRegister::Pmcntenset,
        counter_bit(idx),
    );
}

fn disable_counter(pmu: &mut CpuPmuState, idx: usize) {
    pmu.regs_mut().clear_bits(
        PmuRegister::Pmcntenclr,
        PmuRegister::Pmcntenset,
        counter_bit(idx),
    );
}

fn enable_intens(pmu: &mut CpuPmuState, idx: usize) {
    pmu.regs_mut().set_bits(
        PmuRegister::Pmintenset,
        PmuRegister::Pmintenset,
        counter_bit(idx),
    );
}

fn disable_intens(pmu: &mut CpuPmuState, idx: usize) {
    let bit = counter_bit(idx);
    let regs = pmu.regs_mut();
    regs.clear_bits(PmuRegister::Pmintenclr, PmuRegister::Pmintenset, bit);
    isb();
    // Clear the overflow flag in case an interrupt is pending.
    regs.clear_bits(PmuRegister::Pmovsr, PmuRegister::Pmovsr, bit);
    isb();
}

/// Copies the per-counter registers of every event counter between the hardware and the
/// in-memory copy.
fn transfer_counters(pmu: &mut CpuPmuState, save: bool) {
    for idx in FIRST_EVENT_COUNTER_INDEX..pmu.num_counters() {
        select_counter(pmu, idx);
        let regs = pmu.regs_mut();
        regs.logical_mut()
            .set(PmuRegister::Pmselr, idx_to_counter(idx));
        for register in [PmuRegister::Pmxevtyper, PmuRegister::Pmxevcntr] {
            if save {
                regs.save(register);
            } else {
                regs.restore(register);
            }
        }
    }
}

impl<T: ArmV7Part> Microarchitecture for ArmV7Pmu<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn compatible(&self) -> &'static str {
        T::COMPATIBLE
    }

    fn implementer(&self) -> u8 {
        Midr::IMPLEMENTER_ARM
    }

    fn part_number(&self) -> u16 {
        T::PART_NUMBER
    }

    fn init(&self) -> Result<usize, PmuError> {
        // The cycle counter is always there, in addition to the N event counters.
        let num_counters = read_pmcr().event_counters() as usize + 1;
        info!("{} PMU has {num_counters} counters", T::NAME);
        Ok(num_counters)
    }

    fn cpu_init(&self, num_counters: usize) -> LogicalState {
        let mut logical = LogicalState::new(num_counters);
        logical.set(PmuRegister::Pmceid0, read_pmceid0());
        logical.set(PmuRegister::Pmceid1, read_pmceid1());
        logical
    }

    fn map_event(&self, config: &EventConfig) -> Result<u32, PmuError> {
        map_event(config, &T::PERF_MAP, &T::CACHE_MAP, MAX_EVENT)
    }

    fn has_event_filter(&self) -> bool {
        T::EVENT_FILTER
    }

    fn set_event_filter(&self, attr: &EventAttr) -> Result<u32, PmuError> {
        if !T::EVENT_FILTER || attr.exclude.contains(ModeExclusion::IDLE) {
            return Err(PmuError::PermissionDenied);
        }
        let mut filter = EventFilter::empty();
        if attr.exclude.contains(ModeExclusion::USER) {
            filter |= EventFilter::EXCLUDE_USER;
        }
        if attr.exclude.contains(ModeExclusion::KERNEL) {
            filter |= EventFilter::EXCLUDE_PL1;
        }
        if !attr.exclude.contains(ModeExclusion::HYPERVISOR) {
            filter |= EventFilter::INCLUDE_HYP;
        }
        Ok(filter.bits())
    }

    fn get_event_idx(&self, pmu: &mut CpuPmuState, config_base: u32) -> Result<usize, PmuError> {
        let num_counters = pmu.num_counters();
        let cycle_count = config_base & EVTYPE_EVENT == CPU_CYCLES;
        allocator::allocate(pmu.used_mask_mut(), num_counters, cycle_count)
    }

    fn enable(&self, pmu: &mut CpuPmuState, idx: usize, config_base: u32) {
        if !counter_valid(pmu, idx) {
            error!("{} enabling wrong PMNC counter {idx}", pmu.cpu());
            return;
        }

        disable_counter(pmu, idx);
        // The cycle counter has no event to select, but it does have the filter bits.
        if T::EVENT_FILTER || idx != CYCLE_COUNTER_INDEX {
            write_evtsel(pmu, idx, config_base);
        }
        enable_intens(pmu, idx);
        enable_counter(pmu, idx);
    }

    fn disable(&self, pmu: &mut CpuPmuState, idx: usize) {
        if !counter_valid(pmu, idx) {
            error!("{} disabling wrong PMNC counter {idx}", pmu.cpu());
            return;
        }

        disable_counter(pmu, idx);
        disable_intens(pmu, idx);
    }

    fn read_counter(&self, pmu: &mut CpuPmuState, idx: usize) -> u32 {
        if !counter_valid(pmu, idx) {
            error!("{} reading wrong counter {idx}", pmu.cpu());
            0
        } else if idx == CYCLE_COUNTER_INDEX {
            pmu.regs().read(PmuRegister::Pmccntr)
        } else {
            select_counter(pmu, idx);
            pmu.regs().read(PmuRegister::Pmxevcntr)
        }
    }

    fn write_counter(&self, pmu: &mut CpuPmuState, idx: usize, value: u32) {
        if !counter_valid(pmu, idx) {
            error!("{} writing wrong counter {idx}", pmu.cpu());
        } else if idx == CYCLE_COUNTER_INDEX {
            pmu.regs_mut().write(PmuRegister::Pmccntr, value);
        } else {
            select_counter(pmu, idx);
            pmu.regs_mut().write(PmuRegister::Pmxevcntr, value);
        }
    }

    fn start(&self, pmu: &mut CpuPmuState) {
        let value = pmnc_read(pmu) | Pmcr::E.bits();
        pmnc_write(pmu, value);
    }

    fn stop(&self, pmu: &mut CpuPmuState) {
        let value = pmnc_read(pmu) & !Pmcr::E.bits();
        pmnc_write(pmu, value);
    }

    fn reset(&self, pmu: &mut CpuPmuState) {
        if !pmu.check_active() {
            return;
        }

        for idx in CYCLE_COUNTER_INDEX..pmu.num_counters() {
            disable_counter(pmu, idx);
            disable_intens(pmu, idx);
        }
        pmnc_write(pmu, (Pmcr::P | Pmcr::C).bits());
    }

    fn save_regs(&self, pmu: &mut CpuPmuState) {
        if !pmu.regs().is_active() || pmu.used_mask().is_empty() {
            return;
        }

        let pmcr = pmu.regs_mut().save(PmuRegister::Pmcr);
        if pmcr & Pmcr::E.bits() == 0 {
            return;
        }

        let regs = pmu.regs_mut();
        for register in [
            PmuRegister::Pmcntenset,
            PmuRegister::Pmuserenr,
            PmuRegister::Pmintenset,
            PmuRegister::Pmccntr,
        ] {
            regs.save(register);
        }
        transfer_counters(pmu, true);
    }

    fn restore_regs(&self, pmu: &mut CpuPmuState) {
        self.reset(pmu);

        if !pmu.regs().is_active() || pmu.used_mask().is_empty() {
            return;
        }
        if pmu.regs().logical().get(PmuRegister::Pmcr) & Pmcr::E.bits() == 0 {
            return;
        }

        let regs = pmu.regs_mut();
        for register in [
            PmuRegister::Pmcntenset,
            PmuRegister::Pmuserenr,
            PmuRegister::Pmintenset,
            PmuRegister::Pmccntr,
        ] {
            regs.restore(register);
        }
        transfer_counters(pmu, false);
        pmu.regs_mut().restore(PmuRegister::Pmcr);
    }

    fn read_and_clear_overflow(&self, pmu: &mut CpuPmuState) -> u32 {
        let flags = pmu.regs().read(PmuRegister::Pmovsr) & FLAG_MASK;
        pmu.regs_mut()
            .clear_bits(PmuRegister::Pmovsr, PmuRegister::Pmovsr, flags);
        flags
    }

    fn counter_has_overflowed(&self, overflow: u32, idx: usize) -> bool {
        overflow & counter_bit(idx) != 0
    }

    fn max_period(&self) -> u64 {
        u32::MAX.into()
    }
}
