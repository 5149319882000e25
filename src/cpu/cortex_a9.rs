// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use crate::{
    armv7::{
        ArmV7Part, CPU_CYCLES, DTLB_REFILL, ITLB_REFILL, L1_DCACHE_ACCESS, L1_DCACHE_REFILL,
        L1_ICACHE_REFILL, PC_BRANCH_MIS_PRED, PC_BRANCH_PRED, PC_WRITE,
    },
    event::{
        CacheEventMap, CacheLevel::*, CacheOp::*, HardwareEvent, HardwareEventMap,
    },
};

/// Instructions going through the register renaming stage.
pub const INSTR_CORE_RENAME: u32 = 0x68;
/// Cycles stalled waiting for the instruction cache.
pub const STALL_ICACHE: u32 = 0x60;
/// Cycles stalled in the dispatch stage.
pub const STALL_DISPATCH: u32 = 0x66;

/// Cortex-A9.
pub struct CortexA9;

impl ArmV7Part for CortexA9 {
    const NAME: &'static str = "ARMv7_Cortex_A9";
    const COMPATIBLE: &'static str = "arm,cortex-a9-pmu";
    const PART_NUMBER: u16 = 0xc090;
    const EVENT_FILTER: bool = false;

    const PERF_MAP: HardwareEventMap = HardwareEventMap::new()
        .with(HardwareEvent::CpuCycles, CPU_CYCLES)
        .with(HardwareEvent::Instructions, INSTR_CORE_RENAME)
        .with(HardwareEvent::CacheReferences, L1_DCACHE_ACCESS)
        .with(HardwareEvent::CacheMisses, L1_DCACHE_REFILL)
        .with(HardwareEvent::BranchInstructions, PC_WRITE)
        .with(HardwareEvent::BranchMisses, PC_BRANCH_MIS_PRED)
        .with(HardwareEvent::StalledCyclesFrontend, STALL_ICACHE)
        .with(HardwareEvent::StalledCyclesBackend, STALL_DISPATCH);

    // The performance counters don't differentiate between read and write accesses or misses,
    // so the read and write events are the same.
    const CACHE_MAP: CacheEventMap = CacheEventMap::new()
        .access(L1d, Read, L1_DCACHE_ACCESS)
        .miss(L1d, Read, L1_DCACHE_REFILL)
        .access(L1d, Write, L1_DCACHE_ACCESS)
        .miss(L1d, Write, L1_DCACHE_REFILL)
        .miss(L1i, Read, L1_ICACHE_REFILL)
        .miss(Dtlb, Read, DTLB_REFILL)
        .miss(Dtlb, Write, DTLB_REFILL)
        .miss(Itlb, Read, ITLB_REFILL)
        .miss(Itlb, Write, ITLB_REFILL)
        .access(Bpu, Read, PC_BRANCH_PRED)
        .miss(Bpu, Read, PC_BRANCH_MIS_PRED)
        .access(Bpu, Write, PC_BRANCH_PRED)
        .miss(Bpu, Write, PC_BRANCH_MIS_PRED);
}
