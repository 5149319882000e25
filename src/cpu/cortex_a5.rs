// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use crate::{
    armv7::{
        ArmV7Part, CPU_CYCLES, DTLB_REFILL, INSTR_EXECUTED, ITLB_REFILL, L1_DCACHE_ACCESS,
        L1_DCACHE_REFILL, L1_ICACHE_ACCESS, L1_ICACHE_REFILL, PC_BRANCH_MIS_PRED, PC_BRANCH_PRED,
        PC_WRITE,
    },
    event::{CacheEventMap, CacheLevel::*, CacheOp::*, HardwareEvent, HardwareEventMap},
};

/// Linefill caused by a prefetch.
pub const PREFETCH_LINEFILL: u32 = 0xc2;
/// Prefetch dropped because the line was already cached.
pub const PREFETCH_LINEFILL_DROP: u32 = 0xc3;

/// Cortex-A5.
pub struct CortexA5;

impl ArmV7Part for CortexA5 {
    const NAME: &'static str = "ARMv7_Cortex_A5";
    const COMPATIBLE: &'static str = "arm,cortex-a5-pmu";
    const PART_NUMBER: u16 = 0xc050;
    const EVENT_FILTER: bool = false;

    const PERF_MAP: HardwareEventMap = HardwareEventMap::new()
        .with(HardwareEvent::CpuCycles, CPU_CYCLES)
        .with(HardwareEvent::Instructions, INSTR_EXECUTED)
        .with(HardwareEvent::CacheReferences, L1_DCACHE_ACCESS)
        .with(HardwareEvent::CacheMisses, L1_DCACHE_REFILL)
        .with(HardwareEvent::BranchInstructions, PC_WRITE)
        .with(HardwareEvent::BranchMisses, PC_BRANCH_MIS_PRED);

    const CACHE_MAP: CacheEventMap = CacheEventMap::new()
        .access(L1d, Read, L1_DCACHE_ACCESS)
        .miss(L1d, Read, L1_DCACHE_REFILL)
        .access(L1d, Write, L1_DCACHE_ACCESS)
        .miss(L1d, Write, L1_DCACHE_REFILL)
        .access(L1d, Prefetch, PREFETCH_LINEFILL)
        .miss(L1d, Prefetch, PREFETCH_LINEFILL_DROP)
        .access(L1i, Read, L1_ICACHE_ACCESS)
        .miss(L1i, Read, L1_ICACHE_REFILL)
        // The prefetch counters don't differentiate between the I side and the D side.
        .access(L1i, Prefetch, PREFETCH_LINEFILL)
        .miss(L1i, Prefetch, PREFETCH_LINEFILL_DROP)
        .miss(Dtlb, Read, DTLB_REFILL)
        .miss(Dtlb, Write, DTLB_REFILL)
        .miss(Itlb, Read, ITLB_REFILL)
        .miss(Itlb, Write, ITLB_REFILL)
        .access(Bpu, Read, PC_BRANCH_PRED)
        .miss(Bpu, Read, PC_BRANCH_MIS_PRED)
        .access(Bpu, Write, PC_BRANCH_PRED)
        .miss(Bpu, Write, PC_BRANCH_MIS_PRED);
}
