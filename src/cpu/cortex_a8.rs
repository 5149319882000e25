// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use crate::{
    armv7::{
        ArmV7Part, CPU_CYCLES, DTLB_REFILL, INSTR_EXECUTED, ITLB_REFILL, L1_DCACHE_ACCESS,
        L1_DCACHE_REFILL, L1_ICACHE_REFILL, PC_BRANCH_MIS_PRED, PC_BRANCH_PRED, PC_WRITE,
    },
    event::{CacheEventMap, CacheLevel::*, CacheOp::*, HardwareEvent, HardwareEventMap},
};

/// Level 2 cache access.
pub const L2_CACHE_ACCESS: u32 = 0x43;
/// Level 2 cache refill.
pub const L2_CACHE_REFILL: u32 = 0x44;
/// Level 1 instruction cache access.
pub const L1_ICACHE_ACCESS: u32 = 0x50;
/// Cycles stalled on the instruction side.
pub const STALL_ISIDE: u32 = 0x56;

/// Cortex-A8.
pub struct CortexA8;

impl ArmV7Part for CortexA8 {
    const NAME: &'static str = "ARMv7_Cortex_A8";
    const COMPATIBLE: &'static str = "arm,cortex-a8-pmu";
    const PART_NUMBER: u16 = 0xc080;
    const EVENT_FILTER: bool = false;

    const PERF_MAP: HardwareEventMap = HardwareEventMap::new()
        .with(HardwareEvent::CpuCycles, CPU_CYCLES)
        .with(HardwareEvent::Instructions, INSTR_EXECUTED)
        .with(HardwareEvent::CacheReferences, L1_DCACHE_ACCESS)
        .with(HardwareEvent::CacheMisses, L1_DCACHE_REFILL)
        .with(HardwareEvent::BranchInstructions, PC_WRITE)
        .with(HardwareEvent::BranchMisses, PC_BRANCH_MIS_PRED)
        .with(HardwareEvent::StalledCyclesFrontend, STALL_ISIDE);

    const CACHE_MAP: CacheEventMap = CacheEventMap::new()
        .access(L1d, Read, L1_DCACHE_ACCESS)
        .miss(L1d, Read, L1_DCACHE_REFILL)
        .access(L1d, Write, L1_DCACHE_ACCESS)
        .miss(L1d, Write, L1_DCACHE_REFILL)
        .access(L1i, Read, L1_ICACHE_ACCESS)
        .miss(L1i, Read, L1_ICACHE_REFILL)
        .access(Ll, Read, L2_CACHE_ACCESS)
        .miss(Ll, Read, L2_CACHE_REFILL)
        .access(Ll, Write, L2_CACHE_ACCESS)
        .miss(Ll, Write, L2_CACHE_REFILL)
        .miss(Dtlb, Read, DTLB_REFILL)
        .miss(Dtlb, Write, DTLB_REFILL)
        .miss(Itlb, Read, ITLB_REFILL)
        .miss(Itlb, Write, ITLB_REFILL)
        .access(Bpu, Read, PC_BRANCH_PRED)
        .miss(Bpu, Read, PC_BRANCH_MIS_PRED)
        .access(Bpu, Write, PC_BRANCH_PRED)
        .miss(Bpu, Write, PC_BRANCH_MIS_PRED);
}
