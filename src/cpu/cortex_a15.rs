// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use crate::{
    armv7::{
        ArmV7Part, BUS_CYCLES, CPU_CYCLES, INSTR_EXECUTED, ITLB_REFILL, L1_DCACHE_ACCESS,
        L1_DCACHE_REFILL, L1_ICACHE_ACCESS, L1_ICACHE_REFILL, PC_BRANCH_MIS_PRED, PC_BRANCH_PRED,
    },
    event::{CacheEventMap, CacheLevel::*, CacheOp::*, HardwareEvent, HardwareEventMap},
};

/// Level 1 data cache read access.
pub const L1_DCACHE_ACCESS_READ: u32 = 0x40;
/// Level 1 data cache write access.
pub const L1_DCACHE_ACCESS_WRITE: u32 = 0x41;
/// Level 1 data cache read refill.
pub const L1_DCACHE_REFILL_READ: u32 = 0x42;
/// Level 1 data cache write refill.
pub const L1_DCACHE_REFILL_WRITE: u32 = 0x43;
/// Data TLB refill on read.
pub const DTLB_REFILL_L1_READ: u32 = 0x4c;
/// Data TLB refill on write.
pub const DTLB_REFILL_L1_WRITE: u32 = 0x4d;
/// Level 2 cache read access.
pub const L2_CACHE_ACCESS_READ: u32 = 0x50;
/// Level 2 cache write access.
pub const L2_CACHE_ACCESS_WRITE: u32 = 0x51;
/// Level 2 cache read refill.
pub const L2_CACHE_REFILL_READ: u32 = 0x52;
/// Level 2 cache write refill.
pub const L2_CACHE_REFILL_WRITE: u32 = 0x53;
/// Speculative software change of the PC.
pub const PC_WRITE_SPEC: u32 = 0x76;

/// Cortex-A15.
pub struct CortexA15;

impl ArmV7Part for CortexA15 {
    const NAME: &'static str = "ARMv7_Cortex_A15";
    const COMPATIBLE: &'static str = "arm,cortex-a15-pmu";
    const PART_NUMBER: u16 = 0xc0f0;
    const EVENT_FILTER: bool = true;

    const PERF_MAP: HardwareEventMap = HardwareEventMap::new()
        .with(HardwareEvent::CpuCycles, CPU_CYCLES)
        .with(HardwareEvent::Instructions, INSTR_EXECUTED)
        .with(HardwareEvent::CacheReferences, L1_DCACHE_ACCESS)
        .with(HardwareEvent::CacheMisses, L1_DCACHE_REFILL)
        .with(HardwareEvent::BranchInstructions, PC_WRITE_SPEC)
        .with(HardwareEvent::BranchMisses, PC_BRANCH_MIS_PRED)
        .with(HardwareEvent::BusCycles, BUS_CYCLES);

    const CACHE_MAP: CacheEventMap = CacheEventMap::new()
        .access(L1d, Read, L1_DCACHE_ACCESS_READ)
        .miss(L1d, Read, L1_DCACHE_REFILL_READ)
        .access(L1d, Write, L1_DCACHE_ACCESS_WRITE)
        .miss(L1d, Write, L1_DCACHE_REFILL_WRITE)
        .access(L1i, Read, L1_ICACHE_ACCESS)
        .miss(L1i, Read, L1_ICACHE_REFILL)
        .access(Ll, Read, L2_CACHE_ACCESS_READ)
        .miss(Ll, Read, L2_CACHE_REFILL_READ)
        .access(Ll, Write, L2_CACHE_ACCESS_WRITE)
        .miss(Ll, Write, L2_CACHE_REFILL_WRITE)
        .miss(Dtlb, Read, DTLB_REFILL_L1_READ)
        .miss(Dtlb, Write, DTLB_REFILL_L1_WRITE)
        // The instruction TLB and branch predictor events don't differentiate between reads and
        // writes, so those events are shared.
        .miss(Itlb, Read, ITLB_REFILL)
        .miss(Itlb, Write, ITLB_REFILL)
        .access(Bpu, Read, PC_BRANCH_PRED)
        .miss(Bpu, Read, PC_BRANCH_MIS_PRED)
        .access(Bpu, Write, PC_BRANCH_PRED)
        .miss(Bpu, Write, PC_BRANCH_MIS_PRED);
}
