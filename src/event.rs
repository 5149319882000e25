// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Generic perf events and their translation into hardware event numbers.

use crate::error::PmuError;
use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// perf event type for generic hardware events.
pub const PERF_TYPE_HARDWARE: u32 = 0;
/// perf event type for generic cache events.
pub const PERF_TYPE_HW_CACHE: u32 = 3;
/// perf event type for raw, PMU-specific events.
pub const PERF_TYPE_RAW: u32 = 4;

/// A generic hardware event.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum HardwareEvent {
    /// CPU cycles.
    CpuCycles = 0,
    /// Retired instructions.
    Instructions = 1,
    /// Cache accesses.
    CacheReferences = 2,
    /// Cache misses.
    CacheMisses = 3,
    /// Retired branch instructions.
    BranchInstructions = 4,
    /// Mispredicted branches.
    BranchMisses = 5,
    /// Bus cycles.
    BusCycles = 6,
    /// Cycles stalled in the front end.
    StalledCyclesFrontend = 7,
    /// Cycles stalled in the back end.
    StalledCyclesBackend = 8,
    /// Cycles at a constant reference frequency.
    RefCpuCycles = 9,
}

impl HardwareEvent {
    /// Number of generic hardware events.
    pub const COUNT: usize = 10;
}

/// The cache which a generic cache event refers to.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum CacheLevel {
    /// Level 1 data cache.
    L1d = 0,
    /// Level 1 instruction cache.
    L1i = 1,
    /// Last level cache.
    Ll = 2,
    /// Data TLB.
    Dtlb = 3,
    /// Instruction TLB.
    Itlb = 4,
    /// Branch prediction unit.
    Bpu = 5,
    /// Local memory node.
    Node = 6,
}

impl CacheLevel {
    /// Number of cache levels.
    pub const COUNT: usize = 7;
}

/// The kind of cache operation counted.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum CacheOp {
    /// Reads.
    Read = 0,
    /// Writes.
    Write = 1,
    /// Prefetches.
    Prefetch = 2,
}

impl CacheOp {
    /// Number of cache operations.
    pub const COUNT: usize = 3;
}

/// Whether accesses or misses are counted.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum CacheResult {
    /// All accesses.
    Access = 0,
    /// Misses only.
    Miss = 1,
}

impl CacheResult {
    /// Number of cache results.
    pub const COUNT: usize = 2;
}

/// A generic cache event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CacheEvent {
    /// The cache.
    pub level: CacheLevel,
    /// The operation.
    pub op: CacheOp,
    /// Accesses or misses.
    pub result: CacheResult,
}

impl CacheEvent {
    /// Creates a cache event.
    pub const fn new(level: CacheLevel, op: CacheOp, result: CacheResult) -> Self {
        Self { level, op, result }
    }

    /// Decodes a perf cache event config: `level | op << 8 | result << 16`.
    pub fn from_config(config: u64) -> Result<Self, PmuError> {
        if config >> 24 != 0 {
            return Err(PmuError::InvalidArgument);
        }
        let field = |shift: u32| (config >> shift) as u8;
        Ok(Self {
            level: CacheLevel::try_from(field(0)).map_err(|_| PmuError::InvalidArgument)?,
            op: CacheOp::try_from(field(8)).map_err(|_| PmuError::InvalidArgument)?,
            result: CacheResult::try_from(field(16)).map_err(|_| PmuError::InvalidArgument)?,
        })
    }

    /// Encodes the event as a perf cache event config.
    pub fn config(self) -> u64 {
        u64::from(u8::from(self.level))
            | u64::from(u8::from(self.op)) << 8
            | u64::from(u8::from(self.result)) << 16
    }
}

/// An event requested by the perf framework.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EventConfig {
    /// A generic hardware event.
    Hardware(HardwareEvent),
    /// A generic cache event.
    Cache(CacheEvent),
    /// A PMU-specific event number.
    Raw(u64),
}

impl EventConfig {
    /// Decodes a perf `(type, config)` pair.
    ///
    /// Returns [`PmuError::NoDevice`] for event types which no CPU PMU handles.
    pub fn from_perf(event_type: u32, config: u64) -> Result<Self, PmuError> {
        match event_type {
            PERF_TYPE_HARDWARE => u8::try_from(config)
                .ok()
                .and_then(|config| HardwareEvent::try_from(config).ok())
                .map(Self::Hardware)
                .ok_or(PmuError::InvalidArgument),
            PERF_TYPE_HW_CACHE => CacheEvent::from_config(config).map(Self::Cache),
            PERF_TYPE_RAW => Ok(Self::Raw(config)),
            _ => Err(PmuError::NoDevice),
        }
    }
}

bitflags! {
    /// Privilege modes in which an event should not be counted.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct ModeExclusion: u8 {
        /// Don't count in user mode.
        const USER = 1 << 0;
        /// Don't count in kernel mode.
        const KERNEL = 1 << 1;
        /// Don't count in hypervisor mode.
        const HYPERVISOR = 1 << 2;
        /// Don't count while idle.
        const IDLE = 1 << 3;
    }
}

/// Attributes of an event being initialised.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EventAttr {
    /// What to count.
    pub config: EventConfig,
    /// Where not to count it.
    pub exclude: ModeExclusion,
}

impl EventAttr {
    /// Creates attributes for an event counted in every mode.
    pub const fn new(config: EventConfig) -> Self {
        Self {
            config,
            exclude: ModeExclusion::empty(),
        }
    }

    /// Returns the attributes with the given modes excluded as well.
    pub const fn excluding(self, modes: ModeExclusion) -> Self {
        Self {
            config: self.config,
            exclude: self.exclude.union(modes),
        }
    }

    /// Returns whether counting is restricted by mode at all.
    pub const fn requires_mode_exclusion(&self) -> bool {
        !self.exclude.is_empty()
    }
}

/// Hardware event numbers for the generic hardware events, by [`HardwareEvent`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HardwareEventMap([Option<u32>; HardwareEvent::COUNT]);

impl HardwareEventMap {
    /// Creates a map with every event unsupported.
    pub const fn new() -> Self {
        Self([None; HardwareEvent::COUNT])
    }

    /// Returns the map with `event` counted by hardware event `code`.
    pub const fn with(mut self, event: HardwareEvent, code: u32) -> Self {
        self.0[event as usize] = Some(code);
        self
    }

    /// Returns the hardware event number for `event`, if supported.
    pub const fn get(&self, event: HardwareEvent) -> Option<u32> {
        self.0[event as usize]
    }
}

impl Default for HardwareEventMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Hardware event numbers for the generic cache events.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CacheEventMap([[[Option<u32>; CacheResult::COUNT]; CacheOp::COUNT]; CacheLevel::COUNT]);

impl CacheEventMap {
    /// Creates a map with every event unsupported.
    pub const fn new() -> Self {
        Self([[[None; CacheResult::COUNT]; CacheOp::COUNT]; CacheLevel::COUNT])
    }

    /// Returns the map with accesses of type `op` to `level` counted by hardware event `code`.
    pub const fn access(self, level: CacheLevel, op: CacheOp, code: u32) -> Self {
        self.with(CacheEvent::new(level, op, CacheResult::Access), code)
    }

    /// Returns the map with misses of type `op` in `level` counted by hardware event `code`.
    pub const fn miss(self, level: CacheLevel, op: CacheOp, code: u32) -> Self {
        self.with(CacheEvent::new(level, op, CacheResult::Miss), code)
    }

    /// Returns the map with `event` counted by hardware event `code`.
    pub const fn with(mut self, event: CacheEvent, code: u32) -> Self {
        self.0[event.level as usize][event.op as usize][event.result as usize] = Some(code);
        self
    }

    /// Returns the hardware event number for `event`, if supported.
    pub const fn get(&self, event: CacheEvent) -> Option<u32> {
        self.0[event.level as usize][event.op as usize][event.result as usize]
    }
}

impl Default for CacheEventMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Translates `config` into a hardware event number using the given tables.
///
/// Raw event numbers above `raw_max` are rejected.
pub fn map_event(
    config: &EventConfig,
    perf_map: &HardwareEventMap,
    cache_map: &CacheEventMap,
    raw_max: u32,
) -> Result<u32, PmuError> {
    match *config {
        EventConfig::Hardware(event) => perf_map.get(event).ok_or(PmuError::Unsupported),
        EventConfig::Cache(event) => cache_map.get(event).ok_or(PmuError::Unsupported),
        EventConfig::Raw(code) => u32::try_from(code)
            .ok()
            .filter(|&code| code <= raw_max)
            .ok_or(PmuError::InvalidArgument),
    }
}
