// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

/// Cortex-A15 PMU.
pub mod cortex_a15;
/// Cortex-A5 PMU.
pub mod cortex_a5;
/// Cortex-A7 PMU.
pub mod cortex_a7;
/// Cortex-A8 PMU.
pub mod cortex_a8;
/// Cortex-A9 PMU.
pub mod cortex_a9;

use crate::{
    error::PmuError,
    event::{EventAttr, EventConfig},
    instance::CpuPmuState,
    regs::LogicalState,
};

/// The `Microarchitecture` trait captures the PMU operations specific to one family of CPU cores.
///
/// Implementations are stateless: everything they touch is passed in as the [`CpuPmuState`] of the
/// PMU being operated on. Every method which takes a `CpuPmuState` must be called on the logical
/// CPU it belongs to, with its lock held.
pub trait Microarchitecture: Sync {
    /// Human-readable PMU name, reported to the perf framework.
    fn name(&self) -> &'static str;

    /// Device tree compatible string of the PMU.
    fn compatible(&self) -> &'static str;

    /// MIDR implementer code of the cores with this PMU.
    fn implementer(&self) -> u8;

    /// MIDR primary part number of the cores with this PMU, or the XScale architecture version for
    /// Intel cores.
    fn part_number(&self) -> u16;

    /// Probes the PMU of the current CPU, returning the number of counters including the cycle
    /// counter.
    fn init(&self) -> Result<usize, PmuError>;

    /// Creates the in-memory register copy for a PMU with `num_counters` counters, on the CPU it
    /// belongs to.
    fn cpu_init(&self, num_counters: usize) -> LogicalState {
        LogicalState::new(num_counters)
    }

    /// Translates a perf event into a hardware event number.
    fn map_event(&self, config: &EventConfig) -> Result<u32, PmuError>;

    /// Returns whether the PMU can filter events by privilege mode.
    fn has_event_filter(&self) -> bool {
        false
    }

    /// Returns the event type bits which apply the mode exclusions of `attr`.
    fn set_event_filter(&self, _attr: &EventAttr) -> Result<u32, PmuError> {
        Err(PmuError::PermissionDenied)
    }

    /// Claims a counter able to count the event `config_base`.
    fn get_event_idx(&self, pmu: &mut CpuPmuState, config_base: u32) -> Result<usize, PmuError>;

    /// Programs counter `idx` to count `config_base` and enables it along with its interrupt.
    fn enable(&self, pmu: &mut CpuPmuState, idx: usize, config_base: u32);

    /// Disables counter `idx` and its interrupt.
    fn disable(&self, pmu: &mut CpuPmuState, idx: usize);

    /// Reads counter `idx`.
    fn read_counter(&self, pmu: &mut CpuPmuState, idx: usize) -> u32;

    /// Writes `value` to counter `idx`.
    fn write_counter(&self, pmu: &mut CpuPmuState, idx: usize, value: u32);

    /// Enables counting globally.
    fn start(&self, pmu: &mut CpuPmuState);

    /// Disables counting globally.
    fn stop(&self, pmu: &mut CpuPmuState);

    /// Works out whether the PMU is on the current core, and if so disables every counter and
    /// interrupt and zeroes the counters.
    fn reset(&self, pmu: &mut CpuPmuState);

    /// Saves the hardware registers into the in-memory copy, before the core powers down.
    fn save_regs(&self, pmu: &mut CpuPmuState);

    /// Resets the PMU, then restores the hardware registers from the in-memory copy.
    fn restore_regs(&self, pmu: &mut CpuPmuState);

    /// Returns and clears the pending overflow flags.
    fn read_and_clear_overflow(&self, pmu: &mut CpuPmuState) -> u32;

    /// Returns whether `overflow`, as returned by `read_and_clear_overflow`, includes counter
    /// `idx`.
    fn counter_has_overflowed(&self, overflow: u32, idx: usize) -> bool;

    /// Largest value a counter can hold.
    fn max_period(&self) -> u64;
}

/// Calculates the count of specified PMU descriptors.
macro_rules! pmu_descriptor_count {
    ($part:ty) => { 1 };
    ($part:ty, $($parts:ty),+) => {
        $crate::cpu::pmu_descriptor_count!($part) + $crate::cpu::pmu_descriptor_count!($($parts),+)
    };
}
pub(crate) use pmu_descriptor_count;

/// Declares the PMU_DESCRIPTORS array of built-in ARMv7 PMUs.
macro_rules! define_pmu_descriptors {
    ($($parts:ty),+) => {
        /// The built-in PMU descriptors.
        pub static PMU_DESCRIPTORS: [
            &'static dyn $crate::cpu::Microarchitecture;
            $crate::cpu::pmu_descriptor_count!($($parts),+)
        ] = [
            $(&$crate::armv7::ArmV7Pmu::<$parts>::DESCRIPTOR),*,
        ];
    }
}
pub(crate) use define_pmu_descriptors;

define_pmu_descriptors!(
    cortex_a15::CortexA15,
    cortex_a9::CortexA9,
    cortex_a8::CortexA8,
    cortex_a7::CortexA7,
    cortex_a5::CortexA5
);

/// Device tree compatible strings handled by the driver.
///
/// The ARM11 entries have no built-in descriptor, so probing them fails unless one is registered.
pub const OF_DEVICE_IDS: [&str; 8] = [
    "arm,cortex-a15-pmu",
    "arm,cortex-a9-pmu",
    "arm,cortex-a8-pmu",
    "arm,cortex-a7-pmu",
    "arm,cortex-a5-pmu",
    "arm,arm11mpcore-pmu",
    "arm,arm1176-pmu",
    "arm,arm1136-pmu",
];
