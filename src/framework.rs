// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

/// Identifies an event owned by the perf framework.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct EventHandle(pub usize);

/// Sample data passed to the framework when a counter overflows.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SampleData {
    /// Sampled data address. The PMU doesn't record one, so this is always zero.
    pub addr: u64,
    /// The sampling period which just elapsed.
    pub period: u64,
}

impl SampleData {
    /// Creates sample data for an elapsed `period`.
    pub const fn new(period: u64) -> Self {
        Self { addr: 0, period }
    }
}

/// The services of the perf event framework which the overflow interrupt handler relies on.
///
/// The handler never holds a PMU lock while calling these.
pub trait EventFramework {
    /// Register snapshot of the interrupted context.
    type Regs: ?Sized;

    /// Folds the latest hardware `count` of `event` into its total.
    fn update(&self, event: EventHandle, count: u32);

    /// Returns the sampling period of `event` which just elapsed.
    fn last_period(&self, event: EventHandle) -> u64;

    /// Starts the next sampling period of `event`, returning the value to program into its
    /// counter, or `None` if the event has no next period.
    fn set_period(&self, event: EventHandle) -> Option<u32>;

    /// Reports an overflow of `event`. Returns true if the event must be throttled, in which case
    /// its counter is disabled.
    fn overflow(&self, event: EventHandle, data: &SampleData, regs: &Self::Regs) -> bool;

    /// Runs work deferred by the overflow handlers, once all overflows have been handled.
    fn run_deferred_work(&self);
}
