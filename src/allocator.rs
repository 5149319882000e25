// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Allocation of hardware counters to events.
//!
//! Counter index 0 is always the dedicated cycle counter. Indices 1 and up are the general-purpose
//! event counters.

use crate::error::PmuError;

/// Index of the dedicated cycle counter.
pub const CYCLE_COUNTER_INDEX: usize = 0;
/// Index of the first general-purpose event counter.
pub const FIRST_EVENT_COUNTER_INDEX: usize = 1;
/// Largest number of counters, including the cycle counter.
pub const MAX_COUNTERS: usize = 32;

/// The set of counters on one CPU which are claimed by events.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UsedMask(u32);

impl UsedMask {
    /// Claims counter `index`, returning whether it was already claimed.
    ///
    /// An index beyond [`MAX_COUNTERS`] can never be claimed.
    pub fn test_and_set(&mut self, index: usize) -> bool {
        if index >= MAX_COUNTERS {
            return true;
        }
        let bit = 1 << index;
        let was_set = self.0 & bit != 0;
        self.0 |= bit;
        was_set
    }

    /// Releases counter `index`. Indices beyond [`MAX_COUNTERS`] are ignored.
    pub fn clear(&mut self, index: usize) {
        if index < MAX_COUNTERS {
            self.0 &= !(1 << index);
        }
    }

    /// Returns whether counter `index` is claimed.
    pub fn contains(self, index: usize) -> bool {
        index < MAX_COUNTERS && self.0 & 1 << index != 0
    }

    /// Returns whether no counter is claimed.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the number of claimed counters.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }
}

/// Claims a counter for an event out of the `num_counters` counters of a PMU.
///
/// The cycle-count event may only use the dedicated cycle counter. Every other event gets the
/// lowest-numbered free general-purpose counter. The caller must hold the lock on the per-CPU
/// state that `used` belongs to.
pub fn allocate(
    used: &mut UsedMask,
    num_counters: usize,
    cycle_count: bool,
) -> Result<usize, PmuError> {
    if cycle_count {
        if used.test_and_set(CYCLE_COUNTER_INDEX) {
            return Err(PmuError::NoFreeCounter);
        }
        return Ok(CYCLE_COUNTER_INDEX);
    }

    (FIRST_EVENT_COUNTER_INDEX..num_counters.min(MAX_COUNTERS))
        .find(|&index| !used.test_and_set(index))
        .ok_or(PmuError::NoFreeCounter)
}

/// Returns counter `index` to the pool.
pub fn free(used: &mut UsedMask, index: usize) {
    used.clear(index);
}
