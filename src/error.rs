// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use crate::topology::Irq;
use thiserror::Error;

/// Errors reported by the CPU PMU driver.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum PmuError {
    /// Every counter able to count the requested event is already in use.
    #[error("no free hardware counter")]
    NoFreeCounter,
    /// The event has no hardware encoding on this PMU.
    #[error("event not supported by this PMU")]
    Unsupported,
    /// A malformed event encoding or descriptor.
    #[error("invalid argument")]
    InvalidArgument,
    /// Mode exclusion was requested but the PMU cannot filter by mode.
    #[error("mode exclusion not supported by this PMU")]
    PermissionDenied,
    /// No PMU descriptor or CPU matches the device.
    #[error("no matching PMU")]
    NoDevice,
    /// Allocation of per-CPU state failed.
    #[error("out of memory")]
    OutOfMemory,
    /// The descriptor registry has no room for another entry.
    #[error("PMU descriptor registry is full")]
    RegistryFull,
    /// The device lists no interrupts.
    #[error("no IRQs for PMU defined")]
    NoIrqs,
    /// The interrupt controller refused to route an interrupt to the requested CPU.
    #[error("unable to set affinity of IRQ {0}")]
    IrqAffinity(Irq),
    /// The interrupt controller refused to install the handler for an interrupt.
    #[error("unable to request IRQ {0} for PMU counters")]
    IrqRequest(Irq),
}
