// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

/// Fake platform for unit tests.
#[cfg(test)]
pub mod test;

use crate::{
    error::PmuError,
    instance::InstanceId,
    topology::{CpuMask, CpuTopology, Irq, LogicalCpuId},
};

/// The hooks the driver needs from the platform it runs on.
pub trait Platform {
    /// The number of possible logical CPUs. Must not exceed
    /// [`MAX_CPUS`](crate::topology::MAX_CPUS).
    const CORE_COUNT: usize;

    /// Returns the current mapping of logical CPUs to physical cores.
    fn topology() -> CpuTopology;

    /// Runs `f` on logical CPU `cpu` and waits for it to finish.
    fn run_on_cpu<T: Send>(cpu: LogicalCpuId, f: impl FnOnce() -> T + Send) -> T;

    /// Runs `f` on any one of `cpus` and waits for it to finish. `cpus` must not be empty.
    fn run_on_any_cpu<T: Send>(cpus: CpuMask, f: impl FnOnce() -> T + Send) -> T;

    /// Runs `f` on each of `cpus`, passing it the CPU, and waits for them all to finish.
    fn run_on_each_cpu(cpus: CpuMask, f: impl Fn(LogicalCpuId) + Sync);

    /// Runs `f` with interrupts masked on the current CPU.
    fn exception_free<T>(f: impl FnOnce() -> T) -> T;

    /// Routes `irq` to logical CPU `cpu`.
    fn irq_set_affinity(irq: Irq, cpu: LogicalCpuId) -> Result<(), PmuError>;

    /// Installs the overflow handler of PMU instance `instance` for `irq`.
    fn request_irq(irq: Irq, instance: InstanceId) -> Result<(), PmuError>;

    /// Removes the handler installed by `request_irq`.
    fn free_irq(irq: Irq, instance: InstanceId);
}
