// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use super::Platform;
use crate::{
    error::PmuError,
    instance::InstanceId,
    logger::{self, LogSink},
    topology::{CpuMask, CpuTopology, Irq, LogicalCpuId, PhysicalCoreId},
};
use armv7_pmu_regs::{
    Midr, Mpidr,
    fake::{self, FakeCore, FakePmu},
};
use std::{
    cell::RefCell,
    fmt,
    io::{Write, stdout},
    vec::Vec,
};

/// MIDR of a Cortex-A5 r0p1.
pub const CORTEX_A5_MIDR: Midr = Midr::from_bits_retain(0x410f_c051);
/// MIDR of a Cortex-A7 r0p5.
pub const CORTEX_A7_MIDR: Midr = Midr::from_bits_retain(0x410f_c075);
/// MIDR of a Cortex-A9 r3p0.
pub const CORTEX_A9_MIDR: Midr = Midr::from_bits_retain(0x413f_c090);
/// MIDR of a Cortex-A15 r2p0.
pub const CORTEX_A15_MIDR: Midr = Midr::from_bits_retain(0x412f_c0f0);

/// Number of event counters of the fake Cortex-A7 cores of [`TestPlatform::big_little`].
pub const LITTLE_EVENT_COUNTERS: u32 = 4;
/// Number of event counters of the fake Cortex-A15 cores of [`TestPlatform::big_little`].
pub const BIG_EVENT_COUNTERS: u32 = 6;

struct TestMachine {
    topology: CpuTopology,
    /// The physical core of each fake core, in fake core order.
    cores: Vec<PhysicalCoreId>,
    failing_affinity: Vec<Irq>,
    failing_request: Vec<Irq>,
    requested: Vec<(Irq, InstanceId)>,
}

impl TestMachine {
    const fn new() -> Self {
        Self {
            topology: CpuTopology::new(false),
            cores: Vec::new(),
            failing_affinity: Vec::new(),
            failing_request: Vec::new(),
            requested: Vec::new(),
        }
    }

    fn fake_core(&self, core: PhysicalCoreId) -> usize {
        self.cores
            .iter()
            .position(|&c| c == core)
            .unwrap_or_else(|| panic!("No fake core for {core:?}"))
    }
}

thread_local! {
    static MACHINE: RefCell<TestMachine> = const { RefCell::new(TestMachine::new()) };
}

/// A fake platform for unit tests.
///
/// Every test thread has its own machine, which must be set up with one of the `install` functions
/// before use.
pub struct TestPlatform;

impl TestPlatform {
    /// Sets up fake physical cores, each given as its ID, MIDR and number of event counters, and
    /// logical CPU `i` running on `cpus[i]`.
    pub fn install(cores: &[(PhysicalCoreId, Midr, u32)], cpus: &[PhysicalCoreId], switcher: bool) {
        // Another test on this process may have got there first.
        let _ = logger::init(&StdOutSink);

        assert!(cpus.len() <= Self::CORE_COUNT);
        fake::install(
            cores
                .iter()
                .map(|&(core, midr, event_counters)| {
                    FakeCore::new(
                        midr,
                        Mpidr::from_affinity(core.cluster(), core.core()),
                        event_counters,
                    )
                })
                .collect(),
        );

        let mut topology = CpuTopology::new(switcher);
        for &core in cpus {
            topology.add_cpu(core).unwrap();
        }
        MACHINE.with_borrow_mut(|machine| {
            *machine = TestMachine {
                topology,
                cores: cores.iter().map(|&(core, _, _)| core).collect(),
                ..TestMachine::new()
            };
        });
    }

    /// Sets up a single cluster of four identical cores.
    pub fn smp(midr: Midr, event_counters: u32) {
        let cores: Vec<_> = (0..4)
            .map(|core| (PhysicalCoreId::new(0, core), midr, event_counters))
            .collect();
        let cpus: Vec<_> = cores.iter().map(|&(core, _, _)| core).collect();
        Self::install(&cores, &cpus, false);
    }

    /// Sets up a cluster of four Cortex-A7 cores and a cluster of four Cortex-A15 cores, with a
    /// cluster switcher. The four logical CPUs start out on the Cortex-A7 cluster.
    pub fn big_little() {
        let little = (0..4).map(|core| {
            (
                PhysicalCoreId::new(0, core),
                CORTEX_A7_MIDR,
                LITTLE_EVENT_COUNTERS,
            )
        });
        let big = (0..4).map(|core| {
            (
                PhysicalCoreId::new(1, core),
                CORTEX_A15_MIDR,
                BIG_EVENT_COUNTERS,
            )
        });
        let cores: Vec<_> = little.chain(big).collect();
        let cpus: Vec<_> = (0..4).map(|core| PhysicalCoreId::new(0, core)).collect();
        Self::install(&cores, &cpus, true);
    }

    /// Moves logical CPU `cpu` to physical core `core`.
    pub fn switch(cpu: LogicalCpuId, core: PhysicalCoreId) {
        MACHINE.with_borrow_mut(|machine| machine.topology.switch(cpu, core).unwrap());
    }

    /// Gives `f` direct access to the fake PMU of the core that `cpu` currently runs on.
    pub fn with_fake_pmu<T>(cpu: LogicalCpuId, f: impl FnOnce(&mut FakePmu) -> T) -> T {
        Self::with_core_pmu(Self::physical_core(cpu), f)
    }

    /// Gives `f` direct access to the fake PMU of physical core `core`.
    pub fn with_core_pmu<T>(core: PhysicalCoreId, f: impl FnOnce(&mut FakePmu) -> T) -> T {
        let index = MACHINE.with_borrow(|machine| machine.fake_core(core));
        fake::with_core(index, |core| f(&mut core.pmu))
    }

    /// Replaces the MPIDR of the core that `cpu` currently runs on.
    pub fn set_mpidr(cpu: LogicalCpuId, mpidr: Mpidr) {
        let core = Self::physical_core(cpu);
        let index = MACHINE.with_borrow(|machine| machine.fake_core(core));
        fake::with_core(index, |core| core.mpidr = mpidr);
    }

    /// Makes routing `irq` to a CPU fail.
    pub fn fail_irq_affinity(irq: Irq) {
        MACHINE.with_borrow_mut(|machine| machine.failing_affinity.push(irq));
    }

    /// Makes installing a handler for `irq` fail.
    pub fn fail_request_irq(irq: Irq) {
        MACHINE.with_borrow_mut(|machine| machine.failing_request.push(irq));
    }

    /// Returns the interrupts with a handler installed, in the order they were requested.
    pub fn requested_irqs() -> Vec<(Irq, InstanceId)> {
        MACHINE.with_borrow(|machine| machine.requested.clone())
    }

    fn physical_core(cpu: LogicalCpuId) -> PhysicalCoreId {
        MACHINE
            .with_borrow(|machine| machine.topology.physical_core(cpu))
            .unwrap_or_else(|| panic!("No {cpu} installed"))
    }
}

impl Platform for TestPlatform {
    const CORE_COUNT: usize = 4;

    fn topology() -> CpuTopology {
        MACHINE.with_borrow(|machine| machine.topology.clone())
    }

    fn run_on_cpu<T: Send>(cpu: LogicalCpuId, f: impl FnOnce() -> T + Send) -> T {
        let core = Self::physical_core(cpu);
        let index = MACHINE.with_borrow(|machine| machine.fake_core(core));
        fake::run_on_core(index, f)
    }

    fn run_on_any_cpu<T: Send>(cpus: CpuMask, f: impl FnOnce() -> T + Send) -> T {
        let cpu = cpus.first().expect("No CPU to run on");
        Self::run_on_cpu(cpu, f)
    }

    fn run_on_each_cpu(cpus: CpuMask, f: impl Fn(LogicalCpuId) + Sync) {
        for cpu in cpus.iter() {
            Self::run_on_cpu(cpu, || f(cpu));
        }
    }

    fn exception_free<T>(f: impl FnOnce() -> T) -> T {
        f()
    }

    fn irq_set_affinity(irq: Irq, _cpu: LogicalCpuId) -> Result<(), PmuError> {
        if MACHINE.with_borrow(|machine| machine.failing_affinity.contains(&irq)) {
            Err(PmuError::IrqAffinity(irq))
        } else {
            Ok(())
        }
    }

    fn request_irq(irq: Irq, instance: InstanceId) -> Result<(), PmuError> {
        MACHINE.with_borrow_mut(|machine| {
            if machine.failing_request.contains(&irq) {
                return Err(PmuError::IrqRequest(irq));
            }
            machine.requested.push((irq, instance));
            Ok(())
        })
    }

    fn free_irq(irq: Irq, instance: InstanceId) {
        MACHINE.with_borrow_mut(|machine| {
            machine
                .requested
                .retain(|&requested| requested != (irq, instance));
        });
    }
}

/// Log sink for unit tests, which writes to standard output.
pub struct StdOutSink;

impl LogSink for StdOutSink {
    fn write_fmt(&self, args: fmt::Arguments) {
        stdout().write_fmt(args).unwrap();
    }

    fn flush(&self) {
        stdout().flush().unwrap();
    }
}
