// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! PMU instances and their per-CPU state.
//!
//! An instance is one probed PMU device. It keeps a [`CpuPmu`] for every logical CPU it serves.
//! Each of those is only ever operated on from its own CPU, under its lock with interrupts masked,
//! except during probe and removal.

use crate::{
    allocator::{self, MAX_COUNTERS, UsedMask},
    cpu::Microarchitecture,
    error::PmuError,
    event::{EventAttr, EventConfig},
    framework::{EventFramework, EventHandle, SampleData},
    platform::Platform,
    regs::{LogicalState, RegisterFile},
    topology::{CpuMask, Irq, IrqBinding, LogicalCpuId, PhysicalCoreId},
};
use alloc::vec::Vec;
use armv7_pmu_regs::{Mpidr, read_mpidr};
use arrayvec::ArrayVec;
use core::marker::PhantomData;
use log::{debug, error, warn};
use spin::mutex::{SpinMutex, SpinMutexGuard};

/// Identifies a probed PMU instance.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct InstanceId(pub usize);

/// Whether an interrupt handler dealt with the interrupt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IrqReturn {
    /// The interrupt wasn't for this PMU.
    None,
    /// The interrupt was handled.
    Handled,
}

/// The hardware counter claimed by an event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HwCounter {
    /// Counter index.
    pub idx: usize,
    /// Event type bits to program: the event number and any mode filter bits.
    pub config_base: u32,
}

/// State of the PMU of one logical CPU.
#[derive(Debug)]
pub struct CpuPmuState {
    cpu: LogicalCpuId,
    core: PhysicalCoreId,
    irq: Option<Irq>,
    num_counters: usize,
    used_mask: UsedMask,
    events: [Option<EventHandle>; MAX_COUNTERS],
    regs: RegisterFile,
}

impl CpuPmuState {
    /// Creates the state of the PMU of `core`, serving logical CPU `cpu`.
    pub fn new(
        cpu: LogicalCpuId,
        core: PhysicalCoreId,
        irq: Option<Irq>,
        num_counters: usize,
        logical: LogicalState,
    ) -> Self {
        Self {
            cpu,
            core,
            irq,
            num_counters,
            used_mask: UsedMask::default(),
            events: [None; MAX_COUNTERS],
            regs: RegisterFile::new(logical),
        }
    }

    /// Returns the logical CPU served.
    pub fn cpu(&self) -> LogicalCpuId {
        self.cpu
    }

    /// Returns the physical core whose PMU this is.
    pub fn core(&self) -> PhysicalCoreId {
        self.core
    }

    /// Returns the PMU's overflow interrupt.
    pub fn irq(&self) -> Option<Irq> {
        self.irq
    }

    /// Returns the number of counters, including the cycle counter.
    pub fn num_counters(&self) -> usize {
        self.num_counters
    }

    /// Returns the set of claimed counters.
    pub fn used_mask(&self) -> UsedMask {
        self.used_mask
    }

    /// Returns the set of claimed counters for modification.
    pub fn used_mask_mut(&mut self) -> &mut UsedMask {
        &mut self.used_mask
    }

    /// Returns the event which counter `idx` is counting, if any.
    pub fn event(&self, idx: usize) -> Option<EventHandle> {
        self.events.get(idx).copied().flatten()
    }

    /// Returns the PMU's registers.
    pub fn regs(&self) -> &RegisterFile {
        &self.regs
    }

    /// Returns the PMU's registers for modification.
    pub fn regs_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    /// Works out whether the current core is the one this PMU belongs to, and routes register
    /// accesses accordingly. Returns whether it is.
    pub fn check_active(&mut self) -> bool {
        let mpidr = read_mpidr();
        // A uniprocessor has no other core to be on.
        let active = !mpidr.contains(Mpidr::M) || self.core.matches(mpidr);
        self.regs.set_active(active);
        active
    }
}

/// The lock-protected PMU state of one logical CPU.
#[derive(Debug)]
pub struct CpuPmu {
    state: SpinMutex<CpuPmuState>,
}

impl CpuPmu {
    /// Wraps `state`.
    pub fn new(state: CpuPmuState) -> Self {
        Self {
            state: SpinMutex::new(state),
        }
    }

    /// Locks the state. Interrupts must be masked on the current CPU while the lock is held.
    pub fn lock(&self) -> SpinMutexGuard<'_, CpuPmuState> {
        self.state.lock()
    }
}

/// A probed PMU device.
pub struct PmuInstance<P: Platform> {
    id: InstanceId,
    descriptor: &'static dyn Microarchitecture,
    num_counters: usize,
    irq_count: usize,
    valid_cpus: CpuMask,
    active_irqs: CpuMask,
    /// Number of users holding the interrupt handlers installed.
    users: usize,
    per_cpu: Vec<Option<CpuPmu>>,
    _platform: PhantomData<fn() -> P>,
}

impl<P: Platform> PmuInstance<P> {
    /// Creates an instance serving the CPUs in `bindings`, running the descriptor's per-CPU setup
    /// on each of them.
    ///
    /// `irq_count` is the number of interrupts the device provides for the possible CPUs.
    pub fn new(
        id: InstanceId,
        descriptor: &'static dyn Microarchitecture,
        num_counters: usize,
        bindings: &[IrqBinding],
        irq_count: usize,
    ) -> Result<Self, PmuError> {
        let mut per_cpu = Vec::new();
        per_cpu
            .try_reserve_exact(P::CORE_COUNT)
            .map_err(|_| PmuError::OutOfMemory)?;
        per_cpu.resize_with(P::CORE_COUNT, || None);

        let mut valid_cpus = CpuMask::EMPTY;
        for binding in bindings {
            let Some(slot) = per_cpu.get_mut(binding.cpu.0) else {
                warn!("Ignoring {} beyond the possible CPUs", binding.cpu);
                continue;
            };
            let logical = P::run_on_cpu(binding.cpu, || descriptor.cpu_init(num_counters));
            *slot = Some(CpuPmu::new(CpuPmuState::new(
                binding.cpu,
                binding.core,
                binding.irq,
                num_counters,
                logical,
            )));
            valid_cpus.insert(binding.cpu);
        }

        Ok(Self {
            id,
            descriptor,
            num_counters,
            irq_count,
            valid_cpus,
            active_irqs: CpuMask::EMPTY,
            users: 0,
            per_cpu,
            _platform: PhantomData,
        })
    }

    /// Returns the instance's identifier.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Returns the microarchitecture descriptor.
    pub fn descriptor(&self) -> &'static dyn Microarchitecture {
        self.descriptor
    }

    /// Returns the PMU name.
    pub fn name(&self) -> &'static str {
        self.descriptor.name()
    }

    /// Returns the number of counters, including the cycle counter.
    pub fn num_counters(&self) -> usize {
        self.num_counters
    }

    /// Returns the largest value a counter can hold.
    pub fn max_period(&self) -> u64 {
        self.descriptor.max_period()
    }

    /// Returns the logical CPUs served.
    pub fn valid_cpus(&self) -> CpuMask {
        self.valid_cpus
    }

    /// Returns the logical CPUs whose interrupt is currently requested.
    pub fn active_irqs(&self) -> CpuMask {
        self.active_irqs
    }

    /// Returns the PMU state of `cpu`, if this instance serves it.
    pub fn cpu_pmu(&self, cpu: LogicalCpuId) -> Option<&CpuPmu> {
        self.per_cpu.get(cpu.0)?.as_ref()
    }

    /// Runs `f` on the locked state of `cpu` with interrupts masked.
    fn with_state<T>(&self, cpu: LogicalCpuId, f: impl FnOnce(&mut CpuPmuState) -> T) -> Option<T> {
        let Some(pmu) = self.cpu_pmu(cpu) else {
            error!("{} PMU does not serve {cpu}", self.name());
            return None;
        };
        Some(P::exception_free(|| f(&mut pmu.lock())))
    }

    /// Returns whether the PMU of `cpu` is on the core that `cpu` currently runs on.
    pub fn is_active(&self, cpu: LogicalCpuId) -> bool {
        self.cpu_pmu(cpu)
            .is_some_and(|pmu| P::exception_free(|| pmu.lock().regs().is_active()))
    }

    /// Translates a perf event into a hardware event number.
    pub fn map_event(&self, config: &EventConfig) -> Result<u32, PmuError> {
        self.descriptor.map_event(config)
    }

    /// Validates a new event, returning the event type bits to program for it.
    pub fn event_init(&self, attr: &EventAttr) -> Result<u32, PmuError> {
        let mapping = self.map_event(&attr.config).inspect_err(|e| {
            debug!("event {:?} not supported by {}: {e}", attr.config, self.name());
        })?;

        let filter = if self.descriptor.has_event_filter() {
            self.descriptor.set_event_filter(attr)
        } else {
            Err(PmuError::PermissionDenied)
        };
        match filter {
            Ok(filter) => Ok(mapping | filter),
            Err(_) if !attr.requires_mode_exclusion() => Ok(mapping),
            Err(e) => {
                debug!("{} does not support mode exclusion", self.name());
                Err(e)
            }
        }
    }

    /// Claims a counter on `cpu` for the event `config_base`.
    pub fn get_event_idx(&self, cpu: LogicalCpuId, config_base: u32) -> Result<usize, PmuError> {
        self.with_state(cpu, |state| self.descriptor.get_event_idx(state, config_base))
            .unwrap_or(Err(PmuError::NoDevice))
    }

    /// Returns counter `idx` of `cpu` to the pool.
    pub fn clear_event_idx(&self, cpu: LogicalCpuId, idx: usize) {
        self.with_state(cpu, |state| {
            if idx >= state.num_counters() {
                error!("{cpu} releasing wrong PMNC counter {idx}");
                return;
            }
            allocator::free(state.used_mask_mut(), idx);
        });
    }

    /// Claims a counter on `cpu` for `event` and makes sure it starts out disabled.
    pub fn add(
        &self,
        cpu: LogicalCpuId,
        event: EventHandle,
        config_base: u32,
    ) -> Result<HwCounter, PmuError> {
        self.with_state(cpu, |state| {
            let idx = self.descriptor.get_event_idx(state, config_base)?;
            self.descriptor.disable(state, idx);
            state.events[idx] = Some(event);
            Ok(HwCounter { idx, config_base })
        })
        .unwrap_or(Err(PmuError::NoDevice))
    }

    /// Disables and releases the counter of an event on `cpu`.
    pub fn del(&self, cpu: LogicalCpuId, counter: &HwCounter) {
        self.with_state(cpu, |state| {
            self.descriptor.disable(state, counter.idx);
            if counter.idx >= state.num_counters() {
                return;
            }
            state.events[counter.idx] = None;
            allocator::free(state.used_mask_mut(), counter.idx);
        });
    }

    /// Programs and enables `counter` on `cpu`.
    pub fn enable(&self, cpu: LogicalCpuId, counter: &HwCounter) {
        self.with_state(cpu, |state| {
            self.descriptor
                .enable(state, counter.idx, counter.config_base)
        });
    }

    /// Disables `counter` on `cpu`.
    pub fn disable(&self, cpu: LogicalCpuId, counter: &HwCounter) {
        self.with_state(cpu, |state| self.descriptor.disable(state, counter.idx));
    }

    /// Reads `counter` on `cpu`.
    pub fn read_counter(&self, cpu: LogicalCpuId, counter: &HwCounter) -> u32 {
        self.with_state(cpu, |state| self.descriptor.read_counter(state, counter.idx))
            .unwrap_or(0)
    }

    /// Writes `value` to `counter` on `cpu`.
    pub fn write_counter(&self, cpu: LogicalCpuId, counter: &HwCounter, value: u32) {
        self.with_state(cpu, |state| {
            self.descriptor.write_counter(state, counter.idx, value)
        });
    }

    /// Enables counting on `cpu`.
    pub fn start(&self, cpu: LogicalCpuId) {
        self.with_state(cpu, |state| self.descriptor.start(state));
    }

    /// Disables counting on `cpu`.
    pub fn stop(&self, cpu: LogicalCpuId) {
        self.with_state(cpu, |state| self.descriptor.stop(state));
    }

    /// Re-evaluates whether the PMU of `cpu` is on the current core and resets it if so.
    pub fn reset(&self, cpu: LogicalCpuId) {
        self.with_state(cpu, |state| self.descriptor.reset(state));
    }

    /// Saves the registers of the PMU of `cpu` before its core powers down.
    pub fn save_regs(&self, cpu: LogicalCpuId) {
        self.with_state(cpu, |state| self.descriptor.save_regs(state));
    }

    /// Restores the registers of the PMU of `cpu` after its core powers up.
    pub fn restore_regs(&self, cpu: LogicalCpuId) {
        self.with_state(cpu, |state| self.descriptor.restore_regs(state));
    }

    /// Resets the PMU of every CPU served, each on its own CPU.
    pub fn reset_all(&self) {
        P::run_on_each_cpu(self.valid_cpus, |cpu| self.reset(cpu));
    }

    fn irq_of(&self, cpu: LogicalCpuId) -> Option<Irq> {
        self.cpu_pmu(cpu)
            .and_then(|pmu| P::exception_free(|| pmu.lock().irq()))
    }

    /// Routes each CPU's overflow interrupt to it and installs the handler.
    ///
    /// A CPU whose interrupt can't be routed is skipped, unless the device only has one interrupt
    /// for all CPUs. If installing a handler fails, every handler installed so far is removed
    /// again.
    pub fn request_irq(&mut self) -> Result<(), PmuError> {
        if self.irq_count < 1 {
            error!("no irqs for PMUs defined");
            return Err(PmuError::NoIrqs);
        }

        for cpu in self.valid_cpus.iter() {
            let Some(irq) = self.irq_of(cpu) else {
                continue;
            };

            if P::irq_set_affinity(irq, cpu).is_err() && self.irq_count > 1 {
                warn!("unable to set irq affinity (irq={irq}, {cpu})");
                continue;
            }

            if P::request_irq(irq, self.id).is_err() {
                error!("unable to request IRQ{irq} for {} PMU counters", self.name());
                self.free_irq();
                return Err(PmuError::IrqRequest(irq));
            }

            self.active_irqs.insert(cpu);
        }
        Ok(())
    }

    /// Takes a reference on the interrupt handlers, installing them for the first user.
    pub fn reserve_hardware(&mut self) -> Result<(), PmuError> {
        if self.users == 0 {
            self.request_irq()?;
        }
        self.users += 1;
        Ok(())
    }

    /// Drops a reference taken by `reserve_hardware`, removing the handlers after the last user.
    pub fn release_hardware(&mut self) {
        match self.users {
            0 => warn!("{} PMU released more often than reserved", self.name()),
            1 => self.free_irq(),
            _ => {}
        }
        self.users = self.users.saturating_sub(1);
    }

    /// Returns the number of users holding the interrupt handlers installed.
    pub fn users(&self) -> usize {
        self.users
    }

    /// Removes every handler installed by `request_irq`.
    pub fn free_irq(&mut self) {
        for cpu in self.active_irqs.iter() {
            if let Some(irq) = self.irq_of(cpu) {
                P::free_irq(irq, self.id);
            }
        }
        self.active_irqs = CpuMask::EMPTY;
    }

    /// Handles an overflow interrupt on `cpu`.
    ///
    /// The PMU lock is dropped while the framework's callbacks run.
    pub fn handle_irq<F: EventFramework>(
        &self,
        cpu: LogicalCpuId,
        framework: &F,
        regs: &F::Regs,
    ) -> IrqReturn {
        let Some(pmu) = self.cpu_pmu(cpu) else {
            return IrqReturn::None;
        };
        let descriptor = self.descriptor;

        let overflowed = P::exception_free(|| {
            let mut state = pmu.lock();
            if !state.regs().is_active() {
                // Can happen while a cluster switch is migrating the interrupt.
                debug!("Ignoring interrupt for inactive PMU of {cpu}");
                return None;
            }
            let overflow = descriptor.read_and_clear_overflow(&mut state);
            if overflow == 0 {
                return None;
            }
            Some(
                (0..state.num_counters())
                    .filter(|&idx| descriptor.counter_has_overflowed(overflow, idx))
                    .filter_map(|idx| Some((idx, state.event(idx)?)))
                    .collect::<ArrayVec<_, MAX_COUNTERS>>(),
            )
        });
        let Some(overflowed) = overflowed else {
            return IrqReturn::None;
        };

        for (idx, event) in overflowed {
            let count = P::exception_free(|| descriptor.read_counter(&mut pmu.lock(), idx));
            framework.update(event, count);
            let data = SampleData::new(framework.last_period(event));
            let Some(start) = framework.set_period(event) else {
                continue;
            };
            P::exception_free(|| descriptor.write_counter(&mut pmu.lock(), idx, start));

            if framework.overflow(event, &data, regs) {
                P::exception_free(|| descriptor.disable(&mut pmu.lock(), idx));
            }
        }

        framework.run_deferred_work();
        IrqReturn::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        armv7::{ArmV7Pmu, EventFilter, L1_DCACHE_REFILL},
        cpu::{cortex_a9::CortexA9, cortex_a15::CortexA15},
        event::{CacheEvent, CacheLevel, CacheOp, CacheResult, HardwareEvent, ModeExclusion},
        platform::test::{CORTEX_A9_MIDR, TestPlatform},
        topology::resolve_bindings,
    };
    use armv7_pmu_regs::{Pmcr, PmuRegister};
    use std::sync::Mutex;

    const CPU0: LogicalCpuId = LogicalCpuId(0);
    const CPU1: LogicalCpuId = LogicalCpuId(1);

    /// Records the framework callbacks made by the interrupt handler.
    #[derive(Default)]
    struct RecordingFramework {
        updates: Mutex<Vec<(EventHandle, u32)>>,
        overflows: Mutex<Vec<(EventHandle, SampleData)>>,
        deferred_runs: Mutex<usize>,
        next_start: Option<u32>,
        throttle: bool,
    }

    impl EventFramework for RecordingFramework {
        type Regs = ();

        fn update(&self, event: EventHandle, count: u32) {
            self.updates.lock().unwrap().push((event, count));
        }

        fn last_period(&self, _event: EventHandle) -> u64 {
            1000
        }

        fn set_period(&self, _event: EventHandle) -> Option<u32> {
            self.next_start
        }

        fn overflow(&self, event: EventHandle, data: &SampleData, _regs: &()) -> bool {
            self.overflows.lock().unwrap().push((event, *data));
            self.throttle
        }

        fn run_deferred_work(&self) {
            *self.deferred_runs.lock().unwrap() += 1;
        }
    }

    fn instance(
        descriptor: &'static dyn Microarchitecture,
        irqs: &[Option<Irq>],
    ) -> PmuInstance<TestPlatform> {
        let topology = TestPlatform::topology();
        let bindings = resolve_bindings(None, irqs, &topology);
        let num_counters = TestPlatform::run_on_cpu(CPU0, || descriptor.init()).unwrap();
        let instance = PmuInstance::new(
            InstanceId(0),
            descriptor,
            num_counters,
            &bindings,
            irqs.len().min(TestPlatform::CORE_COUNT),
        )
        .unwrap();
        instance.reset_all();
        instance
    }

    fn a9_instance() -> PmuInstance<TestPlatform> {
        TestPlatform::smp(CORTEX_A9_MIDR, 4);
        instance(
            &ArmV7Pmu::<CortexA9>::DESCRIPTOR,
            &[Some(Irq(40)), Some(Irq(41)), Some(Irq(42)), Some(Irq(43))],
        )
    }

    #[test]
    fn counters_include_cycle_counter() {
        let instance = a9_instance();
        assert_eq!(5, instance.num_counters());
        assert_eq!(4, instance.valid_cpus().len());
        assert!(instance.is_active(CPU0));
        assert_eq!(u64::from(u32::MAX), instance.max_period());
    }

    #[test]
    fn cpu_init_snapshots_common_events() {
        TestPlatform::smp(CORTEX_A9_MIDR, 4);
        TestPlatform::with_fake_pmu(CPU1, |pmu| pmu.set_common_events(0x1234, 0x5678));
        let instance = instance(&ArmV7Pmu::<CortexA9>::DESCRIPTOR, &[Some(Irq(40))]);
        let pmu = instance.cpu_pmu(CPU1).unwrap().lock();
        assert_eq!(0x1234, pmu.regs().logical().get(PmuRegister::Pmceid0));
        assert_eq!(0x5678, pmu.regs().logical().get(PmuRegister::Pmceid1));
    }

    #[test]
    fn cycle_counter_claimed_once() {
        let instance = a9_instance();
        let counter = TestPlatform::run_on_cpu(CPU0, || instance.add(CPU0, EventHandle(1), 0xff))
            .unwrap();
        assert_eq!(0, counter.idx);
        assert_eq!(
            Err(PmuError::NoFreeCounter),
            TestPlatform::run_on_cpu(CPU0, || instance.add(CPU0, EventHandle(2), 0xff))
        );
        TestPlatform::run_on_cpu(CPU0, || instance.del(CPU0, &counter));
        assert_eq!(
            Ok(0),
            TestPlatform::run_on_cpu(CPU0, || instance.get_event_idx(CPU0, 0xff))
        );
    }

    #[test]
    fn event_counters_exhausted() {
        let instance = a9_instance();
        TestPlatform::run_on_cpu(CPU1, || {
            for expected in 1..5 {
                assert_eq!(Ok(expected), instance.get_event_idx(CPU1, 0x08));
            }
            assert_eq!(
                Err(PmuError::NoFreeCounter),
                instance.get_event_idx(CPU1, 0x08)
            );
            instance.clear_event_idx(CPU1, 3);
            assert_eq!(Ok(3), instance.get_event_idx(CPU1, 0x08));
        });
    }

    #[test]
    fn cortex_a9_allocation() {
        let instance = a9_instance();
        let code = |event| instance.map_event(&EventConfig::Hardware(event)).unwrap();
        let cycles = code(HardwareEvent::CpuCycles);
        let instructions = code(HardwareEvent::Instructions);
        let others = [
            code(HardwareEvent::CacheReferences),
            code(HardwareEvent::CacheMisses),
            code(HardwareEvent::BranchInstructions),
        ];
        let branch_misses = code(HardwareEvent::BranchMisses);

        TestPlatform::run_on_cpu(CPU0, || {
            assert_eq!(0, instance.add(CPU0, EventHandle(0), cycles).unwrap().idx);
            assert_eq!(1, instance.add(CPU0, EventHandle(1), instructions).unwrap().idx);
            let counters: Vec<_> = (2..)
                .zip(others)
                .map(|(handle, config)| instance.add(CPU0, EventHandle(handle), config).unwrap())
                .collect();
            assert_eq!(
                vec![2, 3, 4],
                counters.iter().map(|counter| counter.idx).collect::<Vec<_>>()
            );
            assert_eq!(
                Err(PmuError::NoFreeCounter),
                instance.add(CPU0, EventHandle(5), branch_misses)
            );

            instance.del(CPU0, &counters[0]);
            assert_eq!(
                2,
                instance.add(CPU0, EventHandle(6), branch_misses).unwrap().idx
            );
        });

        let l1d_miss = |op| {
            instance.map_event(&EventConfig::Cache(CacheEvent::new(
                CacheLevel::L1d,
                op,
                CacheResult::Miss,
            )))
        };
        assert_eq!(Ok(L1_DCACHE_REFILL), l1d_miss(CacheOp::Write));
        assert_eq!(l1d_miss(CacheOp::Read), l1d_miss(CacheOp::Write));
    }

    fn assert_slots_match_mask(instance: &PmuInstance<TestPlatform>, cpu: LogicalCpuId) {
        let pmu = instance.cpu_pmu(cpu).unwrap().lock();
        let events = (0..MAX_COUNTERS)
            .filter(|&idx| pmu.event(idx).is_some())
            .count();
        assert_eq!(pmu.used_mask().len(), events);
        for idx in 0..MAX_COUNTERS {
            assert_eq!(pmu.used_mask().contains(idx), pmu.event(idx).is_some());
        }
    }

    #[test]
    fn used_mask_tracks_events() {
        let instance = a9_instance();
        TestPlatform::run_on_cpu(CPU1, || {
            let mut counters = Vec::new();
            for (handle, config) in [0xff, 0x08, 0x08, 0xff, 0x08, 0x08, 0x08, 0x08]
                .into_iter()
                .enumerate()
            {
                if let Ok(counter) = instance.add(CPU1, EventHandle(handle), config) {
                    counters.push(counter);
                }
                assert_slots_match_mask(&instance, CPU1);
            }
            assert_eq!(5, counters.len());

            for counter in [counters[2], counters[0]] {
                instance.del(CPU1, &counter);
                assert_slots_match_mask(&instance, CPU1);
            }
            let again = instance.add(CPU1, EventHandle(10), 0x08).unwrap();
            assert_eq!(counters[2].idx, again.idx);
            assert_slots_match_mask(&instance, CPU1);

            for counter in [counters[1], again, counters[3], counters[4]] {
                instance.del(CPU1, &counter);
                assert_slots_match_mask(&instance, CPU1);
            }
        });
        let pmu = instance.cpu_pmu(CPU1).unwrap().lock();
        assert!(pmu.used_mask().is_empty());
    }

    #[test]
    fn release_of_invalid_counter_ignored() {
        let instance = a9_instance();
        TestPlatform::run_on_cpu(CPU0, || {
            let counter = instance.add(CPU0, EventHandle(1), 0x08).unwrap();
            instance.clear_event_idx(CPU0, 40);
            instance.clear_event_idx(CPU0, 5);
            instance.del(
                CPU0,
                &HwCounter {
                    idx: 40,
                    config_base: 0x08,
                },
            );
            let pmu = instance.cpu_pmu(CPU0).unwrap().lock();
            assert_eq!(1, pmu.used_mask().len());
            assert_eq!(Some(EventHandle(1)), pmu.event(counter.idx));
        });
    }

    #[test]
    fn enable_programs_hardware() {
        let instance = a9_instance();
        TestPlatform::run_on_cpu(CPU0, || {
            let counter = instance.add(CPU0, EventHandle(1), 0x68).unwrap();
            assert_eq!(1, counter.idx);
            instance.enable(CPU0, &counter);
            instance.write_counter(CPU0, &counter, 0xffff_0000);
            instance.start(CPU0);
            assert_eq!(0xffff_0000, instance.read_counter(CPU0, &counter));
        });
        TestPlatform::with_fake_pmu(CPU0, |pmu| {
            assert_eq!(0x68, pmu.event_type(0));
            assert_eq!(0x1, pmu.count_enable());
            assert_eq!(0x1, pmu.interrupt_enable());
            assert!(pmu.control().contains(Pmcr::E));
        });
        TestPlatform::run_on_cpu(CPU0, || instance.stop(CPU0));
        TestPlatform::with_fake_pmu(CPU0, |pmu| assert!(!pmu.control().contains(Pmcr::E)));
    }

    #[test]
    fn cycle_counter_event_type_untouched_without_filter() {
        let instance = a9_instance();
        TestPlatform::run_on_cpu(CPU0, || {
            let counter = instance.add(CPU0, EventHandle(1), 0xff).unwrap();
            instance.enable(CPU0, &counter);
        });
        TestPlatform::with_fake_pmu(CPU0, |pmu| {
            assert_eq!(0x8000_0000, pmu.count_enable());
            assert_eq!(0x8000_0000, pmu.interrupt_enable());
            assert_eq!(0, pmu.select());
        });
    }

    #[test]
    fn invalid_counter_index_ignored() {
        let instance = a9_instance();
        let counter = HwCounter {
            idx: 9,
            config_base: 0x08,
        };
        TestPlatform::run_on_cpu(CPU0, || {
            instance.enable(CPU0, &counter);
            assert_eq!(0, instance.read_counter(CPU0, &counter));
        });
        TestPlatform::with_fake_pmu(CPU0, |pmu| assert_eq!(0, pmu.count_enable()));
    }

    #[test]
    fn disable_clears_pending_overflow() {
        let instance = a9_instance();
        TestPlatform::run_on_cpu(CPU0, || {
            let counter = instance.add(CPU0, EventHandle(1), 0x68).unwrap();
            instance.enable(CPU0, &counter);
            TestPlatform::with_fake_pmu(CPU0, |pmu| pmu.raise_overflow(0x1));
            instance.disable(CPU0, &counter);
        });
        TestPlatform::with_fake_pmu(CPU0, |pmu| {
            assert_eq!(0, pmu.overflow());
            assert_eq!(0, pmu.count_enable());
            assert_eq!(0, pmu.interrupt_enable());
        });
    }

    #[test]
    fn reset_clears_everything() {
        let instance = a9_instance();
        TestPlatform::run_on_cpu(CPU0, || {
            let counter = instance.add(CPU0, EventHandle(1), 0x68).unwrap();
            instance.enable(CPU0, &counter);
            instance.write_counter(CPU0, &counter, 77);
            instance.start(CPU0);
            instance.reset(CPU0);
        });
        TestPlatform::with_fake_pmu(CPU0, |pmu| {
            assert_eq!(0, pmu.count_enable());
            assert_eq!(0, pmu.interrupt_enable());
            assert_eq!(0, pmu.event_count(0));
            assert_eq!(Pmcr::empty(), pmu.control() & Pmcr::all());
        });
    }

    #[test]
    fn event_init_without_filter() {
        let instance = a9_instance();
        let attr = EventAttr::new(EventConfig::Hardware(HardwareEvent::Instructions));
        assert_eq!(Ok(0x68), instance.event_init(&attr));
        assert_eq!(
            Err(PmuError::PermissionDenied),
            instance.event_init(&attr.excluding(ModeExclusion::KERNEL))
        );
        assert_eq!(
            Err(PmuError::Unsupported),
            instance.event_init(&EventAttr::new(EventConfig::Hardware(
                HardwareEvent::RefCpuCycles
            )))
        );
    }

    #[test]
    fn event_init_with_filter() {
        TestPlatform::smp(CORTEX_A9_MIDR, 4);
        let instance = instance(&ArmV7Pmu::<CortexA15>::DESCRIPTOR, &[Some(Irq(40))]);
        let attr = EventAttr::new(EventConfig::Hardware(HardwareEvent::CpuCycles));
        assert_eq!(
            Ok(0xff | EventFilter::INCLUDE_HYP.bits()),
            instance.event_init(&attr)
        );
        assert_eq!(
            Ok(0xff | EventFilter::EXCLUDE_USER.bits() | EventFilter::INCLUDE_HYP.bits()),
            instance.event_init(&attr.excluding(ModeExclusion::USER))
        );
        assert_eq!(
            Err(PmuError::PermissionDenied),
            instance.event_init(&attr.excluding(ModeExclusion::IDLE))
        );
    }

    #[test]
    fn uniprocessor_mpidr_always_active() {
        let instance = a9_instance();
        TestPlatform::set_mpidr(CPU0, Mpidr::U);
        TestPlatform::run_on_cpu(CPU0, || instance.reset(CPU1));
        assert!(instance.is_active(CPU1));
    }

    #[test]
    fn inactive_pmu_uses_shadow_only() {
        let instance = a9_instance();
        // Evaluate CPU1's PMU from CPU0, so that it is not the current core.
        TestPlatform::run_on_cpu(CPU0, || instance.reset(CPU1));
        assert!(!instance.is_active(CPU1));
        let accesses = TestPlatform::with_fake_pmu(CPU1, |pmu| pmu.accesses());

        TestPlatform::run_on_cpu(CPU0, || {
            let counter = instance.add(CPU1, EventHandle(1), 0x08).unwrap();
            instance.enable(CPU1, &counter);
            instance.start(CPU1);
        });

        TestPlatform::with_fake_pmu(CPU1, |pmu| assert_eq!(accesses, pmu.accesses()));
        TestPlatform::with_fake_pmu(CPU0, |pmu| assert_eq!(0, pmu.count_enable()));
        let pmu = instance.cpu_pmu(CPU1).unwrap().lock();
        let logical = pmu.regs().logical();
        assert_eq!(0x1, logical.get(PmuRegister::Pmcntenset));
        assert_eq!(0x1, logical.get(PmuRegister::Pmintenset));
        assert_eq!(Pmcr::E.bits(), logical.get(PmuRegister::Pmcr));
        assert_eq!(0x08, logical.counter(0).unwrap().evtyper);
    }

    #[test]
    fn save_and_restore_round_trip() {
        let instance = a9_instance();
        TestPlatform::run_on_cpu(CPU0, || {
            let cycles = instance.add(CPU0, EventHandle(1), 0xff).unwrap();
            let counter = instance.add(CPU0, EventHandle(2), 0x04).unwrap();
            instance.enable(CPU0, &cycles);
            instance.enable(CPU0, &counter);
            instance.write_counter(CPU0, &cycles, 5000);
            instance.write_counter(CPU0, &counter, 300);
            instance.start(CPU0);
            instance.save_regs(CPU0);
        });

        // Power loss.
        TestPlatform::with_fake_pmu(CPU0, |pmu| *pmu = armv7_pmu_regs::fake::FakePmu::new(4));
        TestPlatform::run_on_cpu(CPU0, || instance.restore_regs(CPU0));

        TestPlatform::with_fake_pmu(CPU0, |pmu| {
            assert!(pmu.control().contains(Pmcr::E));
            assert_eq!(0x8000_0001, pmu.count_enable());
            assert_eq!(0x8000_0001, pmu.interrupt_enable());
            assert_eq!(5000, pmu.cycle_count());
            assert_eq!(0x04, pmu.event_type(0));
            assert_eq!(300, pmu.event_count(0));
        });
    }

    #[test]
    fn save_skipped_while_stopped() {
        let instance = a9_instance();
        TestPlatform::run_on_cpu(CPU0, || {
            let counter = instance.add(CPU0, EventHandle(1), 0x04).unwrap();
            instance.enable(CPU0, &counter);
            instance.save_regs(CPU0);
        });
        let pmu = instance.cpu_pmu(CPU0).unwrap().lock();
        let logical = pmu.regs().logical();
        assert_eq!(0, logical.get(PmuRegister::Pmcr) & Pmcr::E.bits());
        assert_eq!(0, logical.get(PmuRegister::Pmcntenset));
    }

    #[test]
    fn restore_without_events_only_resets() {
        let instance = a9_instance();
        TestPlatform::with_fake_pmu(CPU0, |pmu| pmu.set_cycle_count(99));
        TestPlatform::run_on_cpu(CPU0, || instance.restore_regs(CPU0));
        TestPlatform::with_fake_pmu(CPU0, |pmu| {
            assert_eq!(0, pmu.cycle_count());
            assert!(!pmu.control().contains(Pmcr::E));
        });
    }

    #[test]
    fn overflow_interrupt_handled() {
        let instance = a9_instance();
        let framework = RecordingFramework {
            next_start: Some(0xffff_fc18),
            ..Default::default()
        };
        let counter = TestPlatform::run_on_cpu(CPU0, || {
            let counter = instance.add(CPU0, EventHandle(7), 0x08).unwrap();
            instance.enable(CPU0, &counter);
            instance.start(CPU0);
            counter
        });
        TestPlatform::with_fake_pmu(CPU0, |pmu| {
            pmu.set_event_count(0, 12);
            pmu.raise_overflow(0x1);
        });

        assert_eq!(
            IrqReturn::Handled,
            TestPlatform::run_on_cpu(CPU0, || instance.handle_irq(CPU0, &framework, &()))
        );
        assert_eq!(vec![(EventHandle(7), 12)], *framework.updates.lock().unwrap());
        assert_eq!(
            vec![(EventHandle(7), SampleData::new(1000))],
            *framework.overflows.lock().unwrap()
        );
        assert_eq!(1, *framework.deferred_runs.lock().unwrap());
        TestPlatform::with_fake_pmu(CPU0, |pmu| {
            assert_eq!(0, pmu.overflow());
            assert_eq!(0xffff_fc18, pmu.event_count(0));
            assert_eq!(0x1, pmu.count_enable());
        });
        assert_eq!(
            0xffff_fc18,
            TestPlatform::run_on_cpu(CPU0, || instance.read_counter(CPU0, &counter))
        );
    }

    #[test]
    fn throttled_event_disabled() {
        let instance = a9_instance();
        let framework = RecordingFramework {
            next_start: Some(0),
            throttle: true,
            ..Default::default()
        };
        TestPlatform::run_on_cpu(CPU0, || {
            let counter = instance.add(CPU0, EventHandle(7), 0x08).unwrap();
            instance.enable(CPU0, &counter);
        });
        TestPlatform::with_fake_pmu(CPU0, |pmu| pmu.raise_overflow(0x1));
        TestPlatform::run_on_cpu(CPU0, || instance.handle_irq(CPU0, &framework, &()));
        TestPlatform::with_fake_pmu(CPU0, |pmu| {
            assert_eq!(0, pmu.count_enable());
            assert_eq!(0, pmu.interrupt_enable());
        });
    }

    #[test]
    fn no_next_period_skips_overflow() {
        let instance = a9_instance();
        let framework = RecordingFramework::default();
        TestPlatform::run_on_cpu(CPU0, || {
            let counter = instance.add(CPU0, EventHandle(7), 0x08).unwrap();
            instance.enable(CPU0, &counter);
        });
        TestPlatform::with_fake_pmu(CPU0, |pmu| pmu.raise_overflow(0x1));
        assert_eq!(
            IrqReturn::Handled,
            TestPlatform::run_on_cpu(CPU0, || instance.handle_irq(CPU0, &framework, &()))
        );
        assert_eq!(1, framework.updates.lock().unwrap().len());
        assert!(framework.overflows.lock().unwrap().is_empty());
    }

    #[test]
    fn spurious_interrupt_not_handled() {
        let instance = a9_instance();
        let framework = RecordingFramework::default();
        assert_eq!(
            IrqReturn::None,
            TestPlatform::run_on_cpu(CPU0, || instance.handle_irq(CPU0, &framework, &()))
        );
        assert_eq!(0, *framework.deferred_runs.lock().unwrap());
    }

    #[test]
    fn interrupt_for_inactive_pmu_touches_nothing() {
        let instance = a9_instance();
        let framework = RecordingFramework::default();
        TestPlatform::run_on_cpu(CPU0, || instance.reset(CPU1));
        TestPlatform::with_fake_pmu(CPU1, |pmu| pmu.raise_overflow(0x1));
        let accesses = TestPlatform::with_fake_pmu(CPU1, |pmu| pmu.accesses());
        assert_eq!(
            IrqReturn::None,
            TestPlatform::run_on_cpu(CPU0, || instance.handle_irq(CPU1, &framework, &()))
        );
        TestPlatform::with_fake_pmu(CPU1, |pmu| {
            assert_eq!(accesses, pmu.accesses());
            assert_eq!(0x1, pmu.overflow());
        });
    }

    #[test]
    fn irqs_requested_per_cpu() {
        let mut instance = a9_instance();
        instance.request_irq().unwrap();
        assert_eq!(4, instance.active_irqs().len());
        assert_eq!(
            vec![
                (Irq(40), InstanceId(0)),
                (Irq(41), InstanceId(0)),
                (Irq(42), InstanceId(0)),
                (Irq(43), InstanceId(0)),
            ],
            TestPlatform::requested_irqs()
        );
        instance.free_irq();
        assert!(instance.active_irqs().is_empty());
        assert!(TestPlatform::requested_irqs().is_empty());
    }

    #[test]
    fn reservations_counted() {
        let mut instance = a9_instance();
        instance.reserve_hardware().unwrap();
        instance.reserve_hardware().unwrap();
        assert_eq!(4, TestPlatform::requested_irqs().len());
        instance.release_hardware();
        assert_eq!(4, TestPlatform::requested_irqs().len());
        instance.release_hardware();
        assert!(TestPlatform::requested_irqs().is_empty());
        assert_eq!(0, instance.users());
    }

    #[test]
    fn affinity_failure_skips_cpu() {
        let mut instance = a9_instance();
        TestPlatform::fail_irq_affinity(Irq(41));
        instance.request_irq().unwrap();
        assert!(!instance.active_irqs().contains(CPU1));
        assert_eq!(3, instance.active_irqs().len());
    }

    #[test]
    fn single_irq_requested_despite_affinity_failure() {
        TestPlatform::smp(CORTEX_A9_MIDR, 4);
        let mut instance = instance(&ArmV7Pmu::<CortexA9>::DESCRIPTOR, &[Some(Irq(40))]);
        TestPlatform::fail_irq_affinity(Irq(40));
        instance.request_irq().unwrap();
        assert_eq!(vec![CPU0], instance.active_irqs().iter().collect::<Vec<_>>());
    }

    #[test]
    fn request_failure_unwinds() {
        let mut instance = a9_instance();
        TestPlatform::fail_request_irq(Irq(42));
        assert_eq!(Err(PmuError::IrqRequest(Irq(42))), instance.request_irq());
        assert!(instance.active_irqs().is_empty());
        assert!(TestPlatform::requested_irqs().is_empty());
    }

    #[test]
    fn missing_irqs_rejected() {
        TestPlatform::smp(CORTEX_A9_MIDR, 4);
        let mut instance = instance(&ArmV7Pmu::<CortexA9>::DESCRIPTOR, &[]);
        assert_eq!(Err(PmuError::NoIrqs), instance.request_irq());
    }

    #[test]
    fn unserved_cpu_rejected() {
        TestPlatform::smp(CORTEX_A9_MIDR, 4);
        let instance: PmuInstance<TestPlatform> = PmuInstance::new(
            InstanceId(3),
            &ArmV7Pmu::<CortexA9>::DESCRIPTOR,
            5,
            &[],
            0,
        )
        .unwrap();
        assert!(instance.cpu_pmu(CPU0).is_none());
        assert_eq!(
            Err(PmuError::NoDevice),
            instance.add(CPU0, EventHandle(1), 0x08)
        );
        assert!(!instance.is_active(CPU0));
    }
}
