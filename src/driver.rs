// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Probing of PMU devices, and the hooks the platform calls on CPU hotplug and power transitions.

use crate::{
    cpu::{Microarchitecture, OF_DEVICE_IDS},
    error::PmuError,
    framework::EventFramework,
    instance::{InstanceId, IrqReturn, PmuInstance},
    platform::Platform,
    registry::Registry,
    topology::{CpuMask, LogicalCpuId, MAX_CPUS, PmuDevice, resolve_bindings},
};
use alloc::vec::Vec;
use armv7_pmu_regs::read_midr;
use log::{debug, info};

/// The CPU PMU driver: the PMU instances probed so far and which of them owns each CPU.
pub struct PmuDriver<'r, P: Platform> {
    registry: &'r Registry,
    instances: Vec<Option<PmuInstance<P>>>,
    /// Live instances, oldest probe first. Slots are reused, so this is not slot order.
    probe_order: Vec<InstanceId>,
    /// The most recently probed instance serving each logical CPU.
    owners: [Option<InstanceId>; MAX_CPUS],
}

impl<'r, P: Platform> PmuDriver<'r, P> {
    /// Creates a driver which matches devices against the descriptors in `registry`.
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            instances: Vec::new(),
            probe_order: Vec::new(),
            owners: [None; MAX_CPUS],
        }
    }

    /// Finds the descriptor for `device`, sets up an instance serving the CPUs it is bound to and
    /// resets their PMUs.
    ///
    /// Without a device tree node, the PMU of whichever CPU the probe runs on is identified by its
    /// MIDR.
    pub fn probe(&mut self, device: &PmuDevice) -> Result<InstanceId, PmuError> {
        let result = self.try_probe(device);
        if let Err(e) = result {
            info!("failed to register PMU device {}: {e}", device.name);
        }
        result
    }

    fn try_probe(&mut self, device: &PmuDevice) -> Result<InstanceId, PmuError> {
        let topology = P::topology();
        if topology.is_empty() {
            return Err(PmuError::NoDevice);
        }

        let descriptor = self.match_descriptor(device, topology.possible_cpus())?;
        let bindings = resolve_bindings(device.of_node.as_ref(), device.irqs, &topology);
        let valid_cpus: CpuMask = bindings.iter().map(|binding| binding.cpu).collect();
        if valid_cpus.is_empty() {
            debug!("No CPU served by {}", device.name);
            return Err(PmuError::NoDevice);
        }

        // Prefer a CPU which is on the PMU's own core right now, so that the counters read are
        // this PMU's.
        let resident: CpuMask = bindings
            .iter()
            .filter(|binding| topology.physical_core(binding.cpu) == Some(binding.core))
            .map(|binding| binding.cpu)
            .collect();
        let init_cpus = if resident.is_empty() {
            valid_cpus
        } else {
            resident
        };
        let num_counters = P::run_on_any_cpu(init_cpus, || descriptor.init())?;

        let slot = match self.instances.iter().position(Option::is_none) {
            Some(slot) => slot,
            None => {
                self.instances
                    .try_reserve(1)
                    .map_err(|_| PmuError::OutOfMemory)?;
                self.instances.push(None);
                self.instances.len() - 1
            }
        };
        let id = InstanceId(slot);
        self.probe_order
            .try_reserve(1)
            .map_err(|_| PmuError::OutOfMemory)?;
        let irq_count = device.irqs.len().min(topology.len());
        let instance = PmuInstance::new(id, descriptor, num_counters, &bindings, irq_count)?;

        // The PMU registers are UNKNOWN out of reset.
        instance.reset_all();

        for cpu in valid_cpus.iter() {
            self.owners[cpu.0] = Some(id);
        }
        self.instances[slot] = Some(instance);
        self.probe_order.push(id);
        info!(
            "{} PMU registered for {} CPUs",
            descriptor.name(),
            valid_cpus.len()
        );
        Ok(id)
    }

    fn match_descriptor(
        &self,
        device: &PmuDevice,
        possible_cpus: CpuMask,
    ) -> Result<&'static dyn Microarchitecture, PmuError> {
        match &device.of_node {
            Some(node) => {
                if !OF_DEVICE_IDS.contains(&node.compatible) {
                    return Err(PmuError::NoDevice);
                }
                self.registry.match_compatible(node.compatible)
            }
            None => {
                let midr = P::run_on_any_cpu(possible_cpus, read_midr);
                info!("probing PMU by {midr:?}");
                self.registry.match_midr(midr)
            }
        }
    }

    /// Tears down instance `id`, removing its interrupt handlers.
    pub fn remove(&mut self, id: InstanceId) -> Result<(), PmuError> {
        let mut instance = self
            .instances
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(PmuError::NoDevice)?;
        instance.free_irq();
        self.probe_order.retain(|&other| other != id);

        for cpu in instance.valid_cpus().iter() {
            if self.owners[cpu.0] == Some(id) {
                self.owners[cpu.0] = self
                    .probe_order
                    .iter()
                    .rev()
                    .copied()
                    .find(|&other| {
                        self.instance(other)
                            .is_some_and(|other| other.valid_cpus().contains(cpu))
                    });
            }
        }
        info!("{} PMU removed", instance.name());
        Ok(())
    }

    /// Returns instance `id`.
    pub fn instance(&self, id: InstanceId) -> Option<&PmuInstance<P>> {
        self.instances.get(id.0)?.as_ref()
    }

    /// Returns instance `id` for modification.
    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut PmuInstance<P>> {
        self.instances.get_mut(id.0)?.as_mut()
    }

    /// Iterates over all probed instances.
    pub fn instances(&self) -> impl Iterator<Item = &PmuInstance<P>> {
        self.instances.iter().flatten()
    }

    /// Reserves the interrupt handlers of instance `id` for a new event. The handlers are
    /// installed when the first event is created.
    pub fn reserve_hardware(&mut self, id: InstanceId) -> Result<(), PmuError> {
        self.instance_mut(id)
            .ok_or(PmuError::NoDevice)?
            .reserve_hardware()
    }

    /// Releases a reservation of instance `id`. The handlers are removed after the last event is
    /// destroyed.
    pub fn release_hardware(&mut self, id: InstanceId) {
        if let Some(instance) = self.instance_mut(id) {
            instance.release_hardware();
        }
    }

    fn serving(&self, cpu: LogicalCpuId) -> impl Iterator<Item = &PmuInstance<P>> {
        self.instances()
            .filter(move |instance| instance.valid_cpus().contains(cpu))
    }

    /// Resets the PMUs of `cpu` as it comes online. Must be called on `cpu`.
    pub fn cpu_starting(&self, cpu: LogicalCpuId) {
        for instance in self.serving(cpu) {
            instance.reset(cpu);
        }
    }

    /// Saves the PMU registers of `cpu` before its core loses power. Must be called on `cpu`.
    pub fn cpu_pm_enter(&self, cpu: LogicalCpuId) {
        for instance in self.serving(cpu) {
            instance.save_regs(cpu);
            instance.reset(cpu);
        }
    }

    /// Restores the PMU registers of `cpu` after its core regains power. Must be called on `cpu`.
    pub fn cpu_pm_exit(&self, cpu: LogicalCpuId) {
        for instance in self.serving(cpu) {
            instance.restore_regs(cpu);
        }
    }

    /// Handles an overflow interrupt of instance `id`, taken on `cpu`.
    pub fn handle_irq<F: EventFramework>(
        &self,
        id: InstanceId,
        cpu: LogicalCpuId,
        framework: &F,
        regs: &F::Regs,
    ) -> IrqReturn {
        match self.instance(id) {
            Some(instance) => instance.handle_irq(cpu, framework, regs),
            None => IrqReturn::None,
        }
    }

    fn owner_of_cpu0(&self) -> Option<&PmuInstance<P>> {
        self.owners[0].and_then(|id| self.instance(id))
    }

    /// Returns the name of the PMU of logical CPU 0, if it has one.
    pub fn perf_pmu_name(&self) -> Option<&'static str> {
        self.owner_of_cpu0().map(PmuInstance::name)
    }

    /// Returns the number of counters of the PMU of logical CPU 0, or 0 if it has none.
    pub fn perf_num_counters(&self) -> usize {
        self.owner_of_cpu0().map_or(0, PmuInstance::num_counters)
    }
}
