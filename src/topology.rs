// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! CPU identities and the binding of PMU interrupts to logical CPUs.
//!
//! Logical CPUs are what the rest of the system schedules on. Physical cores are identified by
//! their MPIDR affinity. With a cluster switcher the mapping between the two changes at runtime, so
//! it is always passed in explicitly as a [`CpuTopology`] snapshot.

use crate::error::PmuError;
use armv7_pmu_regs::Mpidr;
use arrayvec::ArrayVec;
use core::fmt::{self, Display, Formatter};
use log::debug;
use zerocopy::{FromBytes, big_endian::U32};

/// Maximum number of logical CPUs supported.
pub const MAX_CPUS: usize = 64;

/// Index of a CPU as seen by the scheduler.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LogicalCpuId(pub usize);

impl Display for LogicalCpuId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "CPU{}", self.0)
    }
}

/// Identity of a physical core: the affinity fields of its MPIDR.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PhysicalCoreId(u32);

impl PhysicalCoreId {
    /// Returns the identity of core `core` in cluster `cluster`.
    pub const fn new(cluster: u8, core: u8) -> Self {
        Self(Mpidr::from_affinity(cluster, core).affinity())
    }

    /// Returns the identity of the core with the given MPIDR.
    pub const fn from_mpidr(mpidr: Mpidr) -> Self {
        Self(mpidr.affinity())
    }

    /// Returns the cluster (Aff1) of the core.
    pub const fn cluster(self) -> u8 {
        (self.0 >> Mpidr::AFF1_SHIFT) as u8
    }

    /// Returns the index (Aff0) of the core within its cluster.
    pub const fn core(self) -> u8 {
        (self.0 >> Mpidr::AFF0_SHIFT) as u8
    }

    /// Returns the core with the same core index in the given cluster.
    pub const fn with_cluster(self, cluster: u8) -> Self {
        Self(self.0 & !(0xff << Mpidr::AFF1_SHIFT) | (cluster as u32) << Mpidr::AFF1_SHIFT)
    }

    /// Returns whether `mpidr` identifies this core, ignoring the register format bits.
    pub const fn matches(self, mpidr: Mpidr) -> bool {
        (mpidr.bits() ^ self.0) & Mpidr::AFFINITY_MASK == 0
    }
}

/// A platform interrupt number.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Irq(pub u32);

impl Display for Irq {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A set of logical CPUs.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct CpuMask(u64);

impl CpuMask {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Returns the set containing the first `count` logical CPUs.
    pub const fn first_n(count: usize) -> Self {
        if count >= MAX_CPUS {
            Self(u64::MAX)
        } else {
            Self((1 << count) - 1)
        }
    }

    /// Adds `cpu` to the set.
    pub fn insert(&mut self, cpu: LogicalCpuId) {
        self.0 |= 1 << cpu.0;
    }

    /// Removes `cpu` from the set, returning whether it was present.
    pub fn remove(&mut self, cpu: LogicalCpuId) -> bool {
        let present = self.contains(cpu);
        self.0 &= !(1 << cpu.0);
        present
    }

    /// Returns whether `cpu` is in the set.
    pub const fn contains(self, cpu: LogicalCpuId) -> bool {
        cpu.0 < MAX_CPUS && self.0 & 1 << cpu.0 != 0
    }

    /// Returns whether the set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the number of CPUs in the set.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns the lowest-numbered CPU in the set.
    pub fn first(self) -> Option<LogicalCpuId> {
        self.iter().next()
    }

    /// Iterates over the CPUs in the set in ascending order.
    pub fn iter(self) -> impl Iterator<Item = LogicalCpuId> {
        (0..MAX_CPUS)
            .filter(move |&i| self.0 & 1 << i != 0)
            .map(LogicalCpuId)
    }
}

impl fmt::Debug for CpuMask {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|cpu| cpu.0)).finish()
    }
}

impl FromIterator<LogicalCpuId> for CpuMask {
    fn from_iter<I: IntoIterator<Item = LogicalCpuId>>(iter: I) -> Self {
        let mut mask = Self::EMPTY;
        for cpu in iter {
            mask.insert(cpu);
        }
        mask
    }
}

/// The current mapping of logical CPUs to physical cores.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CpuTopology {
    cores: ArrayVec<PhysicalCoreId, MAX_CPUS>,
    switcher_active: bool,
}

impl CpuTopology {
    /// Creates a topology with no CPUs.
    ///
    /// `switcher_active` says whether a cluster switcher may move logical CPUs between clusters.
    pub const fn new(switcher_active: bool) -> Self {
        Self {
            cores: ArrayVec::new_const(),
            switcher_active,
        }
    }

    /// Adds the next logical CPU, currently running on physical core `core`.
    pub fn add_cpu(&mut self, core: PhysicalCoreId) -> Result<LogicalCpuId, PmuError> {
        let cpu = LogicalCpuId(self.cores.len());
        self.cores
            .try_push(core)
            .map_err(|_| PmuError::InvalidArgument)?;
        Ok(cpu)
    }

    /// Records that logical CPU `cpu` now runs on physical core `core`.
    pub fn switch(&mut self, cpu: LogicalCpuId, core: PhysicalCoreId) -> Result<(), PmuError> {
        let slot = self.cores.get_mut(cpu.0).ok_or(PmuError::InvalidArgument)?;
        *slot = core;
        Ok(())
    }

    /// Returns the physical core that `cpu` currently runs on.
    pub fn physical_core(&self, cpu: LogicalCpuId) -> Option<PhysicalCoreId> {
        self.cores.get(cpu.0).copied()
    }

    /// Returns the set of all possible logical CPUs.
    pub fn possible_cpus(&self) -> CpuMask {
        CpuMask::first_n(self.cores.len())
    }

    /// Returns the number of possible logical CPUs.
    pub fn len(&self) -> usize {
        self.cores.len()
    }

    /// Returns whether there are no CPUs.
    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    /// Returns whether a cluster switcher is active.
    pub fn switcher_active(&self) -> bool {
        self.switcher_active
    }

    /// Iterates over all logical CPUs along with the core each currently runs on.
    pub fn iter(&self) -> impl Iterator<Item = (LogicalCpuId, PhysicalCoreId)> + '_ {
        self.cores
            .iter()
            .enumerate()
            .map(|(i, &core)| (LogicalCpuId(i), core))
    }
}

/// A `cpu` child of a cluster node in the device tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CoreNode<'a> {
    /// Raw `reg` property: the core index within the cluster as one big-endian cell.
    pub reg: &'a [u8],
}

/// A cluster node in the device tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClusterNode<'a> {
    /// Raw `reg` property: the cluster number as one big-endian cell.
    pub reg: &'a [u8],
    /// The cores of the cluster, in the order the PMU's interrupts are listed.
    pub cores: &'a [CoreNode<'a>],
}

impl ClusterNode<'_> {
    /// Returns the cluster number, if the `reg` property is well formed.
    pub fn id(&self) -> Option<u8> {
        read_cell(self.reg).and_then(|id| u8::try_from(id).ok())
    }

    /// Returns the position of core `core` among the cluster's cores.
    pub fn core_index(&self, core: u8) -> Option<usize> {
        self.cores
            .iter()
            .position(|node| read_cell(node.reg) == Some(core.into()))
    }
}

/// A PMU node in the device tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PmuNode<'a> {
    /// The `compatible` string.
    pub compatible: &'a str,
    /// The cluster which the `cluster` phandle points to, if any.
    pub cluster: Option<&'a ClusterNode<'a>>,
}

/// A PMU platform device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PmuDevice<'a> {
    /// Device name, for logging.
    pub name: &'a str,
    /// The device tree node, if the device was described by one.
    pub of_node: Option<PmuNode<'a>>,
    /// Interrupt resources, in order. `None` marks a resource which could not be resolved.
    pub irqs: &'a [Option<Irq>],
}

/// The association of one logical CPU with the physical core whose PMU it uses and that PMU's
/// interrupt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IrqBinding {
    /// The logical CPU.
    pub cpu: LogicalCpuId,
    /// The core whose PMU serves `cpu`.
    pub core: PhysicalCoreId,
    /// The overflow interrupt of that PMU, if the device provides one.
    pub irq: Option<Irq>,
}

/// Works out which logical CPUs a PMU device serves, and which of its interrupts belongs to each.
///
/// A device tied to a cluster serves the CPUs running in that cluster. With a cluster switcher,
/// CPUs currently in another cluster are served through their partner core: the core with the
/// same index in this cluster. CPUs with no core in the cluster are left out. Devices without a
/// cluster serve every possible CPU, with interrupt `i` going to CPU `i`.
pub fn resolve_bindings(
    node: Option<&PmuNode>,
    irqs: &[Option<Irq>],
    topology: &CpuTopology,
) -> ArrayVec<IrqBinding, MAX_CPUS> {
    let cluster = node
        .and_then(|node| node.cluster)
        .and_then(|cluster| Some((cluster, cluster.id()?)));
    match cluster {
        Some((cluster, id)) => topology
            .iter()
            .filter_map(|(cpu, current)| {
                let core = if current.cluster() == id {
                    current
                } else if topology.switcher_active() {
                    current.with_cluster(id)
                } else {
                    return None;
                };
                let Some(index) = cluster.core_index(core.core()) else {
                    debug!("No core {} in cluster {id} for {cpu}", core.core());
                    return None;
                };
                Some(IrqBinding {
                    cpu,
                    core,
                    irq: irqs.get(index).copied().flatten(),
                })
            })
            .collect(),
        None => topology
            .iter()
            .map(|(cpu, core)| IrqBinding {
                cpu,
                core,
                irq: irqs.get(cpu.0).copied().flatten(),
            })
            .collect(),
    }
}

/// Reads a single big-endian cell, as found in a `reg` property.
fn read_cell(bytes: &[u8]) -> Option<u32> {
    U32::read_from_bytes(bytes).ok().map(|cell| cell.get())
}
