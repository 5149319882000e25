// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The set of microarchitecture descriptors which devices can be matched against.

use crate::{
    cpu::{Microarchitecture, PMU_DESCRIPTORS},
    error::PmuError,
};
use armv7_pmu_regs::Midr;
use arrayvec::ArrayVec;
use log::{debug, info};
use spin::mutex::SpinMutex;

/// Largest number of descriptors a registry can hold.
pub const MAX_DESCRIPTORS: usize = 16;

/// Registered microarchitecture descriptors, most recently registered first.
pub struct Registry {
    descriptors: SpinMutex<ArrayVec<&'static dyn Microarchitecture, MAX_DESCRIPTORS>>,
}

impl Registry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            descriptors: SpinMutex::new(ArrayVec::new_const()),
        }
    }

    /// Adds `descriptor`, to be matched before every descriptor registered earlier.
    pub fn register(&self, descriptor: &'static dyn Microarchitecture) -> Result<(), PmuError> {
        if descriptor.name().is_empty()
            || descriptor.compatible().is_empty()
            || (descriptor.implementer() == 0 && descriptor.part_number() == 0)
        {
            return Err(PmuError::InvalidArgument);
        }

        let mut descriptors = self.descriptors.lock();
        if descriptors.is_full() {
            return Err(PmuError::RegistryFull);
        }
        descriptors.insert(0, descriptor);
        debug!("Registered {} PMU descriptor", descriptor.name());
        Ok(())
    }

    /// Registers every built-in descriptor.
    pub fn register_builtin(&self) -> Result<(), PmuError> {
        for &descriptor in &PMU_DESCRIPTORS {
            self.register(descriptor)?;
        }
        info!("{} PMU descriptors registered", self.len());
        Ok(())
    }

    /// Returns the number of registered descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.lock().len()
    }

    /// Returns whether no descriptor is registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.lock().is_empty()
    }

    /// Finds the descriptor for the device tree compatible string `compatible`.
    pub fn match_compatible(
        &self,
        compatible: &str,
    ) -> Result<&'static dyn Microarchitecture, PmuError> {
        self.descriptors
            .lock()
            .iter()
            .find(|descriptor| descriptor.compatible() == compatible)
            .copied()
            .ok_or(PmuError::NoDevice)
    }

    /// Finds the descriptor for cores with the given MIDR value.
    pub fn match_midr(&self, midr: Midr) -> Result<&'static dyn Microarchitecture, PmuError> {
        let implementer = midr.implementer();
        let part_number = if implementer == Midr::IMPLEMENTER_INTEL {
            midr.xscale_arch()
        } else {
            midr.part_number()
        };
        self.descriptors
            .lock()
            .iter()
            .find(|descriptor| {
                descriptor.implementer() == implementer && descriptor.part_number() == part_number
            })
            .copied()
            .ok_or(PmuError::NoDevice)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
