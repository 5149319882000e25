// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Driver for the Performance Monitors of ARMv7 CPU cores.
//!
//! Handles discovery of the PMU devices of a system, allocation of their counters to perf events,
//! overflow interrupts, and preservation of the counters across CPU power transitions. On
//! big.LITTLE systems with a cluster switcher, each logical CPU is served by one PMU per cluster,
//! of which only the one on the core it currently runs on is backed by hardware.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod allocator;
pub mod armv7;
/// Microarchitecture descriptors.
pub mod cpu;
mod debug;
pub mod driver;
/// Errors reported by the driver.
pub mod error;
pub mod event;
/// The interface to the perf event framework.
pub mod framework;
pub mod instance;
/// Logging to a platform-provided sink.
pub mod logger;
/// The services the driver needs from the platform.
pub mod platform;
pub mod registry;
pub mod regs;
pub mod topology;

pub use driver::PmuDriver;
pub use error::PmuError;
pub use instance::{InstanceId, IrqReturn, PmuInstance};
pub use platform::Platform;
pub use registry::Registry;
