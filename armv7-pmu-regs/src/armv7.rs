// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use crate::{Midr, Mpidr};

/// Generates a public function named `read_$name` to read the CP15 register `$name` of type
/// `$type`.
#[macro_export]
macro_rules! read_cp15 {
    ($name:ident : $reg:ident, $type:ty, $op1:literal, $crn:ident, $crm:ident, $op2:literal) => {
        $crate::_paste::paste! {
            #[doc = "Returns the value of the `"]
            #[doc = stringify!($name)]
            #[doc = "` register."]
            #[inline(always)]
            pub fn [< read_ $name >]() -> $type {
                let value;
                // SAFETY: Reading a Performance Monitors or identification register has no side
                // effects on memory.
                unsafe {
                    core::arch::asm!(
                        concat!(
                            "mrc p15, ", stringify!($op1), ", {value}, ",
                            stringify!($crn), ", ", stringify!($crm), ", ", stringify!($op2)
                        ),
                        options(nostack),
                        value = out(reg) value,
                    );
                }
                value
            }
        }
    };
    (
        $name:ident : $reg:ident, $type:ty : $bitflags_type:ty,
        $op1:literal, $crn:ident, $crm:ident, $op2:literal
    ) => {
        $crate::_paste::paste! {
            #[doc = "Returns the value of the `"]
            #[doc = stringify!($name)]
            #[doc = "` register."]
            #[inline(always)]
            pub fn [< read_ $name >]() -> $bitflags_type {
                let value: $type;
                // SAFETY: Reading a Performance Monitors or identification register has no side
                // effects on memory.
                unsafe {
                    core::arch::asm!(
                        concat!(
                            "mrc p15, ", stringify!($op1), ", {value}, ",
                            stringify!($crn), ", ", stringify!($crm), ", ", stringify!($op2)
                        ),
                        options(nostack),
                        value = out(reg) value,
                    );
                }
                <$bitflags_type>::from_bits_retain(value)
            }
        }
    };
}

/// Generates a public function named `write_$name` to write to the CP15 register `$name` of type
/// `$type`.
#[macro_export]
macro_rules! write_cp15 {
    ($name:ident : $reg:ident, $type:ty, $op1:literal, $crn:ident, $crm:ident, $op2:literal) => {
        $crate::_paste::paste! {
            #[doc = "Writes `value` to the `"]
            #[doc = stringify!($name)]
            #[doc = "` register."]
            #[inline(always)]
            pub fn [< write_ $name >](value: $type) {
                // SAFETY: The Performance Monitors registers only affect event counting, never
                // memory or the execution state of the current CPU.
                unsafe {
                    core::arch::asm!(
                        concat!(
                            "mcr p15, ", stringify!($op1), ", {value}, ",
                            stringify!($crn), ", ", stringify!($crm), ", ", stringify!($op2)
                        ),
                        options(nostack),
                        value = in(reg) value,
                    );
                }
            }
        }
    };
    (
        $name:ident : $reg:ident, $type:ty : $bitflags_type:ty,
        $op1:literal, $crn:ident, $crm:ident, $op2:literal
    ) => {
        $crate::_paste::paste! {
            #[doc = "Writes `value` to the `"]
            #[doc = stringify!($name)]
            #[doc = "` register."]
            #[inline(always)]
            pub fn [< write_ $name >](value: $bitflags_type) {
                let value: $type = value.bits();
                // SAFETY: The Performance Monitors registers only affect event counting, never
                // memory or the execution state of the current CPU.
                unsafe {
                    core::arch::asm!(
                        concat!(
                            "mcr p15, ", stringify!($op1), ", {value}, ",
                            stringify!($crn), ", ", stringify!($crm), ", ", stringify!($op2)
                        ),
                        options(nostack),
                        value = in(reg) value,
                    );
                }
            }
        }
    };
}

read_cp15!(midr_raw: Midr, u32, 0, c0, c0, 0);
read_cp15!(mpidr: Mpidr, u32: Mpidr, 0, c0, c0, 5);

/// Returns the value of the `MIDR` register.
#[inline(always)]
pub fn read_midr() -> Midr {
    Midr::from_bits_retain(read_midr_raw())
}

/// Issues an instruction synchronization barrier.
#[inline(always)]
pub fn isb() {
    // SAFETY: `isb` only flushes the pipeline.
    unsafe {
        core::arch::asm!("isb", options(nostack));
    }
}
