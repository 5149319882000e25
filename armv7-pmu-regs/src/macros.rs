// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

/// Generates public functions named `read_$name` and `write_$name` to read or write (respectively)
/// a value of type `$type` from/to the CP15 register encoded by `$op1, $crn, $crm, $op2`.
///
/// `$reg` names the matching [`PmuRegister`](crate::PmuRegister) variant, which the fake
/// implementation uses to find the register in its model.
#[macro_export]
macro_rules! read_write_cp15 {
    (
        $name:ident : $reg:ident, $type:ty $(: $bitflags_type:ty)?,
        $op1:literal, $crn:ident, $crm:ident, $op2:literal
    ) => {
        $crate::read_cp15!($name: $reg, $type $(: $bitflags_type)?, $op1, $crn, $crm, $op2);
        $crate::write_cp15!($name: $reg, $type $(: $bitflags_type)?, $op1, $crn, $crm, $op2);
    };
}
