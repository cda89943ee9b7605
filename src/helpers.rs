/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::decode_error::{DecodeError, ExitCode};

/// Helper function to catch panics and convert them into the appropriate DecodeError
pub fn catch_unwind_result<R>(
    f: impl FnOnce() -> Result<R, DecodeError>,
) -> Result<R, DecodeError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => r,
        Err(err) => Err(panic_to_error(err)),
    }
}

/// converts the payload of a panic into an AssertionFailure
pub fn panic_to_error(err: Box<dyn std::any::Any + Send>) -> DecodeError {
    if let Some(message) = err.downcast_ref::<&str>() {
        DecodeError::new(ExitCode::AssertionFailure, *message)
    } else if let Some(message) = err.downcast_ref::<String>() {
        DecodeError::new(ExitCode::AssertionFailure, message)
    } else {
        DecodeError::new(ExitCode::AssertionFailure, "unknown panic")
    }
}

/// returns true if the 64 bit value contains an 0xff byte.
/// Uses fancy bit manipulation to avoid branches.
#[inline(always)]
pub fn has_ff(v: u64) -> bool {
    (v & 0x8080808080808080 & !v.wrapping_add(0x0101010101010101)) != 0
}

/// extends the sign of a value that was coded with `s` magnitude bits
#[inline(always)]
pub const fn devli(s: u8, value: u16) -> i16 {
    let shifted = 1 << s;

    if value & (shifted >> 1) != 0 {
        value as i16
    } else {
        value.wrapping_add(2).wrapping_add(!shifted) as i16
    }
}

#[inline(always)]
pub const fn b_short(v1: u8, v2: u8) -> u16 {
    ((v1 as u16) << 8) + v2 as u16
}

#[inline(always)]
pub const fn rbits(c: u8, n: usize) -> u8 {
    return c & (0xFF >> (8 - n));
}

#[inline(always)]
pub const fn lbits(c: u8, n: usize) -> u8 {
    return c >> (8 - n);
}

#[inline(always)]
pub const fn bitn(c: u16, n: u16) -> u8 {
    return ((c >> n) & 0x1) as u8;
}

/// integer division rounding up
#[inline(always)]
pub const fn div_ceil(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

/// clamps an intermediate sample back into the 8 bit range
#[inline(always)]
pub fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

#[cfg(test)]
pub fn get_rand_from_seed(seed: [u8; 32]) -> rand_chacha::ChaCha12Rng {
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    ChaCha12Rng::from_seed(seed)
}

/// check to make sure the behavior hasn't changed even with the optimization
#[test]
fn devli_test() {
    for s in 0u8..15 {
        for value in 0..(1 << s) {
            assert_eq!(
                devli(s, value),
                if s == 0 {
                    value as i16
                } else if value < (1 << (s as u16 - 1)) {
                    value as i16 + (-1 << s as i16) + 1
                } else {
                    value as i16
                }
            );
        }
    }
}

#[test]
fn has_ff_test() {
    assert!(!has_ff(0x0102030405060708));
    assert!(has_ff(0x01020304050607ff));
    assert!(has_ff(0xff02030405060708));
    assert!(!has_ff(0xfefefefefefefefe));
}

#[test]
fn catch_unwind_test() {
    let r: Result<(), DecodeError> = catch_unwind_result(|| panic!("worker failed"));
    let e = r.unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::AssertionFailure);
    assert_eq!(e.message(), "worker failed");
}
