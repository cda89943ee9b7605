/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use wide::i32x8;

use crate::jpeg::block_based_image::AlignedBlock;

const W1: i32 = 2841; // 2048*sqrt(2)*cos(1*pi/16)
const W2: i32 = 2676; // 2048*sqrt(2)*cos(2*pi/16)
const W3: i32 = 2408; // 2048*sqrt(2)*cos(3*pi/16)
const W5: i32 = 1609; // 2048*sqrt(2)*cos(5*pi/16)
const W6: i32 = 1108; // 2048*sqrt(2)*cos(6*pi/16)
const W7: i32 = 565; // 2048*sqrt(2)*cos(7*pi/16)

const W1PW7: i32 = W1 + W7;
const W1MW7: i32 = W1 - W7;
const W2PW6: i32 = W2 + W6;
const W2MW6: i32 = W2 - W6;
const W3PW5: i32 = W3 + W5;
const W3MW5: i32 = W3 - W5;

const R2: i32 = 181; // 256/sqrt(2)

/// Dequantizes the block and transforms it into 8x8 samples in raster order,
/// level shifted and clamped to 0..=255. All arithmetic wraps, so corrupt
/// coefficients produce garbage samples but never a panic.
#[inline(always)]
pub fn dequantize_and_idct(block: &AlignedBlock, q_rows: &[i32x8; 8]) -> [u8; 64] {
    let rows = block.to_i16x8_rows();

    let mut t = [i32x8::splat(0); 8];
    for i in 0..8 {
        t[i] = i32x8::from_i16x8(rows[i]) * q_rows[i];
    }

    let spatial = run_idct(&t);

    let mut out = [0u8; 64];
    for (dst, row) in out.chunks_exact_mut(8).zip(spatial.iter()) {
        for (d, &s) in dst.iter_mut().zip(row.to_array().iter()) {
            *d = s as u8;
        }
    }
    out
}

/// Separable integer IDCT. Input row k holds horizontal frequency k with the vertical
/// frequencies in the lanes. The output rows are the rows of the sample block.
#[inline(always)]
pub fn run_idct(block: &[i32x8; 8]) -> [i32x8; 8] {
    let t = *block;

    let mut xv0 = (t[0] << 11) + 128;
    let mut xv1 = t[1];
    let mut xv2 = t[2];
    let mut xv3 = t[3];
    let mut xv4 = t[4] << 11;
    let mut xv5 = t[5];
    let mut xv6 = t[6];
    let mut xv7 = t[7];

    // Stage 1.
    let mut xv8 = W7 * (xv1 + xv7);
    xv1 = xv8 + (W1MW7 * xv1);
    xv7 = xv8 - (W1PW7 * xv7);
    xv8 = W3 * (xv5 + xv3);
    xv5 = xv8 - (W3MW5 * xv5);
    xv3 = xv8 - (W3PW5 * xv3);

    // Stage 2.
    xv8 = xv0 + xv4;
    xv0 -= xv4;
    xv4 = W6 * (xv2 + xv6);
    xv6 = xv4 - (W2PW6 * xv6);
    xv2 = xv4 + (W2MW6 * xv2);
    xv4 = xv1 + xv5;
    xv1 -= xv5;
    xv5 = xv7 + xv3;
    xv7 -= xv3;

    // Stage 3.
    xv3 = xv8 + xv2;
    xv8 -= xv2;
    xv2 = xv0 + xv6;
    xv0 -= xv6;
    xv6 = ((R2 * (xv1 + xv7)) + 128) >> 8;
    xv1 = ((R2 * (xv1 - xv7)) + 128) >> 8;

    // Stage 4.
    let row = [
        (xv3 + xv4) >> 8,
        (xv2 + xv6) >> 8,
        (xv0 + xv1) >> 8,
        (xv8 + xv5) >> 8,
        (xv8 - xv5) >> 8,
        (xv0 - xv1) >> 8,
        (xv2 - xv6) >> 8,
        (xv3 - xv4) >> 8,
    ];

    // transpose and now do vertical
    let [mut yv0, mut yv1, mut yv2, mut yv3, mut yv4, mut yv5, mut yv6, mut yv7] =
        i32x8::transpose(row);

    yv0 = (yv0 << 8) + 8192;
    yv4 = yv4 << 8;

    // Stage 1.
    let mut yv8 = (W7 * (yv1 + yv7)) + 4;
    yv1 = (yv8 + (W1MW7 * yv1)) >> 3;
    yv7 = (yv8 - (W1PW7 * yv7)) >> 3;
    yv8 = (W3 * (yv5 + yv3)) + 4;
    yv5 = (yv8 - (W3MW5 * yv5)) >> 3;
    yv3 = (yv8 - (W3PW5 * yv3)) >> 3;

    // Stage 2.
    yv8 = yv0 + yv4;
    yv0 -= yv4;
    yv4 = ((W6) * (yv2 + yv6)) + 4;
    yv6 = (yv4 - (W2PW6 * yv6)) >> 3;
    yv2 = (yv4 + (W2MW6 * yv2)) >> 3;
    yv4 = yv1 + yv5;
    yv1 -= yv5;
    yv5 = yv7 + yv3;
    yv7 -= yv3;

    // Stage 3.
    yv3 = yv8 + yv2;
    yv8 -= yv2;
    yv2 = yv0 + yv6;
    yv0 -= yv6;
    yv6 = ((R2 * (yv1 + yv7)) + 128) >> 8;
    yv1 = ((R2 * (yv1 - yv7)) + 128) >> 8;

    // Stage 4, level shift and clamp
    let shift = i32x8::splat(128);
    let lo = i32x8::splat(0);
    let hi = i32x8::splat(255);
    let finish = |v: i32x8| {
        let s: i32x8 = v >> 14;
        (s + shift).max(lo).min(hi)
    };

    [
        finish(yv3 + yv4),
        finish(yv2 + yv6),
        finish(yv0 + yv1),
        finish(yv8 + yv5),
        finish(yv8 - yv5),
        finish(yv0 - yv1),
        finish(yv2 - yv6),
        finish(yv3 - yv4),
    ]
}
