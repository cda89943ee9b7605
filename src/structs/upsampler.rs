/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::cmp::min;

use crate::enabled_features::UpsamplingFilter;
use crate::jpeg::component_info::ComponentInfo;

/// Samples of one component for the decoded window, after the inverse DCT.
///
/// Rows are addressed with their absolute index in the component, so that a plane
/// holding only part of the frame is read the same way as a complete one. Reads
/// outside of the real samples are clamped to the nearest edge sample.
pub struct ComponentPlane {
    stride: usize,
    width: u32,
    height: u32,
    first_row: u32,
    rows: u32,
    data: Vec<u8>,
}

impl ComponentPlane {
    /// plane for `block_rows` block rows starting at `first_block_row`
    pub fn new(info: &ComponentInfo, first_block_row: u32, block_rows: u32) -> Self {
        let stride = info.nch as usize * 8;
        ComponentPlane {
            stride,
            width: info.width,
            height: info.height,
            first_row: first_block_row * 8,
            rows: block_rows * 8,
            data: vec![0; stride * block_rows as usize * 8],
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// bytes of a row of blocks, the unit the inverse DCT is run on
    pub fn block_row_len(&self) -> usize {
        self.stride * 8
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[cfg(test)]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// row `r` of the component, clamped to the rows that are present
    #[inline(always)]
    pub fn row(&self, r: u32) -> &[u8] {
        let last = min(self.first_row + self.rows, self.height).saturating_sub(1);
        let r = r.clamp(self.first_row, last.max(self.first_row)) - self.first_row;
        let start = r as usize * self.stride;
        &self.data[start..start + self.width as usize]
    }

    #[cfg(test)]
    pub fn from_rows(rows: &[&[u8]]) -> Self {
        let width = rows[0].len();
        ComponentPlane {
            stride: width,
            width: width as u32,
            height: rows.len() as u32,
            first_row: 0,
            rows: rows.len() as u32,
            data: rows.concat(),
        }
    }
}

/// Brings a component to the resolution of the frame, one output line at a time
#[derive(Debug, Clone, Copy)]
pub struct Upsampler {
    filter: UpsamplingFilter,
    hr: u32,
    vr: u32,
}

impl Upsampler {
    /// `hr` and `vr` are the ratios between the maximum and the component's sampling factors
    pub fn new(filter: UpsamplingFilter, hr: u32, vr: u32) -> Self {
        Upsampler { filter, hr, vr }
    }

    /// Writes line `y` of the frame into `out`, which is as wide as the frame.
    /// `colsum` is scratch space that is reused between calls.
    pub fn upsample_row(
        &self,
        plane: &ComponentPlane,
        y: u32,
        out: &mut [u8],
        colsum: &mut Vec<u16>,
    ) {
        let triangle = self.filter == UpsamplingFilter::Triangle;

        match (self.hr, self.vr) {
            (1, 1) => out.copy_from_slice(&plane.row(y)[..out.len()]),
            (2, 1) if triangle => h2_triangle(plane.row(y), out),
            (1, 2) if triangle => {
                let (near, far) = vertical_neighbors(plane, y);
                let bias = if y % 2 == 0 { 1 } else { 2 };
                for (i, o) in out.iter_mut().enumerate() {
                    let s = 3 * u16::from(near[i]) + u16::from(far[i]) + bias;
                    *o = (s >> 2) as u8;
                }
            }
            (2, 2) if triangle => {
                let (near, far) = vertical_neighbors(plane, y);
                colsum.clear();
                colsum.extend(
                    near.iter()
                        .zip(far.iter())
                        .map(|(&n, &f)| 3 * u16::from(n) + u16::from(f)),
                );
                h2_triangle_colsum(colsum, out);
            }
            _ => {
                let src = plane.row(y / self.vr);
                let last = src.len() - 1;
                let hr = self.hr as usize;
                for (x, o) in out.iter_mut().enumerate() {
                    *o = src[min(x / hr, last)];
                }
            }
        }
    }
}

/// the closest row of the component and the next closest one above or below
#[inline(always)]
fn vertical_neighbors(plane: &ComponentPlane, y: u32) -> (&[u8], &[u8]) {
    let near = y / 2;
    let far = if y % 2 == 0 {
        near.saturating_sub(1)
    } else {
        near + 1
    };
    (plane.row(near), plane.row(far))
}

#[inline(always)]
fn h2_triangle(src: &[u8], out: &mut [u8]) {
    let last = src.len() - 1;
    for (x, o) in out.iter_mut().enumerate() {
        let i = x / 2;
        let a = 3 * u16::from(src[i]);
        let v = if x % 2 == 0 {
            (a + u16::from(src[i.saturating_sub(1)]) + 1) >> 2
        } else {
            (a + u16::from(src[min(i + 1, last)]) + 2) >> 2
        };
        *o = v as u8;
    }
}

#[inline(always)]
fn h2_triangle_colsum(c: &[u16], out: &mut [u8]) {
    let last = c.len() - 1;
    for (x, o) in out.iter_mut().enumerate() {
        let i = x / 2;
        let a = 3 * c[i];
        let v = if x % 2 == 0 {
            (a + c[i.saturating_sub(1)] + 8) >> 4
        } else {
            (a + c[min(i + 1, last)] + 7) >> 4
        };
        *o = v as u8;
    }
}
