/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use wide::{i32x8, u16x8};

use crate::consts::*;
use crate::jpeg::jpeg_header::JpegHeader;

/// Quantization table of a component in transposed raster order, which is the layout
/// of the coefficients in `AlignedBlock`.
pub struct QuantizationTables {
    quantization_table_transposed: [u16; 64],
}

impl QuantizationTables {
    pub fn new(jpeg_header: &JpegHeader, component: usize) -> Self {
        Self::new_from_table(&jpeg_header.get_q_table(component).values)
    }

    /// `quantization_table` is in zigzag order as stored in the DQT segment
    pub fn new_from_table(quantization_table: &[u16; 64]) -> Self {
        let mut retval = QuantizationTables {
            quantization_table_transposed: [0; 64],
        };

        for pixel_row in 0..8 {
            for pixel_column in 0..8 {
                let coord = (pixel_row * 8) + pixel_column;
                let coord_tr = (pixel_column * 8) + pixel_row;
                retval.quantization_table_transposed[coord_tr] =
                    quantization_table[usize::from(RASTER_TO_ZIGZAG[coord])];
            }
        }

        retval
    }

    #[cfg(test)]
    pub fn get_quantization_table_transposed(&self) -> &[u16; 64] {
        &self.quantization_table_transposed
    }

    /// the rows of the transposed table widened for the multiplication in the IDCT
    pub fn get_rows_i32x8(&self) -> [i32x8; 8] {
        let rows: [u16x8; 8] = bytemuck::cast(self.quantization_table_transposed);
        rows.map(i32x8::from_u16x8)
    }
}

#[test]
fn test_transposed_layout() {
    let mut zz = [0u16; 64];
    for (i, v) in zz.iter_mut().enumerate() {
        *v = i as u16 + 1;
    }

    let q = QuantizationTables::new_from_table(&zz);
    let t = q.get_quantization_table_transposed();

    // DC, first horizontal and first vertical frequency
    assert_eq!(t[0], 1);
    assert_eq!(t[8], 2);
    assert_eq!(t[1], 3);
    // highest frequency is last in both orders
    assert_eq!(t[63], 64);

    let rows = q.get_rows_i32x8();
    assert_eq!(rows[1].to_array()[0], 2);
}
