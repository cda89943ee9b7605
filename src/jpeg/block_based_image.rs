/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use bytemuck::cast;
use wide::i16x8;

use crate::consts::ZIGZAG_TO_TRANSPOSED;

use super::component_info::ComponentInfo;

/// 64 coefficients of a block in transposed raster order, so that each row of
/// the block is one column of the image block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C, align(32))]
pub struct AlignedBlock {
    raw_data: [i16; 64],
}

impl Default for AlignedBlock {
    fn default() -> Self {
        AlignedBlock { raw_data: [0; 64] }
    }
}

impl AlignedBlock {
    #[cfg(test)]
    pub fn new(block: [i16; 64]) -> Self {
        AlignedBlock { raw_data: block }
    }

    /// converts a block in zigzag order into transposed raster order
    pub fn zigzag_to_transposed(a: [i16; 64]) -> AlignedBlock {
        let mut r = [0i16; 64];
        for (i, &v) in a.iter().enumerate() {
            r[usize::from(ZIGZAG_TO_TRANSPOSED[i])] = v;
        }
        AlignedBlock { raw_data: r }
    }

    #[cfg(test)]
    pub fn get_block(&self) -> &[i16; 64] {
        &self.raw_data
    }

    /// the 8 rows of the block as SIMD vectors
    #[inline(always)]
    pub fn to_i16x8_rows(&self) -> [i16x8; 8] {
        cast(self.raw_data)
    }

    #[cfg(test)]
    pub fn get_coefficient(&self, index: usize) -> i16 {
        self.raw_data[index]
    }

    #[inline(always)]
    pub fn get_transposed_from_zigzag(&self, index: usize) -> i16 {
        self.raw_data[usize::from(ZIGZAG_TO_TRANSPOSED[index])]
    }

    #[inline(always)]
    pub fn set_transposed_from_zigzag(&mut self, index: usize, value: i16) {
        self.raw_data[usize::from(ZIGZAG_TO_TRANSPOSED[index])] = value;
    }
}

/// Coefficient plane of one component.
///
/// Only the block rows of the decoded window are stored. Blocks outside of it
/// are backed by a single placeholder block so that the entropy decoder can still
/// run through them: reads return zero and writes are discarded.
pub struct BlockBasedImage {
    block_width: u32,
    first_block_row: u32,
    block_rows: u32,
    image: Vec<AlignedBlock>,
    placeholder: AlignedBlock,
}

impl BlockBasedImage {
    /// allocates the block rows [first_mcu_row, end_mcu_row) * sfv of the component
    pub fn new(info: &ComponentInfo, first_mcu_row: u32, end_mcu_row: u32) -> Self {
        let first_block_row = first_mcu_row * info.sfv;
        let block_rows = (end_mcu_row - first_mcu_row) * info.sfv;

        BlockBasedImage {
            block_width: info.bch,
            first_block_row,
            block_rows,
            image: vec![AlignedBlock::default(); (block_rows * info.bch) as usize],
            placeholder: AlignedBlock::default(),
        }
    }

    pub fn get_first_block_row(&self) -> u32 {
        self.first_block_row
    }

    pub fn get_block_rows(&self) -> u32 {
        self.block_rows
    }

    /// number of blocks that are really stored
    #[cfg(test)]
    pub fn get_stored_blocks(&self) -> usize {
        self.image.len()
    }

    fn window_index(&self, dpos: u32) -> Option<usize> {
        let row = dpos / self.block_width;
        if row >= self.first_block_row && row < self.first_block_row + self.block_rows {
            Some(((row - self.first_block_row) * self.block_width + dpos % self.block_width) as usize)
        } else {
            None
        }
    }

    /// block at the given position of the full MCU aligned grid
    #[inline(always)]
    pub fn get_block_mut(&mut self, dpos: u32) -> &mut AlignedBlock {
        match self.window_index(dpos) {
            Some(i) => &mut self.image[i],
            None => {
                self.placeholder = AlignedBlock::default();
                &mut self.placeholder
            }
        }
    }

    #[inline(always)]
    pub fn set_block_data(&mut self, dpos: u32, block: AlignedBlock) {
        if let Some(i) = self.window_index(dpos) {
            self.image[i] = block;
        }
    }

    /// the stored blocks of a block row, the row is relative to the start of the window
    pub fn get_row(&self, window_row: u32) -> &[AlignedBlock] {
        let start = (window_row * self.block_width) as usize;
        &self.image[start..start + self.block_width as usize]
    }
}

#[test]
fn test_zigzag_layout() {
    let mut zz = [0i16; 64];
    zz[1] = 5; // first horizontal frequency
    zz[2] = 7; // first vertical frequency

    let b = AlignedBlock::zigzag_to_transposed(zz);

    // transposed: horizontal frequency 1 is in row 1, vertical frequency 1 in column 1
    assert_eq!(b.get_coefficient(8), 5);
    assert_eq!(b.get_coefficient(1), 7);
    assert_eq!(b.get_transposed_from_zigzag(1), 5);
}

#[test]
fn test_window_placeholder() {
    let info = ComponentInfo {
        sfh: 1,
        sfv: 2,
        bch: 3,
        bcv: 8,
        ..Default::default()
    };

    // mcu rows 1..3 are block rows 2..6
    let mut img = BlockBasedImage::new(&info, 1, 3);
    assert_eq!(img.get_stored_blocks(), 12);

    img.get_block_mut(2 * 3 + 1).set_transposed_from_zigzag(0, 9);
    assert_eq!(img.get_row(0)[1].get_coefficient(0), 9);

    // outside of the window writes are discarded and reads are zero
    img.get_block_mut(0).set_transposed_from_zigzag(0, 4);
    assert_eq!(img.get_block_mut(0).get_coefficient(0), 0);
    img.set_block_data(7 * 3, AlignedBlock::new([1; 64]));
    assert!(img.image.iter().all(|b| b.get_coefficient(5) == 0));
}
