/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::helpers::div_ceil;

#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// quantization table
    pub q_table_index: u8,

    /// no of huffman table (DC), set by the current scan
    pub huff_dc: u8,

    /// no of huffman table (AC), set by the current scan
    pub huff_ac: u8,

    /// sample factor vertical
    pub sfv: u32,

    /// sample factor horizontal
    pub sfh: u32,

    /// blocks in mcu
    pub mbs: u32,

    /// block count vertical (interleaved)
    pub bcv: u32,

    /// block count horizontal (interleaved)
    pub bch: u32,

    /// block count (all) (interleaved)
    pub bc: u32,

    /// block count vertical (non interleaved)
    pub ncv: u32,

    /// block count horizontal (non interleaved)
    pub nch: u32,

    /// width of the component in samples
    pub width: u32,

    /// height of the component in samples
    pub height: u32,

    /// jpeg internal id
    pub jid: u8,
}

impl Default for ComponentInfo {
    fn default() -> ComponentInfo {
        return ComponentInfo {
            q_table_index: 0xff,
            sfv: 0,
            sfh: 0,
            mbs: 0,
            bcv: 0,
            bch: 0,
            bc: 0,
            ncv: 0,
            nch: 0,
            width: 0,
            height: 0,
            jid: 0xff,
            huff_dc: 0xff,
            huff_ac: 0xff,
        };
    }
}

impl ComponentInfo {
    /// Calculates the block grid once the frame's MCU layout is known.
    ///
    /// The interleaved grid (bch x bcv) always covers whole MCUs, the non interleaved
    /// grid (nch x ncv) only covers the blocks that contain real samples.
    pub fn set_geometry(
        &mut self,
        img_width: u32,
        img_height: u32,
        hmax: u32,
        vmax: u32,
        mcuh: u32,
        mcuv: u32,
    ) {
        self.mbs = self.sfv * self.sfh;
        self.bch = mcuh * self.sfh;
        self.bcv = mcuv * self.sfv;
        self.bc = self.bch * self.bcv;
        self.width = div_ceil(img_width * self.sfh, hmax);
        self.height = div_ceil(img_height * self.sfv, vmax);
        self.nch = div_ceil(self.width, 8);
        self.ncv = div_ceil(self.height, 8);
    }
}

#[test]
fn test_geometry_420() {
    // chroma of a 4:2:0 image that is 17x9 pixels
    let mut c = ComponentInfo {
        sfh: 1,
        sfv: 1,
        ..Default::default()
    };
    c.set_geometry(17, 9, 2, 2, 2, 1);

    assert_eq!((c.width, c.height), (9, 5));
    assert_eq!((c.nch, c.ncv), (2, 1));
    assert_eq!((c.bch, c.bcv), (2, 1));

    let mut y = ComponentInfo {
        sfh: 2,
        sfv: 2,
        ..Default::default()
    };
    y.set_geometry(17, 9, 2, 2, 2, 1);
    assert_eq!((y.nch, y.ncv), (3, 2));
    assert_eq!((y.bch, y.bcv), (4, 2));
    assert_eq!(y.mbs, 4);
}
