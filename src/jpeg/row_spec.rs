/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::cmp::min;

use crate::decode_error::{err_exit_code, ExitCode, Result};

use super::jpeg_header::JpegHeader;

/// The scanlines that were requested and the MCU rows that have to be decoded
/// to produce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpec {
    /// first requested output line
    pub first_line: u32,

    /// number of requested output lines
    pub line_count: u32,

    /// first MCU row that is decoded and stored
    pub start_mcu_row: u32,

    /// MCU row after the last one that is decoded and stored
    pub end_mcu_row: u32,

    /// true if only part of the frame is decoded
    pub sub_frame: bool,
}

impl RowSpec {
    /// the complete frame
    pub fn full(jf: &JpegHeader) -> Self {
        RowSpec {
            first_line: 0,
            line_count: jf.img_height,
            start_mcu_row: 0,
            end_mcu_row: jf.mcuv,
            sub_frame: false,
        }
    }

    /// Calculates the MCU rows covering `length` lines starting at `offset`. One more
    /// MCU row is added on each side if there is one, so that the upsampler sees the
    /// same neighboring samples as in a full decode.
    pub fn for_region(jf: &JpegHeader, offset: u32, length: u32) -> Result<Self> {
        if u64::from(offset) + u64::from(length) > u64::from(jf.img_height) {
            return err_exit_code(
                ExitCode::SyntaxError,
                format!(
                    "region of {0} lines at {1} is outside of the image height {2}",
                    length, offset, jf.img_height
                ),
            );
        }

        if length == 0 {
            return Ok(RowSpec {
                first_line: offset,
                line_count: 0,
                start_mcu_row: 0,
                end_mcu_row: 0,
                sub_frame: true,
            });
        }

        let mcu_lines = 8 * jf.vmax;
        let first = offset / mcu_lines;
        let last = (offset + length - 1) / mcu_lines;

        let start_mcu_row = first.saturating_sub(1);
        let end_mcu_row = min(last + 2, jf.mcuv);

        Ok(RowSpec {
            first_line: offset,
            line_count: length,
            start_mcu_row,
            end_mcu_row,
            sub_frame: start_mcu_row != 0 || end_mcu_row != jf.mcuv,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.line_count == 0
    }

    /// first line of the image that is covered by the decoded MCU rows
    #[cfg(test)]
    pub fn first_window_line(&self, jf: &JpegHeader) -> u32 {
        self.start_mcu_row * 8 * jf.vmax
    }

    /// Range of MCUs of the current scan that lie in the window. In a non interleaved
    /// scan every block of the component is its own MCU.
    pub fn scan_mcu_range(&self, jf: &JpegHeader) -> (u32, u32) {
        if jf.is_interleaved() {
            (self.start_mcu_row * jf.mcuh, self.end_mcu_row * jf.mcuh)
        } else {
            let c = &jf.cmp_info[jf.cs_cmp[0]];
            let first_row = min(self.start_mcu_row * c.sfv, c.ncv);
            let end_row = min(self.end_mcu_row * c.sfv, c.ncv);
            (first_row * c.nch, end_row * c.nch)
        }
    }
}
