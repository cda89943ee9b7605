/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::consts::JpegDecodeStatus;
use crate::decode_error::{err_exit_code, ExitCode, Result};

use super::jpeg_header::JpegHeader;

/// used to keep track of the position while decoding a scan
pub struct JpegPositionState {
    /// current component
    cmp: usize,

    /// current minimum coded unit. In a non interleaved scan every block is an MCU.
    mcu: u32,

    /// the scan stops once this MCU is reached
    end_mcu: u32,

    /// index of component in the scan
    csc: usize,

    /// offset within mcu
    sub: u32,

    /// current block position in the MCU aligned grid of this component
    dpos: u32,

    /// number of MCUs left until the restart interval expires
    rstw: u32,

    /// number of blocks left in the current run of empty blocks (progressive only)
    pub eobrun: u16,
}

impl JpegPositionState {
    /// Starts decoding at `mcu`, which has to be the first MCU of a restart interval if
    /// restart markers are used. Decoding completes when `end_mcu` is reached.
    pub fn new(jf: &JpegHeader, mcu: u32, end_mcu: u32) -> Self {
        let cmp = jf.cs_cmp[0];

        let mut state = JpegPositionState {
            cmp,
            mcu,
            end_mcu,
            csc: 0,
            sub: 0,
            dpos: 0,
            rstw: if jf.rsti != 0 {
                jf.rsti - (mcu % jf.rsti)
            } else {
                0
            },
            eobrun: 0,
        };
        state.calc_dpos(jf);
        return state;
    }

    /// total number of MCUs in the current scan
    #[cfg(test)]
    pub fn scan_mcu_count(jf: &JpegHeader) -> u32 {
        if jf.is_interleaved() {
            jf.mcuc
        } else {
            let c = &jf.cmp_info[jf.cs_cmp[0]];
            c.nch * c.ncv
        }
    }

    pub fn get_dpos(&self) -> u32 {
        self.dpos
    }
    pub fn get_cmp(&self) -> usize {
        self.cmp
    }

    pub fn reset_rstw(&mut self, jf: &JpegHeader) {
        self.rstw = jf.rsti;
    }

    fn calc_dpos(&mut self, jf: &JpegHeader) {
        let c = &jf.cmp_info[self.cmp];

        if !jf.is_interleaved() {
            // raster order over the blocks that contain samples
            self.dpos = (self.mcu / c.nch) * c.bch + self.mcu % c.nch;
        } else {
            // blocks inside an MCU are in raster order too
            let row = (self.mcu / jf.mcuh) * c.sfv + self.sub / c.sfh;
            let col = (self.mcu % jf.mcuh) * c.sfh + self.sub % c.sfh;
            self.dpos = row * c.bch + col;
        }
    }

    fn end_of_mcu(&mut self, jf: &JpegHeader) -> JpegDecodeStatus {
        if self.mcu >= self.end_mcu {
            return JpegDecodeStatus::ScanCompleted;
        }

        self.calc_dpos(jf);

        if jf.rsti > 0 {
            self.rstw -= 1;
            if self.rstw == 0 {
                return JpegDecodeStatus::RestartIntervalExpired;
            }
        }

        JpegDecodeStatus::DecodeInProgress
    }

    /// calculates next position for MCU
    pub fn next_mcu_pos(&mut self, jf: &JpegHeader) -> JpegDecodeStatus {
        // if there is just one component, go the simple route
        if !jf.is_interleaved() {
            self.mcu += 1;
            return self.end_of_mcu(jf);
        }

        self.sub += 1;
        if self.sub >= jf.cmp_info[self.cmp].mbs {
            self.sub = 0;
            self.csc += 1;

            if self.csc >= jf.cs_cmpc {
                self.csc = 0;
                self.cmp = jf.cs_cmp[0];
                self.mcu += 1;
                return self.end_of_mcu(jf);
            }

            self.cmp = jf.cs_cmp[self.csc];
        }

        self.calc_dpos(jf);
        JpegDecodeStatus::DecodeInProgress
    }

    /// Skips the blocks of the current EOB run after the current block. A run that
    /// goes past the end of the restart interval is corrupt, a run that goes past the
    /// end of the scan just finishes it.
    pub fn skip_eobrun(&mut self, jf: &JpegHeader) -> Result<JpegDecodeStatus> {
        debug_assert!(!jf.is_interleaved(), "this code only works for non-interleaved");

        if self.eobrun == 0 {
            return Ok(JpegDecodeStatus::DecodeInProgress);
        }

        let run = u32::from(self.eobrun);
        self.eobrun = 0;

        if jf.rsti > 0 {
            if run >= self.rstw {
                return err_exit_code(
                    ExitCode::MalformedScan,
                    format!(
                        "eob run of {0} blocks extends past end of restart interval ({1} left)",
                        run,
                        self.rstw - 1
                    ),
                );
            }
            self.rstw -= run;
        }

        if self.mcu + run + 1 >= self.end_mcu {
            self.mcu = self.end_mcu;
            return Ok(JpegDecodeStatus::ScanCompleted);
        }

        self.mcu += run;
        self.calc_dpos(jf);

        Ok(JpegDecodeStatus::DecodeInProgress)
    }
}
