/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::BufRead;

use super::jpeg_code;
use crate::decode_error::{err_exit_code, ExitCode, Result};
use crate::helpers::has_ff;

/// Bit reader on top of the entropy coded segment of a scan.
///
/// Stuffed `FF 00` pairs are returned as a single `FF` data byte. Any other marker
/// terminates the entropy coded data: it is remembered as the pending marker and all
/// further reads return zero bits. Decoding into those zero bits is only legal as long
/// as they are never actually consumed, which `check_overrun` verifies.
pub struct BitReader<R> {
    inner: R,
    bits: u64,
    bits_left: u32,
    cpos: u32,
    eof: bool,
    marker: Option<u8>,
    pad_bits: u32,
    read_ahead_bytes: u32,
}

impl<R: BufRead> BitReader<R> {
    pub fn new(inner: R) -> Self {
        BitReader {
            inner: inner,
            bits: 0,
            bits_left: 0,
            cpos: 0,
            eof: false,
            marker: None,
            pad_bits: 0,
            read_ahead_bytes: 0,
        }
    }

    #[inline(always)]
    pub fn read(&mut self, bits_to_read: u32) -> Result<u16> {
        if bits_to_read == 0 {
            return Ok(0);
        }

        if self.bits_left < bits_to_read {
            self.fill_register(bits_to_read)?;
        }

        let retval =
            (self.bits >> (self.bits_left - bits_to_read) & ((1 << bits_to_read) - 1)) as u16;
        self.bits_left -= bits_to_read;
        return Ok(retval);
    }

    #[inline(always)]
    pub fn peek(&self) -> (u8, u32) {
        (
            ((self.bits.wrapping_shl(64 - self.bits_left)) >> 56) as u8,
            self.bits_left,
        )
    }

    #[inline(always)]
    pub fn advance(&mut self, bits: u32) {
        self.bits_left -= bits;
    }

    #[inline(always)]
    pub fn fill_register(&mut self, bits_to_read: u32) -> Result<()> {
        // first consume the read_ahead bytes that we have now consumed
        // (otherwise we wouldn't have been called)
        self.inner.consume(self.read_ahead_bytes as usize);
        self.read_ahead_bytes = 0;

        if self.marker.is_some() || self.eof {
            return self.fill_register_slow(bits_to_read);
        }

        let fb = self.inner.fill_buf()?;

        // if we have 8 bytes and there is no 0xff in them, then we can just read the bits directly as big endian
        let mut v;
        if fb.len() < 8 || {
            let mut b = [0u8; 8];
            b.copy_from_slice(&fb[..8]);
            v = u64::from_le_bytes(b);
            has_ff(v)
        } {
            return self.fill_register_slow(bits_to_read);
        }

        v = v.to_be();

        // only fill 63 bits not 64 to avoid having to special case
        // of self.bits << 64 which is a nop
        let bytes_to_read = (63 - self.bits_left) / 8;

        self.bits = self.bits << (bytes_to_read * 8) | v >> (64 - bytes_to_read * 8);
        self.bits_left += bytes_to_read * 8;
        self.read_ahead_bytes = (self.bits_left - bits_to_read) / 8;

        self.inner
            .consume((bytes_to_read - self.read_ahead_bytes) as usize);

        return Ok(());
    }

    #[cold]
    fn fill_register_slow(&mut self, bits_to_read: u32) -> Result<()> {
        loop {
            if self.marker.is_some() || self.eof {
                // past the end of the entropy coded data everything reads as zero
                self.bits <<= 8;
                self.bits_left += 8;
                self.pad_bits += 8;
            } else if let Some(b) = self.next_byte()? {
                if b == 0xff {
                    match self.byte_after_ff()? {
                        // escaped 0xff data byte
                        Some(0) => {
                            self.bits = (self.bits << 8) | 0xff;
                            self.bits_left += 8;
                        }
                        Some(m) => {
                            #[cfg(feature = "detailed_tracing")]
                            log::trace!("entropy data terminated by marker {0:x}", m);

                            self.marker = Some(m);
                            continue;
                        }
                        None => {
                            self.eof = true;
                            continue;
                        }
                    }
                } else {
                    self.bits = (self.bits << 8) | (b as u64);
                    self.bits_left += 8;
                }
            } else {
                self.eof = true;
                continue;
            }

            if self.bits_left >= bits_to_read {
                break;
            }
        }
        Ok(())
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let fb = self.inner.fill_buf()?;
        if let &[b, ..] = fb {
            self.inner.consume(1);
            Ok(Some(b))
        } else {
            Ok(None)
        }
    }

    /// reads the byte following an 0xff, skipping any 0xff fill bytes that may
    /// precede a marker
    fn byte_after_ff(&mut self) -> Result<Option<u8>> {
        loop {
            match self.next_byte()? {
                Some(0xff) => continue,
                other => return Ok(other),
            }
        }
    }

    #[cfg(test)]
    pub fn is_eof(&self) -> bool {
        return self.eof;
    }

    /// the marker that terminated the entropy coded data, if one was hit
    #[cfg(test)]
    pub fn pending_marker(&self) -> Option<u8> {
        self.marker
    }

    /// Fails if the decoder consumed any of the zero bits that were appended after
    /// the end of the entropy coded data.
    pub fn check_overrun(&self) -> Result<()> {
        if self.pad_bits > self.bits_left {
            if let Some(m) = self.marker {
                return err_exit_code(
                    ExitCode::MalformedScan,
                    format!("unexpected marker FF {0:X} inside entropy coded data", m),
                );
            } else {
                return err_exit_code(
                    ExitCode::MalformedScan,
                    "unexpected end of data inside entropy coded data",
                );
            }
        }
        Ok(())
    }

    /// Called at the end of a restart interval. The fill bits of the current byte
    /// are discarded and the next marker has to be the expected RSTn.
    pub fn verify_reset_code(&mut self) -> Result<()> {
        self.undo_read_ahead();
        self.check_overrun()?;

        let marker = match self.marker.take() {
            Some(m) => m,
            None => {
                if self.eof {
                    return err_exit_code(
                        ExitCode::MalformedScan,
                        "unexpected end of data, restart marker expected",
                    );
                }

                match self.next_byte()? {
                    Some(0xff) => match self.byte_after_ff()? {
                        Some(m) => m,
                        None => {
                            return err_exit_code(
                                ExitCode::MalformedScan,
                                "unexpected end of data, restart marker expected",
                            );
                        }
                    },
                    Some(b) => {
                        return err_exit_code(
                            ExitCode::MalformedScan,
                            format!("restart marker expected, found data byte {0:x}", b),
                        );
                    }
                    None => {
                        return err_exit_code(
                            ExitCode::MalformedScan,
                            "unexpected end of data, restart marker expected",
                        );
                    }
                }
            }
        };

        let expected = jpeg_code::RST0 + (self.cpos as u8 & 7);
        if marker != expected {
            return err_exit_code(
                ExitCode::MalformedScan,
                format!(
                    "invalid restart marker FF {0:X} found in stream, expected FF {1:X}",
                    marker, expected
                ),
            );
        }

        // start from scratch after RST
        self.cpos += 1;
        self.clear();

        Ok(())
    }

    /// Skips over `count` whole restart intervals without decoding them, verifying the
    /// sequence of restart markers. Must be called at the start of an interval.
    pub fn skip_restart_intervals(&mut self, count: u32) -> Result<()> {
        self.undo_read_ahead();
        self.clear();

        for _ in 0..count {
            let expected = jpeg_code::RST0 + (self.cpos as u8 & 7);
            match self.next_marker()? {
                Some(m) if m == expected => {
                    self.cpos += 1;
                }
                Some(m) => {
                    return err_exit_code(
                        ExitCode::MalformedScan,
                        format!(
                            "invalid restart marker FF {0:X} while skipping, expected FF {1:X}",
                            m, expected
                        ),
                    );
                }
                None => {
                    return err_exit_code(
                        ExitCode::MalformedScan,
                        "unexpected end of data while skipping restart intervals",
                    );
                }
            }
        }

        Ok(())
    }

    /// Skips the rest of the entropy coded segment, including any restart markers
    /// inside it, and returns the marker that follows it. None means the stream ended.
    pub fn finish_scan(&mut self) -> Result<Option<u8>> {
        self.undo_read_ahead();
        let pending = self.marker.take();
        self.clear();

        if let Some(m) = pending {
            if !jpeg_code::is_rst(m) {
                return Ok(Some(m));
            }
        } else if self.eof {
            return Ok(None);
        }

        loop {
            match self.next_marker()? {
                Some(m) if jpeg_code::is_rst(m) => continue,
                other => return Ok(other),
            }
        }
    }

    /// byte scan for the next marker, ignoring stuffed zeros
    fn next_marker(&mut self) -> Result<Option<u8>> {
        loop {
            let fb = self.inner.fill_buf()?;
            if fb.is_empty() {
                self.eof = true;
                return Ok(None);
            }

            match fb.iter().position(|&b| b == 0xff) {
                None => {
                    let len = fb.len();
                    self.inner.consume(len);
                }
                Some(p) => {
                    self.inner.consume(p + 1);
                    match self.byte_after_ff()? {
                        Some(0) => {}
                        Some(m) => return Ok(Some(m)),
                        None => {
                            self.eof = true;
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }

    fn clear(&mut self) {
        self.bits = 0;
        self.bits_left = 0;
        self.pad_bits = 0;
    }

    /// "puts back" read_ahead bits that were read ahead from the buffer but not consumed.
    ///
    /// After calling this method, we can be guaranteed that read_ahead_bytes is 0.
    pub fn undo_read_ahead(&mut self) {
        while self.bits_left >= 8 && self.read_ahead_bytes > 0 {
            self.bits_left -= 8;
            self.bits >>= 8;
            self.read_ahead_bytes -= 1;
        }

        if self.read_ahead_bytes > 0 {
            self.inner.consume(self.read_ahead_bytes as usize);
            self.read_ahead_bytes = 0;
        }
    }
}
