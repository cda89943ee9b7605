/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::BufRead;

#[cfg(feature = "detailed_tracing")]
use log::trace;

use super::bit_reader::BitReader;
use super::block_based_image::{AlignedBlock, BlockBasedImage};
use super::jpeg_header::{HuffTree, JpegHeader, ScanMode};
use super::jpeg_position_state::JpegPositionState;
use super::row_spec::RowSpec;
use crate::consts::JpegDecodeStatus;
use crate::decode_error::{err_exit_code, AddContext, ExitCode, Result};
use crate::helpers::*;

/// Decodes the entropy coded data of the scan that was just parsed into `image_data`.
///
/// Only the MCUs inside `window` are stored. Everything before the window is still
/// decoded into the placeholder blocks to get the DC predictors right, unless restart
/// markers allow to skip over whole intervals. Everything after the window is skipped.
///
/// Returns the marker that follows the scan (None if the stream ended) and the number
/// of blocks that were entropy decoded.
pub fn read_scan<R: BufRead>(
    jf: &JpegHeader,
    reader: &mut R,
    image_data: &mut [BlockBasedImage],
    window: &RowSpec,
) -> Result<(Option<u8>, u64)> {
    let mut bit_reader = BitReader::new(reader);

    let (window_start, window_end) = window.scan_mcu_range(jf);

    if window_start >= window_end {
        return Ok((bit_reader.finish_scan().context()?, 0));
    }

    // with restart markers we can start at the interval that contains the window
    let first_mcu = if jf.rsti > 0 {
        let skipped = window_start / jf.rsti;
        bit_reader.skip_restart_intervals(skipped).context()?;
        skipped * jf.rsti
    } else {
        0
    };

    #[cfg(feature = "detailed_tracing")]
    trace!(
        "scan {0:?} mcus {1}..{2} (window {3}..{4})",
        jf.scan_mode(),
        first_mcu,
        window_end,
        window_start,
        window_end
    );

    let mut state = JpegPositionState::new(jf, first_mcu, window_end);
    let mut blocks = 0u64;

    let mode = jf.scan_mode();

    let mut sta = JpegDecodeStatus::DecodeInProgress;

    while sta != JpegDecodeStatus::ScanCompleted {
        state.reset_rstw(jf); // restart wait counter

        sta = match mode {
            ScanMode::Baseline => {
                decode_baseline_rst(jf, &mut state, &mut bit_reader, image_data, &mut blocks)
            }
            ScanMode::DcFirst => {
                decode_dc_first_rst(jf, &mut state, &mut bit_reader, image_data, &mut blocks)
            }
            ScanMode::DcRefine => {
                decode_dc_refine_rst(jf, &mut state, &mut bit_reader, image_data, &mut blocks)
            }
            ScanMode::AcFirst => {
                decode_ac_first_rst(jf, &mut state, &mut bit_reader, image_data, &mut blocks)
            }
            ScanMode::AcRefine => {
                decode_ac_refine_rst(jf, &mut state, &mut bit_reader, image_data, &mut blocks)
            }
        }
        .context()?;

        // verify that we got the right RST code here since the above should do 1 interval
        if sta == JpegDecodeStatus::RestartIntervalExpired {
            if state.eobrun > 0 {
                return err_exit_code(
                    ExitCode::MalformedScan,
                    "eob run extends past end of restart interval",
                );
            }

            bit_reader.verify_reset_code().context()?;
            sta = JpegDecodeStatus::DecodeInProgress;
        }
    }

    let next_marker = bit_reader.finish_scan().context()?;

    Ok((next_marker, blocks))
}

/// reads an entire interval until the RST code
fn decode_baseline_rst<R: BufRead>(
    jf: &JpegHeader,
    state: &mut JpegPositionState,
    bit_reader: &mut BitReader<R>,
    image_data: &mut [BlockBasedImage],
    blocks: &mut u64,
) -> Result<JpegDecodeStatus> {
    let mut sta = JpegDecodeStatus::DecodeInProgress;
    let mut lastdc = [0i16; 4]; // (re)set last DCs for diff coding

    while sta == JpegDecodeStatus::DecodeInProgress {
        let cmp = state.get_cmp();

        // decode block (throws on error)
        let mut block = [0i16; 64];
        decode_block_seq(
            bit_reader,
            jf.get_huff_dc_tree(cmp),
            jf.get_huff_ac_tree(cmp),
            &mut block,
        )?;
        bit_reader.check_overrun()?;

        // fix dc
        block[0] = block[0].wrapping_add(lastdc[cmp]);
        lastdc[cmp] = block[0];

        image_data[cmp].set_block_data(state.get_dpos(), AlignedBlock::zigzag_to_transposed(block));
        *blocks += 1;

        sta = state.next_mcu_pos(jf);
    }

    Ok(sta)
}

/// first pass over the DC coefficients, the values are predicted like in baseline
fn decode_dc_first_rst<R: BufRead>(
    jf: &JpegHeader,
    state: &mut JpegPositionState,
    bit_reader: &mut BitReader<R>,
    image_data: &mut [BlockBasedImage],
    blocks: &mut u64,
) -> Result<JpegDecodeStatus> {
    let mut sta = JpegDecodeStatus::DecodeInProgress;
    let mut lastdc = [0i16; 4];

    while sta == JpegDecodeStatus::DecodeInProgress {
        let cmp = state.get_cmp();

        let dc = read_dc(bit_reader, jf.get_huff_dc_tree(cmp))?.wrapping_add(lastdc[cmp]);
        bit_reader.check_overrun()?;
        lastdc[cmp] = dc;

        image_data[cmp]
            .get_block_mut(state.get_dpos())
            .set_transposed_from_zigzag(0, dc.wrapping_shl(u32::from(jf.cs_sal)));
        *blocks += 1;

        sta = state.next_mcu_pos(jf);
    }

    Ok(sta)
}

/// one more bit of every DC coefficient
fn decode_dc_refine_rst<R: BufRead>(
    jf: &JpegHeader,
    state: &mut JpegPositionState,
    bit_reader: &mut BitReader<R>,
    image_data: &mut [BlockBasedImage],
    blocks: &mut u64,
) -> Result<JpegDecodeStatus> {
    let mut sta = JpegDecodeStatus::DecodeInProgress;

    while sta == JpegDecodeStatus::DecodeInProgress {
        let current_block = image_data[state.get_cmp()].get_block_mut(state.get_dpos());

        let value = bit_reader.read(1)? as i16;
        bit_reader.check_overrun()?;

        current_block.set_transposed_from_zigzag(
            0,
            current_block.get_transposed_from_zigzag(0) | value.wrapping_shl(u32::from(jf.cs_sal)),
        );
        *blocks += 1;

        sta = state.next_mcu_pos(jf);
    }

    Ok(sta)
}

/// first pass over a band of AC coefficients
fn decode_ac_first_rst<R: BufRead>(
    jf: &JpegHeader,
    state: &mut JpegPositionState,
    bit_reader: &mut BitReader<R>,
    image_data: &mut [BlockBasedImage],
    blocks: &mut u64,
) -> Result<JpegDecodeStatus> {
    let mut sta = JpegDecodeStatus::DecodeInProgress;
    let mut block = [0i16; 64];

    while sta == JpegDecodeStatus::DecodeInProgress {
        let cmp = state.get_cmp();

        let eob = decode_ac_prg_fs(
            bit_reader,
            jf.get_huff_ac_tree(cmp),
            &mut block,
            state,
            jf.cs_from,
            jf.cs_to,
        )?;
        bit_reader.check_overrun()?;

        let current_block = image_data[cmp].get_block_mut(state.get_dpos());
        for bpos in jf.cs_from..eob {
            current_block.set_transposed_from_zigzag(
                usize::from(bpos),
                block[usize::from(bpos)].wrapping_shl(u32::from(jf.cs_sal)),
            );
        }
        *blocks += 1 + u64::from(state.eobrun);

        sta = state.skip_eobrun(jf)?;

        // proceed only if no error encountered
        if sta == JpegDecodeStatus::DecodeInProgress {
            sta = state.next_mcu_pos(jf);
        }
    }

    Ok(sta)
}

/// refinement of a band of AC coefficients
fn decode_ac_refine_rst<R: BufRead>(
    jf: &JpegHeader,
    state: &mut JpegPositionState,
    bit_reader: &mut BitReader<R>,
    image_data: &mut [BlockBasedImage],
    blocks: &mut u64,
) -> Result<JpegDecodeStatus> {
    let mut sta = JpegDecodeStatus::DecodeInProgress;
    let mut block = [0i16; 64];

    while sta == JpegDecodeStatus::DecodeInProgress {
        let current_block = image_data[state.get_cmp()].get_block_mut(state.get_dpos());

        for bpos in jf.cs_from..jf.cs_to + 1 {
            block[usize::from(bpos)] = current_block.get_transposed_from_zigzag(usize::from(bpos));
        }

        if state.eobrun == 0 {
            // decode block (long routine)
            decode_ac_prg_sa(
                bit_reader,
                jf.get_huff_ac_tree(state.get_cmp()),
                &mut block,
                state,
                jf.cs_from,
                jf.cs_to,
            )?;
        } else {
            // decode zero run block (short routine)
            decode_eobrun_sa(bit_reader, &mut block, state, jf.cs_from, jf.cs_to)?;
        }
        bit_reader.check_overrun()?;

        // block now contains the corrections, add them to the coefficients
        for bpos in jf.cs_from..jf.cs_to + 1 {
            current_block.set_transposed_from_zigzag(
                usize::from(bpos),
                current_block
                    .get_transposed_from_zigzag(usize::from(bpos))
                    .wrapping_add(block[usize::from(bpos)].wrapping_shl(u32::from(jf.cs_sal))),
            );
        }
        *blocks += 1;

        sta = state.next_mcu_pos(jf);
    }

    Ok(sta)
}

/// sequential block decoding routine, the block is in zigzag order
pub fn decode_block_seq<R: BufRead>(
    bit_reader: &mut BitReader<R>,
    dctree: &HuffTree,
    actree: &HuffTree,
    block: &mut [i16; 64],
) -> Result<()> {
    // decode dc
    block[0] = read_dc(bit_reader, dctree)?;

    // decode ac
    let mut bpos: usize = 1;
    while bpos < 64 {
        // decode next
        if let Some((z, coef)) = read_coef(bit_reader, actree)? {
            if z + bpos >= 64 {
                return err_exit_code(
                    ExitCode::MalformedScan,
                    format!("zero run of {0} at position {1} is past the end of the block", z, bpos),
                );
            }

            // skip zeroes
            bpos += z;

            block[bpos] = coef;
            bpos += 1;
        } else {
            // EOB
            break;
        }
    }

    Ok(())
}

/// Reads and decodes next Huffman code from BitReader using the provided tree
fn next_huff_code<R: BufRead>(bit_reader: &mut BitReader<R>, ctree: &HuffTree) -> Result<u8> {
    let mut node: u16 = 0;

    while node < 256 {
        node = ctree.node[usize::from(node)][usize::from(bit_reader.read(1)?)];
    }

    if node == 0xffff {
        err_exit_code(ExitCode::MalformedScan, "illegal Huffman code detected")
    } else {
        Ok((node - 256) as u8)
    }
}

/// decodes the next symbol, using the peek table for codes up to 8 bits
#[inline(always)]
fn read_huff_symbol<R: BufRead>(bit_reader: &mut BitReader<R>, tree: &HuffTree) -> Result<u8> {
    loop {
        // peek ahead to see if we can decode the symbol immediately
        // given what has already been read into the bitreader
        let (peek_value, peek_len) = bit_reader.peek();

        // use lookup table to figure out the first code in this byte and how long it is
        let (code, code_len) = tree.peek_code[usize::from(peek_value)];

        if u32::from(code_len) <= peek_len {
            // found code directly, so advance by the number of bits immediately
            bit_reader.advance(u32::from(code_len));
            return Ok(code);
        } else if peek_len < 8 {
            // peek code works with up to 8 bits at a time. If we had less
            // than this, then we need to read more bits into the bitreader
            bit_reader.fill_register(8)?;
        } else {
            // take slow path since we have a code that is bigger than 8 bits (but pretty rare)
            return next_huff_code(bit_reader, tree);
        }
    }
}

fn read_dc<R: BufRead>(bit_reader: &mut BitReader<R>, tree: &HuffTree) -> Result<i16> {
    let hc = read_huff_symbol(bit_reader, tree)?;

    let z = lbits(hc, 4);
    let literal_bits = rbits(hc, 4);
    if z != 0 || literal_bits > 11 {
        return err_exit_code(
            ExitCode::MalformedScan,
            format!("invalid DC coefficient code {0:x}", hc),
        );
    }

    let value = bit_reader.read(u32::from(literal_bits))?;
    Ok(devli(literal_bits, value))
}

/// returns None for EOB, otherwise the number of zeros and the coefficient
#[inline(always)]
fn read_coef<R: BufRead>(
    bit_reader: &mut BitReader<R>,
    tree: &HuffTree,
) -> Result<Option<(usize, i16)>> {
    let hc = read_huff_symbol(bit_reader, tree)?;

    // analyse code
    if hc != 0 {
        let z = usize::from(lbits(hc, 4));
        let literal_bits = rbits(hc, 4);

        if literal_bits == 0 {
            if z != 15 {
                return err_exit_code(
                    ExitCode::MalformedScan,
                    format!("invalid AC coefficient code {0:x}", hc),
                );
            }
            Ok(Some((z, 0)))
        } else {
            let value = bit_reader.read(u32::from(literal_bits))?;
            Ok(Some((z, devli(literal_bits, value))))
        }
    } else {
        Ok(None)
    }
}

/// progressive AC decoding (first pass), returns the position after the last coefficient
fn decode_ac_prg_fs<R: BufRead>(
    bit_reader: &mut BitReader<R>,
    actree: &HuffTree,
    block: &mut [i16; 64],
    state: &mut JpegPositionState,
    from: u8,
    to: u8,
) -> Result<u8> {
    debug_assert!(state.eobrun == 0);

    // decode ac
    let mut bpos = from;
    while bpos <= to {
        // decode next
        let hc = read_huff_symbol(bit_reader, actree)?;

        let l = lbits(hc, 4);
        let r = rbits(hc, 4);

        // check if code is not an EOB or EOB run
        if (l == 15) || (r > 0) {
            // decode run/level combination
            let z = l;
            let s = r;
            let n = bit_reader.read(u32::from(s))?;
            if z + bpos > to {
                return err_exit_code(
                    ExitCode::MalformedScan,
                    format!("zero run of {0} at position {1} is past the end of the band", z, bpos),
                );
            }

            for _ in 0..z {
                // write zeroes
                block[usize::from(bpos)] = 0;
                bpos += 1;
            }
            block[usize::from(bpos)] = devli(s, n); // decode cvli
            bpos += 1;
        } else {
            // decode eobrun
            let s = l;
            let n = bit_reader.read(u32::from(s))?;
            state.eobrun = decode_eobrun_bits(s, n);

            state.eobrun -= 1; // decrement eobrun ( for this one )

            break;
        }
    }

    // return position of eob
    Ok(bpos)
}

/// Progressive AC refinement. On return the block contains the corrections in the
/// band: +-1 for coefficients that became nonzero and +-1 or 0 for the ones that were
/// already nonzero.
fn decode_ac_prg_sa<R: BufRead>(
    bit_reader: &mut BitReader<R>,
    actree: &HuffTree,
    block: &mut [i16; 64],
    state: &mut JpegPositionState,
    from: u8,
    to: u8,
) -> Result<()> {
    debug_assert!(state.eobrun == 0);

    let mut bpos = from;

    // decode AC succesive approximation bits
    while bpos <= to {
        // decode next
        let hc = read_huff_symbol(bit_reader, actree)?;

        let l = lbits(hc, 4);
        let r = rbits(hc, 4);

        // check if code is not an EOB or EOB run
        if (l == 15) || (r > 0) {
            // decode run/level combination
            let mut z = l;
            let v = match r {
                0 => 0,
                1 => {
                    if bit_reader.read(1)? == 0 {
                        -1
                    } else {
                        1
                    }
                }
                _ => {
                    return err_exit_code(
                        ExitCode::MalformedScan,
                        format!("refinement coefficient of {0} bits, only 1 allowed", r),
                    );
                }
            };

            // write zeroes / write correction bits
            loop {
                if block[usize::from(bpos)] == 0 {
                    // skip zeroes / write value
                    if z > 0 {
                        z -= 1;
                    } else {
                        block[usize::from(bpos)] = v;
                        bpos += 1;
                        break;
                    }
                } else {
                    // read correction bit
                    let n = bit_reader.read(1)? as i16;
                    block[usize::from(bpos)] = if block[usize::from(bpos)] > 0 { n } else { -n };
                }

                if bpos >= to {
                    return err_exit_code(
                        ExitCode::MalformedScan,
                        "refinement run is past the end of the band",
                    );
                }

                bpos += 1;
            }
        } else {
            // decode eobrun
            let s = l;
            let n = bit_reader.read(u32::from(s))?;
            state.eobrun = decode_eobrun_bits(s, n);

            // since we hit EOB, the rest can be done with the zero block decoder
            decode_eobrun_sa(bit_reader, block, state, bpos, to)?;

            return Ok(());
        }
    }

    Ok(())
}

/// Correction bits for the rest of a block that is inside of an EOB run. Only
/// coefficients that are already nonzero get a bit.
fn decode_eobrun_sa<R: BufRead>(
    bit_reader: &mut BitReader<R>,
    block: &mut [i16; 64],
    state: &mut JpegPositionState,
    from: u8,
    to: u8,
) -> Result<()> {
    debug_assert!(state.eobrun > 0);

    for bpos in usize::from(from)..usize::from(to) + 1 {
        if block[bpos] != 0 {
            let n = bit_reader.read(1)? as i16;
            block[bpos] = if block[bpos] > 0 { n } else { -n };
        }
    }

    // decrement eobrun
    state.eobrun -= 1;

    Ok(())
}

/// decoding for decoding eobrun lengths. The encoding chops off the most significant
/// bit since it is always 1, so we need to add it back.
fn decode_eobrun_bits(s: u8, n: u16) -> u16 {
    n + (1 << s)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use default_boxed::DefaultBoxed;

    use super::*;
    use crate::enabled_features::EnabledFeatures;
    use crate::jpeg::counting_reader::CountingReader;
    use crate::jpeg::jpeg_header::{read_soi, ParseResult};
    use crate::jpeg::test_jpeg::{flat_420_jpeg, TestImage};

    /// runs all scans of the file and returns the coefficient planes
    fn decode_coefficients(
        data: &[u8],
        region: Option<(u32, u32)>,
    ) -> Result<(Box<JpegHeader>, Vec<BlockBasedImage>, RowSpec)> {
        let features = EnabledFeatures::default();
        let mut reader = CountingReader::new(Cursor::new(data));
        read_soi(&mut reader)?;

        let mut jh = JpegHeader::default_boxed();
        let mut result = jh.parse(&mut reader, None, region.is_some(), &features)?;

        let window = match region {
            Some((o, l)) => RowSpec::for_region(&jh, o, l)?,
            None => RowSpec::full(&jh),
        };

        let mut image_data: Vec<BlockBasedImage> = jh.cmp_info[0..jh.cmpc]
            .iter()
            .map(|c| BlockBasedImage::new(c, window.start_mcu_row, window.end_mcu_row))
            .collect();

        while result == ParseResult::StartOfScan {
            let (marker, _) = read_scan(&jh, &mut reader, &mut image_data, &window)?;
            result = match marker {
                Some(m) => jh.parse(&mut reader, Some(m), region.is_some(), &features)?,
                None => ParseResult::EndOfImage,
            };
        }

        Ok((jh, image_data, window))
    }

    fn assert_same_blocks(a: &[BlockBasedImage], b: &[BlockBasedImage]) {
        assert_eq!(a.len(), b.len());
        for (ca, cb) in a.iter().zip(b.iter()) {
            assert_eq!(ca.get_block_rows(), cb.get_block_rows());
            for r in 0..ca.get_block_rows() {
                assert_eq!(ca.get_row(r), cb.get_row(r));
            }
        }
    }

    #[test]
    fn test_flat_dc() {
        let (_, image_data, _) = decode_coefficients(&flat_420_jpeg(), None).unwrap();

        // Y is 22 for all 4 blocks since the other differences are 0
        for r in 0..2 {
            for b in image_data[0].get_row(r) {
                assert_eq!(b.get_coefficient(0), 22);
                assert!(b.get_block()[1..].iter().all(|&c| c == 0));
            }
        }
        assert_eq!(image_data[1].get_row(0)[0].get_coefficient(0), -10);
        assert_eq!(image_data[2].get_row(0)[0].get_coefficient(0), 20);
    }

    #[test]
    fn test_baseline_matches_source() {
        let img = TestImage::random(40, 24, &[(1, 2, 2), (2, 1, 1), (3, 1, 1)], 7);
        let (_, image_data, _) = decode_coefficients(&img.encode_baseline(0), None).unwrap();

        for (c, plane) in img.components.iter().zip(image_data.iter()) {
            for y in 0..c.bcv {
                let row = plane.get_row(y);
                for x in 0..c.bch {
                    let expected = AlignedBlock::zigzag_to_transposed(c.blocks[(y * c.bch + x) as usize]);
                    assert_eq!(row[x as usize], expected, "block {0},{1}", x, y);
                }
            }
        }
    }

    #[test]
    fn test_progressive_matches_baseline() {
        for rsti in [0, 1, 3] {
            for sampling in [
                &[(1, 2, 2), (2, 1, 1), (3, 1, 1)][..],
                &[(1, 1, 1), (2, 1, 1), (3, 1, 1)][..],
                &[(1, 1, 1)][..],
            ] {
                let img = TestImage::random(37, 29, sampling, 11);

                let (_, baseline, _) = decode_coefficients(&img.encode_baseline(rsti), None).unwrap();
                let (_, progressive, _) =
                    decode_coefficients(&img.encode_progressive(rsti), None).unwrap();

                assert_same_blocks(&baseline, &progressive);
            }
        }
    }

    #[test]
    fn test_restart_markers_give_same_coefficients() {
        let img = TestImage::random(64, 48, &[(1, 2, 1), (2, 1, 1), (3, 1, 1)], 3);

        let (_, plain, _) = decode_coefficients(&img.encode_baseline(0), None).unwrap();
        let (_, with_rst, _) = decode_coefficients(&img.encode_baseline(2), None).unwrap();

        assert_same_blocks(&plain, &with_rst);
    }

    #[test]
    fn test_region_matches_full() {
        let img = TestImage::random(48, 80, &[(1, 2, 2), (2, 1, 1), (3, 1, 1)], 5);

        for rsti in [0, 1, 4] {
            let data = img.encode_baseline(rsti);
            let (_, full, _) = decode_coefficients(&data, None).unwrap();
            let (_, region, window) = decode_coefficients(&data, Some((33, 20))).unwrap();

            assert_eq!((window.start_mcu_row, window.end_mcu_row), (1, 5));

            for (f, r) in full.iter().zip(region.iter()) {
                for row in 0..r.get_block_rows() {
                    assert_eq!(r.get_row(row), f.get_row(row + r.get_first_block_row()));
                }
            }
        }
    }

    #[test]
    fn test_truncated_scan() {
        let img = TestImage::random(32, 32, &[(1, 1, 1)], 9);
        let mut data = img.encode_baseline(0);

        // cut in the middle of the entropy coded data
        data.truncate(data.len() - 40);

        let e = decode_coefficients(&data, None).err().unwrap();
        assert_eq!(e.exit_code(), ExitCode::MalformedScan);
    }

    #[test]
    fn test_wrong_restart_marker() {
        let img = TestImage::random(32, 16, &[(1, 1, 1)], 1);
        let mut data = img.encode_baseline(2);

        // turn the first RST0 into RST1
        let pos = data
            .windows(2)
            .position(|w| w == [0xff, 0xd0])
            .unwrap();
        data[pos + 1] = 0xd1;

        let e = decode_coefficients(&data, None).err().unwrap();
        assert_eq!(e.exit_code(), ExitCode::MalformedScan);
    }

    #[test]
    fn test_run_past_end_of_block() {
        use crate::jpeg::jpeg_code;
        use crate::jpeg::test_jpeg::{full_table_code, EntropyWriter, JpegBuilder};

        let mut w = EntropyWriter::new();
        let (c, l) = full_table_code(0); // DC difference 0
        w.put(c, l);
        // runs of 16 zeros, the fourth one starts at coefficient 49
        let (c, l) = full_table_code(0xF0);
        for _ in 0..4 {
            w.put(c, l);
        }
        w.pad();

        let data = JpegBuilder::new()
            .dqt(0, &[1; 64])
            .sof(jpeg_code::SOF0, 8, 8, 8, &[(1, 0x11, 0)])
            .full_table(0, 0)
            .full_table(1, 0)
            .sos(&[(1, 0x00)], 0, 63, 0, 0)
            .raw(&w.finish())
            .eoi()
            .build();

        let e = decode_coefficients(&data, None).err().unwrap();
        assert_eq!(e.exit_code(), ExitCode::MalformedScan);
    }
}
