/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};
use default_boxed::DefaultBoxed;
use log::{info, warn};

use super::component_info::ComponentInfo;
use super::counting_reader::StreamPosition;
use super::jpeg_code;
use super::metadata::{
    classify_segment, parse_adobe_transform, parse_jfif_resolution, ColorSpace, FrameInfo,
    MetadataKind, MetadataSegment, Resolution,
};
use crate::consts::{JpegType, MAX_COMPONENTS, STD_LUMINANCE_QUANT_ZIGZAG};
use crate::decode_error::{err_exit_code, AddContext, ExitCode, Result};
use crate::enabled_features::EnabledFeatures;
use crate::helpers::*;

/// Code lengths and code values of a Huffman table, indexed by symbol
#[derive(Copy, Clone, Debug)]
pub struct HuffCodes {
    pub c_val: [u16; 256],
    pub c_len: [u16; 256],
}

impl Default for HuffCodes {
    fn default() -> Self {
        HuffCodes {
            c_val: [0; 256],
            c_len: [0; 256],
        }
    }
}

impl HuffCodes {
    /// Constructs from the format encoded by JPEG, returns the table and the number of
    /// bytes of the segment it occupied.
    ///
    /// Tree consists of a 16 byte table with the number of codes for each bit length,
    /// followed by the actual symbols for that length appended together. Codes are
    /// assigned canonically in the order of the symbols.
    pub fn construct_from_segment(segment: &[u8]) -> Result<(Self, usize)> {
        ensure_space(segment, 0, 16, ExitCode::MalformedHeader).context()?;

        let symbol_count: usize = segment[0..16].iter().map(|&c| usize::from(c)).sum();
        if symbol_count > 256 {
            return err_exit_code(
                ExitCode::MalformedHeader,
                format!("huffman table has {0} symbols, max 256 allowed", symbol_count),
            );
        }

        ensure_space(segment, 16, symbol_count, ExitCode::MalformedHeader).context()?;

        let mut hc = HuffCodes::default();

        let mut k = 16;
        let mut code: u32 = 0;

        for i in 0..16 {
            let len = (i + 1) as u16;

            for _ in 0..segment[i] {
                if code >= (1u32 << len) {
                    return err_exit_code(
                        ExitCode::MalformedHeader,
                        "invalid huffman code layout, too many codes for a given length",
                    );
                }

                let symbol = usize::from(segment[k]);
                hc.c_len[symbol] = len;
                hc.c_val[symbol] = code as u16;

                k += 1;
                code += 1;
            }

            code <<= 1;
        }

        Ok((hc, k))
    }
}

/// Decoding tree for a Huffman table. Internal nodes are < 256, leaves are stored as
/// 256 + symbol and 0xffff marks a code that doesn't exist.
#[derive(Copy, Clone, Debug)]
pub struct HuffTree {
    pub node: [[u16; 2]; 256],
    pub peek_code: [(u8, u8); 256],
}

impl Default for HuffTree {
    fn default() -> Self {
        HuffTree {
            node: [[0; 2]; 256],
            peek_code: [(0, 0); 256],
        }
    }
}

impl HuffTree {
    /// construct the huffman tree codes from the HuffCodes as a source
    pub fn construct_hufftree(hc: &HuffCodes) -> Result<Self> {
        let mut ht = HuffTree::default();

        let mut nextfree: u16 = 1;
        for i in 0..256 {
            if hc.c_len[i] == 0 {
                continue;
            }

            // walk the path of the code, creating the internal nodes on the way
            let mut node = 0;
            let mut j = hc.c_len[i] - 1;
            while j > 0 {
                let branch = usize::from(bitn(hc.c_val[i], j));
                if ht.node[node][branch] == 0 {
                    if nextfree > 0xff {
                        return err_exit_code(
                            ExitCode::MalformedHeader,
                            "Huffman table out of space",
                        );
                    }
                    ht.node[node][branch] = nextfree;
                    nextfree += 1;
                } else if ht.node[node][branch] >= 256 {
                    return err_exit_code(
                        ExitCode::MalformedHeader,
                        "Huffman code is a prefix of another code",
                    );
                }

                node = usize::from(ht.node[node][branch]);
                j -= 1;
            }

            // last link is number of targetvalue + 256
            let branch = usize::from(bitn(hc.c_val[i], 0));
            if ht.node[node][branch] != 0 {
                return err_exit_code(
                    ExitCode::MalformedHeader,
                    "Huffman code is a prefix of another code",
                );
            }
            ht.node[node][branch] = (i + 256) as u16;
        }

        // for every illegal code node, store 0xffff
        for x in &mut ht.node {
            if x[0] == 0 {
                x[0] = 0xffff;
            }
            if x[1] == 0 {
                x[1] = 0xffff;
            }
        }

        // precalculate decoding peeking into the stream. This lets us quickly decode
        // small code without jumping through the node table
        for peekbyte in 0..256 {
            let mut node = 0;
            let mut len: u8 = 0;

            while node < 256 && len <= 7 {
                node = ht.node[usize::from(node)][(peekbyte >> (7 - len)) & 0x1];

                len += 1;
            }

            if node == 0xffff || node < 256 {
                // invalid code or code was too long to fit, so just say it requires 256 bits
                // so we will take the long path to decode it
                ht.peek_code[peekbyte] = (0, 0xff);
            } else {
                ht.peek_code[peekbyte] = ((node - 256) as u8, len);
            }
        }
        Ok(ht)
    }
}

/// Quantization table as stored in the DQT segment, in zigzag order
#[derive(Copy, Clone, Debug)]
pub struct QuantTable {
    pub values: [u16; 64],
    pub defined: bool,
}

impl Default for QuantTable {
    fn default() -> Self {
        QuantTable {
            values: [0; 64],
            defined: false,
        }
    }
}

/// How the coefficients of the current scan are coded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// all 64 coefficients of the sequential processes
    Baseline,
    /// first pass over the DC coefficients of a progressive image
    DcFirst,
    /// one more bit of the DC coefficients
    DcRefine,
    /// first pass over a band of AC coefficients
    AcFirst,
    /// one more bit of a band of AC coefficients
    AcRefine,
}

/// what the header parser stopped on
#[derive(Debug, PartialEq, Eq)]
pub enum ParseResult {
    StartOfScan,
    EndOfImage,
}

enum ParseSegmentResult {
    Continue,
    Eoi,
    Sos,
}

#[derive(Debug, DefaultBoxed)]
pub struct JpegHeader {
    pub q_tables: [QuantTable; 4],     // quantization tables 4 x 64
    h_trees: [[HuffTree; 4]; 2],       // huffman decoding trees (access via get_huff_xx_tree)
    pub ht_set: [[bool; 4]; 2],        // true if huffman table is set
    pub cmp_info: [ComponentInfo; 4],  // components
    pub cmpc: usize,                   // component count
    pub img_width: u32,                // width of image
    pub img_height: u32,               // height of image
    pub precision: u8,                 // sample precision

    pub jpeg_type: JpegType,
    pub hmax: u32, // max horizontal sample factor
    pub vmax: u32, // max vertical sample factor
    pub mcuh: u32, // mcus per line
    pub mcuv: u32, // mcus per column
    pub mcuc: u32, // count of mcus

    pub rsti: u32,          // restart interval
    pub cs_cmpc: usize,     // component count in current scan
    pub cs_cmp: [usize; 4], // component numbers in current scan

    // variables: info about current scan
    pub cs_from: u8, // begin - band of current scan ( inclusive )
    pub cs_to: u8,   // end - band of current scan ( inclusive )
    pub cs_sah: u8,  // successive approximation bit pos high
    pub cs_sal: u8,  // successive approximation bit pos low

    /// number of scans seen so far
    pub scan_count: u32,

    /// APPn and COM segments in stream order
    pub metadata: Vec<MetadataSegment>,
    pub has_jfif: bool,
    pub resolution: Option<Resolution>,
    pub adobe_transform: Option<u8>,
}

impl JpegHeader {
    pub fn get_huff_dc_tree(&self, cmp: usize) -> &HuffTree {
        &self.h_trees[0][usize::from(self.cmp_info[cmp].huff_dc)]
    }

    pub fn get_huff_ac_tree(&self, cmp: usize) -> &HuffTree {
        &self.h_trees[1][usize::from(self.cmp_info[cmp].huff_ac)]
    }

    /// the quantization table used by the component
    pub fn get_q_table(&self, cmp: usize) -> &QuantTable {
        &self.q_tables[usize::from(self.cmp_info[cmp].q_table_index)]
    }

    pub fn scan_mode(&self) -> ScanMode {
        if self.jpeg_type.is_sequential() {
            ScanMode::Baseline
        } else if self.cs_from == 0 {
            if self.cs_sah == 0 {
                ScanMode::DcFirst
            } else {
                ScanMode::DcRefine
            }
        } else if self.cs_sah == 0 {
            ScanMode::AcFirst
        } else {
            ScanMode::AcRefine
        }
    }

    /// true if the current scan contains more than one component
    pub fn is_interleaved(&self) -> bool {
        self.cs_cmpc > 1
    }

    /// Parses marker segments until the next SOS or EOI. If `first_marker` is set, it is
    /// the marker that terminated the previous scan, which has already been consumed.
    ///
    /// With `region_decode` set progressive frames are rejected as soon as the frame
    /// header is seen, since they can't be decoded partially.
    pub fn parse<R: Read + StreamPosition>(
        &mut self,
        reader: &mut R,
        first_marker: Option<u8>,
        region_decode: bool,
        enabled_features: &EnabledFeatures,
    ) -> Result<ParseResult> {
        let mut next_marker = first_marker;

        // header parser loop
        loop {
            let marker = match next_marker.take() {
                Some(m) => m,
                None => read_marker(reader).context()?,
            };

            match self
                .parse_next_segment(marker, reader, region_decode, enabled_features)
                .context()?
            {
                ParseSegmentResult::Eoi => {
                    return Ok(ParseResult::EndOfImage);
                }
                ParseSegmentResult::Sos => {
                    return Ok(ParseResult::StartOfScan);
                }
                ParseSegmentResult::Continue => {}
            }
        }
    }

    fn parse_next_segment<R: Read + StreamPosition>(
        &mut self,
        btype: u8,
        reader: &mut R,
        region_decode: bool,
        enabled_features: &EnabledFeatures,
    ) -> Result<ParseSegmentResult> {
        // markers without a length field
        match btype {
            jpeg_code::EOI => return Ok(ParseSegmentResult::Eoi),
            jpeg_code::RST0..=jpeg_code::RST7 => {
                return err_exit_code(
                    ExitCode::MalformedHeader,
                    format!("rst marker FF {0:X} found out of place", btype),
                );
            }
            jpeg_code::SOI => {
                return err_exit_code(ExitCode::MalformedHeader, "soi marker found out of place");
            }
            jpeg_code::TEM => {
                return err_exit_code(ExitCode::MalformedHeader, "tem marker found out of place");
            }
            _ => {}
        }

        // now read the two bytes with the size of the segment
        let segment_size = reader.read_u16::<BigEndian>().context()?;
        if segment_size < 2 {
            return err_exit_code(ExitCode::MalformedHeader, "segment is too short");
        }

        let payload_offset = reader.position();

        let mut segment_data = Vec::new();
        segment_data.resize(usize::from(segment_size) - 2, 0);
        reader.read_exact(&mut segment_data).context()?;

        let segment = &segment_data[..];

        match btype {
            jpeg_code::DHT => self.parse_dht(segment).context()?,
            jpeg_code::DQT => self.parse_dqt(segment).context()?,

            jpeg_code::DRI => {
                if segment.len() != 2 {
                    return err_exit_code(ExitCode::MalformedHeader, "size mismatch in dri marker");
                }
                self.rsti = u32::from(b_short(segment[0], segment[1]));
            }

            jpeg_code::DNL => {
                if segment.len() != 2 {
                    return err_exit_code(ExitCode::MalformedHeader, "size mismatch in dnl marker");
                }
                if self.jpeg_type == JpegType::Unknown {
                    return err_exit_code(ExitCode::MalformedHeader, "dnl marker before frame");
                }

                let lines = u32::from(b_short(segment[0], segment[1]));
                if lines != self.img_height {
                    return err_exit_code(
                        ExitCode::MalformedHeader,
                        format!(
                            "dnl marker specifies {0} lines, frame has {1}",
                            lines, self.img_height
                        ),
                    );
                }
            }

            jpeg_code::SOS => {
                self.parse_sos(segment).context()?;
                return Ok(ParseSegmentResult::Sos);
            }

            jpeg_code::SOF0 | jpeg_code::SOF1 | jpeg_code::SOF2 => {
                self.parse_sof(btype, segment, region_decode, enabled_features)
                    .context()?;
            }

            // lossless, differential and arithmetic coding processes
            jpeg_code::SOF3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                return err_exit_code(
                    ExitCode::UnsupportedOperation,
                    format!(
                        "sof{0} marker found, coding process not supported",
                        btype - jpeg_code::SOF0
                    ),
                );
            }

            jpeg_code::JPG | jpeg_code::DAC => {
                return err_exit_code(
                    ExitCode::UnsupportedOperation,
                    format!("marker FF {0:X} is not supported", btype),
                );
            }

            jpeg_code::APP0..=jpeg_code::APP15 | jpeg_code::COM => {
                self.add_metadata(btype, payload_offset, segment_data, enabled_features);
            }

            _ => {
                return err_exit_code(
                    ExitCode::MalformedHeader,
                    format!("unknown marker found: FF {0:X}", btype),
                );
            }
        }

        Ok(ParseSegmentResult::Continue)
    }

    fn parse_dht(&mut self, segment: &[u8]) -> Result<()> {
        let mut hpos = 0;

        // build huffman trees
        while hpos < segment.len() {
            let lval = usize::from(lbits(segment[hpos], 4));
            let rval = usize::from(rbits(segment[hpos], 4));
            if lval >= 2 || rval >= 4 {
                return err_exit_code(
                    ExitCode::MalformedHeader,
                    format!("DHT has invalid class {0} or index {1}", lval, rval),
                );
            }

            hpos += 1;

            let (codes, size) = HuffCodes::construct_from_segment(&segment[hpos..]).context()?;
            self.h_trees[lval][rval] = HuffTree::construct_hufftree(&codes).context()?;
            self.ht_set[lval][rval] = true;

            hpos += size;
        }

        Ok(())
    }

    fn parse_dqt(&mut self, segment: &[u8]) -> Result<()> {
        let mut hpos = 0;

        // copy quantization tables to internal memory
        while hpos < segment.len() {
            let lval = usize::from(lbits(segment[hpos], 4));
            let rval = usize::from(rbits(segment[hpos], 4));
            if lval >= 2 || rval >= 4 {
                return err_exit_code(ExitCode::MalformedHeader, "DQT has invalid index");
            }

            hpos += 1;

            let table = &mut self.q_tables[rval];
            if lval == 0 {
                // 8 bit precision
                ensure_space(segment, hpos, 64, ExitCode::MalformedHeader).context()?;
                for i in 0..64 {
                    table.values[i] = u16::from(segment[hpos + i]);
                }
                hpos += 64;
            } else {
                // 16 bit precision
                ensure_space(segment, hpos, 128, ExitCode::MalformedHeader).context()?;
                for i in 0..64 {
                    table.values[i] = b_short(segment[hpos + (2 * i)], segment[hpos + (2 * i) + 1]);
                }
                hpos += 128;
            }

            if table.values.contains(&0) {
                return err_exit_code(ExitCode::MalformedHeader, "DQT has zero value");
            }

            table.defined = true;
        }

        Ok(())
    }

    fn parse_sof(
        &mut self,
        btype: u8,
        segment: &[u8],
        region_decode: bool,
        enabled_features: &EnabledFeatures,
    ) -> Result<()> {
        if self.jpeg_type != JpegType::Unknown {
            return err_exit_code(
                ExitCode::MalformedHeader,
                "image cannot have multiple SOF blocks",
            );
        }

        ensure_space(segment, 0, 6, ExitCode::MalformedFrame).context()?;

        // check data precision, only 8 bit is supported
        let precision = segment[0];
        if precision == 12 {
            return err_exit_code(
                ExitCode::UnsupportedOperation,
                "12 bit data precision is not supported",
            );
        } else if precision != 8 {
            return err_exit_code(
                ExitCode::MalformedFrame,
                format!("{0} bit data precision is invalid", precision),
            );
        }

        // image size, height & component count
        let img_height = u32::from(b_short(segment[1], segment[2]));
        let img_width = u32::from(b_short(segment[3], segment[4]));

        if img_height == 0 {
            return err_exit_code(
                ExitCode::UnsupportedOperation,
                "image height defined by DNL marker is not supported",
            );
        }

        if img_width == 0 {
            return err_exit_code(ExitCode::MalformedFrame, "image width can't be zero");
        }

        if img_height > enabled_features.max_jpeg_height
            || img_width > enabled_features.max_jpeg_width
        {
            return err_exit_code(
                ExitCode::MalformedFrame,
                format!(
                    "image dimensions {0}x{1} larger than {2}x{3}",
                    img_width,
                    img_height,
                    enabled_features.max_jpeg_width,
                    enabled_features.max_jpeg_height
                ),
            );
        }

        let cmpc = usize::from(segment[5]);
        if cmpc == 0 || cmpc > MAX_COMPONENTS {
            return err_exit_code(
                ExitCode::MalformedFrame,
                format!("image has {0} components, 1 to 4 are supported", cmpc),
            );
        }

        if segment.len() != 6 + 3 * cmpc {
            return err_exit_code(ExitCode::MalformedFrame, "size mismatch in sof marker");
        }

        // components contained in image
        let mut hpos = 6;
        for cmp in 0..cmpc {
            let jid = segment[hpos];
            if self.cmp_info[0..cmp].iter().any(|c| c.jid == jid) {
                return err_exit_code(
                    ExitCode::MalformedFrame,
                    format!("duplicate component id {0}", jid),
                );
            }

            let sfh = u32::from(lbits(segment[hpos + 1], 4));
            let sfv = u32::from(rbits(segment[hpos + 1], 4));
            if sfh == 0 || sfh > 4 || sfv == 0 || sfv > 4 {
                return err_exit_code(
                    ExitCode::MalformedFrame,
                    format!("sampling factor {0}x{1} out of range", sfh, sfv),
                );
            }

            let quantization_table_value = segment[hpos + 2];
            if usize::from(quantization_table_value) >= self.q_tables.len() {
                return err_exit_code(
                    ExitCode::MalformedFrame,
                    "quantization table selector too big",
                );
            }

            let c = &mut self.cmp_info[cmp];
            c.jid = jid;
            c.sfh = sfh;
            c.sfv = sfv;
            c.q_table_index = quantization_table_value;

            hpos += 3;
        }

        // set JPEG coding type
        let jpeg_type = match btype {
            jpeg_code::SOF0 => JpegType::Baseline,
            jpeg_code::SOF1 => JpegType::Extended,
            _ => JpegType::Progressive,
        };

        if jpeg_type == JpegType::Progressive {
            if !enabled_features.progressive {
                return err_exit_code(
                    ExitCode::UnsupportedOperation,
                    "file is progressive, but this is disabled",
                );
            }

            if region_decode {
                return err_exit_code(
                    ExitCode::UnsupportedOperation,
                    "region decoding of progressive images is not supported",
                );
            }
        }

        self.jpeg_type = jpeg_type;
        self.precision = precision;
        self.img_width = img_width;
        self.img_height = img_height;
        self.cmpc = cmpc;

        self.finalize_frame();

        info!(
            "frame {0}x{1} {2:?} with {3} components, {4}x{5} mcus",
            self.img_width, self.img_height, self.jpeg_type, self.cmpc, self.mcuh, self.mcuv
        );

        Ok(())
    }

    /// calculates the MCU layout and the block grid of every component
    fn finalize_frame(&mut self) {
        let cmps = &mut self.cmp_info[0..self.cmpc];

        self.hmax = cmps.iter().map(|c| c.sfh).max().unwrap_or(1);
        self.vmax = cmps.iter().map(|c| c.sfv).max().unwrap_or(1);

        self.mcuh = div_ceil(self.img_width, 8 * self.hmax);
        self.mcuv = div_ceil(self.img_height, 8 * self.vmax);
        self.mcuc = self.mcuh * self.mcuv;

        for c in cmps.iter_mut() {
            c.set_geometry(
                self.img_width,
                self.img_height,
                self.hmax,
                self.vmax,
                self.mcuh,
                self.mcuv,
            );
        }
    }

    fn parse_sos(&mut self, segment: &[u8]) -> Result<()> {
        if self.jpeg_type == JpegType::Unknown {
            return err_exit_code(ExitCode::MalformedHeader, "sos marker found before sof");
        }

        // prepare next scan
        ensure_space(segment, 0, 1, ExitCode::MalformedHeader).context()?;

        self.cs_cmpc = usize::from(segment[0]);

        if self.cs_cmpc == 0 {
            return err_exit_code(ExitCode::MalformedHeader, "zero components in scan");
        }

        if self.cs_cmpc > self.cmpc {
            return err_exit_code(
                ExitCode::MalformedHeader,
                format!(
                    "{0} components in scan, only {1} are allowed",
                    self.cs_cmpc, self.cmpc
                ),
            );
        }

        if segment.len() != 1 + 2 * self.cs_cmpc + 3 {
            return err_exit_code(ExitCode::MalformedHeader, "size mismatch in sos marker");
        }

        let mut hpos = 1;
        for i in 0..self.cs_cmpc {
            let cmp = match self.cmp_info[0..self.cmpc]
                .iter()
                .position(|c| c.jid == segment[hpos])
            {
                Some(cmp) => cmp,
                None => {
                    return err_exit_code(
                        ExitCode::MalformedHeader,
                        format!("component id {0} in start-of-scan not in frame", segment[hpos]),
                    );
                }
            };

            if self.cs_cmp[0..i].contains(&cmp) {
                return err_exit_code(
                    ExitCode::MalformedHeader,
                    "component appears twice in start-of-scan",
                );
            }

            self.cs_cmp[i] = cmp;
            self.cmp_info[cmp].huff_dc = lbits(segment[hpos + 1], 4);
            self.cmp_info[cmp].huff_ac = rbits(segment[hpos + 1], 4);

            if self.cmp_info[cmp].huff_dc >= 4 || self.cmp_info[cmp].huff_ac >= 4 {
                return err_exit_code(ExitCode::MalformedHeader, "huffman table number mismatch");
            }

            hpos += 2;
        }

        self.cs_from = segment[hpos];
        self.cs_to = segment[hpos + 1];
        self.cs_sah = lbits(segment[hpos + 2], 4);
        self.cs_sal = rbits(segment[hpos + 2], 4);

        self.verify_scan_parameters().context()?;
        self.verify_huffman_table(
            self.cs_from == 0 && self.cs_sah == 0,
            self.cs_to > 0,
        )
        .context()?;

        for &cmp in &self.cs_cmp[0..self.cs_cmpc] {
            if !self.get_q_table(cmp).defined {
                return err_exit_code(
                    ExitCode::MalformedFrame,
                    format!(
                        "quantization table {0} used by component {1} is not defined",
                        self.cmp_info[cmp].q_table_index, cmp
                    ),
                );
            }
        }

        if self.is_interleaved() {
            let blocks: u32 = self.cs_cmp[0..self.cs_cmpc]
                .iter()
                .map(|&c| self.cmp_info[c].mbs)
                .sum();
            if blocks > 10 {
                return err_exit_code(
                    ExitCode::MalformedHeader,
                    format!("{0} blocks per mcu in scan, max 10 allowed", blocks),
                );
            }
        }

        self.scan_count += 1;

        Ok(())
    }

    fn verify_scan_parameters(&self) -> Result<()> {
        if self.cs_from > self.cs_to || self.cs_to > 63 {
            return err_exit_code(
                ExitCode::MalformedHeader,
                format!(
                    "spectral selection {0} to {1} out of range",
                    self.cs_from, self.cs_to
                ),
            );
        }

        if self.cs_sah > 13 || self.cs_sal > 13 {
            return err_exit_code(
                ExitCode::MalformedHeader,
                "successive approximation parameter out of range",
            );
        }

        if self.jpeg_type.is_sequential() {
            if self.cs_from != 0 || self.cs_to != 63 || self.cs_sah != 0 || self.cs_sal != 0 {
                return err_exit_code(
                    ExitCode::MalformedHeader,
                    "sequential scan must cover all coefficients without approximation",
                );
            }
        } else {
            if self.cs_from == 0 && self.cs_to != 0 {
                return err_exit_code(
                    ExitCode::MalformedHeader,
                    "progressive DC scan cannot contain AC coefficients",
                );
            }

            if self.cs_from > 0 && self.cs_cmpc != 1 {
                return err_exit_code(
                    ExitCode::MalformedHeader,
                    "progressive AC scan cannot be interleaved",
                );
            }

            if self.scan_count == 0 && (self.cs_from != 0 || self.cs_sah != 0) {
                return err_exit_code(
                    ExitCode::MalformedHeader,
                    "progressive image must start with a DC first scan",
                );
            }
        }

        Ok(())
    }

    /// verifies that the huffman tables for the given types are present for the current scan, and if not, return an error
    pub fn verify_huffman_table(&self, dc_present: bool, ac_present: bool) -> Result<()> {
        for icsc in 0..self.cs_cmpc {
            let icmp = self.cs_cmp[icsc];

            if dc_present && !self.ht_set[0][usize::from(self.cmp_info[icmp].huff_dc)] {
                return err_exit_code(
                    ExitCode::MalformedHeader,
                    format!("DC huffman table missing for component {0}", icmp),
                );
            } else if ac_present && !self.ht_set[1][usize::from(self.cmp_info[icmp].huff_ac)] {
                return err_exit_code(
                    ExitCode::MalformedHeader,
                    format!("AC huffman table missing for component {0}", icmp),
                );
            }
        }

        Ok(())
    }

    fn add_metadata(
        &mut self,
        marker: u8,
        offset: u64,
        payload: Vec<u8>,
        enabled_features: &EnabledFeatures,
    ) {
        let kind = classify_segment(marker, &payload);

        match kind {
            MetadataKind::Jfif => {
                self.has_jfif = true;
                if self.resolution.is_none() {
                    self.resolution = parse_jfif_resolution(&payload);
                }
            }
            MetadataKind::Adobe => {
                if self.adobe_transform.is_none() {
                    self.adobe_transform = parse_adobe_transform(&payload);
                }
            }
            MetadataKind::Other if marker != jpeg_code::COM => {
                warn!(
                    "unknown APP{0} segment with {1} bytes",
                    marker - jpeg_code::APP0,
                    payload.len()
                );
            }
            _ => {}
        }

        let length = payload.len() as u32;
        self.metadata.push(MetadataSegment {
            marker,
            kind,
            offset,
            length,
            data: if enabled_features.ignore_metadata {
                Vec::new()
            } else {
                payload
            },
        });
    }

    /// Color space of the frame, decided by the component count, the Adobe
    /// transform flag and the component ids.
    pub fn color_space(&self) -> ColorSpace {
        match self.cmpc {
            1 => ColorSpace::Grayscale,
            3 => match self.adobe_transform {
                Some(0) => ColorSpace::Rgb,
                Some(_) => ColorSpace::YCbCr,
                None => {
                    let ids = [self.cmp_info[0].jid, self.cmp_info[1].jid, self.cmp_info[2].jid];
                    if !self.has_jfif && ids == [b'R', b'G', b'B'] {
                        ColorSpace::Rgb
                    } else {
                        ColorSpace::YCbCr
                    }
                }
            },
            4 => {
                if self.adobe_transform == Some(2) {
                    ColorSpace::Ycck
                } else {
                    ColorSpace::Cmyk
                }
            }
            _ => ColorSpace::Unknown,
        }
    }

    /// Estimates the quality setting of the encoder by comparing the luminance table
    /// with the standard one and inverting the libjpeg scaling curve.
    pub fn estimate_quality(&self) -> Option<u8> {
        if self.cmpc == 0 {
            return None;
        }

        let table = self.get_q_table(0);
        if !table.defined {
            return None;
        }

        if table.values.iter().all(|&v| v == 1) {
            return Some(100);
        }

        let sum: u32 = table.values.iter().map(|&v| u32::from(v)).sum();
        let std_sum: u32 = STD_LUMINANCE_QUANT_ZIGZAG.iter().map(|&v| u32::from(v)).sum();

        let scale = (sum * 100 + std_sum / 2) / std_sum;
        let quality = if scale <= 100 {
            (200 - scale) / 2
        } else {
            5000 / scale
        };

        Some(quality.clamp(1, 100) as u8)
    }

    pub fn frame_info(&self) -> FrameInfo {
        let cmps = &self.cmp_info[0..self.cmpc];
        FrameInfo {
            width: self.img_width,
            height: self.img_height,
            precision: self.precision,
            component_count: self.cmpc as u8,
            bits_per_pixel: self.cmpc as u8 * self.precision,
            coding: self.jpeg_type,
            color_space: self.color_space(),
            restart_interval: self.rsti as u16,
            mcus_per_line: self.mcuh,
            mcus_per_column: self.mcuv,
            sampling: cmps
                .iter()
                .map(|c| (c.sfh as u8, c.sfv as u8))
                .collect(),
            metadata: self.metadata.clone(),
            resolution: self.resolution,
            adobe_transform: self.adobe_transform,
            quality: self.estimate_quality(),
        }
    }
}

/// Reads the SOI marker that every JPEG has to start with
pub fn read_soi<R: Read>(reader: &mut R) -> Result<()> {
    let mut soi = [0u8; 2];
    reader.read_exact(&mut soi).context()?;
    if soi != [0xff, jpeg_code::SOI] {
        return err_exit_code(
            ExitCode::MalformedHeader,
            format!("jpeg must start with FF D8, found {0:02X} {1:02X}", soi[0], soi[1]),
        );
    }
    Ok(())
}

/// reads the next marker code, skipping any 0xff fill bytes
fn read_marker<R: Read>(reader: &mut R) -> Result<u8> {
    let mut b = [0u8; 1];
    reader.read_exact(&mut b).context()?;
    if b[0] != 0xff {
        return err_exit_code(
            ExitCode::MalformedHeader,
            format!("expected marker, found data byte {0:02X}", b[0]),
        );
    }

    loop {
        reader.read_exact(&mut b).context()?;
        if b[0] != 0xff {
            return Ok(b[0]);
        }
    }
}

fn ensure_space(segment: &[u8], hpos: usize, amount: usize, exit_code: ExitCode) -> Result<()> {
    if hpos + amount > segment.len() {
        return err_exit_code(exit_code, "segment too small");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::jpeg::counting_reader::CountingReader;
    use crate::jpeg::test_jpeg::{flat_420_jpeg, JpegBuilder};

    fn parse_all(data: &[u8], features: &EnabledFeatures) -> Result<Box<JpegHeader>> {
        let mut reader = CountingReader::new(Cursor::new(data));
        read_soi(&mut reader)?;
        let mut jh = JpegHeader::default_boxed();
        jh.parse(&mut reader, None, false, features)?;
        Ok(jh)
    }

    #[test]
    fn test_huffman_tree() {
        // three 2 bit codes and one 3 bit code
        let mut segment = vec![0u8, 3, 1];
        segment.resize(16, 0);
        segment.extend_from_slice(&[0x00, 0x04, 0x05, 0x11]);

        let (codes, size) = HuffCodes::construct_from_segment(&segment).unwrap();
        assert_eq!(size, 20);
        assert_eq!((codes.c_val[0x00], codes.c_len[0x00]), (0b00, 2));
        assert_eq!((codes.c_val[0x05], codes.c_len[0x05]), (0b10, 2));
        assert_eq!((codes.c_val[0x11], codes.c_len[0x11]), (0b110, 3));

        let tree = HuffTree::construct_hufftree(&codes).unwrap();
        assert_eq!(tree.peek_code[0b0100_0000], (0x04, 2));
        assert_eq!(tree.peek_code[0b1101_1111], (0x11, 3));
        // 111 is not a code
        assert_eq!(tree.peek_code[0b1110_0000], (0, 0xff));
    }

    #[test]
    fn test_huffman_oversubscribed() {
        // three 1 bit codes can't exist
        let mut segment = vec![3u8];
        segment.resize(16, 0);
        segment.extend_from_slice(&[1, 2, 3]);

        let e = HuffCodes::construct_from_segment(&segment).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedHeader);

        // truncated symbol list
        let mut segment = vec![0u8, 3];
        segment.resize(16, 0);
        segment.extend_from_slice(&[1, 2]);
        let e = HuffCodes::construct_from_segment(&segment).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedHeader);
    }

    #[test]
    fn test_parse_frame() {
        let jh = parse_all(&flat_420_jpeg(), &EnabledFeatures::default()).unwrap();

        assert_eq!(jh.jpeg_type, JpegType::Baseline);
        assert_eq!((jh.img_width, jh.img_height), (16, 16));
        assert_eq!((jh.hmax, jh.vmax), (2, 2));
        assert_eq!((jh.mcuh, jh.mcuv), (1, 1));
        assert_eq!(jh.cs_cmpc, 3);
        assert_eq!(jh.scan_mode(), ScanMode::Baseline);
        assert_eq!(jh.color_space(), ColorSpace::YCbCr);
        assert_eq!(jh.cmp_info[0].bc, 4);
        assert_eq!(jh.cmp_info[1].bc, 1);
    }

    #[test]
    fn test_missing_soi() {
        let e = parse_all(&[0xff, 0xd9], &EnabledFeatures::default()).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedHeader);
    }

    #[test]
    fn test_truncated_header() {
        let e = parse_all(&flat_420_jpeg()[0..40], &EnabledFeatures::default()).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedHeader);
    }

    #[test]
    fn test_frame_errors() {
        let features = EnabledFeatures::default();

        let build = |precision: u8, width: u16, sampling: u8| {
            JpegBuilder::new()
                .dqt(0, &[1; 64])
                .sof(
                    jpeg_code::SOF1,
                    precision,
                    width,
                    8,
                    &[(1, sampling, 0)],
                )
                .eoi()
                .build()
        };

        let e = parse_all(&build(12, 8, 0x11), &features).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::UnsupportedOperation);

        let e = parse_all(&build(9, 8, 0x11), &features).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedFrame);

        let e = parse_all(&build(8, 0, 0x11), &features).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedFrame);

        let e = parse_all(&build(8, 8, 0x51), &features).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedFrame);

        let mut limited = EnabledFeatures::default();
        limited.max_jpeg_width = 4;
        let e = parse_all(&build(8, 8, 0x11), &limited).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedFrame);
    }

    #[test]
    fn test_sof_unsupported_processes() {
        let data = JpegBuilder::new()
            .segment(0xC9, &[8, 0, 8, 0, 8, 1, 1, 0x11, 0])
            .build();
        let e = parse_all(&data, &EnabledFeatures::default()).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::UnsupportedOperation);

        let data = JpegBuilder::new()
            .segment(jpeg_code::SOF3, &[8, 0, 8, 0, 8, 1, 1, 0x11, 0])
            .build();
        let e = parse_all(&data, &EnabledFeatures::default()).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::UnsupportedOperation);
    }

    #[test]
    fn test_sos_errors() {
        let features = EnabledFeatures::default();

        // scan before the frame
        let data = JpegBuilder::new()
            .sos(&[(1, 0x00)], 0, 63, 0, 0)
            .build();
        let e = parse_all(&data, &features).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedHeader);

        let base = || {
            JpegBuilder::new()
                .dqt(0, &[1; 64])
                .sof(jpeg_code::SOF0, 8, 8, 8, &[(1, 0x11, 0)])
                .flat_dc_table(0)
                .eob_ac_table(0)
        };

        // unknown component
        let e = parse_all(&base().sos(&[(7, 0x00)], 0, 63, 0, 0).build(), &features).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedHeader);

        // baseline must cover the whole band
        let e = parse_all(&base().sos(&[(1, 0x00)], 0, 5, 0, 0).build(), &features).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedHeader);

        // missing AC table
        let e = parse_all(&base().sos(&[(1, 0x01)], 0, 63, 0, 0).build(), &features).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedHeader);

        parse_all(&base().sos(&[(1, 0x00)], 0, 63, 0, 0).build(), &features).unwrap();
    }

    #[test]
    fn test_progressive_scan_rules() {
        let features = EnabledFeatures::default();
        let base = || {
            JpegBuilder::new()
                .dqt(0, &[1; 64])
                .sof(jpeg_code::SOF2, 8, 8, 8, &[(1, 0x11, 0), (2, 0x11, 0)])
                .flat_dc_table(0)
                .eob_ac_table(0)
        };

        // first scan has to be DC
        let e = parse_all(&base().sos(&[(1, 0x00)], 1, 5, 0, 0).build(), &features).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedHeader);

        // DC scan can't contain AC
        let e = parse_all(&base().sos(&[(1, 0x00)], 0, 5, 0, 0).build(), &features).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedHeader);

        let jh = parse_all(&base().sos(&[(1, 0x00), (2, 0x00)], 0, 0, 0, 1).build(), &features)
            .unwrap();
        assert_eq!(jh.scan_mode(), ScanMode::DcFirst);

        let mut no_progressive = EnabledFeatures::default();
        no_progressive.progressive = false;
        let e = parse_all(&base().build(), &no_progressive).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::UnsupportedOperation);
    }

    #[test]
    fn test_region_rejects_progressive_at_sof() {
        // nothing after the frame header, the error has to come before running out of data
        let data = JpegBuilder::new()
            .sof(jpeg_code::SOF2, 8, 8, 8, &[(1, 0x11, 0)])
            .build();

        let mut reader = CountingReader::new(Cursor::new(&data));
        read_soi(&mut reader).unwrap();
        let mut jh = JpegHeader::default_boxed();
        let e = jh
            .parse(&mut reader, None, true, &EnabledFeatures::default())
            .unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::UnsupportedOperation);
    }

    #[test]
    fn test_dqt_zero_and_dnl() {
        let features = EnabledFeatures::default();

        let mut table = [1u16; 64];
        table[10] = 0;
        let e = parse_all(&JpegBuilder::new().dqt(0, &table).build(), &features).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedHeader);

        let e = parse_all(
            &JpegBuilder::new()
                .sof(jpeg_code::SOF0, 8, 8, 8, &[(1, 0x11, 0)])
                .segment(jpeg_code::DNL, &[0, 9])
                .build(),
            &features,
        )
        .unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::MalformedHeader);
    }

    #[test]
    fn test_metadata_capture() {
        let jfif = b"JFIF\0\x01\x02\x01\x00\x48\x00\x48\x00\x00".to_vec();
        let data = JpegBuilder::new()
            .segment(jpeg_code::APP0, &jfif)
            .segment(jpeg_code::COM, b"hello")
            .eoi()
            .build();

        let jh = parse_all(&data, &EnabledFeatures::default()).unwrap();
        assert_eq!(jh.metadata.len(), 2);
        assert_eq!(jh.metadata[0].kind, MetadataKind::Jfif);
        // SOI, marker and length come before the payload
        assert_eq!(jh.metadata[0].offset, 6);
        assert_eq!(jh.metadata[0].length, jfif.len() as u32);
        assert_eq!(jh.metadata[1].kind, MetadataKind::Comment);
        assert_eq!(jh.metadata[1].offset, 6 + jfif.len() as u64 + 4);
        assert_eq!(jh.metadata[1].data, b"hello");
        assert_eq!(jh.resolution.map(|r| r.x), Some(72));

        let mut ignore = EnabledFeatures::default();
        ignore.ignore_metadata = true;
        let jh = parse_all(&data, &ignore).unwrap();
        assert!(jh.metadata[1].data.is_empty());
        assert_eq!(jh.metadata[1].length, 5);

        // a JFIF segment overrides the RGB component ids
        let data = JpegBuilder::new()
            .dqt(0, &[1; 64])
            .sof(
                jpeg_code::SOF0,
                8,
                8,
                8,
                &[(b'R', 0x11, 0), (b'G', 0x11, 0), (b'B', 0x11, 0)],
            )
            .eoi()
            .build();
        let mut jh = parse_all(&data, &EnabledFeatures::default()).unwrap();
        assert_eq!(jh.color_space(), ColorSpace::Rgb);
        jh.has_jfif = true;
        assert_eq!(jh.color_space(), ColorSpace::YCbCr);
        jh.adobe_transform = Some(0);
        assert_eq!(jh.color_space(), ColorSpace::Rgb);
    }

    #[test]
    fn test_estimate_quality() {
        let mut jh = JpegHeader::default_boxed();
        jh.cmpc = 1;
        jh.cmp_info[0].q_table_index = 0;
        jh.q_tables[0] = QuantTable {
            values: STD_LUMINANCE_QUANT_ZIGZAG,
            defined: true,
        };
        assert_eq!(jh.estimate_quality(), Some(50));

        // libjpeg quality 75 halves the table
        jh.q_tables[0]
            .values
            .iter_mut()
            .zip(STD_LUMINANCE_QUANT_ZIGZAG.iter())
            .for_each(|(v, s)| *v = ((s * 50 + 50) / 100).max(1));
        assert_eq!(jh.estimate_quality(), Some(75));

        jh.q_tables[0].values = [1; 64];
        assert_eq!(jh.estimate_quality(), Some(100));
    }
}
