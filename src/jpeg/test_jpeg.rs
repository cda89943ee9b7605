/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Assembles JPEG files with exactly known bitstreams for the unit tests.

use rand::Rng;

use super::jpeg_code;
use crate::helpers::{div_ceil, get_rand_from_seed};

/// builds a JPEG file segment by segment
pub struct JpegBuilder {
    data: Vec<u8>,
}

impl JpegBuilder {
    /// starts with the SOI marker
    pub fn new() -> Self {
        JpegBuilder {
            data: vec![0xff, jpeg_code::SOI],
        }
    }

    pub fn segment(mut self, marker: u8, payload: &[u8]) -> Self {
        let len = (payload.len() + 2) as u16;
        self.data.extend_from_slice(&[0xff, marker]);
        self.data.extend_from_slice(&len.to_be_bytes());
        self.data.extend_from_slice(payload);
        self
    }

    /// quantization table in zigzag order, written with 16 bit precision if needed
    pub fn dqt(self, id: u8, table: &[u16; 64]) -> Self {
        let mut payload = Vec::new();
        if table.iter().all(|&v| v <= 255) {
            payload.push(id);
            payload.extend(table.iter().map(|&v| v as u8));
        } else {
            payload.push(0x10 | id);
            for v in table {
                payload.extend_from_slice(&v.to_be_bytes());
            }
        }
        self.segment(jpeg_code::DQT, &payload)
    }

    /// frame header, components are (id, sampling byte, quantization table)
    pub fn sof(
        self,
        marker: u8,
        precision: u8,
        width: u16,
        height: u16,
        components: &[(u8, u8, u8)],
    ) -> Self {
        let mut payload = vec![precision];
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&width.to_be_bytes());
        payload.push(components.len() as u8);
        for &(id, sampling, q) in components {
            payload.extend_from_slice(&[id, sampling, q]);
        }
        self.segment(marker, &payload)
    }

    pub fn dht(self, class: u8, id: u8, counts: &[u8; 16], symbols: &[u8]) -> Self {
        let mut payload = vec![(class << 4) | id];
        payload.extend_from_slice(counts);
        payload.extend_from_slice(symbols);
        self.segment(jpeg_code::DHT, &payload)
    }

    /// DC table with the 2 bit codes 00 -> 0, 01 -> 4 and 10 -> 5
    pub fn flat_dc_table(self, id: u8) -> Self {
        let mut counts = [0u8; 16];
        counts[1] = 3;
        self.dht(0, id, &counts, &[0, 4, 5])
    }

    /// AC table with the single 1 bit code 0 -> EOB
    pub fn eob_ac_table(self, id: u8) -> Self {
        let mut counts = [0u8; 16];
        counts[0] = 1;
        self.dht(1, id, &counts, &[0])
    }

    /// table that contains every symbol, see `full_table_code`
    pub fn full_table(self, class: u8, id: u8) -> Self {
        let mut counts = [0u8; 16];
        counts[7] = 255;
        counts[8] = 1;
        let symbols: Vec<u8> = (0..=255).collect();
        self.dht(class, id, &counts, &symbols)
    }

    pub fn dri(self, interval: u16) -> Self {
        self.segment(jpeg_code::DRI, &interval.to_be_bytes())
    }

    /// scan header, components are (id, table selectors)
    pub fn sos(self, components: &[(u8, u8)], ss: u8, se: u8, ah: u8, al: u8) -> Self {
        let mut payload = vec![components.len() as u8];
        for &(id, tables) in components {
            payload.extend_from_slice(&[id, tables]);
        }
        payload.extend_from_slice(&[ss, se, (ah << 4) | al]);
        self.segment(jpeg_code::SOS, &payload)
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn eoi(self) -> Self {
        self.raw(&[0xff, jpeg_code::EOI])
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// 16x16 4:2:0 image where every block only has a DC value, so that after decoding
/// all pixels are Y=150, Cb=118, Cr=148.
pub fn flat_420_jpeg() -> Vec<u8> {
    JpegBuilder::new()
        .dqt(0, &[8; 64])
        .sof(
            jpeg_code::SOF0,
            8,
            16,
            16,
            &[(1, 0x22, 0), (2, 0x11, 0), (3, 0x11, 0)],
        )
        .flat_dc_table(0)
        .eob_ac_table(0)
        .sos(&[(1, 0x00), (2, 0x00), (3, 0x00)], 0, 63, 0, 0)
        // Y0 dc +22, Y1-Y3 dc 0, Cb dc -10, Cr dc +20, each followed by EOB
        .raw(&[0xAC, 0x00, 0x2A, 0xA8])
        .eoi()
        .build()
}

/// code for a symbol of the table written by `full_table`
pub fn full_table_code(symbol: u8) -> (u32, u32) {
    if symbol < 255 {
        (u32::from(symbol), 8)
    } else {
        (0b1_1111_1110, 9)
    }
}

/// writes bits MSB first with 0xff stuffing
pub struct EntropyWriter {
    data: Vec<u8>,
    acc: u64,
    nbits: u32,
}

impl EntropyWriter {
    pub fn new() -> Self {
        EntropyWriter {
            data: Vec::new(),
            acc: 0,
            nbits: 0,
        }
    }

    pub fn put(&mut self, bits: u32, len: u32) {
        if len == 0 {
            return;
        }

        self.acc = (self.acc << len) | u64::from(bits & ((1 << len) - 1));
        self.nbits += len;

        while self.nbits >= 8 {
            let b = (self.acc >> (self.nbits - 8)) as u8;
            self.data.push(b);
            if b == 0xff {
                self.data.push(0);
            }
            self.nbits -= 8;
        }

        self.acc &= (1 << self.nbits) - 1;
    }

    /// fills the last byte with 1 bits
    pub fn pad(&mut self) {
        if self.nbits > 0 {
            self.put((1 << (8 - self.nbits)) - 1, 8 - self.nbits);
        }
    }

    pub fn marker(&mut self, marker: u8) {
        self.pad();
        self.data.extend_from_slice(&[0xff, marker]);
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.pad();
        self.data
    }
}

/// magnitude category and the bits that represent the value
fn encode_value(v: i32) -> (u32, u32) {
    let size = 32 - v.unsigned_abs().leading_zeros();
    let bits = if v < 0 { (v - 1) as u32 } else { v as u32 };
    (size, bits & ((1 << size) - 1))
}

/// point transform of AC coefficients, rounds towards zero
fn ac_shift(v: i16, al: u8) -> i32 {
    if v < 0 {
        -((-i32::from(v)) >> al)
    } else {
        i32::from(v) >> al
    }
}

pub struct TestComponent {
    pub id: u8,
    pub sfh: u32,
    pub sfv: u32,
    pub bch: u32,
    pub bcv: u32,
    pub nch: u32,
    pub ncv: u32,
    /// coefficients in zigzag order for the MCU aligned grid
    pub blocks: Vec<[i16; 64]>,
}

/// description of one scan, components are indices into the frame
pub struct TestScan {
    pub components: Vec<usize>,
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
}

impl TestScan {
    pub fn new(components: &[usize], ss: u8, se: u8, ah: u8, al: u8) -> Self {
        TestScan {
            components: components.to_vec(),
            ss,
            se,
            ah,
            al,
        }
    }
}

/// coefficients of a complete image that can be written as baseline or progressive JPEG
pub struct TestImage {
    pub width: u32,
    pub height: u32,
    pub mcuh: u32,
    pub mcuv: u32,
    pub components: Vec<TestComponent>,
}

impl TestImage {
    /// all zero image, sampling is (id, horizontal, vertical)
    pub fn new(width: u32, height: u32, sampling: &[(u8, u32, u32)]) -> Self {
        let hmax = sampling.iter().map(|s| s.1).max().unwrap();
        let vmax = sampling.iter().map(|s| s.2).max().unwrap();
        let mcuh = div_ceil(width, 8 * hmax);
        let mcuv = div_ceil(height, 8 * vmax);

        let components = sampling
            .iter()
            .map(|&(id, sfh, sfv)| TestComponent {
                id,
                sfh,
                sfv,
                bch: mcuh * sfh,
                bcv: mcuv * sfv,
                nch: div_ceil(div_ceil(width * sfh, hmax), 8),
                ncv: div_ceil(div_ceil(height * sfv, vmax), 8),
                blocks: vec![[0; 64]; (mcuh * sfh * mcuv * sfv) as usize],
            })
            .collect();

        TestImage {
            width,
            height,
            mcuh,
            mcuv,
            components,
        }
    }

    /// Image with pseudo random coefficients that get sparser towards the high
    /// frequencies. Blocks that only exist to pad out the MCUs have no AC coefficients
    /// since non interleaved scans never touch them.
    pub fn random(width: u32, height: u32, sampling: &[(u8, u32, u32)], seed: u8) -> Self {
        let mut img = TestImage::new(width, height, sampling);
        let mut rng = get_rand_from_seed([seed; 32]);

        for c in img.components.iter_mut() {
            for y in 0..c.bcv {
                for x in 0..c.bch {
                    let block = &mut c.blocks[(y * c.bch + x) as usize];
                    block[0] = rng.gen_range(-400..400);

                    if x >= c.nch || y >= c.ncv {
                        continue;
                    }

                    for k in 1..64 {
                        let range = 64 / k as i16 + 1;
                        if rng.gen_range(0..k + 2) < 3 {
                            block[k] = rng.gen_range(-range..=range);
                        }
                    }
                }
            }
        }
        img
    }

    /// Writes the complete file. Quantization is all ones and every component uses the
    /// tables that contain every symbol.
    pub fn encode(&self, progressive: bool, scans: &[TestScan], restart_interval: u16) -> Vec<u8> {
        let sof_components: Vec<(u8, u8, u8)> = self
            .components
            .iter()
            .map(|c| (c.id, (c.sfh << 4 | c.sfv) as u8, 0))
            .collect();

        let mut b = JpegBuilder::new()
            .dqt(0, &[1; 64])
            .sof(
                if progressive {
                    jpeg_code::SOF2
                } else {
                    jpeg_code::SOF0
                },
                8,
                self.width as u16,
                self.height as u16,
                &sof_components,
            )
            .full_table(0, 0)
            .full_table(1, 0);

        if restart_interval > 0 {
            b = b.dri(restart_interval);
        }

        for scan in scans {
            let ids: Vec<(u8, u8)> = scan
                .components
                .iter()
                .map(|&c| (self.components[c].id, 0))
                .collect();
            b = b
                .sos(&ids, scan.ss, scan.se, scan.ah, scan.al)
                .raw(&self.encode_scan(progressive, scan, restart_interval));
        }

        b.eoi().build()
    }

    /// the usual baseline scan
    pub fn encode_baseline(&self, restart_interval: u16) -> Vec<u8> {
        let all: Vec<usize> = (0..self.components.len()).collect();
        self.encode(false, &[TestScan::new(&all, 0, 63, 0, 0)], restart_interval)
    }

    /// a progression with spectral selection and successive approximation
    /// in the style of the libjpeg default script
    pub fn encode_progressive(&self, restart_interval: u16) -> Vec<u8> {
        let all: Vec<usize> = (0..self.components.len()).collect();
        let mut scans = vec![
            TestScan::new(&all, 0, 0, 0, 1),
            TestScan::new(&[0], 1, 5, 0, 2),
        ];
        for c in 1..self.components.len() {
            scans.push(TestScan::new(&[c], 1, 63, 0, 1));
        }
        scans.push(TestScan::new(&[0], 6, 63, 0, 2));
        scans.push(TestScan::new(&[0], 1, 63, 2, 1));
        scans.push(TestScan::new(&all, 0, 0, 1, 0));
        for c in 1..self.components.len() {
            scans.push(TestScan::new(&[c], 1, 63, 1, 0));
        }
        scans.push(TestScan::new(&[0], 1, 63, 1, 0));

        self.encode(true, &scans, restart_interval)
    }

    /// list of (component, block index) in the order the scan codes them, split into MCUs
    fn scan_order(&self, scan: &TestScan) -> Vec<Vec<(usize, usize)>> {
        let mut mcus = Vec::new();
        if scan.components.len() == 1 {
            let ci = scan.components[0];
            let c = &self.components[ci];
            for y in 0..c.ncv {
                for x in 0..c.nch {
                    mcus.push(vec![(ci, (y * c.bch + x) as usize)]);
                }
            }
        } else {
            for my in 0..self.mcuv {
                for mx in 0..self.mcuh {
                    let mut mcu = Vec::new();
                    for &ci in &scan.components {
                        let c = &self.components[ci];
                        for v in 0..c.sfv {
                            for h in 0..c.sfh {
                                let y = my * c.sfv + v;
                                let x = mx * c.sfh + h;
                                mcu.push((ci, (y * c.bch + x) as usize));
                            }
                        }
                    }
                    mcus.push(mcu);
                }
            }
        }
        mcus
    }

    fn encode_scan(&self, progressive: bool, scan: &TestScan, restart_interval: u16) -> Vec<u8> {
        let mut enc = ScanEncoder {
            w: EntropyWriter::new(),
            pred: [0; 4],
            eobrun: 0,
            be: Vec::new(),
        };

        let mcus = self.scan_order(scan);
        let mut rst = 0;
        for (i, mcu) in mcus.iter().enumerate() {
            for &(ci, bi) in mcu {
                let block = &self.components[ci].blocks[bi];
                if !progressive {
                    enc.baseline(ci, block);
                } else if scan.ss == 0 && scan.ah == 0 {
                    enc.dc_first(ci, block, scan.al);
                } else if scan.ss == 0 {
                    enc.w.put(((block[0] >> scan.al) & 1) as u32, 1);
                } else if scan.ah == 0 {
                    enc.ac_first(block, scan.ss, scan.se, scan.al);
                } else {
                    enc.ac_refine(block, scan.ss, scan.se, scan.al);
                }
            }

            if restart_interval > 0
                && (i + 1) % usize::from(restart_interval) == 0
                && i + 1 < mcus.len()
            {
                enc.emit_eobrun();
                enc.w.marker(jpeg_code::RST0 + rst);
                rst = (rst + 1) & 7;
                enc.pred = [0; 4];
            }
        }

        enc.emit_eobrun();
        enc.w.finish()
    }
}

struct ScanEncoder {
    w: EntropyWriter,
    pred: [i32; 4],
    eobrun: u32,
    /// correction bits of the blocks in the current EOB run
    be: Vec<u8>,
}

impl ScanEncoder {
    fn symbol(&mut self, s: u8) {
        let (code, len) = full_table_code(s);
        self.w.put(code, len);
    }

    fn value(&mut self, v: i32, run: u8) {
        let (size, bits) = encode_value(v);
        self.symbol((run << 4) | size as u8);
        self.w.put(bits, size);
    }

    fn dc(&mut self, ci: usize, v: i32) {
        let diff = v - self.pred[ci];
        self.pred[ci] = v;
        self.value(diff, 0);
    }

    fn ac_run_length(&mut self, values: &[i32]) {
        let mut run = 0;
        for &v in values {
            if v == 0 {
                run += 1;
                continue;
            }
            while run > 15 {
                self.symbol(0xF0);
                run -= 16;
            }
            self.value(v, run);
            run = 0;
        }
    }

    fn baseline(&mut self, ci: usize, block: &[i16; 64]) {
        self.dc(ci, i32::from(block[0]));

        let ac: Vec<i32> = block[1..].iter().map(|&v| i32::from(v)).collect();
        let last = ac.iter().rposition(|&v| v != 0);
        match last {
            Some(l) => {
                self.ac_run_length(&ac[..=l]);
                if l < 62 {
                    self.symbol(0x00);
                }
            }
            None => self.symbol(0x00),
        }
    }

    fn dc_first(&mut self, ci: usize, block: &[i16; 64], al: u8) {
        self.dc(ci, i32::from(block[0] >> al));
    }

    fn emit_eobrun(&mut self) {
        if self.eobrun > 0 {
            let nbits = 31 - self.eobrun.leading_zeros();
            self.symbol((nbits << 4) as u8);
            self.w.put(self.eobrun - (1 << nbits), nbits);
            self.eobrun = 0;

            for b in std::mem::take(&mut self.be) {
                self.w.put(u32::from(b), 1);
            }
        }
    }

    fn ac_first(&mut self, block: &[i16; 64], ss: u8, se: u8, al: u8) {
        let band: Vec<i32> = (ss..=se).map(|k| ac_shift(block[usize::from(k)], al)).collect();

        match band.iter().rposition(|&v| v != 0) {
            None => {
                self.eobrun += 1;
            }
            Some(l) => {
                self.emit_eobrun();
                self.ac_run_length(&band[..=l]);
                if l + 1 < band.len() {
                    self.eobrun += 1;
                }
            }
        }

        if self.eobrun == 0x7fff {
            self.emit_eobrun();
        }
    }

    fn ac_refine(&mut self, block: &[i16; 64], ss: u8, se: u8, al: u8) {
        let absvalues: Vec<i32> = (ss..=se)
            .map(|k| i32::from(block[usize::from(k)]).abs() >> al)
            .collect();
        let eob = absvalues.iter().rposition(|&v| v == 1);

        let mut run = 0;
        let mut br: Vec<u8> = Vec::new();

        for (i, &temp) in absvalues.iter().enumerate() {
            if temp == 0 {
                run += 1;
                continue;
            }

            while run > 15 && eob.map_or(false, |e| i <= e) {
                self.emit_eobrun();
                self.symbol(0xF0);
                run -= 16;
                for b in br.drain(..) {
                    self.w.put(u32::from(b), 1);
                }
            }

            if temp > 1 {
                // coefficient already had a value, one more bit of it
                br.push((temp & 1) as u8);
                continue;
            }

            self.emit_eobrun();
            self.symbol((run << 4) | 1);
            let positive = block[usize::from(ss) + i] > 0;
            self.w.put(u32::from(positive), 1);
            for b in br.drain(..) {
                self.w.put(u32::from(b), 1);
            }
            run = 0;
        }

        if run > 0 || !br.is_empty() {
            self.eobrun += 1;
            self.be.extend_from_slice(&br);

            if self.eobrun == 0x7fff || self.be.len() > 937 {
                self.emit_eobrun();
            }
        }
    }
}
