/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::time::Duration;

#[cfg(any(windows, target_os = "linux"))]
use cpu_time::ThreadTime;

/// platform independent threadtime measurement
pub struct CpuTimeMeasure {
    #[cfg(any(windows, target_os = "linux"))]
    start: ThreadTime,
    #[cfg(not(any(windows, target_os = "linux")))]
    start: std::time::Instant,
}

impl CpuTimeMeasure {
    pub fn new() -> Self {
        Self {
            #[cfg(any(windows, target_os = "linux"))]
            start: ThreadTime::now(),
            #[cfg(not(any(windows, target_os = "linux")))]
            start: std::time::Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// The stages of a decode that CPU time is accounted to
#[derive(Debug, PartialEq, Copy, Clone, Hash, Eq)]
pub enum DecodeStage {
    /// marker segments
    Header,
    /// Huffman decoding of the scans
    Entropy,
    /// dequantization and inverse DCT
    Transform,
    /// upsampling and color conversion
    Color,
}

/// Statistics of one decode
#[derive(Default, Debug, Clone)]
pub struct Metrics {
    cpu_time_header: Duration,
    cpu_time_entropy: Duration,
    cpu_time_transform: Duration,
    cpu_time_color: Duration,
    blocks_decoded: u64,
    scans: u32,
}

impl Metrics {
    pub fn record_cpu_time(&mut self, stage: DecodeStage, duration: Duration) {
        let slot = match stage {
            DecodeStage::Header => &mut self.cpu_time_header,
            DecodeStage::Entropy => &mut self.cpu_time_entropy,
            DecodeStage::Transform => &mut self.cpu_time_transform,
            DecodeStage::Color => &mut self.cpu_time_color,
        };
        *slot += duration;
    }

    /// counts a scan and the blocks that were entropy decoded for it
    pub fn record_scan(&mut self, blocks: u64) {
        self.scans += 1;
        self.blocks_decoded += blocks;
    }

    pub fn get_cpu_time(&self, stage: DecodeStage) -> Duration {
        match stage {
            DecodeStage::Header => self.cpu_time_header,
            DecodeStage::Entropy => self.cpu_time_entropy,
            DecodeStage::Transform => self.cpu_time_transform,
            DecodeStage::Color => self.cpu_time_color,
        }
    }

    pub fn get_total_cpu_time(&self) -> Duration {
        self.cpu_time_header + self.cpu_time_entropy + self.cpu_time_transform + self.cpu_time_color
    }

    pub fn get_blocks_decoded(&self) -> u64 {
        self.blocks_decoded
    }

    pub fn get_scans(&self) -> u32 {
        self.scans
    }

    pub fn merge_from(&mut self, source_metrics: &Metrics) {
        self.cpu_time_header += source_metrics.cpu_time_header;
        self.cpu_time_entropy += source_metrics.cpu_time_entropy;
        self.cpu_time_transform += source_metrics.cpu_time_transform;
        self.cpu_time_color += source_metrics.cpu_time_color;
        self.blocks_decoded += source_metrics.blocks_decoded;
        self.scans += source_metrics.scans;
    }

    pub fn print_metrics(&self) {
        for stage in [
            DecodeStage::Header,
            DecodeStage::Entropy,
            DecodeStage::Transform,
            DecodeStage::Color,
        ] {
            println!(
                "{0:10} cpu={1}ms",
                format!("{0:?}", stage),
                self.get_cpu_time(stage).as_millis()
            );
        }

        println!(
            "scans={0} blocks={1} total_cpu={2}ms",
            self.scans,
            self.blocks_decoded,
            self.get_total_cpu_time().as_millis()
        );
    }
}

#[test]
fn test_merge() {
    let mut a = Metrics::default();
    a.record_scan(10);
    a.record_cpu_time(DecodeStage::Entropy, Duration::from_millis(3));

    let mut b = Metrics::default();
    b.record_scan(5);
    b.record_cpu_time(DecodeStage::Entropy, Duration::from_millis(4));
    b.record_cpu_time(DecodeStage::Color, Duration::from_millis(1));

    a.merge_from(&b);
    assert_eq!(a.get_scans(), 2);
    assert_eq!(a.get_blocks_decoded(), 15);
    assert_eq!(a.get_cpu_time(DecodeStage::Entropy), Duration::from_millis(7));
    assert_eq!(a.get_total_cpu_time(), Duration::from_millis(8));
}
