/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::BufRead;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use default_boxed::DefaultBoxed;
use log::{info, warn};

use crate::consts::{JpegType, MAX_COMPONENTS};
use crate::decode_error::{err_exit_code, AddContext, ExitCode, Result};
use crate::enabled_features::EnabledFeatures;
use crate::jpeg::block_based_image::BlockBasedImage;
use crate::jpeg::counting_reader::CountingReader;
use crate::jpeg::jpeg_header::{read_soi, JpegHeader, ParseResult};
use crate::jpeg::jpeg_read::read_scan;
use crate::jpeg::metadata::FrameInfo;
use crate::jpeg::row_spec::RowSpec;
use crate::metrics::{CpuTimeMeasure, DecodeStage, Metrics};
use crate::structs::color_converter::ColorConverter;
use crate::structs::idct::dequantize_and_idct;
use crate::structs::pixel_buffer::PixelSink;
use crate::structs::quantization_tables::QuantizationTables;
use crate::structs::simple_threadpool::for_each_band;
use crate::structs::upsampler::{ComponentPlane, Upsampler};

/// output lines converted by a worker in one go
const LINES_PER_BAND: usize = 16;

/// Decodes the complete image into the sink
pub fn decode_full<R: BufRead, S: PixelSink + ?Sized>(
    reader: &mut R,
    sink: &mut S,
    enabled_features: &EnabledFeatures,
) -> Result<FrameInfo> {
    let (info, _) = decode_with_metrics(reader, sink, None, enabled_features)?;
    Ok(info)
}

/// Decodes `scanline_length` lines starting at `scanline_offset` into the sink. The
/// lines are identical to the same lines of a full decode.
///
/// Only sequential images can be decoded partially, progressive images fail with
/// UnsupportedOperation.
pub fn decode_region<R: BufRead, S: PixelSink + ?Sized>(
    reader: &mut R,
    sink: &mut S,
    scanline_offset: u32,
    scanline_length: u32,
    enabled_features: &EnabledFeatures,
) -> Result<FrameInfo> {
    let (info, _) = decode_with_metrics(
        reader,
        sink,
        Some((scanline_offset, scanline_length)),
        enabled_features,
    )?;
    Ok(info)
}

/// Reads the marker segments up to the first scan and describes the image
/// without decoding any of it.
pub fn identify<R: BufRead>(reader: &mut R, enabled_features: &EnabledFeatures) -> Result<FrameInfo> {
    let mut reader = CountingReader::new(reader);
    read_soi(&mut reader).context()?;

    let mut jh = JpegHeader::default_boxed();
    jh.parse(&mut reader, None, false, enabled_features)
        .context()?;

    if jh.jpeg_type == JpegType::Unknown {
        return err_exit_code(ExitCode::MalformedHeader, "no frame header before end of image");
    }

    Ok(jh.frame_info())
}

/// Decodes the whole image or a range of lines and also returns the statistics of
/// the decode.
pub fn decode_with_metrics<R: BufRead, S: PixelSink + ?Sized>(
    reader: &mut R,
    sink: &mut S,
    region: Option<(u32, u32)>,
    enabled_features: &EnabledFeatures,
) -> Result<(FrameInfo, Metrics)> {
    let mut metrics = Metrics::default();
    let mut reader = CountingReader::new(reader);
    let region_decode = region.is_some();

    let cpu = CpuTimeMeasure::new();

    read_soi(&mut reader).context()?;

    let mut jh = JpegHeader::default_boxed();
    let mut result = jh
        .parse(&mut reader, None, region_decode, enabled_features)
        .context()?;

    metrics.record_cpu_time(DecodeStage::Header, cpu.elapsed());

    if jh.jpeg_type == JpegType::Unknown {
        return err_exit_code(ExitCode::MalformedHeader, "no frame header before end of image");
    }

    if result == ParseResult::EndOfImage {
        return err_exit_code(ExitCode::MalformedHeader, "image does not contain any scans");
    }

    check_pixel_support(&jh).context()?;
    let converter = ColorConverter::new(jh.color_space(), sink.pixel_format()).context()?;

    let window = match region {
        Some((offset, length)) => RowSpec::for_region(&jh, offset, length).context()?,
        None => RowSpec::full(&jh),
    };

    if window.is_empty() {
        sink.prepare(jh.img_width, 0).context()?;
        return Ok((jh.frame_info(), metrics));
    }

    let mut image_data: Vec<BlockBasedImage> = jh.cmp_info[0..jh.cmpc]
        .iter()
        .map(|c| BlockBasedImage::new(c, window.start_mcu_row, window.end_mcu_row))
        .collect();

    while result == ParseResult::StartOfScan {
        let cpu = CpuTimeMeasure::new();

        let (marker, blocks) = read_scan(&jh, &mut reader, &mut image_data, &window).context()?;
        metrics.record_scan(blocks);
        metrics.record_cpu_time(DecodeStage::Entropy, cpu.elapsed());

        let cpu = CpuTimeMeasure::new();
        result = match marker {
            Some(m) => jh
                .parse(&mut reader, Some(m), region_decode, enabled_features)
                .context()?,
            None => {
                warn!("image ended without EOI marker");
                ParseResult::EndOfImage
            }
        };
        metrics.record_cpu_time(DecodeStage::Header, cpu.elapsed());
    }

    if !reader.fill_buf().context()?.is_empty() {
        warn!("ignoring data after EOI marker");
    }

    let threads = enabled_features.max_processor_threads.max(1) as usize;

    let planes = run_transform(&jh, &image_data, threads, &mut metrics).context()?;

    // coefficients are no longer needed
    drop(image_data);

    run_color_conversion(
        &jh,
        &planes,
        &converter,
        &window,
        sink,
        enabled_features,
        threads,
        &mut metrics,
    )
    .context()?;

    info!(
        "decoded lines {0}..{1} of {2}x{3} {4:?} image, {5} scans, {6} blocks",
        window.first_line,
        window.first_line + window.line_count,
        jh.img_width,
        jh.img_height,
        jh.jpeg_type,
        metrics.get_scans(),
        metrics.get_blocks_decoded()
    );

    Ok((jh.frame_info(), metrics))
}

/// Rejects frames that can be parsed but not turned into pixels
fn check_pixel_support(jh: &JpegHeader) -> Result<()> {
    for (i, c) in jh.cmp_info[0..jh.cmpc].iter().enumerate() {
        if jh.hmax % c.sfh != 0 || jh.vmax % c.sfv != 0 {
            return err_exit_code(
                ExitCode::UnsupportedOperation,
                format!(
                    "sampling factors {0}x{1} of component {2} are not an integral fraction of {3}x{4}",
                    c.sfh, c.sfv, i, jh.hmax, jh.vmax
                ),
            );
        }
    }
    Ok(())
}

/// accumulates the CPU time of the workers
fn add_time(total: &AtomicU64, cpu: CpuTimeMeasure) {
    let nanos = u64::try_from(cpu.elapsed().as_nanos()).unwrap_or(u64::MAX);
    total.fetch_add(nanos, Ordering::Relaxed);
}

/// dequantizes and transforms the stored blocks of every component into sample planes
fn run_transform(
    jh: &JpegHeader,
    image_data: &[BlockBasedImage],
    threads: usize,
    metrics: &mut Metrics,
) -> Result<Vec<ComponentPlane>> {
    let total = AtomicU64::new(0);
    let mut planes = Vec::with_capacity(jh.cmpc);

    for (cmp, blocks) in image_data.iter().enumerate() {
        let info = &jh.cmp_info[cmp];
        let q_rows = QuantizationTables::new(jh, cmp).get_rows_i32x8();

        let mut plane =
            ComponentPlane::new(info, blocks.get_first_block_row(), blocks.get_block_rows());
        let stride = plane.stride();
        let band_len = plane.block_row_len();
        let nch = info.nch as usize;

        for_each_band(plane.data_mut(), band_len, threads, |block_row, out| {
            let cpu = CpuTimeMeasure::new();

            for (bx, block) in blocks.get_row(block_row as u32)[..nch].iter().enumerate() {
                let samples = dequantize_and_idct(block, &q_rows);
                for (y, src) in samples.chunks_exact(8).enumerate() {
                    let start = y * stride + bx * 8;
                    out[start..start + 8].copy_from_slice(src);
                }
            }

            add_time(&total, cpu);
            Ok(())
        })
        .context()?;

        planes.push(plane);
    }

    metrics.record_cpu_time(
        DecodeStage::Transform,
        Duration::from_nanos(total.into_inner()),
    );

    Ok(planes)
}

/// upsamples the planes and converts them into the lines of the window
#[allow(clippy::too_many_arguments)]
fn run_color_conversion<S: PixelSink + ?Sized>(
    jh: &JpegHeader,
    planes: &[ComponentPlane],
    converter: &ColorConverter,
    window: &RowSpec,
    sink: &mut S,
    enabled_features: &EnabledFeatures,
    threads: usize,
    metrics: &mut Metrics,
) -> Result<()> {
    let width = jh.img_width as usize;
    let line_bytes = width * sink.pixel_format().bytes_per_pixel();
    let first_line = window.first_line;

    let components = if converter.uses_luma_only() {
        1
    } else {
        jh.cmpc
    };

    let upsamplers: Vec<Upsampler> = jh.cmp_info[0..components]
        .iter()
        .map(|c| Upsampler::new(enabled_features.upsampling, jh.hmax / c.sfh, jh.vmax / c.sfv))
        .collect();

    let out = sink.prepare(jh.img_width, window.line_count).context()?;
    if out.len() != line_bytes * window.line_count as usize {
        return err_exit_code(
            ExitCode::SyntaxError,
            "pixel sink returned a buffer of the wrong size",
        );
    }

    let total = AtomicU64::new(0);

    for_each_band(out, line_bytes * LINES_PER_BAND, threads, |band, out_band| {
        let cpu = CpuTimeMeasure::new();

        let mut rows = vec![vec![0u8; width]; components];
        let mut colsum = Vec::new();

        for (i, line) in out_band.chunks_exact_mut(line_bytes).enumerate() {
            let y = first_line + (band * LINES_PER_BAND + i) as u32;

            for (c, row) in rows.iter_mut().enumerate() {
                upsamplers[c].upsample_row(&planes[c], y, row, &mut colsum);
            }

            let mut refs: [&[u8]; MAX_COMPONENTS] = [&[]; MAX_COMPONENTS];
            for (r, row) in refs.iter_mut().zip(rows.iter()) {
                *r = row.as_slice();
            }

            converter.convert_row(&refs[0..components], line);
        }

        add_time(&total, cpu);
        Ok(())
    })
    .context()?;

    metrics.record_cpu_time(DecodeStage::Color, Duration::from_nanos(total.into_inner()));

    Ok(())
}
