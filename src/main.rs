/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{stdin, stdout, Cursor, IsTerminal, Read, Write};
use std::time::Duration;

use log::{info, warn};
use pico_args::Arguments;
use simple_logger::SimpleLogger;

use scanline_jpeg::decode_error::{err_exit_code, AddContext};
use scanline_jpeg::metrics::{CpuTimeMeasure, Metrics};
use scanline_jpeg::{
    decode_with_metrics, get_version_string, identify, DecodeError, EnabledFeatures, ExitCode,
    FrameInfo, PixelBuffer, PixelFormat, Result, UpsamplingFilter,
};

/// Switches are written as `-name:value`, split them into the switch and its value
fn normalize_args(args: impl Iterator<Item = String>) -> Vec<OsString> {
    args.flat_map(|a| match a.split_once(':') {
        Some((name, value)) if a.starts_with('-') => {
            vec![OsString::from(name), OsString::from(value)]
        }
        _ => vec![OsString::from(a)],
    })
    .collect()
}

fn parse_format(s: &str) -> std::result::Result<PixelFormat, String> {
    match s {
        "gray" => Ok(PixelFormat::Gray8),
        "rgb" => Ok(PixelFormat::Rgb8),
        "rgba" => Ok(PixelFormat::Rgba8),
        "cmyk" => Ok(PixelFormat::Cmyk8),
        _ => Err(format!("unknown pixel format {0}", s)),
    }
}

fn parse_region(s: &str) -> std::result::Result<(u32, u32), String> {
    let (offset, length) = s
        .split_once(',')
        .ok_or_else(|| format!("region {0} is not <offset>,<length>", s))?;

    let offset = offset.parse::<u32>().map_err(|e| e.to_string())?;
    let length = length.parse::<u32>().map_err(|e| e.to_string())?;
    Ok((offset, length))
}

fn syntax_error(e: pico_args::Error) -> DecodeError {
    DecodeError::new(ExitCode::SyntaxError, e.to_string())
}

#[cfg(any(target_os = "windows", target_os = "linux"))]
fn set_priority(high: bool) {
    use thread_priority::{set_current_thread_priority, ThreadPriority};

    // used to force to run on p-cores or e-cores, make sure this and
    // any threadpool threads are set to the same priority
    let priority = if high {
        ThreadPriority::Max
    } else {
        ThreadPriority::Min
    };

    if let Err(e) = set_current_thread_priority(priority) {
        warn!("unable to set thread priority: {0:?}", e);
    }

    #[cfg(feature = "use_rayon")]
    if let Err(e) = rayon_core::ThreadPoolBuilder::new()
        .start_handler(move |_| {
            let _ = set_current_thread_priority(priority);
        })
        .build_global()
    {
        warn!("unable to configure thread pool: {0}", e);
    }
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
fn set_priority(_high: bool) {
    warn!("thread priority is not supported on this platform");
}

fn print_info(info: &FrameInfo) {
    println!(
        "{0}x{1} {2:?} {3:?}, {4} components, {5} bits per pixel",
        info.width,
        info.height,
        info.coding,
        info.color_space,
        info.component_count,
        info.bits_per_pixel
    );
    println!(
        "mcus {0}x{1}, sampling {2:?}, restart interval {3}",
        info.mcus_per_line, info.mcus_per_column, info.sampling, info.restart_interval
    );

    if let Some(q) = info.quality {
        println!("estimated quality {0}", q);
    }
    if let Some(r) = &info.resolution {
        println!("resolution {0}x{1} {2:?}", r.x, r.y, r.unit);
    }

    for m in &info.metadata {
        println!(
            "FF {0:X} {1:?} at {2}, {3} bytes",
            m.marker, m.kind, m.offset, m.length
        );
    }
}

/// PGM and PPM can carry gray and RGB pixels, everything else is written raw
fn write_image<W: Write>(writer: &mut W, image: &PixelBuffer) -> Result<()> {
    match image.format() {
        PixelFormat::Gray8 => {
            write!(writer, "P5\n{0} {1}\n255\n", image.width(), image.height()).context()?
        }
        PixelFormat::Rgb8 => {
            write!(writer, "P6\n{0} {1}\n255\n", image.width(), image.height()).context()?
        }
        PixelFormat::Rgba8 | PixelFormat::Cmyk8 => {}
    }

    writer.write_all(image.data()).context()?;
    Ok(())
}

// wrap main so that errors get printed nicely without a panic
fn main_with_result() -> Result<()> {
    let mut args = Arguments::from_vec(normalize_args(std::env::args().skip(1)));

    // only output the log if we are connected to a console (otherwise if there is redirection we would corrupt the file)
    if stdout().is_terminal() {
        let _ = SimpleLogger::new().init();
    }

    if args.contains("-version") {
        println!("{0}", get_version_string());
        return Ok(());
    }

    let mut enabled_features = EnabledFeatures::default();

    let identify_only = args.contains("-identify");
    let overwrite = args.contains("-overwrite");

    if args.contains("-nearest") {
        enabled_features.upsampling = UpsamplingFilter::Nearest;
    }
    if args.contains("-noprogressive") {
        enabled_features.progressive = false;
    }
    if args.contains("-highpriority") {
        set_priority(true);
    } else if args.contains("-lowpriority") {
        set_priority(false);
    }

    if let Some(threads) = args.opt_value_from_str("-threads").map_err(syntax_error)? {
        enabled_features.max_processor_threads = threads;
    }
    if let Some(w) = args.opt_value_from_str("-max-width").map_err(syntax_error)? {
        enabled_features.max_jpeg_width = w;
    }
    if let Some(h) = args.opt_value_from_str("-max-height").map_err(syntax_error)? {
        enabled_features.max_jpeg_height = h;
    }

    let iterations: u32 = args
        .opt_value_from_str("-iter")
        .map_err(syntax_error)?
        .unwrap_or(1);

    let format = args
        .opt_value_from_fn("-format", parse_format)
        .map_err(syntax_error)?
        .unwrap_or(PixelFormat::Rgb8);

    let region = args
        .opt_value_from_fn("-region", parse_region)
        .map_err(syntax_error)?;

    let filenames: Vec<String> = args
        .finish()
        .into_iter()
        .map(|s| s.to_string_lossy().into_owned())
        .collect();

    if let Some(unknown) = filenames.iter().find(|f| f.starts_with('-')) {
        return err_exit_code(
            ExitCode::SyntaxError,
            format!("unknown switch {0}", unknown),
        );
    }

    let mut input_data = Vec::new();
    if filenames.is_empty() {
        if stdin().is_terminal() {
            return err_exit_code(
                ExitCode::SyntaxError,
                "source filename is needed or input needs to be redirected",
            );
        }

        stdin().read_to_end(&mut input_data).context()?;
    } else {
        let mut file_in = match File::open(&filenames[0]) {
            Ok(f) => f,
            Err(e) => {
                return err_exit_code(ExitCode::FileNotFound, e.to_string());
            }
        };

        file_in.read_to_end(&mut input_data).context()?;
    }

    if identify_only {
        let info = identify(&mut Cursor::new(&input_data), &enabled_features)?;
        print_info(&info);
        return Ok(());
    }

    let mut image = PixelBuffer::new(format);
    let mut overall_cpu = Duration::ZERO;
    let mut overall_metrics = Metrics::default();

    for _ in 0..iterations.max(1) {
        let thread_cpu = CpuTimeMeasure::new();

        let (info, metrics) = decode_with_metrics(
            &mut Cursor::new(&input_data),
            &mut image,
            region,
            &enabled_features,
        )?;

        let iter_duration = thread_cpu.elapsed();
        info!(
            "decoded {0}x{1} into {2} lines, CPU time consumed:{3}ms",
            info.width,
            info.height,
            image.height(),
            iter_duration.as_millis()
        );

        overall_cpu += iter_duration;
        overall_metrics.merge_from(&metrics);
    }

    if stdout().is_terminal() {
        overall_metrics.print_metrics();
    }

    if iterations > 1 {
        info!(
            "Overall average CPU consumed per iteration {0}ms ",
            overall_cpu.as_millis() / u128::from(iterations)
        );
    }

    if filenames.len() < 2 {
        if stdout().is_terminal() {
            return err_exit_code(
                ExitCode::SyntaxError,
                "destination filename is needed or output needs to be redirected",
            );
        }
        write_image(&mut stdout().lock(), &image)?;
    } else {
        let mut fileout = OpenOptions::new()
            .write(true)
            .create(overwrite)
            .truncate(overwrite)
            .create_new(!overwrite)
            .open(&filenames[1])
            .context()?;

        write_image(&mut fileout, &image)?;
    }

    Ok(())
}

fn main() {
    match main_with_result() {
        Ok(_) => {}
        Err(e) => {
            eprintln!(
                "error code: {0} {1} {2}",
                e.exit_code(),
                e.exit_code().as_integer_error_code(),
                e.message()
            );
            std::process::exit(e.exit_code().as_integer_error_code());
        }
    }
}
