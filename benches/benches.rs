use std::{io::Cursor, time::Duration};

use criterion::{criterion_group, criterion_main, Criterion};
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};
use scanline_jpeg::{EnabledFeatures, PixelBuffer, PixelFormat};

/// generates a photo-like test image so the benchmarks don't depend on image files
fn make_jpeg(width: u16, height: u16, progressive: bool, restart_interval: u16) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(usize::from(width) * usize::from(height) * 3);
    for y in 0..u32::from(height) {
        for x in 0..u32::from(width) {
            let ripple = ((x * 7) ^ (y * 13)) & 0x3f;
            rgb.push(((x + ripple) & 0xff) as u8);
            rgb.push(((y + ripple) & 0xff) as u8);
            rgb.push((((x + y) / 4) & 0xff) as u8);
        }
    }

    let mut output = Vec::new();
    let mut encoder = Encoder::new(&mut output, 85);
    encoder.set_sampling_factor(SamplingFactor::R_4_2_0);
    encoder.set_progressive(progressive);
    encoder.set_restart_interval(restart_interval);
    encoder
        .encode(&rgb, width, height, ColorType::Rgb)
        .unwrap();

    output
}

fn end_to_end_benches(c: &mut Criterion) {
    let baseline = make_jpeg(1024, 768, false, 16);
    let progressive = make_jpeg(1024, 768, true, 0);

    let mut single_thread = EnabledFeatures::default();
    single_thread.max_processor_threads = 1;

    c.bench_function("decode baseline", |b| {
        b.iter(|| {
            let mut image = PixelBuffer::new(PixelFormat::Rgb8);
            scanline_jpeg::decode_full(
                &mut Cursor::new(&baseline),
                &mut image,
                &EnabledFeatures::default(),
            )
        })
    });

    c.bench_function("decode baseline single thread", |b| {
        b.iter(|| {
            let mut image = PixelBuffer::new(PixelFormat::Rgb8);
            scanline_jpeg::decode_full(&mut Cursor::new(&baseline), &mut image, &single_thread)
        })
    });

    c.bench_function("decode progressive", |b| {
        b.iter(|| {
            let mut image = PixelBuffer::new(PixelFormat::Rgb8);
            scanline_jpeg::decode_full(
                &mut Cursor::new(&progressive),
                &mut image,
                &EnabledFeatures::default(),
            )
        })
    });

    // restart markers let the decoder skip to the band near the end
    c.bench_function("decode region", |b| {
        b.iter(|| {
            let mut image = PixelBuffer::new(PixelFormat::Rgb8);
            scanline_jpeg::decode_region(
                &mut Cursor::new(&baseline),
                &mut image,
                700,
                32,
                &EnabledFeatures::default(),
            )
        })
    });
}

criterion_group! {
   name = group1;
   config = Criterion::default().warm_up_time(Duration::from_secs(5));
   targets = end_to_end_benches
}

fn micro_benchmarks(c: &mut Criterion) {
    let jpeg = make_jpeg(256, 256, true, 0);

    c.bench_function("identify", |b| {
        b.iter(|| scanline_jpeg::identify(&mut Cursor::new(&jpeg), &EnabledFeatures::default()))
    });

    c.bench_function("decode gray", |b| {
        b.iter(|| {
            let mut image = PixelBuffer::new(PixelFormat::Gray8);
            scanline_jpeg::decode_full(&mut Cursor::new(&jpeg), &mut image, &EnabledFeatures::default())
        })
    });
}

criterion_group!(group2, micro_benchmarks);

criterion_main!(group1, group2);
