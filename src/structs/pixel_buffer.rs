/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::decode_error::{err_exit_code, ExitCode, Result};

/// Layout of the pixels written by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// one byte of luminance per pixel
    Gray8,
    /// red, green, blue
    Rgb8,
    /// red, green, blue and an opaque alpha
    Rgba8,
    /// cyan, magenta, yellow, black as stored by Adobe applications (inverted)
    Cmyk8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 | PixelFormat::Cmyk8 => 4,
        }
    }
}

/// Destination of the decoded pixels.
///
/// The decoder calls `prepare` once it knows the size of the output and then fills
/// the returned buffer with `height` rows of `width` pixels, without padding.
pub trait PixelSink {
    /// format the pixels should be delivered in
    fn pixel_format(&self) -> PixelFormat;

    /// returns a buffer of exactly width * height * bytes_per_pixel bytes
    fn prepare(&mut self, width: u32, height: u32) -> Result<&mut [u8]>;
}

/// Owned pixel buffer
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    format: PixelFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(format: PixelFormat) -> Self {
        PixelBuffer {
            format,
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// bytes of one row
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * self.format.bytes_per_pixel();
        &self.data[y as usize * stride..(y as usize + 1) * stride]
    }

    /// bytes of the pixel at the given position
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        &self.row(y)[x as usize * bpp..(x as usize + 1) * bpp]
    }
}

impl PixelSink for PixelBuffer {
    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn prepare(&mut self, width: u32, height: u32) -> Result<&mut [u8]> {
        let size = u64::from(width) * u64::from(height) * self.format.bytes_per_pixel() as u64;
        let size = match usize::try_from(size) {
            Ok(s) => s,
            Err(_) => {
                return err_exit_code(
                    ExitCode::IntegerCastOverflow,
                    format!("output of {0}x{1} pixels is too large", width, height),
                );
            }
        };

        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(size, 0);
        Ok(&mut self.data)
    }
}

#[test]
fn test_prepare() {
    let mut b = PixelBuffer::new(PixelFormat::Rgb8);
    let buf = b.prepare(3, 2).unwrap();
    assert_eq!(buf.len(), 18);
    buf[3 * 4..3 * 5].copy_from_slice(&[1, 2, 3]);

    assert_eq!(b.pixel(1, 1), [1, 2, 3]);
    assert_eq!(b.row(0), [0; 9]);

    // a region without lines is a valid empty buffer
    let mut b = PixelBuffer::new(PixelFormat::Gray8);
    assert!(b.prepare(100, 0).unwrap().is_empty());
    assert_eq!((b.width(), b.height()), (100, 0));
}
