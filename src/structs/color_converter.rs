/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::decode_error::{err_exit_code, ExitCode, Result};
use crate::helpers::clamp_u8;
use crate::jpeg::metadata::ColorSpace;

use super::pixel_buffer::PixelFormat;

// ITU-R BT.601 in 16 bit fixed point
const FIX_1_402: i32 = 91881;
const FIX_0_34414: i32 = 22554;
const FIX_0_71414: i32 = 46802;
const FIX_1_772: i32 = 116130;
const ONE_HALF: i32 = 1 << 15;

const FIX_0_299: i32 = 19595;
const FIX_0_587: i32 = 38470;
const FIX_0_114: i32 = 7471;

#[inline(always)]
fn ycc_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = i32::from(y);
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;

    [
        clamp_u8(y + ((FIX_1_402 * cr + ONE_HALF) >> 16)),
        clamp_u8(y + ((-FIX_0_34414 * cb - FIX_0_71414 * cr + ONE_HALF) >> 16)),
        clamp_u8(y + ((FIX_1_772 * cb + ONE_HALF) >> 16)),
    ]
}

#[inline(always)]
fn rgb_to_luma(rgb: [u8; 3]) -> u8 {
    let v = FIX_0_299 * i32::from(rgb[0])
        + FIX_0_587 * i32::from(rgb[1])
        + FIX_0_114 * i32::from(rgb[2])
        + ONE_HALF;
    clamp_u8(v >> 16)
}

/// product of two samples scaled back to 0..=255, rounded
#[inline(always)]
fn mul_255(a: u8, b: u8) -> u8 {
    ((u32::from(a) * u32::from(b) + 127) / 255) as u8
}

/// Adobe CMYK is stored inverted, so a high value means little ink
#[inline(always)]
fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    [mul_255(c, k), mul_255(m, k), mul_255(y, k)]
}

/// YCbCr gives the inverted CMY values, K is passed through
#[inline(always)]
fn ycck_to_cmyk(y: u8, cb: u8, cr: u8, k: u8) -> [u8; 4] {
    let rgb = ycc_to_rgb(y, cb, cr);
    [255 - rgb[0], 255 - rgb[1], 255 - rgb[2], k]
}

/// Converts full resolution component rows into pixels of the requested format
#[derive(Debug, Clone, Copy)]
pub struct ColorConverter {
    color_space: ColorSpace,
    format: PixelFormat,
}

impl ColorConverter {
    pub fn new(color_space: ColorSpace, format: PixelFormat) -> Result<Self> {
        if color_space == ColorSpace::Unknown {
            return err_exit_code(
                ExitCode::UnsupportedOperation,
                "color space of the image is not supported",
            );
        }

        Ok(ColorConverter {
            color_space,
            format,
        })
    }

    /// true if the output only depends on the first component
    pub fn uses_luma_only(&self) -> bool {
        self.format == PixelFormat::Gray8
            && matches!(self.color_space, ColorSpace::Grayscale | ColorSpace::YCbCr)
    }

    /// the RGB value of pixel `i`
    #[inline(always)]
    fn rgb(&self, c: &[&[u8]], i: usize) -> [u8; 3] {
        match self.color_space {
            ColorSpace::Grayscale => [c[0][i]; 3],
            ColorSpace::YCbCr => ycc_to_rgb(c[0][i], c[1][i], c[2][i]),
            ColorSpace::Rgb => [c[0][i], c[1][i], c[2][i]],
            ColorSpace::Cmyk => cmyk_to_rgb(c[0][i], c[1][i], c[2][i], c[3][i]),
            ColorSpace::Ycck => {
                let cmyk = ycck_to_cmyk(c[0][i], c[1][i], c[2][i], c[3][i]);
                cmyk_to_rgb(cmyk[0], cmyk[1], cmyk[2], cmyk[3])
            }
            ColorSpace::Unknown => [0; 3],
        }
    }

    /// `components` holds one row per component, each `out.len() / bytes_per_pixel` long
    pub fn convert_row(&self, components: &[&[u8]], out: &mut [u8]) {
        let bpp = self.format.bytes_per_pixel();

        match self.format {
            PixelFormat::Gray8 => match self.color_space {
                ColorSpace::Grayscale | ColorSpace::YCbCr => {
                    out.copy_from_slice(&components[0][..out.len()]);
                }
                _ => {
                    for (i, o) in out.iter_mut().enumerate() {
                        *o = rgb_to_luma(self.rgb(components, i));
                    }
                }
            },
            PixelFormat::Rgb8 => {
                for (i, o) in out.chunks_exact_mut(bpp).enumerate() {
                    o.copy_from_slice(&self.rgb(components, i));
                }
            }
            PixelFormat::Rgba8 => {
                for (i, o) in out.chunks_exact_mut(bpp).enumerate() {
                    let rgb = self.rgb(components, i);
                    o[0..3].copy_from_slice(&rgb);
                    o[3] = 255;
                }
            }
            PixelFormat::Cmyk8 => {
                for (i, o) in out.chunks_exact_mut(bpp).enumerate() {
                    let c = components;
                    let cmyk = match self.color_space {
                        ColorSpace::Cmyk => [c[0][i], c[1][i], c[2][i], c[3][i]],
                        ColorSpace::Ycck => ycck_to_cmyk(c[0][i], c[1][i], c[2][i], c[3][i]),
                        // inverted ink, so RGB maps to CMY directly with no black
                        _ => {
                            let rgb = self.rgb(c, i);
                            [rgb[0], rgb[1], rgb[2], 255]
                        }
                    };
                    o.copy_from_slice(&cmyk);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(space: ColorSpace, format: PixelFormat, pixel: &[u8]) -> Vec<u8> {
        let rows: Vec<&[u8]> = pixel.iter().map(std::slice::from_ref).collect();
        let mut out = vec![0; format.bytes_per_pixel()];
        ColorConverter::new(space, format)
            .unwrap()
            .convert_row(&rows, &mut out);
        out
    }

    #[test]
    fn test_ycc() {
        assert_eq!(
            convert(ColorSpace::YCbCr, PixelFormat::Rgb8, &[150, 118, 148]),
            [178, 139, 132]
        );
        assert_eq!(
            convert(ColorSpace::YCbCr, PixelFormat::Rgba8, &[150, 118, 148]),
            [178, 139, 132, 255]
        );
        // neutral chroma is gray
        assert_eq!(
            convert(ColorSpace::YCbCr, PixelFormat::Rgb8, &[77, 128, 128]),
            [77, 77, 77]
        );
        // saturates
        assert_eq!(
            convert(ColorSpace::YCbCr, PixelFormat::Rgb8, &[255, 255, 255]),
            [255, 121, 255]
        );
        assert_eq!(
            convert(ColorSpace::YCbCr, PixelFormat::Gray8, &[150, 118, 148]),
            [150]
        );
    }

    #[test]
    fn test_gray() {
        assert_eq!(
            convert(ColorSpace::Grayscale, PixelFormat::Rgb8, &[42]),
            [42, 42, 42]
        );
        assert_eq!(
            convert(ColorSpace::Grayscale, PixelFormat::Cmyk8, &[42]),
            [42, 42, 42, 255]
        );
        assert_eq!(
            convert(ColorSpace::Rgb, PixelFormat::Gray8, &[255, 255, 255]),
            [255]
        );
        assert_eq!(convert(ColorSpace::Rgb, PixelFormat::Gray8, &[255, 0, 0]), [76]);
    }

    #[test]
    fn test_cmyk() {
        assert_eq!(
            convert(ColorSpace::Cmyk, PixelFormat::Rgb8, &[255, 128, 0, 255]),
            [255, 128, 0]
        );
        assert_eq!(
            convert(ColorSpace::Cmyk, PixelFormat::Rgb8, &[255, 255, 255, 128]),
            [128, 128, 128]
        );
        assert_eq!(
            convert(ColorSpace::Cmyk, PixelFormat::Cmyk8, &[1, 2, 3, 4]),
            [1, 2, 3, 4]
        );

        // YCCK: gray Y of 100 gives CMY of 155
        assert_eq!(
            convert(ColorSpace::Ycck, PixelFormat::Cmyk8, &[100, 128, 128, 200]),
            [155, 155, 155, 200]
        );
        assert_eq!(
            convert(ColorSpace::Ycck, PixelFormat::Rgb8, &[100, 128, 128, 255]),
            [155, 155, 155]
        );
    }

    /// Cmyk8 uses the same inverted convention for every source, so converting it
    /// back to RGB gives the RGB output of the source
    #[test]
    fn test_cmyk8_reads_back_as_rgb() {
        let sources: [(ColorSpace, &[u8]); 4] = [
            (ColorSpace::Grayscale, &[42]),
            (ColorSpace::YCbCr, &[150, 118, 148]),
            (ColorSpace::Rgb, &[10, 200, 99]),
            (ColorSpace::Ycck, &[100, 140, 90, 200]),
        ];

        for (space, pixel) in sources {
            let rgb = convert(space, PixelFormat::Rgb8, pixel);
            let cmyk = convert(space, PixelFormat::Cmyk8, pixel);
            assert_eq!(
                convert(ColorSpace::Cmyk, PixelFormat::Rgb8, &cmyk),
                rgb,
                "{0:?}",
                space
            );
        }
    }

    #[test]
    fn test_unknown_color_space() {
        assert_eq!(
            ColorConverter::new(ColorSpace::Unknown, PixelFormat::Rgb8)
                .unwrap_err()
                .exit_code(),
            ExitCode::UnsupportedOperation
        );
    }
}
