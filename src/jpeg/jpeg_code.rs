/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

/// Start of Frame (size information), coding process: baseline DCT
pub const SOF0: u8 = 0xC0;

/// Start of Frame (size information), coding process: extended sequential DCT
pub const SOF1: u8 = 0xC1;

/// Start of Frame (size information), coding process: progressive DCT
pub const SOF2: u8 = 0xC2;

/// Start of Frame, coding process: lossless sequential
pub const SOF3: u8 = 0xC3;

/// Huffman Table
pub const DHT: u8 = 0xC4;

/// Reserved for JPEG extensions
pub const JPG: u8 = 0xC8;

/// Define arithmetic coding conditioning
pub const DAC: u8 = 0xCC;

/// Restart 0 segment
pub const RST0: u8 = 0xD0;

/// Restart 7 segment
pub const RST7: u8 = 0xD7;

/// Start of Image
pub const SOI: u8 = 0xD8;

/// End of Image, or End of File
pub const EOI: u8 = 0xD9;

/// Start of Scan
pub const SOS: u8 = 0xDA;

/// Define Quantization Table
pub const DQT: u8 = 0xDB;

/// Define number of lines
pub const DNL: u8 = 0xDC;

/// Define restart interval
pub const DRI: u8 = 0xDD;

/// Application segment 0, used by JFIF
pub const APP0: u8 = 0xE0;

/// Application segment 1, used by EXIF and XMP
pub const APP1: u8 = 0xE1;

/// Application segment 2, used by ICC profiles
pub const APP2: u8 = 0xE2;

/// Application segment 14, used by Adobe
pub const APP14: u8 = 0xEE;

/// Application segment 15
pub const APP15: u8 = 0xEF;

/// Comment
pub const COM: u8 = 0xFE;

/// Temporary private use in arithmetic coding
pub const TEM: u8 = 0x01;

/// true for the eight restart markers
#[inline(always)]
pub const fn is_rst(marker: u8) -> bool {
    marker >= RST0 && marker <= RST7
}
