/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use log::warn;

use super::jpeg_code;
use crate::consts::JpegType;
use crate::helpers::b_short;

/// Color space of the component samples as stored in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// single luminance component
    Grayscale,
    /// luminance and two chrominance components (JFIF)
    YCbCr,
    /// three components that are stored as RGB directly
    Rgb,
    /// four components, inverted CMYK as written by Adobe applications
    Cmyk,
    /// four components, YCbCr plus inverted K, Adobe transform 2
    Ycck,
    /// a component layout we don't know how to convert (for example 2 components)
    Unknown,
}

/// What an APPn or COM segment contains, decided by the marker and its identifier string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    /// APP0 "JFIF"
    Jfif,
    /// APP0 "JFXX" thumbnail extension
    Jfxx,
    /// APP1 "Exif"
    Exif,
    /// APP1 XMP packet
    Xmp,
    /// APP2 "ICC_PROFILE" chunk
    Icc,
    /// APP14 "Adobe"
    Adobe,
    /// COM segment
    Comment,
    /// any other application segment
    Other,
}

/// Location and contents of a metadata segment. The payload is only copied if
/// metadata isn't ignored, the byte range is always reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSegment {
    /// the marker code (APP0..APP15 or COM)
    pub marker: u8,
    /// classification of the segment
    pub kind: MetadataKind,
    /// absolute offset of the payload (after the length field) in the stream
    pub offset: u64,
    /// length of the payload in bytes
    pub length: u32,
    /// the payload, empty if metadata was ignored
    pub data: Vec<u8>,
}

/// Unit of the JFIF pixel density
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionUnit {
    /// density only specifies the pixel aspect ratio
    AspectRatio,
    /// dots per inch
    PixelsPerInch,
    /// dots per centimeter
    PixelsPerCentimeter,
}

/// Pixel density from the JFIF header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// horizontal density
    pub x: u16,
    /// vertical density
    pub y: u16,
    /// unit of the density
    pub unit: ResolutionUnit,
}

const JFIF_ID: &[u8] = b"JFIF\0";
const JFXX_ID: &[u8] = b"JFXX\0";
const EXIF_ID: &[u8] = b"Exif\0";
const XMP_ID: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const ICC_ID: &[u8] = b"ICC_PROFILE\0";
const ADOBE_ID: &[u8] = b"Adobe";

pub fn classify_segment(marker: u8, payload: &[u8]) -> MetadataKind {
    match marker {
        jpeg_code::APP0 if payload.starts_with(JFIF_ID) => MetadataKind::Jfif,
        jpeg_code::APP0 if payload.starts_with(JFXX_ID) => MetadataKind::Jfxx,
        jpeg_code::APP1 if payload.starts_with(EXIF_ID) => MetadataKind::Exif,
        jpeg_code::APP1 if payload.starts_with(XMP_ID) => MetadataKind::Xmp,
        jpeg_code::APP2 if payload.starts_with(ICC_ID) => MetadataKind::Icc,
        jpeg_code::APP14 if payload.starts_with(ADOBE_ID) => MetadataKind::Adobe,
        jpeg_code::COM => MetadataKind::Comment,
        _ => MetadataKind::Other,
    }
}

/// parses the density fields of a JFIF APP0 payload
pub fn parse_jfif_resolution(payload: &[u8]) -> Option<Resolution> {
    // identifier(5) version(2) units(1) xdensity(2) ydensity(2)
    if payload.len() < 12 {
        warn!("JFIF segment too short ({0} bytes), ignoring", payload.len());
        return None;
    }

    let unit = match payload[7] {
        0 => ResolutionUnit::AspectRatio,
        1 => ResolutionUnit::PixelsPerInch,
        2 => ResolutionUnit::PixelsPerCentimeter,
        u => {
            warn!("unknown JFIF density unit {0}, assuming aspect ratio", u);
            ResolutionUnit::AspectRatio
        }
    };

    Some(Resolution {
        x: b_short(payload[8], payload[9]),
        y: b_short(payload[10], payload[11]),
        unit,
    })
}

/// returns the color transform flag of an Adobe APP14 payload
pub fn parse_adobe_transform(payload: &[u8]) -> Option<u8> {
    // identifier(5) version(2) flags0(2) flags1(2) transform(1)
    if payload.len() < 12 {
        warn!("Adobe segment too short ({0} bytes), ignoring", payload.len());
        return None;
    }

    Some(payload[11])
}

/// Information about a frame that is available after parsing the headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    /// samples per line
    pub width: u32,
    /// number of lines
    pub height: u32,
    /// sample precision in bits
    pub precision: u8,
    /// number of components in the frame
    pub component_count: u8,
    /// bits per pixel across all components
    pub bits_per_pixel: u8,
    /// coding process
    pub coding: JpegType,
    /// color space of the stored components
    pub color_space: ColorSpace,
    /// restart interval in MCUs, 0 if restart markers are not used
    pub restart_interval: u16,
    /// number of MCUs in one MCU row
    pub mcus_per_line: u32,
    /// number of MCU rows
    pub mcus_per_column: u32,
    /// (horizontal, vertical) sampling factors of each component
    pub sampling: Vec<(u8, u8)>,
    /// the APPn and COM segments in stream order
    pub metadata: Vec<MetadataSegment>,
    /// pixel density from the JFIF header
    pub resolution: Option<Resolution>,
    /// color transform flag from the Adobe APP14 header
    pub adobe_transform: Option<u8>,
    /// estimated encoder quality (1..=100) based on the luminance quantization table
    pub quality: Option<u8>,
}

impl FrameInfo {
    /// true if the stream contains an EXIF segment
    pub fn has_exif(&self) -> bool {
        self.metadata.iter().any(|m| m.kind == MetadataKind::Exif)
    }

    /// the first EXIF segment, if any
    pub fn exif(&self) -> Option<&MetadataSegment> {
        self.metadata.iter().find(|m| m.kind == MetadataKind::Exif)
    }

    /// true if the stream contains at least one ICC profile chunk
    pub fn has_icc_profile(&self) -> bool {
        self.metadata.iter().any(|m| m.kind == MetadataKind::Icc)
    }

    /// Reassembles the ICC profile from its APP2 chunks in sequence order. Returns None
    /// if there are no chunks or their payloads weren't retained.
    pub fn icc_profile(&self) -> Option<Vec<u8>> {
        let header_len = ICC_ID.len() + 2;

        let mut chunks: Vec<(u8, &[u8])> = self
            .metadata
            .iter()
            .filter(|m| m.kind == MetadataKind::Icc && m.data.len() >= header_len)
            .map(|m| (m.data[ICC_ID.len()], &m.data[header_len..]))
            .collect();

        if chunks.is_empty() {
            return None;
        }

        chunks.sort_by_key(|c| c.0);

        let mut profile = Vec::new();
        for (_, data) in chunks {
            profile.extend_from_slice(data);
        }
        Some(profile)
    }
}
