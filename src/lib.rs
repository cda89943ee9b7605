/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Decoder for baseline, extended and progressive Huffman coded JPEG images.
//!
//! Besides decoding complete images, sequential images can be decoded for a range of
//! scanlines only. In that case only the MCU rows covering the range are kept in
//! memory and restart markers are used to skip over the beginning of the scan.

// Don't allow any unsafe code by default. Since this code has to potentially deal with
// badly/maliciously formatted images, we want this extra level of safety.
#![forbid(unsafe_code)]

mod consts;
mod helpers;
mod jpeg;
mod structs;

pub mod decode_error;
pub mod enabled_features;
pub mod metrics;

pub use consts::JpegType;
pub use decode_error::{DecodeError, ExitCode, Result};
pub use enabled_features::{EnabledFeatures, UpsamplingFilter};
pub use helpers::catch_unwind_result;
pub use jpeg::metadata::{
    ColorSpace, FrameInfo, MetadataKind, MetadataSegment, Resolution, ResolutionUnit,
};
pub use metrics::Metrics;
pub use structs::jpeg_file_reader::{decode_full, decode_region, decode_with_metrics, identify};
pub use structs::pixel_buffer::{PixelBuffer, PixelFormat, PixelSink};

/// git revision the library was built from
pub fn get_git_version() -> &'static str {
    git_version::git_version!(
        args = ["--abbrev=8", "--always", "--dirty=M"],
        fallback = "unknown"
    )
}

/// package version and git revision
pub fn get_version_string() -> String {
    format!("{0}-{1}", env!("CARGO_PKG_VERSION"), get_git_version())
}
