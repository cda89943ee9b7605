/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

/// How chroma planes with a lower sampling factor are brought to full resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsamplingFilter {
    /// replicates every sample
    Nearest,
    /// triangle filter for 2x ratios (libjpeg "fancy upsampling"), replication otherwise
    #[default]
    Triangle,
}

// features that are enabled in the decoder. Turn off to restrict what kind of images are accepted.
#[derive(Debug, Clone)]
pub struct EnabledFeatures {
    /// disables reading of progressive images
    pub progressive: bool,

    /// maximum jpeg width
    pub max_jpeg_width: u32,

    // maxmimum jpeg height
    pub max_jpeg_height: u32,

    /// don't copy the payload of APPn and COM segments, only report where they are
    pub ignore_metadata: bool,

    /// filter used for subsampled components
    pub upsampling: UpsamplingFilter,

    /// maximum number of threads used for the transform and color conversion
    pub max_processor_threads: u32,
}

impl Default for EnabledFeatures {
    fn default() -> Self {
        Self {
            progressive: true,
            max_jpeg_width: 16386,
            max_jpeg_height: 16386,
            ignore_metadata: false,
            upsampling: UpsamplingFilter::Triangle,
            max_processor_threads: 8,
        }
    }
}

impl EnabledFeatures {
    /// parameters that allow everything
    pub fn all() -> Self {
        Self {
            max_jpeg_height: u32::MAX,
            max_jpeg_width: u32::MAX,
            ..Self::default()
        }
    }
}
