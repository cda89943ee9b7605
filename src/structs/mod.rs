/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Everything after entropy decoding: the inverse DCT, upsampling, color conversion
//! and the decode entry points that drive the whole pipeline.

mod color_converter;
mod idct;
pub mod jpeg_file_reader;
pub mod pixel_buffer;
mod quantization_tables;
mod simple_threadpool;
mod upsampler;
