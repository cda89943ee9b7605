//! Module for reading the marker segments and the entropy coded data of a JPEG.
//!
//! The result of this stage is the header with all the tables and the frame geometry,
//! plus one coefficient plane (`BlockBasedImage`) per component. Nothing in here deals
//! with pixels, that happens in the `structs` module once all scans have been read.

mod bit_reader;
mod jpeg_position_state;

pub mod block_based_image;
pub mod component_info;
pub mod counting_reader;
pub mod jpeg_code;
pub mod jpeg_header;
pub mod jpeg_read;
pub mod metadata;
pub mod row_spec;

#[cfg(test)]
pub mod test_jpeg;
