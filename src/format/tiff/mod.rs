//! TIFF and BigTIFF structure parsing.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read respecting this order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets and 16-bit entry counts,
//!   BigTIFF uses 64-bit offsets and counts. A [`FormatProfile`] captures the widths once so
//!   every walker is written a single time.
//!
//! - **IFD (Image File Directory)**: Describes one image plane and links to the next
//!   directory. Micro-Manager stores each plane's JSON metadata in a private tag
//!   ([`MICROMANAGER_METADATA_TAG`]) inside that plane's IFD.

mod chain;
mod cursor;
mod parser;
mod tags;
mod values;

pub use chain::{directory_offsets, find_tag, read_bigtiff_preamble, search_tag, TagHit};
pub use cursor::ByteCursor;
pub use parser::{
    ByteOrder, FormatProfile, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE,
    VERSION_BIGTIFF, VERSION_TIFF,
};
pub use tags::{FieldType, TiffTag, MICROMANAGER_METADATA_TAG};
pub use values::ValueReader;
