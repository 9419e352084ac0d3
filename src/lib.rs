//! # micromanager-tiff
//!
//! Detects Micro-Manager OME-TIFF files and reads the per-plane vendor
//! metadata Micro-Manager embeds in private TIFF tag 51123.
//!
//! ## Features
//!
//! - **Chain walking**: one IFD walker for classic TIFF and BigTIFF, both byte orders
//! - **Fail-closed detection**: malformed input is "not this format", never a panic
//! - **Plane lookup**: (Z, C, T) to directory resolution through a per-series index
//! - **Range-based I/O**: works over files or in-memory buffers, with block caching
//!
//! ## Architecture
//!
//! - [`io`] - Byte sources and block caching
//! - [`mod@format`] - TIFF parsing, detection, page access and the Micro-Manager header
//! - [`plane`] - Plane descriptors and the plane index
//! - [`session`] - Open-file session with cached plane indexes
//! - [`config`] - CLI configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use micromanager_tiff::{is_vendor_format, FileRangeReader, MicromanagerFile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = FileRangeReader::open("acquisition_MMStack_Pos0.ome.tif")?;
//! if is_vendor_format(&reader) {
//!     let file = MicromanagerFile::open_with_index_map(reader)?;
//!     let metadata = file.get_page_metadata_json(0, 1, 0, 0)?;
//!     println!("{}", metadata);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod plane;
pub mod session;

// Re-export commonly used types
pub use error::{IoError, MetadataError, PageReadError, TiffError};
pub use format::tiff::{
    directory_offsets, find_tag, search_tag, ByteCursor, ByteOrder, FieldType, FormatProfile,
    Ifd, IfdEntry, TagHit, TiffHeader, TiffTag, ValueReader, MICROMANAGER_METADATA_TAG,
};
pub use format::{
    detect_format, detect_vendor_tag, detect_with, is_tiff_header, is_vendor_format,
    ContainerCheck, FileFormat, IndexMapEntry, MicromanagerHeader, OmeTiffCheck, PageReader,
    SeriesLayout, TiffPageReader,
};
pub use io::{BlockCache, FileRangeReader, MemoryRangeReader, RangeReader};
pub use plane::{PlaneDescriptor, PlaneIndex, PlaneKey, PlaneLayout, PlaneSource, SeriesPlanes};
pub use session::MicromanagerFile;
