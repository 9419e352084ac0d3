//! File format parsing for Micro-Manager microscopy files.
//!
//! - [`tiff`]: TIFF/BigTIFF vocabulary, header, directories and the IFD chain walker
//! - [`detect`]: classifies a byte source as a Micro-Manager OME-TIFF or not
//! - [`pages`]: tag access on a page identified by (series, directory index)
//! - [`micromanager`]: the file-level Micro-Manager header sections

pub mod detect;
pub mod micromanager;
pub mod pages;
pub mod tiff;

pub use detect::{
    detect_format, detect_vendor_tag, detect_with, is_tiff_header, is_vendor_format,
    ContainerCheck, FileFormat, OmeTiffCheck,
};
pub use micromanager::{IndexMapEntry, MicromanagerHeader};
pub use pages::{PageReader, SeriesLayout, TiffPageReader};
