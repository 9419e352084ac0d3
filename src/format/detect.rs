//! Format detection for Micro-Manager microscopy files.
//!
//! Detection is two checks composed:
//!
//! - **Outer container**: is this a TIFF whose first directory declares
//!   standards-based (OME) plane metadata. Pluggable through [`ContainerCheck`].
//! - **Vendor tag**: does any directory in the IFD chain carry the
//!   Micro-Manager metadata tag (51123) with a nonzero value offset.
//!
//! Every parse failure at this boundary means "not this format". The typed
//! reason is logged at `debug` and never returned to the caller.

use tracing::debug;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::tiff::{
    read_bigtiff_preamble, search_tag, ByteCursor, ByteOrder, FormatProfile, Ifd, TiffHeader,
    TiffTag, ValueReader, MICROMANAGER_METADATA_TAG, TIFF_HEADER_SIZE,
};

// =============================================================================
// Container Check
// =============================================================================

/// Predicate deciding whether a byte source is a container with
/// standards-based plane metadata, independent of the vendor tag.
pub trait ContainerCheck {
    fn is_container(&self, reader: &dyn RangeReader) -> bool;
}

impl<F> ContainerCheck for F
where
    F: Fn(&dyn RangeReader) -> bool,
{
    fn is_container(&self, reader: &dyn RangeReader) -> bool {
        self(reader)
    }
}

/// Maximum bytes read from the end of ImageDescription for the marker check.
const MAX_DESCRIPTION_TAIL: usize = 1024;

/// Closing text of an OME-XML document.
const OME_MARKER: &[u8] = b"OME>";

/// OME-TIFF check: the first IFD's ImageDescription ends with an OME-XML
/// closing tag. The XML body itself is not parsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct OmeTiffCheck;

impl OmeTiffCheck {
    fn check(&self, reader: &dyn RangeReader) -> Result<bool, TiffError> {
        let header = TiffHeader::read(reader)?;
        if header.first_ifd_offset == 0 {
            return Ok(false);
        }

        let ifd = Ifd::read(reader, &header, header.first_ifd_offset)?;
        let entry = match ifd.get_entry_by_tag(TiffTag::ImageDescription) {
            Some(e) => e,
            None => return Ok(false),
        };

        let tail = ValueReader::new(reader, &header).read_tail(entry, MAX_DESCRIPTION_TAIL)?;
        Ok(ends_with_ome_marker(&tail))
    }
}

impl ContainerCheck for OmeTiffCheck {
    fn is_container(&self, reader: &dyn RangeReader) -> bool {
        match self.check(reader) {
            Ok(found) => found,
            Err(e) => {
                debug!(file = reader.identifier(), error = %e, "not an OME-TIFF");
                false
            }
        }
    }
}

/// Whether text ends with the OME marker, ignoring trailing NULs and whitespace.
fn ends_with_ome_marker(data: &[u8]) -> bool {
    let end = data
        .iter()
        .rposition(|&b| b != 0 && !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    data[..end].ends_with(OME_MARKER)
}

// =============================================================================
// Vendor Tag Detection
// =============================================================================

/// Walk the IFD chain of `reader` looking for the Micro-Manager metadata tag.
///
/// Opens a fresh cursor, validates the byte order marker, the magic number
/// and (for BigTIFF) the offset-size and reserved fields, then searches every
/// directory in chain order.
///
/// # Errors
/// - `UnsupportedByteOrder` / `UnsupportedMagic` for non-TIFF streams
/// - `MalformedBigTiffHeader` for a BigTIFF preamble other than (8, 0)
/// - `TruncatedStream` / `DirectoryCycle` for a broken chain
pub fn detect_vendor_tag<R: RangeReader>(reader: R) -> Result<bool, TiffError> {
    let mut cursor = ByteCursor::open(reader)?;
    let profile = FormatProfile::from_magic(cursor.read_u16()?)?;
    if matches!(profile, FormatProfile::Big) {
        read_bigtiff_preamble(&mut cursor)?;
    }

    let hit = search_tag(&mut cursor, profile, MICROMANAGER_METADATA_TAG)?;
    Ok(hit.is_some())
}

/// Classify a byte source as vendor-metadata-bearing using a custom outer
/// container check.
pub fn detect_with<R, C>(reader: &R, check: &C) -> bool
where
    R: RangeReader,
    C: ContainerCheck + ?Sized,
{
    if !check.is_container(reader) {
        return false;
    }

    match detect_vendor_tag(reader) {
        Ok(found) => {
            debug!(file = reader.identifier(), found, "vendor tag search finished");
            found
        }
        Err(e) => {
            debug!(file = reader.identifier(), error = %e, "vendor tag search failed");
            false
        }
    }
}

/// Whether `reader` holds a Micro-Manager OME-TIFF.
pub fn is_vendor_format<R: RangeReader>(reader: &R) -> bool {
    detect_with(reader, &OmeTiffCheck)
}

// =============================================================================
// FileFormat
// =============================================================================

/// Coarse classification of a file, as reported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// OME-TIFF with per-plane Micro-Manager metadata
    MicromanagerOmeTiff,

    /// Plain TIFF with per-plane Micro-Manager metadata
    MicromanagerTiff,

    /// OME-TIFF without vendor metadata
    OmeTiff,

    /// Some other TIFF or BigTIFF
    Tiff,

    /// Not a TIFF-family file
    NotTiff,
}

impl FileFormat {
    /// Get a human-readable name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            FileFormat::MicromanagerOmeTiff => "Micro-Manager OME-TIFF",
            FileFormat::MicromanagerTiff => "Micro-Manager TIFF",
            FileFormat::OmeTiff => "OME-TIFF",
            FileFormat::Tiff => "TIFF",
            FileFormat::NotTiff => "not a TIFF",
        }
    }

    /// Whether per-plane Micro-Manager metadata is present.
    pub const fn has_vendor_metadata(&self) -> bool {
        matches!(
            self,
            FileFormat::MicromanagerOmeTiff | FileFormat::MicromanagerTiff
        )
    }
}

/// Classify a byte source without short-circuiting on the OME check.
pub fn detect_format<R: RangeReader>(reader: &R) -> FileFormat {
    let header = match reader.read_exact_at(0, TIFF_HEADER_SIZE.min(reader.size() as usize)) {
        Ok(bytes) => bytes,
        Err(_) => return FileFormat::NotTiff,
    };
    if !is_tiff_header(&header) {
        return FileFormat::NotTiff;
    }

    let ome = OmeTiffCheck.is_container(reader);
    let vendor = detect_vendor_tag(reader).unwrap_or_else(|e| {
        debug!(file = reader.identifier(), error = %e, "vendor tag search failed");
        false
    });

    match (ome, vendor) {
        (true, true) => FileFormat::MicromanagerOmeTiff,
        (false, true) => FileFormat::MicromanagerTiff,
        (true, false) => FileFormat::OmeTiff,
        (false, false) => FileFormat::Tiff,
    }
}

/// Check if bytes represent a valid TIFF header.
///
/// This is a quick check that can be used before attempting full parsing.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }

    let byte_order = match ByteOrder::from_marker([bytes[0], bytes[1]]) {
        Ok(order) => order,
        Err(_) => return false,
    };

    FormatProfile::from_magic(byte_order.read_u16(&bytes[2..4])).is_ok()
}

// =============================================================================
// Tests
// =============================================================================
