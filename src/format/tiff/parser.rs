//! TIFF header and structure parsing.
//!
//! This module handles parsing of TIFF and BigTIFF file headers and Image
//! File Directories, which is the foundation for all subsequent parsing
//! operations.
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved (must be 0)
//! Bytes 8-15: Offset to first IFD (8 bytes)
//! ```
//!
//! # IFD Structure
//!
//! ```text
//! Entry count          2 bytes (TIFF) / 8 bytes (BigTIFF)
//! Entries              12 bytes each (TIFF) / 20 bytes each (BigTIFF)
//!   tag                2 bytes
//!   field type         2 bytes
//!   value count        4 / 8 bytes
//!   value or offset    4 / 8 bytes
//! Next IFD offset      4 bytes (TIFF) / 8 bytes (BigTIFF), 0 ends the chain
//! ```

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use serde::Serialize;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::tags::{FieldType, TiffTag};

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
pub const VERSION_TIFF: u16 = 42;

/// Version number for BigTIFF
pub const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
///
/// TIFF files declare their byte order in the first two bytes of the header.
/// All multi-byte values in the file must be read respecting this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Decode the 2-byte order marker at the start of a TIFF stream.
    pub fn from_marker(marker: [u8; 2]) -> Result<Self, TiffError> {
        // Read as little-endian: we're matching literal byte patterns
        match u16::from_le_bytes(marker) {
            BYTE_ORDER_LITTLE_ENDIAN => Ok(ByteOrder::LittleEndian),
            BYTE_ORDER_BIG_ENDIAN => Ok(ByteOrder::BigEndian),
            other => Err(TiffError::UnsupportedByteOrder(other)),
        }
    }

    /// Read a u16 from a byte slice using this byte order.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 2 bytes.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => LittleEndian::read_u16(bytes),
            ByteOrder::BigEndian => BigEndian::read_u16(bytes),
        }
    }

    /// Read a u32 from a byte slice using this byte order.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 4 bytes.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => LittleEndian::read_u32(bytes),
            ByteOrder::BigEndian => BigEndian::read_u32(bytes),
        }
    }

    /// Read a u64 from a byte slice using this byte order.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 8 bytes.
    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => LittleEndian::read_u64(bytes),
            ByteOrder::BigEndian => BigEndian::read_u64(bytes),
        }
    }

    /// Read an offset-width unsigned value (4 or 8 bytes) widened to u64.
    #[inline]
    pub fn read_offset(self, bytes: &[u8], profile: FormatProfile) -> u64 {
        match profile {
            FormatProfile::Classic => self.read_u32(bytes) as u64,
            FormatProfile::Big => self.read_u64(bytes),
        }
    }

    /// The two marker bytes for this byte order.
    pub const fn marker(self) -> &'static [u8; 2] {
        match self {
            ByteOrder::LittleEndian => b"II",
            ByteOrder::BigEndian => b"MM",
        }
    }
}

// =============================================================================
// FormatProfile
// =============================================================================

/// Field widths of a TIFF variant, resolved once from the magic number.
///
/// Every structure walk is parameterized by a profile instead of branching
/// on the variant at each read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormatProfile {
    /// Classic TIFF: 32-bit offsets, 16-bit entry counts
    Classic,
    /// BigTIFF: 64-bit offsets, 64-bit entry counts
    Big,
}

impl FormatProfile {
    /// Resolve the profile from the 2-byte magic number after the order marker.
    pub fn from_magic(magic: u16) -> Result<Self, TiffError> {
        match magic {
            VERSION_TIFF => Ok(FormatProfile::Classic),
            VERSION_BIGTIFF => Ok(FormatProfile::Big),
            other => Err(TiffError::UnsupportedMagic(other)),
        }
    }

    /// The magic number for this profile.
    pub const fn magic(self) -> u16 {
        match self {
            FormatProfile::Classic => VERSION_TIFF,
            FormatProfile::Big => VERSION_BIGTIFF,
        }
    }

    /// Width of a directory offset (first-IFD field and next-IFD field).
    #[inline]
    pub const fn offset_width(self) -> usize {
        match self {
            FormatProfile::Classic => 4,
            FormatProfile::Big => 8,
        }
    }

    /// Width of the entry count field at the start of an IFD.
    #[inline]
    pub const fn count_width(self) -> usize {
        match self {
            FormatProfile::Classic => 2,
            FormatProfile::Big => 8,
        }
    }

    /// Width of one IFD entry record.
    ///
    /// Classic TIFF: 12 bytes (2 tag + 2 type + 4 count + 4 value/offset)
    /// BigTIFF: 20 bytes (2 tag + 2 type + 8 count + 8 value/offset)
    #[inline]
    pub const fn entry_width(self) -> usize {
        match self {
            FormatProfile::Classic => 12,
            FormatProfile::Big => 20,
        }
    }

    /// Width of the value-count and value-or-offset fields of an entry.
    ///
    /// This is also the inline value threshold.
    #[inline]
    pub const fn value_width(self) -> usize {
        self.offset_width()
    }

    /// Total header size for this profile.
    #[inline]
    pub const fn header_size(self) -> usize {
        match self {
            FormatProfile::Classic => TIFF_HEADER_SIZE,
            FormatProfile::Big => BIGTIFF_HEADER_SIZE,
        }
    }

    /// Size of a whole IFD with `entry_count` entries, including the count
    /// and next-offset fields. `None` on overflow.
    pub fn directory_size(self, entry_count: u64) -> Option<u64> {
        entry_count
            .checked_mul(self.entry_width() as u64)?
            .checked_add((self.count_width() + self.offset_width()) as u64)
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
///
/// Contains the essential information needed to begin parsing IFDs:
/// - Byte order for reading all subsequent values
/// - Format profile (affects entry sizes and offset widths)
/// - Location of the first IFD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Classic TIFF or BigTIFF
    pub profile: FormatProfile,

    /// Offset to the first IFD in the file (0 = no directories)
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from raw bytes.
    ///
    /// The input must contain at least 8 bytes for classic TIFF or 16 bytes for BigTIFF.
    ///
    /// # Errors
    /// - `UnsupportedByteOrder` if byte order bytes are not II or MM
    /// - `UnsupportedMagic` if version is not 42 or 43
    /// - `MalformedBigTiffHeader` if the BigTIFF offset size is not 8 or reserved is not 0
    /// - `FileTooSmall` if there aren't enough bytes for the header
    /// - `InvalidIfdOffset` if the first IFD offset is outside the file
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let byte_order = ByteOrder::from_marker([bytes[0], bytes[1]])?;
        let profile = FormatProfile::from_magic(byte_order.read_u16(&bytes[2..4]))?;

        let first_ifd_offset = match profile {
            FormatProfile::Classic => byte_order.read_u32(&bytes[4..8]) as u64,
            FormatProfile::Big => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }

                let offset_size = byte_order.read_u16(&bytes[4..6]);
                let reserved = byte_order.read_u16(&bytes[6..8]);
                if offset_size != 8 || reserved != 0 {
                    return Err(TiffError::MalformedBigTiffHeader {
                        offset_size,
                        reserved,
                    });
                }

                byte_order.read_u64(&bytes[8..16])
            }
        };

        if first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            profile,
            first_ifd_offset,
        })
    }

    /// Read and parse the header from the start of a reader.
    pub fn read<R: RangeReader + ?Sized>(reader: &R) -> Result<Self, TiffError> {
        let size = reader.size();
        let len = (BIGTIFF_HEADER_SIZE as u64).min(size) as usize;
        let bytes = reader.read_exact_at(0, len)?;
        Self::parse(&bytes, size)
    }

    /// Whether this is a BigTIFF file (64-bit offsets)
    #[inline]
    pub const fn is_bigtiff(&self) -> bool {
        matches!(self.profile, FormatProfile::Big)
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// One decoded IFD entry record.
///
/// Only the structural fields are interpreted here; the value is kept as the
/// raw value-or-offset field plus a flag saying whether it is inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    /// Numeric tag ID
    pub tag: u16,

    /// Decoded field type (`None` for unknown types)
    pub field_type: Option<FieldType>,

    /// Raw field type value
    pub field_type_raw: u16,

    /// Number of values
    pub count: u64,

    /// The value-or-offset field decoded as an unsigned offset-width integer
    pub value_offset: u64,

    /// Raw bytes of the value-or-offset field (4 used for TIFF, 8 for BigTIFF)
    pub value_offset_bytes: [u8; 8],

    /// Whether the value is stored inline in the entry
    pub is_inline: bool,
}

impl IfdEntry {
    /// Parse one entry record.
    ///
    /// `bytes` must hold at least `profile.entry_width()` bytes.
    pub fn parse(bytes: &[u8], byte_order: ByteOrder, profile: FormatProfile) -> Self {
        let width = profile.value_width();
        let tag = byte_order.read_u16(&bytes[0..2]);
        let field_type_raw = byte_order.read_u16(&bytes[2..4]);
        let count = byte_order.read_offset(&bytes[4..4 + width], profile);

        let value_start = 4 + width;
        let mut value_offset_bytes = [0u8; 8];
        value_offset_bytes[..width].copy_from_slice(&bytes[value_start..value_start + width]);
        let value_offset = byte_order.read_offset(&value_offset_bytes[..width], profile);

        let field_type = FieldType::from_u16(field_type_raw);
        let is_inline = field_type.is_some_and(|t| t.fits_inline(count, profile));

        IfdEntry {
            tag,
            field_type,
            field_type_raw,
            count,
            value_offset,
            value_offset_bytes,
            is_inline,
        }
    }

    /// Total size of the value in bytes, or `None` for unknown field types
    /// and sizes that overflow.
    pub fn value_byte_size(&self) -> Option<u64> {
        let field_type = self.field_type?;
        (field_type.size_in_bytes() as u64).checked_mul(self.count)
    }

    /// Read a single inline Short or Long value.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(byte_order.read_u16(&self.value_offset_bytes) as u32),
            FieldType::Long => Some(byte_order.read_u32(&self.value_offset_bytes)),
            _ => None,
        }
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    /// File offset the IFD was read from
    pub offset: u64,

    /// Entries in file order
    pub entries: Vec<IfdEntry>,

    /// Offset of the next IFD in the chain (0 = last)
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Parse a whole IFD from bytes starting at its entry count field.
    pub fn parse(bytes: &[u8], offset: u64, header: &TiffHeader) -> Result<Self, TiffError> {
        let profile = header.profile;
        let byte_order = header.byte_order;
        let truncated = |needed: usize| TiffError::TruncatedStream {
            offset,
            needed: needed as u64,
            size: bytes.len() as u64,
        };

        let count_width = profile.count_width();
        if bytes.len() < count_width {
            return Err(truncated(count_width));
        }
        let entry_count = match profile {
            FormatProfile::Classic => byte_order.read_u16(bytes) as u64,
            FormatProfile::Big => byte_order.read_u64(bytes),
        };

        let size = profile
            .directory_size(entry_count)
            .and_then(|s| usize::try_from(s).ok())
            .ok_or(TiffError::InvalidIfdOffset(offset))?;
        if bytes.len() < size {
            return Err(truncated(size));
        }

        let entry_width = profile.entry_width();
        let entries = bytes[count_width..size - profile.offset_width()]
            .chunks_exact(entry_width)
            .map(|chunk| IfdEntry::parse(chunk, byte_order, profile))
            .collect();
        let next_ifd_offset = byte_order.read_offset(&bytes[size - profile.offset_width()..size], profile);

        Ok(Ifd {
            offset,
            entries,
            next_ifd_offset,
        })
    }

    /// Read the IFD at `offset`: first its entry count, then the whole directory.
    pub fn read<R: RangeReader + ?Sized>(
        reader: &R,
        header: &TiffHeader,
        offset: u64,
    ) -> Result<Self, TiffError> {
        let profile = header.profile;
        let count_bytes = reader.read_exact_at(offset, profile.count_width())?;
        let entry_count = match profile {
            FormatProfile::Classic => header.byte_order.read_u16(&count_bytes) as u64,
            FormatProfile::Big => header.byte_order.read_u64(&count_bytes),
        };

        let size = profile
            .directory_size(entry_count)
            .ok_or(TiffError::InvalidIfdOffset(offset))?;
        let size = usize::try_from(size).map_err(|_| TiffError::TruncatedStream {
            offset,
            needed: size,
            size: reader.size(),
        })?;

        let bytes = reader.read_exact_at(offset, size)?;
        Self::parse(&bytes, offset, header)
    }

    /// Find an entry by numeric tag ID.
    pub fn get_entry(&self, tag: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    /// Find an entry by known tag.
    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.get_entry(tag.as_u16())
    }

    /// Image width, when stored inline as Short or Long.
    pub fn image_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(TiffTag::ImageWidth)?
            .inline_u32(byte_order)
    }

    /// Image height, when stored inline as Short or Long.
    pub fn image_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(TiffTag::ImageLength)?
            .inline_u32(byte_order)
    }
}

// =============================================================================
// Tests
// =============================================================================
