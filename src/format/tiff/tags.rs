//! TIFF tag and field type definitions.
//!
//! This module defines the vocabulary for TIFF parsing:
//! - Field types that determine how values are encoded
//! - Tag IDs that identify metadata fields, including the Micro-Manager
//!   private tag that carries per-plane vendor metadata
//!
//! The definitions support both classic TIFF and BigTIFF formats.

use super::parser::FormatProfile;

/// Private tag under which Micro-Manager embeds a JSON metadata block in
/// every image plane.
///
/// This value is the wire-level contract with the Micro-Manager writer and
/// is deliberately not configurable.
pub const MICROMANAGER_METADATA_TAG: u16 = 51123;

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// The size of each type decides whether a value fits inline in an IFD
/// entry and how many bytes an out-of-line value occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,
    /// 8-bit ASCII character, NUL terminated
    Ascii = 2,
    /// Unsigned 16-bit integer
    Short = 3,
    /// Unsigned 32-bit integer
    Long = 4,
    /// Two Longs: numerator, denominator
    Rational = 5,
    /// Signed 8-bit integer
    SByte = 6,
    /// Undefined byte data
    Undefined = 7,
    /// Signed 16-bit integer
    SShort = 8,
    /// Signed 32-bit integer
    SLong = 9,
    /// Two SLongs: numerator, denominator
    SRational = 10,
    /// IEEE single precision float
    Float = 11,
    /// IEEE double precision float
    Double = 12,
    /// 32-bit IFD offset
    Ifd = 13,
    /// Unsigned 64-bit integer (BigTIFF)
    Long8 = 16,
    /// Signed 64-bit integer (BigTIFF)
    SLong8 = 17,
    /// 64-bit IFD offset (BigTIFF)
    Ifd8 = 18,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float | FieldType::Ifd => 4,
            FieldType::Rational
            | FieldType::SRational
            | FieldType::Double
            | FieldType::Long8
            | FieldType::SLong8
            | FieldType::Ifd8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for unknown type values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            6 => Some(FieldType::SByte),
            7 => Some(FieldType::Undefined),
            8 => Some(FieldType::SShort),
            9 => Some(FieldType::SLong),
            10 => Some(FieldType::SRational),
            11 => Some(FieldType::Float),
            12 => Some(FieldType::Double),
            13 => Some(FieldType::Ifd),
            16 => Some(FieldType::Long8),
            17 => Some(FieldType::SLong8),
            18 => Some(FieldType::Ifd8),
            _ => None,
        }
    }

    /// Check if a value with this type and count fits inline in an entry.
    #[inline]
    pub fn fits_inline(self, count: u64, profile: FormatProfile) -> bool {
        (self.size_in_bytes() as u64)
            .checked_mul(count)
            .is_some_and(|total| total <= profile.value_width() as u64)
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs this crate looks at.
///
/// Tags not listed here are still decoded generically; they simply have no
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    /// Image width in pixels
    ImageWidth = 256,

    /// Image height (length) in pixels
    ImageLength = 257,

    /// Bits per sample
    BitsPerSample = 258,

    /// Compression scheme used
    Compression = 259,

    /// Photometric interpretation
    PhotometricInterpretation = 262,

    /// Description string; holds the OME-XML document in OME-TIFF files
    ImageDescription = 270,

    /// Byte offsets of strips
    StripOffsets = 273,

    /// Number of components per pixel
    SamplesPerPixel = 277,

    /// Row count per strip
    RowsPerStrip = 278,

    /// Byte counts of strips
    StripByteCounts = 279,

    /// Pixels per unit in X direction
    XResolution = 282,

    /// Pixels per unit in Y direction
    YResolution = 283,

    /// Unit of resolution (1=none, 2=inch, 3=centimeter)
    ResolutionUnit = 296,

    /// Name of the acquisition software
    Software = 305,

    /// Acquisition date and time
    DateTime = 306,

    /// Micro-Manager per-plane JSON metadata
    MicroManagerMetadata = MICROMANAGER_METADATA_TAG,
}

impl TiffTag {
    /// Create a TiffTag from its numeric value.
    ///
    /// Returns `None` for unrecognized tags. Unknown tags are not an error.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            256 => Some(TiffTag::ImageWidth),
            257 => Some(TiffTag::ImageLength),
            258 => Some(TiffTag::BitsPerSample),
            259 => Some(TiffTag::Compression),
            262 => Some(TiffTag::PhotometricInterpretation),
            270 => Some(TiffTag::ImageDescription),
            273 => Some(TiffTag::StripOffsets),
            277 => Some(TiffTag::SamplesPerPixel),
            278 => Some(TiffTag::RowsPerStrip),
            279 => Some(TiffTag::StripByteCounts),
            282 => Some(TiffTag::XResolution),
            283 => Some(TiffTag::YResolution),
            296 => Some(TiffTag::ResolutionUnit),
            305 => Some(TiffTag::Software),
            306 => Some(TiffTag::DateTime),
            MICROMANAGER_METADATA_TAG => Some(TiffTag::MicroManagerMetadata),
            _ => None,
        }
    }

    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Human-readable tag name.
    pub const fn name(self) -> &'static str {
        match self {
            TiffTag::ImageWidth => "ImageWidth",
            TiffTag::ImageLength => "ImageLength",
            TiffTag::BitsPerSample => "BitsPerSample",
            TiffTag::Compression => "Compression",
            TiffTag::PhotometricInterpretation => "PhotometricInterpretation",
            TiffTag::ImageDescription => "ImageDescription",
            TiffTag::StripOffsets => "StripOffsets",
            TiffTag::SamplesPerPixel => "SamplesPerPixel",
            TiffTag::RowsPerStrip => "RowsPerStrip",
            TiffTag::StripByteCounts => "StripByteCounts",
            TiffTag::XResolution => "XResolution",
            TiffTag::YResolution => "YResolution",
            TiffTag::ResolutionUnit => "ResolutionUnit",
            TiffTag::Software => "Software",
            TiffTag::DateTime => "DateTime",
            TiffTag::MicroManagerMetadata => "MicroManagerMetadata",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
