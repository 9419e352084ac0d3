use thiserror::Error;

/// I/O errors that can occur when reading from a byte source
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from the underlying file or stream
    #[error("I/O error: {0}")]
    Io(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Io(err.to_string())
    }
}

/// Errors that can occur when parsing TIFF structures.
///
/// At the detection boundary all of these collapse to "not this format";
/// they only surface as typed errors from the lower-level entry points.
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(IoError),

    /// Byte order marker is neither II nor MM
    #[error("Unsupported byte order: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    UnsupportedByteOrder(u16),

    /// Magic number is neither 42 (TIFF) nor 43 (BigTIFF)
    #[error("Unsupported magic: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    UnsupportedMagic(u16),

    /// BigTIFF offset byte size is not 8 or the reserved field is not 0
    #[error("Malformed BigTIFF header: offset size {offset_size} (expected 8), reserved {reserved} (expected 0)")]
    MalformedBigTiffHeader { offset_size: u16, reserved: u16 },

    /// A read ran past the end of the stream
    #[error("Truncated stream: needed {needed} bytes at offset {offset}, size is {size}")]
    TruncatedStream { offset: u64, needed: u64, size: u64 },

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// The IFD chain links back to a directory already visited
    #[error("IFD chain revisits offset {0}")]
    DirectoryCycle(u64),

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },
}

impl From<IoError> for TiffError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::RangeOutOfBounds {
                offset,
                requested,
                size,
            } => TiffError::TruncatedStream {
                offset,
                needed: requested,
                size,
            },
            other => TiffError::Io(other),
        }
    }
}

/// Errors from the page-reading collaborator.
#[derive(Debug, Clone, Error)]
pub enum PageReadError {
    /// Series selector is beyond the file's series table
    #[error("Series {series} out of range: file has {count} series")]
    SeriesOutOfRange { series: usize, count: usize },

    /// Directory index is beyond the selected series' page table
    #[error("Directory {index} out of range for series {series}: series has {count} pages")]
    DirectoryOutOfRange {
        series: usize,
        index: usize,
        count: usize,
    },

    /// The page exists but does not carry the requested tag
    #[error("Tag {tag} not present in directory {index} of series {series}")]
    TagMissing { tag: u16, series: usize, index: usize },

    /// TIFF structure or I/O failure while reading the page
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),
}

/// Errors surfaced by metadata retrieval on an open file.
#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    /// The plane coordinate triplet was never declared for the series
    #[error("No plane declared at Z={z}, C={c}, T={t} in series {series}")]
    KeyNotFound { z: u32, c: u32, t: u32, series: usize },

    /// The page reader could not produce the page or its tag
    #[error("Page read failed: {0}")]
    PageRead(#[from] PageReadError),

    /// Tag or header payload is not valid JSON
    #[error("Invalid JSON in {context}: {message}")]
    InvalidJson { context: String, message: String },

    /// Plane descriptors could not be produced for the series
    #[error("Invalid plane layout: {0}")]
    InvalidPlaneLayout(String),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),
}
