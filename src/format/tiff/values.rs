//! TIFF tag value reading.
//!
//! Values can be stored either inline in the IFD entry (for small values)
//! or at an offset in the file (for larger values like the OME-XML
//! description or the Micro-Manager JSON block).

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from a TIFF file.
///
/// This struct combines a RangeReader with TIFF header information to
/// read values respecting the file's byte order and format.
pub struct ValueReader<'a, R: ?Sized> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader + ?Sized> ValueReader<'a, R> {
    /// Create a new ValueReader.
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Get the byte order from the header.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Read raw bytes for an IFD entry's value.
    ///
    /// For inline values, returns the bytes from the entry.
    /// For offset values, fetches the bytes from the file.
    pub fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ))
        } else {
            let len = self.checked_len(entry.value_offset, size)?;
            Ok(self.reader.read_exact_at(entry.value_offset, len)?)
        }
    }

    /// Read at most the last `max_len` bytes of an entry's value.
    ///
    /// Used for marker checks on long text values where only the tail matters.
    pub fn read_tail(&self, entry: &IfdEntry, max_len: usize) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        let tail = size.min(max_len as u64);

        if entry.is_inline {
            let start = (size - tail) as usize;
            Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[start..size as usize],
            ))
        } else {
            let offset = entry
                .value_offset
                .checked_add(size - tail)
                .ok_or(TiffError::InvalidIfdOffset(entry.value_offset))?;
            let len = self.checked_len(offset, tail)?;
            Ok(self.reader.read_exact_at(offset, len)?)
        }
    }

    /// Read a string value from an entry (ASCII type).
    ///
    /// The string ends at the first NUL; invalid UTF-8 is replaced.
    pub fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if field_type != FieldType::Ascii {
            return Err(TiffError::InvalidTagValue {
                tag: "unknown",
                message: format!("expected Ascii type for string, got {:?}", field_type),
            });
        }

        let bytes = self.read_bytes(entry)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    fn checked_len(&self, offset: u64, size: u64) -> Result<usize, TiffError> {
        usize::try_from(size).map_err(|_| TiffError::TruncatedStream {
            offset,
            needed: size,
            size: self.reader.size(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
