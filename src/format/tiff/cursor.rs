//! Seekable, byte-order-aware cursor over a [`RangeReader`].
//!
//! The cursor records the byte order from the stream's 2-byte marker when it
//! is opened, then serves fixed-width reads at its current position. Field
//! widths that depend on the TIFF variant are read through a
//! [`FormatProfile`], so callers never branch on byte order or variant.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, FormatProfile, IfdEntry};

/// A positioned reader over a TIFF-family stream.
///
/// Seeking backward or forward never invalidates bytes already returned.
#[derive(Debug)]
pub struct ByteCursor<R> {
    reader: R,
    byte_order: ByteOrder,
    position: u64,
}

impl<R: RangeReader> ByteCursor<R> {
    /// Open a cursor: read the order marker at offset 0 and leave the cursor
    /// just past it.
    ///
    /// # Errors
    /// - `UnsupportedByteOrder` if the marker is neither `II` nor `MM`
    /// - `TruncatedStream` if the stream is shorter than 2 bytes
    pub fn open(reader: R) -> Result<Self, TiffError> {
        let marker = reader.read_exact_at(0, 2)?;
        let byte_order = ByteOrder::from_marker([marker[0], marker[1]])?;
        Ok(Self {
            reader,
            byte_order,
            position: 2,
        })
    }

    /// Create a cursor with an already known byte order.
    pub fn with_byte_order(reader: R, byte_order: ByteOrder, position: u64) -> Self {
        Self {
            reader,
            byte_order,
            position,
        }
    }

    /// Byte order detected from the stream.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Current absolute position.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move to an absolute offset. Bounds are checked by the next read.
    #[inline]
    pub fn seek(&mut self, offset: u64) {
        self.position = offset;
    }

    /// Size of the underlying stream.
    pub fn len(&self) -> u64 {
        self.reader.size()
    }

    pub fn is_empty(&self) -> bool {
        self.reader.size() == 0
    }

    /// Read `len` bytes at the current position and advance.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, TiffError> {
        let bytes = self.reader.read_exact_at(self.position, len)?;
        self.position += len as u64;
        Ok(bytes)
    }

    pub fn read_u16(&mut self) -> Result<u16, TiffError> {
        let bytes = self.read_bytes(2)?;
        Ok(self.byte_order.read_u16(&bytes))
    }

    pub fn read_u32(&mut self) -> Result<u32, TiffError> {
        let bytes = self.read_bytes(4)?;
        Ok(self.byte_order.read_u32(&bytes))
    }

    pub fn read_u64(&mut self) -> Result<u64, TiffError> {
        let bytes = self.read_bytes(8)?;
        Ok(self.byte_order.read_u64(&bytes))
    }

    /// Read a directory offset: 4 bytes (TIFF) or 8 bytes (BigTIFF).
    pub fn read_offset(&mut self, profile: FormatProfile) -> Result<u64, TiffError> {
        match profile {
            FormatProfile::Classic => self.read_u32().map(u64::from),
            FormatProfile::Big => self.read_u64(),
        }
    }

    /// Read an IFD entry count: 2 bytes (TIFF) or 8 bytes (BigTIFF).
    pub fn read_count(&mut self, profile: FormatProfile) -> Result<u64, TiffError> {
        match profile {
            FormatProfile::Classic => self.read_u16().map(u64::from),
            FormatProfile::Big => self.read_u64(),
        }
    }

    /// Read one fixed-width IFD entry record.
    pub fn read_entry(&mut self, profile: FormatProfile) -> Result<IfdEntry, TiffError> {
        let bytes = self.read_bytes(profile.entry_width())?;
        Ok(IfdEntry::parse(&bytes, self.byte_order, profile))
    }
}
