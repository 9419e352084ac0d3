//! Micro-Manager file-level header.
//!
//! Micro-Manager writes eight `u32` fields at byte offset 8, in the file's
//! byte order, pointing at file-wide sections:
//!
//! | Offset | Field                                   |
//! |--------|-----------------------------------------|
//! | 8      | index map header / index map offset     |
//! | 16     | display settings header / offset        |
//! | 24     | comments header / offset                |
//! | 32     | summary header / summary length         |
//!
//! The summary JSON starts right after these fields at offset 40. Each
//! section is identified by a fixed header value; a section whose header does
//! not match is treated as absent.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{MetadataError, TiffError};
use crate::io::RangeReader;

use super::tiff::ByteOrder;

const HEADER_FIELDS_OFFSET: u64 = 8;
const SUMMARY_OFFSET: u64 = 40;

const INDEX_MAP_HEADER: u32 = 54773648;
const INDEX_MAP_MAGIC: u32 = 3453623;
const DISPLAY_SETTINGS_HEADER: u32 = 483765892;
const DISPLAY_SETTINGS_MAGIC: u32 = 347834724;
const COMMENTS_HEADER: u32 = 99384722;
const COMMENTS_MAGIC: u32 = 84720485;
const SUMMARY_HEADER: u32 = 2355492;

/// Size of one index map record: five `u32` fields.
const INDEX_MAP_RECORD_SIZE: usize = 20;

/// One record of the Micro-Manager index map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexMapEntry {
    pub channel: u32,
    pub slice: u32,
    pub frame: u32,
    pub position: u32,

    /// Byte offset of the plane's IFD
    pub offset: u32,
}

/// File-wide Micro-Manager metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MicromanagerHeader {
    pub summary: Option<Value>,
    pub index_map: Option<Vec<IndexMapEntry>>,
    pub display_settings: Option<Value>,
    pub comments: Option<Value>,
}

impl MicromanagerHeader {
    /// Read the header sections from a TIFF written by Micro-Manager.
    ///
    /// Files too short to hold the header fields yield an empty header.
    ///
    /// # Errors
    /// - `MetadataError::Tiff` if the byte order marker is invalid or a
    ///   section runs past the end of the file
    /// - `MetadataError::InvalidJson` if a present section is not JSON
    pub fn read<R: RangeReader + ?Sized>(reader: &R) -> Result<Self, MetadataError> {
        if reader.size() < SUMMARY_OFFSET {
            return Ok(Self::default());
        }

        let head = read_at(reader, 0, SUMMARY_OFFSET as usize)?;
        let byte_order = ByteOrder::from_marker([head[0], head[1]])?;
        let fields = &head[HEADER_FIELDS_OFFSET as usize..];
        let field = |i: usize| byte_order.read_u32(&fields[i * 4..i * 4 + 4]);

        let (index_header, index_offset) = (field(0), field(1));
        let (display_header, display_offset) = (field(2), field(3));
        let (comments_header, comments_offset) = (field(4), field(5));
        let (summary_header, summary_length) = (field(6), field(7));

        let mut header = Self::default();

        if summary_header == SUMMARY_HEADER {
            let bytes = read_at(reader, SUMMARY_OFFSET, summary_length as usize)?;
            header.summary = Some(decode_json(&bytes, "summary")?);
        }

        if index_header == INDEX_MAP_HEADER {
            header.index_map = read_index_map(reader, byte_order, index_offset as u64)?;
        }

        if display_header == DISPLAY_SETTINGS_HEADER {
            header.display_settings = read_json_section(
                reader,
                byte_order,
                display_offset as u64,
                DISPLAY_SETTINGS_MAGIC,
                "display settings",
            )?;
        }

        if comments_header == COMMENTS_HEADER {
            header.comments = read_json_section(
                reader,
                byte_order,
                comments_offset as u64,
                COMMENTS_MAGIC,
                "comments",
            )?;
        }

        debug!(
            file = reader.identifier(),
            summary = header.summary.is_some(),
            index_map = header.index_map.as_ref().map(Vec::len),
            display_settings = header.display_settings.is_some(),
            comments = header.comments.is_some(),
            "read Micro-Manager header"
        );

        Ok(header)
    }

    /// Whether any section was found.
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.index_map.is_none()
            && self.display_settings.is_none()
            && self.comments.is_none()
    }
}

fn read_at<R: RangeReader + ?Sized>(
    reader: &R,
    offset: u64,
    len: usize,
) -> Result<Bytes, MetadataError> {
    reader
        .read_exact_at(offset, len)
        .map_err(|e| MetadataError::Tiff(TiffError::from(e)))
}

/// Read the `(magic, count)` pair that opens a section.
fn read_section_prefix<R: RangeReader + ?Sized>(
    reader: &R,
    byte_order: ByteOrder,
    offset: u64,
) -> Result<(u32, u32), MetadataError> {
    let bytes = read_at(reader, offset, 8)?;
    Ok((byte_order.read_u32(&bytes[0..4]), byte_order.read_u32(&bytes[4..8])))
}

fn read_index_map<R: RangeReader + ?Sized>(
    reader: &R,
    byte_order: ByteOrder,
    offset: u64,
) -> Result<Option<Vec<IndexMapEntry>>, MetadataError> {
    let (magic, count) = read_section_prefix(reader, byte_order, offset)?;
    if magic != INDEX_MAP_MAGIC {
        warn!(offset, magic, "index map header present but section magic mismatched");
        return Ok(None);
    }

    let len = (count as usize)
        .checked_mul(INDEX_MAP_RECORD_SIZE)
        .ok_or_else(|| MetadataError::InvalidPlaneLayout(format!("index map count {count}")))?;
    let bytes = read_at(reader, offset + 8, len)?;

    let entries = bytes
        .chunks_exact(INDEX_MAP_RECORD_SIZE)
        .map(|record| {
            let field = |i: usize| byte_order.read_u32(&record[i * 4..i * 4 + 4]);
            IndexMapEntry {
                channel: field(0),
                slice: field(1),
                frame: field(2),
                position: field(3),
                offset: field(4),
            }
        })
        .collect();

    Ok(Some(entries))
}

fn read_json_section<R: RangeReader + ?Sized>(
    reader: &R,
    byte_order: ByteOrder,
    offset: u64,
    expected_magic: u32,
    context: &str,
) -> Result<Option<Value>, MetadataError> {
    let (magic, len) = read_section_prefix(reader, byte_order, offset)?;
    if magic != expected_magic {
        warn!(offset, magic, section = context, "section magic mismatched");
        return Ok(None);
    }

    let bytes = read_at(reader, offset + 8, len as usize)?;
    decode_json(&bytes, context).map(Some)
}

/// Decode a JSON text block, ignoring trailing NUL padding.
pub(crate) fn decode_json(bytes: &[u8], context: &str) -> Result<Value, MetadataError> {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |i| i + 1);
    serde_json::from_slice(&bytes[..end]).map_err(|e| MetadataError::InvalidJson {
        context: context.to_string(),
        message: e.to_string(),
    })
}
