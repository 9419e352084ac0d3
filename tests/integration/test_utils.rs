//! Test utilities for integration tests.
//!
//! Provides a synthetic TIFF/BigTIFF writer with real directory chains, and a
//! range reader that records every request it serves.

use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use micromanager_tiff::error::IoError;
use micromanager_tiff::io::RangeReader;

// =============================================================================
// Mock Range Reader with Request Tracking
// =============================================================================

/// A range reader that tracks all read requests.
pub struct TrackingMockReader {
    data: Bytes,
    identifier: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(u64, usize)>>>,
}

impl TrackingMockReader {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.into(),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn get_requests(&self) -> Vec<(u64, usize)> {
        self.requests.lock().unwrap().clone()
    }

    /// Largest end offset of any request made so far.
    pub fn furthest_read(&self) -> u64 {
        self.get_requests()
            .iter()
            .map(|&(offset, len)| offset + len as u64)
            .max()
            .unwrap_or(0)
    }
}

impl RangeReader for TrackingMockReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((offset, len));

        let start = offset as usize;
        let end = start.saturating_add(len);
        if end > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// TIFF Builder
// =============================================================================

pub const MM_TAG: u16 = 51123;
pub const IMAGE_DESCRIPTION: u16 = 270;

const ASCII: u16 = 2;
const LONG: u16 = 4;

const INDEX_MAP_HEADER: u32 = 54773648;
const INDEX_MAP_MAGIC: u32 = 3453623;
const COMMENTS_HEADER: u32 = 99384722;
const COMMENTS_MAGIC: u32 = 84720485;
const SUMMARY_HEADER: u32 = 2355492;

/// A minimal OME-XML document.
pub const OME_XML: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
    "<OME xmlns=\"http://www.openmicroscopy.org/Schemas/OME/2016-06\">",
    "<Image ID=\"Image:0\"><Pixels ID=\"Pixels:0\" DimensionOrder=\"XYCZT\" ",
    "SizeX=\"4\" SizeY=\"4\" SizeZ=\"2\" SizeC=\"2\" SizeT=\"1\" Type=\"uint16\"/>",
    "</Image></OME>"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

#[derive(Debug, Clone)]
enum EntryValue {
    /// Raw value-or-offset field
    Raw(u64),

    /// Inline LONG, left-justified in the field
    Long(u32),

    /// Value bytes, inlined when they fit
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
struct TestEntry {
    tag: u16,
    field_type: u16,
    count: u64,
    value: EntryValue,
}

/// One IFD to be written.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: Vec<TestEntry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry with an explicit value-or-offset field.
    pub fn raw(mut self, tag: u16, field_type: u16, count: u64, value_offset: u64) -> Self {
        self.entries.push(TestEntry {
            tag,
            field_type,
            count,
            value: EntryValue::Raw(value_offset),
        });
        self
    }

    /// Single LONG value.
    pub fn long(mut self, tag: u16, value: u32) -> Self {
        self.entries.push(TestEntry {
            tag,
            field_type: LONG,
            count: 1,
            value: EntryValue::Long(value),
        });
        self
    }

    /// NUL-terminated ASCII value.
    pub fn ascii(mut self, tag: u16, text: &str) -> Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.entries.push(TestEntry {
            tag,
            field_type: ASCII,
            count: bytes.len() as u64,
            value: EntryValue::Bytes(bytes),
        });
        self
    }

    pub fn description(self, text: &str) -> Self {
        self.ascii(IMAGE_DESCRIPTION, text)
    }

    pub fn mm_metadata(self, json: &str) -> Self {
        self.ascii(MM_TAG, json)
    }

    /// A plain image directory with width and height.
    pub fn image(width: u32, height: u32) -> Self {
        Self::new().long(256, width).long(257, height)
    }
}

/// Index map record: (channel, slice, frame, position, directory number).
pub type IndexRecord = (u32, u32, u32, u32, usize);

/// Writes a TIFF or BigTIFF file with a correctly linked IFD chain.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    bigtiff: bool,
    directories: Vec<Directory>,
    chain: Option<Vec<usize>>,
    last_next: Option<u64>,
    summary: Option<String>,
    index_map: Option<Vec<IndexRecord>>,
    comments: Option<String>,
}

/// A built file and where its directories landed.
pub struct BuiltTiff {
    pub data: Vec<u8>,

    /// File offset of each directory, in the order they were added
    pub directory_offsets: Vec<u64>,
}

impl TiffBuilder {
    pub fn classic(byte_order: ByteOrderType) -> Self {
        Self::new(byte_order, false)
    }

    pub fn bigtiff(byte_order: ByteOrderType) -> Self {
        Self::new(byte_order, true)
    }

    fn new(byte_order: ByteOrderType, bigtiff: bool) -> Self {
        Self {
            byte_order,
            bigtiff,
            directories: Vec::new(),
            chain: None,
            last_next: None,
            summary: None,
            index_map: None,
            comments: None,
        }
    }

    pub fn directory(mut self, directory: Directory) -> Self {
        self.directories.push(directory);
        self
    }

    /// Link directories in this order instead of the order they were added.
    pub fn chain_order(mut self, order: Vec<usize>) -> Self {
        self.chain = Some(order);
        self
    }

    /// Raw next-IFD value for the last directory of the chain.
    pub fn last_next_offset(mut self, offset: u64) -> Self {
        self.last_next = Some(offset);
        self
    }

    pub fn summary(mut self, json: &str) -> Self {
        self.summary = Some(json.to_string());
        self
    }

    pub fn index_map(mut self, records: Vec<IndexRecord>) -> Self {
        self.index_map = Some(records);
        self
    }

    pub fn comments(mut self, json: &str) -> Self {
        self.comments = Some(json.to_string());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.build_with_offsets().data
    }

    pub fn build_with_offsets(self) -> BuiltTiff {
        let ow = if self.bigtiff { 8 } else { 4 };
        let cw = if self.bigtiff { 8 } else { 2 };
        let has_mm_header =
            self.summary.is_some() || self.index_map.is_some() || self.comments.is_some();
        assert!(
            !(has_mm_header && self.bigtiff),
            "Micro-Manager header fields overlap the BigTIFF header"
        );

        let mut buf = match self.byte_order {
            ByteOrderType::LittleEndian => b"II".to_vec(),
            ByteOrderType::BigEndian => b"MM".to_vec(),
        };
        self.push(&mut buf, if self.bigtiff { 43 } else { 42 }, 2);
        if self.bigtiff {
            self.push(&mut buf, 8, 2);
            self.push(&mut buf, 0, 2);
        }
        let first_ifd_field = buf.len();
        self.push(&mut buf, 0, ow);

        if has_mm_header {
            buf.resize(40, 0);
            if let Some(summary) = &self.summary {
                self.put(&mut buf, 32, SUMMARY_HEADER as u64, 4);
                self.put(&mut buf, 36, summary.len() as u64, 4);
                buf.extend_from_slice(summary.as_bytes());
            }
        }

        let mut offsets = Vec::new();
        let mut next_fields = Vec::new();
        for directory in &self.directories {
            let fields: Vec<Vec<u8>> = directory
                .entries
                .iter()
                .map(|entry| match &entry.value {
                    EntryValue::Raw(value) => self.encode(*value, ow),
                    EntryValue::Long(value) => {
                        let mut field = self.encode(*value as u64, 4);
                        field.resize(ow, 0);
                        field
                    }
                    EntryValue::Bytes(bytes) if bytes.len() <= ow => {
                        let mut field = bytes.clone();
                        field.resize(ow, 0);
                        field
                    }
                    EntryValue::Bytes(bytes) => {
                        align(&mut buf);
                        let at = buf.len() as u64;
                        buf.extend_from_slice(bytes);
                        self.encode(at, ow)
                    }
                })
                .collect();

            align(&mut buf);
            offsets.push(buf.len() as u64);
            self.push(&mut buf, directory.entries.len() as u64, cw);
            for (entry, field) in directory.entries.iter().zip(fields) {
                self.push(&mut buf, entry.tag as u64, 2);
                self.push(&mut buf, entry.field_type as u64, 2);
                self.push(&mut buf, entry.count, ow);
                buf.extend_from_slice(&field);
            }
            next_fields.push(buf.len());
            self.push(&mut buf, 0, ow);
        }

        let chain = self
            .chain
            .clone()
            .unwrap_or_else(|| (0..self.directories.len()).collect());
        let first = chain.first().map_or(0, |&d| offsets[d]);
        self.put(&mut buf, first_ifd_field, first, ow);
        for (i, &d) in chain.iter().enumerate() {
            let next = match chain.get(i + 1) {
                Some(&n) => offsets[n],
                None => self.last_next.unwrap_or(0),
            };
            self.put(&mut buf, next_fields[d], next, ow);
        }

        if let Some(records) = &self.index_map {
            align(&mut buf);
            let at = buf.len();
            self.push(&mut buf, INDEX_MAP_MAGIC as u64, 4);
            self.push(&mut buf, records.len() as u64, 4);
            for &(channel, slice, frame, position, directory) in records {
                for value in [channel, slice, frame, position, offsets[directory] as u32] {
                    self.push(&mut buf, value as u64, 4);
                }
            }
            self.put(&mut buf, 8, INDEX_MAP_HEADER as u64, 4);
            self.put(&mut buf, 12, at as u64, 4);
        }

        if let Some(comments) = &self.comments {
            let at = buf.len();
            self.push(&mut buf, COMMENTS_MAGIC as u64, 4);
            self.push(&mut buf, comments.len() as u64, 4);
            buf.extend_from_slice(comments.as_bytes());
            self.put(&mut buf, 24, COMMENTS_HEADER as u64, 4);
            self.put(&mut buf, 28, at as u64, 4);
        }

        BuiltTiff {
            data: buf,
            directory_offsets: offsets,
        }
    }

    fn encode(&self, value: u64, width: usize) -> Vec<u8> {
        match self.byte_order {
            ByteOrderType::LittleEndian => value.to_le_bytes()[..width].to_vec(),
            ByteOrderType::BigEndian => value.to_be_bytes()[8 - width..].to_vec(),
        }
    }

    fn push(&self, buf: &mut Vec<u8>, value: u64, width: usize) {
        let bytes = self.encode(value, width);
        buf.extend_from_slice(&bytes);
    }

    fn put(&self, buf: &mut [u8], at: usize, value: u64, width: usize) {
        let bytes = self.encode(value, width);
        buf[at..at + width].copy_from_slice(&bytes);
    }
}

fn align(buf: &mut Vec<u8>) {
    if buf.len() % 2 == 1 {
        buf.push(0);
    }
}

/// Per-plane metadata JSON as Micro-Manager writes it.
pub fn plane_json(z: u32, c: u32, t: u32, position: u32) -> String {
    format!(
        r#"{{"SliceIndex":{z},"ChannelIndex":{c},"FrameIndex":{t},"PositionIndex":{position},"Camera":"Sim"}}"#
    )
}

/// A classic little-endian Micro-Manager OME-TIFF with two positions, each
/// holding planes (Z=0..2, C=0..2, T=0) written interleaved by position.
///
/// Directory `i` holds position `i % 2`.
pub fn create_mm_ome_tiff() -> BuiltTiff {
    let mut builder = TiffBuilder::classic(ByteOrderType::LittleEndian)
        .summary(r#"{"Prefix":"acq","Positions":2,"Slices":2,"Channels":2,"Frames":1}"#)
        .comments(r#"{"Summary":"test run"}"#);

    let mut records = Vec::new();
    let mut directory = 0usize;
    for z in 0..2 {
        for c in 0..2 {
            for position in 0..2 {
                let mut dir = Directory::image(4, 4).mm_metadata(&plane_json(z, c, 0, position));
                if directory == 0 {
                    dir = dir.description(OME_XML);
                }
                builder = builder.directory(dir);
                records.push((c, z, 0, position, directory));
                directory += 1;
            }
        }
    }

    builder.index_map(records).build_with_offsets()
}
