//! Page access by (series, directory index).
//!
//! A multi-series file splits its IFD chain into per-series page tables. The
//! [`PageReader`] trait is the seam metadata retrieval goes through;
//! [`TiffPageReader`] is the implementation backed by this crate's own IFD
//! parser.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PageReadError;
use crate::io::RangeReader;

use super::tiff::{directory_offsets, Ifd, TiffHeader, ValueReader};

// =============================================================================
// PageReader Trait
// =============================================================================

/// Reads tag values from a page identified by series and directory index.
pub trait PageReader {
    /// Number of series the reader knows about.
    fn series_count(&self) -> usize;

    /// Number of pages in `series`, or `None` if the series does not exist.
    fn page_count(&self, series: usize) -> Option<usize>;

    /// Raw value bytes of `tag` on page `directory_index` of `series`.
    fn read_page_tag(
        &self,
        series: usize,
        directory_index: usize,
        tag: u16,
    ) -> Result<Bytes, PageReadError>;
}

// =============================================================================
// SeriesLayout
// =============================================================================

/// How the file's IFD chain is split into series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesLayout {
    /// One series made of the whole chain, in chain order.
    #[default]
    SingleSeries,

    /// Per series, the file-level IFD indices of its pages in page order.
    Explicit(Vec<Vec<usize>>),
}

// =============================================================================
// TiffPageReader
// =============================================================================

/// [`PageReader`] over a TIFF/BigTIFF file.
///
/// The IFD chain is listed once on open; individual IFDs are parsed on
/// demand.
pub struct TiffPageReader<R> {
    reader: R,
    header: TiffHeader,
    directories: Vec<u64>,
    series: Vec<Vec<usize>>,
}

impl<R: RangeReader> TiffPageReader<R> {
    /// Parse the header, list the IFD chain and resolve the series layout.
    ///
    /// # Errors
    /// - `PageReadError::Tiff` if the header or chain is malformed
    /// - `PageReadError::DirectoryOutOfRange` if an explicit layout names an
    ///   IFD the chain does not have
    pub fn open(reader: R, layout: SeriesLayout) -> Result<Self, PageReadError> {
        let header = TiffHeader::read(&reader)?;
        let directories = directory_offsets(&reader, &header)?;

        let series = match layout {
            SeriesLayout::SingleSeries => vec![(0..directories.len()).collect()],
            SeriesLayout::Explicit(series) => {
                for (s, pages) in series.iter().enumerate() {
                    if let Some(&bad) = pages.iter().find(|&&ifd| ifd >= directories.len()) {
                        return Err(PageReadError::DirectoryOutOfRange {
                            series: s,
                            index: bad,
                            count: directories.len(),
                        });
                    }
                }
                series
            }
        };

        debug!(
            file = reader.identifier(),
            directories = directories.len(),
            series = series.len(),
            "opened page reader"
        );

        Ok(Self {
            reader,
            header,
            directories,
            series,
        })
    }

    /// The parsed file header.
    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    /// File offsets of every IFD in chain order.
    pub fn directory_offsets(&self) -> &[u64] {
        &self.directories
    }

    /// The underlying reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Parse the IFD backing page `directory_index` of `series`.
    pub fn read_page(&self, series: usize, directory_index: usize) -> Result<Ifd, PageReadError> {
        let pages = self
            .series
            .get(series)
            .ok_or(PageReadError::SeriesOutOfRange {
                series,
                count: self.series.len(),
            })?;
        let &file_index = pages
            .get(directory_index)
            .ok_or(PageReadError::DirectoryOutOfRange {
                series,
                index: directory_index,
                count: pages.len(),
            })?;

        // Validated against the chain on open
        let offset = self.directories[file_index];
        Ok(Ifd::read(&self.reader, &self.header, offset)?)
    }
}

impl<R: RangeReader> PageReader for TiffPageReader<R> {
    fn series_count(&self) -> usize {
        self.series.len()
    }

    fn page_count(&self, series: usize) -> Option<usize> {
        self.series.get(series).map(Vec::len)
    }

    fn read_page_tag(
        &self,
        series: usize,
        directory_index: usize,
        tag: u16,
    ) -> Result<Bytes, PageReadError> {
        let ifd = self.read_page(series, directory_index)?;
        let entry = ifd.get_entry(tag).ok_or(PageReadError::TagMissing {
            tag,
            series,
            index: directory_index,
        })?;

        let values = ValueReader::new(&self.reader, &self.header);
        Ok(values.read_bytes(entry)?)
    }
}
