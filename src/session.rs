//! Open-file session and per-plane metadata retrieval.
//!
//! [`MicromanagerFile`] ties a [`PageReader`] to a [`PlaneSource`] and owns
//! the plane indexes built from it. Each series gets its own index, built
//! the first time that series is queried and kept for the session's
//! lifetime.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{MetadataError, PageReadError};
use crate::format::micromanager::decode_json;
use crate::format::tiff::{directory_offsets, TiffHeader, MICROMANAGER_METADATA_TAG};
use crate::format::{is_vendor_format, MicromanagerHeader, PageReader, TiffPageReader};
use crate::io::RangeReader;
use crate::plane::{PlaneIndex, PlaneLayout, PlaneSource};

/// An opened Micro-Manager file.
pub struct MicromanagerFile<P, S> {
    pages: P,
    planes: S,
    indexes: RwLock<HashMap<usize, Arc<PlaneIndex>>>,
}

impl<P: PageReader, S: PlaneSource> MicromanagerFile<P, S> {
    pub fn new(pages: P, planes: S) -> Self {
        Self {
            pages,
            planes,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    /// The plane index of `series`, building it on first use.
    ///
    /// Concurrent first calls for the same series build it once.
    pub fn plane_index(&self, series: usize) -> Result<Arc<PlaneIndex>, MetadataError> {
        {
            let cache = self.indexes.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(index) = cache.get(&series) {
                return Ok(Arc::clone(index));
            }
        }

        let mut cache = self.indexes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = cache.get(&series) {
            return Ok(Arc::clone(index));
        }

        let descriptors = self.planes.plane_descriptors(series)?;
        let index = Arc::new(PlaneIndex::build_for_series(series, &descriptors));
        cache.insert(series, Arc::clone(&index));
        Ok(index)
    }

    /// Raw Micro-Manager metadata tag bytes of the plane at (z, c, t) in `series`.
    ///
    /// # Errors
    /// - `MetadataError::KeyNotFound` if the coordinate is not declared
    /// - `MetadataError::PageRead` if the page or its tag cannot be read
    pub fn get_page_metadata(
        &self,
        z: u32,
        c: u32,
        t: u32,
        series: usize,
    ) -> Result<Bytes, MetadataError> {
        let count = self.pages.series_count();
        if series >= count {
            return Err(PageReadError::SeriesOutOfRange { series, count }.into());
        }

        let directory = self.plane_index(series)?.resolve(z, c, t)?;
        trace!(z, c, t, series, directory, "resolved plane");

        Ok(self
            .pages
            .read_page_tag(series, directory, MICROMANAGER_METADATA_TAG)?)
    }

    /// The plane's metadata decoded as JSON.
    pub fn get_page_metadata_json(
        &self,
        z: u32,
        c: u32,
        t: u32,
        series: usize,
    ) -> Result<Value, MetadataError> {
        let bytes = self.get_page_metadata(z, c, t, series)?;
        decode_json(&bytes, "page metadata")
    }

    pub fn pages(&self) -> &P {
        &self.pages
    }

    pub fn planes(&self) -> &S {
        &self.planes
    }
}

impl<R: RangeReader, S: PlaneSource> MicromanagerFile<TiffPageReader<R>, S> {
    /// Open a file with the series layout declared by `planes`.
    pub fn open(reader: R, planes: S) -> Result<Self, MetadataError> {
        let pages = TiffPageReader::open(reader, planes.series_layout())?;
        Ok(Self::new(pages, planes))
    }

    /// Whether the underlying file is a Micro-Manager OME-TIFF.
    pub fn is_micromanager(&self) -> bool {
        is_vendor_format(self.pages.reader())
    }

    /// The file-level Micro-Manager header.
    pub fn micromanager_header(&self) -> Result<MicromanagerHeader, MetadataError> {
        MicromanagerHeader::read(self.pages.reader())
    }
}

impl<R: RangeReader> MicromanagerFile<TiffPageReader<R>, PlaneLayout> {
    /// Open a file using its own Micro-Manager index map as the plane source.
    ///
    /// # Errors
    /// `MetadataError::InvalidPlaneLayout` if the file has no index map.
    pub fn open_with_index_map(reader: R) -> Result<Self, MetadataError> {
        let header = TiffHeader::read(&reader)?;
        let chain = directory_offsets(&reader, &header)?;
        let index_map = MicromanagerHeader::read(&reader)?.index_map.ok_or_else(|| {
            MetadataError::InvalidPlaneLayout(format!(
                "{} has no Micro-Manager index map",
                reader.identifier()
            ))
        })?;

        let layout = PlaneLayout::from_index_map(&index_map, &chain)?;
        debug!(
            file = reader.identifier(),
            series = layout.series.len(),
            "using index map plane layout"
        );
        Self::open(reader, layout)
    }
}
