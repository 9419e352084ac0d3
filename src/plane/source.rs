use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MetadataError;
use crate::format::{IndexMapEntry, SeriesLayout};

use super::index::PlaneDescriptor;

// =============================================================================
// PlaneSource Trait
// =============================================================================

/// Supplies plane descriptors per series.
pub trait PlaneSource {
    /// Ordered plane descriptors of `series`.
    fn plane_descriptors(&self, series: usize) -> Result<Vec<PlaneDescriptor>, MetadataError>;

    /// How the file's IFD chain splits into series for this source.
    fn series_layout(&self) -> SeriesLayout {
        SeriesLayout::SingleSeries
    }
}

/// A flat descriptor list applies to every series alike.
impl PlaneSource for Vec<PlaneDescriptor> {
    fn plane_descriptors(&self, _series: usize) -> Result<Vec<PlaneDescriptor>, MetadataError> {
        Ok(self.clone())
    }
}

// =============================================================================
// PlaneLayout
// =============================================================================

/// Planes and page table of one series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPlanes {
    /// File-level IFD indices of the series' pages, in page order.
    ///
    /// `None` means the series is the whole IFD chain; only allowed when the
    /// layout has a single series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<usize>>,

    pub planes: Vec<PlaneDescriptor>,
}

/// Per-series plane descriptors, typically loaded from JSON.
///
/// ```json
/// {"series": [{"pages": [0, 2], "planes": [{"FirstZ": 0, "FirstC": 0, "FirstT": 0, "IFD": 1}]}]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneLayout {
    pub series: Vec<SeriesPlanes>,
}

impl PlaneLayout {
    /// Parse and validate a layout from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, MetadataError> {
        let layout: Self = serde_json::from_str(json).map_err(|e| MetadataError::InvalidJson {
            context: "plane layout".to_string(),
            message: e.to_string(),
        })?;
        layout.validate()?;
        Ok(layout)
    }

    /// Read, parse and validate a layout from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MetadataError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            MetadataError::InvalidPlaneLayout(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Check structural consistency.
    ///
    /// Plane coordinates are not validated; duplicates and gaps are allowed.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.series.is_empty() {
            return Err(MetadataError::InvalidPlaneLayout(
                "layout declares no series".to_string(),
            ));
        }

        for (s, series) in self.series.iter().enumerate() {
            match &series.pages {
                None if self.series.len() > 1 => {
                    return Err(MetadataError::InvalidPlaneLayout(format!(
                        "series {s} has no page table in a multi-series layout"
                    )));
                }
                None => {}
                Some(pages) => {
                    if let Some(plane) = series
                        .planes
                        .iter()
                        .find(|p| p.directory_index >= pages.len())
                    {
                        return Err(MetadataError::InvalidPlaneLayout(format!(
                            "series {s}: plane at directory {} but series has {} pages",
                            plane.directory_index,
                            pages.len()
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Derive a layout from the Micro-Manager index map.
    ///
    /// Stage positions become series in ascending order; slice, channel and
    /// frame become Z, C and T. Each series' pages are its IFDs in chain
    /// order, and a plane's directory index is its position in that list.
    ///
    /// `directory_offsets` is the file's IFD chain as listed by
    /// [`directory_offsets`](crate::format::tiff::directory_offsets).
    pub fn from_index_map(
        entries: &[IndexMapEntry],
        directory_offsets: &[u64],
    ) -> Result<Self, MetadataError> {
        let chain_position: HashMap<u64, usize> = directory_offsets
            .iter()
            .enumerate()
            .map(|(i, &offset)| (offset, i))
            .collect();

        let mut positions: BTreeMap<u32, Vec<(usize, &IndexMapEntry)>> = BTreeMap::new();
        for entry in entries {
            let file_index = chain_position
                .get(&(entry.offset as u64))
                .copied()
                .ok_or_else(|| {
                    MetadataError::InvalidPlaneLayout(format!(
                        "index map points at offset {} which is not an IFD in the chain",
                        entry.offset
                    ))
                })?;
            positions
                .entry(entry.position)
                .or_default()
                .push((file_index, entry));
        }

        let series = positions
            .into_values()
            .map(|mut planes| {
                planes.sort_by_key(|&(file_index, _)| file_index);
                let pages = planes.iter().map(|&(file_index, _)| file_index).collect();
                let planes = planes
                    .iter()
                    .enumerate()
                    .map(|(page, &(_, entry))| {
                        PlaneDescriptor::new(entry.slice, entry.channel, entry.frame, page)
                    })
                    .collect();
                SeriesPlanes {
                    pages: Some(pages),
                    planes,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            entries = entries.len(),
            series = series.len(),
            "derived plane layout from index map"
        );

        let layout = Self { series };
        layout.validate()?;
        Ok(layout)
    }
}

impl PlaneSource for PlaneLayout {
    fn plane_descriptors(&self, series: usize) -> Result<Vec<PlaneDescriptor>, MetadataError> {
        self.series
            .get(series)
            .map(|s| s.planes.clone())
            .ok_or_else(|| {
                MetadataError::InvalidPlaneLayout(format!(
                    "series {series} not described (layout has {})",
                    self.series.len()
                ))
            })
    }

    fn series_layout(&self) -> SeriesLayout {
        let tables: Option<Vec<Vec<usize>>> =
            self.series.iter().map(|s| s.pages.clone()).collect();
        match tables {
            Some(tables) => SeriesLayout::Explicit(tables),
            None => SeriesLayout::SingleSeries,
        }
    }
}
