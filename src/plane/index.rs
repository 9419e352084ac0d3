use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::MetadataError;

/// Logical plane coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaneKey {
    pub z: u32,
    pub c: u32,
    pub t: u32,
}

impl PlaneKey {
    pub const fn new(z: u32, c: u32, t: u32) -> Self {
        Self { z, c, t }
    }
}

/// One declared plane and the directory holding it.
///
/// Field names also accept the OME `TiffData` spelling (`FirstZ`, `IFD`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneDescriptor {
    #[serde(alias = "FirstZ")]
    pub first_z: u32,

    #[serde(alias = "FirstC")]
    pub first_c: u32,

    #[serde(alias = "FirstT")]
    pub first_t: u32,

    /// Position of the plane's IFD within its series' directory sequence
    #[serde(alias = "ifd", alias = "IFD")]
    pub directory_index: usize,
}

impl PlaneDescriptor {
    pub const fn new(first_z: u32, first_c: u32, first_t: u32, directory_index: usize) -> Self {
        Self {
            first_z,
            first_c,
            first_t,
            directory_index,
        }
    }

    pub const fn key(&self) -> PlaneKey {
        PlaneKey::new(self.first_z, self.first_c, self.first_t)
    }
}

/// Map from plane coordinate to directory index for one series.
///
/// No validation of monotonicity or completeness is done: sparse and
/// non-rectangular layouts are accepted. When a coordinate is declared more
/// than once, the last declaration wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaneIndex {
    series: usize,
    directories: HashMap<PlaneKey, usize>,
}

impl PlaneIndex {
    /// Build an index for series 0.
    pub fn build(descriptors: &[PlaneDescriptor]) -> Self {
        Self::build_for_series(0, descriptors)
    }

    /// Build an index for `series`; the series only labels lookup errors.
    pub fn build_for_series(series: usize, descriptors: &[PlaneDescriptor]) -> Self {
        let mut directories = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let key = descriptor.key();
            if let Some(previous) = directories.insert(key, descriptor.directory_index) {
                warn!(
                    series,
                    z = key.z,
                    c = key.c,
                    t = key.t,
                    previous,
                    directory = descriptor.directory_index,
                    "duplicate plane coordinate, keeping the last declaration"
                );
            }
        }

        debug!(series, planes = directories.len(), "built plane index");
        Self {
            series,
            directories,
        }
    }

    /// Directory index of the plane at (z, c, t).
    pub fn resolve(&self, z: u32, c: u32, t: u32) -> Result<usize, MetadataError> {
        self.get(PlaneKey::new(z, c, t))
            .ok_or(MetadataError::KeyNotFound {
                z,
                c,
                t,
                series: self.series,
            })
    }

    pub fn get(&self, key: PlaneKey) -> Option<usize> {
        self.directories.get(&key).copied()
    }

    pub fn series(&self) -> usize {
        self.series
    }

    pub fn len(&self) -> usize {
        self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    /// Entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (PlaneKey, usize)> + '_ {
        self.directories.iter().map(|(&key, &dir)| (key, dir))
    }
}
