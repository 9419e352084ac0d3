//! Plane coordinates and their mapping to directories.
//!
//! A plane is one 2-D image identified by its (Z, C, T) coordinate. Plane
//! descriptors come from externally parsed metadata (OME `TiffData` or the
//! Micro-Manager index map) and are turned into a [`PlaneIndex`] for O(1)
//! coordinate lookup.

mod index;
mod source;

pub use index::{PlaneDescriptor, PlaneIndex, PlaneKey};
pub use source::{PlaneLayout, PlaneSource, SeriesPlanes};
