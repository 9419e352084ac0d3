//! IFD chain walking.
//!
//! TIFF directories form a singly linked list: each IFD ends with the offset
//! of the next one and a zero offset terminates the chain. The walkers here
//! follow that list generically for both variants, parameterized by a
//! [`FormatProfile`].
//!
//! A chain that links back to a directory already visited can never reach
//! its terminator; it is reported as [`TiffError::DirectoryCycle`] so every
//! walk finishes in time proportional to the chain length.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::error::TiffError;
use crate::io::RangeReader;

use super::cursor::ByteCursor;
use super::parser::{FormatProfile, TiffHeader};

/// Where a tag search succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHit {
    /// Position of the directory in the chain (0 = first)
    pub directory: usize,

    /// File offset of that directory
    pub directory_offset: u64,

    /// The entry's nonzero value-or-offset field
    pub value_offset: u64,
}

/// Read and validate the two BigTIFF preamble fields that follow the magic.
///
/// The cursor must sit right after the magic number; on success it is left
/// on the first-IFD offset field.
pub fn read_bigtiff_preamble<R: RangeReader>(cursor: &mut ByteCursor<R>) -> Result<(), TiffError> {
    let offset_size = cursor.read_u16()?;
    let reserved = cursor.read_u16()?;
    if offset_size != 8 || reserved != 0 {
        return Err(TiffError::MalformedBigTiffHeader {
            offset_size,
            reserved,
        });
    }
    Ok(())
}

/// Search the IFD chain for `target_tag` with a nonzero value-or-offset.
///
/// The cursor must be positioned on a directory offset field (the header's
/// first-IFD field). Directories are visited strictly in chain order and
/// the walk stops at the first directory holding the tag.
///
/// Returns `Ok(None)` when the chain terminates without the tag, or when the
/// first occurrence of the tag has a zero value-or-offset (treated as
/// absent). Structural problems (truncation, cycles) are errors.
pub fn search_tag<R: RangeReader>(
    cursor: &mut ByteCursor<R>,
    profile: FormatProfile,
    target_tag: u16,
) -> Result<Option<TagHit>, TiffError> {
    let mut visited = HashSet::new();
    let mut directory = 0usize;

    loop {
        let directory_offset = cursor.read_offset(profile)?;
        if directory_offset == 0 {
            debug!(directories = directory, tag = target_tag, "IFD chain ended without tag");
            return Ok(None);
        }
        if !visited.insert(directory_offset) {
            return Err(TiffError::DirectoryCycle(directory_offset));
        }

        cursor.seek(directory_offset);
        let entry_count = cursor.read_count(profile)?;
        trace!(directory, offset = directory_offset, entry_count, "walking IFD");

        for _ in 0..entry_count {
            let entry = cursor.read_entry(profile)?;
            if entry.tag != target_tag {
                continue;
            }

            if entry.value_offset == 0 {
                debug!(
                    directory,
                    offset = directory_offset,
                    tag = target_tag,
                    "tag present with zero value offset, treating as absent"
                );
                return Ok(None);
            }

            return Ok(Some(TagHit {
                directory,
                directory_offset,
                value_offset: entry.value_offset,
            }));
        }

        // The cursor now sits on this directory's next-IFD offset field.
        directory += 1;
    }
}

/// Whether `target_tag` is present with a nonzero value anywhere in the chain.
///
/// Fails closed: any structural anomaly yields `false`.
pub fn find_tag<R: RangeReader>(
    cursor: &mut ByteCursor<R>,
    profile: FormatProfile,
    target_tag: u16,
) -> bool {
    match search_tag(cursor, profile, target_tag) {
        Ok(hit) => hit.is_some(),
        Err(e) => {
            debug!(error = %e, tag = target_tag, "IFD chain walk failed");
            false
        }
    }
}

/// List the file offsets of every IFD in the chain, in chain order.
pub fn directory_offsets<R: RangeReader>(
    reader: R,
    header: &TiffHeader,
) -> Result<Vec<u64>, TiffError> {
    let profile = header.profile;
    let mut cursor = ByteCursor::with_byte_order(reader, header.byte_order, 0);
    let mut offsets = Vec::new();
    let mut visited = HashSet::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 {
        if !visited.insert(offset) {
            return Err(TiffError::DirectoryCycle(offset));
        }
        offsets.push(offset);

        cursor.seek(offset);
        let entry_count = cursor.read_count(profile)?;
        let next_field = entry_count
            .checked_mul(profile.entry_width() as u64)
            .and_then(|entries| entries.checked_add(cursor.position()))
            .ok_or(TiffError::InvalidIfdOffset(offset))?;

        cursor.seek(next_field);
        offset = cursor.read_offset(profile)?;
    }

    debug!(count = offsets.len(), "listed IFD chain");
    Ok(offsets)
}
