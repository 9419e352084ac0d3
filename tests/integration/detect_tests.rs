//! Detection tests over synthetic TIFF and BigTIFF files.
//!
//! Tests verify:
//! - The vendor tag is found in any directory of the chain, both variants, both byte orders
//! - A zero value offset counts as absent
//! - Unrecognized markers and magic numbers are rejected without reading past the header
//! - Directories are visited in chain order, not file order
//! - Broken chains (cycles, truncation) are "not this format"

use proptest::prelude::*;

use micromanager_tiff::format::tiff::{read_bigtiff_preamble, search_tag, ByteCursor};
use micromanager_tiff::{
    detect_format, detect_vendor_tag, detect_with, is_vendor_format, FileFormat, FormatProfile,
    MemoryRangeReader, RangeReader, TiffError,
};

use super::test_utils::{
    create_mm_ome_tiff, ByteOrderType, Directory, TiffBuilder, TrackingMockReader, MM_TAG,
    OME_XML,
};

fn accept_all(_: &dyn RangeReader) -> bool {
    true
}

fn reader(data: Vec<u8>) -> MemoryRangeReader {
    MemoryRangeReader::new(data)
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_classic_le_tag_absent() {
    let data = TiffBuilder::classic(ByteOrderType::LittleEndian)
        .directory(Directory::new().long(256, 64).long(257, 64).long(258, 16))
        .build();

    assert_eq!(&data[0..4], b"II\x2A\x00");
    assert!(!detect_vendor_tag(&reader(data.clone())).unwrap());
    assert!(!detect_with(&reader(data), &accept_all));
}

#[test]
fn test_classic_be_tag_in_second_directory() {
    let data = TiffBuilder::classic(ByteOrderType::BigEndian)
        .directory(Directory::image(64, 64).description(OME_XML))
        .directory(Directory::image(64, 64).raw(MM_TAG, 2, 16, 0x1000))
        .build();

    assert_eq!(&data[0..4], b"MM\x00\x2A");
    assert!(detect_vendor_tag(&reader(data.clone())).unwrap());
    assert!(is_vendor_format(&reader(data)));
}

#[test]
fn test_bigtiff_tag_found() {
    let data = TiffBuilder::bigtiff(ByteOrderType::LittleEndian)
        .directory(
            Directory::image(64, 64)
                .description(OME_XML)
                .raw(MM_TAG, 2, 4096, 0x2_0000_0000),
        )
        .build();

    assert_eq!(&data[0..8], b"II\x2B\x00\x08\x00\x00\x00");
    assert!(detect_vendor_tag(&reader(data.clone())).unwrap());
    assert!(is_vendor_format(&reader(data)));
}

#[test]
fn test_bigtiff_big_endian_tag_found() {
    let data = TiffBuilder::bigtiff(ByteOrderType::BigEndian)
        .directory(Directory::image(8, 8))
        .directory(Directory::image(8, 8))
        .directory(Directory::image(8, 8).mm_metadata(r#"{"Camera":"Sim"}"#))
        .build();

    assert!(detect_vendor_tag(&reader(data)).unwrap());
}

#[test]
fn test_zero_value_offset_is_absent() {
    let data = TiffBuilder::classic(ByteOrderType::LittleEndian)
        .directory(Directory::image(8, 8).description(OME_XML).raw(MM_TAG, 2, 4, 0))
        .build();

    assert!(!detect_vendor_tag(&reader(data.clone())).unwrap());
    assert!(!is_vendor_format(&reader(data)));
}

#[test]
fn test_zero_offset_stops_before_later_directories() {
    // The first occurrence decides, even when a later directory has a valid tag
    let data = TiffBuilder::classic(ByteOrderType::LittleEndian)
        .directory(Directory::image(8, 8).raw(MM_TAG, 2, 4, 0))
        .directory(Directory::image(8, 8).raw(MM_TAG, 2, 4, 0x40))
        .build();

    assert!(!detect_vendor_tag(&reader(data)).unwrap());
}

#[test]
fn test_vendor_tag_without_ome_is_not_vendor_format() {
    let data = TiffBuilder::classic(ByteOrderType::LittleEndian)
        .directory(Directory::image(8, 8).description("ImageJ=1.53t").mm_metadata("{}"))
        .build();

    assert!(detect_vendor_tag(&reader(data.clone())).unwrap());
    assert!(!is_vendor_format(&reader(data.clone())));
    assert_eq!(detect_format(&reader(data)), FileFormat::MicromanagerTiff);
}

#[test]
fn test_full_micromanager_file() {
    let built = create_mm_ome_tiff();
    let reader = reader(built.data);
    assert!(is_vendor_format(&reader));
    assert_eq!(detect_format(&reader), FileFormat::MicromanagerOmeTiff);
}

// =============================================================================
// Rejection Tests
// =============================================================================

#[test]
fn test_unrecognized_marker_reads_only_header() {
    let mut data = TiffBuilder::classic(ByteOrderType::LittleEndian)
        .directory(Directory::image(8, 8).description(OME_XML).mm_metadata("{}"))
        .build();
    data[0] = b'X';
    data[1] = b'Y';

    let tracking = TrackingMockReader::new(data, "bad-marker");
    assert!(!is_vendor_format(&tracking));
    assert!(tracking.furthest_read() <= 16);
    assert!(matches!(
        detect_vendor_tag(&tracking),
        Err(TiffError::UnsupportedByteOrder(_))
    ));
}

#[test]
fn test_unrecognized_magic_reads_only_header() {
    let mut data = TiffBuilder::classic(ByteOrderType::LittleEndian)
        .directory(Directory::image(8, 8).description(OME_XML).mm_metadata("{}"))
        .build();
    data[2] = 44;

    let tracking = TrackingMockReader::new(data, "bad-magic");
    assert!(!detect_with(&tracking, &accept_all));
    assert!(tracking.furthest_read() <= 16);
}

#[test]
fn test_malformed_bigtiff_preamble() {
    let mut data = TiffBuilder::bigtiff(ByteOrderType::LittleEndian)
        .directory(Directory::image(8, 8).mm_metadata("{}"))
        .build();
    data[4] = 4;

    assert!(matches!(
        detect_vendor_tag(&reader(data.clone())),
        Err(TiffError::MalformedBigTiffHeader { offset_size: 4, reserved: 0 })
    ));
    assert!(!detect_with(&reader(data.clone()), &accept_all));

    data[4] = 8;
    data[6] = 1;
    assert!(matches!(
        detect_vendor_tag(&reader(data)),
        Err(TiffError::MalformedBigTiffHeader { offset_size: 8, reserved: 1 })
    ));
}

#[test]
fn test_cyclic_chain_fails_closed() {
    let built = TiffBuilder::classic(ByteOrderType::LittleEndian)
        .directory(Directory::image(8, 8).description(OME_XML))
        .directory(Directory::image(8, 8))
        .build_with_offsets();
    let first = built.directory_offsets[0];

    let data = TiffBuilder::classic(ByteOrderType::LittleEndian)
        .directory(Directory::image(8, 8).description(OME_XML))
        .directory(Directory::image(8, 8))
        .last_next_offset(first)
        .build();

    assert!(matches!(
        detect_vendor_tag(&reader(data.clone())),
        Err(TiffError::DirectoryCycle(offset)) if offset == first
    ));
    assert!(!is_vendor_format(&reader(data)));
}

#[test]
fn test_chain_running_past_eof_fails_closed() {
    let data = TiffBuilder::classic(ByteOrderType::LittleEndian)
        .directory(Directory::image(8, 8).description(OME_XML))
        .last_next_offset(0xFFFF_FF00)
        .build();

    assert!(matches!(
        detect_vendor_tag(&reader(data.clone())),
        Err(TiffError::TruncatedStream { .. })
    ));
    assert!(!is_vendor_format(&reader(data)));
}

#[test]
fn test_empty_and_tiny_inputs() {
    assert!(!is_vendor_format(&reader(Vec::new())));
    assert!(!is_vendor_format(&reader(b"II".to_vec())));
    assert!(!detect_with(&reader(b"II\x2A\x00".to_vec()), &accept_all));
    assert_eq!(detect_format(&reader(Vec::new())), FileFormat::NotTiff);
}

// =============================================================================
// Chain Order Tests
// =============================================================================

#[test]
fn test_directories_visited_in_chain_order() {
    // File order 0,1,2 but chain order 0 -> 2 -> 1; the tag sits in directory 1
    let built = TiffBuilder::bigtiff(ByteOrderType::LittleEndian)
        .directory(Directory::image(8, 8))
        .directory(Directory::image(8, 8).mm_metadata("{}"))
        .directory(Directory::image(8, 8))
        .chain_order(vec![0, 2, 1])
        .build_with_offsets();
    let offsets = built.directory_offsets.clone();

    let tracking = TrackingMockReader::new(built.data, "chain-order");
    let mut cursor = ByteCursor::open(&tracking).unwrap();
    assert_eq!(cursor.read_u16().unwrap(), 43);
    read_bigtiff_preamble(&mut cursor).unwrap();

    let hit = search_tag(&mut cursor, FormatProfile::Big, MM_TAG)
        .unwrap()
        .unwrap();
    assert_eq!(hit.directory, 2);
    assert_eq!(hit.directory_offset, offsets[1]);

    // Entry-count reads happen exactly at the directory offsets, in chain order
    let visited: Vec<u64> = tracking
        .get_requests()
        .iter()
        .filter(|&&(offset, len)| len == 8 && offsets.contains(&offset))
        .map(|&(offset, _)| offset)
        .collect();
    assert_eq!(visited, vec![offsets[0], offsets[2], offsets[1]]);
}

#[test]
fn test_unlinked_directory_is_never_visited() {
    // Directory 1 carries the tag but is not part of the chain
    let data = TiffBuilder::classic(ByteOrderType::LittleEndian)
        .directory(Directory::image(8, 8))
        .directory(Directory::image(8, 8).mm_metadata("{}"))
        .chain_order(vec![0])
        .build();

    assert!(!detect_vendor_tag(&reader(data)).unwrap());
}

// =============================================================================
// Property Tests
// =============================================================================

fn byte_order_strategy() -> impl Strategy<Value = ByteOrderType> {
    prop_oneof![
        Just(ByteOrderType::LittleEndian),
        Just(ByteOrderType::BigEndian)
    ]
}

proptest! {
    #[test]
    fn prop_tag_found_in_any_directory(
        bigtiff in any::<bool>(),
        order in byte_order_strategy(),
        (count, position) in (1usize..8).prop_flat_map(|n| (Just(n), 0..n)),
        value_offset in 1u64..=u32::MAX as u64,
    ) {
        let mut builder = if bigtiff {
            TiffBuilder::bigtiff(order)
        } else {
            TiffBuilder::classic(order)
        };
        for i in 0..count {
            let mut directory = Directory::image(16, 16);
            if i == position {
                directory = directory.raw(MM_TAG, 2, 8, value_offset);
            }
            builder = builder.directory(directory);
        }
        let data = builder.build();

        prop_assert!(detect_vendor_tag(&reader(data.clone())).unwrap());
        prop_assert!(detect_with(&reader(data), &accept_all));
    }

    #[test]
    fn prop_zero_offset_or_absent_is_not_found(
        bigtiff in any::<bool>(),
        order in byte_order_strategy(),
        count in 1usize..8,
        zero_at in proptest::option::of(0usize..8),
    ) {
        let mut builder = if bigtiff {
            TiffBuilder::bigtiff(order)
        } else {
            TiffBuilder::classic(order)
        };
        for i in 0..count {
            let mut directory = Directory::image(16, 16);
            if zero_at == Some(i) {
                directory = directory.raw(MM_TAG, 2, 8, 0);
            }
            builder = builder.directory(directory);
        }

        prop_assert!(!detect_vendor_tag(&reader(builder.build())).unwrap());
    }

    #[test]
    fn prop_bad_magic_rejected(magic in any::<u16>().prop_filter("not TIFF", |m| *m != 42 && *m != 43)) {
        let mut data = TiffBuilder::classic(ByteOrderType::LittleEndian)
            .directory(Directory::image(8, 8).mm_metadata("{}"))
            .build();
        data[2..4].copy_from_slice(&magic.to_le_bytes());

        let tracking = TrackingMockReader::new(data, "magic");
        prop_assert!(!detect_with(&tracking, &accept_all));
        prop_assert!(tracking.furthest_read() <= 16);
    }
}
