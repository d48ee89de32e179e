mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;

use common::{Fixture, FixtureBuilder, init, linear};
use hdf5_chunked::cache::ChunkCacheConfig;
use hdf5_chunked::datatype::{ByteOrder, DatatypeDescriptor, NumericClass};
use hdf5_chunked::filter::{DEFLATE, FLETCHER32, SHUFFLE};
use hdf5_chunked::index::ChunkIndexRoot;
use hdf5_chunked::metadata::DatasetMetadata;
use hdf5_chunked::{
    ByteSource, CancellationToken, ChunkedDataset, DatasetDescriptor, Error, ErrorKind, FileSource,
    MemorySource, Region, TypedBuffer, read_full, read_region,
};

fn dtype(class: NumericClass, bits: u32, order: ByteOrder) -> DatatypeDescriptor {
    DatatypeDescriptor::new(class, bits, order)
}

fn int32() -> DatatypeDescriptor {
    dtype(NumericClass::SignedFixedPoint, 32, ByteOrder::LittleEndian)
}

/// `/int/int32`: 7x5, values 0..35 in row-major order, gzip-compressed.
fn int32_gzip(chunk: &[u64]) -> Fixture {
    let shape = [7, 5];
    FixtureBuilder::new(&shape, chunk, int32())
        .filter(DEFLATE, &[6])
        .build(|c| (linear(&shape, c) as i32).to_le_bytes().to_vec())
}

fn expected_range(n: i32) -> Vec<i32> {
    (0..n).collect()
}

#[test]
fn int32_gzip_full_read() {
    init();
    let fixture = int32_gzip(&[3, 2]);
    let array = fixture.open().read_full().unwrap();
    assert_eq!(array.shape(), &[7, 5]);
    assert_eq!(array.into_vec::<i32>().unwrap(), expected_range(35));
}

#[test]
fn free_functions_match_dataset() {
    init();
    let fixture = int32_gzip(&[3, 2]);
    let d = &fixture.descriptor;
    let array = read_full(
        fixture.source(),
        &d.chunk_index,
        &d.dataspace,
        &d.layout,
        &d.datatype,
        &d.filters,
    )
    .unwrap();
    assert_eq!(array, fixture.open().read_full().unwrap());

    let region = Region::from_ranges(&[2..5, 1..3]).unwrap();
    let part = read_region(
        fixture.source(),
        &d.chunk_index,
        &d.dataspace,
        &d.layout,
        &d.datatype,
        &d.filters,
        &region,
    )
    .unwrap();
    assert_eq!(part.into_vec::<i32>().unwrap(), vec![11, 12, 16, 17, 21, 22]);
}

#[test]
fn boundary_chunks_are_clipped() {
    init();
    let fixture = int32_gzip(&[4, 4]);
    assert_eq!(fixture.chunks.len(), 4);
    let values = fixture.open().read_full().unwrap().into_vec::<i32>().unwrap();
    assert_eq!(values.len(), 35);
    assert_eq!(values, expected_range(35));
}

macro_rules! roundtrip_type {
    ($name:ident, $t:ty, $class:ident, $order:ident, $value:expr) => {
        #[test]
        fn $name() {
            init();
            let shape = [6, 9];
            let value = |i: u64| -> $t { $value(i) };
            let order = ByteOrder::$order;
            let fixture = FixtureBuilder::new(
                &shape,
                &[4, 4],
                dtype(NumericClass::$class, (size_of::<$t>() * 8) as u32, order),
            )
            .filter(SHUFFLE, &[])
            .filter(DEFLATE, &[4])
            .build(|c| {
                let v = value(linear(&shape, c));
                match order {
                    ByteOrder::LittleEndian => v.to_le_bytes().to_vec(),
                    ByteOrder::BigEndian => v.to_be_bytes().to_vec(),
                }
            });
            let expected: Vec<$t> = (0..54).map(value).collect();
            let array = fixture.open().read_full().unwrap();
            assert_eq!(array.into_vec::<$t>().unwrap(), expected);
        }
    };
}

roundtrip_type!(int8_le, i8, SignedFixedPoint, LittleEndian, |i: u64| i as i8 - 27);
roundtrip_type!(uint8_be, u8, UnsignedFixedPoint, BigEndian, |i: u64| (i * 4) as u8);
roundtrip_type!(int16_be, i16, SignedFixedPoint, BigEndian, |i: u64| -(i as i16) * 300);
roundtrip_type!(uint16_le, u16, UnsignedFixedPoint, LittleEndian, |i: u64| (i as u16) * 1000);
roundtrip_type!(int64_be, i64, SignedFixedPoint, BigEndian, |i: u64| (i as i64 - 20) << 40);
roundtrip_type!(uint32_be, u32, UnsignedFixedPoint, BigEndian, |i: u64| u32::MAX - i as u32);
roundtrip_type!(uint64_le, u64, UnsignedFixedPoint, LittleEndian, |i: u64| u64::MAX - i);
roundtrip_type!(float32_le, f32, FloatingPoint, LittleEndian, |i: u64| i as f32 * 0.5 - 3.0);
roundtrip_type!(float32_be, f32, FloatingPoint, BigEndian, |i: u64| i as f32 / 7.0);
roundtrip_type!(float64_be, f64, FloatingPoint, BigEndian, |i: u64| (i as f64).sqrt());

#[test]
fn float16_dataset() {
    init();
    let shape = [3, 3];
    let fixture = FixtureBuilder::new(
        &shape,
        &[2, 2],
        dtype(NumericClass::FloatingPoint, 16, ByteOrder::LittleEndian),
    )
    .build(|c| half::f16::from_f64(linear(&shape, c) as f64 / 4.0).to_le_bytes().to_vec());
    let values = fixture.open().read_full().unwrap().data().to_f64_vec();
    let expected: Vec<f64> = (0..9).map(|i| i as f64 / 4.0).collect();
    assert_eq!(values, expected);
}

#[test]
fn unallocated_chunk_reads_fill_value() {
    init();
    let shape = [7, 5];
    let builder = || {
        FixtureBuilder::new(&shape, &[4, 4], int32())
            .filter(DEFLATE, &[])
            .missing(&[1, 0])
    };
    let value = |c: &[u64]| (linear(&shape, c) as i32 + 1).to_le_bytes().to_vec();

    let fixture = builder().build(value);
    let dataset = fixture.open();
    let array = dataset.read_full().unwrap();
    for row in 0..7u64 {
        for col in 0..5u64 {
            let v = array.get::<i32>(&[row, col]).unwrap();
            if row >= 4 && col < 4 {
                assert_eq!(v, 0, "({row}, {col})");
            } else {
                assert_eq!(v, linear(&shape, &[row, col]) as i32 + 1);
            }
        }
    }
    assert_eq!(dataset.chunk(&[1, 0]).unwrap(), None);

    let mut fixture = builder().build(value);
    fixture.descriptor = fixture
        .descriptor
        .with_fill_value(TypedBuffer::Int32(vec![-9]));
    let region = Region::from_ranges(&[3..6, 2..5]).unwrap();
    let part = fixture.open().read_region(&region).unwrap();
    assert_eq!(
        part.into_vec::<i32>().unwrap(),
        vec![18, 19, 20, -9, -9, 25, -9, -9, 30]
    );
}

#[test]
fn empty_dataset_is_all_fill() {
    init();
    let shape = [3, 4];
    let fixture = FixtureBuilder::new(&shape, &[2, 2], int32())
        .missing(&[0, 0])
        .missing(&[0, 1])
        .missing(&[1, 0])
        .missing(&[1, 1])
        .build(|_| unreachable!());
    assert_eq!(
        fixture.root,
        ChunkIndexRoot::BTree {
            address: u64::MAX,
            offset_size: 8
        }
    );
    let values = fixture.open().read_full().unwrap().into_vec::<i32>().unwrap();
    assert_eq!(values, vec![0; 12]);
}

#[test]
fn regions_match_full_read() {
    init();
    let shape = [13, 11, 3];
    let fixture = FixtureBuilder::new(&shape, &[4, 3, 2], int32())
        .filter(SHUFFLE, &[4])
        .filter(DEFLATE, &[1])
        .fanout(3)
        .build(|c| (linear(&shape, c) as i32 * 3).to_le_bytes().to_vec());
    let dataset = fixture.open();
    let full = dataset.read_full().unwrap();

    let regions = [
        [0..13u64, 0..11, 0..3],
        [5..6, 4..5, 1..2],
        [3..10, 2..9, 0..2],
        [12..13, 0..11, 2..3],
        [0..4, 0..3, 0..2],
    ];
    for ranges in regions {
        let region = Region::from_ranges(&ranges).unwrap();
        let part = dataset.read_region(&region).unwrap();
        assert_eq!(part.shape(), region.count());
        let mut expected = Vec::new();
        for i in ranges[0].clone() {
            for j in ranges[1].clone() {
                for k in ranges[2].clone() {
                    expected.push(full.get::<i32>(&[i, j, k]).unwrap());
                }
            }
        }
        assert_eq!(part.into_vec::<i32>().unwrap(), expected, "{ranges:?}");
    }
}

#[test]
fn empty_region() {
    init();
    let dataset = int32_gzip(&[3, 2]).open();
    let region = Region::from_ranges(&[2..2, 0..5]).unwrap();
    let array = dataset.read_region(&region).unwrap();
    assert!(array.is_empty());
    assert_eq!(array.shape(), &[0, 5]);
    assert_eq!(dataset.cache_stats().misses, 0);
}

#[test]
fn region_out_of_bounds() {
    init();
    let dataset = int32_gzip(&[3, 2]).open();
    let err = dataset
        .read_region(&Region::from_ranges(&[0..8, 0..5]).unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = dataset
        .read_region(&Region::from_ranges(&[0..2]).unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn rereads_are_identical_and_cached() {
    init();
    let dataset = int32_gzip(&[3, 2]).open();
    let region = Region::from_ranges(&[1..6, 1..4]).unwrap();
    let cold = dataset.read_region(&region).unwrap();
    let after_cold = dataset.cache_stats();
    assert_eq!(after_cold.hits, 0);
    let warm = dataset.read_region(&region).unwrap();
    assert_eq!(cold, warm);
    let after_warm = dataset.cache_stats();
    assert_eq!(after_warm.misses, after_cold.misses);
    assert_eq!(after_warm.hits, after_cold.misses);

    let fixture = int32_gzip(&[3, 2]);
    let descriptor = fixture.descriptor.clone().with_cache(ChunkCacheConfig::disabled());
    let uncached = ChunkedDataset::open(fixture.source(), descriptor).unwrap();
    assert_eq!(uncached.read_region(&region).unwrap(), cold);
    assert_eq!(uncached.read_region(&region).unwrap(), cold);
    assert_eq!(uncached.cache_stats().resident_chunks, 0);
}

#[test]
fn small_cache_still_reads_correctly() {
    init();
    let fixture = int32_gzip(&[2, 2]);
    let descriptor = fixture.descriptor.clone().with_cache(ChunkCacheConfig {
        max_bytes: 1 << 20,
        max_chunks: 2,
    });
    let dataset = ChunkedDataset::open(fixture.source(), descriptor).unwrap();
    for _ in 0..3 {
        let values = dataset.read_full().unwrap().into_vec::<i32>().unwrap();
        assert_eq!(values, expected_range(35));
    }
    let stats = dataset.cache_stats();
    assert!(stats.evictions > 0);
    assert!(stats.resident_chunks <= 2);
}

#[test]
fn concurrent_reads_match_sequential() {
    init();
    let shape = [40, 30];
    let fixture = FixtureBuilder::new(&shape, &[7, 6], int32())
        .filter(SHUFFLE, &[])
        .filter(DEFLATE, &[])
        .fanout(3)
        .build(|c| (linear(&shape, c) as i32).to_le_bytes().to_vec());
    let regions: Vec<Region> = (0..8u64)
        .map(|i| Region::from_ranges(&[i * 3..i * 3 + 15, i..i + 20]).unwrap())
        .collect();

    let sequential: Vec<_> = {
        let dataset = fixture.open();
        regions.iter().map(|r| dataset.read_region(r).unwrap()).collect()
    };

    let dataset = Arc::new(fixture.open());
    for _ in 0..3 {
        let parallel: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = regions
                .iter()
                .map(|r| {
                    let dataset = Arc::clone(&dataset);
                    s.spawn(move || dataset.read_region(r).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(parallel, sequential);
    }
}

#[test]
fn single_chunk_without_tree() {
    init();
    let shape = [3, 3];
    let value = |c: &[u64]| (linear(&shape, c) as i32 * 10).to_le_bytes().to_vec();
    let single = FixtureBuilder::new(&shape, &[3, 3], int32())
        .filter(DEFLATE, &[])
        .single()
        .build(value);
    assert!(matches!(single.root, ChunkIndexRoot::Single { .. }));
    let tree = FixtureBuilder::new(&shape, &[3, 3], int32())
        .filter(DEFLATE, &[])
        .build(value);

    let expected: Vec<i32> = (0..9).map(|i| i * 10).collect();
    for fixture in [single, tree] {
        let dataset = fixture.open();
        assert_eq!(dataset.read_full().unwrap().into_vec::<i32>().unwrap(), expected);
        let chunk = dataset.chunk(&[0, 0]).unwrap().unwrap();
        assert_eq!(chunk.as_slice::<i32>().unwrap(), expected.as_slice());
        assert_eq!(dataset.index().entries(dataset.source()).count(), 1);
    }
}

#[test]
fn deep_tree_resolves_every_chunk() {
    init();
    let shape = [20, 20];
    let fixture = FixtureBuilder::new(&shape, &[2, 2], int32())
        .fanout(2)
        .offset_size(4)
        .missing(&[3, 7])
        .build(|c| (linear(&shape, c) as i32).to_le_bytes().to_vec());
    let dataset = fixture.open();
    let source = dataset.source();
    let entries: Vec<_> = dataset
        .index()
        .entries(source)
        .collect::<hdf5_chunked::Result<_>>()
        .unwrap();
    assert_eq!(entries.len(), 99);
    for (entry, stored) in entries.iter().zip(&fixture.chunks) {
        assert_eq!(entry.coord, stored.coord);
        assert_eq!(entry.offset, stored.address);
        assert_eq!(dataset.index().resolve(source, &entry.coord).unwrap().as_ref(), Some(entry));
    }
    assert_eq!(dataset.index().resolve(source, &[3, 7]).unwrap(), None);
    assert_eq!(dataset.index().resolve(source, &[10, 0]).unwrap(), None);

    let values = dataset.read_full().unwrap().into_vec::<i32>().unwrap();
    for (i, v) in values.iter().enumerate() {
        let (row, col) = (i as u64 / 20, i as u64 % 20);
        let expected = if (row / 2, col / 2) == (3, 7) { 0 } else { i as i32 };
        assert_eq!(*v, expected);
    }
}

#[test]
fn cancelled_read_returns_nothing() {
    init();
    let dataset = int32_gzip(&[2, 2]).open();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = dataset.read_full_with(&cancel).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    let region = Region::from_ranges(&[0..7, 0..5]).unwrap();
    let err = dataset.read_region_with(&region, &cancel).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(dataset.cache_stats().misses, 0);
}

/// Cancels `cancel` as soon as a chunk payload has been read.
struct CancelAfterChunk {
    inner: MemorySource,
    chunk_addresses: HashSet<u64>,
    cancel: CancellationToken,
    chunk_reads: AtomicUsize,
}

impl ByteSource for CancelAfterChunk {
    fn read(&self, offset: u64, length: u64) -> hdf5_chunked::Result<Bytes> {
        let bytes = self.inner.read(offset, length)?;
        if self.chunk_addresses.contains(&offset) {
            self.chunk_reads.fetch_add(1, Ordering::SeqCst);
            self.cancel.cancel();
        }
        Ok(bytes)
    }

    fn size(&self) -> Option<u64> {
        self.inner.size()
    }
}

#[test]
fn cancellation_stops_at_next_chunk() {
    init();
    let fixture = int32_gzip(&[2, 2]);
    let open = || {
        let cancel = CancellationToken::new();
        let source = CancelAfterChunk {
            inner: fixture.source(),
            chunk_addresses: fixture.chunks.iter().map(|c| c.address).collect(),
            cancel: cancel.clone(),
            chunk_reads: AtomicUsize::new(0),
        };
        let descriptor = fixture
            .descriptor
            .clone()
            .with_cache(ChunkCacheConfig::disabled());
        (ChunkedDataset::open(source, descriptor).unwrap(), cancel)
    };

    let (dataset, cancel) = open();
    let err = dataset.read_full_with(&cancel).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(dataset.source().chunk_reads.load(Ordering::SeqCst), 1);

    let (dataset, cancel) = open();
    let region = Region::from_ranges(&[1..7, 0..5]).unwrap();
    let err = dataset.read_region_with(&region, &cancel).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(dataset.source().chunk_reads.load(Ordering::SeqCst), 1);
}

#[test]
fn checksum_applied_before_compression() {
    init();
    let shape = [7, 5];
    let fixture = FixtureBuilder::new(&shape, &[3, 2], int32())
        .filter(FLETCHER32, &[])
        .filter(DEFLATE, &[6])
        .build(|c| (linear(&shape, c) as i32).to_le_bytes().to_vec());
    let array = fixture.open().read_full().unwrap();
    assert_eq!(array.into_vec::<i32>().unwrap(), expected_range(35));

    let region = Region::from_ranges(&[2..5, 1..4]).unwrap();
    let values = fixture.open().read_region(&region).unwrap().into_vec::<i32>().unwrap();
    assert_eq!(values, vec![11, 12, 13, 16, 17, 18, 21, 22, 23]);
}

#[test]
fn corrupt_chunk_reports_its_coordinate() {
    init();
    let shape = [6, 6];
    let fixture = FixtureBuilder::new(&shape, &[3, 3], int32())
        .filter(DEFLATE, &[])
        .filter(FLETCHER32, &[])
        .corrupt(&[1, 0])
        .build(|c| (linear(&shape, c) as i32).to_le_bytes().to_vec());
    let dataset = fixture.open();

    let err = dataset.read_full().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuralCorruption);
    assert_eq!(err.chunk_coord(), Some(&[1u64, 0][..]));
    let corrupt = &fixture.chunks[2];
    assert_eq!(corrupt.coord, vec![1, 0]);
    match err {
        Error::Chunk { offset, source, .. } => {
            assert_eq!(offset, corrupt.address);
            assert!(matches!(*source, Error::ChecksumMismatch { .. }));
        }
        other => panic!("unexpected error {other}"),
    }

    // the other chunks are unaffected
    let top = dataset
        .read_region(&Region::from_ranges(&[0..3, 0..6]).unwrap())
        .unwrap();
    assert_eq!(top.into_vec::<i32>().unwrap(), expected_range(18));
}

#[test]
fn unknown_filter_only_fails_chunks_using_it() {
    init();
    let shape = [4, 4];
    let fixture = FixtureBuilder::new(&shape, &[2, 2], int32())
        .filter(DEFLATE, &[])
        .filter(32001, &[7])
        .mask(&[0, 1], 0)
        .build(|c| (linear(&shape, c) as i32).to_le_bytes().to_vec());
    let dataset = fixture.open();

    let err = dataset.read_full().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    assert_eq!(err.chunk_coord(), Some(&[0u64, 1][..]));
    assert!(err.to_string().contains("32001"), "{err}");

    let left = dataset
        .read_region(&Region::from_ranges(&[0..4, 0..2]).unwrap())
        .unwrap();
    assert_eq!(left.into_vec::<i32>().unwrap(), vec![0, 1, 4, 5, 8, 9, 12, 13]);
    assert!(dataset.chunk(&[1, 1]).unwrap().is_some());
    assert!(dataset.chunk(&[0, 1]).is_err());
}

#[test]
fn chunk_stored_without_compression() {
    init();
    let shape = [4, 4];
    let fixture = FixtureBuilder::new(&shape, &[2, 2], int32())
        .filter(SHUFFLE, &[])
        .filter(DEFLATE, &[])
        .mask(&[1, 1], 0b10)
        .build(|c| (linear(&shape, c) as i32).to_le_bytes().to_vec());
    assert_eq!(fixture.chunks[3].size, 16);
    let values = fixture.open().read_full().unwrap().into_vec::<i32>().unwrap();
    assert_eq!(values, expected_range(16));
}

#[test]
fn oversized_unfiltered_chunk_is_size_mismatch() {
    init();
    let shape = [4];
    let fixture = FixtureBuilder::new(&shape, &[2], int32())
        .pad(&[1], 4)
        .build(|c| (c[0] as i32).to_le_bytes().to_vec());
    let dataset = fixture.open();
    let err = dataset.read_full().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeMismatch);
    assert_eq!(err.chunk_coord(), Some(&[1u64][..]));
    let first = dataset
        .read_region(&Region::from_ranges(&[0..2]).unwrap())
        .unwrap();
    assert_eq!(first.into_vec::<i32>().unwrap(), vec![0, 1]);
}

#[test]
fn big_endian_with_full_pipeline() {
    init();
    let shape = [5, 7];
    let value = |c: &[u64]| -> i64 { (linear(&shape, c) as i64 - 17) * 1_000_000_007 };
    let fixture = FixtureBuilder::new(
        &shape,
        &[2, 3],
        dtype(NumericClass::SignedFixedPoint, 64, ByteOrder::BigEndian),
    )
    .filter(SHUFFLE, &[8])
    .filter(DEFLATE, &[9])
    .filter(FLETCHER32, &[])
    .build(|c| value(c).to_be_bytes().to_vec());
    let array = fixture.open().read_full().unwrap();
    for row in 0..5u64 {
        for col in 0..7u64 {
            assert_eq!(array.get::<i64>(&[row, col]), Some(value(&[row, col])));
        }
    }
}

#[test]
fn truncated_index_is_corrupt() {
    init();
    let mut fixture = int32_gzip(&[4, 4]);
    // the root leaf is written last
    let len = fixture.bytes.len();
    fixture.bytes.truncate(len - 5);
    let err = fixture.open().read_full().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuralCorruption);
    assert_eq!(err.chunk_coord(), None);
}

#[test]
fn file_backed_source() {
    init();
    let fixture = int32_gzip(&[3, 2]);
    let path = std::env::temp_dir().join(format!("hdf5_chunked_read_{}.bin", std::process::id()));
    std::fs::write(&path, &fixture.bytes).unwrap();
    let source = FileSource::open(&path).unwrap();
    let dataset = ChunkedDataset::open(source, fixture.descriptor.clone()).unwrap();
    let values = dataset.read_full().unwrap().into_vec::<i32>().unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(values, expected_range(35));
}

#[test]
fn open_from_json_metadata() {
    init();
    let fixture = int32_gzip(&[3, 2]);
    let ChunkIndexRoot::BTree { address, .. } = &fixture.root else {
        unreachable!()
    };
    let json = format!(
        r#"{{
            "dimensions": [7, 5],
            "chunkDimensions": [3, 2],
            "datatype": {{"byteOrder": "littleEndian", "class": "signedFixedPoint", "bitSize": 32}},
            "filters": [{{"id": 1, "name": "deflate", "clientData": [6]}}],
            "chunkIndex": {{"type": "btree", "address": {address}}},
            "fillValue": -1,
            "cache": {{"maxChunks": 8}}
        }}"#
    );
    let meta: DatasetMetadata = serde_json::from_str(&json).unwrap();
    let descriptor = DatasetDescriptor::try_from(meta).unwrap();
    let dataset = ChunkedDataset::open(fixture.source(), descriptor).unwrap();
    assert_eq!(dataset.fill_value(), &TypedBuffer::Int32(vec![-1]));
    let values = dataset.read_full().unwrap().into_vec::<i32>().unwrap();
    assert_eq!(values, expected_range(35));
}
