//! Synthetic containers: chunk payloads plus a version 1 B-tree over them,
//! laid out in one byte vector.
#![allow(dead_code)]

use std::collections::HashMap;

use hdf5_chunked::datatype::DatatypeDescriptor;
use hdf5_chunked::filter::{
    FilterContext, FilterDescriptor, FilterPipeline, FilterPipelineDescriptor,
};
use hdf5_chunked::index::ChunkIndexRoot;
use hdf5_chunked::layout::ChunkGridIter;
use hdf5_chunked::{ChunkLayout, ChunkedDataset, DatasetDescriptor, Dataspace, MemorySource};

pub fn init() {
    env_logger::try_init().ok();
}

/// Row-major linear index of `coord` in `shape`.
pub fn linear(shape: &[u64], coord: &[u64]) -> u64 {
    coord.iter().zip(shape).fold(0, |acc, (&c, &n)| acc * n + c)
}

#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub coord: Vec<u64>,
    pub address: u64,
    pub size: u32,
    pub mask: u32,
}

#[derive(Debug)]
pub struct Fixture {
    pub bytes: Vec<u8>,
    pub root: ChunkIndexRoot,
    pub descriptor: DatasetDescriptor,
    pub chunks: Vec<StoredChunk>,
}

impl Fixture {
    pub fn source(&self) -> MemorySource {
        MemorySource::new(self.bytes.clone())
    }

    pub fn open(&self) -> ChunkedDataset<MemorySource> {
        ChunkedDataset::open(self.source(), self.descriptor.clone()).unwrap()
    }
}

pub struct FixtureBuilder {
    shape: Vec<u64>,
    chunk: Vec<u64>,
    datatype: DatatypeDescriptor,
    filters: Vec<FilterDescriptor>,
    fanout: usize,
    offset_size: u8,
    single: bool,
    missing: Vec<Vec<u64>>,
    masks: HashMap<Vec<u64>, u32>,
    corrupt: Vec<Vec<u64>>,
    padding: HashMap<Vec<u64>, usize>,
}

impl FixtureBuilder {
    pub fn new(shape: &[u64], chunk: &[u64], datatype: DatatypeDescriptor) -> Self {
        Self {
            shape: shape.to_vec(),
            chunk: chunk.to_vec(),
            datatype,
            filters: vec![],
            fanout: 4,
            offset_size: 8,
            single: false,
            missing: vec![],
            masks: HashMap::new(),
            corrupt: vec![],
            padding: HashMap::new(),
        }
    }

    /// A stage of the pipeline. Stages without a registered implementation
    /// are declared but never applied, and masked out of every chunk by default.
    pub fn filter(mut self, id: u16, client_data: &[u32]) -> Self {
        self.filters
            .push(FilterDescriptor::new(id, client_data.to_vec()));
        self
    }

    /// Maximum children per B-tree node.
    pub fn fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn offset_size(mut self, offset_size: u8) -> Self {
        self.offset_size = offset_size;
        self
    }

    /// Store the only chunk without a tree.
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    /// Never write this chunk.
    pub fn missing(mut self, coord: &[u64]) -> Self {
        self.missing.push(coord.to_vec());
        self
    }

    /// Skip the stages set in `mask` for this chunk, on write and in its key.
    pub fn mask(mut self, coord: &[u64], mask: u32) -> Self {
        self.masks.insert(coord.to_vec(), mask);
        self
    }

    /// Flip a byte of this chunk after filtering.
    pub fn corrupt(mut self, coord: &[u64]) -> Self {
        self.corrupt.push(coord.to_vec());
        self
    }

    /// Append junk bytes to this chunk after filtering.
    pub fn pad(mut self, coord: &[u64], extra: usize) -> Self {
        self.padding.insert(coord.to_vec(), extra);
        self
    }

    fn default_mask(&self) -> u32 {
        self.filters
            .iter()
            .enumerate()
            .filter(|(_, f)| hdf5_chunked::filter::plugin(f.id).is_none())
            .fold(0, |m, (i, _)| m | 1 << i)
    }

    /// Lay out every chunk, encoding element `coord` with `value`.
    pub fn build(self, value: impl Fn(&[u64]) -> Vec<u8>) -> Fixture {
        let element_size = self.datatype.element_size();
        let layout = ChunkLayout::new(self.chunk.clone()).unwrap();
        let dataspace = Dataspace::new(self.shape.clone());
        let chunk_elements = layout.chunk_elements().unwrap() as usize;
        let context = FilterContext {
            element_size,
            chunk_bytes: chunk_elements * element_size,
        };

        let mut bytes = vec![0u8; 64];
        let mut chunks = Vec::new();
        for coord in ChunkGridIter::new(vec![0; self.shape.len()], layout.grid_shape(&dataspace)) {
            if self.missing.contains(&coord) {
                continue;
            }
            let origin = layout.origin(&coord);
            let mut raw = Vec::with_capacity(context.chunk_bytes);
            for local in ChunkGridIter::new(vec![0; self.chunk.len()], self.chunk.clone()) {
                let global: Vec<u64> = origin.iter().zip(&local).map(|(o, l)| o + l).collect();
                if global.iter().zip(&self.shape).all(|(g, n)| g < n) {
                    let encoded = value(&global);
                    assert_eq!(encoded.len(), element_size);
                    raw.extend(encoded);
                } else {
                    raw.extend(vec![0u8; element_size]);
                }
            }

            let mask = self.masks.get(&coord).copied().unwrap_or(self.default_mask());
            let mut stored = raw;
            for (i, filter) in self.filters.iter().enumerate() {
                if mask & (1 << i) != 0 || hdf5_chunked::filter::plugin(filter.id).is_none() {
                    continue;
                }
                let stage = FilterPipelineDescriptor::new(vec![filter.clone()]);
                stored = FilterPipeline::new(&stage, context)
                    .unwrap()
                    .encode(&stored)
                    .unwrap();
            }
            if self.corrupt.contains(&coord) {
                let mid = stored.len() / 2;
                stored[mid] ^= 0x5A;
            }
            if let Some(&extra) = self.padding.get(&coord) {
                stored.extend(vec![0xEE; extra]);
            }

            let address = append(&mut bytes, &stored);
            chunks.push(StoredChunk {
                coord,
                address,
                size: stored.len() as u32,
                mask,
            });
        }

        let root = if self.single {
            assert_eq!(chunks.len(), 1, "single chunk storage needs exactly one chunk");
            ChunkIndexRoot::Single {
                address: chunks[0].address,
                stored_size: chunks[0].size as u64,
                filter_mask: chunks[0].mask,
            }
        } else if chunks.is_empty() {
            ChunkIndexRoot::BTree {
                address: u64::MAX,
                offset_size: self.offset_size,
            }
        } else {
            let address =
                write_btree(&mut bytes, &self.chunk, &chunks, self.fanout, self.offset_size);
            ChunkIndexRoot::BTree {
                address,
                offset_size: self.offset_size,
            }
        };

        let descriptor = DatasetDescriptor::new(dataspace, layout, self.datatype, root.clone())
            .with_filters(FilterPipelineDescriptor::new(self.filters));
        Fixture {
            bytes,
            root,
            descriptor,
            chunks,
        }
    }
}

fn append(bytes: &mut Vec<u8>, data: &[u8]) -> u64 {
    let address = bytes.len().next_multiple_of(8);
    bytes.resize(address, 0);
    bytes.extend_from_slice(data);
    address as u64
}

#[derive(Debug, Clone)]
struct Key {
    size: u32,
    mask: u32,
    offsets: Vec<u64>,
}

impl Key {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend(self.size.to_le_bytes());
        buf.extend(self.mask.to_le_bytes());
        for o in &self.offsets {
            buf.extend(o.to_le_bytes());
        }
        buf.extend(0u64.to_le_bytes());
    }
}

fn write_node(
    bytes: &mut Vec<u8>,
    level: u8,
    keys: &[Key],
    children: &[u64],
    offset_size: u8,
) -> u64 {
    let os = offset_size as usize;
    let mut buf = b"TREE".to_vec();
    buf.push(1);
    buf.push(level);
    buf.extend((children.len() as u16).to_le_bytes());
    buf.extend(vec![0xFF; 2 * os]);
    for (key, child) in keys.iter().zip(children) {
        key.write(&mut buf);
        buf.extend(&child.to_le_bytes()[..os]);
    }
    keys[children.len()].write(&mut buf);
    append(bytes, &buf)
}

/// Write the tree bottom-up; returns the root address.
fn write_btree(
    bytes: &mut Vec<u8>,
    chunk: &[u64],
    chunks: &[StoredChunk],
    fanout: usize,
    offset_size: u8,
) -> u64 {
    let offsets =
        |coord: &[u64]| -> Vec<u64> { coord.iter().zip(chunk).map(|(c, e)| c * e).collect() };
    let mut end = chunks[chunks.len() - 1].coord.clone();
    if let Some(last) = end.last_mut() {
        *last += 1;
    }
    let end = Key {
        size: 0,
        mask: 0,
        offsets: offsets(&end),
    };

    // (first key, final key, address) of each node at the current level
    let mut level: Vec<(Key, Key, u64)> = Vec::new();
    for (g, group) in chunks.chunks(fanout).enumerate() {
        let mut keys: Vec<Key> = group
            .iter()
            .map(|c| Key {
                size: c.size,
                mask: c.mask,
                offsets: offsets(&c.coord),
            })
            .collect();
        // the final key of a leaf is the first key of the next one
        let next = chunks
            .get((g + 1) * fanout)
            .map(|c| Key {
                size: 0,
                mask: 0,
                offsets: offsets(&c.coord),
            })
            .unwrap_or_else(|| end.clone());
        keys.push(next.clone());
        let children: Vec<u64> = group.iter().map(|c| c.address).collect();
        let first = keys[0].clone();
        let address = write_node(bytes, 0, &keys, &children, offset_size);
        level.push((first, next, address));
    }

    let mut height = 0u8;
    while level.len() > 1 {
        height += 1;
        let mut parents = Vec::new();
        for group in level.chunks(fanout) {
            let mut keys: Vec<Key> = group.iter().map(|(first, _, _)| first.clone()).collect();
            let last = group[group.len() - 1].1.clone();
            keys.push(last.clone());
            let children: Vec<u64> = group.iter().map(|(_, _, a)| *a).collect();
            let address = write_node(bytes, height, &keys, &children, offset_size);
            parents.push((keys[0].clone(), last, address));
        }
        level = parents;
    }
    level[0].2
}
