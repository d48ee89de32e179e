//! Assembling decoded chunks into a logical array.
//!
//! The output is pre-filled with the fill value, so chunks that were never
//! written need no further work. Every stored chunk overlapping the target
//! is decoded and its in-bounds part copied into place.

use crate::Error;
use crate::buffer::{LogicalArray, TypedBuffer};
use crate::cache::ChunkCacheConfig;
use crate::cancel::CancellationToken;
use crate::chunk::ChunkIndexEntry;
use crate::dataset::{ChunkedDataset, DatasetDescriptor};
use crate::datatype::DatatypeDescriptor;
use crate::filter::FilterPipelineDescriptor;
use crate::index::ChunkIndexRoot;
use crate::layout::{ChunkLayout, Dataspace, Region};
use crate::storage::ByteSource;

pub(crate) struct Assembler<'a, S> {
    dataset: &'a ChunkedDataset<S>,
    cancel: &'a CancellationToken,
}

impl<'a, S: ByteSource> Assembler<'a, S> {
    pub(crate) fn new(dataset: &'a ChunkedDataset<S>, cancel: &'a CancellationToken) -> Self {
        Self { dataset, cancel }
    }

    fn output(&self, target: &Region) -> crate::Result<TypedBuffer> {
        let len = usize::try_from(target.num_elements()?).map_err(|_| {
            Error::invalid(format!("{:?} elements do not fit in memory", target.count()))
        })?;
        TypedBuffer::repeat(self.dataset.fill_value(), len)
    }

    /// Every stored chunk, found by walking the whole index.
    pub(crate) fn full(&self) -> crate::Result<LogicalArray> {
        let target = self.dataset.dataspace().full_region();
        let mut out = self.output(&target)?;
        if !target.is_empty() {
            let index = self.dataset.index();
            for entry in index.entries_with(self.dataset.source(), self.cancel.clone()) {
                let entry = entry?;
                self.cancel.check()?;
                self.place(&mut out, &target, &entry)?;
            }
        }
        LogicalArray::new(target.count().to_vec(), out)
    }

    /// Only the chunks touching `target`, each looked up by coordinate.
    pub(crate) fn region(&self, target: &Region) -> crate::Result<LogicalArray> {
        target.check_within(self.dataset.dataspace())?;
        let mut out = self.output(target)?;
        let layout = self.dataset.layout();
        let index = self.dataset.index();
        for coord in layout.chunks_intersecting(target) {
            self.cancel.check()?;
            match index.resolve_with(self.dataset.source(), &coord, self.cancel)? {
                Some(entry) => self.place(&mut out, target, &entry)?,
                None => log::trace!("chunk {coord:?} not allocated, using fill value"),
            }
        }
        LogicalArray::new(target.count().to_vec(), out)
    }

    /// Copy the part of a chunk inside `target` into `out`, which is shaped like `target`.
    fn place(
        &self,
        out: &mut TypedBuffer,
        target: &Region,
        entry: &ChunkIndexEntry,
    ) -> crate::Result<()> {
        let layout = self.dataset.layout();
        let chunk_region = layout.chunk_region(&entry.coord);
        let Some(overlap) = chunk_region.intersect(target) else {
            log::trace!("chunk {:?} lies outside {target:?}", entry.coord);
            return Ok(());
        };
        let chunk = self.dataset.load_chunk(entry)?;
        let dst_start: Vec<u64> = overlap
            .start()
            .iter()
            .zip(target.start())
            .map(|(o, t)| o - t)
            .collect();
        let src_start: Vec<u64> = overlap
            .start()
            .iter()
            .zip(chunk_region.start())
            .map(|(o, c)| o - c)
            .collect();
        out.copy_block(
            target.count(),
            &dst_start,
            &chunk,
            layout.extents(),
            &src_start,
            overlap.count(),
        )
        .map_err(|e| e.in_chunk(&entry.coord, entry.offset))
    }
}

fn open_uncached<S: ByteSource>(
    source: S,
    root: &ChunkIndexRoot,
    dataspace: &Dataspace,
    layout: &ChunkLayout,
    datatype: &DatatypeDescriptor,
    filters: &FilterPipelineDescriptor,
) -> crate::Result<ChunkedDataset<S>> {
    let descriptor = DatasetDescriptor::new(
        dataspace.clone(),
        layout.clone(),
        datatype.clone(),
        root.clone(),
    )
    .with_filters(filters.clone())
    .with_cache(ChunkCacheConfig::disabled());
    ChunkedDataset::open(source, descriptor)
}

/// Read a whole dataset without keeping a handle; see [ChunkedDataset::read_full].
pub fn read_full<S: ByteSource>(
    source: S,
    root: &ChunkIndexRoot,
    dataspace: &Dataspace,
    layout: &ChunkLayout,
    datatype: &DatatypeDescriptor,
    filters: &FilterPipelineDescriptor,
) -> crate::Result<LogicalArray> {
    open_uncached(source, root, dataspace, layout, datatype, filters)?.read_full()
}

/// Read part of a dataset without keeping a handle; see [ChunkedDataset::read_region].
pub fn read_region<S: ByteSource>(
    source: S,
    root: &ChunkIndexRoot,
    dataspace: &Dataspace,
    layout: &ChunkLayout,
    datatype: &DatatypeDescriptor,
    filters: &FilterPipelineDescriptor,
    region: &Region,
) -> crate::Result<LogicalArray> {
    open_uncached(source, root, dataspace, layout, datatype, filters)?.read_region(region)
}
