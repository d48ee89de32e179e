//! An opened chunked dataset.

use std::sync::Arc;

use crate::assemble::Assembler;
use crate::buffer::{ElementType, LogicalArray, TypedBuffer};
use crate::cache::{CacheStats, ChunkCache, ChunkCacheConfig};
use crate::cancel::CancellationToken;
use crate::chunk::ChunkIndexEntry;
use crate::datatype::DatatypeDescriptor;
use crate::filter::{FilterContext, FilterPipeline, FilterPipelineDescriptor};
use crate::index::{ChunkIndex, ChunkIndexRoot};
use crate::layout::{ChunkLayout, Dataspace, Region};
use crate::Error;
use crate::storage::{ByteSource, read_checked};

/// Everything needed to read a chunked dataset, as found in its object header.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetDescriptor {
    pub dataspace: Dataspace,
    pub layout: ChunkLayout,
    pub datatype: DatatypeDescriptor,
    pub filters: FilterPipelineDescriptor,
    pub chunk_index: ChunkIndexRoot,
    /// A single element; zero if absent.
    pub fill_value: Option<TypedBuffer>,
    pub cache: ChunkCacheConfig,
}

impl DatasetDescriptor {
    pub fn new(
        dataspace: Dataspace,
        layout: ChunkLayout,
        datatype: DatatypeDescriptor,
        chunk_index: ChunkIndexRoot,
    ) -> Self {
        Self {
            dataspace,
            layout,
            datatype,
            filters: FilterPipelineDescriptor::default(),
            chunk_index,
            fill_value: None,
            cache: ChunkCacheConfig::default(),
        }
    }

    pub fn with_filters(mut self, filters: FilterPipelineDescriptor) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_fill_value(mut self, fill_value: TypedBuffer) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    pub fn with_cache(mut self, cache: ChunkCacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

/// A chunked dataset over a byte source.
///
/// Reads take `&self` and may run concurrently from many threads;
/// decoded chunks are shared through a cache owned by this handle.
#[derive(Debug)]
pub struct ChunkedDataset<S> {
    source: S,
    dataspace: Dataspace,
    datatype: DatatypeDescriptor,
    element_type: ElementType,
    chunk_bytes: usize,
    pipeline: FilterPipeline,
    index: ChunkIndex,
    fill: TypedBuffer,
    cache: ChunkCache,
}

impl<S: ByteSource> ChunkedDataset<S> {
    /// Validate the descriptor and set up the filters, index and cache.
    ///
    /// Unsupported datatypes fail here; unknown filters only fail the chunks that use them.
    pub fn open(source: S, descriptor: DatasetDescriptor) -> crate::Result<Self> {
        let DatasetDescriptor {
            dataspace,
            layout,
            datatype,
            filters,
            chunk_index,
            fill_value,
            cache,
        } = descriptor;
        layout.check_rank(&dataspace)?;
        dataspace.check_size()?;
        let element_type = datatype.element_type()?;
        let element_size = datatype.element_size();
        let chunk_bytes = usize::try_from(layout.chunk_elements()?)
            .ok()
            .and_then(|n| n.checked_mul(element_size))
            .ok_or_else(|| {
                Error::invalid(format!("chunk of {:?} elements is too large", layout.extents()))
            })?;

        let fill = match fill_value {
            Some(fill) => {
                if fill.element_type() != element_type || fill.len() != 1 {
                    return Err(Error::invalid(format!(
                        "fill value must be one {element_type:?} element, got {} {:?}",
                        fill.len(),
                        fill.element_type()
                    )));
                }
                fill
            }
            None => datatype.decode(&vec![0; element_size])?,
        };

        let pipeline = FilterPipeline::new(
            &filters,
            FilterContext {
                element_size,
                chunk_bytes,
            },
        )?;

        log::debug!(
            "opened dataset {:?} chunked {:?} of {element_type:?}, filters {:?}",
            dataspace.extents(),
            layout.extents(),
            filters.filters.iter().map(|f| f.id).collect::<Vec<_>>()
        );

        Ok(Self {
            source,
            dataspace,
            datatype,
            element_type,
            chunk_bytes,
            pipeline,
            index: ChunkIndex::new(chunk_index, layout)?,
            fill,
            cache: ChunkCache::new(cache),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn dataspace(&self) -> &Dataspace {
        &self.dataspace
    }

    pub fn layout(&self) -> &ChunkLayout {
        self.index.layout()
    }

    pub fn datatype(&self) -> &DatatypeDescriptor {
        &self.datatype
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn fill_value(&self) -> &TypedBuffer {
        &self.fill
    }

    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Read the whole dataset.
    pub fn read_full(&self) -> crate::Result<LogicalArray> {
        self.read_full_with(&CancellationToken::new())
    }

    pub fn read_full_with(&self, cancel: &CancellationToken) -> crate::Result<LogicalArray> {
        Assembler::new(self, cancel).full()
    }

    /// Read the elements of `region`, which must lie within the dataspace.
    pub fn read_region(&self, region: &Region) -> crate::Result<LogicalArray> {
        self.read_region_with(region, &CancellationToken::new())
    }

    pub fn read_region_with(
        &self,
        region: &Region,
        cancel: &CancellationToken,
    ) -> crate::Result<LogicalArray> {
        Assembler::new(self, cancel).region(region)
    }

    /// The decoded chunk at `coord`, or `None` if it was never written.
    ///
    /// The chunk has the full chunk extents, including any elements past the dataset boundary.
    pub fn chunk(&self, coord: &[u64]) -> crate::Result<Option<Arc<TypedBuffer>>> {
        match self.index.resolve(&self.source, coord)? {
            Some(entry) => self.load_chunk(&entry).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn load_chunk(&self, entry: &ChunkIndexEntry) -> crate::Result<Arc<TypedBuffer>> {
        self.cache
            .get_or_try_insert(&entry.coord, || self.decode_chunk(entry))
            .map_err(|e| e.in_chunk(&entry.coord, entry.offset))
    }

    fn decode_chunk(&self, entry: &ChunkIndexEntry) -> crate::Result<TypedBuffer> {
        log::trace!(
            "decoding chunk {:?}: {} bytes at {:#x}, mask {:#x}",
            entry.coord,
            entry.stored_size,
            entry.offset,
            entry.filter_mask
        );
        let raw = read_checked(&self.source, entry.offset, entry.stored_size, "chunk")?;
        let bytes = self
            .pipeline
            .decode(&raw, entry.filter_mask, self.chunk_bytes)?;
        self.datatype.decode(&bytes)
    }
}
