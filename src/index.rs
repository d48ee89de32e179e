//! Locating the stored chunks of a dataset.
//!
//! The index is read on demand: [ChunkIndex::resolve] descends from the root
//! to a single leaf, and [ChunkIndex::entries] walks the tree lazily with an
//! explicit stack, so no more than one path of nodes is held at a time.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

mod btree;

use crate::Error;
use crate::cancel::CancellationToken;
use crate::chunk::ChunkIndexEntry;
use crate::layout::ChunkLayout;
use crate::storage::ByteSource;

use btree::{Node, is_undefined};

fn default_offset_size() -> u8 {
    8
}

/// How the chunk index of a dataset is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChunkIndexRoot {
    /// A version 1 B-tree rooted at `address`.
    ///
    /// An undefined (all ones) address means no chunk has been allocated.
    #[serde(rename = "btree")]
    BTree {
        address: u64,
        /// Width in bytes of file addresses: 2, 4 or 8.
        #[serde(default = "default_offset_size")]
        offset_size: u8,
    },
    /// The dataset's only chunk, stored without a tree.
    Single {
        address: u64,
        stored_size: u64,
        #[serde(default)]
        filter_mask: u32,
    },
}

impl ChunkIndexRoot {
    pub fn btree(address: u64) -> Self {
        Self::BTree {
            address,
            offset_size: default_offset_size(),
        }
    }
}

/// Lookup of chunk locations for one dataset.
#[derive(Debug, Clone)]
pub struct ChunkIndex {
    root: ChunkIndexRoot,
    layout: ChunkLayout,
}

impl ChunkIndex {
    pub fn new(root: ChunkIndexRoot, layout: ChunkLayout) -> crate::Result<Self> {
        if let ChunkIndexRoot::BTree { offset_size, .. } = root {
            if !matches!(offset_size, 2 | 4 | 8) {
                return Err(Error::invalid(format!(
                    "offset size must be 2, 4 or 8, got {offset_size}"
                )));
            }
        }
        Ok(Self { root, layout })
    }

    pub fn root(&self) -> &ChunkIndexRoot {
        &self.root
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    fn single_entry(&self) -> Option<ChunkIndexEntry> {
        match self.root {
            ChunkIndexRoot::Single {
                address,
                stored_size,
                filter_mask,
            } => Some(ChunkIndexEntry {
                coord: vec![0; self.layout.rank()],
                offset: address,
                stored_size,
                filter_mask,
            }),
            ChunkIndexRoot::BTree { .. } => None,
        }
    }

    /// Root node address, or `None` for a tree with nothing allocated.
    fn tree_root(&self) -> Option<(u64, u8)> {
        match self.root {
            ChunkIndexRoot::BTree {
                address,
                offset_size,
            } if !is_undefined(address, offset_size) => Some((address, offset_size)),
            _ => None,
        }
    }

    /// Find the stored chunk at `coord`, or `None` if it was never allocated.
    pub fn resolve<S: ByteSource + ?Sized>(
        &self,
        source: &S,
        coord: &[u64],
    ) -> crate::Result<Option<ChunkIndexEntry>> {
        self.resolve_with(source, coord, &CancellationToken::new())
    }

    /// As [ChunkIndex::resolve], checking `cancel` before each node is read.
    pub fn resolve_with<S: ByteSource + ?Sized>(
        &self,
        source: &S,
        coord: &[u64],
        cancel: &CancellationToken,
    ) -> crate::Result<Option<ChunkIndexEntry>> {
        if coord.len() != self.layout.rank() {
            return Err(Error::invalid(format!(
                "chunk coordinate {coord:?} does not have rank {}",
                self.layout.rank()
            )));
        }
        if let Some(entry) = self.single_entry() {
            return Ok((entry.coord == coord).then_some(entry));
        }
        let Some((mut address, offset_size)) = self.tree_root() else {
            return Ok(None);
        };

        let mut expected_level = None;
        loop {
            cancel.check()?;
            let node = Node::read(source, address, &self.layout, offset_size)?;
            node.expect_level(expected_level)?;
            if node.is_leaf() {
                return Ok(node.entry_for(coord).map(|i| leaf_entry(&node, i)));
            }
            let Some(i) = node.child_for(coord) else {
                return Ok(None);
            };
            address = node.children[i];
            expected_level = Some(node.level - 1);
        }
    }

    /// All stored chunks, in coordinate order.
    pub fn entries<'a, S: ByteSource + ?Sized>(&'a self, source: &'a S) -> ChunkEntries<'a, S> {
        self.entries_with(source, CancellationToken::new())
    }

    /// As [ChunkIndex::entries], checking `cancel` before each node is read.
    pub fn entries_with<'a, S: ByteSource + ?Sized>(
        &'a self,
        source: &'a S,
        cancel: CancellationToken,
    ) -> ChunkEntries<'a, S> {
        let mut entries = ChunkEntries {
            index: self,
            source,
            cancel,
            offset_size: 8,
            stack: Vec::new(),
            pending: VecDeque::new(),
        };
        if let Some(entry) = self.single_entry() {
            entries.pending.push_back(entry);
        } else if let Some((address, offset_size)) = self.tree_root() {
            entries.offset_size = offset_size;
            entries.stack.push((address, None));
        }
        entries
    }
}

fn leaf_entry(node: &Node, i: usize) -> ChunkIndexEntry {
    ChunkIndexEntry {
        coord: node.coords[i].clone(),
        offset: node.children[i],
        stored_size: node.keys[i].stored_size as u64,
        filter_mask: node.keys[i].filter_mask,
    }
}

/// Lazy depth-first walk over the leaves of a chunk index.
///
/// Yields at most one error, after which it is exhausted.
pub struct ChunkEntries<'a, S: ?Sized> {
    index: &'a ChunkIndex,
    source: &'a S,
    cancel: CancellationToken,
    offset_size: u8,
    /// Nodes still to visit, with the level their parent expects.
    stack: Vec<(u64, Option<u8>)>,
    pending: VecDeque<ChunkIndexEntry>,
}

impl<S: ByteSource + ?Sized> ChunkEntries<'_, S> {
    fn visit(&mut self, address: u64, level: Option<u8>) -> crate::Result<()> {
        self.cancel.check()?;
        let node = Node::read(self.source, address, &self.index.layout, self.offset_size)?;
        node.expect_level(level)?;
        if node.is_leaf() {
            self.pending
                .extend((0..node.len()).map(|i| leaf_entry(&node, i)));
        } else {
            let child_level = Some(node.level - 1);
            self.stack
                .extend(node.children.iter().rev().map(|&c| (c, child_level)));
        }
        Ok(())
    }
}

impl<S: ByteSource + ?Sized> Iterator for ChunkEntries<'_, S> {
    type Item = crate::Result<ChunkIndexEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(Ok(entry));
            }
            let (address, level) = self.stack.pop()?;
            if let Err(e) = self.visit(address, level) {
                self.stack.clear();
                return Some(Err(e));
            }
        }
    }
}
