//! Version 1 B-tree nodes indexing raw data chunks.
//!
//! ```text
//! "TREE" | type: u8 | level: u8 | entries: u16 | left sibling | right sibling
//! key[0] | child[0] | key[1] | child[1] | ... | child[n-1] | key[n]
//! ```
//!
//! Addresses are `offset_size` bytes, all little-endian.
//! At level 0 the children are chunk addresses and key `i` describes child `i`;
//! above it they are nodes one level down, and key `i` is the smallest key in child `i`.

use crate::chunk::ChunkKey;
use crate::layout::ChunkLayout;
use crate::storage::{ByteSource, read_checked};

pub(crate) const SIGNATURE: &[u8; 4] = b"TREE";
pub(crate) const RAW_DATA_NODE: u8 = 1;

/// Whether an address is the all-ones "undefined" marker.
pub(crate) fn is_undefined(address: u64, offset_size: u8) -> bool {
    let bits = offset_size as u32 * 8;
    address == u64::MAX || (bits < 64 && address == (1u64 << bits) - 1)
}

fn read_address(bytes: &[u8], offset_size: u8) -> u64 {
    let mut raw = [0u8; 8];
    raw[..offset_size as usize].copy_from_slice(&bytes[..offset_size as usize]);
    u64::from_le_bytes(raw)
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) address: u64,
    pub(crate) level: u8,
    /// Chunk coordinates of the first `children.len()` keys.
    pub(crate) coords: Vec<Vec<u64>>,
    pub(crate) keys: Vec<ChunkKey>,
    pub(crate) children: Vec<u64>,
}

impl Node {
    fn header_len(offset_size: u8) -> usize {
        SIGNATURE.len()
            + 1 // node type
            + 1 // level
            + size_of::<u16>() // entries used
            + 2 * offset_size as usize // siblings
    }

    pub(crate) fn read<S: ByteSource + ?Sized>(
        source: &S,
        address: u64,
        layout: &ChunkLayout,
        offset_size: u8,
    ) -> crate::Result<Self> {
        let header_len = Self::header_len(offset_size);
        let header = read_checked(source, address, header_len as u64, "B-tree node header")?;
        if &header[..4] != SIGNATURE {
            return Err(crate::Error::corrupt(address, "missing B-tree node signature"));
        }
        let node_type = header[4];
        if node_type != RAW_DATA_NODE {
            return Err(crate::Error::corrupt(
                address,
                format!("B-tree node type {node_type} does not index raw data chunks"),
            ));
        }
        let level = header[5];
        let entries = u16::from_le_bytes([header[6], header[7]]) as usize;

        let rank = layout.rank();
        let key_len = ChunkKey::encoded_len(rank);
        let os = offset_size as usize;
        let body_len = entries * (key_len + os) + key_len;
        let body_address = address + header_len as u64;
        let body = read_checked(source, body_address, body_len as u64, "B-tree node entries")?;

        let mut keys = Vec::with_capacity(entries + 1);
        let mut children = Vec::with_capacity(entries);
        let mut offset = 0;
        for _ in 0..entries {
            keys.push(ChunkKey::from_bytes(
                &body[offset..],
                rank,
                body_address + offset as u64,
            )?);
            offset += key_len;
            let child = read_address(&body[offset..], offset_size);
            if is_undefined(child, offset_size) {
                return Err(crate::Error::corrupt(
                    body_address + offset as u64,
                    "undefined child address",
                ));
            }
            children.push(child);
            offset += os;
        }
        keys.push(ChunkKey::from_bytes(
            &body[offset..],
            rank,
            body_address + offset as u64,
        )?);

        let coords = keys[..entries]
            .iter()
            .map(|k| k.coord(layout, address))
            .collect::<crate::Result<Vec<_>>>()?;
        if let Some(w) = coords.windows(2).find(|w| w[0] >= w[1]) {
            return Err(crate::Error::corrupt(
                address,
                format!("B-tree keys out of order: {:?} before {:?}", w[0], w[1]),
            ));
        }

        log::trace!("read B-tree node at {address:#x}: level {level}, {entries} entries");
        Ok(Node {
            address,
            level,
            coords,
            keys,
            children,
        })
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.level == 0
    }

    pub(crate) fn len(&self) -> usize {
        self.children.len()
    }

    /// Check the level is one below the parent's.
    pub(crate) fn expect_level(&self, level: Option<u8>) -> crate::Result<()> {
        match level {
            Some(l) if l != self.level => Err(crate::Error::corrupt(
                self.address,
                format!("B-tree node has level {}, parent expects {l}", self.level),
            )),
            _ => Ok(()),
        }
    }

    /// Index of the child whose subtree may hold `coord`.
    pub(crate) fn child_for(&self, coord: &[u64]) -> Option<usize> {
        let after = self.coords.partition_point(|k| k.as_slice() <= coord);
        after.checked_sub(1)
    }

    /// Index of the leaf entry for exactly `coord`.
    pub(crate) fn entry_for(&self, coord: &[u64]) -> Option<usize> {
        self.coords.binary_search_by(|k| k.as_slice().cmp(coord)).ok()
    }
}
