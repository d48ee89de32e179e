use crate::layout::ChunkLayout;

/// Location of one stored chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkIndexEntry {
    /// Chunk coordinate, in units of chunks.
    pub coord: Vec<u64>,
    /// File address of the stored (filtered) bytes.
    pub offset: u64,
    /// Number of stored bytes.
    pub stored_size: u64,
    /// Bit `i` set means pipeline stage `i` was not applied to this chunk.
    pub filter_mask: u32,
}

/// A key of a raw data chunk B-tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkKey {
    pub(crate) stored_size: u32,
    pub(crate) filter_mask: u32,
    /// Element offsets of the chunk origin; one more than the dataset rank,
    /// the last being the (always zero) byte offset within an element.
    pub(crate) offsets: Vec<u64>,
}

impl ChunkKey {
    pub(crate) fn encoded_len(rank: usize) -> usize {
        size_of::<u32>() // stored size
            + size_of::<u32>() // filter mask
            + (rank + 1) * size_of::<u64>() // offsets
    }

    /// Parse a key; `at` is its file address, for error reporting.
    pub(crate) fn from_bytes(bytes: &[u8], rank: usize, at: u64) -> crate::Result<Self> {
        let len = Self::encoded_len(rank);
        if bytes.len() < len {
            return Err(crate::Error::corrupt(
                at,
                format!("chunk key needs {len} bytes, have {}", bytes.len()),
            ));
        }
        let mut offset: usize = 0;

        let stored_size = u32::from_le_bytes(
            bytes[offset..offset + 4]
                .try_into()
                .map_err(crate::Error::wrap)?,
        );
        offset += 4;
        let filter_mask = u32::from_le_bytes(
            bytes[offset..offset + 4]
                .try_into()
                .map_err(crate::Error::wrap)?,
        );
        offset += 4;
        let mut offsets = Vec::with_capacity(rank + 1);
        for _ in 0..=rank {
            offsets.push(u64::from_le_bytes(
                bytes[offset..offset + 8]
                    .try_into()
                    .map_err(crate::Error::wrap)?,
            ));
            offset += 8;
        }
        Ok(ChunkKey {
            stored_size,
            filter_mask,
            offsets,
        })
    }

    /// Convert the element offsets to a chunk coordinate.
    ///
    /// Offsets must fall on chunk boundaries.
    pub(crate) fn coord(&self, layout: &ChunkLayout, at: u64) -> crate::Result<Vec<u64>> {
        let (spatial, element) = self.offsets.split_at(layout.rank());
        if element != [0] {
            return Err(crate::Error::corrupt(
                at,
                format!("chunk key has non-zero element offset {element:?}"),
            ));
        }
        spatial
            .iter()
            .zip(layout.extents())
            .map(|(&o, &c)| {
                if o % c == 0 {
                    Ok(o / c)
                } else {
                    Err(crate::Error::corrupt(
                        at,
                        format!("chunk offset {o} is not a multiple of chunk extent {c}"),
                    ))
                }
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::encoded_len(self.offsets.len() - 1));
        out.extend_from_slice(&self.stored_size.to_le_bytes());
        out.extend_from_slice(&self.filter_mask.to_le_bytes());
        for o in &self.offsets {
            out.extend_from_slice(&o.to_le_bytes());
        }
        out
    }
}
