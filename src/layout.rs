//! Dataset shapes, chunk grids and the coordinate arithmetic between them.
//!
//! All coordinates are row-major: the first dimension varies slowest.
//! Chunk coordinates are in units of chunks, i.e. the element coordinate
//! of the chunk's origin divided by the chunk extent.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::Error;

fn too_large(shape: &[u64]) -> Error {
    Error::invalid(format!("shape {shape:?} has more than {} elements", u64::MAX))
}

pub(crate) fn num_elements(shape: &[u64]) -> crate::Result<u64> {
    shape
        .iter()
        .try_fold(1u64, |n, &e| n.checked_mul(e))
        .ok_or_else(|| too_large(shape))
}

/// Row-major strides, in elements, of an array of the given shape.
pub(crate) fn strides(shape: &[u64]) -> crate::Result<Vec<u64>> {
    let mut out = vec![1u64; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        out[d] = out[d + 1]
            .checked_mul(shape[d + 1])
            .ok_or_else(|| too_large(shape))?;
    }
    Ok(out)
}

/// Logical shape of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataspace {
    extents: Vec<u64>,
}

impl Dataspace {
    pub fn new(extents: Vec<u64>) -> Self {
        Self { extents }
    }

    pub fn extents(&self) -> &[u64] {
        &self.extents
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn num_elements(&self) -> crate::Result<u64> {
        num_elements(&self.extents)
    }

    /// Check that elements of this shape can be counted and addressed in a `u64`.
    pub(crate) fn check_size(&self) -> crate::Result<()> {
        strides(&self.extents)?;
        self.num_elements().map(drop)
    }

    /// The region covering the whole dataset.
    pub fn full_region(&self) -> Region {
        Region {
            start: vec![0; self.rank()],
            count: self.extents.clone(),
        }
    }
}

/// Per-dimension extents of every chunk of a dataset.
///
/// Chunks at the upper boundary may extend past the dataset;
/// those elements are stored but never part of the logical array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChunkLayout {
    extents: Vec<u64>,
}

impl<'de> Deserialize<'de> for ChunkLayout {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let extents = Vec::<u64>::deserialize(deserializer)?;
        Self::new(extents).map_err(serde::de::Error::custom)
    }
}

impl ChunkLayout {
    pub fn new(extents: Vec<u64>) -> crate::Result<Self> {
        if extents.is_empty() {
            return Err(Error::invalid("chunk layout must have at least one dimension"));
        }
        if extents.contains(&0) {
            return Err(Error::invalid(format!(
                "chunk extents must be positive, got {extents:?}"
            )));
        }
        Ok(Self { extents })
    }

    pub fn extents(&self) -> &[u64] {
        &self.extents
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    /// Number of elements in one (unclipped) chunk.
    pub fn chunk_elements(&self) -> crate::Result<u64> {
        num_elements(&self.extents)
    }

    pub(crate) fn check_rank(&self, dataspace: &Dataspace) -> crate::Result<()> {
        if self.rank() != dataspace.rank() {
            return Err(Error::invalid(format!(
                "chunk layout has rank {}, dataspace has rank {}",
                self.rank(),
                dataspace.rank()
            )));
        }
        Ok(())
    }

    /// Number of chunks along each dimension needed to cover the dataspace.
    pub fn grid_shape(&self, dataspace: &Dataspace) -> Vec<u64> {
        dataspace
            .extents()
            .iter()
            .zip(&self.extents)
            .map(|(&n, &c)| n.div_ceil(c))
            .collect()
    }

    /// Element coordinate of the first element of a chunk.
    pub fn origin(&self, coord: &[u64]) -> Vec<u64> {
        coord.iter().zip(&self.extents).map(|(&i, &c)| i * c).collect()
    }

    /// The elements covered by a chunk, including any beyond the dataset boundary.
    pub fn chunk_region(&self, coord: &[u64]) -> Region {
        Region {
            start: self.origin(coord),
            count: self.extents.clone(),
        }
    }

    /// Chunk coordinates, in row-major order, of every chunk touching `region`.
    pub fn chunks_intersecting(&self, region: &Region) -> ChunkGridIter {
        if region.is_empty() {
            return ChunkGridIter::empty();
        }
        let start = region
            .start()
            .iter()
            .zip(&self.extents)
            .map(|(&s, &c)| s / c)
            .collect();
        let end = region
            .end()
            .iter()
            .zip(&self.extents)
            .map(|(&e, &c)| e.div_ceil(c))
            .collect();
        ChunkGridIter::new(start, end)
    }
}

/// An axis-aligned box of elements: `count[d]` elements from `start[d]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RegionRepr")]
pub struct Region {
    start: Vec<u64>,
    count: Vec<u64>,
}

#[derive(Deserialize)]
struct RegionRepr {
    start: Vec<u64>,
    count: Vec<u64>,
}

impl TryFrom<RegionRepr> for Region {
    type Error = Error;

    fn try_from(value: RegionRepr) -> Result<Self, Self::Error> {
        Self::new(value.start, value.count)
    }
}

impl Region {
    pub fn new(start: Vec<u64>, count: Vec<u64>) -> crate::Result<Self> {
        if start.len() != count.len() {
            return Err(Error::invalid(format!(
                "region start has rank {}, count has rank {}",
                start.len(),
                count.len()
            )));
        }
        if start.iter().zip(&count).any(|(s, c)| s.checked_add(*c).is_none()) {
            return Err(Error::invalid("region end overflows"));
        }
        Ok(Self { start, count })
    }

    pub fn from_ranges(ranges: &[Range<u64>]) -> crate::Result<Self> {
        if let Some(r) = ranges.iter().find(|r| r.end < r.start) {
            return Err(Error::invalid(format!("inverted range {r:?}")));
        }
        Self::new(
            ranges.iter().map(|r| r.start).collect(),
            ranges.iter().map(|r| r.end - r.start).collect(),
        )
    }

    pub fn start(&self) -> &[u64] {
        &self.start
    }

    pub fn count(&self) -> &[u64] {
        &self.count
    }

    /// Exclusive upper corner.
    pub fn end(&self) -> Vec<u64> {
        self.start.iter().zip(&self.count).map(|(s, c)| s + c).collect()
    }

    pub fn rank(&self) -> usize {
        self.start.len()
    }

    pub fn num_elements(&self) -> crate::Result<u64> {
        num_elements(&self.count)
    }

    pub fn is_empty(&self) -> bool {
        self.count.contains(&0)
    }

    pub(crate) fn check_within(&self, dataspace: &Dataspace) -> crate::Result<()> {
        if self.rank() != dataspace.rank() {
            return Err(Error::invalid(format!(
                "region has rank {}, dataspace has rank {}",
                self.rank(),
                dataspace.rank()
            )));
        }
        let end = self.end();
        if end.iter().zip(dataspace.extents()).any(|(e, n)| e > n) {
            return Err(Error::invalid(format!(
                "region {:?}..{end:?} exceeds dataspace {:?}",
                self.start,
                dataspace.extents()
            )));
        }
        Ok(())
    }

    /// The overlap of two regions of equal rank, if non-empty.
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        let mut start = Vec::with_capacity(self.rank());
        let mut count = Vec::with_capacity(self.rank());
        for ((s0, c0), (s1, c1)) in self
            .start
            .iter()
            .zip(&self.count)
            .zip(other.start.iter().zip(&other.count))
        {
            let lo = *s0.max(s1);
            let hi = s0.saturating_add(*c0).min(s1.saturating_add(*c1));
            if hi <= lo {
                return None;
            }
            start.push(lo);
            count.push(hi - lo);
        }
        Some(Region { start, count })
    }
}

/// Row-major iteration over a box of chunk coordinates.
#[derive(Debug, Clone)]
pub struct ChunkGridIter {
    start: Vec<u64>,
    end: Vec<u64>,
    next: Option<Vec<u64>>,
}

impl ChunkGridIter {
    /// Iterate over `start[d]..end[d]` in every dimension.
    pub fn new(start: Vec<u64>, end: Vec<u64>) -> Self {
        let next = if start.iter().zip(&end).any(|(s, e)| s >= e) {
            None
        } else {
            Some(start.clone())
        };
        Self { start, end, next }
    }

    fn empty() -> Self {
        Self {
            start: vec![],
            end: vec![],
            next: None,
        }
    }
}

impl Iterator for ChunkGridIter {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut following = current.clone();
        for d in (0..following.len()).rev() {
            following[d] += 1;
            if following[d] < self.end[d] {
                self.next = Some(following);
                return Some(current);
            }
            following[d] = self.start[d];
        }
        Some(current)
    }
}

/// Copy a box of `count` elements between two row-major arrays.
///
/// Copies run along the last dimension, which is contiguous in both arrays.
/// Both boxes must lie within their arrays.
pub(crate) fn copy_hyperslab<T: Copy>(
    dst: &mut [T],
    dst_shape: &[u64],
    dst_start: &[u64],
    src: &[T],
    src_shape: &[u64],
    src_start: &[u64],
    count: &[u64],
) -> crate::Result<()> {
    let rank = count.len();
    if rank == 0 {
        if let (Some(d), Some(s)) = (dst.first_mut(), src.first()) {
            *d = *s;
        }
        return Ok(());
    }
    if count.contains(&0) {
        return Ok(());
    }
    let dst_strides = strides(dst_shape)?;
    let src_strides = strides(src_shape)?;
    let run = count[rank - 1] as usize;
    let outer = &count[..rank - 1];

    let mut idx = vec![0u64; rank - 1];
    loop {
        let mut d_off = dst_start[rank - 1];
        let mut s_off = src_start[rank - 1];
        for d in 0..rank - 1 {
            d_off += (dst_start[d] + idx[d]) * dst_strides[d];
            s_off += (src_start[d] + idx[d]) * src_strides[d];
        }
        let (d_off, s_off) = (d_off as usize, s_off as usize);
        dst[d_off..d_off + run].copy_from_slice(&src[s_off..s_off + run]);

        // odometer over the outer dimensions
        let mut d = outer.len();
        loop {
            if d == 0 {
                return Ok(());
            }
            d -= 1;
            idx[d] += 1;
            if idx[d] < outer[d] {
                break;
            }
            idx[d] = 0;
        }
    }
}
