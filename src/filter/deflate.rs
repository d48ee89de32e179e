use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::{Filter, FilterContext, FilterDescriptor};
use crate::Error;

const DEFAULT_LEVEL: u32 = 6;

/// Headroom over the chunk size for whatever earlier stages appended on write.
const SLACK: usize = 4096;

/// Most bytes a deflate stage may inflate to for chunks of `chunk_bytes`.
///
/// Stages applied before deflate on write, such as checksums, grow its input
/// past the chunk size, so the bound holds wherever deflate sits in the pipeline.
pub fn output_ceiling(chunk_bytes: usize) -> usize {
    chunk_bytes.saturating_mul(2).saturating_add(SLACK)
}

/// zlib compression.
#[derive(Debug, Clone)]
pub struct Deflate {
    level: u32,
    /// Decoded output is cut off one byte past this, leaving later size checks to report it.
    limit: usize,
}

impl Deflate {
    pub fn new(level: u32, limit: usize) -> Self {
        Self {
            level: level.min(9),
            limit,
        }
    }
}

pub(super) fn create(
    descriptor: &FilterDescriptor,
    context: &FilterContext,
) -> crate::Result<Box<dyn Filter>> {
    let level = descriptor
        .client_data
        .first()
        .copied()
        .unwrap_or(DEFAULT_LEVEL);
    Ok(Box::new(Deflate::new(level, output_ceiling(context.chunk_bytes))))
}

impl Filter for Deflate {
    fn decode(&self, data: Vec<u8>) -> crate::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.limit);
        ZlibDecoder::new(data.as_slice())
            .take(self.limit as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|e| Error::Decompress(format!("deflate: {e}")))?;
        Ok(out)
    }

    fn encode(&self, data: Vec<u8>) -> crate::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(&data).map_err(Error::wrap)?;
        encoder.finish().map_err(Error::wrap)
    }
}
