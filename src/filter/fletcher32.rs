use super::{Filter, FilterContext, FilterDescriptor};
use crate::Error;

/// Words summed before the running sums are folded back to 16 bits.
const BLOCK_WORDS: usize = 360;

/// A trailing Fletcher-32 checksum, verified and stripped on decode.
#[derive(Debug, Clone, Default)]
pub struct Fletcher32;

pub(super) fn create(_: &FilterDescriptor, _: &FilterContext) -> crate::Result<Box<dyn Filter>> {
    Ok(Box::new(Fletcher32))
}

fn fold(sum: u32) -> u32 {
    (sum & 0xffff) + (sum >> 16)
}

/// Fletcher-32 over big-endian 16-bit words; an odd last byte is the high half of a word.
pub fn checksum(data: &[u8]) -> u32 {
    let (mut sum1, mut sum2) = (0u32, 0u32);
    let words = data.chunks_exact(2);
    let odd = words.remainder().first().copied();
    let words: Vec<_> = words.collect();
    for block in words.chunks(BLOCK_WORDS) {
        for word in block {
            sum1 = sum1.wrapping_add(u32::from(word[0]) << 8 | u32::from(word[1]));
            sum2 = sum2.wrapping_add(sum1);
        }
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }
    if let Some(b) = odd {
        sum1 += u32::from(b) << 8;
        sum2 += sum1;
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }
    sum1 = fold(sum1);
    sum2 = fold(sum2);
    sum2 << 16 | sum1
}

impl Filter for Fletcher32 {
    fn decode(&self, mut data: Vec<u8>) -> crate::Result<Vec<u8>> {
        let Some(at) = data.len().checked_sub(4) else {
            return Err(Error::SizeMismatch {
                expected: 4,
                actual: data.len() as u64,
            });
        };
        let mut trailer = [0u8; 4];
        trailer.copy_from_slice(&data[at..]);
        data.truncate(at);
        let stored = u32::from_le_bytes(trailer);
        let computed = checksum(&data);
        // Older writers stored the checksum byte-reversed.
        if stored != computed && stored.swap_bytes() != computed {
            return Err(Error::ChecksumMismatch { stored, computed });
        }
        Ok(data)
    }

    fn encode(&self, mut data: Vec<u8>) -> crate::Result<Vec<u8>> {
        let sum = checksum(&data);
        data.extend_from_slice(&sum.to_le_bytes());
        Ok(data)
    }
}
