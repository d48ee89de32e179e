use super::{Filter, FilterContext, FilterDescriptor};

/// Byte shuffling: byte `j` of every element is stored together, for each `j`.
///
/// Bytes after the last whole element are left in place.
#[derive(Debug, Clone)]
pub struct Shuffle {
    element_size: usize,
}

impl Shuffle {
    pub fn new(element_size: usize) -> Self {
        Self { element_size }
    }
}

pub(super) fn create(
    descriptor: &FilterDescriptor,
    context: &FilterContext,
) -> crate::Result<Box<dyn Filter>> {
    let element_size = match descriptor.client_data.first() {
        Some(&size) if size > 0 => size as usize,
        _ => context.element_size,
    };
    Ok(Box::new(Shuffle::new(element_size)))
}

impl Filter for Shuffle {
    fn decode(&self, data: Vec<u8>) -> crate::Result<Vec<u8>> {
        let size = self.element_size;
        if size <= 1 || data.len() < size {
            return Ok(data);
        }
        let count = data.len() / size;
        let mut out = vec![0u8; data.len()];
        for (j, plane) in data[..count * size].chunks_exact(count).enumerate() {
            for (i, &b) in plane.iter().enumerate() {
                out[i * size + j] = b;
            }
        }
        out[count * size..].copy_from_slice(&data[count * size..]);
        Ok(out)
    }

    fn encode(&self, data: Vec<u8>) -> crate::Result<Vec<u8>> {
        let size = self.element_size;
        if size <= 1 || data.len() < size {
            return Ok(data);
        }
        let count = data.len() / size;
        let mut out = vec![0u8; data.len()];
        for (i, element) in data[..count * size].chunks_exact(size).enumerate() {
            for (j, &b) in element.iter().enumerate() {
                out[j * count + i] = b;
            }
        }
        out[count * size..].copy_from_slice(&data[count * size..]);
        Ok(out)
    }
}
