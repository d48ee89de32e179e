//! JSON descriptions of chunked datasets.
//!
//! ```json
//! {
//!   "dimensions": [7, 5],
//!   "chunkDimensions": [4, 4],
//!   "datatype": {"class": "signedFixedPoint", "bitSize": 32},
//!   "filters": [{"id": 1, "clientData": [6]}],
//!   "chunkIndex": {"type": "btree", "address": 2048},
//!   "fillValue": -1
//! }
//! ```

use half::f16;
use serde::{Deserialize, Serialize};

use crate::buffer::{Element, ElementType, TypedBuffer};
use crate::cache::ChunkCacheConfig;
use crate::dataset::DatasetDescriptor;
use crate::datatype::DatatypeDescriptor;
use crate::filter::FilterPipelineDescriptor;
use crate::index::ChunkIndexRoot;
use crate::layout::{ChunkLayout, Dataspace};

/// Serializable description of a chunked dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    /// Dataset shape, slowest-varying dimension first.
    pub dimensions: Vec<u64>,
    /// Chunk shape, same rank as `dimensions`.
    pub chunk_dimensions: Vec<u64>,
    pub datatype: DatatypeDescriptor,
    /// Filters in the order they were applied when writing.
    #[serde(default)]
    pub filters: FilterPipelineDescriptor,
    pub chunk_index: ChunkIndexRoot,
    /// Absent means zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<FillValue>,
    #[serde(default)]
    pub cache: ChunkCacheConfig,
}

/// A fill value, either as a number or as its encoded bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Number(serde_json::Number),
    /// One element encoded with the dataset's datatype.
    Bytes(Vec<u8>),
}

fn integer<T>(n: &serde_json::Number) -> crate::Result<TypedBuffer>
where
    T: Element + TryFrom<i64> + TryFrom<u64>,
{
    let value = if let Some(i) = n.as_i64() {
        <T as TryFrom<i64>>::try_from(i).ok()
    } else if let Some(u) = n.as_u64() {
        <T as TryFrom<u64>>::try_from(u).ok()
    } else {
        None
    };
    value.map(|v| T::into_buffer(vec![v])).ok_or_else(|| {
        crate::Error::invalid(format!("fill value {n} does not fit in {:?}", T::TYPE))
    })
}

impl FillValue {
    /// Convert to a single element of the datatype's native type.
    pub fn to_buffer(&self, datatype: &DatatypeDescriptor) -> crate::Result<TypedBuffer> {
        match self {
            FillValue::Bytes(bytes) => {
                let buffer = datatype.decode(bytes)?;
                if buffer.len() != 1 {
                    return Err(crate::Error::invalid(format!(
                        "fill value must encode one element, got {}",
                        buffer.len()
                    )));
                }
                Ok(buffer)
            }
            FillValue::Number(n) => {
                let float = || {
                    n.as_f64().ok_or_else(|| {
                        crate::Error::invalid(format!("fill value {n} is not a number"))
                    })
                };
                match datatype.element_type()? {
                    ElementType::Int8 => integer::<i8>(n),
                    ElementType::Int16 => integer::<i16>(n),
                    ElementType::Int32 => integer::<i32>(n),
                    ElementType::Int64 => integer::<i64>(n),
                    ElementType::UInt8 => integer::<u8>(n),
                    ElementType::UInt16 => integer::<u16>(n),
                    ElementType::UInt32 => integer::<u32>(n),
                    ElementType::UInt64 => integer::<u64>(n),
                    ElementType::Float16 => Ok(TypedBuffer::Float16(vec![f16::from_f64(float()?)])),
                    ElementType::Float32 => Ok(TypedBuffer::Float32(vec![float()? as f32])),
                    ElementType::Float64 => Ok(TypedBuffer::Float64(vec![float()?])),
                }
            }
        }
    }
}

impl TryFrom<DatasetMetadata> for DatasetDescriptor {
    type Error = crate::Error;

    fn try_from(value: DatasetMetadata) -> Result<Self, Self::Error> {
        let fill_value = value
            .fill_value
            .as_ref()
            .map(|f| f.to_buffer(&value.datatype))
            .transpose()?;
        Ok(Self {
            dataspace: Dataspace::new(value.dimensions),
            layout: ChunkLayout::new(value.chunk_dimensions)?,
            datatype: value.datatype,
            filters: value.filters,
            chunk_index: value.chunk_index,
            fill_value,
            cache: value.cache,
        })
    }
}
