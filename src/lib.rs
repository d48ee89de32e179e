//! Reading chunked datasets from HDF5 containers.
//!
//! A [ChunkedDataset] ties together a [ByteSource], the dataset's version 1
//! B-tree chunk index, its filter pipeline and datatype, and assembles
//! whole or partial logical arrays from the stored chunks.
//!
//! ```no_run
//! use hdf5_chunked::{ChunkedDataset, FileSource, Region, metadata::DatasetMetadata};
//!
//! # fn main() -> hdf5_chunked::Result<()> {
//! let json = std::fs::read_to_string("int32.json").map_err(hdf5_chunked::Error::wrap)?;
//! let meta: DatasetMetadata = serde_json::from_str(&json)?;
//! let dataset = ChunkedDataset::open(FileSource::open("data.h5")?, meta.try_into()?)?;
//! let array = dataset.read_region(&Region::from_ranges(&[0..2, 1..4])?)?;
//! let values: Vec<i32> = array.into_vec()?;
//! # Ok(())
//! # }
//! ```
pub mod assemble;
pub mod buffer;
pub mod cache;
pub mod cancel;
pub mod chunk;
pub mod dataset;
pub mod datatype;
mod error;
pub mod filter;
pub mod index;
pub mod layout;
pub mod metadata;
pub mod storage;

pub use assemble::{read_full, read_region};
pub use buffer::{Element, ElementType, LogicalArray, TypedBuffer};
pub use cancel::CancellationToken;
pub use dataset::{ChunkedDataset, DatasetDescriptor};
pub use error::{Error, ErrorKind, Result};
pub use layout::{ChunkLayout, Dataspace, Region};
pub use storage::{ByteSource, FileSource, MemorySource};
