//! The chunk filter pipeline.
//!
//! Filters are looked up by id in a registry collected with [inventory],
//! so other crates can add their own with
//!
//! ```ignore
//! inventory::submit! {
//!     hdf5_chunked::filter::FilterPlugin::new(32000, "mine", create_mine)
//! }
//! ```

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

mod deflate;
mod fletcher32;
mod shuffle;

pub use deflate::Deflate;
pub use fletcher32::Fletcher32;
pub use shuffle::Shuffle;

use crate::Error;

pub const DEFLATE: u16 = 1;
pub const SHUFFLE: u16 = 2;
pub const FLETCHER32: u16 = 3;

/// One stage of a dataset's filter pipeline, in write order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDescriptor {
    pub id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub flags: u16,
    #[serde(default)]
    pub client_data: Vec<u32>,
}

impl FilterDescriptor {
    pub fn new(id: u16, client_data: Vec<u32>) -> Self {
        Self {
            id,
            name: None,
            flags: 0,
            client_data,
        }
    }

    fn display_name(&self) -> String {
        match (&self.name, plugin(self.id)) {
            (Some(name), _) => name.clone(),
            (None, Some(p)) => p.name.to_string(),
            (None, None) => "unknown".to_string(),
        }
    }
}

/// The filters applied to every chunk of a dataset, in the order they were applied on write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterPipelineDescriptor {
    pub filters: Vec<FilterDescriptor>,
}

impl FilterPipelineDescriptor {
    pub fn new(filters: Vec<FilterDescriptor>) -> Self {
        Self { filters }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// What a filter may need to know about the chunks it processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterContext {
    /// Size in bytes of one dataset element.
    pub element_size: usize,
    /// Size in bytes of a whole unfiltered chunk.
    pub chunk_bytes: usize,
}

pub trait Filter: Debug + Send + Sync {
    /// Reverse the filter, as on read.
    fn decode(&self, data: Vec<u8>) -> crate::Result<Vec<u8>>;

    /// Apply the filter, as on write.
    fn encode(&self, data: Vec<u8>) -> crate::Result<Vec<u8>>;
}

type CreateFn = fn(&FilterDescriptor, &FilterContext) -> crate::Result<Box<dyn Filter>>;

/// A registered filter implementation.
pub struct FilterPlugin {
    id: u16,
    name: &'static str,
    create: CreateFn,
}

impl FilterPlugin {
    pub const fn new(id: u16, name: &'static str, create: CreateFn) -> Self {
        Self { id, name, create }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

inventory::collect!(FilterPlugin);

inventory::submit! {
    FilterPlugin::new(DEFLATE, "deflate", deflate::create)
}

inventory::submit! {
    FilterPlugin::new(SHUFFLE, "shuffle", shuffle::create)
}

inventory::submit! {
    FilterPlugin::new(FLETCHER32, "fletcher32", fletcher32::create)
}

/// Look up a registered filter by id.
pub fn plugin(id: u16) -> Option<&'static FilterPlugin> {
    inventory::iter::<FilterPlugin>
        .into_iter()
        .find(|p| p.id == id)
}

#[derive(Debug)]
enum Stage {
    Ready(Box<dyn Filter>),
    /// No implementation is registered; fails only chunks that use it.
    Missing,
}

/// A dataset's filters, instantiated.
#[derive(Debug)]
pub struct FilterPipeline {
    stages: Vec<(FilterDescriptor, Stage)>,
}

impl FilterPipeline {
    pub fn new(
        descriptor: &FilterPipelineDescriptor,
        context: FilterContext,
    ) -> crate::Result<Self> {
        if descriptor.filters.len() > 32 {
            return Err(Error::invalid(format!(
                "{} filters exceed the 32 a filter mask can describe",
                descriptor.filters.len()
            )));
        }
        let stages = descriptor
            .filters
            .iter()
            .map(|d| {
                let stage = match plugin(d.id) {
                    Some(p) => Stage::Ready((p.create)(d, &context)?),
                    None => {
                        log::warn!(
                            "no implementation of filter {} ({}); chunks using it cannot be read",
                            d.id,
                            d.display_name()
                        );
                        Stage::Missing
                    }
                };
                Ok((d.clone(), stage))
            })
            .collect::<crate::Result<_>>()?;
        Ok(Self { stages })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Reverse the pipeline over one stored chunk.
    ///
    /// Stage `i` is skipped when bit `i` of `filter_mask` is set.
    /// The result must be exactly `expected_len` bytes.
    pub fn decode(
        &self,
        raw: &[u8],
        filter_mask: u32,
        expected_len: usize,
    ) -> crate::Result<Vec<u8>> {
        let mut data = raw.to_vec();
        for (i, (descriptor, stage)) in self.stages.iter().enumerate().rev() {
            if filter_mask & (1 << i) != 0 {
                log::trace!("filter {} skipped by mask {filter_mask:#x}", descriptor.id);
                continue;
            }
            data = match stage {
                Stage::Ready(filter) => filter.decode(data)?,
                Stage::Missing => {
                    return Err(Error::UnsupportedFilter {
                        id: descriptor.id,
                        name: descriptor.display_name(),
                    });
                }
            };
        }
        if data.len() != expected_len {
            return Err(Error::SizeMismatch {
                expected: expected_len as u64,
                actual: data.len() as u64,
            });
        }
        Ok(data)
    }

    /// Apply every stage in write order.
    pub fn encode(&self, data: &[u8]) -> crate::Result<Vec<u8>> {
        let mut data = data.to_vec();
        for (descriptor, stage) in &self.stages {
            data = match stage {
                Stage::Ready(filter) => filter.encode(data)?,
                Stage::Missing => {
                    return Err(Error::UnsupportedFilter {
                        id: descriptor.id,
                        name: descriptor.display_name(),
                    });
                }
            };
        }
        Ok(data)
    }
}
