pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of an [Error].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed on-disk structure, such as a bad node or key order,
    /// an out-of-bounds address or a bad checksum.
    StructuralCorruption,
    /// Unknown filter or datatype which cannot be decoded.
    UnsupportedFormat,
    /// A chunk decoded to the wrong number of bytes.
    SizeMismatch,
    /// The byte source failed.
    Io,
    /// The read was cancelled by the caller.
    Cancelled,
    /// The caller passed inconsistent shapes or selections.
    InvalidArgument,
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    General(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("corrupt structure at {offset:#x}: {message}")]
    Corrupt { offset: u64, message: String },
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("cannot decompress chunk: {0}")]
    Decompress(String),
    #[error("unsupported filter {id} ({name})")]
    UnsupportedFilter { id: u16, name: String },
    #[error("unsupported datatype: {0}")]
    UnsupportedDatatype(String),
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("failed to read {length} bytes at {offset:#x}")]
    Io {
        offset: u64,
        length: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("chunk {coord:?} at {offset:#x}: {source}")]
    Chunk {
        coord: Vec<u64>,
        offset: u64,
        #[source]
        source: Box<Error>,
    },
    #[error("read cancelled")]
    Cancelled,
    /// A failed chunk load, shared by every caller that waited on it.
    #[error(transparent)]
    Shared(std::sync::Arc<Error>),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn wrap(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn corrupt(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupt {
            offset,
            message: message.into(),
        }
    }

    /// Attach the location of the chunk being read.
    ///
    /// Errors which already carry chunk context are returned unchanged,
    /// as is [Error::Cancelled].
    pub(crate) fn in_chunk(self, coord: &[u64], offset: u64) -> Self {
        match self {
            e @ (Self::Chunk { .. } | Self::Cancelled) => e,
            e => Self::Chunk {
                coord: coord.to_vec(),
                offset,
                source: Box::new(e),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Corrupt { .. } | Self::ChecksumMismatch { .. } | Self::Decompress(_) => {
                ErrorKind::StructuralCorruption
            }
            Self::UnsupportedFilter { .. } | Self::UnsupportedDatatype(_) => {
                ErrorKind::UnsupportedFormat
            }
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Self::Io { .. } => ErrorKind::Io,
            Self::Chunk { source, .. } => source.kind(),
            Self::Shared(inner) => inner.kind(),
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::General(_) | Self::SerdeJson(_) | Self::Wrapped(_) => ErrorKind::Other,
        }
    }

    /// The chunk coordinate this error was raised for, if any.
    pub fn chunk_coord(&self) -> Option<&[u64]> {
        match self {
            Self::Chunk { coord, .. } => Some(coord),
            Self::Shared(inner) => inner.chunk_coord(),
            _ => None,
        }
    }
}
