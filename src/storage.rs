use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use crate::{Error, ErrorKind};

/// Random access to the bytes of a container.
///
/// Every call is independent and returns its own buffer;
/// implementations must not share a mutable cursor between calls,
/// as a single source is read from many threads at once.
pub trait ByteSource: Send + Sync {
    /// Read exactly `length` bytes starting at `offset`.
    ///
    /// Short reads and invalid offsets are [Error::Io].
    fn read(&self, offset: u64, length: u64) -> crate::Result<Bytes>;

    /// Total size of the container, if known.
    ///
    /// Used to reject out-of-bounds addresses as corruption before reading.
    fn size(&self) -> Option<u64> {
        None
    }

    /// Whether a failed read may be repeated with the same outcome on success.
    fn supports_retry(&self) -> bool {
        true
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn read(&self, offset: u64, length: u64) -> crate::Result<Bytes> {
        (**self).read(offset, length)
    }

    fn size(&self) -> Option<u64> {
        (**self).size()
    }

    fn supports_retry(&self) -> bool {
        (**self).supports_retry()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Arc<S> {
    fn read(&self, offset: u64, length: u64) -> crate::Result<Bytes> {
        (**self).read(offset, length)
    }

    fn size(&self) -> Option<u64> {
        (**self).size()
    }

    fn supports_retry(&self) -> bool {
        (**self).supports_retry()
    }
}

fn eof(offset: u64, length: u64, message: String) -> Error {
    Error::Io {
        offset,
        length,
        source: io::Error::new(io::ErrorKind::UnexpectedEof, message),
    }
}

fn to_usize(offset: u64, length: u64) -> crate::Result<usize> {
    usize::try_from(length)
        .map_err(|_| eof(offset, length, "length exceeds address space".to_string()))
}

/// A container held entirely in memory.
///
/// Reads are zero-copy slices of the backing buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }
}

impl ByteSource for MemorySource {
    fn read(&self, offset: u64, length: u64) -> crate::Result<Bytes> {
        let available = self.data.len() as u64;
        match offset.checked_add(length) {
            // bounded by the buffer length, so both fit in usize
            Some(end) if end <= available => Ok(self.data.slice(offset as usize..end as usize)),
            _ => Err(eof(
                offset,
                length,
                format!("container holds {available} bytes"),
            )),
        }
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// A container on the local filesystem, read with positional reads.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    size: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let file = File::open(path.as_ref()).map_err(|source| Error::Io {
            offset: 0,
            length: 0,
            source,
        })?;
        Self::from_file(file)
    }

    pub fn from_file(file: File) -> crate::Result<Self> {
        let size = file
            .metadata()
            .map_err(|source| Error::Io {
                offset: 0,
                length: 0,
                source,
            })?
            .len();
        Ok(Self { file, size })
    }

    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.file.seek_read(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "failed to fill whole buffer",
                    ));
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl ByteSource for FileSource {
    fn read(&self, offset: u64, length: u64) -> crate::Result<Bytes> {
        let mut buf = vec![0u8; to_usize(offset, length)?];
        self.read_at(&mut buf, offset)
            .map_err(|source| Error::Io {
                offset,
                length,
                source,
            })?;
        Ok(Bytes::from(buf))
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }
}

/// Read a structure of known size, classifying out-of-bounds addresses as corruption.
///
/// An I/O failure is retried once if the source allows it.
pub(crate) fn read_checked<S: ByteSource + ?Sized>(
    source: &S,
    offset: u64,
    length: u64,
    what: &str,
) -> crate::Result<Bytes> {
    if let Some(size) = source.size() {
        if offset.checked_add(length).is_none_or(|end| end > size) {
            return Err(Error::corrupt(
                offset,
                format!("{what} of {length} bytes extends past end of container ({size} bytes)"),
            ));
        }
    }
    let bytes = match source.read(offset, length) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::Io && source.supports_retry() => {
            log::warn!("retrying read of {what} ({length} bytes at {offset:#x}): {e}");
            source.read(offset, length)?
        }
        Err(e) => return Err(e),
    };
    if bytes.len() as u64 != length {
        return Err(eof(
            offset,
            length,
            format!("short read of {what}: got {} bytes", bytes.len()),
        ));
    }
    Ok(bytes)
}
