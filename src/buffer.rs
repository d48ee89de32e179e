//! Typed element buffers and the assembled N-dimensional array.

use std::fmt::Debug;

use half::f16;

use crate::Error;
use crate::layout::{copy_hyperslab, num_elements};

/// Native element types produced by decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }
}

/// A native scalar which can live in a [TypedBuffer].
pub trait Element: Copy + Debug + PartialEq + Send + Sync + 'static {
    const TYPE: ElementType;
    const SIZE: usize;

    fn from_le_slice(bytes: &[u8]) -> Self;
    fn from_be_slice(bytes: &[u8]) -> Self;
    fn to_f64(self) -> f64;

    fn slice(buffer: &TypedBuffer) -> Option<&[Self]>;
    fn into_vec(buffer: TypedBuffer) -> Result<Vec<Self>, TypedBuffer>;
    fn into_buffer(values: Vec<Self>) -> TypedBuffer;
}

/// Decoded elements of one type, stored contiguously.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedBuffer {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float16(Vec<f16>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

macro_rules! element {
    ($($t:ty => $variant:ident, |$v:ident| $to_f64:expr);* $(;)?) => {$(
        impl Element for $t {
            const TYPE: ElementType = ElementType::$variant;
            const SIZE: usize = size_of::<$t>();

            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut raw = [0u8; size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_le_bytes(raw)
            }

            fn from_be_slice(bytes: &[u8]) -> Self {
                let mut raw = [0u8; size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_be_bytes(raw)
            }

            fn to_f64(self) -> f64 {
                let $v = self;
                $to_f64
            }

            fn slice(buffer: &TypedBuffer) -> Option<&[Self]> {
                match buffer {
                    TypedBuffer::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_vec(buffer: TypedBuffer) -> Result<Vec<Self>, TypedBuffer> {
                match buffer {
                    TypedBuffer::$variant(v) => Ok(v),
                    other => Err(other),
                }
            }

            fn into_buffer(values: Vec<Self>) -> TypedBuffer {
                TypedBuffer::$variant(values)
            }
        }
    )*};
}

element!(
    i8 => Int8, |v| v as f64;
    i16 => Int16, |v| v as f64;
    i32 => Int32, |v| v as f64;
    i64 => Int64, |v| v as f64;
    u8 => UInt8, |v| v as f64;
    u16 => UInt16, |v| v as f64;
    u32 => UInt32, |v| v as f64;
    u64 => UInt64, |v| v as f64;
    f16 => Float16, |v| v.to_f64();
    f32 => Float32, |v| v as f64;
    f64 => Float64, |v| v;
);

/// Apply `$body` to the vector inside any variant.
macro_rules! dispatch {
    ($buffer:expr, $v:ident => $body:expr) => {
        match $buffer {
            TypedBuffer::Int8($v) => $body,
            TypedBuffer::Int16($v) => $body,
            TypedBuffer::Int32($v) => $body,
            TypedBuffer::Int64($v) => $body,
            TypedBuffer::UInt8($v) => $body,
            TypedBuffer::UInt16($v) => $body,
            TypedBuffer::UInt32($v) => $body,
            TypedBuffer::UInt64($v) => $body,
            TypedBuffer::Float16($v) => $body,
            TypedBuffer::Float32($v) => $body,
            TypedBuffer::Float64($v) => $body,
        }
    };
}

/// Apply `$body` to two buffers of the same variant, or evaluate `$mismatch`.
macro_rules! dispatch_pair {
    ($a:expr, $b:expr, $x:ident, $y:ident => $body:expr, $mismatch:expr) => {
        match ($a, $b) {
            (TypedBuffer::Int8($x), TypedBuffer::Int8($y)) => $body,
            (TypedBuffer::Int16($x), TypedBuffer::Int16($y)) => $body,
            (TypedBuffer::Int32($x), TypedBuffer::Int32($y)) => $body,
            (TypedBuffer::Int64($x), TypedBuffer::Int64($y)) => $body,
            (TypedBuffer::UInt8($x), TypedBuffer::UInt8($y)) => $body,
            (TypedBuffer::UInt16($x), TypedBuffer::UInt16($y)) => $body,
            (TypedBuffer::UInt32($x), TypedBuffer::UInt32($y)) => $body,
            (TypedBuffer::UInt64($x), TypedBuffer::UInt64($y)) => $body,
            (TypedBuffer::Float16($x), TypedBuffer::Float16($y)) => $body,
            (TypedBuffer::Float32($x), TypedBuffer::Float32($y)) => $body,
            (TypedBuffer::Float64($x), TypedBuffer::Float64($y)) => $body,
            _ => $mismatch,
        }
    };
}

impl TypedBuffer {
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Int8(_) => ElementType::Int8,
            Self::Int16(_) => ElementType::Int16,
            Self::Int32(_) => ElementType::Int32,
            Self::Int64(_) => ElementType::Int64,
            Self::UInt8(_) => ElementType::UInt8,
            Self::UInt16(_) => ElementType::UInt16,
            Self::UInt32(_) => ElementType::UInt32,
            Self::UInt64(_) => ElementType::UInt64,
            Self::Float16(_) => ElementType::Float16,
            Self::Float32(_) => ElementType::Float32,
            Self::Float64(_) => ElementType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes of element storage held.
    pub fn byte_size(&self) -> usize {
        self.len() * self.element_type().size()
    }

    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(self)
    }

    /// Take the elements out, or get the buffer back if `T` is the wrong type.
    pub fn into_vec<T: Element>(self) -> Result<Vec<T>, Self> {
        T::into_vec(self)
    }

    /// Every element widened to `f64`; 64-bit integers may lose precision.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        dispatch!(self, v => v.iter().map(|x| x.to_f64()).collect())
    }

    /// A buffer of `len` copies of the first element of `fill`.
    pub(crate) fn repeat(fill: &TypedBuffer, len: usize) -> crate::Result<Self> {
        if fill.is_empty() {
            return Err(Error::general("fill value buffer is empty"));
        }
        Ok(dispatch!(fill, v => Element::into_buffer(vec![v[0]; len])))
    }

    /// Copy the block `count` at `src_start` of `src` (shaped `src_shape`)
    /// to `dst_start` of this buffer (shaped `dst_shape`).
    pub(crate) fn copy_block(
        &mut self,
        dst_shape: &[u64],
        dst_start: &[u64],
        src: &TypedBuffer,
        src_shape: &[u64],
        src_start: &[u64],
        count: &[u64],
    ) -> crate::Result<()> {
        let (dst_type, src_type) = (self.element_type(), src.element_type());
        dispatch_pair!(
            self,
            src,
            d,
            s => {
                copy_hyperslab(d, dst_shape, dst_start, s, src_shape, src_start, count)
            },
            Err(Error::general(format!(
                "cannot copy {src_type:?} elements into a {dst_type:?} buffer"
            )))
        )
    }
}

/// A fully materialised N-dimensional array in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalArray {
    shape: Vec<u64>,
    data: TypedBuffer,
}

impl LogicalArray {
    pub fn new(shape: Vec<u64>, data: TypedBuffer) -> crate::Result<Self> {
        let expected = num_elements(&shape)?;
        if expected != data.len() as u64 {
            return Err(Error::invalid(format!(
                "shape {shape:?} needs {expected} elements, buffer holds {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &TypedBuffer {
        &self.data
    }

    pub fn into_data(self) -> TypedBuffer {
        self.data
    }

    /// The flattened elements, if they are of type `T`.
    pub fn into_vec<T: Element>(self) -> crate::Result<Vec<T>> {
        self.data.into_vec().map_err(|b| {
            Error::invalid(format!(
                "array holds {:?}, not {:?}",
                b.element_type(),
                T::TYPE
            ))
        })
    }

    /// The element at a multi-dimensional index.
    pub fn get<T: Element>(&self, index: &[u64]) -> Option<T> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0u64;
        for (&i, &n) in index.iter().zip(&self.shape) {
            if i >= n {
                return None;
            }
            flat = flat * n + i;
        }
        self.data.as_slice::<T>()?.get(flat as usize).copied()
    }
}
