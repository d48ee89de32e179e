//! Decoding of fixed-width numeric elements.
//!
//! A [DatatypeDescriptor] describes how one element is laid out in the file;
//! [DatatypeDescriptor::decode] turns a contiguous run of such elements into
//! a [TypedBuffer] in native representation.

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::buffer::{Element, ElementType, TypedBuffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumericClass {
    /// Two's complement integer.
    SignedFixedPoint,
    UnsignedFixedPoint,
    /// IEEE-754 binary16/32/64.
    FloatingPoint,
}

/// Layout of a single numeric element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatatypeDescriptor {
    #[serde(default)]
    pub byte_order: ByteOrder,
    pub class: NumericClass,
    /// Storage size of one element in bits.
    pub bit_size: u32,
    /// First significant bit within the element.
    #[serde(default)]
    pub bit_offset: u32,
    /// Number of significant bits; the full storage size if absent.
    #[serde(default)]
    pub bit_precision: Option<u32>,
}

impl DatatypeDescriptor {
    pub fn new(class: NumericClass, bit_size: u32, byte_order: ByteOrder) -> Self {
        Self {
            byte_order,
            class,
            bit_size,
            bit_offset: 0,
            bit_precision: None,
        }
    }

    /// Restrict a fixed-point type to `precision` significant bits starting at `offset`.
    pub fn with_bit_field(mut self, offset: u32, precision: u32) -> Self {
        self.bit_offset = offset;
        self.bit_precision = Some(precision);
        self
    }

    pub fn precision(&self) -> u32 {
        self.bit_precision.unwrap_or(self.bit_size)
    }

    /// Bytes occupied by one element.
    pub fn element_size(&self) -> usize {
        (self.bit_size / 8) as usize
    }

    fn is_bit_field(&self) -> bool {
        self.bit_offset != 0 || self.precision() != self.bit_size
    }

    /// Check that this type can be decoded, returning the native element type.
    pub fn element_type(&self) -> crate::Result<ElementType> {
        if self.bit_size == 0 || self.bit_size % 8 != 0 {
            return Err(self.unsupported("bit size must be a positive multiple of 8"));
        }
        let precision = self.precision();
        let end = self.bit_offset.checked_add(precision);
        if precision == 0 || end.is_none_or(|end| end > self.bit_size) {
            return Err(self.unsupported("significant bits exceed storage size"));
        }
        let ty = match (self.class, self.bit_size) {
            (NumericClass::SignedFixedPoint, 8) => ElementType::Int8,
            (NumericClass::SignedFixedPoint, 16) => ElementType::Int16,
            (NumericClass::SignedFixedPoint, 32) => ElementType::Int32,
            (NumericClass::SignedFixedPoint, 64) => ElementType::Int64,
            (NumericClass::UnsignedFixedPoint, 8) => ElementType::UInt8,
            (NumericClass::UnsignedFixedPoint, 16) => ElementType::UInt16,
            (NumericClass::UnsignedFixedPoint, 32) => ElementType::UInt32,
            (NumericClass::UnsignedFixedPoint, 64) => ElementType::UInt64,
            (NumericClass::FloatingPoint, 16) => ElementType::Float16,
            (NumericClass::FloatingPoint, 32) => ElementType::Float32,
            (NumericClass::FloatingPoint, 64) => ElementType::Float64,
            _ => return Err(self.unsupported("no native representation")),
        };
        if self.class == NumericClass::FloatingPoint && self.is_bit_field() {
            return Err(self.unsupported("floating point types must use their full width"));
        }
        Ok(ty)
    }

    fn unsupported(&self, reason: &str) -> Error {
        Error::UnsupportedDatatype(format!(
            "{:?} {}-bit {:?} (offset {}, precision {}): {reason}",
            self.class,
            self.bit_size,
            self.byte_order,
            self.bit_offset,
            self.precision()
        ))
    }

    /// Decode a run of whole elements.
    pub fn decode(&self, bytes: &[u8]) -> crate::Result<TypedBuffer> {
        let ty = self.element_type()?;
        let size = self.element_size();
        if bytes.len() % size != 0 {
            return Err(Error::SizeMismatch {
                expected: (bytes.len() / size * size) as u64,
                actual: bytes.len() as u64,
            });
        }
        let order = self.byte_order;
        let out = match ty {
            ElementType::Int8 => TypedBuffer::Int8(self.decode_int(bytes, order)?),
            ElementType::Int16 => TypedBuffer::Int16(self.decode_int(bytes, order)?),
            ElementType::Int32 => TypedBuffer::Int32(self.decode_int(bytes, order)?),
            ElementType::Int64 => TypedBuffer::Int64(self.decode_int(bytes, order)?),
            ElementType::UInt8 => TypedBuffer::UInt8(self.decode_int(bytes, order)?),
            ElementType::UInt16 => TypedBuffer::UInt16(self.decode_int(bytes, order)?),
            ElementType::UInt32 => TypedBuffer::UInt32(self.decode_int(bytes, order)?),
            ElementType::UInt64 => TypedBuffer::UInt64(self.decode_int(bytes, order)?),
            ElementType::Float16 => TypedBuffer::Float16(decode_plain(bytes, order)),
            ElementType::Float32 => TypedBuffer::Float32(decode_plain(bytes, order)),
            ElementType::Float64 => TypedBuffer::Float64(decode_plain(bytes, order)),
        };
        Ok(out)
    }

    fn decode_int<T: FixedPoint>(&self, bytes: &[u8], order: ByteOrder) -> crate::Result<Vec<T>> {
        if !self.is_bit_field() {
            return Ok(decode_plain(bytes, order));
        }
        let shift = self.bit_offset;
        let precision = self.precision();
        let signed = self.class == NumericClass::SignedFixedPoint;
        Ok(decode_plain::<T>(bytes, order)
            .into_iter()
            .map(|v| v.extract_bits(shift, precision, signed))
            .collect())
    }
}

fn decode_plain<T: Element>(bytes: &[u8], order: ByteOrder) -> Vec<T> {
    bytes
        .chunks_exact(T::SIZE)
        .map(|b| match order {
            ByteOrder::LittleEndian => T::from_le_slice(b),
            ByteOrder::BigEndian => T::from_be_slice(b),
        })
        .collect()
}

/// Integers which can hold a bit field narrower than themselves.
trait FixedPoint: Element {
    fn extract_bits(self, shift: u32, precision: u32, signed: bool) -> Self;
}

macro_rules! fixed_point {
    ($($t:ty => $u:ty, $s:ty);* $(;)?) => {$(
        impl FixedPoint for $t {
            fn extract_bits(self, shift: u32, precision: u32, signed: bool) -> Self {
                let bits = <$u>::BITS;
                // left-align the field, then shift back down to extend the sign if needed
                let left = (self as $u) << (bits - shift - precision);
                if signed {
                    ((left as $s) >> (bits - precision)) as $t
                } else {
                    (left >> (bits - precision)) as $t
                }
            }
        }
    )*};
}

fixed_point!(
    i8 => u8, i8;
    i16 => u16, i16;
    i32 => u32, i32;
    i64 => u64, i64;
    u8 => u8, i8;
    u16 => u16, i16;
    u32 => u32, i32;
    u64 => u64, i64;
);
