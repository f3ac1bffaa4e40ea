//! Wire primitives: offset encodings, alignment math, scalar pack/unpack.
//!
//! Everything in this module is pure and allocation-free. All multi-byte
//! values are little-endian, matching `flatc`'s reference encoding.

use crate::error::FbError;
use std::convert::{TryFrom, TryInto};

/// Width in bytes of a `uoffset` (forward relative offset, always positive).
pub const UOFFSET_SIZE: usize = 4;
/// Width in bytes of a `soffset` (signed, used for vtable back-pointers).
pub const SOFFSET_SIZE: usize = 4;
/// Width in bytes of a `voffset` (vtable field slot offset).
pub const VOFFSET_SIZE: usize = 2;
/// Width in bytes of a `vsize` (vtable byte-length header field).
pub const VSIZE_SIZE: usize = 2;

/// A primitive base type recognized by the schema language. Shared,
/// immutable, copied by value wherever a field or skeleton needs to know
/// "what kind of number is this".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

impl ScalarType {
    /// Inline byte width of this scalar on the wire.
    pub fn size(self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::Int8 | ScalarType::Uint8 => 1,
            ScalarType::Int16 | ScalarType::Uint16 => 2,
            ScalarType::Int32 | ScalarType::Uint32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::Uint64 | ScalarType::Float64 => 8,
        }
    }

    /// Natural alignment of this scalar, equal to its size for every
    /// FlatBuffers scalar type.
    pub fn align(self) -> usize {
        self.size()
    }

    /// Resolve one of the FlatBuffers IDL keywords (including the C-style
    /// aliases `byte`/`short`/`int`/`long`/`ubyte`/`ushort`/`uint`/`ulong`)
    /// to a `ScalarType`. Returns `None` for identifiers that aren't
    /// built-in scalar keywords.
    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "bool" => ScalarType::Bool,
            "int8" | "byte" => ScalarType::Int8,
            "uint8" | "ubyte" => ScalarType::Uint8,
            "int16" | "short" => ScalarType::Int16,
            "uint16" | "ushort" => ScalarType::Uint16,
            "int32" | "int" => ScalarType::Int32,
            "uint32" | "uint" => ScalarType::Uint32,
            "int64" | "long" => ScalarType::Int64,
            "uint64" | "ulong" => ScalarType::Uint64,
            "float32" | "float" => ScalarType::Float32,
            "float64" | "double" => ScalarType::Float64,
            _ => return None,
        })
    }

    /// Canonical (non-alias) FlatBuffers keyword for this type.
    pub fn keyword(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int8 => "int8",
            ScalarType::Uint8 => "uint8",
            ScalarType::Int16 => "int16",
            ScalarType::Uint16 => "uint16",
            ScalarType::Int32 => "int32",
            ScalarType::Uint32 => "uint32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint64 => "uint64",
            ScalarType::Float32 => "float32",
            ScalarType::Float64 => "float64",
        }
    }
}

/// Round `offset` up to the next multiple of `align` (`align` must be a
/// power of two, as every alignment in this format is).
pub fn align_up(offset: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (offset + align - 1) & !(align - 1)
}

/// Number of padding bytes needed to bring `cursor` up to `align`.
pub fn calc_padding(cursor: usize, align: usize) -> usize {
    align_up(cursor, align) - cursor
}

/// A packed scalar value, tagged by type, ready for wire emission or just
/// read off the wire. This is the common currency between the skeleton
/// builder's default-value coercion and the encoder/decoder's field I/O.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Bool(bool),
    Int8(i8),
    Uint8(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
}

impl ScalarValue {
    pub fn scalar_type(self) -> ScalarType {
        match self {
            ScalarValue::Bool(_) => ScalarType::Bool,
            ScalarValue::Int8(_) => ScalarType::Int8,
            ScalarValue::Uint8(_) => ScalarType::Uint8,
            ScalarValue::Int16(_) => ScalarType::Int16,
            ScalarValue::Uint16(_) => ScalarType::Uint16,
            ScalarValue::Int32(_) => ScalarType::Int32,
            ScalarValue::Uint32(_) => ScalarType::Uint32,
            ScalarValue::Int64(_) => ScalarType::Int64,
            ScalarValue::Uint64(_) => ScalarType::Uint64,
            ScalarValue::Float32(_) => ScalarType::Float32,
            ScalarValue::Float64(_) => ScalarType::Float64,
        }
    }

    /// Widen to i64 for integer types, used by enum discriminant coercion.
    /// Returns `None` for float/bool values.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            ScalarValue::Int8(v) => Some(v as i64),
            ScalarValue::Uint8(v) => Some(v as i64),
            ScalarValue::Int16(v) => Some(v as i64),
            ScalarValue::Uint16(v) => Some(v as i64),
            ScalarValue::Int32(v) => Some(v as i64),
            ScalarValue::Uint32(v) => Some(v as i64),
            ScalarValue::Int64(v) => Some(v),
            ScalarValue::Uint64(v) => Some(v as i64),
            ScalarValue::Bool(_) | ScalarValue::Float32(_) | ScalarValue::Float64(_) => None,
        }
    }

    /// Coerce a signed 64-bit integer into the given scalar type, checking
    /// range. Shared by the skeleton builder's default-literal coercion and
    /// the encoder's native-value coercion so both use one rule.
    pub fn from_i64(ty: ScalarType, v: i64) -> Result<ScalarValue, FbError> {
        Ok(match ty {
            ScalarType::Bool => ScalarValue::Bool(v != 0),
            ScalarType::Int8 => ScalarValue::Int8(i8::try_from(v).map_err(|_| FbError::new("int8 value out of range"))?),
            ScalarType::Int16 => ScalarValue::Int16(i16::try_from(v).map_err(|_| FbError::new("int16 value out of range"))?),
            ScalarType::Int32 => ScalarValue::Int32(i32::try_from(v).map_err(|_| FbError::new("int32 value out of range"))?),
            ScalarType::Int64 => ScalarValue::Int64(v),
            ScalarType::Uint8 => ScalarValue::Uint8(u8::try_from(v).map_err(|_| FbError::new("uint8 value out of range"))?),
            ScalarType::Uint16 => ScalarValue::Uint16(u16::try_from(v).map_err(|_| FbError::new("uint16 value out of range"))?),
            ScalarType::Uint32 => ScalarValue::Uint32(u32::try_from(v).map_err(|_| FbError::new("uint32 value out of range"))?),
            ScalarType::Uint64 => ScalarValue::Uint64(v as u64),
            ScalarType::Float32 => ScalarValue::Float32(v as f32),
            ScalarType::Float64 => ScalarValue::Float64(v as f64),
        })
    }

    /// Coerce an unsigned 64-bit integer (for literals too large to fit in
    /// `i64`, e.g. a `uint64` near its max) into the given scalar type.
    pub fn from_u64(ty: ScalarType, v: u64) -> Result<ScalarValue, FbError> {
        if ty == ScalarType::Uint64 {
            return Ok(ScalarValue::Uint64(v));
        }
        i64::try_from(v).map_err(|_| FbError::new("value out of range")).and_then(|v| Self::from_i64(ty, v))
    }

    /// Coerce a 64-bit float into the given scalar type.
    pub fn from_f64(ty: ScalarType, v: f64) -> Result<ScalarValue, FbError> {
        Ok(match ty {
            ScalarType::Float32 => ScalarValue::Float32(v as f32),
            ScalarType::Float64 => ScalarValue::Float64(v),
            _ => return Self::from_i64(ty, v as i64),
        })
    }

    /// True if this value is bit-for-bit the default (zero/false/0.0) for
    /// its type. Used by the encoder to decide whether a table slot may be
    /// omitted.
    pub fn is_zero(self) -> bool {
        match self {
            ScalarValue::Bool(v) => !v,
            ScalarValue::Int8(v) => v == 0,
            ScalarValue::Uint8(v) => v == 0,
            ScalarValue::Int16(v) => v == 0,
            ScalarValue::Uint16(v) => v == 0,
            ScalarValue::Int32(v) => v == 0,
            ScalarValue::Uint32(v) => v == 0,
            ScalarValue::Int64(v) => v == 0,
            ScalarValue::Uint64(v) => v == 0,
            ScalarValue::Float32(v) => v == 0.0,
            ScalarValue::Float64(v) => v == 0.0,
        }
    }
}

/// Pack a scalar value into its little-endian wire representation.
pub fn pack_scalar(value: ScalarValue) -> Vec<u8> {
    match value {
        ScalarValue::Bool(v) => vec![if v { 1 } else { 0 }],
        ScalarValue::Int8(v) => vec![v as u8],
        ScalarValue::Uint8(v) => vec![v],
        ScalarValue::Int16(v) => v.to_le_bytes().to_vec(),
        ScalarValue::Uint16(v) => v.to_le_bytes().to_vec(),
        ScalarValue::Int32(v) => v.to_le_bytes().to_vec(),
        ScalarValue::Uint32(v) => v.to_le_bytes().to_vec(),
        ScalarValue::Int64(v) => v.to_le_bytes().to_vec(),
        ScalarValue::Uint64(v) => v.to_le_bytes().to_vec(),
        ScalarValue::Float32(v) => v.to_le_bytes().to_vec(),
        ScalarValue::Float64(v) => v.to_le_bytes().to_vec(),
    }
}

/// Write a scalar value's little-endian bytes directly into `out` at
/// `offset`, without allocating an intermediate `Vec`. `out` must already
/// be at least `offset + ty.size()` bytes long.
pub fn write_scalar(out: &mut [u8], offset: usize, value: ScalarValue) {
    let bytes = pack_scalar(value);
    out[offset..offset + bytes.len()].copy_from_slice(&bytes);
}

/// Unpack a scalar value of the given type from `bytes` at `offset`.
/// Per format convention this is unchecked: reading past the true data
/// (but not past the slice) yields garbage rather than an error. The
/// caller (decoder) is responsible for bounds-checking `offset` against
/// the buffer length before calling this.
pub fn unpack_scalar(ty: ScalarType, bytes: &[u8], offset: usize) -> Result<ScalarValue, FbError> {
    let size = ty.size();
    if offset + size > bytes.len() {
        return Err(FbError::TruncatedBuffer { at: offset, needed: size, len: bytes.len() });
    }
    let slice = &bytes[offset..offset + size];
    Ok(match ty {
        ScalarType::Bool => ScalarValue::Bool(slice[0] != 0),
        ScalarType::Int8 => ScalarValue::Int8(slice[0] as i8),
        ScalarType::Uint8 => ScalarValue::Uint8(slice[0]),
        ScalarType::Int16 => ScalarValue::Int16(i16::from_le_bytes(slice.try_into().unwrap())),
        ScalarType::Uint16 => ScalarValue::Uint16(u16::from_le_bytes(slice.try_into().unwrap())),
        ScalarType::Int32 => ScalarValue::Int32(i32::from_le_bytes(slice.try_into().unwrap())),
        ScalarType::Uint32 => ScalarValue::Uint32(u32::from_le_bytes(slice.try_into().unwrap())),
        ScalarType::Int64 => ScalarValue::Int64(i64::from_le_bytes(slice.try_into().unwrap())),
        ScalarType::Uint64 => ScalarValue::Uint64(u64::from_le_bytes(slice.try_into().unwrap())),
        ScalarType::Float32 => ScalarValue::Float32(f32::from_le_bytes(slice.try_into().unwrap())),
        ScalarType::Float64 => ScalarValue::Float64(f64::from_le_bytes(slice.try_into().unwrap())),
    })
}

/// Read a `uoffset` (u32) at `offset`. Bounds-checked.
pub fn read_uoffset(bytes: &[u8], offset: usize) -> Result<u32, FbError> {
    if offset + UOFFSET_SIZE > bytes.len() {
        return Err(FbError::TruncatedBuffer { at: offset, needed: UOFFSET_SIZE, len: bytes.len() });
    }
    Ok(u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap()))
}

/// Read a `soffset` (i32) at `offset`. Bounds-checked.
pub fn read_soffset(bytes: &[u8], offset: usize) -> Result<i32, FbError> {
    if offset + SOFFSET_SIZE > bytes.len() {
        return Err(FbError::TruncatedBuffer { at: offset, needed: SOFFSET_SIZE, len: bytes.len() });
    }
    Ok(i32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap()))
}

/// Read a `voffset` (u16) at `offset`. Bounds-checked.
pub fn read_voffset(bytes: &[u8], offset: usize) -> Result<u16, FbError> {
    if offset + VOFFSET_SIZE > bytes.len() {
        return Err(FbError::TruncatedBuffer { at: offset, needed: VOFFSET_SIZE, len: bytes.len() });
    }
    Ok(u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap()))
}

/// Read a `vsize` (u16) at `offset`. Bounds-checked.
pub fn read_vsize(bytes: &[u8], offset: usize) -> Result<u16, FbError> {
    read_voffset(bytes, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(9, 4), 12);
    }

    #[test]
    fn calc_padding_matches_align_up() {
        assert_eq!(calc_padding(5, 4), 3);
        assert_eq!(calc_padding(8, 4), 0);
    }

    #[test]
    fn scalar_keyword_aliases_resolve() {
        assert_eq!(ScalarType::from_keyword("byte"), Some(ScalarType::Int8));
        assert_eq!(ScalarType::from_keyword("uint"), Some(ScalarType::Uint32));
        assert_eq!(ScalarType::from_keyword("double"), Some(ScalarType::Float64));
        assert_eq!(ScalarType::from_keyword("nope"), None);
    }

    #[test]
    fn pack_unpack_round_trips() {
        let v = ScalarValue::Int32(-8);
        let bytes = pack_scalar(v);
        assert_eq!(unpack_scalar(ScalarType::Int32, &bytes, 0).unwrap(), v);
    }

    #[test]
    fn unpack_past_end_is_truncated_error() {
        let bytes = [0u8; 2];
        assert!(unpack_scalar(ScalarType::Int32, &bytes, 0).is_err());
    }
}
