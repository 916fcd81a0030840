//! Typed scalar storage for voxel data.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolumeError};

/// Storage type of a scalar array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// Platform-dependent 8-bit character; signedness is ambiguous.
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    /// Packed single bits.
    Bit,
    /// Opaque identifier values.
    IdType,
    /// Variable-length strings.
    String,
}

impl ScalarType {
    /// Whether the volume mapper can encode this type into a texture.
    #[must_use]
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::UInt8 | Self::Int16 | Self::UInt16 | Self::Int32 | Self::UInt32 | Self::Float32
        )
    }

    /// Bit width of the integer types the mapper normalizes.
    #[must_use]
    pub fn integer_bits(self) -> Option<u32> {
        match self {
            Self::Int8 | Self::UInt8 => Some(8),
            Self::Int16 | Self::UInt16 => Some(16),
            Self::Int32 | Self::UInt32 => Some(32),
            _ => None,
        }
    }

    /// Whether this is a signed integer type.
    #[must_use]
    pub fn is_signed_integer(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32)
    }

    /// `2^bits - 1` for the normalizable integer types.
    #[must_use]
    pub fn unsigned_max(self) -> Option<f64> {
        self.integer_bits().map(|bits| 2f64.powi(bits as i32) - 1.0)
    }

    /// Value the texture sampler reports for a raw texel of this type.
    ///
    /// Unsigned integers map `c -> c / (2^n - 1)`, signed integers
    /// `c -> (2c + 1) / (2^n - 1)`, floats are passed through.
    #[must_use]
    pub fn normalize(self, raw: f64) -> f64 {
        match self.unsigned_max() {
            Some(umax) if self.is_signed_integer() => (2.0 * raw + 1.0) / umax,
            Some(umax) => raw / umax,
            None => raw,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Char => "char",
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Bit => "bit",
            Self::IdType => "id",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// Backing storage of a [`ScalarArray`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarBuffer {
    Char(Vec<u8>),
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    /// Bits packed eight per byte, least significant bit first.
    Bit(Vec<u8>),
    IdType(Vec<i64>),
    String(Vec<String>),
}

macro_rules! impl_from_vec {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for ScalarBuffer {
                fn from(values: Vec<$ty>) -> Self {
                    Self::$variant(values)
                }
            }
        )*
    };
}

impl_from_vec! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => String,
}

impl ScalarBuffer {
    /// Storage type of the buffer.
    #[must_use]
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Char(_) => ScalarType::Char,
            Self::Int8(_) => ScalarType::Int8,
            Self::UInt8(_) => ScalarType::UInt8,
            Self::Int16(_) => ScalarType::Int16,
            Self::UInt16(_) => ScalarType::UInt16,
            Self::Int32(_) => ScalarType::Int32,
            Self::UInt32(_) => ScalarType::UInt32,
            Self::Int64(_) => ScalarType::Int64,
            Self::UInt64(_) => ScalarType::UInt64,
            Self::Float32(_) => ScalarType::Float32,
            Self::Float64(_) => ScalarType::Float64,
            Self::Bit(_) => ScalarType::Bit,
            Self::IdType(_) => ScalarType::IdType,
            Self::String(_) => ScalarType::String,
        }
    }

    /// Number of stored values (bits for [`ScalarBuffer::Bit`]).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Char(v) | Self::UInt8(v) => v.len(),
            Self::Bit(v) => v.len() * 8,
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::UInt16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::UInt32(v) => v.len(),
            Self::Int64(v) | Self::IdType(v) => v.len(),
            Self::UInt64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::String(v) => v.len(),
        }
    }

    /// Whether the buffer holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at a flat index as `f64`. `None` for strings or out-of-range indices.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value(&self, index: usize) -> Option<f64> {
        match self {
            Self::Char(v) | Self::UInt8(v) => v.get(index).map(|&x| f64::from(x)),
            Self::Int8(v) => v.get(index).map(|&x| f64::from(x)),
            Self::Int16(v) => v.get(index).map(|&x| f64::from(x)),
            Self::UInt16(v) => v.get(index).map(|&x| f64::from(x)),
            Self::Int32(v) => v.get(index).map(|&x| f64::from(x)),
            Self::UInt32(v) => v.get(index).map(|&x| f64::from(x)),
            Self::Int64(v) | Self::IdType(v) => v.get(index).map(|&x| x as f64),
            Self::UInt64(v) => v.get(index).map(|&x| x as f64),
            Self::Float32(v) => v.get(index).map(|&x| f64::from(x)),
            Self::Float64(v) => v.get(index).copied(),
            Self::Bit(v) => v
                .get(index / 8)
                .map(|byte| f64::from((byte >> (index % 8)) & 1)),
            Self::String(_) => None,
        }
    }

    /// Raw bytes of the numeric storage, in native byte order.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Char(v) | Self::UInt8(v) | Self::Bit(v) => Some(v.as_slice()),
            Self::Int8(v) => Some(bytemuck::cast_slice(v)),
            Self::Int16(v) => Some(bytemuck::cast_slice(v)),
            Self::UInt16(v) => Some(bytemuck::cast_slice(v)),
            Self::Int32(v) => Some(bytemuck::cast_slice(v)),
            Self::UInt32(v) => Some(bytemuck::cast_slice(v)),
            Self::Int64(v) | Self::IdType(v) => Some(bytemuck::cast_slice(v)),
            Self::UInt64(v) => Some(bytemuck::cast_slice(v)),
            Self::Float32(v) => Some(bytemuck::cast_slice(v)),
            Self::Float64(v) => Some(bytemuck::cast_slice(v)),
            Self::String(_) => None,
        }
    }
}

/// A named array of tuples, each holding `components` scalar values.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarArray {
    name: String,
    components: usize,
    data: ScalarBuffer,
}

impl ScalarArray {
    /// Creates an array. The value count must be a multiple of `components`.
    pub fn new(name: impl Into<String>, components: usize, data: impl Into<ScalarBuffer>) -> Result<Self> {
        let data = data.into();
        let components = components.max(1);
        if data.len() % components != 0 {
            return Err(VolumeError::SizeMismatch {
                expected: data.len().next_multiple_of(components),
                actual: data.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            components,
            data,
        })
    }

    /// Creates a single-component array.
    pub fn single(name: impl Into<String>, data: impl Into<ScalarBuffer>) -> Self {
        Self {
            name: name.into(),
            components: 1,
            data: data.into(),
        }
    }

    /// Array name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of components per tuple.
    #[must_use]
    pub fn number_of_components(&self) -> usize {
        self.components
    }

    /// Number of tuples.
    #[must_use]
    pub fn number_of_tuples(&self) -> usize {
        self.data.len() / self.components
    }

    /// Storage type.
    #[must_use]
    pub fn scalar_type(&self) -> ScalarType {
        self.data.scalar_type()
    }

    /// Backing storage.
    #[must_use]
    pub fn data(&self) -> &ScalarBuffer {
        &self.data
    }

    /// Value of one component of one tuple.
    #[must_use]
    pub fn value(&self, tuple: usize, component: usize) -> Option<f64> {
        if component >= self.components {
            return None;
        }
        self.data.value(tuple * self.components + component)
    }

    /// `(min, max)` of one component, ignoring NaN. `None` when there is no
    /// numeric value to inspect.
    #[must_use]
    pub fn range(&self, component: usize) -> Option<(f64, f64)> {
        if component >= self.components {
            return None;
        }
        (0..self.number_of_tuples())
            .filter_map(|t| self.value(t, component))
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
