//! Error types for volcast.

use thiserror::Error;

use crate::scalars::ScalarType;

/// The main error type for volume data and encoding operations.
#[derive(Error, Debug)]
pub enum VolumeError {
    /// The scalar storage type cannot be encoded into a texture.
    #[error("scalar type {0} is not supported by the volume mapper")]
    UnsupportedScalarType(ScalarType),

    /// The component count / independence combination is not supported.
    #[error(
        "unsupported component layout: {components} component(s), independent = {independent}"
    )]
    UnsupportedComponentLayout { components: usize, independent: bool },

    /// An extent is not well ordered (min > max on some axis).
    #[error("invalid extent {0:?}: min must not exceed max on any axis")]
    InvalidExtent([i32; 6]),

    /// No scalar array matched the requested lookup.
    #[error("no scalars found on input")]
    ScalarsNotFound,

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A mapper option is outside its valid range.
    #[error("invalid option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: &'static str },

    /// Configuration (de)serialization error.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// A specialized Result type for volcast core operations.
pub type Result<T> = std::result::Result<T, VolumeError>;
