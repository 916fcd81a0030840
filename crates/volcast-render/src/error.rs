//! Rendering error types.

use thiserror::Error;
use volcast_core::VolumeError;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create wgpu adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create wgpu device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Encoding or layout failure in the volume data.
    #[error(transparent)]
    Volume(#[from] VolumeError),

    /// Shader compilation failed.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// A uniform was set that the program never declared.
    #[error("unknown uniform `{0}`")]
    UnknownUniform(String),

    /// A uniform was set with a value of the wrong kind.
    #[error("uniform `{name}` expects {expected}")]
    UniformTypeMismatch { name: String, expected: String },

    /// A handle that the device never created or already deleted.
    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u32 },

    /// An opacity table level outside the allocated range.
    #[error("opacity level {level} out of range (have {count})")]
    InvalidOpacityLevel { level: usize, count: usize },

    /// Resources were used before initialization.
    #[error("resources not initialized")]
    NotInitialized,

    /// The host did not provide a target to draw into.
    #[error("no render target set")]
    MissingRenderTarget,

    /// A sampler uniform names a unit with no texture of its dimensionality.
    #[error("sampler `{name}` reads unit {unit}, which has no texture bound")]
    UnboundSampler { name: String, unit: u32 },

    /// Reading pixels back from the GPU failed.
    #[error("GPU buffer mapping failed")]
    BufferMapFailed,

    /// A buffer could not be filled.
    #[error("buffer upload failed: {0}")]
    BufferUploadFailed(String),

    /// Texture creation failed.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
