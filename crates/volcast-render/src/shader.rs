//! Shader sources and the ray caster's uniform contract.

use std::borrow::Cow;

use crate::device::{TextureTarget, UniformKind};

/// Vertex attribute carrying cube corner positions.
pub const VERTEX_POSITION_ATTRIBUTE: &str = "in_vertex_pos";

/// Uniform slots of the ray-casting program, in declaration order.
///
/// Backends that pack uniforms (see `WgpuDevice`) lay them out in this order,
/// and `raycast.wgsl` mirrors it.
pub const RAYCAST_UNIFORMS: &[(&str, UniformKind)] = &[
    ("scene_matrix", UniformKind::Mat4),
    ("modelview_matrix", UniformKind::Mat4),
    ("projection_matrix", UniformKind::Mat4),
    ("volume", UniformKind::Sampler(TextureTarget::D3)),
    ("camera_pos", UniformKind::Vec3),
    ("light_pos", UniformKind::Vec3),
    ("step_size", UniformKind::Vec3),
    ("sample_distance", UniformKind::Float),
    ("scale", UniformKind::Float),
    ("shift", UniformKind::Float),
    ("cell_scale", UniformKind::Vec3),
    ("color_transfer_func", UniformKind::Sampler(TextureTarget::D1)),
    ("opacity_transfer_func", UniformKind::Sampler(TextureTarget::D1)),
    ("noise", UniformKind::Sampler(TextureTarget::D2)),
    ("vol_extents_min", UniformKind::Vec3),
    ("vol_extents_max", UniformKind::Vec3),
    ("texture_extents_min", UniformKind::Vec3),
    ("texture_extents_max", UniformKind::Vec3),
    ("texture_coord_offset", UniformKind::Vec3),
    ("enable_shading", UniformKind::Int),
    ("ambient", UniformKind::Vec3),
    ("diffuse", UniformKind::Vec3),
    ("specular", UniformKind::Vec3),
    ("shininess", UniformKind::Float),
    ("blend_mode", UniformKind::Int),
    ("components", UniformKind::Int),
];

/// WGSL source of a program with its entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub label: String,
    pub wgsl: Cow<'static, str>,
    pub vertex_entry: String,
    pub fragment_entry: String,
}

impl ShaderSource {
    /// The single-pass ray-casting program.
    #[must_use]
    pub fn raycast() -> Self {
        Self {
            label: "volcast raycast".to_string(),
            wgsl: Cow::Borrowed(include_str!("shaders/raycast.wgsl")),
            vertex_entry: "vs_main".to_string(),
            fragment_entry: "fs_main".to_string(),
        }
    }
}
