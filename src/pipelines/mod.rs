//! Render pipeline abstractions and shader registries.
//!
//! The stereo pipeline drives three collaborators: a [`RenderBackend`]
//! (target binding, viewport, clear, state toggles), [`MaterialShader`]s
//! resolved per draw through the [`ShaderRegistry`], and
//! [`PostEffectShader`]s resolved through the [`PostEffectRegistry`]. The
//! wgpu implementations live in `unlit` and `posteffect`; tests drive the
//! pipeline with recording fakes instead.

pub mod posteffect;
pub mod stereo;
pub mod unlit;

use std::collections::HashMap;

use cgmath::Matrix4;
use thiserror::Error;

use crate::data_structures::geometry::Geometry;
use crate::data_structures::material::{Material, PostEffectData, PostEffectKind, ShaderKind};
use crate::data_structures::scene::RenderFlags;

/// GPU state toggles the pipeline sequences around each draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateFlag {
    CullFace,
    DepthTest,
    Blend,
    PolygonOffset,
}

/// Handle to a render target owned by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId(pub u32);

/// A target handle plus its pixel dimensions, enough for the pipeline to set
/// the viewport after binding.
#[derive(Clone, Copy, Debug)]
pub struct TargetSpec {
    pub id: TargetId,
    pub width: u32,
    pub height: u32,
}

/// The GPU state machine the stereo pipeline talks to.
///
/// Implementations hold the actual framebuffers; the pipeline only sequences
/// binds, clears and state toggles. Fixed pass state (depth LEQUAL, CCW
/// back-face culling, ONE / ONE_MINUS_SRC_ALPHA blending) is baked into the
/// implementation; the toggles only switch those stages on and off.
pub trait RenderBackend {
    fn bind_target(&mut self, target: TargetId);
    fn set_viewport(&mut self, width: u32, height: u32);
    /// Clear color and depth of the bound target.
    fn clear(&mut self, color: [f32; 4]);
    fn set_flag(&mut self, flag: StateFlag, enabled: bool);
    fn set_polygon_offset(&mut self, factor: f32, units: f32);
}

/// A failed draw call. Caught per entry by the pipeline, never propagated
/// past the pass.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ShaderFault {
    pub message: String,
}

impl ShaderFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything one material shader needs for one draw.
pub struct DrawCall<'a> {
    pub object_name: &'a str,
    pub geometry: &'a Geometry,
    pub material: &'a Material,
    pub flags: &'a RenderFlags,
}

/// One material shader variant. Stereo variants receive `right_eye`;
/// non-stereo variants ignore it.
pub trait MaterialShader {
    fn render(
        &mut self,
        mvp: &Matrix4<f32>,
        draw: &DrawCall<'_>,
        right_eye: bool,
    ) -> Result<(), ShaderFault>;
}

/// One post-effect pass: reads `source`, writes the currently bound target.
pub trait PostEffectShader {
    fn render(&mut self, effect: &PostEffectData, source: TargetId) -> Result<(), ShaderFault>;
}

/// Shader lookup by material tag.
///
/// Built-ins and customs share one table keyed by [`ShaderKind`]; the error
/// shader is separate and always present so the pipeline has a fallback for
/// unresolved tags and failed draws.
pub struct ShaderRegistry {
    shaders: HashMap<ShaderKind, Box<dyn MaterialShader>>,
    error: Box<dyn MaterialShader>,
}

impl ShaderRegistry {
    pub fn new(error: Box<dyn MaterialShader>) -> Self {
        Self {
            shaders: HashMap::new(),
            error,
        }
    }

    pub fn register(&mut self, kind: ShaderKind, shader: Box<dyn MaterialShader>) {
        self.shaders.insert(kind, shader);
    }

    pub fn register_custom(&mut self, id: u32, shader: Box<dyn MaterialShader>) {
        self.shaders.insert(ShaderKind::Custom(id), shader);
    }

    pub fn resolve(&mut self, kind: ShaderKind) -> Option<&mut dyn MaterialShader> {
        self.shaders.get_mut(&kind).map(|shader| &mut **shader as _)
    }

    pub fn error_shader(&mut self) -> &mut dyn MaterialShader {
        self.error.as_mut()
    }
}

/// Post-effect shader lookup by effect tag.
pub struct PostEffectRegistry {
    shaders: HashMap<PostEffectKind, Box<dyn PostEffectShader>>,
}

impl PostEffectRegistry {
    pub fn new() -> Self {
        Self {
            shaders: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: PostEffectKind, shader: Box<dyn PostEffectShader>) {
        self.shaders.insert(kind, shader);
    }

    pub fn resolve(&mut self, kind: PostEffectKind) -> Option<&mut dyn PostEffectShader> {
        self.shaders.get_mut(&kind).map(|shader| &mut **shader as _)
    }
}

impl Default for PostEffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
