//! The stereo multi-pass renderer.
//!
//! One [`StereoRenderer`] executes a camera pass over a compiled draw list:
//! bind and clear the target (or the first ping-pong buffer when the camera
//! carries post-effects), sequence GPU state per entry, dispatch each draw to
//! its shader variant, then run the post-effect chain alternating between the
//! two auxiliary buffers with the final effect landing on the real target.
//! A failed draw never aborts the pass; the entry is re-rendered with the
//! error shader and execution continues.

use cgmath::Matrix4;
use log::{error, warn};
use thiserror::Error;

use super::{DrawCall, PostEffectRegistry, RenderBackend, ShaderRegistry, StateFlag, TargetSpec};
use crate::data_structures::scene::{ObjectId, RENDER_MASK_RIGHT, Scene};
use crate::render::DrawListCompiler;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("object \"{name}\" carries no camera")]
    MissingCamera { name: String },
    #[error("scene has no main camera rig")]
    MissingRig,
}

/// Per-pass options.
#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
    pub frustum_culling: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            frustum_culling: true,
        }
    }
}

pub struct StereoRenderer {
    /// The two auxiliary buffers the post-effect chain alternates between.
    ping_pong: [TargetSpec; 2],
}

impl StereoRenderer {
    pub fn new(ping_pong: [TargetSpec; 2]) -> Self {
        Self { ping_pong }
    }

    /// Render both eyes of the scene's main rig back to back.
    #[allow(clippy::too_many_arguments)]
    pub fn render_stereo(
        &mut self,
        scene: &Scene,
        compiler: &mut DrawListCompiler,
        backend: &mut dyn RenderBackend,
        shaders: &mut ShaderRegistry,
        effects: &mut PostEffectRegistry,
        left_target: TargetSpec,
        right_target: TargetSpec,
        options: RenderOptions,
    ) -> Result<(), PipelineError> {
        let rig_id = scene.main_camera_rig().ok_or(PipelineError::MissingRig)?;
        let rig = scene
            .object(rig_id)
            .camera_rig
            .ok_or(PipelineError::MissingRig)?;

        self.render_camera(
            scene, rig.left, compiler, backend, shaders, effects, left_target, options,
        )?;
        self.render_camera(
            scene, rig.right, compiler, backend, shaders, effects, right_target, options,
        )
    }

    /// Execute one camera pass into `target`.
    #[allow(clippy::too_many_arguments)]
    pub fn render_camera(
        &mut self,
        scene: &Scene,
        camera_id: ObjectId,
        compiler: &mut DrawListCompiler,
        backend: &mut dyn RenderBackend,
        shaders: &mut ShaderRegistry,
        effects: &mut PostEffectRegistry,
        target: TargetSpec,
        options: RenderOptions,
    ) -> Result<(), PipelineError> {
        let camera_object = scene.object(camera_id);
        let camera = camera_object
            .camera
            .as_ref()
            .ok_or_else(|| PipelineError::MissingCamera {
                name: camera_object.name.clone(),
            })?;

        let view_projection = camera.projection_matrix() * scene.view_matrix(camera_id);
        let culling = options.frustum_culling.then_some(&view_projection);
        let entries: Vec<ObjectId> = compiler
            .compile(scene, camera.render_mask, culling)
            .to_vec();

        let has_effects = !camera.post_effects.is_empty();
        let first_target = if has_effects { self.ping_pong[0] } else { target };
        backend.bind_target(first_target.id);
        backend.set_viewport(first_target.width, first_target.height);
        backend.clear(camera.background_color);

        // Fixed pass state; entries relax and restore it individually.
        backend.set_flag(StateFlag::DepthTest, true);
        backend.set_flag(StateFlag::CullFace, true);
        backend.set_flag(StateFlag::Blend, true);
        backend.set_flag(StateFlag::PolygonOffset, false);

        let right_eye = camera.render_mask & RENDER_MASK_RIGHT != 0;
        for id in entries {
            self.render_entry(scene, id, &view_projection, backend, shaders, right_eye);
        }

        if has_effects {
            self.render_post_effects(camera, backend, effects, target);
        }
        Ok(())
    }

    fn render_entry(
        &mut self,
        scene: &Scene,
        id: ObjectId,
        view_projection: &Matrix4<f32>,
        backend: &mut dyn RenderBackend,
        shaders: &mut ShaderRegistry,
        right_eye: bool,
    ) {
        let object = scene.object(id);
        let Some(render_data) = &object.render_data else {
            return;
        };
        let Some(material) = &render_data.material else {
            return;
        };
        let flags = render_data.flags;

        if !flags.cull_test {
            backend.set_flag(StateFlag::CullFace, false);
        }
        if !flags.depth_test {
            backend.set_flag(StateFlag::DepthTest, false);
        }
        if !flags.alpha_blend {
            backend.set_flag(StateFlag::Blend, false);
        }
        if flags.offset {
            backend.set_flag(StateFlag::PolygonOffset, true);
            backend.set_polygon_offset(flags.offset_factor, flags.offset_units);
        }

        let mvp = view_projection * scene.world_matrix(id);
        let draw = DrawCall {
            object_name: &object.name,
            geometry: &render_data.geometry,
            material,
            flags: &flags,
        };

        let result = match shaders.resolve(material.shader) {
            Some(shader) => shader.render(&mvp, &draw, right_eye),
            None => {
                warn!(
                    "no shader registered for {:?} on object \"{}\"",
                    material.shader, object.name
                );
                shaders.error_shader().render(&mvp, &draw, right_eye)
            }
        };
        if let Err(fault) = result {
            error!("shader fault on object \"{}\": {}", object.name, fault);
            if let Err(fault) = shaders.error_shader().render(&mvp, &draw, right_eye) {
                error!(
                    "error shader failed on object \"{}\": {}",
                    object.name, fault
                );
            }
        }

        if !flags.cull_test {
            backend.set_flag(StateFlag::CullFace, true);
        }
        if !flags.depth_test {
            backend.set_flag(StateFlag::DepthTest, true);
        }
        if !flags.alpha_blend {
            backend.set_flag(StateFlag::Blend, true);
        }
        if flags.offset {
            backend.set_flag(StateFlag::PolygonOffset, false);
        }
    }

    /// Run the post-effect chain: every effect but the last ping-pongs
    /// between the two auxiliary buffers, the last writes the real target.
    /// The source of effect `i` is the buffer pass `i` rendered into, so the
    /// main pass output at index 0.
    fn render_post_effects(
        &mut self,
        camera: &crate::data_structures::scene::Camera,
        backend: &mut dyn RenderBackend,
        effects: &mut PostEffectRegistry,
        target: TargetSpec,
    ) {
        backend.set_flag(StateFlag::DepthTest, false);
        backend.set_flag(StateFlag::CullFace, false);

        let count = camera.post_effects.len();
        for (index, effect) in camera.post_effects.iter().enumerate() {
            let source = self.ping_pong[index % 2];
            let destination = if index + 1 == count {
                target
            } else {
                self.ping_pong[(index + 1) % 2]
            };
            backend.bind_target(destination.id);
            backend.set_viewport(destination.width, destination.height);
            backend.clear(camera.background_color);

            match effects.resolve(effect.kind) {
                Some(shader) => {
                    if let Err(fault) = shader.render(effect, source.id) {
                        error!("post effect {:?} failed: {}", effect.kind, fault);
                    }
                }
                None => warn!("no shader registered for post effect {:?}", effect.kind),
            }
        }
    }
}
