//! stereoscene
//!
//! Bridges 3D-asset import to a VR scene graph and a stereo forward renderer.
//! Assets are imported once into a flat scene with baked world transforms and
//! a binocular camera rig; per frame, a draw-list compiler filters, culls and
//! sorts the renderables, and the stereo pipeline executes the list per eye
//! with frustum culling, GPU state sequencing and ping-pong post-effect
//! chains.
//!
//! High-level modules
//! - `data_structures`: geometry, materials, transforms and the scene arena
//! - `importer`: geometry extraction and scene assembly from an import source
//! - `resources`: file-backed loading (glTF scenes, image textures)
//! - `culling`: frustum plane extraction and AABB tests
//! - `render`: draw-list compilation (filter, cull, stable sort)
//! - `pipelines`: the stereo render pipeline and its shader collaborators
//! - `context`: headless wgpu device and the backend implementation
//!

pub mod context;
pub mod culling;
pub mod data_structures;
pub mod importer;
pub mod pipelines;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;

pub use crate::data_structures::material::{
    Bitmap, Material, PostEffectData, PostEffectKind, ShaderKind, Texture,
};
pub use crate::data_structures::scene::{
    Camera, CameraRig, ObjectId, RENDER_MASK_LEFT, RENDER_MASK_RIGHT, RenderData, Scene,
    SceneObject,
};
pub use crate::pipelines::stereo::{RenderOptions, StereoRenderer};
pub use crate::render::DrawListCompiler;
pub use crate::resources::load_scene_gltf;
