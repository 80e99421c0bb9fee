//! Loading scenes and textures from external files.

pub mod texture;

use std::path::Path;

use crate::data_structures::material::Bitmap;
use crate::data_structures::scene::Scene;
use crate::importer::assemble_scene;
use crate::importer::gltf::GltfSource;
use crate::resources::texture::{FileTextureLoader, TextureLoader};

/// Load a glTF file into a fully assembled scene.
///
/// Textures referenced by the document resolve relative to the file's
/// directory; any that fail to decode fall back to `default_texture`.
pub fn load_scene_gltf(file_name: &str, default_texture: &Bitmap) -> anyhow::Result<Scene> {
    let source = GltfSource::open(file_name)?;
    let base_dir = Path::new(file_name)
        .parent()
        .unwrap_or_else(|| Path::new("."));
    let loader = FileTextureLoader::new(base_dir);
    let scene = assemble_scene(&source, Some(&loader as &dyn TextureLoader), default_texture)?;
    Ok(scene)
}
