//! Materials, shader tags and decoded texture bitmaps.
//!
//! A [`Material`] pairs a [`ShaderKind`] tag with a mapping from named slots
//! (by convention `"main_texture"`) to [`Texture`] handles. Shader variants are
//! a closed enum of the built-ins plus one `Custom(id)` case resolved through
//! the shader registry at draw time.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shader variant tag carried by a material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Unlit,
    UnlitHorizontalStereo,
    UnlitVerticalStereo,
    /// External/video texture sampling.
    Oes,
    OesHorizontalStereo,
    OesVerticalStereo,
    /// Resolved through the custom shader registry.
    Custom(u32),
}

impl ShaderKind {
    /// Total order used by the draw-list sort to group state changes.
    pub(crate) fn order_rank(&self) -> (u8, u32) {
        match self {
            ShaderKind::Unlit => (0, 0),
            ShaderKind::UnlitHorizontalStereo => (1, 0),
            ShaderKind::UnlitVerticalStereo => (2, 0),
            ShaderKind::Oes => (3, 0),
            ShaderKind::OesHorizontalStereo => (4, 0),
            ShaderKind::OesVerticalStereo => (5, 0),
            ShaderKind::Custom(id) => (6, *id),
        }
    }

    /// Whether the variant wants the right-eye flag at dispatch.
    pub fn is_stereo(&self) -> bool {
        matches!(
            self,
            ShaderKind::UnlitHorizontalStereo
                | ShaderKind::UnlitVerticalStereo
                | ShaderKind::OesHorizontalStereo
                | ShaderKind::OesVerticalStereo
        )
    }
}

static NEXT_BITMAP_ID: AtomicU64 = AtomicU64::new(1);

/// A decoded RGBA8 image, cheap to clone.
///
/// The pixel payload is shared; the `id` is unique per decode and used by GPU
/// shader implementations as a cache key.
#[derive(Clone, Debug)]
pub struct Bitmap {
    id: u64,
    pub width: u32,
    pub height: u32,
    pixels: Arc<Vec<u8>>,
}

impl Bitmap {
    /// Wrap raw RGBA8 pixels. `pixels.len()` must be `width * height * 4`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        Self {
            id: NEXT_BITMAP_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            pixels: Arc::new(pixels),
        }
    }

    pub fn from_image(image: image::DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, rgba.into_raw())
    }

    /// Solid single-colour bitmap, handy as a caller-supplied default texture.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .cycle()
            .take((width * height * 4) as usize)
            .copied()
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// A bitmap bound to a material slot, together with the repeat flag derived
/// from the geometry's texture coordinates.
#[derive(Clone, Debug)]
pub struct Texture {
    pub bitmap: Bitmap,
    pub repeat: bool,
}

/// Shader tag plus named texture slots.
#[derive(Clone, Debug)]
pub struct Material {
    pub shader: ShaderKind,
    textures: HashMap<String, Texture>,
}

impl Material {
    /// Conventional slot name for the diffuse texture.
    pub const MAIN_TEXTURE: &'static str = "main_texture";

    pub fn new(shader: ShaderKind) -> Self {
        Self {
            shader,
            textures: HashMap::new(),
        }
    }

    pub fn set_texture(&mut self, slot: impl Into<String>, texture: Texture) {
        self.textures.insert(slot.into(), texture);
    }

    pub fn texture(&self, slot: &str) -> Option<&Texture> {
        self.textures.get(slot)
    }
}

/// Post-effect shader tag, mirroring the material side: two built-ins plus a
/// registry-resolved custom case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PostEffectKind {
    ColorBlend,
    HorizontalFlip,
    Custom(u32),
}

/// One entry of a camera's post-effect chain.
#[derive(Clone, Debug)]
pub struct PostEffectData {
    pub kind: PostEffectKind,
    floats: HashMap<String, f32>,
}

impl PostEffectData {
    pub fn new(kind: PostEffectKind) -> Self {
        Self {
            kind,
            floats: HashMap::new(),
        }
    }

    pub fn set_float(&mut self, name: impl Into<String>, value: f32) {
        self.floats.insert(name.into(), value);
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        self.floats.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_ids_are_unique() {
        let a = Bitmap::solid(1, 1, [255; 4]);
        let b = Bitmap::solid(1, 1, [255; 4]);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn custom_shaders_rank_after_builtins() {
        assert!(ShaderKind::Unlit.order_rank() < ShaderKind::Custom(0).order_rank());
        assert!(ShaderKind::Custom(1).order_rank() < ShaderKind::Custom(2).order_rank());
    }

    #[test]
    fn material_slots_resolve_by_name() {
        let mut material = Material::new(ShaderKind::Unlit);
        material.set_texture(
            Material::MAIN_TEXTURE,
            Texture {
                bitmap: Bitmap::solid(2, 2, [0, 0, 0, 255]),
                repeat: true,
            },
        );
        assert!(material.texture(Material::MAIN_TEXTURE).unwrap().repeat);
        assert!(material.texture("other").is_none());
    }
}
