//! Texture loading collaborator.
//!
//! The importer never decodes images itself; it asks a [`TextureLoader`] and
//! falls back to the caller-supplied default bitmap when the loader is absent
//! or fails. [`FileTextureLoader`] is the disk-backed implementation.

use std::path::PathBuf;

use log::warn;

use crate::data_structures::material::Bitmap;

/// Resolves a texture filename to a decoded bitmap, or `None` on failure.
/// Failure is a per-object event; the importer substitutes the default
/// texture and continues.
pub trait TextureLoader {
    fn load(&self, file_name: &str) -> Option<Bitmap>;
}

/// Loads and decodes image files relative to a base directory.
pub struct FileTextureLoader {
    base_dir: PathBuf,
}

impl FileTextureLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl TextureLoader for FileTextureLoader {
    fn load(&self, file_name: &str) -> Option<Bitmap> {
        let path = self.base_dir.join(file_name);
        match image::open(&path) {
            Ok(decoded) => Some(Bitmap::from_image(decoded)),
            Err(error) => {
                warn!("could not decode texture {}: {}", path.display(), error);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_none() {
        let loader = FileTextureLoader::new("/nonexistent");
        assert!(loader.load("missing.png").is_none());
    }
}
