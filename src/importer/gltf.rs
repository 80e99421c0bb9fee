//! glTF-backed [`SceneGraphSource`].
//!
//! Parses a document up front into plain [`SourceMesh`]/[`SourceNode`] data
//! so the assembler never touches the gltf crate. Each primitive becomes one
//! source mesh; a node referencing a multi-primitive mesh picks up one mesh
//! index per primitive.

use std::fs;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};

use cgmath::Matrix4;
use log::debug;

use super::{ImportError, SceneGraphSource, SourceMesh, SourceNode};

pub struct GltfSource {
    root: SourceNode,
    meshes: Vec<SourceMesh>,
    diffuse_names: Vec<Option<String>>,
    animations: usize,
    cameras: usize,
}

impl GltfSource {
    /// Open and fully parse a glTF file. All buffers are loaded and verified
    /// here; any failure aborts the whole import.
    pub fn open(file_name: &str) -> Result<Self, ImportError> {
        let path = Path::new(file_name);
        let bytes = read_file(path)?;
        let reader = BufReader::new(Cursor::new(bytes));
        let gltf = gltf::Gltf::from_reader(reader)?;

        let base_dir = path.parent().map(PathBuf::from).unwrap_or_default();
        let mut buffer_data = Vec::new();
        for buffer in gltf.buffers() {
            let name = buffer
                .name()
                .map(str::to_owned)
                .unwrap_or_else(|| format!("buffer {}", buffer.index()));
            let raw = match buffer.source() {
                gltf::buffer::Source::Bin => gltf.blob.clone().unwrap_or_default(),
                gltf::buffer::Source::Uri(uri) => read_file(&base_dir.join(uri))?,
            };
            buffer_data.push(verify_buffer(&name, buffer.length(), raw)?);
        }

        // Flatten primitives: per glTF mesh, the list of source-mesh indices
        // its nodes should reference.
        let mut meshes = Vec::new();
        let mut primitive_indices: Vec<Vec<usize>> = Vec::new();
        for mesh in gltf.meshes() {
            let mut indices = Vec::new();
            for primitive in mesh.primitives() {
                indices.push(meshes.len());
                meshes.push(extract_primitive(&mesh, &primitive, &buffer_data));
            }
            primitive_indices.push(indices);
        }

        let diffuse_names = gltf.materials().map(diffuse_name).collect();

        // An empty document imports as an empty scene rather than failing.
        let children = gltf
            .default_scene()
            .or_else(|| gltf.scenes().next())
            .map(|scene| {
                scene
                    .nodes()
                    .map(|node| convert_node(&node, &primitive_indices))
                    .collect()
            })
            .unwrap_or_default();
        let root = SourceNode {
            name: "root".into(),
            local_transform: crate::data_structures::transform::identity(),
            mesh_indices: Vec::new(),
            children,
        };

        Ok(Self {
            root,
            meshes,
            diffuse_names,
            animations: gltf.animations().count(),
            cameras: gltf.cameras().count(),
        })
    }
}

impl SceneGraphSource for GltfSource {
    fn root(&self) -> &SourceNode {
        &self.root
    }

    fn mesh(&self, index: usize) -> Option<&SourceMesh> {
        self.meshes.get(index)
    }

    fn diffuse_texture_name(&self, material_index: usize) -> Option<&str> {
        self.diffuse_names
            .get(material_index)
            .and_then(|name| name.as_deref())
    }

    fn animation_count(&self) -> usize {
        self.animations
    }

    fn camera_count(&self) -> usize {
        self.cameras
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ImportError> {
    fs::read(path).map_err(|source| ImportError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Check a loaded buffer against its declared length. Short buffers fail the
/// import; GLB blobs may carry up to 3 padding bytes, which are stripped.
fn verify_buffer(name: &str, expected: usize, mut data: Vec<u8>) -> Result<Vec<u8>, ImportError> {
    if data.len() < expected {
        return Err(ImportError::BufferSizeMismatch {
            name: name.to_owned(),
            expected,
            actual: data.len(),
        });
    }
    data.truncate(expected);
    Ok(data)
}

fn extract_primitive(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    buffer_data: &[Vec<u8>],
) -> SourceMesh {
    let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .map(|iter| iter.collect())
        .unwrap_or_default();
    let normals = reader.read_normals().map(|iter| iter.collect());
    let tex_coords = reader
        .read_tex_coords(0)
        .map(|coords| coords.into_f32().collect());

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    let faces = indices.chunks(3).map(|face| face.to_vec()).collect();

    SourceMesh {
        name: mesh.name().unwrap_or("unnamed mesh").to_owned(),
        positions,
        normals,
        tex_coords,
        faces,
        material_index: primitive.material().index().unwrap_or(usize::MAX),
    }
}

/// Filename of the material's base-color texture. Embedded buffer-view
/// images have no filename for the loader and fall back to the default
/// texture.
fn diffuse_name(material: gltf::Material) -> Option<String> {
    let texture = material.pbr_metallic_roughness().base_color_texture()?;
    match texture.texture().source().source() {
        gltf::image::Source::Uri { uri, .. } => Some(uri.to_owned()),
        gltf::image::Source::View { .. } => {
            debug!(
                "material {:?} uses an embedded image, falling back to the default texture",
                material.name()
            );
            None
        }
    }
}

fn convert_node(node: &gltf::Node, primitive_indices: &[Vec<usize>]) -> SourceNode {
    let mesh_indices = node
        .mesh()
        .and_then(|mesh| primitive_indices.get(mesh.index()).cloned())
        .unwrap_or_default();
    SourceNode {
        name: node
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("node {}", node.index())),
        local_transform: Matrix4::from(node.transform().matrix()),
        mesh_indices,
        children: node
            .children()
            .map(|child| convert_node(&child, primitive_indices))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_buffer_fails_the_import() {
        let result = verify_buffer("positions", 12, vec![0u8; 8]);
        assert!(matches!(
            result,
            Err(ImportError::BufferSizeMismatch {
                expected: 12,
                actual: 8,
                ..
            })
        ));
    }

    #[test]
    fn padded_buffer_is_trimmed_to_declared_length() {
        let data = verify_buffer("blob", 12, vec![0u8; 15]).unwrap();
        assert_eq!(data.len(), 12);
    }

    #[test]
    fn missing_file_surfaces_as_io_error() {
        let result = GltfSource::open("/nonexistent/model.gltf");
        assert!(matches!(result, Err(ImportError::Io { .. })));
    }
}
