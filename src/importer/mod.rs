//! Asset import: geometry extraction and scene assembly.
//!
//! The import side consumes a [`SceneGraphSource`], an opaque node tree with
//! mesh and material arrays, and assembles a flat [`Scene`] with baked world
//! transforms plus the binocular camera rig. One concrete source is shipped
//! in [`gltf`]; tests use in-memory sources.
//!
//! Transform accumulation quirk: every child of a node receives the node's
//! *incoming* accumulated transform, not the node's own world transform, so
//! grandchildren do not inherit intermediate node transforms. This matches
//! the behavior of the engine this importer is compatible with and is kept
//! deliberately.

pub mod gltf;

use cgmath::Matrix4;
use log::{debug, info, warn};
use thiserror::Error;

use crate::data_structures::geometry::Geometry;
use crate::data_structures::material::{Bitmap, Material, ShaderKind, Texture};
use crate::data_structures::scene::{
    Camera, CameraRig, DEFAULT_CAMERA_SEPARATION_DISTANCE, RENDER_MASK_LEFT, RENDER_MASK_RIGHT,
    RenderData, Scene, SceneObject,
};
use crate::data_structures::transform::{Transform, compose, identity};
use crate::resources::texture::TextureLoader;

/// Fatal import failures. Per-object problems (dropped faces, missing
/// textures) are handled inline and never surface here.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read asset {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse glTF document")]
    Parse(#[from] ::gltf::Error),
    #[error("buffer \"{name}\" is {actual} bytes, expected {expected}")]
    BufferSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("node references missing mesh index {index}")]
    MissingMesh { index: usize },
}

/// Raw mesh data as the import source hands it over, before any filtering.
#[derive(Clone, Debug, Default)]
pub struct SourceMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// First texture-coordinate channel only.
    pub tex_coords: Option<Vec<[f32; 2]>>,
    /// Faces with arbitrary index counts; only triangles survive extraction.
    pub faces: Vec<Vec<u32>>,
    pub material_index: usize,
}

/// One node of the source hierarchy.
#[derive(Clone, Debug)]
pub struct SourceNode {
    pub name: String,
    pub local_transform: Matrix4<f32>,
    pub mesh_indices: Vec<usize>,
    pub children: Vec<SourceNode>,
}

/// Opaque import source: a node tree plus mesh/material arrays.
///
/// Animations, lights and cameras are exposed only as counts; they are
/// traversed for logging but not converted.
pub trait SceneGraphSource {
    fn root(&self) -> &SourceNode;
    fn mesh(&self, index: usize) -> Option<&SourceMesh>;
    /// Diffuse texture filename of the material's slot 0, or `None` when the
    /// material reports zero diffuse textures.
    fn diffuse_texture_name(&self, material_index: usize) -> Option<&str>;
    fn animation_count(&self) -> usize {
        0
    }
    fn light_count(&self) -> usize {
        0
    }
    fn camera_count(&self) -> usize {
        0
    }
}

/// Build one [`Geometry`] from a source mesh, enforcing the invariants the
/// rest of the crate relies on.
///
/// Positions copy verbatim. Normals and the first UV channel copy only when
/// present *and* matching the vertex count; mismatched parallel arrays are
/// dropped with a warning. The repeat flag is set while copying UVs if any
/// component exceeds 1.0. Only 3-index faces whose indices are all in range
/// become triangles; other faces are dropped with a debug log, not an error.
pub fn extract_geometry(mesh: &SourceMesh) -> Geometry {
    let vertex_count = mesh.positions.len();

    let normals = mesh.normals.as_ref().and_then(|normals| {
        if normals.len() == vertex_count {
            Some(normals.clone())
        } else {
            warn!(
                "mesh \"{}\": {} normal(s) for {} vertices, dropping normals",
                mesh.name,
                normals.len(),
                vertex_count
            );
            None
        }
    });

    let mut texture_repeat = false;
    let tex_coords = mesh.tex_coords.as_ref().and_then(|coords| {
        if coords.len() != vertex_count {
            warn!(
                "mesh \"{}\": {} texture coordinate(s) for {} vertices, dropping UVs",
                mesh.name,
                coords.len(),
                vertex_count
            );
            return None;
        }
        for uv in coords {
            if uv[0] > 1.0 || uv[1] > 1.0 {
                texture_repeat = true;
                break;
            }
        }
        Some(coords.clone())
    });

    let mut triangles = Vec::with_capacity(mesh.faces.len() * 3);
    let mut dropped = 0usize;
    for face in &mesh.faces {
        if face.len() == 3 && face.iter().all(|&index| (index as usize) < vertex_count) {
            triangles.extend_from_slice(face);
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        debug!(
            "mesh \"{}\": dropped {} non-triangular or out-of-range face(s)",
            mesh.name, dropped
        );
    }

    Geometry {
        vertices: mesh.positions.clone(),
        normals,
        tex_coords,
        triangles,
        texture_repeat,
    }
}

/// Walk the source tree and build the scene: flat mesh objects with baked
/// world transforms, then the stereo camera rig, registered as the scene's
/// main rig.
pub fn assemble_scene(
    source: &dyn SceneGraphSource,
    texture_loader: Option<&dyn TextureLoader>,
    default_texture: &Bitmap,
) -> Result<Scene, ImportError> {
    let mut scene = Scene::new();
    attach_camera_rig(&mut scene, DEFAULT_CAMERA_SEPARATION_DISTANCE);

    recurse_node(
        &mut scene,
        source,
        source.root(),
        &identity(),
        texture_loader,
        default_texture,
    )?;

    info!(
        "assembled scene: {} object(s); source carries {} animation(s), {} light(s), {} camera(s) (not converted)",
        scene.len(),
        source.animation_count(),
        source.light_count(),
        source.camera_count()
    );
    Ok(scene)
}

fn recurse_node(
    scene: &mut Scene,
    source: &dyn SceneGraphSource,
    node: &SourceNode,
    accumulated: &Matrix4<f32>,
    texture_loader: Option<&dyn TextureLoader>,
    default_texture: &Bitmap,
) -> Result<(), ImportError> {
    for &mesh_index in &node.mesh_indices {
        let mesh = source
            .mesh(mesh_index)
            .ok_or(ImportError::MissingMesh { index: mesh_index })?;
        let geometry = extract_geometry(mesh);

        let mut material = Material::new(ShaderKind::Unlit);
        let texture = resolve_diffuse_texture(
            source,
            mesh.material_index,
            geometry.texture_repeat,
            texture_loader,
            default_texture,
            &node.name,
        );
        material.set_texture(Material::MAIN_TEXTURE, texture);

        let world = compose(&node.local_transform, accumulated);
        let mut object = SceneObject::named(node.name.clone());
        object.transform = Some(Transform::from_matrix(&world));
        object.render_data = Some(RenderData::new(geometry, material));
        // Flat scene: world transforms are baked, so mesh objects attach
        // directly to the scene rather than under their source parent.
        scene.add_object(object);
    }

    // Every child receives this node's incoming accumulated transform; see
    // the module docs.
    for child in &node.children {
        recurse_node(
            scene,
            source,
            child,
            accumulated,
            texture_loader,
            default_texture,
        )?;
    }
    Ok(())
}

fn resolve_diffuse_texture(
    source: &dyn SceneGraphSource,
    material_index: usize,
    repeat: bool,
    texture_loader: Option<&dyn TextureLoader>,
    default_texture: &Bitmap,
    node_name: &str,
) -> Texture {
    // The default texture inherits the mesh's repeat flag, same as a loaded
    // one.
    let fallback = || Texture {
        bitmap: default_texture.clone(),
        repeat,
    };

    let Some(loader) = texture_loader else {
        return fallback();
    };
    let Some(file_name) = source.diffuse_texture_name(material_index) else {
        return fallback();
    };
    match loader.load(file_name) {
        Some(bitmap) => Texture { bitmap, repeat },
        None => {
            warn!(
                "node \"{}\": texture \"{}\" failed to load, using default",
                node_name, file_name
            );
            fallback()
        }
    }
}

/// Attach the binocular rig: a rig object at the scene root with left and
/// right perspective cameras offset half the separation along local X.
pub fn attach_camera_rig(scene: &mut Scene, separation: f32) -> CameraRig {
    let mut rig_object = SceneObject::named("camera rig");
    rig_object.transform = Some(Transform::new());
    let rig_id = scene.add_object(rig_object);

    let mut left = SceneObject::named("left camera");
    let mut left_transform = Transform::new();
    left_transform.position.x = -separation / 2.0;
    left.transform = Some(left_transform);
    left.camera = Some(Camera::new(RENDER_MASK_LEFT));
    let left_id = scene.add_child(rig_id, left);

    let mut right = SceneObject::named("right camera");
    let mut right_transform = Transform::new();
    right_transform.position.x = separation / 2.0;
    right.transform = Some(right_transform);
    right.camera = Some(Camera::new(RENDER_MASK_RIGHT));
    let right_id = scene.add_child(rig_id, right);

    let rig = CameraRig {
        left: left_id,
        right: right_id,
        separation,
    };
    scene.object_mut(rig_id).camera_rig = Some(rig);
    scene.set_main_camera_rig(rig_id);
    rig
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::Vector3;

    fn quad_mesh() -> SourceMesh {
        SourceMesh {
            name: "quad".into(),
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            normals: Some(vec![[0.0, 0.0, 1.0]; 4]),
            tex_coords: Some(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]),
            faces: vec![vec![0, 1, 2], vec![0, 2, 3], vec![0, 1, 2, 3]],
            material_index: 0,
        }
    }

    #[test]
    fn extraction_keeps_only_triangles() {
        let geometry = extract_geometry(&quad_mesh());
        assert_eq!(geometry.triangle_count(), 2);
        assert_eq!(geometry.triangles.len() % 3, 0);
        let max_index = *geometry.triangles.iter().max().unwrap();
        assert!((max_index as usize) < geometry.vertices.len());
    }

    #[test]
    fn parallel_arrays_match_vertex_count() {
        let geometry = extract_geometry(&quad_mesh());
        assert_eq!(geometry.normals.as_ref().unwrap().len(), geometry.vertices.len());
        assert_eq!(
            geometry.tex_coords.as_ref().unwrap().len(),
            geometry.vertices.len()
        );
    }

    #[test]
    fn mismatched_parallel_arrays_are_dropped() {
        let mut mesh = quad_mesh();
        mesh.normals = Some(vec![[0.0, 0.0, 1.0]; 2]);
        mesh.tex_coords = Some(vec![[2.0, 0.0]]);

        let geometry = extract_geometry(&mesh);
        assert!(geometry.normals.is_none());
        assert!(geometry.tex_coords.is_none());
        // A dropped UV channel cannot set the repeat flag.
        assert!(!geometry.texture_repeat);
    }

    #[test]
    fn faces_with_out_of_range_indices_are_dropped() {
        let mut mesh = quad_mesh();
        mesh.faces = vec![vec![0, 1, 2], vec![0, 1, 9]];

        let geometry = extract_geometry(&mesh);
        assert_eq!(geometry.triangle_count(), 1);
        assert!(
            geometry
                .triangles
                .iter()
                .all(|&index| (index as usize) < geometry.vertices.len())
        );
    }

    #[test]
    fn repeat_flag_tracks_uv_range() {
        let mut mesh = quad_mesh();
        mesh.tex_coords = Some(vec![[0.5, 0.5], [1.2, 0.3], [0.0, 0.0], [0.0, 0.0]]);
        assert!(extract_geometry(&mesh).texture_repeat);

        mesh.tex_coords = Some(vec![[0.5, 0.5], [1.0, 0.9], [0.0, 0.0], [0.0, 0.0]]);
        assert!(!extract_geometry(&mesh).texture_repeat);
    }

    #[test]
    fn camera_rig_offsets_eyes_along_x() {
        let mut scene = Scene::new();
        let rig = attach_camera_rig(&mut scene, 0.064);

        let left = scene.world_matrix(rig.left);
        let right = scene.world_matrix(rig.right);
        assert_relative_eq!(left.w.truncate(), Vector3::new(-0.032, 0.0, 0.0));
        assert_relative_eq!(right.w.truncate(), Vector3::new(0.032, 0.0, 0.0));

        let left_camera = scene.object(rig.left).camera.as_ref().unwrap();
        let right_camera = scene.object(rig.right).camera.as_ref().unwrap();
        assert_eq!(left_camera.render_mask, RENDER_MASK_LEFT);
        assert_eq!(right_camera.render_mask, RENDER_MASK_RIGHT);
        assert_eq!(scene.main_camera_rig(), Some(scene.roots()[0]));
    }

    #[test]
    fn siblings_receive_the_unmodified_accumulated_transform() {
        struct TwoLevels {
            root: SourceNode,
            mesh: SourceMesh,
        }
        impl SceneGraphSource for TwoLevels {
            fn root(&self) -> &SourceNode {
                &self.root
            }
            fn mesh(&self, index: usize) -> Option<&SourceMesh> {
                (index == 0).then_some(&self.mesh)
            }
            fn diffuse_texture_name(&self, _material_index: usize) -> Option<&str> {
                None
            }
        }

        let mut mesh = quad_mesh();
        mesh.faces = vec![vec![0, 1, 2]];
        let grandchild = SourceNode {
            name: "grandchild".into(),
            local_transform: identity(),
            mesh_indices: vec![0],
            children: vec![],
        };
        let child = SourceNode {
            name: "child".into(),
            local_transform: Matrix4::from_translation(Vector3::new(7.0, 0.0, 0.0)),
            mesh_indices: vec![],
            children: vec![grandchild],
        };
        let root = SourceNode {
            name: "root".into(),
            local_transform: identity(),
            mesh_indices: vec![],
            children: vec![child],
        };

        let source = TwoLevels { root, mesh };
        let default = Bitmap::solid(1, 1, [255; 4]);
        let scene = assemble_scene(&source, None, &default).unwrap();

        // The grandchild got the root's accumulated transform, not the
        // child's translation.
        let (_, object) = scene
            .objects()
            .find(|(_, object)| object.name == "grandchild")
            .unwrap();
        let position = object.transform.as_ref().unwrap().position;
        assert_relative_eq!(position, Vector3::new(0.0, 0.0, 0.0));
    }
}
