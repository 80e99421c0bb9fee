//! Scene graph arena, renderable components and the binocular camera rig.
//!
//! Objects live in a flat arena addressed by [`ObjectId`]; parent/child links
//! are index fields, so the graph is a tree by construction and teardown is
//! dropping the arena. Mutable access to an object bumps the scene revision,
//! which the draw-list compiler uses to decide whether its cached lists are
//! still valid.

use cgmath::{Deg, Matrix4, SquareMatrix, perspective};

use super::geometry::Geometry;
use super::material::{Material, PostEffectData};
use super::transform::{Transform, compose};

/// Render-mask bit for the left eye.
pub const RENDER_MASK_LEFT: u32 = 0x1;
/// Render-mask bit for the right eye.
pub const RENDER_MASK_RIGHT: u32 = 0x2;

/// Default interpupillary separation in meters.
pub const DEFAULT_CAMERA_SEPARATION_DISTANCE: f32 = 0.062;

/// Stable index of a scene object in its scene's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId(pub(crate) usize);

/// Per-renderable GPU state toggles.
///
/// The pipeline applies fixed pass state first, then relaxes it per entry
/// according to these flags and restores it afterwards.
#[derive(Clone, Copy, Debug)]
pub struct RenderFlags {
    /// Eye visibility bitfield, intersected with the camera's mask.
    pub render_mask: u32,
    pub cull_test: bool,
    pub depth_test: bool,
    pub alpha_blend: bool,
    pub offset: bool,
    pub offset_factor: f32,
    pub offset_units: f32,
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self {
            render_mask: RENDER_MASK_LEFT | RENDER_MASK_RIGHT,
            cull_test: true,
            depth_test: true,
            alpha_blend: true,
            offset: false,
            offset_factor: 0.0,
            offset_units: 0.0,
        }
    }
}

/// The draw unit: one geometry, optionally a material, plus state flags.
///
/// Objects whose render data has no material are skipped by the draw-list
/// compiler rather than treated as an error.
#[derive(Clone, Debug)]
pub struct RenderData {
    pub geometry: Geometry,
    pub material: Option<Material>,
    pub flags: RenderFlags,
}

impl RenderData {
    pub fn new(geometry: Geometry, material: Material) -> Self {
        Self {
            geometry,
            material: Some(material),
            flags: RenderFlags::default(),
        }
    }
}

/// Perspective camera for one eye.
#[derive(Clone, Debug)]
pub struct Camera {
    /// Which eye this camera renders, [`RENDER_MASK_LEFT`] or
    /// [`RENDER_MASK_RIGHT`].
    pub render_mask: u32,
    /// Clear color, RGBA in [0, 1].
    pub background_color: [f32; 4],
    pub fovy_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Applied in order after the main pass.
    pub post_effects: Vec<PostEffectData>,
}

impl Camera {
    pub fn new(render_mask: u32) -> Self {
        Self {
            render_mask,
            background_color: [0.0, 0.0, 0.0, 1.0],
            fovy_degrees: 90.0,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
            post_effects: Vec::new(),
        }
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        perspective(Deg(self.fovy_degrees), self.aspect, self.near, self.far)
    }
}

/// The binocular rig: one parent object with a left and right camera child.
#[derive(Clone, Copy, Debug)]
pub struct CameraRig {
    pub left: ObjectId,
    pub right: ObjectId,
    pub separation: f32,
}

/// One node of the scene graph. All components are optional; the importer
/// produces mesh objects with transform + render data and rig objects with
/// transform + camera/rig components.
#[derive(Debug, Default)]
pub struct SceneObject {
    pub name: String,
    pub transform: Option<Transform>,
    pub render_data: Option<RenderData>,
    pub camera: Option<Camera>,
    pub camera_rig: Option<CameraRig>,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) children: Vec<ObjectId>,
}

impl SceneObject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }
}

/// Arena-backed scene: flat object list, root set, main camera rig and a
/// monotonic revision counter.
#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
    roots: Vec<ObjectId>,
    main_camera_rig: Option<ObjectId>,
    revision: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level object and return its id.
    pub fn add_object(&mut self, object: SceneObject) -> ObjectId {
        let id = self.insert(object);
        self.roots.push(id);
        id
    }

    /// Add an object as a child of `parent` and return its id.
    pub fn add_child(&mut self, parent: ObjectId, object: SceneObject) -> ObjectId {
        let id = self.insert(object);
        self.objects[id.0].parent = Some(parent);
        self.objects[parent.0].children.push(id);
        id
    }

    fn insert(&mut self, object: SceneObject) -> ObjectId {
        let id = ObjectId(self.objects.len());
        self.objects.push(object);
        self.revision += 1;
        id
    }

    pub fn object(&self, id: ObjectId) -> &SceneObject {
        &self.objects[id.0]
    }

    /// Mutable access. Counts as a scene change and invalidates cached draw
    /// lists.
    pub fn object_mut(&mut self, id: ObjectId) -> &mut SceneObject {
        self.revision += 1;
        &mut self.objects[id.0]
    }

    /// All objects in insertion order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(index, object)| (ObjectId(index), object))
    }

    pub fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn set_main_camera_rig(&mut self, rig_object: ObjectId) {
        self.main_camera_rig = Some(rig_object);
        self.revision += 1;
    }

    pub fn main_camera_rig(&self) -> Option<ObjectId> {
        self.main_camera_rig
    }

    /// Monotonic change counter. Any structural or component mutation moves
    /// it forward; the draw-list compiler compares against it.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// World matrix of an object, composed up the parent chain.
    pub fn world_matrix(&self, id: ObjectId) -> Matrix4<f32> {
        let mut world = match &self.objects[id.0].transform {
            Some(transform) => transform.model_matrix(),
            None => Matrix4::identity(),
        };
        let mut cursor = self.objects[id.0].parent;
        while let Some(parent_id) = cursor {
            let parent = &self.objects[parent_id.0];
            if let Some(transform) = &parent.transform {
                world = compose(&world, &transform.model_matrix());
            }
            cursor = parent.parent;
        }
        world
    }

    /// View matrix of a camera object: the inverse of its world matrix.
    /// Falls back to identity for a non-invertible (degenerate-scale) world.
    pub fn view_matrix(&self, camera_object: ObjectId) -> Matrix4<f32> {
        self.world_matrix(camera_object)
            .invert()
            .unwrap_or_else(Matrix4::identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::Vector3;

    fn translated(name: &str, x: f32) -> SceneObject {
        let mut object = SceneObject::named(name);
        let mut transform = Transform::new();
        transform.position = Vector3::new(x, 0.0, 0.0);
        object.transform = Some(transform);
        object
    }

    #[test]
    fn world_matrix_walks_parent_chain() {
        let mut scene = Scene::new();
        let root = scene.add_object(translated("root", 1.0));
        let child = scene.add_child(root, translated("child", 2.0));

        let world = scene.world_matrix(child);
        assert_relative_eq!(
            world,
            Matrix4::from_translation(Vector3::new(3.0, 0.0, 0.0)),
            epsilon = 1e-6
        );
    }

    #[test]
    fn view_matrix_inverts_world() {
        let mut scene = Scene::new();
        let eye = scene.add_object(translated("eye", 5.0));
        let view = scene.view_matrix(eye);
        assert_relative_eq!(
            view * scene.world_matrix(eye),
            Matrix4::identity(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn mutation_bumps_revision() {
        let mut scene = Scene::new();
        let id = scene.add_object(SceneObject::named("a"));
        let after_add = scene.revision();
        scene.object_mut(id).name = "b".into();
        assert!(scene.revision() > after_add);
    }

    #[test]
    fn objects_iterate_in_insertion_order() {
        let mut scene = Scene::new();
        scene.add_object(SceneObject::named("first"));
        scene.add_object(SceneObject::named("second"));
        let names: Vec<_> = scene
            .objects()
            .map(|(_, object)| object.name.clone())
            .collect();
        assert_eq!(names, ["first", "second"]);
    }
}
