//! Draw-list compilation: collect, filter, cull and sort renderables.
//!
//! The compiler walks the scene's flat object list, keeps entries carrying
//! both render data and a material, optionally rejects entries whose bounding
//! box falls outside the camera frustum, and stable-sorts the remainder so
//! opaque geometry draws before blended geometry and equal shaders stay
//! adjacent. Lists are cached per camera render mask and recomputed only when
//! the scene revision has moved.

use std::collections::HashMap;

use cgmath::Matrix4;
use log::debug;

use crate::culling::Frustum;
use crate::data_structures::scene::{ObjectId, Scene};

/// Sort key of one draw-list entry: opaque before transparent, then grouped
/// by shader variant. Stability of the sort does the rest.
type OrderKey = (bool, (u8, u32));

struct CachedList {
    revision: u64,
    culled: bool,
    entries: Vec<ObjectId>,
}

/// Compiles and caches per-camera draw lists.
///
/// One compiler instance serves both eye passes; lists are keyed by the
/// camera's render mask so the left and right eye each keep their own cache.
#[derive(Default)]
pub struct DrawListCompiler {
    lists: HashMap<u32, CachedList>,
}

impl DrawListCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile the draw list for one camera pass.
    ///
    /// `view_projection` enables frustum culling: each candidate's
    /// model-space bounding box is tested against the frustum of
    /// `view_projection * model`. Pass `None` to skip culling and only
    /// filter and sort.
    ///
    /// The returned slice is borrowed from the compiler's cache; it stays
    /// valid until the next call. A cached list is reused when the scene
    /// revision has not moved since it was built.
    pub fn compile(
        &mut self,
        scene: &Scene,
        camera_mask: u32,
        view_projection: Option<&Matrix4<f32>>,
    ) -> &[ObjectId] {
        let revision = scene.revision();
        let culled = view_projection.is_some();
        let cached = self.lists.get(&camera_mask);
        let fresh = cached
            .map(|list| list.revision == revision && list.culled == culled)
            .unwrap_or(false);

        if !fresh {
            let entries = Self::build(scene, camera_mask, view_projection);
            debug!(
                "compiled draw list for mask {:#x}: {} entries at revision {}",
                camera_mask,
                entries.len(),
                revision
            );
            self.lists.insert(
                camera_mask,
                CachedList {
                    revision,
                    culled,
                    entries,
                },
            );
        }

        &self.lists[&camera_mask].entries
    }

    fn build(
        scene: &Scene,
        camera_mask: u32,
        view_projection: Option<&Matrix4<f32>>,
    ) -> Vec<ObjectId> {
        let mut entries: Vec<(ObjectId, OrderKey)> = Vec::new();
        for (id, object) in scene.objects() {
            let Some(render_data) = &object.render_data else {
                continue;
            };
            let Some(material) = &render_data.material else {
                continue;
            };
            if render_data.flags.render_mask & camera_mask == 0 {
                continue;
            }
            if let Some(vp) = view_projection {
                let mvp = vp * scene.world_matrix(id);
                let frustum = Frustum::from_mvp(&mvp);
                if !frustum.contains_aabb(&render_data.geometry.bounding_box()) {
                    debug!("culled object \"{}\"", object.name);
                    continue;
                }
            }
            entries.push((
                id,
                (render_data.flags.alpha_blend, material.shader.order_rank()),
            ));
        }

        entries.sort_by_key(|(_, key)| *key);
        entries.into_iter().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Vector3, perspective};

    use crate::data_structures::geometry::Geometry;
    use crate::data_structures::material::{Material, ShaderKind};
    use crate::data_structures::scene::{
        RENDER_MASK_LEFT, RENDER_MASK_RIGHT, RenderData, SceneObject,
    };
    use crate::data_structures::transform::Transform;

    fn triangle_at(z: f32) -> Geometry {
        Geometry {
            vertices: vec![[0.0, 0.0, z], [1.0, 0.0, z], [0.0, 1.0, z]],
            triangles: vec![0, 1, 2],
            ..Default::default()
        }
    }

    fn renderable(name: &str, z: f32, shader: ShaderKind) -> SceneObject {
        let mut object = SceneObject::named(name);
        object.transform = Some(Transform::new());
        object.render_data = Some(RenderData::new(triangle_at(z), Material::new(shader)));
        object
    }

    #[test]
    fn excludes_objects_without_render_data_or_material() {
        let mut scene = Scene::new();
        scene.add_object(renderable("a", -5.0, ShaderKind::Unlit));
        scene.add_object(renderable("b", -5.0, ShaderKind::Unlit));
        scene.add_object(SceneObject::named("bare"));
        let mut no_material = renderable("c", -5.0, ShaderKind::Unlit);
        no_material.render_data.as_mut().unwrap().material = None;
        scene.add_object(no_material);
        scene.add_object(SceneObject::named("also bare"));

        let mut compiler = DrawListCompiler::new();
        let list = compiler.compile(&scene, RENDER_MASK_LEFT, None);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn filters_by_render_mask() {
        let mut scene = Scene::new();
        let mut right_only = renderable("right", -5.0, ShaderKind::Unlit);
        right_only.render_data.as_mut().unwrap().flags.render_mask = RENDER_MASK_RIGHT;
        scene.add_object(right_only);
        scene.add_object(renderable("both", -5.0, ShaderKind::Unlit));

        let mut compiler = DrawListCompiler::new();
        assert_eq!(compiler.compile(&scene, RENDER_MASK_LEFT, None).len(), 1);
        assert_eq!(compiler.compile(&scene, RENDER_MASK_RIGHT, None).len(), 2);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut scene = Scene::new();
        let mut ids = Vec::new();
        for name in ["first", "second", "third"] {
            ids.push(scene.add_object(renderable(name, -5.0, ShaderKind::Unlit)));
        }

        let mut compiler = DrawListCompiler::new();
        let list = compiler.compile(&scene, RENDER_MASK_LEFT, None);
        assert_eq!(list, ids.as_slice());
    }

    #[test]
    fn opaque_sorts_before_blended() {
        let mut scene = Scene::new();
        let blended = scene.add_object(renderable("blended", -5.0, ShaderKind::Unlit));
        let mut opaque_object = renderable("opaque", -5.0, ShaderKind::Unlit);
        opaque_object.render_data.as_mut().unwrap().flags.alpha_blend = false;
        let opaque = scene.add_object(opaque_object);

        let mut compiler = DrawListCompiler::new();
        let list = compiler.compile(&scene, RENDER_MASK_LEFT, None);
        assert_eq!(list, [opaque, blended]);
    }

    #[test]
    fn culling_excludes_out_of_frustum_objects() {
        let mut scene = Scene::new();
        let visible = scene.add_object(renderable("visible", -5.0, ShaderKind::Unlit));
        scene.add_object(renderable("behind camera", 5.0, ShaderKind::Unlit));

        let vp = perspective(Deg(90.0), 1.0, 0.1, 100.0);
        let mut compiler = DrawListCompiler::new();
        let list = compiler.compile(&scene, RENDER_MASK_LEFT, Some(&vp));
        assert_eq!(list, [visible]);
    }

    #[test]
    fn cache_is_reused_until_the_scene_changes() {
        let mut scene = Scene::new();
        let id = scene.add_object(renderable("a", -5.0, ShaderKind::Unlit));

        let mut compiler = DrawListCompiler::new();
        assert_eq!(compiler.compile(&scene, RENDER_MASK_LEFT, None).len(), 1);

        // Hide the object; the revision bump must invalidate the cache.
        scene
            .object_mut(id)
            .render_data
            .as_mut()
            .unwrap()
            .material = None;
        assert_eq!(compiler.compile(&scene, RENDER_MASK_LEFT, None).len(), 0);
    }

    #[test]
    fn world_transform_moves_object_out_of_frustum() {
        let mut scene = Scene::new();
        let mut object = renderable("moved", -5.0, ShaderKind::Unlit);
        object.transform.as_mut().unwrap().position = Vector3::new(1000.0, 0.0, 0.0);
        scene.add_object(object);

        let vp = perspective(Deg(90.0), 1.0, 0.1, 100.0);
        let mut compiler = DrawListCompiler::new();
        assert!(compiler.compile(&scene, RENDER_MASK_LEFT, Some(&vp)).is_empty());
    }
}
