//! Recording fakes for driving the pipeline without a GPU device.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use cgmath::Matrix4;

use stereoscene::data_structures::material::{Bitmap, PostEffectData};
use stereoscene::importer::{SceneGraphSource, SourceMesh, SourceNode};
use stereoscene::pipelines::{
    DrawCall, MaterialShader, PostEffectShader, RenderBackend, ShaderFault, StateFlag, TargetId,
};
use stereoscene::resources::texture::TextureLoader;

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Everything the pipeline asks the backend to do, in order.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum BackendEvent {
    Bind(TargetId),
    Viewport(u32, u32),
    Clear([f32; 4]),
    Flag(StateFlag, bool),
    PolygonOffset(f32, f32),
}

#[derive(Default)]
pub(crate) struct RecordingBackend {
    pub(crate) events: Vec<BackendEvent>,
}

impl RecordingBackend {
    pub(crate) fn binds(&self) -> Vec<TargetId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                BackendEvent::Bind(target) => Some(*target),
                _ => None,
            })
            .collect()
    }

    /// State of one flag after replaying all events, starting from `initial`.
    pub(crate) fn final_flag_state(&self, flag: StateFlag, initial: bool) -> bool {
        self.events
            .iter()
            .filter_map(|event| match event {
                BackendEvent::Flag(f, enabled) if *f == flag => Some(*enabled),
                _ => None,
            })
            .last()
            .unwrap_or(initial)
    }
}

impl RenderBackend for RecordingBackend {
    fn bind_target(&mut self, target: TargetId) {
        self.events.push(BackendEvent::Bind(target));
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.events.push(BackendEvent::Viewport(width, height));
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.events.push(BackendEvent::Clear(color));
    }

    fn set_flag(&mut self, flag: StateFlag, enabled: bool) {
        self.events.push(BackendEvent::Flag(flag, enabled));
    }

    fn set_polygon_offset(&mut self, factor: f32, units: f32) {
        self.events.push(BackendEvent::PolygonOffset(factor, units));
    }
}

/// One observed material draw.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DrawRecord {
    pub(crate) shader: &'static str,
    pub(crate) object_name: String,
    pub(crate) right_eye: bool,
}

pub(crate) type DrawLog = Rc<RefCell<Vec<DrawRecord>>>;

/// Fake material shader that records every draw into a shared log.
pub(crate) struct RecordingShader {
    pub(crate) name: &'static str,
    pub(crate) log: DrawLog,
}

impl MaterialShader for RecordingShader {
    fn render(
        &mut self,
        _mvp: &Matrix4<f32>,
        draw: &DrawCall<'_>,
        right_eye: bool,
    ) -> Result<(), ShaderFault> {
        self.log.borrow_mut().push(DrawRecord {
            shader: self.name,
            object_name: draw.object_name.to_owned(),
            right_eye,
        });
        Ok(())
    }
}

/// Fake material shader that fails every draw.
pub(crate) struct FailingShader;

impl MaterialShader for FailingShader {
    fn render(
        &mut self,
        _mvp: &Matrix4<f32>,
        _draw: &DrawCall<'_>,
        _right_eye: bool,
    ) -> Result<(), ShaderFault> {
        Err(ShaderFault::new("deliberate test failure"))
    }
}

/// Fake post-effect shader recording the source target of each pass.
pub(crate) struct RecordingPostEffect {
    pub(crate) sources: Rc<RefCell<Vec<TargetId>>>,
}

impl PostEffectShader for RecordingPostEffect {
    fn render(&mut self, _effect: &PostEffectData, source: TargetId) -> Result<(), ShaderFault> {
        self.sources.borrow_mut().push(source);
        Ok(())
    }
}

/// In-memory import source: one root node with one single-triangle mesh.
pub(crate) struct SingleTriangleSource {
    root: SourceNode,
    mesh: SourceMesh,
    diffuse: Option<String>,
}

impl SingleTriangleSource {
    pub(crate) fn new(diffuse: Option<&str>) -> Self {
        let mesh = SourceMesh {
            name: "triangle".into(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: None,
            tex_coords: None,
            faces: vec![vec![0, 1, 2]],
            material_index: 0,
        };
        let root = SourceNode {
            name: "triangle node".into(),
            local_transform: cgmath::Matrix4::from_scale(1.0),
            mesh_indices: vec![0],
            children: vec![],
        };
        Self {
            root,
            mesh,
            diffuse: diffuse.map(str::to_owned),
        }
    }

    /// Same triangle, but with a UV channel reaching past 1.0 so the mesh
    /// carries the texture-repeat flag.
    pub(crate) fn with_repeating_uvs(diffuse: Option<&str>) -> Self {
        let mut source = Self::new(diffuse);
        source.mesh.tex_coords = Some(vec![[0.0, 0.0], [2.0, 0.0], [0.0, 1.0]]);
        source
    }
}

impl SceneGraphSource for SingleTriangleSource {
    fn root(&self) -> &SourceNode {
        &self.root
    }

    fn mesh(&self, index: usize) -> Option<&SourceMesh> {
        (index == 0).then_some(&self.mesh)
    }

    fn diffuse_texture_name(&self, _material_index: usize) -> Option<&str> {
        self.diffuse.as_deref()
    }
}

/// Loader that serves a fixed bitmap for one filename and fails the rest.
pub(crate) struct StubLoader {
    pub(crate) known: String,
    pub(crate) bitmap: Bitmap,
}

impl TextureLoader for StubLoader {
    fn load(&self, file_name: &str) -> Option<Bitmap> {
        (file_name == self.known).then(|| self.bitmap.clone())
    }
}
