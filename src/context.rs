//! Headless GPU context and the wgpu realization of the render backend.
//!
//! No window or surface exists here: an HMD compositor owns the swapchain,
//! so every render target is an off-screen texture. The [`Gpu`] handle is
//! shared (`Rc`) between the backend and the shader implementations because
//! they all mutate one logical GL-style state block; the crate is
//! single-threaded by design.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::pipelines::{RenderBackend, StateFlag, TargetId, TargetSpec};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// An off-screen color+depth target.
pub struct RenderTarget {
    pub color: wgpu::TextureView,
    pub depth: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

/// Toggleable pipeline state, mirrored from the backend flag calls and read
/// by shaders when picking a pipeline variant.
#[derive(Clone, Copy, Debug)]
pub struct PassState {
    pub cull_face: bool,
    pub depth_test: bool,
    pub blend: bool,
    pub polygon_offset: bool,
    pub offset_factor: f32,
    pub offset_units: f32,
}

impl Default for PassState {
    fn default() -> Self {
        Self {
            cull_face: true,
            depth_test: true,
            blend: true,
            polygon_offset: false,
            offset_factor: 0.0,
            offset_units: 0.0,
        }
    }
}

#[derive(Default)]
pub(crate) struct GpuState {
    targets: HashMap<TargetId, RenderTarget>,
    next_target: u32,
    bound: Option<TargetId>,
    viewport: (u32, u32),
    pub(crate) pass: PassState,
}

/// Device, queue and the shared mutable render state.
pub struct Gpu {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub(crate) state: RefCell<GpuState>,
}

/// Shared handle used by the backend and every wgpu shader.
pub type SharedGpu = Rc<Gpu>;

impl Gpu {
    pub async fn new() -> anyhow::Result<SharedGpu> {
        log::info!("wgpu setup (headless)");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Rc::new(Self {
            device,
            queue,
            state: RefCell::new(GpuState::default()),
        }))
    }

    /// Synchronous constructor for callers without an async runtime.
    pub fn new_blocking() -> anyhow::Result<SharedGpu> {
        pollster::block_on(Self::new())
    }

    /// Allocate an off-screen color+depth target and hand back its spec.
    pub fn create_target(&self, width: u32, height: u32) -> TargetSpec {
        let color = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render target color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render target depth"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let mut state = self.state.borrow_mut();
        let id = TargetId(state.next_target);
        state.next_target += 1;
        state.targets.insert(
            id,
            RenderTarget {
                color: color.create_view(&wgpu::TextureViewDescriptor::default()),
                depth: depth.create_view(&wgpu::TextureViewDescriptor::default()),
                width,
                height,
            },
        );
        TargetSpec { id, width, height }
    }

    pub(crate) fn bound_target(&self) -> Option<TargetId> {
        self.state.borrow().bound
    }

    pub(crate) fn with_target<T>(
        &self,
        id: TargetId,
        f: impl FnOnce(&RenderTarget) -> T,
    ) -> Option<T> {
        self.state.borrow().targets.get(&id).map(f)
    }

    pub(crate) fn pass_state(&self) -> PassState {
        self.state.borrow().pass
    }

    pub(crate) fn viewport(&self) -> (u32, u32) {
        self.state.borrow().viewport
    }
}

/// [`RenderBackend`] over the shared GPU handle.
pub struct WgpuBackend {
    gpu: SharedGpu,
}

impl WgpuBackend {
    pub fn new(gpu: SharedGpu) -> Self {
        Self { gpu }
    }
}

impl RenderBackend for WgpuBackend {
    fn bind_target(&mut self, target: TargetId) {
        self.gpu.state.borrow_mut().bound = Some(target);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.gpu.state.borrow_mut().viewport = (width, height);
    }

    fn clear(&mut self, color: [f32; 4]) {
        let Some(bound) = self.gpu.bound_target() else {
            return;
        };
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clear encoder"),
            });
        self.gpu.with_target(bound, |target| {
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color[0] as f64,
                            g: color[1] as f64,
                            b: color[2] as f64,
                            a: color[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        });
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    fn set_flag(&mut self, flag: StateFlag, enabled: bool) {
        let mut state = self.gpu.state.borrow_mut();
        match flag {
            StateFlag::CullFace => state.pass.cull_face = enabled,
            StateFlag::DepthTest => state.pass.depth_test = enabled,
            StateFlag::Blend => state.pass.blend = enabled,
            StateFlag::PolygonOffset => state.pass.polygon_offset = enabled,
        }
    }

    fn set_polygon_offset(&mut self, factor: f32, units: f32) {
        let mut state = self.gpu.state.borrow_mut();
        state.pass.offset_factor = factor;
        state.pass.offset_units = units;
    }
}
