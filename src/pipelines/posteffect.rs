//! wgpu post-effect shaders: fullscreen passes over a source target.
//!
//! Both built-ins (color blend and horizontal flip) share the machinery in
//! [`FullscreenEffect`]; they differ only in WGSL source and the uniform
//! floats they read.

use wgpu::util::DeviceExt;

use super::{PostEffectShader, ShaderFault, TargetId};
use crate::context::{COLOR_FORMAT, SharedGpu};
use crate::data_structures::material::PostEffectData;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct EffectUniform {
    color: [f32; 3],
    factor: f32,
}

/// Registry with the two built-in post effects wired up.
pub fn builtin_post_effect_registry(gpu: &SharedGpu) -> super::PostEffectRegistry {
    use crate::data_structures::material::PostEffectKind;

    let mut registry = super::PostEffectRegistry::new();
    registry.register(
        PostEffectKind::ColorBlend,
        Box::new(FullscreenEffect::color_blend(gpu.clone())),
    );
    registry.register(
        PostEffectKind::HorizontalFlip,
        Box::new(FullscreenEffect::horizontal_flip(gpu.clone())),
    );
    registry
}

/// A post-effect pass drawing one fullscreen triangle, sampling the source
/// target and writing the bound target.
pub struct FullscreenEffect {
    gpu: SharedGpu,
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    source_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl FullscreenEffect {
    /// Standard color-blend effect: mixes the frame toward a constant color.
    pub fn color_blend(gpu: SharedGpu) -> Self {
        Self::new(gpu, include_str!("color_blend.wgsl"), "color blend")
    }

    /// Standard horizontal-flip effect.
    pub fn horizontal_flip(gpu: SharedGpu) -> Self {
        Self::new(gpu, include_str!("horizontal_flip.wgsl"), "horizontal flip")
    }

    pub fn new(gpu: SharedGpu, wgsl: &str, label: &str) -> Self {
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(wgsl.into()),
        });

        let uniform_layout =
            gpu.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                    label: Some("effect uniform layout"),
                });
        let source_layout =
            gpu.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                multisampled: false,
                                view_dimension: wgpu::TextureViewDimension::D2,
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                    label: Some("effect source layout"),
                });

        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("effect pipeline layout"),
                bind_group_layouts: &[&uniform_layout, &source_layout],
                push_constant_ranges: &[],
            });
        let pipeline = gpu
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                cache: None,
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            });

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            gpu,
            pipeline,
            uniform_layout,
            source_layout,
            sampler,
        }
    }
}

impl PostEffectShader for FullscreenEffect {
    fn render(&mut self, effect: &PostEffectData, source: TargetId) -> Result<(), ShaderFault> {
        let bound = self
            .gpu
            .bound_target()
            .ok_or_else(|| ShaderFault::new("no render target bound"))?;

        let uniform = EffectUniform {
            color: [
                effect.float("r").unwrap_or(0.0),
                effect.float("g").unwrap_or(0.0),
                effect.float("b").unwrap_or(0.0),
            ],
            factor: effect.float("factor").unwrap_or(0.0),
        };
        let uniform_buffer = self
            .gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("effect uniform"),
                contents: bytemuck::cast_slice(&[uniform]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let uniform_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("effect uniform group"),
        });

        let source_group = self
            .gpu
            .with_target(source, |target| {
                self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &self.source_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&target.color),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                    label: Some("effect source group"),
                })
            })
            .ok_or_else(|| ShaderFault::new("post-effect source target does not exist"))?;

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("effect encoder"),
            });
        self.gpu
            .with_target(bound, |target| {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("effect pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target.color,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &uniform_group, &[]);
                pass.set_bind_group(1, &source_group, &[]);
                pass.draw(0..3, 0..1);
            })
            .ok_or_else(|| ShaderFault::new("bound render target no longer exists"))?;
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
