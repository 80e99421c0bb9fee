//! wgpu material shaders: unlit texturing with mono/stereo frame sampling,
//! plus the solid-color error shader.
//!
//! One [`UnlitShader`] instance serves one stereo mode; the registry holds
//! one per [`ShaderKind`] built-in. The external-texture (OES) variants
//! sample the same way as the unlit ones here, since off-screen rendering
//! has no external image sources to distinguish.

use std::collections::HashMap;

use cgmath::Matrix4;
use wgpu::util::DeviceExt;

use super::{DrawCall, MaterialShader, ShaderFault};
use crate::context::{COLOR_FORMAT, DEPTH_FORMAT, PassState, SharedGpu};
use crate::data_structures::material::Material;

/// How the fragment stage maps UVs onto a (possibly packed) stereo frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StereoMode {
    Mono,
    /// Side-by-side packing, left half to the left eye.
    Horizontal,
    /// Top-bottom packing.
    Vertical,
}

impl StereoMode {
    fn as_uniform(self) -> u32 {
        match self {
            StereoMode::Mono => 0,
            StereoMode::Horizontal => 1,
            StereoMode::Vertical => 2,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawUniform {
    mvp: [[f32; 4]; 4],
    stereo_mode: u32,
    right_eye: u32,
    _padding: [u32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct VertexAttributes {
    position: [f32; 3],
    tex_coords: [f32; 2],
}

impl VertexAttributes {
    const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<VertexAttributes>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
    };
}

/// Pipeline cache key: the toggleable state plus the bit pattern of the
/// polygon-offset parameters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    depth_test: bool,
    blend: bool,
    cull_face: bool,
    offset_factor_bits: u32,
    offset_units_bits: u32,
}

impl PipelineKey {
    fn from_state(state: &PassState) -> Self {
        let (factor, units) = if state.polygon_offset {
            (state.offset_factor, state.offset_units)
        } else {
            (0.0, 0.0)
        };
        Self {
            depth_test: state.depth_test,
            blend: state.blend,
            cull_face: state.cull_face,
            offset_factor_bits: factor.to_bits(),
            offset_units_bits: units.to_bits(),
        }
    }
}

fn uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("draw uniform layout"),
    })
}

fn diffuse_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
        label: Some("diffuse layout"),
    })
}

fn mk_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    key: &PipelineKey,
) -> wgpu::RenderPipeline {
    let blend = if key.blend {
        Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        })
    } else {
        Some(wgpu::BlendState {
            color: wgpu::BlendComponent::REPLACE,
            alpha: wgpu::BlendComponent::REPLACE,
        })
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("material pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[VertexAttributes::LAYOUT],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: key.cull_face.then_some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth_test,
            depth_compare: if key.depth_test {
                wgpu::CompareFunction::LessEqual
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: f32::from_bits(key.offset_units_bits) as i32,
                slope_scale: f32::from_bits(key.offset_factor_bits),
                clamp: 0.0,
            },
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

/// Registry with every built-in material shader wired up. The OES variants
/// share the unlit implementation per stereo mode.
pub fn builtin_shader_registry(gpu: &SharedGpu) -> super::ShaderRegistry {
    use crate::data_structures::material::ShaderKind;

    let mut registry = super::ShaderRegistry::new(Box::new(ErrorShader::new(gpu.clone())));
    let variants = [
        (ShaderKind::Unlit, StereoMode::Mono),
        (ShaderKind::UnlitHorizontalStereo, StereoMode::Horizontal),
        (ShaderKind::UnlitVerticalStereo, StereoMode::Vertical),
        (ShaderKind::Oes, StereoMode::Mono),
        (ShaderKind::OesHorizontalStereo, StereoMode::Horizontal),
        (ShaderKind::OesVerticalStereo, StereoMode::Vertical),
    ];
    for (kind, mode) in variants {
        registry.register(kind, Box::new(UnlitShader::new(gpu.clone(), mode)));
    }
    registry
}

/// Textured unlit shader, one per stereo mode.
pub struct UnlitShader {
    gpu: SharedGpu,
    mode: StereoMode,
    shader: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    uniform_layout: wgpu::BindGroupLayout,
    diffuse_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    /// Texture bind groups keyed by (bitmap id, repeat).
    diffuse_groups: HashMap<(u64, bool), wgpu::BindGroup>,
}

impl UnlitShader {
    pub fn new(gpu: SharedGpu, mode: StereoMode) -> Self {
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("unlit shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("unlit.wgsl").into()),
        });
        let uniforms = uniform_layout(&gpu.device);
        let diffuse = diffuse_layout(&gpu.device);
        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("unlit pipeline layout"),
                bind_group_layouts: &[&uniforms, &diffuse],
                push_constant_ranges: &[],
            });
        Self {
            gpu,
            mode,
            shader,
            layout,
            uniform_layout: uniforms,
            diffuse_layout: diffuse,
            pipelines: HashMap::new(),
            diffuse_groups: HashMap::new(),
        }
    }

    fn diffuse_group(&mut self, texture: &crate::data_structures::material::Texture) -> wgpu::BindGroup {
        let key = (texture.bitmap.id(), texture.repeat);
        if let Some(group) = self.diffuse_groups.get(&key) {
            return group.clone();
        }

        let bitmap = &texture.bitmap;
        let gpu_texture = self.gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("diffuse texture"),
            size: wgpu::Extent3d {
                width: bitmap.width,
                height: bitmap.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bitmap.pixels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * bitmap.width),
                rows_per_image: Some(bitmap.height),
            },
            wgpu::Extent3d {
                width: bitmap.width,
                height: bitmap.height,
                depth_or_array_layers: 1,
            },
        );

        let address_mode = if texture.repeat {
            wgpu::AddressMode::Repeat
        } else {
            wgpu::AddressMode::ClampToEdge
        };
        let sampler = self.gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.diffuse_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
            label: Some("diffuse bind group"),
        });
        self.diffuse_groups.insert(key, group.clone());
        group
    }
}

impl MaterialShader for UnlitShader {
    fn render(
        &mut self,
        mvp: &Matrix4<f32>,
        draw: &DrawCall<'_>,
        right_eye: bool,
    ) -> Result<(), ShaderFault> {
        let texture = draw
            .material
            .texture(Material::MAIN_TEXTURE)
            .ok_or_else(|| ShaderFault::new("material has no main_texture"))?
            .clone();
        let bound = self
            .gpu
            .bound_target()
            .ok_or_else(|| ShaderFault::new("no render target bound"))?;

        let key = PipelineKey::from_state(&self.gpu.pass_state());
        if !self.pipelines.contains_key(&key) {
            let pipeline = mk_pipeline(&self.gpu.device, &self.layout, &self.shader, &key);
            self.pipelines.insert(key, pipeline);
        }

        let uniform = DrawUniform {
            mvp: (*mvp).into(),
            stereo_mode: self.mode.as_uniform(),
            right_eye: right_eye as u32,
            _padding: [0; 2],
        };
        let uniform_buffer = self
            .gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("draw uniform"),
                contents: bytemuck::cast_slice(&[uniform]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let uniform_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("draw uniform group"),
        });
        let diffuse_group = self.diffuse_group(&texture);

        // TODO: cache vertex/index buffers per geometry instead of
        // re-uploading every draw.
        let vertices: Vec<VertexAttributes> = draw
            .geometry
            .vertices
            .iter()
            .enumerate()
            .map(|(index, position)| VertexAttributes {
                position: *position,
                tex_coords: draw
                    .geometry
                    .tex_coords
                    .as_ref()
                    .map(|coords| coords[index])
                    .unwrap_or([0.0, 0.0]),
            })
            .collect();
        let vertex_buffer = self
            .gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("geometry vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("geometry indices"),
                contents: bytemuck::cast_slice(&draw.geometry.triangles),
                usage: wgpu::BufferUsages::INDEX,
            });

        let (viewport_width, viewport_height) = self.gpu.viewport();
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("draw encoder"),
            });
        self.gpu
            .with_target(bound, |target| {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("material pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target.color,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &target.depth,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                if viewport_width > 0 && viewport_height > 0 {
                    pass.set_viewport(
                        0.0,
                        0.0,
                        viewport_width as f32,
                        viewport_height as f32,
                        0.0,
                        1.0,
                    );
                }
                pass.set_pipeline(&self.pipelines[&key]);
                pass.set_bind_group(0, &uniform_group, &[]);
                pass.set_bind_group(1, &diffuse_group, &[]);
                pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.geometry.triangles.len() as u32, 0, 0..1);
            })
            .ok_or_else(|| ShaderFault::new("bound render target no longer exists"))?;
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

/// Solid-magenta fallback for unresolved shader tags and failed draws.
pub struct ErrorShader {
    gpu: SharedGpu,
    shader: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    uniform_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl ErrorShader {
    pub fn new(gpu: SharedGpu) -> Self {
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("error shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("error.wgsl").into()),
        });
        let uniforms = uniform_layout(&gpu.device);
        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("error pipeline layout"),
                bind_group_layouts: &[&uniforms],
                push_constant_ranges: &[],
            });
        Self {
            gpu,
            shader,
            layout,
            uniform_layout: uniforms,
            pipelines: HashMap::new(),
        }
    }
}

impl MaterialShader for ErrorShader {
    fn render(
        &mut self,
        mvp: &Matrix4<f32>,
        draw: &DrawCall<'_>,
        _right_eye: bool,
    ) -> Result<(), ShaderFault> {
        let bound = self
            .gpu
            .bound_target()
            .ok_or_else(|| ShaderFault::new("no render target bound"))?;

        let key = PipelineKey::from_state(&self.gpu.pass_state());
        if !self.pipelines.contains_key(&key) {
            let pipeline = mk_pipeline(&self.gpu.device, &self.layout, &self.shader, &key);
            self.pipelines.insert(key, pipeline);
        }

        let uniform = DrawUniform {
            mvp: (*mvp).into(),
            stereo_mode: 0,
            right_eye: 0,
            _padding: [0; 2],
        };
        let uniform_buffer = self
            .gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("error uniform"),
                contents: bytemuck::cast_slice(&[uniform]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let uniform_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("error uniform group"),
        });

        let vertices: Vec<VertexAttributes> = draw
            .geometry
            .vertices
            .iter()
            .map(|position| VertexAttributes {
                position: *position,
                tex_coords: [0.0, 0.0],
            })
            .collect();
        let vertex_buffer = self
            .gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("error vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("error indices"),
                contents: bytemuck::cast_slice(&draw.geometry.triangles),
                usage: wgpu::BufferUsages::INDEX,
            });

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("error draw encoder"),
            });
        self.gpu
            .with_target(bound, |target| {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("error pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target.color,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &target.depth,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&self.pipelines[&key]);
                pass.set_bind_group(0, &uniform_group, &[]);
                pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.geometry.triangles.len() as u32, 0, 0..1);
            })
            .ok_or_else(|| ShaderFault::new("bound render target no longer exists"))?;
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
