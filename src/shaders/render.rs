// SPDX-License-Identifier: GPL-3.0-only

//! Full-screen quad render engine
//!
//! Draws the terminal pass of every frame. The quad is tessellated into a
//! grid so the vertex warps have vertices to displace.

use super::QUAD_SHADER;
use crate::errors::PipelineResult;
use crate::filters::{FilterConfig, RenderPass, RenderProgram};
use crate::gpu::{validated, wgpu};
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

/// Vertex of the tessellated quad
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    /// Clip-space position
    pub position: [f32; 2],
    /// Texture coordinate (origin top-left, v down)
    pub uv: [f32; 2],
}

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

impl QuadVertex {
    fn new(x: f32, y: f32) -> Self {
        Self {
            position: [x, y],
            uv: [(x + 1.0) * 0.5, (1.0 - y) * 0.5],
        }
    }

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_ATTRIBUTES,
        }
    }
}

/// Triangle list covering clip space
pub struct QuadMesh;

impl QuadMesh {
    /// `subdivisions` x `subdivisions` cells, two triangles each
    pub fn grid(subdivisions: u32) -> Vec<QuadVertex> {
        let n = subdivisions.max(1);
        let step = 2.0 / n as f32;
        let mut vertices = Vec::with_capacity((n * n * 6) as usize);
        for j in 0..n {
            let y0 = -1.0 + j as f32 * step;
            let y1 = if j + 1 == n { 1.0 } else { y0 + step };
            for i in 0..n {
                let x0 = -1.0 + i as f32 * step;
                let x1 = if i + 1 == n { 1.0 } else { x0 + step };
                vertices.extend_from_slice(&[
                    QuadVertex::new(x0, y0),
                    QuadVertex::new(x1, y0),
                    QuadVertex::new(x1, y1),
                    QuadVertex::new(x0, y0),
                    QuadVertex::new(x1, y1),
                    QuadVertex::new(x0, y1),
                ]);
            }
        }
        vertices
    }
}

/// Uniform block shared by both quad programs (matches `RenderParams` in quad.wgsl)
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RenderParams {
    pub magnify_center: [f32; 2],
    pub magnify_radius: f32,
    pub magnify_strength: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub vignette_strength: f32,
    pub time: f32,
    pub filter_index: u32,
    pub warp_mode: u32,
    pub _padding: [f32; 2],
}

impl RenderParams {
    pub fn from_config(config: &FilterConfig, pass: &RenderPass) -> Self {
        Self {
            magnify_center: config.magnify_center,
            magnify_radius: config.magnify_radius,
            magnify_strength: config.magnify_strength,
            brightness: config.brightness,
            contrast: config.contrast,
            vignette_strength: config.vignette_strength,
            time: config.time,
            filter_index: pass.filter_index,
            warp_mode: pass.warp_mode.index(),
            _padding: [0.0; 2],
        }
    }
}

pub struct RenderEngine {
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
    blit: wgpu::RenderPipeline,
    composite: Option<wgpu::RenderPipeline>,
    output_format: wgpu::TextureFormat,
}

impl RenderEngine {
    /// Compile the quad programs for `output_format`
    ///
    /// Blit is always required. A composite failure is fatal only when `strict`.
    pub fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
        mesh_subdivisions: u32,
        strict: bool,
    ) -> PipelineResult<Self> {
        let shader = validated(device, "quad", || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("quad_shader"),
                source: wgpu::ShaderSource::Wgsl(QUAD_SHADER.into()),
            })
        })?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad_bind_group_layout"),
            entries: &[
                // Source texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Render parameters
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let build = |label: &str, vs: &str, fs: &str| {
            validated(device, label, || {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(label),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: Some(vs),
                        buffers: &[QuadVertex::layout()],
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: Some(fs),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: output_format,
                            blend: Some(wgpu::BlendState::REPLACE),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        cull_mode: None,
                        ..Default::default()
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                })
            })
        };

        let blit = build("quad_blit", "vs_passthrough", "fs_filter")?;
        let composite = match build("quad_composite", "vs_warp", "fs_composite") {
            Ok(pipeline) => Some(pipeline),
            Err(e) if strict => return Err(e),
            Err(e) => {
                warn!(error = %e, "Composite pipeline unavailable");
                None
            }
        };

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("quad_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quad_params"),
            size: std::mem::size_of::<RenderParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertices = QuadMesh::grid(mesh_subdivisions);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        debug!(
            vertices = vertices.len(),
            format = ?output_format,
            composite = composite.is_some(),
            "Quad programs compiled"
        );

        Ok(Self {
            bind_group_layout,
            sampler,
            uniform_buffer,
            vertex_buffer,
            vertex_count: vertices.len() as u32,
            blit,
            composite,
            output_format,
        })
    }

    pub fn has_composite(&self) -> bool {
        self.composite.is_some()
    }

    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.output_format
    }

    /// Record the terminal pass into `target`
    ///
    /// A missing composite pipeline draws with blit instead; the pass graph
    /// already zeroes the warp mode in that case.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        program: RenderProgram,
        source: &wgpu::TextureView,
        target: &wgpu::TextureView,
        params: &RenderParams,
    ) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(params));

        let pipeline = match program {
            RenderProgram::Blit => &self.blit,
            RenderProgram::Composite => self.composite.as_ref().unwrap_or(&self.blit),
        };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("quad_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.draw(0..self.vertex_count, 0..1);
    }
}
