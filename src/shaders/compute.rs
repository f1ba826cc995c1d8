// SPDX-License-Identifier: GPL-3.0-only

//! Compute pass engine
//!
//! Owns one compute pipeline per kernel, all sharing a single bind group
//! layout: a sampled input texture and a write-only storage output.

use super::kernel_source;
use crate::constants::INTERMEDIATE_FORMAT;
use crate::errors::{PipelineError, PipelineResult};
use crate::filters::{ComputeKernel, PipelineAvailability};
use crate::gpu::{validated, wgpu};
use tracing::{debug, warn};

/// Calculate compute shader dispatch size (workgroups needed)
///
/// Given a dimension and workgroup size, returns the number of workgroups
/// needed to cover the entire dimension.
#[inline]
pub fn compute_dispatch_size(dimension: u32, workgroup_size: u32) -> u32 {
    dimension.div_ceil(workgroup_size.max(1))
}

pub struct ComputeEngine {
    bind_group_layout: wgpu::BindGroupLayout,
    // Indexed like ComputeKernel::ALL
    pipelines: [Option<wgpu::ComputePipeline>; 3],
    workgroup_size: u32,
}

impl ComputeEngine {
    /// Compile every kernel for the given tile edge
    ///
    /// With `strict` set, the first compilation failure is returned. Otherwise
    /// the failing kernel is logged and left out of [`Self::availability`].
    pub fn new(device: &wgpu::Device, workgroup_size: u32, strict: bool) -> PipelineResult<Self> {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("filter_kernel_bind_group_layout"),
            entries: &[
                // Input texture (frame or intermediate)
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Output intermediate
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: INTERMEDIATE_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("filter_kernel_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let source = kernel_source(workgroup_size);
        let shader = validated(device, "filter_kernels", || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("filter_kernels"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });

        let shader = match shader {
            Ok(shader) => Some(shader),
            Err(e) if strict => return Err(e),
            Err(e) => {
                warn!(error = %e, "Kernel module failed to compile, compute filters disabled");
                None
            }
        };

        let mut pipelines: [Option<wgpu::ComputePipeline>; 3] = [None, None, None];
        if let Some(shader) = &shader {
            for (slot, kernel) in pipelines.iter_mut().zip(ComputeKernel::ALL) {
                let entry_point = kernel.entry_point();
                let pipeline = validated(device, entry_point, || {
                    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                        label: Some(entry_point),
                        layout: Some(&pipeline_layout),
                        module: shader,
                        entry_point: Some(entry_point),
                        compilation_options: Default::default(),
                        cache: None,
                    })
                });
                match pipeline {
                    Ok(pipeline) => *slot = Some(pipeline),
                    Err(e) if strict => return Err(e),
                    Err(e) => warn!(error = %e, "Kernel unavailable"),
                }
            }
        }

        debug!(workgroup_size, "Compute kernels compiled");

        Ok(Self {
            bind_group_layout,
            pipelines,
            workgroup_size,
        })
    }

    /// Which kernels compiled
    pub fn availability(&self) -> PipelineAvailability {
        let mut availability = PipelineAvailability::ALL;
        for (pipeline, kernel) in self.pipelines.iter().zip(ComputeKernel::ALL) {
            availability.set_kernel(kernel, pipeline.is_some());
        }
        availability
    }

    pub fn workgroup_size(&self) -> u32 {
        self.workgroup_size
    }

    fn pipeline(&self, kernel: ComputeKernel) -> Option<&wgpu::ComputePipeline> {
        let index = ComputeKernel::ALL.iter().position(|k| *k == kernel)?;
        self.pipelines[index].as_ref()
    }

    /// Record one kernel dispatch over a `width` x `height` output
    ///
    /// Each dispatch gets its own compute pass, so the write to `output` is
    /// visible to whatever pass reads it next.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        kernel: ComputeKernel,
        input: &wgpu::TextureView,
        output: &wgpu::TextureView,
        width: u32,
        height: u32,
    ) -> PipelineResult<()> {
        let pipeline = self.pipeline(kernel).ok_or_else(|| PipelineError::Compilation {
            label: kernel.entry_point().to_string(),
            message: "pipeline not available".to_string(),
        })?;

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.entry_point()),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(output),
                },
            ],
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(kernel.entry_point()),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(
            compute_dispatch_size(width, self.workgroup_size),
            compute_dispatch_size(height, self.workgroup_size),
            1,
        );

        Ok(())
    }
}
