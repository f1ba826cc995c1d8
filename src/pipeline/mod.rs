// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame orchestration
//!
//! [`FilterPipeline`] owns every GPU object that outlives a frame. Each call
//! to [`FilterPipeline::render_frame`] takes one configuration snapshot,
//! builds the pass graph for it, records the compute pre-pass and the
//! terminal render pass into a single encoder, and hands the finished
//! commands to the presenter. Nothing in here waits on the GPU.

mod intermediate;
mod present;
mod session;

pub use intermediate::{CachedDimensions, IntermediateTextures};
pub use present::{
    FramePresenter, OFFSCREEN_FORMAT, OffscreenPresenter, PresentTarget, PresentedImage,
    padded_bytes_per_row,
};
pub use session::{PreviewSession, SessionStats};

use crate::backends::Frame;
use crate::config::Config;
use crate::errors::{FrameError, FrameResult, PipelineResult};
use crate::filters::{
    ColorFilter, FilterConfig, FilterControls, PassGraph, PipelineAvailability, TextureSlot,
    WarpMode,
};
use crate::gpu::{GpuContext, wgpu};
use crate::shaders::{ComputeEngine, RenderEngine, RenderParams};
use tracing::{debug, info, warn};

/// Result of one `render_frame` call
#[derive(Clone, Debug)]
pub enum FrameOutcome {
    /// The frame was submitted to the presenter
    Presented {
        sequence: u64,
        filter: ColorFilter,
        warp: WarpMode,
        compute_passes: usize,
    },
    /// The frame was dropped; the previous output stays on screen
    Skipped(FrameError),
}

impl FrameOutcome {
    pub fn is_presented(&self) -> bool {
        matches!(self, FrameOutcome::Presented { .. })
    }
}

pub struct FilterPipeline {
    gpu: GpuContext,
    controls: FilterControls,
    compute: ComputeEngine,
    render: RenderEngine,
    availability: PipelineAvailability,
    intermediates: IntermediateTextures,
    output_size: (u32, u32),
}

impl FilterPipeline {
    /// Compile every pipeline object for `output_format`
    pub fn new(
        gpu: GpuContext,
        output_format: wgpu::TextureFormat,
        config: &Config,
    ) -> PipelineResult<Self> {
        Self::with_controls(gpu, output_format, config, FilterControls::new())
    }

    /// Like [`Self::new`], reading configuration from existing controls
    pub fn with_controls(
        gpu: GpuContext,
        output_format: wgpu::TextureFormat,
        config: &Config,
        controls: FilterControls,
    ) -> PipelineResult<Self> {
        let strict = config.strict_pipelines;
        let compute = ComputeEngine::new(&gpu.device, gpu.info.workgroup_size, strict)?;
        let render = RenderEngine::new(&gpu.device, output_format, config.mesh_subdivisions, strict)?;

        let availability = PipelineAvailability {
            composite: render.has_composite(),
            ..compute.availability()
        };

        if availability != PipelineAvailability::ALL {
            warn!(?availability, "Some filter passes are unavailable");
        }

        info!(
            adapter = %gpu.info.adapter_name,
            format = ?output_format,
            workgroup_size = compute.workgroup_size(),
            strict,
            "Filter pipeline ready"
        );

        Ok(Self {
            gpu,
            controls,
            compute,
            render,
            availability,
            intermediates: IntermediateTextures::new(),
            output_size: (0, 0),
        })
    }

    /// Handle to the configuration read by this pipeline
    pub fn controls(&self) -> FilterControls {
        self.controls.clone()
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn availability(&self) -> PipelineAvailability {
        self.availability
    }

    pub fn output_size(&self) -> (u32, u32) {
        self.output_size
    }

    pub fn has_intermediates(&self) -> bool {
        self.intermediates.is_allocated()
    }

    /// Record the new output size and drop the intermediates
    pub fn on_resize(&mut self, width: u32, height: u32) {
        debug!(width, height, "Output resized");
        self.output_size = (width, height);
        self.intermediates.invalidate();
    }

    /// Filter one frame into the presenter's next target
    pub fn render_frame(&mut self, frame: &Frame, presenter: &mut dyn FramePresenter) -> FrameOutcome {
        match self.try_render(frame, presenter) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(sequence = frame.sequence, error = %e, "Skipping frame");
                FrameOutcome::Skipped(e)
            }
        }
    }

    fn try_render(&mut self, frame: &Frame, presenter: &mut dyn FramePresenter) -> FrameResult<FrameOutcome> {
        if frame.width == 0 || frame.height == 0 {
            return Err(FrameError::InvalidFrame(format!(
                "zero-sized frame {}x{}",
                frame.width, frame.height
            )));
        }

        let config = self.controls.snapshot();
        let graph = PassGraph::build(&config, &self.availability);

        if graph.needs_intermediates() {
            self.intermediates
                .ensure(&self.gpu.device, frame.width, frame.height)?;
        }

        let mut target = presenter.acquire(&self.gpu)?;
        target.sequence = frame.sequence;

        // Validation errors must surface before anything is submitted
        let device = &self.gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let encoded = self
            .encode(frame, &graph, &config, &target)
            .map(|encoder| encoder.finish());
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(FrameError::Encode(err.to_string()));
        }

        presenter.present(&self.gpu, target, encoded?)?;

        Ok(FrameOutcome::Presented {
            sequence: frame.sequence,
            filter: config.color_filter,
            warp: graph.render.warp_mode,
            compute_passes: graph.compute.len(),
        })
    }

    fn view<'a>(&'a self, frame: &'a Frame, slot: TextureSlot) -> FrameResult<&'a wgpu::TextureView> {
        match slot {
            TextureSlot::Frame => Ok(&frame.view),
            _ => self
                .intermediates
                .view(slot)
                .ok_or_else(|| FrameError::Encode(format!("{slot:?} not allocated"))),
        }
    }

    fn encode(
        &self,
        frame: &Frame,
        graph: &PassGraph,
        config: &FilterConfig,
        target: &PresentTarget,
    ) -> FrameResult<wgpu::CommandEncoder> {
        let device = &self.gpu.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("filter_frame"),
        });

        for pass in &graph.compute {
            self.compute
                .dispatch(
                    device,
                    &mut encoder,
                    pass.kernel,
                    self.view(frame, pass.input)?,
                    self.view(frame, pass.output)?,
                    frame.width,
                    frame.height,
                )
                .map_err(|e| FrameError::Encode(e.to_string()))?;
        }

        let params = RenderParams::from_config(config, &graph.render);
        self.render.encode(
            device,
            &self.gpu.queue,
            &mut encoder,
            graph.render.program,
            self.view(frame, graph.render.source)?,
            &target.view,
            &params,
        );

        Ok(encoder)
    }
}
