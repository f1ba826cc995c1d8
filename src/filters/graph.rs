// SPDX-License-Identifier: GPL-3.0-only

//! Pass graph construction
//!
//! Turns one configuration snapshot into the ordered list of GPU passes for a
//! frame. This is the only place that maps filter and warp selectors to passes.

use super::config::{ColorFilter, FilterConfig, WarpMode};
use tracing::warn;

/// Texture a pass reads from or writes to
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TextureSlot {
    /// The ingested camera frame (read-only)
    Frame,
    /// Scratch texture A
    IntermediateA,
    /// Scratch texture B
    IntermediateB,
}

/// Compute kernels available to the graph
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ComputeKernel {
    BlurHorizontal,
    BlurVertical,
    Sobel,
}

impl ComputeKernel {
    pub const ALL: [ComputeKernel; 3] = [
        ComputeKernel::BlurHorizontal,
        ComputeKernel::BlurVertical,
        ComputeKernel::Sobel,
    ];

    /// WGSL entry point of the kernel
    pub fn entry_point(&self) -> &'static str {
        match self {
            ComputeKernel::BlurHorizontal => "blur_horizontal",
            ComputeKernel::BlurVertical => "blur_vertical",
            ComputeKernel::Sobel => "sobel",
        }
    }
}

/// Terminal render programs
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RenderProgram {
    /// Passthrough vertex stage + color filter chain
    Blit,
    /// Warp vertex stage + color chain + color-effects composition
    Composite,
}

/// One compute dispatch
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ComputePass {
    pub kernel: ComputeKernel,
    pub input: TextureSlot,
    pub output: TextureSlot,
}

/// The pass that draws into the output surface
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPass {
    pub program: RenderProgram,
    /// Texture sampled by the fragment stage
    pub source: TextureSlot,
    /// Filter index forwarded to the fragment stage
    pub filter_index: u32,
    /// Warp mode forwarded to the vertex and fragment stages
    pub warp_mode: WarpMode,
}

/// Which pipeline objects compiled successfully at startup
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PipelineAvailability {
    pub blur_horizontal: bool,
    pub blur_vertical: bool,
    pub sobel: bool,
    pub composite: bool,
}

impl PipelineAvailability {
    /// Everything compiled
    pub const ALL: PipelineAvailability = PipelineAvailability {
        blur_horizontal: true,
        blur_vertical: true,
        sobel: true,
        composite: true,
    };

    pub fn kernel(&self, kernel: ComputeKernel) -> bool {
        match kernel {
            ComputeKernel::BlurHorizontal => self.blur_horizontal,
            ComputeKernel::BlurVertical => self.blur_vertical,
            ComputeKernel::Sobel => self.sobel,
        }
    }

    pub fn set_kernel(&mut self, kernel: ComputeKernel, available: bool) {
        match kernel {
            ComputeKernel::BlurHorizontal => self.blur_horizontal = available,
            ComputeKernel::BlurVertical => self.blur_vertical = available,
            ComputeKernel::Sobel => self.sobel = available,
        }
    }
}

impl Default for PipelineAvailability {
    fn default() -> Self {
        Self::ALL
    }
}

/// Ordered passes for one frame
#[derive(Clone, Debug, PartialEq)]
pub struct PassGraph {
    pub compute: Vec<ComputePass>,
    pub render: RenderPass,
}

const BLUR_CHAIN: [ComputePass; 2] = [
    ComputePass {
        kernel: ComputeKernel::BlurHorizontal,
        input: TextureSlot::Frame,
        output: TextureSlot::IntermediateA,
    },
    ComputePass {
        kernel: ComputeKernel::BlurVertical,
        input: TextureSlot::IntermediateA,
        output: TextureSlot::IntermediateB,
    },
];

const SOBEL_PASS: ComputePass = ComputePass {
    kernel: ComputeKernel::Sobel,
    input: TextureSlot::IntermediateB,
    output: TextureSlot::IntermediateA,
};

impl PassGraph {
    /// Build the pass list for a configuration snapshot
    ///
    /// Passes whose pipeline failed to compile are never scheduled; the chain
    /// that needed them collapses to sampling the frame directly.
    pub fn build(config: &FilterConfig, availability: &PipelineAvailability) -> Self {
        let (compute, source) = match config.color_filter {
            ColorFilter::GaussianBlur => {
                let chain = BLUR_CHAIN.to_vec();
                (chain, TextureSlot::IntermediateB)
            }
            ColorFilter::EdgeDetection => {
                let mut chain = BLUR_CHAIN.to_vec();
                chain.push(SOBEL_PASS);
                (chain, TextureSlot::IntermediateA)
            }
            ColorFilter::None
            | ColorFilter::Grayscale
            | ColorFilter::Invert
            | ColorFilter::Sepia
            | ColorFilter::Brightness
            | ColorFilter::Contrast
            | ColorFilter::ToneMapping
            | ColorFilter::ChromaticAberration
            | ColorFilter::FilmGrain
            | ColorFilter::Vignette => (Vec::new(), TextureSlot::Frame),
        };

        let (compute, source) = if compute.iter().all(|p| availability.kernel(p.kernel)) {
            (compute, source)
        } else {
            warn!(
                filter = %config.color_filter,
                "Compute pipeline unavailable, passing frame through"
            );
            (Vec::new(), TextureSlot::Frame)
        };

        let program = match config.warp_mode {
            WarpMode::None => RenderProgram::Blit,
            WarpMode::SineWave | WarpMode::Magnify | WarpMode::ColorEffects => {
                if availability.composite {
                    RenderProgram::Composite
                } else {
                    warn!(mode = %config.warp_mode, "Composite pipeline unavailable, using blit");
                    RenderProgram::Blit
                }
            }
        };

        let warp_mode = match program {
            RenderProgram::Blit => WarpMode::None,
            RenderProgram::Composite => config.warp_mode,
        };

        Self {
            compute,
            render: RenderPass {
                program,
                source,
                filter_index: config.color_filter.fragment_index(),
                warp_mode,
            },
        }
    }

    /// Whether any pass touches the scratch textures
    pub fn needs_intermediates(&self) -> bool {
        !self.compute.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(filter: ColorFilter, warp: WarpMode) -> FilterConfig {
        FilterConfig {
            color_filter: filter,
            warp_mode: warp,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_filter_is_single_blit() {
        let graph = PassGraph::build(&FilterConfig::default(), &PipelineAvailability::ALL);
        assert!(graph.compute.is_empty());
        assert_eq!(graph.render.program, RenderProgram::Blit);
        assert_eq!(graph.render.source, TextureSlot::Frame);
        assert_eq!(graph.render.filter_index, 0);
        assert!(!graph.needs_intermediates());
    }

    #[test]
    fn test_discrete_filters_have_no_compute() {
        for filter in ColorFilter::ALL.iter().filter(|f| !f.requires_compute()) {
            let graph = PassGraph::build(&config(*filter, WarpMode::None), &PipelineAvailability::ALL);
            assert!(graph.compute.is_empty(), "{filter} scheduled compute");
            assert_eq!(graph.render.filter_index, filter.index());
            assert_eq!(graph.render.source, TextureSlot::Frame);
        }
    }

    #[test]
    fn test_blur_chain_order() {
        let graph = PassGraph::build(
            &config(ColorFilter::GaussianBlur, WarpMode::None),
            &PipelineAvailability::ALL,
        );
        assert_eq!(graph.compute, BLUR_CHAIN.to_vec());
        assert_eq!(graph.render.source, TextureSlot::IntermediateB);
        assert_eq!(graph.render.filter_index, 0);
    }

    #[test]
    fn test_edge_detection_chain_order() {
        let graph = PassGraph::build(
            &config(ColorFilter::EdgeDetection, WarpMode::None),
            &PipelineAvailability::ALL,
        );
        let kernels: Vec<_> = graph.compute.iter().map(|p| p.kernel).collect();
        assert_eq!(
            kernels,
            vec![
                ComputeKernel::BlurHorizontal,
                ComputeKernel::BlurVertical,
                ComputeKernel::Sobel
            ]
        );
        assert_eq!(graph.compute[2].input, TextureSlot::IntermediateB);
        assert_eq!(graph.compute[2].output, TextureSlot::IntermediateA);
        assert_eq!(graph.render.source, TextureSlot::IntermediateA);
    }

    #[test]
    fn test_every_pass_reads_what_an_earlier_pass_wrote() {
        for filter in ColorFilter::ALL {
            for warp in WarpMode::ALL {
                let graph = PassGraph::build(&config(filter, warp), &PipelineAvailability::ALL);
                let mut written = vec![TextureSlot::Frame];
                for pass in &graph.compute {
                    assert!(written.contains(&pass.input));
                    assert_ne!(pass.input, pass.output);
                    assert_ne!(pass.output, TextureSlot::Frame);
                    written.push(pass.output);
                }
                assert_eq!(graph.render.source, *written.last().unwrap());
            }
        }
    }

    #[test]
    fn test_warp_takes_composite_and_keeps_compute_prepass() {
        let graph = PassGraph::build(
            &config(ColorFilter::EdgeDetection, WarpMode::Magnify),
            &PipelineAvailability::ALL,
        );
        assert_eq!(graph.compute.len(), 3);
        assert_eq!(graph.render.program, RenderProgram::Composite);
        assert_eq!(graph.render.warp_mode, WarpMode::Magnify);
        assert_eq!(graph.render.source, TextureSlot::IntermediateA);
    }

    #[test]
    fn test_all_warps_select_composite() {
        for warp in [WarpMode::SineWave, WarpMode::Magnify, WarpMode::ColorEffects] {
            let graph = PassGraph::build(&config(ColorFilter::Sepia, warp), &PipelineAvailability::ALL);
            assert_eq!(graph.render.program, RenderProgram::Composite);
            assert_eq!(graph.render.filter_index, ColorFilter::Sepia.index());
        }
    }

    #[test]
    fn test_missing_sobel_passes_frame_through() {
        let availability = PipelineAvailability {
            sobel: false,
            ..PipelineAvailability::ALL
        };
        let graph = PassGraph::build(&config(ColorFilter::EdgeDetection, WarpMode::None), &availability);
        assert!(graph.compute.is_empty());
        assert_eq!(graph.render.source, TextureSlot::Frame);

        // Blur does not depend on the Sobel pipeline
        let graph = PassGraph::build(&config(ColorFilter::GaussianBlur, WarpMode::None), &availability);
        assert_eq!(graph.compute.len(), 2);
    }

    #[test]
    fn test_missing_composite_falls_back_to_blit() {
        let availability = PipelineAvailability {
            composite: false,
            ..PipelineAvailability::ALL
        };
        let graph = PassGraph::build(&config(ColorFilter::Invert, WarpMode::SineWave), &availability);
        assert_eq!(graph.render.program, RenderProgram::Blit);
        assert_eq!(graph.render.warp_mode, WarpMode::None);
        assert_eq!(graph.render.filter_index, ColorFilter::Invert.index());
    }
}
