// SPDX-License-Identifier: GPL-3.0-only

//! Filter selection and per-frame pass planning
//!
//! - [`config`]: the configuration record and its thread-safe controls
//! - [`graph`]: maps a configuration snapshot to an ordered list of GPU passes

pub mod config;
pub mod graph;

pub use config::{ColorFilter, FilterConfig, FilterControls, WarpMode};
pub use graph::{
    ComputeKernel, ComputePass, PassGraph, PipelineAvailability, RenderPass, RenderProgram,
    TextureSlot,
};
