// SPDX-License-Identifier: GPL-3.0-only
//! Shader sources and the GPU pass engines built from them
//!
//! - [`compute`]: blur and Sobel kernels dispatched over 2D thread grids
//! - [`render`]: full-screen quad programs (blit and composite)
//! - [`reference`]: CPU model of every kernel, used to check the GPU output

pub mod compute;
pub mod reference;
pub mod render;

pub use compute::ComputeEngine;
pub use render::{QuadMesh, RenderEngine, RenderParams};

/// Compute kernels (WGSL), without the `TILE` constant
/// Contains: blur_horizontal(), blur_vertical(), sobel()
pub const KERNELS_SHADER: &str = include_str!("kernels.wgsl");

/// Full-screen quad programs (WGSL)
/// Contains: vs_passthrough(), vs_warp(), fs_filter(), fs_composite()
pub const QUAD_SHADER: &str = include_str!("quad.wgsl");

/// Kernel source with the workgroup tile edge baked in
pub fn kernel_source(tile: u32) -> String {
    format!("const TILE: u32 = {}u;\n{}", tile.max(1), KERNELS_SHADER)
}
