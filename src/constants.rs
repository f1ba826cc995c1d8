// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants
//!
//! Kernel and shader constants live here so the WGSL sources and the CPU
//! reference model agree. Shader tests check the WGSL text against these values.

use std::time::Duration;

// ===== Separable Gaussian blur =====

/// Blur radius in pixels (taps = 2 * radius + 1)
pub const BLUR_RADIUS: i32 = 5;
/// Gaussian sigma
pub const BLUR_SIGMA: f32 = 3.0;
/// Number of taps per separable pass
pub const BLUR_TAPS: usize = (2 * BLUR_RADIUS + 1) as usize;

// ===== Luma weights (ITU-R BT.601) =====

/// Luma weights applied to R, G, B
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Sepia matrix, one row per output channel
pub const SEPIA_MATRIX: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

// ===== Vertex warps =====

/// Sine-wave amplitude in quad space (doubled into clip space)
pub const SINE_AMPLITUDE: f32 = 0.05;
/// Sine-wave spatial frequency
pub const SINE_FREQUENCY: f32 = 10.0;
/// Sine-wave time multiplier
pub const SINE_SPEED: f32 = 5.0;
/// Quad space to clip space scale
pub const CLIP_SCALE: f32 = 2.0;

// ===== Fragment effects =====

/// Horizontal channel offset for chromatic aberration (uv units)
pub const CHROMATIC_OFFSET: f32 = 0.005;
/// UV scale fed into the film-grain hash
pub const GRAIN_SCALE: f32 = 512.0;
/// Peak film-grain amplitude (noise spans +/- this value)
pub const GRAIN_AMPLITUDE: f32 = 0.025;
/// Vignette falloff start (distance from center in uv units)
pub const VIGNETTE_INNER: f32 = 0.25;
/// Vignette falloff end
pub const VIGNETTE_OUTER: f32 = 0.75;

// ===== Parameter ranges (inclusive) =====

pub const BRIGHTNESS_RANGE: (f32, f32) = (0.1, 4.0);
pub const CONTRAST_RANGE: (f32, f32) = (0.1, 4.0);
pub const VIGNETTE_RANGE: (f32, f32) = (0.0, 1.0);
pub const MAGNIFY_CENTER_RANGE: (f32, f32) = (0.0, 1.0);
pub const MAGNIFY_RADIUS_RANGE: (f32, f32) = (0.01, 1.0);
pub const MAGNIFY_STRENGTH_RANGE: (f32, f32) = (0.0, 1.0);

// ===== Parameter defaults =====

pub const DEFAULT_BRIGHTNESS: f32 = 1.0;
pub const DEFAULT_CONTRAST: f32 = 1.0;
pub const DEFAULT_VIGNETTE: f32 = 0.0;
pub const DEFAULT_MAGNIFY_CENTER: [f32; 2] = [0.5, 0.5];
pub const DEFAULT_MAGNIFY_RADIUS: f32 = 0.25;
pub const DEFAULT_MAGNIFY_STRENGTH: f32 = 0.5;

// ===== Compute dispatch =====

/// Preferred compute tile edge when the device allows 256 invocations per group
pub const WORKGROUP_SIZE_LARGE: u32 = 16;
/// Fallback compute tile edge
pub const WORKGROUP_SIZE_SMALL: u32 = 8;

// ===== Formats =====

/// Pixel format of ingested camera frames
pub const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;
/// Format of intermediate scratch textures (storage-writable everywhere)
pub const INTERMEDIATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Bytes per pixel for every 4-channel 8-bit format used here
pub const BYTES_PER_PIXEL: u32 = 4;

// ===== Timing =====

/// Default capture cadence for synthetic sources
pub const DEFAULT_SOURCE_FPS: u32 = 30;
/// Default display refresh cadence for preview loops
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(16);

/// Capture interval for a frame rate, clamped to at least 1 fps
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / fps.max(1) as f64)
}
