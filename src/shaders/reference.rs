// SPDX-License-Identifier: GPL-3.0-only

//! CPU model of the GPU kernels
//!
//! Mirrors `kernels.wgsl` and `quad.wgsl` operation for operation on float
//! RGBA images. Used to check GPU output and to pin kernel behavior in tests.

use crate::constants::*;
use crate::filters::RenderProgram;
use crate::shaders::RenderParams;

/// Float RGBA image, row-major, origin top-left
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

impl Image {
    pub fn filled(width: u32, height: u32, color: [f32; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; (width * height) as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> [f32; 4]) -> Self {
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Decode 8-bit RGBA bytes
    pub fn from_rgba8(width: u32, height: u32, bytes: &[u8]) -> Self {
        let pixels = bytes
            .chunks_exact(4)
            .map(|p| {
                [
                    p[0] as f32 / 255.0,
                    p[1] as f32 / 255.0,
                    p[2] as f32 / 255.0,
                    p[3] as f32 / 255.0,
                ]
            })
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Decode 8-bit BGRA bytes (the ingested frame layout)
    pub fn from_bgra8(width: u32, height: u32, bytes: &[u8]) -> Self {
        let mut image = Self::from_rgba8(width, height, bytes);
        for p in &mut image.pixels {
            p.swap(0, 2);
        }
        image
    }

    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Texel fetch with edge clamping
    pub fn load_clamped(&self, x: i32, y: i32) -> [f32; 4] {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.get(x, y)
    }

    /// Bilinear sample with clamp-to-edge addressing (texel centers at half-integers)
    pub fn sample(&self, uv: [f32; 2]) -> [f32; 4] {
        let u = uv[0].clamp(0.0, 1.0) * self.width as f32 - 0.5;
        let v = uv[1].clamp(0.0, 1.0) * self.height as f32 - 0.5;
        let (x0, y0) = (u.floor(), v.floor());
        let (fx, fy) = (u - x0, v - y0);
        let (x0, y0) = (x0 as i32, y0 as i32);

        let a = self.load_clamped(x0, y0);
        let b = self.load_clamped(x0 + 1, y0);
        let c = self.load_clamped(x0, y0 + 1);
        let d = self.load_clamped(x0 + 1, y0 + 1);

        let mut out = [0.0; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * fx;
            let bottom = c[i] + (d[i] - c[i]) * fx;
            out[i] = top + (bottom - top) * fy;
        }
        out
    }

    /// Largest per-channel difference to another image of the same size
    pub fn max_difference(&self, other: &Image) -> f32 {
        self.pixels
            .iter()
            .zip(&other.pixels)
            .flat_map(|(a, b)| a.iter().zip(b).map(|(x, y)| (x - y).abs()))
            .fold(0.0, f32::max)
    }
}

fn clamp01(c: [f32; 4]) -> [f32; 4] {
    c.map(|v| v.clamp(0.0, 1.0))
}

fn luminance(c: [f32; 4]) -> f32 {
    c[0] * LUMA_WEIGHTS[0] + c[1] * LUMA_WEIGHTS[1] + c[2] * LUMA_WEIGHTS[2]
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// ===== Compute kernels =====

/// Normalized Gaussian taps, index 0 is offset `-BLUR_RADIUS`
pub fn gaussian_weights() -> [f32; BLUR_TAPS] {
    let mut weights = [0.0; BLUR_TAPS];
    for (i, w) in weights.iter_mut().enumerate() {
        let x = i as f32 - BLUR_RADIUS as f32;
        *w = (-(x * x) / (2.0 * BLUR_SIGMA * BLUR_SIGMA)).exp();
    }
    let sum: f32 = weights.iter().sum();
    weights.map(|w| w / sum)
}

fn blur_along(image: &Image, dx: i32, dy: i32) -> Image {
    let weights = gaussian_weights();
    Image::from_fn(image.width, image.height, |x, y| {
        let mut sum = [0.0; 4];
        for (i, w) in weights.iter().enumerate() {
            let offset = i as i32 - BLUR_RADIUS;
            let p = image.load_clamped(x as i32 + dx * offset, y as i32 + dy * offset);
            for c in 0..4 {
                sum[c] += p[c] * w;
            }
        }
        clamp01(sum)
    })
}

pub fn blur_horizontal(image: &Image) -> Image {
    blur_along(image, 1, 0)
}

pub fn blur_vertical(image: &Image) -> Image {
    blur_along(image, 0, 1)
}

/// Sobel gradient magnitude of luma; the 1-pixel border is opaque black
pub fn sobel(image: &Image) -> Image {
    let (w, h) = (image.width, image.height);
    Image::from_fn(w, h, |x, y| {
        if x < 1 || y < 1 || x + 1 >= w || y + 1 >= h {
            return [0.0, 0.0, 0.0, 1.0];
        }
        let l = |dx: i32, dy: i32| luminance(image.get((x as i32 + dx) as u32, (y as i32 + dy) as u32));
        let gx = (l(1, -1) + 2.0 * l(1, 0) + l(1, 1)) - (l(-1, -1) + 2.0 * l(-1, 0) + l(-1, 1));
        let gy = (l(-1, 1) + 2.0 * l(0, 1) + l(1, 1)) - (l(-1, -1) + 2.0 * l(0, -1) + l(1, -1));
        let m = (gx * gx + gy * gy).sqrt().min(1.0);
        [m, m, m, 1.0]
    })
}

// ===== Vertex warps =====

/// Vertical displacement in quad space
pub fn sine_offset(q: [f32; 2], time: f32) -> f32 {
    SINE_AMPLITUDE * (q[0] * SINE_FREQUENCY + time * SINE_SPEED).sin()
}

/// Radial displacement in quad space; `touch_center` has y down
pub fn magnify_offset(q: [f32; 2], touch_center: [f32; 2], radius: f32, strength: f32) -> [f32; 2] {
    let center = [touch_center[0], 1.0 - touch_center[1]];
    let delta = [q[0] - center[0], q[1] - center[1]];
    let dist = (delta[0] * delta[0] + delta[1] * delta[1]).sqrt();
    if dist >= radius || dist <= 0.0 {
        return [0.0, 0.0];
    }
    let scale = (1.0 - smoothstep(0.0, radius, dist)) * strength / dist;
    [delta[0] * scale, delta[1] * scale]
}

// ===== Fragment stage =====

pub fn sepia(c: [f32; 4]) -> [f32; 4] {
    let m = SEPIA_MATRIX;
    let dot = |row: [f32; 3]| row[0] * c[0] + row[1] * c[1] + row[2] * c[2];
    [dot(m[0]), dot(m[1]), dot(m[2]), c[3]]
}

pub fn reinhard(v: f32) -> f32 {
    v / (v + 1.0)
}

fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Film-grain noise in `[-GRAIN_AMPLITUDE, GRAIN_AMPLITUDE]`
pub fn film_grain(uv: [f32; 2], time: f32) -> f32 {
    let p = [uv[0] * GRAIN_SCALE + time, uv[1] * GRAIN_SCALE + time];
    let hash = fract((p[0] * 12.9898 + p[1] * 78.233).sin() * 43758.5453);
    (hash - 0.5) * 2.0 * GRAIN_AMPLITUDE
}

pub fn vignette_factor(uv: [f32; 2], strength: f32) -> f32 {
    let (dx, dy) = (uv[0] - 0.5, uv[1] - 0.5);
    let dist = (dx * dx + dy * dy).sqrt();
    1.0 - strength * smoothstep(VIGNETTE_INNER, VIGNETTE_OUTER, dist)
}

fn scale_rgb(c: [f32; 4], k: f32) -> [f32; 4] {
    [c[0] * k, c[1] * k, c[2] * k, c[3]]
}

fn contrast(c: [f32; 4], k: f32) -> [f32; 4] {
    let f = |v: f32| (v - 0.5) * k + 0.5;
    [f(c[0]), f(c[1]), f(c[2]), c[3]]
}

fn chromatic_sample(image: &Image, uv: [f32; 2]) -> [f32; 4] {
    let base = image.sample(uv);
    let r = image.sample([uv[0] + CHROMATIC_OFFSET, uv[1]])[0];
    let b = image.sample([uv[0] - CHROMATIC_OFFSET, uv[1]])[2];
    [r, base[1], b, base[3]]
}

/// Discrete filter by index; unknown indices pass the color through
pub fn apply_filter(image: &Image, color: [f32; 4], uv: [f32; 2], params: &RenderParams) -> [f32; 4] {
    match params.filter_index {
        1 => {
            let l = luminance(color);
            [l, l, l, color[3]]
        }
        2 => [1.0 - color[0], 1.0 - color[1], 1.0 - color[2], color[3]],
        3 => sepia(color),
        4 => scale_rgb(color, params.brightness),
        5 => contrast(color, params.contrast),
        6 => [reinhard(color[0]), reinhard(color[1]), reinhard(color[2]), color[3]],
        7 => chromatic_sample(image, uv),
        8 => {
            let g = film_grain(uv, params.time);
            [color[0] + g, color[1] + g, color[2] + g, color[3]]
        }
        9 => scale_rgb(color, vignette_factor(uv, params.vignette_strength)),
        _ => color,
    }
}

/// Filter, then the sliders the filter did not already apply, then clamp
pub fn apply_chain(image: &Image, color: [f32; 4], uv: [f32; 2], params: &RenderParams) -> [f32; 4] {
    let mut c = apply_filter(image, color, uv, params);
    if params.filter_index != 4 {
        c = scale_rgb(c, params.brightness);
    }
    if params.filter_index != 5 {
        c = contrast(c, params.contrast);
    }
    if params.filter_index != 9 {
        c = scale_rgb(c, vignette_factor(uv, params.vignette_strength));
    }
    clamp01(c)
}

/// Color of one fragment at `uv`
pub fn shade(image: &Image, uv: [f32; 2], program: RenderProgram, params: &RenderParams) -> [f32; 4] {
    match program {
        RenderProgram::Blit => apply_chain(image, image.sample(uv), uv, params),
        RenderProgram::Composite => {
            let effects = params.warp_mode == 3;
            let base = if effects {
                chromatic_sample(image, uv)
            } else {
                image.sample(uv)
            };
            let mut c = apply_chain(image, base, uv, params);
            if effects {
                let g = film_grain(uv, params.time);
                for v in &mut c[..3] {
                    *v = reinhard(*v) + g;
                }
            }
            c[3] = 1.0;
            clamp01(c)
        }
    }
}

/// Shade every output pixel center (no vertex displacement)
pub fn render(image: &Image, width: u32, height: u32, program: RenderProgram, params: &RenderParams) -> Image {
    Image::from_fn(width, height, |x, y| {
        let uv = [
            (x as f32 + 0.5) / width as f32,
            (y as f32 + 0.5) / height as f32,
        ];
        shade(image, uv, program, params)
    })
}
