// SPDX-License-Identifier: GPL-3.0-only

//! Texture ingest
//!
//! Turns a [`RawFrame`] delivered by a source into a [`Frame`] the pipeline
//! can sample. CPU frames are uploaded into a reused texture; frames that are
//! already device-resident are wrapped without a copy.

use crate::constants::{BYTES_PER_PIXEL, FRAME_FORMAT};
use crate::errors::{FrameError, FrameResult};
use crate::gpu::{GpuContext, allocated, check_texture_size, wgpu};
use crate::pipeline::CachedDimensions;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Pixel storage of a raw frame
#[derive(Clone, Debug)]
pub enum FramePixels {
    /// BGRA8 rows, `stride` bytes apart
    Cpu(Arc<[u8]>),
    /// Texture on the pipeline's device
    Gpu(Arc<wgpu::Texture>),
}

/// Frame as delivered by a frame source
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row for CPU pixels (ignored for GPU pixels)
    pub stride: u32,
    pub sequence: u64,
    pub captured_at: Instant,
    pub pixels: FramePixels,
}

impl RawFrame {
    /// Tightly packed or strided BGRA8 frame
    pub fn cpu(width: u32, height: u32, stride: u32, pixels: Arc<[u8]>, sequence: u64) -> Self {
        Self {
            width,
            height,
            stride,
            sequence,
            captured_at: Instant::now(),
            pixels: FramePixels::Cpu(pixels),
        }
    }

    /// Device-resident frame; dimensions are taken from the texture
    pub fn gpu(texture: Arc<wgpu::Texture>, sequence: u64) -> Self {
        let size = texture.size();
        Self {
            width: size.width,
            height: size.height,
            stride: size.width * BYTES_PER_PIXEL,
            sequence,
            captured_at: Instant::now(),
            pixels: FramePixels::Gpu(texture),
        }
    }

    /// Check dimensions and buffer size before touching the GPU
    pub fn validate(&self) -> FrameResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::InvalidFrame(format!(
                "zero-sized frame {}x{}",
                self.width, self.height
            )));
        }
        match &self.pixels {
            FramePixels::Cpu(bytes) => {
                let row = self.width as u64 * BYTES_PER_PIXEL as u64;
                if (self.stride as u64) < row {
                    return Err(FrameError::InvalidFrame(format!(
                        "stride {} shorter than row of {} bytes",
                        self.stride, row
                    )));
                }
                let needed = self.stride as u64 * (self.height as u64 - 1) + row;
                if (bytes.len() as u64) < needed {
                    return Err(FrameError::InvalidFrame(format!(
                        "buffer holds {} bytes, {} needed",
                        bytes.len(),
                        needed
                    )));
                }
            }
            FramePixels::Gpu(texture) => {
                if texture.dimension() != wgpu::TextureDimension::D2
                    || texture.depth_or_array_layers() != 1
                    || texture.sample_count() != 1
                {
                    return Err(FrameError::InvalidFrame(format!(
                        "texture must be 2D, single layer, single sample (got {:?}, {} layers, {} samples)",
                        texture.dimension(),
                        texture.depth_or_array_layers(),
                        texture.sample_count()
                    )));
                }
                if !texture.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING) {
                    return Err(FrameError::InvalidFrame(
                        "texture is not bindable for sampling".to_string(),
                    ));
                }
                if !matches!(
                    texture.format(),
                    wgpu::TextureFormat::Bgra8Unorm
                        | wgpu::TextureFormat::Bgra8UnormSrgb
                        | wgpu::TextureFormat::Rgba8Unorm
                        | wgpu::TextureFormat::Rgba8UnormSrgb
                ) {
                    return Err(FrameError::InvalidFrame(format!(
                        "unsupported texture format {:?}",
                        texture.format()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Sampleable frame texture, valid for one `render_frame` call
#[derive(Debug)]
pub struct Frame {
    pub texture: Arc<wgpu::Texture>,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
}

impl Frame {
    fn wrap(texture: Arc<wgpu::Texture>, sequence: u64) -> Self {
        let size = texture.size();
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width: size.width,
            height: size.height,
            sequence,
        }
    }
}

/// Strategy for making a raw frame sampleable
pub trait TextureImport: Send {
    fn import(&mut self, gpu: &GpuContext, raw: &RawFrame) -> FrameResult<Frame>;
}

/// Copies CPU pixels into a texture reused across frames
#[derive(Default)]
pub struct UploadImport {
    texture: Option<Arc<wgpu::Texture>>,
    dimensions: CachedDimensions,
}

impl UploadImport {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_texture(&mut self, gpu: &GpuContext, width: u32, height: u32) -> FrameResult<Arc<wgpu::Texture>> {
        if let Some(texture) = &self.texture
            && !self.dimensions.needs_update(width, height)
        {
            return Ok(Arc::clone(texture));
        }

        check_texture_size(&gpu.device.limits(), "frame_upload", width, height)?;
        debug!(width, height, "Allocating frame upload texture");
        self.texture = None;
        let texture = allocated(&gpu.device, "frame_upload", || {
            gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("frame_upload"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: FRAME_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        })?;

        let texture = Arc::new(texture);
        self.texture = Some(Arc::clone(&texture));
        self.dimensions.update(width, height);
        Ok(texture)
    }
}

impl TextureImport for UploadImport {
    fn import(&mut self, gpu: &GpuContext, raw: &RawFrame) -> FrameResult<Frame> {
        raw.validate()?;
        let FramePixels::Cpu(bytes) = &raw.pixels else {
            return Err(FrameError::InvalidFrame(
                "upload import needs CPU pixels".to_string(),
            ));
        };

        let texture = self.ensure_texture(gpu, raw.width, raw.height)?;
        let len = (raw.stride * (raw.height - 1) + raw.width * BYTES_PER_PIXEL) as usize;

        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bytes[..len],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(raw.stride),
                rows_per_image: Some(raw.height),
            },
            wgpu::Extent3d {
                width: raw.width,
                height: raw.height,
                depth_or_array_layers: 1,
            },
        );

        Ok(Frame::wrap(texture, raw.sequence))
    }
}

/// Wraps device-resident frames, uploads everything else
#[derive(Default)]
pub struct AutoImport {
    upload: UploadImport,
}

impl AutoImport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextureImport for AutoImport {
    fn import(&mut self, gpu: &GpuContext, raw: &RawFrame) -> FrameResult<Frame> {
        match &raw.pixels {
            FramePixels::Gpu(texture) => {
                raw.validate()?;
                Ok(Frame::wrap(Arc::clone(texture), raw.sequence))
            }
            FramePixels::Cpu(_) => self.upload.import(gpu, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_frame(width: u32, height: u32, stride: u32, len: usize) -> RawFrame {
        RawFrame::cpu(width, height, stride, vec![0u8; len].into(), 0)
    }

    #[test]
    fn test_validate_packed_frame() {
        assert!(cpu_frame(4, 2, 16, 32).validate().is_ok());
    }

    #[test]
    fn test_validate_strided_frame() {
        // Last row needs only the pixel bytes, not the full stride
        assert!(cpu_frame(4, 2, 20, 36).validate().is_ok());
        assert!(cpu_frame(4, 2, 20, 35).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        assert!(matches!(
            cpu_frame(0, 4, 0, 0).validate(),
            Err(FrameError::InvalidFrame(_))
        ));
        assert!(cpu_frame(4, 0, 16, 0).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_stride() {
        assert!(cpu_frame(4, 2, 12, 64).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_buffer() {
        assert!(cpu_frame(4, 4, 16, 63).validate().is_err());
    }
}
