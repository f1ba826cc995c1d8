// SPDX-License-Identifier: GPL-3.0-only

//! Presentation targets
//!
//! The pipeline draws its terminal pass into whatever a [`FramePresenter`]
//! hands out and gives the finished command buffer back for submission. The
//! offscreen presenter renders into a texture and reads finished frames back
//! without ever blocking `present` on an earlier frame.

use super::intermediate::CachedDimensions;
use crate::constants::BYTES_PER_PIXEL;
use crate::errors::{FrameError, FrameResult};
use crate::gpu::{GpuContext, allocated, check_texture_size, wgpu};
use futures::channel::oneshot;
use tracing::{debug, warn};

/// Pixel format of the offscreen target
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Staging buffers in flight; with both busy the frame is shown but not read back
const READBACK_SLOTS: usize = 2;

/// Drawable for one frame
pub struct PresentTarget {
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    /// Sequence number of the frame drawn into this target
    pub sequence: u64,
}

/// Display surface abstraction
pub trait FramePresenter: Send {
    fn format(&self) -> wgpu::TextureFormat;

    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Hand out the target for the next frame
    fn acquire(&mut self, gpu: &GpuContext) -> FrameResult<PresentTarget>;

    /// Submit the frame's commands and show the target
    ///
    /// Only called with commands that passed validation; a skipped frame
    /// never reaches the presenter.
    fn present(
        &mut self,
        gpu: &GpuContext,
        target: PresentTarget,
        commands: wgpu::CommandBuffer,
    ) -> FrameResult<()>;
}

/// A presented frame read back to the CPU (packed RGBA8)
#[derive(Clone, Debug, PartialEq)]
pub struct PresentedImage {
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    pub pixels: Vec<u8>,
}

impl PresentedImage {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * BYTES_PER_PIXEL) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Mean of each channel in `0.0..=1.0`
    pub fn mean_color(&self) -> [f32; 4] {
        let mut sum = [0u64; 4];
        for p in self.pixels.chunks_exact(4) {
            for (s, v) in sum.iter_mut().zip(p) {
                *s += *v as u64;
            }
        }
        let count = (self.pixels.len() / 4).max(1) as f32;
        sum.map(|s| s as f32 / count / 255.0)
    }
}

/// Rows in a texture-to-buffer copy must be 256-byte aligned
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

type MapResult = Result<(), wgpu::BufferAsyncError>;

enum SlotState {
    Idle,
    Pending {
        order: u64,
        sequence: u64,
        receiver: oneshot::Receiver<MapResult>,
    },
    Mapped {
        order: u64,
        sequence: u64,
    },
}

struct ReadbackSlot {
    buffer: wgpu::Buffer,
    state: SlotState,
}

/// Renders into an `Rgba8Unorm` texture with pipelined readback
pub struct OffscreenPresenter {
    width: u32,
    height: u32,
    target: Option<wgpu::Texture>,
    dimensions: CachedDimensions,
    slots: Vec<ReadbackSlot>,
    presented: u64,
    readbacks_skipped: u64,
}

impl OffscreenPresenter {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            target: None,
            dimensions: CachedDimensions::default(),
            slots: Vec::new(),
            presented: 0,
            readbacks_skipped: 0,
        }
    }

    /// Frames submitted so far
    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Frames presented while every staging buffer was still in flight
    pub fn readbacks_skipped(&self) -> u64 {
        self.readbacks_skipped
    }

    fn ensure_target(&mut self, gpu: &GpuContext) -> FrameResult<wgpu::Texture> {
        if let Some(texture) = &self.target
            && !self.dimensions.needs_update(self.width, self.height)
        {
            return Ok(texture.clone());
        }

        let (width, height) = (self.width, self.height);
        self.target = None;
        self.slots.clear();

        let limits = gpu.device.limits();
        check_texture_size(&limits, "offscreen_target", width, height)?;
        let size = padded_bytes_per_row(width) as u64 * height as u64;
        if size > limits.max_buffer_size {
            return Err(FrameError::Allocation(format!(
                "offscreen_readback: {size} bytes exceeds the buffer limit"
            )));
        }
        debug!(width, height, "Allocating offscreen target");

        let texture = allocated(&gpu.device, "offscreen_target", || {
            gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("offscreen_target"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: OFFSCREEN_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })?;

        for i in 0..READBACK_SLOTS {
            let buffer = allocated(&gpu.device, "offscreen_readback", || {
                gpu.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("offscreen_readback_{i}")),
                    size,
                    usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                    mapped_at_creation: false,
                })
            })?;
            self.slots.push(ReadbackSlot {
                buffer,
                state: SlotState::Idle,
            });
        }

        self.target = Some(texture.clone());
        self.dimensions.update(width, height);
        Ok(texture)
    }

    /// Latest finished readback, without waiting
    pub fn try_read(&mut self, gpu: &GpuContext) -> Option<PresentedImage> {
        let _ = gpu.device.poll(wgpu::PollType::Poll);
        self.collect()
    }

    /// Wait for the GPU and return the newest presented frame
    pub fn read_blocking(&mut self, gpu: &GpuContext) -> FrameResult<PresentedImage> {
        if self.slots.iter().all(|s| matches!(s.state, SlotState::Idle)) {
            return Err(FrameError::Readback("no frame in flight".to_string()));
        }
        let _ = gpu.device.poll(wgpu::PollType::wait_indefinitely());
        self.collect()
            .ok_or_else(|| FrameError::Readback("buffer mapping did not complete".to_string()))
    }

    fn collect(&mut self) -> Option<PresentedImage> {
        for slot in &mut self.slots {
            let next = match &mut slot.state {
                SlotState::Pending {
                    order,
                    sequence,
                    receiver,
                } => match receiver.try_recv() {
                    Ok(Some(Ok(()))) => Some(SlotState::Mapped {
                        order: *order,
                        sequence: *sequence,
                    }),
                    Ok(Some(Err(e))) => {
                        warn!(error = %e, "Readback mapping failed");
                        Some(SlotState::Idle)
                    }
                    Ok(None) => None,
                    Err(_) => Some(SlotState::Idle),
                },
                SlotState::Idle | SlotState::Mapped { .. } => None,
            };
            if let Some(next) = next {
                slot.state = next;
            }
        }

        let newest = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s.state {
                SlotState::Mapped { order, .. } => Some((order, i)),
                _ => None,
            })
            .max()
            .map(|(_, i)| i)?;

        let (width, height) = (self.dimensions.width, self.dimensions.height);
        let padded = padded_bytes_per_row(width) as usize;
        let row = (width * BYTES_PER_PIXEL) as usize;
        let mut image = None;

        for (i, slot) in self.slots.iter_mut().enumerate() {
            let SlotState::Mapped { sequence, .. } = slot.state else {
                continue;
            };
            if i == newest {
                let data = slot.buffer.slice(..).get_mapped_range();
                let mut pixels = Vec::with_capacity(row * height as usize);
                for y in 0..height as usize {
                    pixels.extend_from_slice(&data[y * padded..y * padded + row]);
                }
                drop(data);
                image = Some(PresentedImage {
                    width,
                    height,
                    sequence,
                    pixels,
                });
            }
            // Older mapped frames are stale once a newer one is available
            slot.buffer.unmap();
            slot.state = SlotState::Idle;
        }

        image
    }
}

impl FramePresenter for OffscreenPresenter {
    fn format(&self) -> wgpu::TextureFormat {
        OFFSCREEN_FORMAT
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn acquire(&mut self, gpu: &GpuContext) -> FrameResult<PresentTarget> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::Surface(format!(
                "zero-sized output {}x{}",
                self.width, self.height
            )));
        }
        let texture = self.ensure_target(gpu)?;
        Ok(PresentTarget {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            width: self.width,
            height: self.height,
            sequence: 0,
        })
    }

    fn present(
        &mut self,
        gpu: &GpuContext,
        target: PresentTarget,
        commands: wgpu::CommandBuffer,
    ) -> FrameResult<()> {
        let texture = self
            .target
            .as_ref()
            .ok_or_else(|| FrameError::Surface("present without acquire".to_string()))?;

        let slot = self
            .slots
            .iter()
            .position(|s| matches!(s.state, SlotState::Idle));

        let readback = slot.map(|index| {
            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("offscreen_readback"),
                });
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &self.slots[index].buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(padded_bytes_per_row(target.width)),
                        rows_per_image: None,
                    },
                },
                wgpu::Extent3d {
                    width: target.width,
                    height: target.height,
                    depth_or_array_layers: 1,
                },
            );
            encoder.finish()
        });

        gpu.queue.submit(std::iter::once(commands).chain(readback));
        self.presented += 1;

        match slot {
            Some(index) => {
                let (sender, receiver) = oneshot::channel();
                let slot = &mut self.slots[index];
                slot.buffer
                    .slice(..)
                    .map_async(wgpu::MapMode::Read, move |result| {
                        let _ = sender.send(result);
                    });
                slot.state = SlotState::Pending {
                    order: self.presented,
                    sequence: target.sequence,
                    receiver,
                };
            }
            None => self.readbacks_skipped += 1,
        }

        Ok(())
    }
}
