// SPDX-License-Identifier: GPL-3.0-only

//! Scratch textures for the compute pre-pass

use crate::constants::INTERMEDIATE_FORMAT;
use crate::errors::FrameResult;
use crate::filters::TextureSlot;
use crate::gpu::{allocated, check_texture_size, wgpu};
use tracing::debug;

/// Cached dimensions for resource reallocation decisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachedDimensions {
    pub width: u32,
    pub height: u32,
}

impl CachedDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check if dimensions have changed and need update
    pub fn needs_update(&self, width: u32, height: u32) -> bool {
        self.width != width || self.height != height
    }

    pub fn update(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Check if dimensions are initialized (non-zero)
    pub fn is_initialized(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn clear(&mut self) {
        self.update(0, 0);
    }
}

struct ScratchTexture {
    // Kept alive for the view
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Intermediates A and B, allocated on first use and sized to the frame
#[derive(Default)]
pub struct IntermediateTextures {
    textures: Option<[ScratchTexture; 2]>,
    dimensions: CachedDimensions,
}

impl IntermediateTextures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate (or reallocate after a size change) both textures
    pub fn ensure(&mut self, device: &wgpu::Device, width: u32, height: u32) -> FrameResult<()> {
        if self.textures.is_some() && !self.dimensions.needs_update(width, height) {
            return Ok(());
        }

        self.invalidate();
        check_texture_size(&device.limits(), "intermediate", width, height)?;
        debug!(width, height, "Allocating intermediate textures");

        let create = |label: &'static str| -> FrameResult<ScratchTexture> {
            let texture = allocated(device, label, || {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: INTERMEDIATE_FORMAT,
                    usage: wgpu::TextureUsages::STORAGE_BINDING
                        | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                })
            })?;
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            Ok(ScratchTexture {
                _texture: texture,
                view,
            })
        };

        let a = create("intermediate_a")?;
        let b = create("intermediate_b")?;
        self.textures = Some([a, b]);
        self.dimensions.update(width, height);
        Ok(())
    }

    /// Drop both textures; the next `ensure` re-creates them
    pub fn invalidate(&mut self) {
        if self.textures.take().is_some() {
            debug!("Dropped intermediate textures");
        }
        self.dimensions.clear();
    }

    pub fn is_allocated(&self) -> bool {
        self.textures.is_some()
    }

    pub fn dimensions(&self) -> CachedDimensions {
        self.dimensions
    }

    /// View for an intermediate slot; `None` for the frame slot or before allocation
    pub fn view(&self, slot: TextureSlot) -> Option<&wgpu::TextureView> {
        let [a, b] = self.textures.as_ref()?;
        match slot {
            TextureSlot::Frame => None,
            TextureSlot::IntermediateA => Some(&a.view),
            TextureSlot::IntermediateB => Some(&b.view),
        }
    }
}
