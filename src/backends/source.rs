// SPDX-License-Identifier: GPL-3.0-only

//! Frame sources and the latest-wins mailbox
//!
//! A source emits [`RawFrame`]s from its own thread through a callback. The
//! consumer side reads the most recent one through a [`FrameMailbox`]; frames
//! that arrive faster than they are rendered overwrite each other.

use super::frame_loop::{FrameLoop, LoopAction};
use super::ingest::RawFrame;
use crate::config::Config;
use crate::constants::{BYTES_PER_PIXEL, frame_interval};
use crate::errors::{PipelineError, PipelineResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Invoked on the source's thread for every captured frame
pub type FrameCallback = Arc<dyn Fn(RawFrame) + Send + Sync>;

/// Producer of raw frames
pub trait FrameSource: Send {
    /// Start emitting frames; restarts if already running
    fn start_capturing(&mut self, callback: FrameCallback);
    fn stop_capturing(&mut self);
    fn is_capturing(&self) -> bool;
}

#[derive(Default)]
struct MailboxSlot {
    frame: Mutex<Option<RawFrame>>,
    posted: AtomicU64,
    dropped: AtomicU64,
}

/// Single-slot handoff between a producer thread and the render loop
#[derive(Clone, Default)]
pub struct FrameMailbox {
    slot: Arc<MailboxSlot>,
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, replacing any frame not yet taken
    pub fn post(&self, frame: RawFrame) {
        self.slot.posted.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.slot.frame.lock()
            && guard.replace(frame).is_some()
        {
            self.slot.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove and return the pending frame
    pub fn take(&self) -> Option<RawFrame> {
        self.slot.frame.lock().ok()?.take()
    }

    pub fn has_pending(&self) -> bool {
        self.slot
            .frame
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Frames overwritten before being taken
    pub fn dropped(&self) -> u64 {
        self.slot.dropped.load(Ordering::Relaxed)
    }

    pub fn posted(&self) -> u64 {
        self.slot.posted.load(Ordering::Relaxed)
    }

    /// Callback that posts into this mailbox
    pub fn callback(&self) -> FrameCallback {
        let mailbox = self.clone();
        Arc::new(move |frame| mailbox.post(frame))
    }
}

impl std::fmt::Debug for FrameMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameMailbox")
            .field("posted", &self.posted())
            .field("dropped", &self.dropped())
            .finish()
    }
}

/// Animated BGRA test pattern: scrolling color bars over a vertical ramp
pub struct PatternSource {
    width: u32,
    height: u32,
    fps: u32,
    frame_loop: Option<FrameLoop>,
}

impl PatternSource {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            fps,
            frame_loop: None,
        }
    }

    /// Render pattern frame `sequence` as tightly packed BGRA
    pub fn render(width: u32, height: u32, sequence: u64) -> Vec<u8> {
        const BARS: [[u8; 3]; 7] = [
            [255, 255, 255],
            [255, 255, 0],
            [0, 255, 255],
            [0, 255, 0],
            [255, 0, 255],
            [255, 0, 0],
            [0, 0, 255],
        ];
        let shift = (sequence * 4 % width as u64) as u32;
        let mut data = Vec::with_capacity((width * height * BYTES_PER_PIXEL) as usize);
        for y in 0..height {
            let ramp = 1.0 - 0.65 * (y as f32 / height as f32);
            for x in 0..width {
                let bar = (((x + shift) % width) * BARS.len() as u32 / width) as usize;
                let [r, g, b] = BARS[bar].map(|c| (c as f32 * ramp) as u8);
                data.extend_from_slice(&[b, g, r, 255]);
            }
        }
        data
    }
}

impl FrameSource for PatternSource {
    fn start_capturing(&mut self, callback: FrameCallback) {
        self.stop_capturing();
        let (width, height) = (self.width, self.height);
        let mut sequence = 0u64;
        info!(width, height, fps = self.fps, "Starting pattern source");

        self.frame_loop = Some(FrameLoop::start_paced(
            "pattern-source",
            frame_interval(self.fps),
            move || {
                let pixels: Arc<[u8]> = Self::render(width, height, sequence).into();
                callback(RawFrame::cpu(width, height, width * BYTES_PER_PIXEL, pixels, sequence));
                sequence += 1;
                LoopAction::Continue
            },
        ));
    }

    fn stop_capturing(&mut self) {
        if let Some(mut frame_loop) = self.frame_loop.take() {
            frame_loop.stop();
        }
    }

    fn is_capturing(&self) -> bool {
        self.frame_loop.as_ref().is_some_and(|c| c.is_running())
    }
}

/// Still image re-emitted at a fixed rate
pub struct ImageSource {
    width: u32,
    height: u32,
    bgra: Arc<[u8]>,
    fps: u32,
    frame_loop: Option<FrameLoop>,
}

impl ImageSource {
    /// Decode an image file (any format the `image` crate reads)
    pub fn open(path: &Path, fps: u32) -> PipelineResult<Self> {
        let decoded = image::open(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        debug!(path = %path.display(), width, height, "Decoded source image");
        Ok(Self::from_rgba(width, height, decoded.into_raw(), fps))
    }

    /// Wrap packed RGBA pixels
    pub fn from_rgba(width: u32, height: u32, mut rgba: Vec<u8>, fps: u32) -> Self {
        for pixel in rgba.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
        Self {
            width,
            height,
            bgra: rgba.into(),
            fps,
            frame_loop: None,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl FrameSource for ImageSource {
    fn start_capturing(&mut self, callback: FrameCallback) {
        self.stop_capturing();
        let (width, height) = (self.width, self.height);
        let pixels = Arc::clone(&self.bgra);
        let mut sequence = 0u64;
        info!(width, height, fps = self.fps, "Starting image source");

        self.frame_loop = Some(FrameLoop::start_paced(
            "image-source",
            frame_interval(self.fps),
            move || {
                callback(RawFrame::cpu(
                    width,
                    height,
                    width * BYTES_PER_PIXEL,
                    Arc::clone(&pixels),
                    sequence,
                ));
                sequence += 1;
                LoopAction::Continue
            },
        ));
    }

    fn stop_capturing(&mut self) {
        if let Some(mut frame_loop) = self.frame_loop.take() {
            frame_loop.stop();
        }
    }

    fn is_capturing(&self) -> bool {
        self.frame_loop.as_ref().is_some_and(|c| c.is_running())
    }
}

/// Built-in source selection as given on the command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    /// Synthetic test pattern
    Pattern,
    /// Still image file
    Image(PathBuf),
}

impl FromStr for SourceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err("empty source".to_string()),
            "pattern" => Ok(SourceSpec::Pattern),
            path => Ok(SourceSpec::Image(PathBuf::from(path))),
        }
    }
}

impl SourceSpec {
    /// Create the source and report the frame size it will emit
    pub fn open(&self, config: &Config) -> PipelineResult<(Box<dyn FrameSource>, (u32, u32))> {
        match self {
            SourceSpec::Pattern => {
                let size = (config.pattern_width, config.pattern_height);
                let source = PatternSource::new(size.0, size.1, config.source_fps);
                Ok((Box::new(source), size))
            }
            SourceSpec::Image(path) => {
                let source = ImageSource::open(path, config.source_fps)?;
                let size = source.dimensions();
                Ok((Box::new(source), size))
            }
        }
    }
}
