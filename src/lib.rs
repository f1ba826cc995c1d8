// SPDX-License-Identifier: GPL-3.0-only

//! Camera Filters - real-time GPU filtering for live camera frames
//!
//! Frames arrive from a capture source, are uploaded (or wrapped) as GPU
//! textures, run through an optional compute pre-pass (Gaussian blur, Sobel
//! edges), and are drawn with a color filter chain and an optional vertex
//! warp into the display target.
//!
//! # Architecture
//!
//! - [`filters`]: filter configuration, thread-safe controls, pass graph
//! - [`shaders`]: WGSL sources and the compute/render engines built from them
//! - [`backends`]: frame sources, the frame mailbox, texture ingest
//! - [`pipeline`]: per-frame orchestration, presenters, the preview session
//! - [`gpu`]: device creation and error-scope helpers
//! - [`config`]: startup configuration
//!
//! # Example
//!
//! ```ignore
//! let gpu = pollster::block_on(gpu::create_device("preview", &config))?;
//! let pipeline = FilterPipeline::new(gpu, OFFSCREEN_FORMAT, &config)?;
//! let mut session = PreviewSession::new(Box::new(source), pipeline, presenter);
//! session.start();
//! loop {
//!     session.tick();
//! }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod filters;
pub mod gpu;
pub mod pipeline;
pub mod shaders;
pub mod terminal;

// Re-export commonly used types
pub use backends::{Frame, FrameSource, RawFrame};
pub use config::Config;
pub use errors::{FrameError, PipelineError};
pub use filters::{ColorFilter, FilterConfig, FilterControls, WarpMode};
pub use gpu::GpuContext;
pub use pipeline::{FilterPipeline, FrameOutcome, FramePresenter, OffscreenPresenter, PreviewSession};
