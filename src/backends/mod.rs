// SPDX-License-Identifier: GPL-3.0-only

//! Frame producers and texture ingest
//!
//! - [`source`]: the frame source interface, built-in sources, and the mailbox
//! - [`frame_loop`]: producer thread lifecycle
//! - [`ingest`]: raw frame to sampleable texture

pub mod frame_loop;
pub mod ingest;
pub mod source;

pub use frame_loop::{FrameLoop, LoopAction};
pub use ingest::{AutoImport, Frame, FramePixels, RawFrame, TextureImport, UploadImport};
pub use source::{FrameCallback, FrameMailbox, FrameSource, ImageSource, PatternSource, SourceSpec};
