// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the filter pipeline
//!
//! Errors are split by when they can happen:
//! - [`PipelineError`]: setup failures. Fatal, surfaced to the embedding application.
//! - [`FrameError`]: per-frame failures. Recovered by skipping the frame.
//!
//! Out-of-range configuration values are never errors; setters clamp them.

use thiserror::Error;

/// Result type alias for setup operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type alias for per-frame operations
pub type FrameResult<T> = Result<T, FrameError>;

/// Setup failure (adapter, device, shader compilation, configuration)
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// No adapter matched the requested options
    #[error("No suitable GPU adapter found: {0}")]
    NoAdapter(String),
    /// The adapter refused to create a device
    #[error("Failed to create GPU device: {0}")]
    DeviceRequest(String),
    /// A device limit or format capability the pipeline depends on is missing
    #[error("Missing device capability: {0}")]
    MissingCapability(String),
    /// A shader module or pipeline object failed validation
    #[error("Failed to compile pipeline '{label}': {message}")]
    Compilation { label: String, message: String },
    /// Startup configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Per-frame failure; the frame is skipped and the previous output stays on screen
#[derive(Debug, Clone, Error)]
pub enum FrameError {
    /// Frame dimensions or pixel buffer are unusable
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
    /// A texture or buffer allocation failed (typically out of memory)
    #[error("GPU allocation failed: {0}")]
    Allocation(String),
    /// The display surface did not hand out a drawable
    #[error("Failed to acquire output surface: {0}")]
    Surface(String),
    /// Recording or submitting the frame's commands failed validation
    #[error("Failed to encode frame: {0}")]
    Encode(String),
    /// Reading presented pixels back to the CPU failed
    #[error("Readback failed: {0}")]
    Readback(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_error_message() {
        let err = PipelineError::Compilation {
            label: "blur_horizontal".to_string(),
            message: "bad binding".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to compile pipeline 'blur_horizontal': bad binding"
        );
    }

    #[test]
    fn test_io_error_maps_to_config() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
