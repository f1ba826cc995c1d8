// SPDX-License-Identifier: GPL-3.0-only

//! Startup configuration
//!
//! Device selection and pipeline construction settings. Loaded once at startup;
//! filter state (selected filter, sliders) is not part of it and always starts
//! from defaults.

use crate::constants::{DEFAULT_REFRESH_INTERVAL, DEFAULT_SOURCE_FPS};
use crate::errors::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// GPU power preference, mirrored from wgpu so it can be serialized
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PowerPreference {
    /// Prefer the integrated GPU
    LowPower,
    /// Prefer the discrete GPU
    #[default]
    HighPerformance,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(value: PowerPreference) -> Self {
        match value {
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Graphics backends to consider when picking an adapter
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum BackendPreference {
    /// Let wgpu pick from every backend compiled in
    #[default]
    Auto,
    Vulkan,
    Metal,
    Dx12,
    Gl,
}

impl BackendPreference {
    pub fn backends(&self) -> wgpu::Backends {
        match self {
            BackendPreference::Auto => wgpu::Backends::all(),
            BackendPreference::Vulkan => wgpu::Backends::VULKAN,
            BackendPreference::Metal => wgpu::Backends::METAL,
            BackendPreference::Dx12 => wgpu::Backends::DX12,
            BackendPreference::Gl => wgpu::Backends::GL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Adapter power preference
    pub power_preference: PowerPreference,
    /// Backends considered during adapter selection
    pub backend: BackendPreference,
    /// Use the software fallback adapter (useful on headless CI)
    pub force_fallback_adapter: bool,
    /// Compute tile edge override; `None` derives it from device limits
    pub workgroup_size: Option<u32>,
    /// Treat any pipeline compilation failure as fatal
    ///
    /// When false only the plain blit program is required and other passes
    /// are disabled (input passes through unmodified) if they fail to build.
    pub strict_pipelines: bool,
    /// Grid subdivisions of the full-screen quad (1 = two triangles)
    pub mesh_subdivisions: u32,
    /// Capture rate of the built-in frame sources
    pub source_fps: u32,
    /// Resolution of the synthetic pattern source
    pub pattern_width: u32,
    pub pattern_height: u32,
    /// Preview refresh interval in milliseconds (one `tick` per refresh)
    pub refresh_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            power_preference: PowerPreference::default(),
            backend: BackendPreference::default(),
            force_fallback_adapter: false,
            workgroup_size: None,
            strict_pipelines: true,
            mesh_subdivisions: 1,
            source_fps: DEFAULT_SOURCE_FPS,
            pattern_width: 640,
            pattern_height: 480,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL.as_millis() as u64,
        }
    }
}

impl Config {
    /// Default location: `<config dir>/camera-filters/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("camera-filters").join("config.json"))
    }

    /// Load from a JSON file; fields missing from the file keep their defaults
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&contents)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config.sanitized())
    }

    /// Load from the default location, falling back to defaults if no file exists
    pub fn load_default() -> PipelineResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Clamp values that would make the pipeline unusable
    pub fn sanitized(mut self) -> Self {
        self.mesh_subdivisions = self.mesh_subdivisions.clamp(1, 256);
        self.source_fps = self.source_fps.clamp(1, 240);
        self.pattern_width = self.pattern_width.max(1);
        self.pattern_height = self.pattern_height.max(1);
        self.workgroup_size = self.workgroup_size.map(|size| size.clamp(1, 32));
        self.refresh_interval_ms = self.refresh_interval_ms.clamp(1, 1000);
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}
