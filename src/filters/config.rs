// SPDX-License-Identifier: GPL-3.0-only

//! Filter configuration state
//!
//! The UI collaborator mutates the configuration one field at a time through
//! [`FilterControls`]; the render thread copies the whole record once per frame
//! with [`FilterControls::snapshot`]. Both sides share a `tokio::sync::watch`
//! channel, so a snapshot never observes a half-written update.

use crate::constants::*;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tokio::sync::watch;
use tracing::debug;

/// Discrete color filter selector
///
/// Indices are stable; they are forwarded to the fragment stage as an integer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ColorFilter {
    /// No filter applied
    #[default]
    None,
    /// Luma broadcast to all channels
    Grayscale,
    /// Inverted colors
    Invert,
    /// Warm brownish tint
    Sepia,
    /// Brightness slider applied as the selected filter
    Brightness,
    /// Contrast slider applied as the selected filter
    Contrast,
    /// Reinhard tone mapping
    ToneMapping,
    /// RGB channel split
    ChromaticAberration,
    /// Animated film grain
    FilmGrain,
    /// Vignette slider applied as the selected filter
    Vignette,
    /// Separable Gaussian blur (compute passes)
    GaussianBlur,
    /// Blur followed by Sobel gradient magnitude (compute passes)
    EdgeDetection,
}

impl ColorFilter {
    pub const ALL: [ColorFilter; 12] = [
        ColorFilter::None,
        ColorFilter::Grayscale,
        ColorFilter::Invert,
        ColorFilter::Sepia,
        ColorFilter::Brightness,
        ColorFilter::Contrast,
        ColorFilter::ToneMapping,
        ColorFilter::ChromaticAberration,
        ColorFilter::FilmGrain,
        ColorFilter::Vignette,
        ColorFilter::GaussianBlur,
        ColorFilter::EdgeDetection,
    ];

    /// Stable integer index of this filter
    pub fn index(&self) -> u32 {
        match self {
            ColorFilter::None => 0,
            ColorFilter::Grayscale => 1,
            ColorFilter::Invert => 2,
            ColorFilter::Sepia => 3,
            ColorFilter::Brightness => 4,
            ColorFilter::Contrast => 5,
            ColorFilter::ToneMapping => 6,
            ColorFilter::ChromaticAberration => 7,
            ColorFilter::FilmGrain => 8,
            ColorFilter::Vignette => 9,
            ColorFilter::GaussianBlur => 10,
            ColorFilter::EdgeDetection => 11,
        }
    }

    /// Map an integer index to a filter; unknown indices select no filter
    pub fn from_index(index: i64) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|filter| filter.index() as i64 == index)
            .unwrap_or_default()
    }

    /// Index forwarded to the fragment stage
    ///
    /// Compute-only filters are finished before the render pass, so the
    /// fragment stage sees them as "no filter".
    pub fn fragment_index(&self) -> u32 {
        if self.requires_compute() {
            ColorFilter::None.index()
        } else {
            self.index()
        }
    }

    /// Whether this filter runs compute pre-passes
    pub fn requires_compute(&self) -> bool {
        matches!(self, ColorFilter::GaussianBlur | ColorFilter::EdgeDetection)
    }

    /// Kebab-case name used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            ColorFilter::None => "none",
            ColorFilter::Grayscale => "grayscale",
            ColorFilter::Invert => "invert",
            ColorFilter::Sepia => "sepia",
            ColorFilter::Brightness => "brightness",
            ColorFilter::Contrast => "contrast",
            ColorFilter::ToneMapping => "tone-mapping",
            ColorFilter::ChromaticAberration => "chromatic-aberration",
            ColorFilter::FilmGrain => "film-grain",
            ColorFilter::Vignette => "vignette",
            ColorFilter::GaussianBlur => "gaussian-blur",
            ColorFilter::EdgeDetection => "edge-detection",
        }
    }

    /// Get display name for the filter
    pub fn display_name(&self) -> &'static str {
        match self {
            ColorFilter::None => "Original",
            ColorFilter::Grayscale => "Grayscale",
            ColorFilter::Invert => "Invert",
            ColorFilter::Sepia => "Sepia",
            ColorFilter::Brightness => "Brightness",
            ColorFilter::Contrast => "Contrast",
            ColorFilter::ToneMapping => "Tone Mapping",
            ColorFilter::ChromaticAberration => "Chromatic Aberration",
            ColorFilter::FilmGrain => "Film Grain",
            ColorFilter::Vignette => "Vignette",
            ColorFilter::GaussianBlur => "Gaussian Blur",
            ColorFilter::EdgeDetection => "Edge Detection",
        }
    }

    /// Next filter in [`ColorFilter::ALL`] order, wrapping around
    pub fn next(&self) -> Self {
        Self::ALL[(self.index() as usize + 1) % Self::ALL.len()]
    }

    /// Previous filter in [`ColorFilter::ALL`] order, wrapping around
    pub fn previous(&self) -> Self {
        let len = Self::ALL.len();
        Self::ALL[(self.index() as usize + len - 1) % len]
    }
}

impl fmt::Display for ColorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|filter| filter.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown filter '{}'", s))
    }
}

/// Display mode axis: geometric warps and the color-effects composition
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum WarpMode {
    /// Plain full-screen quad
    #[default]
    None,
    /// Vertical sine displacement animated over time
    SineWave,
    /// Radial magnification around a configurable center
    Magnify,
    /// Chromatic aberration, tone mapping, grain and vignette in one pass
    ColorEffects,
}

impl WarpMode {
    pub const ALL: [WarpMode; 4] = [
        WarpMode::None,
        WarpMode::SineWave,
        WarpMode::Magnify,
        WarpMode::ColorEffects,
    ];

    /// Integer forwarded to the vertex and fragment stages
    pub fn index(&self) -> u32 {
        match self {
            WarpMode::None => 0,
            WarpMode::SineWave => 1,
            WarpMode::Magnify => 2,
            WarpMode::ColorEffects => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WarpMode::None => "none",
            WarpMode::SineWave => "sine-wave",
            WarpMode::Magnify => "magnify",
            WarpMode::ColorEffects => "color-effects",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WarpMode::None => "No Warp",
            WarpMode::SineWave => "Sine Wave",
            WarpMode::Magnify => "Magnify",
            WarpMode::ColorEffects => "Color Effects",
        }
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() as usize + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for WarpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WarpMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown warp mode '{}'", s))
    }
}

/// Complete filter configuration as seen by one frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterConfig {
    pub color_filter: ColorFilter,
    pub warp_mode: WarpMode,
    pub brightness: f32,
    pub contrast: f32,
    pub vignette_strength: f32,
    /// Magnify center in touch space (origin top-left, y down)
    pub magnify_center: [f32; 2],
    pub magnify_radius: f32,
    pub magnify_strength: f32,
    /// Seconds since the controls were created
    pub time: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            color_filter: ColorFilter::None,
            warp_mode: WarpMode::None,
            brightness: DEFAULT_BRIGHTNESS,
            contrast: DEFAULT_CONTRAST,
            vignette_strength: DEFAULT_VIGNETTE,
            magnify_center: DEFAULT_MAGNIFY_CENTER,
            magnify_radius: DEFAULT_MAGNIFY_RADIUS,
            magnify_strength: DEFAULT_MAGNIFY_STRENGTH,
            time: 0.0,
        }
    }
}

/// Clamp into an inclusive range; NaN falls back to `default`
fn clamp_param(value: f32, (min, max): (f32, f32), default: f32) -> f32 {
    if value.is_nan() {
        default
    } else {
        value.clamp(min, max)
    }
}

/// Shared handle for mutating and snapshotting the filter configuration
///
/// Cloning is cheap; every clone talks to the same state.
#[derive(Clone, Debug)]
pub struct FilterControls {
    sender: watch::Sender<FilterConfig>,
    started: Instant,
}

impl Default for FilterControls {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterControls {
    pub fn new() -> Self {
        Self::with_config(FilterConfig::default())
    }

    /// Start from a specific configuration (values are clamped)
    pub fn with_config(config: FilterConfig) -> Self {
        let (sender, _) = watch::channel(FilterConfig::default());
        let controls = Self {
            sender,
            started: Instant::now(),
        };
        controls.set_color_filter(config.color_filter);
        controls.set_warp_mode(config.warp_mode);
        controls.set_brightness(config.brightness);
        controls.set_contrast(config.contrast);
        controls.set_vignette_strength(config.vignette_strength);
        controls.set_magnify_center(config.magnify_center[0], config.magnify_center[1]);
        controls.set_magnify_radius(config.magnify_radius);
        controls.set_magnify_strength(config.magnify_strength);
        controls
    }

    /// Copy the whole configuration, stamped with the current time
    pub fn snapshot(&self) -> FilterConfig {
        self.snapshot_at(self.started.elapsed().as_secs_f32())
    }

    /// Copy the whole configuration with an explicit time value
    pub fn snapshot_at(&self, time: f32) -> FilterConfig {
        let mut config = *self.sender.borrow();
        config.time = time;
        config
    }

    /// Receiver notified on every setter call
    pub fn subscribe(&self) -> watch::Receiver<FilterConfig> {
        self.sender.subscribe()
    }

    pub fn set_color_filter(&self, filter: ColorFilter) {
        debug!(filter = %filter, "Color filter selected");
        self.sender.send_modify(|c| c.color_filter = filter);
    }

    /// Select by integer index; unknown indices select no filter
    pub fn set_color_filter_index(&self, index: i64) {
        self.set_color_filter(ColorFilter::from_index(index));
    }

    pub fn set_warp_mode(&self, mode: WarpMode) {
        debug!(mode = %mode, "Warp mode selected");
        self.sender.send_modify(|c| c.warp_mode = mode);
    }

    pub fn set_brightness(&self, value: f32) {
        let value = clamp_param(value, BRIGHTNESS_RANGE, DEFAULT_BRIGHTNESS);
        self.sender.send_modify(|c| c.brightness = value);
    }

    pub fn set_contrast(&self, value: f32) {
        let value = clamp_param(value, CONTRAST_RANGE, DEFAULT_CONTRAST);
        self.sender.send_modify(|c| c.contrast = value);
    }

    pub fn set_vignette_strength(&self, value: f32) {
        let value = clamp_param(value, VIGNETTE_RANGE, DEFAULT_VIGNETTE);
        self.sender.send_modify(|c| c.vignette_strength = value);
    }

    /// Center in touch space: (0, 0) top-left, (1, 1) bottom-right
    pub fn set_magnify_center(&self, x: f32, y: f32) {
        let x = clamp_param(x, MAGNIFY_CENTER_RANGE, DEFAULT_MAGNIFY_CENTER[0]);
        let y = clamp_param(y, MAGNIFY_CENTER_RANGE, DEFAULT_MAGNIFY_CENTER[1]);
        self.sender.send_modify(|c| c.magnify_center = [x, y]);
    }

    pub fn set_magnify_radius(&self, value: f32) {
        let value = clamp_param(value, MAGNIFY_RADIUS_RANGE, DEFAULT_MAGNIFY_RADIUS);
        self.sender.send_modify(|c| c.magnify_radius = value);
    }

    pub fn set_magnify_strength(&self, value: f32) {
        let value = clamp_param(value, MAGNIFY_STRENGTH_RANGE, DEFAULT_MAGNIFY_STRENGTH);
        self.sender.send_modify(|c| c.magnify_strength = value);
    }

    /// Restore every field to its default
    pub fn reset(&self) {
        self.sender.send_replace(FilterConfig::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_stable_and_unique() {
        for (position, filter) in ColorFilter::ALL.iter().enumerate() {
            assert_eq!(filter.index() as usize, position);
            assert_eq!(ColorFilter::from_index(position as i64), *filter);
        }
    }

    #[test]
    fn test_unknown_index_is_passthrough() {
        assert_eq!(ColorFilter::from_index(-1), ColorFilter::None);
        assert_eq!(ColorFilter::from_index(12), ColorFilter::None);
        assert_eq!(ColorFilter::from_index(i64::MAX), ColorFilter::None);
    }

    #[test]
    fn test_compute_filters_forward_no_fragment_filter() {
        assert_eq!(ColorFilter::GaussianBlur.fragment_index(), 0);
        assert_eq!(ColorFilter::EdgeDetection.fragment_index(), 0);
        assert_eq!(ColorFilter::Sepia.fragment_index(), 3);
    }

    #[test]
    fn test_names_round_trip_through_from_str() {
        for filter in ColorFilter::ALL {
            assert_eq!(filter.name().parse::<ColorFilter>().unwrap(), filter);
        }
        for mode in WarpMode::ALL {
            assert_eq!(mode.name().parse::<WarpMode>().unwrap(), mode);
        }
        assert!("sparkle".parse::<ColorFilter>().is_err());
    }

    #[test]
    fn test_cycling_wraps() {
        assert_eq!(ColorFilter::EdgeDetection.next(), ColorFilter::None);
        assert_eq!(ColorFilter::None.previous(), ColorFilter::EdgeDetection);
        assert_eq!(WarpMode::ColorEffects.next(), WarpMode::None);
    }

    #[test]
    fn test_setters_clamp_out_of_range() {
        let controls = FilterControls::new();
        controls.set_brightness(100.0);
        controls.set_contrast(-5.0);
        controls.set_vignette_strength(2.0);
        controls.set_magnify_center(-1.0, 3.0);
        controls.set_magnify_radius(0.0);
        controls.set_magnify_strength(-0.5);

        let config = controls.snapshot_at(0.0);
        assert_eq!(config.brightness, BRIGHTNESS_RANGE.1);
        assert_eq!(config.contrast, CONTRAST_RANGE.0);
        assert_eq!(config.vignette_strength, 1.0);
        assert_eq!(config.magnify_center, [0.0, 1.0]);
        assert_eq!(config.magnify_radius, MAGNIFY_RADIUS_RANGE.0);
        assert_eq!(config.magnify_strength, 0.0);
    }

    #[test]
    fn test_setters_accept_full_range() {
        let controls = FilterControls::new();
        controls.set_brightness(3.0);
        controls.set_contrast(0.1);
        assert_eq!(controls.snapshot_at(0.0).brightness, 3.0);
        assert_eq!(controls.snapshot_at(0.0).contrast, 0.1);
    }

    #[test]
    fn test_nan_resets_to_default() {
        let controls = FilterControls::new();
        controls.set_brightness(2.0);
        controls.set_brightness(f32::NAN);
        assert_eq!(controls.snapshot_at(0.0).brightness, DEFAULT_BRIGHTNESS);
    }

    #[test]
    fn test_clones_share_state() {
        let ui = FilterControls::new();
        let render = ui.clone();
        ui.set_color_filter_index(3);
        ui.set_warp_mode(WarpMode::Magnify);
        let snapshot = render.snapshot_at(1.5);
        assert_eq!(snapshot.color_filter, ColorFilter::Sepia);
        assert_eq!(snapshot.warp_mode, WarpMode::Magnify);
        assert_eq!(snapshot.time, 1.5);
    }

    #[test]
    fn test_snapshot_time_is_monotonic() {
        let controls = FilterControls::new();
        let first = controls.snapshot().time;
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = controls.snapshot().time;
        assert!(second >= first);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let controls = FilterControls::new();
        controls.set_color_filter(ColorFilter::Invert);
        controls.set_vignette_strength(0.7);
        controls.reset();
        assert_eq!(controls.snapshot_at(0.0), FilterConfig::default());
    }

    #[test]
    fn test_subscribe_sees_updates() {
        let controls = FilterControls::new();
        let mut receiver = controls.subscribe();
        controls.set_contrast(2.0);
        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow_and_update().contrast, 2.0);
    }

    #[test]
    fn test_with_config_clamps() {
        let controls = FilterControls::with_config(FilterConfig {
            brightness: 50.0,
            color_filter: ColorFilter::EdgeDetection,
            ..Default::default()
        });
        let config = controls.snapshot_at(0.0);
        assert_eq!(config.brightness, BRIGHTNESS_RANGE.1);
        assert_eq!(config.color_filter, ColorFilter::EdgeDetection);
    }

    #[test]
    fn test_concurrent_setters_never_tear() {
        let controls = FilterControls::new();
        let writer = controls.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..1000 {
                let v = if i % 2 == 0 { 0.5 } else { 2.0 };
                writer.set_brightness(v);
                writer.set_contrast(v);
            }
        });
        for _ in 0..1000 {
            let snapshot = controls.snapshot_at(0.0);
            assert!([DEFAULT_BRIGHTNESS, 0.5, 2.0].contains(&snapshot.brightness));
            assert!([DEFAULT_CONTRAST, 0.5, 2.0].contains(&snapshot.contrast));
        }
        handle.join().unwrap();
    }
}
