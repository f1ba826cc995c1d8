// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based filter preview
//!
//! Runs the full filter pipeline into an offscreen target sized to the
//! terminal and draws the read-back frames with Unicode half-block
//! characters. Keys drive the filter controls.

use crate::backends::SourceSpec;
use crate::config::Config;
use crate::filters::{ColorFilter, FilterControls, WarpMode};
use crate::gpu;
use crate::pipeline::{
    FilterPipeline, OFFSCREEN_FORMAT, OffscreenPresenter, PresentedImage, PreviewSession,
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use tracing::info;

const BRIGHTNESS_STEP: f32 = 0.1;
const CONTRAST_STEP: f32 = 0.1;
const VIGNETTE_STEP: f32 = 0.25;
const CENTER_STEP: f32 = 0.05;

/// What to preview
#[derive(Clone, Debug)]
pub struct TerminalOptions {
    pub config: Config,
    pub source: SourceSpec,
    pub filter: ColorFilter,
    pub warp: WarpMode,
}

/// Run the terminal preview until 'q' or Ctrl+C
pub fn run(options: TerminalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let gpu = pollster::block_on(gpu::create_device("terminal_preview", &options.config))?;
    let (source, frame_size) = options.source.open(&options.config)?;

    let pipeline = FilterPipeline::new(gpu, OFFSCREEN_FORMAT, &options.config)?;
    let controls = pipeline.controls();
    controls.set_color_filter(options.filter);
    controls.set_warp_mode(options.warp);

    let presenter = OffscreenPresenter::new(1, 1);
    let mut session = PreviewSession::new(source, pipeline, presenter);

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    session.start();
    let result = run_app(&mut terminal, &mut session, frame_size, &options.config);
    session.stop();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut PreviewSession<OffscreenPresenter>,
    frame_size: (u32, u32),
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let controls = session.controls();
    let mut widget = FrameWidget::default();
    let mut status_message = status_line(&controls);
    let mut display_size = (0, 0);

    loop {
        let area = terminal.size()?;
        let video_area = Rect::new(0, 0, area.width, area.height.saturating_sub(1));
        let size = fit_to_area(frame_size, video_area);
        if size != display_size {
            info!(width = size.0, height = size.1, "Resizing preview target");
            session.resize(size.0, size.1);
            display_size = size;
        }

        session.tick();
        let (presenter, gpu) = session.presenter_mut();
        if let Some(image) = presenter.try_read(gpu) {
            widget.image = Some(image);
        }

        terminal.draw(|f| {
            let area = f.area();
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(&widget, camera_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &status_message,
                },
                status_area,
            );
        })?;

        if event::poll(config.refresh_interval())?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break;
            }
            match handle_key(&controls, key.code) {
                KeyOutcome::Quit => break,
                KeyOutcome::Changed => status_message = status_line(&controls),
                KeyOutcome::Ignored => {}
            }
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Quit,
    Changed,
    Ignored,
}

fn handle_key(controls: &FilterControls, code: KeyCode) -> KeyOutcome {
    let config = controls.snapshot();
    let [cx, cy] = config.magnify_center;
    match code {
        KeyCode::Char('q') => return KeyOutcome::Quit,
        KeyCode::Char('f') => controls.set_color_filter(config.color_filter.next()),
        KeyCode::Char('F') => controls.set_color_filter(config.color_filter.previous()),
        KeyCode::Char('w') => controls.set_warp_mode(config.warp_mode.next()),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            controls.set_brightness(config.brightness + BRIGHTNESS_STEP)
        }
        KeyCode::Char('-') => controls.set_brightness(config.brightness - BRIGHTNESS_STEP),
        KeyCode::Char(']') => controls.set_contrast(config.contrast + CONTRAST_STEP),
        KeyCode::Char('[') => controls.set_contrast(config.contrast - CONTRAST_STEP),
        KeyCode::Char('v') => {
            let next = config.vignette_strength + VIGNETTE_STEP;
            controls.set_vignette_strength(if next > 1.0 + f32::EPSILON { 0.0 } else { next })
        }
        // Touch space: y grows downward
        KeyCode::Left => controls.set_magnify_center(cx - CENTER_STEP, cy),
        KeyCode::Right => controls.set_magnify_center(cx + CENTER_STEP, cy),
        KeyCode::Up => controls.set_magnify_center(cx, cy - CENTER_STEP),
        KeyCode::Down => controls.set_magnify_center(cx, cy + CENTER_STEP),
        KeyCode::Char('r') => controls.reset(),
        _ => return KeyOutcome::Ignored,
    }
    KeyOutcome::Changed
}

fn status_line(controls: &FilterControls) -> String {
    let config = controls.snapshot();
    format!(
        "{} | {} | b {:.1} c {:.1} v {:.2} | f/F filter  w warp  +/- [/] v  arrows  r reset  q quit",
        config.color_filter.display_name(),
        config.warp_mode.display_name(),
        config.brightness,
        config.contrast,
        config.vignette_strength,
    )
}

/// Offscreen target size (in pixels) that fits `frame` into `area` keeping aspect
///
/// Each terminal cell displays 2 vertical pixels.
fn fit_to_area(frame: (u32, u32), area: Rect) -> (u32, u32) {
    let frame_aspect = frame.0.max(1) as f64 / frame.1.max(1) as f64;
    let term_width = area.width.max(1) as f64;
    let term_height = (area.height.max(1) * 2) as f64;

    let (w, h) = if term_width / term_height > frame_aspect {
        (term_height * frame_aspect, term_height)
    } else {
        (term_width, term_width / frame_aspect)
    };
    // Even height so every cell gets both halves
    let h = ((h as u32) & !1).max(2);
    ((w as u32).max(1), h)
}

#[derive(Default)]
struct FrameWidget {
    image: Option<PresentedImage>,
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(image) = &self.image else {
            let msg = "Waiting for frames...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };

        let display_width = (image.width as u16).min(area.width);
        let display_height = ((image.height / 2) as u16).min(area.height);
        let x_offset = area.x + (area.width - display_width) / 2;
        let y_offset = area.y + (area.height - display_height) / 2;

        // Upper half (▀) colored with fg, lower half with bg
        for ty in 0..display_height {
            for tx in 0..display_width {
                let top = image.pixel(tx as u32, ty as u32 * 2);
                let bottom = image.pixel(tx as u32, ty as u32 * 2 + 1);
                if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(Color::Rgb(top[0], top[1], top[2]));
                    cell.set_bg(Color::Rgb(bottom[0], bottom[1], bottom[2]));
                }
            }
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_to_area_keeps_aspect() {
        // 4:3 into an 80x24 terminal (80x48 pixels): height bound
        assert_eq!(fit_to_area((640, 480), Rect::new(0, 0, 80, 24)), (64, 48));
        // Very wide terminal is still height bound
        let (w, h) = fit_to_area((640, 480), Rect::new(0, 0, 200, 10));
        assert_eq!(h, 20);
        assert!(w <= 200);
        // Narrow terminal is width bound
        let (w, h) = fit_to_area((640, 480), Rect::new(0, 0, 40, 100));
        assert_eq!(w, 40);
        assert_eq!(h, 30);
    }

    #[test]
    fn test_fit_to_area_never_zero() {
        let (w, h) = fit_to_area((640, 480), Rect::new(0, 0, 0, 0));
        assert!(w >= 1 && h >= 2);
    }

    #[test]
    fn test_keys_cycle_filter_and_warp() {
        let controls = FilterControls::new();
        assert_eq!(handle_key(&controls, KeyCode::Char('f')), KeyOutcome::Changed);
        assert_eq!(controls.snapshot().color_filter, ColorFilter::Grayscale);
        handle_key(&controls, KeyCode::Char('F'));
        handle_key(&controls, KeyCode::Char('F'));
        assert_eq!(controls.snapshot().color_filter, ColorFilter::EdgeDetection);

        handle_key(&controls, KeyCode::Char('w'));
        assert_eq!(controls.snapshot().warp_mode, WarpMode::SineWave);
    }

    #[test]
    fn test_keys_adjust_sliders() {
        let controls = FilterControls::new();
        handle_key(&controls, KeyCode::Char('+'));
        assert!((controls.snapshot().brightness - 1.1).abs() < 1e-6);
        handle_key(&controls, KeyCode::Char('['));
        assert!((controls.snapshot().contrast - 0.9).abs() < 1e-6);

        for _ in 0..4 {
            handle_key(&controls, KeyCode::Char('v'));
        }
        assert_eq!(controls.snapshot().vignette_strength, 1.0);
        handle_key(&controls, KeyCode::Char('v'));
        assert_eq!(controls.snapshot().vignette_strength, 0.0);
    }

    #[test]
    fn test_arrows_move_center_in_touch_space() {
        let controls = FilterControls::new();
        handle_key(&controls, KeyCode::Up);
        let [x, y] = controls.snapshot().magnify_center;
        assert_eq!(x, 0.5);
        assert!((y - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_reset_and_quit() {
        let controls = FilterControls::new();
        handle_key(&controls, KeyCode::Char('f'));
        handle_key(&controls, KeyCode::Char('r'));
        assert_eq!(controls.snapshot().color_filter, ColorFilter::None);
        assert_eq!(handle_key(&controls, KeyCode::Char('q')), KeyOutcome::Quit);
        assert_eq!(handle_key(&controls, KeyCode::Char('z')), KeyOutcome::Ignored);
    }
}
