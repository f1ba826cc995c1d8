// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - `info`: report the adapter and compute tile size
//! - `run`: filter frames headlessly into an offscreen target

use camera_filters::backends::SourceSpec;
use camera_filters::config::Config;
use camera_filters::filters::{ColorFilter, WarpMode};
use camera_filters::gpu;
use camera_filters::pipeline::{FilterPipeline, FrameOutcome, OFFSCREEN_FORMAT, OffscreenPresenter, PreviewSession};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub struct RunOptions {
    pub source: SourceSpec,
    pub filter: ColorFilter,
    pub warp: WarpMode,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub seconds: u64,
}

/// Print the adapter the pipeline would run on
pub fn show_info(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let gpu = pollster::block_on(gpu::create_device("info", config))?;
    let info = &gpu.info;

    println!("Adapter:        {}", info.adapter_name);
    println!("Backend:        {:?}", info.backend);
    println!("Device type:    {:?}", info.device_type);
    println!("Compute tile:   {}x{}", info.workgroup_size, info.workgroup_size);

    let pipeline = FilterPipeline::new(gpu, OFFSCREEN_FORMAT, config)?;
    let availability = pipeline.availability();
    println!();
    println!("Passes:");
    println!("  blur (horizontal)  {}", available(availability.blur_horizontal));
    println!("  blur (vertical)    {}", available(availability.blur_vertical));
    println!("  sobel              {}", available(availability.sobel));
    println!("  composite          {}", available(availability.composite));

    Ok(())
}

fn available(ok: bool) -> &'static str {
    if ok { "ok" } else { "unavailable" }
}

/// Filter frames headlessly until the time runs out or Ctrl+C
pub fn run_headless(config: &Config, options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let gpu = pollster::block_on(gpu::create_device("headless", config))?;
    println!("Using adapter: {} ({:?})", gpu.info.adapter_name, gpu.info.backend);

    let (source, (source_width, source_height)) = options.source.open(config)?;
    let width = options.width.unwrap_or(source_width);
    let height = options.height.unwrap_or(source_height);
    println!(
        "Source {}x{} -> output {}x{}, filter: {}, warp: {}",
        source_width,
        source_height,
        width,
        height,
        options.filter.display_name(),
        options.warp.display_name()
    );

    let pipeline = FilterPipeline::new(gpu, OFFSCREEN_FORMAT, config)?;
    let controls = pipeline.controls();
    controls.set_color_filter(options.filter);
    controls.set_warp_mode(options.warp);

    let mut session = PreviewSession::new(source, pipeline, OffscreenPresenter::new(width, height));

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!("Running... Press Ctrl+C to stop");
    session.start();

    let target_duration = Duration::from_secs(options.seconds);
    let interval = config.refresh_interval();
    let start = Instant::now();
    let mut last_error = None;
    let mut last_image = None;

    while start.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!("\nStopping...");
            break;
        }

        if let Some(FrameOutcome::Skipped(e)) = session.tick() {
            last_error = Some(e.to_string());
        }
        let (presenter, gpu) = session.presenter_mut();
        if let Some(image) = presenter.try_read(gpu) {
            last_image = Some(image);
        }

        let stats = session.stats();
        print!(
            "\rFrames: {} rendered, {} skipped, {} dropped ({:.1} fps)",
            stats.rendered,
            stats.skipped,
            stats.dropped,
            stats.fps()
        );
        std::io::stdout().flush()?;

        std::thread::sleep(interval);
    }
    println!();

    session.stop();

    // Wait for the newest readback still in flight
    let (presenter, gpu) = session.presenter_mut();
    if let Ok(image) = presenter.read_blocking(gpu) {
        last_image = Some(image);
    }

    let stats = session.stats();
    println!(
        "Done: {} frames in {:.1}s ({:.1} fps), {} skipped, {} dropped",
        stats.rendered,
        stats.elapsed.as_secs_f64(),
        stats.fps(),
        stats.skipped,
        stats.dropped
    );
    if let Some(error) = last_error {
        println!("Last skipped frame: {}", error);
    }
    match last_image {
        Some(image) => {
            let [r, g, b, a] = image.mean_color();
            println!(
                "Last frame #{}: mean color r={:.3} g={:.3} b={:.3} a={:.3}",
                image.sequence, r, g, b, a
            );
        }
        None => println!("No frame was read back"),
    }

    Ok(())
}
