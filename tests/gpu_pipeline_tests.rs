// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end pipeline tests on a real device
//!
//! Every test returns early when no adapter is available.

use camera_filters::backends::{
    AutoImport, Frame, PatternSource, RawFrame, TextureImport, UploadImport,
};
use camera_filters::config::Config;
use camera_filters::errors::FrameError;
use camera_filters::filters::{ColorFilter, PassGraph, PipelineAvailability, WarpMode};
use camera_filters::gpu::{self, GpuContext, wgpu};
use camera_filters::pipeline::{
    FilterPipeline, FrameOutcome, OFFSCREEN_FORMAT, OffscreenPresenter, PresentedImage,
    PreviewSession,
};
use camera_filters::shaders::RenderParams;
use camera_filters::shaders::reference::{self, Image};
use std::sync::Arc;

fn device() -> Option<GpuContext> {
    match pollster::block_on(gpu::create_device("pipeline_test", &Config::default())) {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            println!("Skipping test (no GPU): {}", e);
            None
        }
    }
}

fn to_bgra(rgba: &[u8]) -> Vec<u8> {
    let mut bgra = rgba.to_vec();
    for pixel in bgra.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
    bgra
}

fn gradient(width: u32, height: u32) -> Vec<u8> {
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            rgba.extend_from_slice(&[
                (x * 255 / (width - 1)) as u8,
                (y * 255 / (height - 1)) as u8,
                128,
                255,
            ]);
        }
    }
    rgba
}

struct Harness {
    gpu: GpuContext,
    pipeline: FilterPipeline,
    presenter: OffscreenPresenter,
    import: UploadImport,
}

impl Harness {
    fn new(gpu: &GpuContext, width: u32, height: u32) -> Self {
        let mut pipeline = FilterPipeline::new(gpu.clone(), OFFSCREEN_FORMAT, &Config::default())
            .expect("pipelines should compile");
        pipeline.on_resize(width, height);
        Self {
            gpu: gpu.clone(),
            pipeline,
            presenter: OffscreenPresenter::new(width, height),
            import: UploadImport::new(),
        }
    }

    fn render(&mut self, width: u32, height: u32, rgba: &[u8], sequence: u64) -> FrameOutcome {
        let raw = RawFrame::cpu(width, height, width * 4, to_bgra(rgba).into(), sequence);
        let frame = self.import.import(&self.gpu, &raw).expect("import");
        self.pipeline.render_frame(&frame, &mut self.presenter)
    }

    fn read(&mut self) -> PresentedImage {
        self.presenter.read_blocking(&self.gpu).expect("readback")
    }
}

#[test]
fn test_identity_passthrough() {
    let Some(gpu) = device() else { return };
    let (w, h) = (64, 48);
    let input = gradient(w, h);

    let mut harness = Harness::new(&gpu, w, h);
    let outcome = harness.render(w, h, &input, 7);
    assert!(outcome.is_presented(), "{:?}", outcome);

    let image = harness.read();
    assert_eq!((image.width, image.height, image.sequence), (w, h, 7));
    for (out, expected) in image.pixels.iter().zip(&input) {
        assert!(
            out.abs_diff(*expected) <= 1,
            "passthrough changed a channel: {} vs {}",
            out,
            expected
        );
    }
}

#[test]
fn test_sepia_matches_reference() {
    let Some(gpu) = device() else { return };
    let (w, h) = (32, 32);
    let input = gradient(w, h);

    let mut harness = Harness::new(&gpu, w, h);
    let controls = harness.pipeline.controls();
    controls.set_color_filter(ColorFilter::Sepia);
    controls.set_contrast(1.2);
    assert!(harness.render(w, h, &input, 1).is_presented());
    let output = harness.read();

    let config = controls.snapshot();
    let graph = PassGraph::build(&config, &PipelineAvailability::ALL);
    let params = RenderParams::from_config(&config, &graph.render);
    let expected = reference::render(
        &Image::from_rgba8(w, h, &input),
        w,
        h,
        graph.render.program,
        &params,
    );

    let actual = Image::from_rgba8(w, h, &output.pixels);
    assert!(actual.max_difference(&expected) < 0.02);
}

#[test]
fn test_edge_detection_lights_stripe_edges() {
    let Some(gpu) = device() else { return };
    let (w, h) = (64, 64);
    let mut input = vec![0u8; (w * h * 4) as usize];
    for y in 0..h {
        for x in 0..w {
            let i = ((y * w + x) * 4) as usize;
            let v = if (28..36).contains(&x) { 255 } else { 0 };
            input[i..i + 4].copy_from_slice(&[v, v, v, 255]);
        }
    }

    let mut harness = Harness::new(&gpu, w, h);
    harness
        .pipeline
        .controls()
        .set_color_filter(ColorFilter::EdgeDetection);
    match harness.render(w, h, &input, 3) {
        FrameOutcome::Presented { compute_passes, .. } => assert_eq!(compute_passes, 3),
        other => panic!("frame not presented: {:?}", other),
    }
    assert!(harness.pipeline.has_intermediates());
    let output = harness.read();

    let source = Image::from_rgba8(w, h, &input);
    let expected = reference::sobel(&reference::blur_vertical(&reference::blur_horizontal(&source)));
    let actual = Image::from_rgba8(w, h, &output.pixels);

    assert!(expected.get(28, 32)[0] > 0.3);
    assert!(expected.get(8, 32)[0] < 0.05);
    assert!(actual.max_difference(&expected) < 0.1);
    assert!(output.pixel(28, 32)[0] > 64);
    assert!(output.pixel(8, 32)[0] < 16);
}

#[test]
fn test_brightness_clamps_to_white() {
    let Some(gpu) = device() else { return };
    let (w, h) = (16, 16);
    let input = [128u8, 128, 128, 255].repeat((w * h) as usize);

    let mut harness = Harness::new(&gpu, w, h);
    harness.pipeline.controls().set_brightness(4.0);
    assert!(harness.render(w, h, &input, 0).is_presented());

    let image = harness.read();
    let [r, g, b, a] = image.mean_color();
    assert_eq!((r, g, b, a), (1.0, 1.0, 1.0, 1.0));
}

#[test]
fn test_resize_drops_intermediates() {
    let Some(gpu) = device() else { return };
    let (w, h) = (32, 24);
    let input = gradient(w, h);

    let mut harness = Harness::new(&gpu, w, h);
    harness
        .pipeline
        .controls()
        .set_color_filter(ColorFilter::GaussianBlur);
    assert!(harness.render(w, h, &input, 0).is_presented());
    assert!(harness.pipeline.has_intermediates());

    harness.pipeline.on_resize(16, 12);
    harness.presenter = OffscreenPresenter::new(16, 12);
    assert!(!harness.pipeline.has_intermediates());
    assert_eq!(harness.pipeline.output_size(), (16, 12));

    assert!(harness.render(w, h, &input, 1).is_presented());
    assert!(harness.pipeline.has_intermediates());
    let image = harness.read();
    assert_eq!((image.width, image.height), (16, 12));
}

#[test]
fn test_warp_modes_present() {
    let Some(gpu) = device() else { return };
    let (w, h) = (32, 32);
    let input = gradient(w, h);

    let mut harness = Harness::new(&gpu, w, h);
    for (i, warp) in WarpMode::ALL.into_iter().enumerate() {
        harness.pipeline.controls().set_warp_mode(warp);
        match harness.render(w, h, &input, i as u64) {
            FrameOutcome::Presented { warp: used, .. } => assert_eq!(used, warp),
            other => panic!("{} not presented: {:?}", warp, other),
        }
        let image = harness.read();
        assert_eq!(image.sequence, i as u64);
    }
}

#[test]
fn test_invalid_frames_are_skipped() {
    let Some(gpu) = device() else { return };

    let mut import = UploadImport::new();
    let empty = RawFrame::cpu(0, 0, 0, Vec::new().into(), 0);
    assert!(matches!(
        import.import(&gpu, &empty),
        Err(FrameError::InvalidFrame(_))
    ));

    let pipeline = FilterPipeline::new(gpu, OFFSCREEN_FORMAT, &Config::default())
        .expect("pipelines should compile");
    let source = Box::new(PatternSource::new(8, 8, 30));
    let mut session = PreviewSession::new(source, pipeline, OffscreenPresenter::new(8, 8));

    // Nothing pending: no work
    assert!(session.tick().is_none());

    session
        .mailbox()
        .post(RawFrame::cpu(8, 8, 4, vec![0u8; 16].into(), 1));
    assert!(matches!(
        session.tick(),
        Some(FrameOutcome::Skipped(FrameError::InvalidFrame(_)))
    ));

    session
        .mailbox()
        .post(RawFrame::cpu(8, 8, 32, vec![0u8; 256].into(), 2));
    assert!(matches!(session.tick(), Some(FrameOutcome::Presented { sequence: 2, .. })));

    let stats = session.stats();
    assert_eq!((stats.rendered, stats.skipped, stats.ticks), (1, 1, 3));
}

#[test]
fn test_uniform_blur_is_unchanged_on_partial_tiles() {
    let Some(gpu) = device() else { return };
    let (w, h) = (37, 23);
    let input = [90u8, 160, 30, 255].repeat((w * h) as usize);

    let mut harness = Harness::new(&gpu, w, h);
    harness
        .pipeline
        .controls()
        .set_color_filter(ColorFilter::GaussianBlur);
    assert!(harness.render(w, h, &input, 0).is_presented());

    let image = harness.read();
    for (out, expected) in image.pixels.iter().zip(&input) {
        assert!(out.abs_diff(*expected) <= 1, "{} vs {}", out, expected);
    }
}

#[test]
fn test_uniform_sobel_is_black_on_partial_tiles() {
    let Some(gpu) = device() else { return };
    let (w, h) = (37, 23);
    let input = [200u8, 200, 200, 255].repeat((w * h) as usize);

    let mut harness = Harness::new(&gpu, w, h);
    harness
        .pipeline
        .controls()
        .set_color_filter(ColorFilter::EdgeDetection);
    assert!(harness.render(w, h, &input, 0).is_presented());

    let image = harness.read();
    for y in 0..h {
        for x in 0..w {
            let [r, g, b, a] = image.pixel(x, y);
            assert!(r <= 1 && g <= 1 && b <= 1, "({x}, {y}) = {:?}", [r, g, b]);
            assert_eq!(a, 255, "({x}, {y}) is not opaque");
        }
    }
}

#[test]
fn test_oversize_frames_are_skipped() {
    let Some(gpu) = device() else { return };
    let max = gpu.device.limits().max_texture_dimension_2d;

    let pipeline = FilterPipeline::new(gpu.clone(), OFFSCREEN_FORMAT, &Config::default())
        .expect("pipelines should compile");
    let source = Box::new(PatternSource::new(8, 8, 30));
    let mut session = PreviewSession::new(source, pipeline, OffscreenPresenter::new(8, 8));

    let width = max + 1;
    session.mailbox().post(RawFrame::cpu(
        width,
        1,
        width * 4,
        vec![0u8; (width * 4) as usize].into(),
        0,
    ));
    assert!(matches!(
        session.tick(),
        Some(FrameOutcome::Skipped(FrameError::Allocation(_)))
    ));

    // Output target larger than the device allows
    let mut harness = Harness::new(&gpu, 8, 8);
    harness.presenter = OffscreenPresenter::new(1, max + 1);
    let input = gradient(8, 8);
    assert!(matches!(
        harness.render(8, 8, &input, 1),
        FrameOutcome::Skipped(FrameError::Allocation(_))
    ));
    assert_eq!(harness.presenter.presented(), 0);
}

fn layered_texture(gpu: &GpuContext) -> Arc<wgpu::Texture> {
    Arc::new(gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("layered_frame"),
        size: wgpu::Extent3d {
            width: 8,
            height: 8,
            depth_or_array_layers: 2,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    }))
}

#[test]
fn test_layered_gpu_frames_are_rejected() {
    let Some(gpu) = device() else { return };
    let raw = RawFrame::gpu(layered_texture(&gpu), 42);

    assert!(matches!(raw.validate(), Err(FrameError::InvalidFrame(_))));
    assert!(matches!(
        AutoImport::new().import(&gpu, &raw),
        Err(FrameError::InvalidFrame(_))
    ));
}

#[test]
fn test_skipped_frame_keeps_last_output() {
    let Some(gpu) = device() else { return };
    let (w, h) = (8, 8);
    let input = gradient(w, h);

    let mut harness = Harness::new(&gpu, w, h);
    assert!(harness.render(w, h, &input, 1).is_presented());
    let shown = harness.read();
    assert_eq!(shown.sequence, 1);

    // A frame whose view cannot bind as a 2D texture fails validation while encoding
    let texture = layered_texture(&gpu);
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bad = Frame {
        texture,
        view,
        width: w,
        height: h,
        sequence: 42,
    };
    assert!(matches!(
        harness.pipeline.render_frame(&bad, &mut harness.presenter),
        FrameOutcome::Skipped(FrameError::Encode(_))
    ));

    assert_eq!(harness.presenter.presented(), 1);
    assert!(harness.presenter.try_read(&gpu).is_none());
    assert!(harness.presenter.read_blocking(&gpu).is_err());

    // The next good frame still renders
    assert!(harness.render(w, h, &input, 2).is_presented());
    assert_eq!(harness.read().sequence, 2);
}
