// SPDX-License-Identifier: GPL-3.0-only

//! Live preview loop wiring
//!
//! Source thread -> mailbox -> import -> pipeline -> presenter. The display
//! side calls [`PreviewSession::tick`] once per refresh; a tick with no new
//! frame does nothing, so the presenter keeps showing the last output.

use super::{FilterPipeline, FrameOutcome, FramePresenter};
use crate::backends::{AutoImport, FrameMailbox, FrameSource, TextureImport};
use crate::filters::FilterControls;
use crate::gpu::GpuContext;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Counters since the session started
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SessionStats {
    pub ticks: u64,
    pub rendered: u64,
    pub skipped: u64,
    /// Frames overwritten in the mailbox before a tick picked them up
    pub dropped: u64,
    pub elapsed: Duration,
}

impl SessionStats {
    /// Rendered frames per second over the session
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.rendered as f64 / secs
        } else {
            0.0
        }
    }
}

pub struct PreviewSession<P: FramePresenter> {
    source: Box<dyn FrameSource>,
    mailbox: FrameMailbox,
    import: Box<dyn TextureImport>,
    pipeline: FilterPipeline,
    presenter: P,
    stats: SessionStats,
    started: Instant,
}

impl<P: FramePresenter> PreviewSession<P> {
    pub fn new(source: Box<dyn FrameSource>, pipeline: FilterPipeline, presenter: P) -> Self {
        Self::with_import(source, Box::new(AutoImport::new()), pipeline, presenter)
    }

    pub fn with_import(
        source: Box<dyn FrameSource>,
        import: Box<dyn TextureImport>,
        mut pipeline: FilterPipeline,
        presenter: P,
    ) -> Self {
        let (width, height) = presenter.size();
        pipeline.on_resize(width, height);
        Self {
            source,
            mailbox: FrameMailbox::new(),
            import,
            pipeline,
            presenter,
            stats: SessionStats::default(),
            started: Instant::now(),
        }
    }

    /// Start the source; frames land in the session's mailbox
    pub fn start(&mut self) {
        info!("Starting preview session");
        self.started = Instant::now();
        self.source.start_capturing(self.mailbox.callback());
    }

    pub fn stop(&mut self) {
        self.source.stop_capturing();
        let stats = self.stats();
        info!(
            rendered = stats.rendered,
            skipped = stats.skipped,
            dropped = stats.dropped,
            fps = stats.fps(),
            "Preview session stopped"
        );
    }

    pub fn is_running(&self) -> bool {
        self.source.is_capturing()
    }

    /// Render the pending frame, if any
    pub fn tick(&mut self) -> Option<FrameOutcome> {
        self.stats.ticks += 1;
        let raw = self.mailbox.take()?;

        let outcome = match self.import.import(self.pipeline.gpu(), &raw) {
            Ok(frame) => self.pipeline.render_frame(&frame, &mut self.presenter),
            Err(e) => {
                debug!(sequence = raw.sequence, error = %e, "Frame import failed");
                FrameOutcome::Skipped(e)
            }
        };

        match &outcome {
            FrameOutcome::Presented { .. } => self.stats.rendered += 1,
            FrameOutcome::Skipped(_) => self.stats.skipped += 1,
        }
        Some(outcome)
    }

    /// Resize the presenter and the pipeline together
    pub fn resize(&mut self, width: u32, height: u32) {
        self.presenter.resize(width, height);
        self.pipeline.on_resize(width, height);
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            dropped: self.mailbox.dropped(),
            elapsed: self.started.elapsed(),
            ..self.stats
        }
    }

    pub fn controls(&self) -> FilterControls {
        self.pipeline.controls()
    }

    pub fn mailbox(&self) -> &FrameMailbox {
        &self.mailbox
    }

    pub fn pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Presenter plus the GPU context it was driven with (for readback)
    pub fn presenter_mut(&mut self) -> (&mut P, &GpuContext) {
        (&mut self.presenter, self.pipeline.gpu())
    }
}

impl<P: FramePresenter> Drop for PreviewSession<P> {
    fn drop(&mut self) {
        self.source.stop_capturing();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_of_empty_session() {
        assert_eq!(SessionStats::default().fps(), 0.0);
    }

    #[test]
    fn test_fps() {
        let stats = SessionStats {
            rendered: 60,
            elapsed: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(stats.fps(), 30.0);
    }
}
