// SPDX-License-Identifier: GPL-3.0-only

//! Producer threads for frame sources
//!
//! Every built-in source emits frames from its own thread. A [`FrameLoop`] owns
//! that thread and stops it on request or on drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Returned by each loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Handle to a producer thread
///
/// ```ignore
/// let frame_loop = FrameLoop::start_paced("pattern", interval, move || {
///     mailbox.post(next_frame());
///     LoopAction::Continue
/// });
/// ```
pub struct FrameLoop {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl FrameLoop {
    /// Run `loop_fn` back to back until it returns [`LoopAction::Stop`] or
    /// [`Self::stop`] is called
    pub fn start<F>(name: &str, loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::spawn(name, None, loop_fn)
    }

    /// Run `loop_fn` once per `interval`
    ///
    /// Iterations that overrun the interval start the next one immediately;
    /// missed ticks are not made up.
    pub fn start_paced<F>(name: &str, interval: Duration, loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::spawn(name, Some(interval), loop_fn)
    }

    fn spawn<F>(name: &str, interval: Option<Duration>, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, interval_ms = ?interval.map(|i| i.as_millis()), "Starting frame loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %thread_name, "Frame loop thread started");
            let mut deadline = Instant::now();

            while !stop.load(Ordering::SeqCst) {
                if loop_fn() == LoopAction::Stop {
                    debug!(name = %thread_name, "Loop requested stop");
                    break;
                }

                if let Some(interval) = interval {
                    deadline += interval;
                    let now = Instant::now();
                    if deadline > now {
                        sleep_until(deadline, &stop);
                    } else {
                        deadline = now;
                    }
                }
            }

            debug!(name = %thread_name, "Frame loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Frame loop stop requested");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Signal the loop to stop and wait for the thread
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish on its own
    pub fn join(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        match handle.join() {
            Ok(()) => debug!(name = %self.name, "Frame loop joined"),
            Err(e) => warn!(name = %self.name, "Frame loop thread panicked: {:?}", e),
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}

// Sleep in short slices so a stop request is noticed within a few milliseconds
fn sleep_until(deadline: Instant, stop: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(5);
    loop {
        let now = Instant::now();
        if now >= deadline || stop.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep((deadline - now).min(SLICE));
    }
}
