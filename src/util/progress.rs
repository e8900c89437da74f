use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Background spinner showing how many modules a build has discovered.
///
/// The reporter only reads the shared counter. [`ProgressReporter::finish`]
/// stops it and waits until the final count has been drawn.
pub struct ProgressReporter {
    stop: Sender<()>,
    handle: Option<JoinHandle<usize>>,
}

impl ProgressReporter {
    pub fn start(counter: Arc<AtomicUsize>, interval: Duration, visible: bool) -> Self {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let spinner = if visible {
                ProgressBar::new_spinner()
            } else {
                ProgressBar::hidden()
            };
            if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
                spinner.set_style(style.tick_strings(&["-", "\\", "|", "/", "-"]));
            }

            loop {
                draw(&spinner, counter.load(Ordering::Relaxed));
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => spinner.tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            let total = counter.load(Ordering::Relaxed);
            spinner.finish_with_message(message(total));
            total
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stops the reporter and returns the last count it drew.
    pub fn finish(mut self) -> usize {
        self.shutdown()
    }

    fn shutdown(&mut self) -> usize {
        let _ = self.stop.send(());
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(total)) => total,
            Some(Err(_)) => {
                warn!("progress reporter thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

fn draw(spinner: &ProgressBar, count: usize) {
    spinner.set_message(message(count));
}

fn message(count: usize) -> String {
    format!("Fetching dependencies ({count} modules)")
}
