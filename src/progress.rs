use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kdam::{Bar, BarExt};

use super::ProgressMonitor;


/// Draws a terminal progress bar while records are processed, and stops as soon as the
/// shared cancel flag is raised.
pub struct LogProgress {
    label: String,
    bar: Option<Bar>,
    done: usize,
    cancel: Arc<AtomicBool>,
}

impl LogProgress {
    pub fn new(label: &str) -> LogProgress {
        LogProgress::with_cancel_flag(label, Arc::new(AtomicBool::new(false)))
    }

    pub fn with_cancel_flag(label: &str, cancel: Arc<AtomicBool>) -> LogProgress {
        LogProgress {
            label: String::from(label),
            bar: None,
            done: 0,
            cancel,
        }
    }

    /// A handle that can be used, from any thread, to request the work to stop.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn done(&self) -> usize {
        self.done
    }
}

impl ProgressMonitor for LogProgress {
    fn start(&mut self, total: usize) {
        self.done = 0;
        log::info!("{}: {} records to process", self.label, total);
        self.bar = match Bar::builder().total(total).desc(self.label.clone()).build() {
            Ok(bar) => Some(bar),
            Err(err) => {
                // the work goes on without a bar
                log::warn!("error building progress bar: {}", err);
                None
            }
        };
    }

    fn tick(&mut self) -> bool {
        if self.cancel.load(Ordering::Relaxed) {
            log::info!("{}: cancelled after {} records", self.label, self.done);
            return false;
        }
        self.done += 1;
        if let Some(bar) = self.bar.as_mut() {
            let _ = bar.update(1);
        }
        true
    }

    fn stop(&mut self) {
        if self.bar.take().is_some() {
            eprintln!();
        }
        log::debug!("{}: processed {} records", self.label, self.done);
    }
}

/// A progress monitor that ignores progress and never cancels.
pub struct NoProgress;

impl ProgressMonitor for NoProgress {
    fn start(&mut self, _total: usize) {}

    fn tick(&mut self) -> bool {
        true
    }

    fn stop(&mut self) {}
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_progress_counts_and_cancels() {
        let mut progress = LogProgress::new("test");
        progress.start(3);
        assert!(progress.tick());
        assert!(progress.tick());
        assert_eq!(progress.done(), 2);

        progress.cancel_flag().store(true, Ordering::Relaxed);
        assert!(!progress.tick());
        assert_eq!(progress.done(), 2);
        progress.stop();
    }

    #[test]
    fn test_more_ticks_than_announced() {
        let mut progress = LogProgress::new("test");
        progress.start(1);
        for _ in 0..5 {
            assert!(progress.tick());
        }
        assert_eq!(progress.done(), 5);
        progress.stop();
    }

    #[test]
    fn test_restart_resets_count() {
        let mut progress = LogProgress::new("test");
        progress.start(2);
        assert!(progress.tick());
        progress.stop();
        // stopping twice is harmless
        progress.stop();

        progress.start(4);
        assert_eq!(progress.done(), 0);
        assert!(progress.tick());
        assert_eq!(progress.done(), 1);
        progress.stop();
    }
}
