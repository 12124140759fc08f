//! Progress reporting for the pipeline phases.
//!
//! - [`ProgressCallback`]: hooks called by the pipeline stages
//! - [`Progress`]: terminal progress bars using indicatif
//! - [`ProgressThrottle`]: time-based gate for progress log lines, so a
//!   multi-million-line pass logs once per interval rather than per line

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Phase names passed to [`ProgressCallback`].
pub mod phase {
    /// Walking scan roots into the path list
    pub const WALK: &str = "walk";
    /// Size classification
    pub const CLASSIFY: &str = "classify";
    /// Bounded-concurrency hashing
    pub const HASH: &str = "hash";
    /// Seek-based extraction
    pub const EXTRACT: &str = "extract";
    /// External merge sort
    pub const SORT: &str = "sort";
}

/// Progress callback for duplicate finding phases.
///
/// Implement this trait to receive progress updates during
/// the duplicate detection pipeline. Calls may arrive from worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts. `total` is 0 when unknown.
    fn on_phase_start(&self, phase: &str, total: u64);

    /// Called with the number of items processed so far.
    fn on_progress(&self, phase: &str, current: u64);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);
}

/// Progress reporter using indicatif.
///
/// Keeps one bar per phase; a phase with an unknown total gets a spinner.
pub struct Progress {
    multi: MultiProgress,
    bars: Mutex<Vec<(String, ProgressBar)>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter. With `quiet` nothing is drawn.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(Vec::new()),
            quiet,
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} items")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn with_bar(&self, phase: &str, f: impl FnOnce(&ProgressBar)) {
        let bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, pb)) = bars.iter().find(|(name, _)| name == phase) {
            f(pb);
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: u64) {
        if self.quiet {
            return;
        }

        let pb = if total == 0 {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(Self::spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let pb = self.multi.add(ProgressBar::new(total));
            pb.set_style(Self::bar_style());
            pb
        };
        pb.set_message(phase.to_string());

        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((phase.to_string(), pb));
    }

    fn on_progress(&self, phase: &str, current: u64) {
        if self.quiet {
            return;
        }
        self.with_bar(phase, |pb| pb.set_position(current));
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(idx) = bars.iter().position(|(name, _)| name == phase) {
            let (name, pb) = bars.remove(idx);
            pb.finish_with_message(format!("{name} complete"));
        }
    }
}

/// Lets at most one caller through per interval.
///
/// Lock-free: callers race on a compare-exchange of the last report time,
/// so it is safe to call from every worker thread.
#[derive(Debug)]
pub struct ProgressThrottle {
    start: Instant,
    interval_ms: u64,
    last_ms: AtomicU64,
}

impl ProgressThrottle {
    /// Create a throttle with the given interval.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            start: Instant::now(),
            interval_ms: interval.as_millis() as u64,
            last_ms: AtomicU64::new(0),
        }
    }

    /// Whether the caller should report now.
    #[must_use]
    pub fn ready(&self) -> bool {
        let now = self.start.elapsed().as_millis() as u64;
        let last = self.last_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.interval_ms {
            return false;
        }
        self.last_ms
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }
}

/// Percentage of `done` over `total`, 100 when `total` is 0.
#[must_use]
pub fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        done as f64 * 100.0 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_blocks_within_interval() {
        let throttle = ProgressThrottle::new(Duration::from_secs(3600));
        assert!(!throttle.ready());
        assert!(!throttle.ready());
    }

    #[test]
    fn test_throttle_zero_interval_always_ready() {
        let throttle = ProgressThrottle::new(Duration::ZERO);
        assert!(throttle.ready());
        std::thread::sleep(Duration::from_millis(2));
        assert!(throttle.ready());
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 100.0);
        assert_eq!(percent(1, 4), 25.0);
        assert_eq!(percent(4, 4), 100.0);
    }

    #[test]
    fn test_quiet_progress_is_noop() {
        let progress = Progress::new(true);
        progress.on_phase_start(phase::HASH, 10);
        progress.on_progress(phase::HASH, 5);
        progress.on_phase_end(phase::HASH);
        assert!(progress.bars.lock().unwrap().is_empty());
    }

    #[test]
    fn test_phase_bars_are_tracked() {
        let progress = Progress::new(false);
        progress.on_phase_start(phase::SORT, 3);
        assert_eq!(progress.bars.lock().unwrap().len(), 1);
        progress.on_progress(phase::SORT, 2);
        progress.on_phase_end(phase::SORT);
        assert!(progress.bars.lock().unwrap().is_empty());
    }
}
