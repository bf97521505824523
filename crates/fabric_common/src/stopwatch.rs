//! Wall-clock stopwatch for stage runtime reporting.

use std::time::{Duration, Instant};

/// A simple start/stop wall-clock timer.
///
/// Each pipeline stage owns its stopwatch; there is no global timer. The
/// elapsed time of the last start/stop pair is available in seconds for
/// the statistics printer.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    started: Option<Instant>,
    elapsed: Duration,
}

impl Stopwatch {
    /// Creates a stopped stopwatch with zero elapsed time.
    pub fn new() -> Self {
        Self {
            started: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Creates a stopwatch that is already running.
    pub fn started() -> Self {
        Self {
            started: Some(Instant::now()),
            elapsed: Duration::ZERO,
        }
    }

    /// Starts (or restarts) the timer, discarding any previous measurement.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.elapsed = Duration::ZERO;
    }

    /// Stops the timer. Calling `stop` on a stopped watch is a no-op.
    pub fn stop(&mut self) {
        if let Some(begin) = self.started.take() {
            self.elapsed = begin.elapsed();
        }
    }

    /// Returns the measured duration of the last start/stop pair, or the
    /// running time so far if the watch is still running.
    pub fn elapsed(&self) -> Duration {
        match self.started {
            Some(begin) => begin.elapsed(),
            None => self.elapsed,
        }
    }

    /// Returns the elapsed time in seconds.
    pub fn seconds(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_watch_is_zero() {
        let watch = Stopwatch::new();
        assert_eq!(watch.elapsed(), Duration::ZERO);
        assert_eq!(watch.seconds(), 0.0);
    }

    #[test]
    fn start_stop_measures() {
        let mut watch = Stopwatch::new();
        watch.start();
        std::thread::sleep(Duration::from_millis(5));
        watch.stop();
        assert!(watch.seconds() > 0.0);
    }

    #[test]
    fn stop_without_start_is_noop() {
        let mut watch = Stopwatch::new();
        watch.stop();
        assert_eq!(watch.elapsed(), Duration::ZERO);
    }

    #[test]
    fn running_watch_reports_progress() {
        let watch = Stopwatch::started();
        std::thread::sleep(Duration::from_millis(1));
        assert!(watch.elapsed() > Duration::ZERO);
    }

    #[test]
    fn restart_discards_previous() {
        let mut watch = Stopwatch::new();
        watch.start();
        std::thread::sleep(Duration::from_millis(2));
        watch.stop();
        let first = watch.elapsed();
        watch.start();
        watch.stop();
        assert!(watch.elapsed() <= first);
    }
}
