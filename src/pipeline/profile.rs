//! Processing-time measurement.

use crate::defaults;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Keeps the last few start/stop pairs and reports how busy the pipeline was.
#[derive(Debug, Clone)]
pub struct Profiler {
    history: VecDeque<(Instant, Instant)>,
    capacity: usize,
    started: Option<Instant>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::with_capacity(defaults::PROFILE_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            started: None,
        }
    }

    /// Mark the start of a measured section.
    pub fn tic(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Mark the end of the section started by the last [`Profiler::tic`].
    /// Ignored without a matching `tic`.
    pub fn toc(&mut self) {
        let Some(started) = self.started.take() else {
            return;
        };
        self.record(started, Instant::now());
    }

    /// Measure the duration of `f`.
    pub fn measure<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.tic();
        let result = f();
        self.toc();
        result
    }

    fn record(&mut self, started: Instant, stopped: Instant) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back((started, stopped));
    }

    /// Duration of the most recent section.
    pub fn elapsed(&self) -> Option<Duration> {
        self.history
            .back()
            .map(|(started, stopped)| stopped.duration_since(*started))
    }

    /// Share of wall-clock time spent inside measured sections, over the
    /// retained history.
    ///
    /// `None` until the history spans a measurable interval.
    pub fn elapsed_ratio(&self) -> Option<f64> {
        let (first_start, _) = self.history.front()?;
        let (_, last_stop) = self.history.back()?;
        let span = last_stop.duration_since(*first_start).as_secs_f64();
        if span <= 0.0 {
            return None;
        }

        let busy: f64 = self
            .history
            .iter()
            .map(|(started, stopped)| stopped.duration_since(*started).as_secs_f64())
            .sum();
        Some(busy / span)
    }

    pub fn samples(&self) -> usize {
        self.history.len()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.started = None;
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

/// One line comparing processing time against audio duration.
pub fn realtime_report(audio: Duration, elapsed: Duration) -> String {
    let audio_ms = audio.as_secs_f64() * 1000.0;
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    let percent = if audio_ms > 0.0 {
        elapsed_ms / audio_ms * 100.0
    } else {
        0.0
    };
    format!(
        "processed {:.0} ms of audio in {:.2} ms ({:.2} percent)",
        audio_ms, elapsed_ms, percent
    )
}

/// Duration of `samples` at `sample_rate`.
pub fn audio_duration(samples: usize, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(samples as f64 / sample_rate.max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_profiler_reports_nothing() {
        let profiler = Profiler::new();
        assert!(profiler.elapsed().is_none());
        assert!(profiler.elapsed_ratio().is_none());
    }

    #[test]
    fn test_toc_without_tic_is_ignored() {
        let mut profiler = Profiler::new();
        profiler.toc();
        assert_eq!(profiler.samples(), 0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut profiler = Profiler::with_capacity(3);
        for _ in 0..10 {
            profiler.measure(|| ());
        }
        assert_eq!(profiler.samples(), 3);
    }

    #[test]
    fn test_elapsed_ratio_from_recorded_pairs() {
        let mut profiler = Profiler::with_capacity(4);
        let base = Instant::now();
        let at = |ms: u64| base + Duration::from_millis(ms);

        profiler.record(at(0), at(10));
        profiler.record(at(50), at(60));
        profiler.record(at(90), at(100));

        let ratio = profiler.elapsed_ratio().unwrap();
        assert!((ratio - 0.3).abs() < 1e-9);
        assert_eq!(profiler.elapsed(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_measure_returns_value() {
        let mut profiler = Profiler::new();
        assert_eq!(profiler.measure(|| 42), 42);
        assert_eq!(profiler.samples(), 1);
        profiler.reset();
        assert_eq!(profiler.samples(), 0);
    }

    #[test]
    fn test_realtime_report_format() {
        let line = realtime_report(Duration::from_secs(2), Duration::from_millis(20));
        assert_eq!(
            line,
            "processed 2000 ms of audio in 20.00 ms (1.00 percent)"
        );
    }

    #[test]
    fn test_audio_duration() {
        assert_eq!(audio_duration(16000, 16000), Duration::from_secs(1));
        assert_eq!(audio_duration(8000, 16000), Duration::from_millis(500));
    }
}
