use std::time::{Duration, Instant};

/// Accumulating wall-clock stopwatch with labelled splits.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    started: Option<Instant>,
    elapsed: Duration,
    splits: Vec<(String, Duration)>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing. Does nothing if already running.
    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    /// Stop timing and add the running interval to the elapsed total.
    pub fn stop(&mut self) {
        if let Some(start) = self.started.take() {
            self.elapsed += start.elapsed();
        }
    }

    pub fn reset(&mut self) {
        self.started = None;
        self.elapsed = Duration::ZERO;
        self.splits.clear();
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Total time timed so far, including a running interval.
    pub fn elapsed(&self) -> Duration {
        self.elapsed + self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    pub fn seconds(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    pub fn record_split(&mut self, message: impl Into<String>) {
        let split = self.elapsed();
        self.splits.push((message.into(), split));
    }

    pub fn splits(&self) -> &[(String, Duration)] {
        &self.splits
    }

    pub fn clear_splits(&mut self) {
        self.splits.clear();
    }

    /// Histories per second over the timed interval.
    pub fn rate(&self, histories: usize) -> f64 {
        let secs = self.seconds();
        if secs > 0.0 {
            histories as f64 / secs
        } else {
            0.0
        }
    }

    /// Log every split at info level.
    pub fn print_splits(&self) {
        for (message, time) in &self.splits {
            log::info!("{:<40} {:>12.6} s", message, time.as_secs_f64());
        }
    }
}
