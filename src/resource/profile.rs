// src/resource/profile.rs

use std::collections::VecDeque;

/// Default number of samples kept per profile.
pub const DEFAULT_PROFILE_WINDOW: usize = 100;

/// Rolling memory statistics over a bounded window of samples.
///
/// Samples are kept oldest-first; once `window` samples are held the oldest
/// one is evicted. Peak, average and variance always describe the samples
/// currently in the window.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryProfile {
    window: usize,
    samples: VecDeque<f64>,
    peak_gb: f64,
    average_gb: f64,
    variance: f64,
}

impl Default for MemoryProfile {
    fn default() -> Self {
        Self::new(DEFAULT_PROFILE_WINDOW)
    }
}

impl MemoryProfile {
    /// `window` is clamped to at least 1.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
            peak_gb: 0.0,
            average_gb: 0.0,
            variance: 0.0,
        }
    }

    pub fn record(&mut self, sample_gb: f64) {
        if !sample_gb.is_finite() {
            return;
        }
        self.samples.push_back(sample_gb.max(0.0));
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        let n = self.samples.len() as f64;
        self.peak_gb = self.samples.iter().copied().fold(0.0, f64::max);
        self.average_gb = self.samples.iter().sum::<f64>() / n;
        self.variance = self
            .samples
            .iter()
            .map(|s| (s - self.average_gb).powi(2))
            .sum::<f64>()
            / n;
    }

    pub fn peak_gb(&self) -> f64 {
        self.peak_gb
    }

    pub fn average_gb(&self) -> f64 {
        self.average_gb
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}
