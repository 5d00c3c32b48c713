// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

/// Time since the last received frame, compared against a timeout.
///
/// Starts "infinitely stale": nothing is drawable until a frame arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreshnessTracker {
    elapsed: f64,
    timeout: f64,
}

impl FreshnessTracker {
    pub fn new(timeout_secs: f64) -> Self {
        Self {
            elapsed: f64::INFINITY,
            timeout: timeout_secs,
        }
    }

    pub fn from_timeout_ms(timeout_ms: u32) -> Self {
        Self::new(f64::from(timeout_ms) * 1e-3)
    }

    #[inline]
    pub fn on_tick(&mut self, delta_secs: f64) {
        self.elapsed += delta_secs;
    }

    #[inline]
    pub fn on_frame_received(&mut self) {
        self.elapsed = 0.0;
    }

    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.elapsed < self.timeout
    }

    /// Forget the last frame.
    pub fn reset(&mut self) {
        self.elapsed = f64::INFINITY;
    }

    pub fn set_timeout_secs(&mut self, timeout_secs: f64) {
        self.timeout = timeout_secs;
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.set_timeout_secs(f64::from(timeout_ms) * 1e-3);
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn timeout(&self) -> f64 {
        self.timeout
    }
}
