// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Sliding-window accumulators for rolling statistics.
//!
//! Each window keeps the (hour, value) pairs inside `(t - w, t]` in a ring
//! buffer sized to the window. Updates are O(1) amortized. Aggregates are
//! evaluated over the buffered values oldest first, so they depend only on
//! what the window holds and not on where accumulation started.

use ringbuffer::{AllocRingBuffer, RingBuffer};
use std::collections::BTreeMap;

const SECS_PER_HOUR: i64 = 3600;

/// Trailing window over hour-keyed values
#[derive(Debug)]
pub struct RollingWindow {
    hours: u32,
    entries: AllocRingBuffer<(i64, f64)>,
}

impl RollingWindow {
    /// Window covering `hours` hourly slots. Zero-hour windows are widened to one.
    #[must_use]
    pub fn new(hours: u32) -> Self {
        let hours = hours.max(1);
        Self {
            hours,
            entries: AllocRingBuffer::new(hours as usize),
        }
    }

    #[must_use]
    pub fn hours(&self) -> u32 {
        self.hours
    }

    /// Advance the window to hour `key` (unix seconds) and add `value` if present.
    ///
    /// Keys must be non-decreasing and unique per hour.
    pub fn advance(&mut self, key: i64, value: Option<f64>) {
        let horizon = key - i64::from(self.hours) * SECS_PER_HOUR;
        while let Some(&(oldest, _)) = self.entries.front()
            && oldest <= horizon
        {
            let _ = self.entries.dequeue();
        }

        // A full buffer overwrites its oldest entry on enqueue
        if let Some(value) = value.filter(|v| v.is_finite()) {
            let _ = self.entries.enqueue((key, value));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Values in the window, oldest first
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|(_, value)| *value)
    }

    /// Mean of values in the window, `None` when empty
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<f64> {
        let n = self.entries.len();
        (n > 0).then(|| self.values().sum::<f64>() / n as f64)
    }

    /// Sample standard deviation, `None` with fewer than two points
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn sample_std(&self) -> Option<f64> {
        let n = self.entries.len();
        if n < 2 {
            return None;
        }
        let mean = self.mean()?;
        let squared_deviations: f64 = self.values().map(|v| (v - mean) * (v - mean)).sum();
        Some((squared_deviations / (n - 1) as f64).sqrt())
    }
}

/// Series tracked by the feature engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Series {
    Price,
    Demand,
}

/// Arena of rolling windows keyed by series and window length
#[derive(Debug, Default)]
pub struct WindowArena {
    windows: BTreeMap<(Series, u32), RollingWindow>,
}

impl WindowArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a window; registering the same key twice is a no-op
    #[must_use]
    pub fn with_window(mut self, series: Series, hours: u32) -> Self {
        self.windows
            .entry((series, hours))
            .or_insert_with(|| RollingWindow::new(hours));
        self
    }

    /// Feed one hourly value into every window of `series`
    pub fn advance(&mut self, series: Series, key: i64, value: Option<f64>) {
        for (_, window) in self.windows.range_mut((series, 0)..=(series, u32::MAX)) {
            window.advance(key, value);
        }
    }

    #[must_use]
    pub fn window(&self, series: Series, hours: u32) -> Option<&RollingWindow> {
        self.windows.get(&(series, hours))
    }

    #[must_use]
    pub fn mean(&self, series: Series, hours: u32) -> Option<f64> {
        self.window(series, hours)?.mean()
    }

    #[must_use]
    pub fn sample_std(&self, series: Series, hours: u32) -> Option<f64> {
        self.window(series, hours)?.sample_std()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hour(n: i64) -> i64 {
        n * SECS_PER_HOUR
    }

    #[test]
    fn evicts_values_outside_trailing_window() {
        let mut window = RollingWindow::new(3);
        for (h, v) in [(0, 10.0), (1, 20.0), (2, 30.0), (3, 40.0)] {
            window.advance(hour(h), Some(v));
        }
        // (0, 3] keeps hours 1, 2, 3
        assert_eq!(window.len(), 3);
        assert!((window.mean().unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn gaps_shrink_the_window() {
        let mut window = RollingWindow::new(6);
        window.advance(hour(0), Some(10.0));
        window.advance(hour(1), Some(20.0));
        window.advance(hour(7), Some(50.0));
        assert_eq!(window.len(), 1);
        assert!((window.mean().unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(window.sample_std(), None);
    }

    #[test]
    fn sample_std_matches_direct_formula() {
        let mut window = RollingWindow::new(24);
        let values = [20.0, 35.0, 80.0, 55.0, 41.0];
        for (h, v) in values.iter().enumerate() {
            window.advance(hour(h as i64), Some(*v));
        }
        let mean = values.iter().sum::<f64>() / 5.0;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
        assert!((window.sample_std().unwrap() - var.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn missing_values_still_advance_time() {
        let mut window = RollingWindow::new(2);
        window.advance(hour(0), Some(5.0));
        window.advance(hour(1), None);
        window.advance(hour(2), None);
        assert!(window.is_empty());
        assert_eq!(window.mean(), None);
    }

    #[test]
    fn aggregates_depend_only_on_window_contents() {
        let spiky = |h: i64| if h % 17 == 0 { 999.123_456_7 } else { 31.7 + (h % 5) as f64 * 0.1 };

        // One window has seen a long prefix, the other starts at the window edge
        let mut long_run = RollingWindow::new(168);
        for h in 0..600 {
            long_run.advance(hour(h), Some(spiky(h)));
        }
        let mut short_run = RollingWindow::new(168);
        for h in 432..600 {
            short_run.advance(hour(h), Some(spiky(h)));
        }

        assert_eq!(long_run.len(), short_run.len());
        assert_eq!(
            long_run.mean().map(f64::to_bits),
            short_run.mean().map(f64::to_bits)
        );
        assert_eq!(
            long_run.sample_std().map(f64::to_bits),
            short_run.sample_std().map(f64::to_bits)
        );
    }

    #[test]
    fn arena_updates_all_windows_of_a_series() {
        let mut arena = WindowArena::new()
            .with_window(Series::Price, 3)
            .with_window(Series::Price, 24)
            .with_window(Series::Demand, 24);

        for h in 0..5 {
            arena.advance(Series::Price, hour(h), Some(h as f64));
        }
        assert!((arena.mean(Series::Price, 3).unwrap() - 3.0).abs() < 1e-9);
        assert!((arena.mean(Series::Price, 24).unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(arena.mean(Series::Demand, 24), None);
        assert_eq!(arena.mean(Series::Price, 6), None);
    }
}
