//! Symbol clock recovery for the AFSK demodulator
//!
//! The recovered clock counts samples modulo one symbol period and reads the
//! baseband decision each time it wraps. Every baseband transition yields a
//! timing error: how far the transition sits from the middle of the count.
//! Errors feed an exponential moving average; when that average shows the
//! decision point drifting onto transitions, the counter jumps forward.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Weight of the newest timing error in the skew average
const SKEW_ALPHA: f64 = 0.5;

/// Skew average that arms a clock adjustment
const SKEW_ADJUST_THRESHOLD: f64 = 7.0;

/// Skew average above which the counter actually jumps
const SKEW_JUMP_THRESHOLD: f64 = 15.0;

/// Samples the counter jumps forward by
const CLOCK_JUMP: usize = 15;

/// Samples that must pass between two adjustments
const MIN_SAMPLES_BETWEEN_ADJUSTMENTS: usize = 10;

/// Running statistics of the recovered clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClockStatistics {
    pub timing_error_mean: f64,
    pub timing_error_variance: f64,
    pub mean_samples_between_boundaries: f64,
    pub boundaries: u32,
    pub clock_syncs: u32,
}

/// One-sample-at-a-time symbol clock state machine
#[derive(Debug, Clone)]
pub struct ClockRecovery {
    samples_per_symbol: usize,
    sample_clock: usize,
    previous: Option<bool>,
    skew_accumulator: f64,
    samples_since_adjustment: usize,
    samples_since_boundary: usize,
    boundary_sample_sum: u64,
    error_sum: f64,
    error_sum_of_squares: f64,
    stats: ClockStatistics,
}

impl ClockRecovery {
    pub fn new(samples_per_symbol: usize) -> Self {
        Self {
            samples_per_symbol: samples_per_symbol.max(2),
            sample_clock: 0,
            previous: None,
            skew_accumulator: 0.0,
            samples_since_adjustment: 0,
            samples_since_boundary: 0,
            boundary_sample_sum: 0,
            error_sum: 0.0,
            error_sum_of_squares: 0.0,
            stats: ClockStatistics::default(),
        }
    }

    /// Feed one baseband decision; returns a bit when the clock reaches a
    /// decision point
    ///
    /// A jump that carries the counter past the decision point emits that
    /// symbol immediately, so a resynchronisation never drops a bit.
    pub fn advance(&mut self, baseband: bool) -> Option<u8> {
        let bit = baseband as u8;
        let mut decided = None;

        self.sample_clock += 1;
        self.samples_since_adjustment += 1;
        if self.sample_clock >= self.samples_per_symbol {
            decided = Some(bit);
            self.sample_clock = 0;
        }

        self.samples_since_boundary += 1;
        if self.previous.is_some_and(|previous| previous != baseband) {
            self.record_boundary();
        }
        self.previous = Some(baseband);

        if self.skew_accumulator > SKEW_ADJUST_THRESHOLD
            && self.samples_since_adjustment > MIN_SAMPLES_BETWEEN_ADJUSTMENTS
        {
            self.samples_since_adjustment = 0;
            if self.skew_accumulator > SKEW_JUMP_THRESHOLD {
                self.sample_clock += CLOCK_JUMP;
                self.skew_accumulator = 0.0;
                self.stats.clock_syncs += 1;
                trace!(clock = self.sample_clock, "clock resync");

                if self.sample_clock >= self.samples_per_symbol {
                    self.sample_clock -= self.samples_per_symbol;
                    decided = decided.or(Some(bit));
                }
            }
        }

        decided
    }

    fn record_boundary(&mut self) {
        let half = (self.samples_per_symbol / 2) as i64;
        let error = ((self.sample_clock % self.samples_per_symbol) as i64 - half).unsigned_abs() as f64;

        self.stats.boundaries += 1;
        self.boundary_sample_sum += self.samples_since_boundary as u64;
        self.samples_since_boundary = 0;

        let count = self.stats.boundaries as f64;
        self.error_sum += error;
        self.error_sum_of_squares += error * error;
        self.stats.mean_samples_between_boundaries = self.boundary_sample_sum as f64 / count;
        self.stats.timing_error_mean = self.error_sum / count;
        self.stats.timing_error_variance =
            self.error_sum_of_squares / count - self.stats.timing_error_mean.powi(2);

        self.skew_accumulator = SKEW_ALPHA * error + (1.0 - SKEW_ALPHA) * self.skew_accumulator;
    }

    pub fn statistics(&self) -> ClockStatistics {
        self.stats
    }

    pub fn skew_accumulator(&self) -> f64 {
        self.skew_accumulator
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.samples_per_symbol);
    }
}
