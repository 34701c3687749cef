//! Common modulation traits and utilities

use packetmodem_core::bitstream::BitBuffer;
use serde::{Deserialize, Serialize};

/// Generic modulator trait
pub trait Modulator {
    /// Consume every committed bit of `bits` and append PCM samples to `output`
    fn modulate(&mut self, bits: &mut BitBuffer, output: &mut Vec<i16>) -> crate::Result<()>;

    /// Get samples per symbol
    fn samples_per_symbol(&self) -> usize;

    /// Get symbol rate
    fn symbol_rate(&self) -> f64;

    /// Reset modulator state
    fn reset(&mut self);
}

/// Generic demodulator trait
pub trait Demodulator {
    /// Demodulate a complete PCM buffer, appending recovered bits to `output`
    fn demodulate(&mut self, samples: &[i16], output: &mut BitBuffer) -> crate::Result<()>;

    /// Whether the symbol clock locked onto transitions in the last buffer
    fn is_synchronized(&self) -> bool;

    /// Get signal quality metrics
    fn signal_quality(&self) -> SignalQuality;

    /// Reset demodulator state
    fn reset(&mut self);
}

/// Signal quality metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalQuality {
    pub snr_db: f64,
    pub rms: f64,
    pub clock_syncs: u32,
    pub timing_error_mean: f64,
    pub timing_error_variance: f64,
}

/// Mean power of a sample block
pub fn mean_power(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64
}

/// Convert signed 16-bit PCM to floating point in [-1.0, 1.0]
pub fn normalize(samples: &[i16]) -> Vec<f64> {
    samples
        .iter()
        .map(|&s| s as f64 / packetmodem_core::MAX_SAMPLE_VALUE as f64)
        .collect()
}
