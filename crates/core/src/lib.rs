//! packetmodem core - bit buffers and band-pass filtering
//!
//! This crate provides the ordered bit buffer shared by every layer of the
//! stack and the Butterworth band-pass filter used by the AFSK demodulator.

pub mod bitstream;
pub mod filter;
pub mod error;

pub use error::{CoreError, Result};

/// Audio sample rate of every buffer handed to or produced by the stack
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Largest magnitude of a signed 16-bit PCM sample
pub const MAX_SAMPLE_VALUE: i16 = i16::MAX;

/// Convert a sample in [-1.0, 1.0] to signed 16-bit PCM, saturating
pub fn to_pcm(sample: f64) -> i16 {
    (sample * MAX_SAMPLE_VALUE as f64).clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        bitstream::BitBuffer,
        filter::{BandpassCoefficients, BandpassFilter, Filter},
        error::{CoreError, Result},
        AUDIO_SAMPLE_RATE, MAX_SAMPLE_VALUE,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pcm_saturates() {
        assert_eq!(to_pcm(0.0), 0);
        assert_eq!(to_pcm(1.0), i16::MAX);
        assert_eq!(to_pcm(-2.0), i16::MIN);
        assert_eq!(to_pcm(0.5), 16383);
    }
}
