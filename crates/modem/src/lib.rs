//! packetmodem modem - audio modulation and demodulation
//!
//! This crate provides the Bell 202 AFSK modulator and demodulator with
//! symbol clock recovery, and the PSK31-style BPSK/QPSK modulator with its
//! varicode and convolutional coding layers. Audio is signed 16-bit PCM at
//! [`packetmodem_core::AUDIO_SAMPLE_RATE`].

pub mod afsk;
pub mod clock;
pub mod common;
pub mod convolutional;
pub mod psk;
pub mod varicode;
pub mod error;

pub use error::{ModemError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        afsk::{
            find_ascii, AfskDemodulator, AfskModulator, AfskSettings, AsciiResult, BitEncoding,
            DemodulationResults, SignalEstimate,
        },
        clock::{ClockRecovery, ClockStatistics},
        common::{Demodulator, Modulator, SignalQuality},
        convolutional::Phase,
        psk::{PskMode, PskModulator, PskSettings, SymbolRate},
        varicode::VaricodeDecoder,
        error::{ModemError, Result},
    };
}
