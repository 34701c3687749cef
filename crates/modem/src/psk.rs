//! PSK31-style phase shift keying
//!
//! Text is varicoded, framed by a zero preamble and a postamble padded to a
//! 32-bit boundary, then keyed onto a single carrier. BPSK reverses the
//! carrier on every zero bit; QPSK runs the bits through the convolutional
//! code. Symbol edges that carry a phase change get a raised-cosine
//! envelope so the signal stays narrow.

use crate::common::Modulator;
use crate::convolutional::{shifted_phase, Phase, REGISTER_MASK};
use crate::varicode;
use crate::{ModemError, Result};
use packetmodem_core::bitstream::BitBuffer;
use packetmodem_core::{to_pcm, AUDIO_SAMPLE_RATE};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Postamble is padded out to a multiple of this many bits
const POSTAMBLE_ALIGNMENT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PskMode {
    #[default]
    Bpsk,
    Qpsk,
}

/// Supported symbol rates, in baud
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SymbolRate {
    #[default]
    #[serde(rename = "125")]
    Baud125,
    #[serde(rename = "250")]
    Baud250,
    #[serde(rename = "500")]
    Baud500,
    #[serde(rename = "1000")]
    Baud1000,
}

impl SymbolRate {
    pub fn baud(self) -> u32 {
        match self {
            SymbolRate::Baud125 => 125,
            SymbolRate::Baud250 => 250,
            SymbolRate::Baud500 => 500,
            SymbolRate::Baud1000 => 1000,
        }
    }

    pub fn samples_per_symbol(self) -> usize {
        (AUDIO_SAMPLE_RATE / self.baud()) as usize
    }
}

/// PSK modulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PskSettings {
    pub mode: PskMode,
    pub symbol_rate: SymbolRate,
    pub carrier_frequency: f64,
    /// Zero bits sent before the text
    pub preamble_length: usize,
    /// Minimum postamble bits before alignment padding
    pub postamble_length: usize,
    /// Fill the QPSK postamble with zeros, as fldigi expects
    pub fldigi_compat: bool,
    pub amplitude: f64,
}

impl Default for PskSettings {
    fn default() -> Self {
        Self {
            mode: PskMode::Bpsk,
            symbol_rate: SymbolRate::Baud125,
            carrier_frequency: 1500.0,
            preamble_length: 64,
            postamble_length: 64,
            fldigi_compat: true,
            amplitude: 0.5,
        }
    }
}

impl PskSettings {
    pub fn validate(&self) -> Result<()> {
        let nyquist = AUDIO_SAMPLE_RATE as f64 / 2.0;
        if !(self.carrier_frequency > 0.0 && self.carrier_frequency < nyquist) {
            return Err(ModemError::InvalidParameters {
                msg: format!(
                    "PSK carrier must be in (0, {}) Hz, got {}",
                    nyquist, self.carrier_frequency
                ),
            });
        }
        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return Err(ModemError::InvalidParameters {
                msg: format!("PSK amplitude must be in (0, 1], got {}", self.amplitude),
            });
        }
        Ok(())
    }

    /// Whether the postamble is zero filled rather than one filled
    pub fn zero_postamble(&self) -> bool {
        self.mode == PskMode::Qpsk && self.fldigi_compat
    }
}

/// One keyed symbol: the carrier phase and whether its trailing half fades
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Symbol {
    phase: Phase,
    filter_end: bool,
}

/// BPSK/QPSK modulator
pub struct PskModulator {
    settings: PskSettings,
    carrier_angle: f64,
    previous_phase: Phase,
    current_phase: Phase,
    register: u8,
}

impl PskModulator {
    pub fn new(settings: PskSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            carrier_angle: 0.0,
            previous_phase: Phase::Zero,
            current_phase: Phase::Zero,
            register: 0,
        })
    }

    pub fn settings(&self) -> &PskSettings {
        &self.settings
    }

    /// Preamble, varicoded text and aligned postamble
    pub fn transmission_bits(&self, text: &str) -> Result<BitBuffer> {
        let mut bits = BitBuffer::new();
        for _ in 0..self.settings.preamble_length {
            bits.add_zero_bit();
        }
        for character in text.chars() {
            varicode::add_character(&mut bits, character)?;
        }

        let postamble = self.settings.postamble_length
            + (POSTAMBLE_ALIGNMENT - bits.total_bits() % POSTAMBLE_ALIGNMENT);
        let fill = !self.settings.zero_postamble();
        for _ in 0..postamble {
            bits.add_bit(fill);
        }
        bits.flush();
        Ok(bits)
    }

    /// Complete transmission of `text` from a fresh carrier
    pub fn encode_string(&mut self, text: &str) -> Result<Vec<i16>> {
        self.reset();
        let mut bits = self.transmission_bits(text)?;
        let mut audio = Vec::with_capacity(bits.len() * self.samples_per_symbol());
        self.modulate(&mut bits, &mut audio)?;
        debug!(
            mode = ?self.settings.mode,
            baud = self.settings.symbol_rate.baud(),
            characters = text.chars().count(),
            samples = audio.len(),
            "PSK encoded"
        );
        Ok(audio)
    }

    fn plan_symbols(&mut self, bits: &mut BitBuffer) -> Vec<Symbol> {
        let data: Vec<u8> = std::iter::from_fn(|| bits.pop_next_bit()).collect();
        let mut symbols = Vec::with_capacity(data.len());

        for (index, &bit) in data.iter().enumerate() {
            let next = data.get(index + 1).copied();
            let symbol = match self.settings.mode {
                PskMode::Bpsk => {
                    if bit == 0 {
                        self.current_phase = self.current_phase.reversed();
                    }
                    Symbol {
                        phase: self.current_phase,
                        filter_end: next == Some(0),
                    }
                }
                PskMode::Qpsk => {
                    self.current_phase = shifted_phase(self.register, self.current_phase);
                    self.register = ((self.register << 1) | bit) & REGISTER_MASK;
                    let following = shifted_phase(self.register, self.current_phase);
                    Symbol {
                        phase: self.current_phase,
                        filter_end: following != self.current_phase,
                    }
                }
            };
            symbols.push(symbol);
        }
        symbols
    }

    fn shape_symbol(&mut self, symbol: Symbol, output: &mut Vec<i16>) {
        let samples = self.samples_per_symbol();
        let half = samples / 2;
        let step = 2.0 * PI * self.settings.carrier_frequency / AUDIO_SAMPLE_RATE as f64;
        let phase_changed = symbol.phase != self.previous_phase;

        for n in 0..samples {
            let mut value = (self.carrier_angle + symbol.phase.radians()).sin();
            if (n < half && phase_changed) || (n >= half && symbol.filter_end) {
                value *= (PI / samples as f64 * n as f64).sin();
            }
            output.push(to_pcm(value * self.settings.amplitude));

            self.carrier_angle += step;
            if self.carrier_angle >= 2.0 * PI {
                self.carrier_angle -= 2.0 * PI;
            }
        }
        self.previous_phase = symbol.phase;
    }
}

impl Modulator for PskModulator {
    fn modulate(&mut self, bits: &mut BitBuffer, output: &mut Vec<i16>) -> Result<()> {
        for symbol in self.plan_symbols(bits) {
            self.shape_symbol(symbol, output);
        }
        Ok(())
    }

    fn samples_per_symbol(&self) -> usize {
        self.settings.symbol_rate.samples_per_symbol()
    }

    fn symbol_rate(&self) -> f64 {
        self.settings.symbol_rate.baud() as f64
    }

    fn reset(&mut self) {
        self.carrier_angle = 0.0;
        self.previous_phase = Phase::Zero;
        self.current_phase = Phase::Zero;
        self.register = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varicode::VaricodeDecoder;

    fn bits_of(pattern: &[u8]) -> BitBuffer {
        let mut bits = BitBuffer::new();
        for &bit in pattern {
            bits.add_bit(bit == 1);
        }
        bits.flush();
        bits
    }

    fn carrier(index: usize, settings: &PskSettings) -> f64 {
        (2.0 * PI * settings.carrier_frequency * index as f64 / AUDIO_SAMPLE_RATE as f64).sin()
    }

    #[test]
    fn test_settings_validation() {
        assert!(PskSettings::default().validate().is_ok());
        let settings = PskSettings { amplitude: 0.0, ..Default::default() };
        assert!(PskModulator::new(settings).is_err());
        let settings = PskSettings { carrier_frequency: 30_000.0, ..Default::default() };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_symbol_rates() {
        assert_eq!(SymbolRate::Baud125.samples_per_symbol(), 384);
        assert_eq!(SymbolRate::Baud250.samples_per_symbol(), 192);
        assert_eq!(SymbolRate::Baud500.samples_per_symbol(), 96);
        assert_eq!(SymbolRate::Baud1000.samples_per_symbol(), 48);
    }

    #[test]
    fn test_postamble_alignment() {
        let modulator = PskModulator::new(PskSettings::default()).unwrap();
        // 64 preamble bits are already aligned: 64 + 32 postamble bits
        let bits = modulator.transmission_bits("").unwrap();
        assert_eq!(bits.len(), 64 + 64 + 32);
        assert!(bits.iter().skip(64).all(|bit| bit == 1));

        // 'e' is "11" plus the gap
        let bits = modulator.transmission_bits("e").unwrap();
        assert_eq!(bits.len() % 32, 0);
        assert_eq!(bits.len(), 64 + 4 + 64 + 28);
    }

    #[test]
    fn test_qpsk_fldigi_postamble_is_zero_filled() {
        let settings = PskSettings { mode: PskMode::Qpsk, ..Default::default() };
        let bits = PskModulator::new(settings.clone()).unwrap().transmission_bits("").unwrap();
        assert!(bits.iter().all(|bit| bit == 0));

        let settings = PskSettings { fldigi_compat: false, ..settings };
        let bits = PskModulator::new(settings).unwrap().transmission_bits("").unwrap();
        assert!(bits.iter().skip(64).all(|bit| bit == 1));
    }

    #[test]
    fn test_unsupported_character() {
        let mut modulator = PskModulator::new(PskSettings::default()).unwrap();
        assert_eq!(
            modulator.encode_string("caf\u{e9}"),
            Err(ModemError::UnsupportedCharacter { character: '\u{e9}' })
        );
    }

    #[test]
    fn test_text_survives_varicode_layer() {
        let modulator = PskModulator::new(PskSettings::default()).unwrap();
        let mut bits = modulator.transmission_bits("CQ CQ de N0CALL").unwrap();
        assert_eq!(VaricodeDecoder::new().decode(&mut bits), "CQ CQ de N0CALL");
    }

    #[test]
    fn test_encode_string_length() {
        for rate in [SymbolRate::Baud125, SymbolRate::Baud1000] {
            let settings = PskSettings { symbol_rate: rate, ..Default::default() };
            let mut modulator = PskModulator::new(settings).unwrap();
            let bits = modulator.transmission_bits("hello").unwrap().len();
            let audio = modulator.encode_string("hello").unwrap();
            assert_eq!(audio.len(), bits * rate.samples_per_symbol());
        }
    }

    #[test]
    fn test_bpsk_ones_are_a_steady_carrier() {
        let settings = PskSettings::default();
        let mut modulator = PskModulator::new(settings.clone()).unwrap();
        let mut audio = Vec::new();
        modulator.modulate(&mut bits_of(&[1, 1, 1, 1]), &mut audio).unwrap();

        for (i, &sample) in audio.iter().enumerate() {
            let expected = to_pcm(0.5 * carrier(i, &settings));
            assert!((sample as i32 - expected as i32).abs() <= 2, "sample {}", i);
        }
    }

    #[test]
    fn test_bpsk_zero_reverses_and_shapes() {
        let settings = PskSettings::default();
        let sps = settings.symbol_rate.samples_per_symbol();
        let mut modulator = PskModulator::new(settings.clone()).unwrap();
        let mut audio = Vec::new();
        modulator.modulate(&mut bits_of(&[1, 0, 1, 1]), &mut audio).unwrap();

        // the first symbol fades out ahead of the reversal
        assert_eq!(audio[0], to_pcm(0.5 * carrier(0, &settings)));
        assert!(audio[sps - 1].abs() < 200);
        // the reversed symbol fades in from zero
        assert_eq!(audio[sps], 0);
        // and runs unshaped, inverted, through its second half
        for n in [sps + sps / 2, sps + 3 * sps / 4] {
            let expected = to_pcm(-0.5 * carrier(n, &settings));
            assert!((audio[n] as i32 - expected as i32).abs() <= 2, "sample {}", n);
        }
        // the third symbol keeps the phase of the second, so no shaping
        let n = 2 * sps + 3;
        let expected = to_pcm(-0.5 * carrier(n, &settings));
        assert!((audio[n] as i32 - expected as i32).abs() <= 2);
    }

    #[test]
    fn test_bpsk_plan() {
        let mut modulator = PskModulator::new(PskSettings::default()).unwrap();
        let plan = modulator.plan_symbols(&mut bits_of(&[0, 0, 1, 0]));
        let phases: Vec<Phase> = plan.iter().map(|s| s.phase).collect();
        let ends: Vec<bool> = plan.iter().map(|s| s.filter_end).collect();
        assert_eq!(phases, vec![Phase::OneEighty, Phase::Zero, Phase::Zero, Phase::OneEighty]);
        assert_eq!(ends, vec![true, false, true, false]);
    }

    #[test]
    fn test_qpsk_idle_reverses_every_symbol() {
        let settings = PskSettings { mode: PskMode::Qpsk, ..Default::default() };
        let mut modulator = PskModulator::new(settings).unwrap();
        let plan = modulator.plan_symbols(&mut bits_of(&[0; 8]));
        let mut expected = Phase::Zero;
        for symbol in plan {
            expected = expected.reversed();
            assert_eq!(symbol.phase, expected);
            assert!(symbol.filter_end);
        }
    }

    #[test]
    fn test_qpsk_plan_follows_register() {
        let settings = PskSettings { mode: PskMode::Qpsk, ..Default::default() };
        let mut modulator = PskModulator::new(settings).unwrap();
        let plan = modulator.plan_symbols(&mut bits_of(&[1, 1, 1]));
        // registers seen: 0b00000, 0b00001, 0b00011
        assert_eq!(plan[0].phase, Phase::OneEighty);
        assert_eq!(plan[1].phase, Phase::TwoSeventy);
        assert_eq!(plan[2].phase, Phase::TwoSeventy);
        assert!(plan[0].filter_end);
        assert!(!plan[1].filter_end);
        // register 0b00111 shifts by pi/2
        assert!(plan[2].filter_end);
    }

    #[test]
    fn test_modulator_trait_reset() {
        let mut modulator = PskModulator::new(PskSettings::default()).unwrap();
        let first = modulator.encode_string("abc").unwrap();
        let second = modulator.encode_string("abc").unwrap();
        assert_eq!(first, second);
        assert_eq!(Modulator::symbol_rate(&modulator), 125.0);
    }
}
