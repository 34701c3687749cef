//! Audio Frequency Shift Keying (AFSK) implementation
//!
//! Bell 202: 1200 baud, mark 1200 Hz, space 2200 Hz. The modulator integrates
//! a bipolar symbol value into a phase accumulator at four times the audio
//! rate and keeps every fourth sample, so the tone switches without phase
//! discontinuities. The demodulator band-pass filters the buffer, correlates
//! it against mark and space quadrature references over one symbol and
//! recovers the symbol clock from the resulting baseband.

use crate::clock::{ClockRecovery, ClockStatistics};
use crate::common::{mean_power, normalize, Demodulator, Modulator, SignalQuality};
use crate::{ModemError, Result};
use packetmodem_core::bitstream::BitBuffer;
use packetmodem_core::filter::BandpassFilter;
use packetmodem_core::{to_pcm, AUDIO_SAMPLE_RATE};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

pub const AFSK_BAUD_RATE: u32 = 1200;
pub const AFSK_MARK_FREQUENCY: f64 = 1200.0;
pub const AFSK_SPACE_FREQUENCY: f64 = 2200.0;
pub const AFSK_CENTER_FREQUENCY: f64 = 1700.0;
pub const AFSK_FREQUENCY_DEVIATION: f64 = 500.0;
pub const AFSK_SAMPLES_PER_SYMBOL: usize = (AUDIO_SAMPLE_RATE / AFSK_BAUD_RATE) as usize;

/// Synthesis runs at this multiple of the audio rate
const OVERSAMPLING: usize = 4;
const SYNTHESIS_RATE: f64 = (AUDIO_SAMPLE_RATE as usize * OVERSAMPLING) as f64;

/// Steps after which the carrier and deviation phase terms both repeat
const CARRIER_PHASE_PERIOD: u64 = 1920;
const DEVIATION_PHASE_PERIOD: i64 = 384;

pub const AFSK_BP_FILTER_ORDER: usize = 4;
pub const AFSK_BP_MARK_BAND: (f64, f64) = (1000.0, 1400.0);
pub const AFSK_BP_SPACE_BAND: (f64, f64) = (2000.0, 2400.0);
pub const AFSK_BP_COMBINED_BAND: (f64, f64) = (1000.0, 2400.0);
pub const AFSK_BP_WIDE_BAND: (f64, f64) = (500.0, 2700.0);

/// Lowest SNR ever reported, in dB
pub const AFSK_MINIMUM_SNR: f64 = -20.0;

/// Highest SNR ever reported, in dB
pub const AFSK_MAXIMUM_SNR: f64 = 60.0;

/// Timing error variance (samples squared) below which the clock counts as locked
const SYNC_VARIANCE_LIMIT: f64 = 16.0;

/// SNR above which a receiver treats a chunk as carrying signal
pub const AFSK_SNR_THRESHOLD: f64 = 3.0;

/// Buffered samples (100 ms) a receiver needs before attempting a decode
pub const AFSK_RECEIVED_MIN_SAMPLES: usize = 4800;

pub const SYN: u8 = 0x16;
pub const STX: u8 = 0x02;
pub const EOT: u8 = 0x04;

/// SYN bytes sent after EOT so the final symbols are fully clocked out
const TRAILING_SYN_COUNT: usize = 2;

/// How bits map onto tones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitEncoding {
    /// 1 is the mark tone, 0 the space tone
    #[default]
    Standard,
    /// 0 switches tone, 1 keeps it
    Nrzi,
}

/// AFSK modulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AfskSettings {
    pub bit_encoding: BitEncoding,
    /// Wrap byte payloads in SYN.. STX payload EOT
    pub ascii_framing: bool,
    pub syn_count: usize,
    pub amplitude: f64,
}

impl Default for AfskSettings {
    fn default() -> Self {
        Self {
            bit_encoding: BitEncoding::Standard,
            ascii_framing: true,
            syn_count: 10,
            amplitude: 0.5,
        }
    }
}

impl AfskSettings {
    /// Settings for AX.25/APRS: the frame layer already NRZI-codes its bits,
    /// so levels map straight onto tones and no ASCII framing is added
    pub fn aprs() -> Self {
        Self {
            bit_encoding: BitEncoding::Standard,
            ascii_framing: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return Err(ModemError::InvalidParameters {
                msg: format!("AFSK amplitude must be in (0, 1], got {}", self.amplitude),
            });
        }
        if self.ascii_framing && self.syn_count < 2 {
            return Err(ModemError::InvalidParameters {
                msg: format!("ASCII framing needs at least 2 SYN bytes, got {}", self.syn_count),
            });
        }
        Ok(())
    }
}

/// Continuous-phase Bell 202 modulator
///
/// Audio accumulates across calls until taken with [`take_audio`].
///
/// [`take_audio`]: AfskModulator::take_audio
pub struct AfskModulator {
    settings: AfskSettings,
    audio: Vec<i16>,
    step: u64,
    deviation_phase: i64,
    previous_symbol: Option<i64>,
    nrzi_symbol: i64,
}

impl AfskModulator {
    pub fn new(settings: AfskSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            audio: Vec::new(),
            step: 0,
            deviation_phase: 0,
            previous_symbol: None,
            nrzi_symbol: 1,
        })
    }

    pub fn settings(&self) -> &AfskSettings {
        &self.settings
    }

    /// Modulate bytes MSB first, with ASCII framing when enabled
    pub fn add_bytes(&mut self, data: &[u8]) -> Result<()> {
        let mut bits = BitBuffer::new();
        if self.settings.ascii_framing {
            for _ in 0..self.settings.syn_count {
                bits.add_byte(SYN);
            }
            bits.add_byte(STX);
            bits.add_bits(data, data.len() * 8);
            bits.add_byte(EOT);
            for _ in 0..TRAILING_SYN_COUNT {
                bits.add_byte(SYN);
            }
        } else {
            bits.add_bits(data, data.len() * 8);
        }
        bits.flush();
        self.add_bit_stream(&mut bits);
        Ok(())
    }

    pub fn add_string(&mut self, text: &str) -> Result<()> {
        self.add_bytes(text.as_bytes())
    }

    /// Modulate every committed bit of `bits` with no framing
    pub fn add_bit_stream(&mut self, bits: &mut BitBuffer) {
        let start = self.audio.len();
        let count = bits.len();
        while let Some(bit) = bits.pop_next_bit() {
            let symbol = self.symbol_for(bit);
            self.synthesize_symbol(symbol);
        }
        debug!(bits = count, samples = self.audio.len() - start, "AFSK modulated");
    }

    /// Bipolar symbol: -1 is the mark tone (center - deviation), +1 space
    fn symbol_for(&mut self, bit: u8) -> i64 {
        match self.settings.bit_encoding {
            BitEncoding::Standard => {
                if bit == 1 {
                    -1
                } else {
                    1
                }
            }
            BitEncoding::Nrzi => {
                if bit == 0 {
                    self.nrzi_symbol = -self.nrzi_symbol;
                }
                self.nrzi_symbol
            }
        }
    }

    fn synthesize_symbol(&mut self, symbol: i64) {
        let steps_per_symbol = AFSK_SAMPLES_PER_SYMBOL * OVERSAMPLING;
        let center_step = 2.0 * PI * AFSK_CENTER_FREQUENCY / SYNTHESIS_RATE;
        let deviation_step = 2.0 * PI * AFSK_FREQUENCY_DEVIATION / SYNTHESIS_RATE;

        let mut previous = self.previous_symbol.unwrap_or(symbol);
        for _ in 0..steps_per_symbol {
            self.deviation_phase =
                (self.deviation_phase + (symbol + previous) / 2).rem_euclid(DEVIATION_PHASE_PERIOD);
            previous = symbol;

            if self.step % OVERSAMPLING as u64 == 0 {
                let wave = (center_step * self.step as f64
                    + deviation_step * self.deviation_phase as f64)
                    .cos();
                self.audio.push(to_pcm(wave * self.settings.amplitude));
            }
            self.step = (self.step + 1) % CARRIER_PHASE_PERIOD;
        }
        self.previous_symbol = Some(symbol);
    }

    pub fn audio(&self) -> &[i16] {
        &self.audio
    }

    /// Hand over the accumulated audio, leaving the phase state intact
    pub fn take_audio(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.audio)
    }
}

impl Modulator for AfskModulator {
    fn modulate(&mut self, bits: &mut BitBuffer, output: &mut Vec<i16>) -> Result<()> {
        self.add_bit_stream(bits);
        output.extend(self.take_audio());
        Ok(())
    }

    fn samples_per_symbol(&self) -> usize {
        AFSK_SAMPLES_PER_SYMBOL
    }

    fn symbol_rate(&self) -> f64 {
        AFSK_BAUD_RATE as f64
    }

    fn reset(&mut self) {
        self.audio.clear();
        self.step = 0;
        self.deviation_phase = 0;
        self.previous_symbol = None;
        self.nrzi_symbol = 1;
    }
}

/// Outcome of scanning recovered bits for an ASCII-framed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsciiResult {
    Success(String),
    /// No SYN byte to align on
    NoSyn,
    /// Bits ran out before EOT
    NoEot,
}

/// Result of one demodulation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DemodulationResults {
    pub snr: f64,
    pub rms: f64,
    pub clock_syncs: u32,
    pub bit_count: usize,
}

/// Signal level estimate of a PCM buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalEstimate {
    pub snr: f64,
    pub rms: f64,
}

/// Whole-buffer Bell 202 demodulator
pub struct AfskDemodulator {
    combined_filter: BandpassFilter,
    mark_filter: BandpassFilter,
    space_filter: BandpassFilter,
    wide_filter: BandpassFilter,
    audio: Vec<i16>,
    baseband: Vec<bool>,
    bits: BitBuffer,
    clock_stats: ClockStatistics,
    results: DemodulationResults,
}

impl AfskDemodulator {
    pub fn new() -> Result<Self> {
        let design = |(low, high): (f64, f64)| {
            BandpassFilter::design(AFSK_BP_FILTER_ORDER, AUDIO_SAMPLE_RATE as f64, low, high)
        };

        Ok(Self {
            combined_filter: design(AFSK_BP_COMBINED_BAND)?,
            mark_filter: design(AFSK_BP_MARK_BAND)?,
            space_filter: design(AFSK_BP_SPACE_BAND)?,
            wide_filter: design(AFSK_BP_WIDE_BAND)?,
            audio: Vec::new(),
            baseband: Vec::new(),
            bits: BitBuffer::new(),
            clock_stats: ClockStatistics::default(),
            results: DemodulationResults::default(),
        })
    }

    /// Replace the buffered audio
    pub fn set_audio_buffer(&mut self, samples: &[i16]) {
        self.audio.clear();
        self.audio.extend_from_slice(samples);
    }

    pub fn add_audio(&mut self, samples: &[i16]) {
        self.audio.extend_from_slice(samples);
    }

    pub fn audio_buffer(&self) -> &[i16] {
        &self.audio
    }

    /// Estimate SNR and RMS of a PCM buffer
    ///
    /// Noise density comes from the part of the wide reference band outside
    /// the combined mark+space band; the noise expected inside the two tone
    /// bands is subtracted from their power before taking the ratio.
    pub fn estimate_signal(&self, samples: &[i16]) -> SignalEstimate {
        let normalized = normalize(samples);
        let combined = self.combined_filter.apply(&normalized);
        self.estimate_from(&normalized, &combined)
    }

    fn estimate_from(&self, normalized: &[f64], combined: &[f64]) -> SignalEstimate {
        let combined_power = mean_power(combined);
        let rms = combined_power.sqrt();
        if normalized.is_empty() {
            return SignalEstimate { snr: AFSK_MINIMUM_SNR, rms };
        }

        let tone_power =
            mean_power(&self.mark_filter.apply(normalized)) + mean_power(&self.space_filter.apply(normalized));
        let wide_power = mean_power(&self.wide_filter.apply(normalized));

        let band_width = |(low, high): (f64, f64)| high - low;
        let outside_width = band_width(AFSK_BP_WIDE_BAND) - band_width(AFSK_BP_COMBINED_BAND);
        let tone_width = band_width(AFSK_BP_MARK_BAND) + band_width(AFSK_BP_SPACE_BAND);

        let noise_density = (wide_power - combined_power).max(0.0) / outside_width;
        let noise_in_tones = (noise_density * tone_width).max(tone_power * 10f64.powf(-AFSK_MAXIMUM_SNR / 10.0));
        let signal = tone_power - noise_in_tones;

        let snr = if signal > 0.0 && noise_in_tones > 0.0 {
            10.0 * (signal / noise_in_tones).log10()
        } else {
            AFSK_MINIMUM_SNR
        };

        SignalEstimate {
            snr: snr.clamp(AFSK_MINIMUM_SNR, AFSK_MAXIMUM_SNR),
            rms,
        }
    }

    /// Demodulate the buffered audio into the internal bit stream
    pub fn process_audio_buffer(&mut self) -> DemodulationResults {
        let normalized = normalize(&self.audio);
        let filtered = self.combined_filter.apply(&normalized);
        let estimate = self.estimate_from(&normalized, &filtered);

        let mut mark = ToneDetector::new(AFSK_MARK_FREQUENCY, AUDIO_SAMPLE_RATE as f64, AFSK_SAMPLES_PER_SYMBOL);
        let mut space = ToneDetector::new(AFSK_SPACE_FREQUENCY, AUDIO_SAMPLE_RATE as f64, AFSK_SAMPLES_PER_SYMBOL);
        self.baseband = filtered
            .iter()
            .map(|&sample| mark.process(sample) > space.process(sample))
            .collect();

        let mut clock = ClockRecovery::new(AFSK_SAMPLES_PER_SYMBOL);
        self.bits.clear();
        for &level in &self.baseband {
            if let Some(bit) = clock.advance(level) {
                self.bits.add_bit(bit == 1);
            }
        }
        self.bits.flush();
        self.clock_stats = clock.statistics();

        self.results = DemodulationResults {
            snr: estimate.snr,
            rms: estimate.rms,
            clock_syncs: self.clock_stats.clock_syncs,
            bit_count: self.bits.len(),
        };

        debug!(
            samples = self.audio.len(),
            snr = self.results.snr,
            rms = self.results.rms,
            clock_syncs = self.results.clock_syncs,
            bits = self.results.bit_count,
            "AFSK demodulated"
        );

        self.results
    }

    /// Baseband decisions of the last pass, one per sample (true = mark)
    pub fn baseband(&self) -> &[bool] {
        &self.baseband
    }

    pub fn bit_stream(&mut self) -> &mut BitBuffer {
        &mut self.bits
    }

    pub fn take_bit_stream(&mut self) -> BitBuffer {
        std::mem::take(&mut self.bits)
    }

    pub fn clock_statistics(&self) -> ClockStatistics {
        self.clock_stats
    }

    pub fn last_results(&self) -> DemodulationResults {
        self.results
    }

    /// Scan the recovered bits for a SYN-aligned, EOT-terminated message
    pub fn look_for_string(&mut self) -> AsciiResult {
        find_ascii(&mut self.bits)
    }
}

/// Align on a SYN byte at any bit offset, then read bytes up to EOT,
/// dropping SYN and STX
///
/// A byte that is neither text nor a control character of the framing ends
/// that alignment and the search resumes one bit after its SYN.
pub fn find_ascii(bits: &mut BitBuffer) -> AsciiResult {
    let stream: Vec<u8> = std::iter::from_fn(|| bits.pop_next_bit()).collect();
    let byte_at = |offset: usize| {
        stream
            .get(offset..offset + 8)
            .map(|window| window.iter().fold(0u8, |byte, &bit| (byte << 1) | bit))
    };

    let mut synced = false;
    for start in 0..stream.len() {
        if byte_at(start) != Some(SYN) {
            continue;
        }
        synced = true;

        let mut text = String::new();
        let mut offset = start + 8;
        while let Some(byte) = byte_at(offset) {
            match byte {
                EOT => return AsciiResult::Success(text),
                SYN | STX => {}
                other if other.is_ascii_graphic() || other.is_ascii_whitespace() => text.push(other as char),
                _ => break,
            }
            offset += 8;
        }
    }

    if synced {
        AsciiResult::NoEot
    } else {
        AsciiResult::NoSyn
    }
}

impl Demodulator for AfskDemodulator {
    fn demodulate(&mut self, samples: &[i16], output: &mut BitBuffer) -> Result<()> {
        self.set_audio_buffer(samples);
        self.process_audio_buffer();
        for bit in self.bits.iter() {
            output.add_bit(bit == 1);
        }
        output.flush();
        Ok(())
    }

    /// Transitions of a real signal cluster at a steady clock offset, noise
    /// spreads them across the whole symbol
    fn is_synchronized(&self) -> bool {
        self.clock_stats.boundaries > 0 && self.clock_stats.timing_error_variance < SYNC_VARIANCE_LIMIT
    }

    fn signal_quality(&self) -> SignalQuality {
        SignalQuality {
            snr_db: self.results.snr,
            rms: self.results.rms,
            clock_syncs: self.results.clock_syncs,
            timing_error_mean: self.clock_stats.timing_error_mean,
            timing_error_variance: self.clock_stats.timing_error_variance,
        }
    }

    fn reset(&mut self) {
        self.audio.clear();
        self.baseband.clear();
        self.bits.clear();
        self.clock_stats = ClockStatistics::default();
        self.results = DemodulationResults::default();
    }
}

/// Sliding one-symbol quadrature correlator
///
/// Products with the reference oscillator are kept in a ring so each new
/// sample costs one add and one subtract per arm.
struct ToneDetector {
    phase_step: f64,
    position: u64,
    in_phase: Vec<f64>,
    quadrature: Vec<f64>,
    in_phase_sum: f64,
    quadrature_sum: f64,
    index: usize,
}

impl ToneDetector {
    fn new(frequency: f64, sample_rate: f64, window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            phase_step: 2.0 * PI * frequency / sample_rate,
            position: 0,
            in_phase: vec![0.0; window_size],
            quadrature: vec![0.0; window_size],
            in_phase_sum: 0.0,
            quadrature_sum: 0.0,
            index: 0,
        }
    }

    /// Push one sample and return the squared correlation magnitude
    fn process(&mut self, sample: f64) -> f64 {
        let phase = self.phase_step * self.position as f64;
        self.position += 1;

        let i = sample * phase.sin();
        let q = sample * phase.cos();
        self.in_phase_sum += i - self.in_phase[self.index];
        self.quadrature_sum += q - self.quadrature[self.index];
        self.in_phase[self.index] = i;
        self.quadrature[self.index] = q;
        self.index = (self.index + 1) % self.in_phase.len();

        self.in_phase_sum * self.in_phase_sum + self.quadrature_sum * self.quadrature_sum
    }
}
