//! Butterworth band-pass filter design and IIR filtering

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Highest prototype order accepted by [`BandpassFilter::design`]
pub const MAX_FILTER_ORDER: usize = 16;

/// Generic filter trait
pub trait Filter<T: Copy> {
    /// Process a single sample
    fn process_sample(&mut self, input: T) -> T;

    /// Process a buffer of samples
    fn process_buffer(&mut self, input: &[T], output: &mut [T]) -> Result<()> {
        if input.len() != output.len() {
            return Err(CoreError::BufferSizeMismatch {
                expected: input.len(),
                actual: output.len(),
            });
        }

        for (out, sample) in output.iter_mut().zip(input) {
            *out = self.process_sample(*sample);
        }

        Ok(())
    }

    /// Reset the filter state
    fn reset(&mut self);
}

/// Transposed-form IIR coefficient pair
///
/// `denominator[0]` is always 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandpassCoefficients {
    pub numerator: Vec<f64>,
    pub denominator: Vec<f64>,
}

impl BandpassCoefficients {
    /// Run the coefficients over `samples` from a zero initial state
    pub fn apply(&self, samples: &[f64]) -> Vec<f64> {
        let mut state = vec![0.0; self.numerator.len()];
        samples
            .iter()
            .map(|&x| transposed_step(&self.numerator, &self.denominator, &mut state, x))
            .collect()
    }
}

/// Butterworth band-pass filter
///
/// Coefficients are derived once from the design parameters. [`apply`] is the
/// stateless whole-buffer operation; the [`Filter`] impl keeps delay-line
/// state between calls for chunked processing.
///
/// [`apply`]: BandpassFilter::apply
#[derive(Debug, Clone)]
pub struct BandpassFilter {
    order: usize,
    sample_rate: f64,
    low_cutoff: f64,
    high_cutoff: f64,
    coefficients: BandpassCoefficients,
    state: Vec<f64>,
}

impl BandpassFilter {
    /// Design an `order`-pole-pair Butterworth band-pass filter
    pub fn design(order: usize, sample_rate: f64, low_cutoff: f64, high_cutoff: f64) -> Result<Self> {
        if sample_rate <= 0.0 || !sample_rate.is_finite() {
            return Err(CoreError::InvalidSampleRate { rate: sample_rate });
        }

        if order == 0 || order > MAX_FILTER_ORDER {
            return Err(CoreError::InvalidFilterParameters {
                msg: format!("Filter order must be in 1..={}, got {}", MAX_FILTER_ORDER, order),
            });
        }

        let nyquist = sample_rate / 2.0;
        if !(low_cutoff > 0.0 && low_cutoff < high_cutoff && high_cutoff < nyquist) {
            return Err(CoreError::InvalidFilterParameters {
                msg: format!(
                    "Cutoffs must satisfy 0 < low < high < {}: got {}..{}",
                    nyquist, low_cutoff, high_cutoff
                ),
            });
        }

        let lower = low_cutoff / nyquist;
        let upper = high_cutoff / nyquist;

        let denominator = denominator_coefficients(order, lower, upper);
        let numerator = numerator_coefficients(order, lower, upper, &denominator);

        tracing::trace!(order, low_cutoff, high_cutoff, "designed band-pass filter");

        Ok(Self {
            order,
            sample_rate,
            low_cutoff,
            high_cutoff,
            state: vec![0.0; numerator.len()],
            coefficients: BandpassCoefficients { numerator, denominator },
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Pass band edges in Hz
    pub fn cutoffs(&self) -> (f64, f64) {
        (self.low_cutoff, self.high_cutoff)
    }

    pub fn coefficients(&self) -> &BandpassCoefficients {
        &self.coefficients
    }

    /// Filter a whole buffer from a zero initial state; output length equals input length
    pub fn apply(&self, samples: &[f64]) -> Vec<f64> {
        self.coefficients.apply(samples)
    }
}

impl Filter<f64> for BandpassFilter {
    fn process_sample(&mut self, input: f64) -> f64 {
        transposed_step(
            &self.coefficients.numerator,
            &self.coefficients.denominator,
            &mut self.state,
            input,
        )
    }

    fn reset(&mut self) {
        self.state.fill(0.0);
    }
}

/// One step of a transposed direct-form-II recursion.
///
/// `state` has one slot per numerator tap; the last slot stays zero.
fn transposed_step(b: &[f64], a: &[f64], state: &mut [f64], x: f64) -> f64 {
    let y = b[0] * x + state[0];
    for i in 1..b.len() {
        state[i - 1] = b[i] * x + state[i] - a[i] * y;
    }
    y
}

/// Denominator of the band-pass transfer function for normalized cutoffs
/// (1.0 = Nyquist).
fn denominator_coefficients(order: usize, lower: f64, upper: f64) -> Vec<f64> {
    let cos_phi = (PI * (upper + lower) / 2.0).cos();
    let theta = PI * (upper - lower) / 2.0;
    let (sin_theta, cos_theta) = theta.sin_cos();
    let sin_2theta = 2.0 * sin_theta * cos_theta;
    let cos_2theta = 2.0 * cos_theta * cos_theta - 1.0;

    let mut r = vec![0.0; 2 * order];
    let mut t = vec![0.0; 2 * order];
    for k in 0..order {
        let pole_angle = PI * (2 * k + 1) as f64 / (2 * order) as f64;
        let (sin_pole, cos_pole) = pole_angle.sin_cos();
        let divisor = 1.0 + sin_2theta * sin_pole;

        r[2 * k] = cos_2theta / divisor;
        r[2 * k + 1] = sin_2theta * cos_pole / divisor;
        t[2 * k] = -2.0 * cos_phi * (cos_theta + sin_theta * sin_pole) / divisor;
        t[2 * k + 1] = -2.0 * cos_phi * sin_theta * cos_pole / divisor;
    }

    // Interleaved real/imaginary product; only the real parts are kept.
    let mut d = trinomial_multiply(order, &t, &r);
    d[1] = d[0];
    d[0] = 1.0;
    for k in 3..=2 * order {
        d[k] = d[2 * k - 2];
    }
    d.truncate(2 * order + 1);
    d
}

/// Multiply the `order` trinomials `x^2 + b_i x + c_i` with complex
/// coefficients stored as interleaved (re, im) pairs.
fn trinomial_multiply(order: usize, b: &[f64], c: &[f64]) -> Vec<f64> {
    let mut ret = vec![0.0; 4 * order];

    ret[0] = b[0];
    ret[1] = b[1];
    ret[2] = c[0];
    ret[3] = c[1];

    for i in 1..order {
        let (br, bi) = (b[2 * i], b[2 * i + 1]);
        let (cr, ci) = (c[2 * i], c[2 * i + 1]);

        let hi = 2 * (2 * i + 1);
        let lo = 2 * (2 * i - 1);
        ret[hi] += cr * ret[lo] - ci * ret[lo + 1];
        ret[hi + 1] += cr * ret[lo + 1] + ci * ret[lo];

        for j in (2..=2 * i).rev() {
            let p = 2 * (j - 1);
            let q = 2 * (j - 2);
            ret[2 * j] += br * ret[p] - bi * ret[p + 1] + cr * ret[q] - ci * ret[q + 1];
            ret[2 * j + 1] += br * ret[p + 1] + bi * ret[p] + cr * ret[q + 1] + ci * ret[q];
        }

        ret[2] += br * ret[0] - bi * ret[1] + cr;
        ret[3] += br * ret[1] + bi * ret[0] + ci;
        ret[0] += br;
        ret[1] += bi;
    }

    ret
}

/// Binomial coefficients of the Butterworth low-pass prototype
fn lowpass_numerator(order: usize) -> Vec<f64> {
    let mut coefficients = vec![1.0; order + 1];
    for k in 1..order {
        coefficients[k] = coefficients[k - 1] * (order - k + 1) as f64 / k as f64;
    }
    coefficients
}

/// Low-pass prototype reflected into high-pass form (odd terms negated)
fn highpass_numerator(order: usize) -> Vec<f64> {
    let mut coefficients = lowpass_numerator(order);
    for coefficient in coefficients.iter_mut().skip(1).step_by(2) {
        *coefficient = -*coefficient;
    }
    coefficients
}

/// Numerator scaled for unit gain at the warped center frequency
fn numerator_coefficients(order: usize, lower: f64, upper: f64, denominator: &[f64]) -> Vec<f64> {
    let highpass = highpass_numerator(order);
    let mut numerator = vec![0.0; 2 * order + 1];
    for (i, coefficient) in highpass.iter().enumerate().take(order) {
        numerator[2 * i] = *coefficient;
    }
    numerator[2 * order] = highpass[order];

    let warped_low = 4.0 * (PI * lower / 2.0).tan();
    let warped_high = 4.0 * (PI * upper / 2.0).tan();
    let center = 2.0 * (warped_low * warped_high).sqrt().atan2(4.0);

    let numerator_gain = response_magnitude(&numerator, center);
    let denominator_gain = response_magnitude(denominator, center);
    if numerator_gain > 0.0 {
        let scale = denominator_gain / numerator_gain;
        for coefficient in &mut numerator {
            *coefficient *= scale;
        }
    }

    numerator
}

/// |sum_k c_k e^{-i w k}|
fn response_magnitude(coefficients: &[f64], w: f64) -> f64 {
    let (re, im) = coefficients
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(re, im), (k, c)| {
            let (s, co) = (w * k as f64).sin_cos();
            (re + c * co, im - c * s)
        });
    (re * re + im * im).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frequency: f64, sample_rate: f64, count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| (2.0 * PI * frequency * i as f64 / sample_rate).sin())
            .collect()
    }

    fn settled_rms(samples: &[f64]) -> f64 {
        let tail = &samples[samples.len() / 2..];
        (tail.iter().map(|s| s * s).sum::<f64>() / tail.len() as f64).sqrt()
    }

    #[test]
    fn test_coefficient_shape() {
        let filter = BandpassFilter::design(4, 48000.0, 1000.0, 1400.0).unwrap();
        let coefficients = filter.coefficients();
        assert_eq!(coefficients.numerator.len(), 9);
        assert_eq!(coefficients.denominator.len(), 9);
        assert_eq!(coefficients.denominator[0], 1.0);
        for odd in coefficients.numerator.iter().skip(1).step_by(2) {
            assert_eq!(*odd, 0.0);
        }
    }

    #[test]
    fn test_lowpass_prototype_is_binomial() {
        assert_eq!(lowpass_numerator(4), vec![1.0, 4.0, 6.0, 4.0, 1.0]);
        assert_eq!(highpass_numerator(4), vec![1.0, -4.0, 6.0, -4.0, 1.0]);
    }

    #[test]
    fn test_passband_and_stopband() {
        let filter = BandpassFilter::design(4, 48000.0, 1000.0, 1400.0).unwrap();

        let passed = filter.apply(&tone(1200.0, 48000.0, 9600));
        let rejected = filter.apply(&tone(2200.0, 48000.0, 9600));

        let in_rms = std::f64::consts::FRAC_1_SQRT_2;
        assert!(settled_rms(&passed) > 0.9 * in_rms);
        assert!(settled_rms(&rejected) < 0.05 * in_rms);
    }

    #[test]
    fn test_output_length_matches_input() {
        let filter = BandpassFilter::design(4, 48000.0, 500.0, 2700.0).unwrap();
        assert_eq!(filter.apply(&[0.0; 123]).len(), 123);
        assert!(filter.apply(&[]).is_empty());
    }

    #[test]
    fn test_streaming_matches_whole_buffer() {
        let mut filter = BandpassFilter::design(4, 48000.0, 1000.0, 2400.0).unwrap();
        let input = tone(1700.0, 48000.0, 1000);
        let expected = filter.apply(&input);

        let mut streamed = vec![0.0; input.len()];
        let (first, second) = input.split_at(337);
        let (out_first, out_second) = streamed.split_at_mut(337);
        filter.process_buffer(first, out_first).unwrap();
        filter.process_buffer(second, out_second).unwrap();

        for (a, b) in expected.iter().zip(&streamed) {
            assert!((a - b).abs() < 1e-12);
        }

        filter.reset();
        assert_eq!(filter.process_sample(input[0]), expected[0]);
    }

    #[test]
    fn test_process_buffer_size_mismatch() {
        let mut filter = BandpassFilter::design(2, 48000.0, 1000.0, 2000.0).unwrap();
        let mut out = vec![0.0; 3];
        assert!(matches!(
            filter.process_buffer(&[0.0; 4], &mut out),
            Err(CoreError::BufferSizeMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(BandpassFilter::design(0, 48000.0, 1000.0, 2000.0).is_err());
        assert!(BandpassFilter::design(4, 48000.0, 2000.0, 1000.0).is_err());
        assert!(BandpassFilter::design(4, 48000.0, 0.0, 1000.0).is_err());
        assert!(BandpassFilter::design(4, 48000.0, 1000.0, 24000.0).is_err());
        assert!(matches!(
            BandpassFilter::design(4, -1.0, 1000.0, 2000.0),
            Err(CoreError::InvalidSampleRate { .. })
        ));
    }
}
