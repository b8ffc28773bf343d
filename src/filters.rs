//! Band filtering
//!
//! Each EEG band gets its own second-order IIR bandpass. Coefficients use
//! the bilinear-transform design with a tangent-warped bandwidth and a
//! cosine-placed centre frequency, giving unity gain at the centre:
//!
//! ```text
//! k  = tan(pi * (f_high - f_low) / fs)
//! c  = cos(2 * pi * sqrt(f_low * f_high) / fs)
//! b  = [k, 0, -k] / (1 + k)
//! a  = [1, -2c / (1 + k), (1 - k) / (1 + k)]
//! ```

use crate::types::{Band, BandPowers};

/// Second-order section coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    /// Numerator [b0, b1, b2]
    pub b: [f64; 3],
    /// Denominator [1, a1, a2]
    pub a: [f64; 3],
}

impl BiquadCoeffs {
    /// Bandpass coefficients for `[low_hz, high_hz]` at `sample_rate` Hz.
    pub fn bandpass(sample_rate: f64, low_hz: f64, high_hz: f64) -> Self {
        let bandwidth = high_hz - low_hz;
        let center = (low_hz * high_hz).sqrt();

        let k = (std::f64::consts::PI * bandwidth / sample_rate).tan();
        let c = (2.0 * std::f64::consts::PI * center / sample_rate).cos();
        let norm = 1.0 / (1.0 + k);

        Self {
            b: [k * norm, 0.0, -k * norm],
            a: [1.0, -2.0 * c * norm, (1.0 - k) * norm],
        }
    }
}

/// Bandpass filter holding the last three inputs and outputs
#[derive(Debug, Clone)]
pub struct BandpassFilter {
    coeffs: BiquadCoeffs,
    /// x[n], x[n-1], x[n-2]
    inputs: [f64; 3],
    /// y[n], y[n-1], y[n-2]
    outputs: [f64; 3],
}

impl BandpassFilter {
    pub fn new(sample_rate: f64, low_hz: f64, high_hz: f64) -> Self {
        Self::with_coeffs(BiquadCoeffs::bandpass(sample_rate, low_hz, high_hz))
    }

    pub fn with_coeffs(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            inputs: [0.0; 3],
            outputs: [0.0; 3],
        }
    }

    pub fn for_band(sample_rate: f64, band: Band) -> Self {
        let (low, high) = band.range_hz();
        Self::new(sample_rate, low, high)
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Filter one sample
    pub fn filter(&mut self, input: f64) -> f64 {
        self.inputs = [input, self.inputs[0], self.inputs[1]];
        self.outputs = [0.0, self.outputs[0], self.outputs[1]];

        let BiquadCoeffs { b, a } = self.coeffs;
        let mut output = b[0] * self.inputs[0] + b[1] * self.inputs[1] + b[2] * self.inputs[2]
            - a[1] * self.outputs[1]
            - a[2] * self.outputs[2];

        // A non-finite output would poison every later sample through feedback
        if !output.is_finite() {
            self.reset();
            output = 0.0;
        }

        self.outputs[0] = output;
        output
    }

    pub fn reset(&mut self) {
        self.inputs = [0.0; 3];
        self.outputs = [0.0; 3];
    }
}

/// Five independent band filters, one per EEG band
#[derive(Debug, Clone)]
pub struct FilterBank {
    filters: [BandpassFilter; 5],
}

impl FilterBank {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            filters: Band::ALL.map(|band| BandpassFilter::for_band(sample_rate, band)),
        }
    }

    /// Push one raw scalar through every band
    pub fn process_sample(&mut self, input: f64) -> BandPowers {
        let input = if input.is_finite() { input } else { 0.0 };
        let mut out = BandPowers::default();
        for band in Band::ALL {
            out.set(band, self.filters[band.index()].filter(input));
        }
        out
    }

    pub fn filter(&self, band: Band) -> &BandpassFilter {
        &self.filters[band.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    fn tail_rms(values: &[f64], tail: usize) -> f64 {
        let slice = &values[values.len() - tail..];
        (slice.iter().map(|v| v * v).sum::<f64>() / tail as f64).sqrt()
    }

    #[test]
    fn test_filter_bank_is_deterministic() {
        let input: Vec<f64> = (0..500)
            .map(|i| (i as f64 * 0.37).sin() * 20.0 + (i as f64 * 1.9).cos() * 5.0)
            .collect();

        let mut first = FilterBank::new(256.0);
        let mut second = FilterBank::new(256.0);

        for x in &input {
            let a = first.process_sample(*x);
            let b = second.process_sample(*x);
            for band in Band::ALL {
                assert_eq!(a.get(band).to_bits(), b.get(band).to_bits());
            }
        }
    }

    #[test]
    fn test_bands_do_not_share_state() {
        let bank = FilterBank::new(256.0);
        let alpha = bank.filter(Band::Alpha).coeffs();
        let beta = bank.filter(Band::Beta).coeffs();
        assert_ne!(alpha, beta);
    }

    #[test]
    fn test_alpha_sine_lands_in_alpha_band() {
        let fs = 256.0;
        let signal = sine(10.0, fs, 768);
        let mut bank = FilterBank::new(fs);

        let mut per_band: Vec<Vec<f64>> = vec![Vec::new(); 5];
        for x in &signal {
            let out = bank.process_sample(*x);
            for band in Band::ALL {
                per_band[band.index()].push(out.get(band));
            }
        }

        let alpha = tail_rms(&per_band[Band::Alpha.index()], 256);
        for band in [Band::Delta, Band::Theta, Band::Beta, Band::Gamma] {
            let other = tail_rms(&per_band[band.index()], 256);
            assert!(
                alpha > other * 1.5,
                "alpha {alpha} should dominate {} {other}",
                band.as_str()
            );
        }
        // Unity gain at the centre frequency, so a unit sine keeps most of its RMS
        assert!(alpha > 0.6);
    }

    #[test]
    fn test_bandpass_rejects_dc() {
        let mut filter = BandpassFilter::for_band(256.0, Band::Beta);
        let mut last = 1.0;
        for _ in 0..2000 {
            last = filter.filter(1.0);
        }
        assert!(last.abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_input_is_neutralized() {
        let mut bank = FilterBank::new(256.0);
        bank.process_sample(1.0);
        let out = bank.process_sample(f64::NAN);
        for band in Band::ALL {
            assert!(out.get(band).is_finite());
        }
    }

    #[test]
    fn test_reset_clears_history() {
        let mut filter = BandpassFilter::for_band(256.0, Band::Alpha);
        let fresh_first = BandpassFilter::for_band(256.0, Band::Alpha).filter(3.0);
        for i in 0..50 {
            filter.filter(i as f64);
        }
        filter.reset();
        assert_eq!(filter.filter(3.0), fresh_first);
    }
}
