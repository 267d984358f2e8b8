//! PSK demodulation (V.26 2400 baud / V.27 4800 baud), self-correlation
//! and local-oscillator families.
//!
//! Grounded on the teacher's `src/quadrature_demod.rs` for the
//! atan2-of-mixed-I/Q approach (the LO family) and `src/descrambler.rs`
//! for the general shape of a per-symbol delayed-sample comparison
//! (the self-correlation family); the Gray-coded phase tables and
//! quality metric are new, from `spec.md` §4.5, since the teacher
//! never implements a phase-shift-keyed demodulator.

use std::f64::consts::PI;

use crate::dsp::fir::Fir;
use crate::Float;

/// PSK standard / symbol mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standard {
    /// V.26, 2 bits/symbol, classic `+3π/4` offset.
    V26Classic,
    /// V.26, 2 bits/symbol, "B"/MFJ `+π/2` offset.
    V26B,
    /// V.27, 3 bits/symbol.
    V27,
}

/// Gray-coded dibit order for V.26 ({0,1,3,2} at 90° steps).
pub const V26_GRAY: [u8; 4] = [0, 1, 3, 2];
/// Gray-coded tribit order for V.27 (45° steps).
pub const V27_GRAY: [u8; 8] = [1, 0, 2, 3, 7, 6, 4, 5];

impl Standard {
    fn phase_offset(&self) -> Float {
        match self {
            Standard::V26Classic => 3.0 * PI as Float / 4.0,
            Standard::V26B => PI as Float / 2.0,
            Standard::V27 => PI as Float / 8.0,
        }
    }

    fn n_symbols(&self) -> usize {
        match self {
            Standard::V26Classic | Standard::V26B => 4,
            Standard::V27 => 8,
        }
    }

    fn gray(&self, idx: usize) -> u8 {
        match self {
            Standard::V26Classic | Standard::V26B => V26_GRAY[idx],
            Standard::V27 => V27_GRAY[idx],
        }
    }

    /// Bits carried per symbol: 2 for V.26, 3 for V.27.
    #[must_use]
    pub fn bits_per_symbol(&self) -> u32 {
        match self {
            Standard::V26Classic | Standard::V26B => 2,
            Standard::V27 => 3,
        }
    }

    /// Map a wrapped phase difference (radians, `-π..=π`) to its
    /// Gray-coded symbol value and a 0..100 quality score.
    #[must_use]
    pub fn slice(&self, phase_diff: Float) -> (u8, Float) {
        let n = self.n_symbols();
        let step = 2.0 * PI as Float / n as Float;
        let shifted = phase_diff - self.phase_offset();
        let mut wrapped = shifted % (2.0 * PI as Float);
        if wrapped < 0.0 {
            wrapped += 2.0 * PI as Float;
        }
        let idx_f = wrapped / step;
        let idx = (idx_f.round() as usize) % n;
        let frac = idx_f - idx_f.floor();
        let centered = if frac > 0.5 { 1.0 - frac } else { frac };
        let quality = 100.0 * 2.0 * (centered - 0.5).abs();
        (self.gray(idx), quality.clamp(0.0, 100.0))
    }
}

/// Self-correlation PSK demodulator: multiplies the current sample by
/// a one-symbol-delayed sample, with ±45° cos/sin reference offsets.
pub struct SelfCorrelation {
    standard: Standard,
    delay: Vec<Float>,
    pos: usize,
    prev_phase: Float,
}

impl SelfCorrelation {
    /// `samples_per_symbol` sizes the delay line.
    #[must_use]
    pub fn new(standard: Standard, samples_per_symbol: usize) -> Self {
        Self {
            standard,
            delay: vec![0.0; samples_per_symbol.max(1)],
            pos: 0,
            prev_phase: 0.0,
        }
    }

    /// The PSK standard this instance decodes.
    #[must_use]
    pub fn standard(&self) -> Standard {
        self.standard
    }

    /// Process one (real-valued) sample, returning `(symbol, quality,
    /// demod_out)`, where `demod_out` is a continuous signal suitable
    /// for DPLL zero-crossing tracking.
    pub fn process(&mut self, sample: Float) -> (u8, Float, Float) {
        let n = self.delay.len();
        let delayed = self.delay[self.pos];
        self.delay[self.pos] = sample;
        self.pos = (self.pos + 1) % n;

        let i = sample * delayed;
        let q = sample * (delayed + PI as Float / 4.0).cos();
        let phase = q.atan2(i);
        let mut diff = phase - self.prev_phase;
        self.prev_phase = phase;
        while diff > PI as Float {
            diff -= 2.0 * PI as Float;
        }
        while diff < -(PI as Float) {
            diff += 2.0 * PI as Float;
        }
        let (symbol, quality) = self.standard.slice(diff);
        (symbol, quality, diff)
    }
}

/// Local-oscillator PSK demodulator: mixes with a free-running LO at
/// 1800 Hz, low-passes to I/Q internally, then differentiates
/// symbol-to-symbol phase.
pub struct LocalOscillator {
    standard: Standard,
    lo_phase: Float,
    lo_step: Float,
    prev_phase: Float,
    lpf_i: Fir<Float>,
    lpf_q: Fir<Float>,
}

impl LocalOscillator {
    /// `lpf_taps` is the shared low-pass kernel for the I and Q arms.
    pub fn new(standard: Standard, sample_rate: Float, lpf_taps: &[Float]) -> crate::error::Result<Self> {
        Ok(Self {
            standard,
            lo_phase: 0.0,
            lo_step: 2.0 * PI as Float * 1800.0 / sample_rate,
            prev_phase: 0.0,
            lpf_i: Fir::new(lpf_taps)?,
            lpf_q: Fir::new(lpf_taps)?,
        })
    }

    /// The PSK standard this instance decodes.
    #[must_use]
    pub fn standard(&self) -> Standard {
        self.standard
    }

    /// Process one sample, returning `(symbol, quality, demod_out)`.
    pub fn process(&mut self, sample: Float) -> (u8, Float, Float) {
        let mixed_i = sample * self.lo_phase.cos();
        let mixed_q = sample * self.lo_phase.sin();
        self.lo_phase = (self.lo_phase + self.lo_step) % (2.0 * PI as Float);
        let i = self.lpf_i.push(mixed_i);
        let q = self.lpf_q.push(mixed_q);
        let phase = q.atan2(i);
        let mut diff = phase - self.prev_phase;
        self.prev_phase = phase;
        while diff > PI as Float {
            diff -= 2.0 * PI as Float;
        }
        while diff < -(PI as Float) {
            diff += 2.0 * PI as Float;
        }
        let (symbol, quality) = self.standard.slice(diff);
        (symbol, quality, diff)
    }
}

/// Split a Gray-coded symbol value into its MSB-first constituent bits.
#[must_use]
pub fn symbol_to_bits(symbol: u8, bits_per_symbol: u32) -> Vec<u8> {
    (0..bits_per_symbol)
        .rev()
        .map(|shift| (symbol >> shift) & 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v26_gray_is_a_permutation_of_0_3() {
        let mut sorted = V26_GRAY;
        sorted.sort_unstable();
        assert_eq!(sorted, [0, 1, 2, 3]);
    }

    #[test]
    fn v27_gray_is_a_permutation_of_0_7() {
        let mut sorted = V27_GRAY;
        sorted.sort_unstable();
        assert_eq!(sorted, [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn slice_quality_is_bounded() {
        let std_ = Standard::V26Classic;
        for i in 0..100 {
            let phase = (i as Float / 100.0) * 2.0 * PI as Float - PI as Float;
            let (_, q) = std_.slice(phase);
            assert!((0.0..=100.0).contains(&q));
        }
    }

    #[test]
    fn self_correlation_runs_without_panicking() {
        let mut demod = SelfCorrelation::new(Standard::V27, 10);
        for i in 0..200 {
            let s = (2.0 * PI as Float * 1800.0 * i as Float / 48000.0).sin();
            let _ = demod.process(s);
        }
    }

    #[test]
    fn local_oscillator_runs_without_panicking() {
        let sample_rate = 48000.0;
        let taps = crate::dsp::filter::gen_lowpass(1200.0 / sample_rate, 31, crate::dsp::window::WindowType::Hamming).unwrap();
        let mut demod = LocalOscillator::new(Standard::V26B, sample_rate, &taps).unwrap();
        for i in 0..200 {
            let s = (2.0 * PI as Float * 1800.0 * i as Float / sample_rate).sin();
            let _ = demod.process(s);
        }
    }
}
