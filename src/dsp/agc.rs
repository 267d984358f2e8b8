//! Single-pole IIR smoothing and the fast-attack/slow-decay AGC built
//! from it.
//!
//! Grounded on the teacher's `src/single_pole_iir_filter.rs`
//! (`SinglePoleIIR`: `prev_output = sample*alpha + prev_output*(1-alpha)`);
//! the AGC envelope/peak/valley tracker in [`Agc`] is new, built from
//! that same primitive twice (fast attack, slow decay) per `spec.md`
//! §4.5's demodulator AGC requirement.

use crate::Float;

/// Exponential-average smoother, `out = in*alpha + prev*(1-alpha)`.
#[derive(Clone, Copy)]
pub struct SinglePoleIir {
    alpha: Float,
    prev: Float,
}

impl SinglePoleIir {
    /// `alpha` must be in `0.0..=1.0`.
    #[must_use]
    pub fn new(alpha: Float) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            prev: 0.0,
        }
    }

    /// Feed one sample, return the smoothed output.
    pub fn filter(&mut self, sample: Float) -> Float {
        self.prev = sample * self.alpha + self.prev * (1.0 - self.alpha);
        self.prev
    }

    /// Current smoothed value without feeding a new sample.
    #[must_use]
    pub fn value(&self) -> Float {
        self.prev
    }
}

/// Fast-attack/slow-decay automatic gain control, tracking envelope
/// peak and valley and normalizing samples to roughly `-1.0..=1.0`.
pub struct Agc {
    peak: SinglePoleIir,
    valley: SinglePoleIir,
    peak_decay: SinglePoleIir,
    valley_decay: SinglePoleIir,
}

impl Agc {
    /// `attack`/`decay` are IIR alphas; attack should be close to 1
    /// (fast), decay close to 0 (slow).
    #[must_use]
    pub fn new(attack: Float, decay: Float) -> Self {
        Self {
            peak: SinglePoleIir::new(attack),
            valley: SinglePoleIir::new(attack),
            peak_decay: SinglePoleIir::new(decay),
            valley_decay: SinglePoleIir::new(decay),
        }
    }

    /// Process one sample, returning the AGC-normalized output.
    pub fn process(&mut self, sample: Float) -> Float {
        if sample > self.peak.value() {
            self.peak.filter(sample);
        } else {
            self.peak_decay_toward(sample);
        }
        if sample < self.valley.value() {
            self.valley.filter(sample);
        } else {
            self.valley_decay_toward(sample);
        }
        let span = self.peak.value() - self.valley.value();
        if span.abs() < 1e-9 {
            0.0
        } else {
            let mid = (self.peak.value() + self.valley.value()) / 2.0;
            (sample - mid) / (span / 2.0)
        }
    }

    fn peak_decay_toward(&mut self, sample: Float) {
        let decayed = self.peak_decay.filter(self.peak.value());
        self.peak = SinglePoleIir {
            alpha: self.peak.alpha,
            prev: decayed.max(sample),
        };
    }

    fn valley_decay_toward(&mut self, sample: Float) {
        let decayed = self.valley_decay.filter(self.valley.value());
        self.valley = SinglePoleIir {
            alpha: self.valley.alpha,
            prev: decayed.min(sample),
        };
    }
}
