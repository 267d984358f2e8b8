//! FIR kernel generators: windowed low-pass, band-pass, and
//! root-raised-cosine.
//!
//! Grounded on the teacher's `src/fir.rs::low_pass` (sinc-times-window
//! kernel, DC-gain normalization by summing the folded taps),
//! generalized to take an explicit [`WindowType`] and tap count rather
//! than deriving the tap count from a fixed Hamming-attenuation
//! formula, and extended with `gen_bandpass`/`gen_rrc` per `spec.md`
//! §4.1, neither of which the teacher builds.

use crate::config::MAX_FILTER_SIZE;
use crate::dsp::window::WindowType;
use crate::error::{Error, Result};
use crate::Float;

const PI: Float = std::f64::consts::PI as Float;

fn sinc(x: Float) -> Float {
    if x.abs() < 1e-12 { 1.0 } else { x.sin() / x }
}

/// Windowed low-pass kernel, normalized for unity DC gain.
///
/// `fc` is the cutoff as a fraction of the sample rate (`0.0..0.5`).
pub fn gen_lowpass(fc: Float, taps: usize, window: WindowType) -> Result<Vec<Float>> {
    check_taps(taps)?;
    let w = window.make_window(taps).0;
    let m = (taps - 1) as Float / 2.0;
    let mut kernel: Vec<Float> = (0..taps)
        .map(|j| {
            let n = j as Float - m;
            2.0 * fc * sinc(2.0 * PI * fc * n) * w[j]
        })
        .collect();
    normalize_dc_gain(&mut kernel);
    Ok(kernel)
}

/// Windowed band-pass kernel, normalized for unity gain at mid-band
/// `w = 2π(f1+f2)/2`. `f1`/`f2` are fractions of the sample rate.
pub fn gen_bandpass(f1: Float, f2: Float, taps: usize, window: WindowType) -> Result<Vec<Float>> {
    check_taps(taps)?;
    let w = window.make_window(taps).0;
    let m = (taps - 1) as Float / 2.0;
    let mid_w = 2.0 * PI * (f1 + f2) / 2.0;
    let mut kernel: Vec<Float> = (0..taps)
        .map(|j| {
            let n = j as Float - m;
            let hi = 2.0 * f2 * sinc(2.0 * PI * f2 * n);
            let lo = 2.0 * f1 * sinc(2.0 * PI * f1 * n);
            (hi - lo) * w[j]
        })
        .collect();
    normalize_mid_gain(&mut kernel, mid_w);
    Ok(kernel)
}

/// Root-raised-cosine kernel. `taps` is forced odd (`| 1`), kernel sum
/// normalized to 1.
pub fn gen_rrc(taps: usize, rolloff: Float, samples_per_symbol: Float) -> Result<Vec<Float>> {
    let taps = taps | 1;
    check_taps(taps)?;
    let m = (taps - 1) as Float / 2.0;
    let beta = rolloff;
    let mut kernel = vec![0.0 as Float; taps];
    for j in 0..taps {
        let t = (j as Float - m) / samples_per_symbol;
        kernel[j] = if t.abs() < 1e-9 {
            1.0 - beta + 4.0 * beta / PI
        } else if (4.0 * beta * t).abs() > 0.0 && (1.0 - (4.0 * beta * t).powi(2)).abs() < 1e-9 {
            (beta / (2.0_f64 as Float).sqrt())
                * ((1.0 + 2.0 / PI) * (PI / (4.0 * beta)).sin()
                    + (1.0 - 2.0 / PI) * (PI / (4.0 * beta)).cos())
        } else {
            let num = (PI * t * (1.0 - beta)).sin()
                + 4.0 * beta * t * (PI * t * (1.0 + beta)).cos();
            let den = PI * t * (1.0 - (4.0 * beta * t).powi(2));
            num / den
        };
    }
    let sum: Float = kernel.iter().sum();
    if sum.abs() > 1e-12 {
        for k in &mut kernel {
            *k /= sum;
        }
    }
    Ok(kernel)
}

fn check_taps(taps: usize) -> Result<()> {
    if taps > MAX_FILTER_SIZE {
        return Err(Error::FilterTooLarge {
            needed: taps,
            max: MAX_FILTER_SIZE,
        });
    }
    Ok(())
}

fn normalize_dc_gain(kernel: &mut [Float]) {
    let gain: Float = kernel.iter().sum();
    if gain.abs() > 1e-12 {
        for k in kernel.iter_mut() {
            *k /= gain;
        }
    }
}

fn normalize_mid_gain(kernel: &mut [Float], mid_w: Float) {
    let m = (kernel.len() - 1) as Float / 2.0;
    let mut re = 0.0 as Float;
    let mut im = 0.0 as Float;
    for (j, &k) in kernel.iter().enumerate() {
        let n = j as Float - m;
        re += k * (mid_w * n).cos();
        im += k * (mid_w * n).sin();
    }
    let mag = (re * re + im * im).sqrt();
    if mag > 1e-12 {
        for k in kernel.iter_mut() {
            *k /= mag;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowpass_has_unity_dc_gain() {
        let taps = gen_lowpass(0.1, 31, WindowType::Hamming).unwrap();
        let dc: Float = taps.iter().sum();
        assert!((dc - 1.0).abs() < 1e-6);
    }

    #[test]
    fn lowpass_rejects_oversize() {
        assert!(gen_lowpass(0.1, MAX_FILTER_SIZE + 1, WindowType::Hamming).is_err());
    }

    #[test]
    fn bandpass_produces_requested_length() {
        let taps = gen_bandpass(0.1, 0.2, 41, WindowType::Blackman).unwrap();
        assert_eq!(taps.len(), 41);
    }

    #[test]
    fn rrc_forces_odd_length_and_unity_sum() {
        let taps = gen_rrc(40, 0.35, 8.0).unwrap();
        assert_eq!(taps.len() % 2, 1);
        let sum: Float = taps.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn rrc_is_symmetric() {
        let taps = gen_rrc(41, 0.2, 4.0).unwrap();
        for i in 0..taps.len() / 2 {
            assert!((taps[i] - taps[taps.len() - 1 - i]).abs() < 1e-6);
        }
    }
}
