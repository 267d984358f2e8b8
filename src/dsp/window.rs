//! Window functions used by the filter-kernel generators.
//!
//! Grounded on the teacher's `src/window.rs` (`WindowType`/`Window`,
//! the Hamming/Blackman formulas); extended with Truncated, Cosine and
//! FlatTop per `spec.md` §4.1, which the teacher never implements.

use crate::Float;

const PI: Float = std::f64::consts::PI as Float;

/// A generated set of per-tap window weights.
pub struct Window(pub Vec<Float>);

/// Window function selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// No windowing (all weights 1).
    Truncated,
    /// Raised-cosine taper.
    Cosine,
    /// Hamming window, coefficients `0.53836`/`0.46164`.
    Hamming,
    /// Blackman window.
    Blackman,
    /// Flat-top window.
    FlatTop,
}

impl WindowType {
    /// Generate `size` window weights.
    #[must_use]
    pub fn make_window(&self, size: usize) -> Window {
        match self {
            WindowType::Truncated => Window(vec![1.0; size]),
            WindowType::Cosine => cosine(size),
            WindowType::Hamming => hamming(size),
            WindowType::Blackman => blackman(size),
            WindowType::FlatTop => flat_top(size),
        }
    }
}

fn cosine(size: usize) -> Window {
    let center = (size - 1) as Float / 2.0;
    Window(
        (0..size)
            .map(|j| ((j as Float - center) * PI / size as Float).cos())
            .collect(),
    )
}

fn hamming(size: usize) -> Window {
    let denom = (size - 1).max(1) as Float;
    Window(
        (0..size)
            .map(|j| 0.53836 - 0.46164 * (2.0 * PI * j as Float / denom).cos())
            .collect(),
    )
}

fn blackman(size: usize) -> Window {
    const A: Float = 0.16;
    let a0 = (1.0 - A) / 2.0;
    let a1 = 0.5;
    let a2 = A / 2.0;
    let m = size as Float;
    Window(
        (0..size)
            .map(|n| {
                let n = n as Float;
                let t1 = 2.0 * PI * n / m;
                let t2 = 4.0 * PI * n / m;
                a0 - a1 * t1.cos() + a2 * t2.cos()
            })
            .collect(),
    )
}

fn flat_top(size: usize) -> Window {
    const A0: Float = 0.21557895;
    const A1: Float = 0.41663158;
    const A2: Float = 0.277263158;
    const A3: Float = 0.083578947;
    const A4: Float = 0.006947368;
    let denom = (size - 1).max(1) as Float;
    Window(
        (0..size)
            .map(|n| {
                let n = n as Float;
                let t1 = 2.0 * PI * n / denom;
                A0 - A1 * t1.cos() + A2 * (2.0 * t1).cos() - A3 * (3.0 * t1).cos()
                    + A4 * (4.0 * t1).cos()
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_is_all_ones() {
        let w = WindowType::Truncated.make_window(5);
        assert_eq!(w.0, vec![1.0; 5]);
    }

    #[test]
    fn hamming_endpoints_match_formula() {
        let w = WindowType::Hamming.make_window(3);
        assert!((w.0[0] - (0.53836 - 0.46164)).abs() < 1e-6);
        assert!((w.0[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_peaks_at_center() {
        let w = WindowType::Cosine.make_window(5);
        let (peak_idx, _) = w
            .0
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(peak_idx, 2);
    }

    #[test]
    fn all_windows_produce_requested_length() {
        for wt in [
            WindowType::Truncated,
            WindowType::Cosine,
            WindowType::Hamming,
            WindowType::Blackman,
            WindowType::FlatTop,
        ] {
            assert_eq!(wt.make_window(17).0.len(), 17);
        }
    }
}
