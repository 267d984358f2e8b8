//! Streaming FIR convolution over a fixed-length circular history.
//!
//! Grounded on the teacher's `src/fir.rs` `FIR<T>` (reversed-tap
//! dot-product), adapted from one-shot buffer filtering to a
//! per-sample `push`/`output` pair suitable for the demodulator's
//! sample-at-a-time pipeline, since there is no `Stream` to pull a
//! whole buffer from any more.

use crate::config::MAX_FILTER_SIZE;
use crate::error::{Error, Result};

/// A FIR filter with its own circular input history, driven one
/// sample at a time.
#[derive(Clone)]
pub struct Fir<T> {
    taps: Vec<T>,
    history: Vec<T>,
    pos: usize,
}

impl<T> Fir<T>
where
    T: Copy + Default + std::ops::Mul<T, Output = T> + std::ops::Add<T, Output = T>,
{
    /// Build a filter from `taps` (natural order, tap 0 applied to the
    /// most recently pushed sample).
    pub fn new(taps: &[T]) -> Result<Self> {
        if taps.len() > MAX_FILTER_SIZE {
            return Err(Error::FilterTooLarge {
                needed: taps.len(),
                max: MAX_FILTER_SIZE,
            });
        }
        Ok(Self {
            taps: taps.to_vec(),
            history: vec![T::default(); taps.len().max(1)],
            pos: 0,
        })
    }

    /// Number of taps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.taps.len()
    }

    /// Whether this filter has no taps (degenerate, always outputs 0).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Push one new sample and return the filtered output.
    pub fn push(&mut self, sample: T) -> T {
        if self.taps.is_empty() {
            return T::default();
        }
        self.pos = (self.pos + self.history.len() - 1) % self.history.len();
        self.history[self.pos] = sample;
        let n = self.taps.len();
        let mut acc = T::default();
        for (i, &tap) in self.taps.iter().enumerate() {
            acc = acc + self.history[(self.pos + i) % n] * tap;
        }
        acc
    }
}
