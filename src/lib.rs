#![warn(missing_docs)]
/*! Amateur radio soft-modem and AX.25/IL2P packet engine.

This crate receives audio samples from one or more radio channels,
demodulates AFSK, PSK (V.26/V.27) or scrambled-baseband (G3RUH)
signals, recovers the bit clock with a DPLL, and decodes AX.25 HDLC or
IL2P frames, arbitrating between redundant subchannels/slicers before
handing completed frames to a delivery queue.

# Architecture overview

One [`supervisor::DeviceSupervisor`] thread per audio device pulls
samples from an [`iface::AudioSource`], decimates them per channel, and
feeds each channel's [`channel::Channel`]; transmit-direction data
blocks pulled off the delivery queue are framed with [`kiss`]'s
encode/decode pair. A `Channel` owns a
`[subchannel][slicer]` grid of demodulators
([`demod::afsk`]/[`demod::psk`]/[`demod::baseband`]), each paired with
a [`dpll::Dpll`] for bit-clock recovery and DCD scoring, and a bit-level
framer ([`hdlc::HdlcFramer`] or [`il2p::Il2pFramer`]). Completed frames
land in an [`arbiter::Grid`]; once they've aged enough (or immediately,
on a single-cell channel), [`arbiter::Grid::arbitrate`] picks a winner
and it is handed to the caller's [`iface::FrameSink`] and pushed onto
the shared [`queue::DeliveryQueue`].

```text
 [ AudioSource ]
       |
       v
[ DeviceSupervisor ] (one thread per device)
       |
       v
  [ Channel ] (per logical channel)
       |
   +---+---+---------------+
   |       |               |
[ Demod ] [ Dpll ] -> [ Framer ] -> [ Grid ] -> arbitrate -> [ FrameSink ] + [ DeliveryQueue ]
```

# Links

* Upstream framework this crate's structure descends from:
  <https://github.com/ThomasHabets/rustradio>
*/

pub mod arbiter;
pub mod ax25;
pub mod callsign;
pub mod channel;
pub mod config;
pub mod demod;
pub mod dpll;
pub mod dsp;
pub mod error;
pub mod hdlc;
pub mod iface;
pub mod il2p;
pub mod kiss;
pub mod queue;
pub mod rs;
pub mod supervisor;

/// Float type used. Usually f32, but not guaranteed.
pub type Float = f32;

/// Complex (I/Q) data.
pub type Complex = num_complex::Complex<Float>;

#[cfg(test)]
pub mod tests {
    //! Test helper functions.
    use super::*;

    /// For testing, assert that two slices are almost equal.
    ///
    /// Floating point numbers are almost never exactly equal.
    pub fn assert_almost_equal_complex(left: &[Complex], right: &[Complex]) {
        assert_eq!(
            left.len(),
            right.len(),
            "\nleft: {:?}\nright: {:?}",
            left,
            right
        );
        for i in 0..left.len() {
            let dist = (left[i] - right[i]).norm_sqr().sqrt();
            if dist > 0.001 {
                assert_eq!(
                    left[i], right[i],
                    "\nElement {i}:\nleft: {:?}\nright: {:?}",
                    left, right
                );
            }
        }
    }

    /// For testing, assert that two slices are almost equal.
    ///
    /// Floating point numbers are almost never exactly equal.
    pub fn assert_almost_equal_float(left: &[Float], right: &[Float]) {
        assert_eq!(
            left.len(),
            right.len(),
            "\nleft: {:?}\nright: {:?}",
            left,
            right
        );
        for i in 0..left.len() {
            let dist = (left[i] - right[i]).abs();
            if dist > 0.001 {
                assert_eq!(left[i], right[i], "\nleft: {:?}\nright: {:?}", left, right);
            }
        }
    }
}
