//! The two seams between this crate and its out-of-core collaborators
//! (audio drivers, client-protocol servers): `AudioSource` feeds
//! samples in, `FrameSink` reports decoded frames and link-state
//! transitions out. See `spec.md` §6.
//!
//! Grounded on the teacher's `src/blocks.rs` re-export pattern for how
//! it exposes pluggable block implementations at a stable seam;
//! `spec.md`'s out-of-core collaborators (audio device drivers,
//! Igate, KISS/AGWPE servers) are modeled here as trait objects the
//! receive supervisor is handed at construction, rather than as
//! concrete types the core would otherwise have to depend on.

use crate::arbiter::FecKind;
use crate::ax25::Packet;

/// Channel activity kind for [`FrameSink::channel_busy`].
pub use crate::queue::ActivityKind;

/// Upward-facing callback surface the receive core invokes when a
/// frame completes or a channel's activity state changes.
pub trait FrameSink: Send {
    /// A frame is ready for delivery (already arbitrated if the
    /// channel has more than one subchannel/slicer).
    fn deliver(
        &self,
        channel: usize,
        subchannel: usize,
        slice: usize,
        packet: Packet,
        level: f64,
        fec_kind: FecKind,
        retries: u32,
        spectrum: String,
    );

    /// Data-carrier-detect transitioned on this subchannel/slicer.
    fn dcd_change(&self, channel: usize, subchannel: usize, slice: usize, detected: bool);

    /// PTT or DCD activity transition reported back from a higher
    /// layer into the queue.
    fn channel_busy(&self, channel: usize, subchannel: usize, slice: usize, kind: ActivityKind, busy: bool);
}

/// Downward-facing source of audio samples the receive supervisor
/// pulls from, one device at a time.
pub trait AudioSource: Send {
    /// Return the next sample as a signed 16-bit value widened into
    /// `i32`; values `>= 65536` (or `< -65536`) signal end-of-stream
    /// per `spec.md` §6.
    fn audio_get(&mut self, device: usize) -> i32;
}

/// Sentinel [`AudioSource::audio_get`] return value meaning
/// end-of-stream.
pub const EOF_SENTINEL: i32 = 65536;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        delivered: Mutex<Vec<(usize, usize, usize)>>,
    }

    impl FrameSink for RecordingSink {
        fn deliver(
            &self,
            channel: usize,
            subchannel: usize,
            slice: usize,
            _packet: Packet,
            _level: f64,
            _fec_kind: FecKind,
            _retries: u32,
            _spectrum: String,
        ) {
            self.delivered.lock().unwrap().push((channel, subchannel, slice));
        }

        fn dcd_change(&self, _channel: usize, _subchannel: usize, _slice: usize, _detected: bool) {}

        fn channel_busy(
            &self,
            _channel: usize,
            _subchannel: usize,
            _slice: usize,
            _kind: ActivityKind,
            _busy: bool,
        ) {
        }
    }

    #[test]
    fn eof_sentinel_is_out_of_16bit_range() {
        assert!(EOF_SENTINEL > i16::MAX as i32);
    }

    #[test]
    fn frame_sink_is_object_safe_and_callable() {
        let sink: Box<dyn FrameSink> = Box::new(RecordingSink {
            delivered: Mutex::new(Vec::new()),
        });
        sink.dcd_change(0, 0, 0, true);
        sink.channel_busy(0, 0, 0, ActivityKind::Dcd, true);
    }
}
