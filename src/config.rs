//! Configuration records consumed by the receive core.
//!
//! Parsing of a configuration *file* is out of scope (see `spec.md`
//! §1); this module only defines the validated, in-memory records the
//! core expects to be handed at startup, and the one piece of parsing
//! logic that stays in-core because it's a wire-adjacent detail: the
//! profile-letter string (spec.md §9's "`+` profile means max
//! slicers" side channel).

use crate::error::{Error, Result};

/// Compile-time bounds. See `spec.md` §6.
pub const MAX_SUBCHANS: usize = 9;
/// Compile-time bounds. See `spec.md` §6.
pub const MAX_SLICERS: usize = 9;
/// Compile-time bounds. See `spec.md` §6.
pub const MAX_FILTER_SIZE: usize = 480;
/// DCD latches on when `popcount(score) >= DCD_THRESH_ON`.
pub const DCD_THRESH_ON: u32 = 30;
/// DCD latches off when `popcount(score) <= DCD_THRESH_OFF`.
pub const DCD_THRESH_OFF: u32 = 6;
/// Width, in 2^20ths of a PLL cycle, of the "good" zero-crossing window.
pub const DCD_GOOD_WIDTH: i64 = 1024;
/// Candidates are arbitrated after this many bit periods of age.
pub const PROCESS_AFTER_BITS: u32 = 3;
/// PLL accumulator wraps every `2^32` ticks.
pub const TICKS_PER_PLL_CYCLE: i64 = 1i64 << 32;
/// Minimum sample_rate/baud ratio the DPLL can usefully track.
pub const MIN_BAUD_RATIO: f64 = 3.0;

/// The kind of modem running on a channel or subchannel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModemKind {
    /// Audio frequency-shift keying (e.g. Bell 202, 300 baud).
    Afsk,
    /// V.26 quadrature phase-shift keying, 2400 baud.
    Qpsk,
    /// V.27 8-phase phase-shift keying, 4800 baud.
    Psk8,
    /// Scrambled NRZ baseband (G3RUH), 9600+ baud.
    Baseband,
    /// AIS baseband variant (GMSK-like, treated as baseband family).
    Ais,
    /// EAS baseband variant, treated as baseband family but never PASSALL.
    Eas,
}

impl ModemKind {
    /// Whether PASSALL (deliver frames with a known-bad CRC) may ever
    /// be enabled for this modem kind. See `spec.md` §9 open question.
    #[must_use]
    pub fn passall_allowed(&self) -> bool {
        !matches!(self, ModemKind::Ais | ModemKind::Eas)
    }
}

/// Which framing layer a channel is decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Framing {
    /// Legacy bit-stuffed AX.25 HDLC.
    Hdlc,
    /// IL2P (Reed-Solomon protected, no bit-stuffing).
    Il2p,
}

/// The medium a logical channel is attached to. Only `Radio` channels
/// own demodulator state; the others are handled entirely by
/// out-of-core collaborators and only pass through the delivery queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Medium {
    /// A radio receive channel, demodulated in-core.
    Radio,
    /// A network TNC (KISS-over-TCP or similar); frames arrive pre-decoded.
    NetworkTnc,
    /// An Igate/Internet gateway connection.
    Igate,
    /// No medium; channel slot unused.
    None,
}

/// A single demodulator profile: a letter (A, B, C, …) optionally
/// followed by `+` meaning "use the maximum number of slicers".
///
/// Grounded on spec.md §9's call to replace the "`+` stashed in a
/// string" pattern with an explicit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSet {
    /// One profile letter per configured subchannel.
    pub letters: Vec<char>,
    /// Whether `+` was present, requesting `MAX_SLICERS` slicers.
    pub max_slicers: bool,
}

impl ProfileSet {
    /// Parse a profile string as used in channel configuration.
    ///
    /// An empty string defaults to `"A+"`. A bare `"+"` is a
    /// configuration error (spec.md §8 boundary case).
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self {
                letters: vec!['A'],
                max_slicers: true,
            });
        }
        let max_slicers = s.ends_with('+');
        let letters_str = if max_slicers { &s[..s.len() - 1] } else { s };
        if letters_str.is_empty() {
            return Err(Error::InvalidProfile(s.to_string()));
        }
        let mut letters = Vec::with_capacity(letters_str.len());
        for ch in letters_str.chars() {
            if !ch.is_ascii_uppercase() {
                return Err(Error::InvalidProfile(s.to_string()));
            }
            letters.push(ch);
        }
        if letters.len() > MAX_SUBCHANS {
            return Err(Error::OutOfRange {
                what: "num_subchannels",
                got: letters.len(),
                max: MAX_SUBCHANS,
            });
        }
        Ok(Self {
            letters,
            max_slicers,
        })
    }

    /// Number of subchannels this profile set implies.
    #[must_use]
    pub fn num_subchannels(&self) -> usize {
        self.letters.len()
    }

    /// Number of slicers per subchannel this profile set implies.
    #[must_use]
    pub fn num_slicers(&self) -> usize {
        if self.max_slicers { MAX_SLICERS } else { 1 }
    }
}

/// Retry strategy applied to frames that fail CRC, per `spec.md` §4.3/§7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FixBitsStrategy {
    /// Discard frames with a bad CRC.
    None,
    /// Retry with every single-bit flip.
    InvertSingle,
    /// Retry with every pair of bit flips separated by at least one bit.
    InvertTwoSeparated,
}

/// Per-channel radio configuration, validated at construction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChannelConfig {
    /// Logical channel number, 0..N-1.
    pub channel: usize,
    /// Medium this channel is attached to.
    pub medium: Medium,
    /// Symbol rate, in baud.
    pub baud: f64,
    /// Modem kind.
    pub modem: ModemKind,
    /// Framing layer.
    pub framing: Framing,
    /// Profile letters + max-slicers flag.
    #[serde(skip)]
    pub profiles: ProfileSet,
    /// Mark frequency (AFSK) or center frequency (PSK/baseband), Hz.
    pub mark_freq: f64,
    /// Space frequency (AFSK only), Hz.
    pub space_freq: f64,
    /// Sample-domain decimation factor applied before demod.
    pub decimation: u32,
    /// Upsample factor for the baseband polyphase filter bank.
    pub upsample: u32,
    /// Bit-fix retry strategy applied on CRC failure.
    pub fix_bits: FixBitsStrategy,
    /// Whether to pass frames with an uncorrectable CRC through anyway.
    pub pass_all: bool,
    /// V.26 alternate ("B"/MFJ) phase convention.
    pub v26_alt: bool,
    /// Use `max_fec` (16-parity, 239-byte blocks) for IL2P transmit.
    pub il2p_max_fec: bool,
}

impl ChannelConfig {
    /// Validate invariants from `spec.md` §3/§7.
    pub fn validate(&self, sample_rate: f64) -> Result<()> {
        if self.profiles.num_subchannels() == 0 || self.profiles.num_subchannels() > MAX_SUBCHANS
        {
            return Err(Error::OutOfRange {
                what: "num_subchannels",
                got: self.profiles.num_subchannels(),
                max: MAX_SUBCHANS,
            });
        }
        let slicers = self.profiles.num_slicers();
        if slicers == 0 || slicers > MAX_SLICERS {
            return Err(Error::OutOfRange {
                what: "num_slicers",
                got: slicers,
                max: MAX_SLICERS,
            });
        }
        let ratio = sample_rate / self.baud;
        if ratio < MIN_BAUD_RATIO {
            return Err(Error::BaudRatioTooLow {
                ratio,
                min: MIN_BAUD_RATIO,
            });
        }
        if !self.modem.passall_allowed() && self.pass_all {
            return Err(Error::InvalidProfile(
                "pass_all not allowed for this modem kind".to_string(),
            ));
        }
        Ok(())
    }

    /// `PLL_STEP = round(2^32 * baud / sample_rate)`, per `spec.md` §3.
    #[must_use]
    pub fn pll_step(&self, sample_rate: f64) -> u32 {
        (TICKS_PER_PLL_CYCLE as f64 * self.baud / sample_rate).round() as u32
    }
}

/// Per-device audio configuration, read-only for the core after init.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeviceConfig {
    /// Device identifier (opaque to the core; used for logging).
    pub name: String,
    /// Sample rate, Hz.
    pub sample_rate: f64,
    /// Bits per sample, 8 or 16.
    pub bits_per_sample: u8,
    /// Number of audio channels (not to be confused with logical channels).
    pub audio_channels: u8,
    /// Logical receive channels serviced by this device.
    pub channels: Vec<ChannelConfig>,
}
