//! Crate-wide error type.
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the receive core.
#[derive(Error, Debug)]
pub enum Error {
    /// A filter kernel would need more taps than `MAX_FILTER_SIZE`.
    #[error("filter kernel needs {needed} taps, more than MAX_FILTER_SIZE ({max})")]
    FilterTooLarge {
        /// Number of taps the kernel generator computed.
        needed: usize,
        /// Compile-time bound.
        max: usize,
    },

    /// A channel profile string could not be parsed.
    #[error("invalid profile string {0:?}")]
    InvalidProfile(String),

    /// `num_subchannels`/`num_slicers` outside `1..=MAX_*`.
    #[error("{what} out of range: {got} (allowed 1..={max})")]
    OutOfRange {
        /// Name of the field that was out of range.
        what: &'static str,
        /// The value that was rejected.
        got: usize,
        /// The allowed maximum.
        max: usize,
    },

    /// baud/sample-rate ratio below the minimum the DPLL can track.
    #[error("sample_rate/baud ratio {ratio} is below the minimum of {min}")]
    BaudRatioTooLow {
        /// Computed ratio.
        ratio: f64,
        /// Minimum allowed ratio.
        min: f64,
    },

    /// Reed-Solomon decode could not correct the block.
    #[error("Reed-Solomon decode failed: too many errors for {nroots} parity bytes")]
    RsUncorrectable {
        /// Number of parity bytes configured for the block.
        nroots: usize,
    },

    /// A Reed-Solomon "correction" touched an implicit zero-pad byte.
    #[error("Reed-Solomon correction touched a zero-pad byte outside the received block")]
    RsPadCorruption,

    /// IL2P header decoded with no reported corrections but the
    /// addresses contain characters outside `[A-Z0-9]`.
    #[error("IL2P header decoded with invalid address characters")]
    Il2pBadAddress,

    /// An AX.25 address/packet violated a structural invariant.
    #[error("invalid AX.25 packet: {0}")]
    InvalidPacket(String),

    /// `wait_while_empty` hit its deadline with no item delivered.
    #[error("delivery queue wait timed out")]
    QueueTimeout,

    /// Passthrough for I/O errors (e.g. audio device failures).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
