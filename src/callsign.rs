//! Callsign + SSID parsing, shared by the AX.25 address codec
//! (`ax25`) and the IL2P header codec (`il2p`).
//!
//! Grounded on `decode_callsign` in the teacher's `il2p_deframer.rs`,
//! generalized to also handle the AX.25 on-air 7-byte address
//! encoding (left-shifted ASCII + SSID byte) that the teacher never
//! builds, only tears apart by hand inline in its address parsing.

use crate::error::{Error, Result};

/// A parsed callsign + SSID, e.g. `KK4HEJ-7`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callsign {
    /// Up to 6 upper-case letters/digits.
    pub call: String,
    /// Secondary station ID, 0..15.
    pub ssid: u8,
}

impl Callsign {
    /// Parse `"CALL"` or `"CALL-SSID"`.
    pub fn parse(s: &str) -> Result<Self> {
        let (call, ssid) = match s.split_once('-') {
            Some((c, n)) => (
                c,
                n.parse::<u8>()
                    .map_err(|_| Error::InvalidPacket(format!("bad SSID in {s:?}")))?,
            ),
            None => (s, 0),
        };
        if call.is_empty() || call.len() > 6 {
            return Err(Error::InvalidPacket(format!(
                "callsign {call:?} must be 1-6 chars"
            )));
        }
        if !call.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
            return Err(Error::InvalidPacket(format!(
                "callsign {call:?} must be upper-case letters/digits"
            )));
        }
        if ssid > 15 {
            return Err(Error::InvalidPacket(format!("SSID {ssid} out of range")));
        }
        Ok(Self {
            call: call.to_string(),
            ssid,
        })
    }

    /// Encode into the 7-byte on-air AX.25 address field.
    ///
    /// `command_response`, `reserved`, `has_been_repeated` and
    /// `last` set the low/high bits per `spec.md` §6; the 6 callsign
    /// bytes are the ASCII value left-shifted by one, space-padded.
    #[must_use]
    pub fn encode_ax25(&self, command_response: bool, last: bool) -> [u8; 7] {
        let mut out = [0u8; 7];
        let padded: Vec<u8> = {
            let mut v: Vec<u8> = self.call.bytes().collect();
            v.resize(6, b' ');
            v
        };
        for (i, b) in padded.iter().enumerate() {
            out[i] = b << 1;
        }
        // Byte 6: SSID nibble, reserved bits (both set to 1, per
        // convention), has-been-repeated bit 7 reused as C/R here,
        // end-of-address bit 0.
        out[6] = 0x60 | (self.ssid << 1) | if last { 1 } else { 0 };
        if command_response {
            out[6] |= 0x80;
        }
        out
    }

    /// Decode a 7-byte on-air AX.25 address field.
    ///
    /// Returns the callsign, the command/response bit, the
    /// has-been-repeated bit, and the end-of-address bit.
    pub fn decode_ax25(bytes: &[u8; 7]) -> Result<(Self, bool, bool, bool)> {
        let mut call = String::new();
        for &b in &bytes[..6] {
            let ch = (b >> 1) as char;
            if ch != ' ' {
                call.push(ch);
            }
        }
        if call.is_empty() {
            return Err(Error::InvalidPacket("empty callsign in address".into()));
        }
        let ssid = (bytes[6] >> 1) & 0x0f;
        let command_response = (bytes[6] & 0x80) != 0;
        let has_been_repeated = (bytes[6] & 0x80) != 0; // alias bit, context dependent on position
        let last = (bytes[6] & 0x01) != 0;
        Ok((
            Self {
                call,
                ssid,
            },
            command_response,
            has_been_repeated,
            last,
        ))
    }

    /// Format as `"CALL"` or `"CALL-SSID"`.
    #[must_use]
    pub fn to_display(&self) -> String {
        if self.ssid == 0 {
            self.call.clone()
        } else {
            format!("{}-{}", self.call, self.ssid)
        }
    }
}

impl std::fmt::Display for Callsign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display())
    }
}

/// DEC SIXBIT encoding used by IL2P Type 1 headers: ASCII `' '..'_'`
/// maps to `0..63`; anything outside that range maps to `31`.
#[must_use]
pub fn sixbit_encode(ch: u8) -> u8 {
    if (0x20..=0x5f).contains(&ch) {
        ch - 0x20
    } else {
        31
    }
}

/// Inverse of [`sixbit_encode`].
#[must_use]
pub fn sixbit_decode(v: u8) -> u8 {
    (v & 0x3f) + 0x20
}

/// Encode a callsign (padded/truncated to 6 chars) as 6 SIXBIT values.
#[must_use]
pub fn encode_callsign_sixbit(call: &str) -> [u8; 6] {
    let mut out = [sixbit_encode(b' '); 6];
    for (i, b) in call.bytes().take(6).enumerate() {
        out[i] = sixbit_encode(b);
    }
    out
}

/// Decode 6 SIXBIT values into a callsign string, trimming trailing spaces.
pub fn decode_callsign_sixbit(vals: &[u8; 6]) -> String {
    vals.iter()
        .map(|v| sixbit_decode(*v) as char)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// True if every character is in `[A-Z0-9]`, the guard `spec.md` §4.4
/// requires before accepting an IL2P-decoded address.
#[must_use]
pub fn is_valid_address_chars(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
