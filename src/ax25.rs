//! AX.25 packet object: addresses, control field, PID, and the HDLC
//! frame body (the bytes between the two flags, FCS excluded).
//!
//! Grounded on the address/control parsing done inline (and only
//! partially) in the teacher's `il2p_deframer.rs::Header` and the PID
//! table in its `Pids` enum; generalized here into a standalone,
//! round-trippable packet object per `spec.md` §3, since the teacher
//! never builds a full AX.25 frame object of its own (it only ever
//! forwards raw deframed bytes downstream).

use crate::callsign::Callsign;
use crate::error::{Error, Result};

/// Protocol identifier values the core must recognise (`spec.md` §3).
pub mod pid {
    /// ISO 8208/CCITT X.25 PLP.
    pub const ISO_8208: u8 = 0x01;
    /// Compressed TCP/IP (Van Jacobson).
    pub const COMPRESSED_TCPIP: u8 = 0x06;
    /// Uncompressed TCP/IP.
    pub const UNCOMPRESSED_TCPIP: u8 = 0x07;
    /// Segmentation fragment.
    pub const SEGMENTATION_FRAGMENT: u8 = 0x08;
    /// AX.25 layer 3, implemented.
    pub const AX25_LAYER3: u8 = 0x20;
    /// ARPA internet protocol.
    pub const ARPA_IP: u8 = 0xCC;
    /// ARPA address resolution.
    pub const ARPA_ARP: u8 = 0xCD;
    /// FlexNet.
    pub const FLEXNET: u8 = 0xCE;
    /// TheNET.
    pub const THENET: u8 = 0xCF;
    /// No layer 3 (e.g. APRS).
    pub const NO_LAYER3: u8 = 0xF0;
}

/// One address slot: destination, source, or a digipeater repeater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Callsign + SSID.
    pub callsign: Callsign,
    /// Command/response bit (meaning depends on position: set on the
    /// destination for a command frame, on the source for a response).
    pub command_response: bool,
    /// Has-been-repeated bit; only meaningful on repeater addresses.
    pub has_been_repeated: bool,
}

impl Address {
    fn encode(&self, last: bool) -> [u8; 7] {
        let mut out = self.callsign.encode_ax25(self.command_response, last);
        if self.has_been_repeated {
            out[6] |= 0x80;
        }
        out
    }

    fn decode(bytes: &[u8; 7]) -> Result<(Self, bool)> {
        let (callsign, command_response, has_been_repeated, last) =
            Callsign::decode_ax25(bytes)?;
        Ok((
            Self {
                callsign,
                command_response,
                has_been_repeated,
            },
            last,
        ))
    }
}

/// S-frame supervisory subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SKind {
    /// Receive Ready.
    Rr,
    /// Receive Not Ready.
    Rnr,
    /// Reject.
    Rej,
    /// Selective Reject.
    Srej,
}

/// U-frame unnumbered subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UKind {
    /// Set Asynchronous Balanced Mode (modulo 8).
    Sabm,
    /// Set Asynchronous Balanced Mode Extended (modulo 128).
    Sabme,
    /// Disconnect.
    Disc,
    /// Disconnected Mode.
    Dm,
    /// Unnumbered Acknowledge.
    Ua,
    /// Frame Reject.
    Frmr,
    /// Unnumbered Information.
    Ui,
    /// Exchange Identification.
    Xid,
    /// Test.
    Test,
}

/// Decoded control-field frame type, independent of 1- vs 2-byte
/// on-wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Information frame, carries `N(S)`/`N(R)` and a PID + info.
    I {
        /// Send sequence number.
        ns: u8,
        /// Receive sequence number.
        nr: u8,
        /// Poll/final bit.
        pf: bool,
    },
    /// Supervisory frame, carries `N(R)` only.
    S {
        /// Supervisory subtype.
        kind: SKind,
        /// Receive sequence number.
        nr: u8,
        /// Poll/final bit.
        pf: bool,
    },
    /// Unnumbered frame.
    U {
        /// Unnumbered subtype.
        kind: UKind,
        /// Poll/final bit.
        pf: bool,
    },
}

impl FrameKind {
    /// Whether this frame carries a PID byte (I and UI only).
    #[must_use]
    pub fn has_pid(&self) -> bool {
        matches!(self, FrameKind::I { .. }) || matches!(self, FrameKind::U { kind: UKind::Ui, .. })
    }

    /// Whether this frame requires modulo-128 (2-byte) control encoding.
    #[must_use]
    pub fn requires_modulo128(&self, modulo128: bool) -> bool {
        modulo128 || matches!(self, FrameKind::U { kind: UKind::Sabme, .. })
    }

    /// Encode into 1 (modulo 8) or 2 (modulo 128) control bytes.
    #[must_use]
    pub fn encode(&self, modulo128: bool) -> Vec<u8> {
        let modulo128 = self.requires_modulo128(modulo128);
        match *self {
            FrameKind::I { ns, nr, pf } => {
                if modulo128 {
                    let lo = (ns << 1) & 0xfe;
                    let hi = (nr << 1) | if pf { 1 } else { 0 };
                    vec![lo, hi]
                } else {
                    let pf_bit = if pf { 0x10 } else { 0 };
                    vec![(nr << 5) | pf_bit | (ns << 1)]
                }
            }
            FrameKind::S { kind, nr, pf } => {
                let base = skind_code(kind);
                if modulo128 {
                    let lo = base | if pf { 0x01 } else { 0 };
                    vec![lo, nr << 1]
                } else {
                    let pf_bit = if pf { 0x10 } else { 0 };
                    vec![(nr << 5) | pf_bit | base]
                }
            }
            FrameKind::U { kind, pf } => {
                let pf_bit = if pf { 0x10 } else { 0 };
                vec![ukind_code(kind) | pf_bit]
            }
        }
    }

    /// Decode 1 or 2 control bytes (caller determines modulo-128 via
    /// the low 2 bits of the first byte: `0b11` marks S/U frames).
    pub fn decode(bytes: &[u8], modulo128: bool) -> Result<(Self, usize)> {
        if bytes.is_empty() {
            return Err(Error::InvalidPacket("empty control field".into()));
        }
        let first = bytes[0];
        if first & 1 == 0 {
            // I frame.
            if modulo128 {
                if bytes.len() < 2 {
                    return Err(Error::InvalidPacket("truncated modulo-128 I control".into()));
                }
                let ns = (first >> 1) & 0x7f;
                let nr = (bytes[1] >> 1) & 0x7f;
                let pf = bytes[1] & 1 != 0;
                Ok((FrameKind::I { ns, nr, pf }, 2))
            } else {
                let ns = (first >> 1) & 0x7;
                let nr = (first >> 5) & 0x7;
                let pf = first & 0x10 != 0;
                Ok((FrameKind::I { ns, nr, pf }, 1))
            }
        } else if first & 2 == 0 {
            // S frame.
            let kind = skind_from_code(first & 0x0c)?;
            if modulo128 {
                if bytes.len() < 2 {
                    return Err(Error::InvalidPacket("truncated modulo-128 S control".into()));
                }
                let pf = first & 1 != 0;
                let nr = (bytes[1] >> 1) & 0x7f;
                Ok((FrameKind::S { kind, nr, pf }, 2))
            } else {
                let nr = (first >> 5) & 0x7;
                let pf = first & 0x10 != 0;
                Ok((FrameKind::S { kind, nr, pf }, 1))
            }
        } else {
            // U frame.
            let kind = ukind_from_code(first & !0x10)?;
            let pf = first & 0x10 != 0;
            Ok((FrameKind::U { kind, pf }, 1))
        }
    }
}

fn skind_code(kind: SKind) -> u8 {
    match kind {
        SKind::Rr => 0x01,
        SKind::Rnr => 0x05,
        SKind::Rej => 0x09,
        SKind::Srej => 0x0d,
    }
}

fn skind_from_code(code: u8) -> Result<SKind> {
    match code {
        0x00 => Ok(SKind::Rr),
        0x04 => Ok(SKind::Rnr),
        0x08 => Ok(SKind::Rej),
        0x0c => Ok(SKind::Srej),
        _ => Err(Error::InvalidPacket(format!("bad S-frame code {code:#x}"))),
    }
}

fn ukind_code(kind: UKind) -> u8 {
    match kind {
        UKind::Sabm => 0x2f,
        UKind::Sabme => 0x6f,
        UKind::Disc => 0x43,
        UKind::Dm => 0x0f,
        UKind::Ua => 0x63,
        UKind::Frmr => 0x87,
        UKind::Ui => 0x03,
        UKind::Xid => 0xaf,
        UKind::Test => 0xe3,
    }
}

fn ukind_from_code(code: u8) -> Result<UKind> {
    match code {
        0x2f => Ok(UKind::Sabm),
        0x6f => Ok(UKind::Sabme),
        0x43 => Ok(UKind::Disc),
        0x0f => Ok(UKind::Dm),
        0x63 => Ok(UKind::Ua),
        0x87 => Ok(UKind::Frmr),
        0x03 => Ok(UKind::Ui),
        0xaf => Ok(UKind::Xid),
        0xe3 => Ok(UKind::Test),
        _ => Err(Error::InvalidPacket(format!("bad U-frame code {code:#x}"))),
    }
}

/// A complete AX.25 frame body (the bytes that sit between the two
/// HDLC flags, FCS excluded — the FCS itself is the framer's concern,
/// not the packet object's).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Destination, source, then 0..8 repeaters.
    pub addresses: Vec<Address>,
    /// Whether this frame uses modulo-128 control encoding.
    pub modulo128: bool,
    /// Decoded control field.
    pub control: FrameKind,
    /// Protocol ID (I and UI frames only).
    pub pid: Option<u8>,
    /// Information field.
    pub info: Vec<u8>,
}

const MAX_INFO_LEN: usize = 330;

impl Packet {
    /// Validate the structural invariants from `spec.md` §3.
    pub fn validate(&self) -> Result<()> {
        if self.addresses.len() < 2 || self.addresses.len() > 10 {
            return Err(Error::InvalidPacket(format!(
                "num_addr {} out of range 2..=10",
                self.addresses.len()
            )));
        }
        let cr_count = self.addresses.iter().filter(|a| a.command_response).count();
        if cr_count != 1 {
            return Err(Error::InvalidPacket(format!(
                "expected exactly 1 address with command/response resolved, got {cr_count}"
            )));
        }
        if self.pid.is_some() != self.control.has_pid() {
            return Err(Error::InvalidPacket(
                "PID presence disagrees with frame type".into(),
            ));
        }
        if self.info.len() > MAX_INFO_LEN {
            return Err(Error::InvalidPacket(format!(
                "info field {} bytes exceeds {MAX_INFO_LEN}",
                self.info.len()
            )));
        }
        Ok(())
    }

    /// Serialize to the raw AX.25 byte sequence (addresses, control,
    /// optional PID, info). Excludes the HDLC flags and FCS.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut out = Vec::with_capacity(self.addresses.len() * 7 + 2 + self.info.len());
        let last_idx = self.addresses.len() - 1;
        for (i, addr) in self.addresses.iter().enumerate() {
            out.extend(addr.encode(i == last_idx));
        }
        out.extend(self.control.encode(self.modulo128));
        if let Some(pid) = self.pid {
            out.push(pid);
        }
        out.extend(&self.info);
        Ok(out)
    }

    /// Parse the raw AX.25 byte sequence produced by [`Packet::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut addresses = Vec::new();
        let mut pos = 0;
        loop {
            if pos + 7 > bytes.len() {
                return Err(Error::InvalidPacket("truncated address field".into()));
            }
            let mut raw = [0u8; 7];
            raw.copy_from_slice(&bytes[pos..pos + 7]);
            let (addr, last) = Address::decode(&raw)?;
            pos += 7;
            addresses.push(addr);
            if last || addresses.len() == 10 {
                break;
            }
        }
        if bytes.len() <= pos {
            return Err(Error::InvalidPacket("no control field".into()));
        }
        // Modulo-128 cannot be determined from the control byte alone
        // for I/S frames without protocol context; try modulo-8 first
        // since it's by far the common case, and fall back to 128 if
        // the resulting frame length disagrees with a PID/info split.
        let (control, modulo128, consumed) = match FrameKind::decode(&bytes[pos..], false) {
            Ok((c, n)) => (c, false, n),
            Err(_) => {
                let (c, n) = FrameKind::decode(&bytes[pos..], true)?;
                (c, true, n)
            }
        };
        pos += consumed;
        let pid = if control.has_pid() {
            if pos >= bytes.len() {
                return Err(Error::InvalidPacket("missing PID byte".into()));
            }
            let p = bytes[pos];
            pos += 1;
            Some(p)
        } else {
            None
        };
        let info = bytes[pos..].to_vec();
        let pkt = Self {
            addresses,
            modulo128,
            control,
            pid,
            info,
        };
        pkt.validate()?;
        Ok(pkt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(call: &str, cr: bool, hbr: bool) -> Address {
        Address {
            callsign: Callsign::parse(call).unwrap(),
            command_response: cr,
            has_been_repeated: hbr,
        }
    }

    #[test]
    fn ui_frame_roundtrip() {
        let pkt = Packet {
            addresses: vec![addr("CQ", false, false), addr("KK4HEJ-7", true, false)],
            modulo128: false,
            control: FrameKind::U {
                kind: UKind::Ui,
                pf: false,
            },
            pid: Some(pid::NO_LAYER3),
            info: b"hello".to_vec(),
        };
        let bytes = pkt.encode().unwrap();
        let back = Packet::decode(&bytes).unwrap();
        assert_eq!(back, pkt);
    }

    #[test]
    fn i_frame_modulo8_roundtrip() {
        let pkt = Packet {
            addresses: vec![addr("KA2DEW-2", false, false), addr("KK4HEJ-7", true, false)],
            modulo128: false,
            control: FrameKind::I {
                ns: 3,
                nr: 5,
                pf: true,
            },
            pid: Some(pid::NO_LAYER3),
            info: b"data".to_vec(),
        };
        let bytes = pkt.encode().unwrap();
        let back = Packet::decode(&bytes).unwrap();
        assert_eq!(back, pkt);
    }

    #[test]
    fn s_frame_roundtrip() {
        for kind in [SKind::Rr, SKind::Rnr, SKind::Rej, SKind::Srej] {
            let pkt = Packet {
                addresses: vec![addr("KA2DEW-2", false, false), addr("KK4HEJ-7", true, false)],
                modulo128: false,
                control: FrameKind::S { kind, nr: 2, pf: false },
                pid: None,
                info: vec![],
            };
            let bytes = pkt.encode().unwrap();
            let back = Packet::decode(&bytes).unwrap();
            assert_eq!(back, pkt);
        }
    }

    #[test]
    fn rejects_two_command_response_bits() {
        let pkt = Packet {
            addresses: vec![addr("CQ", true, false), addr("KK4HEJ-7", true, false)],
            modulo128: false,
            control: FrameKind::U {
                kind: UKind::Ui,
                pf: false,
            },
            pid: Some(pid::NO_LAYER3),
            info: vec![],
        };
        assert!(pkt.validate().is_err());
    }

    #[test]
    fn rejects_too_few_addresses() {
        let pkt = Packet {
            addresses: vec![addr("CQ", true, false)],
            modulo128: false,
            control: FrameKind::U {
                kind: UKind::Ui,
                pf: false,
            },
            pid: Some(pid::NO_LAYER3),
            info: vec![],
        };
        assert!(pkt.validate().is_err());
    }

    #[test]
    fn modulo128_sabme_roundtrip() {
        let pkt = Packet {
            addresses: vec![addr("KA2DEW-2", false, false), addr("KK4HEJ-7", true, false)],
            modulo128: true,
            control: FrameKind::U {
                kind: UKind::Sabme,
                pf: true,
            },
            pid: None,
            info: vec![],
        };
        let bytes = pkt.encode().unwrap();
        let back = Packet::decode(&bytes).unwrap();
        assert_eq!(back, pkt);
    }

    #[test]
    fn repeater_address_chain() {
        let pkt = Packet {
            addresses: vec![
                addr("CQ", false, false),
                addr("KK4HEJ-7", true, false),
                addr("KK4HEJ-1", false, true),
            ],
            modulo128: false,
            control: FrameKind::U {
                kind: UKind::Ui,
                pf: false,
            },
            pid: Some(pid::NO_LAYER3),
            info: vec![],
        };
        let bytes = pkt.encode().unwrap();
        let back = Packet::decode(&bytes).unwrap();
        assert_eq!(back.addresses.len(), 3);
        assert!(back.addresses[2].has_been_repeated);
    }
}
