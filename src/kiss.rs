//! KISS framing convenience encode/decode for the delivery queue's
//! opaque transmit-data blocks. See `spec.md` §4.12.
//!
//! Grounded on the teacher's `src/kiss.rs` (`escape`/`KISS_FEND`
//! framing); `KissDecode::work` in the teacher is a `todo!()` stub,
//! completed here as a plain byte-buffer function rather than a
//! `Block`, since `queue::DeliveryItem::TransmitDataRequest` carries a
//! whole `Vec<u8>` rather than a streamed byte-at-a-time source. This
//! is ambient plumbing for the delivery queue's transmit-data
//! convention, not a KISS TNC server (out of scope per `spec.md` §1).

const KISS_FEND: u8 = 0xC0;
const KISS_FESC: u8 = 0xDB;
const KISS_TFEND: u8 = 0xDC;
const KISS_TFESC: u8 = 0xDD;

/// Frame a single data block (KISS command 0, "data frame on port 0"):
/// `FEND`, a port/command byte, the escaped payload, then `FEND`.
#[must_use]
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut ret = Vec::with_capacity((3 + payload.len()) * 110 / 100);
    ret.push(KISS_FEND);
    ret.push(0);
    for &b in payload {
        match b {
            KISS_FEND => ret.extend([KISS_FESC, KISS_TFEND]),
            KISS_FESC => ret.extend([KISS_FESC, KISS_TFESC]),
            b => ret.push(b),
        }
    }
    ret.push(KISS_FEND);
    ret
}

/// Unescape and strip the framing from one KISS-encoded block, which
/// must begin and end with `FEND` and carry the command byte in
/// between. Returns the decoded payload.
pub fn decode(framed: &[u8]) -> Option<Vec<u8>> {
    let inner = framed.strip_prefix(&[KISS_FEND])?.strip_suffix(&[KISS_FEND])?;
    let (_command, body) = inner.split_first()?;
    let mut out = Vec::with_capacity(body.len());
    let mut escaped = false;
    for &b in body {
        if escaped {
            match b {
                KISS_TFEND => out.push(KISS_FEND),
                KISS_TFESC => out.push(KISS_FESC),
                _ => return None,
            }
            escaped = false;
        } else if b == KISS_FESC {
            escaped = true;
        } else {
            out.push(b);
        }
    }
    if escaped {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_empty() {
        let out = encode(&[]);
        assert_eq!(out, vec![KISS_FEND, 0, KISS_FEND]);
    }

    #[test]
    fn encode_escapes_special_bytes() {
        let out = encode(b"fo\xC0o\xDB");
        let want = &[
            KISS_FEND, 0, b'f', b'o', KISS_FESC, KISS_TFEND, b'o', KISS_FESC, KISS_TFESC, KISS_FEND,
        ];
        assert_eq!(out, want);
    }

    #[test]
    fn decode_rejects_missing_framing() {
        assert!(decode(&[1, 2, 3]).is_none());
    }

    #[test]
    fn decode_rejects_dangling_escape() {
        let mut framed = vec![KISS_FEND, 0, KISS_FESC];
        framed.push(KISS_FEND);
        assert!(decode(&framed).is_none());
    }

    #[test]
    fn encode_decode_roundtrip() {
        for seed in 0..30u32 {
            let data: Vec<u8> = (0..(seed % 20))
                .map(|i| (i as u8).wrapping_mul(53).wrapping_add(seed as u8))
                .collect();
            let framed = encode(&data);
            assert_eq!(framed.first(), Some(&KISS_FEND));
            assert_eq!(framed.last(), Some(&KISS_FEND));
            let back = decode(&framed).unwrap();
            assert_eq!(back, data);
        }
    }
}
