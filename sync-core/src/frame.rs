//! Byte-level framing for the tablet's HID link.
//!
//! ## Wire format
//!
//! ```text
//! FEND | escape(payload || checksum(payload)) | FEND
//! ```
//!
//! `FEND` (0xC0) delimits frames. A literal `FEND` or `FESC` (0xDB) inside
//! the payload is replaced by `FESC TFEND` (0xDB 0xDC) or `FESC TFESC`
//! (0xDB 0xDD). The two checksum bytes are appended before escaping, low
//! byte first, so running the checksum over a received payload including
//! its trailer leaves a residue of zero.

use tracing::debug;

use crate::error::SyncError;

/// Frame end.
pub const FEND: u8 = 0xC0;
/// Frame escape.
pub const FESC: u8 = 0xDB;
/// Escaped substitute for `FEND`.
pub const TFEND: u8 = 0xDC;
/// Escaped substitute for `FESC`.
pub const TFESC: u8 = 0xDD;

/// Smallest candidate accepted by the scanner: two payload bytes
/// (channel + header) plus the two checksum bytes.
pub const MIN_CANDIDATE_LEN: usize = 4;

const CHECKSUM_LEN: usize = 2;

// ── Checksum ─────────────────────────────────────────────────────

const LO_TABLE: [u16; 16] = [
    0x0000, 0x1189, 0x2312, 0x329b, 0x4624, 0x57ad, 0x6536, 0x74bf, 0x8c48, 0x9dc1, 0xaf5a,
    0xbed3, 0xca6c, 0xdbe5, 0xe97e, 0xf8f7,
];

const HI_TABLE: [u16; 16] = [
    0x0000, 0x1081, 0x2102, 0x3183, 0x4204, 0x5285, 0x6306, 0x7387, 0x8408, 0x9489, 0xa50a,
    0xb58b, 0xc60c, 0xd68d, 0xe70e, 0xf78f,
];

/// 16-bit running checksum, returned low byte first.
///
/// The accumulator starts at `0xFFFF`; each byte is folded in through two
/// nibble-indexed tables.
pub fn checksum(data: &[u8]) -> [u8; 2] {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        let ch = (byte ^ crc as u8) as usize;
        crc = (crc >> 8) ^ LO_TABLE[ch & 0x0F] ^ HI_TABLE[(ch & 0xF0) >> 4];
    }
    crc.to_le_bytes()
}

/// Returns `true` when `data` (payload followed by its checksum) reduces
/// to a zero residue.
pub fn checksum_ok(data: &[u8]) -> bool {
    checksum(data) == [0x00, 0x00]
}

// ── Escaping ─────────────────────────────────────────────────────

/// Replace every `FEND` / `FESC` with its two-byte escape sequence.
pub fn escape(packet: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(packet.len() + packet.len() / 8 + 2);
    for &byte in packet {
        match byte {
            FEND => out.extend_from_slice(&[FESC, TFEND]),
            FESC => out.extend_from_slice(&[FESC, TFESC]),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape`].
///
/// An escape byte followed by anything other than `TFEND`/`TFESC` yields
/// the following byte unchanged; a trailing lone `FESC` is dropped.
pub fn unescape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut escaped = false;
    for &byte in data {
        if escaped {
            out.push(unescape_byte(byte));
            escaped = false;
        } else if byte == FESC {
            escaped = true;
        } else {
            out.push(byte);
        }
    }
    out
}

fn unescape_byte(byte: u8) -> u8 {
    match byte {
        TFEND => FEND,
        TFESC => FESC,
        other => other,
    }
}

// ── Framing ──────────────────────────────────────────────────────

/// Build a complete wire frame for `packet`.
///
/// Fails with [`SyncError::EmptyPacket`] when there is nothing to send.
pub fn frame(packet: &[u8]) -> Result<Vec<u8>, SyncError> {
    if packet.is_empty() {
        return Err(SyncError::EmptyPacket);
    }

    let mut body = Vec::with_capacity(packet.len() + CHECKSUM_LEN);
    body.extend_from_slice(packet);
    body.extend_from_slice(&checksum(packet));

    let escaped = escape(&body);
    let mut out = Vec::with_capacity(escaped.len() + 2);
    out.push(FEND);
    out.extend_from_slice(&escaped);
    out.push(FEND);
    Ok(out)
}

/// Validate an unescaped candidate and strip its checksum trailer.
pub fn verify(candidate: &[u8]) -> Result<&[u8], SyncError> {
    if candidate.len() < MIN_CANDIDATE_LEN {
        return Err(SyncError::MalformedPacket("frame shorter than 4 bytes"));
    }
    if !checksum_ok(candidate) {
        return Err(SyncError::MalformedPacket("checksum residue is not zero"));
    }
    Ok(&candidate[..candidate.len() - CHECKSUM_LEN])
}

// ── FrameScanner ─────────────────────────────────────────────────

/// Incremental unframer.
///
/// Bytes may arrive split at any point, including between an escape byte
/// and its substitute. Candidates that fail [`verify`] are discarded and
/// scanning continues.
#[derive(Debug, Default)]
pub struct FrameScanner {
    buf: Vec<u8>,
    escaped: bool,
    dropped: u64,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns a verified payload when a frame completes.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        if byte == FEND {
            self.escaped = false;
            if self.buf.is_empty() {
                return None;
            }
            let candidate = std::mem::take(&mut self.buf);
            return match verify(&candidate) {
                Ok(payload) => Some(payload.to_vec()),
                Err(e) => {
                    self.dropped += 1;
                    debug!(len = candidate.len(), "dropping frame: {e}");
                    None
                }
            };
        }

        if self.escaped {
            self.escaped = false;
            self.buf.push(unescape_byte(byte));
        } else if byte == FESC {
            self.escaped = true;
        } else {
            self.buf.push(byte);
        }
        None
    }

    /// Feed a chunk, collecting every payload it completes.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        data.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Number of candidates discarded so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Bytes accumulated towards the next frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Forget any partial frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.escaped = false;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Vec<u8>> {
        vec![
            vec![],
            vec![0x00],
            vec![FEND],
            vec![FESC],
            vec![FESC, TFEND],
            vec![FEND, FESC, FEND, FESC],
            vec![0x01, 0xA1, 0x01, 0x10, 0x27, 0xC0, 0x12, 0x00, 0x01, 0x05],
            (0..=255u8).collect(),
        ]
    }

    #[test]
    fn checksum_matches_reference_vector() {
        // Reflected CCITT, init 0xFFFF, no final xor: check value 0x6F91.
        assert_eq!(checksum(b"123456789"), [0x91, 0x6F]);
        assert_eq!(checksum(&[]), [0xFF, 0xFF]);
    }

    #[test]
    fn escape_unescape_is_identity() {
        for sample in samples() {
            assert_eq!(unescape(&escape(&sample)), sample);
        }
    }

    #[test]
    fn escape_substitutes_reserved_bytes() {
        assert_eq!(escape(&[FEND]), vec![FESC, TFEND]);
        assert_eq!(escape(&[FESC]), vec![FESC, TFESC]);
        assert_eq!(escape(&[0x01, 0x02]), vec![0x01, 0x02]);
    }

    #[test]
    fn escaped_output_never_contains_fend() {
        let all: Vec<u8> = (0..=255u8).collect();
        assert!(!escape(&all).contains(&FEND));
    }

    #[test]
    fn frame_rejects_empty() {
        assert!(matches!(frame(&[]), Err(SyncError::EmptyPacket)));
    }

    #[test]
    fn frame_layout() {
        let framed = frame(&[0x01, 0x02]).unwrap();
        assert_eq!(framed.first(), Some(&FEND));
        assert_eq!(framed.last(), Some(&FEND));
        let crc = checksum(&[0x01, 0x02]);
        let inner = unescape(&framed[1..framed.len() - 1]);
        assert_eq!(inner, vec![0x01, 0x02, crc[0], crc[1]]);
    }

    #[test]
    fn framed_payload_has_zero_residue() {
        for sample in samples().into_iter().filter(|s| !s.is_empty()) {
            let framed = frame(&sample).unwrap();
            let inner = unescape(&framed[1..framed.len() - 1]);
            assert!(checksum_ok(&inner), "residue for {sample:?}");
        }
    }

    #[test]
    fn scanner_recovers_framed_packets() {
        for sample in samples().into_iter().filter(|s| s.len() >= 2) {
            let mut scanner = FrameScanner::new();
            let packets = scanner.feed(&frame(&sample).unwrap());
            assert_eq!(packets, vec![sample]);
        }
    }

    #[test]
    fn scanner_handles_split_escape_sequences() {
        let packet = vec![0x01, FEND, FESC, 0x02];
        let framed = frame(&packet).unwrap();
        let mut scanner = FrameScanner::new();
        let mut out = Vec::new();
        for byte in framed {
            out.extend(scanner.push(byte));
        }
        assert_eq!(out, vec![packet]);
    }

    #[test]
    fn scanner_drops_short_candidates() {
        let mut scanner = FrameScanner::new();
        assert!(scanner.feed(&[FEND, 0x01, 0x02, 0x03, FEND]).is_empty());
        assert_eq!(scanner.dropped(), 1);
    }

    #[test]
    fn scanner_drops_bad_checksum_and_continues() {
        let good = vec![0x01, 0xA1, 0x01];
        let mut corrupt = frame(&good).unwrap();
        corrupt[2] ^= 0x55;

        let mut stream = corrupt;
        stream.extend(frame(&good).unwrap());

        let mut scanner = FrameScanner::new();
        assert_eq!(scanner.feed(&stream), vec![good]);
        assert_eq!(scanner.dropped(), 1);
    }

    #[test]
    fn scanner_ignores_back_to_back_delimiters() {
        let mut scanner = FrameScanner::new();
        assert!(scanner.feed(&[FEND, FEND, FEND]).is_empty());
        assert_eq!(scanner.dropped(), 0);
        assert_eq!(scanner.pending(), 0);
    }

    #[test]
    fn scanner_keeps_partial_frame_across_feeds() {
        let packet = vec![0x00, 0x03];
        let framed = frame(&packet).unwrap();
        let (head, tail) = framed.split_at(3);

        let mut scanner = FrameScanner::new();
        assert!(scanner.feed(head).is_empty());
        assert!(scanner.pending() > 0);
        assert_eq!(scanner.feed(tail), vec![packet]);
    }
}
