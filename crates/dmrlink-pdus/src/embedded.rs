//! Embedded signalling: a Full LC spread over the centre field of voice
//! bursts B..E.
//!
//! The 72 LC bits plus a 5-bit checksum fill an 8x16 matrix: seven
//! Hamming(16,11,4) rows and one column-parity row, interleaved with a
//! stride of 16 over 127 before being cut into four 32-bit fragments.
//! Each fragment travels next to a QR(16,7,6)-coded EMB field carrying
//! the colour code and the fragment's place in the sequence (LCSS).

use dmrlink_core::{BitBuffer, ColourCode, ParseErr};
use dmrlink_fec::{hamming, qr_16_7_6, Uncorrectable};
use tracing::debug;

use crate::link_control::FullLc;

/// Bytes per embedded fragment (32 bits, one per voice burst B..E).
pub const FRAGMENT_BYTES: usize = 4;
/// Fragments per superframe.
pub const FRAGMENTS: usize = 4;

/// Matrix positions holding the 5-bit checksum, most significant bit first.
const CHECKSUM_POSITIONS: [usize; 5] = [42, 58, 74, 90, 106];

/// Link Control Start/Stop: where a fragment sits in the B..E sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lcss {
    /// Single-fragment signalling, not used for voice LC.
    Single,
    First,
    Last,
    Continuation,
}

impl Lcss {
    pub fn value(self) -> u8 {
        match self {
            Lcss::Single => 0,
            Lcss::First => 1,
            Lcss::Last => 2,
            Lcss::Continuation => 3,
        }
    }

    pub fn from_value(value: u8) -> Self {
        match value & 0x03 {
            0 => Lcss::Single,
            1 => Lcss::First,
            2 => Lcss::Last,
            _ => Lcss::Continuation,
        }
    }

    /// LCSS tag for the fragment at 0-based index 0..4 (bursts B..E).
    pub fn for_fragment(index: usize) -> Self {
        match index {
            0 => Lcss::First,
            3 => Lcss::Last,
            _ => Lcss::Continuation,
        }
    }
}

// ─── EMB field ────────────────────────────────────────────────────

/// The 16-bit EMB field: colour code, privacy indicator and LCSS,
/// QR(16,7,6) coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emb {
    pub colour_code: ColourCode,
    pub pi: bool,
    pub lcss: Lcss,
}

impl Emb {
    pub fn encode(&self) -> u16 {
        let payload =
            (self.colour_code.value() << 3) | ((self.pi as u8) << 2) | self.lcss.value();
        qr_16_7_6::encode(payload)
    }

    pub fn decode(codeword: u16) -> Result<(Self, u32), Uncorrectable> {
        let (payload, corrected) = qr_16_7_6::decode(codeword)?;
        let colour_code = ColourCode::new(payload >> 3).ok_or(Uncorrectable)?;
        let emb = Emb {
            colour_code,
            pi: payload & 0x04 != 0,
            lcss: Lcss::from_value(payload & 0x03),
        };
        Ok((emb, corrected))
    }
}

// ─── Fragmentation ────────────────────────────────────────────────

/// Encode an LC into the four embedded fragments for bursts B..E.
pub fn fragment_lc(lc: &FullLc) -> [[u8; FRAGMENT_BYTES]; FRAGMENTS] {
    let data = lc.pack();
    let checksum: u8 = (data.iter().map(|&b| b as u32).sum::<u32>() % 31) as u8;

    let mut lc_bits = BitBuffer::from_bytes(&data);
    let mut raw = [0u8; 128];

    // Data positions are the first 11 columns of rows 0..6; five of them
    // hold the checksum instead of LC bits
    let mut cs_bit = 0;
    for pos in 0..112 {
        if pos % 16 >= 11 {
            continue;
        }
        if CHECKSUM_POSITIONS.contains(&pos) {
            raw[pos] = (checksum >> (4 - cs_bit)) & 1;
            cs_bit += 1;
        } else {
            raw[pos] = lc_bits.read_bit().unwrap_or(0);
        }
    }

    // Row parity for the seven data rows
    for r in 0..7 {
        let mut row = [0u8; 16];
        row.copy_from_slice(&raw[r * 16..r * 16 + 16]);
        hamming::encode_16114(&mut row);
        raw[r * 16..r * 16 + 16].copy_from_slice(&row);
    }

    // Final row is the column parity over the seven rows above
    for c in 0..16 {
        let mut p = 0u8;
        for r in 0..7 {
            p ^= raw[r * 16 + c];
        }
        raw[112 + c] = p;
    }

    // Interleave downwards in columns, stride 16 over 127
    let mut inter = [0u8; 128];
    let mut b = 0usize;
    for &bit in raw.iter() {
        inter[b] = bit;
        b += 16;
        if b > 127 {
            b -= 127;
        }
    }

    let mut fragments = [[0u8; FRAGMENT_BYTES]; FRAGMENTS];
    for (i, fragment) in fragments.iter_mut().enumerate() {
        let chunk = BitBuffer::from_bitarr(&inter[i * 32..i * 32 + 32]);
        fragment.copy_from_slice(chunk.as_bytes());
    }
    fragments
}

/// Reassemble an LC from four fragments in B..E order. Corrects up to one
/// bit error per matrix row and validates the 5-bit checksum.
pub fn reassemble_lc(
    fragments: &[[u8; FRAGMENT_BYTES]; FRAGMENTS],
) -> Result<(FullLc, u32), ParseErr> {
    let mut inter = [0u8; 128];
    for (i, fragment) in fragments.iter().enumerate() {
        let mut chunk = BitBuffer::from_bytes(fragment);
        chunk
            .read_bitarr(&mut inter[i * 32..i * 32 + 32])
            .ok_or(ParseErr::BufferEnded { field: Some("fragment") })?;
    }

    let mut raw = [0u8; 128];
    let mut b = 0usize;
    for slot in raw.iter_mut() {
        *slot = inter[b];
        b += 16;
        if b > 127 {
            b -= 127;
        }
    }

    let mut corrected = 0u32;
    for r in 0..7 {
        let mut row = [0u8; 16];
        row.copy_from_slice(&raw[r * 16..r * 16 + 16]);
        match hamming::fix_16114(&mut row) {
            Ok(None) => {}
            Ok(Some(_)) => {
                raw[r * 16..r * 16 + 16].copy_from_slice(&row);
                corrected += 1;
            }
            Err(_) => {
                return Err(ParseErr::Inconsistency {
                    field: "embedded_lc",
                    reason: "row parity uncorrectable",
                })
            }
        }
    }

    // Pull the LC bits and checksum back out; the column-parity row has
    // served its purpose on the air and is not re-checked here
    let mut lc_bits = BitBuffer::new(72);
    let mut checksum = 0u8;
    let mut cs_bit = 0;
    for pos in 0..112 {
        if pos % 16 >= 11 {
            continue;
        }
        if CHECKSUM_POSITIONS.contains(&pos) {
            checksum |= raw[pos] << (4 - cs_bit);
            cs_bit += 1;
        } else {
            lc_bits.write_bit(raw[pos]);
        }
    }

    let mut data = [0u8; 9];
    data.copy_from_slice(lc_bits.as_bytes());

    let expected: u8 = (data.iter().map(|&b| b as u32).sum::<u32>() % 31) as u8;
    dmrlink_core::expect_value!(checksum, expected, "embedded_lc_checksum")?;

    let lc = FullLc::unpack(&data)?;
    Ok((lc, corrected))
}

// ─── Reassembly accumulator ───────────────────────────────────────

/// Collects embedded fragments across one superframe. Fragments must
/// arrive strictly in B..E order; anything else resets the accumulator
/// and that superframe yields no LC.
#[derive(Debug, Default)]
pub struct LcAssembler {
    fragments: [[u8; FRAGMENT_BYTES]; FRAGMENTS],
    next: usize,
}

impl LcAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment with its LCSS tag. Returns the reassembled LC
    /// when a consistent B..E sequence completes.
    pub fn push(&mut self, lcss: Lcss, fragment: [u8; FRAGMENT_BYTES]) -> Option<FullLc> {
        let expected = Lcss::for_fragment(self.next.min(FRAGMENTS - 1));
        let accept = match lcss {
            Lcss::First => {
                // A new sequence always restarts collection
                self.next = 0;
                true
            }
            _ => self.next > 0 && self.next < FRAGMENTS && lcss == expected,
        };

        if !accept {
            if self.next > 0 {
                debug!(lcss = lcss.value(), expected_index = self.next, "embedded fragment out of sequence, dropping partial LC");
            }
            self.next = 0;
            return None;
        }

        self.fragments[self.next] = fragment;
        self.next += 1;

        if self.next < FRAGMENTS {
            return None;
        }

        self.next = 0;
        match reassemble_lc(&self.fragments) {
            Ok((lc, corrected)) => {
                if corrected > 0 {
                    debug!(corrected, "embedded LC recovered after correction");
                }
                Some(lc)
            }
            Err(err) => {
                debug!(%err, "embedded LC reassembly failed");
                None
            }
        }
    }

    /// Drop any partial sequence, e.g. when a new call header arrives.
    pub fn reset(&mut self) {
        self.next = 0;
    }
}
