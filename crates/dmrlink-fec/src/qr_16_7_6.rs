//! QR(16,7,6) code for the EMB field (colour code + PI + LCSS).
//!
//! Systematic: 7 payload bits, 8 check bits from the double-error-correcting
//! BCH(15,7) generator, plus an overall even-parity bit. Minimum distance 6:
//! up to two bit errors are corrected, three are reported as uncorrectable.

use crate::Uncorrectable;

/// BCH(15,7) generator: x^8+x^7+x^6+x^4+1.
const GENPOLY: u16 = 0x1D1;

const fn parity(payload: u8) -> u16 {
    let mut rem = ((payload & 0x7F) as u16) << 8;
    let mut bit = 14;
    while bit >= 8 {
        if rem & (1 << bit) != 0 {
            rem ^= GENPOLY << (bit - 8);
        }
        bit -= 1;
    }
    rem & 0xFF
}

const fn compute_codewords() -> [u16; 128] {
    let mut out = [0u16; 128];
    let mut p = 0;
    while p < 128 {
        // 15-bit BCH codeword, then overall parity appended as the LSB
        let cw15 = ((p as u16) << 8) | parity(p as u8);
        let overall = cw15.count_ones() as u16 & 1;
        out[p] = (cw15 << 1) | overall;
        p += 1;
    }
    out
}

static CODEWORDS: [u16; 128] = compute_codewords();

/// Encode a 7-bit payload into a 16-bit codeword.
pub fn encode(payload: u8) -> u16 {
    CODEWORDS[(payload & 0x7F) as usize]
}

/// Nearest-codeword decode: returns the payload and the number of corrected
/// bits, or Uncorrectable if no codeword lies within distance 2.
pub fn decode(codeword: u16) -> Result<(u8, u32), Uncorrectable> {
    for (p, &cw) in CODEWORDS.iter().enumerate() {
        let dist = (codeword ^ cw).count_ones();
        if dist <= 2 {
            return Ok((p as u8, dist));
        }
    }
    Err(Uncorrectable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_no_error() {
        for msg in 0u8..128 {
            let cw = encode(msg);
            assert_eq!(cw >> 9, msg as u16, "systematic payload placement");
            assert_eq!(decode(cw), Ok((msg, 0)));
        }
    }

    #[test]
    fn test_single_and_double_error_correction() {
        for &msg in &[0u8, 1, 0x2B, 0x7F] {
            let cw = encode(msg);
            for a in 0..16 {
                assert_eq!(decode(cw ^ (1 << a)), Ok((msg, 1)), "bit {}", a);
                for b in (a + 1)..16 {
                    assert_eq!(decode(cw ^ (1 << a) ^ (1 << b)), Ok((msg, 2)), "bits {} {}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_uncorrectable_reported() {
        let cw = encode(0x2B);
        let damaged = cw ^ (1 << 0) ^ (1 << 7) ^ (1 << 15);
        assert_eq!(decode(damaged), Err(Uncorrectable));
    }
}
