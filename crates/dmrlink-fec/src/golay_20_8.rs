//! Golay(20,8) slot-type code.
//!
//! Systematic: the 8 payload bits (colour code + data type) occupy the top
//! of the 20-bit codeword, followed by 12 check bits from the shortened
//! expurgated-Golay generator. Minimum distance 8: up to three bit errors
//! are corrected, four are reported as uncorrectable.

use crate::Uncorrectable;

/// Degree-12 generator polynomial: g23(x)·(x+1) with
/// g23 = x^11+x^10+x^6+x^5+x^4+x^2+1.
const GENPOLY: u32 = 0x149F;

/// Parity remainder of payload·x^12 mod GENPOLY.
const fn parity(payload: u8) -> u32 {
    let mut rem = (payload as u32) << 12;
    let mut bit = 19;
    while bit >= 12 {
        if rem & (1 << bit) != 0 {
            rem ^= GENPOLY << (bit - 12);
        }
        bit -= 1;
    }
    rem & 0xFFF
}

/// Precomputed codeword per payload value
const fn compute_codewords() -> [u32; 256] {
    let mut out = [0u32; 256];
    let mut p = 0;
    while p < 256 {
        out[p] = ((p as u32) << 12) | parity(p as u8);
        p += 1;
    }
    out
}

static CODEWORDS: [u32; 256] = compute_codewords();

/// Encode an 8-bit payload into a 20-bit codeword (low 20 bits of the u32).
pub fn encode(payload: u8) -> u32 {
    CODEWORDS[payload as usize]
}

/// Nearest-codeword decode: returns the payload and the number of corrected
/// bits, or Uncorrectable if no codeword lies within distance 3.
pub fn decode(codeword: u32) -> Result<(u8, u32), Uncorrectable> {
    let received = codeword & 0xF_FFFF;
    let mut best: Option<(u8, u32)> = None;

    for (p, &cw) in CODEWORDS.iter().enumerate() {
        let dist = (received ^ cw).count_ones();
        if dist <= 3 {
            // Distance 8 code: at most one codeword within radius 3
            best = Some((p as u8, dist));
            break;
        }
    }

    best.ok_or(Uncorrectable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_no_error() {
        for &msg in &[0u8, 1, 0x12, 0x9C, 0xFF] {
            let cw = encode(msg);
            assert_eq!(cw >> 12, msg as u32, "systematic payload placement");
            assert_eq!(decode(cw), Ok((msg, 0)));
        }
    }

    #[test]
    fn test_single_and_double_error_correction() {
        for &msg in &[0u8, 0x12, 0xA7, 0xFF] {
            let cw = encode(msg);
            for a in 0..20 {
                let decoded = decode(cw ^ (1 << a));
                assert_eq!(decoded, Ok((msg, 1)), "bit {}", a);
                for b in (a + 1)..20 {
                    let decoded = decode(cw ^ (1 << a) ^ (1 << b));
                    assert_eq!(decoded, Ok((msg, 2)), "bits {} {}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_triple_error_correction() {
        let cw = encode(0x5A);
        let damaged = cw ^ (1 << 0) ^ (1 << 9) ^ (1 << 19);
        assert_eq!(decode(damaged), Ok((0x5A, 3)));
    }

    #[test]
    fn test_uncorrectable_reported() {
        let cw = encode(0x5A);
        // Four spread errors exceed the correction radius
        let damaged = cw ^ (1 << 1) ^ (1 << 6) ^ (1 << 12) ^ (1 << 18);
        assert_eq!(decode(damaged), Err(Uncorrectable));
    }
}
