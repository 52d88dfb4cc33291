//! BPTC(196,96) product code protecting the Full LC on data/control bursts.
//!
//! The 96 info bits sit in a 13×15 matrix (plus one pad bit): rows 0..8 are
//! Hamming(15,11,3) codewords, every column is a Hamming(13,9,3) codeword
//! over the rows. The matrix is transmitted interleaved with stride 181.
//! Decode de-interleaves and runs iterative column-then-row correction.

use crate::hamming;
use crate::Uncorrectable;

/// Interleaved codeword, one bit per byte in transmission order.
#[derive(Clone, PartialEq, Eq)]
pub struct BptcCodeword(pub [u8; 196]);

impl std::fmt::Debug for BptcCodeword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: String = self.0.iter().map(|&b| if b == 1 { '1' } else { '0' }).collect();
        write!(f, "BptcCodeword({})", s)
    }
}

const ROWS: usize = 13;
const COLS: usize = 15;
const DATA_ROWS: usize = 9;
/// Matrix position of row r, column c inside the de-interleaved bit array.
/// Bit 0 is the pad bit; rows are 15 bits wide.
fn mat(r: usize, c: usize) -> usize {
    1 + r * COLS + c
}

/// Correction passes before giving up on a dirty matrix.
const MAX_PASSES: usize = 5;

/// Encode 12 payload octets (96 bits, MSB of octet 0 first).
pub fn encode(info: &[u8; 12]) -> BptcCodeword {
    let mut bits = [0u8; 96];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = (info[i / 8] >> (7 - (i % 8))) & 1;
    }

    let mut deinter = [0u8; 196];

    // Row 0 carries 8 info bits in columns 3..10; the first three column
    // positions are reserved and stay zero. Rows 1..8 carry 11 bits each.
    let mut pos = 0;
    for c in 3..11 {
        deinter[mat(0, c)] = bits[pos];
        pos += 1;
    }
    for r in 1..DATA_ROWS {
        for c in 0..11 {
            deinter[mat(r, c)] = bits[pos];
            pos += 1;
        }
    }
    debug_assert_eq!(pos, 96);

    // Row parity
    for r in 0..DATA_ROWS {
        let mut row = [0u8; 15];
        for c in 0..COLS {
            row[c] = deinter[mat(r, c)];
        }
        hamming::encode_15113(&mut row);
        for c in 0..COLS {
            deinter[mat(r, c)] = row[c];
        }
    }

    // Column parity over all 13 rows
    for c in 0..COLS {
        let mut col = [0u8; 13];
        for r in 0..ROWS {
            col[r] = deinter[mat(r, c)];
        }
        hamming::encode_1393(&mut col);
        for r in 0..ROWS {
            deinter[mat(r, c)] = col[r];
        }
    }

    // Interleave with stride 181 (coprime with 196)
    let mut out = [0u8; 196];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = deinter[(i * 181) % 196];
    }
    BptcCodeword(out)
}

/// Decode an interleaved codeword, returning the 12 payload octets and the
/// number of corrected bits, or Uncorrectable if parity stays inconsistent.
///
/// Damage beyond the code's correction capability can converge on a
/// different valid matrix and decode to a wrong payload. The RS(12,9)
/// checksum carried inside the LC payload catches that case downstream.
pub fn decode(codeword: &BptcCodeword) -> Result<([u8; 12], u32), Uncorrectable> {
    // De-interleave
    let mut deinter = [0u8; 196];
    for (i, &bit) in codeword.0.iter().enumerate() {
        deinter[(i * 181) % 196] = bit;
    }

    // Iterative correction: columns first (they span the parity rows),
    // then rows; stop early once everything is clean.
    let mut corrected = 0u32;
    for _pass in 0..MAX_PASSES {
        let mut changed = false;

        for c in 0..COLS {
            let mut col = [0u8; 13];
            for r in 0..ROWS {
                col[r] = deinter[mat(r, c)];
            }
            if let Ok(Some(_)) = hamming::fix_1393(&mut col) {
                for r in 0..ROWS {
                    deinter[mat(r, c)] = col[r];
                }
                corrected += 1;
                changed = true;
            }
        }

        for r in 0..DATA_ROWS {
            let mut row = [0u8; 15];
            for c in 0..COLS {
                row[c] = deinter[mat(r, c)];
            }
            if let Some(_) = hamming::fix_15113(&mut row) {
                for c in 0..COLS {
                    deinter[mat(r, c)] = row[c];
                }
                corrected += 1;
                changed = true;
            }
        }

        if is_clean(&deinter) {
            break;
        }
        if !changed {
            // No progress and still dirty: report instead of looping
            break;
        }
    }

    if !is_clean(&deinter) {
        return Err(Uncorrectable);
    }

    // Extract the 96 info bits
    let mut bits = [0u8; 96];
    let mut pos = 0;
    for c in 3..11 {
        bits[pos] = deinter[mat(0, c)];
        pos += 1;
    }
    for r in 1..DATA_ROWS {
        for c in 0..11 {
            bits[pos] = deinter[mat(r, c)];
            pos += 1;
        }
    }

    let mut info = [0u8; 12];
    for (i, &bit) in bits.iter().enumerate() {
        info[i / 8] |= bit << (7 - (i % 8));
    }
    Ok((info, corrected))
}

fn is_clean(deinter: &[u8; 196]) -> bool {
    for r in 0..DATA_ROWS {
        let mut row = [0u8; 15];
        for c in 0..COLS {
            row[c] = deinter[mat(r, c)];
        }
        if !hamming::is_clean_15113(&row) {
            return false;
        }
    }
    for c in 0..COLS {
        let mut col = [0u8; 13];
        for r in 0..ROWS {
            col[r] = deinter[mat(r, c)];
        }
        if !hamming::is_clean_1393(&col) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [[u8; 12]; 4] = [
        [0u8; 12],
        [0xFF; 12],
        [0x00, 0x00, 0x00, 0x00, 0x00, 0x09, 0x00, 0x30, 0x39, 0x2E, 0x92, 0x61],
        [0xA5, 0x5A, 0x0F, 0xF0, 0x33, 0xCC, 0x01, 0x80, 0x7E, 0x12, 0x34, 0x56],
    ];

    #[test]
    fn test_round_trip_no_errors() {
        for info in SAMPLES {
            let cw = encode(&info);
            assert_eq!(decode(&cw), Ok((info, 0)));
        }
    }

    #[test]
    fn test_encode_deterministic() {
        let a = encode(&SAMPLES[2]);
        let b = encode(&SAMPLES[2]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_any_single_bit_flip_recoverable() {
        for info in SAMPLES {
            let cw = encode(&info);
            for bit in 0..196 {
                let mut damaged = cw.clone();
                damaged.0[bit] ^= 1;
                let (decoded, _) = decode(&damaged).expect("single flip must be recoverable");
                assert_eq!(decoded, info, "bit {}", bit);
            }
        }
    }

    #[test]
    fn test_scattered_double_flips_recoverable() {
        // Two errors in different rows and columns get fixed by the
        // column pass alone
        let info = SAMPLES[3];
        let cw = encode(&info);
        let mut damaged = cw.clone();
        damaged.0[7] ^= 1;
        damaged.0[100] ^= 1;
        let (decoded, corrected) = decode(&damaged).expect("scattered flips recoverable");
        assert_eq!(decoded, info);
        assert!(corrected >= 2);
    }

    #[test]
    fn test_heavy_damage_never_yields_original_payload() {
        // Wiping half of the codeword is far beyond the correction
        // capability. The iterative correction may converge on a
        // different valid matrix; what it must never do is return the
        // original payload as if the damage had been repaired.
        let info = SAMPLES[3];
        let cw = encode(&info);
        let mut damaged = cw.clone();
        for bit in (0..196).step_by(2) {
            damaged.0[bit] ^= 1;
        }
        match decode(&damaged) {
            Err(_) => {}
            Ok((decoded, _)) => assert_ne!(decoded, info),
        }
    }
}
