//! Hamming codes used inside the BPTC(196,96) matrix and embedded LC:
//! (15,11,3) rows, (13,9,3) columns and the extended (16,11,4) variant.
//!
//! Codewords are handled as one-bit-per-byte arrays, first transmitted bit
//! at index 0, so they can be moved in and out of the product-code matrices
//! without repacking. Syndrome tables are precomputed from the encoders.

use crate::Uncorrectable;

// ─── Hamming (15,11,3) ────────────────────────────────────────────

const fn syndrome_15113(d: [u8; 15]) -> u8 {
    let c0 = d[0] ^ d[1] ^ d[2] ^ d[3] ^ d[4] ^ d[5] ^ d[6] ^ d[11];
    let c1 = d[0] ^ d[1] ^ d[2] ^ d[3] ^ d[7] ^ d[8] ^ d[9] ^ d[12];
    let c2 = d[0] ^ d[1] ^ d[4] ^ d[5] ^ d[7] ^ d[8] ^ d[10] ^ d[13];
    let c3 = d[0] ^ d[2] ^ d[4] ^ d[6] ^ d[7] ^ d[9] ^ d[10] ^ d[14];
    c0 | (c1 << 1) | (c2 << 2) | (c3 << 3)
}

/// Syndrome produced by a single-bit error at each codeword position
const fn compute_cols_15113() -> [u8; 15] {
    let mut out = [0u8; 15];
    let mut i = 0;
    while i < 15 {
        let mut probe = [0u8; 15];
        probe[i] = 1;
        out[i] = syndrome_15113(probe);
        i += 1;
    }
    out
}

const COLS_15113: [u8; 15] = compute_cols_15113();

/// Fill the four parity positions from the 11 data bits.
pub fn encode_15113(d: &mut [u8; 15]) {
    d[11] = d[0] ^ d[1] ^ d[2] ^ d[3] ^ d[4] ^ d[5] ^ d[6];
    d[12] = d[0] ^ d[1] ^ d[2] ^ d[3] ^ d[7] ^ d[8] ^ d[9];
    d[13] = d[0] ^ d[1] ^ d[4] ^ d[5] ^ d[7] ^ d[8] ^ d[10];
    d[14] = d[0] ^ d[2] ^ d[4] ^ d[6] ^ d[7] ^ d[9] ^ d[10];
}

/// Correct up to one bit error in place. Returns the corrected position, or
/// None if the codeword was already clean. (15,11) is a perfect Hamming code:
/// every syndrome maps to a position, so this cannot fail.
pub fn fix_15113(d: &mut [u8; 15]) -> Option<usize> {
    let syn = syndrome_15113(*d);
    if syn == 0 {
        return None;
    }
    let mut k = 0;
    while k < 15 {
        if COLS_15113[k] == syn {
            d[k] ^= 1;
            return Some(k);
        }
        k += 1;
    }
    unreachable!("all 4-bit syndromes map to a (15,11) column");
}

pub fn is_clean_15113(d: &[u8; 15]) -> bool {
    syndrome_15113(*d) == 0
}

// ─── Hamming (13,9,3) ─────────────────────────────────────────────

const fn syndrome_1393(d: [u8; 13]) -> u8 {
    let c0 = d[0] ^ d[1] ^ d[3] ^ d[5] ^ d[6] ^ d[9];
    let c1 = d[0] ^ d[1] ^ d[2] ^ d[4] ^ d[6] ^ d[7] ^ d[10];
    let c2 = d[0] ^ d[1] ^ d[2] ^ d[3] ^ d[5] ^ d[7] ^ d[8] ^ d[11];
    let c3 = d[0] ^ d[2] ^ d[4] ^ d[5] ^ d[8] ^ d[12];
    c0 | (c1 << 1) | (c2 << 2) | (c3 << 3)
}

const fn compute_cols_1393() -> [u8; 13] {
    let mut out = [0u8; 13];
    let mut i = 0;
    while i < 13 {
        let mut probe = [0u8; 13];
        probe[i] = 1;
        out[i] = syndrome_1393(probe);
        i += 1;
    }
    out
}

const COLS_1393: [u8; 13] = compute_cols_1393();

pub fn encode_1393(d: &mut [u8; 13]) {
    d[9] = d[0] ^ d[1] ^ d[3] ^ d[5] ^ d[6];
    d[10] = d[0] ^ d[1] ^ d[2] ^ d[4] ^ d[6] ^ d[7];
    d[11] = d[0] ^ d[1] ^ d[2] ^ d[3] ^ d[5] ^ d[7] ^ d[8];
    d[12] = d[0] ^ d[2] ^ d[4] ^ d[5] ^ d[8];
}

/// Correct up to one bit error in place. (13,9) is a shortened code: two of
/// the 4-bit syndromes match no position and are reported as uncorrectable.
pub fn fix_1393(d: &mut [u8; 13]) -> Result<Option<usize>, Uncorrectable> {
    let syn = syndrome_1393(*d);
    if syn == 0 {
        return Ok(None);
    }
    let mut k = 0;
    while k < 13 {
        if COLS_1393[k] == syn {
            d[k] ^= 1;
            return Ok(Some(k));
        }
        k += 1;
    }
    Err(Uncorrectable)
}

pub fn is_clean_1393(d: &[u8; 13]) -> bool {
    syndrome_1393(*d) == 0
}

// ─── Hamming (16,11,4) ────────────────────────────────────────────
// Extended variant used for the embedded LC rows: four check bits plus an
// overall even-parity bit, raising minimum distance to 4 so double errors
// are detected instead of miscorrected.

const fn syndrome_16114(d: [u8; 16]) -> u8 {
    let c0 = d[0] ^ d[1] ^ d[2] ^ d[3] ^ d[5] ^ d[7] ^ d[8] ^ d[11];
    let c1 = d[1] ^ d[2] ^ d[3] ^ d[4] ^ d[6] ^ d[8] ^ d[9] ^ d[12];
    let c2 = d[2] ^ d[3] ^ d[4] ^ d[5] ^ d[7] ^ d[9] ^ d[10] ^ d[13];
    let c3 = d[0] ^ d[1] ^ d[2] ^ d[4] ^ d[6] ^ d[7] ^ d[10] ^ d[14];
    c0 | (c1 << 1) | (c2 << 2) | (c3 << 3)
}

const fn overall_parity_16(d: [u8; 16]) -> u8 {
    let mut p = 0u8;
    let mut i = 0;
    while i < 16 {
        p ^= d[i];
        i += 1;
    }
    p
}

const fn compute_cols_16114() -> [u8; 15] {
    let mut out = [0u8; 15];
    let mut i = 0;
    while i < 15 {
        let mut probe = [0u8; 16];
        probe[i] = 1;
        out[i] = syndrome_16114(probe);
        i += 1;
    }
    out
}

const COLS_16114: [u8; 15] = compute_cols_16114();

pub fn encode_16114(d: &mut [u8; 16]) {
    d[11] = d[0] ^ d[1] ^ d[2] ^ d[3] ^ d[5] ^ d[7] ^ d[8];
    d[12] = d[1] ^ d[2] ^ d[3] ^ d[4] ^ d[6] ^ d[8] ^ d[9];
    d[13] = d[2] ^ d[3] ^ d[4] ^ d[5] ^ d[7] ^ d[9] ^ d[10];
    d[14] = d[0] ^ d[1] ^ d[2] ^ d[4] ^ d[6] ^ d[7] ^ d[10];
    d[15] = 0;
    d[15] = overall_parity_16(*d);
}

/// Correct up to one bit error in place; a nonzero syndrome with clean
/// overall parity is a double error and reported as uncorrectable.
pub fn fix_16114(d: &mut [u8; 16]) -> Result<Option<usize>, Uncorrectable> {
    let syn = syndrome_16114(*d);
    let par = overall_parity_16(*d);

    match (syn, par) {
        (0, 0) => Ok(None),
        // Error in the overall parity bit itself
        (0, _) => {
            d[15] ^= 1;
            Ok(Some(15))
        }
        // Single error in one of the first 15 bits flips overall parity too
        (syn, 1) => {
            let mut k = 0;
            while k < 15 {
                if COLS_16114[k] == syn {
                    d[k] ^= 1;
                    return Ok(Some(k));
                }
                k += 1;
            }
            Err(Uncorrectable)
        }
        // Nonzero syndrome, even parity: at least two bit errors
        _ => Err(Uncorrectable),
    }
}

pub fn is_clean_16114(d: &[u8; 16]) -> bool {
    syndrome_16114(*d) == 0 && overall_parity_16(*d) == 0
}
