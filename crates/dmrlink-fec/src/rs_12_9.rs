//! RS(12,9) checksum over GF(2^8) protecting the Full LC payload.
//!
//! Nine data octets produce three parity octets; the burst layer XORs the
//! parity with a per-data-type mask before transmission. Decode side only
//! verifies (the enclosing BPTC(196,96) does the bit-error correction).

/// GF(2^8) reduction polynomial x^8+x^4+x^3+x^2+1.
const PRIM_POLY: u16 = 0x11D;

/// Generator (x+α)(x+α²)(x+α³) = x³ + 14x² + 56x + 64, low-degree first.
const GENPOLY: [u8; 3] = [64, 56, 14];

const fn build_exp() -> [u8; 256] {
    let mut exp = [0u8; 256];
    let mut v: u16 = 1;
    let mut i = 0;
    while i < 256 {
        exp[i] = v as u8;
        v <<= 1;
        if v & 0x100 != 0 {
            v ^= PRIM_POLY;
        }
        i += 1;
    }
    exp
}

const fn build_log() -> [u8; 256] {
    let exp = build_exp();
    let mut log = [0u8; 256];
    let mut i = 0;
    // exp cycles with period 255; log[0] stays 0 and is never used
    while i < 255 {
        log[exp[i] as usize] = i as u8;
        i += 1;
    }
    log
}

static EXP_TABLE: [u8; 256] = build_exp();
static LOG_TABLE: [u8; 256] = build_log();

fn gmul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let idx = (LOG_TABLE[a as usize] as usize + LOG_TABLE[b as usize] as usize) % 255;
    EXP_TABLE[idx]
}

/// Compute the three parity octets for nine data octets.
pub fn encode(data: &[u8; 9]) -> [u8; 3] {
    let mut parity = [0u8; 3];
    for &byte in data {
        let factor = byte ^ parity[2];
        parity[2] = parity[1] ^ gmul(GENPOLY[2], factor);
        parity[1] = parity[0] ^ gmul(GENPOLY[1], factor);
        parity[0] = gmul(GENPOLY[0], factor);
    }
    parity
}

/// Verify a 12-octet block (9 data + 3 parity, highest-degree parity first).
pub fn check(block: &[u8; 12]) -> bool {
    let mut data = [0u8; 9];
    data.copy_from_slice(&block[..9]);
    let parity = encode(&data);
    block[9] == parity[2] && block[10] == parity[1] && block[11] == parity[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gf_tables_consistent() {
        // α^255 = 1, and log/exp are inverse on the multiplicative group
        assert_eq!(EXP_TABLE[0], 1);
        for v in 1..=255u8 {
            assert_eq!(EXP_TABLE[LOG_TABLE[v as usize] as usize], v);
        }
        assert_eq!(gmul(2, 0x80), 0x1D, "α·α^7 wraps through the reduction poly");
    }

    #[test]
    fn test_encode_deterministic_and_checks() {
        let data = [0u8, 0, 0, 0x00, 0x00, 0x09, 0x00, 0x00, 0x01];
        let parity = encode(&data);
        assert_eq!(parity, encode(&data));

        let mut block = [0u8; 12];
        block[..9].copy_from_slice(&data);
        block[9] = parity[2];
        block[10] = parity[1];
        block[11] = parity[0];
        assert!(check(&block));

        block[4] ^= 0x10;
        assert!(!check(&block));
    }

    #[test]
    fn test_zero_block_checks() {
        assert_eq!(encode(&[0u8; 9]), [0, 0, 0]);
        assert!(check(&[0u8; 12]));
    }
}
