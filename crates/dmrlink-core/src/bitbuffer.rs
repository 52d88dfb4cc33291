use std::fmt;

use crate::parse_error::ParseErr;

/// MSB-first bit-level view over a byte vector.
///
/// All DMR burst and envelope fields are defined at bit granularity, so every
/// encoder/decoder in the stack works through this type rather than shifting
/// raw bytes around. The buffer has a fixed bit length decided at creation;
/// writes beyond the end are programming errors and panic.
pub struct BitBuffer {
    buffer: Vec<u8>,
    /// Next bit offset for read/write
    pos: usize,
    /// Total valid bits; bits at or after this are out of bounds
    len_bits: usize,
}

impl BitBuffer {
    /// Create a zeroed buffer holding exactly `len_bits` bits.
    pub fn new(len_bits: usize) -> Self {
        BitBuffer {
            buffer: vec![0; (len_bits + 7) / 8],
            pos: 0,
            len_bits,
        }
    }

    /// Wrap an existing byte vector; all bits become readable/writable.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len_bits = data.len() * 8;
        BitBuffer {
            buffer: data,
            pos: 0,
            len_bits,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }

    /// Construct directly from a string of '0'/'1' characters.
    /// Panics on any other character; intended for test vectors.
    pub fn from_bitstr(bitstr: &str) -> Self {
        let mut buf = BitBuffer::new(bitstr.len());
        for c in bitstr.chars() {
            match c {
                '0' => buf.write_bit(0),
                '1' => buf.write_bit(1),
                other => panic!("from_bitstr: invalid character `{}`", other),
            }
        }
        buf.pos = 0;
        buf
    }

    /// Construct from a slice holding one bit per byte (values 0 or 1).
    pub fn from_bitarr(bits: &[u8]) -> Self {
        let mut buf = BitBuffer::new(bits.len());
        buf.write_bitarr(bits);
        buf.pos = 0;
        buf
    }

    /// Total bit length of the buffer.
    pub fn len(&self) -> usize {
        self.len_bits
    }

    pub fn is_empty(&self) -> bool {
        self.len_bits == 0
    }

    /// Bits left between pos and the end.
    pub fn remaining(&self) -> usize {
        self.len_bits - self.pos
    }

    /// Current bit position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move pos to an absolute bit offset.
    pub fn seek(&mut self, offset: usize) {
        assert!(offset <= self.len_bits, "seek out of bounds: {} > {}", offset, self.len_bits);
        self.pos = offset;
    }

    /// Peek `num_bits` at pos without advancing. None on overflow or `num_bits > 64`.
    pub fn peek_bits(&self, num_bits: usize) -> Option<u64> {
        if num_bits > 64 || self.pos + num_bits > self.len_bits {
            return None;
        }
        Some(self.read_bits_at_unchecked(self.pos, num_bits))
    }

    /// Read `num_bits` at pos, advancing on success.
    pub fn read_bits(&mut self, num_bits: usize) -> Option<u64> {
        let v = self.peek_bits(num_bits)?;
        self.pos += num_bits;
        Some(v)
    }

    pub fn read_bit(&mut self) -> Option<u8> {
        self.read_bits(1).map(|v| v as u8)
    }

    /// Like read_bits, but maps exhaustion to ParseErr::BufferEnded with a field name.
    pub fn read_field(&mut self, num_bits: usize, field: &'static str) -> Result<u64, ParseErr> {
        self.read_bits(num_bits)
            .ok_or(ParseErr::BufferEnded { field: Some(field) })
    }

    /// Write a single bit at pos.
    pub fn write_bit(&mut self, value: u8) {
        assert!(value <= 1, "write_bit: value must be 0 or 1");
        assert!(self.pos < self.len_bits, "write_bit would exceed buffer end");
        let index = self.pos / 8;
        let shift = 7 - (self.pos % 8);
        self.buffer[index] &= !(1 << shift);
        self.buffer[index] |= value << shift;
        self.pos += 1;
    }

    /// Write the low `num_bits` of `value` at pos, MSB first.
    pub fn write_bits(&mut self, value: u64, num_bits: usize) {
        assert!(num_bits <= 64, "can only write up to 64 bits");
        assert!(
            num_bits == 64 || value >> num_bits == 0,
            "value {:#x} exceeds {} bits",
            value,
            num_bits
        );
        assert!(self.pos + num_bits <= self.len_bits, "write would exceed buffer end");

        for i in (0..num_bits).rev() {
            self.write_bit(((value >> i) & 1) as u8);
        }
    }

    /// Write `num_bits` zero bits. Reserved fields are zero-filled with this
    /// so identical inputs always produce identical buffers.
    pub fn write_zeroes(&mut self, num_bits: usize) {
        for _ in 0..num_bits {
            self.write_bit(0);
        }
    }

    /// Write a slice of 0/1 bytes, one bit per byte.
    pub fn write_bitarr(&mut self, bits: &[u8]) {
        for &bit in bits {
            assert!(bit <= 1, "write_bitarr: invalid bit value {}", bit);
            self.write_bit(bit);
        }
    }

    /// Read `out.len()` bits from pos into `out`, one bit per byte.
    pub fn read_bitarr(&mut self, out: &mut [u8]) -> Option<()> {
        if self.remaining() < out.len() {
            return None;
        }
        for slot in out.iter_mut() {
            *slot = self.read_bit()?;
        }
        Some(())
    }

    /// Extract the internal byte vector (including any unused trailing bits).
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Dump all bits as a '0'/'1' string.
    pub fn to_bitstr(&self) -> String {
        (0..self.len_bits)
            .map(|i| if self.read_bit_at_unchecked(i) == 1 { '1' } else { '0' })
            .collect()
    }

    /// Dump as uppercase hex, 4 bits per digit, last nibble zero-padded.
    pub fn dump_hex(&self) -> String {
        let n_nibbles = (self.len_bits + 3) / 4;
        let mut s = String::with_capacity(n_nibbles);
        for i in 0..n_nibbles {
            let bit_pos = i * 4;
            let take = usize::min(4, self.len_bits - bit_pos);
            let v = self.read_bits_at_unchecked(bit_pos, take) as u8;
            let digit = if take < 4 { v << (4 - take) } else { v };
            s.push_str(&format!("{:X}", digit));
        }
        s
    }

    /// No bounds checks; caller guarantees `bit_pos + num_bits <= len_bits`.
    fn read_bits_at_unchecked(&self, bit_pos: usize, num_bits: usize) -> u64 {
        let mut result = 0u64;
        for i in 0..num_bits {
            result = (result << 1) | self.read_bit_at_unchecked(bit_pos + i) as u64;
        }
        result
    }

    fn read_bit_at_unchecked(&self, bit_pos: usize) -> u8 {
        (self.buffer[bit_pos / 8] >> (7 - (bit_pos % 8))) & 1
    }
}

impl fmt::Debug for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitBuffer {{ ^{} /{} {} }}", self.pos, self.len_bits, self.to_bitstr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_byte_read_write() {
        let mut bb = BitBuffer::new(16);
        bb.write_bits(0xAB, 8);
        bb.write_bits(0xCD, 8);
        bb.seek(0);
        assert_eq!(bb.read_bits(8).unwrap(), 0xAB);
        assert_eq!(bb.read_bits(8).unwrap(), 0xCD);
    }

    #[test]
    fn test_partial_boundary_read_write() {
        let mut bb = BitBuffer::new(16);
        bb.write_bits(0xA, 4);
        bb.write_bits(0x5, 4);
        bb.write_bits(0xFF, 8);
        bb.seek(0);
        assert_eq!(bb.read_bits(4).unwrap(), 0xA);
        assert_eq!(bb.read_bits(4).unwrap(), 0x5);
        assert_eq!(bb.read_bits(8).unwrap(), 0xFF);
    }

    #[test]
    fn test_unaligned_write_across_bytes() {
        let mut bb = BitBuffer::new(48);
        bb.seek(5);
        let pattern: u64 = 0b10_1010_1111_0001_0010;
        bb.write_bits(pattern, 20);
        bb.seek(5);
        assert_eq!(bb.read_bits(20).unwrap(), pattern);
    }

    #[test]
    fn test_read_overflow() {
        let mut bb = BitBuffer::new(10);
        assert!(bb.read_bits(11).is_none());
        assert_eq!(bb.read_bits(0).unwrap(), 0);
    }

    #[test]
    #[should_panic(expected = "write would exceed buffer end")]
    fn test_write_overflow() {
        let mut bb = BitBuffer::new(10);
        bb.write_bits(1, 11);
    }

    #[test]
    fn test_read_field_reports_name() {
        let mut bb = BitBuffer::new(4);
        assert_eq!(
            bb.read_field(8, "colour_code"),
            Err(ParseErr::BufferEnded { field: Some("colour_code") })
        );
    }

    #[test]
    fn test_bitstr_round_trip() {
        let mut bb = BitBuffer::from_bitstr("10110110");
        assert_eq!(bb.read_bits(4).unwrap(), 0b1011);
        assert_eq!(bb.to_bitstr(), "10110110");
    }

    #[test]
    fn test_bitarr_round_trip() {
        let bits = [1u8, 0, 1, 1, 0, 0, 1, 1];
        let mut bb = BitBuffer::from_bitarr(&bits);
        let mut out = [0u8; 8];
        bb.read_bitarr(&mut out).unwrap();
        assert_eq!(out, bits);
    }

    #[test]
    fn test_dump_hex() {
        let bb = BitBuffer::from_vec(vec![0xAB, 0xCD]);
        assert_eq!(bb.dump_hex(), "ABCD");
        let bb = BitBuffer::from_bitstr("101011");
        assert_eq!(bb.dump_hex(), "AC");
    }

    #[test]
    fn test_into_bytes() {
        let mut bb = BitBuffer::new(24);
        bb.write_bits(0xAAAAAA, 24);
        assert_eq!(bb.into_bytes(), vec![0xAA, 0xAA, 0xAA]);
    }
}
