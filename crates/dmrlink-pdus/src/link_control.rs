//! Full Link Control record: call-flow type, feature set, service options
//! and the two 24-bit addresses, packed to 72 bits and wrapped in the
//! RS(12,9) checksum for transmission inside a BPTC(196,96) codeword.

use dmrlink_core::{BitBuffer, CallType, DmrId, ParseErr, DMR_ID_MAX};
use dmrlink_fec::rs_12_9;

/// FLCO for a group voice channel user.
pub const FLCO_GROUP: u8 = 0;
/// FLCO for a unit-to-unit voice channel user.
pub const FLCO_PRIVATE: u8 = 3;

/// Standard feature set id.
pub const FID_STANDARD: u8 = 0;

/// XOR mask over the RS parity octets of a voice LC header.
pub const MASK_VOICE_LC_HEADER: u8 = 0x96;
/// XOR mask over the RS parity octets of a terminator with LC.
pub const MASK_TERMINATOR_WITH_LC: u8 = 0x99;
/// No mask, used for LC carried in embedded signalling.
pub const MASK_NONE: u8 = 0x00;

/// A Full LC record as carried on voice LC headers, terminators and
/// embedded signalling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullLc {
    pub call_type: CallType,
    pub feature_id: u8,
    pub service_options: u8,
    pub dst_id: DmrId,
    pub src_id: DmrId,
}

impl FullLc {
    /// Build an LC for a plain voice call. A zero or out-of-range
    /// destination or source is a caller error and rejected here,
    /// before any encoding happens.
    pub fn new(call_type: CallType, dst_id: DmrId, src_id: DmrId) -> Result<Self, ParseErr> {
        if dst_id == 0 || dst_id > DMR_ID_MAX {
            return Err(ParseErr::InvalidValue {
                field: "dst_id",
                value: dst_id as u64,
            });
        }
        if src_id == 0 || src_id > DMR_ID_MAX {
            return Err(ParseErr::InvalidValue {
                field: "src_id",
                value: src_id as u64,
            });
        }
        Ok(FullLc {
            call_type,
            feature_id: FID_STANDARD,
            service_options: 0,
            dst_id,
            src_id,
        })
    }

    /// Pack to the 9-octet (72-bit) uncoded LC layout.
    pub fn pack(&self) -> [u8; 9] {
        let mut buf = BitBuffer::new(72);
        // PF + reserved bit, then 6-bit FLCO
        buf.write_zeroes(2);
        let flco = match self.call_type {
            CallType::Group => FLCO_GROUP,
            CallType::Private => FLCO_PRIVATE,
        };
        buf.write_bits(flco as u64, 6);
        buf.write_bits(self.feature_id as u64, 8);
        buf.write_bits(self.service_options as u64, 8);
        buf.write_bits(self.dst_id as u64, 24);
        buf.write_bits(self.src_id as u64, 24);

        let mut out = [0u8; 9];
        out.copy_from_slice(buf.as_bytes());
        out
    }

    /// Unpack the 9-octet layout. Unknown FLCO values are rejected.
    pub fn unpack(data: &[u8; 9]) -> Result<Self, ParseErr> {
        let mut buf = BitBuffer::from_bytes(data);
        let _pf = buf.read_field(2, "pf")?;
        let flco = buf.read_field(6, "flco")?;
        let feature_id = buf.read_field(8, "fid")? as u8;
        let service_options = buf.read_field(8, "service_options")? as u8;
        let dst_id = buf.read_field(24, "dst_id")? as DmrId;
        let src_id = buf.read_field(24, "src_id")? as DmrId;

        let call_type = match flco as u8 {
            FLCO_GROUP => CallType::Group,
            FLCO_PRIVATE => CallType::Private,
            other => {
                return Err(ParseErr::InvalidValue {
                    field: "flco",
                    value: other as u64,
                })
            }
        };

        Ok(FullLc {
            call_type,
            feature_id,
            service_options,
            dst_id,
            src_id,
        })
    }

    /// Append the RS(12,9) checksum, masked for the given data type,
    /// yielding the 12-octet coded form fed to the BPTC(196,96) encoder.
    pub fn to_coded(&self, mask: u8) -> [u8; 12] {
        let data = self.pack();
        let parity = rs_12_9::encode(&data);

        let mut block = [0u8; 12];
        block[..9].copy_from_slice(&data);
        block[9] = parity[2] ^ mask;
        block[10] = parity[1] ^ mask;
        block[11] = parity[0] ^ mask;
        block
    }

    /// Verify the masked checksum and unpack the LC. A checksum mismatch
    /// means the block was decoded under the wrong mask or corrupted in a
    /// way the enclosing FEC missed; either way it yields no record.
    pub fn from_coded(block: &[u8; 12], mask: u8) -> Result<Self, ParseErr> {
        let mut unmasked = *block;
        unmasked[9] ^= mask;
        unmasked[10] ^= mask;
        unmasked[11] ^= mask;

        if !rs_12_9::check(&unmasked) {
            return Err(ParseErr::Inconsistency {
                field: "full_lc",
                reason: "checksum mismatch",
            });
        }

        let mut data = [0u8; 9];
        data.copy_from_slice(&unmasked[..9]);
        Self::unpack(&data)
    }
}
