//! The 264-bit DMR burst.
//!
//! Geometry is fixed regardless of content: two 108-bit info halves flank a
//! 48-bit centre field. On voice bursts the info halves carry 216 vocoder
//! bits and the centre holds either a voice sync pattern or EMB + embedded
//! fragment. On data/control bursts the info halves carry 98+98 bits of a
//! BPTC(196,96) codeword, the centre holds a data sync pattern, and the
//! Golay(20,8) slot type straddles it at bits 98..108 and 156..166.

use dmrlink_core::{
    BitBuffer, ColourCode, BURST_BITS, BURST_BYTES, CENTRE_BITS, CENTRE_START, INFO_HALF_BITS,
    SLOT_TYPE_FIRST_START,
};
use dmrlink_fec::bptc_196_96::{self, BptcCodeword};
use dmrlink_fec::golay_20_8;
use std::fmt;

use crate::embedded::{Emb, FRAGMENT_BYTES};

// ─── Sync patterns (48 bits) ──────────────────────────────────────

pub const SYNC_MS_VOICE: u64 = 0x7F7D_5DD5_7DFD;
pub const SYNC_MS_DATA: u64 = 0xD5D7_F77F_D757;
pub const SYNC_BS_VOICE: u64 = 0x755F_D7DF_75F7;
pub const SYNC_BS_DATA: u64 = 0xDFF5_7D75_DF5D;

/// Voice sync for the station role: BS-sourced when operating duplex,
/// MS-sourced otherwise.
pub fn voice_sync(duplex: bool) -> u64 {
    if duplex { SYNC_BS_VOICE } else { SYNC_MS_VOICE }
}

pub fn data_sync(duplex: bool) -> u64 {
    if duplex { SYNC_BS_DATA } else { SYNC_MS_DATA }
}

// ─── Slot type ────────────────────────────────────────────────────

/// Burst content indicator carried in the slot-type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    VoiceLcHeader,
    TerminatorWithLc,
    Csbk,
    Idle,
}

impl DataType {
    pub fn value(self) -> u8 {
        match self {
            DataType::VoiceLcHeader => 1,
            DataType::TerminatorWithLc => 2,
            DataType::Csbk => 3,
            DataType::Idle => 9,
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(DataType::VoiceLcHeader),
            2 => Some(DataType::TerminatorWithLc),
            3 => Some(DataType::Csbk),
            9 => Some(DataType::Idle),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::VoiceLcHeader => write!(f, "voice LC header"),
            DataType::TerminatorWithLc => write!(f, "terminator with LC"),
            DataType::Csbk => write!(f, "CSBK"),
            DataType::Idle => write!(f, "idle"),
        }
    }
}

// ─── Encoding ─────────────────────────────────────────────────────

/// Centre-field content of a voice burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCentre {
    /// Voice sync pattern (superframe position A's voice variant is not
    /// used here; sync marks the first burst the receiver can lock onto).
    Sync,
    /// EMB plus a 32-bit embedded-signalling fragment.
    Embedded { emb: Emb, fragment: [u8; FRAGMENT_BYTES] },
}

/// Build a data/control burst around a 12-octet coded LC.
pub fn encode_data_burst(
    data_type: DataType,
    colour_code: ColourCode,
    coded_lc: &[u8; 12],
    duplex: bool,
) -> [u8; BURST_BYTES] {
    let codeword = bptc_196_96::encode(coded_lc);
    let slot_type = golay_20_8::encode((colour_code.value() << 4) | data_type.value());

    let mut buf = BitBuffer::new(BURST_BITS);
    buf.write_bitarr(&codeword.0[..98]);
    buf.write_bits((slot_type >> 10) as u64, 10);
    buf.write_bits(data_sync(duplex), CENTRE_BITS);
    buf.write_bits((slot_type & 0x3FF) as u64, 10);
    buf.write_bitarr(&codeword.0[98..]);

    let mut out = [0u8; BURST_BYTES];
    out.copy_from_slice(buf.as_bytes());
    out
}

/// Build a voice burst around 27 octets (216 bits) of vocoder payload.
pub fn encode_voice_burst(
    voice: &[u8; 27],
    centre: &VoiceCentre,
    duplex: bool,
) -> [u8; BURST_BYTES] {
    let mut voice_bits = [0u8; 216];
    let mut vb = BitBuffer::from_bytes(voice);
    // 27 bytes are exactly 216 bits, this cannot come up short
    let _ = vb.read_bitarr(&mut voice_bits);

    let mut buf = BitBuffer::new(BURST_BITS);
    buf.write_bitarr(&voice_bits[..INFO_HALF_BITS]);
    match centre {
        VoiceCentre::Sync => buf.write_bits(voice_sync(duplex), CENTRE_BITS),
        VoiceCentre::Embedded { emb, fragment } => {
            let emb_cw = emb.encode();
            buf.write_bits((emb_cw >> 8) as u64, 8);
            let mut frag_bits = [0u8; 32];
            let _ = BitBuffer::from_bytes(fragment).read_bitarr(&mut frag_bits);
            buf.write_bitarr(&frag_bits);
            buf.write_bits((emb_cw & 0xFF) as u64, 8);
        }
    }
    buf.write_bitarr(&voice_bits[INFO_HALF_BITS..]);

    let mut out = [0u8; BURST_BYTES];
    out.copy_from_slice(buf.as_bytes());
    out
}

// ─── Decoding ─────────────────────────────────────────────────────

/// A successfully decoded burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Burst {
    /// Data/control burst; the coded LC still carries its RS mask, the
    /// caller picks the mask matching the data type.
    Data {
        data_type: DataType,
        colour_code: ColourCode,
        coded_lc: [u8; 12],
    },
    /// Voice burst whose centre held a sync pattern.
    VoiceSync { voice: [u8; 27] },
    /// Voice burst with EMB and embedded fragment.
    Voice {
        voice: [u8; 27],
        emb: Emb,
        fragment: [u8; FRAGMENT_BYTES],
    },
}

/// Decode failure; the burst is dropped and counted, never propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstDecodeErr {
    SlotTypeUncorrectable,
    LcUncorrectable,
    EmbUncorrectable,
    UnknownDataType(u8),
}

impl fmt::Display for BurstDecodeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BurstDecodeErr::SlotTypeUncorrectable => write!(f, "slot type uncorrectable"),
            BurstDecodeErr::LcUncorrectable => write!(f, "full LC codeword uncorrectable"),
            BurstDecodeErr::EmbUncorrectable => write!(f, "EMB field uncorrectable"),
            BurstDecodeErr::UnknownDataType(v) => write!(f, "unknown data type {}", v),
        }
    }
}

impl std::error::Error for BurstDecodeErr {}

/// Decode one burst, returning it with the total number of corrected bits.
pub fn decode_burst(bytes: &[u8; BURST_BYTES]) -> Result<(Burst, u32), BurstDecodeErr> {
    let mut buf = BitBuffer::from_bytes(bytes);
    buf.seek(CENTRE_START);
    let centre = buf.read_bits(CENTRE_BITS).unwrap_or(0);

    match centre {
        SYNC_MS_DATA | SYNC_BS_DATA => decode_data_burst(bytes),
        SYNC_MS_VOICE | SYNC_BS_VOICE => Ok((
            Burst::VoiceSync { voice: extract_voice(bytes) },
            0,
        )),
        _ => decode_voice_embedded(bytes),
    }
}

fn decode_data_burst(bytes: &[u8; BURST_BYTES]) -> Result<(Burst, u32), BurstDecodeErr> {
    let mut buf = BitBuffer::from_bytes(bytes);

    buf.seek(SLOT_TYPE_FIRST_START);
    let st_high = buf.read_bits(10).unwrap_or(0) as u32;
    buf.seek(CENTRE_START + CENTRE_BITS);
    let st_low = buf.read_bits(10).unwrap_or(0) as u32;

    let (slot_type, st_corrected) = golay_20_8::decode((st_high << 10) | st_low)
        .map_err(|_| BurstDecodeErr::SlotTypeUncorrectable)?;
    let colour_code = ColourCode::new(slot_type >> 4)
        .ok_or(BurstDecodeErr::SlotTypeUncorrectable)?;
    let data_type = DataType::from_value(slot_type & 0x0F)
        .ok_or(BurstDecodeErr::UnknownDataType(slot_type & 0x0F))?;

    let mut codeword = BptcCodeword([0u8; 196]);
    buf.seek(0);
    let _ = buf.read_bitarr(&mut codeword.0[..98]);
    buf.seek(CENTRE_START + CENTRE_BITS + 10);
    let _ = buf.read_bitarr(&mut codeword.0[98..]);

    let (coded_lc, lc_corrected) =
        bptc_196_96::decode(&codeword).map_err(|_| BurstDecodeErr::LcUncorrectable)?;

    Ok((
        Burst::Data { data_type, colour_code, coded_lc },
        st_corrected + lc_corrected,
    ))
}

fn decode_voice_embedded(bytes: &[u8; BURST_BYTES]) -> Result<(Burst, u32), BurstDecodeErr> {
    let mut buf = BitBuffer::from_bytes(bytes);
    buf.seek(CENTRE_START);
    let emb_high = buf.read_bits(8).unwrap_or(0) as u16;
    let mut frag_bits = [0u8; 32];
    let _ = buf.read_bitarr(&mut frag_bits);
    let emb_low = buf.read_bits(8).unwrap_or(0) as u16;

    let (emb, corrected) =
        Emb::decode((emb_high << 8) | emb_low).map_err(|_| BurstDecodeErr::EmbUncorrectable)?;

    let mut fragment = [0u8; FRAGMENT_BYTES];
    fragment.copy_from_slice(BitBuffer::from_bitarr(&frag_bits).as_bytes());

    Ok((
        Burst::Voice { voice: extract_voice(bytes), emb, fragment },
        corrected,
    ))
}

fn extract_voice(bytes: &[u8; BURST_BYTES]) -> [u8; 27] {
    let mut buf = BitBuffer::from_bytes(bytes);
    let mut bits = [0u8; 216];
    let _ = buf.read_bitarr(&mut bits[..INFO_HALF_BITS]);
    buf.seek(CENTRE_START + CENTRE_BITS);
    let _ = buf.read_bitarr(&mut bits[INFO_HALF_BITS..]);

    let mut voice = [0u8; 27];
    voice.copy_from_slice(BitBuffer::from_bitarr(&bits).as_bytes());
    voice
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedded::{fragment_lc, Lcss};
    use crate::link_control::{FullLc, MASK_VOICE_LC_HEADER};
    use dmrlink_core::CallType;

    fn sample_coded_lc() -> ([u8; 12], FullLc) {
        let lc = FullLc::new(CallType::Group, 9, 3107001).unwrap();
        (lc.to_coded(MASK_VOICE_LC_HEADER), lc)
    }

    fn sample_voice() -> [u8; 27] {
        let mut voice = [0u8; 27];
        for (i, b) in voice.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        voice
    }

    #[test]
    fn test_data_burst_round_trip() {
        let (coded_lc, _) = sample_coded_lc();
        let cc = ColourCode::new(1).unwrap();
        let bytes = encode_data_burst(DataType::VoiceLcHeader, cc, &coded_lc, false);

        let (burst, corrected) = decode_burst(&bytes).unwrap();
        assert_eq!(corrected, 0);
        assert_eq!(
            burst,
            Burst::Data {
                data_type: DataType::VoiceLcHeader,
                colour_code: cc,
                coded_lc,
            }
        );
    }

    #[test]
    fn test_data_burst_sync_selection() {
        let (coded_lc, _) = sample_coded_lc();
        let cc = ColourCode::default();

        for (duplex, expected) in [(false, SYNC_MS_DATA), (true, SYNC_BS_DATA)] {
            let bytes = encode_data_burst(DataType::VoiceLcHeader, cc, &coded_lc, duplex);
            let mut buf = BitBuffer::from_bytes(&bytes);
            buf.seek(CENTRE_START);
            assert_eq!(buf.read_bits(CENTRE_BITS).unwrap(), expected);
        }
    }

    #[test]
    fn test_encoding_idempotent() {
        let (coded_lc, _) = sample_coded_lc();
        let cc = ColourCode::new(5).unwrap();
        let a = encode_data_burst(DataType::TerminatorWithLc, cc, &coded_lc, false);
        let b = encode_data_burst(DataType::TerminatorWithLc, cc, &coded_lc, false);
        assert_eq!(a, b);

        let voice = sample_voice();
        let va = encode_voice_burst(&voice, &VoiceCentre::Sync, false);
        let vb = encode_voice_burst(&voice, &VoiceCentre::Sync, false);
        assert_eq!(va, vb);
    }

    #[test]
    fn test_voice_sync_burst_round_trip() {
        let voice = sample_voice();
        let bytes = encode_voice_burst(&voice, &VoiceCentre::Sync, false);
        let (burst, _) = decode_burst(&bytes).unwrap();
        assert_eq!(burst, Burst::VoiceSync { voice });
    }

    #[test]
    fn test_voice_embedded_burst_round_trip() {
        let (_, lc) = sample_coded_lc();
        let fragments = fragment_lc(&lc);
        let voice = sample_voice();
        let emb = Emb {
            colour_code: ColourCode::new(1).unwrap(),
            pi: false,
            lcss: Lcss::First,
        };

        let bytes = encode_voice_burst(
            &voice,
            &VoiceCentre::Embedded { emb, fragment: fragments[0] },
            false,
        );
        let (burst, corrected) = decode_burst(&bytes).unwrap();
        assert_eq!(corrected, 0);
        assert_eq!(burst, Burst::Voice { voice, emb, fragment: fragments[0] });
    }

    #[test]
    fn test_slot_type_corrected_through_burst() {
        let (coded_lc, _) = sample_coded_lc();
        let cc = ColourCode::new(1).unwrap();
        let mut bytes = encode_data_burst(DataType::VoiceLcHeader, cc, &coded_lc, false);

        // Flip one bit inside the first slot-type half (bits 98..108)
        bytes[12] ^= 0x10; // bit 99 of the burst
        let (burst, corrected) = decode_burst(&bytes).unwrap();
        assert_eq!(corrected, 1);
        match burst {
            Burst::Data { colour_code, .. } => assert_eq!(colour_code, cc),
            other => panic!("expected data burst, got {:?}", other),
        }
    }

    #[test]
    fn test_slot_type_uncorrectable_reported() {
        let (coded_lc, _) = sample_coded_lc();
        let cc = ColourCode::new(1).unwrap();
        let mut bytes = encode_data_burst(DataType::VoiceLcHeader, cc, &coded_lc, false);

        // Four spread errors across both slot-type halves
        bytes[12] ^= 0x30; // bits 98..108 region
        bytes[19] ^= 0x0C; // bits 156..166 region
        assert_eq!(decode_burst(&bytes), Err(BurstDecodeErr::SlotTypeUncorrectable));
    }

    #[test]
    fn test_fixed_length_and_reserved_bits_stable() {
        let (coded_lc, _) = sample_coded_lc();
        let bytes =
            encode_data_burst(DataType::VoiceLcHeader, ColourCode::default(), &coded_lc, false);
        assert_eq!(bytes.len(), BURST_BYTES);
    }
}
