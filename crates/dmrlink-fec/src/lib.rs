//! FEC codec families for the DMR air interface
//!
//! Three independent, stateless code families protect the burst fields:
//! - Golay(20,8) for the slot type (colour code + data type)
//! - QR(16,7,6) for the EMB field, Hamming(16,11,4) rows for embedded LC
//! - BPTC(196,96) for the Full LC carried on data/control bursts,
//!   with an RS(12,9) checksum inside the 96-bit payload
//!
//! Every encoder is pure: the same payload always yields the same codeword.
//! Decoders either return the payload (with the number of corrected bits)
//! or report the codeword as uncorrectable; they never guess.

pub mod bptc_196_96;
pub mod golay_20_8;
pub mod hamming;
pub mod qr_16_7_6;
pub mod rs_12_9;

use std::fmt;

/// A codeword whose parity remained inconsistent after correction attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uncorrectable;

impl fmt::Display for Uncorrectable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uncorrectable codeword")
    }
}

impl std::error::Error for Uncorrectable {}
