//! Core utilities for the DMRlink stack
//!
//! This crate provides fundamental types and utilities used across the stack:
//! - BitBuffer for bit-level burst and PDU manipulation
//! - DMR address, timeslot and colour-code value types
//! - Burst geometry and timing constants
//! - Parse-error taxonomy, common macros and debug utilities

pub mod address;
pub mod bitbuffer;
pub mod debug;
pub mod parse_error;

// Re-export commonly used items
pub use address::*;
pub use bitbuffer::BitBuffer;
pub use parse_error::ParseErr;

pub const STACK_VERSION: &str = env!("CARGO_PKG_VERSION");

// ─── Burst geometry (bit offsets inside the 264-bit burst) ────────

/// Total bit length of one DMR burst, fixed regardless of content.
pub const BURST_BITS: usize = 264;
/// Byte-equivalent burst size as carried in the network envelope.
pub const BURST_BYTES: usize = 33;

/// Width of each info half flanking the centre field.
pub const INFO_HALF_BITS: usize = 108;
/// Centre field (sync, or EMB + embedded signalling), bits 108..156.
pub const CENTRE_START: usize = 108;
pub const CENTRE_BITS: usize = 48;
/// Start of the second info half.
pub const INFO_SECOND_START: usize = 156;

/// Slot type halves flank the centre field on data/control bursts.
pub const SLOT_TYPE_HALF_BITS: usize = 10;
pub const SLOT_TYPE_FIRST_START: usize = 98;
pub const SLOT_TYPE_SECOND_START: usize = 156;

/// Voice payload bits per burst (two info halves).
pub const VOICE_BITS: usize = 216;
/// Coded info bits on a data/control burst (carries one BPTC(196,96) codeword).
pub const DATA_INFO_BITS: usize = 196;

// ─── Timing ───────────────────────────────────────────────────────

/// Inter-burst cadence: one burst per timeslot every two 30 ms TDMA frames.
pub const BURST_INTERVAL_MS: u64 = 60;
/// 20 ms vocoder frames carried per burst.
pub const VOICE_FRAMES_PER_BURST: usize = 3;
/// Bytes per 20 ms vocoder frame (72 bits).
pub const VOICE_FRAME_BYTES: usize = 9;

/// Vocoder silence pattern used to pad a burst when the source runs dry.
pub const SILENCE_FRAME: [u8; VOICE_FRAME_BYTES] = [0xB9, 0xE8, 0x81, 0x52, 0x61, 0x73, 0x00, 0x2A, 0x6B];
