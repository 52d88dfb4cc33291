//! Wire formats for the DMR-over-IP client stack
//!
//! Layered, innermost first:
//! - `link_control`: the Full LC record (who is calling whom, and how)
//! - `embedded`: LC fragmented into the embedded-signalling field of
//!   voice bursts B..E, plus the reassembly accumulator
//! - `burst`: the 264-bit air-interface burst (sync, slot type, info)
//! - `homebrew`: the UDP envelope spoken to the network server

pub mod burst;
pub mod embedded;
pub mod homebrew;
pub mod link_control;
