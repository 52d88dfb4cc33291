//! Outbound transmission: superframe cursor, voice queueing and burst
//! assembly for one active call.
//!
//! Position A of every superframe carries the Full LC as a voice LC
//! header burst; B..E carry voice with the four embedded LC fragments;
//! F carries voice with a null embedded field. Ending the call emits a
//! terminator-with-LC burst. The engine paces `next_frame` at the fixed
//! burst interval; when the caller's voice source runs dry the queue is
//! padded with the vocoder silence pattern so the cadence never breaks.

use std::collections::VecDeque;

use dmrlink_core::{ParseErr, SILENCE_FRAME, VOICE_FRAMES_PER_BURST, VOICE_FRAME_BYTES};
use dmrlink_pdus::burst::{self, DataType, VoiceCentre};
use dmrlink_pdus::embedded::{fragment_lc, Emb, Lcss, FRAGMENTS, FRAGMENT_BYTES};
use dmrlink_pdus::homebrew::{DmrdFrame, FrameKind};
use dmrlink_pdus::link_control::{FullLc, MASK_TERMINATOR_WITH_LC, MASK_VOICE_LC_HEADER};
use tracing::debug;

use crate::mode::CallContext;

/// One of the six burst positions of a voice superframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperframePosition {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl SuperframePosition {
    pub fn next(self) -> Self {
        match self {
            SuperframePosition::A => SuperframePosition::B,
            SuperframePosition::B => SuperframePosition::C,
            SuperframePosition::C => SuperframePosition::D,
            SuperframePosition::D => SuperframePosition::E,
            SuperframePosition::E => SuperframePosition::F,
            SuperframePosition::F => SuperframePosition::A,
        }
    }

    /// 0-based index, A = 0.
    pub fn index(self) -> usize {
        match self {
            SuperframePosition::A => 0,
            SuperframePosition::B => 1,
            SuperframePosition::C => 2,
            SuperframePosition::D => 3,
            SuperframePosition::E => 4,
            SuperframePosition::F => 5,
        }
    }
}

/// Transmit side of one call. Built at call start, dropped at call end.
pub struct VoiceTransmitter {
    context: CallContext,
    stream_id: u32,
    duplex: bool,

    lc: FullLc,
    fragments: [[u8; FRAGMENT_BYTES]; FRAGMENTS],

    position: SuperframePosition,
    /// Envelope sequence counter, wraps at 255.
    seq: u8,
    queue: VecDeque<[u8; VOICE_FRAME_BYTES]>,
    silence_filled: u64,
}

impl VoiceTransmitter {
    /// Validates the call context and precomputes the LC material.
    pub fn start(context: CallContext, stream_id: u32, duplex: bool) -> Result<Self, ParseErr> {
        let lc = FullLc::new(context.call_type, context.dst_id, context.src_id)?;
        Ok(Self {
            context,
            stream_id,
            duplex,
            lc,
            fragments: fragment_lc(&lc),
            position: SuperframePosition::A,
            seq: 0,
            queue: VecDeque::new(),
            silence_filled: 0,
        })
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn position(&self) -> SuperframePosition {
        self.position
    }

    /// True when the next burst starts a superframe; parameter changes
    /// latch here.
    pub fn at_superframe_boundary(&self) -> bool {
        self.position == SuperframePosition::A
    }

    /// Number of bursts padded with silence so far.
    pub fn silence_filled(&self) -> u64 {
        self.silence_filled
    }

    /// Queue one 20 ms voice unit from the caller.
    pub fn push_voice(&mut self, unit: [u8; VOICE_FRAME_BYTES]) {
        self.queue.push_back(unit);
    }

    /// Swap in a changed call context. Only valid at a superframe
    /// boundary; bursts already transmitted are never rewritten.
    pub fn apply_context(&mut self, context: CallContext) -> Result<(), ParseErr> {
        debug_assert!(self.at_superframe_boundary());
        let lc = FullLc::new(context.call_type, context.dst_id, context.src_id)?;
        self.fragments = fragment_lc(&lc);
        self.lc = lc;
        self.context = context;
        Ok(())
    }

    /// Build the burst for the current position and advance the cursor.
    pub fn next_frame(&mut self, repeater_id: u32) -> DmrdFrame {
        let position = self.position;
        self.position = position.next();

        let (payload, frame_kind) = match position {
            SuperframePosition::A => {
                let coded = self.lc.to_coded(MASK_VOICE_LC_HEADER);
                let payload = burst::encode_data_burst(
                    DataType::VoiceLcHeader,
                    self.context.colour_code,
                    &coded,
                    self.duplex,
                );
                (payload, FrameKind::DataSync(DataType::VoiceLcHeader.value()))
            }
            SuperframePosition::F => {
                let emb = Emb {
                    colour_code: self.context.colour_code,
                    pi: false,
                    lcss: Lcss::Single,
                };
                let centre = VoiceCentre::Embedded { emb, fragment: [0u8; FRAGMENT_BYTES] };
                let payload = burst::encode_voice_burst(&self.pull_voice(), &centre, self.duplex);
                (payload, FrameKind::Voice { seq: 5 })
            }
            other => {
                let fragment_index = other.index() - 1;
                let emb = Emb {
                    colour_code: self.context.colour_code,
                    pi: false,
                    lcss: Lcss::for_fragment(fragment_index),
                };
                let centre = VoiceCentre::Embedded {
                    emb,
                    fragment: self.fragments[fragment_index],
                };
                let payload = burst::encode_voice_burst(&self.pull_voice(), &centre, self.duplex);
                (payload, FrameKind::Voice { seq: fragment_index as u8 + 1 })
            }
        };

        self.envelope(repeater_id, frame_kind, payload)
    }

    /// Build the end-of-call terminator burst.
    pub fn terminator_frame(&mut self, repeater_id: u32) -> DmrdFrame {
        let coded = self.lc.to_coded(MASK_TERMINATOR_WITH_LC);
        let payload = burst::encode_data_burst(
            DataType::TerminatorWithLc,
            self.context.colour_code,
            &coded,
            self.duplex,
        );
        self.envelope(
            repeater_id,
            FrameKind::DataSync(DataType::TerminatorWithLc.value()),
            payload,
        )
    }

    fn envelope(&mut self, repeater_id: u32, frame_kind: FrameKind, payload: [u8; 33]) -> DmrdFrame {
        let frame = DmrdFrame {
            seq: self.seq,
            src_id: self.context.src_id,
            dst_id: self.context.dst_id,
            repeater_id,
            timeslot: self.context.timeslot,
            call_type: self.context.call_type,
            frame_kind,
            stream_id: self.stream_id,
            payload,
        };
        self.seq = self.seq.wrapping_add(1);
        frame
    }

    /// Pull three 20 ms units, padding with silence if the source ran dry.
    fn pull_voice(&mut self) -> [u8; 27] {
        let mut out = [0u8; 27];
        let mut padded = false;
        for i in 0..VOICE_FRAMES_PER_BURST {
            let unit = self.queue.pop_front().unwrap_or_else(|| {
                padded = true;
                SILENCE_FRAME
            });
            out[i * VOICE_FRAME_BYTES..(i + 1) * VOICE_FRAME_BYTES].copy_from_slice(&unit);
        }
        if padded {
            self.silence_filled += 1;
            debug!(total = self.silence_filled, "voice source dry, padding burst with silence");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmrlink_core::{CallType, ColourCode, Timeslot};
    use dmrlink_pdus::burst::{decode_burst, Burst};
    use dmrlink_pdus::embedded::LcAssembler;
    use dmrlink_pdus::link_control::MASK_VOICE_LC_HEADER;

    fn test_context() -> CallContext {
        CallContext {
            src_id: 3107001,
            dst_id: 9,
            call_type: CallType::Group,
            colour_code: ColourCode::new(1).unwrap(),
            timeslot: Timeslot::Slot1,
        }
    }

    #[test]
    fn test_invalid_context_rejected_at_start() {
        let mut ctx = test_context();
        ctx.dst_id = 0;
        assert!(VoiceTransmitter::start(ctx, 1, false).is_err());
    }

    #[test]
    fn test_first_burst_is_lc_header_with_colour_code() {
        let mut tx = VoiceTransmitter::start(test_context(), 0x1234, false).unwrap();
        let frame = tx.next_frame(310700101);

        assert_eq!(frame.frame_kind, FrameKind::DataSync(1));
        assert_eq!(frame.dst_id, 9);
        assert_eq!(frame.stream_id, 0x1234);

        let (burst, _) = decode_burst(&frame.payload).unwrap();
        match burst {
            Burst::Data { data_type, colour_code, coded_lc } => {
                assert_eq!(data_type, DataType::VoiceLcHeader);
                assert_eq!(colour_code.value(), 1);
                let lc = FullLc::from_coded(&coded_lc, MASK_VOICE_LC_HEADER).unwrap();
                assert_eq!(lc.dst_id, 9);
                assert_eq!(lc.src_id, 3107001);
            }
            other => panic!("expected data burst, got {:?}", other),
        }
    }

    #[test]
    fn test_superframe_cycles_and_fragments_match_header() {
        let mut tx = VoiceTransmitter::start(test_context(), 7, false).unwrap();
        let mut header_lc = None;
        let mut assembler = LcAssembler::new();
        let mut assembled = None;

        for step in 0..7 {
            let expected_index = step % 6;
            assert_eq!(tx.position().index(), expected_index);
            let frame = tx.next_frame(310700101);
            let (burst, _) = decode_burst(&frame.payload).unwrap();

            match burst {
                Burst::Data { coded_lc, .. } => {
                    header_lc = Some(FullLc::from_coded(&coded_lc, MASK_VOICE_LC_HEADER).unwrap());
                }
                Burst::Voice { emb, fragment, .. } => {
                    if let Some(lc) = assembler.push(emb.lcss, fragment) {
                        assembled = Some(lc);
                    }
                }
                other => panic!("unexpected burst {:?}", other),
            }
        }

        // Six bursts cycled A..F and wrapped back to A
        assert_eq!(tx.position(), SuperframePosition::B);
        assert_eq!(assembled, header_lc);
        assert!(assembled.is_some());
    }

    #[test]
    fn test_silence_fill_keeps_cadence() {
        let mut tx = VoiceTransmitter::start(test_context(), 7, false).unwrap();
        let _ = tx.next_frame(1); // A, no voice needed
        assert_eq!(tx.silence_filled(), 0);

        let frame = tx.next_frame(1); // B, queue empty
        assert_eq!(tx.silence_filled(), 1);
        let (burst, _) = decode_burst(&frame.payload).unwrap();
        match burst {
            Burst::Voice { voice, .. } => {
                assert_eq!(&voice[..9], &SILENCE_FRAME);
                assert_eq!(&voice[9..18], &SILENCE_FRAME);
            }
            other => panic!("expected voice burst, got {:?}", other),
        }

        // Queued voice is used before silence
        tx.push_voice([0x11; 9]);
        let frame = tx.next_frame(1); // C
        let (burst, _) = decode_burst(&frame.payload).unwrap();
        match burst {
            Burst::Voice { voice, .. } => {
                assert_eq!(&voice[..9], &[0x11; 9]);
                assert_eq!(&voice[9..18], &SILENCE_FRAME);
            }
            other => panic!("expected voice burst, got {:?}", other),
        }
        assert_eq!(tx.silence_filled(), 2);
    }

    #[test]
    fn test_terminator_carries_lc() {
        let mut tx = VoiceTransmitter::start(test_context(), 7, false).unwrap();
        let _ = tx.next_frame(1);
        let frame = tx.terminator_frame(1);

        assert_eq!(frame.frame_kind, FrameKind::DataSync(2));
        let (burst, _) = decode_burst(&frame.payload).unwrap();
        match burst {
            Burst::Data { data_type, coded_lc, .. } => {
                assert_eq!(data_type, DataType::TerminatorWithLc);
                let lc = FullLc::from_coded(&coded_lc, MASK_TERMINATOR_WITH_LC).unwrap();
                assert_eq!(lc.dst_id, 9);
            }
            other => panic!("expected terminator, got {:?}", other),
        }
    }

    #[test]
    fn test_envelope_sequence_increments() {
        let mut tx = VoiceTransmitter::start(test_context(), 7, false).unwrap();
        for expected in 0u8..10 {
            let frame = tx.next_frame(1);
            assert_eq!(frame.seq, expected);
        }
    }

    #[test]
    fn test_context_change_latches_at_boundary() {
        let mut tx = VoiceTransmitter::start(test_context(), 7, false).unwrap();
        for _ in 0..6 {
            let _ = tx.next_frame(1);
        }
        assert!(tx.at_superframe_boundary());

        let mut ctx = test_context();
        ctx.dst_id = 2345;
        tx.apply_context(ctx).unwrap();

        let frame = tx.next_frame(1);
        let (burst, _) = decode_burst(&frame.payload).unwrap();
        match burst {
            Burst::Data { coded_lc, .. } => {
                let lc = FullLc::from_coded(&coded_lc, MASK_VOICE_LC_HEADER).unwrap();
                assert_eq!(lc.dst_id, 2345);
            }
            other => panic!("expected data burst, got {:?}", other),
        }
    }

    #[test]
    fn test_encoding_idempotent_for_same_state() {
        let ctx = test_context();
        let mut a = VoiceTransmitter::start(ctx, 7, false).unwrap();
        let mut b = VoiceTransmitter::start(ctx, 7, false).unwrap();
        assert_eq!(a.next_frame(1), b.next_frame(1));
        assert_eq!(a.next_frame(1), b.next_frame(1));
    }
}
