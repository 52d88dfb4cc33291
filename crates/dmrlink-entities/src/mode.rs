use dmrlink_core::{CallType, ColourCode, DmrId, Timeslot};
use dmrlink_pdus::homebrew::DmrdFrame;

/// Per-call parameters. Owned by the engine; setters latch changes at the
/// next superframe boundary, never mid-burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub src_id: DmrId,
    pub dst_id: DmrId,
    pub call_type: CallType,
    pub colour_code: ColourCode,
    pub timeslot: Timeslot,
}

/// Capability interface of one digital-voice protocol engine.
///
/// The session/transport and scheduler layers drive any mode through this
/// trait, so further modes can share them without a class hierarchy. Only
/// DMR is implemented.
pub trait DigitalMode {
    /// Next outbound frame if a transmission is active; None when idle.
    /// Called once per burst interval.
    fn encode_next_burst(&mut self) -> Option<DmrdFrame>;

    /// Feed one inbound frame through the mode's decoder. Integrity
    /// failures are counted and dropped, never propagated.
    fn decode_burst(&mut self, frame: DmrdFrame);

    /// The network session reached the connected state.
    fn session_up(&mut self);

    /// The network session ended; any active transmission is abandoned.
    fn session_down(&mut self);
}
