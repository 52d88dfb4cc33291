//! The protocol engine: a single-threaded event loop owning the session,
//! the transport, the call context and the burst codec paths.
//!
//! Callers talk to the engine over a command channel and drain decoded
//! traffic and state changes from an event channel, so a UI thread never
//! touches protocol state directly.

use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use dmrlink_config::SessionConfig;
use dmrlink_core::{CallType, ColourCode, DmrId, Timeslot, BURST_INTERVAL_MS, DMR_ID_MAX, VOICE_FRAME_BYTES};
use dmrlink_pdus::burst::{self, Burst, BurstDecodeErr, DataType};
use dmrlink_pdus::embedded::LcAssembler;
use dmrlink_pdus::homebrew::{self, DmrdFrame};
use dmrlink_pdus::link_control::{FullLc, MASK_TERMINATOR_WITH_LC, MASK_VOICE_LC_HEADER};
use tracing::{debug, info, warn};

use crate::mode::{CallContext, DigitalMode};
use crate::scheduler::VoiceTransmitter;
use crate::session::{Session, SessionEvent, SessionOutput};
use crate::transport::UdpTransport;

// ─── Caller-facing channels ───────────────────────────────────────

/// Commands accepted by the engine loop.
#[derive(Debug)]
pub enum EngineCommand {
    Connect,
    Disconnect,
    StartCall { dst_id: DmrId, call_type: CallType },
    EndCall,
    SetTalkgroup(DmrId),
    SetCallType(CallType),
    SetColourCode(ColourCode),
    SetTimeslot(Timeslot),
    PushVoice([u8; VOICE_FRAME_BYTES]),
    Shutdown,
}

/// Events surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    SessionUp,
    SessionDown(String),
    AuthFailed(String),
    /// A call request was rejected before encoding, e.g. an empty
    /// destination id.
    CallRejected(String),
    /// A Link Control record was seen on the channel (header or
    /// reassembled embedded signalling).
    LcReceived { stream_id: u32, lc: FullLc },
    VoiceReceived {
        stream_id: u32,
        src_id: DmrId,
        dst_id: DmrId,
        voice: [u8; 27],
    },
    /// The far end terminated its transmission.
    RemoteCallEnded { stream_id: u32, lc: Option<FullLc> },
}

/// Frame-integrity diagnostic counters. Decode failures are expected in
/// normal radio conditions and only ever counted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStats {
    pub slot_type_uncorrectable: u64,
    pub lc_uncorrectable: u64,
    pub emb_uncorrectable: u64,
    pub unknown_data_type: u64,
    pub wrong_timeslot: u64,
    pub bits_corrected: u64,
}

// ─── DMR mode ─────────────────────────────────────────────────────

/// The DMR implementation of [`DigitalMode`]: transmit-side superframe
/// scheduling and receive-side burst decoding.
pub struct DmrMode {
    repeater_id: u32,
    duplex: bool,

    context: CallContext,
    /// Context changes latch at the next superframe boundary.
    pending_context: Option<CallContext>,
    tx: Option<VoiceTransmitter>,
    end_of_call: bool,

    assembler: LcAssembler,
    /// Last LC surfaced, used to suppress repeats within one stream.
    last_lc: Option<(u32, FullLc)>,
    stats: DecodeStats,

    events: Sender<EngineEvent>,
}

impl DmrMode {
    pub fn new(config: &SessionConfig, events: Sender<EngineEvent>) -> Self {
        let station = &config.station;
        // The ESSID carries a two-digit suffix on top of the subscriber id
        let src_id = if station.essid > DMR_ID_MAX { station.essid / 100 } else { station.essid };

        Self {
            repeater_id: station.essid,
            duplex: station.duplex,
            context: CallContext {
                src_id,
                dst_id: 0,
                call_type: CallType::Group,
                colour_code: station.colour_code,
                timeslot: station.timeslot,
            },
            pending_context: None,
            tx: None,
            end_of_call: false,
            assembler: LcAssembler::new(),
            last_lc: None,
            stats: DecodeStats::default(),
            events,
        }
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn call_active(&self) -> bool {
        self.tx.is_some()
    }

    /// Begin a transmission. The context is validated before any burst is
    /// encoded; a fresh random stream id is drawn per call.
    pub fn start_call(&mut self, dst_id: DmrId, call_type: CallType) -> Result<(), String> {
        let mut context = self.pending_context.take().unwrap_or(self.context);
        context.dst_id = dst_id;
        context.call_type = call_type;

        let stream_id: u32 = rand::random();
        match VoiceTransmitter::start(context, stream_id, self.duplex) {
            Ok(tx) => {
                info!(dst_id, %call_type, stream_id, "call started");
                self.context = context;
                self.tx = Some(tx);
                self.end_of_call = false;
                Ok(())
            }
            Err(err) => Err(err.to_string()),
        }
    }

    /// Request the terminator burst; the transmission ends on the next tick.
    pub fn end_call(&mut self) {
        if self.tx.is_some() {
            self.end_of_call = true;
        }
    }

    pub fn push_voice(&mut self, unit: [u8; VOICE_FRAME_BYTES]) {
        if let Some(ref mut tx) = self.tx {
            tx.push_voice(unit);
        }
    }

    fn update_pending(&mut self, f: impl FnOnce(&mut CallContext)) {
        let mut context = self.pending_context.take().unwrap_or(self.context);
        f(&mut context);
        if self.tx.is_some() {
            self.pending_context = Some(context);
        } else {
            // No transmission in flight, nothing to latch against
            self.context = context;
        }
    }

    pub fn set_talkgroup(&mut self, dst_id: DmrId) {
        self.update_pending(|c| c.dst_id = dst_id);
    }

    pub fn set_call_type(&mut self, call_type: CallType) {
        self.update_pending(|c| c.call_type = call_type);
    }

    pub fn set_colour_code(&mut self, colour_code: ColourCode) {
        self.update_pending(|c| c.colour_code = colour_code);
    }

    pub fn set_timeslot(&mut self, timeslot: Timeslot) {
        self.update_pending(|c| c.timeslot = timeslot);
    }

    fn surface_lc(&mut self, stream_id: u32, lc: FullLc) {
        if self.last_lc == Some((stream_id, lc)) {
            return;
        }
        self.last_lc = Some((stream_id, lc));
        let _ = self.events.send(EngineEvent::LcReceived { stream_id, lc });
    }

    fn handle_data_burst(&mut self, frame: &DmrdFrame, data_type: DataType, coded_lc: [u8; 12]) {
        match data_type {
            DataType::VoiceLcHeader => {
                // A header starts a new superframe sequence
                self.assembler.reset();
                match FullLc::from_coded(&coded_lc, MASK_VOICE_LC_HEADER) {
                    Ok(lc) => self.surface_lc(frame.stream_id, lc),
                    Err(err) => {
                        debug!(%err, "voice LC header rejected");
                        self.stats.lc_uncorrectable += 1;
                    }
                }
            }
            DataType::TerminatorWithLc => {
                self.assembler.reset();
                let lc = FullLc::from_coded(&coded_lc, MASK_TERMINATOR_WITH_LC).ok();
                self.last_lc = None;
                let _ = self.events.send(EngineEvent::RemoteCallEnded {
                    stream_id: frame.stream_id,
                    lc,
                });
            }
            other => debug!(%other, "ignoring data burst"),
        }
    }
}

impl DigitalMode for DmrMode {
    fn encode_next_burst(&mut self) -> Option<DmrdFrame> {
        let mut tx = self.tx.take()?;

        if self.end_of_call {
            self.end_of_call = false;
            info!(stream_id = tx.stream_id(), "call ended, sending terminator");
            return Some(tx.terminator_frame(self.repeater_id));
        }

        if tx.at_superframe_boundary() {
            if let Some(context) = self.pending_context.take() {
                match tx.apply_context(context) {
                    Ok(()) => self.context = context,
                    Err(err) => warn!(%err, "ignoring invalid context change"),
                }
            }
        }

        let frame = tx.next_frame(self.repeater_id);
        self.tx = Some(tx);
        Some(frame)
    }

    fn decode_burst(&mut self, frame: DmrdFrame) {
        if frame.timeslot != self.context.timeslot {
            self.stats.wrong_timeslot += 1;
            return;
        }

        let (decoded, corrected) = match burst::decode_burst(&frame.payload) {
            Ok(v) => v,
            Err(err) => {
                debug!(%err, stream_id = frame.stream_id, "burst dropped");
                match err {
                    BurstDecodeErr::SlotTypeUncorrectable => self.stats.slot_type_uncorrectable += 1,
                    BurstDecodeErr::LcUncorrectable => self.stats.lc_uncorrectable += 1,
                    BurstDecodeErr::EmbUncorrectable => self.stats.emb_uncorrectable += 1,
                    BurstDecodeErr::UnknownDataType(_) => self.stats.unknown_data_type += 1,
                }
                return;
            }
        };
        self.stats.bits_corrected += corrected as u64;

        match decoded {
            Burst::Data { data_type, coded_lc, .. } => {
                self.handle_data_burst(&frame, data_type, coded_lc)
            }
            Burst::VoiceSync { voice } => {
                // Sync restarts the embedded sequence for this superframe
                self.assembler.reset();
                let _ = self.events.send(EngineEvent::VoiceReceived {
                    stream_id: frame.stream_id,
                    src_id: frame.src_id,
                    dst_id: frame.dst_id,
                    voice,
                });
            }
            Burst::Voice { voice, emb, fragment } => {
                if let Some(lc) = self.assembler.push(emb.lcss, fragment) {
                    self.surface_lc(frame.stream_id, lc);
                }
                let _ = self.events.send(EngineEvent::VoiceReceived {
                    stream_id: frame.stream_id,
                    src_id: frame.src_id,
                    dst_id: frame.dst_id,
                    voice,
                });
            }
        }
    }

    fn session_up(&mut self) {}

    fn session_down(&mut self) {
        self.tx = None;
        self.end_of_call = false;
        self.pending_context = None;
        self.assembler.reset();
        self.last_lc = None;
    }
}

// ─── Engine loop ──────────────────────────────────────────────────

pub struct Engine {
    config: SessionConfig,
    session: Session,
    transport: Option<UdpTransport>,
    mode: DmrMode,

    commands: Receiver<EngineCommand>,
    events: Sender<EngineEvent>,
    next_burst_at: Option<Instant>,
}

impl Engine {
    /// Build the engine plus the command/event channel endpoints handed
    /// to the caller.
    pub fn new(config: SessionConfig) -> (Self, Sender<EngineCommand>, Receiver<EngineEvent>) {
        let (command_sender, command_receiver) = unbounded();
        let (event_sender, event_receiver) = unbounded();

        let session = Session::new(&config.server, &config.station);
        let mode = DmrMode::new(&config, event_sender.clone());

        let engine = Self {
            config,
            session,
            transport: None,
            mode,
            commands: command_receiver,
            events: event_sender,
            next_burst_at: None,
        };
        (engine, command_sender, event_receiver)
    }

    /// Run until Shutdown (or the command channel closes).
    pub fn run(&mut self) {
        info!("engine starting");
        loop {
            match self.commands.recv_timeout(Duration::from_millis(10)) {
                Ok(cmd) => {
                    if self.handle_command(cmd) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("command channel closed");
                    break;
                }
            }

            self.poll_network();
            self.drive_timers(Instant::now());
        }

        let outputs = self.session.close();
        self.dispatch(outputs);
        info!("engine stopped");
    }

    /// Returns true on shutdown.
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::Connect => self.connect(),
            EngineCommand::Disconnect => {
                let outputs = self.session.close();
                self.dispatch(outputs);
                self.mode.session_down();
                self.transport = None;
                self.next_burst_at = None;
            }
            EngineCommand::StartCall { dst_id, call_type } => {
                if !self.session.is_connected() {
                    let _ = self
                        .events
                        .send(EngineEvent::CallRejected("session not connected".into()));
                } else if let Err(reason) = self.mode.start_call(dst_id, call_type) {
                    warn!(%reason, "call rejected");
                    let _ = self.events.send(EngineEvent::CallRejected(reason));
                } else {
                    self.next_burst_at = Some(Instant::now());
                }
            }
            EngineCommand::EndCall => self.mode.end_call(),
            EngineCommand::SetTalkgroup(id) => self.mode.set_talkgroup(id),
            EngineCommand::SetCallType(ct) => self.mode.set_call_type(ct),
            EngineCommand::SetColourCode(cc) => self.mode.set_colour_code(cc),
            EngineCommand::SetTimeslot(ts) => self.mode.set_timeslot(ts),
            EngineCommand::PushVoice(unit) => self.mode.push_voice(unit),
            EngineCommand::Shutdown => return true,
        }
        false
    }

    fn connect(&mut self) {
        if self.transport.is_some() {
            debug!("connect ignored, transport already up");
            return;
        }
        match UdpTransport::connect(&self.config.server.host, self.config.server.port) {
            Ok(transport) => {
                self.transport = Some(transport);
                self.session = Session::new(&self.config.server, &self.config.station);
                let outputs = self.session.start_login();
                self.dispatch(outputs);
            }
            Err(err) => {
                warn!(%err, "connect failed");
                let _ = self.events.send(EngineEvent::SessionDown(err.to_string()));
            }
        }
    }

    fn poll_network(&mut self) {
        let Some(ref mut transport) = self.transport else {
            return;
        };
        let datagrams = transport.receive();
        let now = Instant::now();
        for datagram in datagrams {
            let outputs = self.session.handle_datagram(&datagram, now);
            self.dispatch(outputs);
        }
    }

    fn drive_timers(&mut self, now: Instant) {
        let outputs = self.session.tick(now);
        self.dispatch(outputs);

        let Some(due_at) = self.next_burst_at else {
            return;
        };
        if now < due_at {
            return;
        }
        if !self.session.is_connected() {
            // Never transmit into a stale session
            self.next_burst_at = None;
            return;
        }

        match self.mode.encode_next_burst() {
            Some(frame) => {
                self.send(&homebrew::build_data_frame(&frame));
                if self.mode.call_active() {
                    self.next_burst_at = Some(due_at + Duration::from_millis(BURST_INTERVAL_MS));
                } else {
                    // That was the terminator
                    self.next_burst_at = None;
                }
            }
            None => self.next_burst_at = None,
        }
    }

    fn dispatch(&mut self, outputs: Vec<SessionOutput>) {
        for output in outputs {
            match output {
                SessionOutput::Send(data) => self.send(&data),
                SessionOutput::Deliver(frame) => self.mode.decode_burst(frame),
                SessionOutput::Notify(event) => match event {
                    SessionEvent::Connected => {
                        self.mode.session_up();
                        let _ = self.events.send(EngineEvent::SessionUp);
                    }
                    SessionEvent::ConnectionLost(reason) => {
                        self.mode.session_down();
                        self.next_burst_at = None;
                        let _ = self.events.send(EngineEvent::SessionDown(reason));
                    }
                    SessionEvent::AuthFailed(reason) => {
                        self.mode.session_down();
                        self.next_burst_at = None;
                        let _ = self.events.send(EngineEvent::AuthFailed(reason));
                    }
                },
            }
        }
    }

    fn send(&mut self, payload: &[u8]) {
        if let Some(ref transport) = self.transport {
            if let Err(err) = transport.send(payload) {
                warn!(%err, "datagram send failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmrlink_config::CfgStation;
    use dmrlink_pdus::homebrew::FrameKind;

    fn test_mode() -> (DmrMode, Receiver<EngineEvent>) {
        let (sender, receiver) = unbounded();
        let mut config = SessionConfig::default();
        config.station = CfgStation {
            essid: 310700101,
            callsign: "N0CALL".into(),
            colour_code: ColourCode::new(1).unwrap(),
            timeslot: Timeslot::Slot1,
            ..Default::default()
        };
        (DmrMode::new(&config, sender), receiver)
    }

    fn drain(receiver: &Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = receiver.try_recv() {
            events.push(ev);
        }
        events
    }

    #[test]
    fn test_essid_suffix_stripped_for_source_id() {
        let (mode, _rx) = test_mode();
        assert_eq!(mode.context.src_id, 3107001);
        assert_eq!(mode.repeater_id, 310700101);
    }

    #[test]
    fn test_call_with_empty_destination_rejected() {
        let (mut mode, _rx) = test_mode();
        assert!(mode.start_call(0, CallType::Group).is_err());
        assert!(!mode.call_active());
    }

    #[test]
    fn test_transmit_receive_loop_surfaces_lc_once() {
        dmrlink_core::debug::setup_logging_verbose();
        let (mut tx_mode, _tx_events) = test_mode();
        let (mut rx_mode, rx_events) = test_mode();

        tx_mode.start_call(9, CallType::Group).unwrap();

        // One full superframe A..F
        for _ in 0..6 {
            let frame = tx_mode.encode_next_burst().unwrap();
            rx_mode.decode_burst(frame);
        }

        let events = drain(&rx_events);
        let lc_events: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::LcReceived { .. }))
            .collect();
        // Header at A and the reassembled fragments agree, so the LC is
        // surfaced exactly once
        assert_eq!(lc_events.len(), 1);
        match lc_events[0] {
            EngineEvent::LcReceived { lc, .. } => {
                assert_eq!(lc.dst_id, 9);
                assert_eq!(lc.src_id, 3107001);
            }
            _ => unreachable!(),
        }

        let voice_events = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::VoiceReceived { .. }))
            .count();
        assert_eq!(voice_events, 5);
    }

    #[test]
    fn test_corrupt_slot_type_counted_and_skipped() {
        let (mut tx_mode, _tx_events) = test_mode();
        let (mut rx_mode, rx_events) = test_mode();

        tx_mode.start_call(9, CallType::Group).unwrap();
        let mut frame = tx_mode.encode_next_burst().unwrap();

        // Corrupt the slot type beyond the Golay correction radius
        frame.payload[12] ^= 0x30;
        frame.payload[19] ^= 0x0C;
        rx_mode.decode_burst(frame);

        assert!(drain(&rx_events).is_empty());
        assert_eq!(rx_mode.stats().slot_type_uncorrectable, 1);

        // Subsequent bursts are processed normally
        for _ in 0..5 {
            let frame = tx_mode.encode_next_burst().unwrap();
            rx_mode.decode_burst(frame);
        }
        let events = drain(&rx_events);
        assert!(events.iter().any(|e| matches!(e, EngineEvent::LcReceived { .. })));
    }

    #[test]
    fn test_wrong_timeslot_ignored() {
        let (mut tx_mode, _tx_events) = test_mode();
        let (mut rx_mode, rx_events) = test_mode();
        rx_mode.set_timeslot(Timeslot::Slot2);

        tx_mode.start_call(9, CallType::Group).unwrap();
        let frame = tx_mode.encode_next_burst().unwrap();
        rx_mode.decode_burst(frame);

        assert!(drain(&rx_events).is_empty());
        assert_eq!(rx_mode.stats().wrong_timeslot, 1);
    }

    #[test]
    fn test_terminator_ends_transmission_and_signals_remote() {
        let (mut tx_mode, _tx_events) = test_mode();
        let (mut rx_mode, rx_events) = test_mode();

        tx_mode.start_call(9, CallType::Group).unwrap();
        let frame = tx_mode.encode_next_burst().unwrap();
        rx_mode.decode_burst(frame);
        drain(&rx_events);

        tx_mode.end_call();
        let frame = tx_mode.encode_next_burst().unwrap();
        assert_eq!(frame.frame_kind, FrameKind::DataSync(2));
        assert!(!tx_mode.call_active());
        assert!(tx_mode.encode_next_burst().is_none());

        rx_mode.decode_burst(frame);
        let events = drain(&rx_events);
        assert!(matches!(
            events.as_slice(),
            [EngineEvent::RemoteCallEnded { lc: Some(lc), .. }] if lc.dst_id == 9
        ));
    }

    #[test]
    fn test_talkgroup_change_latches_at_boundary() {
        let (mut mode, _rx) = test_mode();
        mode.start_call(9, CallType::Group).unwrap();

        // Mid-superframe change must not affect the current cycle
        let _ = mode.encode_next_burst(); // A
        mode.set_talkgroup(2345);
        for _ in 0..5 {
            let frame = mode.encode_next_burst().unwrap(); // B..F
            assert_eq!(frame.dst_id, 9);
        }

        let frame = mode.encode_next_burst().unwrap(); // next A
        assert_eq!(frame.dst_id, 2345);
    }

    #[test]
    fn test_session_down_abandons_transmission() {
        let (mut mode, _rx) = test_mode();
        mode.start_call(9, CallType::Group).unwrap();
        assert!(mode.call_active());
        mode.session_down();
        assert!(!mode.call_active());
        assert!(mode.encode_next_burst().is_none());
    }
}
