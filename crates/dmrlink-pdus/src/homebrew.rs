//! The "homebrew" UDP envelope spoken to the DMR network server.
//!
//! Datagrams are demultiplexed by a leading ASCII tag. The client sends
//! RPTL (login), RPTK (challenge response), RPTC (configuration push),
//! RPTO (options), RPTPING (keep-alive) and RPTCL (logoff); the server
//! answers RPTACK (with a 4-octet salt during login), MSTPONG, MSTNAK
//! and MSTCL. Traffic flows both ways as 55-octet DMRD frames carrying
//! one burst plus its routing header.

use dmrlink_core::{CallType, DmrId, ParseErr, Timeslot, BURST_BYTES};
use sha2::{Digest, Sha256};

pub const TAG_LOGIN: &[u8] = b"RPTL";
pub const TAG_KEY: &[u8] = b"RPTK";
pub const TAG_CONFIG: &[u8] = b"RPTC";
pub const TAG_OPTIONS: &[u8] = b"RPTO";
pub const TAG_PING: &[u8] = b"RPTPING";
pub const TAG_CLOSE: &[u8] = b"RPTCL";
pub const TAG_DATA: &[u8] = b"DMRD";

pub const TAG_ACK: &[u8] = b"RPTACK";
pub const TAG_PONG: &[u8] = b"MSTPONG";
pub const TAG_NAK: &[u8] = b"MSTNAK";
pub const TAG_MASTER_CLOSE: &[u8] = b"MSTCL";

/// Total length of a DMRD frame: tag, routing header, burst, BER + RSSI.
pub const DMRD_LEN: usize = 55;
/// Length without the two trailing diagnostic octets some peers omit.
pub const DMRD_MIN_LEN: usize = 53;

// ─── Client -> server ─────────────────────────────────────────────

pub fn build_login(id: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    buf.extend_from_slice(TAG_LOGIN);
    buf.extend_from_slice(&id.to_be_bytes());
    buf
}

/// Challenge response: SHA-256 over the server salt followed by the password.
pub fn build_key(id: u32, salt: &[u8; 4], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    let mut buf = Vec::with_capacity(8 + digest.len());
    buf.extend_from_slice(TAG_KEY);
    buf.extend_from_slice(&id.to_be_bytes());
    buf.extend_from_slice(&digest);
    buf
}

/// Station description pushed after authentication. Every field has a
/// fixed width; the server splits the frame by column position.
#[derive(Debug, Clone)]
pub struct ConfigFrame {
    pub callsign: String,
    pub rx_freq_hz: u32,
    pub tx_freq_hz: u32,
    pub tx_power: u8,
    pub colour_code: u8,
    pub latitude: f32,
    pub longitude: f32,
    pub height_m: u16,
    pub location: String,
    pub description: String,
    pub slots: u8,
    pub url: String,
    pub software_id: String,
    pub package_id: String,
}

/// Truncate to `width` bytes (respecting char boundaries) and pad right
/// with spaces. The server splits by byte column, so the width must hold
/// in bytes even for multi-byte text.
fn fixed(s: &str, width: usize) -> String {
    let mut t = String::with_capacity(width);
    for c in s.chars() {
        if t.len() + c.len_utf8() > width {
            break;
        }
        t.push(c);
    }
    while t.len() < width {
        t.push(' ');
    }
    t
}

pub fn build_config(id: u32, config: &ConfigFrame) -> Vec<u8> {
    let body = format!(
        "{}{:09}{:09}{:02}{:02}{:+08.4}{:+09.4}{:03}{}{}{:1}{}{}{}",
        fixed(&config.callsign, 8),
        config.rx_freq_hz,
        config.tx_freq_hz,
        config.tx_power.min(99),
        config.colour_code,
        config.latitude,
        config.longitude,
        config.height_m.min(999),
        fixed(&config.location, 20),
        fixed(&config.description, 19),
        config.slots,
        fixed(&config.url, 124),
        fixed(&config.software_id, 40),
        fixed(&config.package_id, 40),
    );

    let mut buf = Vec::with_capacity(8 + body.len());
    buf.extend_from_slice(TAG_CONFIG);
    buf.extend_from_slice(&id.to_be_bytes());
    buf.extend_from_slice(body.as_bytes());
    buf
}

pub fn build_options(id: u32, options: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + options.len());
    buf.extend_from_slice(TAG_OPTIONS);
    buf.extend_from_slice(&id.to_be_bytes());
    buf.extend_from_slice(options.as_bytes());
    buf
}

pub fn build_ping(id: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(11);
    buf.extend_from_slice(TAG_PING);
    buf.extend_from_slice(&id.to_be_bytes());
    buf
}

pub fn build_close(id: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(9);
    buf.extend_from_slice(TAG_CLOSE);
    buf.extend_from_slice(&id.to_be_bytes());
    buf
}

// ─── DMRD frames ──────────────────────────────────────────────────

/// Frame-type and sequencing bits of the DMRD header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Voice burst B..F, with its position in the superframe (1..=5).
    Voice { seq: u8 },
    /// Voice burst A (sync).
    VoiceSync,
    /// Data/control burst; carries the slot-type data type value.
    DataSync(u8),
}

/// One burst plus its routing header as carried over UDP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmrdFrame {
    /// Per-call octet counter, wraps at 255.
    pub seq: u8,
    pub src_id: DmrId,
    pub dst_id: DmrId,
    pub repeater_id: u32,
    pub timeslot: Timeslot,
    pub call_type: CallType,
    pub frame_kind: FrameKind,
    /// Random per-call stream id grouping the frames of one transmission.
    pub stream_id: u32,
    pub payload: [u8; BURST_BYTES],
}

fn write_id24(buf: &mut Vec<u8>, id: DmrId) {
    buf.extend_from_slice(&id.to_be_bytes()[1..]);
}

fn read_id24(data: &[u8]) -> DmrId {
    u32::from_be_bytes([0, data[0], data[1], data[2]])
}

pub fn build_data_frame(frame: &DmrdFrame) -> [u8; DMRD_LEN] {
    let mut buf = Vec::with_capacity(DMRD_LEN);
    buf.extend_from_slice(TAG_DATA);
    buf.push(frame.seq);
    write_id24(&mut buf, frame.src_id);
    write_id24(&mut buf, frame.dst_id);
    buf.extend_from_slice(&frame.repeater_id.to_be_bytes());

    let mut bits = frame.timeslot.to_bit() << 7;
    if frame.call_type == CallType::Private {
        bits |= 0x40;
    }
    bits |= match frame.frame_kind {
        FrameKind::Voice { seq } => seq & 0x0F,
        FrameKind::VoiceSync => 0x10,
        FrameKind::DataSync(data_type) => 0x20 | (data_type & 0x0F),
    };
    buf.push(bits);

    buf.extend_from_slice(&frame.stream_id.to_be_bytes());
    buf.extend_from_slice(&frame.payload);
    // BER and RSSI, unknown on the IP side
    buf.push(0);
    buf.push(0);

    let mut out = [0u8; DMRD_LEN];
    out.copy_from_slice(&buf);
    out
}

pub fn parse_data_frame(data: &[u8]) -> Result<DmrdFrame, ParseErr> {
    if data.len() < DMRD_MIN_LEN {
        return Err(ParseErr::InconsistentLength {
            expected: DMRD_MIN_LEN,
            found: data.len(),
        });
    }

    let seq = data[4];
    let src_id = read_id24(&data[5..8]);
    let dst_id = read_id24(&data[8..11]);
    let repeater_id = u32::from_be_bytes([data[11], data[12], data[13], data[14]]);

    let bits = data[15];
    let timeslot = Timeslot::from_bit((bits >> 7) & 1);
    let call_type = if bits & 0x40 != 0 { CallType::Private } else { CallType::Group };
    let frame_kind = match (bits >> 4) & 0x03 {
        0 => FrameKind::Voice { seq: bits & 0x0F },
        1 => FrameKind::VoiceSync,
        2 => FrameKind::DataSync(bits & 0x0F),
        _ => {
            return Err(ParseErr::InvalidValue {
                field: "frame_type",
                value: ((bits >> 4) & 0x03) as u64,
            })
        }
    };

    let stream_id = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let mut payload = [0u8; BURST_BYTES];
    payload.copy_from_slice(&data[20..20 + BURST_BYTES]);

    Ok(DmrdFrame {
        seq,
        src_id,
        dst_id,
        repeater_id,
        timeslot,
        call_type,
        frame_kind,
        stream_id,
        payload,
    })
}

// ─── Server -> client ─────────────────────────────────────────────

/// Inbound datagram after tag demultiplexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// RPTACK; carries the challenge salt during the login exchange.
    Ack { salt: Option<[u8; 4]> },
    Pong,
    Nak,
    Close,
    Data(DmrdFrame),
}

pub fn parse_datagram(data: &[u8]) -> Result<ServerMessage, ParseErr> {
    if data.starts_with(TAG_ACK) {
        let salt = if data.len() >= TAG_ACK.len() + 4 {
            let mut s = [0u8; 4];
            s.copy_from_slice(&data[TAG_ACK.len()..TAG_ACK.len() + 4]);
            Some(s)
        } else {
            None
        };
        return Ok(ServerMessage::Ack { salt });
    }
    if data.starts_with(TAG_PONG) {
        return Ok(ServerMessage::Pong);
    }
    if data.starts_with(TAG_NAK) {
        return Ok(ServerMessage::Nak);
    }
    if data.starts_with(TAG_MASTER_CLOSE) {
        return Ok(ServerMessage::Close);
    }
    if data.starts_with(TAG_DATA) {
        return Ok(ServerMessage::Data(parse_data_frame(data)?));
    }

    let mut tag = [0u8; 4];
    for (i, slot) in tag.iter_mut().enumerate() {
        *slot = data.get(i).copied().unwrap_or(0);
    }
    Err(ParseErr::UnknownTag { tag })
}
