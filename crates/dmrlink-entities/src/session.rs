//! Login and keep-alive state machine for the homebrew session.
//!
//! The machine is pure: callers feed it datagrams and clock ticks and it
//! returns the datagrams to send and the events to surface. The engine
//! wires it to the UDP socket; tests drive it with synthetic time.

use std::time::{Duration, Instant};

use dmrlink_config::{CfgServer, CfgStation};
use dmrlink_pdus::homebrew::{self, ConfigFrame, DmrdFrame, ServerMessage};
use tracing::{debug, info, warn};

/// Login progress. `Closed` is terminal; the caller decides whether to
/// build a fresh session and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    WaitLoginAck,
    WaitKeyAck,
    WaitConfigAck,
    WaitOptionsAck,
    Connected,
    Closed,
}

/// Events surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    /// Emitted exactly once per session; covers keep-alive timeout and
    /// server-initiated close.
    ConnectionLost(String),
    AuthFailed(String),
}

/// One step's worth of machine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutput {
    Send(Vec<u8>),
    Notify(SessionEvent),
    /// An inbound DMRD frame for the burst decoder.
    Deliver(DmrdFrame),
}

pub struct Session {
    essid: u32,
    password: String,
    options: Option<String>,
    config_frame: ConfigFrame,

    ping_interval: Duration,
    missed_ping_budget: u32,

    state: SessionState,
    /// Pings sent since the last pong was seen.
    outstanding_pings: u32,
    last_ping_at: Option<Instant>,
}

impl Session {
    pub fn new(server: &CfgServer, station: &CfgStation) -> Self {
        Self {
            essid: station.essid,
            password: server.password.clone(),
            options: station.options.clone(),
            config_frame: config_frame_from(station),
            ping_interval: Duration::from_secs(server.ping_interval_secs),
            missed_ping_budget: server.missed_ping_budget,
            state: SessionState::Idle,
            outstanding_pings: 0,
            last_ping_at: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Begin the login exchange.
    pub fn start_login(&mut self) -> Vec<SessionOutput> {
        info!("session: logging in as {}", self.essid);
        self.state = SessionState::WaitLoginAck;
        vec![SessionOutput::Send(homebrew::build_login(self.essid))]
    }

    /// Process one inbound datagram.
    pub fn handle_datagram(&mut self, data: &[u8], now: Instant) -> Vec<SessionOutput> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }

        let message = match homebrew::parse_datagram(data) {
            Ok(m) => m,
            Err(err) => {
                debug!(%err, "session: discarding unrecognized datagram");
                return Vec::new();
            }
        };

        match message {
            ServerMessage::Ack { salt } => self.handle_ack(salt, now),
            ServerMessage::Pong => {
                self.outstanding_pings = 0;
                Vec::new()
            }
            ServerMessage::Nak => {
                if self.state == SessionState::Connected {
                    warn!("session: server NAK while connected");
                    self.abort(SessionEvent::ConnectionLost("server rejected session".into()))
                } else {
                    warn!("session: server NAK during login");
                    self.abort(SessionEvent::AuthFailed("server rejected login".into()))
                }
            }
            ServerMessage::Close => {
                info!("session: server closed the connection");
                self.abort(SessionEvent::ConnectionLost("server closed connection".into()))
            }
            ServerMessage::Data(frame) => {
                if self.state == SessionState::Connected {
                    vec![SessionOutput::Deliver(frame)]
                } else {
                    // Traffic before login completes means the exchange is
                    // out of step with the server
                    warn!("session: data frame while not logged in");
                    self.abort(SessionEvent::AuthFailed("data frame before login completed".into()))
                }
            }
        }
    }

    fn handle_ack(&mut self, salt: Option<[u8; 4]>, now: Instant) -> Vec<SessionOutput> {
        match self.state {
            SessionState::WaitLoginAck => {
                let Some(salt) = salt else {
                    warn!("session: login ack without challenge salt");
                    return self.abort(SessionEvent::AuthFailed("missing challenge salt".into()));
                };
                self.state = SessionState::WaitKeyAck;
                vec![SessionOutput::Send(homebrew::build_key(self.essid, &salt, &self.password))]
            }
            SessionState::WaitKeyAck => {
                self.state = SessionState::WaitConfigAck;
                vec![SessionOutput::Send(homebrew::build_config(self.essid, &self.config_frame))]
            }
            SessionState::WaitConfigAck => {
                if let Some(ref options) = self.options {
                    self.state = SessionState::WaitOptionsAck;
                    vec![SessionOutput::Send(homebrew::build_options(self.essid, options))]
                } else {
                    self.enter_connected(now)
                }
            }
            SessionState::WaitOptionsAck => self.enter_connected(now),
            _ => {
                debug!("session: unexpected ack in state {:?}", self.state);
                Vec::new()
            }
        }
    }

    fn enter_connected(&mut self, now: Instant) -> Vec<SessionOutput> {
        info!("session: connected");
        self.state = SessionState::Connected;
        self.outstanding_pings = 0;
        self.last_ping_at = Some(now);
        vec![SessionOutput::Notify(SessionEvent::Connected)]
    }

    /// Drive the keep-alive clock. Call on every loop pass.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionOutput> {
        if self.state != SessionState::Connected {
            return Vec::new();
        }

        let due = match self.last_ping_at {
            Some(at) => now.duration_since(at) >= self.ping_interval,
            None => true,
        };
        if !due {
            return Vec::new();
        }

        if self.outstanding_pings >= self.missed_ping_budget {
            warn!(
                missed = self.outstanding_pings,
                "session: keep-alive timeout, declaring session stale"
            );
            return self.abort(SessionEvent::ConnectionLost("keep-alive timeout".into()));
        }

        self.outstanding_pings += 1;
        self.last_ping_at = Some(now);
        vec![SessionOutput::Send(homebrew::build_ping(self.essid))]
    }

    /// Graceful logoff. Idempotent: a second call sends nothing.
    pub fn close(&mut self) -> Vec<SessionOutput> {
        if self.state == SessionState::Closed || self.state == SessionState::Idle {
            self.state = SessionState::Closed;
            return Vec::new();
        }
        info!("session: logging off");
        self.state = SessionState::Closed;
        vec![SessionOutput::Send(homebrew::build_close(self.essid))]
    }

    fn abort(&mut self, event: SessionEvent) -> Vec<SessionOutput> {
        self.state = SessionState::Closed;
        vec![SessionOutput::Notify(event)]
    }
}

fn config_frame_from(station: &CfgStation) -> ConfigFrame {
    ConfigFrame {
        callsign: station.callsign.clone(),
        rx_freq_hz: station.rx_freq_hz,
        tx_freq_hz: station.tx_freq_hz,
        tx_power: station.tx_power,
        colour_code: station.colour_code.value(),
        latitude: station.latitude,
        longitude: station.longitude,
        height_m: station.height_m,
        location: station.location.clone(),
        description: station.description.clone(),
        slots: station.timeslot.number(),
        url: station.url.clone(),
        software_id: station.software_id.clone(),
        package_id: station.package_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmrlink_pdus::homebrew::{TAG_CONFIG, TAG_KEY, TAG_LOGIN, TAG_OPTIONS, TAG_PING};

    fn test_session(options: Option<&str>) -> Session {
        let server = CfgServer {
            host: "master.example.net".into(),
            password: "s3cret".into(),
            ..Default::default()
        };
        let mut station = CfgStation {
            essid: 310700101,
            callsign: "N0CALL".into(),
            ..Default::default()
        };
        station.options = options.map(String::from);
        Session::new(&server, &station)
    }

    fn expect_send<'a>(outputs: &'a [SessionOutput], tag: &[u8]) -> &'a [u8] {
        match outputs {
            [SessionOutput::Send(data)] => {
                assert!(data.starts_with(tag), "expected tag {:?}", std::str::from_utf8(tag));
                data
            }
            other => panic!("expected single send, got {:?}", other),
        }
    }

    fn walk_login(session: &mut Session, now: Instant) {
        expect_send(&session.start_login(), TAG_LOGIN);
        expect_send(&session.handle_datagram(b"RPTACK\x01\x02\x03\x04", now), TAG_KEY);
        expect_send(&session.handle_datagram(b"RPTACK", now), TAG_CONFIG);
    }

    #[test]
    fn test_login_walk_without_options() {
        let mut session = test_session(None);
        let now = Instant::now();
        walk_login(&mut session, now);
        assert_eq!(
            session.handle_datagram(b"RPTACK", now),
            vec![SessionOutput::Notify(SessionEvent::Connected)]
        );
        assert!(session.is_connected());
    }

    #[test]
    fn test_login_walk_with_options() {
        let mut session = test_session(Some("TS2_1=9"));
        let now = Instant::now();
        walk_login(&mut session, now);
        let out = session.handle_datagram(b"RPTACK", now);
        let data = expect_send(&out, TAG_OPTIONS);
        assert!(data.ends_with(b"TS2_1=9"));
        assert_eq!(
            session.handle_datagram(b"RPTACK", now),
            vec![SessionOutput::Notify(SessionEvent::Connected)]
        );
    }

    #[test]
    fn test_nak_during_login_is_auth_failure() {
        let mut session = test_session(None);
        session.start_login();
        let out = session.handle_datagram(b"MSTNAK\x00\x00\x00\x01", Instant::now());
        assert!(matches!(
            out.as_slice(),
            [SessionOutput::Notify(SessionEvent::AuthFailed(_))]
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_login_ack_without_salt_rejected() {
        let mut session = test_session(None);
        session.start_login();
        let out = session.handle_datagram(b"RPTACK", Instant::now());
        assert!(matches!(
            out.as_slice(),
            [SessionOutput::Notify(SessionEvent::AuthFailed(_))]
        ));
    }

    #[test]
    fn test_data_before_login_aborts() {
        let mut session = test_session(None);
        session.start_login();
        let frame = [b"DMRD".as_slice(), &[0u8; 51]].concat();
        let out = session.handle_datagram(&frame, Instant::now());
        assert!(matches!(
            out.as_slice(),
            [SessionOutput::Notify(SessionEvent::AuthFailed(_))]
        ));
    }

    #[test]
    fn test_unknown_datagram_discarded() {
        let mut session = test_session(None);
        session.start_login();
        assert!(session.handle_datagram(b"XYZZY", Instant::now()).is_empty());
        assert_eq!(session.state(), SessionState::WaitLoginAck);
    }

    fn connect(session: &mut Session, now: Instant) {
        walk_login(session, now);
        session.handle_datagram(b"RPTACK", now);
        assert!(session.is_connected());
    }

    #[test]
    fn test_keepalive_ping_cadence() {
        let mut session = test_session(None);
        let t0 = Instant::now();
        connect(&mut session, t0);

        // Nothing due before the interval elapses
        assert!(session.tick(t0 + Duration::from_secs(2)).is_empty());

        let out = session.tick(t0 + Duration::from_secs(5));
        expect_send(&out, TAG_PING);

        // A pong clears the outstanding count
        assert!(session.handle_datagram(b"MSTPONG", t0 + Duration::from_secs(6)).is_empty());
        assert_eq!(session.outstanding_pings, 0);
    }

    #[test]
    fn test_keepalive_timeout_emits_connection_lost_once() {
        let mut session = test_session(None);
        let t0 = Instant::now();
        connect(&mut session, t0);

        // Six unanswered pings exhaust the budget
        let mut now = t0;
        for _ in 0..6 {
            now += Duration::from_secs(5);
            expect_send(&session.tick(now), TAG_PING);
        }

        now += Duration::from_secs(5);
        assert_eq!(
            session.tick(now),
            vec![SessionOutput::Notify(SessionEvent::ConnectionLost("keep-alive timeout".into()))]
        );
        assert_eq!(session.state(), SessionState::Closed);

        // No further output, ever
        now += Duration::from_secs(5);
        assert!(session.tick(now).is_empty());
        assert!(session.handle_datagram(b"MSTPONG", now).is_empty());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = test_session(None);
        let now = Instant::now();
        connect(&mut session, now);

        let out = session.close();
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], SessionOutput::Send(d) if d.starts_with(b"RPTCL")));
        assert!(session.close().is_empty());
    }

    #[test]
    fn test_server_close_reported() {
        let mut session = test_session(None);
        let now = Instant::now();
        connect(&mut session, now);
        let out = session.handle_datagram(b"MSTCL\x00\x00\x00\x01", now);
        assert!(matches!(
            out.as_slice(),
            [SessionOutput::Notify(SessionEvent::ConnectionLost(_))]
        ));
    }
}
