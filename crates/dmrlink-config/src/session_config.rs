use dmrlink_core::{ColourCode, Timeslot, STACK_VERSION};

/// Network server endpoint and the liveness parameters of the session.
#[derive(Debug, Clone)]
pub struct CfgServer {
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Keep-alive ping cadence in seconds.
    pub ping_interval_secs: u64,
    /// Missed pongs tolerated before the session is declared stale.
    pub missed_ping_budget: u32,
}

pub fn default_ping_interval_secs() -> u64 {
    5
}

pub fn default_missed_ping_budget() -> u32 {
    6
}

impl Default for CfgServer {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 62031,
            password: String::new(),
            ping_interval_secs: default_ping_interval_secs(),
            missed_ping_budget: default_missed_ping_budget(),
        }
    }
}

/// Station identity and the parameters pushed in the configuration frame.
#[derive(Debug, Clone)]
pub struct CfgStation {
    /// Extended SSID: DMR id plus two-digit suffix, identifies this client
    /// to the network.
    pub essid: u32,
    pub callsign: String,
    pub rx_freq_hz: u32,
    pub tx_freq_hz: u32,
    pub tx_power: u8,
    pub colour_code: ColourCode,
    pub timeslot: Timeslot,
    /// Selects BS-sourced sync patterns on outgoing bursts.
    pub duplex: bool,
    pub latitude: f32,
    pub longitude: f32,
    pub height_m: u16,
    pub location: String,
    pub description: String,
    pub url: String,
    pub software_id: String,
    pub package_id: String,
    /// Feature-option string pushed with RPTO when present.
    pub options: Option<String>,
}

impl Default for CfgStation {
    fn default() -> Self {
        let software_id = format!("dmrlink:{}", STACK_VERSION);
        Self {
            essid: 0,
            callsign: String::new(),
            rx_freq_hz: 0,
            tx_freq_hz: 0,
            tx_power: 1,
            colour_code: ColourCode::default(),
            timeslot: Timeslot::Slot2,
            duplex: false,
            latitude: 0.0,
            longitude: 0.0,
            height_m: 0,
            location: String::new(),
            description: String::new(),
            url: String::new(),
            package_id: software_id.clone(),
            software_id,
            options: None,
        }
    }
}

/// Everything needed to run one session. Immutable once the session is
/// established.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Path for the verbose logfile, if any.
    pub debug_log: Option<String>,
    pub server: CfgServer,
    pub station: CfgStation,
}
